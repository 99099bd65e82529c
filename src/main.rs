use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use log::info;
use serde::Serialize;

use markshot::{
    Backend, Calibration, ConversionRequest, ConversionResult, Converter, ConverterConfig, OutputFormat, ResultSlot,
    SourceKind,
};

/// Convert an HTML or SVG document into a PNG or JPEG image.
#[derive(Parser, Debug)]
#[command(name = "markshot", version, about)]
struct Args {
    /// Input file (.svg or .html)
    #[arg(conflicts_with = "code", required_unless_present = "code")]
    file: Option<PathBuf>,

    /// Markup text to convert instead of a file
    #[arg(long)]
    code: Option<String>,

    /// Kind of markup passed with --code
    #[arg(long, default_value = "svg")]
    kind: SourceKind,

    /// Output format
    #[arg(long, short, default_value = "png")]
    format: OutputFormat,

    /// Directory the image is written to
    #[arg(long, short, default_value = ".")]
    out_dir: PathBuf,

    /// Document context used for HTML input
    #[arg(long)]
    backend: Option<Backend>,

    /// JSON file overriding calibration constants
    #[arg(long)]
    calibration: Option<PathBuf>,

    /// Print the preview data URI
    #[arg(long)]
    data_uri: bool,

    /// Print result metadata as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Summary<'a> {
    file: String,
    format: OutputFormat,
    width: u32,
    height: u32,
    bytes: usize,
    sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_uri: Option<&'a str>,
}

fn build_config(args: &Args) -> anyhow::Result<ConverterConfig> {
    let mut config = ConverterConfig::default();
    if let Some(backend) = args.backend {
        config.backend = backend;
    }
    if let Some(path) = &args.calibration {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading calibration file {}", path.display()))?;
        config.calibration = serde_json::from_str::<Calibration>(&text)
            .with_context(|| format!("parsing calibration file {}", path.display()))?;
    }
    Ok(config)
}

fn build_request(args: &Args) -> markshot::Result<ConversionRequest> {
    match (&args.file, &args.code) {
        (Some(path), _) => ConversionRequest::from_file(path, args.format),
        (None, Some(code)) => ConversionRequest::from_code(code, args.kind, args.format),
        (None, None) => Err(markshot::Error::InputError("no input file or code given".into())),
    }
}

fn report(args: &Args, result: &ConversionResult, path: &std::path::Path) -> anyhow::Result<()> {
    let uri = args.data_uri.then(|| result.data_uri());
    if args.json {
        let summary = Summary {
            file: path.display().to_string(),
            format: result.format(),
            width: result.width(),
            height: result.height(),
            bytes: result.data().len(),
            sha256: result.digest(),
            data_uri: uri.as_deref(),
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "{} ({}x{}, {} bytes)",
            path.display(),
            result.width(),
            result.height(),
            result.data().len()
        );
        if let Some(uri) = uri {
            println!("{}", uri);
        }
    }
    Ok(())
}

fn run(args: &Args) -> anyhow::Result<()> {
    let config = build_config(args)?;
    let request = build_request(args)?;
    info!("converting {} input to {}", request.source_kind(), request.output_format());

    let slot = ResultSlot::new();
    let ticket = slot.ticket();
    let mut converter = Converter::new(config)?;
    let outcome = converter.convert(&request);
    slot.publish_outcome(ticket, &outcome);
    let result = outcome?;

    let path = slot.save_download(&args.out_dir)?;
    report(args, &result, &path)
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("markshot: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
