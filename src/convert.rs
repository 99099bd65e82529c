//! The conversion pipeline: normalize, then rasterize.
//!
//! Each request runs through its own `Conversion`, which tracks the state
//! machine `Idle -> Normalizing -> (ParseError | Ready) -> Rasterizing ->
//! (RenderError | Complete)`. Failed conversions are terminal; a new request
//! starts over from `Idle`.

use log::debug;

use crate::context::{open_context, DocumentContext};
use crate::normalize::{normalize, RenderSurface};
use crate::rendering::{rasterize_html, rasterize_svg};
use crate::{ConversionRequest, ConversionResult, ConverterConfig, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionState {
    Idle,
    Normalizing,
    ParseError,
    Ready,
    Rasterizing,
    RenderError,
    Complete,
}

impl ConversionState {
    pub fn can_transition_to(self, next: ConversionState) -> bool {
        use ConversionState::*;
        matches!(
            (self, next),
            (Idle, Normalizing)
                | (Normalizing, ParseError)
                | (Normalizing, Ready)
                | (Ready, Rasterizing)
                | (Rasterizing, RenderError)
                | (Rasterizing, Complete)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ConversionState::ParseError | ConversionState::RenderError | ConversionState::Complete
        )
    }
}

/// Per-request pipeline state
#[derive(Debug)]
pub struct Conversion<'r> {
    request: &'r ConversionRequest,
    state: ConversionState,
    surface: Option<RenderSurface>,
}

impl<'r> Conversion<'r> {
    pub fn new(request: &'r ConversionRequest) -> Self {
        Self {
            request,
            state: ConversionState::Idle,
            surface: None,
        }
    }

    pub fn state(&self) -> ConversionState {
        self.state
    }

    /// The normalized surface, once `normalize` has succeeded
    pub fn surface(&self) -> Option<&RenderSurface> {
        self.surface.as_ref()
    }

    fn advance(&mut self, next: ConversionState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::Other(format!(
                "invalid conversion transition {:?} -> {:?}",
                self.state, next
            )));
        }
        debug!("conversion {:?} -> {:?}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// `Idle -> Normalizing -> (ParseError | Ready)`
    pub fn normalize(&mut self) -> Result<&RenderSurface> {
        self.advance(ConversionState::Normalizing)?;
        match normalize(self.request.markup(), self.request.source_kind()) {
            Ok(surface) => {
                self.advance(ConversionState::Ready)?;
                Ok(self.surface.insert(surface))
            }
            Err(e) => {
                self.advance(ConversionState::ParseError)?;
                Err(e)
            }
        }
    }

    /// `Ready -> Rasterizing -> (RenderError | Complete)`
    ///
    /// `context` is only consulted for HTML surfaces.
    pub fn rasterize<'c, F>(&mut self, config: &ConverterConfig, context: F) -> Result<ConversionResult>
    where
        F: FnOnce() -> Result<&'c mut dyn DocumentContext>,
    {
        self.advance(ConversionState::Rasterizing)?;
        let format = self.request.output_format();
        let outcome = match &self.surface {
            Some(RenderSurface::Vector(svg)) => rasterize_svg(svg, format, &config.calibration),
            Some(RenderSurface::Markup(html)) => {
                context().and_then(|ctx| rasterize_html(html, format, ctx, config))
            }
            None => Err(Error::Other("rasterize called before normalize".into())),
        };
        match outcome {
            Ok(result) => {
                self.advance(ConversionState::Complete)?;
                Ok(result)
            }
            Err(e) => {
                self.advance(ConversionState::RenderError)?;
                Err(e)
            }
        }
    }
}

/// Runs conversions with one configuration and a lazily opened document context
///
/// The document context is only started for the first HTML request, so
/// SVG-only use never launches a browser.
pub struct Converter {
    config: ConverterConfig,
    context: Option<Box<dyn DocumentContext>>,
}

impl Converter {
    pub fn new(config: ConverterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, context: None })
    }

    /// Use a caller-provided document context instead of `config.backend`.
    pub fn with_context(config: ConverterConfig, context: Box<dyn DocumentContext>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            context: Some(context),
        })
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Convert one request end to end.
    pub fn convert(&mut self, request: &ConversionRequest) -> Result<ConversionResult> {
        let mut conversion = Conversion::new(request);
        conversion.normalize()?;

        let config = &self.config;
        let slot = &mut self.context;
        let result = conversion.rasterize(config, move || {
            let slot = slot;
            ensure_context(slot, config)
        })?;
        debug!(
            "converted {} input to {}x{} {} ({} bytes)",
            request.source_kind(),
            result.width(),
            result.height(),
            result.format(),
            result.data().len()
        );
        Ok(result)
    }
}

fn ensure_context<'a>(
    slot: &'a mut Option<Box<dyn DocumentContext>>,
    config: &ConverterConfig,
) -> Result<&'a mut dyn DocumentContext> {
    if slot.is_none() {
        *slot = Some(open_context(config)?);
    }
    match slot {
        Some(ctx) => {
            let ctx: &'a mut dyn DocumentContext = ctx.as_mut();
            Ok(ctx)
        }
        None => Err(Error::InitializationError("document context unavailable".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OutputFormat, SourceKind};

    #[test]
    fn transitions_follow_the_state_machine() {
        use ConversionState::*;
        assert!(Idle.can_transition_to(Normalizing));
        assert!(!Idle.can_transition_to(Rasterizing));
        assert!(!ParseError.can_transition_to(Normalizing));
        assert!(Complete.is_terminal());
        assert!(!Ready.is_terminal());
    }

    #[test]
    fn parse_failure_ends_in_parse_error() {
        let req = ConversionRequest::from_code("<svg><g></svg>", SourceKind::Svg, OutputFormat::Png).unwrap();
        let mut conversion = Conversion::new(&req);
        assert!(conversion.normalize().is_err());
        assert_eq!(conversion.state(), ConversionState::ParseError);
        assert!(conversion.surface().is_none());
    }

    #[test]
    fn svg_conversion_completes() {
        let req = ConversionRequest::from_code(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"/>"#,
            SourceKind::Svg,
            OutputFormat::Png,
        )
        .unwrap();
        let config = ConverterConfig::default();
        let mut conversion = Conversion::new(&req);
        conversion.normalize().unwrap();
        assert_eq!(conversion.state(), ConversionState::Ready);
        let res = conversion
            .rasterize(&config, || Err(Error::Other("no context needed".into())))
            .unwrap();
        assert_eq!(conversion.state(), ConversionState::Complete);
        // 10x10 is floored to 300x300
        assert_eq!((res.width(), res.height()), ((300 + 110) * 2, (300 + 60) * 2));
    }

    #[test]
    fn rasterize_before_normalize_is_rejected() {
        let req = ConversionRequest::from_code("<p>x</p>", SourceKind::Html, OutputFormat::Png).unwrap();
        let mut conversion = Conversion::new(&req);
        let config = ConverterConfig::default();
        assert!(conversion
            .rasterize(&config, || Err(Error::Other("unused".into())))
            .is_err());
        assert_eq!(conversion.state(), ConversionState::Idle);
    }

    #[test]
    fn missing_context_is_a_render_failure() {
        let req = ConversionRequest::from_code("<p>x</p>", SourceKind::Html, OutputFormat::Png).unwrap();
        let mut conversion = Conversion::new(&req);
        conversion.normalize().unwrap();
        let config = ConverterConfig::default();
        let err = conversion
            .rasterize(&config, || Err(Error::InitializationError("no chrome".into())))
            .unwrap_err();
        assert!(matches!(err, Error::InitializationError(_)));
        assert_eq!(conversion.state(), ConversionState::RenderError);
    }
}
