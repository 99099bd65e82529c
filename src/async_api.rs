use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;

use tokio::sync::oneshot;

use crate::presenter::ResultSlot;
use crate::{ConversionRequest, ConversionResult, Converter, ConverterConfig, Error, Result};

enum Command {
    Convert(ConversionRequest, oneshot::Sender<Result<ConversionResult>>),
    Close(oneshot::Sender<Result<()>>),
}

/// An async-friendly converter backed by a dedicated worker thread.
///
/// The worker thread owns a synchronous `Converter` (and with it the document
/// context, which need not be `Send`) and runs requests one at a time in
/// submission order. Results can be routed into a shared `ResultSlot`.
#[derive(Clone)]
pub struct ConverterService {
    cmd_tx: Sender<Command>,
    slot: Arc<ResultSlot>,
}

impl ConverterService {
    /// Create a new service (spawns a background thread that owns the converter).
    pub async fn new(config: Option<ConverterConfig>) -> Result<Self> {
        let config = config.unwrap_or_default();

        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx) = oneshot::channel::<Result<()>>();

        thread::spawn(move || {
            let mut converter = match Converter::new(config) {
                Ok(c) => c,
                Err(err) => {
                    let _ = init_tx.send(Err(err));
                    return;
                }
            };
            let _ = init_tx.send(Ok(()));

            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    Command::Convert(request, resp) => {
                        let res = converter.convert(&request);
                        let _ = resp.send(res);
                    }
                    Command::Close(resp) => {
                        // dropping the converter tears down its document context
                        drop(converter);
                        let _ = resp.send(Ok(()));
                        break;
                    }
                }
            }
        });

        init_rx
            .await
            .map_err(|e| Error::Other(format!("Worker init canceled: {}", e)))??;

        Ok(Self {
            cmd_tx,
            slot: Arc::new(ResultSlot::new()),
        })
    }

    /// The result area shared by every clone of this service
    pub fn slot(&self) -> Arc<ResultSlot> {
        Arc::clone(&self.slot)
    }

    /// Run one conversion on the worker thread.
    pub async fn convert(&self, request: ConversionRequest) -> Result<ConversionResult> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Convert(request, tx))
            .map_err(|_| Error::Other("Converter worker has stopped".into()))?;
        rx.await
            .map_err(|e| Error::Other(format!("Convert canceled: {}", e)))?
    }

    /// Convert and publish the outcome (image or error message) to the slot.
    ///
    /// The ticket is taken before the request is queued, so a request
    /// submitted later always wins the slot.
    pub async fn convert_and_present(&self, request: ConversionRequest) -> Result<ConversionResult> {
        let ticket = self.slot.ticket();
        let outcome = self.convert(request).await;
        self.slot.publish_outcome(ticket, &outcome);
        outcome
    }

    /// Shutdown the background worker.
    pub async fn close(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Close(tx));
        rx.await
            .map_err(|e| Error::Other(format!("Close canceled: {}", e)))?
    }
}
