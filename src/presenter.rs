//! The "current result" slot and download output

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::{ConversionResult, Error, Result};

/// File name stem used for downloads
pub const DOWNLOAD_STEM: &str = "converted-image";

/// Issue order of a request. Later requests get larger tickets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

/// What the result area currently shows
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Presentation {
    #[default]
    Empty,
    Image(ConversionResult),
    /// User-visible message of the error that ended the request
    Error(String),
}

/// The single shared result area
///
/// Each request takes a ticket when it starts. Whatever it produces, an image
/// or an error message, replaces the slot contents only if no newer ticket
/// has published already, so a slow request that was superseded cannot
/// overwrite the latest result.
#[derive(Debug, Default)]
pub struct ResultSlot {
    next: AtomicU64,
    current: Mutex<(Option<Ticket>, Presentation)>,
}

impl ResultSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a ticket for a request that is about to start.
    pub fn ticket(&self) -> Ticket {
        Ticket(self.next.fetch_add(1, Ordering::SeqCst))
    }

    /// Show `result` unless a newer request already published. Returns
    /// whether the slot was updated.
    pub fn publish(&self, ticket: Ticket, result: ConversionResult) -> bool {
        self.replace(ticket, Presentation::Image(result))
    }

    /// Replace the result area with the message of `error`.
    pub fn publish_error(&self, ticket: Ticket, error: &Error) -> bool {
        self.replace(ticket, Presentation::Error(error.to_string()))
    }

    /// Publish the outcome of a request, whichever way it went.
    pub fn publish_outcome(&self, ticket: Ticket, outcome: &Result<ConversionResult>) -> bool {
        match outcome {
            Ok(result) => self.publish(ticket, result.clone()),
            Err(e) => self.publish_error(ticket, e),
        }
    }

    fn replace(&self, ticket: Ticket, presentation: Presentation) -> bool {
        let mut guard = self.lock();
        if matches!(guard.0, Some(shown) if shown > ticket) {
            log::debug!("discarding stale result for {:?}", ticket);
            return false;
        }
        *guard = (Some(ticket), presentation);
        true
    }

    pub fn presentation(&self) -> Presentation {
        self.lock().1.clone()
    }

    /// The image currently shown, if any
    pub fn current(&self) -> Option<ConversionResult> {
        match &self.lock().1 {
            Presentation::Image(result) => Some(result.clone()),
            _ => None,
        }
    }

    /// Downloads are only offered while an image is shown.
    pub fn download_enabled(&self) -> bool {
        matches!(self.lock().1, Presentation::Image(_))
    }

    /// Write the current image into `dir` as `converted-image.<ext>`.
    pub fn save_download(&self, dir: &Path) -> Result<PathBuf> {
        let result = self
            .current()
            .ok_or_else(|| Error::Other("there is no converted image to download".into()))?;
        save_result(&result, dir)
    }

    fn lock(&self) -> MutexGuard<'_, (Option<Ticket>, Presentation)> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Write `result` into `dir` under its download file name.
pub fn save_result(result: &ConversionResult, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(result.download_filename());
    std::fs::write(&path, result.data())?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OutputFormat;

    fn image(byte: u8) -> ConversionResult {
        ConversionResult::new(vec![byte], OutputFormat::Png, 1, 1)
    }

    #[test]
    fn tickets_increase() {
        let slot = ResultSlot::new();
        let a = slot.ticket();
        let b = slot.ticket();
        assert!(b > a);
    }

    #[test]
    fn stale_results_are_discarded() {
        let slot = ResultSlot::new();
        let first = slot.ticket();
        let second = slot.ticket();

        assert!(slot.publish(second, image(2)));
        assert!(!slot.publish(first, image(1)));
        assert_eq!(slot.current().unwrap().data(), &[2]);
    }

    #[test]
    fn errors_replace_the_image_and_disable_download() {
        let slot = ResultSlot::new();
        let t = slot.ticket();
        slot.publish(t, image(1));
        assert!(slot.download_enabled());

        let t = slot.ticket();
        slot.publish_error(t, &Error::ParseError("bad".into()));
        assert!(!slot.download_enabled());
        assert_eq!(slot.presentation(), Presentation::Error("SVG parse error: bad".into()));
    }

    #[test]
    fn download_writes_fixed_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let slot = ResultSlot::new();
        assert!(slot.save_download(dir.path()).is_err());

        let t = slot.ticket();
        slot.publish(t, image(7));
        let path = slot.save_download(dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "converted-image.png");
        assert_eq!(std::fs::read(path).unwrap(), vec![7]);
    }
}
