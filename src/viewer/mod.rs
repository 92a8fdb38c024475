//! Document viewer drivers.
//!
//! A viewer shows one page of a paginated document at a time. Pages are
//! numbered from 1, the way they are written into note properties.

#[cfg(feature = "pdf")]
mod pdf;
mod text;

use std::path::Path;

use log::info;

use crate::error::{NoterError, NoterResult};

#[cfg(feature = "pdf")]
pub use pdf::PdfViewer;
pub use text::{LINES_PER_PAGE, PlainTextViewer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewerKind {
    Pdf,
    PlainText,
}

impl ViewerKind {
    pub fn for_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        match extension.as_str() {
            "pdf" => Some(ViewerKind::Pdf),
            "txt" | "text" | "md" | "org" => Some(ViewerKind::PlainText),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewerKind::Pdf => "PDF",
            ViewerKind::PlainText => "Text",
        }
    }
}

pub trait DocumentViewer {
    fn kind(&self) -> ViewerKind;

    fn path(&self) -> &Path;

    fn page_count(&self) -> usize;

    /// Current page, 1-based.
    fn current_page(&self) -> usize;

    /// Moves to `page`, clamped to the document. Returns whether the page changed.
    fn goto_page(&mut self, page: usize) -> bool;

    /// Text lines of the current page, for display.
    fn page_lines(&self) -> Vec<String>;

    fn is_of_kind(&self, kind: ViewerKind) -> bool {
        self.kind() == kind
    }
}

/// Opens `path` with the driver matching its kind.
pub fn open_viewer(path: &Path) -> NoterResult<Box<dyn DocumentViewer>> {
    if !path.is_file() {
        return Err(NoterError::UnreadableDocument(path.to_path_buf()));
    }

    let viewer: Box<dyn DocumentViewer> = match ViewerKind::for_path(path) {
        Some(ViewerKind::PlainText) => Box::new(PlainTextViewer::open(path)?),
        #[cfg(feature = "pdf")]
        Some(ViewerKind::Pdf) => Box::new(PdfViewer::open(path)?),
        _ => return Err(NoterError::UnsupportedViewer(path.to_path_buf())),
    };

    info!(
        "Opened {} viewer for {path:?} ({} pages)",
        viewer.kind().as_str(),
        viewer.page_count()
    );
    Ok(viewer)
}
