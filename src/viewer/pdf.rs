use std::path::{Path, PathBuf};

use log::{error, warn};
use mupdf::text_page::TextBlockType;
use mupdf::{Document, TextPageFlags};

use super::{DocumentViewer, ViewerKind};
use crate::error::{NoterError, NoterResult};

/// PDF pages read through MuPDF; the page text stands in for the rendering.
pub struct PdfViewer {
    path: PathBuf,
    doc: Document,
    page_count: usize,
    current_page: usize,
}

impl PdfViewer {
    pub fn open(path: &Path) -> NoterResult<Self> {
        let doc = Document::open(path.to_string_lossy().as_ref()).map_err(|e| {
            error!("Failed to open PDF document {path:?}: {e}");
            NoterError::UnreadableDocument(path.to_path_buf())
        })?;
        let page_count = doc.page_count().unwrap_or(0).max(0) as usize;
        if page_count == 0 {
            return Err(NoterError::UnreadableDocument(path.to_path_buf()));
        }

        Ok(Self {
            path: path.to_path_buf(),
            doc,
            page_count,
            current_page: 1,
        })
    }
}

impl DocumentViewer for PdfViewer {
    fn kind(&self) -> ViewerKind {
        ViewerKind::Pdf
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn page_count(&self) -> usize {
        self.page_count
    }

    fn current_page(&self) -> usize {
        self.current_page
    }

    fn goto_page(&mut self, page: usize) -> bool {
        let clamped = page.clamp(1, self.page_count);
        if clamped == self.current_page {
            return false;
        }
        self.current_page = clamped;
        true
    }

    fn page_lines(&self) -> Vec<String> {
        let Ok(page) = self.doc.load_page((self.current_page - 1) as i32) else {
            warn!("Failed to load PDF page {}", self.current_page);
            return Vec::new();
        };
        let Ok(text_page) = page.to_text_page(TextPageFlags::empty()) else {
            return Vec::new();
        };

        let mut lines = Vec::new();
        for block in text_page.blocks() {
            if block.r#type() != TextBlockType::Text {
                continue;
            }
            for line in block.lines() {
                let text: String = line.chars().filter_map(|ch| ch.char()).collect();
                lines.push(text);
            }
        }
        lines
    }
}
