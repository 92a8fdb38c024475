use std::fs;
use std::path::{Path, PathBuf};

use super::{DocumentViewer, ViewerKind};
use crate::error::{NoterError, NoterResult};

/// Pagination used for text files without form feeds.
pub const LINES_PER_PAGE: usize = 50;

/// Plain text split into pages at form feeds.
pub struct PlainTextViewer {
    path: PathBuf,
    pages: Vec<String>,
    current_page: usize,
}

impl PlainTextViewer {
    pub fn open(path: &Path) -> NoterResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|_| NoterError::UnreadableDocument(path.to_path_buf()))?;
        Ok(Self::from_text(path, &content))
    }

    pub fn from_text(path: &Path, content: &str) -> Self {
        let pages: Vec<String> = if content.contains('\x0c') {
            content.split('\x0c').map(str::to_string).collect()
        } else {
            let lines: Vec<&str> = content.lines().collect();
            lines
                .chunks(LINES_PER_PAGE)
                .map(|chunk| chunk.join("\n"))
                .collect()
        };

        Self {
            path: path.to_path_buf(),
            pages: if pages.is_empty() {
                vec![String::new()]
            } else {
                pages
            },
            current_page: 1,
        }
    }
}

impl DocumentViewer for PlainTextViewer {
    fn kind(&self) -> ViewerKind {
        ViewerKind::PlainText
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn current_page(&self) -> usize {
        self.current_page
    }

    fn goto_page(&mut self, page: usize) -> bool {
        let clamped = page.clamp(1, self.page_count());
        if clamped == self.current_page {
            return false;
        }
        self.current_page = clamped;
        true
    }

    fn page_lines(&self) -> Vec<String> {
        self.pages
            .get(self.current_page - 1)
            .map(|page| page.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_feed_pages() {
        let mut viewer = PlainTextViewer::from_text(Path::new("a.txt"), "first\nline\x0csecond");
        assert_eq!(viewer.page_count(), 2);
        assert_eq!(viewer.page_lines(), vec!["first", "line"]);

        assert!(viewer.goto_page(2));
        assert_eq!(viewer.page_lines(), vec!["second"]);
        assert!(!viewer.goto_page(2));
    }

    #[test]
    fn test_goto_page_is_clamped() {
        let mut viewer = PlainTextViewer::from_text(Path::new("a.txt"), "a\x0cb\x0cc");
        assert!(viewer.goto_page(99));
        assert_eq!(viewer.current_page(), 3);
        assert!(viewer.goto_page(0));
        assert_eq!(viewer.current_page(), 1);
    }

    #[test]
    fn test_long_text_without_form_feeds() {
        let content: String = (0..120).map(|i| format!("line {i}\n")).collect();
        let viewer = PlainTextViewer::from_text(Path::new("a.txt"), &content);
        assert_eq!(viewer.page_count(), 3);

        let empty = PlainTextViewer::from_text(Path::new("a.txt"), "");
        assert_eq!(empty.page_count(), 1);
    }
}
