use std::fs;
use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};

use log::debug;

use super::parser::{Headline, parse_headlines};
use crate::error::OrgError;

/// A protected stretch of text.
///
/// Sticky ends reject insertions made exactly at that boundary; a
/// non-sticky end lets text be added there without growing the span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOnlySpan {
    pub range: Range<usize>,
    pub front_sticky: bool,
    pub rear_sticky: bool,
}

/// Handle to a position that follows edits of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerId(usize);

#[derive(Debug, Clone, Copy)]
struct Marker {
    pos: usize,
    /// Moves past text inserted exactly at `pos`.
    advances: bool,
}

/// An Org outline held in memory, optionally backed by a file.
#[derive(Debug, Clone, Default)]
pub struct OrgDocument {
    path: Option<PathBuf>,
    text: String,
    read_only: Vec<ReadOnlySpan>,
    markers: Vec<Option<Marker>>,
    modified: bool,
}

impl OrgDocument {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            path: None,
            text: text.into(),
            read_only: Vec::new(),
            markers: Vec::new(),
            modified: false,
        }
    }

    /// Opens the notes file at `path`; a missing file yields an empty document bound to it.
    pub fn open(path: &Path) -> io::Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e),
        };
        Ok(Self {
            path: Some(path.to_path_buf()),
            text,
            read_only: Vec::new(),
            markers: Vec::new(),
            modified: false,
        })
    }

    pub fn save(&mut self) -> io::Result<()> {
        let Some(path) = &self.path else {
            return Err(io::Error::other("notes are not backed by a file"));
        };
        fs::write(path, &self.text)?;
        debug!("Saved notes to {path:?}");
        self.modified = false;
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn set_modified(&mut self, modified: bool) {
        self.modified = modified;
    }

    pub fn headlines(&self) -> Vec<Headline> {
        parse_headlines(&self.text)
    }

    /// The heading `pos` belongs to: the nearest heading line at or before it.
    pub fn headline_at(&self, pos: usize) -> Option<Headline> {
        self.headlines().into_iter().rev().find(|h| h.begin <= pos)
    }

    pub fn headline_starting_at(&self, begin: usize) -> Result<Headline, OrgError> {
        self.headlines()
            .into_iter()
            .find(|h| h.begin == begin)
            .ok_or(OrgError::NoHeading(begin))
    }

    pub fn parent_of(&self, headline: &Headline) -> Option<Headline> {
        self.headlines()
            .into_iter()
            .rev()
            .find(|h| h.begin < headline.begin && h.level < headline.level && h.end >= headline.end)
    }

    /// Start of the first heading whose `name` property equals `value`.
    pub fn find_first_with_property(&self, name: &str, value: &str) -> Option<usize> {
        self.headlines()
            .into_iter()
            .find(|h| h.property(name) == Some(value))
            .map(|h| h.begin)
    }

    pub fn insert(&mut self, pos: usize, text: &str) -> Result<(), OrgError> {
        if !self.can_insert_at(pos) {
            return Err(OrgError::ReadOnly);
        }
        self.text.insert_str(pos, text);
        for span in &mut self.read_only {
            if span.range.start >= pos {
                span.range.start += text.len();
                span.range.end += text.len();
            }
        }
        for marker in self.markers.iter_mut().flatten() {
            if marker.pos > pos || (marker.pos == pos && marker.advances) {
                marker.pos += text.len();
            }
        }
        self.modified = true;
        Ok(())
    }

    pub fn delete(&mut self, range: Range<usize>) -> Result<(), OrgError> {
        if range.is_empty() {
            return Ok(());
        }
        if self.read_only_len(range.clone()) > 0 {
            return Err(OrgError::ReadOnly);
        }
        let removed = range.len();
        self.text.replace_range(range.clone(), "");
        for span in &mut self.read_only {
            if span.range.start >= range.end {
                span.range.start -= removed;
                span.range.end -= removed;
            }
        }
        for marker in self.markers.iter_mut().flatten() {
            if marker.pos >= range.end {
                marker.pos -= removed;
            } else if marker.pos > range.start {
                marker.pos = range.start;
            }
        }
        self.modified = true;
        Ok(())
    }

    fn replace(&mut self, range: Range<usize>, text: &str) -> Result<(), OrgError> {
        if self.read_only_len(range.clone()) > 0 || !self.can_insert_at(range.start) {
            return Err(OrgError::ReadOnly);
        }
        self.delete(range.clone())?;
        self.insert(range.start, text)
    }

    /// Writes `name: value` into the drawer of the heading starting at `begin`,
    /// creating the drawer when the heading has none.
    pub fn set_property(&mut self, begin: usize, name: &str, value: &str) -> Result<(), OrgError> {
        let headline = self.headline_starting_at(begin)?;

        match &headline.drawer {
            Some(drawer) => match drawer.get(name) {
                Some(existing) if existing.value_range.is_empty() => {
                    self.insert(existing.value_range.start, &format!(" {value}"))
                }
                Some(existing) => self.replace(existing.value_range.clone(), value),
                None => self.insert(drawer.end_line, &format!(":{name}: {value}\n")),
            },
            None => self.insert(
                headline.line_end,
                &format!("\n:PROPERTIES:\n:{name}: {value}\n:END:"),
            ),
        }
    }

    /// Inserts a heading titled `title` at `pos` and returns where it starts.
    ///
    /// The new heading takes the level of the heading in effect just before
    /// `pos`. A newline is added in front when `pos` is not at a line start.
    pub fn insert_heading_at(&mut self, pos: usize, title: &str) -> Result<usize, OrgError> {
        let level = match pos {
            0 => 1,
            _ => self.headline_at(pos - 1).map(|h| h.level).unwrap_or(1),
        };
        let bytes = self.text.as_bytes();
        let mid_line = pos > 0 && bytes[pos - 1] != b'\n';

        let mut heading = String::new();
        if mid_line {
            heading.push('\n');
        }
        heading.push_str(&"*".repeat(level));
        heading.push(' ');
        heading.push_str(title);
        if !mid_line || (pos < bytes.len() && bytes[pos] != b'\n') {
            heading.push('\n');
        }

        self.insert(pos, &heading)?;
        Ok(pos + usize::from(mid_line))
    }

    pub fn promote(&mut self, begin: usize) -> Result<(), OrgError> {
        let headline = self.headline_starting_at(begin)?;
        if headline.level <= 1 {
            return Err(OrgError::CannotPromote);
        }
        self.delete(begin..begin + 1)
    }

    pub fn demote(&mut self, begin: usize) -> Result<(), OrgError> {
        self.headline_starting_at(begin)?;
        self.insert(begin, "*")
    }

    /// Protects `range`; this does not count as a modification.
    pub fn mark_read_only(&mut self, range: Range<usize>, front_sticky: bool, rear_sticky: bool) {
        if range.is_empty() {
            return;
        }
        self.clear_read_only(range.clone());
        self.read_only.push(ReadOnlySpan {
            range,
            front_sticky,
            rear_sticky,
        });
        self.read_only.sort_by_key(|span| span.range.start);
    }

    /// Lifts protection from `range`, splitting spans that straddle it.
    pub fn clear_read_only(&mut self, range: Range<usize>) {
        let mut kept = Vec::with_capacity(self.read_only.len());
        for span in self.read_only.drain(..) {
            let before = span.range.start..span.range.end.min(range.start);
            let after = span.range.start.max(range.end)..span.range.end;
            if !before.is_empty() {
                kept.push(ReadOnlySpan {
                    range: before,
                    ..span.clone()
                });
            }
            if !after.is_empty() {
                kept.push(ReadOnlySpan {
                    range: after,
                    ..span
                });
            }
        }
        self.read_only = kept;
    }

    /// Number of protected bytes inside `range`.
    pub fn read_only_len(&self, range: Range<usize>) -> usize {
        self.read_only
            .iter()
            .map(|span| {
                let start = span.range.start.max(range.start);
                let end = span.range.end.min(range.end);
                end.saturating_sub(start)
            })
            .sum()
    }

    pub fn read_only_spans(&self) -> &[ReadOnlySpan] {
        &self.read_only
    }

    /// `pos` clamped to the text and moved back onto a char boundary.
    pub fn snap_to_boundary(&self, pos: usize) -> usize {
        let mut pos = pos.min(self.text.len());
        while !self.text.is_char_boundary(pos) {
            pos -= 1;
        }
        pos
    }

    pub fn create_marker(&mut self, pos: usize, advances: bool) -> MarkerId {
        let marker = Marker {
            pos: self.snap_to_boundary(pos),
            advances,
        };
        match self.markers.iter().position(Option::is_none) {
            Some(slot) => {
                self.markers[slot] = Some(marker);
                MarkerId(slot)
            }
            None => {
                self.markers.push(Some(marker));
                MarkerId(self.markers.len() - 1)
            }
        }
    }

    pub fn marker(&self, id: MarkerId) -> Option<usize> {
        self.markers.get(id.0).copied().flatten().map(|m| m.pos)
    }

    pub fn set_marker(&mut self, id: MarkerId, pos: usize) {
        let pos = self.snap_to_boundary(pos);
        if let Some(Some(marker)) = self.markers.get_mut(id.0) {
            marker.pos = pos;
        }
    }

    pub fn release_marker(&mut self, id: MarkerId) {
        if let Some(slot) = self.markers.get_mut(id.0) {
            *slot = None;
        }
    }

    pub fn can_insert_at(&self, pos: usize) -> bool {
        !self.read_only.iter().any(|span| {
            (span.range.start < pos && pos < span.range.end)
                || (pos == span.range.start && span.front_sticky)
                || (pos == span.range.end && span.rear_sticky)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_property_creates_drawer() {
        let mut doc = OrgDocument::from_text("* Book\nbody\n");
        doc.set_property(0, "DOC_FILE", "book.pdf").unwrap();
        assert_eq!(
            doc.text(),
            "* Book\n:PROPERTIES:\n:DOC_FILE: book.pdf\n:END:\nbody\n"
        );
        assert!(doc.is_modified());
        assert_eq!(doc.headlines()[0].property("DOC_FILE"), Some("book.pdf"));
    }

    #[test]
    fn test_set_property_replaces_and_appends() {
        let mut doc = OrgDocument::from_text("* A\n:PROPERTIES:\n:X: 1\n:END:\n");
        doc.set_property(0, "X", "22").unwrap();
        doc.set_property(0, "Y", "3").unwrap();
        assert_eq!(doc.text(), "* A\n:PROPERTIES:\n:X: 22\n:Y: 3\n:END:\n");
    }

    #[test]
    fn test_set_property_at_end_of_text() {
        let mut doc = OrgDocument::from_text("* A");
        doc.set_property(0, "X", "1").unwrap();
        assert_eq!(doc.text(), "* A\n:PROPERTIES:\n:X: 1\n:END:");
    }

    #[test]
    fn test_insert_heading_uses_context_level() {
        let mut doc = OrgDocument::from_text("* A\n** B\n");
        let begin = doc.insert_heading_at(doc.len(), "C").unwrap();
        assert_eq!(&doc.text()[begin..], "** C\n");

        let mut doc = OrgDocument::from_text("* A\n:PROPERTIES:\n:X: 1\n:END:\nrest\n");
        let pos = doc.text().find(":END:").unwrap() + 5;
        let begin = doc.insert_heading_at(pos, "New").unwrap();
        assert_eq!(doc.text(), "* A\n:PROPERTIES:\n:X: 1\n:END:\n* New\nrest\n");
        assert_eq!(&doc.text()[begin..begin + 5], "* New");
    }

    #[test]
    fn test_promote_and_demote() {
        let mut doc = OrgDocument::from_text("* A\n** B\n");
        doc.demote(4).unwrap();
        assert_eq!(doc.text(), "* A\n*** B\n");
        doc.promote(4).unwrap();
        doc.promote(4).unwrap();
        assert_eq!(doc.text(), "* A\n* B\n");
        assert_eq!(doc.promote(4), Err(OrgError::CannotPromote));
        assert_eq!(doc.demote(1), Err(OrgError::NoHeading(1)));
    }

    #[test]
    fn test_read_only_rejects_edits_inside() {
        let mut doc = OrgDocument::from_text("0123456789");
        doc.mark_read_only(2..6, false, false);
        assert!(!doc.is_modified());

        assert_eq!(doc.insert(4, "x"), Err(OrgError::ReadOnly));
        assert_eq!(doc.delete(5..7), Err(OrgError::ReadOnly));
        assert!(doc.insert(2, "a").is_ok());
        assert!(doc.insert(7, "b").is_ok());
        assert_eq!(doc.text(), "01a2345b6789");
        assert_eq!(doc.read_only_spans()[0].range, 3..7);
    }

    #[test]
    fn test_read_only_stickiness() {
        let mut doc = OrgDocument::from_text("abcdef");
        doc.mark_read_only(1..3, true, false);
        doc.mark_read_only(3..5, false, true);
        assert!(!doc.can_insert_at(1));
        assert!(doc.can_insert_at(3));
        assert!(!doc.can_insert_at(5));
        assert!(doc.can_insert_at(0));
    }

    #[test]
    fn test_clear_read_only_splits_spans() {
        let mut doc = OrgDocument::from_text("0123456789");
        doc.mark_read_only(0..10, false, false);
        doc.clear_read_only(3..5);
        assert_eq!(doc.read_only_len(0..10), 8);
        assert_eq!(doc.read_only_len(3..5), 0);
        doc.clear_read_only(0..10);
        assert!(doc.read_only_spans().is_empty());
    }

    #[test]
    fn test_markers_follow_edits() {
        let mut doc = OrgDocument::from_text("* A\nbody\n* B\n");
        let stays = doc.create_marker(4, false);
        let advances = doc.create_marker(4, true);
        let later = doc.create_marker(9, false);

        doc.insert(4, "xyz\n").unwrap();
        assert_eq!(doc.marker(stays), Some(4));
        assert_eq!(doc.marker(advances), Some(8));
        assert_eq!(doc.marker(later), Some(13));

        doc.delete(6..12).unwrap();
        assert_eq!(doc.marker(advances), Some(6));
        assert_eq!(doc.marker(later), Some(7));

        doc.release_marker(stays);
        assert_eq!(doc.marker(stays), None);
        assert_eq!(doc.create_marker(0, false), stays);
    }

    #[test]
    fn test_markers_stay_on_char_boundaries() {
        let mut doc = OrgDocument::from_text("* Ré\n");
        let id = doc.create_marker(4, false);
        assert_eq!(doc.marker(id), Some(3));
        doc.set_marker(id, 100);
        assert_eq!(doc.marker(id), Some(doc.len()));
    }

    #[test]
    fn test_open_missing_file_and_save() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.org");

        let mut doc = OrgDocument::open(&path).unwrap();
        assert!(doc.is_empty());
        doc.insert(0, "* Hello\n").unwrap();
        doc.save().unwrap();
        assert!(!doc.is_modified());
        assert_eq!(fs::read_to_string(&path).unwrap(), "* Hello\n");
    }

    #[test]
    fn test_find_first_with_property_and_parent() {
        let doc = OrgDocument::from_text(
            "* A\n:PROPERTIES:\n:K: v\n:END:\n** B\n*** C\n* D\n:PROPERTIES:\n:K: v\n:END:\n",
        );
        assert_eq!(doc.find_first_with_property("K", "v"), Some(0));
        assert_eq!(doc.find_first_with_property("K", "w"), None);

        let c = doc.headlines().into_iter().find(|h| h.title == "C").unwrap();
        let b = doc.parent_of(&c).unwrap();
        assert_eq!(b.title, "B");
        assert_eq!(doc.parent_of(&b).unwrap().title, "A");
        assert!(doc.parent_of(&doc.headline_at(0).unwrap()).is_none());
    }
}
