//! Page↔note resolution over the direct children of a session root.
//!
//! Notes are the root's immediate child headings; nested headings belong to
//! the note that contains them. Every search is one forward pass in
//! document order, so duplicate pages resolve to the first occurrence.

use log::debug;

use crate::outline::OutlineNode;

/// Where a note for a page lives or would be inserted.
#[derive(Debug, Clone, Copy, Default)]
pub struct InsertionPoint<'a> {
    /// The note already keyed by the page.
    pub exact: Option<&'a OutlineNode>,
    /// The last note ordered before the page, to insert after.
    pub preceding: Option<&'a OutlineNode>,
}

pub struct Resolver<'a> {
    root: &'a OutlineNode,
    page_property: &'a str,
}

impl<'a> Resolver<'a> {
    pub fn new(root: &'a OutlineNode, page_property: &'a str) -> Self {
        Self {
            root,
            page_property,
        }
    }

    pub fn root(&self) -> &'a OutlineNode {
        self.root
    }

    fn notes(&self) -> std::slice::Iter<'a, OutlineNode> {
        self.root.children.iter()
    }

    fn raw_page<'n>(&self, note: &'n OutlineNode) -> Option<&'n str> {
        note.property(self.page_property).map(str::trim)
    }

    /// The note's page as a number; values that do not parse are no page.
    pub fn page_of(&self, note: &OutlineNode) -> Option<usize> {
        note.property(self.page_property)?.trim().parse().ok()
    }

    pub fn find_exact(&self, page: usize) -> Option<&'a OutlineNode> {
        let wanted = page.to_string();
        let found = self.notes().find(|note| self.raw_page(note) == Some(wanted.as_str()));
        debug!(
            "Exact note for page {page}: {:?}",
            found.map(|note| note.title())
        );
        found
    }

    pub fn find_insertion_point(&self, page: usize) -> InsertionPoint<'a> {
        let wanted = page.to_string();
        let mut point = InsertionPoint::default();

        for note in self.notes() {
            match self.raw_page(note) {
                Some(value) if value == wanted => {
                    point.exact = Some(note);
                    break;
                }
                None => point.preceding = Some(note),
                Some(value) => {
                    // Unparsable values order as page 0
                    if value.parse::<usize>().unwrap_or(0) < page {
                        point.preceding = Some(note);
                    }
                }
            }
        }

        debug!(
            "Insertion point for page {page}: exact={:?} preceding={:?}",
            point.exact.map(|note| note.title()),
            point.preceding.map(|note| note.title())
        );
        point
    }

    /// Index of the note containing `cursor`. The last note also owns its end offset.
    fn enclosing_index(&self, cursor: usize) -> Option<usize> {
        let children = &self.root.children;
        children
            .iter()
            .position(|note| note.begin() <= cursor && cursor < note.end())
            .or_else(|| {
                let last = children.last()?;
                (last.begin() <= cursor && cursor <= last.end()).then(|| children.len() - 1)
            })
    }

    pub fn enclosing_note(&self, cursor: usize) -> Option<&'a OutlineNode> {
        self.enclosing_index(cursor)
            .and_then(|idx| self.root.children.get(idx))
    }

    pub fn enclosing_page_of(&self, cursor: usize) -> Option<usize> {
        self.enclosing_note(cursor).and_then(|note| self.page_of(note))
    }

    /// Page of the last note before the one containing `cursor`.
    /// A cursor past the root's subtree has no previous note.
    pub fn previous_page_of(&self, cursor: usize) -> Option<usize> {
        if cursor > self.root.end() {
            return None;
        }
        let stop = self.enclosing_index(cursor);
        let mut previous = None;
        for (idx, note) in self.notes().enumerate() {
            if Some(idx) == stop || note.begin() > cursor {
                break;
            }
            if let Some(page) = self.page_of(note) {
                previous = Some(page);
            }
        }
        previous
    }

    /// Page of the first note starting after `cursor`.
    pub fn next_page_of(&self, cursor: usize) -> Option<usize> {
        self.notes()
            .filter(|note| note.begin() > cursor)
            .find_map(|note| self.page_of(note))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::org::OrgDocument;
    use crate::outline::parse_root;

    const PAGE: &str = "DOC_NOTE_PAGE";

    fn notes_with_pages(pages: &[Option<&str>]) -> String {
        let mut text = String::from("* Paper\n:PROPERTIES:\n:DOC_FILE: paper.pdf\n:END:\n");
        for (idx, page) in pages.iter().enumerate() {
            text.push_str(&format!("** Note {idx}\n"));
            if let Some(page) = page {
                text.push_str(&format!(":PROPERTIES:\n:{PAGE}: {page}\n:END:\n"));
            }
            text.push_str(&format!("body {idx}\n"));
        }
        text
    }

    fn root_of(text: &str) -> OutlineNode {
        let doc = OrgDocument::from_text(text);
        parse_root(&doc, 0, "DOC_FILE", "paper.pdf").unwrap()
    }

    #[test]
    fn test_find_exact_returns_first_duplicate() {
        let root = root_of(&notes_with_pages(&[Some("2"), Some("5"), Some("5"), Some("9")]));
        let resolver = Resolver::new(&root, PAGE);

        assert_eq!(resolver.find_exact(5).unwrap().title(), "Note 1");
        assert_eq!(resolver.find_exact(9).unwrap().title(), "Note 3");
        assert!(resolver.find_exact(3).is_none());
    }

    #[test]
    fn test_insertion_point_ordering() {
        let root = root_of(&notes_with_pages(&[Some("2"), Some("5"), Some("9")]));
        let resolver = Resolver::new(&root, PAGE);

        let point = resolver.find_insertion_point(7);
        assert!(point.exact.is_none());
        assert_eq!(point.preceding.unwrap().title(), "Note 1");

        let point = resolver.find_insertion_point(2);
        assert_eq!(point.exact.unwrap().title(), "Note 0");
        assert!(point.preceding.is_none());

        let point = resolver.find_insertion_point(1);
        assert!(point.exact.is_none());
        assert!(point.preceding.is_none());

        let point = resolver.find_insertion_point(12);
        assert_eq!(point.preceding.unwrap().title(), "Note 2");
    }

    #[test]
    fn test_notes_without_page_advance_insertion_point() {
        let root = root_of(&notes_with_pages(&[Some("2"), None, Some("9"), Some("x")]));
        let resolver = Resolver::new(&root, PAGE);

        assert_eq!(resolver.find_insertion_point(1).preceding.unwrap().title(), "Note 3");
        assert_eq!(resolver.find_insertion_point(5).preceding.unwrap().title(), "Note 3");
        assert!(resolver.find_exact(0).is_none());
    }

    #[test]
    fn test_enclosing_page() {
        let text = notes_with_pages(&[Some("2"), Some("5"), Some("9")]);
        let root = root_of(&text);
        let resolver = Resolver::new(&root, PAGE);

        assert_eq!(resolver.enclosing_page_of(text.find("body 1").unwrap()), Some(5));
        assert_eq!(resolver.enclosing_page_of(text.find("** Note 0").unwrap()), Some(2));
        assert_eq!(resolver.enclosing_page_of(text.len()), Some(9));
        assert_eq!(resolver.enclosing_page_of(0), None);
    }

    #[test]
    fn test_previous_and_next_pages() {
        let text = notes_with_pages(&[Some("2"), Some("5"), Some("9")]);
        let root = root_of(&text);
        let resolver = Resolver::new(&root, PAGE);

        let in_middle = text.find("body 1").unwrap();
        assert_eq!(resolver.previous_page_of(in_middle), Some(2));
        assert_eq!(resolver.next_page_of(in_middle), Some(9));

        let in_first = text.find("body 0").unwrap();
        assert_eq!(resolver.previous_page_of(in_first), None);
        assert_eq!(resolver.next_page_of(in_first), Some(5));

        assert_eq!(resolver.previous_page_of(text.len()), Some(5));
        assert_eq!(resolver.next_page_of(text.len()), None);
    }

    #[test]
    fn test_no_previous_note_past_the_root() {
        let mut text = notes_with_pages(&[Some("2"), Some("5")]);
        text.push_str("* Elsewhere\nunrelated text\n");
        let root = root_of(&text);
        let resolver = Resolver::new(&root, PAGE);

        let outside = text.find("unrelated").unwrap();
        assert_eq!(resolver.previous_page_of(outside), None);
        assert_eq!(resolver.next_page_of(outside), None);
        assert_eq!(resolver.previous_page_of(root.end()), Some(2));
    }

    #[test]
    fn test_nested_headings_belong_to_their_note() {
        let text = "* Paper\n:PROPERTIES:\n:DOC_FILE: paper.pdf\n:END:\n\
                    ** One\n:PROPERTIES:\n:DOC_NOTE_PAGE: 1\n:END:\n*** Detail\n:PROPERTIES:\n:DOC_NOTE_PAGE: 7\n:END:\n\
                    ** Two\n:PROPERTIES:\n:DOC_NOTE_PAGE: 3\n:END:\n";
        let root = root_of(text);
        let resolver = Resolver::new(&root, PAGE);

        assert!(resolver.find_exact(7).is_none());
        assert_eq!(resolver.enclosing_page_of(text.find("Detail").unwrap()), Some(1));
        assert_eq!(resolver.next_page_of(text.find("Detail").unwrap()), Some(3));
    }
}
