//! Outline tree accessor: locating the session root inside the notes and
//! reading it back as a tree of headings.

use log::debug;

use crate::error::OrgError;
use crate::org::{Headline, OrgDocument};

/// A heading together with the headings nested directly below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineNode {
    pub headline: Headline,
    pub children: Vec<OutlineNode>,
}

impl OutlineNode {
    pub fn level(&self) -> usize {
        self.headline.level
    }

    pub fn begin(&self) -> usize {
        self.headline.begin
    }

    pub fn end(&self) -> usize {
        self.headline.end
    }

    pub fn title(&self) -> &str {
        &self.headline.title
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.headline.property(name)
    }

    fn build(headlines: &[Headline]) -> Vec<OutlineNode> {
        let mut nodes = Vec::new();
        let mut idx = 0;
        while let Some(head) = headlines.get(idx) {
            let nested = headlines[idx + 1..]
                .iter()
                .take_while(|h| h.begin < head.end)
                .count();
            nodes.push(OutlineNode {
                headline: head.clone(),
                children: Self::build(&headlines[idx + 1..idx + 1 + nested]),
            });
            idx += 1 + nested;
        }
        nodes
    }
}

/// Reads `headline` and everything nested under it.
pub fn subtree(doc: &OrgDocument, headline: &Headline) -> OutlineNode {
    let nested: Vec<Headline> = doc
        .headlines()
        .into_iter()
        .filter(|h| h.begin > headline.begin && h.begin < headline.end)
        .collect();
    OutlineNode {
        headline: headline.clone(),
        children: OutlineNode::build(&nested),
    }
}

/// Finds the heading whose `doc_property` equals `identity`.
///
/// The heading at `point` and its ancestors are tried first, nearest one
/// winning; otherwise the first match in the whole document is used.
pub fn parse_root(
    doc: &OrgDocument,
    point: usize,
    doc_property: &str,
    identity: &str,
) -> Option<OutlineNode> {
    let mut current = doc.headline_at(point);
    while let Some(headline) = current {
        if headline.property(doc_property) == Some(identity) {
            return Some(subtree(doc, &headline));
        }
        current = doc.parent_of(&headline);
    }

    let begin = doc.find_first_with_property(doc_property, identity)?;
    debug!("Session root not above point {point}, using global match at {begin}");
    doc.headline_starting_at(begin)
        .ok()
        .map(|headline| subtree(doc, &headline))
}

/// End of the heading's metadata block.
///
/// Without a property drawer this is where the contents start. With one,
/// it is the drawer end including trailing blank lines, unless `force_trim`
/// is set or nothing follows the drawer in the section: then the offset is
/// backed up to sit right after the closing `:END:`.
pub fn properties_end(text: &str, headline: &Headline, force_trim: bool) -> usize {
    let Some(drawer) = &headline.drawer else {
        return headline.contents_begin.unwrap_or(headline.line_end);
    };

    let mut end = drawer.end;
    if force_trim || headline.section_end == drawer.end {
        let bytes = text.as_bytes();
        while end > drawer.begin && bytes[end - 1] != b':' {
            end -= 1;
        }
    }
    end
}

/// Inserts a heading titled `title` at `pos` and brings it to exactly `level`.
pub fn insert_heading(
    doc: &mut OrgDocument,
    pos: usize,
    level: usize,
    title: &str,
) -> Result<usize, OrgError> {
    let begin = doc.insert_heading_at(pos, title)?;
    let current = doc.headline_starting_at(begin)?.level;

    for _ in 0..current.abs_diff(level) {
        if current < level {
            doc.demote(begin)?;
        } else {
            doc.promote(begin)?;
        }
    }
    Ok(begin)
}
