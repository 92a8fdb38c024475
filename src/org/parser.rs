//! Headline and property drawer parsing for Org-style outlines.
//!
//! Offsets are byte offsets into the document text. Every structural
//! element starts at a line boundary, so the offsets are always valid
//! char boundaries.

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

static HEADLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\*+)(?:[ \t]+(.*?))?[ \t]*$").expect("headline regex is valid")
});

static PROPERTY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ \t]*:([^:\s]+):(?:[ \t]+(.*?))?[ \t]*$").expect("property regex is valid")
});

/// A `:KEY: value` entry of a property drawer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub key: String,
    pub value: String,
    /// The whole entry line, newline excluded.
    pub line: Range<usize>,
    /// Where the value sits; empty at the line end when the entry has no value.
    pub value_range: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDrawer {
    /// Start of the `:PROPERTIES:` line.
    pub begin: usize,
    /// Start of the `:END:` line.
    pub end_line: usize,
    /// Just past the `:END:` line and the blank lines following it.
    pub end: usize,
    pub properties: Vec<Property>,
}

impl PropertyDrawer {
    pub fn get(&self, name: &str) -> Option<&Property> {
        self.properties
            .iter()
            .find(|p| p.key.eq_ignore_ascii_case(name))
    }
}

/// A heading and the extent of the text it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Headline {
    pub level: usize,
    pub title: String,
    pub begin: usize,
    /// End of the heading line, newline excluded.
    pub line_end: usize,
    /// First non-blank line after the heading line, if the heading has content.
    pub contents_begin: Option<usize>,
    /// Start of the first following heading of any level.
    pub section_end: usize,
    /// Start of the next heading at the same or a shallower level.
    pub end: usize,
    pub drawer: Option<PropertyDrawer>,
}

impl Headline {
    pub fn property(&self, name: &str) -> Option<&str> {
        self.drawer
            .as_ref()
            .and_then(|drawer| drawer.get(name))
            .map(|p| p.value.as_str())
    }

    pub fn contains(&self, pos: usize) -> bool {
        self.begin <= pos && pos < self.end
    }

    /// Offset of the line after the heading line.
    pub fn body_begin(&self) -> usize {
        (self.line_end + 1).min(self.end)
    }
}

struct Line<'a> {
    start: usize,
    end: usize,
    next: usize,
    text: &'a str,
}

impl Line<'_> {
    fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

fn split_lines(text: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut start = 0;
    for chunk in text.split_inclusive('\n') {
        let body = chunk.strip_suffix('\n').unwrap_or(chunk);
        lines.push(Line {
            start,
            end: start + body.len(),
            next: start + chunk.len(),
            text: body,
        });
        start += chunk.len();
    }
    lines
}

/// Parses every headline of `text` in document order.
pub fn parse_headlines(text: &str) -> Vec<Headline> {
    let lines = split_lines(text);

    let heads: Vec<(usize, usize, String)> = lines
        .iter()
        .enumerate()
        .filter_map(|(idx, line)| {
            let caps = HEADLINE_RE.captures(line.text)?;
            let level = caps.get(1)?.as_str().len();
            let title = caps
                .get(2)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            Some((idx, level, title))
        })
        .collect();

    let mut headlines = Vec::with_capacity(heads.len());
    for (k, (line_idx, level, title)) in heads.iter().enumerate() {
        let line = &lines[*line_idx];

        let end = heads[k + 1..]
            .iter()
            .find(|(_, other_level, _)| other_level <= level)
            .map(|(idx, _, _)| lines[*idx].start)
            .unwrap_or(text.len());
        let section_end = heads
            .get(k + 1)
            .map(|(idx, _, _)| lines[*idx].start)
            .unwrap_or(text.len());

        let contents_begin = lines[line_idx + 1..]
            .iter()
            .take_while(|l| l.start < end)
            .find(|l| !l.is_blank())
            .map(|l| l.start);

        let drawer = parse_drawer(&lines, line_idx + 1, section_end);

        headlines.push(Headline {
            level: *level,
            title: title.clone(),
            begin: line.start,
            line_end: line.end,
            contents_begin,
            section_end,
            end,
            drawer,
        });
    }

    headlines
}

fn parse_drawer(lines: &[Line<'_>], first: usize, section_end: usize) -> Option<PropertyDrawer> {
    let opening = lines.get(first)?;
    if opening.start >= section_end || !opening.text.trim().eq_ignore_ascii_case(":PROPERTIES:") {
        return None;
    }

    let mut properties = Vec::new();
    let mut idx = first + 1;
    while let Some(line) = lines.get(idx) {
        if line.start >= section_end {
            return None;
        }
        if line.text.trim().eq_ignore_ascii_case(":END:") {
            let mut end = line.next;
            for blank in lines[idx + 1..]
                .iter()
                .take_while(|l| l.start < section_end && l.is_blank())
            {
                end = blank.next;
            }
            return Some(PropertyDrawer {
                begin: opening.start,
                end_line: line.start,
                end: end.min(section_end),
                properties,
            });
        }
        if let Some(caps) = PROPERTY_RE.captures(line.text) {
            let key = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
            let (value, value_range) = match caps.get(2) {
                Some(m) => (m.as_str().to_string(), line.start + m.start()..line.start + m.end()),
                None => (String::new(), line.end..line.end),
            };
            properties.push(Property {
                key,
                value,
                line: line.start..line.end,
                value_range,
            });
        }
        idx += 1;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTES: &str = "\
#+TITLE: Reading
* Paper
:PROPERTIES:
:DOC_FILE: paper.pdf
:END:

** Intro
:PROPERTIES:
:DOC_NOTE_PAGE: 2
:END:
Some text

*** Detail
** Method
* Other
";

    #[test]
    fn test_headline_levels_and_spans() {
        let heads = parse_headlines(NOTES);
        let titles: Vec<_> = heads.iter().map(|h| (h.level, h.title.as_str())).collect();
        assert_eq!(
            titles,
            vec![(1, "Paper"), (2, "Intro"), (3, "Detail"), (2, "Method"), (1, "Other")]
        );

        let paper = &heads[0];
        assert_eq!(paper.end, heads[4].begin);
        assert_eq!(paper.section_end, heads[1].begin);

        let intro = &heads[1];
        assert_eq!(intro.end, heads[3].begin);
        assert_eq!(intro.section_end, heads[2].begin);
        assert_eq!(heads[4].end, NOTES.len());
    }

    #[test]
    fn test_property_drawer() {
        let heads = parse_headlines(NOTES);
        let paper = &heads[0];
        assert_eq!(paper.property("DOC_FILE"), Some("paper.pdf"));
        assert_eq!(paper.property("doc_file"), Some("paper.pdf"));
        assert_eq!(paper.property("DOC_NOTE_PAGE"), None);

        let drawer = paper.drawer.as_ref().unwrap();
        assert_eq!(&NOTES[drawer.end_line..drawer.end_line + 5], ":END:");
        // Trailing blank line belongs to the drawer
        assert_eq!(drawer.end, heads[1].begin);
        assert_eq!(heads[1].property("DOC_NOTE_PAGE"), Some("2"));
    }

    #[test]
    fn test_contents_begin() {
        let heads = parse_headlines(NOTES);
        let method = &heads[3];
        assert_eq!(method.contents_begin, None);
        let intro = &heads[1];
        assert_eq!(intro.contents_begin, Some(intro.body_begin()));
    }

    #[test]
    fn test_drawer_must_follow_heading_line() {
        let text = "* A\n\n:PROPERTIES:\n:X: 1\n:END:\n";
        let heads = parse_headlines(text);
        assert!(heads[0].drawer.is_none());
    }

    #[test]
    fn test_unterminated_drawer_is_ignored() {
        let text = "* A\n:PROPERTIES:\n:X: 1\n* B\n:END:\n";
        let heads = parse_headlines(text);
        assert!(heads[0].drawer.is_none());
    }

    #[test]
    fn test_bold_text_is_not_a_heading() {
        let heads = parse_headlines("*bold* line\n* Real\n");
        assert_eq!(heads.len(), 1);
        assert_eq!(heads[0].title, "Real");
    }

    #[test]
    fn test_empty_property_value() {
        let text = "* A\n:PROPERTIES:\n:EMPTY:\n:END:\n";
        let heads = parse_headlines(text);
        let drawer = heads[0].drawer.as_ref().unwrap();
        let prop = drawer.get("EMPTY").unwrap();
        assert_eq!(prop.value, "");
        assert!(prop.value_range.is_empty());
    }
}
