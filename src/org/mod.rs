//! Org-style outline documents: the notes side of a session.

mod document;
mod parser;

pub use document::{MarkerId, OrgDocument, ReadOnlySpan};
pub use parser::{Headline, Property, PropertyDrawer, parse_headlines};
