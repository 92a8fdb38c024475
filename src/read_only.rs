//! Protection of the session heading and its property block.

use log::debug;

use crate::org::{Headline, OrgDocument};
use crate::outline::properties_end;

/// Makes the root heading line and its properties immutable.
///
/// Text may still be inserted right before the heading and right after the
/// closing `:END:`, so the first note can be added without the protected
/// region growing. The document's modified flag is left as it was.
pub fn protect(doc: &mut OrgDocument, root: &Headline) {
    let modified = doc.is_modified();
    let begin = root.begin;
    let end = properties_end(doc.text(), root, true);

    if end <= begin + 2 {
        doc.mark_read_only(begin..end, false, false);
    } else {
        doc.mark_read_only(begin..begin + 1, false, true);
        doc.mark_read_only(begin + 1..end - 1, true, true);
        doc.mark_read_only(end - 1..end, true, false);
    }
    debug!("Protected notes region {begin}..{end}");

    doc.set_modified(modified);
}

/// Removes every protection from the root heading through its properties.
pub fn unprotect(doc: &mut OrgDocument, root: &Headline) {
    let modified = doc.is_modified();
    let end = properties_end(doc.text(), root, true);
    doc.clear_read_only(root.begin..end);
    debug!("Unprotected notes region {}..{end}", root.begin);
    doc.set_modified(modified);
}
