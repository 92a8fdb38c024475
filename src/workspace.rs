//! Platform surfaces: viewer and notes surfaces, the display groups pairing
//! them, and the queue of notifications they raise.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use log::debug;

use crate::org::{MarkerId, OrgDocument};
use crate::viewer::DocumentViewer;

/// A notes document shared by every surface showing it.
pub type SharedDocument = Rc<RefCell<OrgDocument>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceEvent {
    PageChanged { viewer: SurfaceId, page: usize },
    SurfaceClosed(SurfaceId),
    GroupClosed(GroupId),
}

/// One view onto a notes document, with its own point and folding.
///
/// Positions live as markers in the document, so edits made through any
/// other surface keep them on the same text.
#[derive(Debug)]
pub struct NotesSurface {
    document: SharedDocument,
    point: MarkerId,
    scroll_anchor: MarkerId,
    expanded: Vec<MarkerId>,
}

impl NotesSurface {
    pub fn new(document: SharedDocument) -> Self {
        let (point, scroll_anchor) = {
            let mut doc = document.borrow_mut();
            (doc.create_marker(0, false), doc.create_marker(0, false))
        };
        Self {
            document,
            point,
            scroll_anchor,
            expanded: Vec::new(),
        }
    }

    pub fn document(&self) -> &SharedDocument {
        &self.document
    }

    pub fn point(&self) -> usize {
        self.document.borrow().marker(self.point).unwrap_or(0)
    }

    pub fn set_point(&mut self, point: usize) {
        self.document.borrow_mut().set_marker(self.point, point);
    }

    /// Offset the display starts scrolling from.
    pub fn scroll_anchor(&self) -> usize {
        self.document.borrow().marker(self.scroll_anchor).unwrap_or(0)
    }

    pub fn set_scroll_anchor(&mut self, anchor: usize) {
        self.document.borrow_mut().set_marker(self.scroll_anchor, anchor);
    }

    pub fn is_expanded(&self, heading_begin: usize) -> bool {
        let doc = self.document.borrow();
        self.expanded
            .iter()
            .any(|id| doc.marker(*id) == Some(heading_begin))
    }

    pub fn expand(&mut self, heading_begin: usize) {
        if !self.is_expanded(heading_begin) {
            // Advancing, so a heading inserted in front does not take over the mark
            let id = self.document.borrow_mut().create_marker(heading_begin, true);
            self.expanded.push(id);
        }
    }

    /// Moves the point `delta` lines down (negative: up), keeping the column when possible.
    pub fn move_lines(&mut self, delta: isize) {
        let new_point = {
            let doc = self.document.borrow();
            let text = doc.text();
            let point = doc.marker(self.point).unwrap_or(0);

            let line_start = text[..point].rfind('\n').map(|i| i + 1).unwrap_or(0);
            let column = point - line_start;

            let mut target = line_start;
            if delta >= 0 {
                for _ in 0..delta {
                    match text[target..].find('\n') {
                        Some(i) => target += i + 1,
                        None => break,
                    }
                }
            } else {
                for _ in 0..delta.unsigned_abs() {
                    if target == 0 {
                        break;
                    }
                    target = text[..target - 1].rfind('\n').map(|i| i + 1).unwrap_or(0);
                }
            }

            let line_end = text[target..]
                .find('\n')
                .map(|i| target + i)
                .unwrap_or(text.len());
            doc.snap_to_boundary((target + column).min(line_end))
        };
        self.set_point(new_point);
    }
}

impl Drop for NotesSurface {
    fn drop(&mut self) {
        if let Ok(mut doc) = self.document.try_borrow_mut() {
            doc.release_marker(self.point);
            doc.release_marker(self.scroll_anchor);
            for id in self.expanded.drain(..) {
                doc.release_marker(id);
            }
        }
    }
}

enum Surface {
    Viewer(Box<dyn DocumentViewer>),
    Notes(NotesSurface),
}

/// A viewer surface and a notes surface shown together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayGroup {
    pub viewer: SurfaceId,
    pub notes: SurfaceId,
}

#[derive(Default)]
pub struct Workspace {
    next_id: u64,
    surfaces: BTreeMap<SurfaceId, Surface>,
    groups: BTreeMap<GroupId, DisplayGroup>,
    selected: Option<SurfaceId>,
    page_hook: bool,
    events: VecDeque<WorkspaceEvent>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn open_notes(&mut self, document: SharedDocument) -> SurfaceId {
        let id = SurfaceId(self.next_id());
        self.surfaces
            .insert(id, Surface::Notes(NotesSurface::new(document)));
        id
    }

    pub fn add_viewer(&mut self, viewer: Box<dyn DocumentViewer>) -> SurfaceId {
        let id = SurfaceId(self.next_id());
        self.surfaces.insert(id, Surface::Viewer(viewer));
        id
    }

    pub fn create_group(&mut self, viewer: SurfaceId, notes: SurfaceId) -> GroupId {
        let id = GroupId(self.next_id());
        self.groups.insert(id, DisplayGroup { viewer, notes });
        id
    }

    pub fn close_surface(&mut self, id: SurfaceId) {
        if self.surfaces.remove(&id).is_some() {
            debug!("Closed surface {id:?}");
            if self.selected == Some(id) {
                self.selected = None;
            }
            self.events.push_back(WorkspaceEvent::SurfaceClosed(id));
        }
    }

    pub fn close_group(&mut self, id: GroupId) {
        if self.groups.remove(&id).is_some() {
            debug!("Closed display group {id:?}");
            self.events.push_back(WorkspaceEvent::GroupClosed(id));
        }
    }

    pub fn is_surface_live(&self, id: SurfaceId) -> bool {
        self.surfaces.contains_key(&id)
    }

    pub fn is_group_live(&self, id: GroupId) -> bool {
        self.groups.contains_key(&id)
    }

    pub fn group(&self, id: GroupId) -> Option<DisplayGroup> {
        self.groups.get(&id).copied()
    }

    pub fn group_of(&self, surface: SurfaceId) -> Option<GroupId> {
        self.groups
            .iter()
            .find(|(_, group)| group.viewer == surface || group.notes == surface)
            .map(|(id, _)| *id)
    }

    pub fn notes(&self, id: SurfaceId) -> Option<&NotesSurface> {
        match self.surfaces.get(&id) {
            Some(Surface::Notes(notes)) => Some(notes),
            _ => None,
        }
    }

    pub fn notes_mut(&mut self, id: SurfaceId) -> Option<&mut NotesSurface> {
        match self.surfaces.get_mut(&id) {
            Some(Surface::Notes(notes)) => Some(notes),
            _ => None,
        }
    }

    pub fn viewer(&self, id: SurfaceId) -> Option<&dyn DocumentViewer> {
        match self.surfaces.get(&id) {
            Some(Surface::Viewer(viewer)) => Some(viewer.as_ref()),
            _ => None,
        }
    }

    pub fn viewer_mut(&mut self, id: SurfaceId) -> Option<&mut (dyn DocumentViewer + 'static)> {
        match self.surfaces.get_mut(&id) {
            Some(Surface::Viewer(viewer)) => Some(viewer.as_mut()),
            _ => None,
        }
    }

    pub fn select(&mut self, id: SurfaceId) {
        if self.is_surface_live(id) {
            self.selected = Some(id);
        }
    }

    pub fn selected(&self) -> Option<SurfaceId> {
        self.selected
    }

    /// Installs or removes the page-change observer.
    pub fn set_page_hook(&mut self, installed: bool) {
        if self.page_hook != installed {
            debug!("Page change hook {}", if installed { "installed" } else { "removed" });
        }
        self.page_hook = installed;
    }

    pub fn page_hook_installed(&self) -> bool {
        self.page_hook
    }

    /// Moves a viewer to `page`. A change is announced when the hook is installed.
    /// Returns `None` when `viewer` is not a live viewer surface.
    pub fn goto_page(&mut self, viewer: SurfaceId, page: usize) -> Option<bool> {
        let surface = self.viewer_mut(viewer)?;
        let changed = surface.goto_page(page);
        let current = surface.current_page();
        if changed && self.page_hook {
            self.events.push_back(WorkspaceEvent::PageChanged {
                viewer,
                page: current,
            });
        }
        Some(changed)
    }

    pub fn next_event(&mut self) -> Option<WorkspaceEvent> {
        self.events.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::PlainTextViewer;
    use std::path::Path;

    fn viewer() -> Box<dyn DocumentViewer> {
        Box::new(PlainTextViewer::from_text(Path::new("a.txt"), "1\x0c2\x0c3"))
    }

    fn document(text: &str) -> SharedDocument {
        Rc::new(RefCell::new(OrgDocument::from_text(text)))
    }

    #[test]
    fn test_page_change_is_announced_only_with_hook() {
        let mut ws = Workspace::new();
        let id = ws.add_viewer(viewer());

        assert_eq!(ws.goto_page(id, 2), Some(true));
        assert_eq!(ws.next_event(), None);

        ws.set_page_hook(true);
        assert_eq!(ws.goto_page(id, 3), Some(true));
        assert_eq!(ws.goto_page(id, 3), Some(false));
        assert_eq!(
            ws.next_event(),
            Some(WorkspaceEvent::PageChanged { viewer: id, page: 3 })
        );
        assert_eq!(ws.next_event(), None);
    }

    #[test]
    fn test_closing_raises_notifications() {
        let mut ws = Workspace::new();
        let viewer = ws.add_viewer(viewer());
        let notes = ws.open_notes(document("* A\n"));
        let group = ws.create_group(viewer, notes);
        ws.select(notes);

        ws.close_surface(notes);
        ws.close_group(group);
        ws.close_surface(notes);

        assert!(!ws.is_surface_live(notes));
        assert!(!ws.is_group_live(group));
        assert_eq!(ws.selected(), None);
        assert_eq!(ws.next_event(), Some(WorkspaceEvent::SurfaceClosed(notes)));
        assert_eq!(ws.next_event(), Some(WorkspaceEvent::GroupClosed(group)));
        assert_eq!(ws.next_event(), None);
        assert_eq!(ws.goto_page(notes, 1), None);
    }

    #[test]
    fn test_notes_surfaces_share_document() {
        let mut ws = Workspace::new();
        let doc = document("* A\n");
        let first = ws.open_notes(doc.clone());
        let second = ws.open_notes(doc);

        ws.notes(first)
            .unwrap()
            .document()
            .borrow_mut()
            .insert(4, "body\n")
            .unwrap();
        assert_eq!(
            ws.notes(second).unwrap().document().borrow().text(),
            "* A\nbody\n"
        );
        assert_eq!(ws.group_of(first), None);
    }

    #[test]
    fn test_positions_follow_edits_from_another_surface() {
        let text = "* Café\nété à la plage\n* Suite\n";
        let doc = document(text);
        let mut ws = Workspace::new();
        let main = ws.open_notes(doc.clone());
        let other = ws.open_notes(doc.clone());

        let point = text.find("la plage").unwrap();
        let suite = text.find("* Suite").unwrap();
        {
            let surface = ws.notes_mut(main).unwrap();
            surface.set_point(point);
            surface.set_scroll_anchor(point);
            surface.expand(suite);
        }

        let inserted = "** Notes for page 1\n";
        ws.notes(other)
            .unwrap()
            .document()
            .borrow_mut()
            .insert(text.find("été").unwrap(), inserted)
            .unwrap();

        let surface = ws.notes_mut(main).unwrap();
        assert_eq!(surface.point(), point + inserted.len());
        assert_eq!(surface.scroll_anchor(), point + inserted.len());
        assert!(surface.is_expanded(suite + inserted.len()));
        assert!(!surface.is_expanded(suite));

        let edited = doc.borrow().text().to_string();
        surface.move_lines(1);
        assert!(edited[..surface.point()].ends_with("* Suite"));
        // Column 7 falls inside 'à' and snaps back onto it
        surface.move_lines(-1);
        assert!(edited[surface.point()..].starts_with("à la plage"));
    }

    #[test]
    fn test_expanded_heading_survives_insert_in_front() {
        let doc = document("* A\n* B\n");
        let mut surface = NotesSurface::new(doc.clone());
        surface.expand(4);
        doc.borrow_mut().insert(4, "* New\n").unwrap();
        assert!(surface.is_expanded(10));
        assert!(!surface.is_expanded(4));
    }

    #[test]
    fn test_closed_surface_releases_its_markers() {
        let doc = document("* A\n");
        let first_slot = {
            let mut d = doc.borrow_mut();
            let id = d.create_marker(0, false);
            d.release_marker(id);
            id
        };
        let mut ws = Workspace::new();
        let id = ws.open_notes(doc.clone());
        ws.notes_mut(id).unwrap().expand(0);
        ws.close_surface(id);

        let mut d = doc.borrow_mut();
        let reused: Vec<_> = (0..3).map(|_| d.create_marker(0, false)).collect();
        assert!(reused.contains(&first_slot));
    }

    #[test]
    fn test_move_lines_keeps_column() {
        let mut surface = NotesSurface::new(document("* One\nab\n* Three\n"));
        surface.set_point(3);
        surface.move_lines(1);
        assert_eq!(surface.point(), 8);
        surface.move_lines(1);
        assert_eq!(surface.point(), 11);
        surface.move_lines(-2);
        assert_eq!(surface.point(), 2);
        surface.move_lines(-5);
        assert_eq!(surface.point(), 2);
    }
}
