//! Sync controller: keeps the notes view on the viewer's page and drives the
//! viewer from note navigation.
//!
//! Every command runs to completion, then drains the workspace event queue,
//! so a page change it causes is handled before the next command.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::{debug, info, warn};

use crate::error::{NoterError, NoterResult};
use crate::org::{Headline, OrgDocument};
use crate::outline::{self, OutlineNode};
use crate::prompt::Prompter;
use crate::read_only;
use crate::resolver::Resolver;
use crate::session::{NewSession, SessionId, SessionKeys, SessionRegistry, SyncState};
use crate::settings::{self, RelativePathPolicy, Settings};
use crate::viewer::open_viewer;
use crate::workspace::{SharedDocument, SurfaceId, Workspace, WorkspaceEvent};

/// How `start` picks the root heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartMode {
    /// Nearest heading at or above point carrying the document property.
    #[default]
    SearchAncestors,
    /// Always the heading at point.
    CurrentHeadingOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Previous,
    Current,
    Next,
}

pub struct Noter {
    workspace: Workspace,
    sessions: SessionRegistry,
    settings: Settings,
}

impl Default for Noter {
    fn default() -> Self {
        Self::new()
    }
}

impl Noter {
    /// A controller using the process-wide settings.
    pub fn new() -> Self {
        Self::with_settings(settings::current())
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            workspace: Workspace::new(),
            sessions: SessionRegistry::new(),
            settings,
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn workspace_mut(&mut self) -> &mut Workspace {
        &mut self.workspace
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Opens a notes surface on `document`.
    pub fn open_notes(&mut self, document: OrgDocument) -> SurfaceId {
        self.workspace
            .open_notes(Rc::new(RefCell::new(document)))
    }

    pub fn session_for_surface(&self, surface: SurfaceId) -> Option<SessionId> {
        self.sessions.find_by_surface(surface)
    }

    /// Starts a session rooted at the point of the notes surface `context`,
    /// or focuses the session already covering it.
    pub fn start(
        &mut self,
        context: SurfaceId,
        mode: StartMode,
        prompter: &mut dyn Prompter,
    ) -> NoterResult<SessionId> {
        let (document, point) = {
            let notes = self
                .workspace
                .notes(context)
                .ok_or(NoterError::NotInHeading)?;
            (notes.document().clone(), notes.point())
        };
        let current = document
            .borrow()
            .headline_at(point)
            .ok_or(NoterError::NotInHeading)?;

        if let Some(id) = self.sessions.find_by_surface(context) {
            if self.sessions.ensure_valid(id, &mut self.workspace) {
                self.focus_viewer(id);
                return Ok(id);
            }
        }

        let properties = self.settings.property_names();
        let doc_property = properties.pdf_file_property.clone();
        let root = match mode {
            StartMode::SearchAncestors => {
                find_ancestor_with(&document.borrow(), &current, &doc_property)
            }
            StartMode::CurrentHeadingOnly => current,
        };

        let notes_path = document.borrow().path().map(Path::to_path_buf);
        let notes_dir = notes_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf);

        let stored = root.property(&doc_property).map(str::to_string);
        let (document_path, identity) =
            match stored.as_deref().map(|value| resolve_against(notes_dir.as_deref(), value)) {
                Some(path) if path.is_file() => (path, stored.clone().unwrap_or_default()),
                _ => {
                    let chosen = prompter
                        .read_file_path("Document to annotate: ", notes_dir.as_deref())
                        .ok_or(NoterError::Cancelled)?;
                    let path = resolve_against(notes_dir.as_deref(), &chosen.to_string_lossy());
                    if !path.is_file() {
                        return Err(NoterError::UnreadableDocument(path));
                    }
                    let identity = self.stored_path(&path, notes_dir.as_deref(), prompter);
                    (path, identity)
                }
            };

        if let Some(id) = self.sessions.find_duplicate(&document, &identity) {
            if self.sessions.ensure_valid(id, &mut self.workspace) {
                debug!("Session for {identity} already running, focusing it");
                self.focus_viewer(id);
                return Ok(id);
            }
        }

        let viewer = open_viewer(&document_path)?;
        let viewer_kind = viewer.kind();

        if stored.as_deref() != Some(identity.as_str()) {
            document
                .borrow_mut()
                .set_property(root.begin, &doc_property, &identity)?;
        }
        let root = document.borrow().headline_starting_at(root.begin)?;

        let viewer = self.workspace.add_viewer(viewer);
        let notes = self.workspace.open_notes(document.clone());
        if let Some(surface) = self.workspace.notes_mut(notes) {
            surface.set_point(root.begin);
            surface.expand(root.begin);
        }
        let group = self.workspace.create_group(viewer, notes);

        let id = self.sessions.create(NewSession {
            viewer,
            notes,
            group,
            viewer_kind,
            keys: SessionKeys {
                identity,
                notes_path,
                document_path,
            },
            properties,
            document: document.clone(),
        });

        read_only::protect(&mut document.borrow_mut(), &root);
        self.workspace.set_page_hook(true);
        self.workspace.select(viewer);

        if let Some(page) = self.workspace.viewer(viewer).map(|v| v.current_page()) {
            self.show_page(id, page);
        }
        self.process_events();
        Ok(id)
    }

    /// Adds a note for the viewer's current page, or extends the one that exists.
    pub fn insert_note(
        &mut self,
        context: SurfaceId,
        prompt_for_title: bool,
        prompter: &mut dyn Prompter,
    ) -> NoterResult<()> {
        let id = self.session_for(context, prompter)?;
        let session = self.sessions.get(id).ok_or(NoterError::NoSession)?;
        let page = session
            .current_page(&self.workspace)
            .ok_or(NoterError::NoSession)?;
        let root = session
            .root(&self.workspace)
            .ok_or(NoterError::RootNotFound)?;
        let document = session.document.clone();
        let page_property = session.properties.note_page_property.clone();
        let notes = session.notes;

        let insertion = Resolver::new(&root, &page_property).find_insertion_point(page);
        let point = match insertion.exact {
            Some(note) => {
                let mut doc = document.borrow_mut();
                let pos = note_text_end(doc.text(), &note.headline);
                doc.insert(pos, "\n")?;
                debug!("Extending note for page {page} at {pos}");
                pos + 1
            }
            None => {
                let title = if prompt_for_title {
                    let title = prompter
                        .read_string("Note title: ")
                        .ok_or(NoterError::Cancelled)?;
                    if title.trim().is_empty() {
                        self.settings.heading_title(page)
                    } else {
                        title
                    }
                } else {
                    self.settings.heading_title(page)
                };

                let mut doc = document.borrow_mut();
                let pos = match insertion.preceding {
                    Some(note) => note.end(),
                    None => outline::properties_end(doc.text(), &root.headline, true),
                };
                let begin = outline::insert_heading(&mut doc, pos, root.level() + 1, &title)?;
                doc.set_property(begin, &page_property, &page.to_string())?;
                let heading = doc.headline_starting_at(begin)?;
                let body = outline::properties_end(doc.text(), &heading, true);
                doc.insert(body, "\n")?;
                info!("Inserted note \"{title}\" for page {page}");
                body + 1
            }
        };

        self.show_page(id, page);
        if let Some(surface) = self.workspace.notes_mut(notes) {
            surface.set_point(point);
        }
        self.workspace.select(notes);
        self.process_events();
        Ok(())
    }

    pub fn sync_to_previous(&mut self, context: SurfaceId, prompter: &mut dyn Prompter) -> NoterResult<()> {
        self.sync_to(context, Direction::Previous, prompter)
    }

    pub fn sync_to_current(&mut self, context: SurfaceId, prompter: &mut dyn Prompter) -> NoterResult<()> {
        self.sync_to(context, Direction::Current, prompter)
    }

    pub fn sync_to_next(&mut self, context: SurfaceId, prompter: &mut dyn Prompter) -> NoterResult<()> {
        self.sync_to(context, Direction::Next, prompter)
    }

    fn sync_to(
        &mut self,
        context: SurfaceId,
        direction: Direction,
        prompter: &mut dyn Prompter,
    ) -> NoterResult<()> {
        let id = self.session_for(context, prompter)?;
        let session = self.sessions.get(id).ok_or(NoterError::NoSession)?;
        let root = session
            .root(&self.workspace)
            .ok_or(NoterError::RootNotFound)?;
        let cursor = self
            .workspace
            .notes(session.notes)
            .map(|notes| notes.point())
            .ok_or(NoterError::NoSession)?;
        let viewer = session.viewer;
        let shown = session.current_page(&self.workspace);

        let resolver = Resolver::new(&root, &session.properties.note_page_property);
        let page = match direction {
            Direction::Previous => resolver
                .previous_page_of(cursor)
                .ok_or(NoterError::NoPreviousNote)?,
            Direction::Current => resolver
                .enclosing_page_of(cursor)
                .ok_or(NoterError::NoNoteSelected)?,
            Direction::Next => resolver
                .next_page_of(cursor)
                .ok_or(NoterError::NoNextNote)?,
        };
        debug!("Sync {direction:?} from {cursor} resolved to page {page}");

        if shown == Some(page) {
            self.show_page(id, page);
        } else {
            self.workspace.goto_page(viewer, page);
        }
        self.workspace.select(viewer);
        self.process_events();
        Ok(())
    }

    /// Ends a session. With `disambiguate`, the user always picks which one.
    pub fn kill_session(
        &mut self,
        context: Option<SurfaceId>,
        disambiguate: bool,
        prompter: &mut dyn Prompter,
    ) -> NoterResult<()> {
        let bound = context.and_then(|surface| self.sessions.find_by_surface(surface));
        let id = self.sessions.choose(bound, disambiguate, prompter)?;
        self.sessions.kill(id, &mut self.workspace);
        self.process_events();
        Ok(())
    }

    /// Moves the viewer of the session bound to `surface`.
    pub fn goto_page(&mut self, surface: SurfaceId, page: usize) -> Option<bool> {
        let id = self.sessions.find_by_surface(surface)?;
        if !self.sessions.ensure_valid(id, &mut self.workspace) {
            return None;
        }
        let viewer = self.sessions.get(id)?.viewer;
        let changed = self.workspace.goto_page(viewer, page);
        self.process_events();
        changed
    }

    pub fn handle_event(&mut self, event: WorkspaceEvent) {
        debug!("Handling {event:?}");
        match event {
            WorkspaceEvent::PageChanged { viewer, page } => {
                if let Some(id) = self.sessions.find_by_surface(viewer) {
                    self.show_page(id, page);
                }
            }
            WorkspaceEvent::SurfaceClosed(surface) => {
                if let Some(id) = self.sessions.find_by_surface(surface) {
                    self.sessions.kill(id, &mut self.workspace);
                }
            }
            WorkspaceEvent::GroupClosed(group) => {
                if let Some(id) = self.sessions.find_by_group(group) {
                    self.sessions.kill(id, &mut self.workspace);
                }
            }
        }
    }

    pub fn process_events(&mut self) {
        while let Some(event) = self.workspace.next_event() {
            self.handle_event(event);
        }
    }

    /// Reveals the note for `page`, or leaves the session idle when there is none.
    fn show_page(&mut self, id: SessionId, page: usize) {
        if !self.sessions.ensure_valid(id, &mut self.workspace) {
            return;
        }
        let Some(session) = self.sessions.get(id) else {
            return;
        };
        let Some(root) = session.root(&self.workspace) else {
            warn!("Session root for {} is gone", session.keys.identity);
            return;
        };
        let document = session.document.clone();
        let notes = session.notes;
        let page_property = session.properties.note_page_property.clone();

        let state = match Resolver::new(&root, &page_property).find_exact(page) {
            Some(note) => {
                self.reveal(notes, &document, note);
                SyncState::Synced { page }
            }
            None => SyncState::Idle,
        };

        if let Some(session) = self.sessions.get_mut(id) {
            session.sync = state;
        }
    }

    fn reveal(&mut self, notes: SurfaceId, document: &SharedDocument, note: &OutlineNode) {
        let (ancestors, body) = {
            let doc = document.borrow();
            let mut ancestors = Vec::new();
            let mut current = Some(note.headline.clone());
            while let Some(headline) = current {
                ancestors.push(headline.begin);
                current = doc.parent_of(&headline);
            }
            (ancestors, outline::properties_end(doc.text(), &note.headline, false))
        };
        let Some(surface) = self.workspace.notes_mut(notes) else {
            return;
        };

        for begin in ancestors {
            surface.expand(begin);
        }
        let point = surface.point();
        if !(note.begin() <= point && point < note.end()) {
            surface.set_point(body);
        }
        surface.set_scroll_anchor(note.begin());
    }

    fn session_for(&mut self, context: SurfaceId, prompter: &mut dyn Prompter) -> NoterResult<SessionId> {
        let bound = self.sessions.find_by_surface(context);
        let id = self.sessions.choose(bound, false, prompter)?;
        if !self.sessions.ensure_valid(id, &mut self.workspace) {
            return Err(NoterError::NoSession);
        }
        Ok(id)
    }

    fn focus_viewer(&mut self, id: SessionId) {
        if let Some(viewer) = self.sessions.get(id).map(|s| s.viewer) {
            self.workspace.select(viewer);
        }
    }

    /// The property value to store for `path`.
    fn stored_path(
        &self,
        path: &Path,
        notes_dir: Option<&Path>,
        prompter: &mut dyn Prompter,
    ) -> String {
        let relative = notes_dir.and_then(|dir| path.strip_prefix(dir).ok());
        let use_relative = match (relative, self.settings.relative_path_policy) {
            (None, _) | (_, RelativePathPolicy::Never) => false,
            (Some(_), RelativePathPolicy::Always) => true,
            (Some(_), RelativePathPolicy::Ask) => {
                prompter.confirm("Store document path relative to the notes file? ")
            }
        };
        match relative {
            Some(relative) if use_relative => relative.to_string_lossy().into_owned(),
            _ => path.to_string_lossy().into_owned(),
        }
    }
}

/// The nearest heading at or above `current` carrying `property`, else `current`.
fn find_ancestor_with(doc: &OrgDocument, current: &Headline, property: &str) -> Headline {
    let mut candidate = Some(current.clone());
    while let Some(headline) = candidate {
        if headline.property(property).is_some() {
            return headline;
        }
        candidate = doc.parent_of(&headline);
    }
    current.clone()
}

fn resolve_against(dir: Option<&Path>, value: &str) -> PathBuf {
    let path = PathBuf::from(value.trim());
    match dir {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path,
    }
}

/// End of the note's own text: before child headings and trailing blank
/// lines, never inside its property drawer.
fn note_text_end(text: &str, note: &Headline) -> usize {
    let floor = outline::properties_end(text, note, true);
    let trimmed = text[..note.section_end].trim_end().len();
    trimmed.max(floor)
}
