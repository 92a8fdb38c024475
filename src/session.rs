//! Registry of live viewer/notes pairings.

use std::path::PathBuf;
use std::rc::Rc;

use log::{debug, info};

use crate::error::{NoterError, NoterResult};
use crate::outline::{OutlineNode, parse_root};
use crate::prompt::Prompter;
use crate::read_only;
use crate::settings::PropertyNames;
use crate::viewer::ViewerKind;
use crate::workspace::{GroupId, SharedDocument, SurfaceId, Workspace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

/// What identifies a session's root heading and files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKeys {
    /// Raw document property value, used to find the root again.
    pub identity: String,
    pub notes_path: Option<PathBuf>,
    pub document_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// No note shown for the current page.
    #[default]
    Idle,
    Synced { page: usize },
}

#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub viewer: SurfaceId,
    pub notes: SurfaceId,
    pub group: GroupId,
    pub viewer_kind: ViewerKind,
    pub keys: SessionKeys,
    pub properties: PropertyNames,
    pub document: SharedDocument,
    pub sync: SyncState,
}

impl Session {
    pub fn label(&self) -> String {
        let name = |path: Option<&std::path::Path>| {
            path.and_then(|p| p.file_name())
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "unsaved notes".to_string())
        };
        format!(
            "{} with notes from {}",
            name(Some(&self.keys.document_path)),
            name(self.keys.notes_path.as_deref())
        )
    }

    /// Live iff the display group and both surfaces still exist.
    pub fn is_valid(&self, workspace: &Workspace) -> bool {
        workspace.is_group_live(self.group)
            && workspace.is_surface_live(self.viewer)
            && workspace.is_surface_live(self.notes)
    }

    /// Re-finds the root heading from the notes surface's point.
    pub fn root(&self, workspace: &Workspace) -> Option<OutlineNode> {
        let point = workspace.notes(self.notes)?.point();
        let doc = self.document.borrow();
        parse_root(
            &doc,
            point,
            &self.properties.pdf_file_property,
            &self.keys.identity,
        )
    }

    pub fn current_page(&self, workspace: &Workspace) -> Option<usize> {
        workspace.viewer(self.viewer).map(|viewer| viewer.current_page())
    }
}

/// All live sessions, kept in creation order.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    next_id: u64,
    sessions: Vec<Session>,
}

pub struct NewSession {
    pub viewer: SurfaceId,
    pub notes: SurfaceId,
    pub group: GroupId,
    pub viewer_kind: ViewerKind,
    pub keys: SessionKeys,
    pub properties: PropertyNames,
    pub document: SharedDocument,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, new: NewSession) -> SessionId {
        self.next_id += 1;
        let id = SessionId(self.next_id);
        let session = Session {
            id,
            viewer: new.viewer,
            notes: new.notes,
            group: new.group,
            viewer_kind: new.viewer_kind,
            keys: new.keys,
            properties: new.properties,
            document: new.document,
            sync: SyncState::Idle,
        };
        info!("Started session: {}", session.label());
        self.sessions.push(session);
        id
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Most recently created first.
    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.iter().rev()
    }

    pub fn find_by_surface(&self, surface: SurfaceId) -> Option<SessionId> {
        self.iter()
            .find(|s| s.viewer == surface || s.notes == surface)
            .map(|s| s.id)
    }

    pub fn find_by_group(&self, group: GroupId) -> Option<SessionId> {
        self.iter().find(|s| s.group == group).map(|s| s.id)
    }

    /// A session over the same notes document and root identity.
    pub fn find_duplicate(&self, document: &SharedDocument, identity: &str) -> Option<SessionId> {
        self.iter()
            .find(|s| Rc::ptr_eq(&s.document, document) && s.keys.identity == identity)
            .map(|s| s.id)
    }

    /// Checks liveness; a stale session is killed on the spot.
    pub fn ensure_valid(&mut self, id: SessionId, workspace: &mut Workspace) -> bool {
        match self.get(id) {
            Some(session) if session.is_valid(workspace) => true,
            Some(_) => {
                debug!("Session {id:?} is stale, tearing it down");
                self.kill(id, workspace);
                false
            }
            None => false,
        }
    }

    /// Ends a session: lifts the root protection, closes what is still open,
    /// and drops the page hook once no session remains.
    pub fn kill(&mut self, id: SessionId, workspace: &mut Workspace) {
        let Some(idx) = self.sessions.iter().position(|s| s.id == id) else {
            return;
        };
        let session = self.sessions.remove(idx);

        let point = workspace
            .notes(session.notes)
            .map(|notes| notes.point())
            .unwrap_or(0);
        {
            let mut doc = session.document.borrow_mut();
            let root = parse_root(
                &doc,
                point,
                &session.properties.pdf_file_property,
                &session.keys.identity,
            );
            if let Some(root) = root {
                read_only::unprotect(&mut doc, &root.headline);
            }
        }

        workspace.close_group(session.group);
        workspace.close_surface(session.viewer);
        workspace.close_surface(session.notes);

        if self.sessions.is_empty() {
            workspace.set_page_hook(false);
        }
        info!("Killed session: {}", session.label());
    }

    /// Picks the session a command applies to.
    ///
    /// The context session wins unless `force_prompt`; a single session is
    /// used directly; otherwise the user chooses, defaulting to the context.
    pub fn choose(
        &self,
        context: Option<SessionId>,
        force_prompt: bool,
        prompter: &mut dyn Prompter,
    ) -> NoterResult<SessionId> {
        if self.sessions.is_empty() {
            return Err(NoterError::NoSession);
        }
        if !force_prompt {
            if let Some(id) = context.filter(|id| self.get(*id).is_some()) {
                return Ok(id);
            }
            if let [only] = self.sessions.as_slice() {
                return Ok(only.id);
            }
        }

        let ordered: Vec<&Session> = self.iter().collect();
        let labels: Vec<String> = ordered.iter().map(|s| s.label()).collect();
        let default = context.and_then(|id| ordered.iter().position(|s| s.id == id));
        let idx = prompter
            .choose("Session: ", &labels, default)
            .ok_or(NoterError::Cancelled)?;
        Ok(ordered[idx].id)
    }
}
