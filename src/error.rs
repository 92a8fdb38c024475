use std::path::PathBuf;

/// Failures of the outline document primitives.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrgError {
    #[error("text is read-only")]
    ReadOnly,

    #[error("cannot promote to level 0")]
    CannotPromote,

    #[error("no heading starts at offset {0}")]
    NoHeading(usize),
}

/// Errors surfaced by session commands.
#[derive(Debug, thiserror::Error)]
pub enum NoterError {
    #[error("must be inside a heading")]
    NotInHeading,

    #[error("can't read document {}", .0.display())]
    UnreadableDocument(PathBuf),

    #[error("unsupported viewer for {}", .0.display())]
    UnsupportedViewer(PathBuf),

    #[error("no previous note")]
    NoPreviousNote,

    #[error("no next note")]
    NoNextNote,

    #[error("no note selected")]
    NoNoteSelected,

    #[error("no active session")]
    NoSession,

    #[error("session heading not found in notes")]
    RootNotFound,

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Org(#[from] OrgError),

    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
}

impl NoterError {
    /// Navigation misses leave the session untouched and are reported as warnings.
    pub fn is_navigation_miss(&self) -> bool {
        matches!(
            self,
            NoterError::NoPreviousNote | NoterError::NoNextNote | NoterError::NoNoteSelected
        )
    }
}

pub type NoterResult<T> = std::result::Result<T, NoterError>;
