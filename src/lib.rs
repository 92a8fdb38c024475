// Export modules for use in tests
pub mod error;
pub mod event_source;
pub mod main_app;
pub mod notification;
pub mod org;
pub mod outline;
pub mod panic_handler;
pub mod prompt;
pub mod read_only;
pub mod resolver;
pub mod session;
pub mod settings;
pub mod sync;
pub mod theme;
pub mod viewer;
pub mod workspace;

pub mod test_utils;

pub use error::{NoterError, NoterResult, OrgError};
pub use main_app::{App, AppAction, FocusedPanel, run_app_with_event_source};
pub use sync::{Noter, StartMode};
