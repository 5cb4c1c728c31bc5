//! HTTP server for pagedit.
//!
//! Receives edits from the live-editing client, writes them into the
//! project's source files and exposes the version history.

pub mod edit;
pub mod routes;
pub mod save;
pub mod session;
pub mod state;

pub use edit::{parse_loc, RawEdit, ValidEdit};
pub use routes::create_router;
pub use save::{EditSaveService, SaveError, SaveOutcome};
pub use session::{EditSession, PauseGuard};
pub use state::AppState;
