//! HTTP API for driving voice note capture from a remote dialog
//!
//! - POST /voice-notes/sessions - Open a session
//! - GET /voice-notes/sessions/:id - Session snapshot
//! - POST /voice-notes/sessions/:id/{start,stop,rerecord,reset} - Recording control
//! - DELETE /voice-notes/sessions/:id?trigger=... - Close and release
//! - GET /voice-notes/previews/:id - Play back a captured note
//! - GET /health - Health check
//!
//! Sessions no request has touched for the configured idle time are torn
//! down as if the dialog unmounted.

mod handlers;
mod routes;
mod state;

pub use handlers::ErrorResponse;
pub use routes::create_router;
pub use state::{AppState, SessionEntry};
