//! HTTP control surface for Herald.
//!
//! Operators use it to:
//! - Inspect quota and the next allowed action (`GET /status`)
//! - Force one attempt outside the schedule (`POST /trigger`)
//! - Clear today's counter (`POST /reset`)

mod error;
mod routes;
mod status;

pub use error::WebError;
pub use routes::{AppState, create_router, run_server};
pub use status::StatusResponse;
