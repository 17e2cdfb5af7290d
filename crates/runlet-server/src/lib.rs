//! Runlet HTTP server: the API surface, bearer-token middleware, and the
//! request orchestrator gluing extraction, resolution, and execution.

pub mod api;
pub mod middleware;
pub mod orchestrator;
pub mod scrub;
pub mod state;

pub use api::create_router;
pub use state::AppState;
