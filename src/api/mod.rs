//! API layer - HTTP endpoints

pub mod debug;
pub mod health;
pub mod router;
pub mod runs;
pub mod state;
pub mod types;
pub mod workflows;

pub use router::create_router;
pub use state::AppState;
