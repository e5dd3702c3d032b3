//! API request/response plumbing shared by all handlers

pub mod error;
pub mod json;

pub use error::{ApiError, ApiErrorResponse, ApiErrorType};
pub use json::Json;
