//! Model allow-list

mod allowed;

pub use allowed::AllowedModel;
