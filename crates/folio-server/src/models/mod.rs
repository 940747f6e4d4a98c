//! API models for requests and responses

pub mod api;
pub mod notebook;
pub mod template;

// Re-export commonly used types
pub use api::*;
pub use notebook::*;
pub use template::*;
