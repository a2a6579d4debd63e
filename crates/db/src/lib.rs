mod error;
pub mod models;
mod pool;
pub mod repositories;

pub use error::*;
pub use models::{Document, DOC_TYPE_JSON, DOC_TYPE_MARKDOWN};
pub use pool::*;
pub use repositories::*;
