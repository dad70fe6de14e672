pub mod backend;
pub mod error;
mod filter;
mod models;
mod path;
pub mod publish;

pub use crate::backend::StorageBackend;
pub use crate::filter::{DELETE_MARKER, ScanFilter};
pub use crate::models::FileInfo;
pub use crate::path::validate as validate_path;
pub use crate::publish::Publisher;
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
