pub mod backend;
pub mod error;
mod key;
mod models;

pub use crate::backend::ObjectStore;
pub use crate::key::validate as validate_key;
pub use crate::models::{BoxAsyncRead, ObjectInfo, Upload};
use std::sync::Arc;

pub type BackendHandle = Arc<dyn ObjectStore + Send + Sync>;
