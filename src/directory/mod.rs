//! Directory and inventory integration.
//!
//! This module defines the collaborator interface for enumerating and
//! mutating entities, plus the file-backed and HTTP backends.

mod http;
mod local;
mod source;
mod store;
mod types;

pub use http::HttpDirectory;
pub use local::{FileDirectory, Inventory};
pub use source::EntitySource;
#[cfg(test)]
pub use store::MockDirectory;
pub use store::Directory;
pub use types::{Entity, ServicePlan};
