//! # runlet-deps
//!
//! Everything between a source snippet and a populated `node_modules`:
//! regex-based dependency extraction, the keyed on-disk cache with
//! budget-driven eviction, and the npm resolver that materialises
//! dependency trees into per-request workspaces.

pub mod cache;
pub mod error;
pub mod extract;
pub mod resolver;

pub use cache::{CacheEntry, CacheManager};
pub use error::{DepsError, DepsResult};
pub use extract::{extract_dependencies, DependencySet};
pub use resolver::{DependencyResolver, ResolveOutcome};
