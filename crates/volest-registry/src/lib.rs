//! Stock split registry for volest.
//!
//! The split adjuster only sees the [`SplitRegistry`] capability, so the
//! backing source (static table, database, vendor feed) can change without
//! touching adjustment logic.

pub mod error;
pub mod registry;

pub use error::{RegistryError, RegistryResult};
pub use registry::{SplitRegistry, StaticSplitRegistry};
