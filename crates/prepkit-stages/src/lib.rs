//! # prepkit Stages
//!
//! Built-in preprocessing stages for prepkit:
//! - [`MetadataExtractor`] reads slicer metadata out of comments
//! - [`PlaceholderReplacer`] rewrites `!token!` placeholders
//! - [`EndOfUseShutdown`] cools tools after their last use
//! - [`IdleShutdown`] additionally cools tools ahead of long idle gaps
//!
//! All stages implement [`prepkit_core::Stage`] and are wired into a
//! pipeline by name through the registry in `prepkit-pipeline`.

pub mod metadata;
pub mod placeholders;
pub mod shutdown;

pub use metadata::MetadataExtractor;
pub use placeholders::PlaceholderReplacer;
pub use shutdown::{EndOfUseShutdown, IdleShutdown};
