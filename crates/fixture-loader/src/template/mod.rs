//! Template rendering for fixture files.
//!
//! - [`TemplateContext`]: the engine plus helper bindings, reused across passes
//! - [`DiscoveryContext`]: scoped view with the key-dependent helpers disabled
//! - [`helpers`]: the functions templates can call

mod context;
pub mod helpers;

pub use context::{DiscoveryContext, TemplateContext};
pub use helpers::DeclaredKeys;
