//! Template-driven fixture loading.
//!
//! This crate renders YAML fixture templates, works out which records
//! reference which, and creates them in dependency order through a
//! user-supplied [`Factory`](factory::Factory).
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use fixture_loader::prelude::*;
//!
//! // fixtures/author.yml:
//! //   a1:
//! //     name: {{ fake(kind="name") }}
//! // fixtures/book.yml:
//! //   b1:
//! //     title: X
//! //     author: {{ random_model(class_name="author") }}
//! let schema = Schema::new().relationship("book", "author", "author");
//! let mut loader = FixturesLoader::new(
//!     MemoryFactory::new(schema),
//!     LoaderConfig::new(["fixtures"]).with_seed(42),
//! );
//!
//! let instances = loader.create_all(None)?;
//! let author = loader.convert_identifiers(Reference::new("author", "a1"))?;
//! ```

pub mod config;
pub mod error;
pub mod factory;
pub mod identifier;
pub mod loader;
pub mod template;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::config::LoaderConfig;
    pub use crate::error::{ConfigError, FixtureError, FixtureResult};
    pub use crate::factory::{Factory, MemoryFactory, MemoryRecord, Relationships, Schema};
    pub use crate::identifier::{FieldValue, Identifiers, Instances, RawRecordData, Reference};
    pub use crate::loader::{DependencyGraph, FixturesLoader, InstanceCache, ProgressCallback};
    pub use crate::template::{DeclaredKeys, TemplateContext};
}
