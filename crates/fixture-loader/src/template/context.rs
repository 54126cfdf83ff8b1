//! The rendering context shared by both passes.

use std::ops::Deref;
use std::sync::{Arc, Mutex};

use rand::SeedableRng;
use rand::rngs::StdRng;
use tera::{Context, Tera};
use tracing::debug;

use super::helpers::{self, DeclaredKeys, PickerState, Shared, lock};
use crate::config::LoaderConfig;
use crate::error::{FixtureError, FixtureResult};

/// Owns the template engine, its helper bindings and their random sources.
///
/// Templates are registered once and rendered in both passes. The discovery
/// pass borrows the context through [`TemplateContext::discovery`], which
/// swaps the key-dependent helpers for no-ops until the guard is dropped.
pub struct TemplateContext {
    tera: Tera,
    pickers: Shared<PickerState>,
    faker: Shared<StdRng>,
    seed: u64,
}

impl TemplateContext {
    /// Creates a context with a fresh template engine.
    pub fn new(config: &LoaderConfig) -> Self {
        Self::with_tera(Tera::default(), config)
    }

    /// Wraps a caller-configured engine (custom filters, functions, ...).
    ///
    /// The fixture helpers are registered on top of it, replacing any
    /// functions of the same name.
    pub fn with_tera(mut tera: Tera, config: &LoaderConfig) -> Self {
        tera.autoescape_on(vec![]);

        let pickers = Arc::new(Mutex::new(PickerState::new(
            picker_seed(config.seed),
            config.random_models_range(),
        )));
        let faker = Arc::new(Mutex::new(StdRng::seed_from_u64(config.seed)));

        tera.register_function(helpers::FAKE, helpers::fake_fn(Arc::clone(&faker)));
        tera.register_function(
            helpers::HASH_PASSWORD,
            helpers::hash_password_fn(Arc::clone(&faker)),
        );

        let mut context = Self {
            tera,
            pickers,
            faker,
            seed: config.seed,
        };
        context.install_pickers();
        context
    }

    /// Parses and registers a template under `name`.
    pub fn add_template(&mut self, name: &str, source: &str) -> FixtureResult<()> {
        self.tera
            .add_raw_template(name, source)
            .map_err(|source| FixtureError::Template {
                template: name.to_string(),
                source,
            })
    }

    /// Renders a registered template.
    pub fn render(&self, name: &str) -> FixtureResult<String> {
        self.tera
            .render(name, &Context::new())
            .map_err(|source| FixtureError::Template {
                template: name.to_string(),
                source,
            })
    }

    /// Makes `keys` the universe the reference pickers and `declared_keys` see.
    pub fn set_declared_keys(&self, keys: DeclaredKeys) {
        lock(&self.pickers).keys = keys;
    }

    /// Restarts every random source from the configured seed.
    pub fn reseed(&self) {
        lock(&self.pickers).rng = StdRng::seed_from_u64(picker_seed(self.seed));
        *lock(&self.faker) = StdRng::seed_from_u64(self.seed);
    }

    /// Enters the discovery pass: reference pickers and `declared_keys`
    /// return empty results until the returned guard is dropped, including
    /// on early return.
    pub fn discovery(&mut self) -> DiscoveryContext<'_> {
        debug!("Stripping reference pickers for discovery");
        self.tera.register_function(helpers::RANDOM_MODEL, helpers::no_model);
        self.tera.register_function(helpers::RANDOM_MODELS, helpers::no_models);
        self.tera.register_function(helpers::DECLARED_KEYS, helpers::no_models);
        DiscoveryContext { context: self }
    }

    fn install_pickers(&mut self) {
        self.tera.register_function(
            helpers::RANDOM_MODEL,
            helpers::random_model(Arc::clone(&self.pickers)),
        );
        self.tera.register_function(
            helpers::RANDOM_MODELS,
            helpers::random_models(Arc::clone(&self.pickers)),
        );
        self.tera.register_function(
            helpers::DECLARED_KEYS,
            helpers::declared_keys(Arc::clone(&self.pickers)),
        );
    }
}

/// Keeps the picker stream independent from the faker stream.
fn picker_seed(seed: u64) -> u64 {
    seed.wrapping_add(0x9e37_79b9_7f4a_7c15)
}

/// A [`TemplateContext`] with the reference pickers disabled.
pub struct DiscoveryContext<'a> {
    context: &'a mut TemplateContext,
}

impl Deref for DiscoveryContext<'_> {
    type Target = TemplateContext;

    fn deref(&self) -> &Self::Target {
        self.context
    }
}

impl Drop for DiscoveryContext<'_> {
    fn drop(&mut self) {
        self.context.install_pickers();
    }
}
