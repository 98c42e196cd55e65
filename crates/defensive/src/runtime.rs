//! Runtime facade
//!
//! `initialize` ties one `ContractConfig` and one `ScopeTracker` together
//! and returns the handle applications build contracts from. The type
//! parameter `C` is the application's request context, attached to a root
//! call with `run_with_context` and read back anywhere below it with
//! `get_context`.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use defensive_scope::{ScopeError, ScopeTracker, Tracked};

use crate::config::ContractConfig;
use crate::contract::ContractBuilder;

/// Options accepted by `initialize`
#[derive(Debug, Clone, Default)]
pub struct InitializeOptions {
    pub config: ContractConfig,
    /// Tracker to share with other runtimes; a fresh one when unset
    pub tracker: Option<ScopeTracker>,
}

impl From<ContractConfig> for InitializeOptions {
    fn from(config: ContractConfig) -> Self {
        Self {
            config,
            tracker: None,
        }
    }
}

/// Create a runtime handle.
pub fn initialize<C>(options: impl Into<InitializeOptions>) -> Defensive<C>
where
    C: Clone + Send + Sync + 'static,
{
    let options = options.into();
    let tracker = options.tracker.unwrap_or_default();
    tracing::debug!(config = ?options.config, "Defensive runtime initialized");
    Defensive {
        config: options.config,
        tracker,
        _context: PhantomData,
    }
}

/// Handle returned by `initialize`
pub struct Defensive<C> {
    config: ContractConfig,
    tracker: ScopeTracker,
    _context: PhantomData<fn() -> C>,
}

impl<C> Clone for Defensive<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            tracker: self.tracker.clone(),
            _context: PhantomData,
        }
    }
}

impl<C> std::fmt::Debug for Defensive<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Defensive")
            .field("config", &self.config)
            .field("tracker", &self.tracker)
            .finish()
    }
}

impl<C> Defensive<C>
where
    C: Clone + Send + Sync + 'static,
{
    /// Start declaring a contract named `service#method`.
    pub fn create_contract(&self, signature: impl Into<String>) -> ContractBuilder {
        ContractBuilder::new(signature, self.config.clone(), self.tracker.clone())
    }

    /// Run `future` as a new root call with `context` attached.
    pub fn run_with_context<F: Future>(&self, context: C, future: F) -> Tracked<F> {
        self.tracker.run_in_new_scope_with(Arc::new(context), future)
    }

    /// Run `f` as a new synchronous root call with `context` attached.
    pub fn run_with_context_sync<R>(&self, context: C, f: impl FnOnce() -> R) -> R {
        self.tracker.run_in_new_scope_sync_with(Arc::new(context), f)
    }

    /// Context of the root call the current operation belongs to.
    pub fn get_context(&self) -> Result<C, ScopeError> {
        self.tracker
            .store()
            .get_as::<C>()
            .map(|context| C::clone(&context))
    }

    pub fn config(&self) -> &ContractConfig {
        &self.config
    }

    pub fn tracker(&self) -> &ScopeTracker {
        &self.tracker
    }

    /// Stop attributing new operations. Open scopes still release.
    pub fn disable(&self) {
        self.tracker.disable();
    }
}
