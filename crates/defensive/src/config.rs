//! Contract configuration
//!
//! `ContractConfig` is the full configuration a contract runs with.
//! `ConfigOverrides` is the partial form merged on top of it by
//! `ContractBuilder::config`; it can also be read from the environment or
//! from a TOML document.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::logger::{LoggerFactory, TracingLoggerFactory};
use crate::schema::{SchemaValidator, Validator};
use crate::serialize::{InspectSerializer, Serializer};

/// Field names redacted by default
pub const DEFAULT_REMOVE_FIELDS: [&str; 3] = ["password", "token", "accessToken"];

/// Monotonic source of invocation ids. The first id handed out is 1.
#[derive(Debug, Default)]
pub struct InvocationCounter {
    last: AtomicU64,
}

impl InvocationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> u64 {
        self.last.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Configuration shared by the contracts of one runtime
#[derive(Clone)]
pub struct ContractConfig {
    /// Field names whose values are replaced by the redaction marker
    pub remove_fields: Vec<String>,
    /// Whether debug (enter/exit) lines are emitted
    pub debug: bool,
    /// Maximum nesting depth rendered by the serializer
    pub depth: usize,
    /// Arrays longer than this are rendered as `'Array(<n>)'`
    pub max_array_length: usize,
    pub loggers: Arc<dyn LoggerFactory>,
    pub validator: Arc<dyn Validator>,
    pub serializer: Arc<dyn Serializer>,
    pub ids: Arc<InvocationCounter>,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            remove_fields: DEFAULT_REMOVE_FIELDS.iter().map(|s| s.to_string()).collect(),
            debug: true,
            depth: 4,
            max_array_length: 30,
            loggers: Arc::new(TracingLoggerFactory::new()),
            validator: Arc::new(SchemaValidator),
            serializer: Arc::new(InspectSerializer),
            ids: Arc::new(InvocationCounter::new()),
        }
    }
}

impl fmt::Debug for ContractConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractConfig")
            .field("remove_fields", &self.remove_fields)
            .field("debug", &self.debug)
            .field("depth", &self.depth)
            .field("max_array_length", &self.max_array_length)
            .finish_non_exhaustive()
    }
}

impl ContractConfig {
    /// Create a new config builder
    pub fn builder() -> ContractConfigBuilder {
        ContractConfigBuilder::new()
    }

    /// Default configuration with environment overrides applied
    pub fn from_env() -> Self {
        Self::default().merged(&ConfigOverrides::from_env())
    }

    /// Return a copy with every set field of `overrides` applied.
    pub fn merged(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(fields) = &overrides.remove_fields {
            self.remove_fields = fields.clone();
        }
        if let Some(debug) = overrides.debug {
            self.debug = debug;
        }
        if let Some(depth) = overrides.depth {
            self.depth = depth;
        }
        if let Some(max) = overrides.max_array_length {
            self.max_array_length = max;
        }
        self
    }

    pub fn is_removed_field(&self, name: &str) -> bool {
        self.remove_fields.iter().any(|f| f == name)
    }
}

/// Builder for ContractConfig
pub struct ContractConfigBuilder {
    config: ContractConfig,
}

impl ContractConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self {
            config: ContractConfig::default(),
        }
    }

    pub fn remove_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.remove_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.config.debug = enabled;
        self
    }

    pub fn depth(mut self, depth: usize) -> Self {
        self.config.depth = depth;
        self
    }

    pub fn max_array_length(mut self, max: usize) -> Self {
        self.config.max_array_length = max;
        self
    }

    pub fn loggers(mut self, factory: Arc<dyn LoggerFactory>) -> Self {
        self.config.loggers = factory;
        self
    }

    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.config.validator = validator;
        self
    }

    pub fn serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.config.serializer = serializer;
        self
    }

    pub fn ids(mut self, ids: Arc<InvocationCounter>) -> Self {
        self.config.ids = ids;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ContractConfig {
        self.config
    }
}

impl Default for ContractConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Partial configuration; unset fields keep the base value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigOverrides {
    pub remove_fields: Option<Vec<String>>,
    pub debug: Option<bool>,
    pub depth: Option<usize>,
    pub max_array_length: Option<usize>,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read overrides from `DEFENSIVE_*` environment variables.
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            remove_fields: lookup("DEFENSIVE_REMOVE_FIELDS").map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            }),
            debug: lookup("DEFENSIVE_DEBUG").and_then(|v| v.parse().ok()),
            depth: lookup("DEFENSIVE_DEPTH").and_then(|v| v.parse().ok()),
            max_array_length: lookup("DEFENSIVE_MAX_ARRAY_LENGTH").and_then(|v| v.parse().ok()),
        }
    }

    /// Parse overrides from a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn with_remove_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.remove_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = Some(debug);
        self
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_max_array_length(mut self, max: usize) -> Self {
        self.max_array_length = Some(max);
        self
    }
}
