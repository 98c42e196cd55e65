//! Contract builder and built contracts
//!
//! A contract is declared fluently and terminated by the function it wraps:
//!
//! ```ignore
//! let add = defensive
//!     .create_contract("calc#add")
//!     .params(["a"])
//!     .schema(SchemaMap::new().key("a", Schema::number().min(0)))
//!     .func(|args| Ok(json!(args[0].as_i64().unwrap_or_default() + 10)))?;
//!
//! assert_eq!(add.call(vec![json!(10)])?, json!(20));
//! ```
//!
//! `func` builds a synchronous `Contract`, `async_func` an `AsyncContract`
//! whose implementation returns a future. Both are cheap to clone and can
//! be captured by other contracts' implementations.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use defensive_scope::ScopeTracker;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{ConfigOverrides, ContractConfig};
use crate::error::{Fault, Result, SignatureError};
use crate::pipeline::ContractCore;
use crate::schema::SchemaMap;

/// Per-contract behavior switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContractOptions {
    /// Whether the contract completes synchronously. Set by the builder
    /// terminator: `func` forces `true`, `async_func` forces `false`.
    pub sync: bool,
    /// Log `<removed>` instead of the formatted output on success
    pub remove_output: bool,
}

/// Parsed `service#method` identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    service: String,
    method: String,
}

impl Signature {
    /// Parse a signature. It must contain exactly one `#` with a non-empty
    /// segment on each side.
    pub fn parse(signature: &str) -> std::result::Result<Self, SignatureError> {
        let invalid = || SignatureError {
            signature: signature.to_string(),
        };
        let mut parts = signature.split('#');
        let (Some(service), Some(method), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        if service.is_empty() || method.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            service: service.to_string(),
            method: method.to_string(),
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn method(&self) -> &str {
        &self.method
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.service, self.method)
    }
}

/// Serializable description of a built contract
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractDescription {
    pub signature: String,
    pub params: Vec<String>,
    pub schema: Option<SchemaMap>,
    pub options: ContractOptions,
}

/// Fluent declaration of a contract, see the module docs
#[must_use = "a contract builder does nothing until terminated with `func` or `async_func`"]
pub struct ContractBuilder {
    signature: String,
    params: Vec<String>,
    schema: Option<SchemaMap>,
    options: ContractOptions,
    config: ContractConfig,
    tracker: ScopeTracker,
}

impl ContractBuilder {
    pub(crate) fn new(
        signature: impl Into<String>,
        config: ContractConfig,
        tracker: ScopeTracker,
    ) -> Self {
        Self {
            signature: signature.into(),
            params: Vec::new(),
            schema: None,
            options: ContractOptions::default(),
            config,
            tracker,
        }
    }

    /// Ordered parameter names; positional arguments are matched to them.
    pub fn params<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params = names.into_iter().map(Into::into).collect();
        self
    }

    /// Schema keyed by parameter name. Without one, the declared arguments
    /// reach the implementation as given and extras are dropped.
    pub fn schema(mut self, schema: SchemaMap) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn options(mut self, options: ContractOptions) -> Self {
        self.options = options;
        self
    }

    /// Merge configuration overrides for this contract only.
    pub fn config(mut self, overrides: ConfigOverrides) -> Self {
        self.config = self.config.merged(&overrides);
        self
    }

    fn into_core(self, sync: bool) -> std::result::Result<ContractCore, SignatureError> {
        let signature = Signature::parse(&self.signature)?;
        let logger = self
            .config
            .loggers
            .logger(signature.service(), self.config.debug);
        tracing::debug!(signature = %signature, params = ?self.params, sync, "Contract built");
        Ok(ContractCore {
            signature,
            params: self.params,
            schema: self.schema,
            options: ContractOptions {
                sync,
                ..self.options
            },
            config: self.config,
            logger,
            tracker: self.tracker,
        })
    }

    /// Terminate with a synchronous implementation.
    pub fn func<F>(self, implementation: F) -> std::result::Result<Contract, SignatureError>
    where
        F: Fn(Vec<Value>) -> std::result::Result<Value, Fault> + Send + Sync + 'static,
    {
        Ok(Contract {
            core: Arc::new(self.into_core(true)?),
            handler: Arc::new(implementation),
        })
    }

    /// Terminate with an implementation returning a future.
    pub fn async_func<F, Fut>(
        self,
        implementation: F,
    ) -> std::result::Result<AsyncContract, SignatureError>
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Value, Fault>> + Send + 'static,
    {
        Ok(AsyncContract {
            core: Arc::new(self.into_core(false)?),
            handler: Arc::new(move |args| implementation(args).boxed()),
        })
    }
}

type SyncHandler = dyn Fn(Vec<Value>) -> std::result::Result<Value, Fault> + Send + Sync;
type AsyncHandler =
    dyn Fn(Vec<Value>) -> BoxFuture<'static, std::result::Result<Value, Fault>> + Send + Sync;

macro_rules! contract_meta {
    ($contract:ty) => {
        impl $contract {
            pub fn signature(&self) -> String {
                self.core.signature.to_string()
            }

            pub fn service(&self) -> &str {
                self.core.signature.service()
            }

            pub fn method(&self) -> &str {
                self.core.signature.method()
            }

            pub fn params(&self) -> &[String] {
                &self.core.params
            }

            pub fn schema(&self) -> Option<&SchemaMap> {
                self.core.schema.as_ref()
            }

            pub fn options(&self) -> ContractOptions {
                self.core.options
            }

            pub fn describe(&self) -> ContractDescription {
                ContractDescription {
                    signature: self.signature(),
                    params: self.core.params.clone(),
                    schema: self.core.schema.clone(),
                    options: self.core.options,
                }
            }
        }

        impl fmt::Debug for $contract {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($contract))
                    .field("signature", &self.core.signature.to_string())
                    .field("params", &self.core.params)
                    .finish_non_exhaustive()
            }
        }
    };
}

/// A built synchronous contract
#[derive(Clone)]
pub struct Contract {
    core: Arc<ContractCore>,
    handler: Arc<SyncHandler>,
}

impl Contract {
    /// Invoke the contract with positional arguments.
    pub fn call(&self, args: Vec<Value>) -> Result<Value> {
        self.core.invoke_sync(args, |normalized| (self.handler)(normalized))
    }
}

contract_meta!(Contract);

/// A built asynchronous contract
#[derive(Clone)]
pub struct AsyncContract {
    core: Arc<ContractCore>,
    handler: Arc<AsyncHandler>,
}

impl AsyncContract {
    /// Invoke the contract with positional arguments.
    pub async fn call(&self, args: Vec<Value>) -> Result<Value> {
        let handler = Arc::clone(&self.handler);
        self.core
            .invoke_async(args, move |normalized| handler(normalized))
            .await
    }
}

contract_meta!(AsyncContract);
