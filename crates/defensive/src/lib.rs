//! Contract middleware for Rust services
//!
//! Wraps plain functions into *contracts* that:
//!
//! - validate and normalize their positional arguments against a schema
//! - log an enter line, and an exit or error line, with redacted values
//! - collect a causal chain of every contract boundary an error crosses
//! - run inside a scope whose context value is visible to every nested
//!   contract and tracked task, however deep
//!
//! # Example
//!
//! ```ignore
//! use defensive::{initialize, ContractConfig, Schema, SchemaMap};
//! use serde_json::json;
//!
//! let defensive = initialize::<String>(ContractConfig::from_env());
//! let add_ten = defensive
//!     .create_contract("calc#addTen")
//!     .params(["a"])
//!     .schema(SchemaMap::new().key("a", Schema::number().min(0)))
//!     .func(|args| Ok(json!(args[0].as_i64().unwrap_or_default() + 10)))?;
//!
//! assert_eq!(add_ten.call(vec![json!(10)])?, json!(20));
//! ```

pub mod config;
pub mod contract;
pub mod error;
pub mod logger;
mod pipeline;
pub mod runtime;
pub mod schema;
pub mod serialize;
pub mod telemetry;
pub mod validation;

pub use config::{ConfigOverrides, ContractConfig, ContractConfigBuilder, InvocationCounter};
pub use contract::{
    AsyncContract, Contract, ContractBuilder, ContractDescription, ContractOptions, Signature,
};
pub use error::{
    CausalFrame, ConfigError, ContractError, ErrorKind, ErrorReport, Fault, Result,
    SignatureError, ValidationError,
};
pub use logger::{
    LogLevel, LogLine, Logger, LoggerFactory, MemoryLogger, MemoryLoggerFactory, TracingLogger,
    TracingLoggerFactory,
};
pub use runtime::{initialize, Defensive, InitializeOptions};
pub use schema::{Pattern, Schema, SchemaKind, SchemaMap, SchemaValidator, Validator};
pub use serialize::{InspectSerializer, Serializer, REDACTED};

pub use defensive_scope::{ScopeError, ScopeTracker};
