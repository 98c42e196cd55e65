//! Invocation pipeline
//!
//! Every contract call walks the same states:
//!
//! ```text
//! ENTERED -> VALIDATING -> VALIDATION_FAILED
//!                       -> EXECUTING -> SUCCEEDED
//!                                    -> FAILED
//! ```
//!
//! ENTERED takes an invocation id and logs the formatted input.
//! VALIDATING delegates to the validation stage. EXECUTING opens a new
//! scope when the caller is outermost, otherwise runs inside the caller's
//! scope. SUCCEEDED logs the output. Both failure states log the error
//! once and add this contract's frame to the causal chain.

use std::future::Future;
use std::sync::Arc;

use defensive_scope::ScopeTracker;
use serde_json::Value;

use crate::config::ContractConfig;
use crate::contract::{ContractOptions, Signature};
use crate::error::{CausalFrame, ContractError, ErrorKind, Fault, Result, ValidationError};
use crate::logger::Logger;
use crate::schema::SchemaMap;
use crate::serialize::REDACTED;
use crate::validation::{combine, ValidationStage};

/// Input rendering of a contract with no declared parameters
const EMPTY_INPUT: &str = "{ }";

/// Everything a built contract needs to run one invocation
pub(crate) struct ContractCore {
    pub(crate) signature: Signature,
    pub(crate) params: Vec<String>,
    pub(crate) schema: Option<SchemaMap>,
    pub(crate) options: ContractOptions,
    pub(crate) config: ContractConfig,
    pub(crate) logger: Arc<dyn Logger>,
    pub(crate) tracker: ScopeTracker,
}

/// Per-call record, alive for the duration of one invocation
struct Invocation {
    id: u64,
    input: String,
}

impl ContractCore {
    fn stage(&self) -> ValidationStage<'_> {
        ValidationStage::new(
            &self.params,
            self.schema.as_ref(),
            self.config.validator.as_ref(),
        )
    }

    fn format_input(&self, args: &[Value]) -> String {
        if self.params.is_empty() {
            return EMPTY_INPUT.to_string();
        }
        self.config
            .serializer
            .format(&self.config, &combine(&self.params, args))
    }

    /// ENTERED
    fn enter(&self, args: &[Value]) -> Invocation {
        let invocation = Invocation {
            id: self.config.ids.next_id(),
            input: self.format_input(args),
        };
        self.logger.debug(
            invocation.id,
            &format!("ENTER {}:", self.signature.method()),
            &invocation.input,
        );
        invocation
    }

    /// SUCCEEDED
    fn succeed(&self, invocation: &Invocation, output: &Value) {
        let formatted = if self.options.remove_output {
            REDACTED.to_string()
        } else {
            self.config.serializer.format(&self.config, output)
        };
        self.logger.debug(
            invocation.id,
            &format!(" EXIT {}:", self.signature.method()),
            &formatted,
        );
    }

    fn frame(&self, invocation: &Invocation) -> CausalFrame {
        CausalFrame {
            signature: self.signature.to_string(),
            input: invocation.input.clone(),
        }
    }

    fn log_failure(&self, invocation: &Invocation, error: &dyn std::fmt::Display) {
        self.logger.error(
            invocation.id,
            &format!("ERROR {}: {}", self.signature.method(), invocation.input),
            &error.to_string(),
        );
    }

    /// VALIDATION_FAILED
    fn reject(&self, invocation: &Invocation, error: ValidationError) -> ContractError {
        self.log_failure(invocation, &error);
        ContractError::new(ErrorKind::Validation(error), self.frame(invocation))
    }

    /// FAILED
    fn fail(&self, invocation: &Invocation, fault: Fault) -> ContractError {
        self.log_failure(invocation, &fault);
        match fault {
            Fault::Contract(mut error) => {
                error.push_boundary(self.frame(invocation));
                error
            }
            // A nested failure carried through `anyhow` keeps its chain.
            Fault::Raised(error) => match error.downcast::<ContractError>() {
                Ok(mut nested) => {
                    nested.push_boundary(self.frame(invocation));
                    nested
                }
                Err(error) => {
                    ContractError::new(ErrorKind::Runtime(error), self.frame(invocation))
                }
            },
        }
    }

    fn settle(
        &self,
        invocation: &Invocation,
        outcome: std::result::Result<Value, Fault>,
    ) -> Result<Value> {
        match outcome {
            Ok(output) => {
                self.succeed(invocation, &output);
                Ok(output)
            }
            Err(fault) => Err(self.fail(invocation, fault)),
        }
    }

    /// Run one synchronous invocation.
    pub(crate) fn invoke_sync<F>(&self, args: Vec<Value>, implementation: F) -> Result<Value>
    where
        F: FnOnce(Vec<Value>) -> std::result::Result<Value, Fault>,
    {
        let invocation = self.enter(&args);
        let normalized = match self.stage().validate(&args) {
            Ok(normalized) => normalized,
            Err(error) => return Err(self.reject(&invocation, error)),
        };

        let outcome = if self.tracker.is_new_scope() {
            tracing::trace!(id = invocation.id, signature = %self.signature, "Opening scope");
            self.tracker.run_in_new_scope_sync(|| implementation(normalized))
        } else {
            implementation(normalized)
        };
        self.settle(&invocation, outcome)
    }

    /// Run one asynchronous invocation.
    pub(crate) async fn invoke_async<F, Fut>(
        &self,
        args: Vec<Value>,
        implementation: F,
    ) -> Result<Value>
    where
        F: FnOnce(Vec<Value>) -> Fut,
        Fut: Future<Output = std::result::Result<Value, Fault>>,
    {
        let invocation = self.enter(&args);
        let normalized = match self.stage().validate_deferred(&args).await {
            Ok(normalized) => normalized,
            Err(error) => return Err(self.reject(&invocation, error)),
        };

        // Created lazily so the implementation's own setup runs inside the
        // scope as well.
        let call = async move { implementation(normalized).await };
        let outcome = if self.tracker.is_new_scope() {
            tracing::trace!(id = invocation.id, signature = %self.signature, "Opening scope");
            self.tracker.run_in_new_scope(call).await
        } else {
            call.await
        };
        self.settle(&invocation, outcome)
    }
}
