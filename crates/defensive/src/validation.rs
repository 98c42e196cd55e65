//! Validation stage of the invocation pipeline
//!
//! Zips the declared parameter names with the positional arguments into
//! one record, validates the record as a whole (so cross-field rules see
//! every parameter), and turns the normalized record back into positional
//! arguments in declaration order. Arguments beyond the declared names are
//! dropped here and never reach the implementation.

use futures::future::{ready, Ready};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::schema::{SchemaMap, Validator};

/// Build the named-argument record. Missing arguments become `null`.
pub fn combine(params: &[String], args: &[Value]) -> Value {
    let record: Map<String, Value> = params
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), args.get(i).cloned().unwrap_or(Value::Null)))
        .collect();
    Value::Object(record)
}

/// Validation of one contract's arguments
pub struct ValidationStage<'a> {
    params: &'a [String],
    schema: Option<&'a SchemaMap>,
    validator: &'a dyn Validator,
}

impl<'a> ValidationStage<'a> {
    pub fn new(
        params: &'a [String],
        schema: Option<&'a SchemaMap>,
        validator: &'a dyn Validator,
    ) -> Self {
        Self {
            params,
            schema,
            validator,
        }
    }

    /// Validate and normalize immediately.
    pub fn validate(&self, args: &[Value]) -> Result<Vec<Value>, ValidationError> {
        let Some(schema) = self.schema else {
            return Ok(self.declared(args));
        };
        let normalized = self
            .validator
            .validate(&combine(self.params, args), schema)?;
        Ok(self
            .params
            .iter()
            .map(|name| normalized.get(name).cloned().unwrap_or(Value::Null))
            .collect())
    }

    /// Same result delivered as a future, so asynchronous callers receive a
    /// validation failure as a rejected future instead of an early return.
    pub fn validate_deferred(&self, args: &[Value]) -> Ready<Result<Vec<Value>, ValidationError>> {
        ready(self.validate(args))
    }

    fn declared(&self, args: &[Value]) -> Vec<Value> {
        (0..self.params.len())
            .map(|i| args.get(i).cloned().unwrap_or(Value::Null))
            .collect()
    }
}
