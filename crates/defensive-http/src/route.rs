//! Route binding for built contracts
//!
//! `bind` decorates a contract with one or more HTTP routes without
//! changing the contract itself. `into_router` turns the bindings into an
//! axum `Router`. Each handler gathers the contract's arguments by
//! parameter name, looking in this order:
//!
//! 1. path parameters
//! 2. query string
//! 3. fields of a JSON object body
//!
//! Missing arguments are passed as `null` and left to validation.

use std::collections::HashMap;
use std::fmt;

use axum::{
    extract::{Path, Query},
    routing::{on, MethodFilter},
    Json, Router,
};
use defensive::{AsyncContract, Contract, ContractError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::response::{CallResult, HttpError};

/// HTTP methods a contract can be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    fn filter(self) -> MethodFilter {
        match self {
            HttpMethod::Get => MethodFilter::GET,
            HttpMethod::Post => MethodFilter::POST,
            HttpMethod::Put => MethodFilter::PUT,
            HttpMethod::Delete => MethodFilter::DELETE,
            HttpMethod::Patch => MethodFilter::PATCH,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        };
        f.write_str(name)
    }
}

/// One route a contract answers on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteOptions {
    pub method: HttpMethod,
    /// axum path, e.g. `/users/:id`
    pub path: String,
}

impl RouteOptions {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }
}

/// Either kind of built contract
#[derive(Debug, Clone)]
pub enum BoundContract {
    Sync(Contract),
    Async(AsyncContract),
}

impl BoundContract {
    pub fn signature(&self) -> String {
        match self {
            BoundContract::Sync(c) => c.signature(),
            BoundContract::Async(c) => c.signature(),
        }
    }

    pub fn params(&self) -> &[String] {
        match self {
            BoundContract::Sync(c) => c.params(),
            BoundContract::Async(c) => c.params(),
        }
    }

    pub async fn call(&self, args: Vec<Value>) -> Result<Value, ContractError> {
        match self {
            BoundContract::Sync(c) => c.call(args),
            BoundContract::Async(c) => c.call(args).await,
        }
    }
}

impl From<Contract> for BoundContract {
    fn from(contract: Contract) -> Self {
        BoundContract::Sync(contract)
    }
}

impl From<AsyncContract> for BoundContract {
    fn from(contract: AsyncContract) -> Self {
        BoundContract::Async(contract)
    }
}

/// Attach a first route to `contract`.
pub fn bind(contract: impl Into<BoundContract>, options: RouteOptions) -> RoutedContract {
    RoutedContract {
        contract: contract.into(),
        routes: vec![options],
    }
}

/// A contract together with the routes it answers on
#[derive(Debug, Clone)]
pub struct RoutedContract {
    contract: BoundContract,
    routes: Vec<RouteOptions>,
}

impl RoutedContract {
    /// Add another route.
    pub fn route(mut self, options: RouteOptions) -> Self {
        self.routes.push(options);
        self
    }

    pub fn routes(&self) -> &[RouteOptions] {
        &self.routes
    }

    pub fn contract(&self) -> &BoundContract {
        &self.contract
    }

    /// Invoke the contract directly, bypassing HTTP.
    pub async fn call(&self, args: Vec<Value>) -> Result<Value, ContractError> {
        self.contract.call(args).await
    }

    /// Build a router serving every route of this contract.
    pub fn into_router<S>(self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        self.register(Router::new())
    }

    /// Add this contract's routes to an existing router.
    pub fn register<S>(self, mut router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        for options in &self.routes {
            tracing::debug!(
                method = %options.method,
                path = %options.path,
                signature = %self.contract.signature(),
                "Route bound"
            );
            let contract = self.contract.clone();
            router = router.route(
                &options.path,
                on(
                    options.method.filter(),
                    move |path: Option<Path<HashMap<String, String>>>,
                          Query(query): Query<HashMap<String, String>>,
                          body: Option<Json<Value>>| async move {
                        let path = path.map(|Path(p)| p).unwrap_or_default();
                        let body = body.map(|Json(b)| b);
                        let args = gather_args(contract.params(), &path, &query, body.as_ref());
                        contract
                            .call(args)
                            .await
                            .map(|result| Json(CallResult { result }))
                            .map_err(HttpError::from)
                    },
                ),
            );
        }
        router
    }
}

/// Collect positional arguments by parameter name.
pub fn gather_args(
    params: &[String],
    path: &HashMap<String, String>,
    query: &HashMap<String, String>,
    body: Option<&Value>,
) -> Vec<Value> {
    params
        .iter()
        .map(|name| {
            path.get(name)
                .or_else(|| query.get(name))
                .map(|v| Value::String(v.clone()))
                .or_else(|| body.and_then(|b| b.get(name)).cloned())
                .unwrap_or(Value::Null)
        })
        .collect()
}
