//! HTTP route binding for defensive contracts
//!
//! ```ignore
//! let router = bind(get_user, RouteOptions::get("/users/:id"))
//!     .route(RouteOptions::post("/users/lookup"))
//!     .into_router();
//! ```
//!
//! Responses:
//!
//! - `200` with `{"result": ...}` on success
//! - `400` with the error report when validation fails
//! - `500` with the error report otherwise

pub mod response;
pub mod route;

pub use response::{CallResult, HttpError};
pub use route::{bind, gather_args, BoundContract, HttpMethod, RouteOptions, RoutedContract};
