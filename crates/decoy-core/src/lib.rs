//! Decoy Core
//!
//! Request interception engine: a per-context registry of overrides keyed by
//! method, path pattern and virtual host, and a dispatcher that decides per
//! request whether to synthesize a response or let the application run.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod registry;
pub mod request;
pub mod response;
pub mod routing;

pub use config::OverrideConfig;
pub use dispatch::{Dispatcher, Outcome};
pub use error::{CoreError, HandlerFailure, RouteError, ValidationErrors};
pub use host::OverrideHost;
pub use registry::{
    ActivationPolicy, HandlerSpec, OverrideEntry, OverrideId, OverrideSpec, OverrideSummary,
    PolicyKind, Registry, ResponseSpec, StaticHandlerSpec, StaticResponse, ValidatedOverride,
    VirtualHosts,
};
pub use request::InterceptedRequest;
pub use response::{OverrideHandler, OverrideResponse, RequestFilter};
pub use routing::{OverrideRouter, PathPattern, RouteMatch, RouteTable};
