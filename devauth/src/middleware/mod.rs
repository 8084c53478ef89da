pub mod app_auth;
pub mod auth;
pub mod rate_limit;

pub use app_auth::{app_auth_middleware, AppContext, AppId};
pub use auth::{auth_middleware, portal_auth_middleware, CurrentUser, PortalDeveloper};
pub use rate_limit::rate_limit_middleware;
