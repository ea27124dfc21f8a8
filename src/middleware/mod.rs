pub mod auth;

pub use auth::{auth_middleware, is_landlord, is_tenant, AppState, AuthUser};
