//! API endpoint implementations.

mod agents;
mod auth;
mod chat;

pub use agents::AgentsApi;
pub use auth::AuthApi;
pub use chat::ChatApi;
