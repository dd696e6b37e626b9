pub mod attachments;
pub mod auth;
pub mod blob;
pub mod error;
pub mod keywords;
pub mod models;
pub mod openapi;
pub mod posts;
pub mod questions;
pub mod routes;
pub mod store;
pub mod users;
pub mod votes;

// Re-export commonly used items for tests / external users
pub use routes::{config, AppState};
pub use store::Store;
