//! Book catalog: an in-memory list of books served over GraphQL, with a
//! `bookAdded` subscription pushed over WebSocket, plus a client-side book list
//! that follows the catalog live.

pub mod api;
pub mod app;
pub mod catalog;
pub mod cli;
pub mod client;
pub mod config;
pub mod graphql;
pub mod services;

pub use app::AppState;
