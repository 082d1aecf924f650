//! GraphQL API with subscriptions for real-time updates
//!
//! This module provides a GraphQL API using async-graphql with support for
//! queries, mutations, and subscriptions over WebSocket.
//!
//! Each domain contributes a `*Queries` / `*Mutations` / `*Subscriptions`
//! struct that is merged into the root types in `schema.rs`.

pub mod mutations;
pub mod queries;
mod schema;
pub mod service;
mod subscriptions;
pub mod types;

pub use schema::{CatalogSchema, MutationRoot, QueryRoot, SubscriptionRoot, build_schema};
pub use service::{GraphqlService, GraphqlServiceConfig};
pub use subscriptions::{ACK_INIT_PARAM, BookSubscriptions, SubscriptionAck};
