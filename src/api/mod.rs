//! Plain HTTP routes served next to the GraphQL endpoint.

pub mod health;
