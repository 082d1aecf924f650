//! GraphQL schema definition with queries, mutations, and subscriptions
//!
//! Root types are named `Query`, `Mutation` and `Subscription` so the SDL
//! matches the published book contract.

use std::sync::Arc;

use async_graphql::extensions::Tracing;
use async_graphql::{MergedObject, MergedSubscription, Schema};

use crate::catalog::Catalog;

use super::mutations::BookMutations;
use super::queries::BookQueries;
use super::subscriptions::BookSubscriptions;

/// The GraphQL schema type
pub type CatalogSchema = Schema<QueryRoot, MutationRoot, SubscriptionRoot>;

#[derive(MergedObject, Default)]
#[graphql(name = "Query")]
pub struct QueryRoot(BookQueries);

#[derive(MergedObject, Default)]
#[graphql(name = "Mutation")]
pub struct MutationRoot(BookMutations);

#[derive(MergedSubscription, Default)]
#[graphql(name = "Subscription")]
pub struct SubscriptionRoot(BookSubscriptions);

/// Build the GraphQL schema over an owned catalog.
pub fn build_schema(catalog: Arc<Catalog>) -> CatalogSchema {
    Schema::build(
        QueryRoot::default(),
        MutationRoot::default(),
        SubscriptionRoot::default(),
    )
    .data(catalog)
    .extension(Tracing)
    .finish()
}
