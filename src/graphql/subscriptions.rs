//! GraphQL subscriptions for real-time updates
//!
//! Subscriptions allow clients to receive push updates over WebSocket.
//!
//! A client can ask to be told when its subscription is live: with
//! [`SubscriptionAck`] in the request or connection data, `bookAdded` first
//! yields a single `null` item, emitted only after the subscriber has been
//! registered with the catalog. Over WebSocket this is requested with
//! `{"subscriptionAck": true}` in the `connection_init` payload.

use std::sync::Arc;

use async_graphql::{Context, Subscription};
use futures::{Stream, StreamExt, stream};

use crate::catalog::{Book, Catalog};

/// `connection_init` payload key that turns on [`SubscriptionAck`].
pub const ACK_INIT_PARAM: &str = "subscriptionAck";

/// Marker data: emit a `null` item once the subscription is registered.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubscriptionAck;

#[derive(Default)]
pub struct BookSubscriptions;

#[Subscription]
impl BookSubscriptions {
    /// Books added after this subscription started. No replay of earlier
    /// additions.
    async fn book_added<'ctx>(
        &self,
        ctx: &Context<'ctx>,
    ) -> impl Stream<Item = Option<Book>> + 'ctx {
        let catalog = ctx.data_unchecked::<Arc<Catalog>>();
        let events = catalog.subscribe_book_added();
        let ack = ctx.data_opt::<SubscriptionAck>().is_some();
        tracing::debug!(
            subscribers = catalog.subscriber_count(),
            ack,
            "bookAdded subscription opened"
        );
        stream::iter(ack.then_some(None)).chain(events.map(Some))
    }
}
