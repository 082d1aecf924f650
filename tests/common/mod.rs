#![allow(dead_code)]

use std::time::Duration;

use async_graphql::Response;
use book_catalog::catalog::Catalog;
use book_catalog::graphql::CatalogSchema;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;

pub const WAIT: Duration = Duration::from_secs(5);

/// Poll `cond` until it holds, failing the test after [WAIT].
pub async fn wait_until(cond: impl Fn() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Data of a successful response.
pub fn data(response: Response) -> Value {
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    response.data.into_json().unwrap()
}

/// Open a `bookAdded` subscription against the schema and return once it is
/// registered with the catalog.
pub async fn open_subscription(
    schema: &CatalogSchema,
    catalog: &Catalog,
) -> mpsc::UnboundedReceiver<Value> {
    let before = catalog.subscriber_count();
    let mut stream = schema.execute_stream("subscription { bookAdded { title author } }");
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(response) = stream.next().await {
            if tx.send(data(response)).is_err() {
                break;
            }
        }
    });
    wait_until(|| catalog.subscriber_count() > before).await;
    rx
}

/// Next event, failing the test after [WAIT].
pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<Value>) -> Value {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("no event in time")
        .expect("subscription ended")
}

/// Assert nothing is delivered within a short grace period.
pub async fn assert_no_event(rx: &mut mpsc::UnboundedReceiver<Value>) {
    let got = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
    assert!(got.is_err(), "unexpected event: {:?}", got);
}
