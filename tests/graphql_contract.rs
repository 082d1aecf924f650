//! Query, mutation and subscription behaviour of the catalog schema.

mod common;

use std::sync::Arc;

use async_graphql::{Request, Variables};
use book_catalog::catalog::Catalog;
use book_catalog::graphql::{CatalogSchema, SubscriptionAck, build_schema};
use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;

use common::{assert_no_event, data, next_event, open_subscription};

fn setup() -> (Arc<Catalog>, CatalogSchema) {
    let catalog = Arc::new(Catalog::seeded());
    let schema = build_schema(catalog.clone());
    (catalog, schema)
}

async fn add_book(schema: &CatalogSchema, title: &str, author: &str) -> serde_json::Value {
    let request = Request::new(
        "mutation Add($title: String!, $author: String!) { addBook(title: $title, author: $author) { title author } }",
    )
    .variables(Variables::from_json(json!({ "title": title, "author": author })));
    data(schema.execute(request).await)
}

async fn titles(schema: &CatalogSchema) -> Vec<String> {
    let books = data(schema.execute("{ books { title } }").await);
    books["books"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["title"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_dune_scenario() {
    let (catalog, schema) = setup();
    let mut events = open_subscription(&schema, &catalog).await;

    let added = add_book(&schema, "Dune", "Herbert").await;
    assert_eq!(added, json!({ "addBook": { "title": "Dune", "author": "Herbert" } }));

    assert_eq!(
        titles(&schema).await,
        vec![
            "Harry Potter and the Chamber of Secrets",
            "Jurassic Park",
            "Dune",
        ]
    );

    assert_eq!(
        next_event(&mut events).await,
        json!({ "bookAdded": { "title": "Dune", "author": "Herbert" } })
    );
    assert_no_event(&mut events).await;
}

#[tokio::test]
async fn test_books_follow_call_order() {
    let (_catalog, schema) = setup();
    for (title, author) in [("A", "1"), ("B", "2"), ("C", "3")] {
        add_book(&schema, title, author).await;
    }
    let got = titles(&schema).await;
    assert_eq!(got.len(), 5);
    assert_eq!(got[2..], ["A", "B", "C"]);
}

#[tokio::test]
async fn test_get_books_exact_match_only() {
    let (_catalog, schema) = setup();
    let query = |title: &str| {
        Request::new("query Find($title: String!) { getBooks(title: $title) { title author } }")
            .variables(Variables::from_json(json!({ "title": title })))
    };

    let found = data(schema.execute(query("Jurassic Park")).await);
    assert_eq!(
        found,
        json!({ "getBooks": [ { "title": "Jurassic Park", "author": "Michael Crichton" } ] })
    );

    for miss in ["jurassic park", "Jurassic", "Jurassic Park ", "Neuromancer"] {
        let found = data(schema.execute(query(miss)).await);
        assert_eq!(found, json!({ "getBooks": [] }), "title {miss:?}");
    }
}

#[tokio::test]
async fn test_add_then_get_round_trip() {
    let (_catalog, schema) = setup();
    add_book(&schema, "Dune", "Herbert").await;

    let found = data(
        schema
            .execute(r#"{ getBooks(title: "Dune") { title author } }"#)
            .await,
    );
    assert_eq!(
        found,
        json!({ "getBooks": [ { "title": "Dune", "author": "Herbert" } ] })
    );
}

#[tokio::test]
async fn test_duplicates_create_two_entries_and_two_events() {
    let (catalog, schema) = setup();
    let mut events = open_subscription(&schema, &catalog).await;

    add_book(&schema, "Dune", "Herbert").await;
    add_book(&schema, "Dune", "Herbert").await;

    let found = data(schema.execute(r#"{ getBooks(title: "Dune") { author } }"#).await);
    assert_eq!(found["getBooks"].as_array().unwrap().len(), 2);

    let expected = json!({ "bookAdded": { "title": "Dune", "author": "Herbert" } });
    assert_eq!(next_event(&mut events).await, expected);
    assert_eq!(next_event(&mut events).await, expected);
}

#[tokio::test]
async fn test_every_active_subscriber_gets_one_event_and_late_ones_none() {
    let (catalog, schema) = setup();
    let mut first = open_subscription(&schema, &catalog).await;
    let mut second = open_subscription(&schema, &catalog).await;

    add_book(&schema, "Dune", "Herbert").await;
    let mut late = open_subscription(&schema, &catalog).await;
    assert_no_event(&mut late).await;

    add_book(&schema, "Emma", "Austen").await;

    let dune = json!({ "bookAdded": { "title": "Dune", "author": "Herbert" } });
    let emma = json!({ "bookAdded": { "title": "Emma", "author": "Austen" } });
    for rx in [&mut first, &mut second] {
        assert_eq!(next_event(rx).await, dune);
        assert_eq!(next_event(rx).await, emma);
        assert_no_event(rx).await;
    }
    assert_eq!(next_event(&mut late).await, emma);
}

#[tokio::test]
async fn test_empty_title_accepted_by_server() {
    let (catalog, schema) = setup();
    let added = add_book(&schema, "", "X").await;
    assert_eq!(added, json!({ "addBook": { "title": "", "author": "X" } }));
    assert_eq!(catalog.len(), 3);
}

#[tokio::test]
async fn test_missing_author_rejected_without_side_effects() {
    let (catalog, schema) = setup();
    let mut events = open_subscription(&schema, &catalog).await;

    let response = schema
        .execute(r#"mutation { addBook(title: "Dune") { title } }"#)
        .await;
    assert!(!response.errors.is_empty());
    assert_eq!(catalog.len(), 2);
    assert_no_event(&mut events).await;

    let response = schema
        .execute(Request::new(
            "mutation Add($title: String!, $author: String!) { addBook(title: $title, author: $author) { title } }",
        ).variables(Variables::from_json(json!({ "title": "Dune", "author": null }))))
        .await;
    assert!(!response.errors.is_empty());
    assert_eq!(catalog.len(), 2);
}

#[tokio::test]
async fn test_acknowledged_subscription_is_registered_before_first_item() {
    let (catalog, schema) = setup();
    let mut stream = schema.execute_stream(
        Request::new("subscription { bookAdded { title author } }").data(SubscriptionAck),
    );
    assert_eq!(catalog.subscriber_count(), 0);

    let ack = stream.next().await.unwrap();
    assert_eq!(data(ack), json!({ "bookAdded": null }));
    assert_eq!(catalog.subscriber_count(), 1);

    add_book(&schema, "Dune", "Herbert").await;
    assert_eq!(
        data(stream.next().await.unwrap()),
        json!({ "bookAdded": { "title": "Dune", "author": "Herbert" } })
    );

    drop(stream);
    assert_eq!(catalog.subscriber_count(), 0);
}
