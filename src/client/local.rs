//! In-process transport: runs GraphQL documents straight against a schema.

use std::sync::Arc;

use async_graphql::{Request, Response, Variables};
use async_trait::async_trait;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::catalog::{Book, Catalog};
use crate::graphql::{CatalogSchema, SubscriptionAck, build_schema};

use super::transport::{
    ADD_BOOK_MUTATION, AddBookData, BOOK_ADDED_SUBSCRIPTION, BOOKS_QUERY, BookAddedData,
    BookStream, BooksData, CatalogTransport, ClientError, FIND_BOOKS_QUERY, GetBooksData, decode,
};

pub struct SchemaTransport {
    schema: CatalogSchema,
}

impl SchemaTransport {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            schema: build_schema(catalog),
        }
    }

    async fn execute<T: DeserializeOwned>(&self, request: Request) -> Result<T, ClientError> {
        let response = self.schema.execute(request).await;
        decode_response(&response)
    }
}

fn decode_response<T: DeserializeOwned>(response: &Response) -> Result<T, ClientError> {
    let body = serde_json::to_value(response)
        .map_err(|e| ClientError::GraphQL(format!("unserializable response: {e}")))?;
    decode(body)
}

#[async_trait]
impl CatalogTransport for SchemaTransport {
    async fn fetch_books(&self) -> Result<Vec<Book>, ClientError> {
        let data: BooksData = self.execute(Request::new(BOOKS_QUERY)).await?;
        Ok(data.into_books())
    }

    async fn find_books(&self, title: &str) -> Result<Vec<Book>, ClientError> {
        let request = Request::new(FIND_BOOKS_QUERY)
            .variables(Variables::from_json(json!({ "title": title })));
        let data: GetBooksData = self.execute(request).await?;
        Ok(data.into_books())
    }

    async fn add_book(&self, book: &Book) -> Result<Book, ClientError> {
        let request = Request::new(ADD_BOOK_MUTATION).variables(Variables::from_json(json!({
            "title": book.title,
            "author": book.author,
        })));
        let data: AddBookData = self.execute(request).await?;
        data.into_book()
    }

    async fn subscribe_book_added(&self) -> Result<BookStream, ClientError> {
        let request = Request::new(BOOK_ADDED_SUBSCRIPTION).data(SubscriptionAck);
        let mut responses = self.schema.execute_stream(request);

        // The acknowledgement only arrives once the resolver has registered.
        let first = responses.next().await.ok_or_else(|| {
            ClientError::Subscription("subscription ended before it became active".to_string())
        })?;
        match decode_response::<BookAddedData>(&first) {
            Ok(BookAddedData { book_added: None }) => {}
            Ok(BookAddedData { book_added: Some(_) }) => {
                return Err(ClientError::Subscription(
                    "missing subscription acknowledgement".to_string(),
                ));
            }
            Err(e) => return Err(ClientError::Subscription(e.to_string())),
        }

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    next = responses.next() => {
                        let Some(response) = next else { break };
                        match decode_response::<BookAddedData>(&response) {
                            Ok(BookAddedData { book_added: Some(book) }) => {
                                if tx.send(Ok(book)).is_err() {
                                    break;
                                }
                            }
                            Ok(BookAddedData { book_added: None }) => {}
                            Err(ClientError::GraphQL(msg)) => {
                                let _ = tx.send(Err(ClientError::Subscription(msg)));
                                break;
                            }
                            Err(e) => {
                                let _ = tx.send(Err(e));
                                break;
                            }
                        }
                    }
                }
            }
        });

        Ok(UnboundedReceiverStream::new(rx).boxed())
    }
}
