//! Transport seam between the book list and a catalog server.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::catalog::Book;

pub const BOOKS_QUERY: &str = "query GetBooks { books { title author } }";

pub const FIND_BOOKS_QUERY: &str =
    "query FindBooks($title: String!) { getBooks(title: $title) { title author } }";

pub const ADD_BOOK_MUTATION: &str = "mutation AddBook($title: String!, $author: String!) { \
     addBook(title: $title, author: $author) { title author } }";

pub const BOOK_ADDED_SUBSCRIPTION: &str = "subscription BookAdded { bookAdded { title author } }";

/// Failures surfaced to the caller. Nothing is retried.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Rejected locally; the server was never contacted.
    #[error("cannot add an invalid book: {0}")]
    InvalidBook(&'static str),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("graphql error: {0}")]
    GraphQL(String),

    #[error("subscription error: {0}")]
    Subscription(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}

/// Stream of books pushed by a `bookAdded` subscription. An `Err` item ends it.
pub type BookStream = BoxStream<'static, Result<Book, ClientError>>;

#[async_trait]
pub trait CatalogTransport: Send + Sync + 'static {
    /// `books` query.
    async fn fetch_books(&self) -> Result<Vec<Book>, ClientError>;

    /// `getBooks(title)` query.
    async fn find_books(&self, title: &str) -> Result<Vec<Book>, ClientError>;

    /// `addBook` mutation.
    async fn add_book(&self, book: &Book) -> Result<Book, ClientError>;

    /// Open a `bookAdded` subscription. Resolves once the stream is active, so
    /// books added afterwards are guaranteed to be delivered.
    async fn subscribe_book_added(&self) -> Result<BookStream, ClientError>;
}

#[derive(Debug, Deserialize)]
struct GraphQLErrorMessage {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GraphQLEnvelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQLErrorMessage>,
}

pub(crate) fn join_errors<'a>(messages: impl IntoIterator<Item = &'a str>) -> String {
    messages.into_iter().collect::<Vec<_>>().join("; ")
}

/// Decode a `{data, errors}` response body. Any error entry fails the whole response.
pub(crate) fn decode<T: DeserializeOwned>(body: serde_json::Value) -> Result<T, ClientError> {
    let envelope: GraphQLEnvelope<T> = serde_json::from_value(body)
        .map_err(|e| ClientError::GraphQL(format!("malformed response: {e}")))?;
    if !envelope.errors.is_empty() {
        return Err(ClientError::GraphQL(join_errors(
            envelope.errors.iter().map(|e| e.message.as_str()),
        )));
    }
    envelope
        .data
        .ok_or_else(|| ClientError::GraphQL("response carried no data".to_string()))
}

#[derive(Debug, Deserialize)]
pub(crate) struct BooksData {
    books: Option<Vec<Option<Book>>>,
}

impl BooksData {
    pub(crate) fn into_books(self) -> Vec<Book> {
        self.books.into_iter().flatten().flatten().collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GetBooksData {
    get_books: Option<Vec<Option<Book>>>,
}

impl GetBooksData {
    pub(crate) fn into_books(self) -> Vec<Book> {
        self.get_books.into_iter().flatten().flatten().collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddBookData {
    add_book: Option<Book>,
}

impl AddBookData {
    pub(crate) fn into_book(self) -> Result<Book, ClientError> {
        self.add_book
            .ok_or_else(|| ClientError::GraphQL("addBook returned null".to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BookAddedData {
    pub(crate) book_added: Option<Book>,
}
