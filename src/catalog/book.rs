//! Book entity

use async_graphql::SimpleObject;
use serde::{Deserialize, Serialize};

/// A catalog entry. Books carry no identifier; lookups match on `title`.
#[derive(Debug, Clone, PartialEq, Eq, SimpleObject, Serialize, Deserialize)]
pub struct Book {
    pub title: String,
    pub author: String,
}

impl Book {
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
        }
    }
}

/// Records every catalog starts with.
pub fn seed_books() -> Vec<Book> {
    vec![
        Book::new("Harry Potter and the Chamber of Secrets", "J.K. Rowling"),
        Book::new("Jurassic Park", "Michael Crichton"),
    ]
}
