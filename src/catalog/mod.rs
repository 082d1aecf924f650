//! The book catalog: an append-only, in-memory list of books plus the event
//! channel that announces each addition.
//!
//! A single [`Catalog`] is constructed at startup by the catalog service and
//! handed to the GraphQL schema as data. Nothing here is global.

mod book;
pub mod pubsub;

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

pub use book::{Book, seed_books};
pub use pubsub::{PubSub, Subscription};

/// Topic that carries every newly added [`Book`].
pub const BOOK_ADDED: &str = "BOOK_ADDED";

/// Owned book store and its event channel.
pub struct Catalog {
    books: RwLock<Vec<Book>>,
    events: Arc<PubSub<Book>>,
}

impl Catalog {
    pub fn new(books: Vec<Book>) -> Self {
        Self {
            books: RwLock::new(books),
            events: PubSub::new(),
        }
    }

    /// A catalog holding the two seed records.
    pub fn seeded() -> Self {
        Self::new(seed_books())
    }

    /// Every book in insertion order.
    pub fn books(&self) -> Vec<Book> {
        self.books.read().clone()
    }

    /// Books whose title equals `title` exactly (case-sensitive).
    pub fn find_by_title(&self, title: &str) -> Vec<Book> {
        self.books
            .read()
            .iter()
            .filter(|b| b.title == title)
            .cloned()
            .collect()
    }

    /// Append a book and publish it on [`BOOK_ADDED`].
    ///
    /// The write lock is held across the publish so concurrent adds are
    /// delivered in the same order they were stored. No validation or
    /// deduplication happens here; empty strings are stored as given.
    pub fn add_book(&self, title: String, author: String) -> Book {
        let book = Book { title, author };
        let mut books = self.books.write();
        books.push(book.clone());
        let delivered = self.events.publish(BOOK_ADDED, book.clone());
        debug!(
            title = %book.title,
            author = %book.author,
            total = books.len(),
            delivered,
            "Book added"
        );
        book
    }

    /// Subscribe to books added from now on.
    pub fn subscribe_book_added(&self) -> Subscription<Book> {
        self.events.subscribe(BOOK_ADDED)
    }

    /// Number of live `BOOK_ADDED` subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.events.subscriber_count(BOOK_ADDED)
    }

    /// End every open `BOOK_ADDED` stream. Returns how many were closed.
    pub fn close_subscriptions(&self) -> usize {
        self.events.close()
    }

    pub fn len(&self) -> usize {
        self.books.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.read().is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::seeded()
    }
}
