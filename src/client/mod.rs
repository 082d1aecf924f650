//! Client-side book list.
//!
//! [`BookListController`] keeps a local copy of the catalog: it loads the full
//! list once, then appends every book pushed by the `bookAdded` subscription.
//! New books are never merged from the mutation result; they arrive through the
//! subscription like everyone else's.
//!
//! The initial fetch completes before the subscription is opened, so a book
//! added by another client between the two is missing locally until the next
//! [`BookListController::reload`]. Events are appended without deduplication:
//! a reload racing a pushed event can leave that book in the list twice.

pub mod local;
pub mod remote;
pub mod transport;

use std::sync::Arc;

use futures::StreamExt;
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::catalog::Book;

pub use local::SchemaTransport;
pub use remote::HttpTransport;
pub use transport::{BookStream, CatalogTransport, ClientError};

/// Lifecycle of the controller's subscription stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Connecting,
    Active,
    Closed,
    Errored,
}

/// Input form for a new book.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookForm {
    pub title: String,
    pub author: String,
}

impl BookForm {
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
        }
    }

    /// Both fields must be non-empty.
    pub fn validate(&self) -> Result<Book, ClientError> {
        if self.title.is_empty() {
            return Err(ClientError::InvalidBook("title is required"));
        }
        if self.author.is_empty() {
            return Err(ClientError::InvalidBook("author is required"));
        }
        Ok(Book::new(self.title.clone(), self.author.clone()))
    }

    pub fn clear(&mut self) {
        self.title.clear();
        self.author.clear();
    }
}

#[derive(Debug)]
pub struct BookListController<T: CatalogTransport> {
    transport: Arc<T>,
    books: Arc<RwLock<Vec<Book>>>,
    state: Arc<watch::Sender<SubscriptionState>>,
    revision: Arc<watch::Sender<u64>>,
    pump: Option<JoinHandle<()>>,
}

impl<T: CatalogTransport> BookListController<T> {
    /// Load the full list, then open the subscription for the controller's lifetime.
    ///
    /// A failed fetch is returned to the caller. A failed subscription leaves the
    /// controller usable with its state set to [`SubscriptionState::Errored`].
    pub async fn init(transport: T) -> Result<Self, ClientError> {
        let (state, _) = watch::channel(SubscriptionState::Connecting);
        let (revision, _) = watch::channel(0u64);
        let mut controller = Self {
            transport: Arc::new(transport),
            books: Arc::new(RwLock::new(Vec::new())),
            state: Arc::new(state),
            revision: Arc::new(revision),
            pump: None,
        };

        controller.reload().await?;

        match controller.transport.subscribe_book_added().await {
            Ok(stream) => {
                controller.state.send_replace(SubscriptionState::Active);
                controller.pump = Some(tokio::spawn(pump_events(
                    stream,
                    controller.books.clone(),
                    controller.state.clone(),
                    controller.revision.clone(),
                )));
            }
            Err(e) => {
                warn!(error = %e, "bookAdded subscription failed to start");
                controller.state.send_replace(SubscriptionState::Errored);
            }
        }

        Ok(controller)
    }

    /// Snapshot of the local list.
    pub fn books(&self) -> Vec<Book> {
        self.books.read().clone()
    }

    pub fn subscription_state(&self) -> SubscriptionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SubscriptionState> {
        self.state.subscribe()
    }

    /// Ticks every time the local list changes.
    pub fn refreshes(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Replace the local list with a fresh `books` query result.
    pub async fn reload(&self) -> Result<(), ClientError> {
        let fetched = self.transport.fetch_books().await?;
        debug!(count = fetched.len(), "Book list loaded");
        *self.books.write() = fetched;
        self.revision.send_modify(|r| *r += 1);
        Ok(())
    }

    /// Books with exactly this title, straight from the server.
    pub async fn find_books(&self, title: &str) -> Result<Vec<Book>, ClientError> {
        self.transport.find_books(title).await
    }

    /// Validate and submit the form. On success the form is cleared; the book
    /// itself shows up once the subscription delivers it.
    pub async fn add_book(&self, form: &mut BookForm) -> Result<(), ClientError> {
        let book = form.validate()?;
        self.transport.add_book(&book).await?;
        form.clear();
        Ok(())
    }

    /// Stop listening for new books.
    pub fn close(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
            self.state.send_if_modified(|s| {
                if *s == SubscriptionState::Active {
                    *s = SubscriptionState::Closed;
                    true
                } else {
                    false
                }
            });
        }
    }
}

impl<T: CatalogTransport> Drop for BookListController<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn pump_events(
    mut stream: BookStream,
    books: Arc<RwLock<Vec<Book>>>,
    state: Arc<watch::Sender<SubscriptionState>>,
    revision: Arc<watch::Sender<u64>>,
) {
    while let Some(event) = stream.next().await {
        match event {
            Ok(book) => {
                debug!(title = %book.title, "Book received");
                books.write().push(book);
                revision.send_modify(|r| *r += 1);
            }
            Err(e) => {
                warn!(error = %e, "bookAdded subscription errored");
                state.send_replace(SubscriptionState::Errored);
                return;
            }
        }
    }
    state.send_replace(SubscriptionState::Closed);
}
