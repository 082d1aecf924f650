use super::prelude::*;

#[derive(Default)]
pub struct BookMutations;

#[Object]
impl BookMutations {
    /// Add a book and notify `bookAdded` subscribers.
    ///
    /// Only non-null is enforced; empty strings are accepted and stored.
    async fn add_book(&self, ctx: &Context<'_>, title: String, author: String) -> Option<Book> {
        let catalog = ctx.data_unchecked::<Arc<Catalog>>();
        if title.is_empty() || author.is_empty() {
            tracing::warn!(title = %title, author = %author, "Storing book with an empty field");
        }
        Some(catalog.add_book(title, author))
    }
}
