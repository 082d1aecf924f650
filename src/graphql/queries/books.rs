use super::prelude::*;

#[derive(Default)]
pub struct BookQueries;

#[Object]
impl BookQueries {
    /// All books in insertion order
    async fn books(&self, ctx: &Context<'_>) -> BookList {
        let catalog = ctx.data_unchecked::<Arc<Catalog>>();
        Some(catalog.books().into_iter().map(Some).collect())
    }

    /// Books whose title matches exactly (case-sensitive)
    async fn get_books(&self, ctx: &Context<'_>, title: String) -> BookList {
        let catalog = ctx.data_unchecked::<Arc<Catalog>>();
        let found: Vec<Option<Book>> = catalog
            .find_by_title(&title)
            .into_iter()
            .map(Some)
            .collect();
        tracing::debug!(title = %title, matches = found.len(), "getBooks");
        Some(found)
    }
}
