//! GraphQL-facing type aliases.
//!
//! The published contract declares list fields as `[Book]` (nullable list of
//! nullable books), so resolvers return this shape rather than `Vec<Book>`,
//! which async-graphql would render as `[Book!]!`.

use crate::catalog::Book;

/// Renders as `[Book]` in the SDL.
pub type BookList = Option<Vec<Option<Book>>>;
