pub mod books;

pub use books::BookMutations;

pub(crate) mod prelude {
    pub(crate) use std::sync::Arc;

    pub(crate) use async_graphql::{Context, Object};

    pub(crate) use crate::catalog::{Book, Catalog};
}
