//! Entity store.
//!
//! Generation-checked entity handles plus type-indexed dense component tables.
//! Handles never point into storage; tables may reallocate and compact freely.

mod entity;
mod error;
mod query;
mod store;
mod table;

pub use entity::Entity;
pub use error::StoreError;
pub use query::{ComponentSet, Query, QueryCursor, QueryIter, Span};
pub use store::EntityStore;
pub use table::{Component, ComponentTable};
