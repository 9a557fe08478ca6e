//! Storage contracts shared by the task, history and session stores.

mod document_store;

pub use document_store::{DocumentStore, InMemoryDocumentStore, StoreError};
