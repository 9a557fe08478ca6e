//! File-backed storage: one JSON document per key under a data directory.

pub mod json_file_store;

pub use json_file_store::JsonFileStore;
