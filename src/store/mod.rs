// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Durable country and image-metadata storage.

pub mod memory;
pub mod query;
pub mod sql;
pub mod traits;

pub use memory::InMemoryStore;
pub use query::{CountryQuery, SortDirection, SortField};
pub use sql::SqlStore;
pub use traits::{CountryStore, StorageError};
