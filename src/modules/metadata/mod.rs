//! Metadata persistence for files, tags, favorites and the activity log
//!
//! Services depend on the [`MetadataStore`] trait only. [`PgMetadataStore`] is
//! the production backend; [`MemoryMetadataStore`] keeps everything in process
//! and backs the test suite and `METADATA_BACKEND=memory` runs.

mod memory;
mod postgres;
mod store;

pub use memory::MemoryMetadataStore;
pub use postgres::PgMetadataStore;
pub use store::{FavoriteQuery, FileQuery, MetadataStore};
