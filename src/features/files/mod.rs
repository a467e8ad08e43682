pub mod dtos;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

pub use handlers::FileState;
pub use services::{DownloadService, FileService, ListingService, UploadService};
