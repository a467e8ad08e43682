mod access;
mod download_service;
mod file_service;
mod listing_service;
mod upload_service;

pub use access::load_owned_file;
pub use download_service::DownloadService;
pub use file_service::FileService;
pub use listing_service::ListingService;
pub use upload_service::UploadService;
