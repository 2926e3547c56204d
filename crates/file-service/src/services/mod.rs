pub mod file_service;
pub mod object_store;

pub use file_service::FileService;
pub use object_store::{ObjectStore, S3ObjectStore};
