pub mod files;

pub use files::{FileRepository, PgFileRepository};
