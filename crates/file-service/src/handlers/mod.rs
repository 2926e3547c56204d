pub mod files;
pub mod health;

pub use health::health_check;
