pub mod health;
pub mod meetings;

pub use health::health_check;
