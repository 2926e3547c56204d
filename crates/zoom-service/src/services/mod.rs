pub mod meeting_service;
pub mod provider;

pub use meeting_service::MeetingService;
pub use provider::{MeetingProvider, ZoomClient};
