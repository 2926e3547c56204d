pub mod meetings;

pub use meetings::{MeetingRepository, PgMeetingRepository};
