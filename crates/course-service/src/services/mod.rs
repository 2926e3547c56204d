pub mod projection_handler;

pub use projection_handler::{CourseEvent, CourseEventHandler, QUEUE, ROUTING_KEYS};
