pub mod projection_handler;

pub use projection_handler::{EnrollmentEvent, EnrollmentEventHandler, QUEUE, ROUTING_KEYS};
