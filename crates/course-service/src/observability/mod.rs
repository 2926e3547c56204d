pub mod metrics;

pub use metrics::record_projection_update;
