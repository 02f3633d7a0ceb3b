pub mod model;

pub use model::{fields_from_value, parse_fields, Fields, Reading, TIMESTAMP_KEY};
