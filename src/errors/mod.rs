pub mod types;

pub use types::{FieldViolation, SightlineError, ValidationError};
