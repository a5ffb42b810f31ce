//! Episode validation
//!
//! Every payload is validated before it can reach the storage engine.
//!
//! # Design Principles
//!
//! - Validation is a pure function of the payload
//! - Every violated field is reported, not just the first
//! - No implicit coercion: a string is never accepted where a number is expected
//!
//! # Invariants
//!
//! - `agent_id` is present and non-empty
//! - `status` is one of success, failure, partial
//! - `step_index` values are non-negative and unique within an episode
//! - `step_type` is a non-empty identifier
//! - Conditional step fields only appear on the step types they belong to

mod errors;
mod validator;

pub use errors::{FieldViolation, ValidationError};
pub use validator::{validate_draft, validate_payload};
