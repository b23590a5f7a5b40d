//! Validation errors for the domain model.
//!
//! These are shape-level errors raised when constructing domain values
//! (entities, relationships, events) outside of a running simulation. Errors
//! that occur while a `Run` is executing belong to `sim-core::SimError`.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum DomainError {
    #[error("entity uri must not be empty")]
    EmptyUri,
    #[error("relationship strength {0} out of range [0,1]")]
    InvalidStrength(String),
    #[error("utilization {0} out of range [0,1]")]
    InvalidUtilization(String),
    #[error("capacity {0} must be >= 0")]
    InvalidCapacity(String),
    #[error("duplicate entity uri: {0}")]
    DuplicateEntity(String),
    #[error("relationship references unknown entity: {0}")]
    DanglingRelationship(String),
    #[error("validation failed: {0}")]
    Validation(String),
}
