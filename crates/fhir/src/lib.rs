//! FHIR wire/boundary support for the oncology integration.
//!
//! This crate provides **wire models** and **format/translation helpers** for the
//! `MedicationRequest` resources exchanged with the oncology system:
//! - JSON wire structs matching the subset of FHIR this system consumes
//! - translation between domain primitives and wire structs
//! - the internal/external status vocabularies and the fixed mapping between them
//!
//! This crate focuses on:
//! - FHIR semantic alignment (without claiming full-schema validation)
//! - serialisation/deserialisation
//! - tolerant translation: missing fields degrade to placeholder values, they do
//!   not reject the resource
//!
//! The status mapping is deliberately lossy: several internal dispensing states
//! render as the same external value, so a round trip does not preserve every
//! internal status. See [`PrescriptionStatus::to_external`].

pub mod medication_request;
pub mod status;

// Re-export facades
pub use medication_request::MedicationRequest;

// Re-export public domain-level types
pub use medication_request::{generate_prescription_id, LastUpdated, MedicationRequestData};
pub use status::{MedicationRequestStatus, PrescriptionStatus};

/// Errors returned by the `fhir` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("translation error: {0}")]
    Translation(String),
}

/// Type alias for Results that can fail with a [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;
