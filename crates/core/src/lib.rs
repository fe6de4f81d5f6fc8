//! # RxDesk Core
//!
//! Core business logic for the RxDesk pharmacy dispensary system.
//!
//! This crate contains pure data operations and in-memory stores:
//! - Prescription records with a status workflow and append-only audit log
//! - Medicine inventory with derived stock status and query helpers
//! - Session-based authentication state
//!
//! **No API concerns**: HTTP servers and the oncology transport belong in
//! `api-rest` and `oncology`. This crate never performs I/O; importing and
//! exporting external resources goes through the flat carriers defined in the
//! `fhir` crate.

pub mod auth;
pub mod config;
pub mod error;
pub mod medicine;
pub mod prescription;
pub mod seed;
pub mod services;

pub use auth::{Actor, AuthState, SessionToken};
pub use config::CoreConfig;
pub use error::{PharmacyError, PharmacyResult};
pub use medicine::{
    matches_search, paginate, sort_medicines, stock_status, summarise, InventorySummary,
    Medicine, MedicineUpdate, NewMedicine, Paginator, SortConfig, SortDirection, SortKey,
    StockStatus,
};
pub use prescription::{
    AuditEntry, ClinicReferral, LastUpdatedStamp, MedicationLine, NewMedicationLine,
    NewPrescription, PatientDetails, Prescription, PrescriptionUpdate, Substitution,
};
pub use services::inventory::{InventoryPage, InventoryService, MedicineRow};
pub use services::prescriptions::PrescriptionService;

// The status vocabulary is owned by the FHIR boundary crate; re-export it so
// callers do not need a direct fhir dependency for everyday use.
pub use fhir::PrescriptionStatus;
