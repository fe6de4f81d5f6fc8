//! In-memory record services.
//!
//! Each service owns its records behind an `RwLock` and exposes validated
//! operations; callers never mutate records directly.

pub mod inventory;
pub mod prescriptions;
