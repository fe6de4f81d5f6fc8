//! Internal and external status vocabularies and the mapping between them.
//!
//! The dispensing workflow uses its own nine-value [`PrescriptionStatus`]; the
//! oncology system speaks FHIR's eight-value `MedicationRequest.status`
//! ([`MedicationRequestStatus`]). The two are kept as separate tagged unions:
//! they are different vocabularies, and the translation between them is a pair
//! of fixed lookup tables that are **not** inverses of each other.
//!
//! Lossiness is intentional. `Completed`, `Dispensed` and `Filled` all render
//! as external `completed`, and only `Completed` maps back; inventing extra
//! external states to force a bijection would produce resources no FHIR peer
//! understands.

use serde::{Deserialize, Serialize};

/// Dispensing status of a prescription inside the pharmacy.
///
/// The set is flat: any status may follow any other. The workflow records each
/// change in the audit log rather than enforcing a transition table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrescriptionStatus {
    Pending,
    Filled,
    Rejected,
    PartiallyFilled,
    Processing,
    Completed,
    Dispensed,
    OnHold,
    AwaitingConfirmation,
}

impl PrescriptionStatus {
    /// All statuses, in a stable order. Useful for filter bars and tests.
    pub const ALL: [PrescriptionStatus; 9] = [
        PrescriptionStatus::Pending,
        PrescriptionStatus::Filled,
        PrescriptionStatus::Rejected,
        PrescriptionStatus::PartiallyFilled,
        PrescriptionStatus::Processing,
        PrescriptionStatus::Completed,
        PrescriptionStatus::Dispensed,
        PrescriptionStatus::OnHold,
        PrescriptionStatus::AwaitingConfirmation,
    ];

    /// Returns the snake_case name used in APIs and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            PrescriptionStatus::Pending => "pending",
            PrescriptionStatus::Filled => "filled",
            PrescriptionStatus::Rejected => "rejected",
            PrescriptionStatus::PartiallyFilled => "partially_filled",
            PrescriptionStatus::Processing => "processing",
            PrescriptionStatus::Completed => "completed",
            PrescriptionStatus::Dispensed => "dispensed",
            PrescriptionStatus::OnHold => "on_hold",
            PrescriptionStatus::AwaitingConfirmation => "awaiting_confirmation",
        }
    }

    /// Parse the snake_case name back into a status.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PrescriptionStatus::Pending),
            "filled" => Some(PrescriptionStatus::Filled),
            "rejected" => Some(PrescriptionStatus::Rejected),
            "partially_filled" => Some(PrescriptionStatus::PartiallyFilled),
            "processing" => Some(PrescriptionStatus::Processing),
            "completed" => Some(PrescriptionStatus::Completed),
            "dispensed" => Some(PrescriptionStatus::Dispensed),
            "on_hold" => Some(PrescriptionStatus::OnHold),
            "awaiting_confirmation" => Some(PrescriptionStatus::AwaitingConfirmation),
            _ => None,
        }
    }

    /// Render this status in the external `MedicationRequest.status` vocabulary.
    ///
    /// Fixed table; collapses several internal states onto the same external
    /// value, so this is not invertible.
    pub fn to_external(self) -> MedicationRequestStatus {
        match self {
            PrescriptionStatus::Pending => MedicationRequestStatus::Draft,
            PrescriptionStatus::Filled => MedicationRequestStatus::Completed,
            PrescriptionStatus::Rejected => MedicationRequestStatus::Cancelled,
            PrescriptionStatus::PartiallyFilled => MedicationRequestStatus::Active,
            PrescriptionStatus::Processing => MedicationRequestStatus::Active,
            PrescriptionStatus::Completed => MedicationRequestStatus::Completed,
            PrescriptionStatus::Dispensed => MedicationRequestStatus::Completed,
            PrescriptionStatus::OnHold => MedicationRequestStatus::OnHold,
            PrescriptionStatus::AwaitingConfirmation => MedicationRequestStatus::Active,
        }
    }

    /// True for statuses the workflow treats as final (no further dispensing
    /// action expected). Informational only; transitions out are still allowed.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PrescriptionStatus::Rejected
                | PrescriptionStatus::Completed
                | PrescriptionStatus::Dispensed
        )
    }
}

impl std::fmt::Display for PrescriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// FHIR `MedicationRequest.status` as the oncology system sends it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MedicationRequestStatus {
    Active,
    OnHold,
    Cancelled,
    Completed,
    EnteredInError,
    Stopped,
    Draft,
    Unknown,
}

impl MedicationRequestStatus {
    /// Returns the kebab-case wire token.
    pub fn as_wire(self) -> &'static str {
        match self {
            MedicationRequestStatus::Active => "active",
            MedicationRequestStatus::OnHold => "on-hold",
            MedicationRequestStatus::Cancelled => "cancelled",
            MedicationRequestStatus::Completed => "completed",
            MedicationRequestStatus::EnteredInError => "entered-in-error",
            MedicationRequestStatus::Stopped => "stopped",
            MedicationRequestStatus::Draft => "draft",
            MedicationRequestStatus::Unknown => "unknown",
        }
    }

    /// Parse a wire token. Unrecognised tokens degrade to `Unknown` rather than
    /// rejecting the resource; the oncology system's vocabulary may grow.
    pub fn from_wire(s: &str) -> Self {
        match s {
            "active" => MedicationRequestStatus::Active,
            "on-hold" => MedicationRequestStatus::OnHold,
            "cancelled" => MedicationRequestStatus::Cancelled,
            "completed" => MedicationRequestStatus::Completed,
            "entered-in-error" => MedicationRequestStatus::EnteredInError,
            "stopped" => MedicationRequestStatus::Stopped,
            "draft" => MedicationRequestStatus::Draft,
            _ => MedicationRequestStatus::Unknown,
        }
    }

    /// Map this external status into the pharmacy's vocabulary.
    ///
    /// Fixed table; several external values fold onto `Rejected`, and `Draft`
    /// and `Unknown` both read as `Pending`.
    pub fn to_internal(self) -> PrescriptionStatus {
        match self {
            MedicationRequestStatus::Active => PrescriptionStatus::Processing,
            MedicationRequestStatus::OnHold => PrescriptionStatus::OnHold,
            MedicationRequestStatus::Cancelled => PrescriptionStatus::Rejected,
            MedicationRequestStatus::Completed => PrescriptionStatus::Completed,
            MedicationRequestStatus::EnteredInError => PrescriptionStatus::Rejected,
            MedicationRequestStatus::Stopped => PrescriptionStatus::Rejected,
            MedicationRequestStatus::Draft => PrescriptionStatus::Pending,
            MedicationRequestStatus::Unknown => PrescriptionStatus::Pending,
        }
    }
}

impl std::fmt::Display for MedicationRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_wire())
    }
}
