//! Prescription domain types.
//!
//! A [`Prescription`] carries the dispensing status, the ordered medication
//! lines, and an append-only audit log. Records are mutated through the
//! service in `services::prescriptions`, never in place by callers; partial
//! edits go through the explicit [`PrescriptionUpdate`] carrier so each field
//! is validated at the boundary instead of trusting arbitrary merges.

use crate::auth::Actor;
use crate::{PharmacyError, PharmacyResult};
use chrono::{DateTime, NaiveDate, Utc};
use fhir::{LastUpdated, MedicationRequestData, PrescriptionStatus};
use rx_types::{NonEmptyText, Quantity};
use serde::{Deserialize, Serialize};

/// A prescription held by the pharmacy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    /// `RX`-prefixed identifier. Assigned locally or taken from the external
    /// resource on import.
    pub id: String,
    pub patient_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    pub doctor_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_department: Option<String>,
    pub date: DateTime<Utc>,
    pub status: PrescriptionStatus,
    /// Total number of items to dispense.
    pub items: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinic_referral: Option<ClinicReferral>,
    pub medications: Vec<MedicationLine>,
    /// Append-only change history. Every status change appends exactly one
    /// entry; nothing ever removes or rewrites entries.
    pub audit_log: Vec<AuditEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pharmacist_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<LastUpdatedStamp>,
}

/// One medication on a prescription.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MedicationLine {
    pub drug_name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub quantity: u32,
    pub stock_available: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub administration_route: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub near_expiry: bool,
    #[serde(default)]
    pub low_stock: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub substitution: Option<Substitution>,
}

/// Record of a drug substitution on a medication line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Substitution {
    pub original_drug: String,
    pub substituted_drug: String,
    pub reason: String,
}

/// Referral metadata attached to prescriptions arriving from a clinic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClinicReferral {
    pub clinic_name: String,
    pub clinic_id: String,
    pub referral_date: DateTime<Utc>,
    pub diagnosis: String,
    pub patient_details: PatientDetails,
}

/// Patient context a referring clinic supplies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatientDetails {
    pub age: u32,
    pub gender: String,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub medical_history: Vec<String>,
}

/// One entry in a prescription's audit log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub actor_id: String,
    pub actor_role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl AuditEntry {
    pub fn new(action: impl Into<String>, actor: &Actor, notes: Option<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            action: action.into(),
            actor_id: actor.id.clone(),
            actor_role: actor.role.clone(),
            notes,
        }
    }
}

/// Server-side modification stamp mirrored from the external resource.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LastUpdatedStamp {
    pub timestamp: DateTime<Utc>,
    pub pharmacist_id: String,
}

impl From<LastUpdated> for LastUpdatedStamp {
    fn from(value: LastUpdated) -> Self {
        Self {
            timestamp: value.timestamp,
            pharmacist_id: value.pharmacist_id,
        }
    }
}

// ============================================================================
// Creation and update carriers
// ============================================================================

/// Validated input for creating a prescription.
///
/// The required fields use validated types, so an empty patient name or a
/// zero item count cannot reach the store at all.
#[derive(Clone, Debug, Deserialize)]
pub struct NewPrescription {
    pub patient_name: NonEmptyText,
    #[serde(default)]
    pub patient_id: Option<String>,
    pub doctor_name: NonEmptyText,
    #[serde(default)]
    pub doctor_department: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default = "default_status")]
    pub status: PrescriptionStatus,
    pub items: Quantity,
    #[serde(default)]
    pub clinic_referral: Option<ClinicReferral>,
    pub medications: Vec<NewMedicationLine>,
    #[serde(default)]
    pub pharmacist_notes: Option<String>,
}

fn default_status() -> PrescriptionStatus {
    PrescriptionStatus::Pending
}

/// Validated input for one medication line.
#[derive(Clone, Debug, Deserialize)]
pub struct NewMedicationLine {
    pub drug_name: NonEmptyText,
    pub dosage: NonEmptyText,
    pub frequency: NonEmptyText,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default = "default_line_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub stock_available: u32,
    #[serde(default)]
    pub administration_route: Option<String>,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
}

fn default_line_quantity() -> u32 {
    1
}

impl From<NewMedicationLine> for MedicationLine {
    fn from(line: NewMedicationLine) -> Self {
        MedicationLine {
            drug_name: line.drug_name.into_string(),
            dosage: line.dosage.into_string(),
            frequency: line.frequency.into_string(),
            duration: line.duration.unwrap_or_default(),
            quantity: line.quantity,
            stock_available: line.stock_available,
            administration_route: line.administration_route,
            expiry_date: line.expiry_date,
            near_expiry: false,
            low_stock: false,
            substitution: None,
        }
    }
}

/// Partial edit of a prescription's descriptive fields.
///
/// Each present field replaces the stored value after validation; absent
/// fields are untouched. Status is deliberately not here — status changes go
/// through the audit-logged workflow.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PrescriptionUpdate {
    pub patient_name: Option<String>,
    pub patient_id: Option<String>,
    pub doctor_name: Option<String>,
    pub doctor_department: Option<String>,
    pub pharmacist_notes: Option<String>,
}

impl Prescription {
    /// Apply a partial update, validating each present field.
    ///
    /// # Errors
    ///
    /// Returns [`PharmacyError::InvalidInput`] when a present name field is
    /// empty; the record is left unchanged in that case.
    pub fn apply_update(&mut self, update: PrescriptionUpdate) -> PharmacyResult<()> {
        let patient_name = update
            .patient_name
            .map(|name| {
                NonEmptyText::new(&name).map_err(|_| {
                    PharmacyError::InvalidInput("patient name must not be empty".into())
                })
            })
            .transpose()?;
        let doctor_name = update
            .doctor_name
            .map(|name| {
                NonEmptyText::new(&name).map_err(|_| {
                    PharmacyError::InvalidInput("doctor name must not be empty".into())
                })
            })
            .transpose()?;

        if let Some(name) = patient_name {
            self.patient_name = name.into_string();
        }
        if let Some(name) = doctor_name {
            self.doctor_name = name.into_string();
        }
        if let Some(id) = update.patient_id {
            self.patient_id = Some(id);
        }
        if let Some(department) = update.doctor_department {
            self.doctor_department = Some(department);
        }
        if let Some(notes) = update.pharmacist_notes {
            self.pharmacist_notes = Some(notes);
        }
        Ok(())
    }

    /// First medication line, if any. The external mapping and search both
    /// read only the leading line, as the original record shape did.
    pub fn first_medication(&self) -> Option<&MedicationLine> {
        self.medications.first()
    }

    /// Translate into the flat external carrier.
    pub fn to_external_data(&self) -> MedicationRequestData {
        let first = self.first_medication();
        MedicationRequestData {
            id: self.id.clone(),
            patient_name: self.patient_name.clone(),
            doctor_name: self.doctor_name.clone(),
            authored_on: Some(self.date),
            status: self.status,
            quantity: self.items,
            drug_name: first
                .map(|m| m.drug_name.clone())
                .unwrap_or_else(|| fhir::medication_request::UNKNOWN_DRUG.to_string()),
            dosage: first
                .map(|m| m.dosage.clone())
                .unwrap_or_else(|| fhir::medication_request::NOT_AVAILABLE.to_string()),
            route: first
                .and_then(|m| m.administration_route.clone())
                .unwrap_or_else(|| fhir::medication_request::NOT_AVAILABLE.to_string()),
            frequency: first
                .map(|m| m.frequency.clone())
                .unwrap_or_else(|| fhir::medication_request::NOT_AVAILABLE.to_string()),
            pharmacist_notes: self.pharmacist_notes.clone(),
            last_updated: self.last_updated.as_ref().map(|lu| LastUpdated {
                timestamp: lu.timestamp,
                pharmacist_id: lu.pharmacist_id.clone(),
            }),
        }
    }

    /// Build a prescription from the flat external carrier.
    ///
    /// `now` stands in for an absent or unparsable `authoredOn`; passing the
    /// clock in keeps the translation itself deterministic.
    pub fn from_external_data(data: MedicationRequestData, now: DateTime<Utc>) -> Self {
        let line = MedicationLine {
            drug_name: data.drug_name,
            dosage: data.dosage,
            frequency: data.frequency,
            duration: String::new(),
            quantity: data.quantity,
            stock_available: 0,
            administration_route: Some(data.route),
            expiry_date: None,
            near_expiry: false,
            low_stock: false,
            substitution: None,
        };

        Prescription {
            id: data.id,
            patient_name: data.patient_name,
            patient_id: None,
            doctor_name: data.doctor_name,
            doctor_department: None,
            date: data.authored_on.unwrap_or(now),
            status: data.status,
            items: data.quantity,
            clinic_referral: None,
            medications: vec![line],
            audit_log: Vec::new(),
            pharmacist_notes: data.pharmacist_notes,
            last_updated: data.last_updated.map(LastUpdatedStamp::from),
        }
    }
}
