//! FHIR-aligned `MedicationRequest` wire models and translation helpers.
//!
//! This module provides both domain-level types and wire models for the
//! medication request resources exchanged with the oncology system.
//!
//! Responsibilities:
//! - Define a flat domain-level carrier for external API use
//! - Define a tolerant wire model for serialisation/deserialisation
//! - Provide translation helpers between domain primitives and the wire model
//! - Degrade missing fields to placeholder values instead of rejecting
//!
//! Notes:
//! - Translation is pure and stateless; no shared mutable state crosses the
//!   boundary
//! - Unknown keys on incoming resources are tolerated: real FHIR payloads carry
//!   far more than the subset this system reads

use crate::status::{MedicationRequestStatus, PrescriptionStatus};
use crate::{FhirError, FhirResult};
use chrono::{DateTime, Utc};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Placeholder used when the external resource has no subject display.
pub const UNKNOWN_PATIENT: &str = "Unknown Patient";
/// Placeholder used when the external resource has no requester display.
pub const UNKNOWN_DOCTOR: &str = "Unknown Doctor";
/// Placeholder used when the external resource names no medication.
pub const UNKNOWN_DRUG: &str = "Unknown Drug";
/// Placeholder for absent dosage, route or frequency text.
pub const NOT_AVAILABLE: &str = "N/A";

/// Pharmacist id recorded when the resource metadata carries no version id.
const DEFAULT_PHARMACIST_ID: &str = "PHARM001";

// ============================================================================
// Public domain-level types
// ============================================================================

/// Domain-level carrier for a medication request (flat structure).
///
/// The wire format nests identifiers, references and dosage instructions;
/// this flat structure extracts the first entry of each list, which is all the
/// dispensing workflow consumes.
#[derive(Clone, Debug, PartialEq)]
pub struct MedicationRequestData {
    /// Prescription identifier (`RX`-prefixed in locally created records).
    pub id: String,

    /// Patient display name.
    pub patient_name: String,

    /// Requesting doctor display name.
    pub doctor_name: String,

    /// When the request was authored. Absent when the external resource
    /// carried no parseable `authoredOn`; callers substitute their own clock.
    pub authored_on: Option<DateTime<Utc>>,

    /// Status in the pharmacy's vocabulary.
    pub status: PrescriptionStatus,

    /// Number of items to dispense.
    pub quantity: u32,

    /// Medication name.
    pub drug_name: String,

    /// Dosage text, e.g. `500 mg/m²`.
    pub dosage: String,

    /// Administration route text, e.g. `IV`.
    pub route: String,

    /// Frequency text, e.g. `3 times per 1 week`.
    pub frequency: String,

    /// Free-text pharmacist notes.
    pub pharmacist_notes: Option<String>,

    /// Server-side modification stamp, when present.
    pub last_updated: Option<LastUpdated>,
}

/// Resource modification stamp from `meta`.
#[derive(Clone, Debug, PartialEq)]
pub struct LastUpdated {
    pub timestamp: DateTime<Utc>,
    pub pharmacist_id: String,
}

// ============================================================================
// Public MedicationRequest operations
// ============================================================================

/// Medication request resource operations.
///
/// This is a zero-sized type used for namespacing the translation functions.
/// All methods are associated functions.
pub struct MedicationRequest;

impl MedicationRequest {
    /// Parse a `MedicationRequest` resource from JSON text.
    ///
    /// This uses `serde_path_to_error` to surface a best-effort "path" (e.g.
    /// `dosageInstruction.0.timing`) to the failing field when the JSON does
    /// not match the wire schema. Missing fields are not an error: they
    /// degrade to placeholder values in the returned carrier.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if:
    /// - the text is not valid JSON,
    /// - a present field has an unexpected type,
    /// - `resourceType` is not `MedicationRequest`.
    pub fn parse(json_text: &str) -> FhirResult<MedicationRequestData> {
        let mut deserializer = serde_json::Deserializer::from_str(json_text);

        let wire = match serde_path_to_error::deserialize::<_, MedicationRequestWire>(
            &mut deserializer,
        ) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() {
                    "<root>"
                } else {
                    path.as_str()
                };
                return Err(FhirError::Translation(format!(
                    "MedicationRequest schema mismatch at {path}: {source}"
                )));
            }
        };

        if wire.resource_type != "MedicationRequest" {
            return Err(FhirError::InvalidInput(format!(
                "Expected resourceType 'MedicationRequest', got '{}'",
                wire.resource_type
            )));
        }

        Ok(wire_to_domain(wire))
    }

    /// Parse a FHIR search `Bundle` of medication requests.
    ///
    /// Entries whose resource is not a `MedicationRequest` are skipped; the
    /// sync endpoint only ever returns this one resource type, but a defect on
    /// the remote side should not abort the whole sync.
    pub fn parse_bundle(json_text: &str) -> FhirResult<Vec<MedicationRequestData>> {
        let mut deserializer = serde_json::Deserializer::from_str(json_text);

        let bundle =
            match serde_path_to_error::deserialize::<_, BundleWire>(&mut deserializer) {
                Ok(parsed) => parsed,
                Err(err) => {
                    let path = err.path().to_string();
                    let source = err.into_inner();
                    let path = if path.is_empty() {
                        "<root>"
                    } else {
                        path.as_str()
                    };
                    return Err(FhirError::Translation(format!(
                        "Bundle schema mismatch at {path}: {source}"
                    )));
                }
            };

        Ok(bundle
            .entry
            .into_iter()
            .filter_map(|entry| entry.resource)
            .filter(|resource| resource.resource_type == "MedicationRequest")
            .map(wire_to_domain)
            .collect())
    }

    /// Render a medication request as FHIR JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if serialisation fails.
    pub fn render(data: &MedicationRequestData) -> FhirResult<String> {
        let wire = domain_to_wire(data);
        serde_json::to_string(&wire).map_err(|e| {
            FhirError::Translation(format!("Failed to serialise MedicationRequest: {e}"))
        })
    }

    /// Render the minimal resource sent to the oncology system on a status
    /// push: resource type, id, external status and optional note.
    pub fn render_status_update(
        id: &str,
        status: PrescriptionStatus,
        notes: Option<&str>,
    ) -> FhirResult<String> {
        let wire = StatusUpdateWire {
            resource_type: "MedicationRequest".to_string(),
            id: id.to_string(),
            status: status.to_external().as_wire().to_string(),
            note: notes
                .map(|text| {
                    vec![NoteWire {
                        text: text.to_string(),
                    }]
                })
                .unwrap_or_default(),
        };
        serde_json::to_string(&wire)
            .map_err(|e| FhirError::Translation(format!("Failed to serialise status update: {e}")))
    }
}

// ============================================================================
// Dosage and frequency helpers
// ============================================================================

/// Format a wire dose quantity as display text, e.g. `500 mg/m²`.
fn format_dosage(instruction: Option<&DosageInstructionWire>) -> String {
    let dose = instruction
        .and_then(|i| i.dose_and_rate.first())
        .and_then(|d| d.dose_quantity.as_ref());
    match dose {
        Some(q) => format!("{} {}", q.value, q.unit),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Format wire timing as display text, e.g. `3 times per 1 week`.
fn format_frequency(timing: Option<&TimingWire>) -> String {
    match timing.and_then(|t| t.repeat.as_ref()) {
        Some(r) => format!("{} times per {} {}", r.frequency, r.period, r.period_unit),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Parse dosage display text back into a dose quantity.
///
/// A numeric prefix followed by a unit, e.g. `500 mg/m²` or `1.5 mg`.
/// Unparsable text maps to a zero-value `mg` fallback rather than failing.
fn parse_dosage(dosage: &str) -> DoseQuantityWire {
    let pattern = Regex::new(r"^(\d+(?:\.\d+)?)\s*(.+)$").unwrap();
    match pattern.captures(dosage.trim()) {
        Some(caps) => DoseQuantityWire {
            value: caps[1].parse().unwrap_or(0.0),
            unit: caps[2].to_string(),
        },
        None => DoseQuantityWire {
            value: 0.0,
            unit: "mg".to_string(),
        },
    }
}

/// Parse frequency display text (`N times per M unit`) back into wire timing.
///
/// Unparsable text maps to a once-per-day fallback rather than failing.
fn parse_frequency(frequency: &str) -> TimingWire {
    let pattern = Regex::new(r"(\d+)\s*times\s*per\s*(\d+)\s*(.+)").unwrap();
    let repeat = match pattern.captures(frequency) {
        Some(caps) => RepeatWire {
            frequency: caps[1].parse().unwrap_or(1),
            period: caps[2].parse().unwrap_or(1),
            period_unit: caps[3].trim().to_string(),
        },
        None => RepeatWire {
            frequency: 1,
            period: 1,
            period_unit: "day".to_string(),
        },
    };
    TimingWire {
        repeat: Some(repeat),
    }
}

/// Generate a fallback prescription id: `RX` plus five random characters,
/// matching the shape of locally issued identifiers.
pub fn generate_prescription_id() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..5)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();
    format!("RX{suffix}")
}

// ============================================================================
// Wire types (internal)
// ============================================================================

/// Wire representation of a `MedicationRequest` resource.
///
/// Every field the sync consumes is optional or defaulted: the adapter
/// degrades, it does not reject. Unknown keys are ignored by design.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
struct MedicationRequestWire {
    #[serde(rename = "resourceType")]
    resource_type: String,

    /// FHIR resource id. Socket update messages carry only this; REST
    /// resources usually carry `identifier` as well, which wins when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    identifier: Vec<IdentifierWire>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    intent: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    subject: Option<ReferenceWire>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    requester: Option<ReferenceWire>,

    #[serde(rename = "authoredOn", default, skip_serializing_if = "Option::is_none")]
    authored_on: Option<String>,

    #[serde(
        rename = "dispenseRequest",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    dispense_request: Option<DispenseRequestWire>,

    #[serde(
        rename = "medicationCodeableConcept",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    medication_codeable_concept: Option<CodeableConceptWire>,

    #[serde(
        rename = "dosageInstruction",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    dosage_instruction: Vec<DosageInstructionWire>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    note: Vec<NoteWire>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    meta: Option<MetaWire>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct IdentifierWire {
    #[serde(default)]
    value: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct ReferenceWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    display: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct DispenseRequestWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    quantity: Option<QuantityWire>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct QuantityWire {
    value: u32,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct CodeableConceptWire {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
struct DosageInstructionWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    route: Option<CodeableConceptWire>,

    #[serde(rename = "doseAndRate", default, skip_serializing_if = "Vec::is_empty")]
    dose_and_rate: Vec<DoseAndRateWire>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    timing: Option<TimingWire>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct DoseAndRateWire {
    #[serde(rename = "doseQuantity", default, skip_serializing_if = "Option::is_none")]
    dose_quantity: Option<DoseQuantityWire>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
struct DoseQuantityWire {
    value: f64,
    unit: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct TimingWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    repeat: Option<RepeatWire>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct RepeatWire {
    frequency: u32,
    period: u32,
    #[serde(rename = "periodUnit")]
    period_unit: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct NoteWire {
    text: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct MetaWire {
    #[serde(rename = "lastUpdated", default, skip_serializing_if = "Option::is_none")]
    last_updated: Option<String>,

    #[serde(rename = "versionId", default, skip_serializing_if = "Option::is_none")]
    version_id: Option<String>,
}

/// Wire representation of a FHIR search bundle.
#[derive(Clone, Debug, Deserialize)]
struct BundleWire {
    #[serde(default)]
    entry: Vec<BundleEntryWire>,
}

#[derive(Clone, Debug, Deserialize)]
struct BundleEntryWire {
    #[serde(default)]
    resource: Option<MedicationRequestWire>,
}

/// Minimal resource sent on a status push.
#[derive(Clone, Debug, Serialize)]
struct StatusUpdateWire {
    #[serde(rename = "resourceType")]
    resource_type: String,
    id: String,
    status: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    note: Vec<NoteWire>,
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

/// Convert wire format to the flat domain carrier, degrading missing fields.
fn wire_to_domain(wire: MedicationRequestWire) -> MedicationRequestData {
    let id = wire
        .identifier
        .first()
        .and_then(|i| i.value.clone())
        .or_else(|| wire.id.clone())
        .unwrap_or_else(generate_prescription_id);

    let status = wire
        .status
        .as_deref()
        .map(MedicationRequestStatus::from_wire)
        .unwrap_or(MedicationRequestStatus::Unknown)
        .to_internal();

    let authored_on = wire
        .authored_on
        .as_deref()
        .and_then(|s| s.parse::<DateTime<Utc>>().ok());

    let first_instruction = wire.dosage_instruction.first();

    let last_updated = wire.meta.as_ref().and_then(|m| {
        let timestamp = m.last_updated.as_deref()?.parse::<DateTime<Utc>>().ok()?;
        Some(LastUpdated {
            timestamp,
            pharmacist_id: m
                .version_id
                .clone()
                .unwrap_or_else(|| DEFAULT_PHARMACIST_ID.to_string()),
        })
    });

    MedicationRequestData {
        id,
        patient_name: wire
            .subject
            .and_then(|s| s.display)
            .unwrap_or_else(|| UNKNOWN_PATIENT.to_string()),
        doctor_name: wire
            .requester
            .and_then(|r| r.display)
            .unwrap_or_else(|| UNKNOWN_DOCTOR.to_string()),
        authored_on,
        status,
        quantity: wire
            .dispense_request
            .and_then(|d| d.quantity)
            .map(|q| q.value)
            .unwrap_or(1),
        drug_name: wire
            .medication_codeable_concept
            .and_then(|c| c.text)
            .unwrap_or_else(|| UNKNOWN_DRUG.to_string()),
        dosage: format_dosage(first_instruction),
        route: first_instruction
            .and_then(|i| i.route.as_ref())
            .and_then(|r| r.text.clone())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        frequency: format_frequency(first_instruction.and_then(|i| i.timing.as_ref())),
        pharmacist_notes: wire.note.first().map(|n| n.text.clone()),
        last_updated,
    }
}

/// Convert the flat domain carrier to wire format.
fn domain_to_wire(data: &MedicationRequestData) -> MedicationRequestWire {
    MedicationRequestWire {
        resource_type: "MedicationRequest".to_string(),
        id: None,
        identifier: vec![IdentifierWire {
            value: Some(data.id.clone()),
        }],
        status: Some(data.status.to_external().as_wire().to_string()),
        intent: Some("order".to_string()),
        subject: Some(ReferenceWire {
            display: Some(data.patient_name.clone()),
        }),
        requester: Some(ReferenceWire {
            display: Some(data.doctor_name.clone()),
        }),
        authored_on: data.authored_on.map(|dt| dt.to_rfc3339()),
        dispense_request: Some(DispenseRequestWire {
            quantity: Some(QuantityWire {
                value: data.quantity,
            }),
        }),
        medication_codeable_concept: Some(CodeableConceptWire {
            text: Some(data.drug_name.clone()),
        }),
        dosage_instruction: vec![DosageInstructionWire {
            text: Some(format!(
                "{} {} {}",
                data.dosage, data.route, data.frequency
            )),
            route: Some(CodeableConceptWire {
                text: Some(data.route.clone()),
            }),
            dose_and_rate: vec![DoseAndRateWire {
                dose_quantity: Some(parse_dosage(&data.dosage)),
            }],
            timing: Some(parse_frequency(&data.frequency)),
        }],
        note: data
            .pharmacist_notes
            .as_ref()
            .map(|text| vec![NoteWire { text: text.clone() }])
            .unwrap_or_default(),
        meta: data.last_updated.as_ref().map(|lu| MetaWire {
            last_updated: Some(lu.timestamp.to_rfc3339()),
            version_id: Some(lu.pharmacist_id.clone()),
        }),
    }
}
