//! Prescription store and status/audit workflow.
//!
//! The store is an in-memory list guarded by an `RwLock`. Every mutation is
//! validated up front and applied atomically under the write lock, so a
//! rejected operation leaves no partial state behind.
//!
//! ## Status workflow
//!
//! The nine statuses form a flat set: any status may follow any other, and
//! the workflow enforces no transition table. What it does enforce is the
//! audit invariant — every status change appends exactly one entry recording
//! timestamp, actor and resulting status.
//!
//! ## External changes
//!
//! Imports from the oncology system go through [`upsert_from_external`];
//! cancellations arrive as [`apply_external_cancellation`], which is a soft
//! transition to `rejected` — records are never removed from the store.
//!
//! [`upsert_from_external`]: PrescriptionService::upsert_from_external
//! [`apply_external_cancellation`]: PrescriptionService::apply_external_cancellation

use crate::auth::Actor;
use crate::prescription::{
    AuditEntry, MedicationLine, NewPrescription, Prescription, PrescriptionUpdate, Substitution,
};
use crate::{PharmacyError, PharmacyResult};
use chrono::Utc;
use fhir::{MedicationRequestData, PrescriptionStatus};
use std::sync::RwLock;

/// Service owning the in-memory prescription list.
#[derive(Debug, Default)]
pub struct PrescriptionService {
    records: RwLock<Vec<Prescription>>,
}

impl PrescriptionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing records (demo data, tests).
    pub fn with_records(records: Vec<Prescription>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// All prescriptions, newest first as stored.
    pub fn list(&self) -> PharmacyResult<Vec<Prescription>> {
        let records = self
            .records
            .read()
            .map_err(|_| PharmacyError::LockPoisoned)?;
        Ok(records.clone())
    }

    /// Look up one prescription by id.
    pub fn get(&self, id: &str) -> PharmacyResult<Option<Prescription>> {
        let records = self
            .records
            .read()
            .map_err(|_| PharmacyError::LockPoisoned)?;
        Ok(records.iter().find(|p| p.id == id).cloned())
    }

    /// Create a prescription from validated input.
    ///
    /// The typed fields of [`NewPrescription`] already guarantee non-empty
    /// names and a positive item count; this method additionally requires at
    /// least one medication line. The new record lands at the front of the
    /// list with a creation audit entry.
    ///
    /// # Errors
    ///
    /// Returns [`PharmacyError::InvalidInput`] if no medication lines are
    /// given. The store is unchanged on error.
    pub fn create(&self, new: NewPrescription, actor: &Actor) -> PharmacyResult<Prescription> {
        if new.medications.is_empty() {
            return Err(PharmacyError::InvalidInput(
                "at least one medication is required".into(),
            ));
        }

        let mut records = self
            .records
            .write()
            .map_err(|_| PharmacyError::LockPoisoned)?;

        let mut id = fhir::generate_prescription_id();
        while records.iter().any(|p| p.id == id) {
            id = fhir::generate_prescription_id();
        }

        let creation_action = if new.clinic_referral.is_some() {
            "Received from Clinic"
        } else {
            "Created"
        };

        let prescription = Prescription {
            id,
            patient_name: new.patient_name.into_string(),
            patient_id: new.patient_id,
            doctor_name: new.doctor_name.into_string(),
            doctor_department: new.doctor_department,
            date: new.date.unwrap_or_else(Utc::now),
            status: new.status,
            items: new.items.get(),
            clinic_referral: new.clinic_referral,
            medications: new
                .medications
                .into_iter()
                .map(MedicationLine::from)
                .collect(),
            audit_log: vec![AuditEntry::new(creation_action, actor, None)],
            pharmacist_notes: new.pharmacist_notes,
            last_updated: None,
        };

        records.insert(0, prescription.clone());
        tracing::info!(id = %prescription.id, "prescription created");
        Ok(prescription)
    }

    /// Set a prescription's status, appending exactly one audit entry.
    ///
    /// Any status may follow any other; there is no transition table to
    /// violate. The returned record reflects the applied change.
    ///
    /// # Errors
    ///
    /// Returns [`PharmacyError::UnknownPrescription`] if `id` is not in the
    /// store.
    pub fn update_status(
        &self,
        id: &str,
        status: PrescriptionStatus,
        actor: &Actor,
        notes: Option<String>,
    ) -> PharmacyResult<Prescription> {
        let mut records = self
            .records
            .write()
            .map_err(|_| PharmacyError::LockPoisoned)?;

        let record = records
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| PharmacyError::UnknownPrescription(id.to_string()))?;

        if record.status.is_terminal() {
            // Allowed — the status set is flat — but worth a trace when a
            // closed prescription is reopened.
            tracing::debug!(id, from = %record.status, to = %status, "reopening closed prescription");
        }

        record.status = status;
        record.audit_log.push(AuditEntry::new(
            format!("Status changed to {status}"),
            actor,
            notes,
        ));
        record.last_updated = Some(crate::prescription::LastUpdatedStamp {
            timestamp: Utc::now(),
            pharmacist_id: actor.id.clone(),
        });

        Ok(record.clone())
    }

    /// Apply a partial edit to a prescription's descriptive fields.
    pub fn update_details(
        &self,
        id: &str,
        update: PrescriptionUpdate,
    ) -> PharmacyResult<Prescription> {
        let mut records = self
            .records
            .write()
            .map_err(|_| PharmacyError::LockPoisoned)?;

        let record = records
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| PharmacyError::UnknownPrescription(id.to_string()))?;

        record.apply_update(update)?;
        Ok(record.clone())
    }

    /// Record a substitution on one medication line.
    ///
    /// # Errors
    ///
    /// Returns [`PharmacyError::UnknownPrescription`] for an unknown id and
    /// [`PharmacyError::InvalidInput`] for an out-of-range line index or an
    /// empty substitute name.
    pub fn substitute(
        &self,
        id: &str,
        line_index: usize,
        substitute_drug: &str,
        reason: &str,
        actor: &Actor,
    ) -> PharmacyResult<Prescription> {
        let substitute_drug = substitute_drug.trim();
        if substitute_drug.is_empty() {
            return Err(PharmacyError::InvalidInput(
                "substitute drug must not be empty".into(),
            ));
        }

        let mut records = self
            .records
            .write()
            .map_err(|_| PharmacyError::LockPoisoned)?;

        let record = records
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| PharmacyError::UnknownPrescription(id.to_string()))?;

        let line = record.medications.get_mut(line_index).ok_or_else(|| {
            PharmacyError::InvalidInput(format!("no medication line at index {line_index}"))
        })?;

        let original_drug = line.drug_name.clone();
        line.substitution = Some(Substitution {
            original_drug: original_drug.clone(),
            substituted_drug: substitute_drug.to_string(),
            reason: reason.to_string(),
        });

        record.audit_log.push(AuditEntry::new(
            format!("Substituted {original_drug} with {substitute_drug}"),
            actor,
            Some(reason.to_string()),
        ));

        Ok(record.clone())
    }

    /// Case-insensitive substring search over patient name, doctor name,
    /// prescription id and the first medication's drug name. Empty text
    /// returns everything.
    pub fn search(&self, text: &str) -> PharmacyResult<Vec<Prescription>> {
        let text = text.trim().to_lowercase();
        let records = self
            .records
            .read()
            .map_err(|_| PharmacyError::LockPoisoned)?;

        if text.is_empty() {
            return Ok(records.clone());
        }

        Ok(records
            .iter()
            .filter(|p| {
                p.patient_name.to_lowercase().contains(&text)
                    || p.doctor_name.to_lowercase().contains(&text)
                    || p.id.to_lowercase().contains(&text)
                    || p.first_medication()
                        .map(|m| m.drug_name.to_lowercase().contains(&text))
                        .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    /// All prescriptions with the given status.
    pub fn filter_by_status(
        &self,
        status: PrescriptionStatus,
    ) -> PharmacyResult<Vec<Prescription>> {
        let records = self
            .records
            .read()
            .map_err(|_| PharmacyError::LockPoisoned)?;
        Ok(records
            .iter()
            .filter(|p| p.status == status)
            .cloned()
            .collect())
    }

    /// Upsert a record arriving from the oncology system.
    ///
    /// An existing record is replaced field-by-field but keeps its audit
    /// history (plus an update entry); an unknown id is inserted at the front
    /// with an import entry. Local-only records are never dropped by a sync.
    pub fn upsert_from_external(
        &self,
        data: MedicationRequestData,
    ) -> PharmacyResult<Prescription> {
        let now = Utc::now();
        let incoming = Prescription::from_external_data(data, now);
        let actor = Actor::external_system();

        let mut records = self
            .records
            .write()
            .map_err(|_| PharmacyError::LockPoisoned)?;

        match records.iter_mut().find(|p| p.id == incoming.id) {
            Some(existing) => {
                let mut audit_log = std::mem::take(&mut existing.audit_log);
                audit_log.push(AuditEntry::new("Updated from oncology system", &actor, None));
                *existing = Prescription {
                    audit_log,
                    ..incoming
                };
                Ok(existing.clone())
            }
            None => {
                let mut imported = incoming;
                imported.audit_log.push(AuditEntry::new(
                    "Imported from oncology system",
                    &actor,
                    None,
                ));
                records.insert(0, imported.clone());
                Ok(imported)
            }
        }
    }

    /// Merge a full sync result into the store. Returns how many records were
    /// inserted or replaced.
    pub fn merge_sync(&self, entries: Vec<MedicationRequestData>) -> PharmacyResult<usize> {
        let mut applied = 0;
        for entry in entries {
            self.upsert_from_external(entry)?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Soft-cancel a prescription on behalf of the oncology system: the
    /// record stays in the store with status `rejected` and an audit entry.
    pub fn apply_external_cancellation(&self, id: &str) -> PharmacyResult<Prescription> {
        let mut records = self
            .records
            .write()
            .map_err(|_| PharmacyError::LockPoisoned)?;

        let record = records
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| PharmacyError::UnknownPrescription(id.to_string()))?;

        record.status = PrescriptionStatus::Rejected;
        record.audit_log.push(AuditEntry::new(
            "Cancelled by oncology system",
            &Actor::external_system(),
            None,
        ));

        tracing::info!(id, "prescription cancelled by oncology system");
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rx_types::{NonEmptyText, Quantity};

    fn actor() -> Actor {
        Actor {
            id: "PH001".to_string(),
            role: "Pharmacist".to_string(),
        }
    }

    fn new_prescription(patient: &str) -> NewPrescription {
        NewPrescription {
            patient_name: NonEmptyText::new(patient).unwrap(),
            patient_id: Some("P12345".to_string()),
            doctor_name: NonEmptyText::new("Dr. Ahmed Mahmoud").unwrap(),
            doctor_department: Some("Oncology".to_string()),
            date: None,
            status: PrescriptionStatus::Pending,
            items: Quantity::new(3).unwrap(),
            clinic_referral: None,
            medications: vec![crate::prescription::NewMedicationLine {
                drug_name: NonEmptyText::new("Cyclophosphamide").unwrap(),
                dosage: NonEmptyText::new("500 mg/m²").unwrap(),
                frequency: NonEmptyText::new("1 times per 3 week").unwrap(),
                duration: Some("6 cycles".to_string()),
                quantity: 3,
                stock_available: 5,
                administration_route: Some("IV".to_string()),
                expiry_date: None,
            }],
            pharmacist_notes: None,
        }
    }

    #[test]
    fn create_prepends_record_with_creation_audit_entry() {
        let service = PrescriptionService::new();
        let first = service.create(new_prescription("Sarah Mohamed"), &actor()).unwrap();
        let second = service.create(new_prescription("David Wilson"), &actor()).unwrap();

        let all = service.list().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);
        assert_eq!(all[1].id, first.id);

        assert!(first.id.starts_with("RX"));
        assert_eq!(first.audit_log.len(), 1);
        assert_eq!(first.audit_log[0].action, "Created");
        assert_eq!(first.audit_log[0].actor_id, "PH001");
    }

    #[test]
    fn create_without_medications_leaves_store_unchanged() {
        let service = PrescriptionService::new();
        let mut input = new_prescription("Sarah Mohamed");
        input.medications.clear();

        let err = service.create(input, &actor()).expect_err("no medications");
        assert!(matches!(err, PharmacyError::InvalidInput(_)));
        assert!(service.list().unwrap().is_empty());
    }

    #[test]
    fn every_status_is_reachable_and_audited_once() {
        let service = PrescriptionService::new();
        let created = service
            .create(new_prescription("Sarah Mohamed"), &actor())
            .unwrap();

        let mut expected_entries = 1; // creation entry
        for status in PrescriptionStatus::ALL {
            let updated = service
                .update_status(&created.id, status, &actor(), None)
                .unwrap();
            expected_entries += 1;

            assert_eq!(updated.status, status);
            assert_eq!(updated.audit_log.len(), expected_entries);
            let last = updated.audit_log.last().unwrap();
            assert_eq!(last.action, format!("Status changed to {status}"));
        }
    }

    #[test]
    fn status_update_records_notes_and_stamp() {
        let service = PrescriptionService::new();
        let created = service
            .create(new_prescription("Sarah Mohamed"), &actor())
            .unwrap();

        let updated = service
            .update_status(
                &created.id,
                PrescriptionStatus::OnHold,
                &actor(),
                Some("Awaiting stock".to_string()),
            )
            .unwrap();

        assert_eq!(
            updated.audit_log.last().unwrap().notes.as_deref(),
            Some("Awaiting stock")
        );
        assert_eq!(
            updated.last_updated.as_ref().unwrap().pharmacist_id,
            "PH001"
        );
    }

    #[test]
    fn update_status_rejects_unknown_id() {
        let service = PrescriptionService::new();
        let err = service
            .update_status("RX00000", PrescriptionStatus::Filled, &actor(), None)
            .expect_err("unknown id");
        assert!(matches!(err, PharmacyError::UnknownPrescription(_)));
    }

    #[test]
    fn search_matches_patient_doctor_id_and_drug() {
        let service = PrescriptionService::new();
        let created = service
            .create(new_prescription("Sarah Mohamed"), &actor())
            .unwrap();
        service
            .create(new_prescription("David Wilson"), &actor())
            .unwrap();

        assert_eq!(service.search("sarah").unwrap().len(), 1);
        assert_eq!(service.search("mahmoud").unwrap().len(), 2);
        assert_eq!(service.search(&created.id.to_lowercase()).unwrap().len(), 1);
        assert_eq!(service.search("cyclo").unwrap().len(), 2);
        assert_eq!(service.search("").unwrap().len(), 2);
        assert!(service.search("nonexistent").unwrap().is_empty());
    }

    #[test]
    fn filter_by_status_returns_matching_records() {
        let service = PrescriptionService::new();
        let created = service
            .create(new_prescription("Sarah Mohamed"), &actor())
            .unwrap();
        service
            .create(new_prescription("David Wilson"), &actor())
            .unwrap();
        service
            .update_status(&created.id, PrescriptionStatus::Processing, &actor(), None)
            .unwrap();

        let processing = service
            .filter_by_status(PrescriptionStatus::Processing)
            .unwrap();
        assert_eq!(processing.len(), 1);
        assert_eq!(processing[0].id, created.id);
        assert_eq!(
            service
                .filter_by_status(PrescriptionStatus::Pending)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn substitution_records_line_and_audit_entry() {
        let service = PrescriptionService::new();
        let created = service
            .create(new_prescription("Sarah Mohamed"), &actor())
            .unwrap();

        let updated = service
            .substitute(&created.id, 0, "Ifosfamide", "Stock shortage", &actor())
            .unwrap();

        let substitution = updated.medications[0].substitution.as_ref().unwrap();
        assert_eq!(substitution.original_drug, "Cyclophosphamide");
        assert_eq!(substitution.substituted_drug, "Ifosfamide");
        assert_eq!(
            updated.audit_log.last().unwrap().action,
            "Substituted Cyclophosphamide with Ifosfamide"
        );

        let err = service
            .substitute(&created.id, 5, "Ifosfamide", "bad index", &actor())
            .expect_err("line index out of range");
        assert!(matches!(err, PharmacyError::InvalidInput(_)));
    }

    fn external_record(id: &str, status: PrescriptionStatus) -> MedicationRequestData {
        MedicationRequestData {
            id: id.to_string(),
            patient_name: "David Wilson".to_string(),
            doctor_name: "Dr. Sophia Liu".to_string(),
            authored_on: Some("2025-02-14T00:00:00Z".parse().unwrap()),
            status,
            quantity: 2,
            drug_name: "Doxorubicin".to_string(),
            dosage: "60 mg/m²".to_string(),
            route: "IV".to_string(),
            frequency: "1 times per 2 week".to_string(),
            pharmacist_notes: None,
            last_updated: None,
        }
    }

    #[test]
    fn upsert_inserts_new_and_replaces_existing_preserving_audit() {
        let service = PrescriptionService::new();

        let imported = service
            .upsert_from_external(external_record("RX77777", PrescriptionStatus::Processing))
            .unwrap();
        assert_eq!(imported.audit_log.len(), 1);
        assert_eq!(imported.audit_log[0].action, "Imported from oncology system");

        let replaced = service
            .upsert_from_external(external_record("RX77777", PrescriptionStatus::OnHold))
            .unwrap();
        assert_eq!(replaced.status, PrescriptionStatus::OnHold);
        assert_eq!(replaced.audit_log.len(), 2);
        assert_eq!(
            replaced.audit_log[1].action,
            "Updated from oncology system"
        );
        assert_eq!(service.list().unwrap().len(), 1);
    }

    #[test]
    fn merge_sync_keeps_local_only_records() {
        let service = PrescriptionService::new();
        let local = service
            .create(new_prescription("Sarah Mohamed"), &actor())
            .unwrap();

        let applied = service
            .merge_sync(vec![
                external_record("RX77777", PrescriptionStatus::Processing),
                external_record("RX88888", PrescriptionStatus::Pending),
            ])
            .unwrap();

        assert_eq!(applied, 2);
        let all = service.list().unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().any(|p| p.id == local.id));
    }

    #[test]
    fn external_cancellation_is_a_soft_status_change() {
        let service = PrescriptionService::new();
        let created = service
            .create(new_prescription("Sarah Mohamed"), &actor())
            .unwrap();

        let cancelled = service.apply_external_cancellation(&created.id).unwrap();
        assert_eq!(cancelled.status, PrescriptionStatus::Rejected);
        assert_eq!(
            cancelled.audit_log.last().unwrap().action,
            "Cancelled by oncology system"
        );
        // The record is still in the store.
        assert_eq!(service.list().unwrap().len(), 1);
    }
}
