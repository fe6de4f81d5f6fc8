//! Demo fixtures.
//!
//! A handful of realistic records for local runs (`RXDESK_SEED=1`) and tests.
//! Kept deliberately small; nothing outside demos and tests depends on the
//! exact contents.

use crate::auth::Actor;
use crate::medicine::Medicine;
use crate::prescription::{
    AuditEntry, ClinicReferral, MedicationLine, PatientDetails, Prescription,
};
use chrono::{NaiveDate, TimeZone, Utc};
use fhir::PrescriptionStatus;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid fixture date")
}

/// Two sample prescriptions: a pharmacy patient and a clinic referral.
pub fn sample_prescriptions() -> Vec<Prescription> {
    let pharmacist = Actor {
        id: "PH001".to_string(),
        role: "Pharmacist".to_string(),
    };

    vec![
        Prescription {
            id: "RX12345".to_string(),
            patient_name: "Sarah Mohamed".to_string(),
            patient_id: Some("P12345".to_string()),
            doctor_name: "Dr. Ahmed Mahmoud".to_string(),
            doctor_department: Some("Oncology".to_string()),
            date: Utc.with_ymd_and_hms(2025, 2, 15, 9, 0, 0).unwrap(),
            status: PrescriptionStatus::Pending,
            items: 3,
            clinic_referral: None,
            medications: vec![MedicationLine {
                drug_name: "Cyclophosphamide".to_string(),
                dosage: "500 mg/m²".to_string(),
                frequency: "1 times per 3 week".to_string(),
                duration: "6 cycles".to_string(),
                quantity: 3,
                stock_available: 5,
                administration_route: Some("IV".to_string()),
                expiry_date: Some(date(2025, 7, 15)),
                near_expiry: false,
                low_stock: true,
                substitution: None,
            }],
            audit_log: vec![AuditEntry::new("Created", &pharmacist, None)],
            pharmacist_notes: None,
            last_updated: None,
        },
        Prescription {
            id: "RX12346".to_string(),
            patient_name: "Mohammed Ali".to_string(),
            patient_id: Some("P12346".to_string()),
            doctor_name: "Dr. Fatima Hassan".to_string(),
            doctor_department: Some("Cardiology".to_string()),
            date: Utc.with_ymd_and_hms(2025, 2, 16, 9, 0, 0).unwrap(),
            status: PrescriptionStatus::Pending,
            items: 2,
            clinic_referral: Some(ClinicReferral {
                clinic_name: "City Medical Center".to_string(),
                clinic_id: "CMC001".to_string(),
                referral_date: Utc.with_ymd_and_hms(2025, 2, 16, 8, 30, 0).unwrap(),
                diagnosis: "Hypertension and Type 2 Diabetes".to_string(),
                patient_details: PatientDetails {
                    age: 65,
                    gender: "Male".to_string(),
                    allergies: vec!["Penicillin".to_string(), "Sulfa drugs".to_string()],
                    medical_history: vec![
                        "Hypertension (2018)".to_string(),
                        "Type 2 Diabetes (2019)".to_string(),
                    ],
                },
            }),
            medications: vec![
                MedicationLine {
                    drug_name: "Metformin".to_string(),
                    dosage: "1000 mg".to_string(),
                    frequency: "2 times per 1 day".to_string(),
                    duration: "30 days".to_string(),
                    quantity: 60,
                    stock_available: 100,
                    administration_route: Some("Oral".to_string()),
                    expiry_date: None,
                    near_expiry: false,
                    low_stock: false,
                    substitution: None,
                },
                MedicationLine {
                    drug_name: "Lisinopril".to_string(),
                    dosage: "10 mg".to_string(),
                    frequency: "1 times per 1 day".to_string(),
                    duration: "30 days".to_string(),
                    quantity: 30,
                    stock_available: 50,
                    administration_route: Some("Oral".to_string()),
                    expiry_date: None,
                    near_expiry: false,
                    low_stock: false,
                    substitution: None,
                },
            ],
            audit_log: vec![AuditEntry::new("Received from Clinic", &pharmacist, None)],
            pharmacist_notes: None,
            last_updated: None,
        },
    ]
}

/// Four sample inventory records covering in-stock, low-stock and expired.
pub fn sample_medicines() -> Vec<Medicine> {
    vec![
        Medicine {
            id: "1".to_string(),
            name: "Paracetamol 500mg".to_string(),
            category: "Analgesics".to_string(),
            price: 5.99,
            stock: 150,
            threshold: 20,
            expiry_date: date(2025, 12, 31),
            manufacturer: "PharmaCorp".to_string(),
            active_ingredient: "Paracetamol".to_string(),
            supplier: "MediSupply".to_string(),
            effects: "Relieves pain and fever".to_string(),
        },
        Medicine {
            id: "2".to_string(),
            name: "Amoxicillin 250mg".to_string(),
            category: "Antibiotics".to_string(),
            price: 12.49,
            stock: 8,
            threshold: 10,
            expiry_date: date(2025, 6, 15),
            manufacturer: "MediPharm".to_string(),
            active_ingredient: "Amoxicillin".to_string(),
            supplier: "HealthCo".to_string(),
            effects: "Treats bacterial infections".to_string(),
        },
        Medicine {
            id: "3".to_string(),
            name: "Aspirin 100mg".to_string(),
            category: "Analgesics".to_string(),
            price: 4.25,
            stock: 200,
            threshold: 30,
            expiry_date: date(2025, 9, 10),
            manufacturer: "PharmaCorp".to_string(),
            active_ingredient: "Aspirin".to_string(),
            supplier: "MediSupply".to_string(),
            effects: "Reduces inflammation and pain".to_string(),
        },
        Medicine {
            id: "4".to_string(),
            name: "Metformin 500mg".to_string(),
            category: "Antidiabetics".to_string(),
            price: 7.99,
            stock: 5,
            threshold: 20,
            expiry_date: date(2025, 2, 28),
            manufacturer: "DiabeCare".to_string(),
            active_ingredient: "Metformin".to_string(),
            supplier: "HealthCo".to_string(),
            effects: "Manages blood sugar".to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_ids_are_unique() {
        let prescriptions = sample_prescriptions();
        assert_eq!(prescriptions.len(), 2);
        assert_ne!(prescriptions[0].id, prescriptions[1].id);

        let medicines = sample_medicines();
        let mut ids: Vec<&str> = medicines.iter().map(|m| m.id.as_str()).collect();
        ids.dedup();
        assert_eq!(ids.len(), medicines.len());
    }

    #[test]
    fn clinic_referral_fixture_carries_patient_details() {
        let prescriptions = sample_prescriptions();
        let referral = prescriptions[1].clinic_referral.as_ref().unwrap();
        assert_eq!(referral.clinic_id, "CMC001");
        assert_eq!(referral.patient_details.allergies.len(), 2);
    }
}
