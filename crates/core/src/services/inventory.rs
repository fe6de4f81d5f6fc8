//! Medicine inventory store.
//!
//! Wraps the pure query helpers in `crate::medicine` around an `RwLock`-guarded
//! list. Queries clone records out; mutations validate first and apply
//! atomically under the write lock.

use crate::medicine::{
    matches_search, paginate, sort_medicines, summarise, InventorySummary, Medicine,
    MedicineUpdate, NewMedicine, SortConfig, StockStatus,
};
use crate::{PharmacyError, PharmacyResult};
use chrono::NaiveDate;
use std::sync::RwLock;
use uuid::Uuid;

/// A medicine together with its status derived against the query date.
#[derive(Clone, Debug, serde::Serialize)]
pub struct MedicineRow {
    #[serde(flatten)]
    pub medicine: Medicine,
    pub status: StockStatus,
}

/// One page of inventory query results.
#[derive(Clone, Debug, serde::Serialize)]
pub struct InventoryPage {
    pub items: Vec<MedicineRow>,
    pub total: usize,
    pub page: usize,
    pub total_pages: usize,
}

/// Service owning the in-memory medicine list.
#[derive(Debug, Default)]
pub struct InventoryService {
    records: RwLock<Vec<Medicine>>,
}

impl InventoryService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing records (demo data, tests).
    pub fn with_records(records: Vec<Medicine>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// All medicines in stored order.
    pub fn list(&self) -> PharmacyResult<Vec<Medicine>> {
        let records = self
            .records
            .read()
            .map_err(|_| PharmacyError::LockPoisoned)?;
        Ok(records.clone())
    }

    /// Look up one medicine by id.
    pub fn get(&self, id: &str) -> PharmacyResult<Option<Medicine>> {
        let records = self
            .records
            .read()
            .map_err(|_| PharmacyError::LockPoisoned)?;
        Ok(records.iter().find(|m| m.id == id).cloned())
    }

    /// Search, optionally sort, then slice one page. Each row carries its
    /// status derived against `today`.
    ///
    /// `page` is taken as given: a page past the end yields an empty page
    /// (the total and page count still describe the full result set).
    pub fn query(
        &self,
        text: &str,
        sort: Option<SortConfig>,
        page: usize,
        per_page: usize,
        today: NaiveDate,
    ) -> PharmacyResult<InventoryPage> {
        let records = self
            .records
            .read()
            .map_err(|_| PharmacyError::LockPoisoned)?;

        let mut matched: Vec<Medicine> = records
            .iter()
            .filter(|m| matches_search(m, text))
            .cloned()
            .collect();
        drop(records);

        if let Some(config) = sort {
            sort_medicines(&mut matched, config);
        }

        let per_page = per_page.max(1);
        let total = matched.len();
        let total_pages = total.div_ceil(per_page).max(1);
        let items = paginate(&matched, page, per_page)
            .iter()
            .map(|medicine| MedicineRow {
                status: medicine.status(today),
                medicine: medicine.clone(),
            })
            .collect();

        Ok(InventoryPage {
            items,
            total,
            page,
            total_pages,
        })
    }

    /// Dashboard counters against the given date.
    pub fn summary(&self, today: NaiveDate) -> PharmacyResult<InventorySummary> {
        let records = self
            .records
            .read()
            .map_err(|_| PharmacyError::LockPoisoned)?;
        Ok(summarise(&records, today))
    }

    /// Add a medicine from validated input.
    pub fn add(&self, new: NewMedicine) -> PharmacyResult<Medicine> {
        new.validate()?;

        let medicine = Medicine {
            id: Uuid::new_v4().to_string(),
            name: new.name.into_string(),
            category: new.category.into_string(),
            price: new.price,
            stock: new.stock,
            threshold: new.threshold,
            expiry_date: new.expiry_date,
            manufacturer: new.manufacturer.into_string(),
            active_ingredient: new.active_ingredient.unwrap_or_default(),
            supplier: new.supplier.unwrap_or_default(),
            effects: new.effects.unwrap_or_default(),
        };

        let mut records = self
            .records
            .write()
            .map_err(|_| PharmacyError::LockPoisoned)?;
        records.push(medicine.clone());
        Ok(medicine)
    }

    /// Apply a partial update to a medicine.
    pub fn update(&self, id: &str, update: MedicineUpdate) -> PharmacyResult<Medicine> {
        let mut records = self
            .records
            .write()
            .map_err(|_| PharmacyError::LockPoisoned)?;

        let record = records
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| PharmacyError::UnknownMedicine(id.to_string()))?;

        record.apply_update(update)?;
        Ok(record.clone())
    }

    /// Remove a medicine. Returns how many records remain, so callers can
    /// clamp their page cursor.
    pub fn remove(&self, id: &str) -> PharmacyResult<usize> {
        let mut records = self
            .records
            .write()
            .map_err(|_| PharmacyError::LockPoisoned)?;

        let before = records.len();
        records.retain(|m| m.id != id);
        if records.len() == before {
            return Err(PharmacyError::UnknownMedicine(id.to_string()));
        }
        Ok(records.len())
    }

    /// Zero the stock and push the expiry date into the past, so the item
    /// reads as `Expired` on the next classification.
    pub fn mark_expired(&self, id: &str, today: NaiveDate) -> PharmacyResult<Medicine> {
        let expired_date = today.pred_opt().unwrap_or(today);
        self.update(
            id,
            MedicineUpdate {
                stock: Some(0),
                expiry_date: Some(expired_date),
                ..Default::default()
            },
        )
    }

    /// Zero the stock, leaving the expiry date alone.
    pub fn mark_out_of_stock(&self, id: &str) -> PharmacyResult<Medicine> {
        self.update(
            id,
            MedicineUpdate {
                stock: Some(0),
                ..Default::default()
            },
        )
    }

    /// All medicines sharing an active ingredient (exact match).
    pub fn by_active_ingredient(&self, ingredient: &str) -> PharmacyResult<Vec<Medicine>> {
        let records = self
            .records
            .read()
            .map_err(|_| PharmacyError::LockPoisoned)?;
        Ok(records
            .iter()
            .filter(|m| m.active_ingredient == ingredient)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medicine::{SortDirection, SortKey, StockStatus};
    use rx_types::NonEmptyText;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_medicine(name: &str, price: f64, stock: u32) -> NewMedicine {
        NewMedicine {
            name: NonEmptyText::new(name).unwrap(),
            category: NonEmptyText::new("Analgesics").unwrap(),
            price,
            stock,
            threshold: 20,
            expiry_date: date(2026, 12, 31),
            manufacturer: NonEmptyText::new("PharmaCorp").unwrap(),
            active_ingredient: Some("Paracetamol".to_string()),
            supplier: None,
            effects: None,
        }
    }

    fn seeded_service() -> InventoryService {
        let service = InventoryService::new();
        for (name, price, stock) in [
            ("Paracetamol 500mg", 5.99, 150),
            ("Amoxicillin 250mg", 12.49, 8),
            ("Aspirin 100mg", 4.25, 200),
        ] {
            service.add(new_medicine(name, price, stock)).unwrap();
        }
        service
    }

    #[test]
    fn add_assigns_unique_ids() {
        let service = seeded_service();
        let all = service.list().unwrap();
        assert_eq!(all.len(), 3);
        assert_ne!(all[0].id, all[1].id);
    }

    #[test]
    fn add_rejects_negative_price() {
        let service = InventoryService::new();
        let err = service
            .add(new_medicine("Paracetamol 500mg", -1.0, 10))
            .expect_err("negative price");
        assert!(matches!(err, PharmacyError::InvalidInput(_)));
        assert!(service.list().unwrap().is_empty());
    }

    #[test]
    fn query_filters_sorts_and_paginates() {
        let service = seeded_service();
        let today = date(2025, 6, 15);

        let page = service
            .query(
                "",
                Some(SortConfig::new(SortKey::Price, SortDirection::Asc)),
                1,
                2,
                today,
            )
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items[0].medicine.name, "Aspirin 100mg");
        assert_eq!(page.items[1].medicine.name, "Paracetamol 500mg");
        assert_eq!(page.items[0].status, StockStatus::InStock);

        let second = service
            .query(
                "",
                Some(SortConfig::new(SortKey::Price, SortDirection::Asc)),
                2,
                2,
                today,
            )
            .unwrap();
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0].medicine.name, "Amoxicillin 250mg");
        // Stock 8 against threshold 20 derives as Low.
        assert_eq!(second.items[0].status, StockStatus::Low);

        // Out-of-range page reads as empty; totals still describe the set.
        let beyond = service.query("", None, 9, 2, today).unwrap();
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total, 3);

        let filtered = service.query("amox", None, 1, 5, today).unwrap();
        assert_eq!(filtered.total, 1);
        assert_eq!(filtered.items[0].medicine.name, "Amoxicillin 250mg");
    }

    #[test]
    fn remove_reports_remaining_count() {
        let service = seeded_service();
        let target = service.list().unwrap()[0].id.clone();

        let remaining = service.remove(&target).unwrap();
        assert_eq!(remaining, 2);
        assert!(service.get(&target).unwrap().is_none());

        let err = service.remove(&target).expect_err("already removed");
        assert!(matches!(err, PharmacyError::UnknownMedicine(_)));
    }

    #[test]
    fn mark_expired_flips_derived_status() {
        let service = seeded_service();
        let today = date(2025, 6, 15);
        let target = service.list().unwrap()[0].id.clone();

        let before = service.get(&target).unwrap().unwrap();
        assert_eq!(before.status(today), StockStatus::InStock);

        let after = service.mark_expired(&target, today).unwrap();
        assert_eq!(after.stock, 0);
        assert_eq!(after.status(today), StockStatus::Expired);
    }

    #[test]
    fn mark_out_of_stock_leaves_expiry_alone() {
        let service = seeded_service();
        let today = date(2025, 6, 15);
        let target = service.list().unwrap()[0].id.clone();

        let after = service.mark_out_of_stock(&target).unwrap();
        assert_eq!(after.stock, 0);
        // Not expired: only the stock went to zero, so it reads Low.
        assert_eq!(after.status(today), StockStatus::Low);
    }

    #[test]
    fn summary_reflects_store_contents() {
        let service = seeded_service();
        let summary = service.summary(date(2025, 6, 15)).unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.low_stock, 1); // Amoxicillin at 8 <= 20
        assert_eq!(summary.expired, 0);
    }

    #[test]
    fn groups_by_active_ingredient() {
        let service = seeded_service();
        let group = service.by_active_ingredient("Paracetamol").unwrap();
        assert_eq!(group.len(), 3);
        assert!(service.by_active_ingredient("Ibuprofen").unwrap().is_empty());
    }
}
