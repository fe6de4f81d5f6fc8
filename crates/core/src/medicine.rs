//! Medicine inventory types and pure query helpers.
//!
//! Stock status is derived, not stored: it is recomputed from stock, reorder
//! threshold and expiry date against the caller's clock on every read, so it
//! can go stale between reads but never disagrees with the underlying fields.
//!
//! Sorting and pagination are plain in-memory operations. `Paginator::next`
//! and `prev` clamp to the valid range; `set_page` does not, and a page past
//! the end simply reads as empty.

use crate::{PharmacyError, PharmacyResult};
use chrono::NaiveDate;
use rx_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Days before expiry at which a medicine counts as "near expiry".
pub const NEAR_EXPIRY_WINDOW_DAYS: i64 = 30;

/// Stock level below which a medicine counts as "dispatched" in the overview.
const DISPATCHED_BELOW: u32 = 200;

/// One inventory record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Medicine {
    pub id: String,
    pub name: String,
    pub category: String,
    pub price: f64,
    pub stock: u32,
    /// Reorder threshold: at or below this, the medicine reports `Low`.
    pub threshold: u32,
    pub expiry_date: NaiveDate,
    pub manufacturer: String,
    #[serde(default)]
    pub active_ingredient: String,
    #[serde(default)]
    pub supplier: String,
    #[serde(default)]
    pub effects: String,
}

impl Medicine {
    /// Derived status against the given date.
    pub fn status(&self, today: NaiveDate) -> StockStatus {
        stock_status(self.stock, self.threshold, self.expiry_date, today)
    }
}

/// Derived inventory status. Computed at read time, never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StockStatus {
    Expired,
    Low,
    InStock,
}

impl serde::Serialize for StockStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl StockStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StockStatus::Expired => "Expired",
            StockStatus::Low => "Low",
            StockStatus::InStock => "In Stock",
        }
    }
}

impl std::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a medicine's stock position.
///
/// Expiry takes precedence: an expired item reports `Expired` even when its
/// stock is also at or below the threshold.
pub fn stock_status(
    stock: u32,
    threshold: u32,
    expiry_date: NaiveDate,
    today: NaiveDate,
) -> StockStatus {
    if expiry_date < today {
        StockStatus::Expired
    } else if stock <= threshold {
        StockStatus::Low
    } else {
        StockStatus::InStock
    }
}

// ============================================================================
// Search, sort, pagination
// ============================================================================

/// Case-insensitive substring match over name, category and manufacturer.
/// Empty (or whitespace-only) text matches everything.
pub fn matches_search(medicine: &Medicine, text: &str) -> bool {
    let text = text.trim().to_lowercase();
    if text.is_empty() {
        return true;
    }
    medicine.name.to_lowercase().contains(&text)
        || medicine.category.to_lowercase().contains(&text)
        || medicine.manufacturer.to_lowercase().contains(&text)
}

/// Fields the inventory list can be sorted by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Name,
    Category,
    Price,
    Stock,
    ExpiryDate,
    Manufacturer,
}

impl SortKey {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "name" => Some(SortKey::Name),
            "category" => Some(SortKey::Category),
            "price" => Some(SortKey::Price),
            "stock" => Some(SortKey::Stock),
            "expiry_date" => Some(SortKey::ExpiryDate),
            "manufacturer" => Some(SortKey::Manufacturer),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Active sort: a key plus a direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SortConfig {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortConfig {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    /// Apply a key to the current sort state: re-selecting the ascending key
    /// flips to descending, anything else starts ascending.
    pub fn toggle(current: Option<SortConfig>, key: SortKey) -> SortConfig {
        match current {
            Some(config) if config.key == key && config.direction == SortDirection::Asc => {
                SortConfig::new(key, SortDirection::Desc)
            }
            _ => SortConfig::new(key, SortDirection::Asc),
        }
    }
}

/// Sort medicines in place. The sort is stable; values that do not compare
/// (a NaN price) are treated as equal and keep their relative order.
pub fn sort_medicines(medicines: &mut [Medicine], config: SortConfig) {
    medicines.sort_by(|a, b| {
        let ordering = match config.key {
            SortKey::Name => a.name.cmp(&b.name),
            SortKey::Category => a.category.cmp(&b.category),
            SortKey::Price => a.price.partial_cmp(&b.price).unwrap_or(Ordering::Equal),
            SortKey::Stock => a.stock.cmp(&b.stock),
            SortKey::ExpiryDate => a.expiry_date.cmp(&b.expiry_date),
            SortKey::Manufacturer => a.manufacturer.cmp(&b.manufacturer),
        };
        match config.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}

/// Slice out one page (1-based). A page past the end is empty, not an error.
pub fn paginate<T>(items: &[T], page: usize, per_page: usize) -> &[T] {
    if per_page == 0 {
        return &[];
    }
    let start = page.saturating_sub(1).saturating_mul(per_page);
    if start >= items.len() {
        return &[];
    }
    let end = (start + per_page).min(items.len());
    &items[start..end]
}

/// 1-based page cursor over a list of known length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Paginator {
    page: usize,
    per_page: usize,
}

impl Paginator {
    pub fn new(per_page: usize) -> Self {
        Self {
            page: 1,
            per_page: per_page.max(1),
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }

    /// Number of pages needed for `total_items` (at least 1).
    pub fn total_pages(&self, total_items: usize) -> usize {
        total_items.div_ceil(self.per_page).max(1)
    }

    /// Advance one page, stopping at the last page for `total_items`.
    pub fn next(&mut self, total_items: usize) {
        if self.page * self.per_page < total_items {
            self.page += 1;
        }
    }

    /// Go back one page, stopping at page 1.
    pub fn prev(&mut self) {
        self.page = self.page.saturating_sub(1).max(1);
    }

    /// Jump to an arbitrary page. Deliberately unclamped: an out-of-range
    /// page reads as empty rather than being snapped to the last page.
    pub fn set_page(&mut self, page: usize) {
        self.page = page.max(1);
    }

    /// Pull the cursor back into range after items were removed.
    pub fn clamp_to(&mut self, total_items: usize) {
        self.page = self.page.min(self.total_pages(total_items));
    }
}

// ============================================================================
// Overview counts
// ============================================================================

/// Dashboard counters derived from the inventory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct InventorySummary {
    pub total: usize,
    pub low_stock: usize,
    pub expired: usize,
    pub near_expiry: usize,
    pub received: usize,
    pub dispatched: usize,
}

/// Compute the overview counters against the given date.
pub fn summarise(medicines: &[Medicine], today: NaiveDate) -> InventorySummary {
    let near_expiry = medicines
        .iter()
        .filter(|m| {
            let days = (m.expiry_date - today).num_days();
            days > 0 && days <= NEAR_EXPIRY_WINDOW_DAYS
        })
        .count();

    InventorySummary {
        total: medicines.len(),
        low_stock: medicines.iter().filter(|m| m.stock <= m.threshold).count(),
        expired: medicines
            .iter()
            .filter(|m| m.expiry_date < today)
            .count(),
        near_expiry,
        received: medicines.iter().filter(|m| m.stock > 0).count(),
        dispatched: medicines
            .iter()
            .filter(|m| m.stock < DISPATCHED_BELOW)
            .count(),
    }
}

// ============================================================================
// Creation and update carriers
// ============================================================================

/// Validated input for adding a medicine.
#[derive(Clone, Debug, Deserialize)]
pub struct NewMedicine {
    pub name: NonEmptyText,
    pub category: NonEmptyText,
    pub price: f64,
    pub stock: u32,
    pub threshold: u32,
    pub expiry_date: NaiveDate,
    pub manufacturer: NonEmptyText,
    #[serde(default)]
    pub active_ingredient: Option<String>,
    #[serde(default)]
    pub supplier: Option<String>,
    #[serde(default)]
    pub effects: Option<String>,
}

impl NewMedicine {
    /// Checks the fields the type system cannot: the price must be a finite,
    /// non-negative number.
    pub fn validate(&self) -> PharmacyResult<()> {
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(PharmacyError::InvalidInput(
                "price must be a non-negative number".into(),
            ));
        }
        Ok(())
    }
}

/// Partial edit of a medicine. Present fields replace stored values after
/// validation; absent fields are untouched.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MedicineUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub stock: Option<u32>,
    pub threshold: Option<u32>,
    pub expiry_date: Option<NaiveDate>,
    pub manufacturer: Option<String>,
    pub active_ingredient: Option<String>,
    pub supplier: Option<String>,
    pub effects: Option<String>,
}

impl Medicine {
    /// Apply a partial update, validating each present field.
    pub fn apply_update(&mut self, update: MedicineUpdate) -> PharmacyResult<()> {
        if let Some(price) = update.price {
            if !price.is_finite() || price < 0.0 {
                return Err(PharmacyError::InvalidInput(
                    "price must be a non-negative number".into(),
                ));
            }
        }
        let name = update
            .name
            .map(|n| {
                NonEmptyText::new(&n)
                    .map_err(|_| PharmacyError::InvalidInput("name must not be empty".into()))
            })
            .transpose()?;
        let category = update
            .category
            .map(|c| {
                NonEmptyText::new(&c)
                    .map_err(|_| PharmacyError::InvalidInput("category must not be empty".into()))
            })
            .transpose()?;
        let manufacturer = update
            .manufacturer
            .map(|m| {
                NonEmptyText::new(&m).map_err(|_| {
                    PharmacyError::InvalidInput("manufacturer must not be empty".into())
                })
            })
            .transpose()?;

        if let Some(name) = name {
            self.name = name.into_string();
        }
        if let Some(category) = category {
            self.category = category.into_string();
        }
        if let Some(price) = update.price {
            self.price = price;
        }
        if let Some(stock) = update.stock {
            self.stock = stock;
        }
        if let Some(threshold) = update.threshold {
            self.threshold = threshold;
        }
        if let Some(expiry_date) = update.expiry_date {
            self.expiry_date = expiry_date;
        }
        if let Some(manufacturer) = manufacturer {
            self.manufacturer = manufacturer.into_string();
        }
        if let Some(active_ingredient) = update.active_ingredient {
            self.active_ingredient = active_ingredient;
        }
        if let Some(supplier) = update.supplier {
            self.supplier = supplier;
        }
        if let Some(effects) = update.effects {
            self.effects = effects;
        }
        Ok(())
    }
}
