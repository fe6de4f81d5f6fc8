//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. The intent is to avoid reading process-wide environment variables
//! during request handling, which can lead to inconsistent behaviour in multi-threaded runtimes
//! and test harnesses.

use crate::{PharmacyError, PharmacyResult};

/// Items shown per inventory page unless the caller asks otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 5;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    page_size: usize,
    seed_demo_data: bool,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    pub fn new(page_size: usize, seed_demo_data: bool) -> PharmacyResult<Self> {
        if page_size == 0 {
            return Err(PharmacyError::InvalidInput(
                "page_size must be at least 1".into(),
            ));
        }

        Ok(Self {
            page_size,
            seed_demo_data,
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn seed_demo_data(&self) -> bool {
        self.seed_demo_data
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            seed_demo_data: false,
        }
    }
}

/// Parse the page size from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_PAGE_SIZE`].
pub fn page_size_from_env_value(value: Option<String>) -> PharmacyResult<usize> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(DEFAULT_PAGE_SIZE),
        Some(v) => {
            let parsed = v.parse::<usize>().map_err(|_| {
                PharmacyError::InvalidInput(format!("invalid page size: {v}"))
            })?;
            if parsed == 0 {
                return Err(PharmacyError::InvalidInput(
                    "page size must be at least 1".into(),
                ));
            }
            Ok(parsed)
        }
    }
}

/// Parse a boolean flag from an optional string value.
///
/// Accepts `1`/`true`/`yes` (case-insensitive); anything else is off.
pub fn flag_from_env_value(value: Option<String>) -> bool {
    matches!(
        value.as_deref().map(str::trim).map(str::to_lowercase).as_deref(),
        Some("1") | Some("true") | Some("yes")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_page_size() {
        assert!(CoreConfig::new(0, false).is_err());
        assert!(page_size_from_env_value(Some("0".into())).is_err());
    }

    #[test]
    fn empty_env_value_falls_back_to_default() {
        assert_eq!(page_size_from_env_value(None).unwrap(), DEFAULT_PAGE_SIZE);
        assert_eq!(
            page_size_from_env_value(Some("  ".into())).unwrap(),
            DEFAULT_PAGE_SIZE
        );
    }

    #[test]
    fn flag_accepts_common_truthy_values() {
        assert!(flag_from_env_value(Some("1".into())));
        assert!(flag_from_env_value(Some("TRUE".into())));
        assert!(!flag_from_env_value(Some("off".into())));
        assert!(!flag_from_env_value(None));
    }
}
