//! TableConfig: construction parameters for a table.

use crate::error::{Result, TableError};

/// Default slot count for `ChainedTable::new`.
pub const DEFAULT_CAPACITY: usize = 11;

/// Default ratio of records to slots that triggers growth.
pub const DEFAULT_LOAD_FACTOR: f32 = 0.75;

/// Largest slot count growth will ever allocate.
pub const MAX_CAPACITY: usize = i32::MAX as usize - 8;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TableConfig {
    /// Requested slot count; `0` is normalised to `1`.
    pub initial_capacity: usize,
    /// Must be positive and not NaN.
    pub load_factor: f32,
    /// Growth cap; must be at least 1.
    pub max_capacity: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_CAPACITY,
            load_factor: DEFAULT_LOAD_FACTOR,
            max_capacity: MAX_CAPACITY,
        }
    }
}

impl TableConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    pub fn with_load_factor(mut self, load_factor: f32) -> Self {
        self.load_factor = load_factor;
        self
    }

    pub fn with_max_capacity(mut self, max_capacity: usize) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    /// Check every field and return the slot count to allocate.
    pub fn validate(&self) -> Result<usize> {
        if self.load_factor.is_nan() || self.load_factor <= 0.0 {
            return Err(TableError::InvalidArgument(format!(
                "illegal load factor: {}",
                self.load_factor
            )));
        }
        if self.max_capacity == 0 {
            return Err(TableError::InvalidArgument(
                "max capacity must be at least 1".to_string(),
            ));
        }
        if self.initial_capacity > self.max_capacity {
            return Err(TableError::InvalidArgument(format!(
                "illegal capacity: {} exceeds maximum {}",
                self.initial_capacity, self.max_capacity
            )));
        }
        Ok(self.initial_capacity.max(1))
    }

    /// `floor(min(capacity * load_factor, max_capacity + 1))`.
    pub(crate) fn threshold_for(&self, capacity: usize) -> usize {
        let scaled = capacity as f64 * f64::from(self.load_factor);
        let cap = self.max_capacity as f64 + 1.0;
        scaled.min(cap) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_classic_table() {
        let c = TableConfig::default();
        assert_eq!(c.validate(), Ok(11));
        assert_eq!(c.threshold_for(11), 8);
        assert_eq!(c.threshold_for(23), 17);
    }

    #[test]
    fn zero_capacity_normalises_to_one() {
        let c = TableConfig::new().with_capacity(0);
        assert_eq!(c.validate(), Ok(1));
    }

    #[test]
    fn bad_load_factors_are_rejected() {
        for lf in [0.0f32, -1.0, f32::NAN] {
            let c = TableConfig::new().with_load_factor(lf);
            assert!(matches!(c.validate(), Err(TableError::InvalidArgument(_))));
        }
    }

    #[test]
    fn threshold_is_capped_one_past_max() {
        let c = TableConfig::new()
            .with_load_factor(f32::INFINITY)
            .with_max_capacity(64);
        assert_eq!(c.threshold_for(32), 65);
    }

    #[test]
    fn capacity_above_max_is_rejected() {
        let c = TableConfig::new().with_capacity(100).with_max_capacity(50);
        assert!(c.validate().is_err());
        let c = TableConfig::new().with_max_capacity(0);
        assert!(c.validate().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_round_trip_and_partial_documents() {
        let c = TableConfig::new().with_capacity(97).with_load_factor(0.5);
        let json = serde_json::to_string(&c).unwrap();
        let back: TableConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);

        let partial: TableConfig = serde_json::from_str(r#"{"load_factor":0.5}"#).unwrap();
        assert_eq!(partial.load_factor, 0.5);
        assert_eq!(partial.initial_capacity, DEFAULT_CAPACITY);
        assert_eq!(partial.max_capacity, MAX_CAPACITY);
        assert_eq!(partial.validate(), Ok(11));
    }
}
