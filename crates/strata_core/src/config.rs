//! # Store Configuration
//!
//! Sizing policy for component arrays. Loaded once at startup, either from
//! defaults or from a TOML document:
//!
//! ```toml
//! initial_capacity = 64
//! max_growth_capacity = 1048576
//! ```

use serde::Deserialize;

use crate::error::{EcsError, EcsResult};

/// Rows allocated for a fresh component array.
pub const DEFAULT_INITIAL_CAPACITY: usize = 4;

/// Upper bound for geometric growth. Growth past this only happens when a
/// caller explicitly asks for more rows than the cap.
pub const DEFAULT_MAX_GROWTH_CAPACITY: usize = 2 * 1024 * 1024;

/// Sizing policy shared by every component array of a manager.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Rows allocated when an array is created, and the first growth step
    /// of an array whose capacity is zero.
    pub initial_capacity: usize,
    /// Doubling stops at this many rows.
    pub max_growth_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            max_growth_capacity: DEFAULT_MAX_GROWTH_CAPACITY,
        }
    }
}

impl StoreConfig {
    /// Parses and validates a configuration from TOML.
    ///
    /// Missing keys fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if the document does not parse or
    /// the values fail [`StoreConfig::validate`].
    pub fn from_toml_str(source: &str) -> EcsResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| EcsError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the values describe a usable growth policy.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if `max_growth_capacity` is zero
    /// or smaller than `initial_capacity`.
    pub fn validate(&self) -> EcsResult<()> {
        if self.max_growth_capacity == 0 {
            return Err(EcsError::InvalidConfig(
                "max_growth_capacity must be greater than zero".to_string(),
            ));
        }
        if self.initial_capacity > self.max_growth_capacity {
            return Err(EcsError::InvalidConfig(format!(
                "initial_capacity ({}) exceeds max_growth_capacity ({})",
                self.initial_capacity, self.max_growth_capacity
            )));
        }
        Ok(())
    }

    /// Capacity to grow to so that at least `min` rows fit.
    ///
    /// Doubles the current capacity (or starts at `initial_capacity`), caps
    /// the result at `max_growth_capacity`, and never returns less than `min`.
    #[must_use]
    pub fn grown_capacity(&self, current: usize, min: usize) -> usize {
        let doubled = if current == 0 {
            self.initial_capacity.max(1)
        } else {
            current.saturating_mul(2)
        };
        doubled.min(self.max_growth_capacity).max(min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.initial_capacity, 4);
        assert_eq!(config.max_growth_capacity, 2 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_partial() {
        let config = StoreConfig::from_toml_str("initial_capacity = 64").unwrap();
        assert_eq!(config.initial_capacity, 64);
        assert_eq!(config.max_growth_capacity, DEFAULT_MAX_GROWTH_CAPACITY);
    }

    #[test]
    fn test_from_toml_rejects_unknown_key() {
        let result = StoreConfig::from_toml_str("initial_capcity = 64");
        assert!(matches!(result, Err(EcsError::InvalidConfig(_))));
    }

    #[test]
    fn test_from_toml_rejects_inverted_bounds() {
        let result = StoreConfig::from_toml_str("initial_capacity = 10\nmax_growth_capacity = 5");
        assert!(matches!(result, Err(EcsError::InvalidConfig(_))));
    }

    #[test]
    fn test_growth_doubles_then_caps() {
        let config = StoreConfig {
            initial_capacity: 4,
            max_growth_capacity: 16,
        };
        assert_eq!(config.grown_capacity(0, 1), 4);
        assert_eq!(config.grown_capacity(4, 5), 8);
        assert_eq!(config.grown_capacity(8, 9), 16);
        assert_eq!(config.grown_capacity(16, 17), 17);
        // A large request wins over doubling
        assert_eq!(config.grown_capacity(4, 100), 100);
    }
}
