//! # Constants and type definitions for obsqc
//!
//! This module centralizes the **missing-value sentinels** and the **common type aliases**
//! shared by the observation store, the accessor and the filters.
//!
//! ## Overview
//!
//! - Identifier aliases for observation locations and records
//! - Missing-value sentinels, one per storable data type
//! - The [`MissingValue`] trait giving generic access to those sentinels
//!
//! Missing values are **data**, not errors: they flow unchanged through variable retrieval
//! and grouping. Two locations whose category variable is missing fall in the same group.

use hifitime::Epoch;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Identifier of an observation location (local or global depending on the accessor)
pub type ObsId = usize;

/// Record (profile) number attached to every location of the store
pub type RecordNumber = usize;

/// Name of the group holding per-location metadata
pub const METADATA_GROUP: &str = "MetaData";

// -------------------------------------------------------------------------------------------------
// Missing-value sentinels
// -------------------------------------------------------------------------------------------------

/// Sentinel for a missing integer value
pub const MISSING_INT: i32 = -2_147_483_643;

/// Sentinel for a missing single precision value
pub const MISSING_FLOAT: f32 = -3.368_795_3e38;

/// Sentinel for a missing double precision value
pub const MISSING_DOUBLE: f64 = -3.368_795_280_899_127e38;

/// Sentinel for a missing string value
pub const MISSING_STRING: &str = "*** MISSING ***";

/// Sentinel for a missing date-time value (9996-02-28T23:23:23 UTC)
pub fn missing_date_time() -> Epoch {
    Epoch::from_gregorian_utc_hms(9996, 2, 28, 23, 23, 23)
}

/// Access to the missing-value sentinel of a storable type.
///
/// Comparisons against the sentinel are exact, the same way the store writes it.
pub trait MissingValue: Sized {
    /// The sentinel used to mark a missing value of this type.
    fn missing_value() -> Self;

    /// `true` if `self` equals the sentinel.
    fn is_missing(&self) -> bool;
}

impl MissingValue for i32 {
    fn missing_value() -> Self {
        MISSING_INT
    }

    fn is_missing(&self) -> bool {
        *self == MISSING_INT
    }
}

impl MissingValue for f32 {
    fn missing_value() -> Self {
        MISSING_FLOAT
    }

    fn is_missing(&self) -> bool {
        *self == MISSING_FLOAT
    }
}

impl MissingValue for f64 {
    fn missing_value() -> Self {
        MISSING_DOUBLE
    }

    fn is_missing(&self) -> bool {
        *self == MISSING_DOUBLE
    }
}

impl MissingValue for String {
    fn missing_value() -> Self {
        MISSING_STRING.to_string()
    }

    fn is_missing(&self) -> bool {
        self == MISSING_STRING
    }
}

impl MissingValue for Epoch {
    fn missing_value() -> Self {
        missing_date_time()
    }

    fn is_missing(&self) -> bool {
        *self == missing_date_time()
    }
}

#[cfg(test)]
mod constants_test {
    use super::*;

    #[test]
    fn test_missing_values_roundtrip() {
        assert!(i32::missing_value().is_missing());
        assert!(f32::missing_value().is_missing());
        assert!(f64::missing_value().is_missing());
        assert!(String::missing_value().is_missing());
        assert!(Epoch::missing_value().is_missing());

        assert!(!0_i32.is_missing());
        assert!(!1.5_f32.is_missing());
        assert!(!"stationA".to_string().is_missing());
        assert!(!Epoch::from_gregorian_utc_at_midnight(2021, 1, 1).is_missing());
    }
}
