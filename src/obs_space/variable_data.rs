//! Typed per-location values of one observation-space variable, and the keys used to group
//! locations by value.

use std::fmt;

use hifitime::Epoch;
use ordered_float::OrderedFloat;

/// Storage type of an observation-space variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObsDtype {
    Int,
    Float,
    Double,
    String,
    DateTime,
}

impl fmt::Display for ObsDtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObsDtype::Int => "int",
            ObsDtype::Float => "float",
            ObsDtype::Double => "double",
            ObsDtype::String => "string",
            ObsDtype::DateTime => "datetime",
        };
        f.write_str(name)
    }
}

/// Values of one variable at successive locations of the local partition.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableData {
    Int(Vec<i32>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    String(Vec<String>),
    DateTime(Vec<Epoch>),
}

impl VariableData {
    pub fn dtype(&self) -> ObsDtype {
        match self {
            VariableData::Int(_) => ObsDtype::Int,
            VariableData::Float(_) => ObsDtype::Float,
            VariableData::Double(_) => ObsDtype::Double,
            VariableData::String(_) => ObsDtype::String,
            VariableData::DateTime(_) => ObsDtype::DateTime,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            VariableData::Int(v) => v.len(),
            VariableData::Float(v) => v.len(),
            VariableData::Double(v) => v.len(),
            VariableData::String(v) => v.len(),
            VariableData::DateTime(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grouping key of every value, in location order.
    pub fn category_keys(&self) -> Vec<CategoryKey> {
        match self {
            VariableData::Int(v) => v.iter().map(|&x| CategoryKey::Int(x.into())).collect(),
            VariableData::Float(v) => v
                .iter()
                .map(|&x| CategoryKey::Real(OrderedFloat(x.into())))
                .collect(),
            VariableData::Double(v) => v.iter().map(|&x| CategoryKey::Real(OrderedFloat(x))).collect(),
            VariableData::String(v) => v.iter().cloned().map(CategoryKey::Str).collect(),
            VariableData::DateTime(v) => v
                .iter()
                .map(|epoch| CategoryKey::Time(epoch.to_tai_duration().total_nanoseconds()))
                .collect(),
        }
    }
}

/// Key under which a location is grouped when splitting by the value of a variable.
///
/// Values compare exactly: two reals form one group only when they are equal (widening `f32`
/// to `f64` is exact), two strings only when they are identical, two date-times only when
/// they denote the same TAI instant. Missing-value sentinels are ordinary keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CategoryKey {
    Int(i64),
    Real(OrderedFloat<f64>),
    Str(String),
    /// Nanoseconds since the TAI reference epoch.
    Time(i128),
}

/// A Rust type that can be read from an observation-space variable.
pub trait ObsValue: Clone + Send + Sync + 'static {
    const DTYPE: ObsDtype;

    /// The values of `data`, or `None` if `data` holds another type.
    fn values(data: &VariableData) -> Option<&[Self]>;
}

macro_rules! impl_obs_value {
    ($ty:ty, $variant:ident) => {
        impl ObsValue for $ty {
            const DTYPE: ObsDtype = ObsDtype::$variant;

            fn values(data: &VariableData) -> Option<&[Self]> {
                match data {
                    VariableData::$variant(values) => Some(values),
                    _ => None,
                }
            }
        }

        impl From<Vec<$ty>> for VariableData {
            fn from(values: Vec<$ty>) -> Self {
                VariableData::$variant(values)
            }
        }
    };
}

impl_obs_value!(i32, Int);
impl_obs_value!(f32, Float);
impl_obs_value!(f64, Double);
impl_obs_value!(String, String);
impl_obs_value!(Epoch, DateTime);

impl From<Vec<&str>> for VariableData {
    fn from(values: Vec<&str>) -> Self {
        VariableData::String(values.into_iter().map(str::to_string).collect())
    }
}

#[cfg(test)]
mod variable_data_test {
    use super::*;
    use crate::constants::{MissingValue, MISSING_FLOAT};

    #[test]
    fn test_category_keys_exact_equality() {
        let data = VariableData::from(vec![1.5_f32, 1.5, 2.0, MISSING_FLOAT, MISSING_FLOAT]);
        let keys = data.category_keys();
        assert_eq!(keys[0], keys[1]);
        assert_ne!(keys[1], keys[2]);
        assert_eq!(keys[3], keys[4]);

        let data = VariableData::from(vec!["a", "a ", "a"]);
        let keys = data.category_keys();
        assert_ne!(keys[0], keys[1]);
        assert_eq!(keys[0], keys[2]);
    }

    #[test]
    fn test_date_time_keys() {
        let t0 = Epoch::from_gregorian_utc_at_midnight(2021, 1, 1);
        let data = VariableData::from(vec![t0, Epoch::missing_value(), t0]);
        let keys = data.category_keys();
        assert_eq!(keys[0], keys[2]);
        assert_ne!(keys[0], keys[1]);
        assert_eq!(data.dtype(), ObsDtype::DateTime);
    }

    #[test]
    fn test_typed_access() {
        let data = VariableData::from(vec![3, 4, 5]);
        assert_eq!(i32::values(&data), Some(&[3, 4, 5][..]));
        assert_eq!(f64::values(&data), None);
        assert_eq!(data.len(), 3);
    }
}
