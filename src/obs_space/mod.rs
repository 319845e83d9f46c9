//! # Observation space
//!
//! The local partition of a distributed observation collection. An [`ObsSpace`] holds, for
//! the locations assigned to the current rank:
//!
//! * typed variables keyed by `(group, name)` ([`VariableData`]),
//! * the list of simulated variables (and the channel count) QC flags are kept for,
//! * a **record number** per location and the **record index** (`recidx`): record number →
//!   ordered member locations,
//! * the [`Distribution`] shared by every partition of the collection.
//!
//! ## Records
//!
//! A record (profile) groups locations that belong together, e.g. the levels of a vertical
//! sounding. A record always resides on a single rank. Record numbers come from one of:
//!
//! 1. explicit numbers given to [`ObsSpaceBuilder::record_numbers`],
//! 2. the distinct values of the `MetaData` variables given to
//!    [`ObsSpaceBuilder::group_records_by`]: the `k`-th distinct value seen locally becomes
//!    record `k * num_ranks + rank`,
//! 3. otherwise one record per location: location `i` becomes record `i * num_ranks + rank`.
//!
//! The generated numbers are unique across ranks without any communication.
//!
//! ## Typical usage
//!
//! ```rust
//! use std::sync::Arc;
//! use obsqc::distribution::Distribution;
//! use obsqc::obs_space::ObsSpace;
//!
//! let obsdb = ObsSpace::builder(Arc::new(Distribution::local()))
//!     .simulated_variables(&["airTemperature"])
//!     .variable("MetaData", "stationId", vec!["A", "A", "B"])
//!     .variable("ObsValue", "airTemperature", vec![280.0_f32, 281.5, 279.0])
//!     .group_records_by(&["stationId"])
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(obsdb.nlocs(), 3);
//! assert_eq!(obsdb.recidx_all_recnums(), vec![0, 1]);
//! ```

mod obs_data_vector;
mod variable_data;

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use ahash::RandomState;
use tracing::trace;

use crate::{
    constants::{RecordNumber, METADATA_GROUP},
    distribution::Distribution,
    obsqc_errors::ObsQcError,
};

pub use obs_data_vector::ObsDataVector;
pub use variable_data::{CategoryKey, ObsDtype, ObsValue, VariableData};

type VariableKey = (String, String);

/// Local partition of an observation collection.
#[derive(Debug, Clone)]
pub struct ObsSpace {
    distribution: Arc<Distribution>,
    nlocs: usize,
    nchans: usize,
    obs_variables: Vec<String>,
    obs_group_vars: Vec<String>,
    variables: BTreeMap<VariableKey, VariableData>,
    record_numbers: Vec<RecordNumber>,
    recidx: BTreeMap<RecordNumber, Vec<usize>>,
}

impl ObsSpace {
    /// Start building the partition of the current rank of `distribution`.
    pub fn builder(distribution: Arc<Distribution>) -> ObsSpaceBuilder {
        ObsSpaceBuilder::new(distribution)
    }

    pub fn distribution(&self) -> &Arc<Distribution> {
        &self.distribution
    }

    /// Number of locations held on the current rank.
    pub fn nlocs(&self) -> usize {
        self.nlocs
    }

    /// Number of channels of the simulated variables (0 for non-channelled data).
    pub fn nchans(&self) -> usize {
        self.nchans
    }

    /// Simulated variables, by expanded name; QC flag tables have one row per entry.
    pub fn obsvariables(&self) -> &[String] {
        &self.obs_variables
    }

    /// `MetaData` variables whose distinct values define the records (empty if records were
    /// not formed from variables).
    pub fn obs_group_vars(&self) -> &[String] {
        &self.obs_group_vars
    }

    pub fn has(&self, group: &str, name: &str) -> bool {
        self.variables
            .contains_key(&(group.to_string(), name.to_string()))
    }

    pub fn dtype(&self, group: &str, name: &str) -> Result<ObsDtype, ObsQcError> {
        self.data(group, name).map(VariableData::dtype)
    }

    /// Raw values of `group/name`.
    pub fn data(&self, group: &str, name: &str) -> Result<&VariableData, ObsQcError> {
        self.variables
            .get(&(group.to_string(), name.to_string()))
            .ok_or_else(|| ObsQcError::VariableNotFound {
                group: group.to_string(),
                name: name.to_string(),
            })
    }

    /// Values of `group/name` at the local locations.
    ///
    /// Return
    /// ----------
    /// * [`ObsQcError::VariableNotFound`] if the variable does not exist,
    ///   [`ObsQcError::DtypeMismatch`] if it is not stored as `T`.
    pub fn get_db<T: ObsValue>(&self, group: &str, name: &str) -> Result<Vec<T>, ObsQcError> {
        let data = self.data(group, name)?;
        T::values(data)
            .map(<[T]>::to_vec)
            .ok_or_else(|| ObsQcError::DtypeMismatch {
                group: group.to_string(),
                name: name.to_string(),
                expected: T::DTYPE,
                found: data.dtype(),
            })
    }

    /// Grouping keys of `group/name` at the local locations.
    pub fn category_keys(&self, group: &str, name: &str) -> Result<Vec<CategoryKey>, ObsQcError> {
        self.data(group, name).map(VariableData::category_keys)
    }

    /// Record number of every local location.
    pub fn record_numbers(&self) -> &[RecordNumber] {
        &self.record_numbers
    }

    /// Distinct record numbers present locally, in ascending order.
    pub fn recidx_all_recnums(&self) -> Vec<RecordNumber> {
        self.recidx.keys().copied().collect()
    }

    /// Local locations of record `recnum`, in ascending order; empty if unknown.
    pub fn recidx_vector(&self, recnum: RecordNumber) -> &[usize] {
        self.recidx.get(&recnum).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Validating builder for [`ObsSpace`].
#[derive(Debug, Clone)]
pub struct ObsSpaceBuilder {
    distribution: Arc<Distribution>,
    nlocs: Option<usize>,
    nchans: usize,
    obs_variables: Vec<String>,
    obs_group_vars: Vec<String>,
    variables: Vec<(VariableKey, VariableData)>,
    record_numbers: Option<Vec<RecordNumber>>,
}

impl ObsSpaceBuilder {
    pub fn new(distribution: Arc<Distribution>) -> Self {
        ObsSpaceBuilder {
            distribution,
            nlocs: None,
            nchans: 0,
            obs_variables: Vec::new(),
            obs_group_vars: Vec::new(),
            variables: Vec::new(),
            record_numbers: None,
        }
    }

    /// Number of local locations. Inferred from the variables when not set.
    pub fn nlocs(mut self, nlocs: usize) -> Self {
        self.nlocs = Some(nlocs);
        self
    }

    pub fn nchans(mut self, nchans: usize) -> Self {
        self.nchans = nchans;
        self
    }

    pub fn simulated_variables<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.obs_variables = names.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    pub fn variable(mut self, group: &str, name: &str, data: impl Into<VariableData>) -> Self {
        self.variables
            .push(((group.to_string(), name.to_string()), data.into()));
        self
    }

    /// Form records from the distinct values of these `MetaData` variables.
    pub fn group_records_by<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.obs_group_vars = names.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    /// Use explicit record numbers, one per location.
    pub fn record_numbers(mut self, record_numbers: Vec<RecordNumber>) -> Self {
        self.record_numbers = Some(record_numbers);
        self
    }

    /// Validate the inputs and build the observation space.
    ///
    /// Return
    /// ----------
    /// * [`ObsQcError::LengthMismatch`] if a variable or the record numbers do not have one
    ///   entry per location,
    /// * [`ObsQcError::DuplicateVariable`] if a variable is given twice,
    /// * [`ObsQcError::InvalidRecordGrouping`] if both explicit record numbers and grouping
    ///   variables are given,
    /// * [`ObsQcError::VariableNotFound`] if a grouping variable is not in `MetaData`.
    pub fn build(self) -> Result<ObsSpace, ObsQcError> {
        let nlocs = self
            .nlocs
            .or_else(|| self.variables.first().map(|(_, data)| data.len()))
            .or_else(|| self.record_numbers.as_ref().map(Vec::len))
            .unwrap_or(0);

        let mut variables = BTreeMap::new();
        for ((group, name), data) in self.variables {
            if data.len() != nlocs {
                return Err(ObsQcError::LengthMismatch {
                    variable: format!("{group}/{name}"),
                    expected: nlocs,
                    found: data.len(),
                });
            }
            let full_name = format!("{group}/{name}");
            if variables.insert((group, name), data).is_some() {
                return Err(ObsQcError::DuplicateVariable(full_name));
            }
        }

        let rank = self.distribution.rank();
        let num_ranks = self.distribution.num_ranks();

        let record_numbers = match self.record_numbers {
            Some(_) if !self.obs_group_vars.is_empty() => {
                return Err(ObsQcError::InvalidRecordGrouping(
                    "explicit record numbers cannot be combined with grouping variables".into(),
                ));
            }
            Some(record_numbers) => {
                if record_numbers.len() != nlocs {
                    return Err(ObsQcError::LengthMismatch {
                        variable: "record numbers".into(),
                        expected: nlocs,
                        found: record_numbers.len(),
                    });
                }
                record_numbers
            }
            None if self.obs_group_vars.is_empty() => {
                (0..nlocs).map(|i| i * num_ranks + rank).collect()
            }
            None => {
                let mut columns = Vec::with_capacity(self.obs_group_vars.len());
                for name in &self.obs_group_vars {
                    let data = variables
                        .get(&(METADATA_GROUP.to_string(), name.clone()))
                        .ok_or_else(|| ObsQcError::VariableNotFound {
                            group: METADATA_GROUP.to_string(),
                            name: name.clone(),
                        })?;
                    columns.push(data.category_keys());
                }

                let mut record_of_value: HashMap<Vec<CategoryKey>, RecordNumber, RandomState> =
                    HashMap::default();
                (0..nlocs)
                    .map(|i| {
                        let value: Vec<CategoryKey> =
                            columns.iter().map(|column| column[i].clone()).collect();
                        let next = record_of_value.len();
                        *record_of_value
                            .entry(value)
                            .or_insert(next * num_ranks + rank)
                    })
                    .collect()
            }
        };

        let mut recidx: BTreeMap<RecordNumber, Vec<usize>> = BTreeMap::new();
        for (loc, &recnum) in record_numbers.iter().enumerate() {
            recidx.entry(recnum).or_default().push(loc);
        }

        trace!(
            rank,
            nlocs,
            nrecs = recidx.len(),
            "observation space partition built"
        );

        Ok(ObsSpace {
            distribution: self.distribution,
            nlocs,
            nchans: self.nchans,
            obs_variables: self.obs_variables,
            obs_group_vars: self.obs_group_vars,
            variables,
            record_numbers,
            recidx,
        })
    }
}
