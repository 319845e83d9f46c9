//! # Access to observations held on multiple ranks
//!
//! An [`ObsAccessor`] is used by filters that process observations in **independent groups**.
//! It is created with one of three grouping policies:
//!
//! * [`ObsAccessor::to_all_observations`] – the observations held on all ranks form a single
//!   group,
//! * [`ObsAccessor::to_observations_split_into_independent_groups_by_record_id`] – every record
//!   (by definition held on a single rank) is processed independently,
//! * [`ObsAccessor::to_observations_split_into_independent_groups_by_variable`] – observations
//!   with different values of a *category variable* are processed independently. The groups
//!   are held on a single rank only if that variable is also the one the observation space
//!   used to form its records.
//!
//! Self-knowledge
//! -----------------
//! When every independent group lives on a single rank (record grouping, or grouping by the
//! record variable) the accessor has **self-knowledge**: every method works on the local
//! partition only and returns *local* ids. Otherwise, every method answers as if the
//! partitions of all ranks were concatenated in rank order and returns *global* ids: ids
//! `0..nlocs(0)` are the locations of rank 0, ids `nlocs(0)..nlocs(0) + nlocs(1)` those of
//! rank 1, and so on.
//!
//! Internally this is a choice of partition map: with self-knowledge the accessor uses
//! [`Distribution::local`], otherwise the distribution of the observation space. The code
//! paths are otherwise identical.
//!
//! Collective operations
//! -----------------
//! Without self-knowledge, the valid-id queries, the variable and record-id reads,
//! [`ObsAccessor::total_num_observations`], [`ObsAccessor::flag_rejected_observations`] and
//! splitting by variable communicate with every other rank. The by-variable constructor also
//! communicates when the category variable is declared as the record-grouping variable. All
//! ranks must call these methods in the same order.
//!
//! Typical usage
//! -----------------
//! ```rust
//! use std::sync::Arc;
//! use obsqc::{distribution::Distribution, obs_accessor::ObsAccessor, obs_space::ObsSpace};
//!
//! let obsdb = ObsSpace::builder(Arc::new(Distribution::local()))
//!     .variable("MetaData", "stationId", vec!["A", "B", "A", "B"])
//!     .group_records_by(&["stationId"])
//!     .build()
//!     .unwrap();
//!
//! let accessor = ObsAccessor::to_observations_split_into_independent_groups_by_record_id(&obsdb);
//! let apply = vec![true, true, false, true];
//! let valid_ids = accessor.get_valid_observation_ids_where(&apply);
//! assert_eq!(valid_ids, vec![0, 1, 3]);
//!
//! let splitter = accessor
//!     .split_observations_into_independent_groups(&valid_ids, false)
//!     .unwrap();
//! let mut is_rejected = vec![false; accessor.total_num_observations()];
//! for group in splitter.groups() {
//!     if group.len() < 2 {
//!         group.iter().for_each(|&pos| is_rejected[valid_ids[pos]] = true);
//!     }
//! }
//!
//! let mut flagged = vec![vec![false; obsdb.nlocs()]];
//! accessor.flag_rejected_observations(&is_rejected, &mut flagged);
//! assert_eq!(flagged[0], vec![true, false, false, false]);
//! ```

use std::{collections::HashMap, sync::Arc};

use ahash::RandomState;
use hifitime::Epoch;
use tracing::{debug, trace};

use crate::{
    constants::{ObsId, RecordNumber, METADATA_GROUP},
    distribution::Distribution,
    obs_space::{CategoryKey, ObsDataVector, ObsSpace, ObsValue},
    obsqc_errors::ObsQcError,
    qc_flags,
    recursive_splitter::RecursiveSplitter,
    variables::{Variable, Variables},
};

/// Grouping policy, fixed at construction.
#[derive(Debug, Clone, PartialEq)]
enum GroupBy {
    Nothing,
    RecordId,
    Variable {
        category_variable: Variable,
        /// `true` if the observation space formed its records from `category_variable`.
        records_grouped_by_category_variable: bool,
    },
}

/// Access to the observations of an [`ObsSpace`] that may be spread over several ranks.
///
/// The accessor borrows the observation space and holds no mutable state: it is created for
/// one filter pass and dropped afterwards.
#[derive(Debug, Clone)]
pub struct ObsAccessor<'a> {
    obsdb: &'a ObsSpace,
    obs_distribution: Arc<Distribution>,
    group_by: GroupBy,
    self_knowledge: bool,
}

impl<'a> ObsAccessor<'a> {
    /// Accessor treating the observations held on all ranks as a single group.
    pub fn to_all_observations(obsdb: &'a ObsSpace) -> Self {
        Self::new(obsdb, GroupBy::Nothing)
    }

    /// Accessor treating every record as an independent group.
    ///
    /// Records are trusted to reside entirely on one rank, so this accessor never communicates.
    pub fn to_observations_split_into_independent_groups_by_record_id(obsdb: &'a ObsSpace) -> Self {
        Self::new(obsdb, GroupBy::RecordId)
    }

    /// Accessor treating observations with different values of `variable` as independent.
    ///
    /// The values of `variable` are compared against the record numbers of the observation
    /// space: if `variable` is the `MetaData` variable the records were formed from, and its
    /// values map one-to-one onto records on every rank, each group is local and the accessor
    /// has self-knowledge.
    ///
    /// Return
    /// ----------
    /// * [`ObsQcError::VariableNotFound`] if `variable` is not in the observation space.
    pub fn to_observations_split_into_independent_groups_by_variable(
        obsdb: &'a ObsSpace,
        variable: &Variable,
    ) -> Result<Self, ObsQcError> {
        let categories = obsdb.category_keys(variable.group(), variable.name())?;

        let declared_record_variable = variable.group() == METADATA_GROUP
            && matches!(obsdb.obs_group_vars(), [only] if only == variable.name());

        // Declarations are identical on every rank, so either all ranks reach the collective
        // below or none does.
        let records_grouped_by_category_variable = declared_record_variable
            && obsdb.distribution().all(categories_match_records(
                &categories,
                obsdb.record_numbers(),
            ));

        Ok(Self::new(
            obsdb,
            GroupBy::Variable {
                category_variable: variable.clone(),
                records_grouped_by_category_variable,
            },
        ))
    }

    fn new(obsdb: &'a ObsSpace, group_by: GroupBy) -> Self {
        let self_knowledge = match &group_by {
            GroupBy::Nothing => false,
            GroupBy::RecordId => true,
            GroupBy::Variable {
                records_grouped_by_category_variable,
                ..
            } => *records_grouped_by_category_variable,
        };

        let obs_distribution = if self_knowledge {
            Arc::new(Distribution::local())
        } else {
            Arc::clone(obsdb.distribution())
        };

        trace!(?group_by, self_knowledge, "ObsAccessor created");

        ObsAccessor {
            obsdb,
            obs_distribution,
            group_by,
            self_knowledge,
        }
    }

    /// `true` if every independent group is held on the current rank, in which case all ids
    /// handled by this accessor are local.
    pub fn has_self_knowledge(&self) -> bool {
        self.self_knowledge
    }

    pub fn obs_space(&self) -> &'a ObsSpace {
        self.obsdb
    }

    /// Ids of the locations a filter should treat as valid.
    ///
    /// A location is valid if it was selected by the filter's `where` clause (`apply`) and its
    /// QC flags for the filter variables are `pass`: for at least one of them when
    /// `valid_if_any_filter_variable_passed_qc` is `true`, for all of them otherwise.
    ///
    /// Arguments
    /// -----------------
    /// * `apply`: one element per local location, `true` where the `where` clause selected it.
    /// * `flags`: QC flags of the local locations, one row per simulated variable.
    /// * `filtervars`: the filter variables (expanded per channel to look up flag rows).
    /// * `valid_if_any_filter_variable_passed_qc`: any/all semantics across filter variables.
    ///
    /// Return
    /// ----------
    /// * Increasing local ids with self-knowledge, increasing global ids otherwise.
    ///
    /// Panics
    /// ----------
    /// * if `apply` or `flags` do not have one element per local location, or a filter variable
    ///   has no row in `flags`.
    pub fn get_valid_observation_ids(
        &self,
        apply: &[bool],
        flags: &ObsDataVector<i32>,
        filtervars: &Variables,
        valid_if_any_filter_variable_passed_qc: bool,
    ) -> Vec<ObsId> {
        self.assert_local_length(apply.len(), "apply");
        self.assert_local_length(flags.nlocs(), "flags");

        let filtered_flags: Vec<&[i32]> = (0..filtervars.nvars())
            .map(|ivar| {
                let name = filtervars.variable(ivar).name().to_string();
                flags.row(&name).unwrap_or_else(|| {
                    panic!("filter variable {name} has no QC flags in the observation space")
                })
            })
            .collect();

        let valid_local_ids: Vec<ObsId> = apply
            .iter()
            .enumerate()
            .filter(|&(loc, &selected)| {
                selected
                    && Self::is_valid(&filtered_flags, loc, valid_if_any_filter_variable_passed_qc)
            })
            .map(|(loc, _)| loc)
            .collect();

        self.gather_ids(&valid_local_ids)
    }

    /// Ids of the locations selected by the `where` clause, flagged or not.
    ///
    /// Same id convention as [`ObsAccessor::get_valid_observation_ids`].
    ///
    /// Panics
    /// ----------
    /// * if `apply` does not have one element per local location.
    pub fn get_valid_observation_ids_where(&self, apply: &[bool]) -> Vec<ObsId> {
        self.assert_local_length(apply.len(), "apply");

        let selected_local_ids: Vec<ObsId> = apply
            .iter()
            .enumerate()
            .filter(|&(_, &selected)| selected)
            .map(|(loc, _)| loc)
            .collect();

        self.gather_ids(&selected_local_ids)
    }

    /// Values of `group/name` at successive locations: the local values with self-knowledge,
    /// the concatenation of the values of all ranks otherwise.
    pub fn get_variable_from_obs_space<T: ObsValue>(
        &self,
        group: &str,
        name: &str,
    ) -> Result<Vec<T>, ObsQcError> {
        let local = self.obsdb.get_db::<T>(group, name)?;
        Ok(self.obs_distribution.all_gatherv(&local))
    }

    pub fn get_int_variable_from_obs_space(
        &self,
        group: &str,
        name: &str,
    ) -> Result<Vec<i32>, ObsQcError> {
        self.get_variable_from_obs_space(group, name)
    }

    pub fn get_float_variable_from_obs_space(
        &self,
        group: &str,
        name: &str,
    ) -> Result<Vec<f32>, ObsQcError> {
        self.get_variable_from_obs_space(group, name)
    }

    pub fn get_double_variable_from_obs_space(
        &self,
        group: &str,
        name: &str,
    ) -> Result<Vec<f64>, ObsQcError> {
        self.get_variable_from_obs_space(group, name)
    }

    pub fn get_string_variable_from_obs_space(
        &self,
        group: &str,
        name: &str,
    ) -> Result<Vec<String>, ObsQcError> {
        self.get_variable_from_obs_space(group, name)
    }

    pub fn get_date_time_variable_from_obs_space(
        &self,
        group: &str,
        name: &str,
    ) -> Result<Vec<Epoch>, ObsQcError> {
        self.get_variable_from_obs_space(group, name)
    }

    /// Record number of successive locations (local, or concatenated over all ranks).
    pub fn get_record_ids(&self) -> Vec<RecordNumber> {
        self.obs_distribution
            .all_gatherv(self.obsdb.record_numbers())
    }

    /// Number of locations on the current rank with self-knowledge, on all ranks otherwise.
    pub fn total_num_observations(&self) -> usize {
        self.obs_distribution.sum(self.obsdb.nlocs())
    }

    /// Split `valid_obs_ids` into groups that can be processed independently.
    ///
    /// The returned splitter groups *positions* in `valid_obs_ids`, not the ids themselves:
    /// * no grouping – a single group,
    /// * record grouping – one group per record, built from the record index of the
    ///   observation space,
    /// * variable grouping – one group per distinct value of the category variable.
    ///
    /// `ops_compatibility_mode` is handed to the [`RecursiveSplitter`] and only affects the
    /// order in which groups are enumerated.
    ///
    /// Return
    /// ----------
    /// * [`ObsQcError::VariableNotFound`] if the category variable cannot be read.
    pub fn split_observations_into_independent_groups(
        &self,
        valid_obs_ids: &[ObsId],
        ops_compatibility_mode: bool,
    ) -> Result<RecursiveSplitter, ObsQcError> {
        let mut splitter = RecursiveSplitter::new(valid_obs_ids.len(), ops_compatibility_mode);

        match &self.group_by {
            GroupBy::Nothing => {}
            GroupBy::RecordId => {
                self.group_observations_by_record_number(valid_obs_ids, &mut splitter)
            }
            GroupBy::Variable {
                category_variable, ..
            } => self.group_observations_by_category_variable(
                category_variable,
                valid_obs_ids,
                &mut splitter,
            )?,
        }

        debug!(
            nvalid = valid_obs_ids.len(),
            ngroups = splitter.num_groups(),
            "observations split into independent groups"
        );
        Ok(splitter)
    }

    /// Set `flagged[ivar][loc]` for every local location whose element of `is_rejected` is
    /// `true`. Flags are only ever raised, never cleared.
    ///
    /// Arguments
    /// -----------------
    /// * `is_rejected`: one element per observation, indexed like the ids returned by this
    ///   accessor (length [`ObsAccessor::total_num_observations`]).
    /// * `flagged`: rows of one element per local location, typically one row per filter
    ///   variable.
    ///
    /// Panics
    /// ----------
    /// * if `is_rejected` or a row of `flagged` has the wrong length.
    pub fn flag_rejected_observations(&self, is_rejected: &[bool], flagged: &mut [Vec<bool>]) {
        let nlocs = self.obsdb.nlocs();
        let counts = self.obs_distribution.location_counts(nlocs);
        let total: usize = counts.iter().sum();
        let offset: usize = counts[..self.obs_distribution.rank()].iter().sum();

        assert_eq!(
            is_rejected.len(),
            total,
            "is_rejected must have one element per observation (total_num_observations)"
        );

        let local_rejections = &is_rejected[offset..offset + nlocs];
        for row in flagged.iter_mut() {
            self.assert_local_length(row.len(), "flagged row");
            for (flag, &rejected) in row.iter_mut().zip(local_rejections) {
                *flag |= rejected;
            }
        }
    }

    fn group_observations_by_record_number(
        &self,
        valid_obs_ids: &[ObsId],
        splitter: &mut RecursiveSplitter,
    ) {
        let nlocs = self.obsdb.nlocs();
        let mut position_of: Vec<Option<usize>> = vec![None; nlocs];
        for (pos, &id) in valid_obs_ids.iter().enumerate() {
            assert!(id < nlocs, "observation id {id} is not a local location id");
            position_of[id] = Some(pos);
        }

        let mut record_of_position: Vec<RecordNumber> = vec![0; valid_obs_ids.len()];
        for recnum in self.obsdb.recidx_all_recnums() {
            for &loc in self.obsdb.recidx_vector(recnum) {
                if let Some(pos) = position_of[loc] {
                    record_of_position[pos] = recnum;
                }
            }
        }

        splitter.group_by(&record_of_position);
    }

    fn group_observations_by_category_variable(
        &self,
        category_variable: &Variable,
        valid_obs_ids: &[ObsId],
        splitter: &mut RecursiveSplitter,
    ) -> Result<(), ObsQcError> {
        let local = self
            .obsdb
            .category_keys(category_variable.group(), category_variable.name())?;
        let categories = self.obs_distribution.all_gatherv(&local);

        let valid_categories: Vec<&CategoryKey> = valid_obs_ids
            .iter()
            .map(|&id| {
                categories.get(id).unwrap_or_else(|| {
                    panic!("observation id {id} is out of range ({} observations)", categories.len())
                })
            })
            .collect();

        splitter.group_by(&valid_categories);
        Ok(())
    }

    /// Turn valid local ids into the id convention of this accessor.
    fn gather_ids(&self, local_ids: &[ObsId]) -> Vec<ObsId> {
        if !self.obs_distribution.is_distributed() {
            return local_ids.to_vec();
        }

        let offset = self.obs_distribution.global_offset(self.obsdb.nlocs());
        let global_ids: Vec<ObsId> = local_ids.iter().map(|&id| id + offset).collect();
        self.obs_distribution.all_gatherv(&global_ids)
    }

    /// `true` if the filter variables passed QC at `obs_id` (any or all of them).
    fn is_valid(
        flags: &[&[i32]],
        obs_id: ObsId,
        valid_if_any_filter_variable_passed_qc: bool,
    ) -> bool {
        if valid_if_any_filter_variable_passed_qc {
            flags.iter().any(|row| qc_flags::is_pass(row[obs_id]))
        } else {
            flags.iter().all(|row| qc_flags::is_pass(row[obs_id]))
        }
    }

    fn assert_local_length(&self, len: usize, what: &str) {
        assert_eq!(
            len,
            self.obsdb.nlocs(),
            "{what} must have one element per local location"
        );
    }
}

/// `true` if equal category values and equal record numbers coincide on this rank.
fn categories_match_records(categories: &[CategoryKey], records: &[RecordNumber]) -> bool {
    let mut record_of_category: HashMap<&CategoryKey, RecordNumber, RandomState> =
        HashMap::default();
    let mut category_of_record: HashMap<RecordNumber, &CategoryKey, RandomState> =
        HashMap::default();

    categories.iter().zip(records).all(|(category, &record)| {
        *record_of_category.entry(category).or_insert(record) == record
            && *category_of_record.entry(record).or_insert(category) == category
    })
}
