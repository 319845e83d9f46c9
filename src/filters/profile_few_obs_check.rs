//! # Profile few-observations check
//!
//! Rejects whole profiles that hold too few valid observations.
//!
//! A profile is a record of the observation space (e.g. the levels of one sounding). For every
//! simulated variable the check counts, in each profile, the (level, channel) pairs that are
//! selected by the `where` clause and still flagged `pass`, summed over all channels of that
//! variable. When the count is below [`ProfileFewObsCheckParameters::threshold`], all of those
//! pairs are rejected with the [`PROFILE`](crate::qc_flags::PROFILE) flag.
//!
//! Channelled filter variables must be laid out variable-major: the `nchans` expanded
//! variables of the first simulated variable come first, then those of the second, and so on.

use std::fmt;

use serde::Deserialize;
use tracing::{debug, trace};

use crate::{
    filters::ObsFilter,
    obs_accessor::ObsAccessor,
    obs_space::{ObsDataVector, ObsSpace},
    obsqc_errors::ObsQcError,
    qc_flags,
    variables::Variables,
};

/// Parameters of [`ProfileFewObsCheck`].
///
/// Can be deserialized from a filter configuration:
///
/// ```rust
/// use obsqc::filters::ProfileFewObsCheckParameters;
///
/// let params: ProfileFewObsCheckParameters =
///     serde_json::from_str(r#"{ "threshold": 5 }"#).unwrap();
/// assert_eq!(params.threshold, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileFewObsCheckParameters {
    /// Minimum number of valid observations a profile must hold to be kept.
    pub threshold: i32,
}

impl ProfileFewObsCheckParameters {
    pub fn builder() -> ProfileFewObsCheckParametersBuilder {
        ProfileFewObsCheckParametersBuilder::new()
    }

    /// Check that the threshold is non-negative.
    pub fn validate(&self) -> Result<(), ObsQcError> {
        if self.threshold < 0 {
            return Err(ObsQcError::InvalidFilterParameter(format!(
                "threshold must be >= 0 (got {})",
                self.threshold
            )));
        }
        Ok(())
    }
}

/// Builder for [`ProfileFewObsCheckParameters`], with validation.
#[derive(Debug, Clone, Default)]
pub struct ProfileFewObsCheckParametersBuilder {
    threshold: Option<i32>,
}

impl ProfileFewObsCheckParametersBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn threshold(mut self, v: i32) -> Self {
        self.threshold = Some(v);
        self
    }

    /// Validate and build the parameters.
    ///
    /// Return
    /// ----------
    /// * [`ObsQcError::InvalidFilterParameter`] if the threshold is missing or negative.
    pub fn build(self) -> Result<ProfileFewObsCheckParameters, ObsQcError> {
        let threshold = self.threshold.ok_or_else(|| {
            ObsQcError::InvalidFilterParameter("threshold must be provided".into())
        })?;
        let params = ProfileFewObsCheckParameters { threshold };
        params.validate()?;
        Ok(params)
    }
}

/// Rejects profiles with fewer than `threshold` valid observations.
#[derive(Debug, Clone)]
pub struct ProfileFewObsCheck {
    parameters: ProfileFewObsCheckParameters,
}

impl ProfileFewObsCheck {
    /// Return
    /// ----------
    /// * [`ObsQcError::InvalidFilterParameter`] if the parameters are invalid.
    pub fn new(parameters: ProfileFewObsCheckParameters) -> Result<Self, ObsQcError> {
        parameters.validate()?;
        trace!(threshold = parameters.threshold, "ProfileFewObsCheck created");
        Ok(ProfileFewObsCheck { parameters })
    }

    pub fn parameters(&self) -> &ProfileFewObsCheckParameters {
        &self.parameters
    }
}

impl fmt::Display for ProfileFewObsCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProfileFewObsCheck: threshold = {}", self.parameters.threshold)
    }
}

impl ObsFilter for ProfileFewObsCheck {
    fn name(&self) -> &'static str {
        "ProfileFewObsCheck"
    }

    fn qc_flag(&self) -> i32 {
        qc_flags::PROFILE
    }

    fn apply_filter(
        &self,
        obsdb: &ObsSpace,
        apply: &[bool],
        flags: &ObsDataVector<i32>,
        filtervars: &Variables,
        flagged: &mut [Vec<bool>],
    ) -> Result<(), ObsQcError> {
        let nchans = obsdb.nchans().max(1);
        let n_actual_vars = filtervars.nvars() / nchans;
        // Checked at construction.
        let threshold = self.parameters.threshold.max(0) as usize;

        let accessor =
            ObsAccessor::to_observations_split_into_independent_groups_by_record_id(obsdb);
        let selected_ids = accessor.get_valid_observation_ids_where(apply);
        let profiles = accessor.split_observations_into_independent_groups(&selected_ids, false)?;
        let total = accessor.total_num_observations();

        for ivar in 0..n_actual_vars {
            let first = ivar * nchans;
            let channel_flags: Vec<&[i32]> = (first..first + nchans)
                .map(|ifiltervar| {
                    let name = filtervars.variable(ifiltervar).name().to_string();
                    flags.row(&name).unwrap_or_else(|| {
                        panic!("filter variable {name} has no QC flags in the observation space")
                    })
                })
                .collect();

            let mut is_rejected = vec![vec![false; total]; nchans];
            for profile in profiles.groups() {
                let num_valid: usize = profile
                    .iter()
                    .map(|&pos| {
                        let id = selected_ids[pos];
                        channel_flags
                            .iter()
                            .filter(|row| qc_flags::is_pass(row[id]))
                            .count()
                    })
                    .sum();

                debug!(
                    ivar,
                    record = obsdb.record_numbers()[selected_ids[profile[0]]],
                    num_valid,
                    "valid observations in profile"
                );

                if num_valid < threshold {
                    for (row, rejected) in channel_flags.iter().zip(is_rejected.iter_mut()) {
                        for &pos in profile {
                            let id = selected_ids[pos];
                            if qc_flags::is_pass(row[id]) {
                                rejected[id] = true;
                            }
                        }
                    }
                }
            }

            for (ichan, rejected) in is_rejected.iter().enumerate() {
                let ifiltervar = first + ichan;
                accessor.flag_rejected_observations(
                    rejected,
                    &mut flagged[ifiltervar..=ifiltervar],
                );
            }
        }

        Ok(())
    }
}
