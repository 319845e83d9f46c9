//! # Quality-control filters
//!
//! A filter inspects the locations selected by its `where` clause and marks the
//! (variable, location) pairs it rejects. [`do_filter`] drives a filter over an observation
//! space and turns its decisions into QC flags:
//!
//! 1. the filter fills a `flagged` table (one row per expanded filter variable, one column per
//!    local location),
//! 2. every flagged pair whose flag is still `pass` receives the filter's QC code
//!    ([`ObsFilter::qc_flag`]); flags set by earlier filters are left untouched.
//!
//! Filters that process observations in independent groups (profiles, stations, …) build an
//! [`ObsAccessor`](crate::obs_accessor::ObsAccessor) inside
//! [`ObsFilter::apply_filter`] and never need to know whether a group spans several ranks.
//!
//! Available filters
//! -----------------
//! * [`ProfileFewObsCheck`] – rejects profiles holding too few valid observations.

mod profile_few_obs_check;

use std::fmt;

use tracing::info;

use crate::{
    obs_space::{ObsDataVector, ObsSpace},
    obsqc_errors::ObsQcError,
    qc_flags,
    variables::Variables,
};

pub use profile_few_obs_check::{
    ProfileFewObsCheck, ProfileFewObsCheckParameters, ProfileFewObsCheckParametersBuilder,
};

/// A quality-control check applied to the locations of an observation space.
pub trait ObsFilter: fmt::Display {
    /// Short name used in log messages.
    fn name(&self) -> &'static str;

    /// QC code given to the observations this filter rejects.
    fn qc_flag(&self) -> i32;

    /// Decide which (filter variable, location) pairs to reject.
    ///
    /// Arguments
    /// -----------------
    /// * `obsdb`: the local partition of the observation space.
    /// * `apply`: one element per local location, `true` where the `where` clause selected it.
    /// * `flags`: current QC flags, one row per simulated variable.
    /// * `filtervars`: the variables the filter acts on.
    /// * `flagged`: `filtervars.nvars()` rows of `obsdb.nlocs()` elements, all `false` on
    ///   entry; set an element to `true` to reject that pair.
    fn apply_filter(
        &self,
        obsdb: &ObsSpace,
        apply: &[bool],
        flags: &ObsDataVector<i32>,
        filtervars: &Variables,
        flagged: &mut [Vec<bool>],
    ) -> Result<(), ObsQcError>;
}

/// Run `filter` on `obsdb` and record its rejections in `flags`.
///
/// Return
/// ----------
/// * The number of (variable, location) pairs newly rejected by this filter.
///
/// Panics
/// ----------
/// * if `apply` does not have one element per local location, or a filter variable has no
///   row in `flags`.
pub fn do_filter<F: ObsFilter + ?Sized>(
    filter: &F,
    obsdb: &ObsSpace,
    apply: &[bool],
    filtervars: &Variables,
    flags: &mut ObsDataVector<i32>,
) -> Result<usize, ObsQcError> {
    let nlocs = obsdb.nlocs();
    assert_eq!(
        apply.len(),
        nlocs,
        "apply must have one element per local location"
    );

    let mut flagged = vec![vec![false; nlocs]; filtervars.nvars()];
    filter.apply_filter(obsdb, apply, flags, filtervars, &mut flagged)?;

    let qc_flag = filter.qc_flag();
    let mut nrejected = 0;
    for (ivar, row) in flagged.iter().enumerate() {
        let name = filtervars.variable(ivar).name().to_string();
        let flag_row = flags.row_mut(&name).unwrap_or_else(|| {
            panic!("filter variable {name} has no QC flags in the observation space")
        });
        for (flag, &rejected) in flag_row.iter_mut().zip(row) {
            if rejected && qc_flags::is_pass(*flag) {
                *flag = qc_flag;
                nrejected += 1;
            }
        }
    }

    info!(
        filter = filter.name(),
        qc_flag = qc_flags::flag_name(qc_flag).unwrap_or("unknown"),
        nrejected,
        "filter applied"
    );
    Ok(nrejected)
}
