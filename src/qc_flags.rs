//! # Quality-control flag codes
//!
//! Every (variable, location) pair of an observation space carries an integer QC flag.
//! A location counts as having passed quality control for a variable only while its flag
//! is [`PASS`]; any other value records which check rejected it first. Filters never
//! overwrite a non-pass flag, so the code of the first rejecting check is preserved.

/// Observation has passed all checks so far
pub const PASS: i32 = 0;
/// Observation value is missing
pub const MISSING: i32 = 1;
/// Rejected before entering the QC system
pub const PREQC: i32 = 2;
/// Value out of physical bounds
pub const BOUNDS: i32 = 3;
/// Location outside the valid domain
pub const DOMAIN: i32 = 4;
/// Blacklisted
pub const BLACK: i32 = 5;
/// Observation operator failed
pub const HFAILED: i32 = 6;
/// Removed by thinning
pub const THINNED: i32 = 7;
/// Metadata differs from the reference
pub const DIFFREF: i32 = 8;
/// Cloud liquid water check
pub const CLW: i32 = 9;
/// Background (first-guess) check
pub const FGUESS: i32 = 10;
/// Sea-ice check
pub const SEAICE: i32 = 11;
/// Track check
pub const TRACK: i32 = 12;
/// Buddy check
pub const BUDDY: i32 = 13;
/// Derivative check
pub const DERIVATIVE: i32 = 14;
/// Profile consistency checks
pub const PROFILE: i32 = 15;
/// 1D-Var retrieval failed
pub const ONEDVAR: i32 = 16;
/// Bayesian background check
pub const BAYESIANQC: i32 = 17;
/// Model-observation threshold check
pub const MODELOBTHRESHOLD: i32 = 18;
/// History check
pub const HISTORY: i32 = 19;

/// `true` if the flag marks a location that has passed QC.
#[inline]
pub fn is_pass(flag: i32) -> bool {
    flag == PASS
}

/// Human readable name of a flag code, `None` for codes this crate does not define.
pub fn flag_name(flag: i32) -> Option<&'static str> {
    let name = match flag {
        PASS => "pass",
        MISSING => "missing",
        PREQC => "preQC",
        BOUNDS => "bounds",
        DOMAIN => "domain",
        BLACK => "black",
        HFAILED => "Hfailed",
        THINNED => "thinned",
        DIFFREF => "diffref",
        CLW => "clw",
        FGUESS => "fguess",
        SEAICE => "seaice",
        TRACK => "track",
        BUDDY => "buddy",
        DERIVATIVE => "derivative",
        PROFILE => "profile",
        ONEDVAR => "onedvar",
        BAYESIANQC => "bayesianQC",
        MODELOBTHRESHOLD => "modelobthreshold",
        HISTORY => "history",
        _ => return None,
    };
    Some(name)
}
