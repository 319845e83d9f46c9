//! # Filter variables
//!
//! A [`Variable`] names one quantity of the observation space by `group/name`, optionally
//! restricted to a set of channels (satellite radiances, multi-level profiles, …). A channelled
//! variable stands for one *expanded* variable per channel, named `name_<channel>`; QC flag
//! tables are keyed by these expanded names.
//!
//! [`Variables`] is the ordered list of filter variables handed to a filter. Its indexing
//! ([`Variables::nvars`], [`Variables::variable`]) runs over the expanded variables, channel by
//! channel, in declaration order.
//!
//! Channel sets are written as comma separated integers and inclusive ranges:
//!
//! ```rust
//! use obsqc::variables::parse_channels;
//!
//! assert_eq!(parse_channels("1-3, 7").unwrap(), vec![1, 2, 3, 7]);
//! ```

use std::{fmt, str::FromStr, sync::LazyLock};

use regex::Regex;

use crate::obsqc_errors::ObsQcError;

static CHANNEL_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+)\s*(?:-\s*(\d+)\s*)?$").expect("channel item pattern is valid")
});

/// Parse a channel set such as `"1-3, 7"` into a sorted list of unique channels.
///
/// Arguments
/// -----------------
/// * `channel_list`: comma separated integers and inclusive ranges `a-b` (with `a <= b`).
///
/// Return
/// ----------
/// * The sorted, deduplicated channels, or [`ObsQcError::InvalidChannelSpec`] if an item is
///   not an integer or a well ordered range. A blank list yields no channels.
pub fn parse_channels(channel_list: &str) -> Result<Vec<i32>, ObsQcError> {
    let mut channels = Vec::new();
    if channel_list.trim().is_empty() {
        return Ok(channels);
    }

    for item in channel_list.split(',') {
        let captures = CHANNEL_ITEM
            .captures(item)
            .ok_or_else(|| ObsQcError::InvalidChannelSpec(channel_list.to_string()))?;
        let parse = |digits: &str| {
            digits
                .parse::<i32>()
                .map_err(|_| ObsQcError::InvalidChannelSpec(channel_list.to_string()))
        };

        let first = parse(&captures[1])?;
        match captures.get(2) {
            None => channels.push(first),
            Some(last) => {
                let last = parse(last.as_str())?;
                if last < first {
                    return Err(ObsQcError::InvalidChannelSpec(channel_list.to_string()));
                }
                channels.extend(first..=last);
            }
        }
    }

    channels.sort_unstable();
    channels.dedup();
    Ok(channels)
}

/// A quantity of the observation space, `group/name`, with optional channels.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variable {
    group: String,
    name: String,
    channels: Vec<i32>,
}

impl Variable {
    /// Build a variable from its full name `group/name`.
    ///
    /// Return
    /// ----------
    /// * [`ObsQcError::InvalidVariableName`] if the name has no `/` separator or an empty part.
    pub fn new(full_name: &str) -> Result<Self, ObsQcError> {
        let (group, name) = full_name
            .split_once('/')
            .filter(|(group, name)| !group.is_empty() && !name.is_empty())
            .ok_or_else(|| ObsQcError::InvalidVariableName(full_name.to_string()))?;

        Ok(Self::from_parts(group, name))
    }

    /// Build a channelled variable, e.g. `Variable::with_channels("ObsValue/brightnessTemperature", "1-3")`.
    pub fn with_channels(full_name: &str, channels: &str) -> Result<Self, ObsQcError> {
        let mut variable = Self::new(full_name)?;
        variable.channels = parse_channels(channels)?;
        Ok(variable)
    }

    pub fn from_parts(group: &str, name: &str) -> Self {
        Variable {
            group: group.to_string(),
            name: name.to_string(),
            channels: Vec::new(),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channels(&self) -> &[i32] {
        &self.channels
    }

    /// `group/name`, without channel suffix.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.group, self.name)
    }

    /// Number of expanded variables: the channel count, or 1 without channels.
    pub fn size(&self) -> usize {
        self.channels.len().max(1)
    }

    /// Name of the `i`-th expanded variable (`name_<channel>` for channelled variables).
    ///
    /// Panics
    /// ----------
    /// * if `i >= self.size()`.
    pub fn variable(&self, i: usize) -> String {
        assert!(i < self.size(), "variable index {i} out of range for {self}");
        if self.channels.is_empty() {
            self.name.clone()
        } else {
            format!("{}_{}", self.name, self.channels[i])
        }
    }
}

impl FromStr for Variable {
    type Err = ObsQcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Variable::new(s)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.name)?;
        if !self.channels.is_empty() {
            write!(f, " (channels: {:?})", self.channels)?;
        }
        Ok(())
    }
}

/// Ordered list of filter variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Variables {
    vars: Vec<Variable>,
}

impl Variables {
    pub fn new(vars: Vec<Variable>) -> Self {
        Variables { vars }
    }

    pub fn push(&mut self, variable: Variable) {
        self.vars.push(variable);
    }

    /// Number of expanded (single-channel) variables.
    pub fn nvars(&self) -> usize {
        self.vars.iter().map(Variable::size).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// The `i`-th expanded variable, carrying the expanded name and no channels.
    ///
    /// Panics
    /// ----------
    /// * if `i >= self.nvars()`.
    pub fn variable(&self, mut i: usize) -> Variable {
        for var in &self.vars {
            if i < var.size() {
                return Variable::from_parts(var.group(), &var.variable(i));
            }
            i -= var.size();
        }
        panic!("filter variable index out of range ({} expanded variables)", self.nvars());
    }

    /// Expanded names of all variables, in order.
    pub fn names(&self) -> Vec<String> {
        self.vars
            .iter()
            .flat_map(|var| (0..var.size()).map(move |i| var.variable(i)))
            .collect()
    }

    /// Expanded names prefixed with their group, e.g. `ObsValue/brightnessTemperature_4`.
    pub fn full_names(&self) -> Vec<String> {
        (0..self.nvars())
            .map(|i| self.variable(i).full_name())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.vars.iter()
    }
}

impl From<Vec<Variable>> for Variables {
    fn from(vars: Vec<Variable>) -> Self {
        Variables::new(vars)
    }
}
