use thiserror::Error;

use crate::obs_space::ObsDtype;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ObsQcError {
    #[error("Variable not found in the observation space: {group}/{name}")]
    VariableNotFound { group: String, name: String },

    #[error("Variable {group}/{name} holds {found:?} values, {expected:?} requested")]
    DtypeMismatch {
        group: String,
        name: String,
        expected: ObsDtype,
        found: ObsDtype,
    },

    #[error("Variable {variable} has {found} values but the observation space has {expected} locations")]
    LengthMismatch {
        variable: String,
        expected: usize,
        found: usize,
    },

    #[error("Variable {0} is defined twice in the observation space")]
    DuplicateVariable(String),

    #[error("Invalid record grouping: {0}")]
    InvalidRecordGrouping(String),

    #[error("Invalid variable name: {0}")]
    InvalidVariableName(String),

    #[error("Invalid channel specification: {0}")]
    InvalidChannelSpec(String),

    #[error("Invalid filter parameter: {0}")]
    InvalidFilterParameter(String),
}
