pub mod constants;
pub mod distribution;
pub mod filters;
pub mod obs_accessor;
pub mod obs_space;
pub mod obsqc_errors;
pub mod qc_flags;
pub mod recursive_splitter;
pub mod variables;

pub use obs_accessor::ObsAccessor;
pub use obsqc_errors::ObsQcError;
pub use recursive_splitter::RecursiveSplitter;
