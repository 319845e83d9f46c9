#![allow(dead_code)]

use std::sync::Arc;

use obsqc::{
    distribution::Distribution,
    obs_space::{ObsDataVector, ObsSpace},
    qc_flags,
    variables::{Variable, Variables},
};

pub fn local() -> Arc<Distribution> {
    Arc::new(Distribution::local())
}

/// Single-variable store whose records are formed from `MetaData/stationId`.
pub fn station_store(distribution: Arc<Distribution>, stations: &[&str]) -> ObsSpace {
    let temperatures: Vec<f32> = (0..stations.len()).map(|i| 270.0 + i as f32).collect();
    ObsSpace::builder(distribution)
        .simulated_variables(&["airTemperature"])
        .variable("MetaData", "stationId", stations.to_vec())
        .variable("ObsValue", "airTemperature", temperatures)
        .group_records_by(&["stationId"])
        .build()
        .unwrap()
}

/// QC flags with every row set to `pass`.
pub fn pass_flags(names: &[&str], nlocs: usize) -> ObsDataVector<i32> {
    ObsDataVector::new(names, nlocs, qc_flags::PASS)
}

pub fn filter_variables(full_names: &[&str]) -> Variables {
    Variables::new(
        full_names
            .iter()
            .map(|name| Variable::new(name).unwrap())
            .collect(),
    )
}

pub fn groups_of(splitter: &obsqc::RecursiveSplitter) -> Vec<Vec<usize>> {
    splitter.groups().map(<[usize]>::to_vec).collect()
}
