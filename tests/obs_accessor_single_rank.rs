mod common;

use common::{filter_variables, groups_of, local, pass_flags, station_store};
use hifitime::Epoch;
use obsqc::{
    obs_space::{ObsDataVector, ObsSpace},
    qc_flags,
    variables::Variable,
    ObsAccessor,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[test]
fn valid_ids_respect_where_clause_and_flags() {
    let obsdb = station_store(local(), &["A", "B", "C", "D"]);
    let mut flags = pass_flags(&["airTemperature"], 4);
    flags[0][1] = qc_flags::FGUESS;

    let accessor = ObsAccessor::to_all_observations(&obsdb);
    let filtervars = filter_variables(&["ObsValue/airTemperature"]);
    let apply = [true, true, false, true];

    assert_eq!(
        accessor.get_valid_observation_ids(&apply, &flags, &filtervars, false),
        vec![0, 3]
    );
    assert_eq!(
        accessor.get_valid_observation_ids(&apply, &flags, &filtervars, true),
        vec![0, 3]
    );
}

#[test]
fn empty_filter_variable_list() {
    let obsdb = station_store(local(), &["A", "B"]);
    let flags = pass_flags(&["airTemperature"], 2);
    let accessor = ObsAccessor::to_all_observations(&obsdb);
    let none = filter_variables(&[]);

    assert!(accessor
        .get_valid_observation_ids(&[true, true], &flags, &none, true)
        .is_empty());
    assert_eq!(
        accessor.get_valid_observation_ids(&[true, true], &flags, &none, false),
        vec![0, 1]
    );
}

#[test]
fn any_pass_contains_all_pass() {
    let mut rng = StdRng::seed_from_u64(42);
    let names = ["u", "v", "w"];
    let nlocs = 64;

    let obsdb = ObsSpace::builder(local()).nlocs(nlocs).build().unwrap();
    let accessor = ObsAccessor::to_all_observations(&obsdb);
    let filtervars = filter_variables(&["ObsValue/u", "ObsValue/v", "ObsValue/w"]);

    for _ in 0..20 {
        let rows: Vec<Vec<i32>> = names
            .iter()
            .map(|_| {
                (0..nlocs)
                    .map(|_| {
                        if rng.random_bool(0.6) {
                            qc_flags::PASS
                        } else {
                            rng.random_range(1..=19)
                        }
                    })
                    .collect()
            })
            .collect();
        let flags = ObsDataVector::from_rows(&names, rows);
        let apply: Vec<bool> = (0..nlocs).map(|_| rng.random_bool(0.8)).collect();

        let any = accessor.get_valid_observation_ids(&apply, &flags, &filtervars, true);
        let all = accessor.get_valid_observation_ids(&apply, &flags, &filtervars, false);
        let selected = accessor.get_valid_observation_ids_where(&apply);

        assert!(any.windows(2).all(|w| w[0] < w[1]));
        assert!(all.windows(2).all(|w| w[0] < w[1]));
        assert!(all.iter().all(|id| any.contains(id)));
        assert!(any.iter().all(|id| selected.contains(id)));
        assert_eq!(selected.len(), apply.iter().filter(|&&a| a).count());
    }
}

#[test]
fn record_grouping_follows_record_index() {
    let obsdb = ObsSpace::builder(local())
        .nlocs(3)
        .record_numbers(vec![5, 5, 7])
        .build()
        .unwrap();
    let accessor = ObsAccessor::to_observations_split_into_independent_groups_by_record_id(&obsdb);

    let splitter = accessor
        .split_observations_into_independent_groups(&[0, 1, 2], false)
        .unwrap();
    assert_eq!(groups_of(&splitter), vec![vec![0, 1], vec![2]]);

    // Positions refer to the valid-id list, not to locations.
    let splitter = accessor
        .split_observations_into_independent_groups(&[1, 2], false)
        .unwrap();
    assert_eq!(groups_of(&splitter), vec![vec![0], vec![1]]);
    assert_eq!(accessor.get_record_ids(), vec![5, 5, 7]);
}

#[test]
fn record_grouping_is_a_partition() {
    let stations = ["C", "A", "B", "A", "C", "C", "B", "D"];
    let obsdb = station_store(local(), &stations);
    let accessor = ObsAccessor::to_observations_split_into_independent_groups_by_record_id(&obsdb);
    let valid_ids = accessor.get_valid_observation_ids_where(&[true; 8]);

    let splitter = accessor
        .split_observations_into_independent_groups(&valid_ids, true)
        .unwrap();
    let groups = groups_of(&splitter);

    let mut positions: Vec<usize> = groups.iter().flatten().copied().collect();
    positions.sort_unstable();
    assert_eq!(positions, (0..valid_ids.len()).collect::<Vec<_>>());

    let records = obsdb.record_numbers();
    for group in &groups {
        let record = records[valid_ids[group[0]]];
        assert!(group.iter().all(|&pos| records[valid_ids[pos]] == record));
    }
    assert_eq!(groups.len(), 4);
}

#[test]
fn no_grouping_yields_a_single_group() {
    let obsdb = station_store(local(), &["A", "B", "A"]);
    let accessor = ObsAccessor::to_all_observations(&obsdb);
    assert!(!accessor.has_self_knowledge());

    let splitter = accessor
        .split_observations_into_independent_groups(&[0, 2], false)
        .unwrap();
    assert_eq!(groups_of(&splitter), vec![vec![0, 1]]);

    let splitter = accessor
        .split_observations_into_independent_groups(&[], false)
        .unwrap();
    assert_eq!(splitter.num_groups(), 0);
}

#[test]
fn variable_grouping_matches_equal_values() {
    let mut rng = StdRng::seed_from_u64(7);
    let nlocs = 40;
    let satellites: Vec<i32> = (0..nlocs).map(|_| rng.random_range(0..5)).collect();
    let obsdb = ObsSpace::builder(local())
        .variable("MetaData", "satelliteIdentifier", satellites.clone())
        .build()
        .unwrap();

    let variable = Variable::new("MetaData/satelliteIdentifier").unwrap();
    let accessor =
        ObsAccessor::to_observations_split_into_independent_groups_by_variable(&obsdb, &variable)
            .unwrap();
    let valid_ids: Vec<usize> = (0..nlocs).filter(|i| i % 3 != 0).collect();

    for ops_compatibility_mode in [false, true] {
        let splitter = accessor
            .split_observations_into_independent_groups(&valid_ids, ops_compatibility_mode)
            .unwrap();
        let groups = groups_of(&splitter);

        let mut group_of = vec![usize::MAX; valid_ids.len()];
        for (igroup, group) in groups.iter().enumerate() {
            group.iter().for_each(|&pos| group_of[pos] = igroup);
        }
        for a in 0..valid_ids.len() {
            for b in 0..valid_ids.len() {
                let same_value = satellites[valid_ids[a]] == satellites[valid_ids[b]];
                assert_eq!(group_of[a] == group_of[b], same_value);
            }
        }
    }
}

#[test]
fn variable_reads_are_local_on_one_rank() {
    let t0 = Epoch::from_gregorian_utc_at_midnight(2021, 6, 1);
    let obsdb = ObsSpace::builder(local())
        .variable("MetaData", "dateTime", vec![t0, t0])
        .variable("MetaData", "stationId", vec!["A", "B"])
        .variable("MetaData", "height", vec![10.0_f64, 20.0])
        .variable("MetaData", "pressure", vec![1000.0_f32, 850.0])
        .variable("MetaData", "sequenceNumber", vec![3, 4])
        .build()
        .unwrap();
    let accessor = ObsAccessor::to_all_observations(&obsdb);

    assert_eq!(
        accessor
            .get_date_time_variable_from_obs_space("MetaData", "dateTime")
            .unwrap(),
        vec![t0, t0]
    );
    assert_eq!(
        accessor
            .get_string_variable_from_obs_space("MetaData", "stationId")
            .unwrap(),
        vec!["A".to_string(), "B".to_string()]
    );
    assert_eq!(
        accessor
            .get_double_variable_from_obs_space("MetaData", "height")
            .unwrap(),
        vec![10.0, 20.0]
    );
    assert_eq!(
        accessor
            .get_float_variable_from_obs_space("MetaData", "pressure")
            .unwrap(),
        vec![1000.0, 850.0]
    );
    assert_eq!(
        accessor
            .get_int_variable_from_obs_space("MetaData", "sequenceNumber")
            .unwrap(),
        vec![3, 4]
    );
    assert!(accessor
        .get_int_variable_from_obs_space("MetaData", "height")
        .is_err());
    assert!(accessor
        .get_int_variable_from_obs_space("MetaData", "unknown")
        .is_err());
}

#[test]
fn flagging_is_idempotent_and_never_clears() {
    let obsdb = station_store(local(), &["A", "A", "B", "B"]);
    let accessor = ObsAccessor::to_observations_split_into_independent_groups_by_record_id(&obsdb);
    let is_rejected = [false, true, false, true];

    let mut flagged = vec![vec![true, false, false, false], vec![false; 4]];
    accessor.flag_rejected_observations(&is_rejected, &mut flagged);
    let once = flagged.clone();
    accessor.flag_rejected_observations(&is_rejected, &mut flagged);

    assert_eq!(flagged, once);
    assert_eq!(flagged[0], vec![true, true, false, true]);
    assert_eq!(flagged[1], vec![false, true, false, true]);
    assert_eq!(accessor.total_num_observations(), 4);
}
