mod common;

use common::{filter_variables, groups_of, pass_flags, station_store};
use obsqc::{
    distribution::LocalCluster, obs_space::ObsSpace, qc_flags, variables::Variable, ObsAccessor,
};

#[test]
fn valid_ids_are_global_without_self_knowledge() {
    let results = LocalCluster::run(2, |dist| {
        let obsdb = ObsSpace::builder(dist).nlocs(3).build().unwrap();
        let accessor = ObsAccessor::to_all_observations(&obsdb);
        let apply = if obsdb.distribution().rank() == 0 {
            [true, false, true]
        } else {
            [false, true, false]
        };
        (
            accessor.get_valid_observation_ids_where(&apply),
            accessor.total_num_observations(),
        )
    });

    for (valid_ids, total) in results {
        assert_eq!(valid_ids, vec![0, 2, 4]);
        assert_eq!(total, 6);
    }
}

#[test]
fn flags_of_every_rank_are_checked() {
    let results = LocalCluster::run(3, |dist| {
        let rank = dist.rank();
        let obsdb = station_store(dist, &["A", "B"]);
        let mut flags = pass_flags(&["airTemperature"], 2);
        if rank == 1 {
            flags[0][0] = qc_flags::BUDDY;
        }
        let accessor = ObsAccessor::to_all_observations(&obsdb);
        let filtervars = filter_variables(&["ObsValue/airTemperature"]);
        accessor.get_valid_observation_ids(&[true, true], &flags, &filtervars, true)
    });

    for valid_ids in results {
        assert_eq!(valid_ids, vec![0, 1, 3, 4, 5]);
    }
}

#[test]
fn variables_are_gathered_in_rank_order() {
    let results = LocalCluster::run(3, |dist| {
        let rank = dist.rank() as i32;
        let nlocs = dist.rank() + 1;
        let obsdb = ObsSpace::builder(dist)
            .variable(
                "MetaData",
                "sequenceNumber",
                (0..nlocs as i32).map(|i| 10 * rank + i).collect::<Vec<_>>(),
            )
            .build()
            .unwrap();
        let accessor = ObsAccessor::to_all_observations(&obsdb);
        (
            accessor
                .get_int_variable_from_obs_space("MetaData", "sequenceNumber")
                .unwrap(),
            accessor.get_record_ids(),
        )
    });

    for (values, record_ids) in results {
        assert_eq!(values, vec![0, 10, 11, 20, 21, 22]);
        // One record per location: location i of rank r is record i * 3 + r.
        assert_eq!(record_ids, vec![0, 1, 4, 2, 5, 8]);
    }
}

#[test]
fn grouping_by_variable_spans_ranks() {
    let results = LocalCluster::run(2, |dist| {
        let satellites = if dist.rank() == 0 {
            vec![1, 2, 1]
        } else {
            vec![2, 3, 1]
        };
        let obsdb = ObsSpace::builder(dist)
            .variable("MetaData", "satelliteIdentifier", satellites)
            .build()
            .unwrap();
        let variable = Variable::new("MetaData/satelliteIdentifier").unwrap();
        let accessor =
            ObsAccessor::to_observations_split_into_independent_groups_by_variable(&obsdb, &variable)
                .unwrap();

        let valid_ids = accessor.get_valid_observation_ids_where(&[true; 3]);
        let splitter = accessor
            .split_observations_into_independent_groups(&valid_ids, false)
            .unwrap();
        (accessor.has_self_knowledge(), valid_ids, groups_of(&splitter))
    });

    for (self_knowledge, valid_ids, groups) in results {
        assert!(!self_knowledge);
        assert_eq!(valid_ids, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(groups, vec![vec![0, 2, 5], vec![1, 3], vec![4]]);
    }
}

#[test]
fn grouping_by_record_variable_keeps_self_knowledge() {
    let results = LocalCluster::run(2, |dist| {
        let stations: &[&str] = if dist.rank() == 0 {
            &["A", "B", "A"]
        } else {
            &["C", "C"]
        };
        let obsdb = station_store(dist, stations);
        let variable = Variable::new("MetaData/stationId").unwrap();
        let accessor =
            ObsAccessor::to_observations_split_into_independent_groups_by_variable(&obsdb, &variable)
                .unwrap();

        let apply = vec![true; obsdb.nlocs()];
        let valid_ids = accessor.get_valid_observation_ids_where(&apply);
        let splitter = accessor
            .split_observations_into_independent_groups(&valid_ids, false)
            .unwrap();
        (
            accessor.has_self_knowledge(),
            valid_ids,
            groups_of(&splitter),
            accessor.total_num_observations(),
        )
    });

    let (self_knowledge, valid_ids, groups, total) = &results[0];
    assert!(self_knowledge);
    assert_eq!(valid_ids, &vec![0, 1, 2]);
    assert_eq!(groups, &vec![vec![0, 2], vec![1]]);
    assert_eq!(*total, 3);

    let (self_knowledge, valid_ids, groups, total) = &results[1];
    assert!(self_knowledge);
    assert_eq!(valid_ids, &vec![0, 1]);
    assert_eq!(groups, &vec![vec![0, 1]]);
    assert_eq!(*total, 2);
}

#[test]
fn record_grouping_is_local_on_every_rank() {
    let results = LocalCluster::run(2, |dist| {
        let obsdb = station_store(dist, &["A", "B", "B"]);
        let accessor =
            ObsAccessor::to_observations_split_into_independent_groups_by_record_id(&obsdb);
        let valid_ids = accessor.get_valid_observation_ids_where(&[true, true, true]);
        let splitter = accessor
            .split_observations_into_independent_groups(&valid_ids, false)
            .unwrap();
        (valid_ids, groups_of(&splitter), accessor.get_record_ids())
    });

    assert_eq!(results[0].2, vec![0, 2, 2]);
    assert_eq!(results[1].2, vec![1, 3, 3]);
    for (valid_ids, groups, _) in results {
        assert_eq!(valid_ids, vec![0, 1, 2]);
        assert_eq!(groups, vec![vec![0], vec![1, 2]]);
    }
}

#[test]
fn rejections_are_applied_to_the_owning_rank() {
    let results = LocalCluster::run(2, |dist| {
        let obsdb = ObsSpace::builder(dist).nlocs(3).build().unwrap();
        let accessor = ObsAccessor::to_all_observations(&obsdb);
        let is_rejected = [false, true, false, false, false, true];
        let mut flagged = vec![vec![false; 3]];
        accessor.flag_rejected_observations(&is_rejected, &mut flagged);
        flagged.remove(0)
    });

    assert_eq!(results[0], vec![false, true, false]);
    assert_eq!(results[1], vec![false, false, true]);
}
