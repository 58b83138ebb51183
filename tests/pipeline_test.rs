use approx::assert_relative_eq;
use ndarray::Array2;
use relevance_algebra::{
    compute_distance, discretize, load_table, reduce, save_table, DissimilarityMatrix, DistanceMethod, Error,
    Pipeline, RelevanceConfig, Table, ValueSpace,
};
use std::fs;
use tempfile::tempdir;

fn scenario() -> Table {
    Table::from_rows(vec![
        ("A", vec![1.0, 1.0, 1.0, 1.0]),
        ("B", vec![1.0, 2.0, 3.0, 4.0]),
        ("C", vec![4.0, 3.0, 2.0, 1.0]),
    ])
    .unwrap()
}

#[test]
fn test_concrete_scenario() {
    let table = scenario();

    let d = compute_distance(&table, DistanceMethod::Euclidean, 1.0, 7).unwrap();
    assert_relative_eq!(d.between("A", "B").unwrap(), 3.742, epsilon = 1e-3);
    assert_relative_eq!(d.between("A", "C").unwrap(), 3.742, epsilon = 1e-3);
    assert_relative_eq!(d.between("B", "C").unwrap(), 4.472, epsilon = 1e-3);

    for sigma in [0.25, 1.0, 4.0] {
        let z = discretize(&table, sigma, 7, ValueSpace::StandardScore).unwrap();
        assert_eq!(z.values().row(0).to_vec(), vec![0.0; 4]);
        let original = discretize(&table, sigma, 7, ValueSpace::OriginalScale).unwrap();
        assert_eq!(original.values().row(0).to_vec(), vec![1.0; 4]);
    }
}

#[test]
fn test_error_scenarios() {
    let table = scenario();
    assert!(matches!(
        "unknown".parse::<DistanceMethod>(),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        discretize(&table, -1.0, 7, ValueSpace::StandardScore),
        Err(Error::InvalidArgument(_))
    ));
    let empty = Table::with_default_labels(Array2::zeros((0, 0)))
        .and_then(DissimilarityMatrix::from_table);
    assert!(matches!(empty, Err(Error::InvalidInput(_))));
}

#[test]
fn test_matrix_properties_for_both_methods() {
    let table = Table::from_rows(vec![
        ("g1", vec![0.1, 0.4, 0.35, 0.8, 0.9, 0.2]),
        ("g2", vec![10.0, 42.0, 37.0, 81.0, 88.0, 19.0]),
        ("g3", vec![5.0, 5.0, 5.0, 5.0, 5.0, 5.0]),
        ("g4", vec![-3.0, 2.0, f64::NAN, 7.0, -1.0, 0.5]),
        ("g5", vec![1.0, 0.0, 1.0, 0.0, 1.0, 0.0]),
    ])
    .unwrap();

    for method in [DistanceMethod::Euclidean, DistanceMethod::Information] {
        let d = compute_distance(&table, method, 1.0, 13).unwrap();
        let values = d.values();
        for i in 0..d.len() {
            assert_eq!(values[[i, i]], 0.0);
            for j in 0..d.len() {
                assert_eq!(values[[i, j]], values[[j, i]]);
                assert!(values[[i, j]] >= 0.0);
            }
        }

        let coords = reduce(&d, 2, Some(42)).unwrap();
        assert_eq!(coords.values().dim(), (5, 2));
        assert_eq!(coords.labels(), d.labels());
    }
}

#[test]
fn test_file_round_trip_through_pipeline() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input.csv");
    fs::write(
        &input,
        ",c1,c2,c3,c4,c5\nA,1,2,3,4,5\nB,2,4,6,8,10\nC,5,4,3,2,1\nD,1,3,1,3,1\n",
    )
    .unwrap();

    let table = load_table(&input).unwrap();
    let mut config = RelevanceConfig::default();
    config.distance.method = DistanceMethod::Information;
    let output = Pipeline::new(config).run(&table).unwrap();

    // A and B are the same partition up to scale
    assert_relative_eq!(output.distance.between("A", "B").unwrap(), 0.0, epsilon = 1e-12);

    let saved = dir.path().join("distance.csv");
    save_table(output.distance.table(), &saved).unwrap();
    let reloaded = DissimilarityMatrix::from_table(load_table(&saved).unwrap()).unwrap();
    assert_eq!(reloaded.labels(), output.distance.labels());
    for (a, b) in reloaded.values().iter().zip(output.distance.values().iter()) {
        assert_relative_eq!(*a, *b, epsilon = 1e-12);
    }

    let coords = reduce(&reloaded, 2, Some(42)).unwrap();
    assert_eq!(coords.labels(), &["A", "B", "C", "D"]);
}
