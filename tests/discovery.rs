use fundep::{
    AttributeSet, Config, DependencyCollector, DependencyReport, StrippedPartition, Table,
    TableError, Tane,
};
use std::collections::{BTreeSet, HashMap};

fn table_from(rows: &[&[&'static str]]) -> Table<u8, &'static str> {
    let width = rows.first().map_or(0, |row| row.len());
    let attributes: Vec<u8> = (0..width as u8).collect();
    let mut table = Table::new(&attributes).unwrap();
    for row in rows {
        table.push_row(row).unwrap();
    }
    table
}

fn discover(rows: &[&[&'static str]], epsilon: f64) -> DependencyReport<u8> {
    let config = Config {
        epsilon,
        ..Config::default()
    };
    Tane::with_config(&table_from(rows), config).run()
}

fn as_pairs(report: &DependencyReport<u8>) -> BTreeSet<(Vec<u8>, u8)> {
    report
        .iter()
        .map(|dep| (dep.lhs.iter().collect(), dep.rhs))
        .collect()
}

/// The fraction of rows that would have to be removed for lhs -> rhs to
/// hold, computed the slow way straight off the rows.
fn naive_error(rows: &[&[&'static str]], lhs: &[u8], rhs: u8) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    let mut groups: HashMap<Vec<&str>, HashMap<&str, usize>> = HashMap::new();
    for row in rows {
        let key: Vec<&str> = lhs.iter().map(|&a| row[a as usize]).collect();
        *groups
            .entry(key)
            .or_default()
            .entry(row[rhs as usize])
            .or_insert(0) += 1;
    }
    let mut removed = 0;
    for splits in groups.values() {
        let total: usize = splits.values().sum();
        let largest = splits.values().copied().max().unwrap();
        removed += total - largest;
    }
    removed as f64 / rows.len() as f64
}

/// Mines the minimal dependencies by sheer enumeration of the power set,
/// with non-empty left-hand sides, as the ground truth to compare against.
fn naive_minimal(rows: &[&[&'static str]], epsilon: f64) -> BTreeSet<(Vec<u8>, u8)> {
    let width = rows.first().map_or(0, |row| row.len()) as u8;
    let holds = |lhs: &[u8], rhs: u8| naive_error(rows, lhs, rhs) <= epsilon;
    let mut minimal = BTreeSet::new();
    for rhs in 0..width {
        for mask in 1u32..(1 << width) {
            if mask & (1 << rhs) != 0 {
                continue;
            }
            let lhs: Vec<u8> = (0..width).filter(|a| mask & (1 << a) != 0).collect();
            if !holds(&lhs, rhs) {
                continue;
            }
            let mut is_minimal = true;
            let mut sub = (mask - 1) & mask;
            while sub != 0 {
                let sub_lhs: Vec<u8> = (0..width).filter(|a| sub & (1 << a) != 0).collect();
                if holds(&sub_lhs, rhs) {
                    is_minimal = false;
                    break;
                }
                sub = (sub - 1) & mask;
            }
            if is_minimal {
                minimal.insert((lhs, rhs));
            }
        }
    }
    minimal
}

const SCENARIO_A: &[&[&'static str]] = &[
    &["1", "x", "p"], //
    &["1", "x", "q"],
    &["2", "y", "p"],
];

const SCENARIO_B: &[&[&'static str]] = &[
    &["1", "10"], //
    &["1", "10"],
    &["2", "20"],
];

const COMPOSITE_KEY: &[&[&'static str]] = &[
    &["1", "1", "a"], //
    &["1", "2", "b"],
    &["2", "1", "b"],
    &["2", "2", "a"],
];

/// Nine rows over five attributes, with one planted dependency (column 1
/// determines column 2), one duplicated row, and otherwise mixed structure.
const MIXED: &[&[&'static str]] = &[
    &["a1", "b1", "c1", "d1", "e1"],
    &["a1", "b1", "c1", "d2", "e1"],
    &["a2", "b1", "c1", "d1", "e2"],
    &["a2", "b2", "c2", "d2", "e1"],
    &["a3", "b2", "c2", "d1", "e1"],
    &["a3", "b3", "c2", "d2", "e2"],
    &["a4", "b3", "c2", "d1", "e1"],
    &["a4", "b1", "c1", "d2", "e2"],
    &["a1", "b1", "c1", "d1", "e1"],
];

#[test]
fn scenario_a_exact_dependencies() {
    let report = discover(SCENARIO_A, 0.0);
    let pairs = as_pairs(&report);
    assert!(pairs.contains(&(vec![0], 1)));
    assert!(!pairs.contains(&(vec![1], 2)));
    assert_eq!(pairs, naive_minimal(SCENARIO_A, 0.0));
    assert!(!report.truncated());
    for dep in report.iter() {
        assert!(dep.exact);
        assert_eq!(dep.error, 0.0);
    }
}

#[test]
fn scenario_a_approximate_dependency() {
    let report = discover(SCENARIO_A, 1.0 / 3.0);
    let b_to_c = report
        .iter()
        .find(|dep| dep.lhs.iter().collect::<Vec<_>>() == [1] && dep.rhs == 2)
        .expect("B -> C should hold within a third");
    assert!(!b_to_c.exact);
    assert!((b_to_c.error - 1.0 / 3.0).abs() < 1e-12);
}

#[test]
fn scenario_b_dependency_without_key() {
    let report = discover(SCENARIO_B, 0.0);
    assert_eq!(as_pairs(&report), [(vec![0], 1)].iter().cloned().collect());

    let partition = table_from(SCENARIO_B).partition(0).unwrap();
    assert_eq!(partition.class_count(), 2);
    assert_eq!(partition.row_count(), 3);
    assert!(!partition.is_key());
}

#[test]
fn composite_key_determines_every_other_attribute() {
    let report = discover(COMPOSITE_KEY, 0.0);
    let expected: BTreeSet<_> = [(vec![0, 1], 2), (vec![0, 2], 1), (vec![1, 2], 0)]
        .iter()
        .cloned()
        .collect();
    assert_eq!(as_pairs(&report), expected);
    assert_eq!(as_pairs(&report), naive_minimal(COMPOSITE_KEY, 0.0));
    for dep in report.iter() {
        assert!(dep.exact);
    }
}

#[test]
fn zero_row_table_yields_empty_report() {
    let table: Table<u8, &str> = Table::new(&[0, 1, 2]).unwrap();
    let report = Tane::new(&table).run();
    assert!(report.is_empty());
    assert!(!report.truncated());
}

#[test]
fn single_row_table_makes_every_attribute_a_key() {
    let report = discover(&[&["1", "x", "p"]], 0.0);
    let expected: BTreeSet<_> = [
        (vec![0], 1),
        (vec![0], 2),
        (vec![1], 0),
        (vec![1], 2),
        (vec![2], 0),
        (vec![2], 1),
    ]
    .iter()
    .cloned()
    .collect();
    assert_eq!(as_pairs(&report), expected);
}

#[test]
fn constant_columns_are_not_reported_as_determined() {
    // An empty left-hand side would determine the constant column 0; such
    // dependencies are not mined, and nothing else determines column 1.
    let report = discover(&[&["k", "1"], &["k", "2"]], 0.0);
    assert_eq!(as_pairs(&report), [(vec![1], 0)].iter().cloned().collect());
    for dep in report.iter() {
        assert!(!dep.lhs.is_empty());
    }
}

#[test]
fn exact_discovery_matches_exhaustive_search() {
    let report = discover(MIXED, 0.0);
    assert_eq!(as_pairs(&report), naive_minimal(MIXED, 0.0));
    // The planted dependency survives as a sanity check on the fixture.
    assert!(as_pairs(&report).contains(&(vec![1], 2)));
}

#[test]
fn reported_exact_dependencies_are_sound() {
    let report = discover(MIXED, 0.0);
    assert!(!report.is_empty());
    for dep in report.iter() {
        let lhs: Vec<u8> = dep.lhs.iter().collect();
        for x in MIXED {
            for y in MIXED {
                if lhs.iter().all(|&a| x[a as usize] == y[a as usize]) {
                    assert_eq!(x[dep.rhs as usize], y[dep.rhs as usize]);
                }
            }
        }
    }
}

#[test]
fn approximate_dependencies_respect_the_error_bound() {
    let epsilon = 0.25;
    let report = discover(MIXED, epsilon);
    assert!(!report.is_empty());
    for dep in report.iter() {
        let lhs: Vec<u8> = dep.lhs.iter().collect();
        let expected = naive_error(MIXED, &lhs, dep.rhs);
        assert!((dep.error - expected).abs() < 1e-9);
        assert!(dep.error <= epsilon);
        assert_eq!(dep.exact, dep.error == 0.0);
        // Minimality: dropping any one attribute must push the error past
        // the tolerance. The error measure only shrinks as the left-hand
        // side grows, so checking one-smaller subsets covers all of them.
        for skip in &lhs {
            let smaller: Vec<u8> = lhs.iter().copied().filter(|a| a != skip).collect();
            if !smaller.is_empty() {
                assert!(naive_error(MIXED, &smaller, dep.rhs) > epsilon);
            }
        }
    }
}

#[test]
fn partition_refinement_is_monotone() {
    let table = table_from(MIXED);
    let singles: Vec<StrippedPartition> =
        (0..5u8).map(|a| table.partition(a).unwrap()).collect();

    let mut chain = singles[0].clone();
    let mut previous_count = chain.class_count();
    for next in &singles[1..] {
        chain = chain.product(next);
        assert!(chain.class_count() >= previous_count);
        previous_count = chain.class_count();
    }

    for a in 0..5usize {
        for b in 0..5usize {
            if a != b {
                let product = singles[a].product(&singles[b]);
                assert!(product.class_count() >= singles[a].class_count());
            }
        }
    }
}

#[test]
fn identical_runs_produce_identical_reports() {
    let first: Vec<_> = discover(MIXED, 0.25).iter().cloned().collect();
    let second: Vec<_> = discover(MIXED, 0.25).iter().cloned().collect();
    assert_eq!(first, second);

    for pair in first.windows(2) {
        let a = (pair[0].lhs.len(), pair[0].lhs.clone(), pair[0].rhs);
        let b = (pair[1].lhs.len(), pair[1].lhs.clone(), pair[1].rhs);
        assert!(a <= b);
    }
}

#[test]
fn excluded_attributes_never_appear() {
    let config = Config {
        excluded: AttributeSet::new(&[0u8]),
        ..Config::default()
    };
    let report = Tane::with_config(&table_from(SCENARIO_A), config).run();
    // Without column 0 the only exact structure left is the two-column
    // key, which has no candidate attribute left to determine.
    assert!(report.is_empty());
}

#[test]
fn level_cap_truncates_the_report() {
    let config = Config {
        max_level: Some(1),
        ..Config::default()
    };
    let report = Tane::with_config(&table_from(SCENARIO_A), config).run();
    assert!(report.is_empty());
    assert!(report.truncated());
}

#[test]
fn node_budget_truncates_the_report() {
    let config = Config {
        max_nodes: Some(3),
        ..Config::default()
    };
    let report = Tane::with_config(&table_from(SCENARIO_A), config).run();
    assert!(report.is_empty());
    assert!(report.truncated());
}

#[test]
fn collector_deduplicates_and_prefers_exact() {
    let mut collector = DependencyCollector::new();
    collector.record(AttributeSet::new(&[2u8]), 0, 0.125);
    collector.record(AttributeSet::new(&[2u8]), 0, 0.0);
    collector.record(AttributeSet::new(&[2u8]), 0, 0.25);
    collector.record(AttributeSet::new(&[0u8, 1]), 2, 0.0);
    collector.record(AttributeSet::new(&[1u8]), 0, 0.25);
    let report = collector.into_report();

    let order: Vec<_> = report
        .iter()
        .map(|dep| (dep.lhs.iter().collect::<Vec<_>>(), dep.rhs))
        .collect();
    assert_eq!(order, vec![(vec![1], 0), (vec![2], 0), (vec![0, 1], 2)]);

    let kept = report.iter().find(|dep| dep.rhs == 0 && dep.lhs.contains(2));
    assert!(kept.unwrap().exact);
}

#[test]
fn ragged_rows_fail_fast() {
    let mut table = Table::new(&[0u8, 1]).unwrap();
    table.push_row(&["a", "b"]).unwrap();
    assert_eq!(
        table.push_row(&["a"]),
        Err(TableError::RaggedRow {
            row: 1,
            expected: 2,
            found: 1,
        })
    );
    assert_eq!(table.row_count(), 1);

    assert!(matches!(
        Table::<u8, &str>::new(&[1, 0]),
        Err(TableError::UnorderedAttributes)
    ));
    assert!(matches!(
        Table::<u8, &str>::new(&[0, 0]),
        Err(TableError::UnorderedAttributes)
    ));
}

#[test]
fn empty_partitions_guard_their_arithmetic() {
    let empty = StrippedPartition::from_column::<&str>(&[]);
    assert_eq!(empty.class_count(), 0);
    assert!(empty.is_key());
    assert_eq!(empty.error(&empty), 0.0);

    let distinct = StrippedPartition::from_column(&["a", "b", "c"]);
    assert!(distinct.is_key());
    assert_eq!(distinct.class_count(), 3);
}

#[test]
#[should_panic]
fn negative_epsilon_is_rejected() {
    let table: Table<u8, &str> = Table::new(&[0]).unwrap();
    let config = Config {
        epsilon: -0.5,
        ..Config::default()
    };
    let _ = Tane::with_config(&table, config);
}
