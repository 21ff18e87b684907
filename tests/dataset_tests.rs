use std::collections::BTreeMap;

use chrono::NaiveDate;

use tick_dataset::dataset::{DatasetAssembler, DatasetMode, DropReason};
use tick_dataset::features::FeatureBlock;
use tick_dataset::model::{AssetDay, DailySeries};

fn key(asset: &str, d: u32) -> AssetDay {
    AssetDay::new(asset, NaiveDate::from_ymd_opt(2021, 3, d).unwrap())
}

fn block(prefix: &str, rows: &[(AssetDay, Vec<Option<f64>>)]) -> FeatureBlock {
    let width = rows.first().map(|(_, r)| r.len()).unwrap_or(0);
    FeatureBlock {
        columns: (1..=width).rev().map(|i| format!("{}{}", prefix, i)).collect(),
        rows: rows.iter().cloned().collect::<BTreeMap<_, _>>(),
    }
}

#[test]
fn inner_join_reports_each_dropped_key_with_its_reason() {
    let target: DailySeries = [
        (key("A", 2), Some(0.01)),
        (key("A", 3), Some(-0.02)),
        (key("A", 4), None),
    ]
    .into_iter()
    .collect();
    let daily = block(
        "D-",
        &[
            (key("A", 3), vec![None, Some(0.01)]),
            (key("A", 4), vec![Some(0.01), Some(-0.02)]),
            (key("A", 5), vec![Some(-0.02), None]),
        ],
    );
    let intraday = block(
        "T-",
        &[
            (key("A", 1), vec![Some(0.001)]),
            (key("A", 2), vec![Some(0.002)]),
            (key("A", 3), vec![Some(0.003)]),
        ],
    );

    let (dataset, report) = DatasetAssembler::new(1.0).assemble(Some(&target), &daily, &intraday);

    assert_eq!(dataset.mode, DatasetMode::Training);
    assert_eq!(dataset.feature_columns, vec!["D-2", "D-1", "T-1"]);
    assert_eq!(dataset.len(), 1);
    assert_eq!(dataset.rows[0].key, key("A", 3));
    assert_eq!(dataset.rows[0].features, vec![None, Some(0.01), Some(0.003)]);

    assert_eq!(report.dropped.get(&key("A", 1)), Some(&DropReason::NoTarget));
    assert_eq!(report.dropped.get(&key("A", 2)), Some(&DropReason::NoDailyFeatures));
    assert_eq!(report.dropped.get(&key("A", 4)), Some(&DropReason::NoIntradayFeatures));
    assert_eq!(report.dropped.get(&key("A", 5)), Some(&DropReason::NoTarget));
    assert_eq!(report.count(DropReason::NoTarget), 2);
}

#[test]
fn every_cell_is_scaled_to_basis_points() {
    let target: DailySeries = [(key("A", 2), Some(0.0125))].into_iter().collect();
    let daily = block("D-", &[(key("A", 2), vec![None, Some(0.5)])]);
    let intraday = block("T-", &[(key("A", 2), vec![Some(-0.001)])]);

    let (dataset, _) = DatasetAssembler::default().assemble(Some(&target), &daily, &intraday);

    let row = &dataset.rows[0];
    assert!((row.target.unwrap() - 125.0).abs() < 1e-9);
    assert_eq!(row.features[0], None);
    assert!((row.features[1].unwrap() - 5000.0).abs() < 1e-9);
    assert!((row.features[2].unwrap() + 10.0).abs() < 1e-9);
}

#[test]
fn missing_target_value_is_kept_as_missing() {
    let target: DailySeries = [(key("A", 2), None)].into_iter().collect();
    let daily = block("D-", &[(key("A", 2), vec![Some(1.0)])]);
    let intraday = block("T-", &[(key("A", 2), vec![Some(1.0)])]);

    let (dataset, report) = DatasetAssembler::new(1.0).assemble(Some(&target), &daily, &intraday);

    assert_eq!(dataset.len(), 1);
    assert_eq!(dataset.rows[0].target, None);
    assert!(report.dropped.is_empty());
}

#[test]
fn inference_mode_joins_features_only() {
    let daily = block("D-", &[(key("A", 2), vec![Some(1.0)]), (key("B", 2), vec![Some(2.0)])]);
    let intraday = block("T-", &[(key("A", 2), vec![Some(3.0)])]);

    let (dataset, report) = DatasetAssembler::new(1.0).assemble(None, &daily, &intraday);

    assert_eq!(dataset.mode, DatasetMode::Inference);
    assert_eq!(dataset.len(), 1);
    assert_eq!(dataset.rows[0].target, None);
    assert_eq!(report.dropped.get(&key("B", 2)), Some(&DropReason::NoIntradayFeatures));
}

#[test]
fn column_accessors_follow_row_keys() {
    let target: DailySeries = [(key("A", 2), Some(1.0)), (key("B", 2), Some(2.0))]
        .into_iter()
        .collect();
    let daily = block("D-", &[(key("A", 2), vec![Some(0.1)]), (key("B", 2), vec![Some(0.2)])]);
    let intraday = block("T-", &[(key("A", 2), vec![None]), (key("B", 2), vec![Some(0.4)])]);
    let (mut dataset, _) = DatasetAssembler::new(1.0).assemble(Some(&target), &daily, &intraday);

    let t1 = dataset.feature_series("T-1").unwrap();
    assert_eq!(t1[&key("A", 2)], None);
    assert_eq!(t1[&key("B", 2)], Some(0.4));
    assert!(dataset.feature_series("nope").is_none());

    let mut replaced = dataset.target_series();
    replaced.insert(key("A", 2), Some(-1.0));
    replaced.remove(&key("B", 2));
    dataset.set_targets(&replaced);
    assert_eq!(dataset.rows[0].target, Some(-1.0));
    assert_eq!(dataset.rows[1].target, None);
}

#[test]
fn rows_are_grouped_by_day_keeping_row_order() {
    let target: DailySeries = [
        (key("A", 2), Some(1.0)),
        (key("A", 3), Some(2.0)),
        (key("B", 2), Some(3.0)),
        (key("C", 3), Some(4.0)),
    ]
    .into_iter()
    .collect();
    let cells: Vec<(AssetDay, Vec<Option<f64>>)> =
        target.keys().map(|k| (k.clone(), vec![Some(0.0)])).collect();
    let daily = block("D-", &cells);
    let intraday = block("T-", &cells);
    let (dataset, _) = DatasetAssembler::new(1.0).assemble(Some(&target), &daily, &intraday);

    let by_day = dataset.rows_by_day();
    let day = |d| NaiveDate::from_ymd_opt(2021, 3, d).unwrap();
    assert_eq!(by_day.keys().copied().collect::<Vec<_>>(), vec![day(2), day(3)]);
    let assets = |d| -> Vec<String> {
        by_day[&day(d)].iter().map(|r| r.key.asset.clone()).collect()
    };
    assert_eq!(assets(2), vec!["A", "B"]);
    assert_eq!(assets(3), vec!["A", "C"]);
}
