use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use tick_dataset::model::{AssetDay, DailySeries, TickPanel, TickRecord};
use tick_dataset::target::{
    QuantileBounds, SessionAligner, SessionGap, TargetBuilder, TargetConfig,
};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 3, d).unwrap()
}

fn ts(d: u32, h: u32, m: u32) -> NaiveDateTime {
    day(d).and_hms_opt(h, m, 0).unwrap()
}

fn cutoff() -> NaiveTime {
    NaiveTime::from_hms_opt(15, 30, 0).unwrap()
}

fn raw_only() -> TargetConfig {
    TargetConfig {
        normalize_by_vol: false,
        clip_quantiles: None,
    }
}

/// Ticks for one asset-day built from prices: the day's cumulative return
/// is measured from `base`, the previous day's extended-session close.
fn day_ticks(asset: &str, d: u32, base: f64, regular: f64, extended: f64) -> Vec<TickRecord> {
    vec![
        TickRecord::new(asset, ts(d, 10, 0), (base + regular) / (2.0 * base) - 1.0, 10.0),
        TickRecord::new(asset, ts(d, 15, 30), regular / base - 1.0, 20.0),
        TickRecord::new(asset, ts(d, 16, 0), extended / base - 1.0, 30.0),
    ]
}

fn build(records: Vec<TickRecord>, cfg: TargetConfig) -> DailySeries {
    let panel = TickPanel::from_records(records).unwrap();
    let sessions = SessionAligner::new(cutoff()).align(&panel);
    TargetBuilder::new(cfg).build(&panel, &sessions)
}

#[test]
/// Three days with (regular, extended) closes (100, 101), (102, 103),
/// (104, 104.5): each target is the regular-close to regular-close return.
fn three_day_scenario_matches_close_to_close_returns() {
    let mut records = day_ticks("A", 1, 99.0, 100.0, 101.0);
    records.extend(day_ticks("A", 2, 101.0, 102.0, 103.0));
    records.extend(day_ticks("A", 3, 103.0, 104.0, 104.5));

    let target = build(records, raw_only());

    assert!(!target.contains_key(&AssetDay::new("A", day(1))));
    let t2 = target[&AssetDay::new("A", day(2))].unwrap();
    let t3 = target[&AssetDay::new("A", day(3))].unwrap();
    assert!((t2 - (102.0 / 100.0 - 1.0)).abs() < 1e-12);
    assert!((t3 - ((103.0 / 102.0) * (104.0 / 103.0) - 1.0)).abs() < 1e-12);
    assert_eq!(target.len(), 2);
}

#[test]
fn stacked_product_reproduces_two_period_compounding() {
    let c_reg1 = 0.004;
    let c_ext1 = 0.010;
    let c_reg2 = -0.007;
    let records = vec![
        TickRecord::new("A", ts(1, 15, 30), c_reg1, 1.0),
        TickRecord::new("A", ts(1, 16, 0), c_ext1, 2.0),
        TickRecord::new("A", ts(2, 15, 30), c_reg2, 1.0),
        TickRecord::new("A", ts(2, 16, 0), 0.0, 2.0),
    ];

    let target = build(records, raw_only());

    let r1 = (1.0 + c_ext1) / (1.0 + c_reg1) - 1.0;
    let r2 = c_reg2;
    let expected = (1.0 + r1) * (1.0 + r2) - 1.0;
    let got = target[&AssetDay::new("A", day(2))].unwrap();
    assert!((got - expected).abs() < 1e-15);
}

#[test]
fn first_day_of_each_asset_has_no_target() {
    let mut records = day_ticks("A", 1, 99.0, 100.0, 101.0);
    records.extend(day_ticks("A", 2, 101.0, 102.0, 103.0));
    records.extend(day_ticks("B", 2, 50.0, 51.0, 50.5));
    records.extend(day_ticks("B", 3, 50.5, 52.0, 52.0));

    let target = build(records, raw_only());

    assert!(!target.contains_key(&AssetDay::new("A", day(1))));
    assert!(!target.contains_key(&AssetDay::new("B", day(2))));
    assert!(target.contains_key(&AssetDay::new("A", day(2))));
    assert!(target.contains_key(&AssetDay::new("B", day(3))));
}

#[test]
/// A day with only regular-session ticks is neither a snapshot nor a
/// target, and the next day loses its prior close as well.
fn incomplete_day_is_excluded_from_snapshots_and_target() {
    let mut records = day_ticks("A", 1, 99.0, 100.0, 101.0);
    records.push(TickRecord::new("A", ts(2, 11, 0), 0.001, 5.0));
    records.push(TickRecord::new("A", ts(2, 15, 30), 0.002, 9.0));
    records.extend(day_ticks("A", 3, 101.0, 102.0, 103.0));
    records.extend(day_ticks("A", 4, 103.0, 104.0, 104.0));

    let panel = TickPanel::from_records(records).unwrap();
    let sessions = SessionAligner::new(cutoff()).align(&panel);
    let target = TargetBuilder::new(raw_only()).build(&panel, &sessions);

    let d2 = AssetDay::new("A", day(2));
    assert!(!sessions.complete.contains_key(&d2));
    assert_eq!(sessions.incomplete.get(&d2), Some(&SessionGap::MissingExtended));
    assert!(!target.contains_key(&d2));
    assert!(!target.contains_key(&AssetDay::new("A", day(3))));
    assert!(target.contains_key(&AssetDay::new("A", day(4))));
}

#[test]
fn extended_only_day_is_reported_missing_regular() {
    let records = vec![
        TickRecord::new("A", ts(1, 15, 45), 0.01, 1.0),
        TickRecord::new("A", ts(1, 16, 0), 0.02, 2.0),
    ];
    let panel = TickPanel::from_records(records).unwrap();
    let sessions = SessionAligner::new(cutoff()).align(&panel);
    assert_eq!(
        sessions.incomplete.get(&AssetDay::new("A", day(1))),
        Some(&SessionGap::MissingRegular)
    );
}

#[test]
fn session_snapshot_takes_last_value_on_each_side_of_cutoff() {
    let records = vec![
        TickRecord::new("A", ts(1, 10, 0), 0.01, 1.0),
        TickRecord::new("A", ts(1, 15, 30), 0.02, 2.0),
        TickRecord::new("A", ts(1, 15, 45), 0.03, 3.0),
        TickRecord::new("A", ts(1, 16, 0), 0.04, 4.0),
    ];
    let panel = TickPanel::from_records(records).unwrap();
    let sessions = SessionAligner::new(cutoff()).align(&panel);
    let snap = sessions.complete[&AssetDay::new("A", day(1))];
    assert!((snap.regular - 0.02).abs() < f64::EPSILON);
    assert!((snap.extended - 0.04).abs() < f64::EPSILON);
}

#[test]
fn volatility_normalization_uses_first_estimate_of_the_day() {
    let mut records = day_ticks("A", 1, 99.0, 100.0, 101.0);
    let mut day2 = day_ticks("A", 2, 101.0, 102.0, 103.0);
    day2[0] = day2[0].clone().with_est_vol(0.02);
    day2[1] = day2[1].clone().with_est_vol(0.5);
    records.extend(day2);

    let cfg = TargetConfig {
        normalize_by_vol: true,
        clip_quantiles: None,
    };
    let target = build(records, cfg);

    let got = target[&AssetDay::new("A", day(2))].unwrap();
    assert!((got - (102.0 / 100.0 - 1.0) / 0.02).abs() < 1e-12);
}

#[test]
fn zero_or_missing_volatility_yields_missing_target() {
    let mut records = day_ticks("A", 1, 99.0, 100.0, 101.0);
    records.extend(
        day_ticks("A", 2, 101.0, 102.0, 103.0)
            .into_iter()
            .map(|t| t.with_est_vol(0.0)),
    );
    records.extend(day_ticks("A", 3, 103.0, 104.0, 104.5));

    let cfg = TargetConfig {
        normalize_by_vol: true,
        clip_quantiles: None,
    };
    let target = build(records, cfg);

    assert_eq!(target.get(&AssetDay::new("A", day(2))), Some(&None));
    assert_eq!(target.get(&AssetDay::new("A", day(3))), Some(&None));
}

#[test]
fn clipping_with_fixed_bounds_is_idempotent() {
    let mut series: DailySeries = (0..101)
        .map(|i| {
            let asset = if i % 2 == 0 { "A" } else { "B" };
            let key = AssetDay::new(asset, day(1) + chrono::Days::new(i));
            (key, Some(i as f64))
        })
        .collect();
    series.insert(AssetDay::new("C", day(1)), None);

    let bounds = QuantileBounds::from_series(&series, 0.01, 0.99).unwrap();
    assert!((bounds.lower - 1.0).abs() < 1e-12);
    assert!((bounds.upper - 99.0).abs() < 1e-12);

    bounds.clip(&mut series);
    let once = series.clone();
    bounds.clip(&mut series);

    assert_eq!(once, series);
    let clipped_low = series[&AssetDay::new("A", day(1))].unwrap();
    assert!((clipped_low - bounds.lower).abs() < f64::EPSILON);
    assert_eq!(series[&AssetDay::new("C", day(1))], None);
}

#[test]
fn clipping_pools_quantiles_across_assets() {
    let mut records = Vec::new();
    for (asset, ext) in [("A", 101.0), ("B", 150.0), ("C", 100.5)] {
        records.extend(day_ticks(asset, 1, 99.0, 100.0, ext));
        records.extend(day_ticks(asset, 2, ext, ext, ext));
    }
    let cfg = TargetConfig {
        normalize_by_vol: false,
        clip_quantiles: Some((0.0, 0.5)),
    };
    let target = build(records, cfg);

    // raw targets: A 0.01, B 0.5, C 0.005 -> pooled median 0.01
    let b = target[&AssetDay::new("B", day(2))].unwrap();
    assert!((b - 0.01).abs() < 1e-12);
    let c = target[&AssetDay::new("C", day(2))].unwrap();
    assert!((c - 0.005).abs() < 1e-12);
}

#[test]
fn observed_days_are_grouped_per_asset_in_calendar_order() {
    let mut records = day_ticks("B", 3, 99.0, 100.0, 101.0);
    records.extend(day_ticks("A", 4, 99.0, 100.0, 101.0));
    records.push(TickRecord::new("A", ts(2, 15, 0), 0.001, 1.0));
    records.push(TickRecord::new("B", ts(1, 16, 0), 0.002, 1.0));
    records.extend(day_ticks("A", 1, 99.0, 100.0, 101.0));

    let panel = TickPanel::from_records(records).unwrap();
    let sessions = SessionAligner::new(cutoff()).align(&panel);
    let observed = sessions.observed_days();

    assert_eq!(observed.len(), 2);
    assert_eq!(observed["A"], vec![day(1), day(2), day(4)]);
    assert_eq!(observed["B"], vec![day(1), day(3)]);
}

#[test]
fn many_assets_each_get_their_own_shifted_leg() {
    let mut records = Vec::new();
    for n in 0..40 {
        let asset = format!("S{:02}", n);
        records.extend(day_ticks(&asset, 1, 99.0, 100.0, 101.0));
        records.extend(day_ticks(&asset, 2, 101.0, 102.0, 103.0));
    }
    let target = build(records, raw_only());

    assert_eq!(target.len(), 40);
    for (key, value) in &target {
        assert_eq!(key.day, day(2));
        assert!((value.unwrap() - (102.0 / 100.0 - 1.0)).abs() < 1e-12);
    }
}
