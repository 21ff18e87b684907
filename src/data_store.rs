use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;

use crate::dataset::{Dataset, DatasetMode, TARGET_COLUMN, WEIGHTS_COLUMN};
use crate::error::DatasetError;
use crate::model::{AssetDay, TickRecord};

pub const INTRADAY_DIR: &str = "intraday_data";
pub const DAILY_DIR: &str = "daily_data";
pub const FEATURE_COLS_FILE: &str = "feature_cols.json";

/// Daily file names carry a fixed 4-character prefix before the date.
const DAILY_PREFIX_LEN: usize = 4;

#[derive(Debug, Deserialize)]
struct IntradayCsvRow {
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "Time")]
    time: NaiveTime,
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "CumReturnResid")]
    cum_return: f64,
    #[serde(rename = "CumVolume")]
    cum_volume: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct DailyCsvRow {
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "EST_VOL", default)]
    est_vol: Option<f64>,
    #[serde(rename = "MDV_63", default)]
    mdv_63: Option<f64>,
    #[serde(rename = "Volume", default)]
    volume: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PredictionCsvRow {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "Prediction")]
    prediction: f64,
}

/// One row of a stored training dataset, as needed for scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedRow {
    pub key: AssetDay,
    pub target: Option<f64>,
    pub weight: Option<f64>,
}

pub fn intraday_file_date(stem: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()
}

pub fn daily_file_date(stem: &str) -> Option<NaiveDate> {
    stem.get(DAILY_PREFIX_LEN..)
        .and_then(|rest| NaiveDate::parse_from_str(rest, "%Y-%m-%d").ok())
}

/// CSV files in `dir` whose name-encoded date lies in `[start, end]`,
/// in date order.
pub fn discover_files(
    dir: &Path,
    start: NaiveDate,
    end: NaiveDate,
    date_of: impl Fn(&str) -> Option<NaiveDate>,
) -> Result<Vec<(NaiveDate, PathBuf)>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("failed to list {}", dir.display()))?
            .path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        match date_of(stem) {
            Some(date) if date >= start && date <= end => files.push((date, path)),
            Some(_) => {}
            None => {
                tracing::debug!(file = %path.display(), "Skipping file without a date in its name")
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Reads intraday ticks for `[start, end]` and left-joins the daily metrics
/// on (date, asset). Fails when no intraday file or row is in range.
pub fn read_raw(root: &Path, start: NaiveDate, end: NaiveDate) -> Result<Vec<TickRecord>> {
    let intraday_files = discover_files(&root.join(INTRADAY_DIR), start, end, intraday_file_date)?;
    if intraday_files.is_empty() {
        return Err(DatasetError::NoInputData(format!(
            "no intraday files in {} between {} and {}",
            root.join(INTRADAY_DIR).display(),
            start,
            end
        ))
        .into());
    }

    let daily_dir = root.join(DAILY_DIR);
    let daily_files = if daily_dir.is_dir() {
        discover_files(&daily_dir, start, end, daily_file_date)?
    } else {
        Vec::new()
    };
    if daily_files.is_empty() {
        tracing::warn!(
            dir = %daily_dir.display(),
            "No daily files in range; volatility estimates will be missing"
        );
    }

    let mut daily: HashMap<(NaiveDate, String), DailyCsvRow> = HashMap::new();
    for (_, path) in &daily_files {
        for row in read_csv::<DailyCsvRow>(path)? {
            daily.insert((row.date, row.id.clone()), row);
        }
    }

    let mut ticks = Vec::new();
    for (_, path) in &intraday_files {
        for row in read_csv::<IntradayCsvRow>(path)? {
            let metrics = daily.get(&(row.date, row.id.clone()));
            ticks.push(TickRecord {
                timestamp: NaiveDateTime::new(row.date, row.time),
                cum_return: row.cum_return,
                cum_volume: row.cum_volume,
                est_vol: metrics.and_then(|m| m.est_vol),
                mdv_63: metrics.and_then(|m| m.mdv_63),
                daily_volume: metrics.and_then(|m| m.volume),
                asset: row.id,
            });
        }
    }
    if ticks.is_empty() {
        return Err(DatasetError::NoInputData(format!(
            "intraday files between {} and {} contain no rows",
            start, end
        ))
        .into());
    }

    ticks.sort_by_key(|t| t.timestamp);
    tracing::info!(
        intraday_files = intraday_files.len(),
        daily_files = daily_files.len(),
        ticks = ticks.len(),
        "Raw data loaded"
    );
    Ok(ticks)
}

fn read_csv<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record.with_context(|| format!("failed to parse {}", path.display()))?);
    }
    Ok(rows)
}

fn format_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Writes one `<day>.csv` per day plus the feature column list. Returns
/// the number of day files written.
pub fn store_dataset(out_dir: &Path, dataset: &Dataset) -> Result<usize> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let with_target = dataset.mode == DatasetMode::Training;
    let mut header = vec!["Id".to_string(), "Date".to_string()];
    header.extend(dataset.feature_columns.iter().cloned());
    if with_target {
        header.push(TARGET_COLUMN.to_string());
    }

    let by_day = dataset.rows_by_day();
    for (day, day_rows) in &by_day {
        let path = out_dir.join(format!("{}.csv", day.format("%Y-%m-%d")));
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        writer.write_record(&header)?;
        for row in day_rows {
            let mut record = vec![row.key.asset.clone(), row.key.day.to_string()];
            record.extend(row.features.iter().map(|v| format_cell(*v)));
            if with_target {
                record.push(format_cell(row.target));
            }
            writer.write_record(&record)?;
        }
        writer
            .flush()
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    let cols_path = out_dir.join(FEATURE_COLS_FILE);
    let json = serde_json::to_string_pretty(&dataset.feature_columns)
        .context("failed to serialize feature columns")?;
    std::fs::write(&cols_path, json)
        .with_context(|| format!("failed to write {}", cols_path.display()))?;

    tracing::info!(
        dir = %out_dir.display(),
        files = by_day.len(),
        rows = dataset.len(),
        "Dataset stored"
    );
    Ok(by_day.len())
}

/// Reads targets (and optional sample weights) of stored training files
/// in `[start, end]`.
pub fn read_processed(dir: &Path, start: NaiveDate, end: NaiveDate) -> Result<Vec<ProcessedRow>> {
    let files = discover_files(dir, start, end, intraday_file_date)?;
    if files.is_empty() {
        return Err(DatasetError::NoInputData(format!(
            "no dataset files in {} between {} and {}",
            dir.display(),
            start,
            end
        ))
        .into());
    }

    let mut rows = Vec::new();
    for (_, path) in &files {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let headers = reader.headers()?.clone();
        let col = |name: &str| headers.iter().position(|h| h == name);
        let (Some(id_idx), Some(date_idx), Some(target_idx)) =
            (col("Id"), col("Date"), col(TARGET_COLUMN))
        else {
            bail!(
                "{} lacks one of the Id, Date, {} columns",
                path.display(),
                TARGET_COLUMN
            );
        };
        let weight_idx = col(WEIGHTS_COLUMN);

        for record in reader.records() {
            let record = record.with_context(|| format!("failed to parse {}", path.display()))?;
            let raw_date = &record[date_idx];
            let day = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
                .with_context(|| format!("bad Date '{}' in {}", raw_date, path.display()))?;
            rows.push(ProcessedRow {
                key: AssetDay::new(&record[id_idx], day),
                target: parse_optional(&record[target_idx])?,
                weight: match weight_idx {
                    Some(i) => parse_optional(&record[i])?,
                    None => None,
                },
            });
        }
    }
    Ok(rows)
}

fn parse_optional(field: &str) -> Result<Option<f64>> {
    let field = field.trim();
    if field.is_empty() {
        return Ok(None);
    }
    let value: f64 = field
        .parse()
        .with_context(|| format!("invalid number '{}'", field))?;
    Ok(value.is_finite().then_some(value))
}

/// Predictions keyed by (asset, day); the timestamp is the cutoff time of
/// the predicted day.
pub fn read_predictions(path: &Path) -> Result<BTreeMap<AssetDay, f64>> {
    let mut out = BTreeMap::new();
    for row in read_csv::<PredictionCsvRow>(path)? {
        let ts = NaiveDateTime::parse_from_str(&row.timestamp, "%Y-%m-%d %H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(&row.timestamp, "%Y-%m-%dT%H:%M:%S"))
            .with_context(|| format!("bad Timestamp '{}' in {}", row.timestamp, path.display()))?;
        out.insert(AssetDay::new(&row.id, ts.date()), row.prediction);
    }
    Ok(out)
}
