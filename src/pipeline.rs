use anyhow::Result;
use uuid::Uuid;

use crate::config::Config;
use crate::dataset::{Dataset, DatasetAssembler, DatasetMode, JoinReport};
use crate::error::DatasetError;
use crate::features::{extract_tick_features, FeatureBlock, RollingConfig, RollingWindowBuilder};
use crate::model::{DailySeries, TickPanel};
use crate::target::{SessionAligner, SessionTable, TargetBuilder, TargetConfig};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub target: TargetConfig,
    pub rolling: RollingConfig,
    pub scale: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target: TargetConfig::default(),
            rolling: RollingConfig::default(),
            scale: 1e4,
        }
    }
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            target: config.target.target_config(),
            rolling: config.features.rolling_config()?,
            scale: config.output.scale,
        })
    }
}

/// Every intermediate table of one run, for inspection and tests.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub sessions: SessionTable,
    pub target: DailySeries,
    pub daily_features: FeatureBlock,
    pub intraday_features: FeatureBlock,
    pub join_report: JoinReport,
    pub dataset: Dataset,
}

/// Ticks → sessions → target → daily windows, ticks → tick features →
/// intraday windows, then the join. The target is always built because the
/// daily features are lagged targets; inference mode only leaves it out of
/// the join.
pub fn run(
    panel: &TickPanel,
    cfg: &PipelineConfig,
    mode: DatasetMode,
) -> Result<PipelineOutput, DatasetError> {
    let span = tracing::info_span!("pipeline", run_id = %Uuid::new_v4(), mode = ?mode);
    let _guard = span.enter();
    tracing::info!(
        assets = panel.asset_count(),
        ticks = panel.len(),
        "Starting dataset build"
    );

    let sessions = SessionAligner::new(cfg.rolling.cutoff).align(panel);
    let target = TargetBuilder::new(cfg.target).build(panel, &sessions);

    let windows = RollingWindowBuilder::new(cfg.rolling);
    let tick_features = extract_tick_features(panel);
    let intraday_features = windows.intraday(&tick_features)?;
    let daily_features = windows.daily(&target, &sessions.observed_days())?;

    let assembler = DatasetAssembler::new(cfg.scale);
    let joined_target = match mode {
        DatasetMode::Training => Some(&target),
        DatasetMode::Inference => None,
    };
    let (dataset, join_report) =
        assembler.assemble(joined_target, &daily_features, &intraday_features);

    Ok(PipelineOutput {
        sessions,
        target,
        daily_features,
        intraday_features,
        join_report,
        dataset,
    })
}
