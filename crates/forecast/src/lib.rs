#![deny(warnings)]

//! Baseline forecast construction from a bundle of pre-trained KPI models.
//!
//! Model training happens offline; the bundle stores only the fitted state
//! each forecaster needs at inference time, keyed by KPI series name. This
//! crate loads the bundle and projects the fixed-horizon baseline table the
//! planner starts from.

use chrono::{Months, NaiveDate};
use plan_core::{
    FinancialKpi, ForecastTable, PeriodSnapshot, VehicleModelId, FORECAST_HORIZON,
};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Errors raised while loading the bundle or building the baseline.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// The bundle file does not exist. Fatal: no planning without models.
    #[error("model bundle not found at '{0}'; train and export models first")]
    BundleMissing(String),
    /// The bundle exists but cannot be parsed.
    #[error("invalid model bundle: {0}")]
    BundleFormat(String),
    /// A required KPI series has no trained model in the bundle.
    #[error("required forecast series missing from bundle: {0}")]
    MissingSeries(String),
    /// A financial series produced a non-finite value.
    #[error("non-finite forecast value in series '{0}'")]
    NonFiniteSeries(String),
    /// Other filesystem failures.
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ForecastError {
    fn from(e: std::io::Error) -> Self {
        ForecastError::Io(e.to_string())
    }
}

/// Fitted linear-trend state of one KPI forecaster.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    /// Fitted series level at the end of the training window.
    pub level: f64,
    /// Fitted per-period trend.
    pub trend: f64,
}

impl TrainedModel {
    /// Forecast the next `steps` period values.
    pub fn forecast(&self, steps: usize) -> Vec<f64> {
        (1..=steps)
            .map(|h| self.level + self.trend * h as f64)
            .collect()
    }
}

/// Pre-trained forecasting models keyed by KPI series name, plus the first
/// month of the horizon they forecast into.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    /// First month of the forecast horizon.
    pub start_period: NaiveDate,
    /// Trained model per KPI series key.
    pub models: BTreeMap<String, TrainedModel>,
}

impl ModelBundle {
    /// Load a bundle from a JSON file on disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ForecastError> {
        let path = path.as_ref();
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ForecastError::BundleMissing(path.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let bundle = Self::from_json(&text)?;
        info!(path = %path.display(), models = bundle.models.len(), "loaded model bundle");
        Ok(bundle)
    }

    /// Parse a bundle from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ForecastError> {
        serde_json::from_str(text).map_err(|e| ForecastError::BundleFormat(e.to_string()))
    }

    /// Trained model for `series`, if the bundle has one.
    pub fn model(&self, series: &str) -> Option<&TrainedModel> {
        self.models.get(series)
    }
}

/// Project the baseline forecast table over [`FORECAST_HORIZON`] months.
///
/// The three financial series are required; a missing one fails the whole
/// build rather than yielding a partial table. Tracked models without a
/// trained unit-sales series are left out of the table and thereby out of
/// planning availability for the session.
pub fn baseline_table(
    bundle: &ModelBundle,
    tracked_models: &[VehicleModelId],
) -> Result<ForecastTable, ForecastError> {
    let revenue = financial_series(bundle, FinancialKpi::Revenue)?;
    let expense = financial_series(bundle, FinancialKpi::Expense)?;
    let payroll = financial_series(bundle, FinancialKpi::Payroll)?;

    let mut unit_series: Vec<(VehicleModelId, Vec<u64>)> = Vec::new();
    for model in tracked_models {
        if let Some(trained) = bundle.model(&model.0) {
            let units = trained
                .forecast(FORECAST_HORIZON)
                .into_iter()
                .map(unit_value)
                .collect();
            unit_series.push((model.clone(), units));
        }
    }

    let mut periods = Vec::with_capacity(FORECAST_HORIZON);
    let mut period = bundle.start_period;
    for i in 0..FORECAST_HORIZON {
        let mut units = BTreeMap::new();
        for (model, series) in &unit_series {
            units.insert(model.clone(), series[i]);
        }
        periods.push(PeriodSnapshot {
            period,
            revenue: revenue[i],
            expense: expense[i],
            payroll: payroll[i],
            units,
        });
        period = period
            .checked_add_months(Months::new(1))
            .ok_or_else(|| ForecastError::BundleFormat("horizon overflows the calendar".to_string()))?;
    }

    let table = ForecastTable::new(periods)
        .map_err(|e| ForecastError::BundleFormat(e.to_string()))?;
    info!(
        periods = table.len(),
        tracked = unit_series.len(),
        "built baseline forecast table"
    );
    Ok(table)
}

fn financial_series(
    bundle: &ModelBundle,
    kpi: FinancialKpi,
) -> Result<Vec<Decimal>, ForecastError> {
    let key = kpi.series_key();
    let trained = bundle
        .model(key)
        .ok_or_else(|| ForecastError::MissingSeries(key.to_string()))?;
    trained
        .forecast(FORECAST_HORIZON)
        .into_iter()
        .map(|v| {
            Decimal::from_f64(v)
                .map(|d| d.round_dp(2))
                .ok_or_else(|| ForecastError::NonFiniteSeries(key.to_string()))
        })
        .collect()
}

/// Unit-sales forecasts are cleaned the way the training pipeline cleans
/// them: non-finite values become 0, values round to the nearest integer
/// and never go negative.
fn unit_value(v: f64) -> u64 {
    if !v.is_finite() {
        return 0;
    }
    let rounded = v.round();
    if rounded <= 0.0 {
        0
    } else if rounded >= u64::MAX as f64 {
        u64::MAX
    } else {
        rounded as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trained(level: f64, trend: f64) -> TrainedModel {
        TrainedModel { level, trend }
    }

    fn bundle() -> ModelBundle {
        let mut models = BTreeMap::new();
        models.insert("Currency:Revenue/Sales".to_string(), trained(500_000.0, 10_000.0));
        models.insert("Currency:Expense".to_string(), trained(300_000.0, 5_000.0));
        models.insert(
            "Currency:Payroll/Compensation".to_string(),
            trained(100_000.0, 0.0),
        );
        models.insert("Outlander".to_string(), trained(12.0, 0.4));
        models.insert("Mirage".to_string(), trained(2.0, -1.6));
        ModelBundle {
            start_period: NaiveDate::from_ymd_opt(2024, 11, 1).unwrap(),
            models,
        }
    }

    fn tracked() -> Vec<VehicleModelId> {
        ["Outlander", "RVR", "Mirage"]
            .iter()
            .map(|n| VehicleModelId(n.to_string()))
            .collect()
    }

    #[test]
    fn linear_trend_forecast() {
        let m = trained(100.0, 10.0);
        assert_eq!(m.forecast(3), vec![110.0, 120.0, 130.0]);
    }

    #[test]
    fn bundle_json_roundtrip() {
        let b = bundle();
        let json = serde_json::to_string(&b).unwrap();
        let back = ModelBundle::from_json(&json).unwrap();
        assert_eq!(back, b);
    }

    #[test]
    fn missing_file_is_bundle_missing() {
        let err = ModelBundle::load("definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ForecastError::BundleMissing(_)));
    }

    #[test]
    fn garbage_json_is_bundle_format() {
        let err = ModelBundle::from_json("{not json").unwrap_err();
        assert!(matches!(err, ForecastError::BundleFormat(_)));
    }

    #[test]
    fn baseline_spans_three_consecutive_months() {
        let table = baseline_table(&bundle(), &tracked()).unwrap();
        let months: Vec<NaiveDate> = table.periods().iter().map(|s| s.period).collect();
        assert_eq!(
            months,
            vec![
                NaiveDate::from_ymd_opt(2024, 11, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 12, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            ]
        );
        let first = &table.periods()[0];
        assert_eq!(first.revenue, Decimal::new(510_000, 0));
        assert_eq!(first.profit(), Decimal::new(105_000, 0));
    }

    #[test]
    fn untrained_models_are_left_untracked() {
        let table = baseline_table(&bundle(), &tracked()).unwrap();
        let first = &table.periods()[0];
        assert!(first.units_for(&VehicleModelId("Outlander".to_string())).is_some());
        assert!(first.units_for(&VehicleModelId("RVR".to_string())).is_none());
    }

    #[test]
    fn unit_forecasts_round_and_clamp() {
        let table = baseline_table(&bundle(), &tracked()).unwrap();
        let mirage = VehicleModelId("Mirage".to_string());
        let units: Vec<u64> = table
            .periods()
            .iter()
            .map(|s| s.units_for(&mirage).unwrap())
            .collect();
        // 0.4 rounds to 0, -1.2 and -2.8 clamp to 0.
        assert_eq!(units, vec![0, 0, 0]);

        let outlander = VehicleModelId("Outlander".to_string());
        let units: Vec<u64> = table
            .periods()
            .iter()
            .map(|s| s.units_for(&outlander).unwrap())
            .collect();
        // 12.4, 12.8, 13.2 round to nearest.
        assert_eq!(units, vec![12, 13, 13]);
    }

    #[test]
    fn non_finite_unit_forecasts_become_zero() {
        let mut b = bundle();
        b.models
            .insert("Outlander".to_string(), trained(f64::NAN, 0.0));
        let table = baseline_table(&b, &tracked()).unwrap();
        let outlander = VehicleModelId("Outlander".to_string());
        assert_eq!(table.periods()[0].units_for(&outlander), Some(0));
    }

    #[test]
    fn missing_financial_series_fails_build() {
        let mut b = bundle();
        b.models.remove("Currency:Expense");
        let err = baseline_table(&b, &tracked()).unwrap_err();
        match err {
            ForecastError::MissingSeries(key) => assert_eq!(key, "Currency:Expense"),
            other => panic!("expected MissingSeries, got {other:?}"),
        }
    }

    #[test]
    fn non_finite_financial_series_fails_build() {
        let mut b = bundle();
        b.models.insert(
            "Currency:Payroll/Compensation".to_string(),
            trained(f64::INFINITY, 0.0),
        );
        let err = baseline_table(&b, &tracked()).unwrap_err();
        assert!(matches!(err, ForecastError::NonFiniteSeries(_)));
    }
}
