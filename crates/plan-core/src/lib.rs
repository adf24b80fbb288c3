#![deny(warnings)]

//! Core domain models and invariants for the dealership planner.
//!
//! This crate defines the serializable types shared across the planner with
//! validation helpers to guarantee basic invariants. Monetary values are
//! `rust_decimal::Decimal`; unit counts are `u64`; forecast periods are
//! month-start dates.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Number of future periods in a baseline forecast.
pub const FORECAST_HORIZON: usize = 3;

/// Unique identifier for a tracked vehicle model, e.g. "Outlander", "Mirage".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VehicleModelId(pub String);

/// Financial KPIs every forecast period carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FinancialKpi {
    /// Total sales revenue.
    Revenue,
    /// Cost of sales and operating expense.
    Expense,
    /// Payroll and compensation, including sales commission.
    Payroll,
}

impl FinancialKpi {
    /// All financial KPIs, in table-column order.
    pub const ALL: [FinancialKpi; 3] = [
        FinancialKpi::Revenue,
        FinancialKpi::Expense,
        FinancialKpi::Payroll,
    ];

    /// Series key used by the trained-model bundle for this KPI.
    pub fn series_key(self) -> &'static str {
        match self {
            FinancialKpi::Revenue => "Currency:Revenue/Sales",
            FinancialKpi::Expense => "Currency:Expense",
            FinancialKpi::Payroll => "Currency:Payroll/Compensation",
        }
    }
}

/// Per-model unit economics from fixed business assumptions.
///
/// Commission and profit-per-unit are always derived from these two inputs
/// (plus the commission rate) and never stored alongside them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitEconomics {
    /// Revenue from selling one unit, USD.
    pub unit_revenue: Decimal,
    /// Cost of sales for one unit, USD.
    pub unit_cost: Decimal,
}

/// One forecast row: financial KPIs plus unit-sales counts for one period.
///
/// Profit is not a field; it is derived via [`PeriodSnapshot::profit`] so the
/// `profit = revenue - (expense + payroll)` invariant holds after every
/// mutation by construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeriodSnapshot {
    /// Period key: first day of the forecast month.
    pub period: NaiveDate,
    /// Forecast revenue, USD.
    pub revenue: Decimal,
    /// Forecast expense, USD.
    pub expense: Decimal,
    /// Forecast payroll, USD.
    pub payroll: Decimal,
    /// Forecast unit sales per tracked vehicle model.
    pub units: BTreeMap<VehicleModelId, u64>,
}

impl PeriodSnapshot {
    /// Profit for this period: revenue minus expense and payroll.
    pub fn profit(&self) -> Decimal {
        self.revenue - (self.expense + self.payroll)
    }

    /// Unit-sales count for `model`, or `None` when the model has no
    /// unit-sales column in this snapshot.
    pub fn units_for(&self, model: &VehicleModelId) -> Option<u64> {
        self.units.get(model).copied()
    }
}

/// Baseline forecast over a fixed horizon, ordered by period.
///
/// The table is read-only to downstream components: planning operations copy
/// a snapshot out and mutate the copy, never the baseline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForecastTable {
    periods: Vec<PeriodSnapshot>,
}

impl ForecastTable {
    /// Build a table from snapshots, which must be strictly increasing by
    /// period.
    pub fn new(periods: Vec<PeriodSnapshot>) -> Result<Self, ValidationError> {
        for pair in periods.windows(2) {
            if pair[1].period <= pair[0].period {
                return Err(ValidationError::UnorderedPeriods);
            }
        }
        Ok(Self { periods })
    }

    /// All snapshots, in period order.
    pub fn periods(&self) -> &[PeriodSnapshot] {
        &self.periods
    }

    /// Snapshot for `period`, if it is within the horizon.
    pub fn get(&self, period: NaiveDate) -> Option<&PeriodSnapshot> {
        self.periods.iter().find(|s| s.period == period)
    }

    /// Number of forecast periods.
    pub fn len(&self) -> usize {
        self.periods.len()
    }

    /// Whether the table holds no periods.
    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }
}

/// Recommended additional unit sales per model, valid for a single period.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    units: BTreeMap<VehicleModelId, u64>,
}

impl ActionPlan {
    /// An empty plan: no additional sales required.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `units` additional sales of `model`.
    pub fn add(&mut self, model: VehicleModelId, units: u64) {
        self.units.insert(model, units);
    }

    /// Whether the plan recommends no action.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Number of models the plan touches.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Additional units recommended for `model` (0 when absent).
    pub fn units_for(&self, model: &VehicleModelId) -> u64 {
        self.units.get(model).copied().unwrap_or(0)
    }

    /// Iterate over (model, additional units) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&VehicleModelId, u64)> {
        self.units.iter().map(|(m, &u)| (m, u))
    }
}

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Price or cost must be non-negative.
    #[error("negative monetary value is invalid")]
    NegativeMoney,
    /// Model names must be non-empty.
    #[error("vehicle model name must not be empty")]
    EmptyModelName,
    /// Model names must be unique within a configuration.
    #[error("duplicate vehicle model: {0}")]
    DuplicateModel(String),
    /// Commission rate must lie in [0, 1).
    #[error("commission rate must be within [0, 1)")]
    CommissionRateOutOfRange,
    /// Forecast table periods must be strictly increasing.
    #[error("forecast periods must be strictly increasing")]
    UnorderedPeriods,
}

/// Validate per-model unit economics.
pub fn validate_economics(e: &UnitEconomics) -> Result<(), ValidationError> {
    if e.unit_revenue < Decimal::ZERO || e.unit_cost < Decimal::ZERO {
        return Err(ValidationError::NegativeMoney);
    }
    Ok(())
}

/// Validate a sales-commission rate.
pub fn validate_commission_rate(rate: Decimal) -> Result<(), ValidationError> {
    if rate < Decimal::ZERO || rate >= Decimal::ONE {
        return Err(ValidationError::CommissionRateOutOfRange);
    }
    Ok(())
}

/// Validate a model configuration: non-empty unique names, sane economics.
pub fn validate_model_set(
    models: &[(VehicleModelId, UnitEconomics)],
) -> Result<(), ValidationError> {
    let mut seen: Vec<&str> = Vec::with_capacity(models.len());
    for (id, econ) in models {
        if id.0.trim().is_empty() {
            return Err(ValidationError::EmptyModelName);
        }
        if seen.contains(&id.0.as_str()) {
            return Err(ValidationError::DuplicateModel(id.0.clone()));
        }
        seen.push(id.0.as_str());
        validate_economics(econ)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn snapshot(period: NaiveDate) -> PeriodSnapshot {
        let mut units = BTreeMap::new();
        units.insert(VehicleModelId("Outlander".to_string()), 12);
        units.insert(VehicleModelId("Mirage".to_string()), 30);
        PeriodSnapshot {
            period,
            revenue: Decimal::new(500_000, 0),
            expense: Decimal::new(300_000, 0),
            payroll: Decimal::new(100_000, 0),
            units,
        }
    }

    fn month(m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, 1).unwrap()
    }

    #[test]
    fn profit_is_revenue_minus_expense_and_payroll() {
        let s = snapshot(month(1));
        assert_eq!(s.profit(), Decimal::new(100_000, 0));
    }

    #[test]
    fn serde_roundtrip_snapshot() {
        let s = snapshot(month(1));
        let json = serde_json::to_string(&s).unwrap();
        let back: PeriodSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
        assert_eq!(back.units_for(&VehicleModelId("Mirage".to_string())), Some(30));
    }

    #[test]
    fn table_requires_increasing_periods() {
        let ok = ForecastTable::new(vec![snapshot(month(1)), snapshot(month(2))]);
        assert!(ok.is_ok());
        let bad = ForecastTable::new(vec![snapshot(month(2)), snapshot(month(2))]);
        assert_eq!(bad.unwrap_err(), ValidationError::UnorderedPeriods);
    }

    #[test]
    fn table_lookup_by_period() {
        let table = ForecastTable::new(vec![snapshot(month(1)), snapshot(month(2))]).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.get(month(2)).is_some());
        assert!(table.get(month(3)).is_none());
    }

    #[test]
    fn financial_kpi_series_keys() {
        assert_eq!(FinancialKpi::Revenue.series_key(), "Currency:Revenue/Sales");
        assert_eq!(FinancialKpi::Expense.series_key(), "Currency:Expense");
        assert_eq!(
            FinancialKpi::Payroll.series_key(),
            "Currency:Payroll/Compensation"
        );
        assert_eq!(FinancialKpi::ALL.len(), 3);
    }

    #[test]
    fn model_set_rejects_duplicates_and_blank_names() {
        let econ = UnitEconomics {
            unit_revenue: Decimal::new(30_000, 0),
            unit_cost: Decimal::new(25_000, 0),
        };
        let dup = vec![
            (VehicleModelId("RVR".to_string()), econ.clone()),
            (VehicleModelId("RVR".to_string()), econ.clone()),
        ];
        assert_eq!(
            validate_model_set(&dup).unwrap_err(),
            ValidationError::DuplicateModel("RVR".to_string())
        );
        let blank = vec![(VehicleModelId("  ".to_string()), econ)];
        assert_eq!(
            validate_model_set(&blank).unwrap_err(),
            ValidationError::EmptyModelName
        );
    }

    #[test]
    fn economics_rejects_negative_money() {
        let e = UnitEconomics {
            unit_revenue: Decimal::new(-1, 0),
            unit_cost: Decimal::ZERO,
        };
        assert_eq!(validate_economics(&e).unwrap_err(), ValidationError::NegativeMoney);
    }

    #[test]
    fn commission_rate_bounds() {
        assert!(validate_commission_rate(Decimal::ZERO).is_ok());
        assert!(validate_commission_rate(Decimal::new(5, 2)).is_ok());
        assert!(validate_commission_rate(Decimal::ONE).is_err());
        assert!(validate_commission_rate(Decimal::new(-1, 2)).is_err());
    }

    proptest! {
        #[test]
        fn profit_invariant_holds(rev in 0i64..10_000_000, exp in 0i64..10_000_000,
                                  pay in 0i64..10_000_000) {
            let s = PeriodSnapshot {
                period: month(1),
                revenue: Decimal::new(rev, 0),
                expense: Decimal::new(exp, 0),
                payroll: Decimal::new(pay, 0),
                units: BTreeMap::new(),
            };
            prop_assert_eq!(s.profit(), Decimal::new(rev, 0) - (Decimal::new(exp, 0) + Decimal::new(pay, 0)));
        }
    }
}
