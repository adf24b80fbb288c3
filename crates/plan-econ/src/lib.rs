#![deny(warnings)]

//! Planning economics for the dealership planner.
//!
//! This crate provides the decision logic behind the planner:
//! - Business rules: per-model commission and profit-per-unit, and a
//!   profitability ranking over the tracked models
//! - Scenario application: recompute a period snapshot under additional
//!   unit sales
//! - Target solving: greedy single-model allocation closing a profit gap
//! - Summary projection: baseline vs adjusted comparison for display
//!
//! Everything here is pure arithmetic over immutable inputs; the business
//! rules are built once at startup and shared read-only afterwards.

use chrono::NaiveDate;
use plan_core::{
    validate_commission_rate, validate_model_set, ActionPlan, PeriodSnapshot, UnitEconomics,
    ValidationError, VehicleModelId,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::debug;

/// Upper bound on a single what-if adjustment, per model.
pub const MAX_ADDITIONAL_UNITS: u64 = 50;

/// Errors produced by planning operations.
#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    /// What-if unit counts must be integers within 0..=[`MAX_ADDITIONAL_UNITS`].
    #[error("invalid additional-unit count {1} for '{0}': must be within 0..=50")]
    InvalidAdjustment(String, i64),
    /// The model is not part of the business-rule configuration.
    #[error("unknown vehicle model: {0}")]
    UnknownModel(String),
    /// The model has no unit-sales forecast in the selected period.
    #[error("no unit-sales forecast for '{0}' in this period")]
    ModelUnavailable(String),
    /// No available model has positive profit-per-unit.
    #[error("profit target cannot be reached through additional unit sales")]
    TargetUnreachable,
    /// Baseline and adjusted snapshots must cover the same period.
    #[error("baseline and adjusted snapshots cover different periods")]
    PeriodMismatch,
    /// Computed unit count exceeds the representable range.
    #[error("computed unit count is out of range")]
    UnitOverflow,
}

/// Immutable business-rule configuration: commission rate plus per-model
/// unit economics, in insertion order.
///
/// Constructed once at process start; commission and profit-per-unit are
/// always derived on demand, never stored.
#[derive(Clone, Debug, Serialize)]
pub struct BusinessRules {
    commission_rate: Decimal,
    models: Vec<(VehicleModelId, UnitEconomics)>,
}

impl BusinessRules {
    /// Build validated business rules from a commission rate and an ordered
    /// set of per-model economics.
    pub fn new(
        commission_rate: Decimal,
        models: Vec<(VehicleModelId, UnitEconomics)>,
    ) -> Result<Self, ValidationError> {
        validate_commission_rate(commission_rate)?;
        validate_model_set(&models)?;
        Ok(Self {
            commission_rate,
            models,
        })
    }

    /// The reference dealership configuration: four tracked models with a
    /// 5% sales commission.
    pub fn standard() -> Self {
        let models = vec![
            ("Outlander", 30_000, 25_000),
            ("RVR", 24_000, 20_000),
            ("Eclipse Cross", 28_000, 24_000),
            ("Mirage", 18_000, 15_000),
        ];
        Self {
            commission_rate: Decimal::new(5, 2),
            models: models
                .into_iter()
                .map(|(name, revenue, cost)| {
                    (
                        VehicleModelId(name.to_string()),
                        UnitEconomics {
                            unit_revenue: Decimal::new(revenue, 0),
                            unit_cost: Decimal::new(cost, 0),
                        },
                    )
                })
                .collect(),
        }
    }

    /// Sales commission rate applied to unit revenue.
    pub fn commission_rate(&self) -> Decimal {
        self.commission_rate
    }

    /// Tracked models with their economics, in configuration order.
    pub fn models(&self) -> &[(VehicleModelId, UnitEconomics)] {
        &self.models
    }

    /// Tracked model identifiers, in configuration order.
    pub fn model_ids(&self) -> impl Iterator<Item = &VehicleModelId> {
        self.models.iter().map(|(id, _)| id)
    }

    /// Unit economics for `model`, if tracked.
    pub fn economics(&self, model: &VehicleModelId) -> Option<&UnitEconomics> {
        self.models.iter().find(|(id, _)| id == model).map(|(_, e)| e)
    }

    /// Commission paid on one unit of `model`.
    pub fn commission(&self, model: &VehicleModelId) -> Option<Decimal> {
        self.economics(model)
            .map(|e| e.unit_revenue * self.commission_rate)
    }

    /// Net contribution of one additional unit of `model`, after cost of
    /// sales and commission.
    pub fn profit_per_unit(&self, model: &VehicleModelId) -> Option<Decimal> {
        self.economics(model).map(|e| self.profit_per_unit_of(e))
    }

    fn profit_per_unit_of(&self, e: &UnitEconomics) -> Decimal {
        e.unit_revenue - e.unit_cost - e.unit_revenue * self.commission_rate
    }

    /// Models ordered by profit-per-unit, highest first. The sort is stable,
    /// so equally profitable models keep their configuration order.
    pub fn ranking(&self) -> ProfitabilityRanking {
        let mut ranked: Vec<RankedModel> = self
            .models
            .iter()
            .map(|(id, e)| RankedModel {
                model: id.clone(),
                profit_per_unit: self.profit_per_unit_of(e),
            })
            .collect();
        ranked.sort_by(|a, b| b.profit_per_unit.cmp(&a.profit_per_unit));
        ProfitabilityRanking(ranked)
    }
}

/// One entry of the profitability ranking.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RankedModel {
    /// Tracked model.
    pub model: VehicleModelId,
    /// Derived net contribution per additional unit.
    pub profit_per_unit: Decimal,
}

/// Models ordered by descending profit-per-unit.
#[derive(Clone, Debug, Serialize)]
pub struct ProfitabilityRanking(Vec<RankedModel>);

impl ProfitabilityRanking {
    /// Entries in descending profit-per-unit order.
    pub fn iter(&self) -> impl Iterator<Item = &RankedModel> {
        self.0.iter()
    }

    /// Number of ranked models.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the ranking is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What-if unit adjustments, validated at the interaction boundary.
///
/// Counts arrive as signed integers from user input; negative counts and
/// counts above [`MAX_ADDITIONAL_UNITS`] are rejected rather than clamped.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Adjustments {
    units: BTreeMap<VehicleModelId, u64>,
}

impl Adjustments {
    /// An empty adjustment set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the additional-unit count for `model`. Zero clears the entry.
    pub fn set(&mut self, model: VehicleModelId, units: i64) -> Result<(), PlanError> {
        if units < 0 || units as u64 > MAX_ADDITIONAL_UNITS {
            return Err(PlanError::InvalidAdjustment(model.0, units));
        }
        if units == 0 {
            self.units.remove(&model);
        } else {
            self.units.insert(model, units as u64);
        }
        Ok(())
    }

    /// Whether any model has a non-zero adjustment.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Iterate over (model, additional units) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&VehicleModelId, u64)> {
        self.units.iter().map(|(m, &u)| (m, u))
    }
}

/// Shared delta arithmetic for what-if adjustments and action plans.
///
/// Per model: revenue_delta = units * unit_revenue, cost_delta = units *
/// unit_cost, payroll_delta = revenue_delta * commission_rate. Deltas
/// accumulate across models and are applied to the snapshot once.
fn apply_unit_sales<'a, I>(
    rules: &BusinessRules,
    baseline: &PeriodSnapshot,
    entries: I,
) -> Result<PeriodSnapshot, PlanError>
where
    I: IntoIterator<Item = (&'a VehicleModelId, u64)>,
{
    let mut adjusted = baseline.clone();
    let mut revenue_delta = Decimal::ZERO;
    let mut cost_delta = Decimal::ZERO;
    let mut payroll_delta = Decimal::ZERO;
    for (model, units) in entries {
        if units == 0 {
            continue;
        }
        let econ = rules
            .economics(model)
            .ok_or_else(|| PlanError::UnknownModel(model.0.clone()))?;
        let count = adjusted
            .units
            .get_mut(model)
            .ok_or_else(|| PlanError::ModelUnavailable(model.0.clone()))?;
        let units_dec = Decimal::from(units);
        let revenue = units_dec * econ.unit_revenue;
        revenue_delta += revenue;
        cost_delta += units_dec * econ.unit_cost;
        payroll_delta += revenue * rules.commission_rate();
        *count += units;
    }
    adjusted.revenue += revenue_delta;
    adjusted.expense += cost_delta;
    adjusted.payroll += payroll_delta;
    Ok(adjusted)
}

/// Apply what-if adjustments to a baseline period snapshot.
///
/// The baseline is never mutated; the returned snapshot carries the updated
/// revenue, expense, payroll and unit counts, with profit derived from them.
pub fn apply_adjustments(
    rules: &BusinessRules,
    baseline: &PeriodSnapshot,
    adjustments: &Adjustments,
) -> Result<PeriodSnapshot, PlanError> {
    apply_unit_sales(rules, baseline, adjustments.iter())
}

/// Apply a solver action plan to a baseline period snapshot, using the same
/// delta formulas as [`apply_adjustments`].
pub fn apply_plan(
    rules: &BusinessRules,
    baseline: &PeriodSnapshot,
    plan: &ActionPlan,
) -> Result<PeriodSnapshot, PlanError> {
    apply_unit_sales(rules, baseline, plan.iter())
}

/// Outcome of a target-based planning request.
#[derive(Clone, Debug, PartialEq)]
pub enum TargetOutcome {
    /// The target is at or below the baseline profit; nothing to do.
    AlreadyMet,
    /// Additional unit sales that close the profit gap.
    Plan(ActionPlan),
}

/// Compute the action plan that closes the gap to `profit_target`.
///
/// Walks the ranking in descending profit-per-unit order, skipping models
/// not in `available`, and allocates the entire gap to the first model with
/// positive profit-per-unit: `ceil(gap / profit_per_unit)` units, so the
/// target is met or exceeded, never undershot. A gap of zero or less is
/// reported as [`TargetOutcome::AlreadyMet`]; if no available model can
/// contribute positive profit the target is unreachable through unit sales
/// and an explicit error is returned.
pub fn solve_target(
    ranking: &ProfitabilityRanking,
    available: &BTreeSet<VehicleModelId>,
    baseline_profit: Decimal,
    profit_target: Decimal,
) -> Result<TargetOutcome, PlanError> {
    let profit_gap = profit_target - baseline_profit;
    if profit_gap <= Decimal::ZERO {
        return Ok(TargetOutcome::AlreadyMet);
    }
    for ranked in ranking.iter() {
        if !available.contains(&ranked.model) {
            continue;
        }
        if ranked.profit_per_unit <= Decimal::ZERO {
            // Ranking is descending, so no later model qualifies either.
            break;
        }
        let additional_units = (profit_gap / ranked.profit_per_unit)
            .ceil()
            .to_u64()
            .ok_or(PlanError::UnitOverflow)?;
        debug!(
            model = %ranked.model.0,
            units = additional_units,
            %profit_gap,
            "allocated profit gap"
        );
        let mut plan = ActionPlan::new();
        plan.add(ranked.model.clone(), additional_units);
        return Ok(TargetOutcome::Plan(plan));
    }
    Err(PlanError::TargetUnreachable)
}

/// Comparison of a baseline period against its adjusted counterpart.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlanSummary {
    /// Period both snapshots cover.
    pub period: NaiveDate,
    /// Profit of the unmodified forecast.
    pub baseline_profit: Decimal,
    /// Profit after adjustments.
    pub adjusted_profit: Decimal,
    /// The adjusted snapshot, for display.
    pub adjusted: PeriodSnapshot,
}

impl PlanSummary {
    /// Profit gained over the baseline.
    pub fn profit_delta(&self) -> Decimal {
        self.adjusted_profit - self.baseline_profit
    }
}

/// Combine a baseline snapshot and its adjusted copy into a display summary.
/// Pure: neither input is mutated, and repeated calls return identical
/// values.
pub fn project_summary(
    baseline: &PeriodSnapshot,
    adjusted: &PeriodSnapshot,
) -> Result<PlanSummary, PlanError> {
    if baseline.period != adjusted.period {
        return Err(PlanError::PeriodMismatch);
    }
    Ok(PlanSummary {
        period: baseline.period,
        baseline_profit: baseline.profit(),
        adjusted_profit: adjusted.profit(),
        adjusted: adjusted.clone(),
    })
}
