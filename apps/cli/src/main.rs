#![deny(warnings)]

//! Headless planner CLI: loads the trained-model bundle, prints the baseline
//! forecast, and runs one planning interaction (what-if or target mode).

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use forecast::ModelBundle;
use plan_core::{ForecastTable, PeriodSnapshot, VehicleModelId};
use plan_econ::{
    apply_adjustments, apply_plan, project_summary, solve_target, Adjustments, BusinessRules,
    PlanSummary, TargetOutcome,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Mode {
    WhatIf,
    Target,
}

struct Args {
    bundle: String,
    month: Option<NaiveDate>,
    mode: Mode,
    scenario: Option<String>,
    adjusts: Vec<(String, i64)>,
    target: Option<Decimal>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        bundle: "trained_models.json".to_string(),
        month: None,
        mode: Mode::WhatIf,
        scenario: None,
        adjusts: vec![],
        target: None,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--bundle" => args.bundle = it.next().context("--bundle needs a file path")?,
            "--month" => {
                let raw = it.next().context("--month needs a YYYY-MM value")?;
                let date = NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d")
                    .with_context(|| format!("'{raw}' is not a YYYY-MM month"))?;
                args.month = Some(date);
            }
            "--mode" => {
                let raw = it.next().context("--mode needs 'what-if' or 'target'")?;
                args.mode = match raw.as_str() {
                    "what-if" => Mode::WhatIf,
                    "target" => Mode::Target,
                    other => bail!("unknown mode '{other}', expected 'what-if' or 'target'"),
                };
            }
            "--scenario" => args.scenario = it.next(),
            "--adjust" => {
                let raw = it.next().context("--adjust needs Model=units")?;
                let (name, units) = raw
                    .split_once('=')
                    .with_context(|| format!("'{raw}' is not a Model=units pair"))?;
                let units: i64 = units
                    .trim()
                    .parse()
                    .with_context(|| format!("'{units}' is not an integer unit count"))?;
                args.adjusts.push((name.to_string(), units));
            }
            "--target" => {
                let raw = it.next().context("--target needs a profit amount")?;
                let target: Decimal = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("'{raw}' is not a currency amount"))?;
                args.target = Some(target);
            }
            other => bail!("unknown argument '{other}'"),
        }
    }
    Ok(args)
}

fn load_scenario(path: &str) -> Result<Vec<(String, i64)>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading scenario file '{path}'"))?;
    let map: BTreeMap<String, i64> = serde_yaml::from_str(&text)
        .context("scenario file must map model names to unit counts")?;
    Ok(map.into_iter().collect())
}

fn month_label(period: NaiveDate) -> String {
    period.format("%B %Y").to_string()
}

fn print_rows(rows: &[&PeriodSnapshot]) {
    let models: Vec<&VehicleModelId> = match rows.first() {
        Some(s) => s.units.keys().collect(),
        None => return,
    };
    let mut header = format!(
        "{:<16}{:>14}{:>14}{:>14}",
        "Period", "Revenue", "Expense", "Payroll"
    );
    for m in &models {
        header.push_str(&format!("{:>20}", format!("{} Units", m.0)));
    }
    header.push_str(&format!("{:>14}", "Profit"));
    println!("{header}");
    for s in rows {
        let mut line = format!(
            "{:<16}{:>14}{:>14}{:>14}",
            month_label(s.period),
            s.revenue.round_dp(0),
            s.expense.round_dp(0),
            s.payroll.round_dp(0)
        );
        for m in &models {
            line.push_str(&format!("{:>20}", s.units_for(m).unwrap_or(0)));
        }
        line.push_str(&format!("{:>14}", s.profit().round_dp(0)));
        println!("{line}");
    }
}

fn print_baseline(table: &ForecastTable) {
    println!("Baseline {}-month forecast", table.len());
    let rows: Vec<&PeriodSnapshot> = table.periods().iter().collect();
    print_rows(&rows);
}

fn profit_bar(value: Decimal, max: Decimal) -> String {
    if max <= Decimal::ZERO || value <= Decimal::ZERO {
        return String::new();
    }
    let frac = (value / max).to_f64().unwrap_or(0.0).clamp(0.0, 1.0);
    "#".repeat((frac * 40.0).round() as usize)
}

fn print_comparison(summary: &PlanSummary) {
    println!("Profit comparison for {}", month_label(summary.period));
    let max = summary.baseline_profit.max(summary.adjusted_profit);
    for (label, value) in [
        ("baseline", summary.baseline_profit),
        ("adjusted", summary.adjusted_profit),
    ] {
        println!(
            "  {:<9}{:>14}  {}",
            label,
            value.round_dp(0),
            profit_bar(value, max)
        );
    }
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();
    info!(
        git_sha = env!("GIT_SHA"),
        build_date = env!("BUILD_DATE"),
        "dealer-planner CLI"
    );

    let args = parse_args()?;
    let rules = BusinessRules::standard();
    let bundle = ModelBundle::load(&args.bundle)?;
    let tracked: Vec<VehicleModelId> = rules.model_ids().cloned().collect();
    let table = forecast::baseline_table(&bundle, &tracked)?;

    print_baseline(&table);
    println!();

    let period = args.month.unwrap_or(table.periods()[0].period);
    let baseline = table.get(period).with_context(|| {
        format!(
            "{} is outside the forecast horizon ({} .. {})",
            month_label(period),
            month_label(table.periods()[0].period),
            month_label(table.periods()[table.len() - 1].period)
        )
    })?;
    info!(month = %period, mode = ?args.mode, "planning");

    let adjusted = match args.mode {
        Mode::WhatIf => {
            let mut pairs = Vec::new();
            if let Some(path) = &args.scenario {
                pairs.extend(load_scenario(path)?);
            }
            pairs.extend(args.adjusts.iter().cloned());
            let mut adjustments = Adjustments::new();
            for (name, units) in pairs {
                adjustments.set(VehicleModelId(name), units)?;
            }
            apply_adjustments(&rules, baseline, &adjustments)?
        }
        Mode::Target => {
            let target = args.target.context("target mode needs --target <amount>")?;
            let available: BTreeSet<VehicleModelId> = baseline.units.keys().cloned().collect();
            match solve_target(&rules.ranking(), &available, baseline.profit(), target)? {
                TargetOutcome::AlreadyMet => {
                    println!(
                        "Profit target {} is already met by the baseline; no action needed.",
                        target.round_dp(0)
                    );
                    baseline.clone()
                }
                TargetOutcome::Plan(plan) => {
                    println!("Action plan for {}:", month_label(period));
                    for (model, units) in plan.iter() {
                        println!("  sell {units} more '{}'", model.0);
                    }
                    apply_plan(&rules, baseline, &plan)?
                }
            }
        }
    };

    let summary = project_summary(baseline, &adjusted)?;
    println!();
    println!("Adjusted forecast for {}", month_label(period));
    print_rows(&[&summary.adjusted]);
    println!();
    print_comparison(&summary);

    Ok(())
}
