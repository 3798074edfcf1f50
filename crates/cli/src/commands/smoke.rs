use std::sync::Arc;
use std::time::Instant;

use configurator_core::config::{AppConfig, LoadOptions};
use configurator_core::fixtures::demo_catalog_definition;
use configurator_core::{Catalog, ConfigurationSession, PricingSettings};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::commands::CommandResult;

const SCENARIO_VARIANT: &str = "press-200";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SmokeStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: SmokeStatus,
    elapsed_ms: u64,
    message: String,
}

#[derive(Debug, Serialize)]
struct SmokeReport {
    command: &'static str,
    status: SmokeStatus,
    summary: String,
    total_elapsed_ms: u64,
    checks: Vec<SmokeCheck>,
}

pub fn run() -> CommandResult {
    let started = Instant::now();
    let mut checks = Vec::new();

    match timed_check(|| AppConfig::load(LoadOptions::default())) {
        Ok((elapsed_ms, _)) => checks.push(SmokeCheck {
            name: "config_validation",
            status: SmokeStatus::Pass,
            elapsed_ms,
            message: "configuration loaded and validated".to_string(),
        }),
        Err((elapsed_ms, error)) => {
            checks.push(SmokeCheck {
                name: "config_validation",
                status: SmokeStatus::Fail,
                elapsed_ms,
                message: error.to_string(),
            });
            checks.push(skipped("demo_catalog_integrity"));
            checks.push(skipped("guided_selling"));
            checks.push(skipped("pricing_scenario"));
            return finalize_report(checks, started.elapsed().as_millis() as u64);
        }
    }

    // The demo catalog is priced with fixed settings so the reference total is stable.
    let catalog = match timed_check(|| {
        Catalog::load_with_defaults(demo_catalog_definition(), &PricingSettings::default())
    }) {
        Ok((elapsed_ms, catalog)) => {
            let stats = catalog.stats();
            checks.push(SmokeCheck {
                name: "demo_catalog_integrity",
                status: SmokeStatus::Pass,
                elapsed_ms,
                message: format!(
                    "{} variants, {} options, {} pricing rules",
                    stats.variants, stats.options, stats.pricing_rules
                ),
            });
            Arc::new(catalog)
        }
        Err((elapsed_ms, error)) => {
            checks.push(SmokeCheck {
                name: "demo_catalog_integrity",
                status: SmokeStatus::Fail,
                elapsed_ms,
                message: error.to_string(),
            });
            checks.push(skipped("guided_selling"));
            checks.push(skipped("pricing_scenario"));
            return finalize_report(checks, started.elapsed().as_millis() as u64);
        }
    };

    let guided_started = Instant::now();
    let guided = guided_selling_check(catalog.clone());
    checks.push(SmokeCheck {
        name: "guided_selling",
        status: if guided.is_ok() { SmokeStatus::Pass } else { SmokeStatus::Fail },
        elapsed_ms: guided_started.elapsed().as_millis() as u64,
        message: guided.unwrap_or_else(|message| message),
    });

    let pricing_started = Instant::now();
    let pricing = pricing_scenario_check(catalog);
    checks.push(SmokeCheck {
        name: "pricing_scenario",
        status: if pricing.is_ok() { SmokeStatus::Pass } else { SmokeStatus::Fail },
        elapsed_ms: pricing_started.elapsed().as_millis() as u64,
        message: pricing.unwrap_or_else(|message| message),
    });

    finalize_report(checks, started.elapsed().as_millis() as u64)
}

/// A gated group must refuse selections and an excluded pair must be rejected.
fn guided_selling_check(catalog: Arc<Catalog>) -> Result<String, String> {
    let mut session = ConfigurationSession::start(catalog, SCENARIO_VARIANT)
        .map_err(|error| format!("session did not start: {error}"))?;

    let gated = session.select("cooling", "cooling-liquid");
    if !matches!(&gated, Err(error) if error.code() == "group_not_eligible") {
        return Err("selecting into a gated group was not rejected".to_string());
    }

    session.select("frame", "frame-cast").map_err(|error| error.to_string())?;
    let excluded = session.select("motor", "motor-7kw");
    if !matches!(&excluded, Err(error) if error.code() == "constraint_violation") {
        return Err("excluded option pair was not rejected".to_string());
    }

    Ok("gated group and excluded pair rejected".to_string())
}

fn pricing_scenario_check(catalog: Arc<Catalog>) -> Result<String, String> {
    let mut session = ConfigurationSession::start(catalog, SCENARIO_VARIANT)
        .map_err(|error| format!("session did not start: {error}"))?;
    session.select("frame", "frame-welded").map_err(|error| error.to_string())?;
    session.select("motor", "motor-5kw").map_err(|error| error.to_string())?;
    session.set_quantity(2).map_err(|error| error.to_string())?;

    let draft = session.quote_line().map_err(|error| error.to_string())?;
    let expected = Decimal::new(2_530_00, 2);
    if draft.line_total != expected {
        return Err(format!("expected line total {expected}, got {}", draft.line_total));
    }

    Ok(format!(
        "line total {} {} ({})",
        draft.line_total, draft.currency, draft.configuration_fingerprint
    ))
}

fn timed_check<T, E>(check: impl FnOnce() -> Result<T, E>) -> Result<(u64, T), (u64, E)> {
    let started = Instant::now();
    match check() {
        Ok(value) => Ok((started.elapsed().as_millis() as u64, value)),
        Err(error) => Err((started.elapsed().as_millis() as u64, error)),
    }
}

fn skipped(name: &'static str) -> SmokeCheck {
    SmokeCheck {
        name,
        status: SmokeStatus::Skipped,
        elapsed_ms: 0,
        message: "skipped due previous failure".to_string(),
    }
}

fn finalize_report(checks: Vec<SmokeCheck>, total_elapsed_ms: u64) -> CommandResult {
    let passed = checks.iter().filter(|check| check.status == SmokeStatus::Pass).count();
    let total = checks.len();
    let failed = checks.iter().any(|check| check.status != SmokeStatus::Pass);

    let report = SmokeReport {
        command: "smoke",
        status: if failed { SmokeStatus::Fail } else { SmokeStatus::Pass },
        summary: format!("smoke: {passed}/{total} checks passed in {total_elapsed_ms}ms"),
        total_elapsed_ms,
        checks,
    };

    let human = report.summary.clone();
    let machine = serde_json::to_string(&report).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"smoke\",\"status\":\"fail\",\"summary\":\"serialization failed\",\"error\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    });

    CommandResult { exit_code: if failed { 6 } else { 0 }, output: format!("{human}\n{machine}") }
}
