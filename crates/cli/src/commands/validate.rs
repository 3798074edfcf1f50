use std::path::PathBuf;

use configurator_core::{CatalogStats, PricingSettings};
use serde::Serialize;

use crate::commands::catalog::load_for_command;
use crate::commands::CommandResult;

#[derive(Debug, Serialize)]
struct ValidationReport {
    catalog: String,
    stats: CatalogStats,
    settings: PricingSettings,
}

pub fn run(catalog: Option<PathBuf>) -> CommandResult {
    let loaded = match load_for_command("validate", catalog) {
        Ok(loaded) => loaded,
        Err(result) => return result,
    };

    let stats = loaded.catalog.stats();
    let report = ValidationReport {
        catalog: loaded.path.display().to_string(),
        stats,
        settings: loaded.catalog.settings().clone(),
    };

    CommandResult::success_with_details(
        "validate",
        format!(
            "catalog `{}` is valid: {} families, {} variants, {} option groups, {} options, {} pricing rules",
            report.catalog,
            stats.families,
            stats.variants,
            stats.option_groups,
            stats.options,
            stats.pricing_rules
        ),
        &report,
    )
}
