use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use configurator_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use configurator_core::{Catalog, CatalogDefinition};

use crate::commands::CommandResult;

/// Reads a catalog definition; `.json` files are parsed as JSON, everything else as TOML.
pub fn read_definition(path: &Path) -> Result<CatalogDefinition> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read catalog file `{}`", path.display()))?;

    let is_json = path.extension().and_then(|extension| extension.to_str()) == Some("json");
    if is_json {
        serde_json::from_str(&raw)
            .with_context(|| format!("could not parse catalog file `{}` as JSON", path.display()))
    } else {
        toml::from_str(&raw)
            .with_context(|| format!("could not parse catalog file `{}` as TOML", path.display()))
    }
}

pub struct LoadedCatalog {
    pub config: AppConfig,
    pub path: PathBuf,
    pub catalog: Catalog,
}

/// Config, then catalog source, then integrity checks. Each stage fails with its own class.
pub fn load_for_command(
    command: &str,
    explicit_path: Option<PathBuf>,
) -> Result<LoadedCatalog, CommandResult> {
    let options = LoadOptions {
        overrides: ConfigOverrides { catalog_path: explicit_path, ..ConfigOverrides::default() },
        ..LoadOptions::default()
    };
    let config = AppConfig::load(options).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })?;

    let Some(path) = config.catalog.path.clone() else {
        return Err(CommandResult::failure(
            command,
            "catalog_missing",
            "no catalog given: pass a catalog file or set catalog.path / CONFIGURATOR_CATALOG_PATH",
            3,
        ));
    };

    let definition = read_definition(&path).map_err(|error| {
        CommandResult::failure(command, "catalog_source", format!("{error:#}"), 3)
    })?;

    let catalog = Catalog::load_with_defaults(definition, &config.pricing).map_err(|error| {
        CommandResult::failure(
            command,
            "catalog_integrity",
            format!("catalog `{}` failed integrity checks: {error}", path.display()),
            4,
        )
    })?;

    Ok(LoadedCatalog { config, path, catalog })
}
