use std::env;
use std::fs;
use std::path::Path;

use configurator_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

use crate::commands::CommandResult;

struct Field<'a> {
    key_path: &'static str,
    env_keys: &'static [&'static str],
    value: &'a str,
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let precision = config.pricing.currency_precision.to_string();
    let rounding = format!("{:?}", config.pricing.rounding);
    let option_delta_priority = config.pricing.option_delta_priority.to_string();
    let catalog_path = config
        .catalog
        .path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<unset>".to_string());
    let log_format = format!("{:?}", config.logging.format);

    let fields = [
        Field {
            key_path: "pricing.currency",
            env_keys: &["CONFIGURATOR_PRICING_CURRENCY"],
            value: &config.pricing.currency,
        },
        Field {
            key_path: "pricing.currency_precision",
            env_keys: &["CONFIGURATOR_PRICING_CURRENCY_PRECISION"],
            value: &precision,
        },
        Field {
            key_path: "pricing.rounding",
            env_keys: &["CONFIGURATOR_PRICING_ROUNDING"],
            value: &rounding,
        },
        Field {
            key_path: "pricing.option_delta_priority",
            env_keys: &["CONFIGURATOR_PRICING_OPTION_DELTA_PRIORITY"],
            value: &option_delta_priority,
        },
        Field {
            key_path: "catalog.path",
            env_keys: &["CONFIGURATOR_CATALOG_PATH"],
            value: &catalog_path,
        },
        Field {
            key_path: "logging.level",
            env_keys: &["CONFIGURATOR_LOGGING_LEVEL", "CONFIGURATOR_LOG_LEVEL"],
            value: &config.logging.level,
        },
        Field {
            key_path: "logging.format",
            env_keys: &["CONFIGURATOR_LOGGING_FORMAT", "CONFIGURATOR_LOG_FORMAT"],
            value: &log_format,
        },
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in &fields {
        let source = field_source(
            field.key_path,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key_path, field.value, source));
    }

    CommandResult::success("config", lines.join("\n"))
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let env_key = env_keys
        .iter()
        .find(|key| env::var(key).is_ok_and(|value| !value.trim().is_empty()));
    if let Some(env_key) = env_key {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

#[cfg(test)]
mod tests {
    use super::contains_path;
    use toml::Value;

    #[test]
    fn contains_path_walks_nested_tables() {
        let doc = "[pricing]\ncurrency = \"EUR\"\n".parse::<Value>().expect("toml");

        assert!(contains_path(&doc, "pricing.currency"));
        assert!(!contains_path(&doc, "pricing.rounding"));
        assert!(!contains_path(&doc, "logging.level"));
    }
}
