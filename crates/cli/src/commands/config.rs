use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use fieldpulse_core::config::{AppConfig, LoadOptions};
use toml::Value;

/// One reported setting: dotted key, env var, rendered value.
struct Field {
    key: &'static str,
    env_key: &'static str,
    value: String,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            Some(field.env_key),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let field = |key, env_key, value: String| Field { key, env_key, value };
    vec![
        field("database.url", "FIELDPULSE_DATABASE_URL", config.database.url.clone()),
        field(
            "database.max_connections",
            "FIELDPULSE_DATABASE_MAX_CONNECTIONS",
            config.database.max_connections.to_string(),
        ),
        field(
            "database.timeout_secs",
            "FIELDPULSE_DATABASE_TIMEOUT_SECS",
            config.database.timeout_secs.to_string(),
        ),
        field(
            "server.bind_address",
            "FIELDPULSE_SERVER_BIND_ADDRESS",
            config.server.bind_address.clone(),
        ),
        field("server.port", "FIELDPULSE_SERVER_PORT", config.server.port.to_string()),
        field(
            "server.graceful_shutdown_secs",
            "FIELDPULSE_SERVER_GRACEFUL_SHUTDOWN_SECS",
            config.server.graceful_shutdown_secs.to_string(),
        ),
        field(
            "cors.allowed_origins",
            "FIELDPULSE_CORS_ALLOWED_ORIGINS",
            render_list(&config.cors.allowed_origins),
        ),
        field(
            "hierarchy.gate_by_role",
            "FIELDPULSE_HIERARCHY_GATE_BY_ROLE",
            config.hierarchy.gate_by_role.to_string(),
        ),
        field(
            "hierarchy.leaf_roles",
            "FIELDPULSE_HIERARCHY_LEAF_ROLES",
            render_list(&config.hierarchy.leaf_roles),
        ),
        field(
            "hierarchy.kpi_metrics",
            "FIELDPULSE_HIERARCHY_KPI_METRICS",
            render_list(&config.hierarchy.kpi_metrics),
        ),
        field(
            "hierarchy.averaging",
            "FIELDPULSE_HIERARCHY_AVERAGING",
            config.hierarchy.averaging.as_str().to_string(),
        ),
        field("logging.level", "FIELDPULSE_LOGGING_LEVEL", config.logging.level.clone()),
        field(
            "logging.format",
            "FIELDPULSE_LOGGING_FORMAT",
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
        ),
    ]
}

fn render_list(values: &[String]) -> String {
    if values.is_empty() {
        "<empty>".to_string()
    } else {
        values.join(",")
    }
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("fieldpulse.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/fieldpulse.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
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
    use toml::Value;

    use super::{contains_path, render_list};

    #[test]
    fn nested_key_paths_are_found_in_the_file_document() {
        let doc: Value = "[hierarchy]\ngate_by_role = true\n".parse().expect("toml");

        assert!(contains_path(&doc, "hierarchy.gate_by_role"));
        assert!(!contains_path(&doc, "hierarchy.averaging"));
        assert!(!contains_path(&doc, "server.port"));
    }

    #[test]
    fn empty_lists_render_as_placeholder() {
        assert_eq!(render_list(&[]), "<empty>");
        assert_eq!(render_list(&["BE".to_string(), "TE".to_string()]), "BE,TE");
    }
}
