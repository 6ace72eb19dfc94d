//! Environment variable fallbacks.
//!
//! Env vars are a **fallback**, not an override: they only fill fields that
//! no config file set.

use std::collections::HashMap;

use tracing::debug;

use crate::merge::{ConfigLayer, FieldSources};

/// Mapping from environment variable name to config field path.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
}

/// All supported `TIDINGS_*` env var mappings.
const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "TIDINGS_DEFAULT_CHANNEL",
        field_path: "bus.default_channel",
    },
    EnvMapping {
        var_name: "TIDINGS_WORKER_THREADS",
        field_path: "bus.worker_threads",
    },
    EnvMapping {
        var_name: "TIDINGS_WORKER_THREAD_NAME",
        field_path: "bus.worker_thread_name",
    },
    EnvMapping {
        var_name: "TIDINGS_LOG_LEVEL",
        field_path: "logging.level",
    },
    EnvMapping {
        var_name: "TIDINGS_LOG_FORMAT",
        field_path: "logging.format",
    },
];

/// Env var naming an alternate user config directory.
pub const HOME_VAR: &str = "TIDINGS_HOME";

/// Apply environment variable fallbacks to fields that were **not** set by
/// any config file layer.
///
/// Returns the number of env vars applied.
pub fn apply_env_fallbacks<S: ::std::hash::BuildHasher>(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env_vars: &HashMap<String, String, S>,
) -> usize {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        let set_by_file = sources
            .get(mapping.field_path)
            .is_some_and(|layer| *layer != ConfigLayer::Defaults);
        if set_by_file {
            continue;
        }

        if let Some(val) = env_vars.get(mapping.var_name) {
            debug!(
                var = mapping.var_name,
                field = mapping.field_path,
                "applying env var fallback"
            );

            set_field(merged, mapping.field_path, coerce_to_toml_value(mapping.field_path, val));
            sources.insert(mapping.field_path.to_owned(), ConfigLayer::Environment);
            count = count.saturating_add(1);
        }
    }

    count
}

/// Set a dotted field in the TOML tree, creating intermediate tables.
fn set_field(root: &mut toml::Value, path: &str, value: toml::Value) {
    let mut segments = path.split('.').peekable();
    let mut current = root;
    while let Some(segment) = segments.next() {
        let Some(table) = current.as_table_mut() else {
            return;
        };
        if segments.peek().is_none() {
            table.insert(segment.to_owned(), value);
            return;
        }
        current = table
            .entry(segment)
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }
}

/// Coerce a string env var value to the TOML type of its field.
///
/// Values that fail to parse stay strings so deserialization reports the
/// bad field.
fn coerce_to_toml_value(path: &str, val: &str) -> toml::Value {
    if path == "bus.worker_threads"
        && let Ok(i) = val.trim().parse::<i64>()
    {
        return toml::Value::Integer(i);
    }

    toml::Value::String(val.to_owned())
}

/// Collect all current environment variables into a map.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_apply_env_fallbacks() {
        let mut merged: toml::Value = toml::from_str("[bus]\nworker_threads = 4").unwrap();
        let mut sources = FieldSources::new();
        let env = make_env(&[("TIDINGS_LOG_LEVEL", "debug")]);

        let count = apply_env_fallbacks(&mut merged, &mut sources, &env);

        assert_eq!(count, 1);
        assert_eq!(merged["logging"]["level"].as_str().unwrap(), "debug");
        assert_eq!(
            sources.get("logging.level"),
            Some(&ConfigLayer::Environment)
        );
    }

    #[test]
    fn test_env_fallback_skips_file_values() {
        let mut merged: toml::Value = toml::from_str("[logging]\nlevel = \"warn\"").unwrap();
        let mut sources = FieldSources::new();
        sources.insert("logging.level".to_owned(), ConfigLayer::User);

        let env = make_env(&[("TIDINGS_LOG_LEVEL", "debug")]);
        let count = apply_env_fallbacks(&mut merged, &mut sources, &env);

        assert_eq!(count, 0);
        assert_eq!(merged["logging"]["level"].as_str().unwrap(), "warn");
    }

    #[test]
    fn test_env_fallback_replaces_defaults() {
        let mut merged: toml::Value = toml::from_str("[bus]\nworker_threads = 4").unwrap();
        let mut sources = FieldSources::new();
        sources.insert("bus.worker_threads".to_owned(), ConfigLayer::Defaults);

        let env = make_env(&[("TIDINGS_WORKER_THREADS", "12")]);
        apply_env_fallbacks(&mut merged, &mut sources, &env);

        assert_eq!(merged["bus"]["worker_threads"].as_integer(), Some(12));
    }

    #[test]
    fn test_coerce_integer() {
        let v = coerce_to_toml_value("bus.worker_threads", " 8 ");
        assert_eq!(v.as_integer().unwrap(), 8);
    }

    #[test]
    fn test_coerce_unparseable_integer_stays_string() {
        let v = coerce_to_toml_value("bus.worker_threads", "many");
        assert_eq!(v.as_str().unwrap(), "many");
    }

    #[test]
    fn test_set_field_creates_tables() {
        let mut root = toml::Value::Table(toml::map::Map::new());
        set_field(&mut root, "bus.default_channel", toml::Value::String("main".to_owned()));
        assert_eq!(root["bus"]["default_channel"].as_str(), Some("main"));
    }
}
