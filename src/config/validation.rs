//! Unknown-key detection for bridge config files.
//!
//! The raw TOML is walked as a `toml::Value` tree before serde sees it, and
//! every dotted key path not in [`known_config_keys`] becomes a warning,
//! with a "did you mean" suggestion when a known key is close. Warnings never
//! reject a file: serde's `#[serde(default)]` already ignores stray keys.

use std::collections::HashSet;

/// Maximum edit distance for a suggestion.
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// A non-fatal config warning.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

/// Every valid dotted key path of `BridgeConfig`.
///
/// Must be kept in step with the structs in `bridge_config.rs`.
pub fn known_config_keys() -> HashSet<&'static str> {
    [
        "server",
        "server.addr",
        "server.static_dir",
        "server.cors_origins",
        "supervisor",
        "supervisor.interval_secs",
        "device",
        "device.probe_command",
        "device.recovery_command",
        "device.startup_command",
        "device.command_timeout_secs",
        "device.startup_timeout_secs",
        "speed",
        "speed.grpcurl_path",
        "speed.target",
        "speed.method",
        "speed.client_id",
        "speed.protoset",
        "speed.cert",
        "speed.key",
        "speed.ca_cert",
        "speed.insecure",
        "speed.timeout_secs",
        "speed.report_failures",
    ]
    .into_iter()
    .collect()
}

/// Collect dotted key paths of every table entry, depth first.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let Some(table) = value.as_table() else {
        return Vec::new();
    };

    let mut keys = Vec::new();
    for (k, v) in table {
        let path = if prefix.is_empty() {
            k.clone()
        } else {
            format!("{prefix}.{k}")
        };
        if v.is_table() {
            let nested = walk_toml_keys(v, &path);
            keys.push(path);
            keys.extend(nested);
        } else {
            keys.push(path);
        }
    }
    keys
}

/// Edit distance between two strings (insert, delete, substitute).
fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitute = diagonal + usize::from(ca != cb);
            diagonal = row[j + 1];
            row[j + 1] = substitute.min(row[j] + 1).min(row[j + 1] + 1);
        }
    }

    row[b.len()]
}

/// Closest known key within [`MAX_SUGGESTION_DISTANCE`] edits.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|k| (*k, edit_distance(unknown, k)))
        .filter(|(_, d)| *d <= MAX_SUGGESTION_DISTANCE)
        .min_by(|(ka, da), (kb, db)| da.cmp(db).then_with(|| ka.cmp(kb)))
        .map(|(k, _)| k.to_string())
}

/// Warnings for keys in `raw_toml` that the bridge does not understand.
///
/// Unparsable TOML yields no warnings; serde reports the syntax error.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let Ok(value) = raw_toml.parse::<toml::Value>() else {
        return Vec::new();
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}
