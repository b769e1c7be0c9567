pub mod analyze;
pub mod beam;
pub mod squeeze;

use std::path::Path;

use serde::Serialize;

use atmoslink_core::config::DEFAULT_CHANNELS;

/// Channel names from a comma-separated filter, or every standard channel.
pub fn parse_channels(filter: Option<&str>) -> Vec<String> {
    match filter {
        Some(filter) => filter
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        None => DEFAULT_CHANNELS.iter().map(|c| c.to_string()).collect(),
    }
}

/// Parse a comma-separated list of numbers.
pub fn parse_values(list: &str) -> Result<Vec<f64>, String> {
    list.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>().map_err(|_| format!("invalid number '{s}'")))
        .collect()
}

/// Pretty-print `value` as JSON into `path`.
pub fn write_json<T: Serialize + ?Sized>(path: &str, value: &T) {
    let json = match serde_json::to_string_pretty(value) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Failed to serialize results: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = std::fs::write(Path::new(path), json) {
        eprintln!("Failed to write {path}: {e}");
        std::process::exit(1);
    }
    println!("\nResults saved to: {path}");
}
