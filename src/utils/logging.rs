use crate::utils::trace;
use log::LevelFilter;
use std::io::Write;

/// Maps the configured level name onto a `log` filter. Unknown names mean INFO.
pub fn level_filter(level: &str) -> LevelFilter {
    match level.trim().to_uppercase().as_str() {
        "TRACE" => LevelFilter::Trace,
        "DEBUG" => LevelFilter::Debug,
        "WARNING" | "WARN" => LevelFilter::Warn,
        "ERROR" | "CRITICAL" => LevelFilter::Error,
        _ => LevelFilter::Info,
    }
}

/// Installs the global logger. Every line carries the current trace id (or `N/A`).
pub fn init(log_level: &str, json_format: bool) {
    let level = level_filter(log_level);
    let mut builder = env_logger::Builder::new();

    builder
        .filter_level(level)
        .filter_module("mongodb", LevelFilter::Warn)
        .filter_module("actix_server", LevelFilter::Warn);

    if json_format {
        builder.format(|buf, record| {
            let line = serde_json::json!({
                "timestamp": timestamp(),
                "logger": record.target(),
                "level": record.level().to_string(),
                "message": record.args().to_string(),
                "trace_id": trace_id_or_placeholder(),
                "service": "api",
            });
            writeln!(buf, "{}", line)
        });
    } else {
        builder.format(|buf, record| {
            writeln!(
                buf,
                "{} | {:<8} | {} | [{}] | {}",
                timestamp(),
                record.level(),
                record.target(),
                trace_id_or_placeholder(),
                record.args()
            )
        });
    }

    // A second init (e.g. from tests) keeps the first logger.
    let _ = builder.try_init();
}

fn timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn trace_id_or_placeholder() -> String {
    trace::current_trace_id().unwrap_or_else(|| "N/A".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_names() {
        assert_eq!(level_filter("debug"), LevelFilter::Debug);
        assert_eq!(level_filter("WARNING"), LevelFilter::Warn);
        assert_eq!(level_filter("CRITICAL"), LevelFilter::Error);
        assert_eq!(level_filter("nonsense"), LevelFilter::Info);
    }
}
