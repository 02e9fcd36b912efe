//! log4rs setup for hosts that do not bring their own logger.
//!
//! Sampling chatter (`cachecounters::sampler`) is routed to its own `samples.log` so the
//! application log only carries lifecycle events.

use crate::config::LoggingConfig;
use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::{Path, PathBuf};

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_BYTES: u64 = 10 * 1024 * 1024;
pub const SAMPLER_TARGET: &str = "cachecounters::sampler";

/// error|warn|info|debug|trace, anything else is info.
pub fn parse_level(level: Option<&str>) -> LevelFilter {
    match level.unwrap_or("info").to_ascii_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

fn rolling(base: &Path, stem: &str, keep: u32) -> Result<RollingFileAppender, Box<dyn std::error::Error>> {
    let roller = FixedWindowRoller::builder()
        .build(&format!("{}", base.join(format!("{stem}.{{}}.log")).display()), keep)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_BYTES)), Box::new(roller));
    let appender = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(base.join(format!("{stem}.log")), Box::new(policy))?;
    Ok(appender)
}

/// Log to rolling `app.log` and `samples.log` files under `dir` (current directory if `None`).
/// If a global logger is already installed it is left in place.
///
/// # Errors
/// Returns an error if the directory or the appenders cannot be created.
pub fn configure_logging(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let base = dir
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    std::fs::create_dir_all(&base)?;
    let keep = retention.unwrap_or(7) as u32;
    let lvl = parse_level(level);
    let config = Config::builder()
        .appender(Appender::builder().build("app", Box::new(rolling(&base, "app", keep)?)))
        .appender(Appender::builder().build("samples", Box::new(rolling(&base, "samples", keep)?)))
        .logger(Logger::builder().appender("samples").additive(false).build(SAMPLER_TARGET, lvl))
        .build(Root::builder().appender("app").build(lvl))?;
    let _ = log4rs::init_config(config);
    Ok(())
}

/// Log everything to stderr.
///
/// # Errors
/// Returns an error if the log4rs config is invalid.
pub fn configure_console(level: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(parse_level(level)))?;
    let _ = log4rs::init_config(config);
    Ok(())
}

/// Files when a directory is configured, stderr otherwise.
///
/// # Errors
/// See [`configure_logging`].
pub fn configure(cfg: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    match &cfg.dir {
        Some(dir) => configure_logging(Some(dir), cfg.level.as_deref(), cfg.retention),
        None => configure_console(cfg.level.as_deref()),
    }
}

/// Configure logging from environment variables if present:
/// - CACHECOUNTERS_LOG_DIR
/// - CACHECOUNTERS_LOG_LEVEL
/// - CACHECOUNTERS_LOG_RETENTION
///
/// # Errors
/// See [`configure`].
pub fn configure_from_env() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = LoggingConfig {
        dir: std::env::var("CACHECOUNTERS_LOG_DIR").ok().map(PathBuf::from),
        level: std::env::var("CACHECOUNTERS_LOG_LEVEL").ok(),
        retention: std::env::var("CACHECOUNTERS_LOG_RETENTION")
            .ok()
            .and_then(|s| s.parse::<usize>().ok()),
    };
    configure(&cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::temp_dir;

    #[test]
    fn levels_parse_case_insensitively() {
        assert_eq!(parse_level(Some("WARN")), LevelFilter::Warn);
        assert_eq!(parse_level(Some("trace")), LevelFilter::Trace);
        assert_eq!(parse_level(Some("bogus")), LevelFilter::Info);
        assert_eq!(parse_level(None), LevelFilter::Info);
    }

    #[test]
    fn file_logging_creates_both_logs() {
        let dir = temp_dir("cachecounters_logs");
        configure_logging(Some(&dir), Some("debug"), Some(2)).unwrap();
        assert!(dir.join("app.log").exists());
        assert!(dir.join("samples.log").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
