use cachecounters::config::MonitorConfig;
use cachecounters::{CounterError, MetricKind, SamplingConfig};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_file(stem: &str, contents: &str) -> std::path::PathBuf {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let path = std::env::temp_dir().join(format!("{stem}_{now}.toml"));
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_full_file_round_trips_through_toml() {
    let cfg = MonitorConfig::from_toml_str(
        r#"
[sampling]
sample_count = true
sample_size = false
sample_max_size = true
interval_millis = 750

[logging]
dir = "/var/log/cachecounters"
level = "warn"
retention = 3
"#,
    )
    .unwrap();
    assert_eq!(cfg.sampling.enabled_kinds().collect::<Vec<_>>(), vec![MetricKind::Count, MetricKind::MaxSize]);
    assert_eq!(cfg.logging.retention, Some(3));
    let rendered = toml::to_string_pretty(&cfg).unwrap();
    assert_eq!(MonitorConfig::from_toml_str(&rendered).unwrap(), cfg);
}

#[test]
fn test_malformed_toml_is_reported() {
    let err = MonitorConfig::from_toml_str("[sampling\ninterval_millis = ").unwrap_err();
    assert!(matches!(err, CounterError::Toml(_)));
}

// The only test in this binary that touches the process environment.
#[test]
fn test_env_overrides_the_file() {
    let path = temp_file("cachecounters_env", "[sampling]\ninterval_millis = 200\nsample_size = true\n");
    unsafe {
        std::env::set_var("CACHECOUNTERS_INTERVAL_MS", "900");
        std::env::set_var("CACHECOUNTERS_SAMPLE_SIZE", "off");
        std::env::set_var("CACHECOUNTERS_LOG_LEVEL", "debug");
    }
    let cfg = MonitorConfig::load(Some(&path)).unwrap();
    assert_eq!(cfg.sampling.interval_millis, 900);
    assert!(!cfg.sampling.sample_size);
    assert!(cfg.sampling.sample_count);
    assert_eq!(cfg.logging.level.as_deref(), Some("debug"));

    unsafe { std::env::set_var("CACHECOUNTERS_INTERVAL_MS", "soon") };
    assert!(matches!(MonitorConfig::load(Some(&path)), Err(CounterError::InvalidConfig(_))));

    unsafe {
        std::env::remove_var("CACHECOUNTERS_INTERVAL_MS");
        std::env::remove_var("CACHECOUNTERS_SAMPLE_SIZE");
        std::env::remove_var("CACHECOUNTERS_LOG_LEVEL");
    }
    let cfg = MonitorConfig::load(Some(&path)).unwrap();
    assert_eq!(cfg.sampling, SamplingConfig { interval_millis: 200, ..Default::default() });
    let _ = std::fs::remove_file(&path);
}
