use cachecounters::cache::{CacheConfig, CacheRegistry};
use cachecounters::config::MonitorConfig;
use cachecounters::sink::{MemorySink, MetricSink, MetricsFacadeSink};
use cachecounters::{CATEGORY, CacheMonitor, MetricKind, logger};
use chrono::SecondsFormat;
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "cachecounters", version, about = "Publish in-process cache statistics as counters", long_about = None)]
struct Cli {
    /// Path to a config file (TOML)
    #[arg(long, help = "Path to a config file (TOML). If omitted, defaults are used.")]
    config: Option<PathBuf>,
    #[arg(long, help = "Sampling interval in milliseconds. Takes precedence over config/env.")]
    interval_ms: Option<u64>,
    #[arg(long, help = "Do not publish CacheCount")]
    no_count: bool,
    #[arg(long, help = "Do not publish CacheSize")]
    no_size: bool,
    #[arg(long, help = "Do not publish CacheMaxSize")]
    no_max_size: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Run demo caches under load and publish their counters")]
    Run {
        #[arg(long = "cache", help = "Cache name to register (repeatable)", default_values_t = ["html".to_string(), "fragments".to_string(), "sessions".to_string()])]
        caches: Vec<String>,
        #[arg(long, default_value_t = 1024 * 1024, help = "Byte budget of each demo cache (0 = unbounded)")]
        max_size: u64,
        #[arg(long, help = "Serve Prometheus metrics on this address instead of printing JSON")]
        metrics_addr: Option<SocketAddr>,
        #[arg(long, help = "Exit after this many seconds (default: run until Ctrl-C)")]
        duration_secs: Option<u64>,
    },
    #[command(name = "show-config", about = "Print the effective configuration as TOML")]
    ShowConfig,
}

fn load(cli: &Cli) -> Result<MonitorConfig, cachecounters::CounterError> {
    // Precedence: CLI > env > config files > defaults
    let mut cfg = MonitorConfig::load(cli.config.as_deref())?;
    if let Some(ms) = cli.interval_ms {
        cfg.sampling.interval_millis = ms;
    }
    for (off, kind) in [
        (cli.no_count, MetricKind::Count),
        (cli.no_size, MetricKind::Size),
        (cli.no_max_size, MetricKind::MaxSize),
    ] {
        if off {
            cfg.sampling.set_enabled(kind, false);
        }
    }
    cfg.sampling.validate()?;
    Ok(cfg)
}

/// Keeps the demo caches busy until `stop` is set.
fn spawn_churn(registry: Arc<CacheRegistry>, stop: Arc<AtomicBool>) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let mut i: u64 = 0;
        while !stop.load(Ordering::Relaxed) {
            for (n, name) in registry.names().iter().enumerate() {
                if let Some(cache) = registry.get(name) {
                    let key = format!("k{}", (i * 7 + n as u64) % 500);
                    cache.insert(key, vec![0u8; ((i * 37 + n as u64 * 101) % 4096) as usize]);
                    if i % 5 == 0 {
                        let _ = cache.get(&format!("k{}", i % 500));
                    }
                }
            }
            i = i.wrapping_add(1);
            std::thread::sleep(Duration::from_millis(20));
        }
    })
}

async fn drive<S: MetricSink + 'static>(
    monitor: &CacheMonitor<S, CacheRegistry>,
    duration: Option<Duration>,
    report: impl Fn(),
) {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let deadline = async move {
        match duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);
    loop {
        let tick = tokio::time::sleep(monitor.config().interval());
        tokio::select! {
            _ = &mut ctrl_c => {
                log::info!("interrupted");
                break;
            }
            _ = &mut deadline => {
                log::info!("run duration elapsed");
                break;
            }
            _ = tick => report(),
        }
    }
}

async fn run(
    cfg: MonitorConfig,
    caches: Vec<String>,
    max_size: u64,
    metrics_addr: Option<SocketAddr>,
    duration: Option<Duration>,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = Arc::new(CacheRegistry::new());
    for name in &caches {
        registry.register(name, CacheConfig::bounded(1024, max_size));
    }
    let stop = Arc::new(AtomicBool::new(false));
    let churn = spawn_churn(registry.clone(), stop.clone());
    let counters = MetricKind::ALL.map(MetricKind::counter_name);

    let outcome = match metrics_addr {
        Some(addr) => {
            PrometheusBuilder::new().with_http_listener(addr).install()?;
            log::info!("serving Prometheus metrics on {addr}");
            let sink = Arc::new(MetricsFacadeSink::new());
            sink.provision(CATEGORY, &counters);
            let monitor = CacheMonitor::new(sink, registry.clone(), cfg.sampling)?;
            let started = monitor.initialize();
            if started.is_ok() {
                drive(&monitor, duration, || {}).await;
            }
            monitor.shutdown();
            started
        }
        None => {
            let sink = Arc::new(MemorySink::with_cache_counters());
            let monitor = CacheMonitor::new(sink.clone(), registry.clone(), cfg.sampling)?;
            let started = monitor.initialize();
            if started.is_ok() {
                drive(&monitor, duration, || {
                    let line = serde_json::json!({
                        "sampled_at": chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                        "passes": monitor.passes_completed(),
                        "counters": sink.snapshot(),
                    });
                    println!("{line}");
                })
                .await;
            }
            monitor.shutdown();
            started
        }
    };

    stop.store(true, Ordering::Relaxed);
    let _ = churn.join();
    outcome.map_err(|reason| format!("cache counters disabled: {reason}").into())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let cfg = match load(&cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::from(2);
        }
    };
    if let Err(e) = logger::configure(&cfg.logging) {
        eprintln!("logging setup failed: {e}");
    }

    match cli.command {
        Commands::ShowConfig => match toml::to_string_pretty(&cfg) {
            Ok(s) => {
                print!("{s}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{e}");
                ExitCode::FAILURE
            }
        },
        Commands::Run { caches, max_size, metrics_addr, duration_secs } => {
            let duration = duration_secs.map(Duration::from_secs);
            match run(cfg, caches, max_size, metrics_addr, duration).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("{e}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachecounters::SamplingConfig;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn duration_ends_the_loop_before_a_long_interval() {
        let sink = Arc::new(MemorySink::with_cache_counters());
        let cfg = SamplingConfig { interval_millis: 60_000, ..Default::default() };
        let monitor = CacheMonitor::new(sink, Arc::new(CacheRegistry::new()), cfg).unwrap();
        let reports = AtomicUsize::new(0);
        let finished = tokio::time::timeout(
            Duration::from_secs(2),
            drive(&monitor, Some(Duration::from_millis(50)), || {
                reports.fetch_add(1, Ordering::Relaxed);
            }),
        )
        .await;
        assert!(finished.is_ok());
        assert_eq!(reports.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn reports_once_per_interval_until_the_deadline() {
        let sink = Arc::new(MemorySink::with_cache_counters());
        let cfg = SamplingConfig { interval_millis: 20, ..Default::default() };
        let monitor = CacheMonitor::new(sink, Arc::new(CacheRegistry::new()), cfg).unwrap();
        let reports = AtomicUsize::new(0);
        drive(&monitor, Some(Duration::from_millis(150)), || {
            reports.fetch_add(1, Ordering::Relaxed);
        })
        .await;
        let n = reports.load(Ordering::Relaxed);
        assert!((3..=8).contains(&n), "{n} reports");
    }
}
