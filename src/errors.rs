use thiserror::Error;

#[derive(Debug, Error)]
pub enum CounterError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Counter category not found: {0}")]
    NoSuchCategory(String),

    #[error("Counter not found: {category}/{counter}")]
    NoSuchCounter { category: String, counter: String },

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

impl From<std::io::Error> for CounterError {
    fn from(e: std::io::Error) -> Self {
        CounterError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_keep_their_message() {
        let err: CounterError = std::io::Error::other("disk gone").into();
        assert!(matches!(err, CounterError::Io(ref m) if m.contains("disk gone")));
    }

    #[test]
    fn missing_counter_names_both_parts() {
        let err = CounterError::NoSuchCounter {
            category: "CacheCounters".into(),
            counter: "CacheSize".into(),
        };
        assert_eq!(err.to_string(), "Counter not found: CacheCounters/CacheSize");
    }
}
