use std::{env, str::FromStr, time::Duration};

/// Runtime knobs, read from the environment (a `.env` file is honored).
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    /// Ceiling on any single mutating operation.
    pub op_timeout: Duration,
    /// How often the sweeper looks for elapsed holds.
    pub sweep_interval: Duration,
    /// How long terminal holds and idempotency records are kept around.
    pub retention: Duration,
    pub max_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            op_timeout: Duration::from_secs(5),
            sweep_interval: Duration::from_millis(500),
            retention: Duration::from_secs(300),
            max_ttl: Duration::from_secs(3600),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: parsed("STOCKLEDGER_PORT", 8000),
            op_timeout: Duration::from_millis(parsed("STOCKLEDGER_OP_TIMEOUT_MS", 5_000)),
            sweep_interval: Duration::from_millis(parsed("STOCKLEDGER_SWEEP_INTERVAL_MS", 500)),
            retention: Duration::from_millis(parsed("STOCKLEDGER_RETENTION_MS", 300_000)),
            max_ttl: Duration::from_secs(parsed("STOCKLEDGER_MAX_TTL_SECS", 3_600)),
        }
    }
}

fn parsed<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
