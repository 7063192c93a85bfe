/// Process-level configuration loaded from environment variables at startup.
/// Missing required variables cause an immediate panic with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    /// Starting equity used for sizing policies, in account currency.
    pub initial_equity: f64,
    /// Slippage applied by the paper gateway, in basis points.
    pub paper_slippage_bps: f64,
    /// Path to the per-strategy TOML file.
    pub strategy_config_path: String,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on any malformed value.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        Config {
            initial_equity: optional_env("INITIAL_EQUITY")
                .map(|v| {
                    v.parse().unwrap_or_else(|_| {
                        panic!("INITIAL_EQUITY must be a number, got: '{v}'")
                    })
                })
                .unwrap_or(10_000.0),
            paper_slippage_bps: optional_env("PAPER_SLIPPAGE_BPS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.0),
            strategy_config_path: optional_env("STRATEGY_CONFIG_PATH")
                .unwrap_or_else(|| "config/strategies.toml".to_string()),
        }
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
