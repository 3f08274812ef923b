use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Parley chat server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "parley-server", version, about = "Parley chat server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "PARLEY_PORT", default_value = "8470")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "PARLEY_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./parley.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "PARLEY_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (DB, signing key)
    #[arg(long, env = "PARLEY_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Maximum concurrent WebSocket connections per user
    #[arg(long, env = "PARLEY_CONNECTION_LIMIT", default_value = "5")]
    pub connection_limit: usize,

    /// Seconds an accepted WebSocket may stay anonymous before it is closed
    #[arg(long, env = "PARLEY_HANDSHAKE_TIMEOUT_SECS", default_value = "5")]
    pub handshake_timeout_secs: u64,

    /// Access token lifetime in seconds
    #[arg(long, env = "PARLEY_TOKEN_TTL_SECS", default_value = "86400")]
    pub token_ttl_secs: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8470,
            bind_address: "0.0.0.0".to_string(),
            config: "./parley.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            connection_limit: 5,
            handshake_timeout_secs: 5,
            token_ttl_secs: 86400,
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (PARLEY_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("PARLEY_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Parley Chat Server Configuration
# Place this file at ./parley.toml or specify with --config <path>
# All settings can be overridden via environment variables (PARLEY_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 8470)
# port = 8470

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite database and JWT signing key
# data_dir = "./data"

# Maximum concurrent WebSocket connections per user (default: 5)
# connection_limit = 5

# Seconds an accepted WebSocket may stay anonymous before it is closed.
# Bounds the exposure of the accept-first-authenticate-second handshake.
# handshake_timeout_secs = 5

# Access token lifetime in seconds (default: 86400 = 24 hours)
# token_ttl_secs = 86400
"#
    .to_string()
}
