use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// NUHire classroom simulation server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "nuhire-server", version, about = "NUHire classroom simulation server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "NUHIRE_PORT", default_value = "8080")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "NUHIRE_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./nuhire.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "NUHIRE_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (SQLite database)
    #[arg(long, env = "NUHIRE_DATA_DIR", default_value = "./data")]
    pub data_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "0.0.0.0".to_string(),
            config: "./nuhire.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (NUHIRE_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("NUHIRE_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# NUHire Server Configuration
# Place this file at ./nuhire.toml or specify with --config <path>
# All settings can be overridden via environment variables (NUHIRE_PORT, etc.)

# Port to listen on
port = 8080

# Bind address
bind_address = "0.0.0.0"

# Enable structured JSON logging
json_logs = false

# Data directory for the SQLite database
data_dir = "./data"
"#
    .to_string()
}
