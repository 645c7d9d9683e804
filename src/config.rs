use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Path of the JSON intent file
    #[arg(long, env = "DATA_FILE")]
    pub data_file: Option<String>,

    /// Minimum classifier score for a canned reply
    #[arg(long, env = "CONFIDENCE_THRESHOLD")]
    pub confidence_threshold: Option<f32>,

    /// Disable the request timeout middleware
    #[arg(long, env = "TIMEOUT_DISABLED")]
    pub timeout_disabled: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub resilience: ResilienceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// JSON intent file, rewritten wholesale on every teach event.
    pub data_file: String,
    /// Score a prediction must beat before its canned reply is used.
    pub confidence_threshold: f32,
    /// Messages longer than this (in chars) are truncated before handling.
    pub max_message_len: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResilienceConfig {
    pub timeout_disabled: bool,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    /// Layering, lowest to highest: built-in defaults, optional YAML file,
    /// `CHAT_*__*` environment variables, CLI flags.
    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder()
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("engine.data_file", "intents.json")?
            .set_default("engine.confidence_threshold", 0.6)?
            .set_default("engine.max_message_len", 2000)?
            .set_default("resilience.timeout_disabled", false)?;

        builder = match &cli.config {
            Some(path) => builder.add_source(File::with_name(path)),
            None => builder.add_source(File::with_name("config").required(false)),
        };

        // E.g. CHAT_SERVER__PORT=8000
        builder = builder.add_source(
            Environment::with_prefix("CHAT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // CLI flags win over everything. Clap already resolved their
        // dedicated env vars (PORT, DATA_FILE, ...).
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(path) = cli.data_file {
            builder = builder.set_override("engine.data_file", path)?;
        }
        if let Some(threshold) = cli.confidence_threshold {
            builder = builder.set_override("engine.confidence_threshold", f64::from(threshold))?;
        }
        if let Some(td) = cli.timeout_disabled {
            builder = builder.set_override("resilience.timeout_disabled", td)?;
        }

        let cfg = builder.build()?;
        cfg.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_file_or_env() {
        let config = AppConfig::load_from_args(["teachbot"]).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.engine.data_file, "intents.json");
        assert!((config.engine.confidence_threshold - 0.6).abs() < f32::EPSILON);
        assert!(!config.resilience.timeout_disabled);
    }

    #[test]
    fn cli_flags_override_defaults() {
        let config = AppConfig::load_from_args([
            "teachbot",
            "--port",
            "8080",
            "--data-file",
            "/tmp/knowledge.json",
            "--timeout-disabled",
            "true",
        ])
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.engine.data_file, "/tmp/knowledge.json");
        assert!(config.resilience.timeout_disabled);
    }

    #[test]
    fn missing_explicit_config_file_is_an_error() {
        let result = AppConfig::load_from_args(["teachbot", "--config", "/no/such/file.yaml"]);
        assert!(result.is_err());
    }
}
