use callrelay_core::{
    EarlyAudioPolicy, RelayOptions, SessionConfig,
    log_sink::DEFAULT_MAX_LOG_BYTES,
    protocol::realtime::DEFAULT_INSTRUCTIONS,
};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub openai_api_key: String,
    pub realtime_url: String,
    pub realtime_model: String,
    pub voice: String,
    pub instructions: String,
    pub temperature: f32,
    pub call_log_dir: PathBuf,
    pub call_log_max_bytes: u64,
    pub channel_capacity: usize,
    pub max_idle: Option<Duration>,
    pub early_audio: EarlyAudioPolicy,
    pub log_level: Level,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("openai_api_key", &"<redacted>")
            .field("realtime_url", &self.realtime_url)
            .field("realtime_model", &self.realtime_model)
            .field("voice", &self.voice)
            .field("instructions", &self.instructions)
            .field("temperature", &self.temperature)
            .field("call_log_dir", &self.call_log_dir)
            .field("call_log_max_bytes", &self.call_log_max_bytes)
            .field("channel_capacity", &self.channel_capacity)
            .field("max_idle", &self.max_idle)
            .field("early_audio", &self.early_audio)
            .field("log_level", &self.log_level)
            .finish()
    }
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let port: u16 = parse_var("PORT", 5000)?;
        let bind_address_str = var_or("BIND_ADDRESS", &format!("0.0.0.0:{}", port));
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;

        let realtime_url = var_or("REALTIME_URL", "wss://api.openai.com/v1/realtime");
        let realtime_model = var_or("REALTIME_MODEL", "gpt-4o-realtime-preview-2024-10-01");
        let voice = var_or("REALTIME_VOICE", "alloy");
        let instructions = var_or("SYSTEM_INSTRUCTIONS", DEFAULT_INSTRUCTIONS);

        let temperature: f32 = parse_var("TEMPERATURE", 0.8)?;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidValue(
                "TEMPERATURE".to_string(),
                format!("{} is outside 0.0..=2.0", temperature),
            ));
        }

        let call_log_dir = std::env::var("CALL_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./call_logs"));
        let call_log_max_bytes: u64 = parse_var("CALL_LOG_MAX_BYTES", DEFAULT_MAX_LOG_BYTES)?;
        if call_log_max_bytes == 0 {
            return Err(ConfigError::InvalidValue(
                "CALL_LOG_MAX_BYTES".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let channel_capacity: usize = parse_var("RELAY_CHANNEL_CAPACITY", 64)?;
        if channel_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "RELAY_CHANNEL_CAPACITY".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let max_idle = match std::env::var("MAX_IDLE_SECS") {
            Ok(raw) => {
                let secs = raw.trim().parse::<u64>().map_err(|e| {
                    ConfigError::InvalidValue("MAX_IDLE_SECS".to_string(), e.to_string())
                })?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            Err(_) => None,
        };

        let policy_str = var_or("EARLY_AUDIO_POLICY", "buffer");
        let early_audio = match policy_str.to_lowercase().as_str() {
            "buffer" => EarlyAudioPolicy::default(),
            "drop" => EarlyAudioPolicy::Drop,
            other => {
                return Err(ConfigError::InvalidValue(
                    "EARLY_AUDIO_POLICY".to_string(),
                    format!("'{}' is not one of 'buffer' or 'drop'", other),
                ));
            }
        };

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            openai_api_key,
            realtime_url,
            realtime_model,
            voice,
            instructions,
            temperature,
            call_log_dir,
            call_log_max_bytes,
            channel_capacity,
            max_idle,
            early_audio,
            log_level,
        })
    }

    /// The `session.update` payload sent on every AI connection.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            voice: self.voice.clone(),
            instructions: self.instructions.clone(),
            temperature: self.temperature,
            ..SessionConfig::default()
        }
    }

    pub fn relay_options(&self) -> RelayOptions {
        RelayOptions {
            channel_capacity: self.channel_capacity,
            max_idle: self.max_idle,
            early_audio: self.early_audio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tracing::Level;

    fn clear_env_vars() {
        unsafe {
            for var in [
                "BIND_ADDRESS",
                "PORT",
                "OPENAI_API_KEY",
                "REALTIME_URL",
                "REALTIME_MODEL",
                "REALTIME_VOICE",
                "SYSTEM_INSTRUCTIONS",
                "TEMPERATURE",
                "CALL_LOG_DIR",
                "CALL_LOG_MAX_BYTES",
                "RELAY_CHANNEL_CAPACITY",
                "MAX_IDLE_SECS",
                "EARLY_AUDIO_POLICY",
                "RUST_LOG",
            ] {
                env::remove_var(var);
            }
        }
    }

    fn set_minimal_env() {
        unsafe {
            env::set_var("OPENAI_API_KEY", "test-openai-key");
        }
    }

    #[test]
    fn test_config_error_display() {
        let missing_var = ConfigError::MissingVar("TEST_VAR".to_string());
        assert_eq!(
            format!("{}", missing_var),
            "Missing environment variable: TEST_VAR"
        );

        let invalid_value =
            ConfigError::InvalidValue("TEST_VAR".to_string(), "bad_value".to_string());
        assert_eq!(
            format!("{}", invalid_value),
            "Invalid value for environment variable TEST_VAR: bad_value"
        );
    }

    #[test]
    #[serial]
    fn test_config_from_env_minimal() {
        clear_env_vars();
        set_minimal_env();

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "0.0.0.0:5000");
        assert_eq!(config.openai_api_key, "test-openai-key");
        assert_eq!(config.realtime_url, "wss://api.openai.com/v1/realtime");
        assert_eq!(config.realtime_model, "gpt-4o-realtime-preview-2024-10-01");
        assert_eq!(config.voice, "alloy");
        assert_eq!(config.instructions, DEFAULT_INSTRUCTIONS);
        assert_eq!(config.temperature, 0.8);
        assert_eq!(config.call_log_dir, PathBuf::from("./call_logs"));
        assert_eq!(config.call_log_max_bytes, DEFAULT_MAX_LOG_BYTES);
        assert_eq!(config.channel_capacity, 64);
        assert_eq!(config.max_idle, None);
        assert_eq!(config.early_audio, EarlyAudioPolicy::default());
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    #[serial]
    fn test_config_from_env_custom_values() {
        clear_env_vars();
        unsafe {
            env::set_var("BIND_ADDRESS", "127.0.0.1:8080");
            env::set_var("OPENAI_API_KEY", "custom-key");
            env::set_var("REALTIME_URL", "ws://localhost:9000/realtime");
            env::set_var("REALTIME_MODEL", "gpt-4o-mini-realtime-preview");
            env::set_var("REALTIME_VOICE", "shimmer");
            env::set_var("SYSTEM_INSTRUCTIONS", "Answer in French.");
            env::set_var("TEMPERATURE", "0.6");
            env::set_var("CALL_LOG_DIR", "/var/log/calls");
            env::set_var("CALL_LOG_MAX_BYTES", "4096");
            env::set_var("RELAY_CHANNEL_CAPACITY", "8");
            env::set_var("MAX_IDLE_SECS", "30");
            env::set_var("EARLY_AUDIO_POLICY", "Drop");
            env::set_var("RUST_LOG", "debug");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "127.0.0.1:8080");
        assert_eq!(config.realtime_url, "ws://localhost:9000/realtime");
        assert_eq!(config.realtime_model, "gpt-4o-mini-realtime-preview");
        assert_eq!(config.call_log_dir, PathBuf::from("/var/log/calls"));
        assert_eq!(config.call_log_max_bytes, 4096);
        assert_eq!(config.log_level, Level::DEBUG);

        let session = config.session_config();
        assert_eq!(session.voice, "shimmer");
        assert_eq!(session.instructions, "Answer in French.");
        assert_eq!(session.temperature, 0.6);

        let options = config.relay_options();
        assert_eq!(options.channel_capacity, 8);
        assert_eq!(options.max_idle, Some(Duration::from_secs(30)));
        assert_eq!(options.early_audio, EarlyAudioPolicy::Drop);
    }

    #[test]
    #[serial]
    fn test_config_debug_redacts_api_key() {
        clear_env_vars();
        unsafe {
            env::set_var("OPENAI_API_KEY", "sk-very-secret");
        }

        let config = Config::from_env().expect("Config should load successfully");
        let printed = format!("{:?}", config);
        assert!(!printed.contains("sk-very-secret"));
        assert!(printed.contains("<redacted>"));
        assert!(printed.contains("gpt-4o-realtime-preview-2024-10-01"));
    }

    #[test]
    #[serial]
    fn test_config_port_sets_default_bind_address() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("PORT", "8081");
        }

        let config = Config::from_env().expect("Config should load successfully");
        assert_eq!(config.bind_address.to_string(), "0.0.0.0:8081");
    }

    #[test]
    #[serial]
    fn test_config_invalid_bind_address() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("BIND_ADDRESS", "not-a-valid-address");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "BIND_ADDRESS"),
            _ => panic!("Expected InvalidValue for BIND_ADDRESS"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_log_level() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("RUST_LOG", "not-a-level");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "RUST_LOG"),
            _ => panic!("Expected InvalidValue for RUST_LOG"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_early_audio_policy() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("EARLY_AUDIO_POLICY", "queue");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "EARLY_AUDIO_POLICY"),
            _ => panic!("Expected InvalidValue for EARLY_AUDIO_POLICY"),
        }
    }

    #[test]
    #[serial]
    fn test_config_rejects_out_of_range_numbers() {
        for (var, value) in [
            ("TEMPERATURE", "3.5"),
            ("TEMPERATURE", "warm"),
            ("CALL_LOG_MAX_BYTES", "0"),
            ("RELAY_CHANNEL_CAPACITY", "0"),
            ("MAX_IDLE_SECS", "-1"),
            ("PORT", "99999"),
        ] {
            clear_env_vars();
            set_minimal_env();
            unsafe {
                env::set_var(var, value);
            }

            match Config::from_env() {
                Err(ConfigError::InvalidValue(name, _)) => assert_eq!(name, var),
                other => panic!("Expected InvalidValue for {}={}, got {:?}", var, value, other),
            }
        }
    }

    #[test]
    #[serial]
    fn test_config_zero_idle_disables_timeout() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("MAX_IDLE_SECS", "0");
        }

        let config = Config::from_env().expect("Config should load successfully");
        assert_eq!(config.max_idle, None);
    }

    #[test]
    #[serial]
    fn test_config_missing_openai_key() {
        clear_env_vars();

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(msg) => assert!(msg.contains("OPENAI_API_KEY")),
            _ => panic!("Expected MissingVar for OPENAI_API_KEY"),
        }
    }
}
