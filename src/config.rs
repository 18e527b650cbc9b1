//! Configuration loader and validator for the bird bot.
//!
//! Policy constants (target hour, sleep durations, file paths) come from an
//! optional YAML file; credentials and service endpoints come from the
//! environment, read once at startup.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
    #[error("Missing or empty environment variable: {0}")]
    MissingEnv(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
/// Every field has a default matching the bot's stock deployment, so a
/// missing config file is not an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub app: App,
    pub prompt: Prompt,
    pub openai: OpenAi,
    pub mail: Mail,
}

/// Scheduling and retry policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct App {
    /// Local hour-of-day (0-23) at which a successful cycle schedules the
    /// next run.
    pub target_hour: u32,
    /// Failure cooldown window; cycles are deferred until it has elapsed.
    pub cooldown_hours: i64,
    /// How long to sleep between cooldown re-checks.
    pub cooldown_recheck_secs: u64,
    /// Delay before restarting the loop after a failed cycle.
    pub retry_delay_secs: u64,
    /// File holding the timestamp of the last failed cycle.
    pub error_file: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            target_hour: 9,
            cooldown_hours: 24,
            cooldown_recheck_secs: 3600,
            retry_delay_secs: 600,
            error_file: "birdbot_error_time.txt".into(),
        }
    }
}

/// Prompt composition inputs and the observability output file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Prompt {
    pub base_file: String,
    pub holidays_file: String,
    pub output_file: String,
}

impl Default for Prompt {
    fn default() -> Self {
        Self {
            base_file: "prompt_base.txt".into(),
            holidays_file: "holidays.txt".into(),
            output_file: "prompt.txt".into(),
        }
    }
}

/// Image generation request parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OpenAi {
    pub model: String,
    pub size: String,
    pub quality: String,
}

impl Default for OpenAi {
    fn default() -> Self {
        Self {
            model: "dall-e-3".into(),
            size: "1024x1024".into(),
            quality: "standard".into(),
        }
    }
}

/// Mail transfer agent settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Mail {
    pub msmtp_path: String,
}

impl Default for Mail {
    fn default() -> Self {
        Self {
            msmtp_path: "/usr/bin/msmtp".into(),
        }
    }
}

/// Credentials and endpoints read from the environment at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Secrets {
    pub mastodon_base_url: String,
    pub mastodon_access_token: String,
    pub openai_api_key: String,
    pub email_address: String,
}

impl Secrets {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            mastodon_base_url: require_env("MASTODON_BASE_URL")?,
            mastodon_access_token: require_env("MASTODON_ACCESS_TOKEN")?,
            openai_api_key: require_env("OPENAI_API_KEY")?,
            email_address: require_env("EMAIL_ADDRESS")?,
        })
    }
}

fn require_env(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingEnv(name)),
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `birdbot.yaml` in the current working directory.
/// - A missing file yields the built-in defaults.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("birdbot.yaml"));
    let cfg = if path.exists() {
        let content = fs::read_to_string(path)?;
        serde_yaml::from_str::<Config>(&content)?
    } else {
        Config::default()
    };
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.target_hour > 23 {
        return Err(ConfigError::Invalid("app.target_hour must be 0-23"));
    }
    if cfg.app.cooldown_hours <= 0 {
        return Err(ConfigError::Invalid("app.cooldown_hours must be > 0"));
    }
    if cfg.app.error_file.trim().is_empty() {
        return Err(ConfigError::Invalid("app.error_file must be non-empty"));
    }

    if cfg.prompt.base_file.trim().is_empty() {
        return Err(ConfigError::Invalid("prompt.base_file must be non-empty"));
    }
    if cfg.prompt.holidays_file.trim().is_empty() {
        return Err(ConfigError::Invalid("prompt.holidays_file must be non-empty"));
    }
    if cfg.prompt.output_file.trim().is_empty() {
        return Err(ConfigError::Invalid("prompt.output_file must be non-empty"));
    }

    if cfg.openai.model.trim().is_empty() {
        return Err(ConfigError::Invalid("openai.model must be non-empty"));
    }
    if cfg.openai.size.trim().is_empty() {
        return Err(ConfigError::Invalid("openai.size must be non-empty"));
    }
    if cfg.openai.quality.trim().is_empty() {
        return Err(ConfigError::Invalid("openai.quality must be non-empty"));
    }

    if cfg.mail.msmtp_path.trim().is_empty() {
        return Err(ConfigError::Invalid("mail.msmtp_path must be non-empty"));
    }

    Ok(())
}

/// Example YAML showing every setting at its default.
pub fn example() -> &'static str {
    r#"app:
  target_hour: 9
  cooldown_hours: 24
  cooldown_recheck_secs: 3600
  retry_delay_secs: 600
  error_file: "birdbot_error_time.txt"

prompt:
  base_file: "prompt_base.txt"
  holidays_file: "holidays.txt"
  output_file: "prompt.txt"

openai:
  model: "dall-e-3"
  size: "1024x1024"
  quality: "standard"

mail:
  msmtp_path: "/usr/bin/msmtp"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let cfg: Config = serde_yaml::from_str("app:\n  target_hour: 7\n").unwrap();
        assert_eq!(cfg.app.target_hour, 7);
        assert_eq!(cfg.app.retry_delay_secs, 600);
        assert_eq!(cfg.prompt.holidays_file, "holidays.txt");
    }

    #[test]
    fn invalid_target_hour() {
        let mut cfg = Config::default();
        cfg.app.target_hour = 24;
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("target_hour")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_empty_paths() {
        let mut cfg = Config::default();
        cfg.prompt.base_file = "".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg = Config::default();
        cfg.app.error_file = " ".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg = Config::default();
        cfg.mail.msmtp_path = "".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("birdbot.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.app.cooldown_hours, 24);
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let td = tempdir().unwrap();
        let cfg = load(Some(&td.path().join("nope.yaml"))).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn missing_env_is_reported() {
        let err = require_env("BIRDBOT_TEST_UNSET_VARIABLE").unwrap_err();
        match err {
            ConfigError::MissingEnv(name) => assert_eq!(name, "BIRDBOT_TEST_UNSET_VARIABLE"),
            _ => panic!("wrong error"),
        }
    }
}
