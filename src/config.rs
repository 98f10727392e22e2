//! Runtime settings, resolved once at startup.
//!
//! Layers, later wins:
//! 1. built-in defaults
//! 2. `chronos.yaml` in the working directory, or the file given with `--config`
//! 3. `CHRONOS_*` environment variables
//! 4. command-line overrides applied by the binary
//!
//! The model key also falls back to `GEMINI_API_KEY` / `API_KEY`. `load` only
//! extracts; callers run [`Settings::validate`] once every layer is applied.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "chronos.yaml";
pub const ENV_PREFIX: &str = "CHRONOS_";
const KEY_FALLBACK_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    /// Call the model API from this process.
    #[default]
    Direct,
    /// Forward scenarios to another Chronos backend.
    Backend,
    /// Canned timelines, no network.
    Offline,
}

impl GenerationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationMode::Direct => "direct",
            GenerationMode::Backend => "backend",
            GenerationMode::Offline => "offline",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    FileNotFound(PathBuf),
    #[error("configuration parsing error: {0}")]
    Parsing(#[from] figment::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub mode: GenerationMode,
    pub backend_url: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub model_base_url: Option<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub memory_store_url: Option<String>,
    pub port: u16,
    pub service_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: GenerationMode::Direct,
            backend_url: None,
            api_key: None,
            model: "gemini-2.5-flash".to_string(),
            model_base_url: None,
            temperature: 0.8,
            timeout_secs: 60,
            memory_store_url: None,
            port: 5001,
            service_name: "chronos-backend".to_string(),
        }
    }
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));

        match path {
            Some(path) if !path.exists() => {
                return Err(ConfigError::FileNotFound(path.to_path_buf()));
            }
            Some(path) => figment = figment.merge(Yaml::file(path)),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                figment = figment.merge(Yaml::file(DEFAULT_CONFIG_FILE));
            }
            None => {}
        }

        let mut settings: Settings = figment.merge(Env::prefixed(ENV_PREFIX)).extract()?;
        if settings.api_key.is_none() {
            settings.api_key = KEY_FALLBACK_VARS
                .iter()
                .find_map(|var| std::env::var(var).ok())
                .filter(|k| !k.trim().is_empty());
        }
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be > 0".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(
                "temperature must be between 0 and 2".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".to_string()));
        }
        if self.mode == GenerationMode::Backend
            && self.backend_url.as_deref().is_none_or(|u| u.trim().is_empty())
        {
            return Err(ConfigError::Invalid(
                "backend mode requires backend_url".to_string(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use proptest::prelude::{prop_assert_eq, proptest};

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.timeout(), Duration::from_secs(60));
        assert_eq!(settings.mode, GenerationMode::Direct);
    }

    #[test]
    fn validate_rejects_zero_timeout_and_wild_temperature() {
        let settings = Settings {
            timeout_secs: 0,
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(m)) if m.contains("timeout_secs")));

        let settings = Settings {
            temperature: 3.5,
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(m)) if m.contains("temperature")));
    }

    #[test]
    fn validate_requires_url_in_backend_mode() {
        let mut settings = Settings {
            mode: GenerationMode::Backend,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
        settings.backend_url = Some("http://localhost:5001".to_string());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn load_layers_file_then_environment() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                DEFAULT_CONFIG_FILE,
                "mode: backend\nbackend_url: \"http://file-host:5001\"\ntimeout_secs: 15\n",
            )?;
            jail.set_env("CHRONOS_TIMEOUT_SECS", "20");
            jail.set_env("CHRONOS_MEMORY_STORE_URL", "http://memory:9000/store");

            let settings = Settings::load(None).expect("valid settings");
            assert_eq!(settings.mode, GenerationMode::Backend);
            assert_eq!(settings.backend_url.as_deref(), Some("http://file-host:5001"));
            assert_eq!(settings.timeout_secs, 20);
            assert_eq!(
                settings.memory_store_url.as_deref(),
                Some("http://memory:9000/store")
            );
            Ok(())
        });
    }

    #[test]
    fn load_falls_back_to_gemini_key_variable() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("GEMINI_API_KEY", "from-gemini-var");
            let settings = Settings::load(None).expect("valid settings");
            assert_eq!(settings.api_key.as_deref(), Some("from-gemini-var"));

            jail.set_env("CHRONOS_API_KEY", "from-chronos-var");
            let settings = Settings::load(None).expect("valid settings");
            assert_eq!(settings.api_key.as_deref(), Some("from-chronos-var"));
            Ok(())
        });
    }

    #[test]
    fn load_reports_missing_explicit_file() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            let err = Settings::load(Some(Path::new("missing.yaml"))).expect_err("missing");
            assert!(matches!(err, ConfigError::FileNotFound(_)));
            Ok(())
        });
    }

    #[test]
    fn load_rejects_invalid_layered_values() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("CHRONOS_TIMEOUT_SECS", "0");
            let settings = Settings::load(None).expect("extracts");
            assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));
            Ok(())
        });
    }

    #[test]
    fn command_line_mode_repairs_incomplete_environment() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("CHRONOS_MODE", "backend");

            let mut settings = Settings::load(None).expect("extracts without validating");
            assert_eq!(settings.mode, GenerationMode::Backend);
            assert!(settings.validate().is_err());

            settings.mode = GenerationMode::Offline;
            assert!(settings.validate().is_ok());
            Ok(())
        });
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_validate_tracks_timeout_and_temperature(
            timeout_secs in 0u64..600,
            temperature in -1.0f32..3.0,
        ) {
            let settings = Settings {
                timeout_secs,
                temperature,
                ..Settings::default()
            };
            let expected = timeout_secs > 0 && (0.0..=2.0).contains(&temperature);
            prop_assert_eq!(settings.validate().is_ok(), expected);
        }
    }
}
