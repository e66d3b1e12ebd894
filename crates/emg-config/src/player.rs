use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "emg.toml";

/// Player settings loaded from `emg.toml`. Every section is optional.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PlayerConfig {
    /// `[legacy]`: fallback image naming.
    pub legacy: LegacyConfig,
    /// `[animation]`: engine timing.
    pub animation: AnimationConfig,
    /// `[blink]`: auto-blink timing.
    pub blink: BlinkConfig,
    /// `[logging]`: log filter and retention.
    pub logging: LoggingConfig,
}

/// Fixed-pattern image naming used when a state has no mapping entry:
/// `{base_path}/{emotion}{suffix}{file_extension}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LegacyConfig {
    /// Directory fallback images live in.
    pub base_path: String,
    /// Extension appended to every fallback image.
    pub file_extension: String,
    /// Suffix for the mouth-open image.
    pub talking_suffix: String,
    /// Suffix for the mouth-closed image.
    pub silent_suffix: String,
    /// Emotion used when the state has none.
    pub default_emotion: String,
}

impl Default for LegacyConfig {
    fn default() -> Self {
        Self {
            base_path: "/assets".to_string(),
            file_extension: ".png".to_string(),
            talking_suffix: "_open".to_string(),
            silent_suffix: "_closed".to_string(),
            default_emotion: "neutral".to_string(),
        }
    }
}

/// Layer animation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AnimationConfig {
    /// Period of the layer-group rotation.
    pub group_interval_ms: u64,
    /// Start sprite and group animation as soon as a scene is loaded.
    pub autostart: bool,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            group_interval_ms: 500,
            autostart: true,
        }
    }
}

/// Auto-blink timing, each a `[min, max]` range in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BlinkConfig {
    /// Delay before the first blink.
    pub initial_open_ms: [u64; 2],
    /// How long the eyes stay closed.
    pub closed_ms: [u64; 2],
    /// Delay between blinks.
    pub open_ms: [u64; 2],
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self {
            initial_open_ms: [3000, 5000],
            closed_ms: [100, 200],
            open_ms: [2000, 6000],
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LoggingConfig {
    /// Filter directive used when `EMG_LOG`/`RUST_LOG` are unset.
    pub filter: String,
    /// Rolled log files older than this many days are deleted at startup.
    pub retention_days: u64,
    /// Also log to stderr.
    pub stderr: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            retention_days: 7,
            stderr: false,
        }
    }
}

impl PlayerConfig {
    /// Parse and validate config TOML.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input).context("failed to parse player config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read player config at {}", path.display()))?;
        Self::from_toml_str(&raw)
            .with_context(|| format!("invalid player config at {}", path.display()))
    }

    /// Where to look for the config: `EMG_CONFIG` > `./emg.toml`.
    pub fn default_path() -> PathBuf {
        std::env::var_os("EMG_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    /// A file that exists but is invalid is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_path(path)
        } else {
            tracing::debug!(path = %path.display(), "no player config found, using defaults");
            Ok(Self::default())
        }
    }

    /// Validate semantic constraints serde can't express.
    pub fn validate(&self) -> Result<()> {
        validate_nonempty("legacy.base_path", &self.legacy.base_path)?;
        validate_nonempty("legacy.default_emotion", &self.legacy.default_emotion)?;
        if self.animation.group_interval_ms == 0 {
            bail!("animation.group_interval_ms must be greater than zero");
        }
        validate_range("blink.initial_open_ms", self.blink.initial_open_ms)?;
        validate_range("blink.closed_ms", self.blink.closed_ms)?;
        validate_range("blink.open_ms", self.blink.open_ms)?;
        validate_nonempty("logging.filter", &self.logging.filter)?;
        Ok(())
    }
}

fn validate_nonempty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("{field} must not be empty")
    }
    Ok(())
}

fn validate_range(field: &str, [min, max]: [u64; 2]) -> Result<()> {
    if max == 0 {
        bail!("{field} must have a non-zero upper bound");
    }
    if min > max {
        bail!("{field} is inverted: {min} > {max}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[legacy]
base_path = "/srv/avatars"
file_extension = ".webp"
talking_suffix = "_talk"
silent_suffix = "_quiet"
default_emotion = "calm"

[animation]
group_interval_ms = 250
autostart = false

[blink]
initial_open_ms = [1000, 1500]
closed_ms = [80, 120]
open_ms = [1500, 4000]

[logging]
filter = "emg_agent=debug"
retention_days = 3
stderr = true
"#;

    #[test]
    fn parses_full_config() {
        let config = PlayerConfig::from_toml_str(FULL).unwrap();
        assert_eq!(config.legacy.base_path, "/srv/avatars");
        assert_eq!(config.legacy.file_extension, ".webp");
        assert_eq!(config.animation.group_interval_ms, 250);
        assert!(!config.animation.autostart);
        assert_eq!(config.blink.closed_ms, [80, 120]);
        assert_eq!(config.logging.retention_days, 3);
        assert!(config.logging.stderr);
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = PlayerConfig::from_toml_str("").unwrap();
        assert_eq!(config, PlayerConfig::default());
        assert_eq!(config.legacy.talking_suffix, "_open");
        assert_eq!(config.animation.group_interval_ms, 500);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = PlayerConfig::from_toml_str("[legacy]\ndefault_emotion = \"joy\"\n").unwrap();
        assert_eq!(config.legacy.default_emotion, "joy");
        assert_eq!(config.legacy.silent_suffix, "_closed");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = PlayerConfig::from_toml_str("[animation]\nspeed = 2\n")
            .unwrap_err()
            .to_string();
        assert!(err.contains("failed to parse player config TOML"));
    }

    #[test]
    fn zero_group_interval_is_rejected() {
        let raw = FULL.replace("group_interval_ms = 250", "group_interval_ms = 0");
        let err = PlayerConfig::from_toml_str(&raw).unwrap_err().to_string();
        assert!(err.contains("group_interval_ms must be greater than zero"));
    }

    #[test]
    fn inverted_blink_range_is_rejected() {
        let raw = FULL.replace("closed_ms = [80, 120]", "closed_ms = [300, 120]");
        let err = PlayerConfig::from_toml_str(&raw).unwrap_err().to_string();
        assert!(err.contains("blink.closed_ms is inverted"));
    }

    #[test]
    fn empty_base_path_is_rejected() {
        let raw = FULL.replace("base_path = \"/srv/avatars\"", "base_path = \"  \"");
        let err = PlayerConfig::from_toml_str(&raw).unwrap_err().to_string();
        assert!(err.contains("legacy.base_path must not be empty"));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("emg-config-test-definitely-missing.toml");
        let config = PlayerConfig::load_or_default(&path).unwrap();
        assert_eq!(config, PlayerConfig::default());
    }
}
