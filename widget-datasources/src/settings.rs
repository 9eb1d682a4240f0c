use crate::query::WindowConvention;
use chrono::{FixedOffset, Offset, Utc};
use config::{Config, File};
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: i32 = 86_400;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Upper bound on the number of samples a derived precision may produce.
    pub max_samples: u32,
    /// Offset of the dashboard's local time, used for calendar ranges
    /// (`today`, `yesterday`) and for rendering timestamps.
    pub utc_offset_seconds: i32,
    pub timestamp_format: String,
    /// Decimal places kept when rendering aggregate values.
    pub decimals: u32,
    pub default_window_convention: WindowConvention,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_samples: 720,
            utc_offset_seconds: 8 * 3600,
            timestamp_format: "%Y-%m-%d %H:%M:%S".to_owned(),
            decimals: 2,
            default_window_convention: WindowConvention::Combined,
        }
    }
}

impl Settings {
    pub const ENV_PREFIX: &'static str = "DATASOURCES";

    /// Read an optional config file (path in `DATASOURCES__CONFIG`) and
    /// override it with `DATASOURCES__*` environment variables.
    pub fn new() -> anyhow::Result<Self> {
        let config_path = std::env::var(format!("{}__CONFIG", Self::ENV_PREFIX));

        let mut builder = Config::builder();
        if let Ok(config_path) = config_path {
            builder = builder.add_source(File::with_name(&config_path));
        };
        // Use `__` so that it would be possible to address keys with underscores in names (e.g. `max_samples`)
        builder = builder.add_source(
            config::Environment::with_prefix(Self::ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_samples == 0 {
            anyhow::bail!("max_samples must be positive");
        }
        if self.utc_offset_seconds.abs() >= SECONDS_PER_DAY {
            anyhow::bail!(
                "utc_offset_seconds must be within a day, got {}",
                self.utc_offset_seconds
            );
        }
        Ok(())
    }

    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_seconds).unwrap_or_else(|| {
            tracing::warn!(
                offset = self.utc_offset_seconds,
                "invalid utc offset, falling back to UTC"
            );
            Utc.fix()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert_eq!(settings.utc_offset().local_minus_utc(), 8 * 3600);
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let settings: Settings = serde_json::from_value(serde_json::json!({
            "max_samples": 100,
            "default_window_convention": "split",
        }))
        .unwrap();
        assert_eq!(settings.max_samples, 100);
        assert_eq!(settings.default_window_convention, WindowConvention::Split);
        assert_eq!(settings.decimals, 2);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<Settings, _> =
            serde_json::from_value(serde_json::json!({ "max_sample": 100 }));
        assert!(result.is_err());
    }

    #[test]
    fn invalid_values_fail_validation() {
        let settings = Settings {
            max_samples: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        let settings = Settings {
            utc_offset_seconds: 90_000,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }
}
