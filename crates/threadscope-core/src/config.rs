//! Carrier configuration

use std::fmt;
use std::str::FromStr;

use crate::ConfigError;

/// Environment variable selecting the [`CaptureMode`]
pub const CAPTURE_ENV: &str = "THREADSCOPE_CAPTURE";
/// Environment variable capping the number of retained frames
pub const MAX_FRAMES_ENV: &str = "THREADSCOPE_MAX_FRAMES";

/// How much of the call stack is recorded when a value is provided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CaptureMode {
    /// Exact call site plus a backtrace, symbolized on first use
    #[default]
    Full,
    /// Exact call site only
    CallSite,
}

impl CaptureMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureMode::Full => "full",
            CaptureMode::CallSite => "call-site",
        }
    }
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaptureMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(CaptureMode::Full),
            "call-site" | "callsite" | "call_site" => Ok(CaptureMode::CallSite),
            other => Err(ConfigError::UnknownCaptureMode(other.to_string())),
        }
    }
}

/// Carrier configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CarrierConfig {
    /// What to record on provide
    pub capture: CaptureMode,
    /// Maximum number of backtrace frames kept (`None` keeps all)
    pub max_frames: Option<usize>,
}

impl Default for CarrierConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl CarrierConfig {
    /// The default configuration, usable in `const` context
    pub const fn standard() -> Self {
        CarrierConfig {
            capture: CaptureMode::Full,
            max_frames: Some(64),
        }
    }

    /// Configuration that records only the call site
    pub const fn call_site_only() -> Self {
        CarrierConfig {
            capture: CaptureMode::CallSite,
            max_frames: None,
        }
    }

    /// Build a configuration from `THREADSCOPE_CAPTURE` and
    /// `THREADSCOPE_MAX_FRAMES`, falling back to defaults for unset variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`CarrierConfig::from_env`] with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = CarrierConfig::default();

        if let Some(mode) = lookup(CAPTURE_ENV) {
            config.capture = mode.parse()?;
        }

        if let Some(raw) = lookup(MAX_FRAMES_ENV) {
            let trimmed = raw.trim();
            config.max_frames = match trimmed {
                "" | "none" | "unlimited" => None,
                n => Some(n.parse().map_err(|_| ConfigError::InvalidValue {
                    var: MAX_FRAMES_ENV,
                    value: raw.clone(),
                })?),
            };
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = CarrierConfig::default();
        assert_eq!(config.capture, CaptureMode::Full);
        assert_eq!(config.max_frames, Some(64));
    }

    #[test]
    fn test_capture_mode_parse() {
        assert_eq!("full".parse::<CaptureMode>(), Ok(CaptureMode::Full));
        assert_eq!(" Call-Site ".parse::<CaptureMode>(), Ok(CaptureMode::CallSite));
        assert_eq!("callsite".parse::<CaptureMode>(), Ok(CaptureMode::CallSite));
        assert!("verbose".parse::<CaptureMode>().is_err());
    }

    #[test]
    fn test_capture_mode_display_roundtrip() {
        for mode in [CaptureMode::Full, CaptureMode::CallSite] {
            assert_eq!(mode.to_string().parse::<CaptureMode>(), Ok(mode));
        }
    }

    #[test]
    fn test_from_lookup_empty_is_default() {
        let config = CarrierConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, CarrierConfig::default());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = CarrierConfig::from_lookup(lookup(&[
            (CAPTURE_ENV, "call-site"),
            (MAX_FRAMES_ENV, "8"),
        ]))
        .unwrap();
        assert_eq!(config.capture, CaptureMode::CallSite);
        assert_eq!(config.max_frames, Some(8));

        let config = CarrierConfig::from_lookup(lookup(&[(MAX_FRAMES_ENV, "unlimited")])).unwrap();
        assert_eq!(config.max_frames, None);
    }

    // The only test in this crate that touches the process environment.
    #[test]
    fn test_from_env_reads_variables() {
        std::env::set_var(CAPTURE_ENV, "call_site");
        std::env::set_var(MAX_FRAMES_ENV, "12");
        let config = CarrierConfig::from_env();

        std::env::set_var(MAX_FRAMES_ENV, "twelve");
        let invalid = CarrierConfig::from_env();

        std::env::remove_var(CAPTURE_ENV);
        std::env::remove_var(MAX_FRAMES_ENV);
        let unset = CarrierConfig::from_env();

        assert_eq!(
            config,
            Ok(CarrierConfig {
                capture: CaptureMode::CallSite,
                max_frames: Some(12),
            })
        );
        assert!(matches!(invalid, Err(ConfigError::InvalidValue { var: MAX_FRAMES_ENV, .. })));
        assert_eq!(unset, Ok(CarrierConfig::default()));
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = CarrierConfig::from_lookup(lookup(&[(MAX_FRAMES_ENV, "lots")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                var: MAX_FRAMES_ENV,
                value: "lots".to_string(),
            }
        );

        let err = CarrierConfig::from_lookup(lookup(&[(CAPTURE_ENV, "everything")])).unwrap_err();
        assert_eq!(err, ConfigError::UnknownCaptureMode("everything".to_string()));
    }
}
