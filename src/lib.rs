pub mod capture;
pub mod error;
pub mod pipeline;
pub mod session;
pub mod utils;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use capture::{Frame, Modality, Pipeline, PixelFormat, SimulatedDevice, StreamDeclaration};
pub use error::{CaptureError, CaptureResult};
pub use session::{record, CancelToken, CaptureSession, SessionState, SessionSummary};

/// Settings file looked up in the working directory when `--config` is not given
pub const SETTINGS_FILE: &str = "roshi";

/// Prefix for environment overrides, e.g. `ROSHI_POLL_INTERVAL_MS=5`
pub const ENV_PREFIX: &str = "ROSHI";

/// Tunables shared by the resolver and the session controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub file_prefix: String,
    pub file_extension: String,
    pub default_duration_secs: i64,
    pub poll_interval_ms: u64,
    /// Fault injected into the simulated device: `disconnected`, `recorder_fails_after:<n>`
    #[serde(default)]
    pub simulated_fault: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            file_prefix: "roshi".into(),
            file_extension: "bag".into(),
            default_duration_secs: 60,
            poll_interval_ms: 10,
            simulated_fault: None,
        }
    }
}

impl Settings {
    /// Layer defaults, the settings file and `ROSHI_*` environment variables.
    ///
    /// An explicit `path` must exist; the implicit `roshi.toml` is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(SETTINGS_FILE).required(false),
        };

        config::Config::builder()
            .add_source(config::Config::try_from(&Settings::default())?)
            .add_source(file)
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Resolved invocation: how long to record and where to put the recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingConfig {
    /// Recording budget; zero or negative ends the session right after start
    pub duration_seconds: i64,
    pub output_path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_recorder_conventions() {
        let settings = Settings::default();
        assert_eq!(settings.file_prefix, "roshi");
        assert_eq!(settings.file_extension, "bag");
        assert_eq!(settings.default_duration_secs, 60);
        assert_eq!(settings.poll_interval(), Duration::from_millis(10));
        assert_eq!(settings.simulated_fault, None);
    }

    #[test]
    fn settings_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "file_prefix = \"lab\"\npoll_interval_ms = 5").unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.file_prefix, "lab");
        assert_eq!(settings.poll_interval_ms, 5);
        assert_eq!(settings.file_extension, "bag");
        assert_eq!(settings.default_duration_secs, 60);
        assert_eq!(settings.simulated_fault, None);
    }

    #[test]
    fn settings_file_selects_simulated_fault() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "simulated_fault = \"disconnected\"").unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.simulated_fault.as_deref(), Some("disconnected"));
    }

    #[test]
    fn explicit_settings_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(Settings::load(Some(&missing)).is_err());
    }
}
