use std::path::PathBuf;

use chrono::{DateTime, Local};
use tracing::debug;

use crate::{RecordingConfig, Settings};

/// Source of local wall-clock time for default filenames
pub trait Clock {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// `<prefix>_<YYYYMMDD>_<HHMMSS>.<ext>` for the given local time
pub fn default_output_path(settings: &Settings, at: DateTime<Local>) -> PathBuf {
    PathBuf::from(format!(
        "{}_{}.{}",
        settings.file_prefix,
        at.format("%Y%m%d_%H%M%S"),
        settings.file_extension
    ))
}

/// Fill in whatever the invocation left out. The clock is read here, not at session start.
pub fn resolve_recording_config(
    duration_seconds: Option<i64>,
    output_path: Option<PathBuf>,
    settings: &Settings,
    clock: &impl Clock,
) -> RecordingConfig {
    let output_path = output_path.unwrap_or_else(|| default_output_path(settings, clock.now()));
    let duration_seconds = duration_seconds.unwrap_or(settings.default_duration_secs);
    debug!(
        "Resolved recording: {}s -> {}",
        duration_seconds,
        output_path.display()
    );

    RecordingConfig {
        duration_seconds,
        output_path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct FixedClock(DateTime<Local>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Local> {
            self.0
        }
    }

    fn clock() -> FixedClock {
        FixedClock(Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap())
    }

    #[test]
    fn defaults_use_clock_and_sixty_seconds() {
        let config = resolve_recording_config(None, None, &Settings::default(), &clock());
        assert_eq!(config.duration_seconds, 60);
        assert_eq!(config.output_path, PathBuf::from("roshi_20240307_090502.bag"));
    }

    #[test]
    fn overrides_win() {
        let config = resolve_recording_config(
            Some(2),
            Some(PathBuf::from("test.bag")),
            &Settings::default(),
            &clock(),
        );
        assert_eq!(config.duration_seconds, 2);
        assert_eq!(config.output_path, PathBuf::from("test.bag"));
    }

    #[test]
    fn non_positive_durations_pass_through() {
        let settings = Settings::default();
        assert_eq!(
            resolve_recording_config(Some(0), None, &settings, &clock()).duration_seconds,
            0
        );
        assert_eq!(
            resolve_recording_config(Some(-3), None, &settings, &clock()).duration_seconds,
            -3
        );
    }

    #[test]
    fn naming_follows_settings() {
        let settings = Settings {
            file_prefix: "lab".into(),
            file_extension: "rec".into(),
            ..Settings::default()
        };
        assert_eq!(
            default_output_path(&settings, clock().0),
            PathBuf::from("lab_20240307_090502.rec")
        );
    }
}
