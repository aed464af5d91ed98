//! Rate-limited progress line shared with device threads

use std::io::Write;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

/// Minimum spacing between two progress lines
pub const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Console progress for a recording session.
///
/// All state lives behind one lock and is only touched through `report_if_due` and
/// `finish`, so callbacks on any number of device threads can share it.
pub struct ProgressReporter {
    state: Mutex<ReporterState>,
}

struct ReporterState {
    session_start: Option<Instant>,
    last_report: Option<Instant>,
    last_bucket: Option<u64>,
    reports: u64,
    out: Box<dyn Write + Send>,
}

impl ProgressReporter {
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            state: Mutex::new(ReporterState {
                session_start: None,
                last_report: None,
                last_bucket: None,
                reports: 0,
                out: Box::new(out),
            }),
        }
    }

    /// Print `Recording t = <s>s` if a second has passed since the last line.
    ///
    /// The first call marks the session start. Returns the whole seconds reported.
    pub fn report_if_due(&self, now: Instant) -> Option<u64> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let start = *state.session_start.get_or_insert(now);
        let last = *state.last_report.get_or_insert(now);
        if now.saturating_duration_since(last) < REPORT_INTERVAL {
            return None;
        }

        let bucket = now.saturating_duration_since(start).as_secs();
        if state.last_bucket.is_some_and(|b| bucket <= b) {
            return None;
        }

        // Whole seconds: the line only changes once per bucket
        if let Err(e) = write!(state.out, "\rRecording t = {}s", bucket).and_then(|_| state.out.flush()) {
            debug!("Progress write failed: {}", e);
        }
        state.last_report = Some(now);
        state.last_bucket = Some(bucket);
        state.reports += 1;
        Some(bucket)
    }

    /// Terminate the progress line with the completion message
    pub fn finish(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(state.out, "\nFinished").and_then(|_| state.out.flush()) {
            debug!("Progress write failed: {}", e);
        }
    }

    pub fn reports(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn first_report_after_one_second() {
        let out = Captured::default();
        let reporter = ProgressReporter::new(out.clone());
        let t0 = Instant::now();

        assert_eq!(reporter.report_if_due(t0), None);
        assert_eq!(reporter.report_if_due(t0 + ms(500)), None);
        assert_eq!(reporter.report_if_due(t0 + ms(999)), None);
        assert_eq!(reporter.report_if_due(t0 + ms(1000)), Some(1));
        assert_eq!(out.text(), "\rRecording t = 1s");
    }

    #[test]
    fn one_report_per_second_bucket() {
        let out = Captured::default();
        let reporter = ProgressReporter::new(out.clone());
        let t0 = Instant::now();
        reporter.report_if_due(t0);

        let mut reported = Vec::new();
        for step in 1..=450 {
            if let Some(secs) = reporter.report_if_due(t0 + ms(step * 10)) {
                reported.push(secs);
            }
        }
        assert_eq!(reported, vec![1, 2, 3, 4]);
        assert_eq!(reporter.reports(), 4);
        assert!(out.text().ends_with("\rRecording t = 4s"));
    }

    #[test]
    fn late_report_skips_bucket_without_going_backward() {
        let reporter = ProgressReporter::new(Captured::default());
        let t0 = Instant::now();
        reporter.report_if_due(t0);

        assert_eq!(reporter.report_if_due(t0 + ms(1900)), Some(1));
        // spacing is measured from the late report
        assert_eq!(reporter.report_if_due(t0 + ms(2500)), None);
        assert_eq!(reporter.report_if_due(t0 + ms(2900)), Some(2));
        assert_eq!(reporter.report_if_due(t0 + ms(4100)), Some(4));
    }

    #[test]
    fn out_of_order_timestamps_are_ignored() {
        let reporter = ProgressReporter::new(Captured::default());
        let t0 = Instant::now();
        reporter.report_if_due(t0 + ms(100));
        assert_eq!(reporter.report_if_due(t0), None);
        assert_eq!(reporter.report_if_due(t0 + ms(1100)), Some(1));
        assert_eq!(reporter.report_if_due(t0 + ms(1050)), None);
    }

    #[test]
    fn concurrent_callers_never_duplicate_a_bucket() {
        let out = Captured::default();
        let reporter = Arc::new(ProgressReporter::new(out.clone()));
        let t0 = Instant::now();
        reporter.report_if_due(t0);

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let reporter = Arc::clone(&reporter);
                std::thread::spawn(move || {
                    (1..=300)
                        .filter_map(|step| reporter.report_if_due(t0 + ms(step * 10)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all: Vec<u64> = workers
            .into_iter()
            .flat_map(|w| w.join().unwrap())
            .collect();
        all.sort_unstable();
        let before = all.len();
        all.dedup();
        assert_eq!(before, all.len());
        assert_eq!(out.text().matches("Recording").count(), all.len());
    }

    #[test]
    fn finish_terminates_line() {
        let out = Captured::default();
        let reporter = ProgressReporter::new(out.clone());
        reporter.finish();
        assert_eq!(out.text(), "\nFinished\n");
    }

    #[test]
    fn write_errors_are_contained() {
        let reporter = ProgressReporter::new(Broken);
        let t0 = Instant::now();
        reporter.report_if_due(t0);
        assert_eq!(reporter.report_if_due(t0 + ms(1000)), Some(1));
        reporter.finish();
    }
}
