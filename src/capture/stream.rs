//! Stream declarations: which sensors to open and where to record them

use std::path::{Path, PathBuf};

use crate::capture::frame::{Modality, PixelFormat, StreamProfile};
use crate::RecordingConfig;

/// One requested stream; `None` fields are left to the device default
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRequest {
    pub modality: Modality,
    pub resolution: Option<(u32, u32)>,
    pub format: Option<PixelFormat>,
    pub rate_hz: Option<u32>,
}

impl StreamRequest {
    /// Device-default format and rate
    pub fn any(modality: Modality) -> Self {
        Self {
            modality,
            resolution: None,
            format: None,
            rate_hz: None,
        }
    }

    pub fn video(
        modality: Modality,
        width: u32,
        height: u32,
        format: PixelFormat,
        rate_hz: u32,
    ) -> Self {
        Self {
            modality,
            resolution: Some((width, height)),
            format: Some(format),
            rate_hz: Some(rate_hz),
        }
    }

    pub fn matches(&self, profile: &StreamProfile) -> bool {
        self.modality == profile.modality
            && self
                .resolution
                .map_or(true, |(w, h)| w == profile.width && h == profile.height)
            && self.format.map_or(true, |f| f == profile.format)
            && self.rate_hz.map_or(true, |r| r == profile.rate_hz)
    }
}

/// Frozen set of stream requests bound to a record-to-file sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDeclaration {
    streams: Vec<StreamRequest>,
    output_path: PathBuf,
}

impl StreamDeclaration {
    pub fn builder() -> StreamDeclarationBuilder {
        StreamDeclarationBuilder::default()
    }

    /// The recorder's stream set: color, depth, accelerometer, gyroscope, confidence
    pub fn for_recording(config: &RecordingConfig) -> Self {
        Self::builder()
            .enable(StreamRequest::video(
                Modality::Color,
                960,
                540,
                PixelFormat::Rgb8,
                30,
            ))
            .enable(StreamRequest::video(
                Modality::Depth,
                640,
                480,
                PixelFormat::Z16,
                30,
            ))
            .enable(StreamRequest::any(Modality::Accel))
            .enable(StreamRequest::any(Modality::Gyro))
            .enable(StreamRequest::any(Modality::Confidence))
            .record_to_file(&config.output_path)
    }

    pub fn streams(&self) -> &[StreamRequest] {
        &self.streams
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn modalities(&self) -> impl Iterator<Item = Modality> + '_ {
        self.streams.iter().map(|s| s.modality)
    }

    /// Compact description used in device error arguments
    pub fn describe(&self) -> String {
        let names: Vec<&str> = self.modalities().map(Modality::name).collect();
        format!(
            "streams:{}, file:{}",
            names.join("|"),
            self.output_path.display()
        )
    }
}

#[derive(Debug, Default)]
pub struct StreamDeclarationBuilder {
    streams: Vec<StreamRequest>,
}

impl StreamDeclarationBuilder {
    /// Enable a stream; a second request for the same modality replaces the first
    pub fn enable(mut self, request: StreamRequest) -> Self {
        match self
            .streams
            .iter_mut()
            .find(|s| s.modality == request.modality)
        {
            Some(existing) => *existing = request,
            None => self.streams.push(request),
        }
        self
    }

    pub fn record_to_file(self, path: impl AsRef<Path>) -> StreamDeclaration {
        StreamDeclaration {
            streams: self.streams,
            output_path: path.as_ref().to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn config() -> RecordingConfig {
        RecordingConfig {
            duration_seconds: 5,
            output_path: PathBuf::from("session.bag"),
        }
    }

    #[test]
    fn recording_declares_exactly_five_distinct_modalities() {
        let decl = StreamDeclaration::for_recording(&config());
        let seen: HashSet<Modality> = decl.modalities().collect();
        let expected: HashSet<Modality> = Modality::ALL.into_iter().collect();
        assert_eq!(decl.streams().len(), 5);
        assert_eq!(seen, expected);
        assert_eq!(decl.output_path(), Path::new("session.bag"));
    }

    #[test]
    fn recording_pins_color_and_depth_profiles() {
        let decl = StreamDeclaration::for_recording(&config());
        let color = decl.streams()[0];
        assert_eq!(color.modality, Modality::Color);
        assert_eq!(color.resolution, Some((960, 540)));
        assert_eq!(color.format, Some(PixelFormat::Rgb8));
        assert_eq!(color.rate_hz, Some(30));

        let depth = decl.streams()[1];
        assert_eq!(depth.resolution, Some((640, 480)));
        assert_eq!(depth.format, Some(PixelFormat::Z16));

        for motion in &decl.streams()[2..] {
            assert_eq!(motion.resolution, None);
            assert_eq!(motion.rate_hz, None);
        }
    }

    #[test]
    fn re_enabling_replaces_in_place() {
        let decl = StreamDeclaration::builder()
            .enable(StreamRequest::any(Modality::Color))
            .enable(StreamRequest::any(Modality::Gyro))
            .enable(StreamRequest::video(
                Modality::Color,
                1280,
                720,
                PixelFormat::Rgb8,
                15,
            ))
            .record_to_file("x.bag");

        assert_eq!(decl.streams().len(), 2);
        assert_eq!(decl.streams()[0].resolution, Some((1280, 720)));
        assert_eq!(decl.streams()[1].modality, Modality::Gyro);
    }

    #[test]
    fn request_matching_ignores_unset_fields() {
        let profile = StreamProfile::motion(Modality::Accel, 200);
        assert!(StreamRequest::any(Modality::Accel).matches(&profile));
        assert!(!StreamRequest::any(Modality::Gyro).matches(&profile));

        let mut pinned = StreamRequest::any(Modality::Accel);
        pinned.rate_hz = Some(100);
        assert!(!pinned.matches(&profile));
    }

    #[test]
    fn describe_lists_streams_and_file() {
        let decl = StreamDeclaration::for_recording(&config());
        assert_eq!(
            decl.describe(),
            "streams:color|depth|accel|gyro|confidence, file:session.bag"
        );
    }
}
