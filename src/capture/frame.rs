use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Frame data with zero-copy semantics
#[derive(Clone)]
pub struct Frame {
    /// Immutable frame data - can be shared across threads without copying
    pub data: Bytes,

    /// Frame metadata
    pub meta: Arc<FrameMetadata>,

    /// Host arrival timestamp
    pub timestamp: Instant,
}

impl Frame {
    pub fn modality(&self) -> Modality {
        self.meta.profile.modality
    }
}

/// Frame metadata
#[derive(Debug, Clone)]
pub struct FrameMetadata {
    /// Per-stream sequence number, starting at 1
    pub sequence: u64,
    pub profile: StreamProfile,
    /// Device time since the pipeline started
    pub device_timestamp: Duration,
}

/// Sensor stream types the device exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Modality {
    Color,
    Depth,
    Accel,
    Gyro,
    Confidence,
}

impl Modality {
    pub const ALL: [Modality; 5] = [
        Modality::Color,
        Modality::Depth,
        Modality::Accel,
        Modality::Gyro,
        Modality::Confidence,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Modality::Color => "color",
            Modality::Depth => "depth",
            Modality::Accel => "accel",
            Modality::Gyro => "gyro",
            Modality::Confidence => "confidence",
        }
    }

    /// Container tag
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.get(tag as usize).copied()
    }

    pub fn is_motion(self) -> bool {
        matches!(self, Modality::Accel | Modality::Gyro)
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pixel formats we support
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit RGB
    Rgb8,
    /// 16-bit single-channel depth
    Z16,
    /// Three f32 axis samples
    MotionXyz32f,
    /// 8-bit single channel
    Raw8,
}

impl PixelFormat {
    const ALL: [PixelFormat; 4] = [
        PixelFormat::Rgb8,
        PixelFormat::Z16,
        PixelFormat::MotionXyz32f,
        PixelFormat::Raw8,
    ];

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Z16 => 2,
            PixelFormat::MotionXyz32f => 12,
            PixelFormat::Raw8 => 1,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.get(tag as usize).copied()
    }
}

/// Concrete stream configuration negotiated at pipeline start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamProfile {
    pub modality: Modality,
    /// Zero for motion streams
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub rate_hz: u32,
}

impl StreamProfile {
    pub const fn video(
        modality: Modality,
        width: u32,
        height: u32,
        format: PixelFormat,
        rate_hz: u32,
    ) -> Self {
        Self {
            modality,
            width,
            height,
            format,
            rate_hz,
        }
    }

    pub const fn motion(modality: Modality, rate_hz: u32) -> Self {
        Self {
            modality,
            width: 0,
            height: 0,
            format: PixelFormat::MotionXyz32f,
            rate_hz,
        }
    }

    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.rate_hz.max(1) as f64)
    }
}

impl fmt::Display for StreamProfile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.modality.is_motion() {
            write!(f, "{} {:?} @{}Hz", self.modality, self.format, self.rate_hz)
        } else {
            write!(
                f,
                "{} {}x{} {:?} @{}Hz",
                self.modality, self.width, self.height, self.format, self.rate_hz
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modality_tags_are_stable() {
        for modality in Modality::ALL {
            assert_eq!(Modality::from_tag(modality.tag()), Some(modality));
        }
        assert_eq!(Modality::from_tag(9), None);
        assert_eq!(PixelFormat::from_tag(PixelFormat::Z16.tag()), Some(PixelFormat::Z16));
    }

    #[test]
    fn profile_display() {
        let color = StreamProfile::video(Modality::Color, 960, 540, PixelFormat::Rgb8, 30);
        assert_eq!(color.to_string(), "color 960x540 Rgb8 @30Hz");
        let gyro = StreamProfile::motion(Modality::Gyro, 200);
        assert_eq!(gyro.to_string(), "gyro MotionXyz32f @200Hz");
        assert_eq!(gyro.frame_period(), Duration::from_millis(5));
    }
}
