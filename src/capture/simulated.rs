//! Simulated multi-sensor device with an attached recorder
//!
//! Stands in for the vendor SDK: negotiates profiles against a fixed table, writes a
//! recording, and delivers frames from one thread per stream at the negotiated rate.

use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, info, instrument, trace, warn};

use crate::capture::device::{FrameCallback, Pipeline};
use crate::capture::frame::{Frame, FrameMetadata, Modality, PixelFormat, StreamProfile};
use crate::capture::stream::{StreamDeclaration, StreamRequest};
use crate::error::{CaptureError, CaptureResult};
use crate::pipeline::recorder::{BagWriter, RecordingStats};
use crate::Settings;

pub const START_OP: &str = "pipeline_start";
pub const STOP_OP: &str = "pipeline_stop";
pub const RECORD_OP: &str = "record_frame";

/// Frames buffered between producers and the recorder thread
const FRAME_QUEUE_DEPTH: usize = 256;

/// Profiles the simulated device offers; the first match for a request wins
pub const SUPPORTED_PROFILES: &[StreamProfile] = &[
    StreamProfile::video(Modality::Color, 960, 540, PixelFormat::Rgb8, 30),
    StreamProfile::video(Modality::Color, 1280, 720, PixelFormat::Rgb8, 30),
    StreamProfile::video(Modality::Color, 1280, 720, PixelFormat::Rgb8, 15),
    StreamProfile::video(Modality::Color, 640, 480, PixelFormat::Rgb8, 30),
    StreamProfile::video(Modality::Depth, 640, 480, PixelFormat::Z16, 30),
    StreamProfile::video(Modality::Depth, 1024, 768, PixelFormat::Z16, 30),
    StreamProfile::motion(Modality::Accel, 200),
    StreamProfile::motion(Modality::Accel, 100),
    StreamProfile::motion(Modality::Gyro, 200),
    StreamProfile::motion(Modality::Gyro, 400),
    StreamProfile::video(Modality::Confidence, 640, 480, PixelFormat::Raw8, 30),
];

/// Injected failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFault {
    /// `start` fails before anything is opened
    Disconnected,
    /// The recorder errors once this many frames have been written
    RecorderFailsAfter(u64),
}

impl FromStr for DeviceFault {
    type Err = CaptureError;

    /// `disconnected` or `recorder_fails_after:<frames>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || CaptureError::generic(format!("unknown simulated fault: {s}"));
        match s.split_once(':') {
            None if s == "disconnected" => Ok(DeviceFault::Disconnected),
            Some(("recorder_fails_after", frames)) => frames
                .trim()
                .parse()
                .map(DeviceFault::RecorderFailsAfter)
                .map_err(|_| unknown()),
            _ => Err(unknown()),
        }
    }
}

pub struct SimulatedDevice {
    name: String,
    profiles: Vec<StreamProfile>,
    fault: Option<DeviceFault>,
    streaming: AtomicBool,
}

pub struct SimulatedHandle {
    stop_tx: flume::Sender<()>,
    producers: Vec<JoinHandle<()>>,
    recorder: JoinHandle<io::Result<RecordingStats>>,
    fault: Arc<Mutex<Option<String>>>,
    output_path: PathBuf,
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new("Simulated D400+IMU")
    }
}

impl SimulatedDevice {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            profiles: SUPPORTED_PROFILES.to_vec(),
            fault: None,
            streaming: AtomicBool::new(false),
        }
    }

    pub fn with_fault(mut self, fault: DeviceFault) -> Self {
        self.fault = Some(fault);
        self
    }

    /// Device configured from `Settings::simulated_fault`
    pub fn from_settings(settings: &Settings) -> CaptureResult<Self> {
        let device = Self::default();
        match settings.simulated_fault.as_deref() {
            None | Some("") => Ok(device),
            Some(value) => Ok(device.with_fault(value.parse()?)),
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::SeqCst)
    }

    /// Negotiate one profile per request, or return the first unresolvable request
    pub fn resolve(
        &self,
        declaration: &StreamDeclaration,
    ) -> Result<Vec<StreamProfile>, StreamRequest> {
        declaration
            .streams()
            .iter()
            .map(|req| {
                self.profiles
                    .iter()
                    .find(|p| req.matches(p))
                    .copied()
                    .ok_or(*req)
            })
            .collect()
    }

    fn open(
        &self,
        declaration: &StreamDeclaration,
        callback: FrameCallback,
        args: &str,
    ) -> CaptureResult<SimulatedHandle> {
        if self.fault == Some(DeviceFault::Disconnected) {
            return Err(CaptureError::device(START_OP, args, "No device connected"));
        }

        let profiles = self.resolve(declaration).map_err(|req| {
            debug!("No profile satisfies {:?}", req);
            CaptureError::device(START_OP, args, "Couldn't resolve requests")
        })?;
        for profile in &profiles {
            debug!("Negotiated {}", profile);
        }

        let path = declaration.output_path();
        let writer = BagWriter::create(path, &profiles).map_err(|e| {
            CaptureError::generic(format!("failed to create {}: {}", path.display(), e))
        })?;

        let (stop_tx, stop_rx) = flume::bounded::<()>(1);
        let (frame_tx, frame_rx) = flume::bounded::<Frame>(FRAME_QUEUE_DEPTH);
        let fault = Arc::new(Mutex::new(None));
        let fail_after = match self.fault {
            Some(DeviceFault::RecorderFailsAfter(n)) => Some(n),
            _ => None,
        };

        let recorder = match spawn_recorder(writer, frame_rx, fail_after, Arc::clone(&fault)) {
            Ok(handle) => handle,
            Err(e) => {
                discard_recording(path);
                return Err(e.into());
            }
        };

        let epoch = Instant::now();
        let mut producers = Vec::with_capacity(profiles.len());
        for profile in profiles {
            let spawned = spawn_producer(
                profile,
                epoch,
                stop_rx.clone(),
                frame_tx.clone(),
                Arc::clone(&callback),
            );
            match spawned {
                Ok(handle) => producers.push(handle),
                Err(e) => {
                    drop(stop_tx);
                    drop(frame_tx);
                    for p in producers {
                        let _ = p.join();
                    }
                    let _ = recorder.join();
                    discard_recording(path);
                    return Err(CaptureError::generic(format!(
                        "failed to spawn {} stream: {}",
                        profile.modality, e
                    )));
                }
            }
        }

        Ok(SimulatedHandle {
            stop_tx,
            producers,
            recorder,
            fault,
            output_path: path.to_path_buf(),
        })
    }
}

impl Pipeline for SimulatedDevice {
    type Handle = SimulatedHandle;

    #[instrument(skip(self, declaration, callback), fields(device = %self.name))]
    fn start(
        &self,
        declaration: &StreamDeclaration,
        callback: FrameCallback,
    ) -> CaptureResult<SimulatedHandle> {
        let args = declaration.describe();
        if self
            .streaming
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(CaptureError::device(
                START_OP,
                args,
                "Device is already streaming",
            ));
        }

        match self.open(declaration, callback, &args) {
            Ok(handle) => {
                info!(
                    "Streaming {} streams to {}",
                    handle.producers.len(),
                    handle.output_path.display()
                );
                Ok(handle)
            }
            Err(e) => {
                self.streaming.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    fn check(&self, handle: &SimulatedHandle) -> CaptureResult<()> {
        let fault = handle
            .fault
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match fault {
            Some(message) => Err(CaptureError::device(
                RECORD_OP,
                handle.output_path.display().to_string(),
                message,
            )),
            None => Ok(()),
        }
    }

    #[instrument(skip_all, fields(device = %self.name))]
    fn stop(&self, handle: SimulatedHandle) -> CaptureResult<()> {
        let SimulatedHandle {
            stop_tx,
            producers,
            recorder,
            output_path,
            ..
        } = handle;

        // Disconnecting the stop channel wakes every producer at once
        drop(stop_tx);
        for producer in producers {
            if producer.join().is_err() {
                warn!("Producer thread panicked");
            }
        }

        let closed = recorder.join();
        self.streaming.store(false, Ordering::SeqCst);

        let args = output_path.display().to_string();
        match closed {
            Ok(Ok(stats)) => {
                info!(
                    "Recording closed: {} frames, {} bytes",
                    stats.frames, stats.bytes
                );
                Ok(())
            }
            Ok(Err(e)) => Err(CaptureError::device(STOP_OP, args, e.to_string())),
            Err(_) => Err(CaptureError::device(
                STOP_OP,
                args,
                "Recorder thread panicked",
            )),
        }
    }
}

fn spawn_recorder(
    mut writer: BagWriter,
    frames: flume::Receiver<Frame>,
    fail_after: Option<u64>,
    fault: Arc<Mutex<Option<String>>>,
) -> io::Result<JoinHandle<io::Result<RecordingStats>>> {
    thread::Builder::new()
        .name("sim-recorder".into())
        .spawn(move || match drain(&mut writer, &frames, fail_after) {
            Ok(()) => writer.finish(),
            Err(e) => {
                warn!("Recorder failed: {}", e);
                *fault.lock().unwrap_or_else(PoisonError::into_inner) = Some(e.to_string());
                Err(e)
            }
        })
}

/// Write until every producer has hung up
fn drain(
    writer: &mut BagWriter,
    frames: &flume::Receiver<Frame>,
    fail_after: Option<u64>,
) -> io::Result<()> {
    for frame in frames.iter() {
        if fail_after == Some(writer.frames_written()) {
            return Err(io::Error::other("simulated disk failure"));
        }
        writer.write_frame(&frame)?;
    }
    Ok(())
}

fn spawn_producer(
    profile: StreamProfile,
    epoch: Instant,
    stop: flume::Receiver<()>,
    frames: flume::Sender<Frame>,
    callback: FrameCallback,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("sim-{}", profile.modality))
        .spawn(move || {
            let period = profile.frame_period();
            let payload = synthetic_payload(&profile);
            let mut next_due = epoch + period;
            let mut sequence = 0u64;

            // Anything but a timeout means the stop sender is gone
            while let Err(flume::RecvTimeoutError::Timeout) = stop.recv_deadline(next_due) {
                sequence += 1;
                next_due += period;

                let now = Instant::now();
                let frame = Frame {
                    data: payload.clone(),
                    meta: Arc::new(FrameMetadata {
                        sequence,
                        profile,
                        device_timestamp: now - epoch,
                    }),
                    timestamp: now,
                };

                if frames.send(frame.clone()).is_err() {
                    trace!("Recorder gone, dropping {} frame {}", profile.modality, sequence);
                }
                callback(&frame);
            }

            debug!("{} producer stopped after {} frames", profile.modality, sequence);
        })
}

/// One scanline for video streams, one xyz sample for motion streams
fn synthetic_payload(profile: &StreamProfile) -> Bytes {
    let mut buf = BytesMut::new();
    match profile.modality {
        Modality::Accel => {
            buf.put_f32_le(0.0);
            buf.put_f32_le(0.0);
            buf.put_f32_le(9.81);
        }
        Modality::Gyro => {
            buf.put_f32_le(0.0);
            buf.put_f32_le(0.0);
            buf.put_f32_le(0.0);
        }
        _ => {
            let len = profile.width as usize * profile.format.bytes_per_pixel();
            buf.extend((0..len).map(|i| (i % 251) as u8));
        }
    }
    buf.freeze()
}

fn discard_recording(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        debug!("Could not remove {}: {}", path.display(), e);
    }
}
