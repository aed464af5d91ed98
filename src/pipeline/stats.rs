//! Lock-free per-stream frame counters

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::utils::CachePadded;

use crate::capture::Modality;

/// Frame counters updated from producer threads
///
/// Each modality gets its own cache line so concurrent streams don't contend.
#[derive(Default)]
pub struct FrameStats {
    frames: [CachePadded<AtomicU64>; 5],
}

impl FrameStats {
    pub fn record(&self, modality: Modality) {
        self.frames[modality.index()].fetch_add(1, Ordering::Relaxed);
        metrics::counter!("roshi_frames_total", "stream" => modality.name()).increment(1);
    }

    pub fn snapshot(&self) -> StreamCounts {
        let mut counts = StreamCounts::default();
        for modality in Modality::ALL {
            counts.0[modality.index()] = self.frames[modality.index()].load(Ordering::Relaxed);
        }
        counts
    }
}

/// Point-in-time frame counts per modality
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamCounts([u64; 5]);

impl StreamCounts {
    pub fn get(&self, modality: Modality) -> u64 {
        self.0[modality.index()]
    }

    pub fn add(&mut self, modality: Modality) {
        self.0[modality.index()] += 1;
    }

    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }
}

impl fmt::Display for StreamCounts {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for modality in Modality::ALL {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            write!(f, "{}={}", modality, self.get(modality))?;
        }
        Ok(())
    }
}
