//! Frame counters.

use crate::Error;

/// Counts what happened to the frames seen by a [`HanParser`](crate::HanParser).
///
/// A frame is counted as received once the assembler is done with it, either
/// because it completed or because it was dropped. Every received frame is
/// then either decoded or rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Statistics {
    /// Frames completed or dropped by the assembler.
    pub frames_received: u64,
    /// Frames that produced a measurement.
    pub frames_decoded: u64,
    /// Frames dropped for any reason.
    pub frames_rejected: u64,
    /// Header check sequence mismatches.
    pub hcs_errors: u64,
    /// Frame check sequence mismatches, tolerated ones included.
    pub fcs_errors: u64,
    /// Frames dropped while assembling, HCS and FCS errors included.
    pub framing_errors: u64,
    /// Complete frames whose content could not be decoded.
    pub decode_errors: u64,
    /// Times a meter dialect was detected from scratch.
    pub dialect_detections: u64,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets all counters to zero.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn increment_frames_received(&mut self) {
        self.frames_received += 1;
    }

    pub fn increment_frames_decoded(&mut self) {
        self.frames_decoded += 1;
    }

    pub fn increment_fcs_errors(&mut self) {
        self.fcs_errors += 1;
    }

    pub fn increment_dialect_detections(&mut self) {
        self.dialect_detections += 1;
    }

    /// Counts a dropped frame under its cause.
    pub fn record_error(&mut self, error: &Error) {
        self.frames_rejected += 1;

        match error {
            Error::HcsMismatch => self.hcs_errors += 1,
            Error::FcsMismatch => self.fcs_errors += 1,
            _ => {}
        }

        if error.is_framing() {
            self.framing_errors += 1;
        } else {
            self.decode_errors += 1;
        }
    }

    /// Percentage of received frames that were rejected, 0.0 before the first
    /// frame.
    pub fn error_rate(&self) -> f64 {
        if self.frames_received == 0 {
            0.0
        } else {
            (self.frames_rejected as f64 / self.frames_received as f64) * 100.0
        }
    }
}
