//! Half-cycle timing classification for the AFSK-style line code.
//!
//! A logical bit is two consecutive half-cycles of the same electrical
//! state; the classifier turns raw edge timestamps into `BitEvent`s by
//! measuring each inter-edge interval against the active profile's
//! timing windows.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{BitEvent, ErrorTag};
use crate::Span;

/// Lowest sample rate at which the narrowest timing window is still
/// resolvable.
pub const MIN_SAMPLE_RATE: u32 = 16_000;

const BLASTER_ACTIVE_US: f64 = 125.0;
const BLASTER_INACTIVE_US: f64 = 250.0;
const BLASTER_MARGIN_US: f64 = 62.5;

const SMARTDEVICE_ACTIVE_US: f64 = 113.0;
const SMARTDEVICE_INACTIVE_US: f64 = 227.0;
const SMARTDEVICE_MARGIN_US: f64 = 56.5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("sample rate {sample_rate} Hz is below the 16000 Hz decodable minimum")]
    SampleRateTooLow { sample_rate: u32 },
}

/// Known hardware variants with fixed protocol timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceProfile {
    Blaster,
    SmartDevice,
}

impl DeviceProfile {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceProfile::Blaster => "blaster",
            DeviceProfile::SmartDevice => "smartdevice",
        }
    }

    /// Derive sample-tick timings for this profile at `sample_rate` Hz.
    pub fn timing(self, sample_rate: u32) -> Result<ProfileTiming, ConfigError> {
        if sample_rate < MIN_SAMPLE_RATE {
            return Err(ConfigError::SampleRateTooLow { sample_rate });
        }
        let (active_us, inactive_us, margin_us) = match self {
            DeviceProfile::Blaster => (BLASTER_ACTIVE_US, BLASTER_INACTIVE_US, BLASTER_MARGIN_US),
            DeviceProfile::SmartDevice => (
                SMARTDEVICE_ACTIVE_US,
                SMARTDEVICE_INACTIVE_US,
                SMARTDEVICE_MARGIN_US,
            ),
        };
        Ok(ProfileTiming {
            active_half_cycle: us_to_samples(sample_rate, active_us),
            inactive_half_cycle: us_to_samples(sample_rate, inactive_us),
            // At the minimum rate the margin can truncate to zero, which
            // would leave both windows empty; one tick is the floor.
            margin: us_to_samples(sample_rate, margin_us).max(1),
        })
    }
}

/// Expected half-cycle durations and tolerance, in sample ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileTiming {
    pub active_half_cycle: u64,
    pub inactive_half_cycle: u64,
    pub margin: u64,
}

fn us_to_samples(sample_rate: u32, micros: f64) -> u64 {
    (f64::from(sample_rate) * (micros / 1_000_000.0)) as u64
}

/// Classification of one inter-edge interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalfCycleKind {
    Active,
    Inactive,
    Error,
}

#[derive(Debug, Clone, Copy)]
struct PendingHalfCycle {
    kind: HalfCycleKind,
    start: u64,
}

/// Converts edge timestamps into classified bits.
///
/// Owns the pairing state: the previous edge and, when one half-cycle of
/// a pair has been seen, its kind and start sample.
#[derive(Debug)]
pub struct EdgeClassifier {
    timing: ProfileTiming,
    last_edge: Option<u64>,
    pending: Option<PendingHalfCycle>,
}

impl EdgeClassifier {
    /// Validates the sample rate once, before any edge is observed.
    pub fn new(profile: DeviceProfile, sample_rate: u32) -> Result<Self, ConfigError> {
        Ok(Self {
            timing: profile.timing(sample_rate)?,
            last_edge: None,
            pending: None,
        })
    }

    pub fn timing(&self) -> ProfileTiming {
        self.timing
    }

    /// Classify one interval length against the profile windows.
    ///
    /// The inactive window is tested first; both windows are half-open
    /// `[center - margin, center + margin)`.
    pub fn classify_interval(&self, length: u64) -> HalfCycleKind {
        if in_window(length, self.timing.inactive_half_cycle, self.timing.margin) {
            HalfCycleKind::Inactive
        } else if in_window(length, self.timing.active_half_cycle, self.timing.margin) {
            HalfCycleKind::Active
        } else {
            HalfCycleKind::Error
        }
    }

    /// Observe the next edge; returns a bit when a same-kind half-cycle
    /// pair completes, an error event on unmatched timing, or nothing.
    pub fn observe_edge(&mut self, sample: u64) -> Option<BitEvent> {
        let previous = self.last_edge.replace(sample)?;
        let length = sample.saturating_sub(previous);
        match self.classify_interval(length) {
            HalfCycleKind::Error => {
                // An unmatched cycle invalidates the pending pair.
                self.pending = None;
                Some(BitEvent::error(Span::new(previous, sample), ErrorTag::Invalid))
            }
            kind => match self.pending.take() {
                Some(pending) if pending.kind == kind => {
                    let value = if kind == HalfCycleKind::Active { 0 } else { 1 };
                    Some(BitEvent::bit(Span::new(pending.start, sample), value))
                }
                // A lone half-cycle is not an error, only deferred: it
                // becomes the pending half of the next pair.
                _ => {
                    self.pending = Some(PendingHalfCycle { kind, start: previous });
                    None
                }
            },
        }
    }
}

fn in_window(length: u64, center: u64, margin: u64) -> bool {
    length >= center.saturating_sub(margin) && length < center + margin
}
