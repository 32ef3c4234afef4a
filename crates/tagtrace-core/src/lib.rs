//! Tagtrace core library for offline LTAR SmartDevice decoding.
//!
//! This crate implements the decode pipeline used by the CLI: capture
//! sources (edge timestamps or pre-classified bits) feed a three-layer
//! decoder — timing-based bit classification, a bit/frame/block state
//! machine, and block-level semantic checks — which emits labeled spans
//! into an annotation sink and aggregates them into a deterministic
//! report. Decoding is synchronous and side-effect free; all I/O is
//! isolated in `source` modules.
//!
//! Invariants:
//! - Report outputs are deterministic and ordered by input arrival.
//! - Protocol errors never abort a run; they are recorded as annotations
//!   and the framer resynchronizes at the next start bit.
//! - Only a bad configuration (unusable sample rate) or broken input
//!   (I/O, malformed capture line) fails the run.
//!
//! # Examples
//! ```
//! use tagtrace_core::{BitEvent, DeviceProfile, Span, decode_bits};
//!
//! // One frame: start bit, eight data bits (LSB first), stop bit.
//! let bits: Vec<BitEvent> = [0, 0, 1, 0, 0, 0, 0, 0, 0, 1]
//!     .iter()
//!     .enumerate()
//!     .map(|(i, &v)| BitEvent::bit(Span::new(i as u64 * 10, i as u64 * 10 + 10), v))
//!     .collect();
//!
//! let report = decode_bits(bits.into_iter(), DeviceProfile::Blaster)?;
//! assert_eq!(report.summary.frames_total, 1);
//! # Ok::<(), tagtrace_core::DecodeError>(())
//! ```

use serde::{Deserialize, Serialize};

mod decode;
mod protocol;
mod source;

pub use decode::{
    DecodeError, DecodeMode, decode_bit_file, decode_bits, decode_edge_file, decode_edges,
};
pub use protocol::{
    BLOCK_TYPE_TAGGER_STATUS, BitEvent, BitFramer, Block, ConfigError, DeviceProfile,
    EdgeClassifier, ErrorTag, Frame, HalfCycleKind, MIN_SAMPLE_RATE, ProfileTiming,
    TAGGER_STATUS_FRAME_COUNT, block_type_name, decode_block,
};
pub use source::{BitFileSource, BitSource, EdgeFileSource, EdgeSource, SourceError};

/// Current report schema version.
pub const REPORT_VERSION: u32 = 1;
/// Default timestamp used when the caller does not stamp the report.
pub const DEFAULT_GENERATED_AT: &str = "1970-01-01T00:00:00Z";

/// Half-open interval of sample indices covered by a decoded item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Span {
    pub start: u64,
    pub end: u64,
}

impl Span {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }
}

/// One labeled span emitted by the decoder.
///
/// `labels` holds alternative renderings of the same annotation in
/// decreasing length; a display host picks the longest that fits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// First sample covered by the annotation.
    pub start: u64,
    /// One past the last sample covered by the annotation.
    pub end: u64,
    /// Annotation category.
    pub kind: AnnotationKind,
    /// Label strings, longest first.
    pub labels: Vec<String>,
}

impl Annotation {
    pub fn new(span: Span, kind: AnnotationKind, labels: Vec<String>) -> Self {
        Self {
            start: span.start,
            end: span.end,
            kind,
            labels,
        }
    }
}

/// Annotation categories, one per decode-layer output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnnotationKind {
    /// A classified logical bit, raw-edge mode only.
    BitRaw,
    BitStart,
    BitData,
    BitStop,
    BitSpacer,
    BitBlockEnd,
    /// A completed data frame with its byte value.
    Frame,
    /// A frame that failed to see a valid stop bit.
    FramingError,
    /// Signal-level error; all in-progress decodes were abandoned.
    DecodeAbort,
    /// A sealed block with its frame count.
    Block,
    /// A block discarded because a frame inside it failed framing.
    BlockError,
    BlockType,
    BlockTypeName,
    UnknownBlockType,
    PayloadByte,
    ChecksumField,
    ChecksumValid,
    BlockLengthError,
    BlockChecksumError,
}

impl AnnotationKind {
    /// True for categories that report a protocol error.
    pub fn is_error(self) -> bool {
        matches!(
            self,
            AnnotationKind::FramingError
                | AnnotationKind::DecodeAbort
                | AnnotationKind::BlockError
                | AnnotationKind::BlockLengthError
                | AnnotationKind::BlockChecksumError
        )
    }
}

/// Receiver for decoder annotations.
///
/// The pipeline drives one sink per run; `Vec<Annotation>` is the
/// built-in aggregating sink.
pub trait AnnotationSink {
    fn annotate(&mut self, annotation: Annotation);
}

impl AnnotationSink for Vec<Annotation> {
    fn annotate(&mut self, annotation: Annotation) {
        self.push(annotation);
    }
}

/// Aggregated decode report with deterministic ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Report schema version (not the binary version).
    pub report_version: u32,
    /// Tool identification metadata.
    pub tool: ToolInfo,
    /// RFC3339 timestamp representing the report generation time.
    pub generated_at: String,
    /// Input capture metadata.
    pub input: InputInfo,
    /// Decode configuration used for this run.
    pub config: DecodeConfig,
    /// Counters derived from the annotation stream.
    pub summary: DecodeSummary,
    /// Labeled spans in emission order.
    pub annotations: Vec<Annotation>,
}

/// Tool metadata embedded in reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool name (e.g., "tagtrace").
    pub name: String,
    /// Tool version (semver).
    pub version: String,
}

/// Input capture metadata embedded in reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputInfo {
    /// Input path as provided to the decoder.
    pub path: String,
    /// Input size in bytes.
    pub bytes: u64,
}

/// Decode configuration embedded in reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodeConfig {
    /// Input interpretation: raw edges or pre-classified bits.
    pub mode: DecodeMode,
    /// Device timing profile.
    pub profile: DeviceProfile,
    /// Capture sample rate in Hz; absent in bit mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
}

/// Counters summarizing one decode run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecodeSummary {
    /// Logical bits consumed by the framer.
    pub bits_total: u64,
    /// Completed data frames.
    pub frames_total: u64,
    /// Sealed blocks.
    pub blocks_total: u64,
    /// Frames discarded for a missing stop bit.
    pub framing_errors: u64,
    /// Blocks discarded because a frame inside them failed framing.
    pub block_errors: u64,
    /// Signal-level aborts (phase resync or unmatched cycle timing).
    pub decode_aborts: u64,
    /// Blocks whose frame count violated the known-type rule.
    pub block_length_errors: u64,
    /// Blocks whose additive checksum did not reduce to zero.
    pub block_checksum_errors: u64,
    /// Blocks carrying a type byte with no known semantics.
    pub unknown_block_types: u64,
}

impl DecodeSummary {
    /// Total protocol errors recorded in this run.
    ///
    /// Counts exactly the annotations `AnnotationKind::is_error` flags;
    /// unknown block types are informational and not counted.
    pub fn error_count(&self) -> u64 {
        self.framing_errors
            + self.block_errors
            + self.decode_aborts
            + self.block_length_errors
            + self.block_checksum_errors
    }
}
