//! LTAR SmartDevice protocol layers.
//!
//! Two front ends (the edge timing classifier and the pass-through bit
//! source) produce the same `BitEvent` stream, so the framer and the
//! block decoder are written once and fed from either mode.

mod block;
mod framer;
mod timing;

pub use block::{BLOCK_TYPE_TAGGER_STATUS, TAGGER_STATUS_FRAME_COUNT, block_type_name, decode_block};
pub use framer::BitFramer;
pub use timing::{
    ConfigError, DeviceProfile, EdgeClassifier, HalfCycleKind, MIN_SAMPLE_RATE, ProfileTiming,
};

use crate::Span;

/// Error subtype carried by a `BitEvent::Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorTag {
    /// The upstream classifier resynchronized to the signal phase.
    Phase,
    /// A half-cycle matched neither timing window.
    Invalid,
}

/// One item of the classified bit stream consumed by the framer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitEvent {
    Bit { span: Span, value: u8 },
    Error { span: Span, tag: ErrorTag },
}

impl BitEvent {
    pub fn bit(span: Span, value: u8) -> Self {
        BitEvent::Bit { span, value }
    }

    pub fn error(span: Span, tag: ErrorTag) -> Self {
        BitEvent::Error { span, tag }
    }
}

/// One decoded data frame: a byte value plus its covering spans.
///
/// `span` runs from the start bit to the stop bit; `data_span` covers
/// the eight data bits only and is where field labels attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub value: u8,
    pub span: Span,
    pub data_span: Span,
}

/// An ordered group of frames sealed by a block-terminator bit.
///
/// Never empty: the framer only reaches the sealing transition after at
/// least one completed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub span: Span,
    pub frames: Vec<Frame>,
}
