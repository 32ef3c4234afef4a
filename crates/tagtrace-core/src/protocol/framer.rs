//! Bit-to-frame-to-block framing state machine.
//!
//! A frame is one start bit, eight data bits and one stop bit; frames
//! group into a block terminated by an extra one bit after the optional
//! inter-frame spacer. Framing errors discard the frame (and the block
//! it was part of) and resume at `Idle`.

use super::{BitEvent, Block, ErrorTag, Frame};
use crate::{Annotation, AnnotationKind, AnnotationSink, Span};

const FRAME_DATA_BITS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FramerState {
    Idle,
    Data,
    FrameStop,
    /// After a stop bit: the next bit is either the inter-frame spacer
    /// or the start bit of the next frame.
    FrameStop2,
    /// After a spacer bit: the next bit is either the block terminator
    /// or the start bit of the next frame.
    BlockStop,
}

#[derive(Debug, Clone, Copy)]
struct BitSlot {
    span: Span,
    value: u8,
}

/// Framing state machine; one instance per decoded stream.
#[derive(Debug)]
pub struct BitFramer {
    state: FramerState,
    frame: Vec<BitSlot>,
    block: Vec<Frame>,
}

impl BitFramer {
    pub fn new() -> Self {
        Self {
            state: FramerState::Idle,
            frame: Vec::new(),
            block: Vec::new(),
        }
    }

    /// Consume one bit event; returns a sealed block when the block
    /// terminator is seen.
    pub fn push<S: AnnotationSink>(&mut self, event: BitEvent, sink: &mut S) -> Option<Block> {
        match event {
            BitEvent::Error { span, tag } => {
                self.abort(span, tag, sink);
                None
            }
            BitEvent::Bit { span, value } => self.step(BitSlot { span, value }, sink),
        }
    }

    fn step<S: AnnotationSink>(&mut self, bit: BitSlot, sink: &mut S) -> Option<Block> {
        match self.state {
            FramerState::Idle => {
                if bit.value == 0 {
                    self.start_frame(bit, sink);
                }
                // A one bit in idle is just the idle line.
                None
            }
            FramerState::Data => {
                sink.annotate(Annotation::new(
                    bit.span,
                    AnnotationKind::BitData,
                    vec![bit.value.to_string()],
                ));
                self.frame.push(bit);
                if self.frame.len() == FRAME_DATA_BITS + 1 {
                    self.state = FramerState::FrameStop;
                }
                None
            }
            FramerState::FrameStop => {
                if bit.value == 1 {
                    self.finish_frame(bit, sink);
                } else {
                    self.framing_error(bit, sink);
                }
                None
            }
            FramerState::FrameStop2 => {
                if bit.value == 1 {
                    sink.annotate(Annotation::new(
                        bit.span,
                        AnnotationKind::BitSpacer,
                        vec!["Spacer Bit".to_string(), "Spacer".to_string()],
                    ));
                    self.state = FramerState::BlockStop;
                } else {
                    self.start_frame(bit, sink);
                }
                None
            }
            FramerState::BlockStop => {
                if bit.value == 1 {
                    Some(self.finish_block(bit, sink))
                } else {
                    self.start_frame(bit, sink);
                    None
                }
            }
        }
    }

    fn start_frame<S: AnnotationSink>(&mut self, bit: BitSlot, sink: &mut S) {
        sink.annotate(Annotation::new(
            bit.span,
            AnnotationKind::BitStart,
            vec![
                "Start Bit".to_string(),
                "Start B".to_string(),
                "Start".to_string(),
            ],
        ));
        self.frame.clear();
        self.frame.push(bit);
        self.state = FramerState::Data;
    }

    fn finish_frame<S: AnnotationSink>(&mut self, stop: BitSlot, sink: &mut S) {
        sink.annotate(Annotation::new(
            stop.span,
            AnnotationKind::BitStop,
            vec![
                "Stop Bit".to_string(),
                "Stop B".to_string(),
                "Stop".to_string(),
            ],
        ));
        self.frame.push(stop);

        // Data bit 1 is the LSB, data bit 8 the MSB.
        let mut value = 0u8;
        for (index, slot) in self.frame[1..=FRAME_DATA_BITS].iter().enumerate() {
            value |= slot.value << index;
        }

        let span = Span::new(self.frame[0].span.start, stop.span.end);
        let data_span = Span::new(
            self.frame[1].span.start,
            self.frame[FRAME_DATA_BITS].span.end,
        );
        sink.annotate(Annotation::new(
            span,
            AnnotationKind::Frame,
            vec![
                format!("Data frame: 0x{value:02X}"),
                format!("Data: 0x{value:02X}"),
                format!("D 0x{value:02X}"),
            ],
        ));
        self.block.push(Frame {
            value,
            span,
            data_span,
        });
        self.frame.clear();
        self.state = FramerState::FrameStop2;
    }

    fn framing_error<S: AnnotationSink>(&mut self, bit: BitSlot, sink: &mut S) {
        // Entered from FrameStop: the buffer holds start bit + 8 data bits.
        let span = Span::new(self.frame[0].span.start, self.frame[FRAME_DATA_BITS].span.end);
        sink.annotate(Annotation::new(
            span,
            AnnotationKind::FramingError,
            vec![
                "Data framing error".to_string(),
                "Framing error".to_string(),
                "Frame Error".to_string(),
                "FE".to_string(),
            ],
        ));
        self.frame.clear();
        if !self.block.is_empty() {
            let block_span = Span::new(self.block[0].span.start, bit.span.end);
            sink.annotate(Annotation::new(
                block_span,
                AnnotationKind::BlockError,
                vec![
                    "Block aborted by framing error".to_string(),
                    "Block error".to_string(),
                    "B Err".to_string(),
                ],
            ));
            self.block.clear();
        }
        self.state = FramerState::Idle;
    }

    fn finish_block<S: AnnotationSink>(&mut self, bit: BitSlot, sink: &mut S) -> Block {
        sink.annotate(Annotation::new(
            bit.span,
            AnnotationKind::BitBlockEnd,
            vec!["Block Stop".to_string(), "Block".to_string()],
        ));
        let span = Span::new(self.block[0].span.start, bit.span.end);
        let frames = std::mem::take(&mut self.block);
        sink.annotate(Annotation::new(
            span,
            AnnotationKind::Block,
            vec![
                format!("Block, {} frames", frames.len()),
                format!("B {}", frames.len()),
            ],
        ));
        self.state = FramerState::Idle;
        Block { span, frames }
    }

    fn abort<S: AnnotationSink>(&mut self, span: Span, tag: ErrorTag, sink: &mut S) {
        let labels = match tag {
            ErrorTag::Phase => vec![
                "Decode abort: phase resync".to_string(),
                "Abort: phase".to_string(),
            ],
            ErrorTag::Invalid => vec![
                "Decode abort: invalid cycle timing".to_string(),
                "Abort: timing".to_string(),
            ],
        };
        sink.annotate(Annotation::new(span, AnnotationKind::DecodeAbort, labels));
        self.frame.clear();
        self.block.clear();
        self.state = FramerState::Idle;
    }
}

impl Default for BitFramer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bit(index: usize, value: u8) -> BitEvent {
        let start = index as u64 * 10;
        BitEvent::bit(Span::new(start, start + 10), value)
    }

    fn feed(framer: &mut BitFramer, bits: &[u8], sink: &mut Vec<Annotation>) -> Vec<Block> {
        bits.iter()
            .enumerate()
            .filter_map(|(index, &value)| framer.push(bit(index, value), sink))
            .collect()
    }

    fn frame_bits(value: u8) -> Vec<u8> {
        let mut bits = vec![0];
        bits.extend((0..8).map(|index| (value >> index) & 1));
        bits.push(1);
        bits
    }

    fn count(anns: &[Annotation], kind: AnnotationKind) -> usize {
        anns.iter().filter(|ann| ann.kind == kind).count()
    }

    #[test]
    fn packs_data_bits_lsb_first() {
        let mut framer = BitFramer::new();
        let mut anns = Vec::new();
        // d0..d7 = 1,0,1,0,0,1,0,1 -> 0xA5.
        feed(&mut framer, &[0, 1, 0, 1, 0, 0, 1, 0, 1, 1], &mut anns);
        let frame = anns
            .iter()
            .find(|ann| ann.kind == AnnotationKind::Frame)
            .expect("frame annotation");
        assert_eq!(frame.labels[0], "Data frame: 0xA5");
        assert_eq!(frame.start, 0);
        assert_eq!(frame.end, 100);
    }

    #[test]
    fn idle_line_is_ignored() {
        let mut framer = BitFramer::new();
        let mut anns = Vec::new();
        feed(&mut framer, &[1, 1, 1], &mut anns);
        assert!(anns.is_empty());
    }

    #[test]
    fn missing_stop_bit_discards_frame_and_recovers() {
        let mut framer = BitFramer::new();
        let mut anns = Vec::new();
        let mut bits = frame_bits(0xAB);
        *bits.last_mut().expect("stop bit") = 0; // framing error
        bits.extend(frame_bits(0x55));
        let blocks = feed(&mut framer, &bits, &mut anns);

        assert!(blocks.is_empty());
        assert_eq!(count(&anns, AnnotationKind::FramingError), 1);
        assert_eq!(count(&anns, AnnotationKind::BlockError), 0);
        let frame = anns
            .iter()
            .find(|ann| ann.kind == AnnotationKind::Frame)
            .expect("recovered frame");
        assert_eq!(frame.labels[0], "Data frame: 0x55");
    }

    #[test]
    fn framing_error_mid_block_discards_block() {
        let mut framer = BitFramer::new();
        let mut anns = Vec::new();
        let mut bits = frame_bits(0x02);
        let mut bad = frame_bits(0x11);
        *bad.last_mut().expect("stop bit") = 0;
        bits.extend(bad);
        let blocks = feed(&mut framer, &bits, &mut anns);

        assert!(blocks.is_empty());
        assert_eq!(count(&anns, AnnotationKind::FramingError), 1);
        assert_eq!(count(&anns, AnnotationKind::BlockError), 1);
    }

    #[test]
    fn spacer_then_terminator_seals_block() {
        let mut framer = BitFramer::new();
        let mut anns = Vec::new();
        let mut bits = frame_bits(0x42);
        bits.push(1); // spacer
        bits.push(1); // block terminator
        let blocks = feed(&mut framer, &bits, &mut anns);

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].frames.len(), 1);
        assert_eq!(blocks[0].frames[0].value, 0x42);
        assert_eq!(blocks[0].span, Span::new(0, 120));
        assert_eq!(count(&anns, AnnotationKind::BitSpacer), 1);
        assert_eq!(count(&anns, AnnotationKind::BitBlockEnd), 1);
        assert_eq!(count(&anns, AnnotationKind::Block), 1);
    }

    #[test]
    fn spacer_then_start_bit_continues_block() {
        let mut framer = BitFramer::new();
        let mut anns = Vec::new();
        let mut bits = frame_bits(0x01);
        bits.push(1); // spacer
        bits.extend(frame_bits(0x02)); // next frame, same block
        bits.push(1); // spacer
        bits.push(1); // block terminator
        let blocks = feed(&mut framer, &bits, &mut anns);

        assert_eq!(blocks.len(), 1);
        let values: Vec<u8> = blocks[0].frames.iter().map(|frame| frame.value).collect();
        assert_eq!(values, vec![0x01, 0x02]);
    }

    #[test]
    fn back_to_back_frames_without_spacer() {
        let mut framer = BitFramer::new();
        let mut anns = Vec::new();
        let mut bits = frame_bits(0x01);
        bits.extend(frame_bits(0x02));
        bits.push(1);
        bits.push(1);
        let blocks = feed(&mut framer, &bits, &mut anns);

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].frames.len(), 2);
        assert_eq!(count(&anns, AnnotationKind::BitSpacer), 1);
    }

    #[test]
    fn error_event_resets_everything() {
        let mut framer = BitFramer::new();
        let mut anns = Vec::new();
        let mut bits = frame_bits(0x33);
        bits.extend([0, 1, 1]); // start of another frame, then interrupted
        feed(&mut framer, &bits, &mut anns);
        framer.push(
            BitEvent::error(Span::new(200, 210), ErrorTag::Phase),
            &mut anns,
        );
        assert_eq!(count(&anns, AnnotationKind::DecodeAbort), 1);

        // A fresh frame decodes with no residue from the aborted block.
        let mut tail = Vec::new();
        let blocks = feed(&mut framer, &{
            let mut bits = frame_bits(0x7F);
            bits.extend([1, 1]);
            bits
        }, &mut tail);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].frames.len(), 1);
        assert_eq!(blocks[0].frames[0].value, 0x7F);
    }
}
