//! Block-level semantic decode: length rule, checksum, field labels.

use super::Block;
use crate::{Annotation, AnnotationKind, AnnotationSink, Span};

/// The one block type with documented semantics.
pub const BLOCK_TYPE_TAGGER_STATUS: u8 = 0x02;
/// Required frame count for a TAGGER-STATUS block.
pub const TAGGER_STATUS_FRAME_COUNT: usize = 11;

pub fn block_type_name(block_type: u8) -> Option<&'static str> {
    match block_type {
        BLOCK_TYPE_TAGGER_STATUS => Some("TAGGER-STATUS"),
        _ => None,
    }
}

/// Run all block checks and field labeling over a sealed block.
///
/// The three passes are independent: a length error does not suppress
/// the checksum check or the field labels.
pub fn decode_block<S: AnnotationSink>(block: &Block, sink: &mut S) {
    let block_type = block.frames[0].value;
    check_length(block_type, block.frames.len(), block.span, sink);
    check_checksum(block, sink);
    label_fields(block, sink);
}

fn check_length<S: AnnotationSink>(
    block_type: u8,
    frame_count: usize,
    span: Span,
    sink: &mut S,
) {
    // Unknown block types are not length-checked.
    if block_type == BLOCK_TYPE_TAGGER_STATUS && frame_count != TAGGER_STATUS_FRAME_COUNT {
        sink.annotate(Annotation::new(
            span,
            AnnotationKind::BlockLengthError,
            vec![
                "Invalid block length".to_string(),
                "Invalid B length".to_string(),
                "E: B length".to_string(),
                "E: BL".to_string(),
            ],
        ));
    }
}

fn check_checksum<S: AnnotationSink>(block: &Block, sink: &mut S) {
    let mut accumulator: i32 = 0xFF;
    for frame in &block.frames {
        accumulator -= i32::from(frame.value);
    }
    // Negative accumulators fold back through the absolute value before
    // masking; kept from the protocol definition even though it is an
    // unusual construction for a byte checksum.
    let residue = (accumulator.abs() & 0xFF) as u8;
    if residue != 0 {
        sink.annotate(Annotation::new(
            block.span,
            AnnotationKind::BlockChecksumError,
            vec![
                "Invalid block checksum".to_string(),
                "Invalid B CSum".to_string(),
                "E: B CSum".to_string(),
                "E: B CS".to_string(),
            ],
        ));
    } else if let Some(last) = block.frames.last() {
        sink.annotate(Annotation::new(
            last.data_span,
            AnnotationKind::ChecksumValid,
            vec!["Valid Checksum".to_string(), "Valid CSum".to_string()],
        ));
    }
}

fn label_fields<S: AnnotationSink>(block: &Block, sink: &mut S) {
    let frame_count = block.frames.len();
    for (index, frame) in block.frames.iter().enumerate() {
        if index == 0 {
            sink.annotate(Annotation::new(
                frame.data_span,
                AnnotationKind::BlockType,
                vec![
                    "Block Type".to_string(),
                    "BType".to_string(),
                    "BT".to_string(),
                ],
            ));
            match block_type_name(frame.value) {
                Some(name) => sink.annotate(Annotation::new(
                    frame.data_span,
                    AnnotationKind::BlockTypeName,
                    vec![format!("{name} (0x{:02X})", frame.value)],
                )),
                None => sink.annotate(Annotation::new(
                    frame.data_span,
                    AnnotationKind::UnknownBlockType,
                    vec![
                        format!("Unknown Block Type (0x{:02X})", frame.value),
                        format!("Unknown BType (0x{:02X})", frame.value),
                        format!("Unk BType (0x{:02X})", frame.value),
                        format!("E: BT 0x{:02X}", frame.value),
                    ],
                )),
            }
        } else if index == frame_count - 1 {
            sink.annotate(Annotation::new(
                frame.data_span,
                AnnotationKind::ChecksumField,
                vec![
                    "Block Checksum".to_string(),
                    "B Checksum".to_string(),
                    "B CSum".to_string(),
                    "B CS".to_string(),
                ],
            ));
        } else {
            let payload_index = index - 1;
            sink.annotate(Annotation::new(
                frame.data_span,
                AnnotationKind::PayloadByte,
                vec![
                    format!("Block Data {payload_index}"),
                    format!("BData{payload_index}"),
                ],
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Frame;

    fn frame(index: u64, value: u8) -> Frame {
        let start = index * 100;
        Frame {
            value,
            span: Span::new(start, start + 100),
            data_span: Span::new(start + 10, start + 90),
        }
    }

    fn block_of(values: &[u8]) -> Block {
        let frames: Vec<Frame> = values
            .iter()
            .enumerate()
            .map(|(index, &value)| frame(index as u64, value))
            .collect();
        let span = Span::new(0, values.len() as u64 * 100 + 20);
        Block { span, frames }
    }

    fn checksum_for(values: &[u8]) -> u8 {
        let sum: i32 = values.iter().map(|&value| i32::from(value)).sum();
        ((0xFF - sum).rem_euclid(256)) as u8
    }

    fn decode(values: &[u8]) -> Vec<Annotation> {
        let mut anns = Vec::new();
        decode_block(&block_of(values), &mut anns);
        anns
    }

    fn count(anns: &[Annotation], kind: AnnotationKind) -> usize {
        anns.iter().filter(|ann| ann.kind == kind).count()
    }

    #[test]
    fn valid_tagger_status_block_is_clean() {
        let mut values = vec![BLOCK_TYPE_TAGGER_STATUS, 1, 2, 3, 4, 5, 6, 7, 8, 9];
        values.push(checksum_for(&values));
        let anns = decode(&values);

        assert_eq!(count(&anns, AnnotationKind::BlockLengthError), 0);
        assert_eq!(count(&anns, AnnotationKind::BlockChecksumError), 0);
        assert_eq!(count(&anns, AnnotationKind::ChecksumValid), 1);
        assert_eq!(count(&anns, AnnotationKind::PayloadByte), 9);
        let name = anns
            .iter()
            .find(|ann| ann.kind == AnnotationKind::BlockTypeName)
            .expect("type name");
        assert_eq!(name.labels[0], "TAGGER-STATUS (0x02)");
    }

    #[test]
    fn payload_labels_are_indexed_from_zero() {
        let mut values = vec![BLOCK_TYPE_TAGGER_STATUS, 10, 20, 30, 40, 50, 60, 70, 80, 90];
        values.push(checksum_for(&values));
        let anns = decode(&values);
        let labels: Vec<&str> = anns
            .iter()
            .filter(|ann| ann.kind == AnnotationKind::PayloadByte)
            .map(|ann| ann.labels[0].as_str())
            .collect();
        assert_eq!(labels.first(), Some(&"Block Data 0"));
        assert_eq!(labels.last(), Some(&"Block Data 8"));
    }

    #[test]
    fn short_known_block_gets_length_error_and_checksum_still_runs() {
        let mut values = vec![BLOCK_TYPE_TAGGER_STATUS, 1, 2, 3, 4, 5, 6, 7, 8];
        values.push(checksum_for(&values));
        let anns = decode(&values);

        assert_eq!(count(&anns, AnnotationKind::BlockLengthError), 1);
        assert_eq!(count(&anns, AnnotationKind::BlockChecksumError), 0);
        assert_eq!(count(&anns, AnnotationKind::ChecksumValid), 1);
    }

    #[test]
    fn mutated_byte_invalidates_checksum() {
        let mut values = vec![BLOCK_TYPE_TAGGER_STATUS, 1, 2, 3, 4, 5, 6, 7, 8, 9];
        values.push(checksum_for(&values));
        values[4] ^= 0x10;
        let anns = decode(&values);

        assert_eq!(count(&anns, AnnotationKind::BlockChecksumError), 1);
        assert_eq!(count(&anns, AnnotationKind::ChecksumValid), 0);
    }

    #[test]
    fn unknown_type_skips_length_check() {
        let mut values = vec![0x7E, 1, 2];
        values.push(checksum_for(&values));
        let anns = decode(&values);

        assert_eq!(count(&anns, AnnotationKind::BlockLengthError), 0);
        assert_eq!(count(&anns, AnnotationKind::UnknownBlockType), 1);
        assert_eq!(count(&anns, AnnotationKind::ChecksumValid), 1);
        let unknown = anns
            .iter()
            .find(|ann| ann.kind == AnnotationKind::UnknownBlockType)
            .expect("unknown type");
        assert_eq!(unknown.labels[0], "Unknown Block Type (0x7E)");
    }

    #[test]
    fn valid_checksum_labels_the_checksum_frame() {
        let values = [BLOCK_TYPE_TAGGER_STATUS, 0xFD];
        let anns = decode(&values);
        let valid = anns
            .iter()
            .find(|ann| ann.kind == AnnotationKind::ChecksumValid)
            .expect("valid checksum");
        // Attached to the last frame's data bits.
        assert_eq!(valid.start, 110);
        assert_eq!(valid.end, 190);
    }
}
