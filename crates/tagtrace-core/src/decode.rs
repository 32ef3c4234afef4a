//! Decode pipeline driver.
//!
//! Wires a capture source through the protocol layers and aggregates
//! the annotation stream into a `Report`. File-backed entry points fill
//! in the input metadata; the source-generic ones accept any producer.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::{BitEvent, BitFramer, ConfigError, DeviceProfile, EdgeClassifier, decode_block};
use crate::source::{BitFileSource, BitSource, EdgeFileSource, EdgeSource, SourceError};
use crate::{
    Annotation, AnnotationKind, DEFAULT_GENERATED_AT, DecodeConfig, DecodeSummary, InputInfo,
    REPORT_VERSION, Report, ToolInfo,
};

const MEMORY_INPUT: &str = "<memory>";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("source error: {0}")]
    Source(#[from] SourceError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Input interpretation selected for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeMode {
    Edges,
    Bits,
}

/// Decode a raw edge-timestamp capture file.
pub fn decode_edge_file(
    path: &Path,
    profile: DeviceProfile,
    sample_rate: u32,
) -> Result<Report, DecodeError> {
    let source = EdgeFileSource::open(path)?;
    let mut report = decode_edges(source, profile, sample_rate)?;
    report.input = InputInfo {
        path: path.display().to_string(),
        bytes: path.metadata()?.len(),
    };
    Ok(report)
}

/// Decode a pre-classified bit capture file.
pub fn decode_bit_file(path: &Path, profile: DeviceProfile) -> Result<Report, DecodeError> {
    let source = BitFileSource::open(path)?;
    let mut report = decode_bits(source, profile)?;
    report.input = InputInfo {
        path: path.display().to_string(),
        bytes: path.metadata()?.len(),
    };
    Ok(report)
}

/// Decode raw edges from any source.
///
/// The sample rate is validated before the first edge is read.
pub fn decode_edges<S: EdgeSource>(
    mut source: S,
    profile: DeviceProfile,
    sample_rate: u32,
) -> Result<Report, DecodeError> {
    let mut classifier = EdgeClassifier::new(profile, sample_rate)?;
    let mut framer = BitFramer::new();
    let mut annotations: Vec<Annotation> = Vec::new();
    let mut bits_total = 0u64;

    while let Some(edge) = source.next_edge()? {
        let Some(event) = classifier.observe_edge(edge) else {
            continue;
        };
        if let BitEvent::Bit { span, value } = event {
            bits_total += 1;
            annotations.push(Annotation::new(
                span,
                AnnotationKind::BitRaw,
                vec![value.to_string()],
            ));
        }
        if let Some(block) = framer.push(event, &mut annotations) {
            decode_block(&block, &mut annotations);
        }
    }

    Ok(build_report(
        DecodeMode::Edges,
        profile,
        Some(sample_rate),
        bits_total,
        annotations,
    ))
}

/// Decode pre-classified bits from any source, skipping the timing layer.
pub fn decode_bits<S: BitSource>(
    mut source: S,
    profile: DeviceProfile,
) -> Result<Report, DecodeError> {
    let mut framer = BitFramer::new();
    let mut annotations: Vec<Annotation> = Vec::new();
    let mut bits_total = 0u64;

    while let Some(event) = source.next_event()? {
        if matches!(event, BitEvent::Bit { .. }) {
            bits_total += 1;
        }
        if let Some(block) = framer.push(event, &mut annotations) {
            decode_block(&block, &mut annotations);
        }
    }

    Ok(build_report(
        DecodeMode::Bits,
        profile,
        None,
        bits_total,
        annotations,
    ))
}

fn build_report(
    mode: DecodeMode,
    profile: DeviceProfile,
    sample_rate: Option<u32>,
    bits_total: u64,
    annotations: Vec<Annotation>,
) -> Report {
    Report {
        report_version: REPORT_VERSION,
        tool: ToolInfo {
            name: "tagtrace".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        generated_at: DEFAULT_GENERATED_AT.to_string(),
        input: InputInfo {
            path: MEMORY_INPUT.to_string(),
            bytes: 0,
        },
        config: DecodeConfig {
            mode,
            profile,
            sample_rate,
        },
        summary: summarize(bits_total, &annotations),
        annotations,
    }
}

fn summarize(bits_total: u64, annotations: &[Annotation]) -> DecodeSummary {
    let mut summary = DecodeSummary {
        bits_total,
        ..DecodeSummary::default()
    };
    for annotation in annotations {
        match annotation.kind {
            AnnotationKind::Frame => summary.frames_total += 1,
            AnnotationKind::Block => summary.blocks_total += 1,
            AnnotationKind::FramingError => summary.framing_errors += 1,
            AnnotationKind::BlockError => summary.block_errors += 1,
            AnnotationKind::DecodeAbort => summary.decode_aborts += 1,
            AnnotationKind::BlockLengthError => summary.block_length_errors += 1,
            AnnotationKind::BlockChecksumError => summary.block_checksum_errors += 1,
            AnnotationKind::UnknownBlockType => summary.unknown_block_types += 1,
            _ => {}
        }
    }
    summary
}
