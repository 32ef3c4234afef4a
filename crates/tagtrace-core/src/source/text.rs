//! Line-oriented capture file parsing.
//!
//! Both file formats share the same framing: one record per line, `#`
//! starts a comment, blank lines are skipped.
//!
//! Edge files carry one sample index per line, strictly increasing:
//!
//! ```text
//! # edges captured at 1 MHz
//! 1000
//! 1124
//! 1248
//! ```
//!
//! Bit files carry `START END bit VALUE` or `START END error TAG`
//! records, where `VALUE` is `0`/`1` and `TAG` is `phase`/`invalid`:
//!
//! ```text
//! 1000 1248 bit 0
//! 1248 1746 bit 1
//! 1746 1800 error invalid
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use super::{BitSource, EdgeSource, SourceError};
use crate::Span;
use crate::protocol::{BitEvent, ErrorTag};

/// Edge-timestamp capture file.
pub struct EdgeFileSource {
    lines: Lines<BufReader<File>>,
    line_no: usize,
    last_edge: Option<u64>,
}

impl EdgeFileSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path)?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            line_no: 0,
            last_edge: None,
        })
    }
}

impl EdgeSource for EdgeFileSource {
    fn next_edge(&mut self) -> Result<Option<u64>, SourceError> {
        let Some(data) = next_data_line(&mut self.lines, &mut self.line_no)? else {
            return Ok(None);
        };
        let sample = parse_u64(&data, self.line_no, "sample index")?;
        if let Some(last) = self.last_edge {
            if sample <= last {
                return Err(SourceError::Format {
                    line: self.line_no,
                    message: format!(
                        "edge timestamps must be strictly increasing ({sample} after {last})"
                    ),
                });
            }
        }
        self.last_edge = Some(sample);
        Ok(Some(sample))
    }
}

/// Pre-classified bit capture file.
pub struct BitFileSource {
    lines: Lines<BufReader<File>>,
    line_no: usize,
}

impl BitFileSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path)?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            line_no: 0,
        })
    }
}

impl BitSource for BitFileSource {
    fn next_event(&mut self) -> Result<Option<BitEvent>, SourceError> {
        let Some(data) = next_data_line(&mut self.lines, &mut self.line_no)? else {
            return Ok(None);
        };
        let fields: Vec<&str> = data.split_whitespace().collect();
        parse_bit_record(&fields, self.line_no).map(Some)
    }
}

fn next_data_line(
    lines: &mut Lines<BufReader<File>>,
    line_no: &mut usize,
) -> Result<Option<String>, SourceError> {
    for line in lines.by_ref() {
        let line = line?;
        *line_no += 1;
        let data = line.split('#').next().unwrap_or_default().trim();
        if data.is_empty() {
            continue;
        }
        return Ok(Some(data.to_string()));
    }
    Ok(None)
}

fn parse_bit_record(fields: &[&str], line: usize) -> Result<BitEvent, SourceError> {
    if fields.len() != 4 {
        return Err(SourceError::Format {
            line,
            message: "expected 'START END bit VALUE' or 'START END error TAG'".to_string(),
        });
    }
    let start = parse_u64(fields[0], line, "span start")?;
    let end = parse_u64(fields[1], line, "span end")?;
    if end < start {
        return Err(SourceError::Format {
            line,
            message: format!("span end {end} before start {start}"),
        });
    }
    let span = Span::new(start, end);
    match fields[2] {
        "bit" => match fields[3] {
            "0" => Ok(BitEvent::bit(span, 0)),
            "1" => Ok(BitEvent::bit(span, 1)),
            other => Err(SourceError::Format {
                line,
                message: format!("bit value must be 0 or 1, got '{other}'"),
            }),
        },
        "error" => match fields[3] {
            "phase" => Ok(BitEvent::error(span, ErrorTag::Phase)),
            "invalid" => Ok(BitEvent::error(span, ErrorTag::Invalid)),
            other => Err(SourceError::Format {
                line,
                message: format!("error tag must be 'phase' or 'invalid', got '{other}'"),
            }),
        },
        other => Err(SourceError::Format {
            line,
            message: format!("unknown record kind '{other}'"),
        }),
    }
}

fn parse_u64(token: &str, line: usize, what: &str) -> Result<u64, SourceError> {
    token.parse().map_err(|_| SourceError::Format {
        line,
        message: format!("expected a {what}, got '{token}'"),
    })
}
