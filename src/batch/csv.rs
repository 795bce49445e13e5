//! RFC 4180 CSV reader using nom.
//!
//! Quoted fields may contain commas, doubled quotes and line breaks.

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_while},
    character::complete::char,
    combinator::{map, value, verify},
    multi::{fold_many0, separated_list1},
    sequence::delimited,
    IResult,
};

use super::SignalRow;
use crate::error::{SigqlError, SigqlResult};

/// One record and the line it starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub line: usize,
    pub fields: Vec<String>,
}

fn quoted(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        fold_many0(
            alt((is_not("\""), value("\"", tag("\"\"")))),
            String::new,
            |mut acc, piece| {
                acc.push_str(piece);
                acc
            },
        ),
        char('"'),
    )(input)
}

fn unquoted(input: &str) -> IResult<&str, String> {
    map(
        verify(
            take_while(|c| c != ',' && c != '\n' && c != '\r'),
            |s: &str| !s.starts_with('"'),
        ),
        String::from,
    )(input)
}

fn record(input: &str) -> IResult<&str, Vec<String>> {
    separated_list1(char(','), alt((quoted, unquoted)))(input)
}

fn line_ending(input: &str) -> IResult<&str, &str> {
    alt((tag("\r\n"), tag("\n")))(input)
}

/// Parse a whole document. Blank lines are skipped.
pub fn parse(source: &str) -> SigqlResult<Vec<Record>> {
    let line_at = |rest: &str| source[..source.len() - rest.len()].matches('\n').count() + 1;
    let mut records = Vec::new();
    let mut rest = source;

    while !rest.is_empty() {
        if let Ok((next, _)) = line_ending(rest) {
            rest = next;
            continue;
        }

        let line = line_at(rest);
        let (next, fields) = record(rest).map_err(|_| SigqlError::Csv {
            line,
            message: "unterminated quoted field".to_string(),
        })?;

        if !next.is_empty() {
            match line_ending(next) {
                Ok((after, _)) => rest = after,
                Err(_) => {
                    let message = if next.trim_start_matches(',').starts_with('"') {
                        "unterminated quoted field"
                    } else {
                        "unexpected text after quoted field"
                    };
                    return Err(SigqlError::Csv {
                        line: line_at(next),
                        message: message.to_string(),
                    });
                }
            }
        } else {
            rest = next;
        }

        records.push(Record { line, fields });
    }

    Ok(records)
}

/// Read the `model_id` and `signal_query` columns.
pub fn read_signal_rows(source: &str) -> SigqlResult<Vec<SignalRow>> {
    let mut records = parse(source)?.into_iter();

    let header = records.next().ok_or(SigqlError::Csv {
        line: 1,
        message: "missing header".to_string(),
    })?;
    let column = |name: &str| {
        header
            .fields
            .iter()
            .position(|f| f.trim() == name)
            .ok_or_else(|| SigqlError::Csv {
                line: header.line,
                message: format!("missing column '{}'", name),
            })
    };
    let model_col = column("model_id")?;
    let query_col = column("signal_query")?;

    records
        .map(|record| {
            if record.fields.len() != header.fields.len() {
                return Err(SigqlError::Csv {
                    line: record.line,
                    message: format!(
                        "expected {} fields, found {}",
                        header.fields.len(),
                        record.fields.len()
                    ),
                });
            }
            Ok(SignalRow {
                line: record.line,
                model_id: record.fields[model_col].clone(),
                signal_query: record.fields[query_col].clone(),
            })
        })
        .collect()
}
