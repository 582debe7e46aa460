//! Text parsers: CDL dumps of a Level-3 binned group, and `yyyymmdd` dates.

use chrono::NaiveDate;

use crate::error::{ConfigurationError, DecodeError};
use crate::product::{BinTable, RowIndexEntry};

/// Concentration channels read from a binned product, in `RawBin` order.
pub const CHANNELS: [&str; 4] = ["CI_stumpf", "CI_cyano", "CI_noncyano", "MCI_stumpf"];

/// Parses a `yyyymmdd` integer such as `20240101`.
pub fn parse_yyyymmdd(value: i64) -> Result<NaiveDate, ConfigurationError> {
    if value < 0 {
        return Err(ConfigurationError::InvalidDate(value));
    }
    let year = i32::try_from(value / 10_000).map_err(|_| ConfigurationError::InvalidDate(value))?;
    let month = ((value % 10_000) / 100) as u32;
    let day = (value % 100) as u32;
    NaiveDate::from_ymd_opt(year, month, day).ok_or(ConfigurationError::InvalidDate(value))
}

/// Decodes the `data:` section of an `ncdump` listing of a binned group.
///
/// `BinIndex` and `BinList` are required, as is the `CI_cyano` channel. Other
/// channels are optional and come back as NaN when absent. Compound channel
/// values are `{sum, sum_squared}`; only `sum` is kept. Fill values (`_`)
/// become NaN.
///
/// # Errors
///
/// Returns [`DecodeError`] if a required variable is missing, a value does
/// not parse, or the channel lengths disagree with `BinList`.
pub fn parse_binned_cdl(text: &str) -> Result<BinTable, DecodeError> {
    let data_start = text
        .find("data:")
        .ok_or_else(|| DecodeError::Missing("data section".to_string()))?;
    let data = &text[data_start + "data:".len()..];

    let index = variable_section(data, "BinIndex")
        .ok_or_else(|| DecodeError::Missing("BinIndex".to_string()))?;
    let rows = compound_records(index)
        .into_iter()
        .map(|fields| {
            // {start_num, begin, extent, max}
            if fields.len() < 4 {
                return Err(DecodeError::Malformed(format!(
                    "BinIndex record has {} fields",
                    fields.len()
                )));
            }
            Ok(RowIndexEntry {
                start_num: parse_count(fields[0])?,
                max: parse_count(fields[3])?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let list = variable_section(data, "BinList")
        .ok_or_else(|| DecodeError::Missing("BinList".to_string()))?;
    let bin_nums = compound_records(list)
        .into_iter()
        .map(|fields| match fields.first() {
            Some(first) => parse_count(first),
            None => Err(DecodeError::Malformed("empty BinList record".to_string())),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut channels: [Option<Vec<f64>>; 4] = Default::default();
    for (slot, name) in channels.iter_mut().zip(CHANNELS) {
        if let Some(section) = variable_section(data, name) {
            let values = compound_records(section)
                .into_iter()
                .map(|fields| match fields.first() {
                    Some(first) => parse_value(first),
                    None => Ok(f64::NAN),
                })
                .collect::<Result<Vec<_>, _>>()?;
            *slot = Some(values);
        }
    }

    BinTable::from_columns(rows, bin_nums, channels)
}

/// Returns the text between `name =` and the terminating `;`.
fn variable_section<'a>(data: &'a str, name: &str) -> Option<&'a str> {
    let mut offset = 0;
    for line in data.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix(name) {
            if rest.trim_start().starts_with('=') {
                let start = offset + (line.len() - trimmed.len()) + name.len();
                let body = &data[start..];
                let eq = body.find('=')?;
                let body = &body[eq + 1..];
                let end = terminator(body)?;
                return Some(&body[..end]);
            }
        }
        offset += line.len();
    }
    None
}

/// Position of the first `;` outside braces.
fn terminator(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ';' if depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

/// Splits a section into records: one per `{...}` group, or one per scalar.
fn compound_records(section: &str) -> Vec<Vec<&str>> {
    if !section.contains('{') {
        return section
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| vec![t])
            .collect();
    }

    let mut records = Vec::new();
    let mut rest = section;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        let inner = &rest[open + 1..open + close];
        records.push(inner.split(',').map(str::trim).collect());
        rest = &rest[open + close + 1..];
    }
    records
}

fn parse_value(token: &str) -> Result<f64, DecodeError> {
    let token = token.trim();
    if token == "_" {
        return Ok(f64::NAN);
    }
    token
        .parse::<f64>()
        .or_else(|_| token.trim_end_matches(['f', 'F']).parse::<f64>())
        .map_err(|_| DecodeError::Malformed(format!("unparseable value '{token}'")))
}

fn parse_count(token: &str) -> Result<u64, DecodeError> {
    let token = token.trim();
    token
        .trim_end_matches(['U', 'u', 'L', 'l', 'S', 's', 'B', 'b'])
        .parse::<u64>()
        .map_err(|_| DecodeError::Malformed(format!("unparseable count '{token}'")))
}
