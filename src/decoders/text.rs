//! Text loading for instrument exports.
//!
//! Agilent and AKTA write UTF-16, Waters and Shimadzu write UTF-8 or plain
//! ASCII. Everything downstream works on `String`.

use std::fs;
use std::path::Path;

use super::DecodeError;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16_LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16_BE_BOM: &[u8] = &[0xFE, 0xFF];

/// Read a whole export as text, detecting its encoding.
pub fn read_text(path: &Path) -> Result<String, DecodeError> {
    let bytes = fs::read(path)?;
    decode_bytes(&bytes).ok_or_else(|| {
        DecodeError::Encoding(format!("{} is neither UTF-8 nor UTF-16", path.display()))
    })
}

/// Decode raw bytes as UTF-16 (BOM-marked or BOM-less little-endian) or UTF-8.
pub fn decode_bytes(bytes: &[u8]) -> Option<String> {
    if let Some(rest) = bytes.strip_prefix(UTF16_LE_BOM) {
        return decode_utf16(rest, u16::from_le_bytes);
    }
    if let Some(rest) = bytes.strip_prefix(UTF16_BE_BOM) {
        return decode_utf16(rest, u16::from_be_bytes);
    }
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    // BOM-less UTF-16 of ASCII text is valid UTF-8 full of NULs
    match std::str::from_utf8(body) {
        Ok(text) if !text.contains('\0') => Some(text.to_string()),
        _ => decode_utf16(bytes, u16::from_le_bytes),
    }
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| to_unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units)
        .ok()
        .map(|s| s.trim_start_matches('\u{feff}').to_string())
}

/// First line of an export with BOM and trailing whitespace removed.
///
/// Used by claim checks, so any failure reads as "no first line".
pub fn first_line(path: &Path) -> Option<String> {
    let text = read_text(path).ok()?;
    text.lines()
        .next()
        .map(|line| line.trim_start_matches('\u{feff}').trim_end().to_string())
}

/// First cell of a line: comma-split when the line has commas, else whitespace-split.
pub fn first_cell(line: &str) -> Option<&str> {
    let cell = if line.contains(',') {
        line.split(',').next()
    } else {
        line.split_whitespace().next()
    }?;
    let cell = cell.trim();
    if cell.is_empty() {
        None
    } else {
        Some(cell)
    }
}

/// Case-insensitive extension check.
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|want| e.eq_ignore_ascii_case(want)))
        .unwrap_or(false)
}

/// File name without its final extension.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// File name for prompts and log lines.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Parse the first two whitespace-separated cells of a data line as (x, y).
///
/// Both cells must be finite numbers; `NaN` and `inf` are rejected.
pub fn parse_pair(line: &str) -> Option<(f64, f64)> {
    let mut cells = line.split(|c: char| c.is_whitespace() || c == ',').filter(|c| !c.is_empty());
    let x = parse_finite(cells.next()?)?;
    let y = parse_finite(cells.next()?)?;
    Some((x, y))
}

/// Parse one cell as a finite number.
pub fn parse_finite(cell: &str) -> Option<f64> {
    cell.trim()
        .trim_matches('"')
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}
