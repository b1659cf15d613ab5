use anyhow::{Context, Result};
use std::path::Path;
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

const COMPACT: &[BorrowedFormatItem<'static>] =
    format_description!("[year][month][day]_[hour][minute][second]");
const CLOCK: &[BorrowedFormatItem<'static>] = format_description!("[hour][minute][second]");
const HUMAN: &[BorrowedFormatItem<'static>] =
    format_description!("[day]/[month]/[year] [hour]:[minute]:[second]");

pub fn ensure_dir(p: &Path) -> Result<()> {
    std::fs::create_dir_all(p).with_context(|| format!("create_dir_all {}", p.display()))
}

/// Local wall-clock time; falls back to UTC when the offset can't be determined.
fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// `YYYYmmdd_HHMMSS`, used in report file names.
pub fn stamp_compact() -> String {
    now()
        .format(COMPACT)
        .unwrap_or_else(|_| "19700101_000000".to_string())
}

/// `HHMMSS`, used in screenshot file names.
pub fn stamp_clock() -> String {
    now().format(CLOCK).unwrap_or_else(|_| "000000".to_string())
}

pub fn stamp_human() -> String {
    now()
        .format(HUMAN)
        .unwrap_or_else(|_| "01/01/1970 00:00:00".to_string())
}

/// Splits newline-separated input into trimmed, uppercased plates, dropping blanks.
pub fn parse_plates(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_uppercase)
        .collect()
}

/// File-name stem for a plate: anything outside `[A-Za-z0-9-]` becomes `_`,
/// so the result never walks out of the directory it is joined onto.
pub fn plate_file_stem(plate: &str) -> String {
    let stem: String = plate
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if stem.is_empty() { "_".to_string() } else { stem }
}

/// Collapses runs of whitespace the way rendered element text reads.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
