use crate::{
    config::Config,
    progress::{Outcome, PlateResult},
    util::{stamp_compact, stamp_human},
};
use rust_xlsxwriter::{
    ColNum, Color, Format, FormatAlign, Image, RowNum, Workbook, Worksheet, XlsxError,
};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const SHEET_NAME: &str = "Fine Control";
pub const TITLE: &str = "TRAFFIC FINE CONTROL REPORT";
pub const HEADERS: [&str; 5] = ["Plate", "Fine Status", "Result", "Evidence", "Details"];
const COLUMN_WIDTHS: [f64; 5] = [15.0, 15.0, 15.0, 35.0, 50.0];

const DARK_GREEN: u32 = 0x1F7246;
const LIGHT_GREEN: u32 = 0xC6E0B4;
const FINE_TINT: u32 = 0xFFE6E6;
const ERROR_TINT: u32 = 0xFFCCCC;
const WHITE: u32 = 0xFFFFFF;

const HEADER_ROW: RowNum = 3;
const FIRST_DATA_ROW: RowNum = 4;
const EVIDENCE_COL: ColNum = 3;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("XLSX error: {0}")]
    Xlsx(#[from] XlsxError),
    #[error("report io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes the report under `paths.reports_dir` and returns its path.
///
/// `Ok(None)` means the file was saved but is missing or smaller than
/// `report.min_bytes`, which callers treat as a failed generation.
pub fn write_report(cfg: &Config, results: &[PlateResult]) -> Result<Option<PathBuf>, ReportError> {
    std::fs::create_dir_all(&cfg.paths.reports_dir)?;
    let path = cfg
        .paths
        .reports_dir
        .join(format!("simit_report_{}.xlsx", stamp_compact()));

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name(SHEET_NAME)?;
        write_sheet(cfg, sheet, results)?;
    }
    workbook.save(&path)?;

    Ok(validate(&path, cfg.report.min_bytes))
}

fn validate(path: &Path, min_bytes: u64) -> Option<PathBuf> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > min_bytes => {
            info!(path = %path.display(), bytes = meta.len(), "report written");
            Some(path.to_path_buf())
        }
        Ok(meta) => {
            warn!(path = %path.display(), bytes = meta.len(), "report smaller than expected");
            None
        }
        Err(err) => {
            warn!(path = %path.display(), "report missing after save: {err}");
            None
        }
    }
}

fn write_sheet(cfg: &Config, sheet: &mut Worksheet, results: &[PlateResult]) -> Result<(), XlsxError> {
    for (col, width) in COLUMN_WIDTHS.iter().enumerate() {
        sheet.set_column_width(col as ColNum, *width)?;
    }

    let title = Format::new()
        .set_font_name("Arial")
        .set_font_size(16)
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(DARK_GREEN))
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter);
    sheet.merge_range(0, 0, 1, 4, TITLE, &title)?;

    let stamp = Format::new()
        .set_font_name("Arial")
        .set_font_size(10)
        .set_italic()
        .set_align(FormatAlign::Right);
    sheet.merge_range(
        2,
        0,
        2,
        4,
        &format!("Report generated on: {}", stamp_human()),
        &stamp,
    )?;

    let header = Format::new()
        .set_font_name("Arial")
        .set_font_size(11)
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(DARK_GREEN))
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter);
    for (col, name) in HEADERS.iter().enumerate() {
        sheet.write_string_with_format(HEADER_ROW, col as ColNum, *name, &header)?;
    }

    for (i, result) in results.iter().enumerate() {
        let row = FIRST_DATA_ROW + i as RowNum;
        write_row(cfg, sheet, row, result)?;
    }
    Ok(())
}

/// Background for a data row; `row` is zero-based, the tint alternates on the
/// one-based spreadsheet row number.
pub fn row_fill(result: &PlateResult, row: RowNum) -> u32 {
    if result.has_fine() {
        FINE_TINT
    } else if result.outcome == Outcome::Error {
        ERROR_TINT
    } else if (row + 1) % 2 == 0 {
        LIGHT_GREEN
    } else {
        WHITE
    }
}

fn write_row(
    cfg: &Config,
    sheet: &mut Worksheet,
    row: RowNum,
    result: &PlateResult,
) -> Result<(), XlsxError> {
    let base = Format::new().set_background_color(Color::RGB(row_fill(result, row)));

    let plate = base.clone().set_align(FormatAlign::Center);
    let status = if result.has_fine() {
        base.clone()
            .set_bold()
            .set_font_color(Color::RGB(0xFF0000))
            .set_align(FormatAlign::Center)
    } else {
        base.clone()
    };
    let details = base
        .clone()
        .set_text_wrap()
        .set_align(FormatAlign::Top);

    let screenshot = result
        .screenshot_path
        .path()
        .filter(|p| p.exists());
    let evidence_text = if screenshot.is_some() {
        "See attached image"
    } else {
        "No capture"
    };
    let details_text = if result.details.trim().is_empty() {
        "No details"
    } else {
        result.details.as_str()
    };

    sheet.write_string_with_format(row, 0, &result.plate, &plate)?;
    sheet.write_string_with_format(row, 1, result.fine_status.as_str(), &status)?;
    sheet.write_string_with_format(row, 2, result.outcome.as_str(), &base)?;
    sheet.write_string_with_format(row, EVIDENCE_COL, evidence_text, &base)?;
    sheet.write_string_with_format(row, 4, details_text, &details)?;

    if let Some(path) = screenshot {
        if let Err(err) = embed_image(cfg, sheet, row, path) {
            warn!(image = %path.display(), "could not embed screenshot: {err}");
        }
    }
    Ok(())
}

fn embed_image(cfg: &Config, sheet: &mut Worksheet, row: RowNum, path: &Path) -> Result<(), XlsxError> {
    let mut image = Image::new(path)?;
    let (w, h) = (image.width(), image.height());
    if w > 0.0 && h > 0.0 {
        image = image
            .set_scale_width(f64::from(cfg.report.image_width) / w)
            .set_scale_height(f64::from(cfg.report.image_height) / h);
    }
    sheet.set_row_height(row, cfg.report.image_row_height)?;
    sheet.insert_image(row, EVIDENCE_COL, &image)?;
    Ok(())
}
