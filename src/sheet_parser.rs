//! Local workbook parsing: Excel (.xlsx/.xlsm) with merged regions, and CSV.
//!
//! Cells are laid out at their absolute sheet coordinates (row 0 = sheet row 1,
//! col 0 = column A) so anchor references like "C7" line up with the grid.

use std::io::Cursor;

use anyhow::{Context, Result};
use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use chrono::{Days, NaiveDate};

use crate::grid::{Grid, SheetGrid};
use crate::merges::MergeRectangle;

/// Dispatch file parsing by extension. `sheet_name` picks a worksheet; the
/// first one is used when absent. CSV files have a single unnamed sheet.
pub fn parse_file(filename: &str, data: &[u8], sheet_name: Option<&str>) -> Result<SheetGrid> {
    let ext = filename
        .rsplit('.')
        .next()
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "csv" => parse_csv(filename, data),
        "xlsx" | "xlsm" => parse_excel_xlsx(data, sheet_name),
        _ => anyhow::bail!(
            "Unsupported file type: .{}. Supported: .csv, .xlsx, .xlsm",
            ext
        ),
    }
}

/// Parse a CSV file. Every record is a grid row; there is no header record.
fn parse_csv(filename: &str, data: &[u8]) -> Result<SheetGrid> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_reader(data);

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.context("Failed to read CSV record")?;
        rows.push(record.iter().map(|f| f.to_string()).collect());
    }

    if rows.is_empty() {
        anyhow::bail!("CSV file has no rows");
    }

    let title = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim_end_matches(".csv")
        .to_string();

    Ok(SheetGrid {
        title,
        grid: Grid::new(rows),
        merges: Vec::new(),
    })
}

/// Parse one worksheet of an xlsx/xlsm workbook, with its merged regions.
fn parse_excel_xlsx(data: &[u8], sheet_name: Option<&str>) -> Result<SheetGrid> {
    let cursor = Cursor::new(data);
    let mut workbook: Xlsx<_> =
        open_workbook_from_rs(cursor).context("Failed to open Excel workbook")?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let title = match sheet_name {
        Some(wanted) => sheet_names
            .iter()
            .find(|name| name.as_str() == wanted)
            .cloned()
            .with_context(|| format!("Sheet '{}' not found. Available: {:?}", wanted, sheet_names))?,
        None => sheet_names
            .first()
            .cloned()
            .context("Workbook has no sheets")?,
    };

    let range = workbook
        .worksheet_range(&title)
        .with_context(|| format!("Failed to read sheet '{}'", title))?;
    let grid = range_to_grid(&range);
    if grid.is_empty() {
        anyhow::bail!("Sheet '{}' is empty", title);
    }

    workbook
        .load_merged_regions()
        .context("Failed to read merged regions")?;
    let merges: Vec<MergeRectangle> = workbook
        .merged_regions_by_sheet(&title)
        .into_iter()
        .map(|(_, _, dims)| {
            // calamine dimensions are inclusive on both ends.
            MergeRectangle::new(
                dims.start.0 as usize,
                dims.end.0 as usize + 1,
                dims.start.1 as usize,
                dims.end.1 as usize + 1,
            )
        })
        .collect();

    tracing::info!(
        "Parsed sheet '{}': {} rows, {} merged regions",
        title,
        grid.len(),
        merges.len()
    );

    Ok(SheetGrid {
        title,
        grid,
        merges,
    })
}

/// Convert a calamine Range into a grid anchored at A1. calamine ranges start
/// at the first used cell, so leading rows/columns are padded back in.
fn range_to_grid(range: &calamine::Range<Data>) -> Grid {
    let Some((start_row, start_col)) = range.start() else {
        return Grid::default();
    };

    let mut rows: Vec<Vec<String>> = vec![Vec::new(); start_row as usize];
    for row in range.rows() {
        let mut values = vec![String::new(); start_col as usize];
        values.extend(row.iter().map(cell_to_string));
        while values.last().is_some_and(|v| v.is_empty()) {
            values.pop();
        }
        rows.push(values);
    }
    Grid::new(rows)
}

/// Convert a calamine cell to its display text.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            // Avoid trailing ".0" for whole numbers
            if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                format!("{}", *f as i64)
            } else {
                format!("{}", f)
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => excel_serial_to_string(dt.as_f64()),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("#ERR:{:?}", e),
    }
}

/// Excel serial day number to `DD.MM.YYYY` (plus time when fractional), the
/// same layout the calendar uses for typed-in header dates.
///
/// Serial 1 is 1900-01-01. Excel counts a fictional 1900-02-29 (serial 60),
/// so serials below 60 are shifted by a day; 60 itself maps to 1900-02-28.
fn excel_serial_to_string(serial: f64) -> String {
    if !serial.is_finite() || serial < 0.0 {
        return serial.to_string();
    }

    // Round to whole seconds first so 23:59:59.6 carries into the next day.
    let total_secs = (serial * 86_400.0).round() as u64;
    let mut days = total_secs / 86_400;
    let secs = total_secs % 86_400;
    if days < 60 {
        days += 1;
    }

    let date = NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|epoch| epoch.checked_add_days(Days::new(days)));
    let Some(date) = date else {
        return serial.to_string();
    };

    if secs == 0 {
        date.format("%d.%m.%Y").to_string()
    } else {
        format!(
            "{} {:02}:{:02}:{:02}",
            date.format("%d.%m.%Y"),
            secs / 3600,
            (secs % 3600) / 60,
            secs % 60
        )
    }
}
