//! Report directories: one CSV per sheet plus `manifest.json` recording sheet
//! order, file names and which sheets keep their header row frozen. Existing
//! spreadsheets (`.xlsx`, `.xls`, `.ods`) can be opened read-only so their
//! documentation sheet carries over into a refreshed report.

use std::fs;
use std::path::{Path, PathBuf};

use calamine::Reader;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{DefectWorkbook, Sheet};

pub const MANIFEST_FILE: &str = "manifest.json";
const TOOL_NAME: &str = "lci-qaqc";

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("report I/O failed for '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("manifest error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),
    #[error("the workbook '{0}' does not exist")]
    NotFound(String),
    #[error("unsupported workbook source '{0}' (expected a report directory or .xlsx/.xls/.ods)")]
    Unsupported(String),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ReportError + '_ {
    move |source| ReportError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetEntry {
    pub name: String,
    pub file: String,
    pub rows: usize,
    #[serde(default)]
    pub freeze_header: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkbookManifest {
    pub tool: String,
    pub tool_version: String,
    pub date_created: String,
    pub sheets: Vec<SheetEntry>,
}

/// Write every sheet of `workbook` into `dir`. Files listed by a previous
/// manifest in the same directory are removed first.
pub fn write_report_dir(
    dir: &Path,
    workbook: &DefectWorkbook,
) -> Result<WorkbookManifest, ReportError> {
    fs::create_dir_all(dir).map_err(io_error(dir))?;
    remove_previous_sheets(dir)?;

    let mut entries = Vec::with_capacity(workbook.sheets.len());
    for (index, sheet) in workbook.sheets.iter().enumerate() {
        let file = format!("{:02}_{}.csv", index + 1, file_stem(&sheet.name));
        let path = dir.join(&file);
        let mut writer = csv::WriterBuilder::new().flexible(true).from_path(&path)?;
        if !sheet.header.is_empty() {
            writer.write_record(&sheet.header)?;
        }
        for row in &sheet.rows {
            writer.write_record(row)?;
        }
        writer.flush().map_err(io_error(&path))?;
        debug!(sheet = %sheet.name, rows = sheet.rows.len(), file = %file, "sheet written");

        entries.push(SheetEntry {
            name: sheet.name.clone(),
            file,
            rows: sheet.rows.len(),
            freeze_header: sheet.freeze_header,
        });
    }

    let manifest = WorkbookManifest {
        tool: TOOL_NAME.to_string(),
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        date_created: chrono::Utc::now().format("%Y-%m-%d").to_string(),
        sheets: entries,
    };
    let manifest_path = dir.join(MANIFEST_FILE);
    fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)
        .map_err(io_error(&manifest_path))?;

    info!(
        dir = %dir.display(),
        sheets = manifest.sheets.len(),
        "report written"
    );
    Ok(manifest)
}

/// Open a report directory or a spreadsheet file as a [`DefectWorkbook`].
pub fn open_workbook(path: &Path) -> Result<DefectWorkbook, ReportError> {
    if !path.exists() {
        return Err(ReportError::NotFound(path.display().to_string()));
    }
    if path.is_dir() {
        return open_report_dir(path);
    }
    let is_spreadsheet = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "xlsx" | "xlsm" | "xls" | "ods"))
        .unwrap_or(false);
    if !is_spreadsheet {
        return Err(ReportError::Unsupported(path.display().to_string()));
    }
    open_spreadsheet(path)
}

/// Keep only the documentation sheet of an existing workbook, append the
/// given category sheets with frozen headers, and save to `output_dir`.
pub fn refresh_workbook(
    existing: &Path,
    output_dir: &Path,
    categories: Vec<Sheet>,
    documentation_sheet: &str,
) -> Result<WorkbookManifest, ReportError> {
    let mut workbook = open_workbook(existing)?;
    workbook.retain_only(documentation_sheet);
    for sheet in categories {
        workbook.push(sheet.frozen());
    }
    write_report_dir(output_dir, &workbook)
}

fn open_report_dir(dir: &Path) -> Result<DefectWorkbook, ReportError> {
    let manifest_path = dir.join(MANIFEST_FILE);
    let raw = fs::read_to_string(&manifest_path).map_err(io_error(&manifest_path))?;
    let manifest: WorkbookManifest = serde_json::from_str(&raw)?;

    let mut sheets = Vec::with_capacity(manifest.sheets.len());
    for entry in &manifest.sheets {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(dir.join(&entry.file))?;
        let header = reader.headers()?.iter().map(str::to_string).collect();
        let mut sheet = Sheet::new(&entry.name, header);
        for record in reader.records() {
            sheet.rows.push(record?.iter().map(str::to_string).collect());
        }
        sheet.freeze_header = entry.freeze_header;
        sheets.push(sheet);
    }
    Ok(DefectWorkbook::new(sheets))
}

fn open_spreadsheet(path: &Path) -> Result<DefectWorkbook, ReportError> {
    let mut wb = calamine::open_workbook_auto(path)?;
    let names = wb.sheet_names();

    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let range = wb.worksheet_range(&name)?;
        let mut rows = range.rows();
        let header = rows
            .next()
            .map(|row| row.iter().map(cell_str).collect())
            .unwrap_or_default();
        let mut sheet = Sheet::new(&name, header);
        sheet.rows = rows.map(|row| row.iter().map(cell_str).collect()).collect();
        sheets.push(sheet);
    }
    Ok(DefectWorkbook::new(sheets))
}

fn remove_previous_sheets(dir: &Path) -> Result<(), ReportError> {
    let manifest_path = dir.join(MANIFEST_FILE);
    if !manifest_path.is_file() {
        return Ok(());
    }
    let raw = fs::read_to_string(&manifest_path).map_err(io_error(&manifest_path))?;
    let Ok(previous) = serde_json::from_str::<WorkbookManifest>(&raw) else {
        return Ok(());
    };
    for entry in previous.sheets {
        let stale: PathBuf = dir.join(&entry.file);
        if stale.is_file() {
            fs::remove_file(&stale).map_err(io_error(&stale))?;
        }
    }
    Ok(())
}

fn file_stem(sheet_name: &str) -> String {
    sheet_name
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

pub(crate) fn cell_str(d: &calamine::Data) -> String {
    match d {
        calamine::Data::Empty => String::new(),
        calamine::Data::String(s) => s.clone(),
        calamine::Data::Float(f) => format!("{}", f),
        calamine::Data::Int(i) => format!("{}", i),
        calamine::Data::Bool(b) => format!("{}", b),
        _ => format!("{:?}", d),
    }
}
