//! Tabular reporting sink: defect records become sheets, one per category.
//!
//! Sheets are written as a report directory (one CSV per sheet plus a JSON
//! manifest) by [`workbook::write_report_dir`]. Sheet names follow spreadsheet
//! rules so a report can be pasted into a workbook unchanged.

pub mod workbook;

pub use workbook::{
    open_workbook, refresh_workbook, write_report_dir, ReportError, SheetEntry, WorkbookManifest,
    MANIFEST_FILE,
};

/// Spreadsheet sheet-name limit.
pub const MAX_SHEET_NAME_LEN: usize = 31;
pub const NO_ISSUES_SHEET: &str = "No issues found";

/// A flat defect record that can be laid out as one spreadsheet row.
pub trait TabularRecord {
    fn columns() -> &'static [&'static str];
    fn cells(&self) -> Vec<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    pub name: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub freeze_header: bool,
}

impl Sheet {
    pub fn new(name: &str, header: Vec<String>) -> Self {
        Self {
            name: sheet_name(name),
            header,
            rows: Vec::new(),
            freeze_header: false,
        }
    }

    pub fn from_records<T: TabularRecord>(name: &str, records: &[T]) -> Self {
        let header = T::columns().iter().map(|column| column.to_string()).collect();
        let mut sheet = Self::new(name, header);
        sheet.rows = records.iter().map(TabularRecord::cells).collect();
        sheet
    }

    pub fn frozen(mut self) -> Self {
        self.freeze_header = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Strip characters spreadsheets reject in sheet names and cut to the limit.
pub fn sheet_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|ch| match ch {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            other => other,
        })
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        return "Sheet".to_string();
    }
    trimmed.chars().take(MAX_SHEET_NAME_LEN).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefectWorkbook {
    pub sheets: Vec<Sheet>,
}

impl DefectWorkbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    /// One sheet per non-empty category, or a single placeholder sheet when
    /// every category is empty.
    pub fn from_categories(categories: Vec<Sheet>) -> Self {
        let sheets: Vec<Sheet> = categories
            .into_iter()
            .filter(|sheet| !sheet.is_empty())
            .collect();
        if sheets.is_empty() {
            return Self::new(vec![no_issues_sheet()]);
        }
        Self::new(sheets)
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|sheet| sheet.name.as_str()).collect()
    }

    pub fn retain_only(&mut self, name: &str) {
        self.sheets.retain(|sheet| sheet.name == name);
    }

    pub fn push(&mut self, sheet: Sheet) {
        self.sheets.retain(|existing| existing.name != sheet.name);
        self.sheets.push(sheet);
    }
}

fn no_issues_sheet() -> Sheet {
    let mut sheet = Sheet::new(NO_ISSUES_SHEET, vec!["message".to_string()]);
    sheet.rows.push(vec!["No issues found".to_string()]);
    sheet
}

pub(crate) fn optional_cell(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}
