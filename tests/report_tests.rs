use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use lci_qaqc::report::{
    open_workbook, refresh_workbook, write_report_dir, DefectWorkbook, ReportError, Sheet,
    WorkbookManifest, MANIFEST_FILE, NO_ISSUES_SHEET,
};

fn unique_temp_path(name: &str) -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be after unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("lci-qaqc-{name}-{stamp}"))
}

fn sheet(name: &str, header: &[&str], rows: &[&[&str]]) -> Sheet {
    let mut sheet = Sheet::new(name, header.iter().map(|h| h.to_string()).collect());
    sheet.rows = rows
        .iter()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect();
    sheet
}

fn documentation() -> Sheet {
    sheet(
        "Documentation",
        &["Field", "Meaning"],
        &[
            &["targetID", "flow being supplied"],
            &["foundPrvID", "resolved provider process", "see notes"],
        ],
    )
}

#[test]
fn empty_categories_collapse_into_placeholder_sheet() {
    let workbook = DefectWorkbook::from_categories(vec![
        sheet("noMatchPrvToExc", &["targetPrvID"], &[]),
        sheet("noMatchExcInFoundPrv", &["targetID"], &[]),
    ]);

    assert_eq!(workbook.sheet_names(), vec![NO_ISSUES_SHEET]);
}

#[test]
fn long_sheet_names_are_truncated_to_the_spreadsheet_limit() {
    let workbook = DefectWorkbook::from_categories(vec![sheet(
        "matchingExchangeFromProviderIsInput",
        &["targetID"],
        &[&["f1"]],
    )]);

    let names = workbook.sheet_names();
    assert_eq!(names.len(), 1);
    assert_eq!(names[0].chars().count(), 31);
    assert!("matchingExchangeFromProviderIsInput".starts_with(names[0]));
}

#[test]
fn report_dir_round_trips_through_manifest() {
    let dir = unique_temp_path("report");
    let workbook = DefectWorkbook::new(vec![
        documentation(),
        sheet("noMatchPrvToExc", &["targetPrvID", "targetPrvName"], &[&["p9", "grid"]]).frozen(),
    ]);

    let manifest = write_report_dir(&dir, &workbook).expect("report should be written");
    assert_eq!(manifest.tool, "lci-qaqc");
    assert_eq!(manifest.sheets.len(), 2);
    assert_eq!(manifest.sheets[1].file, "02_noMatchPrvToExc.csv");
    assert!(manifest.sheets[1].freeze_header);

    let raw = fs::read_to_string(dir.join(MANIFEST_FILE)).expect("manifest exists");
    let stored: WorkbookManifest = serde_json::from_str(&raw).expect("manifest parses");
    assert_eq!(stored, manifest);

    let reopened = open_workbook(&dir).expect("report should reopen");
    assert_eq!(reopened, workbook);

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn refresh_keeps_only_documentation_and_freezes_new_headers() {
    let source = unique_temp_path("refresh-source");
    let output = unique_temp_path("refresh-output");
    write_report_dir(
        &source,
        &DefectWorkbook::new(vec![
            documentation(),
            sheet("stale results", &["a"], &[&["1"], &["2"]]),
        ]),
    )
    .expect("source report");

    let manifest = refresh_workbook(
        &source,
        &output,
        vec![
            sheet("issueWithFlowPrvMetadata", &["parentProcessID"], &[]),
            sheet("noMatchPrvToExc", &["targetPrvID"], &[&["p9"]]),
        ],
        "Documentation",
    )
    .expect("refresh should succeed");

    let names: Vec<_> = manifest.sheets.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Documentation", "issueWithFlowPrvMetadata", "noMatchPrvToExc"]
    );
    assert!(!manifest.sheets[0].freeze_header);
    assert!(manifest.sheets[1].freeze_header);
    assert_eq!(manifest.sheets[1].rows, 0);

    let refreshed = open_workbook(&output).expect("refreshed report opens");
    assert_eq!(refreshed.sheet("Documentation"), Some(&documentation()));

    let _ = fs::remove_dir_all(source);
    let _ = fs::remove_dir_all(output);
}

#[test]
fn rewriting_a_report_dir_removes_stale_sheet_files() {
    let dir = unique_temp_path("rewrite");
    write_report_dir(
        &dir,
        &DefectWorkbook::new(vec![sheet("first", &["a"], &[]), sheet("second", &["b"], &[])]),
    )
    .expect("first write");
    write_report_dir(&dir, &DefectWorkbook::new(vec![sheet("only", &["c"], &[])]))
        .expect("second write");

    assert!(!dir.join("02_second.csv").exists());
    assert!(dir.join("01_only.csv").exists());

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn refresh_of_missing_workbook_fails() {
    let missing = unique_temp_path("missing.xlsx");
    let output = unique_temp_path("never-written");

    let err = refresh_workbook(&missing, &output, Vec::new(), "Documentation")
        .expect_err("missing workbook");
    assert!(matches!(err, ReportError::NotFound(_)));
    assert!(!output.exists());
}

#[test]
fn unsupported_sources_are_rejected() {
    let path = unique_temp_path("notes.txt");
    fs::write(&path, "not a workbook").expect("temp file");

    let err = open_workbook(&path).expect_err("plain text is not a workbook");
    assert!(matches!(err, ReportError::Unsupported(_)));

    let _ = fs::remove_file(path);
}
