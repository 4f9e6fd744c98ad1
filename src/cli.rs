use std::path::Path;

use serde::Serialize;
use serde_json::json;

use crate::config::RepairConfig;
use crate::graph::{load_graph_dir, load_graph_file, Graph, LoadReport};
use crate::providers::check_default_providers;
use crate::repair::Pipeline;
use crate::report::{open_workbook, refresh_workbook, write_report_dir, DefectWorkbook};
use crate::validate::{find_unit_references, validate_all};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Repair,
    Validate,
    Providers,
    Units,
    Inspect,
}

pub fn parse_command(args: &[String]) -> Option<Command> {
    match args.get(1).map(String::as_str) {
        Some("repair") => Some(Command::Repair),
        Some("validate") => Some(Command::Validate),
        Some("providers") => Some(Command::Providers),
        Some("units") => Some(Command::Units),
        Some("inspect") => Some(Command::Inspect),
        _ => None,
    }
}

pub fn run_with_args(args: &[String]) -> i32 {
    match parse_command(args) {
        Some(Command::Repair) => handle_repair(args),
        Some(Command::Validate) => handle_validate(args),
        Some(Command::Providers) => handle_providers(args),
        Some(Command::Units) => handle_units(args),
        Some(Command::Inspect) => handle_inspect(args),
        None => {
            eprintln!("usage: lci-qaqc <repair|validate|providers|units|inspect>");
            2
        }
    }
}

/// Positional arguments after the sub-command, flags and flag values removed.
fn positionals(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut iter = args.iter().skip(2);
    while let Some(arg) = iter.next() {
        if arg == "--workbook" {
            iter.next();
        } else if !arg.starts_with("--") {
            out.push(arg.as_str());
        }
    }
    out
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().skip(2).any(|arg| arg == flag)
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .skip(2)
        .position(|arg| arg == flag)
        .and_then(|index| args.get(index + 3))
        .map(String::as_str)
}

fn load_graph(path: &str) -> Result<(Graph, LoadReport), i32> {
    let path = Path::new(path);
    let loaded = if path.is_dir() {
        load_graph_dir(path)
    } else {
        load_graph_file(path)
    };
    loaded.map_err(|err| {
        eprintln!("failed to load graph: {err}");
        1
    })
}

fn load_config() -> Result<RepairConfig, i32> {
    RepairConfig::from_env().map_err(|err| {
        eprintln!("invalid configuration: {err}");
        1
    })
}

fn print_json<T: Serialize>(payload: &T, what: &str) -> i32 {
    match serde_json::to_string_pretty(payload) {
        Ok(payload) => {
            println!("{payload}");
            0
        }
        Err(err) => {
            eprintln!("failed to serialize {what}: {err}");
            1
        }
    }
}

fn handle_repair(args: &[String]) -> i32 {
    let positional = positionals(args);
    let Some(input) = positional.first().copied() else {
        eprintln!("usage: lci-qaqc repair <graph.json|graph-dir> [out.json] [--export]");
        return 2;
    };
    let output = positional.get(1).copied();

    let mut config = match load_config() {
        Ok(config) => config,
        Err(code) => return code,
    };
    if has_flag(args, "--export") {
        config.normalize_locations_for_export = true;
    }
    let (mut graph, load_report) = match load_graph(input) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };

    let pipeline = Pipeline::standard(&config);
    let repair_report = pipeline.run(&mut graph);
    let validation = validate_all(&graph);

    if let Some(output) = output {
        let rendered = match serde_json::to_string_pretty(&graph.to_value()) {
            Ok(rendered) => rendered,
            Err(err) => {
                eprintln!("failed to serialize repaired graph: {err}");
                return 1;
            }
        };
        if let Err(err) = std::fs::write(output, rendered) {
            eprintln!("failed to write '{output}': {err}");
            return 1;
        }
        eprintln!("repaired graph written: {output}");
    }

    print_json(
        &json!({
            "load": load_report,
            "repair": repair_report,
            "validation": validation.summary,
        }),
        "repair summary",
    )
}

fn handle_validate(args: &[String]) -> i32 {
    let Some(input) = positionals(args).first().copied() else {
        eprintln!("usage: lci-qaqc validate <graph.json|graph-dir>");
        return 2;
    };
    let (graph, _) = match load_graph(input) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };

    let report = validate_all(&graph);
    let code = print_json(&report, "validation report");
    if code != 0 {
        return code;
    }
    if report.is_clean() {
        eprintln!("validation passed: {input}");
        0
    } else {
        eprintln!("validation failed: {} defect(s)", report.defect_count());
        1
    }
}

fn handle_providers(args: &[String]) -> i32 {
    let positional = positionals(args);
    let (Some(input), Some(report_dir)) = (positional.first(), positional.get(1)) else {
        eprintln!(
            "usage: lci-qaqc providers <graph.json|graph-dir> <report-dir> [--debug] [--workbook <path>]"
        );
        return 2;
    };
    let workbook = flag_value(args, "--workbook");
    if has_flag(args, "--workbook") && workbook.is_none() {
        eprintln!("usage: --workbook requires a path");
        return 2;
    }

    let config = match load_config() {
        Ok(config) => config,
        Err(code) => return code,
    };
    let (graph, _) = match load_graph(input) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };

    let report = check_default_providers(&graph);
    let sheets = report.to_sheets();
    let written = match workbook {
        Some(existing) => refresh_workbook(
            Path::new(existing),
            Path::new(report_dir),
            sheets,
            &config.documentation_sheet,
        ),
        None => write_report_dir(
            Path::new(report_dir),
            &DefectWorkbook::from_categories(sheets),
        ),
    };
    if let Err(err) = written {
        eprintln!("failed to write provider report: {err}");
        return 1;
    }

    let code = if has_flag(args, "--debug") {
        print_json(&report, "provider report")
    } else {
        print_json(&report.stats, "provider stats")
    };
    if code != 0 {
        return code;
    }
    if report.defect_count() == 0 {
        eprintln!("no provider link issues found");
        0
    } else {
        eprintln!(
            "provider check found {} defect(s), report written to {report_dir}",
            report.defect_count()
        );
        1
    }
}

fn handle_units(args: &[String]) -> i32 {
    let positional = positionals(args);
    let (Some(input), Some(unit_id)) = (positional.first(), positional.get(1)) else {
        eprintln!("usage: lci-qaqc units <graph.json|graph-dir> <unit-group-id>");
        return 2;
    };
    let (graph, _) = match load_graph(input) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };

    let found = find_unit_references(&graph, unit_id);
    print_json(&found, "unit references")
}

fn handle_inspect(args: &[String]) -> i32 {
    let Some(path) = positionals(args).first().copied() else {
        eprintln!("usage: lci-qaqc inspect <report-dir|spreadsheet>");
        return 2;
    };

    match open_workbook(Path::new(path)) {
        Ok(workbook) => {
            let sheets: Vec<_> = workbook
                .sheets
                .iter()
                .map(|sheet| {
                    json!({
                        "name": sheet.name,
                        "columns": sheet.header,
                        "rows": sheet.rows.len(),
                        "freeze_header": sheet.freeze_header,
                    })
                })
                .collect();
            print_json(&json!({ "source": path, "sheets": sheets }), "workbook summary")
        }
        Err(err) => {
            eprintln!("failed to open workbook: {err}");
            1
        }
    }
}
