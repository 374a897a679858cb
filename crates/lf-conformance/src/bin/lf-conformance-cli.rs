#![forbid(unsafe_code)]

use std::path::PathBuf;

use lf_conformance::{HarnessConfig, run_fixture_suite_filtered, write_report_json};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = HarnessConfig::default_paths();
    let mut case_filter: Option<String> = None;
    let mut report_path: Option<PathBuf> = None;
    let mut require_green = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--fixture-root" => {
                let value = args.next().ok_or("--fixture-root requires a directory")?;
                config.fixture_root = PathBuf::from(value);
            }
            "--case-id" => {
                let value = args
                    .next()
                    .ok_or("--case-id requires a value (e.g. merge_inner_basic)")?;
                case_filter = Some(value);
            }
            "--report" => {
                let value = args.next().ok_or("--report requires a file path")?;
                report_path = Some(PathBuf::from(value));
            }
            "--lenient" => {
                config.strict_mode = false;
            }
            "--require-green" => {
                require_green = true;
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            other => {
                return Err(format!("unknown argument: {other}").into());
            }
        }
    }

    let report = run_fixture_suite_filtered(&config, case_filter.as_deref())?;
    println!(
        "suite={} fixtures={} passed={} failed={} green={}",
        report.suite,
        report.fixture_count,
        report.passed,
        report.failed,
        report.is_green()
    );
    for failure in report.failures() {
        println!(
            "FAIL case={} operation={:?} mismatch={}",
            failure.case_id,
            failure.operation,
            failure.mismatch.as_deref().unwrap_or("<none>")
        );
    }

    if let Some(path) = report_path {
        write_report_json(&report, &path)?;
        println!("wrote {}", path.display());
    }

    if require_green && !report.is_green() {
        return Err(format!("suite {} is not green", report.suite).into());
    }
    Ok(())
}

fn print_help() {
    println!(
        "lf-conformance-cli [--fixture-root DIR] [--case-id ID] [--report PATH] [--lenient] [--require-green]\n\
         \n\
         --fixture-root DIR  read fixtures from DIR instead of the bundled set\n\
         --case-id ID        run a single fixture\n\
         --report PATH       write the JSON report to PATH\n\
         --lenient           accept fixtures that declare no expectation\n\
         --require-green     exit non-zero unless every fixture passes"
    );
}
