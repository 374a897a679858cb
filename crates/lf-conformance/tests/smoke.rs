use std::fs;
use std::path::Path;

use lf_conformance::{
    CaseStatus, HarnessConfig, run_fixture_suite, run_fixture_suite_filtered, run_smoke,
    write_report_json,
};

#[test]
fn smoke_report_counts_bundled_fixtures() {
    let cfg = HarnessConfig::default_paths();
    let report = run_smoke(&cfg);
    assert_eq!(report.suite, "smoke");
    assert!(report.fixture_count >= 1);
    assert!(Path::new(&cfg.fixture_root.join("merge_inner_basic.json")).exists());
}

#[test]
fn bundled_fixture_suite_is_green() {
    let cfg = HarnessConfig::default_paths();
    let report = run_fixture_suite(&cfg).expect("suite should run");
    let failures = report
        .failures()
        .into_iter()
        .map(|case| format!("{}: {:?}", case.case_id, case.mismatch))
        .collect::<Vec<_>>();
    assert!(report.is_green(), "failures: {failures:#?}");
    assert_eq!(report.passed, report.fixture_count);
}

#[test]
fn case_filter_runs_a_single_fixture() {
    let cfg = HarnessConfig::default_paths();
    let report =
        run_fixture_suite_filtered(&cfg, Some("merge_outer_order")).expect("suite should run");
    assert_eq!(report.fixture_count, 1);
    assert_eq!(report.suite, "fixtures:merge_outer_order");
    assert_eq!(report.results[0].status, CaseStatus::Pass);
    assert_eq!(report.results[0].evidence_records, 1);
}

#[test]
fn custom_fixture_root_and_report_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fixtures = dir.path().join("fixtures");
    fs::create_dir_all(fixtures.join("nested")).expect("mkdir");
    fs::write(
        fixtures.join("nested").join("sort.json"),
        r#"{"case_id":"sort","operation":"series_sort","series":[2,1],"expected_values":[1,2]}"#,
    )
    .expect("write fixture");
    fs::write(
        fixtures.join("broken.json"),
        r#"{"case_id":"broken","operation":"series_sort","series":[2,1],"expected_values":[2,1]}"#,
    )
    .expect("write fixture");

    let cfg = HarnessConfig::with_fixture_root(&fixtures);
    let report = run_fixture_suite(&cfg).expect("suite should run");
    assert_eq!(report.fixture_count, 2);
    assert_eq!(report.failed, 1);
    assert!(!report.is_green());
    assert_eq!(report.failures()[0].case_id, "broken");

    let out = dir.path().join("reports").join("report.json");
    write_report_json(&report, &out).expect("write report");
    let body = fs::read_to_string(&out).expect("read report");
    assert!(body.contains("\"case_id\": \"sort\""));
}

#[test]
fn empty_fixture_root_is_never_green() {
    let dir = tempfile::tempdir().expect("tempdir");
    let report =
        run_fixture_suite(&HarnessConfig::with_fixture_root(dir.path())).expect("suite should run");
    assert_eq!(report.fixture_count, 0);
    assert!(!report.is_green());
}
