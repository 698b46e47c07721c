use ecoscan::classify::RuleBook;
use ecoscan::evaluate::evaluate;
use ecoscan::registry::Registry;
use std::path::Path;

fn registry() -> Registry {
    Registry::load(Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data/registry.csv")).unwrap()
}

#[test]
fn standard_book_against_fixture_labels() {
    let report = evaluate(&registry(), &RuleBook::standard());
    assert_eq!((report.evaluated, report.skipped, report.matches), (23, 1, 22));
    // rows are labels 1, 2, 4; columns predictions 1, 2, 4, none
    assert_eq!(report.confusion, [[7, 0, 0, 0], [0, 13, 0, 1], [0, 0, 2, 0]]);
    assert_eq!(report.mismatches.len(), 1);
    assert_eq!(report.mismatches[0].code.as_str(), "952");
    assert_eq!(report.mismatches[0].rule, "missing_data");

    let metrics = report.metrics();
    assert_eq!(metrics[0].precision, 1.0);
    assert_eq!(metrics[1].support, 14);
    assert!((metrics[1].recall - 13.0 / 14.0).abs() < 1e-9);
    assert!(report.to_string().contains("accuracy 0.957"));
}

#[test]
fn mismatches_export_as_csv() {
    let report = evaluate(&registry(), &RuleBook::standard());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("errors.csv");
    report.write_mismatches(&path).unwrap();

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
    assert_eq!(headers, vec!["code", "name", "adi", "status", "label", "predicted", "rule"]);
    let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(&rows[0][0], "952");
    assert_eq!(&rows[0][5], "");
}
