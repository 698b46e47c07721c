use ecoscan::EcoscanError;
use ecoscan::code::NormalizedCode;
use ecoscan::registry::Registry;
use ecoscan::synonym::SynonymTable;
use std::io::Write;
use std::path::{Path, PathBuf};

fn data(file: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(file)
}

fn csv_file(body: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file
}

#[test]
fn registry_skips_malformed_rows() {
    let registry = Registry::load(data("registry.csv")).unwrap();
    assert_eq!(registry.len(), 24);
    let beta = registry.get(&NormalizedCode::parse("E160a(ii)").unwrap()).unwrap();
    assert_eq!(beta.name.as_deref(), Some("Beta-carotene (vegetable)"));
    assert_eq!(beta.adi, None);
    let citric = registry.lookup("E330").unwrap();
    assert_eq!(citric.functions, vec!["Acidity regulator", "Antioxidant"]);
    let nitrite = registry.lookup("E250").unwrap();
    assert_eq!(nitrite.functions, vec!["Preservative", "Color fixative"]);
    assert!(registry.digest().is_some());
}

#[test]
fn registry_headers_are_trimmed_and_lowercased() {
    let file = csv_file(" INS ,Name, ADI ,Status_VN\nE330,Citric acid,,0\nE100,Curcumin,0-3,0\n");
    let registry = Registry::load(file.path()).unwrap();
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.lookup("330").unwrap().status.as_deref(), Some("0"));
    assert_eq!(registry.lookup("100").unwrap().adi.as_deref(), Some("0-3"));
}

#[test]
fn registry_without_ins_column_is_fatal() {
    let file = csv_file("code,name\nE330,Citric acid\n");
    match Registry::load(file.path()) {
        Err(EcoscanError::TableLoad { table, message, .. }) => {
            assert_eq!(table, "registry");
            assert!(message.contains("ins"));
        }
        other => panic!("expected a table load error, got {other:?}"),
    }
}

#[test]
fn registry_without_numeric_identifiers_is_fatal() {
    let file = csv_file("ins,name\nX1,Nothing\n,Blank\n");
    assert!(matches!(Registry::load(file.path()), Err(EcoscanError::TableLoad { .. })));
    assert!(Registry::load(data("absent.csv")).is_err());
}

#[test]
fn synonyms_load_with_either_code_header() {
    let table = SynonymTable::load(data("synonyms.csv")).unwrap();
    // 3 + 4 + 2 + 2 + 1 + 1 phrases; the orphan rows are skipped
    assert_eq!(table.len(), 13);

    let file = csv_file("Code,Synonyms\nE330,\"citric acid,  , axit citric\"\n");
    let table = SynonymTable::load(file.path()).unwrap();
    let phrases: Vec<&str> = table.entries().map(|e| e.phrase.as_str()).collect();
    assert_eq!(phrases, vec!["citric acid", "axit citric"]);
}

#[test]
fn synonyms_without_required_columns_are_fatal() {
    let file = csv_file("ecode,names\nE330,citric acid\n");
    assert!(SynonymTable::load(file.path()).is_err());
    assert!(SynonymTable::load(data("absent.csv")).is_err());
}
