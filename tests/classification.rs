use ecoscan::classify::{
    ADI_NUMERIC_SAFE_LIMIT, DEFAULT_SAFE, FactRecord, MISSING_DATA, RiskTier, RuleBook, STATUS_NOT_ALLOWED,
};
use ecoscan::code::NormalizedCode;
use ecoscan::registry::Registry;
use std::path::{Path, PathBuf};

fn root(file: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(file)
}

fn registry() -> Registry {
    Registry::load(root("tests/data/registry.csv")).expect("registry")
}

fn facts_for(registry: &Registry, code: &str) -> FactRecord {
    let entry = registry.lookup(code).expect("registered");
    FactRecord::from_entry(entry)
}

fn facts(flag: Option<&str>, adi: Option<&str>) -> FactRecord {
    let mut facts = FactRecord::new(NormalizedCode::parse("E330").unwrap());
    if let Some(flag) = flag {
        facts = facts.with_flag(flag);
    }
    if let Some(adi) = adi {
        facts = facts.with_intake(adi);
    }
    facts
}

#[test]
fn registry_rows_classify_as_expected() {
    let registry = registry();
    let book = RuleBook::standard();
    let expectations = [
        ("E123", Some(RiskTier::NotPermitted), STATUS_NOT_ALLOWED),
        ("E924a", Some(RiskTier::NotPermitted), STATUS_NOT_ALLOWED),
        ("E100", Some(RiskTier::Limited), ADI_NUMERIC_SAFE_LIMIT),
        ("E952", None, MISSING_DATA),
        ("E173", None, MISSING_DATA),
        ("E330", Some(RiskTier::Safe), DEFAULT_SAFE),
    ];
    for (code, risk, rule) in expectations {
        let outcome = book.classify(&facts_for(&registry, code));
        assert_eq!((outcome.risk, outcome.rule.as_str()), (risk, rule), "{code}");
    }
    let outcome = book.classify(&facts_for(&registry, "E100"));
    assert!(outcome.reason.contains("0-3"), "{}", outcome.reason);
}

#[test]
fn not_permitted_dominates_any_intake() {
    let book = RuleBook::standard();
    for adi in [None, Some("0-3"), Some("updating"), Some("nan"), Some("whatever")] {
        for flag in ["1", "BT", "banned", "Cấm", "not permitted"] {
            let outcome = book.classify(&facts(Some(flag), adi));
            assert_eq!(outcome.risk, Some(RiskTier::NotPermitted), "{flag} / {adi:?}");
        }
    }
}

#[test]
fn numeric_intake_gives_a_limit() {
    let book = RuleBook::standard();
    for flag in [None, Some("0"), Some("permitted")] {
        let outcome = book.classify(&facts(flag, Some("0-3")));
        assert_eq!(outcome.risk, Some(RiskTier::Limited));
        assert!(outcome.reason.contains("0-3"));
    }
    let outcome = book.classify(&facts(None, Some("15")));
    assert!(outcome.reason.contains("15"));
}

#[test]
fn missing_data_and_default_safe_stay_apart() {
    let book = RuleBook::standard();
    assert_eq!(book.classify(&facts(None, Some("updating"))).rule, MISSING_DATA);
    assert_eq!(book.classify(&facts(None, None)).rule, MISSING_DATA);
    assert_eq!(book.classify(&facts(Some("pending review"), None)).rule, MISSING_DATA);
    let outcome = book.classify(&facts(Some("0"), None));
    assert_eq!((outcome.risk, outcome.rule.as_str()), (Some(RiskTier::Safe), DEFAULT_SAFE));
    let outcome = book.classify(&facts(Some("cho phép"), Some("updating")));
    assert_eq!(outcome.rule, DEFAULT_SAFE);
}

#[test]
fn declarative_standard_book_matches_the_built_in_one() {
    let declarative = RuleBook::load(root("rules/standard.json")).expect("rule book");
    let standard = RuleBook::standard();
    assert_eq!(declarative.ids(), standard.ids());

    let registry = registry();
    let mut cases: Vec<FactRecord> = registry.entries().map(FactRecord::from_entry).collect();
    for flag in [None, Some("1"), Some("0"), Some("unclear")] {
        for adi in [None, Some("0-3"), Some("7.5"), Some("updating"), Some("nan"), Some("n.d.")] {
            cases.push(facts(flag, adi));
        }
    }
    for facts in &cases {
        assert_eq!(declarative.classify(facts), standard.classify(facts), "{facts:?}");
    }
}

#[test]
fn declarative_book_without_a_fallback_is_rejected() {
    let json = r#"{"rules": [
        {"id": "status_not_allowed", "risk": 4, "reason": "banned", "when": {"status": ["not_permitted"]}},
        {"id": "adi_numeric_safe_limit", "risk": 2, "reason": "ADI {adi}", "when": {"intake": ["limit"]}}
    ]}"#;
    assert!(RuleBook::from_json(json).is_err());
    assert!(RuleBook::from_json("not json").is_err());
    assert!(RuleBook::load(root("rules/missing.json")).is_err());
}
