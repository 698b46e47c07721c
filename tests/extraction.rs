use ecoscan::code::NormalizedCode;
use ecoscan::engine::{Engine, ReferenceTables};
use ecoscan::extract::DigitMap;
use ecoscan::synonym::{FuzzyConfig, MatchMode};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn data(file: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(file)
}

fn engine() -> Engine {
    let tables = ReferenceTables::load(&data("registry.csv"), Some(&data("synonyms.csv"))).expect("tables");
    Engine::new(Arc::new(tables))
}

fn codes(engine: &Engine, text: &str) -> Vec<String> {
    engine.extract_codes(text).into_iter().map(|c| c.to_string()).collect()
}

#[test]
fn every_registered_id_extracts_with_either_marker() {
    let engine = engine();
    let ids: Vec<NormalizedCode> = engine.registry().entries().map(|e| e.code.clone()).collect();
    assert_eq!(ids.len(), 24);
    for id in &ids {
        for text in [format!("E{id}"), format!("INS {id}"), format!("e-{id}")] {
            assert_eq!(codes(&engine, &text), vec![id.to_string()], "{text}");
        }
    }
}

#[test]
fn every_registered_id_round_trips_through_a_sentence() {
    let engine = engine();
    for entry in engine.registry().entries() {
        let text = format!("Thành phần: đường, {}, muối.", entry.code);
        assert_eq!(codes(&engine, &text), vec![entry.code.to_string()], "{text}");
    }
}

#[test]
fn ocr_confusions_extract_like_clean_text() {
    let engine = engine();
    assert_eq!(codes(&engine, "E33O"), codes(&engine, "E330"));
    assert_eq!(codes(&engine, "E2II"), vec!["211"]);
    assert_eq!(codes(&engine, "INS 95l"), vec!["951"]);
    assert_eq!(codes(&engine, "chất tạo màu (E1OO)"), vec!["100"]);
    assert_eq!(codes(&engine, "đường, 33O, 2l1"), vec!["211", "330"]);
}

#[test]
fn letter_suffixes_that_look_like_digits() {
    let engine = engine();
    assert_eq!(codes(&engine, "E150b"), vec!["150b"]);
    assert_eq!(codes(&engine, "phẩm màu caramel (INS 150b)"), vec!["150b"]);
    assert_eq!(codes(&engine, "E150a, E150b, E150c, E150d"), vec!["150a", "150b", "150c", "150d"]);
    assert_eq!(codes(&engine, "150b"), vec!["150b"]);
}

#[test]
fn measurements_are_not_codes() {
    let engine = engine();
    assert!(codes(&engine, "100 g").is_empty());
    assert!(codes(&engine, "per 100g, energy 250kcal").is_empty());
    assert!(codes(&engine, "Khối lượng tịnh: 250").is_empty());
    assert!(codes(&engine, "Năng lượng 120 kcal\nProtein 6 g\n250 g, 330 ml").is_empty());
    assert!(codes(&engine, "Giá trị dinh dưỡng trong 100 g").is_empty());
}

#[test]
fn marked_codes_survive_measurement_context() {
    let engine = engine();
    assert_eq!(codes(&engine, "Net weight E330 250 g"), vec!["330"]);
    assert_eq!(codes(&engine, "120 g\nE211"), vec!["211"]);
}

#[test]
fn unregistered_codes_never_survive() {
    let engine = engine();
    assert!(codes(&engine, "E999").is_empty());
    assert!(codes(&engine, "E160b").is_empty());
    assert_eq!(codes(&engine, "E330, E999, 1234"), vec!["330"]);
}

#[test]
fn results_are_sorted_and_distinct() {
    let engine = engine();
    assert_eq!(
        codes(&engine, "E621, bột ngọt, E330, axit citric, 330, E100"),
        vec!["100", "330", "621"]
    );
}

#[test]
fn synonyms_resolve_to_codes() {
    let engine = engine();
    assert_eq!(codes(&engine, "Ingredients: water, citric acid, salt"), vec!["330"]);
    assert_eq!(codes(&engine, "Gia vị (muối, BỘT NGỌT)"), vec!["621"]);
    assert_eq!(codes(&engine, "natri benzoat và gôm guar"), vec!["211", "412"]);
    // synonym codes outside the registry are dropped like any other
    assert!(codes(&engine, "orphan nothing").is_empty());
}

#[test]
fn fuzzy_matching_is_opt_in() {
    let exact = engine();
    let fuzzy = exact.clone().with_matching(MatchMode::Fuzzy, FuzzyConfig::default());
    assert!(codes(&exact, "guar gmu").is_empty());
    assert_eq!(codes(&fuzzy, "guar gmu"), vec!["412"]);
    assert_eq!(codes(&fuzzy, "aspartam"), vec!["951"]);
}

#[test]
fn b_can_read_as_six() {
    let default = engine();
    assert!(codes(&default, "E1b0a(i)").is_empty());
    let six = default.clone().with_digit_map(DigitMap::default().with_override('b', '6').unwrap());
    assert_eq!(codes(&six, "E1b0a(i)"), vec!["160a(i)"]);
}

#[test]
fn range_follows_the_registry() {
    let engine = engine();
    let range = engine.registry().range();
    assert_eq!((range.min, range.max), (100, 1520));
    let candidates = engine.extract_candidates("E099 E1521 E1520");
    assert_eq!(candidates.len(), 1);
}
