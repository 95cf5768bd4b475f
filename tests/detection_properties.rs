// tests/detection_properties.rs
use news_source_detector::detect::score_source;
use news_source_detector::text::Haystack;
use news_source_detector::{
    detect_intelligent, detect_simple, validate_content, DetectionMethod, DetectionRules, Source,
};
use proptest::prelude::*;

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn name_only_match_scores_half() {
    let sources = vec![
        Source::new(1, "Harbor Police"),
        Source::new(2, "Springfield Department of Works"),
    ];
    let d = detect_intelligent("springfield department of works: crews on site", &sources, 30)
        .expect("detected");
    assert_eq!(d.source.id, 2);
    assert!(approx(d.confidence, 0.5));
    assert_eq!(d.raw_score, 50.0);
    assert_eq!(d.method, DetectionMethod::NameMatch);
}

#[test]
fn first_of_tied_sources_wins() {
    let sources = vec![
        Source::new(1, "Alpha Desk").with_keywords("storm"),
        Source::new(2, "Beta Desk").with_keywords("storm"),
    ];
    let d = detect_intelligent("storm warning tonight", &sources, 20).unwrap();
    assert_eq!(d.source.id, 1);
}

#[test]
fn threshold_is_inclusive() {
    let sources = vec![Source::new(1, "Alpha Desk").with_keywords("storm, flood")];
    // 40 points exactly.
    assert!(detect_intelligent("storm and flood", &sources, 40).is_some());
    assert!(detect_intelligent("storm and flood", &sources, 41).is_none());
}

#[test]
fn corrupt_rules_do_not_block_other_sources() {
    let sources = vec![
        Source::new(1, "Broken Source").with_rules("[{\"type\":\"contains\""),
        Source::new(2, "Good Source")
            .with_rules(r#"[{"type":"contains","value":"berth","weight":30}]"#),
    ];
    let d = detect_intelligent("berth 7 is closed", &sources, 30).unwrap();
    assert_eq!(d.source.id, 2);
    assert_eq!(d.method, DetectionMethod::RuleMatch);
}

#[test]
fn simple_mode_examples() {
    let sources = vec![Source::new(1, "Springfield Department of Works")];
    let d = detect_simple("The Springfield Department of Works announced...", &sources).unwrap();
    assert_eq!(d.method, DetectionMethod::NameMatch);
    assert_eq!(d.confidence, 1.0);

    let sources = vec![Source::new(1, "Greek Desk").with_keywords("alpha, beta, gamma")];
    let d = detect_simple("alpha then beta", &sources).unwrap();
    assert_eq!(d.method, DetectionMethod::KeywordMatch);
    assert!(approx(d.confidence, 0.7));
}

#[test]
fn forty_words_without_keywords_warns_twice_and_stays_valid() {
    let s = Source::new(1, "Water Board").with_keywords("reservoir");
    let content = vec!["lorem"; 40].join(" ");
    let v = validate_content(&s, &content, 50);
    assert!(v.valid);
    assert_eq!(v.warnings.len(), 2);
}

#[test]
fn structured_rules_round_trip_through_json() {
    let s = Source::new(1, "Port Authority").with_rules(
        r#"[{"type":"regex","value":"/berth \\d+/i","weight":25},{"type":"word_count_min","value":"40"},{"type":"required","value":"Harbor Master"}]"#,
    );
    let json = serde_json::to_string(&s).unwrap();
    let back: Source = serde_json::from_str(&json).unwrap();
    assert_eq!(back.detection_rules, s.detection_rules);
    assert_eq!(back.detection_rules.rules().unwrap().len(), 3);
}

#[test]
fn empty_inputs_are_not_detected() {
    let sources = vec![Source::new(1, "Water Board")];
    assert!(detect_intelligent("", &sources, 0).is_none());
    assert!(detect_intelligent("Water Board", &[], 0).is_none());
    assert!(detect_simple("   ", &sources).is_none());
}

proptest! {
    #[test]
    fn present_keyword_adds_exactly_twenty(
        others in prop::collection::vec("[a-z]{3,8}", 0..5),
        pos in 0usize..6,
    ) {
        let content = format!("bulletin about zephyrine and {}", others.join(" "));
        let hay = Haystack::new(&content);

        let without = Source::new(1, "Qqqq Nobody").with_keywords(&others.join(","));
        let mut with_kw = others.clone();
        let at = pos.min(with_kw.len());
        with_kw.insert(at, "zephyrine".to_string());
        let with = Source::new(1, "Qqqq Nobody").with_keywords(&with_kw.join(","));

        let a = score_source(&hay, &without).total();
        let b = score_source(&hay, &with).total();
        prop_assert_eq!(b - a, 20);
    }

    #[test]
    fn confidence_stays_in_unit_range(
        kws in prop::collection::vec("[a-z]{3,6}", 1..8),
        weight in -50i64..200,
    ) {
        let content = kws.join(" ");
        let rules = format!(r#"[{{"type":"contains","value":"{}","weight":{}}}]"#, kws[0], weight);
        let sources = vec![Source::new(1, "Zz Desk")
            .with_keywords(&kws.join(","))
            .with_rules(rules)];
        if let Some(d) = detect_intelligent(&content, &sources, 0) {
            prop_assert!(d.confidence > 0.0 && d.confidence <= 1.0);
        }
    }

    #[test]
    fn rules_never_panic_on_arbitrary_raw(raw in ".{0,64}") {
        let rules = DetectionRules::from_raw(raw);
        let hay = Haystack::new("anything at all");
        let _ = rules.score(&hay);
    }
}
