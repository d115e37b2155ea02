//! Content processor properties: normalization idempotence, quality
//! thresholds, CAPTCHA heuristics, and structured harvesting.

use pagepilot::content::{
    ContentKind, assess_quality, captcha_from_text, detect_content_type, extract_structured,
    normalize, type_confidence,
};
use proptest::prelude::*;

#[test]
fn normalize_collapses_whitespace() {
    let normalized = normalize("hello    world\n\n\nagain");
    assert_eq!(normalized, "hello world again");
}

#[test]
fn normalize_strips_boilerplate_tokens() {
    let normalized = normalize("Home Menu real article text Search");
    assert!(!normalized.contains("Home"));
    assert!(!normalized.contains("Menu"));
    assert!(normalized.contains("real article text"));
}

#[test]
fn normalize_is_idempotent_on_fixtures() {
    let fixtures = [
        "Home  Login   some   content here....  done !",
        "© 2024 Example Corp\nActual content line\nPrivacy Policy footer",
        "   \n\n  ",
        "plain sentence.",
        "unicode — émojis 🦀 and    tabs\t\tcollapse",
    ];
    for fixture in fixtures {
        let once = normalize(fixture);
        let twice = normalize(&once);
        assert_eq!(once, twice, "not idempotent for {fixture:?}");
    }
}

proptest! {
    #[test]
    fn normalize_is_idempotent(input in ".{0,400}") {
        let once = normalize(&input);
        let twice = normalize(&once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn quality_score_is_bounded(input in ".{0,600}") {
        let metrics = assess_quality(&input);
        prop_assert!((0.0..=1.0).contains(&metrics.quality_score));
    }
}

#[test]
fn empty_content_scores_zero() {
    let metrics = assess_quality("");
    assert_eq!(metrics.word_count, 0);
    assert_eq!(metrics.char_count, 0);
    assert_eq!(metrics.quality_score, 0.0);
    assert!(!metrics.has_meaningful_content);
}

#[test]
fn meaningful_requires_length_words_and_score() {
    // Long, diverse, domain-term-rich content passes all three gates.
    let rich = "The quarterly earnings report shows substantial revenue growth across \
                every market segment the company operates in. Analysts described the \
                data as a thorough study of business performance, with profit margins \
                expanding and investment activity accelerating through the year.";
    let metrics = assess_quality(rich);
    assert!(metrics.char_count > 100);
    assert!(metrics.word_count > 10);
    assert!(metrics.quality_score > 0.3);
    assert!(metrics.has_meaningful_content);

    // Short content fails the char gate regardless of vocabulary.
    let short = assess_quality("market data report");
    assert!(!short.has_meaningful_content);

    // Repetitive filler fails on diversity/score.
    let filler = "word ".repeat(40);
    let metrics = assess_quality(&filler);
    assert!(metrics.char_count > 100 && metrics.word_count > 10);
    assert!(!metrics.has_meaningful_content);
}

#[test]
fn captcha_flags_starved_pages() {
    let reason = captcha_from_text("tiny page").expect("short content must flag");
    assert!(reason.contains("Insufficient content length"));
}

#[test]
fn captcha_flags_challenge_phrases_on_low_content() {
    let body = format!(
        "{} please complete the security check to continue",
        "padding words here ".repeat(30)
    );
    assert!(body.len() > 500 && body.len() < 1000);
    assert!(captcha_from_text(&body).is_some());
}

#[test]
fn captcha_ignores_phrases_on_substantial_pages() {
    let body = format!(
        "recaptcha is mentioned in passing in this long editorial. {}",
        "substantial discussion of the topic with plenty of detail. ".repeat(30)
    );
    assert!(body.len() >= 1000);
    assert!(captcha_from_text(&body).is_none());
}

#[test]
fn detects_financial_content() {
    let text = "The stock price jumped after earnings beat estimates; trading volume \
                and dividend outlook drove the market higher. Investment portfolios \
                rebalanced toward the share.";
    assert_eq!(detect_content_type(text), ContentKind::Financial);
    assert!(type_confidence(text, ContentKind::Financial) > 0.0);
}

#[test]
fn general_content_has_zero_confidence() {
    let text = "completely neutral sentence about nothing in particular";
    let kind = detect_content_type(text);
    if kind == ContentKind::General {
        assert_eq!(type_confidence(text, kind), 0.0);
    }
}

#[test]
fn confidence_is_bounded() {
    let dense = "stock market trading price share ".repeat(50);
    let confidence = type_confidence(&dense, ContentKind::Financial);
    assert!((0.0..=1.0).contains(&confidence));
}

#[test]
fn structured_financial_extraction() {
    let text = "AAPL closed at $182.50, up 2.3% on the day. MSFT added 1.1% to $405.12.";
    let data = extract_structured(text, "financial");
    let json = serde_json::to_value(&data).unwrap();
    let elements = &json["extracted_elements"];

    let symbols: Vec<&str> = elements["stock_symbols"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert!(symbols.contains(&"AAPL"));
    assert!(symbols.contains(&"MSFT"));

    let prices = elements["prices"].as_array().unwrap();
    assert!(prices.iter().any(|p| p.as_str() == Some("$182.50")));

    let percentages = elements["percentages"].as_array().unwrap();
    assert!(percentages.iter().any(|p| p.as_str() == Some("2.3%")));
}

#[test]
fn structured_forum_extraction_finds_mentions() {
    let text = "Interesting thread about rust async runtimes\n@alice said it depends\n@bob agreed with @alice";
    let data = extract_structured(text, "forum");
    let json = serde_json::to_value(&data).unwrap();
    let users: Vec<&str> = json["extracted_elements"]["users"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert_eq!(users, vec!["alice", "bob"]);
}

#[test]
fn structured_news_extraction_limits_headlines() {
    let text = (0..30)
        .map(|i| format!("Headline number {i} with enough length to qualify as one"))
        .collect::<Vec<_>>()
        .join("\n");
    let data = extract_structured(&text, "news");
    let json = serde_json::to_value(&data).unwrap();
    let headlines = json["extracted_elements"]["headlines"].as_array().unwrap();
    assert_eq!(headlines.len(), 10);
}
