use std::time::{Duration, Instant};

use marknote::image_codec::{
    contract_images, find_image_fragments, to_editing_form, to_preview_form, to_storage_form,
    ImageReplacements, ScanStrategy, PREVIEW_MARKER,
};

fn image(alt: &str, payload: &str) -> String {
    format!("![{}](data:image/png;base64,{})", alt, payload)
}

fn sample_note() -> String {
    format!(
        "# Trip\n\nDay one:\n{}\n\nDay two {} and {}\n\n![](data:image/jpeg;base64,/9j/4AAQSkZJRg==)\n",
        image("beach", &"QUJD".repeat(600)),
        image("hike", "aGlrZQ=="),
        image("beach", &"WFla".repeat(600)),
    )
}

#[test]
fn test_round_trip_law() {
    let notes = [
        String::new(),
        "no images at all\n".to_string(),
        image("cat", "AAAA"),
        sample_note(),
        format!("{}{}", image("a", "AAAA"), image("a", "AAAA")),
    ];

    for note in &notes {
        let form = to_editing_form(note);
        assert_eq!(&to_storage_form(&form.text, &form.replacements), note);
    }
}

#[test]
fn test_editing_form_is_light() {
    let note = sample_note();
    let form = to_editing_form(&note);

    assert!(!form.text.contains("base64"));
    assert_eq!(form.replacements.len(), 4);
    assert!(form.text.contains("![beach](IMAGE:2KB:beach)"));
    assert!(form.text.contains("![beach](IMAGE:2KB:beach~2)"));
    assert!(form.text.contains("![](IMAGE:0KB:image.jpg)"));
}

#[test]
fn test_cat_placeholder() {
    let original = "![cat](data:image/png;base64,AAAA)";
    let form = to_editing_form(original);

    assert_eq!(form.text, "![cat](IMAGE:0KB:cat)");
    assert_eq!(form.replacements.get("![cat](IMAGE:0KB:cat)"), Some(original));
}

#[test]
fn test_missing_entry_passes_through() {
    let mut form = to_editing_form(&sample_note());
    form.replacements.clear();

    assert_eq!(to_storage_form(&form.text, &form.replacements), form.text);
}

#[test]
fn test_preview_bounding() {
    let note = format!(
        "{}\n{}\n{}",
        image("one", "AAAA"),
        image("two", "BBBB"),
        image("three", "CCCC")
    );
    let form = to_editing_form(&note);

    let preview = to_preview_form(&form.text, &form.replacements, 1);
    assert_eq!(preview.matches("base64").count(), 1);
    assert_eq!(preview.matches(PREVIEW_MARKER).count(), 2);
    assert!(preview.starts_with(&image("one", "AAAA")));

    // Idempotent for the same inputs
    assert_eq!(preview, to_preview_form(&form.text, &form.replacements, 1));

    // Budget follows document order, whatever the map's iteration order
    let reordered = form
        .text
        .lines()
        .rev()
        .collect::<Vec<_>>()
        .join("\n");
    let preview = to_preview_form(&reordered, &form.replacements, 1);
    assert!(preview.starts_with(&image("three", "CCCC")));
    assert_eq!(preview.matches(PREVIEW_MARKER).count(), 2);
}

#[test]
fn test_preview_large_budget_equals_storage() {
    let form = to_editing_form(&sample_note());
    assert_eq!(
        to_preview_form(&form.text, &form.replacements, 100),
        to_storage_form(&form.text, &form.replacements)
    );
}

#[test]
fn test_linear_scan_matches_regex_on_large_document() {
    if marknote::init_logging().is_err() {
        log::debug!("Logger already installed");
    }

    let mut note = String::new();
    for i in 0..200 {
        note.push_str(&format!("## Entry {}\n\n", i));
        note.push_str(&image(&format!("shot {}", i), &"QUJD".repeat(100 + i)));
        note.push_str("\n![not an image](https://example.com/x.png)\n");
        if i % 17 == 0 {
            note.push_str("![cut](data:image/png;base64,AAAA\n");
        }
    }

    assert_eq!(
        find_image_fragments(&note, ScanStrategy::Regex),
        find_image_fragments(&note, ScanStrategy::Linear)
    );

    let mut by_regex = ImageReplacements::new();
    let mut by_scan = ImageReplacements::new();
    let (regex_text, regex_malformed) = contract_images(&note, &mut by_regex, usize::MAX);
    let (scan_text, scan_malformed) = contract_images(&note, &mut by_scan, 1024);

    assert_eq!(regex_text, scan_text);
    assert_eq!(by_regex, by_scan);
    assert_eq!(regex_malformed, scan_malformed);
    assert_eq!(regex_malformed.len(), 12);
    assert_eq!(to_storage_form(&scan_text, &by_scan), note);
}

#[test]
fn test_replacements_serialize_as_plain_map() {
    let form = to_editing_form(&image("cat", "AAAA"));
    let value = serde_json::to_value(&form.replacements).unwrap();
    assert_eq!(
        value,
        serde_json::json!({ "![cat](IMAGE:0KB:cat)": "![cat](data:image/png;base64,AAAA)" })
    );
}

#[test]
fn test_linear_scan_stays_fast_on_unclosed_brackets() {
    let brackets = "![".repeat(1_000_000);
    let truncated = format!(
        "{}](data:image/png;base64,{}",
        "![".repeat(200_000),
        "A".repeat(400_000)
    );

    for note in [&brackets, &truncated] {
        let started = Instant::now();
        assert!(find_image_fragments(note, ScanStrategy::Linear).is_empty());
        let form = to_editing_form(note);
        assert_eq!(&form.text, note);
        assert!(
            started.elapsed() < Duration::from_secs(5),
            "scan of {} bytes took {:?}",
            note.len(),
            started.elapsed()
        );
    }

    let small = "![".repeat(20_000);
    assert_eq!(
        find_image_fragments(&small, ScanStrategy::Regex),
        find_image_fragments(&small, ScanStrategy::Linear)
    );
}

#[test]
fn test_round_trip_with_literal_placeholder_in_note() {
    let note = format!("old: ![cat](IMAGE:0KB:cat)\nnew: {}", image("cat", "AAAA"));
    let form = to_editing_form(&note);

    assert_eq!(form.text.matches("![cat](IMAGE:0KB:cat)").count(), 1);
    assert!(form.text.contains("![cat](IMAGE:0KB:cat~2)"));
    assert_eq!(to_storage_form(&form.text, &form.replacements), note);
}
