mod common;

use common::paper;
use paperref::detector::{self, MatchConfig};
use paperref::{codec, Entry, EntryStore, Side};
use rstest::rstest;

fn sample_library() -> Vec<Entry> {
    vec![
        paper("Smith20", "Deep Learning for BibTeX", "2020")
            .with_field("author", "Smith, John and Doe, Jane")
            .with_field("journal", "Nature")
            .with_field("pages", "1-10"),
        Entry::new("Doe99", "book")
            .with_field("title", "A Book")
            .with_field("publisher", "Acme")
            .with_field("x-custom", "kept as is"),
        Entry::new("note1", "misc").with_field("note", "only a note"),
    ]
}

#[test]
fn test_encode_decode_roundtrip_preserves_entries() {
    let entries = sample_library();
    let decoded = codec::decode(&codec::encode(&entries)).unwrap();
    assert_eq!(decoded, entries);
}

#[rstest]
#[case::page_range(Entry::new("k2", "article").with_field("pages", "1--10"))]
#[case::custom_type(Entry::new("c1", "customtype").with_field("title", "Odd one"))]
#[case::conference(Entry::new("conf", "conference").with_field("booktitle", "Proc"))]
#[case::crossref(
    Entry::new("a", "inproceedings")
        .with_field("title", "T")
        .with_field("crossref", "p")
        .with_field("year", "2020")
)]
#[case::protected_case(paper("b", "The {BERT} Model", "2019"))]
#[case::tex_accent(Entry::new("e", "misc").with_field("author", "Erd{\\H o}s, Paul"))]
fn test_roundtrip_keeps_entry_as_written(#[case] entry: Entry) {
    let decoded = codec::decode(&codec::encode(std::slice::from_ref(&entry))).unwrap();
    assert_eq!(decoded, vec![entry]);
}

#[test]
fn test_crossref_child_keeps_its_year_for_matching() {
    let text = "@proceedings{p,\n  title = {Proc},\n  publisher = {ACM},\n  year = {2019}\n}\n\n\
                @inproceedings{a,\n  title = {Graph Networks},\n  crossref = {p},\n  year = {2020}\n}\n";
    let store = EntryStore::from_entries(codec::decode(text).unwrap()).unwrap();
    let incoming = vec![paper("b", "Graph Networks", "2020")];

    let proposal = detector::plan_import(&store, incoming, &MatchConfig::default());
    assert_eq!(proposal.stats.added, 0);
    assert_eq!(proposal.library.len(), 2);
}

#[test]
fn test_encoding_decoded_text_is_stable() {
    let once = codec::encode(&sample_library());
    let twice = codec::encode(&codec::decode(&once).unwrap());
    assert_eq!(once, twice);
}

#[rstest]
#[case(paper("a", "Deep Learning", "2020"), paper("b", "deep learning!", "2020"))]
#[case(paper("a", "Graph Networks Revisited", "2019"), paper("b", "Graph Networks", "2019"))]
#[case(paper("a", "Completely different", "2001"), paper("b", "Unrelated words", "2002"))]
#[case(paper("k", "", "2020"), paper("k", "Something", "2020"))]
#[case(
    paper("a", "Title", "2020").with_field("author", "Lee, Ann"),
    paper("b", "Title", " 2020 ").with_field("author", "Li, Anne")
)]
fn test_compare_is_symmetric(#[case] a: Entry, #[case] b: Entry) {
    assert_eq!(detector::compare(&a, &b), detector::compare(&b, &a));
}

#[rstest]
#[case(Side::A)]
#[case(Side::B)]
fn test_merge_never_drops_populated_fields(#[case] side: Side) {
    let a = paper("k", "Title", "2020")
        .with_field("author", "Smith")
        .with_field("volume", "3");
    let b = paper("k2", "Title", "2020")
        .with_field("author", "Smyth")
        .with_field("journal", "Science")
        .with_field("volume", "");

    let merged = detector::merge_entries(&a, &b, |_| side);

    assert_eq!(merged.citation_key, "k");
    for source in [&a, &b] {
        for (name, value) in source.fields() {
            if !value.trim().is_empty() {
                assert!(merged.is_populated(name), "{name} lost after merge");
            }
        }
    }
    let expected_author = match side {
        Side::A => "Smith",
        Side::B => "Smyth",
    };
    assert_eq!(merged.author.as_deref(), Some(expected_author));
    assert_eq!(merged.get("volume"), Some("3"));
}

#[test]
fn test_merging_twice_changes_nothing() {
    let a = paper("k", "Title", "2020").with_field("author", "Smith");
    let b = paper("k2", "Title", "2020").with_field("journal", "Science");

    let once = detector::merge_entries(&a, &b, |_| Side::A);
    let twice = detector::merge_entries(&once, &b, |_| Side::A);
    assert_eq!(once, twice);
}

#[rstest]
#[case(0.5, true)]
#[case(0.85, false)]
fn test_threshold_controls_matching(#[case] threshold: f64, #[case] duplicate: bool) {
    // 2 of 3 shared tokens
    let store = EntryStore::from_entries(vec![paper("a", "Graph Neural Networks", "2019")]).unwrap();
    let incoming = vec![paper("b", "Graph Networks", "2019").with_field("note", "extra")];
    let config = MatchConfig {
        title_threshold: threshold,
    };

    let proposal = detector::plan_import(&store, incoming, &config);
    if duplicate {
        // Matched, but the titles themselves disagree
        assert_eq!(proposal.library.len(), 1);
        assert_eq!(proposal.stats.conflicts, 1);
        assert_eq!(proposal.conflicts[0].conflicting_fields, vec!["title".to_string()]);
    } else {
        assert_eq!(proposal.library.len(), 2);
        assert_eq!(proposal.stats.added, 1);
        assert!(proposal.conflicts.is_empty());
    }
}

#[test]
fn test_plan_import_does_not_touch_store() {
    let store = EntryStore::from_entries(sample_library()).unwrap();
    let before = store.clone();
    let incoming = vec![paper("Smith20", "Deep Learning for BibTeX", "2020")
        .with_field("author", "Someone Else")];

    let proposal = detector::plan_import(&store, incoming, &MatchConfig::default());

    assert_eq!(store, before);
    assert_eq!(proposal.conflicts.len(), 1);
    assert_eq!(proposal.stats.conflicts, 1);
}
