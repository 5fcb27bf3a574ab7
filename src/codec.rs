use biblatex::{Field, RawBibliography, RawChunk};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use crate::entry::Entry;
use crate::error::{LibraryError, Result};

/// Parse BibTeX text into entries, in source order
///
/// Entry types, field names and values are kept as written: no crossref
/// inheritance, no type aliasing, no TeX ligature or accent conversion.
/// Entry types and field names are lowercased. `@string` abbreviations are
/// expanded; unknown ones (such as month macros) keep their name.
/// Unbalanced braces, unterminated entries and repeated keys in the same text
/// are reported as [`LibraryError::Parse`].
pub fn decode(text: &str) -> Result<Vec<Entry>> {
    decode_named(text, "<input>")
}

/// Same as [`decode`], naming the source in errors
pub fn decode_named(text: &str, source_name: &str) -> Result<Vec<Entry>> {
    let raw = RawBibliography::parse(text).map_err(|e| LibraryError::parse(source_name, e))?;

    let mut strings: HashMap<String, String> = HashMap::new();
    for pair in &raw.abbreviations {
        let value = flatten_field(&pair.value.v, &strings);
        strings.insert(pair.key.v.to_lowercase(), value);
    }

    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(raw.entries.len());
    for spanned in &raw.entries {
        let parsed = &spanned.v;
        let key = parsed.key.v;
        if !seen.insert(key) {
            return Err(LibraryError::parse(
                source_name,
                format!("duplicate citation key '{key}'"),
            ));
        }

        let mut entry = Entry::new(key, parsed.kind.v);
        for pair in &parsed.fields {
            entry.set(pair.key.v, flatten_field(&pair.value.v, &strings));
        }
        entries.push(entry);
    }

    log::debug!("Decoded {} entries from {}", entries.len(), source_name);
    Ok(entries)
}

/// Join the `#`-concatenated parts of a raw field value.
///
/// Braced and quoted parts are taken verbatim, inner braces included.
fn flatten_field(field: &Field<'_>, strings: &HashMap<String, String>) -> String {
    let mut out = String::new();
    for chunk in field {
        match &chunk.v {
            RawChunk::Normal(text) => out.push_str(text),
            RawChunk::Abbreviation(name) => match strings.get(&name.to_lowercase()) {
                Some(value) => out.push_str(value),
                None => out.push_str(name),
            },
        }
    }
    out
}

/// Serialize entries to BibTeX text
///
/// Entries are written in the given order; fields follow
/// [`crate::entry::CANONICAL_FIELD_ORDER`] with unknown fields sorted after.
pub fn encode(entries: &[Entry]) -> String {
    entries
        .iter()
        .map(encode_entry)
        .collect::<Vec<_>>()
        .join("\n")
}

fn encode_entry(entry: &Entry) -> String {
    let mut out = format!("@{}{{{}", entry.entry_type, entry.citation_key);
    for (name, value) in entry.fields() {
        out.push_str(",\n  ");
        out.push_str(name);
        out.push_str(" = {");
        out.push_str(value);
        out.push('}');
    }
    out.push_str("\n}\n");
    out
}

/// Decode raw file bytes, trying UTF-8 first and Latin-1 second
///
/// Latin-1 maps every byte to a code point, so the fallback never fails.
pub fn decode_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.trim_start_matches('\u{feff}').to_string(),
        Err(_) => {
            log::debug!("Input is not valid UTF-8, decoding as Latin-1");
            bytes.iter().map(|&b| b as char).collect()
        }
    }
}

/// Read and decode a `.bib` file
pub fn read_file(path: &Path) -> Result<Vec<Entry>> {
    let bytes = fs::read(path)?;
    decode_named(&decode_bytes(&bytes), &path.display().to_string())
}

/// Encode entries into a `.bib` file, creating parent directories
pub fn write_file(path: &Path, entries: &[Entry]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, encode(entries))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
@article{Smith20,
  author = {Smith, John and Doe, Jane},
  title = {Deep Learning},
  journal = {Nature},
  year = {2020},
  customfield = {kept as is}
}

@inproceedings{Lee19,
  title = "Graph Networks",
  booktitle = {Proceedings of Something},
  year = 2019
}
"#;

    #[test]
    fn test_decode_sample() {
        let entries = decode(SAMPLE).unwrap();
        assert_eq!(entries.len(), 2);

        let smith = &entries[0];
        assert_eq!(smith.citation_key, "Smith20");
        assert_eq!(smith.entry_type, "article");
        assert_eq!(smith.title.as_deref(), Some("Deep Learning"));
        assert_eq!(smith.author.as_deref(), Some("Smith, John and Doe, Jane"));
        assert_eq!(smith.journal.as_deref(), Some("Nature"));
        assert_eq!(smith.get("customfield"), Some("kept as is"));

        let lee = &entries[1];
        assert_eq!(lee.entry_type, "inproceedings");
        assert_eq!(lee.title.as_deref(), Some("Graph Networks"));
        assert_eq!(lee.year.as_deref(), Some("2019"));
    }

    #[test]
    fn test_decode_unterminated_entry_fails() {
        let err = decode("@article{broken,\n  title = {Unbalanced\n").unwrap_err();
        assert!(matches!(err, LibraryError::Parse { .. }));
    }

    #[test]
    fn test_decode_empty_text_is_empty_library() {
        assert!(decode("").unwrap().is_empty());
    }

    #[test]
    fn test_decode_keeps_values_as_written() {
        let text = r#"
@Conference{c1,
  title = {The {BERT} Model},
  pages = {1--10},
  author = {Erd{\H o}s, Paul}
}

@customtype{x1,
  Note = "odd {braces} here"
}
"#;
        let entries = decode(text).unwrap();

        assert_eq!(entries[0].entry_type, "conference");
        assert_eq!(entries[0].title.as_deref(), Some("The {BERT} Model"));
        assert_eq!(entries[0].get("pages"), Some("1--10"));
        assert_eq!(entries[0].author.as_deref(), Some("Erd{\\H o}s, Paul"));

        assert_eq!(entries[1].entry_type, "customtype");
        assert_eq!(entries[1].get("note"), Some("odd {braces} here"));
    }

    #[test]
    fn test_decode_does_not_resolve_crossref() {
        let text = "@inproceedings{a,\n  title = {T},\n  crossref = {p},\n  year = 2020\n}\n\n\
                    @proceedings{p,\n  title = {Proc},\n  booktitle = {Proc},\n  publisher = {ACM},\n  year = 2020\n}\n";
        let entries = decode(text).unwrap();

        let child = &entries[0];
        assert_eq!(child.year.as_deref(), Some("2020"));
        assert_eq!(child.get("crossref"), Some("p"));
        assert_eq!(child.get("publisher"), None);
        assert_eq!(child.booktitle, None);
        assert_eq!(child.get("date"), None);
    }

    #[test]
    fn test_decode_expands_string_abbreviations() {
        let text = "@string{acm = {ACM Press}}\n\
                    @book{b,\n  publisher = acm # {, New York},\n  month = jan\n}\n";
        let entries = decode(text).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].get("publisher"), Some("ACM Press, New York"));
        assert_eq!(entries[0].get("month"), Some("jan"));
    }

    #[test]
    fn test_decode_rejects_repeated_key() {
        let err = decode("@misc{k, title = {A}}\n@misc{k, title = {B}}\n").unwrap_err();
        match err {
            LibraryError::Parse { message, .. } => assert!(message.contains("'k'")),
            other => panic!("expected Parse, got {other:?}"),
        }
    }

    #[test]
    fn test_encode_layout() {
        let entry = Entry::new("Smith20", "article")
            .with_field("year", "2020")
            .with_field("title", "Deep Learning")
            .with_field("zzz", "last")
            .with_field("author", "Smith, John");

        let text = encode(&[entry]);
        assert_eq!(
            text,
            "@article{Smith20,\n  author = {Smith, John},\n  title = {Deep Learning},\n  year = {2020},\n  zzz = {last}\n}\n"
        );
    }

    #[test]
    fn test_encode_is_deterministic() {
        let entries = decode(SAMPLE).unwrap();
        assert_eq!(encode(&entries), encode(&entries));
    }

    #[test]
    fn test_roundtrip() {
        let entries = decode(SAMPLE).unwrap();
        let again = decode(&encode(&entries)).unwrap();
        assert_eq!(again, entries);
    }

    #[test]
    fn test_decode_bytes_latin1_fallback() {
        let bytes = b"@misc{k, title = {Caf\xe9}}";
        let text = decode_bytes(bytes);
        assert!(text.contains("Café"));
    }

    #[test]
    fn test_read_write_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("lib.bib");
        let entries = decode(SAMPLE).unwrap();

        write_file(&path, &entries).unwrap();
        let reloaded = read_file(&path).unwrap();
        assert_eq!(reloaded, entries);
    }
}
