//! Section-oriented reader for the INF text dialect.
//!
//! INF files are INI-like but with quirks the reader preserves rather than
//! corrects: keys may repeat within a section (values are joined with
//! [`MULTI_VALUE_SEPARATOR`]), lines that match no recognized pattern are
//! kept as opaque free text under [`TEXT_KEY`], and entries appearing before
//! the first `[Header]` collect into an implicit anonymous section. Malformed
//! input never fails the parse.

use std::fs;
use std::path::Path;

use crate::ParserSettings;
use crate::err::{Error, Result};

/// Separator used when a key repeats within one section. Callers split the
/// stored value on this character to recover the multi-value list.
pub const MULTI_VALUE_SEPARATOR: char = '|';

/// Synthetic key holding free-text lines that match no other pattern.
/// Unlike regular keys, repeated free text overwrites (last one wins).
pub const TEXT_KEY: &str = "Text";

/// Returns the first `;`-delimited segment of an INF value, trimmed.
///
/// Values routinely carry trailing annotations (`10.0.19041.1 ; build`);
/// the convention throughout the format is that only the first segment is
/// data.
pub fn first_segment(value: &str) -> &str {
    value.split(';').next().unwrap_or("").trim()
}

/// A named block of ordered key/value entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

impl Section {
    fn new(name: String) -> Self {
        Section {
            name,
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Case-insensitive key lookup.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// The first entry in declaration order.
    pub fn first_entry(&self) -> Option<(&str, &str)> {
        self.entries.first().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, key: String, value: String) {
        match self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&key))
        {
            Some((_, existing)) => {
                existing.push(MULTI_VALUE_SEPARATOR);
                existing.push_str(&value);
            }
            None => self.entries.push((key, value)),
        }
    }

    fn set_text(&mut self, value: String) {
        match self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(TEXT_KEY))
        {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((TEXT_KEY.to_owned(), value)),
        }
    }
}

/// A captured `;` comment line, keyed by its file-global sequence number and
/// associated with the section that was current when it appeared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub seq: usize,
    pub section: String,
    pub text: String,
}

/// An ordered, case-insensitive map of the sections of one INF file.
///
/// Section names are unique after case folding; a repeated `[Header]`
/// continues the existing section. First-seen ordering is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfFile {
    sections: Vec<Section>,
    comments: Vec<Comment>,
}

impl InfFile {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_path_with_settings(path, &ParserSettings::default())
    }

    pub fn from_path_with_settings(
        path: impl AsRef<Path>,
        settings: &ParserSettings,
    ) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| Error::FailedToOpenFile {
            source,
            path: path.to_path_buf(),
        })?;
        Ok(Self::from_bytes(&bytes, settings))
    }

    /// Decodes `bytes` (BOM-sniffing UTF-16/UTF-8, lossy otherwise) and
    /// parses the result. INF files shipped by vendors are frequently
    /// UTF-16LE.
    pub fn from_bytes(bytes: &[u8], settings: &ParserSettings) -> Self {
        Self::from_text(&decode_text(bytes), settings)
    }

    pub fn from_text(text: &str, settings: &ParserSettings) -> Self {
        let mut inf = InfFile::default();
        let mut current: Option<usize> = None;
        let mut comment_seq = 0;

        for raw_line in text.lines() {
            let line = raw_line.trim();

            if let Some(name) = header_name(line) {
                current = Some(inf.section_index(name));
                continue;
            }

            if let Some(comment) = line.strip_prefix(';') {
                if settings.should_capture_comments() {
                    let section = inf.current_name(current).to_owned();
                    inf.comments.push(Comment {
                        seq: comment_seq,
                        section,
                        text: comment.trim().to_owned(),
                    });
                    comment_seq += 1;
                }
                continue;
            }

            if let Some((key, value)) = key_value(line) {
                let idx = inf.current_or_anonymous(&mut current);
                inf.sections[idx].insert(key.to_owned(), value.to_owned());
                continue;
            }

            if line.is_empty() {
                continue;
            }

            let idx = inf.current_or_anonymous(&mut current);
            inf.sections[idx].set_text(line.to_owned());
        }

        inf
    }

    /// Case-insensitive section lookup.
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Sections in first-seen order.
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    /// Captured comments, in order of appearance. Empty unless the file was
    /// parsed with comment capture enabled.
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    /// Renders the map back to INF text. Parsing the rendering yields an
    /// equal map (multi-value joins stay joined).
    pub fn render(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            if !section.name.is_empty() {
                out.push('[');
                out.push_str(&section.name);
                out.push_str("]\n");
            }
            for (key, value) in section.entries() {
                out.push_str(key);
                out.push('=');
                out.push_str(value);
                out.push('\n');
            }
        }
        out
    }

    fn section_index(&mut self, name: &str) -> usize {
        match self
            .sections
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(name))
        {
            Some(idx) => idx,
            None => {
                self.sections.push(Section::new(name.to_owned()));
                self.sections.len() - 1
            }
        }
    }

    /// Entries seen before any header land in an implicit unnamed section.
    fn current_or_anonymous(&mut self, current: &mut Option<usize>) -> usize {
        match *current {
            Some(idx) => idx,
            None => {
                let idx = self.section_index("");
                *current = Some(idx);
                idx
            }
        }
    }

    fn current_name(&self, current: Option<usize>) -> &str {
        current.map(|idx| self.sections[idx].name()).unwrap_or("")
    }
}

/// `[Name]` headers: content between the first `[` and the last `]` on the
/// line, at least one character before trimming. Trailing junk after the
/// closing bracket is discarded.
fn header_name(line: &str) -> Option<&str> {
    if !line.starts_with('[') {
        return None;
    }
    let end = line.rfind(']')?;
    if end < 2 {
        return None;
    }
    Some(line[1..end].trim())
}

/// Key/value lines split at the first `=`; the key must be non-empty before
/// trimming. Anything else (including a leading `=`) is not a match.
fn key_value(line: &str) -> Option<(&str, &str)> {
    let pos = line.find('=')?;
    if pos == 0 {
        return None;
    }
    Some((line[..pos].trim(), line[pos + 1..].trim()))
}

fn decode_text(bytes: &[u8]) -> String {
    match bytes {
        [0xff, 0xfe, rest @ ..] => decode_utf16(rest, u16::from_le_bytes),
        [0xfe, 0xff, rest @ ..] => decode_utf16(rest, u16::from_be_bytes),
        [0xef, 0xbb, 0xbf, rest @ ..] => String::from_utf8_lossy(rest).into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> String {
    let units = bytes.chunks_exact(2).map(|pair| unit([pair[0], pair[1]]));
    char::decode_utf16(units)
        .map(|result| result.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> InfFile {
        InfFile::from_text(text, &ParserSettings::default())
    }

    #[test]
    fn test_sections_are_ordered_and_case_insensitive() {
        let inf = parse(indoc! {r#"
            [Version]
            Signature="$WINDOWS NT$"

            [Manufacturer]
            %MfgName%=Widget,NTamd64
        "#});

        let names: Vec<&str> = inf.sections().map(|s| s.name()).collect();
        assert_eq!(names, vec!["Version", "Manufacturer"]);
        assert!(inf.section("version").is_some());
        assert!(inf.section("MANUFACTURER").is_some());
        assert_eq!(
            inf.section("Version").unwrap().get("signature"),
            Some(r#""$WINDOWS NT$""#)
        );
    }

    #[test]
    fn test_duplicate_keys_concatenate() {
        let inf = parse(indoc! {r#"
            [SourceDisksFiles]
            widget.sys = A
            widget.sys = B
        "#});

        let section = inf.section("SourceDisksFiles").unwrap();
        assert_eq!(section.len(), 1);
        assert_eq!(section.get("widget.sys"), Some("A|B"));
    }

    #[test]
    fn test_duplicate_section_headers_merge() {
        let inf = parse(indoc! {r#"
            [Strings]
            A = 1
            [Other]
            X = 2
            [strings]
            B = 3
        "#});

        assert_eq!(inf.sections().count(), 2);
        let strings = inf.section("Strings").unwrap();
        assert_eq!(strings.get("A"), Some("1"));
        assert_eq!(strings.get("B"), Some("3"));
    }

    #[test]
    fn test_free_text_is_kept_last_one_wins() {
        let inf = parse(indoc! {r#"
            [MyCo.NTamd64]
            "First Widget",*WDG0001
            "Second Widget",*WDG0002
        "#});

        let section = inf.section("MyCo.NTamd64").unwrap();
        assert_eq!(section.get(TEXT_KEY), Some(r#""Second Widget",*WDG0002"#));
    }

    #[test]
    fn test_entries_before_any_header_go_to_anonymous_section() {
        let inf = parse(indoc! {r#"
            stray = value
            [Version]
            Class = Net
        "#});

        let anonymous = inf.section("").unwrap();
        assert_eq!(anonymous.get("stray"), Some("value"));
        assert_eq!(inf.sections().next().unwrap().name(), "");
    }

    #[test]
    fn test_comments_are_skipped_unless_capture_is_enabled() {
        let text = indoc! {r#"
            ; leading note
            [Version]
            ; about the class
            Class = Net
        "#};

        let without = parse(text);
        assert!(without.comments().is_empty());

        let with = InfFile::from_text(text, &ParserSettings::new().capture_comments(true));
        assert_eq!(
            with.comments(),
            &[
                Comment {
                    seq: 0,
                    section: String::new(),
                    text: "leading note".to_owned(),
                },
                Comment {
                    seq: 1,
                    section: "Version".to_owned(),
                    text: "about the class".to_owned(),
                },
            ]
        );
    }

    #[test]
    fn test_malformed_lines_never_fail() {
        let inf = parse(indoc! {r#"
            [Version
            []
            =value
            @@@@
        "#});

        // None of these are headers or key/value lines; they all fall
        // through to free text in the anonymous section.
        let anonymous = inf.section("").unwrap();
        assert_eq!(anonymous.get(TEXT_KEY), Some("@@@@"));
        assert_eq!(inf.sections().count(), 1);
    }

    #[test]
    fn test_header_with_trailing_junk_and_inner_whitespace() {
        let inf = parse("[ Install Section ] ; models\nkey=1\n");
        assert_eq!(inf.section("Install Section").unwrap().get("key"), Some("1"));
    }

    #[test]
    fn test_render_reparse_is_idempotent() {
        let text = indoc! {r#"
            before = header

            [Version]
            Signature = "$WINDOWS NT$"
            DriverVer = 10/01/2023,3.2.1.0 ; release

            [SourceDisksFiles]
            widget.sys = A
            widget.sys = B

            [MyCo.NTamd64.10.0]
            "Widget",*WDG1234
        "#};

        let first = parse(text);
        let second = parse(&first.render());
        assert_eq!(first, second);
    }

    #[test]
    fn test_utf16le_bom_is_decoded() {
        let text = "[Version]\r\nClass=Net\r\n";
        let mut bytes = vec![0xff, 0xfe];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }

        let inf = InfFile::from_bytes(&bytes, &ParserSettings::default());
        assert_eq!(inf.section("Version").unwrap().get("Class"), Some("Net"));
    }

    #[test]
    fn test_first_segment_strips_annotation_and_whitespace() {
        assert_eq!(first_segment(" 10.0.19041.1 ; build "), "10.0.19041.1");
        assert_eq!(first_segment("plain"), "plain");
        assert_eq!(first_segment(""), "");
    }
}
