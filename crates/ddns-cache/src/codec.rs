//! Path codec
//!
//! Maps human-readable section names and item ids to filesystem entries and
//! back. Each segment is query-escaped independently: ASCII alphanumerics and
//! `- _ . ~` are kept, space becomes `+`, every other byte becomes `%XX`.
//! Escaping never emits `/`, so a segment is always exactly one path
//! component.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Suffix appended to every encoded item id
pub const ITEM_SUFFIX: &str = ".json";

/// Prefix of in-flight write files. `!` is always escaped, so no encoded name
/// can start with it.
pub const STAGING_PREFIX: char = '!';

/// Bytes left unescaped, matching query-component escaping
const QUERY_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Escape a single section name or item id
///
/// `.` and `..` are escaped in full so they can never address the current or
/// parent directory.
pub fn encode(segment: &str) -> String {
    match segment {
        "." => "%2E".to_string(),
        ".." => "%2E%2E".to_string(),
        _ => utf8_percent_encode(segment, QUERY_ESCAPE)
            .to_string()
            .replace("%20", "+"),
    }
}

/// Reverse [`encode`]
///
/// Invalid UTF-8 produced by foreign entries is replaced rather than rejected.
pub fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// Directory holding the given section
///
/// Every segment must be non-empty. An empty segment would add no path
/// component, aliasing `["a", ""]` with `["a"]` and `[""]` with the root.
pub fn dir_location<S: AsRef<str>>(root: &Path, section: &[S]) -> Result<PathBuf> {
    let mut path = root.to_path_buf();
    for (index, segment) in section.iter().enumerate() {
        let segment = segment.as_ref();
        if segment.is_empty() {
            return Err(Error::empty_segment(section, index));
        }
        path.push(encode(segment));
    }
    Ok(path)
}

/// File name of an item within its section directory
pub fn item_file_name(id: &str) -> String {
    format!("{}{}", encode(id), ITEM_SUFFIX)
}

/// File holding the given item
pub fn item_location<S: AsRef<str>>(root: &Path, section: &[S], id: &str) -> Result<PathBuf> {
    Ok(dir_location(root, section)?.join(item_file_name(id)))
}

/// Whether a raw entry name belongs to an in-flight write
pub fn is_staging(raw: &str) -> bool {
    raw.starts_with(STAGING_PREFIX)
}

/// Decoded item id for a raw file name
///
/// Only the exact [`ITEM_SUFFIX`] is stripped, so ids containing `.` survive.
/// Returns `None` for staging files and files without the suffix.
pub fn item_id(raw: &str) -> Option<String> {
    if is_staging(raw) {
        return None;
    }
    raw.strip_suffix(ITEM_SUFFIX).map(decode)
}

/// Staging file used while writing `target`
pub fn staging_location(target: &Path, seq: u64) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(
        "{}{}.{}-{}",
        STAGING_PREFIX,
        name,
        std::process::id(),
        seq
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let samples = [
            "",
            "example.com",
            "a b+c",
            "with/slash",
            "back\\slash",
            "..",
            ".",
            "50%",
            "A-home",
            "ünïcödé",
            "日本語.jp",
            "emoji 🦀",
            "q?x=1&y=2#frag",
            "!bang",
        ];
        for s in samples {
            assert_eq!(decode(&encode(s)), s, "round trip failed for {:?}", s);
        }
    }

    #[test]
    fn test_query_escaping() {
        assert_eq!(encode("example.com"), "example.com");
        assert_eq!(encode("a b"), "a+b");
        assert_eq!(encode("a+b"), "a%2Bb");
        assert_eq!(encode("x/y"), "x%2Fy");
        assert_eq!(encode("~_-."), "~_-.");
        assert_eq!(encode("é"), "%C3%A9");
        assert_eq!(encode("!"), "%21");
    }

    #[test]
    fn test_encoding_is_single_component() {
        for s in ["..", ".", "a/../b", "/abs"] {
            let encoded = encode(s);
            assert!(!encoded.contains('/'));
            assert_ne!(encoded, "..");
            assert_ne!(encoded, ".");
        }
    }

    #[test]
    fn test_locations() {
        let root = Path::new("/cache");
        assert_eq!(
            dir_location(root, &["example.com", "www"]).unwrap(),
            PathBuf::from("/cache/example.com/www")
        );
        assert_eq!(
            item_location(root, &["example.com", "www"], "A-home").unwrap(),
            PathBuf::from("/cache/example.com/www/A-home.json")
        );
        assert_eq!(
            item_location::<&str>(root, &[], "cacheTime").unwrap(),
            PathBuf::from("/cache/cacheTime.json")
        );
        assert_eq!(
            dir_location(root, &["a b", "c/d"]).unwrap(),
            PathBuf::from("/cache/a+b/c%2Fd")
        );
    }

    #[test]
    fn test_empty_segments_are_rejected() {
        let root = Path::new("/cache");
        assert!(matches!(
            dir_location(root, &[""]),
            Err(Error::EmptySegment { index: 0, .. })
        ));
        assert!(matches!(
            dir_location(root, &["a", ""]),
            Err(Error::EmptySegment { index: 1, .. })
        ));
        assert!(matches!(
            item_location(root, &["", "www"], "A-home"),
            Err(Error::EmptySegment { index: 0, .. })
        ));

        // An empty item id is still a distinct file
        assert_eq!(
            item_location(root, &["a"], "").unwrap(),
            PathBuf::from("/cache/a/.json")
        );
    }

    #[test]
    fn test_item_id_keeps_dots() {
        assert_eq!(item_id("www.json"), Some("www".to_string()));
        assert_eq!(item_id("v1.2.3.json"), Some("v1.2.3".to_string()));
        assert_eq!(item_id(".json"), Some(String::new()));
        assert_eq!(item_id("notes.txt"), None);
        assert_eq!(item_id("!www.json.42-1"), None);
    }

    #[test]
    fn test_staging_location() {
        let target = Path::new("/cache/example.com/www.json");
        let staging = staging_location(target, 7);
        assert_eq!(staging.parent(), target.parent());
        let name = staging.file_name().unwrap().to_str().unwrap();
        assert!(is_staging(name));
        assert!(item_id(name).is_none());
    }
}
