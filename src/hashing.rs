//! Hashing System - SHA-256 for Applications and Build Manifests
//!
//! An application digest covers everything in the rendered document except
//! its hostile zone: the span from the first to the last occurrence of a
//! marker line, which carries the record payload. Two renderings of the same
//! application that differ only in payload therefore hash identically.

use base64::Engine as _;
use serde::Serialize;
use serde_json::{to_string, Value};
use sha2::{Digest, Sha256};
use std::ops::Range;

/// Marker line delimiting the hostile zone in application shells.
pub const HOSTILE_MARKER: &str = "// APPHASH_HOSTILE_ZONE";

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Byte range of the hostile zone, from the start of the first `marker` to
/// the end of the last. `None` when the marker occurs fewer than two times.
pub fn hostile_zone(document: &str, marker: &str) -> Option<Range<usize>> {
    if marker.is_empty() {
        return None;
    }
    let first = document.find(marker)?;
    let last = document.rfind(marker)?;
    if first == last {
        return None;
    }
    Some(first..last + marker.len())
}

/// Replace the hostile zone with `replacement`. Documents without a zone are
/// returned unchanged.
pub fn hostile_block(document: &str, marker: &str, replacement: &str) -> String {
    match hostile_zone(document, marker) {
        Some(zone) => {
            let mut out = String::with_capacity(document.len() - zone.len() + replacement.len());
            out.push_str(&document[..zone.start]);
            out.push_str(replacement);
            out.push_str(&document[zone.end..]);
            out
        }
        None => document.to_string(),
    }
}

pub fn strip_hostile_zone(document: &str, marker: &str) -> String {
    hostile_block(document, marker, "")
}

/// SHA-256 of the document with its hostile zone removed.
pub fn app_digest(document: &str, marker: &str) -> [u8; 32] {
    let stripped = strip_hostile_zone(document, marker);
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(stripped.as_bytes()));
    out
}

/// Lowercase hex form of [`app_digest`].
pub fn app_digest_hex(document: &str, marker: &str) -> String {
    hex::encode(app_digest(document, marker))
}

/// Subresource-integrity form of [`app_digest`], e.g. `sha256-q1w2...=`.
pub fn app_digest_sri(document: &str, marker: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(app_digest(document, marker));
    format!("sha256-{}", encoded)
}

/// Convert to canonical JSON (sorted keys, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    let sorted = sort_value(&v);
    to_string(&sorted)
}

fn sort_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let sorted_map: serde_json::Map<String, Value> = sorted
                .into_iter()
                .map(|(k, v)| (k.clone(), sort_value(v)))
                .collect();
            Value::Object(sorted_map)
        }
        Value::Array(arr) => {
            Value::Array(arr.iter().map(sort_value).collect())
        }
        _ => v.clone()
    }
}

/// Compute manifest hash for a build
pub fn compute_manifest_hash<T: Serialize>(manifest: &T) -> Result<String, serde_json::Error> {
    let canonical = canonical_json(manifest)?;
    Ok(sha256_hex(canonical.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn zone_doc(a: &str, b: &str) -> String {
        format!("\npre\n{}\ninner\n{}\npost\n", a, b)
    }

    #[test]
    fn test_strip_two_markers() {
        let doc = zone_doc(HOSTILE_MARKER, HOSTILE_MARKER);
        assert_eq!(strip_hostile_zone(&doc, HOSTILE_MARKER), "\npre\n\npost\n");
    }

    #[test]
    fn test_single_or_missing_marker_is_unchanged() {
        let doc = zone_doc(HOSTILE_MARKER, "nomark");
        assert_eq!(strip_hostile_zone(&doc, HOSTILE_MARKER), doc);
        let doc = zone_doc("nomark", "nomark");
        assert_eq!(strip_hostile_zone(&doc, HOSTILE_MARKER), doc);
        assert_eq!(hostile_zone(&doc, ""), None);
    }

    #[test]
    fn test_three_markers_collapse() {
        let doc = format!("\npre\n{m}\n{m} \n{m}\npost\n", m = HOSTILE_MARKER);
        assert_eq!(strip_hostile_zone(&doc, HOSTILE_MARKER), "\npre\n\npost\n");
    }

    #[test]
    fn test_hostile_block_replacement() {
        let doc = zone_doc("<Z>", "<Z>");
        assert_eq!(hostile_block(&doc, "<Z>", "X"), "\npre\nX\npost\n");
        assert_eq!(hostile_zone(&doc, "<Z>"), Some(5..18));
    }

    #[test]
    fn test_digest_ignores_zone_content() {
        let a = zone_doc(&format!("{} one", HOSTILE_MARKER), HOSTILE_MARKER);
        let b = zone_doc(&format!("{} two", HOSTILE_MARKER), HOSTILE_MARKER);
        assert_ne!(a, b);
        assert_eq!(app_digest(&a, HOSTILE_MARKER), app_digest(&b, HOSTILE_MARKER));

        let c = a.replace("post", "p0st");
        assert_ne!(app_digest(&a, HOSTILE_MARKER), app_digest(&c, HOSTILE_MARKER));
    }

    #[test]
    fn test_digest_formats() {
        let doc = "no zone here";
        let hex = app_digest_hex(doc, HOSTILE_MARKER);
        assert_eq!(hex, sha256_hex(doc.as_bytes()));
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        let sri = app_digest_sri(doc, HOSTILE_MARKER);
        assert!(sri.starts_with("sha256-"));
        assert_eq!(sri.len(), "sha256-".len() + 44);
    }

    #[test]
    fn test_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_canonical_json_sorted() {
        let obj = json!({"z": 1, "a": 2, "m": 3});
        let canonical = canonical_json(&obj).unwrap();
        assert_eq!(canonical, r#"{"a":2,"m":3,"z":1}"#);
    }

    #[test]
    fn test_manifest_hash_stable() {
        let manifest = json!({
            "app": "pad",
            "engineVersion": "1.0.0"
        });
        let h1 = compute_manifest_hash(&manifest).unwrap();
        let h2 = compute_manifest_hash(&manifest).unwrap();
        assert_eq!(h1, h2);
    }
}
