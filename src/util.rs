//! Small utility helpers used across modules.

use chrono::{SecondsFormat, Utc};

/// Milliseconds since the Unix epoch, used for `createdAt`.
pub fn now_millis() -> i64 {
  Utc::now().timestamp_millis()
}

/// ISO-8601 timestamp (UTC, millisecond precision), used for `createTime`.
pub fn now_iso() -> String {
  Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// True if `s` can be used as a single directory/file name component under the data root.
/// Rejects empty names, separators, NUL and the relative components `.` / `..`.
pub fn is_safe_segment(s: &str) -> bool {
  !s.is_empty()
    && s != "."
    && s != ".."
    && !s.contains(['/', '\\', '\0'])
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with whole survey payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut cut = max;
  while !s.is_char_boundary(cut) {
    cut -= 1;
  }
  format!("{}… ({} bytes total)", &s[..cut], s.len())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn segments_reject_traversal_and_separators() {
    assert!(is_safe_segment("alice"));
    assert!(is_safe_segment("水果调查"));
    assert!(is_safe_segment("a.b"));
    assert!(!is_safe_segment(""));
    assert!(!is_safe_segment("."));
    assert!(!is_safe_segment(".."));
    assert!(!is_safe_segment("a/b"));
    assert!(!is_safe_segment("a\\b"));
    assert!(!is_safe_segment("a\0b"));
  }

  #[test]
  fn truncation_respects_char_boundaries() {
    assert_eq!(trunc_for_log("short", 10), "short");
    let out = trunc_for_log("问卷调查结果", 4);
    assert!(out.starts_with("问"));
    assert!(out.ends_with("(18 bytes total)"));
  }

  #[test]
  fn iso_timestamp_is_utc_millis() {
    let ts = now_iso();
    assert!(ts.ends_with('Z'));
    assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
  }
}
