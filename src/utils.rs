//! Utility functions for text processing, name truncation, and path ordering.
//!
//! Regex patterns use the `lazy-regex` crate so they are validated at compile
//! time and initialized lazily on first use.

use std::cmp::Ordering;
use unicode_segmentation::UnicodeSegmentation;

/// Match any HTML tag
static RE_HTML_TAG: lazy_regex::Lazy<regex::Regex> = lazy_regex::lazy_regex!(r"<[^<>]*>");

/// Match a recognized filename tail worth preserving during truncation:
/// a split-archive part chain (`.part5.rar`, `.part01.mkv`), a compound
/// archive extension (`.tar.gz`), or a plain short extension.
static RE_NAME_TAIL: lazy_regex::Lazy<regex::Regex> =
    lazy_regex::lazy_regex!(r"(?i)(\.part\d+\.[a-z0-9]{1,7}|\.tar\.[a-z0-9]{1,4}|\.[a-z0-9]{1,7})$");

/// Strips HTML tags from a string, leaving the text content.
///
/// Prefixes and suffixes may carry Telegram HTML styling for captions; the
/// on-disk filename gets the stripped form.
///
/// # Examples
///
/// ```
/// use media_courier::utils::strip_html_tags;
/// assert_eq!(strip_html_tags("<b>@channel</b> movie.mkv"), "@channel movie.mkv");
/// ```
#[must_use]
pub fn strip_html_tags(text: &str) -> String {
    RE_HTML_TAG.replace_all(text, "").to_string()
}

/// Truncates a filename to `max_chars`, preserving a recognized part/archive
/// suffix or extension so the file stays openable after the cut.
///
/// Counts grapheme clusters, not bytes, so multi-byte names are never split
/// mid-character.
#[must_use]
pub fn shorten_file_name(name: &str, max_chars: usize) -> String {
    if name.graphemes(true).count() <= max_chars {
        return name.to_string();
    }

    let tail = RE_NAME_TAIL
        .find(name)
        .map_or(String::new(), |m| m.as_str().to_string());
    let base = &name[..name.len() - tail.len()];

    let tail_len = tail.graphemes(true).count();
    let keep = max_chars.saturating_sub(tail_len).max(1);
    let cut: String = base.graphemes(true).take(keep).collect();
    format!("{cut}{tail}")
}

/// Compares two path strings naturally: digit runs are compared by numeric
/// value, so `movie.part2.mkv` sorts before `movie.part10.mkv`.
///
/// # Examples
///
/// ```
/// use media_courier::utils::natural_cmp;
/// use std::cmp::Ordering;
/// assert_eq!(natural_cmp("movie.part2.mkv", "movie.part10.mkv"), Ordering::Less);
/// ```
#[must_use]
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ia = a.chars().peekable();
    let mut ib = b.chars().peekable();

    loop {
        match (ia.peek().copied(), ib.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) => {
                if ca.is_ascii_digit() && cb.is_ascii_digit() {
                    let na = take_number(&mut ia);
                    let nb = take_number(&mut ib);
                    match na.cmp(&nb) {
                        Ordering::Equal => {}
                        other => return other,
                    }
                } else {
                    match ca.cmp(&cb) {
                        Ordering::Equal => {
                            ia.next();
                            ib.next();
                        }
                        other => return other,
                    }
                }
            }
        }
    }
}

fn take_number(iter: &mut std::iter::Peekable<std::str::Chars<'_>>) -> u128 {
    let mut value: u128 = 0;
    while let Some(c) = iter.peek().copied() {
        if let Some(d) = c.to_digit(10) {
            value = value.saturating_mul(10).saturating_add(u128::from(d));
            iter.next();
        } else {
            break;
        }
    }
    value
}

/// Formats a byte count as a human-readable size (KiB/MiB/GiB).
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_html_tags() {
        assert_eq!(strip_html_tags("<b>@channel</b> "), "@channel ");
        assert_eq!(strip_html_tags("plain"), "plain");
        assert_eq!(strip_html_tags("a <i>b</i> c"), "a b c");
    }

    #[test]
    fn test_shorten_keeps_extension() {
        let name = format!("{}{}", "x".repeat(300), ".mkv");
        let short = shorten_file_name(&name, 240);
        assert!(short.graphemes(true).count() <= 240);
        assert!(short.ends_with(".mkv"));
    }

    #[test]
    fn test_shorten_keeps_part_suffix() {
        let name = format!("{}{}", "x".repeat(300), ".part01.rar");
        let short = shorten_file_name(&name, 240);
        assert!(short.ends_with(".part01.rar"));
        assert!(short.graphemes(true).count() <= 240);
    }

    #[test]
    fn test_shorten_keeps_tar_chain() {
        let name = format!("{}{}", "x".repeat(300), ".tar.gz");
        assert!(shorten_file_name(&name, 240).ends_with(".tar.gz"));
    }

    #[test]
    fn test_shorten_leaves_short_names_alone() {
        assert_eq!(shorten_file_name("movie.mkv", 240), "movie.mkv");
    }

    #[test]
    fn test_shorten_unicode_names() {
        let name = format!("{}{}", "я".repeat(300), ".mkv");
        let short = shorten_file_name(&name, 240);
        assert!(short.graphemes(true).count() <= 240);
        assert!(short.ends_with(".mkv"));
    }

    #[test]
    fn test_natural_cmp_orders_parts() {
        assert_eq!(
            natural_cmp("movie.part2.mkv", "movie.part10.mkv"),
            Ordering::Less
        );
        assert_eq!(
            natural_cmp("movie.part10.mkv", "movie.part2.mkv"),
            Ordering::Greater
        );
        assert_eq!(natural_cmp("a.mkv", "a.mkv"), Ordering::Equal);
        assert_eq!(natural_cmp("a1b", "a1c"), Ordering::Less);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2 * 1024 * 1024 * 1024), "2.00 GiB");
    }
}
