// URL-safe slugs for tags and categories

use once_cell::sync::Lazy;
use regex::Regex;

static DISALLOWED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));
static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-\s]+").expect("valid regex"));

/// Accented and other non-ASCII letters become their closest ASCII spelling
/// ("é" -> "e"); ASCII passes through untouched so underscores survive.
fn transliterate(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut buf = [0u8; 4];
    for c in value.chars() {
        if c.is_ascii() {
            out.push(c);
        } else if c.is_whitespace() {
            out.push(' ');
        } else {
            out.push_str(&::slug::slugify(c.encode_utf8(&mut buf)));
        }
    }
    out
}

/// Lowercase, transliterate to ASCII, drop anything but word characters,
/// whitespace and hyphens, collapse whitespace and hyphen runs into one
/// hyphen, trim leading/trailing hyphens and underscores.
pub fn slugify(value: &str) -> String {
    let lowered = transliterate(value).to_lowercase();
    let cleaned = DISALLOWED.replace_all(&lowered, "");
    let joined = SEPARATORS.replace_all(cleaned.trim(), "-");
    joined.trim_matches(|c| c == '-' || c == '_').to_string()
}
