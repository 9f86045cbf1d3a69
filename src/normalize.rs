//! Content normalization: raw MIME body strings in, bounded feed-safe HTML
//! and text out.
//!
//! Every stage is total. Malformed quoted-printable, unterminated tags,
//! mis-decoded UTF-8, and empty input all degrade to some bounded output
//! instead of failing — email bodies are adversarial input and a pass must
//! never die on one message. Re-running the pipeline on its own output is
//! byte-stable.

use crate::models::{MessageBody, NormalizedContent};

/// Marker appended when content is truncated.
pub const ELLIPSIS: &str = "...";

/// Maximum lines folded into a summary.
const SUMMARY_LINES: usize = 5;

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct NormalizeConfig {
    /// Character budget for the HTML representation.
    pub max_html_len: usize,
    /// Character budget for the text representation.
    pub max_text_len: usize,
    /// Character budget for the derived summary.
    pub max_summary_len: usize,
    /// Strip `<style>` blocks, comments, and presentation attributes.
    pub remove_css: bool,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        NormalizeConfig {
            max_html_len: 8000,
            max_text_len: 3000,
            max_summary_len: 300,
            remove_css: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    config: NormalizeConfig,
}

impl Normalizer {
    pub fn new(config: NormalizeConfig) -> Self {
        Normalizer { config }
    }

    /// Run the full pipeline over one message body.
    ///
    /// Produces a derived record; the source body is never mutated. If only
    /// one representation survives cleaning, the other is derived from it,
    /// so the result is empty only when the source had no content at all.
    pub fn normalize(&self, body: &MessageBody) -> NormalizedContent {
        let html_clean = clean_raw(&body.html);
        let text_clean = clean_raw(&body.text);

        let mut html = if html_clean.is_empty() {
            String::new()
        } else {
            let finished = if self.config.remove_css {
                sanitize_html(&html_clean)
            } else {
                html_clean
            };
            truncate_with_marker(finished.trim(), self.config.max_html_len)
        };
        let mut text = truncate_with_marker(&text_clean, self.config.max_text_len);

        let mut html_derived = false;
        if html.is_empty() && !text.is_empty() {
            // Derived HTML still answers to the HTML budget; the wrapper tag
            // itself is not counted, matching the truncation rule elsewhere.
            let inner = if self.config.max_html_len < self.config.max_text_len {
                truncate_with_marker(&text, self.config.max_html_len)
            } else {
                text.clone()
            };
            html = wrap_preformatted(&inner);
            html_derived = true;
        } else if text.is_empty() && !html.is_empty() {
            text = truncate_with_marker(&strip_tags(&html), self.config.max_text_len);
        }

        let summary = summarize_lines(&text, self.config.max_summary_len);

        NormalizedContent {
            html,
            text,
            summary,
            html_derived,
        }
    }
}

// ---------------------------------------------------------------------------
// Stages 1-4: MIME artifacts, quoted-printable, mojibake, whitespace
// ---------------------------------------------------------------------------

/// Strip transport artifacts and decode the result. Total; empty in, empty
/// out.
fn clean_raw(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }
    let stripped = strip_mime_artifacts(input);
    let decoded = decode_quoted_printable(&stripped);
    fix_mojibake(&decoded).trim().to_string()
}

/// Drop multipart boilerplate, boundary delimiter lines, and the header
/// block preceding the first content line. Content is preserved verbatim
/// from the first line that does not look like a header or parameter line.
fn strip_mime_artifacts(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_header = true;
    for line in input.lines() {
        let trimmed = line.trim();
        if is_boundary_line(trimmed) {
            continue;
        }
        if in_header {
            if trimmed.is_empty() || trimmed.starts_with("This is a multi-part message") {
                continue;
            }
            if is_header_line(trimmed) || is_param_line(trimmed) {
                continue;
            }
            in_header = false;
        }
        out.push_str(line);
        out.push('\n');
    }
    if !input.ends_with('\n') && out.ends_with('\n') {
        out.pop();
    }
    out
}

/// `--token` or `--token--` where the token is made of RFC 2046 boundary
/// characters. An email signature separator (`--` alone) does not match.
fn is_boundary_line(line: &str) -> bool {
    let Some(rest) = line.strip_prefix("--") else {
        return false;
    };
    let token = rest.strip_suffix("--").unwrap_or(rest);
    !token.is_empty()
        && token.len() <= 70
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "'()+_,-./:=? ".contains(c))
}

fn is_header_line(line: &str) -> bool {
    match line.split_once(':') {
        Some((name, _)) => {
            !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-')
        }
        None => false,
    }
}

/// Continuation of a folded header, e.g. `charset="utf-8"` on its own line.
fn is_param_line(line: &str) -> bool {
    let lower = line
        .trim_start_matches(';')
        .trim_start()
        .to_ascii_lowercase();
    ["charset=", "format=", "boundary="]
        .iter()
        .any(|p| lower.starts_with(p))
}

/// Speculative quoted-printable decoding. Soft line breaks are joined,
/// `=XX` hex escapes become the byte value, and any `=` not followed by two
/// hex digits stays a literal `=`. Never fails; invalid byte sequences are
/// replaced, not rejected.
fn decode_quoted_printable(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'=' {
            if bytes.get(i + 1) == Some(&b'\r') && bytes.get(i + 2) == Some(&b'\n') {
                i += 3;
                continue;
            }
            if bytes.get(i + 1) == Some(&b'\n') {
                i += 2;
                continue;
            }
            if let (Some(hi), Some(lo)) = (
                bytes.get(i + 1).copied().and_then(hex_val),
                bytes.get(i + 2).copied().and_then(hex_val),
            ) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

/// Closed table of UTF-8-read-as-Latin-1 corruption sequences. This is not
/// an encoding detector; only the classic smart-quote family is repaired.
const MOJIBAKE_TABLE: &[(&str, &str)] = &[
    ("\u{e2}\u{80}\u{94}", "\u{2014}"), // em dash
    ("\u{e2}\u{80}\u{93}", "\u{2013}"), // en dash
    ("\u{e2}\u{80}\u{99}", "\u{2019}"), // right single quote
    ("\u{e2}\u{80}\u{98}", "\u{2018}"), // left single quote
    ("\u{e2}\u{80}\u{9c}", "\u{201c}"), // left double quote
    ("\u{e2}\u{80}\u{9d}", "\u{201d}"), // right double quote
    ("\u{e2}\u{80}\u{a2}", "\u{2022}"), // bullet
    ("\u{e2}\u{80}\u{a6}", "\u{2026}"), // ellipsis
    ("\u{c2}\u{a0}", " "),              // non-breaking space artifact
];

fn fix_mojibake(input: &str) -> String {
    let mut result = input.to_string();
    for (bad, good) in MOJIBAKE_TABLE {
        if result.contains(bad) {
            result = result.replace(bad, good);
        }
    }
    // Stray continuation byte read as Latin-1.
    if result.contains('\u{c2}') {
        result = result.replace('\u{c2}', "");
    }
    result
}

// ---------------------------------------------------------------------------
// Stage 5: HTML finishing
// ---------------------------------------------------------------------------

const DENIED_ATTRIBUTES: &[&str] = &[
    "style",
    "class",
    "id",
    "bgcolor",
    "width",
    "height",
    "align",
    "valign",
    "border",
    "cellpadding",
    "cellspacing",
    "color",
    "face",
    "size",
    "charset",
];

fn sanitize_html(input: &str) -> String {
    let no_styles = strip_style_blocks(input);
    let no_comments = strip_comments(&no_styles);
    let no_attrs = strip_denied_attributes(&no_comments);
    strip_orphaned_fragments(&no_attrs)
}

/// Remove `<style>...</style>` blocks. The open-tag match is
/// case-insensitive; a block whose close tag never appears is stripped to
/// the end of the document.
fn strip_style_blocks(input: &str) -> String {
    // ASCII-only lowering keeps byte offsets valid in the original.
    let lower = input.to_ascii_lowercase();
    let mut out = String::with_capacity(input.len());
    let mut pos = 0;
    while let Some(rel) = lower[pos..].find("<style") {
        let start = pos + rel;
        out.push_str(&input[pos..start]);
        let tag_end = match lower[start..].find('>') {
            Some(i) => start + i + 1,
            None => return out,
        };
        match lower[tag_end..].find("</style>") {
            Some(i) => pos = tag_end + i + "</style>".len(),
            None => return out,
        }
    }
    out.push_str(&input[pos..]);
    out
}

/// Remove `<!-- ... -->` comments, unterminated-to-end like style blocks.
fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pos = 0;
    while let Some(rel) = input[pos..].find("<!--") {
        let start = pos + rel;
        out.push_str(&input[pos..start]);
        match input[start..].find("-->") {
            Some(i) => pos = start + i + 3,
            None => return out,
        }
    }
    out.push_str(&input[pos..]);
    out
}

/// Drop presentation attributes from every tag.
///
/// A small scanner (outside-tag / in-tag / in-quoted-value) rather than
/// repeated substring surgery. Both quote styles are accepted; an
/// unterminated quote on a denied attribute skips one character and
/// retries, so a broken tag never swallows the document.
fn strip_denied_attributes(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    let mut in_tag = false;
    while i < bytes.len() {
        let b = bytes[i];
        if !in_tag {
            if b == b'<' {
                in_tag = true;
            }
            out.push(b);
            i += 1;
            continue;
        }
        match b {
            b'>' => {
                in_tag = false;
                out.push(b);
                i += 1;
            }
            b'"' | b'\'' => {
                // Quoted value of a kept attribute: copy through the close
                // quote, bailing at '>' so a runaway quote cannot eat the
                // rest of the document.
                out.push(b);
                i += 1;
                while i < bytes.len() && bytes[i] != b && bytes[i] != b'>' {
                    out.push(bytes[i]);
                    i += 1;
                }
                if i < bytes.len() && bytes[i] == b {
                    out.push(b);
                    i += 1;
                }
            }
            _ if b.is_ascii_whitespace() => {
                let mut k = i + 1;
                while k < bytes.len() && (bytes[k].is_ascii_alphanumeric() || bytes[k] == b'-') {
                    k += 1;
                }
                if k > i + 1 && k < bytes.len() && bytes[k] == b'=' {
                    let name = input[i + 1..k].to_ascii_lowercase();
                    if DENIED_ATTRIBUTES.contains(&name.as_str()) {
                        match skip_attribute_value(bytes, k + 1) {
                            Some(next) => {
                                i = next;
                                continue;
                            }
                            None => {
                                i += 1;
                                continue;
                            }
                        }
                    }
                }
                out.push(b);
                i += 1;
            }
            _ => {
                out.push(b);
                i += 1;
            }
        }
    }
    // Only ASCII-delimited spans were removed, so this is still valid UTF-8.
    String::from_utf8_lossy(&out).into_owned()
}

/// Index just past the attribute value beginning at `start` (the byte after
/// `=`), or None when a quoted value never closes.
fn skip_attribute_value(bytes: &[u8], start: usize) -> Option<usize> {
    if start >= bytes.len() {
        return Some(start);
    }
    match bytes[start] {
        q @ (b'"' | b'\'') => {
            let mut j = start + 1;
            while j < bytes.len() && bytes[j] != q {
                j += 1;
            }
            if j < bytes.len() {
                Some(j + 1)
            } else {
                None
            }
        }
        _ => {
            let mut j = start;
            while j < bytes.len() && !bytes[j].is_ascii_whitespace() && bytes[j] != b'>' {
                j += 1;
            }
            Some(j)
        }
    }
}

/// MIME mangling sometimes leaves attribute values floating in the middle
/// of text after their name was consumed elsewhere. Drop the known ones.
fn strip_orphaned_fragments(input: &str) -> String {
    const ORPHANS: &[&str] = &[
        r#"="utf-8""#,
        r#"="UTF-8""#,
        r#"="text/html""#,
        r#"="text/css""#,
        r#"="application/"#,
    ];
    let mut result = input.to_string();
    for pat in ORPHANS {
        if result.contains(pat) {
            result = result.replace(pat, "");
        }
    }
    result
}

// ---------------------------------------------------------------------------
// Stage 6-7: cross-derivation and summary
// ---------------------------------------------------------------------------

/// Naive sequential tag stripping for the text-from-html derivation.
/// `<br>`-family tags become newlines first; a `<` with no closing `>`
/// keeps the rest of the input verbatim.
pub fn strip_tags(html: &str) -> String {
    let mut work = html.replace("<pre>", "").replace("</pre>", "");
    for br in ["<br>", "<br/>", "<br />", "<BR>", "<BR/>", "<BR />"] {
        if work.contains(br) {
            work = work.replace(br, "\n");
        }
    }
    let mut out = String::with_capacity(work.len());
    let mut pos = 0;
    while let Some(rel) = work[pos..].find('<') {
        let start = pos + rel;
        out.push_str(&work[pos..start]);
        match work[start..].find('>') {
            Some(i) => pos = start + i + 1,
            None => {
                out.push_str(&work[start..]);
                pos = work.len();
                break;
            }
        }
    }
    out.push_str(&work[pos..]);
    out.trim().to_string()
}

/// Escape-and-wrap derivation for the html-from-text direction.
pub fn wrap_preformatted(text: &str) -> String {
    format!("<pre>{}</pre>", escape_html(text))
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// First five non-empty trimmed lines, joined with a single space. The
/// result is truncated (with marker) when five lines were collected or the
/// joined string exceeds `max_chars`.
pub fn summarize_lines(text: &str, max_chars: usize) -> String {
    if text.is_empty() {
        return String::new();
    }
    let mut lines: Vec<&str> = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        lines.push(trimmed);
        if lines.len() >= SUMMARY_LINES {
            break;
        }
    }
    let joined = lines.join(" ");
    if lines.len() >= SUMMARY_LINES || joined.chars().count() > max_chars {
        let mut out: String = joined.chars().take(max_chars).collect();
        out.push_str(ELLIPSIS);
        out
    } else {
        joined
    }
}

/// Truncate to `max_chars` characters on a code-point boundary, appending
/// the ellipsis marker when anything was cut. The marker is not counted
/// against the budget; both the HTML and text call sites use this same
/// rule.
pub fn truncate_with_marker(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        None => s.to_string(),
        Some((idx, _)) => {
            let mut out = String::with_capacity(idx + ELLIPSIS.len());
            out.push_str(&s[..idx]);
            out.push_str(ELLIPSIS);
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn normalizer() -> Normalizer {
        Normalizer::new(NormalizeConfig::default())
    }

    fn text_body(text: &str) -> MessageBody {
        MessageBody {
            text: text.to_string(),
            html: String::new(),
        }
    }

    fn html_body(html: &str) -> MessageBody {
        MessageBody {
            text: String::new(),
            html: html.to_string(),
        }
    }

    // ── full pipeline ────────────────────────────────────────────

    #[test]
    fn plain_text_only_derives_preformatted_html() {
        let result = normalizer().normalize(&text_body("Hello there!\nLine two."));
        assert_eq!(result.text, "Hello there!\nLine two.");
        assert_eq!(result.html, "<pre>Hello there!\nLine two.</pre>");
        assert!(result.html_derived);
        assert_eq!(result.summary, "Hello there! Line two.");
    }

    #[test]
    fn derived_html_honors_the_smaller_html_budget() {
        let normalizer = Normalizer::new(NormalizeConfig {
            max_html_len: 5,
            max_text_len: 50,
            max_summary_len: 300,
            remove_css: true,
        });
        let result = normalizer.normalize(&text_body("abcdefghij"));
        assert_eq!(result.text, "abcdefghij");
        assert_eq!(result.html, "<pre>abcde...</pre>");
        assert!(result.html_derived);
    }

    #[test]
    fn multipart_quoted_printable_body_cleans_to_text() {
        let raw = "This is a multi-part message in MIME format\n\n--BOUNDARY\nContent-Type: text/plain; charset=utf-8\nContent-Transfer-Encoding: quoted-printable\n\nHello=2C world=3D done.\n--BOUNDARY--";
        let result = normalizer().normalize(&text_body(raw));
        assert_eq!(result.text, "Hello, world= done.");
        assert!(!result.text.contains("BOUNDARY"));
        assert!(!result.text.contains("Content-Type"));
    }

    #[test]
    fn css_removal_strips_style_blocks_and_attributes() {
        let raw = r#"<style>body{color:red}</style><div style="color:red" class="x">Hi</div>"#;
        let result = normalizer().normalize(&html_body(raw));
        assert_eq!(result.html, "<div>Hi</div>");
        assert!(!result.html.contains("style="));
        assert!(!result.html.contains("class="));
        assert_eq!(result.text, "Hi");
    }

    #[test]
    fn both_bodies_empty_produces_empty_content() {
        let result = normalizer().normalize(&MessageBody::default());
        assert_eq!(result, NormalizedContent::default());
    }

    #[test]
    fn whitespace_only_body_is_empty_after_trim() {
        let result = normalizer().normalize(&text_body("   \n\t  \n"));
        assert!(result.text.is_empty());
        assert!(result.html.is_empty());
        assert!(result.summary.is_empty());
    }

    #[test]
    fn derived_text_contains_no_tags() {
        let result =
            normalizer().normalize(&html_body("<div><p>First</p><br><p>Second</p></div>"));
        assert!(!result.text.contains('<'));
        assert!(!result.text.contains('>'));
        assert!(result.text.contains("First"));
        assert!(result.text.contains("Second"));
    }

    #[test]
    fn derived_html_escapes_markup_characters() {
        let result = normalizer().normalize(&text_body("a < b & c > d \"quoted\""));
        assert_eq!(
            result.html,
            "<pre>a &lt; b &amp; c &gt; d &quot;quoted&quot;</pre>"
        );
    }

    #[test]
    fn outputs_respect_configured_limits() {
        let norm = Normalizer::new(NormalizeConfig {
            max_html_len: 10,
            max_text_len: 8,
            max_summary_len: 5,
            remove_css: true,
        });
        let result = norm.normalize(&MessageBody {
            text: "abcdefghijklmnop".to_string(),
            html: "<p>abcdefghijklmnop</p>".to_string(),
        });
        assert_eq!(result.text, "abcdefgh...");
        assert_eq!(result.html.chars().count(), 10 + ELLIPSIS.len());
        assert_eq!(result.summary, "abcde...");
    }

    #[test]
    fn idempotent_on_clean_text() {
        let norm = normalizer();
        let first = norm.normalize(&text_body("Just a clean line."));
        let second = norm.normalize(&text_body(&first.text));
        assert_eq!(first.text, second.text);
        assert_eq!(first.summary, second.summary);
    }

    // ── MIME artifact stripping ──────────────────────────────────

    #[test]
    fn boundary_lines_removed_anywhere_in_body() {
        let raw = "First part\n--part-boundary-42\nSecond part\n--part-boundary-42--";
        assert_eq!(strip_mime_artifacts(raw), "First part\nSecond part");
    }

    #[test]
    fn signature_separator_is_not_a_boundary() {
        let raw = "Bye\n--\nAlice";
        assert_eq!(strip_mime_artifacts(raw), "Bye\n--\nAlice");
    }

    #[test]
    fn header_block_ends_at_first_content_line() {
        let raw = "Content-Type: text/plain\nContent-Transfer-Encoding: 7bit\n\nHello body\nNote: colons in content survive";
        let result = strip_mime_artifacts(raw);
        // Header-shaped lines after real content started are preserved.
        assert!(result.contains("Hello body"));
        assert!(result.contains("Note: colons in content survive"));
        assert!(!result.contains("Content-Type"));
    }

    #[test]
    fn param_continuation_lines_dropped_in_header() {
        let raw = "Content-Type: text/html;\ncharset=\"utf-8\"\n\n<p>Hi</p>";
        assert_eq!(strip_mime_artifacts(raw), "<p>Hi</p>");
    }

    #[test]
    fn html_content_starting_with_doctype_is_preserved() {
        let raw = "Content-Type: text/html\n\n<!DOCTYPE html><html xmlns:v=\"urn:x\">Hi</html>";
        let result = strip_mime_artifacts(raw);
        assert!(result.starts_with("<!DOCTYPE"));
        assert!(result.contains("urn:x"));
    }

    // ── quoted-printable ─────────────────────────────────────────

    #[test]
    fn qp_decodes_hex_escapes() {
        assert_eq!(decode_quoted_printable("Hello=2C=20world"), "Hello, world");
    }

    #[test]
    fn qp_joins_soft_line_breaks() {
        assert_eq!(decode_quoted_printable("long li=\nne"), "long line");
        assert_eq!(decode_quoted_printable("long li=\r\nne"), "long line");
    }

    #[test]
    fn qp_leaves_malformed_escapes_literal() {
        assert_eq!(decode_quoted_printable("a=G5b"), "a=G5b");
        assert_eq!(decode_quoted_printable("trailing="), "trailing=");
        assert_eq!(decode_quoted_printable("short=A"), "short=A");
    }

    #[test]
    fn qp_decodes_multibyte_utf8_sequences() {
        // =E2=82=AC is U+20AC EURO SIGN
        assert_eq!(decode_quoted_printable("=E2=82=AC100"), "\u{20ac}100");
    }

    #[test]
    fn qp_lowercase_hex_accepted() {
        assert_eq!(decode_quoted_printable("=3d=3D"), "==");
    }

    // ── mojibake ─────────────────────────────────────────────────

    #[test]
    fn mojibake_smart_punctuation_repaired() {
        let input = "it\u{e2}\u{80}\u{99}s \u{e2}\u{80}\u{9c}quoted\u{e2}\u{80}\u{9d} \u{e2}\u{80}\u{94} done\u{e2}\u{80}\u{a6}";
        assert_eq!(
            fix_mojibake(input),
            "it\u{2019}s \u{201c}quoted\u{201d} \u{2014} done\u{2026}"
        );
    }

    #[test]
    fn mojibake_nbsp_and_stray_artifacts() {
        assert_eq!(fix_mojibake("a\u{c2}\u{a0}b\u{c2}c"), "a bc");
    }

    #[test]
    fn genuine_unicode_left_alone() {
        let input = "caf\u{e9} \u{2014} na\u{ef}ve";
        assert_eq!(fix_mojibake(input), input);
    }

    // ── HTML sanitizing ──────────────────────────────────────────

    #[test]
    fn style_block_case_insensitive() {
        assert_eq!(
            strip_style_blocks("<STYLE type=\"text/css\">x{}</Style>after"),
            "after"
        );
    }

    #[test]
    fn unterminated_style_block_strips_to_end() {
        assert_eq!(strip_style_blocks("before<style>body{}"), "before");
    }

    #[test]
    fn unterminated_comment_strips_to_end() {
        assert_eq!(strip_comments("keep<!-- never closed"), "keep");
        assert_eq!(strip_comments("a<!-- x -->b"), "ab");
    }

    #[test]
    fn denied_attributes_both_quote_styles() {
        let input = r#"<td width="5" align='left' rowspan="2">x</td>"#;
        assert_eq!(
            strip_denied_attributes(input),
            r#"<td rowspan="2">x</td>"#
        );
    }

    #[test]
    fn denied_attribute_unquoted_value() {
        assert_eq!(strip_denied_attributes("<td width=5>x</td>"), "<td>x</td>");
    }

    #[test]
    fn unterminated_quote_recovers_without_eating_document() {
        let input = "<td width=\"5>x</td><p>after</p>";
        let result = strip_denied_attributes(input);
        assert!(result.contains("after"));
    }

    #[test]
    fn kept_attribute_value_with_angle_bracket() {
        let input = r#"<a href="a>b" title="t">x</a>"#;
        let result = strip_denied_attributes(input);
        assert!(result.contains("href"));
    }

    #[test]
    fn denied_attribute_outside_tag_untouched() {
        let input = "<p>set width=\"5\" in config</p>";
        assert_eq!(strip_denied_attributes(input), input);
    }

    #[test]
    fn orphaned_charset_fragment_removed() {
        assert_eq!(
            strip_orphaned_fragments(r#"<meta ="utf-8"/>"#),
            "<meta />"
        );
    }

    #[test]
    fn sanitize_real_newsletter_head() {
        let raw = concat!(
            "Content-Type: text/html; charset=utf-8\n",
            "Content-Transfer-Encoding: quoted-printable\n",
            "\n",
            "<html lang=3D\"en\" style=3D\"font-size:16px;\"><head><style>\n",
            "body { margin: 0; }\n",
            "</style></head><body bgcolor=3D\"#ffffff\">Hello World Content</body></html>",
        );
        let result = normalizer().normalize(&html_body(raw));
        assert!(result.html.contains("Hello World Content"));
        assert!(!result.html.contains("<style"));
        assert!(!result.html.contains("style="));
        assert!(!result.html.contains("bgcolor="));
        assert!(!result.html.contains("=3D"));
        assert!(!result.html.contains("margin:"));
    }

    // ── derivations ──────────────────────────────────────────────

    #[test]
    fn strip_tags_turns_br_into_newlines() {
        assert_eq!(strip_tags("one<br>two<br/>three<br />four"), "one\ntwo\nthree\nfour");
    }

    #[test]
    fn strip_tags_unterminated_tag_keeps_rest() {
        assert_eq!(strip_tags("text <unclosed"), "text <unclosed");
    }

    #[test]
    fn strip_tags_drops_pre_wrapper() {
        assert_eq!(strip_tags("<pre>kept\nlines</pre>"), "kept\nlines");
    }

    // ── summary ──────────────────────────────────────────────────

    #[test]
    fn summary_joins_up_to_five_lines() {
        let text = "one\n\ntwo\nthree\n  four  \nfive\nsix";
        assert_eq!(summarize_lines(text, 300), "one two three four five...");
    }

    #[test]
    fn summary_under_five_short_lines_no_marker() {
        assert_eq!(summarize_lines("one\ntwo", 300), "one two");
    }

    #[test]
    fn summary_truncates_on_char_boundary() {
        let text = "\u{00e9}\u{00e9}\u{00e9}\u{00e9}\u{00e9}\u{00e9}";
        let result = summarize_lines(text, 4);
        assert_eq!(result, "\u{00e9}\u{00e9}\u{00e9}\u{00e9}...");
    }

    // ── truncation ───────────────────────────────────────────────

    #[test]
    fn truncate_counts_chars_not_bytes() {
        let s = "\u{1f600}\u{1f600}\u{1f600}";
        assert_eq!(truncate_with_marker(s, 2), "\u{1f600}\u{1f600}...");
        assert_eq!(truncate_with_marker(s, 3), s);
        assert_eq!(truncate_with_marker(s, 10), s);
    }

    #[test]
    fn truncate_exact_fit_has_no_marker() {
        assert_eq!(truncate_with_marker("abcd", 4), "abcd");
    }
}
