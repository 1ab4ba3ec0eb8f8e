//! Construction of replacement WordprocessingML fragments.
//!
//! Rewritten paragraphs get their text back as freshly built runs. Each run
//! clones the style donor's raw `<w:rPr>` block and, for emphasised
//! segments, splices a `<w:b/>` or `<w:i/>` in front of the existing
//! properties (removing any old toggle of the same kind so the flag is not
//! stated twice). Text is re-expanded the way Word writes it: literal tabs
//! become `<w:tab/>`, newlines become `<w:br/>`, and everything else goes
//! into `<w:t xml:space="preserve">` so leading and trailing spaces
//! survive.

use once_cell::sync::Lazy;
use quick_xml::escape::escape;
use regex::Regex;

/// Character emphasis applied to one rewritten run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStyle {
    Plain,
    Bold,
    Italic,
}

static RE_BOLD_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<w:b(?:\s[^>]*)?/>").unwrap());
static RE_ITALIC_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<w:i(?:\s[^>]*)?/>").unwrap());

/// Build one `<w:r>` carrying `text` with the donor's properties plus the
/// requested emphasis.
pub fn run_xml(base_rpr: Option<&str>, style: RunStyle, text: &str) -> String {
    format!("<w:r>{}{}</w:r>", rpr_with_style(base_rpr, style), text_xml(text))
}

/// Build the description paragraph inserted after an image's paragraph.
pub fn description_paragraph_xml(text: &str) -> String {
    format!("<w:p>{}</w:p>", run_xml(None, RunStyle::Italic, text))
}

fn rpr_with_style(base: Option<&str>, style: RunStyle) -> String {
    match style {
        RunStyle::Plain => base.unwrap_or_default().to_string(),
        RunStyle::Bold => styled(base, "<w:b/>", &RE_BOLD_TAG),
        RunStyle::Italic => styled(base, "<w:i/>", &RE_ITALIC_TAG),
    }
}

fn styled(base: Option<&str>, tag: &str, same_toggle: &Regex) -> String {
    match base {
        None => format!("<w:rPr>{tag}</w:rPr>"),
        Some(base) => {
            let inner = same_toggle.replace_all(rpr_inner(base), "");
            format!("<w:rPr>{tag}{inner}</w:rPr>")
        }
    }
}

/// The property elements inside a raw `<w:rPr>…</w:rPr>` block.
fn rpr_inner(base: &str) -> &str {
    if let Some(rest) = base.strip_suffix("</w:rPr>") {
        if let Some(gt) = rest.find('>') {
            return &rest[gt + 1..];
        }
    }
    // Self-closing or unrecognised: treat as no properties.
    ""
}

/// Escape `text` into `w:t`/`w:tab`/`w:br` elements.
fn text_xml(text: &str) -> String {
    let mut out = String::new();
    let mut pending = String::new();
    let flush = |out: &mut String, pending: &mut String| {
        if !pending.is_empty() {
            out.push_str(r#"<w:t xml:space="preserve">"#);
            out.push_str(&escape(pending.as_str()));
            out.push_str("</w:t>");
            pending.clear();
        }
    };
    for ch in text.chars() {
        match ch {
            '\t' => {
                flush(&mut out, &mut pending);
                out.push_str("<w:tab/>");
            }
            '\n' => {
                flush(&mut out, &mut pending);
                out.push_str("<w:br/>");
            }
            _ => pending.push(ch),
        }
    }
    flush(&mut out, &mut pending);
    out
}
