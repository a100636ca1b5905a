//! Sentence-level change highlighting.
//!
//! Marks the sentences of a new summary that do not appear in the previous one. The comparison
//! is approximate: both texts are split on `.`, `!` and `?`, and a new sentence is
//! considered already known when, ignoring case, it contains a previous sentence or is contained
//! by one. This is substring containment, not equality, so "The patient is stable" is unchanged
//! relative to "Patient is stable".
//!
//! Output is an HTML fragment; sentence text is escaped before embedding.

use crate::constants::{HIGHLIGHT_NEW_CLASS, SUMMARY_CONTENT_CLASS};

/// Annotate `new_text` relative to `previous`.
///
/// An absent or blank previous summary marks the whole new text as new. Otherwise each non-empty
/// sentence of `new_text` is emitted with its terminating period, wrapped in a
/// `highlight-new` span when it is new. Sentences are joined by single spaces.
pub fn highlight(previous: Option<&str>, new_text: &str) -> String {
    let previous = match previous {
        Some(p) if !p.trim().is_empty() => p,
        _ => {
            return format!(
                "<div class=\"{SUMMARY_CONTENT_CLASS}\"><span class=\"{HIGHLIGHT_NEW_CLASS}\">{}</span></div>",
                escape_html(new_text)
            );
        }
    };

    let known: Vec<String> = sentences(previous).map(str::to_lowercase).collect();

    let rendered: Vec<String> = sentences(new_text)
        .map(|sentence| {
            let lowered = sentence.to_lowercase();
            let is_known = known
                .iter()
                .any(|old| old.contains(&lowered) || lowered.contains(old.as_str()));
            let escaped = escape_html(sentence);
            if is_known {
                format!("{escaped}.")
            } else {
                format!("<span class=\"{HIGHLIGHT_NEW_CLASS}\">{escaped}.</span>")
            }
        })
        .collect();

    format!(
        "<div class=\"{SUMMARY_CONTENT_CLASS}\">{}</div>",
        rendered.join(" ")
    )
}

fn sentences(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c| matches!(c, '.' | '!' | '?'))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_previous_marks_everything_new() {
        assert_eq!(
            highlight(None, "Patient stable."),
            "<div class=\"summary-content\"><span class=\"highlight-new\">Patient stable.</span></div>"
        );
        assert_eq!(highlight(Some("  "), "Patient stable."), highlight(None, "Patient stable."));
    }

    #[test]
    fn only_new_sentences_are_marked() {
        let html = highlight(
            Some("Patient is stable."),
            "The patient is stable. New medication started.",
        );
        assert_eq!(
            html,
            "<div class=\"summary-content\">The patient is stable. \
             <span class=\"highlight-new\">New medication started.</span></div>"
        );
    }

    #[test]
    fn containment_works_in_both_directions_ignoring_case() {
        let html = highlight(
            Some("Blood pressure well controlled on ramipril today."),
            "BLOOD PRESSURE WELL CONTROLLED! Any questions?",
        );
        assert!(html.contains("BLOOD PRESSURE WELL CONTROLLED. "));
        assert!(html.contains("<span class=\"highlight-new\">Any questions.</span>"));
    }

    #[test]
    fn text_is_escaped() {
        let html = highlight(Some("Old."), "Potassium <3.5 & falling.");
        assert!(html.contains("Potassium &lt;3."));
        assert!(html.contains("5 &amp; falling."));
        assert!(!html.contains("<3"));

        let html = highlight(None, "<script>alert('x')</script>");
        assert!(html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"));
    }

    #[test]
    fn empty_new_text_yields_empty_wrapper() {
        assert_eq!(
            highlight(Some("Patient is stable."), " ... "),
            "<div class=\"summary-content\"></div>"
        );
    }

    #[test]
    fn highlighting_is_deterministic() {
        let previous = Some("Asthma controlled. Inhaler technique reviewed.");
        let new = "Asthma controlled. Peak flow improved. Inhaler technique reviewed.";
        assert_eq!(highlight(previous, new), highlight(previous, new));
    }
}
