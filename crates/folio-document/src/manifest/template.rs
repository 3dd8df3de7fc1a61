// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Placeholder substitution for stored manifests.
//
// Static manifests carry two literal placeholders, `{{manifest_uri}}` and
// `{{image_dir_uri}}`, substituted per request so one file serves any
// deployment. Transcript text stores each `{` as `{{lbrace}}`, so nothing a
// transcript contains can ever be taken for a placeholder.
//
// Legacy manifests are ERB-style templates (`<%= manifest_uri %>`). Only the
// two URI expressions, `<%# comments %>`, and the `<%%` escape are understood;
// anything else is a template error.

use folio_core::error::{FolioError, Result};

pub const MANIFEST_URI_PLACEHOLDER: &str = "{{manifest_uri}}";
pub const IMAGE_DIR_URI_PLACEHOLDER: &str = "{{image_dir_uri}}";
const LBRACE_ESCAPE: &str = "{{lbrace}}";

/// Escape transcript text for storage in a static manifest.
pub fn escape_transcript(text: &str) -> String {
    text.replace('{', LBRACE_ESCAPE)
}

/// Substitute the placeholders (and brace escapes) in a static manifest in a
/// single left-to-right pass. Any other `{{...}}` is left as is.
pub fn substitute(text: &str, manifest_uri: &str, image_dir_uri: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        rest = if let Some(after) = tail.strip_prefix(MANIFEST_URI_PLACEHOLDER) {
            out.push_str(manifest_uri);
            after
        } else if let Some(after) = tail.strip_prefix(IMAGE_DIR_URI_PLACEHOLDER) {
            out.push_str(image_dir_uri);
            after
        } else if let Some(after) = tail.strip_prefix(LBRACE_ESCAPE) {
            out.push('{');
            after
        } else {
            out.push_str("{{");
            &tail[2..]
        };
    }
    out.push_str(rest);
    out
}

/// Render a legacy ERB-style manifest template.
pub fn render_legacy(template: &str, manifest_uri: &str, image_dir_uri: &str) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("<%") {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix("<%%") {
            out.push_str("<%");
            rest = after;
            continue;
        }

        let at = template.len() - tail.len();
        let Some(end) = tail.find("%>") else {
            return Err(FolioError::Template(format!("unterminated tag at byte {at}")));
        };
        let body = &tail[2..end];
        rest = &tail[end + 2..];

        if body.starts_with('#') {
            continue;
        }
        let Some(expression) = body.strip_prefix('=') else {
            return Err(FolioError::Template(format!(
                "unsupported code tag at byte {at}: <%{body}%>"
            )));
        };
        match expression.trim().trim_end_matches('-').trim() {
            "manifest_uri" => out.push_str(manifest_uri),
            "image_dir_uri" => out.push_str(image_dir_uri),
            other => {
                return Err(FolioError::Template(format!(
                    "unknown expression {other:?} at byte {at}"
                )));
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_both_placeholders() {
        let text = r#"{"@id":"{{manifest_uri}}","img":"{{image_dir_uri}}/0001.tif"}"#;
        assert_eq!(
            substitute(text, "https://x/m", "https://img/b1_c1"),
            r#"{"@id":"https://x/m","img":"https://img/b1_c1/0001.tif"}"#
        );
    }

    #[test]
    fn escaped_transcripts_render_verbatim() {
        let transcript = "see {{manifest_uri}} and {braces}";
        let stored = escape_transcript(transcript);
        assert!(!stored.contains(MANIFEST_URI_PLACEHOLDER));
        assert_eq!(substitute(&stored, "https://x/m", "https://img"), transcript);
    }

    #[test]
    fn unknown_tags_are_left_alone() {
        assert_eq!(substitute("{{other}} {{", "a", "b"), "{{other}} {{");
    }

    #[test]
    fn substituting_placeholders_with_themselves_is_identity() {
        let text = "{{manifest_uri}}/canvas/p1 {{image_dir_uri}}";
        assert_eq!(
            substitute(text, MANIFEST_URI_PLACEHOLDER, IMAGE_DIR_URI_PLACEHOLDER),
            text
        );
    }

    #[test]
    fn renders_legacy_expressions() {
        let template = r#"<%# generated %>{"@id":"<%= manifest_uri %>","img":"<%=image_dir_uri-%>","t":"a <%% b"}"#;
        assert_eq!(
            render_legacy(template, "M", "I").expect("render"),
            r#"{"@id":"M","img":"I","t":"a <% b"}"#
        );
    }

    #[test]
    fn legacy_syntax_errors() {
        for template in ["<%= manifest_uri", "<% if x %>", "<%= title %>"] {
            let err = render_legacy(template, "M", "I").unwrap_err();
            assert!(matches!(err, FolioError::Template(_)), "{template:?}");
        }
    }
}
