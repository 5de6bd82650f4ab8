//! Charter parser (C1).
//!
//! Extracts GOALS, SCOPE, and CONSTRAINTS from a project charter markdown
//! document into a [`CharterRecord`]. Tolerant of decorative markup: emoji,
//! bold/italic, numbering, horizontal rules, and nested bullets.

use crate::error::{ForgeError, Result};
use crate::types::CharterRecord;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Goals,
    Scope,
    Constraints,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeSubsection {
    In,
    Out,
    Unspecified,
}

/// Parse a charter file from disk.
pub fn parse_file(path: &Path) -> Result<CharterRecord> {
    let text = std::fs::read_to_string(path).map_err(|_| ForgeError::CharterMissing {
        path: path.display().to_string(),
    })?;
    parse(&text).ok_or_else(|| ForgeError::CharterUnparseable {
        path: path.display().to_string(),
    })
}

/// Parse charter text already loaded into memory. Returns `None` when no
/// GOALS/SCOPE/CONSTRAINTS section can be located anywhere in the document,
/// which the caller surfaces as `CharterUnparseable`.
pub fn parse(text: &str) -> Option<CharterRecord> {
    let mut record = CharterRecord::default();
    let mut section = Section::Other;
    let mut scope_subsection = ScopeSubsection::Unspecified;
    let mut saw_any_section = false;
    let mut in_code_block = false;
    let mut seen_scope_in_item = false;

    for raw_line in text.lines() {
        let line = raw_line.trim();

        if line.starts_with("```") {
            in_code_block = !in_code_block;
            continue;
        }
        if in_code_block {
            continue;
        }

        // Horizontal rules: bare runs of -, *, or _ (length >= 3).
        if is_horizontal_rule(line) {
            continue;
        }

        if let Some(header) = match_top_section(line) {
            section = header;
            scope_subsection = ScopeSubsection::Unspecified;
            seen_scope_in_item = false;
            saw_any_section = true;
            continue;
        }

        if section == Section::Scope {
            if let Some(sub) = match_scope_subsection(line) {
                scope_subsection = sub;
                continue;
            }
        }

        if line.is_empty() {
            continue;
        }

        let Some(item_text) = extract_bullet(line) else {
            continue;
        };

        let cleaned = clean_item_text(item_text);
        if cleaned.is_empty() {
            continue;
        }

        match section {
            Section::Goals => record.goals.push(cleaned),
            Section::Constraints => record.constraints.push(cleaned),
            Section::Scope => {
                let (cleaned, marker) = strip_scope_marker(&cleaned);
                let target = match (scope_subsection, marker) {
                    (_, Some(ScopeMarker::In)) => ScopeSubsection::In,
                    (_, Some(ScopeMarker::Out)) => ScopeSubsection::Out,
                    (ScopeSubsection::In, None) => ScopeSubsection::In,
                    (ScopeSubsection::Out, None) => ScopeSubsection::Out,
                    (ScopeSubsection::Unspecified, None) => {
                        if seen_scope_in_item {
                            continue;
                        }
                        ScopeSubsection::In
                    }
                };
                match target {
                    ScopeSubsection::In => {
                        seen_scope_in_item = true;
                        record.scope_in.insert(cleaned);
                    }
                    ScopeSubsection::Out => {
                        record.scope_out.insert(cleaned);
                    }
                    ScopeSubsection::Unspecified => unreachable!(),
                }
            }
            Section::Other => {}
        }
    }

    if !saw_any_section {
        return None;
    }
    Some(record)
}

fn is_horizontal_rule(line: &str) -> bool {
    if line.len() < 3 {
        return false;
    }
    let mut chars = line.chars().filter(|c| !c.is_whitespace());
    let Some(first) = chars.clone().next() else {
        return false;
    };
    if !matches!(first, '-' | '*' | '_') {
        return false;
    }
    chars.clone().count() >= 3 && chars.all(|c| c == first)
}

fn match_top_section(line: &str) -> Option<Section> {
    let rest = line.strip_prefix("##")?;
    let rest = rest.trim_start_matches('#');
    let rest = rest.trim();
    let name = rest
        .trim_matches(|c: char| c.is_whitespace())
        .trim_start_matches(|c: char| "*_".contains(c))
        .trim_end_matches(|c: char| "*_".contains(c))
        .trim();
    let name = strip_leading_emoji(name);
    match name.to_uppercase().as_str() {
        "GOALS" => Some(Section::Goals),
        "SCOPE" => Some(Section::Scope),
        "CONSTRAINTS" => Some(Section::Constraints),
        _ => None,
    }
}

fn match_scope_subsection(line: &str) -> Option<ScopeSubsection> {
    let rest = line.strip_prefix("###")?;
    let name = strip_leading_emoji(rest.trim()).to_lowercase();
    if name.contains("in scope") {
        Some(ScopeSubsection::In)
    } else if name.contains("out of scope") || name.contains("out-of-scope") {
        Some(ScopeSubsection::Out)
    } else {
        None
    }
}

/// Strip a run of leading non-ASCII "emoji-like" characters and whitespace.
fn strip_leading_emoji(s: &str) -> &str {
    s.trim_start_matches(|c: char| !c.is_ascii() || c.is_whitespace())
}

fn extract_bullet(line: &str) -> Option<&str> {
    for prefix in ["- ", "* ", "• "] {
        if let Some(rest) = line.strip_prefix(prefix) {
            return Some(rest.trim());
        }
    }
    // Bare `-`/`*`/`•` with nothing after (skip) are not useful items.
    if line == "-" || line == "*" || line == "•" {
        return None;
    }
    // Numbered items: `1.`, `12.` etc.
    let digits: String = line.chars().take_while(char::is_ascii_digit).collect();
    if !digits.is_empty() {
        let rest = &line[digits.len()..];
        if let Some(after_dot) = rest.strip_prefix('.') {
            return Some(after_dot.trim());
        }
    }
    // Nested bullets indented under a parent item still start with one of
    // the markers above once trimmed, so no special casing is needed here.
    None
}

enum ScopeMarker {
    In,
    Out,
}

fn strip_scope_marker(item: &str) -> (String, Option<ScopeMarker>) {
    if let Some(rest) = item.strip_prefix('\u{2705}') {
        return (rest.trim().to_string(), Some(ScopeMarker::In));
    }
    if let Some(rest) = item.strip_prefix('\u{274c}') {
        return (rest.trim().to_string(), Some(ScopeMarker::Out));
    }
    (item.to_string(), None)
}

/// Strip bold/italic markers, leading emoji, and a trailing
/// `" - explanation"` remainder, keeping the head of the item.
fn clean_item_text(text: &str) -> String {
    let text = strip_leading_emoji(text.trim());
    let text = text.trim_start_matches(|c: char| "*_`".contains(c));
    let text = text.trim_end_matches(|c: char| "*_`".contains(c));
    let text = text.trim();

    // Drop a trailing " - explanation" or " — explanation" remainder, but
    // not a hyphen that is part of the head itself (e.g. "JWT-based auth").
    let head = split_on_dash_explanation(text);
    head.trim().to_string()
}

fn split_on_dash_explanation(text: &str) -> &str {
    for sep in [" - ", " — ", " – "] {
        if let Some(idx) = text.find(sep) {
            return &text[..idx];
        }
    }
    text
}
