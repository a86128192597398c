//! Element hiding rules, i.e. CSS selector-based filtering and CSS injection.

use memchr::memchr as find_char;
use serde::{Deserialize, Serialize};

use crate::filters::FilterParseError;

/// Pseudo-classes that need a procedural (script-driven) implementation and therefore can't be
/// handed to a declarative engine.
const PROCEDURAL_OPERATORS: &[&str] = &[
    "-abp-",
    "contains",
    "has",
    "if",
    "if-not",
    "matches-css",
    "matches-css-after",
    "matches-css-before",
    "properties",
    "subject",
    "xpath",
];

/// Struct representing a parsed cosmetic filter rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosmeticRule {
    pub selector: String,
    /// Domains the rule is restricted to, as written in the rule.
    pub included_domains: Vec<String>,
    /// Domains the rule must not apply to (`~` prefixed in the rule), as written.
    pub excluded_domains: Vec<String>,
    /// `#@#` exception rules.
    pub is_whitelist: bool,
    /// Rules whose effect needs style injection rather than hiding (`#$#`, `:style(...)`).
    pub is_injected: bool,
    pub raw_line: String,
}

impl CosmeticRule {
    /// Parse the rule in `line` into a `CosmeticRule`. The caller is expected to have already
    /// checked that the line contains a supported cosmetic marker (`##`, `#@#`, `#$#` or `#@$#`).
    pub fn parse(line: &str) -> Result<CosmeticRule, FilterParseError> {
        let sharp_index =
            find_char(b'#', line.as_bytes()).ok_or(FilterParseError::FilterParseError)?;
        let after_sharp = &line[sharp_index + 1..];

        let (is_whitelist, is_injected, marker_len) = if after_sharp.starts_with('#') {
            (false, false, 2)
        } else if after_sharp.starts_with("@#") {
            (true, false, 3)
        } else if after_sharp.starts_with("$#") {
            (false, true, 3)
        } else if after_sharp.starts_with("@$#") {
            (true, true, 4)
        } else {
            return Err(FilterParseError::FilterParseError);
        };

        let (included_domains, excluded_domains) = if sharp_index > 0 {
            parse_domains(&line[..sharp_index])?
        } else {
            (vec![], vec![])
        };

        let selector = line[sharp_index + marker_len..].trim();
        if selector.is_empty() {
            return Err(FilterParseError::EmptySelector);
        }

        let mut is_injected = is_injected;
        if !is_injected {
            for index_after_colon in pseudo_class_starts(selector) {
                let pseudo = &selector[index_after_colon..];
                if pseudo.starts_with("style(") {
                    if !selector.ends_with(')') {
                        return Err(FilterParseError::FilterParseError);
                    }
                    is_injected = true;
                } else if PROCEDURAL_OPERATORS.iter().any(|op| pseudo.starts_with(op)) {
                    return Err(FilterParseError::Unsupported("procedural cosmetic"));
                }
            }
        }

        Ok(CosmeticRule {
            selector: String::from(selector),
            included_domains,
            excluded_domains,
            is_whitelist,
            is_injected,
            raw_line: String::from(line),
        })
    }
}

/// Byte offsets just past every `:` that starts a pseudo-class. Colons inside attribute selectors
/// and quoted strings are skipped.
fn pseudo_class_starts(selector: &str) -> Vec<usize> {
    let mut starts = vec![];
    let mut bracket_depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut escaped = false;

    for (index, byte) in selector.bytes().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, byte) {
            (_, b'\\') => escaped = true,
            (Some(open), byte) if byte == open => quote = None,
            (Some(_), _) => {}
            (None, b'"') | (None, b'\'') => quote = Some(byte),
            (None, b'[') => bracket_depth += 1,
            (None, b']') => bracket_depth = bracket_depth.saturating_sub(1),
            (None, b':') if bracket_depth == 0 => starts.push(index + 1),
            _ => {}
        }
    }

    starts
}

/// Splits the comma-separated domain prefix of a cosmetic rule into included and excluded
/// domains. Regex domains (`/.../`) and entities (`example.*`) have no content blocker
/// equivalent and are skipped; if nothing else remains the rule is rejected outright, since
/// dropping the restriction would make it apply everywhere.
fn parse_domains(raw: &str) -> Result<(Vec<String>, Vec<String>), FilterParseError> {
    let mut included = vec![];
    let mut excluded = vec![];
    let mut skipped = false;

    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (negation, hostname) = match part.strip_prefix('~') {
            Some(negated) => (true, negated),
            None => (false, part),
        };
        if (hostname.len() > 1 && hostname.starts_with('/') && hostname.ends_with('/'))
            || hostname.ends_with(".*")
        {
            skipped = true;
            continue;
        }
        if negation {
            excluded.push(String::from(hostname));
        } else {
            included.push(String::from(hostname));
        }
    }

    if skipped && included.is_empty() && excluded.is_empty() {
        return Err(FilterParseError::NoSupportedDomains);
    }

    Ok((included, excluded))
}

#[cfg(test)]
#[path = "../../tests/unit/filters/cosmetic.rs"]
mod unit_tests;
