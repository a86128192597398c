//! Filters that take effect at the network request level, i.e. URL blocking and exception rules.

use memchr::{memchr as find_char, memrchr as find_char_reverse};
use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};

use std::fmt;

use crate::filters::FilterParseError;
use crate::utils;

/// Matches any character that can't be part of a hostname or path token, or the end of the URL.
/// The trailing `|$` alternative is removed again when the pattern is handed to the content
/// blocker, which has no alternation support.
pub const SEPARATOR_REGEX: &str = "([^a-zA-Z0-9_.%-]|$)";

/// Equivalent of a `||` hostname anchor: any scheme, optionally followed by subdomains.
pub const HOSTNAME_ANCHOR_REGEX: &str = "^[^:]+:(//)?([^/]+\\.)?";

/// Used for rules without a pattern, e.g. `$image,domain=example.com`.
pub const ANY_HTTP_URL_REGEX: &str = "^https?://";

bitflags::bitflags! {
    /// Request types (and exception types) a URL rule applies to.
    #[derive(Serialize, Deserialize)]
    pub struct ContentType: u32 {
        const OTHER = 1; // 1 << 0;
        const SCRIPT = 1 << 1;
        const STYLESHEET = 1 << 2;
        const OBJECT = 1 << 3;
        const IMAGE = 1 << 4;
        const XMLHTTPREQUEST = 1 << 5;
        const OBJECT_SUBREQUEST = 1 << 6;
        const MEDIA = 1 << 7;
        const FONT = 1 << 8;
        const SUBDOCUMENT = 1 << 9;
        const WEBSOCKET = 1 << 10;

        // Exception-only types, these don't restrict the requests a rule matches
        const ELEMHIDE = 1 << 20;
        const URLBLOCK = 1 << 21;
        const JSINJECT = 1 << 22;
        const CONTENT = 1 << 23;
        const POPUP = 1 << 24;
        const GENERICHIDE = 1 << 25;
        const GENERICBLOCK = 1 << 26;

        // Rules without any content type options match all of these
        const ALL = Self::OTHER.bits |
            Self::SCRIPT.bits |
            Self::STYLESHEET.bits |
            Self::OBJECT.bits |
            Self::IMAGE.bits |
            Self::XMLHTTPREQUEST.bits |
            Self::OBJECT_SUBREQUEST.bits |
            Self::MEDIA.bits;

        // `$document` disables every kind of filtering on a page
        const DOCUMENT = Self::ELEMHIDE.bits |
            Self::URLBLOCK.bits |
            Self::JSINJECT.bits |
            Self::CONTENT.bits;

        // Careful with checking for NONE - will always match
        const NONE = 0;
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:b}", &self)
    }
}

/// The sources a content blocker `url-filter` can be built from, in order of preference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSource {
    /// Body of a `/regex/` rule.
    pub regex: Option<String>,
    /// Regex derived from a plain adblock pattern.
    pub derived: Option<String>,
    /// The pattern as written in the rule.
    pub raw: String,
}

impl PatternSource {
    /// Picks the best available pattern: a complete regex, then a derived regex, then the raw
    /// pattern text.
    pub fn url_filter_source(&self) -> &str {
        if let Some(regex) = self.regex.as_deref() {
            return regex;
        }
        match self.derived.as_deref() {
            Some(derived) if !derived.is_empty() => derived,
            _ => &self.raw,
        }
    }
}

/// Struct representing a parsed URL blocking or exception rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRule {
    pub pattern_source: PatternSource,
    pub content_type_mask: ContentType,
    /// `@@` exception rules.
    pub is_whitelist: bool,
    /// `Some(true)` for `$third-party`, `Some(false)` for `$~third-party` or `$first-party`.
    pub is_third_party: Option<bool>,
    pub match_case: bool,
    pub included_domains: Vec<String>,
    pub excluded_domains: Vec<String>,
    pub original_text: String,
}

#[derive(Clone, Copy)]
enum LeftAnchor {
    /// A `||` token, which represents a match to the start of a domain or subdomain segment.
    DoublePipe,
    /// A `|` token, which represents a match to the exact start of the URL.
    SinglePipe,
}

/// Any option that appears on the right side of a URL rule as initiated by a `$` character.
enum UrlRuleOption {
    Domain(Vec<(bool, String)>),
    ThirdParty(bool),
    MatchCase,
    /// A request type, `false` if negated with a prepended `~`.
    RequestType(ContentType, bool),
    /// An exception-only type like `$document` or `$elemhide`.
    ExceptionType(ContentType),
}

fn parse_rule_options(raw_options: &str) -> Result<Vec<UrlRuleOption>, FilterParseError> {
    let mut result = vec![];

    for raw_option in raw_options.split(',') {
        // Check for negation: ~option
        let negation = raw_option.starts_with('~');
        let maybe_negated_option = raw_option.trim_start_matches('~');

        // Check for options: option=value1|value2
        let (option, value) = match maybe_negated_option.split_once('=') {
            Some((option, value)) => (option, value),
            None => (maybe_negated_option, ""),
        };

        macro_rules! request_type {
            ($content_type:ident) => {
                UrlRuleOption::RequestType(ContentType::$content_type, !negation)
            };
        }

        macro_rules! exception_type {
            ($content_type:ident) => {
                if negation {
                    return Err(FilterParseError::NegatedOption(String::from(option)));
                } else {
                    UrlRuleOption::ExceptionType(ContentType::$content_type)
                }
            };
        }

        result.push(match option {
            "domain" => {
                let domains: Vec<(bool, String)> = value
                    .split('|')
                    .map(|domain| {
                        if let Some(negated_domain) = domain.strip_prefix('~') {
                            (false, negated_domain.to_string())
                        } else {
                            (true, domain.to_string())
                        }
                    })
                    .filter(|(_, d)| !d.is_empty() && !(d.starts_with('/') && d.ends_with('/')))
                    .collect();
                if domains.is_empty() {
                    return Err(FilterParseError::NoSupportedDomains);
                }
                UrlRuleOption::Domain(domains)
            }
            "third-party" | "3p" => UrlRuleOption::ThirdParty(!negation),
            "first-party" | "1p" => UrlRuleOption::ThirdParty(negation),
            "match-case" if negation => {
                return Err(FilterParseError::NegatedOption(String::from(option)))
            }
            "match-case" => UrlRuleOption::MatchCase,
            "image" => request_type!(IMAGE),
            "stylesheet" | "css" => request_type!(STYLESHEET),
            "script" => request_type!(SCRIPT),
            "media" => request_type!(MEDIA),
            "popup" => request_type!(POPUP),
            "xmlhttprequest" | "xhr" => request_type!(XMLHTTPREQUEST),
            "other" => request_type!(OTHER),
            "font" => request_type!(FONT),
            "subdocument" | "frame" => request_type!(SUBDOCUMENT),
            "object" => request_type!(OBJECT),
            "object-subrequest" => request_type!(OBJECT_SUBREQUEST),
            "websocket" => request_type!(WEBSOCKET),
            "document" | "doc" => exception_type!(DOCUMENT),
            "elemhide" | "ehide" => exception_type!(ELEMHIDE),
            "urlblock" => exception_type!(URLBLOCK),
            "jsinject" => exception_type!(JSINJECT),
            "content" => exception_type!(CONTENT),
            "generichide" | "ghide" => exception_type!(GENERICHIDE),
            "genericblock" => exception_type!(GENERICBLOCK),
            _ => return Err(FilterParseError::UnrecognisedOption(String::from(option))),
        });
    }
    Ok(result)
}

impl UrlRule {
    pub fn parse(line: &str) -> Result<Self, FilterParseError> {
        let mut filter_index_start: usize = 0;
        let mut filter_index_end: usize = line.len();

        let mut is_whitelist = false;
        if line.starts_with("@@") {
            filter_index_start += 2;
            is_whitelist = true;
        }

        // A `/regex/` pattern may itself contain `$`, so only look for options past its end
        let regex_end = find_char_reverse(b'/', line.as_bytes())
            .filter(|slash| line[filter_index_start..].starts_with('/') && *slash > filter_index_start);
        let maybe_options_index = match regex_end {
            Some(slash) => find_char(b'$', line[slash..].as_bytes()).map(|i| slash + i),
            None => find_char_reverse(b'$', line.as_bytes()).filter(|i| *i >= filter_index_start),
        };

        let mut options = vec![];
        if let Some(options_index) = maybe_options_index {
            filter_index_end = options_index;
            // slicing here is safe; the first byte after '$' will be a character boundary
            options = parse_rule_options(&line[filter_index_end + 1..])?;
        }

        let raw_pattern = &line[filter_index_start..filter_index_end];

        let left_anchor = if line[filter_index_start..filter_index_end].starts_with("||") {
            filter_index_start += 2;
            Some(LeftAnchor::DoublePipe)
        } else if line[filter_index_start..filter_index_end].starts_with('|') {
            filter_index_start += 1;
            Some(LeftAnchor::SinglePipe)
        } else {
            None
        };

        let right_anchor = filter_index_end > filter_index_start
            && line[..filter_index_end].ends_with('|');
        if right_anchor {
            filter_index_end -= 1;
        }

        let pattern = &line[filter_index_start..filter_index_end];

        let mut is_third_party = None;
        let mut match_case = false;
        let mut included_domains = vec![];
        let mut excluded_domains = vec![];

        // Temporary masks for positive (e.g.: $script) and negative (e.g.: $~script)
        // request types, and for exception-only types.
        let mut cpt_mask_positive = ContentType::NONE;
        let mut cpt_mask_negative = ContentType::NONE;
        let mut cpt_mask_exception = ContentType::NONE;

        for option in options {
            match option {
                UrlRuleOption::Domain(domains) => {
                    for (enabled, domain) in domains {
                        if enabled {
                            included_domains.push(domain);
                        } else {
                            excluded_domains.push(domain);
                        }
                    }
                }
                UrlRuleOption::ThirdParty(third_party) => is_third_party = Some(third_party),
                UrlRuleOption::MatchCase => match_case = true,
                UrlRuleOption::RequestType(content_type, true) => {
                    cpt_mask_positive |= content_type
                }
                UrlRuleOption::RequestType(content_type, false) => {
                    cpt_mask_negative |= content_type
                }
                UrlRuleOption::ExceptionType(content_type) => cpt_mask_exception |= content_type,
            }
        }

        // If no positive types were set, then the rule applies to all request types
        let mut content_type_mask = if cpt_mask_positive.is_empty() {
            ContentType::ALL
        } else {
            cpt_mask_positive
        };
        content_type_mask &= !cpt_mask_negative;
        content_type_mask |= cpt_mask_exception;
        if content_type_mask.is_empty() {
            return Err(FilterParseError::FilterParseError);
        }

        let is_regex = left_anchor.is_none()
            && !right_anchor
            && pattern.len() > 1
            && pattern.starts_with('/')
            && pattern.ends_with('/');

        let pattern_source = if is_regex {
            // unescape unrecognised escaping sequences, otherwise a normal regex
            let unescaped = pattern[1..pattern.len() - 1]
                .replace("\\/", "/")
                .replace("\\:", ":");
            PatternSource {
                regex: Some(unescaped),
                derived: None,
                raw: String::from(raw_pattern),
            }
        } else {
            PatternSource {
                regex: None,
                derived: Some(derive_regex(pattern, left_anchor, right_anchor, match_case)?),
                raw: String::from(raw_pattern),
            }
        };

        Ok(UrlRule {
            pattern_source,
            content_type_mask,
            is_whitelist,
            is_third_party,
            match_case,
            included_domains,
            excluded_domains,
            original_text: String::from(line),
        })
    }

    /// The rule text without its `@@` exception marker.
    pub fn url_rule_text(&self) -> &str {
        self.original_text
            .strip_prefix("@@")
            .unwrap_or(&self.original_text)
    }
}

impl fmt::Display for UrlRule {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{}", self.original_text)
    }
}

/// Builds a regex equivalent of an adblock pattern, in the restricted dialect understood by
/// content blockers.
fn derive_regex(
    pattern: &str,
    left_anchor: Option<LeftAnchor>,
    right_anchor: bool,
    match_case: bool,
) -> Result<String, FilterParseError> {
    // Escape special regex characters: |.$+?{}()[]\
    static SPECIAL_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"([\|\.\$\+\?\{\}\(\)\[\]\\])").unwrap());
    // * can match anything
    static WILDCARD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*").unwrap());
    // ^ can match any separator or the end of the pattern
    static ANCHOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\^").unwrap());

    if let Some(LeftAnchor::SinglePipe) = left_anchor {
        if pattern == "ws://" || pattern == "wss://" {
            return Ok(String::from("^wss?://"));
        }
    }

    let mut left_anchor = left_anchor;
    let mut pattern = pattern;

    // Remove trailing '*'
    if !right_anchor {
        pattern = pattern.trim_end_matches('*');
    }
    // Remove leading '*' if the pattern is not hostname anchored
    if !matches!(left_anchor, Some(LeftAnchor::DoublePipe)) && pattern.starts_with('*') {
        pattern = pattern.trim_start_matches('*');
        left_anchor = None;
    }

    if pattern.is_empty() && left_anchor.is_none() {
        return Ok(String::from(ANY_HTTP_URL_REGEX));
    }

    let mut normalized = if match_case {
        String::from(pattern)
    } else {
        pattern.to_lowercase()
    };

    if let Some(LeftAnchor::DoublePipe) = left_anchor {
        let hostname_end = normalized
            .find(|c: char| c == '/' || c == '^' || c == '*')
            .unwrap_or(normalized.len());
        if utils::has_unicode(&normalized[..hostname_end]) {
            let hostname = utils::normalize_domain(&normalized[..hostname_end])
                .map_err(|_| FilterParseError::PunycodeError)?;
            normalized = format!("{}{}", hostname, &normalized[hostname_end..]);
        }
    }

    let repl = SPECIAL_RE.replace_all(&normalized, "\\$1");
    let repl = WILDCARD_RE.replace_all(&repl, ".*");
    let repl = ANCHOR_RE.replace_all(&repl, NoExpand(SEPARATOR_REGEX));

    let left = match left_anchor {
        Some(LeftAnchor::DoublePipe) => HOSTNAME_ANCHOR_REGEX,
        Some(LeftAnchor::SinglePipe) => "^",
        None => "",
    };
    let right = if right_anchor { "$" } else { "" };

    Ok(format!("{}{}{}", left, repl, right))
}

#[cfg(test)]
#[path = "../../tests/unit/filters/network.rs"]
mod unit_tests;
