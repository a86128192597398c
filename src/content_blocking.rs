//! Transforms filter rules into content blocking rules understood by WebKit's content blocker.
//!
//! Each [`FilterRule`] is translated on its own here; batch-level processing (exception merging,
//! selector compaction, domain wildcards and the rule limit) lives in [`crate::converter`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::fmt;

use crate::filters::cosmetic::CosmeticRule;
use crate::filters::network::{ContentType, UrlRule};
use crate::filters::{FilterParseError, FilterRule};
use crate::utils;

/// `url-filter` value matching every URL.
pub const URL_FILTER_ANY_URL: &str = ".*";

/// Prefixes stripped from exception rule text when looking for the domain it applies to.
const RULE_DOMAIN_PREFIXES: &[&str] = &[
    "http://www.",
    "https://www.",
    "http://",
    "https://",
    "||",
    "//",
];

const DOMAIN_OPTION: &str = "domain=";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum CbResourceType {
    Document,
    Image,
    StyleSheet,
    Script,
    Font,
    Raw,
    Media,
    Popup,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum CbLoadType {
    FirstParty,
    ThirdParty,
}

/// The match conditions of a content blocking rule.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct CbTrigger {
    pub url_filter: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_filter_is_case_sensitive: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub if_domain: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unless_domain: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<Vec<CbResourceType>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_type: Option<Vec<CbLoadType>>,
}

impl CbTrigger {
    fn any_url() -> Self {
        Self {
            url_filter: String::from(URL_FILTER_ANY_URL),
            ..Default::default()
        }
    }

    pub(crate) fn has_domain_restriction(&self) -> bool {
        self.if_domain.is_some() || self.unless_domain.is_some()
    }

    pub(crate) fn has_conflicting_domains(&self) -> bool {
        matches!(&self.if_domain, Some(included) if !included.is_empty())
            && matches!(&self.unless_domain, Some(excluded) if !excluded.is_empty())
    }
}

/// The effect of a content blocking rule.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CbAction {
    Block,
    IgnorePreviousRules {
        /// Set for cosmetic exceptions, which are folded into the matching hiding rules rather
        /// than emitted.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
    },
    CssDisplayNone {
        selector: String,
    },
}

impl CbAction {
    /// Turns the action into the exception equivalent, keeping any selector.
    fn into_exception(self) -> Self {
        match self {
            CbAction::Block => CbAction::IgnorePreviousRules { selector: None },
            CbAction::CssDisplayNone { selector } => CbAction::IgnorePreviousRules {
                selector: Some(selector),
            },
            exception => exception,
        }
    }

    pub fn selector(&self) -> Option<&str> {
        match self {
            CbAction::Block => None,
            CbAction::IgnorePreviousRules { selector } => selector.as_deref(),
            CbAction::CssDisplayNone { selector } => Some(selector),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CbRule {
    pub trigger: CbTrigger,
    pub action: CbAction,
}

/// Kinds of injection rules, none of which have a declarative equivalent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionKind {
    Css,
    Script,
}

impl fmt::Display for InjectionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InjectionKind::Css => write!(f, "CSS"),
            InjectionKind::Script => write!(f, "script"),
        }
    }
}

/// Reasons a single rule could not be converted. These never abort a conversion; they are
/// collected as diagnostics alongside the converted rules.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("{0} rules are not supported")]
    UnsupportedRuleKind(&'static str),
    #[error("content blockers do not support both permitted and restricted domains")]
    ConflictingDomainRestriction,
    #[error("{0} content type is not supported")]
    UnsupportedContentType(&'static str),
    #[error("content blockers do not support {0} in regular expressions")]
    UnsupportedRegexConstruct(&'static str),
    #[error("{0} injection rules cannot be converted")]
    UnsupportedInjection(InjectionKind),
    #[error("document level exception with path `{0}` cannot be converted")]
    WhitelistWithPath(String),
    #[error("could not parse a domain from exception rule")]
    UnparseableWhitelistDomain,
    #[error("permitted and restricted domains both present after applying CSS exceptions")]
    ExceptionDomainConflict,
    #[error("{0} rules limit is reached, next rules are ignored")]
    OverLimit(usize),
    #[error("invalid domain `{0}`")]
    InvalidDomain(String),
    #[error("failed to parse rule: {0}")]
    Parse(FilterParseError),
}

impl From<FilterParseError> for ConversionError {
    fn from(err: FilterParseError) -> Self {
        match err {
            FilterParseError::Unsupported(kind) => ConversionError::UnsupportedRuleKind(kind),
            err => ConversionError::Parse(err),
        }
    }
}

impl TryFrom<&FilterRule> for CbRule {
    type Error = ConversionError;

    fn try_from(rule: &FilterRule) -> Result<Self, Self::Error> {
        convert_rule(rule)
    }
}

/// Converts a single parsed rule, dispatching on its kind.
pub fn convert_rule(rule: &FilterRule) -> Result<CbRule, ConversionError> {
    match rule {
        FilterRule::Cosmetic(rule) => convert_cosmetic_rule(rule),
        FilterRule::Script(_) => Err(ConversionError::UnsupportedInjection(
            InjectionKind::Script,
        )),
        FilterRule::Url(rule) => convert_url_rule(rule),
    }
}

fn convert_cosmetic_rule(rule: &CosmeticRule) -> Result<CbRule, ConversionError> {
    if rule.is_injected {
        return Err(ConversionError::UnsupportedInjection(InjectionKind::Css));
    }

    let mut cb_rule = CbRule {
        trigger: CbTrigger::any_url(),
        action: CbAction::CssDisplayNone {
            selector: rule.selector.clone(),
        },
    };

    if rule.is_whitelist {
        cb_rule.action = cb_rule.action.into_exception();
    }
    DomainRestriction::resolve(&rule.included_domains, &rule.excluded_domains)?
        .write_to(&mut cb_rule.trigger);

    Ok(cb_rule)
}

fn convert_url_rule(rule: &UrlRule) -> Result<CbRule, ConversionError> {
    let url_filter = translate_url_pattern(rule.pattern_source.url_filter_source())?;

    let mut cb_rule = CbRule {
        trigger: CbTrigger {
            url_filter,
            ..Default::default()
        },
        action: CbAction::Block,
    };

    if rule.is_whitelist {
        cb_rule.action = cb_rule.action.into_exception();
    }
    cb_rule.trigger.resource_type = resource_types(rule.content_type_mask)?;
    cb_rule.trigger.load_type = match rule.is_third_party {
        Some(true) => Some(vec![CbLoadType::ThirdParty]),
        Some(false) => Some(vec![CbLoadType::FirstParty]),
        None => None,
    };
    if rule.match_case {
        cb_rule.trigger.url_filter_is_case_sensitive = Some(true);
    }
    DomainRestriction::resolve(&rule.included_domains, &rule.excluded_domains)?
        .write_to(&mut cb_rule.trigger);

    apply_whitelist_exceptions(rule, &mut cb_rule)?;

    Ok(cb_rule)
}

/// Include and exclude domain lists of a rule, lower-cased and punycoded.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DomainRestriction {
    pub included: Vec<String>,
    pub excluded: Vec<String>,
}

impl DomainRestriction {
    /// Content blockers can express either `if-domain` or `unless-domain` on a rule, never both.
    pub fn resolve(included: &[String], excluded: &[String]) -> Result<Self, ConversionError> {
        let included = utils::normalize_domains(included).map_err(ConversionError::InvalidDomain)?;
        let excluded = utils::normalize_domains(excluded).map_err(ConversionError::InvalidDomain)?;

        if !included.is_empty() && !excluded.is_empty() {
            return Err(ConversionError::ConflictingDomainRestriction);
        }

        Ok(Self { included, excluded })
    }

    pub fn write_to(self, trigger: &mut CbTrigger) {
        if !self.included.is_empty() {
            trigger.if_domain = Some(self.included);
        }
        if !self.excluded.is_empty() {
            trigger.unless_domain = Some(self.excluded);
        }
    }
}

/// Maps a content type mask to content blocker resource types. `None` means the field should be
/// left out, which content blockers treat as matching everything.
///
/// The order of the checks below determines the order of the output tokens.
pub fn resource_types(
    mask: ContentType,
) -> Result<Option<Vec<CbResourceType>>, ConversionError> {
    if mask == ContentType::ALL {
        // Content blockers don't distinguish most of the other default types (subdocument etc.),
        // so their own default is the closest match.
        return Ok(None);
    }

    let mut types = vec![];
    if mask.contains(ContentType::IMAGE) {
        types.push(CbResourceType::Image);
    }
    if mask.contains(ContentType::STYLESHEET) {
        types.push(CbResourceType::StyleSheet);
    }
    if mask.contains(ContentType::SCRIPT) {
        types.push(CbResourceType::Script);
    }
    if mask.contains(ContentType::MEDIA) {
        types.push(CbResourceType::Media);
    }
    if mask.contains(ContentType::POPUP) {
        types.push(CbResourceType::Popup);
    }
    if mask.intersects(ContentType::XMLHTTPREQUEST | ContentType::OTHER | ContentType::WEBSOCKET) {
        types.push(CbResourceType::Raw);
    }
    if mask.contains(ContentType::FONT) {
        types.push(CbResourceType::Font);
    }
    // Frames are documents as far as content blockers are concerned
    if mask == ContentType::SUBDOCUMENT {
        types.push(CbResourceType::Document);
    }

    if mask == ContentType::OBJECT {
        return Err(ConversionError::UnsupportedContentType("object"));
    }
    if mask == ContentType::OBJECT_SUBREQUEST {
        return Err(ConversionError::UnsupportedContentType("object-subrequest"));
    }
    if mask == ContentType::JSINJECT | ContentType::ALL {
        return Err(ConversionError::UnsupportedContentType("jsinject"));
    }

    if types.is_empty() {
        Ok(None)
    } else {
        Ok(Some(types))
    }
}

/// Rewrites a URL pattern into the content blocker regex dialect, which supports neither
/// bounded repetition nor alternation.
pub fn translate_url_pattern(source: &str) -> Result<String, ConversionError> {
    // `{n}`, `{n,}`, `{n,m}` and `{,m}`, including their escaped forms
    static BOUNDED_REPETITION_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\{(\d+,?\d*|,\d+)\\?\}").unwrap());

    // The end-of-URL alternative of separators is redundant for content blockers
    let url_filter = source.replace("|$", "");

    if BOUNDED_REPETITION_RE.is_match(&url_filter) {
        return Err(ConversionError::UnsupportedRegexConstruct("'{digit}'"));
    }
    if has_unescaped_bar(&url_filter) {
        return Err(ConversionError::UnsupportedRegexConstruct("'|'"));
    }

    Ok(url_filter)
}

fn has_unescaped_bar(pattern: &str) -> bool {
    let mut escaped = false;
    for c in pattern.chars() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '|' {
            return true;
        }
    }
    false
}

/// Domain and path recovered from the text of an exception rule.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct RuleDomain {
    pub domain: Option<String>,
    pub path: Option<String>,
}

/// Best-effort split of exception rule text like `||example.com^` or
/// `$document,domain=example.com` into the domain it applies to and the rest of the pattern.
/// Only used for `$document` and `$urlblock` exceptions.
pub(crate) fn parse_rule_domain(rule_text: &str) -> RuleDomain {
    let mut text = rule_text;
    let mut start_index = RULE_DOMAIN_PREFIXES
        .iter()
        .find(|prefix| rule_text.starts_with(*prefix))
        .map_or(0, |prefix| prefix.len());

    match rule_text.find(DOMAIN_OPTION) {
        Some(domain_index) if rule_text.contains('$') => {
            start_index = domain_index + DOMAIN_OPTION.len();
            // The option value ends where the next option starts
            if let Some(comma) = rule_text[start_index..].find(',') {
                text = &rule_text[..start_index + comma];
            }
        }
        _ => {
            if let Some(options_index) = rule_text.rfind('$') {
                if options_index >= start_index {
                    text = &rule_text[..options_index];
                }
            }
        }
    }

    let (domain, path) = match text[start_index..].find(|c: char| c == '/' || c == '^') {
        Some(symbol_index) => (
            &text[start_index..start_index + symbol_index],
            Some(String::from(&text[start_index + symbol_index..])),
        ),
        None => (&text[start_index..], None),
    };

    let domain = utils::normalize_domain(domain)
        .ok()
        .filter(|domain| utils::is_valid_hostname(domain));

    RuleDomain { domain, path }
}

/// Exceptions for whole documents can only be expressed by pinning them to the exact domain the
/// rule was written for.
fn apply_whitelist_exceptions(rule: &UrlRule, cb_rule: &mut CbRule) -> Result<(), ConversionError> {
    if !rule.is_whitelist {
        return Ok(());
    }

    let mask = rule.content_type_mask;
    let is_document_rule = mask == ContentType::DOCUMENT | ContentType::ALL;
    let is_url_block_rule = mask == ContentType::URLBLOCK | ContentType::ALL;

    if is_document_rule || is_url_block_rule {
        let rule_domain = parse_rule_domain(rule.url_rule_text());

        if let Some(path) = rule_domain.path {
            if !path.is_empty() && path != "^" && path != "/" {
                return Err(ConversionError::WhitelistWithPath(path));
            }
        }

        let domain = rule_domain
            .domain
            .ok_or(ConversionError::UnparseableWhitelistDomain)?;
        if cb_rule.trigger.unless_domain.is_some() {
            return Err(ConversionError::ConflictingDomainRestriction);
        }

        cb_rule.trigger.if_domain = Some(vec![domain]);
        cb_rule.trigger.url_filter = String::from(URL_FILTER_ANY_URL);
        cb_rule.trigger.resource_type = None;
    } else if mask.contains(ContentType::ELEMHIDE) {
        cb_rule.trigger.resource_type = Some(vec![CbResourceType::Document]);
    }

    Ok(())
}

#[cfg(test)]
#[path = "../tests/unit/content_blocking.rs"]
mod unit_tests;
