//! Parsing functions and collections for handling with multiple filter rules.

use serde::{Deserialize, Serialize};

use crate::filters::cosmetic::CosmeticRule;
use crate::filters::network::UrlRule;
use crate::filters::{FilterParseError, FilterRule, ScriptRule};

#[derive(Debug, PartialEq, Eq)]
pub enum FilterType {
    Network,
    Cosmetic,
    Script,
    /// A rule written in a syntax that has no counterpart in [`FilterRule`].
    Unsupported(&'static str),
    NotSupported,
}

/// Turns one line of filter list text into a [`FilterRule`].
///
/// The converter only depends on this trait, so callers with their own rule model can plug in a
/// different parser.
pub trait RuleParser {
    fn parse(&self, line: &str) -> Result<FilterRule, FilterParseError>;
}

/// Parser for Adblock Plus style filter lists, including the AdGuard and uBlock Origin
/// extensions that can be recognised reliably.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilterParser;

impl RuleParser for FilterParser {
    fn parse(&self, line: &str) -> Result<FilterRule, FilterParseError> {
        parse_filter(line)
    }
}

/// Parse a single filter rule.
pub fn parse_filter(line: &str) -> Result<FilterRule, FilterParseError> {
    let filter = line.trim();
    if filter.is_empty() {
        return Err(FilterParseError::FilterParseError);
    }

    match detect_filter_type(filter) {
        FilterType::Network => UrlRule::parse(filter).map(FilterRule::Url),
        FilterType::Cosmetic => CosmeticRule::parse(filter).map(FilterRule::Cosmetic),
        FilterType::Script => Ok(FilterRule::Script(ScriptRule {
            raw_text: String::from(filter),
        })),
        FilterType::Unsupported(kind) => Err(FilterParseError::Unsupported(kind)),
        FilterType::NotSupported => Err(FilterParseError::FilterParseError),
    }
}

/// Lines that should be skipped silently rather than reported: blank lines, `!` comments, lines
/// starting with a space, and lines containing ` - ` (typically prose or list metadata).
pub fn is_comment(line: &str) -> bool {
    line.trim().is_empty()
        || line.starts_with('!')
        || line.starts_with(' ')
        || line.contains(" - ")
        || line.starts_with("[Adblock")
}

/// Given a single line (string), checks if this would likely be a cosmetic filter, a network
/// filter, a script filter or something that is not supported. This check is performed before
/// calling a more specific parser.
pub fn detect_filter_type(filter: &str) -> FilterType {
    // Ignore comments
    if filter.len() == 1
        || filter.starts_with('!')
        || (filter.starts_with('#') && filter[1..].starts_with(char::is_whitespace))
        || filter.starts_with("[Adblock")
    {
        return FilterType::NotSupported;
    }

    if filter.starts_with('|') || filter.starts_with("@@|") {
        return FilterType::Network;
    }

    // HTML filtering, `$$` `$@$`
    if filter.contains("$$") || filter.contains("$@$") {
        return FilterType::Unsupported("HTML filtering");
    }

    // Check if filter is cosmetics
    if let Some(sharp_index) = filter.find('#') {
        let after_sharp = &filter[sharp_index + 1..];

        if after_sharp.starts_with(/* #%# */ "%#") || after_sharp.starts_with(/* #@%# */ "@%#") {
            return FilterType::Script;
        } else if after_sharp.starts_with(/* #?# */ "?#")
            || after_sharp.starts_with(/* #@?# */ "@?#")
            || after_sharp.starts_with(/* #$?# */ "$?#")
            || after_sharp.starts_with(/* #@$?# */ "@$?#")
        {
            return FilterType::Unsupported("extended CSS");
        } else if after_sharp.starts_with(/* ## */ '#') {
            // Scriptlets, `##+js(...)` `##script:inject(...)`
            if after_sharp[1..].starts_with("+js(") || after_sharp[1..].starts_with("script:inject(")
            {
                return FilterType::Script;
            }
            return FilterType::Cosmetic;
        } else if after_sharp.starts_with(/* #@# */ "@#")
            || after_sharp.starts_with(/* #$# */ "$#")
            || after_sharp.starts_with(/* #@$# */ "@$#")
        {
            return FilterType::Cosmetic;
        }
    }

    // Everything else is a network filter
    FilterType::Network
}

/// One item of converter input: either raw filter list text or an already parsed rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleSource {
    Text(String),
    Parsed(FilterRule),
}

impl From<&str> for RuleSource {
    fn from(line: &str) -> Self {
        RuleSource::Text(String::from(line))
    }
}

impl From<&String> for RuleSource {
    fn from(line: &String) -> Self {
        RuleSource::Text(line.clone())
    }
}

impl From<String> for RuleSource {
    fn from(line: String) -> Self {
        RuleSource::Text(line)
    }
}

impl From<FilterRule> for RuleSource {
    fn from(rule: FilterRule) -> Self {
        RuleSource::Parsed(rule)
    }
}

#[cfg(test)]
#[path = "../tests/unit/lists.rs"]
mod unit_tests;
