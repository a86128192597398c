//! Parsed representations of filter rules, as consumed by the content blocking converter.

pub mod cosmetic;
pub mod network;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use self::cosmetic::CosmeticRule;
use self::network::UrlRule;

/// Possible failure reasons when turning a line of filter list text into a [`FilterRule`].
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum FilterParseError {
    #[error("failed to parse filter")]
    FilterParseError,
    #[error("empty selector")]
    EmptySelector,
    #[error("no supported domains")]
    NoSupportedDomains,
    #[error("unrecognised option `{0}`")]
    UnrecognisedOption(String),
    #[error("negated option `{0}`")]
    NegatedOption(String),
    #[error("punycode error")]
    PunycodeError,
    #[error("{0} rules are not supported")]
    Unsupported(&'static str),
}

/// A script injection rule (`#%#`, `##+js(...)`). These can never be expressed declaratively,
/// but are still parsed so that they can be reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptRule {
    pub raw_text: String,
}

/// The closed set of rule kinds understood by the converter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterRule {
    Cosmetic(CosmeticRule),
    Script(ScriptRule),
    Url(UrlRule),
}

impl FilterRule {
    /// The rule text the rule was parsed from, used to identify it in diagnostics.
    pub fn raw_line(&self) -> &str {
        match self {
            FilterRule::Cosmetic(rule) => &rule.raw_line,
            FilterRule::Script(rule) => &rule.raw_text,
            FilterRule::Url(rule) => &rule.original_text,
        }
    }
}

impl From<CosmeticRule> for FilterRule {
    fn from(rule: CosmeticRule) -> Self {
        FilterRule::Cosmetic(rule)
    }
}

impl From<ScriptRule> for FilterRule {
    fn from(rule: ScriptRule) -> Self {
        FilterRule::Script(rule)
    }
}

impl From<UrlRule> for FilterRule {
    fn from(rule: UrlRule) -> Self {
        FilterRule::Url(rule)
    }
}
