//! Batch conversion of filter lists into a complete content blocker rule set.
//!
//! Individual rules are translated by [`crate::content_blocking`]; this module sorts the results
//! into groups, folds cosmetic exceptions into the hiding rules they cancel, packs generic hiding
//! rules together and enforces the rule count limit of the target engine.

use indexmap::IndexMap;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::content_blocking::{
    self, CbAction, CbResourceType, CbRule, CbTrigger, ConversionError, URL_FILTER_ANY_URL,
};
use crate::filters::FilterRule;
use crate::lists::{self, FilterParser, RuleParser, RuleSource};

/// Maximum number of rules Safari accepts in a single content blocker.
pub const SAFARI_RULE_LIMIT: usize = 50_000;

/// Maximum number of selectors packed into a single generic hiding rule.
pub const MAX_SELECTORS_PER_WIDE_RULE: usize = 250;

pub const CONVERTER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Options for a batch conversion.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct ConvertOptions {
    /// Maximum number of rules in the output. `None` or a non-positive value means unlimited.
    pub limit: Option<i64>,
}

impl ConvertOptions {
    pub fn with_limit(limit: i64) -> Self {
        Self { limit: Some(limit) }
    }

    fn effective_limit(&self) -> Option<usize> {
        self.limit
            .filter(|limit| *limit > 0)
            .and_then(|limit| usize::try_from(limit).ok())
    }
}

/// A rule that could not be converted, along with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionDiagnostic {
    /// Text of the offending rule. Only absent for diagnostics about the batch as a whole.
    pub rule: Option<String>,
    pub cause: ConversionError,
}

impl ConversionDiagnostic {
    fn for_rule(rule: &str, cause: ConversionError) -> Self {
        Self {
            rule: Some(String::from(rule)),
            cause,
        }
    }
}

impl Serialize for ConversionDiagnostic {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("ConversionDiagnostic", 2)?;
        state.serialize_field("rule", &self.rule)?;
        state.serialize_field("cause", &self.cause.to_string())?;
        state.end()
    }
}

/// Outcome of a batch conversion.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    pub converted_count: usize,
    pub errors_count: usize,
    pub over_limit: bool,
    /// The content blocker rules as a tab-indented JSON array.
    pub converted: String,
    pub errors: Vec<ConversionDiagnostic>,
}

/// Failures that abort a whole conversion. Problems with individual rules are reported through
/// [`ConversionResult::errors`] instead.
#[derive(Debug, Error)]
pub enum ConverterError {
    #[error("no rules to convert")]
    EmptyInput,
    #[error("internal invariant violated: {0}")]
    InternalInvariant(&'static str),
    #[error("failed to serialize content blocker rules: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Converts filter rules into content blocker rules, parsing raw lines with `P`.
#[derive(Debug, Clone, Default)]
pub struct ContentBlockerConverter<P: RuleParser = FilterParser> {
    parser: P,
    options: ConvertOptions,
}

impl ContentBlockerConverter<FilterParser> {
    pub fn new(options: ConvertOptions) -> Self {
        Self::with_parser(FilterParser, options)
    }
}

impl<P: RuleParser> ContentBlockerConverter<P> {
    pub fn with_parser(parser: P, options: ConvertOptions) -> Self {
        Self { parser, options }
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Converts a single line of filter list text. Comments and blank lines give `Ok(None)`.
    pub fn convert_line(&self, line: &str) -> Result<Option<CbRule>, ConversionError> {
        if lists::is_comment(line) {
            return Ok(None);
        }
        let rule = self.parser.parse(line.trim())?;
        self.convert_rule(&rule).map(Some)
    }

    /// Converts a single parsed rule.
    pub fn convert_rule(&self, rule: &FilterRule) -> Result<CbRule, ConversionError> {
        content_blocking::convert_rule(rule)
    }

    /// Converts a whole filter list. Rules that can't be converted are left out of the output and
    /// reported in [`ConversionResult::errors`].
    pub fn convert_array<I, R>(&self, rules: I) -> Result<ConversionResult, ConverterError>
    where
        I: IntoIterator<Item = R>,
        R: Into<RuleSource>,
    {
        let rules: Vec<RuleSource> = rules.into_iter().map(Into::into).collect();
        if rules.is_empty() {
            return Err(ConverterError::EmptyInput);
        }

        info!(version = CONVERTER_VERSION, "Converting {} rules", rules.len());

        let mut bucket = ConversionBucket::default();
        for source in &rules {
            let (raw_line, converted) = match source {
                RuleSource::Text(line) => (line.as_str(), self.convert_line(line)),
                RuleSource::Parsed(rule) => (rule.raw_line(), self.convert_rule(rule).map(Some)),
            };
            match converted {
                Ok(Some(cb_rule)) => bucket.classify(cb_rule, raw_line),
                Ok(None) => {}
                Err(cause) => bucket.reject(raw_line, cause),
            }
        }

        let content_blocker = bucket.into_content_blocker()?;
        content_blocker.into_result(self.options.effective_limit())
    }
}

/// Converts `rules` with the default parser, keeping at most `limit` rules when it is positive.
pub fn convert_array<I, R>(rules: I, limit: Option<i64>) -> Result<ConversionResult, ConverterError>
where
    I: IntoIterator<Item = R>,
    R: Into<RuleSource>,
{
    ContentBlockerConverter::new(ConvertOptions { limit }).convert_array(rules)
}

/// A cosmetic hiding rule, along with the text it was converted from.
#[derive(Debug, Clone)]
struct SourcedRule {
    rule: CbRule,
    raw_line: String,
}

/// Converted rules sorted by the role they play in the final rule set.
#[derive(Debug, Default)]
struct ConversionBucket {
    css_blocking: Vec<SourcedRule>,
    css_exceptions: Vec<CbRule>,
    css_elemhide: Vec<CbRule>,
    url_blocking: Vec<CbRule>,
    other: Vec<CbRule>,
    errors: Vec<ConversionDiagnostic>,
}

impl ConversionBucket {
    fn classify(&mut self, rule: CbRule, raw_line: &str) {
        let is_document_exception = matches!(
            rule.trigger.resource_type.as_deref(),
            Some([CbResourceType::Document, ..])
        );

        match rule.action {
            CbAction::Block => self.url_blocking.push(rule),
            CbAction::CssDisplayNone { .. } => self.css_blocking.push(SourcedRule {
                rule,
                raw_line: String::from(raw_line),
            }),
            CbAction::IgnorePreviousRules { .. } if is_document_exception => {
                self.css_elemhide.push(rule)
            }
            CbAction::IgnorePreviousRules { selector: Some(_) } => self.css_exceptions.push(rule),
            CbAction::IgnorePreviousRules { selector: None } => self.other.push(rule),
        }
    }

    fn reject(&mut self, raw_line: &str, cause: ConversionError) {
        debug!("Unable to convert rule `{}`: {}", raw_line, cause);
        self.errors
            .push(ConversionDiagnostic::for_rule(raw_line, cause));
    }

    fn into_content_blocker(self) -> Result<ContentBlocker, ConverterError> {
        let ConversionBucket {
            css_blocking,
            css_exceptions,
            css_elemhide,
            url_blocking,
            other,
            mut errors,
        } = self;

        let css_blocking = apply_css_exceptions(css_blocking, &css_exceptions, &mut errors);
        let compacted = compact_css_rules(css_blocking, MAX_SELECTORS_PER_WIDE_RULE)?;

        info!(
            "Rules converted: css wide {}, css domain sensitive {}, elemhide exceptions {}, url blocking {}, other {}, errors {}",
            compacted.wide.len(),
            compacted.domain_sensitive.len(),
            css_elemhide.len(),
            url_blocking.len(),
            other.len(),
            errors.len()
        );

        Ok(ContentBlocker {
            css_blocking_wide: compacted.wide,
            css_blocking_domain_sensitive: compacted.domain_sensitive,
            css_elemhide,
            url_blocking,
            other,
            errors,
        })
    }
}

/// The final groups of a rule set, in output order.
#[derive(Debug)]
struct ContentBlocker {
    css_blocking_wide: Vec<CbRule>,
    css_blocking_domain_sensitive: Vec<CbRule>,
    css_elemhide: Vec<CbRule>,
    url_blocking: Vec<CbRule>,
    other: Vec<CbRule>,
    errors: Vec<ConversionDiagnostic>,
}

impl ContentBlocker {
    fn into_result(self, limit: Option<usize>) -> Result<ConversionResult, ConverterError> {
        let ContentBlocker {
            css_blocking_wide,
            css_blocking_domain_sensitive,
            css_elemhide,
            url_blocking,
            other,
            mut errors,
        } = self;

        let mut converted: Vec<CbRule> = css_blocking_wide
            .into_iter()
            .chain(css_blocking_domain_sensitive)
            .chain(css_elemhide)
            .chain(url_blocking)
            .chain(other)
            .collect();

        apply_domain_wildcards(&mut converted);

        let mut over_limit = false;
        if let Some(limit) = limit {
            if converted.len() > limit {
                error!(
                    "{} limit is achieved, {} rules will be ignored",
                    limit,
                    converted.len() - limit
                );
                errors.push(ConversionDiagnostic {
                    rule: None,
                    cause: ConversionError::OverLimit(limit),
                });
                over_limit = true;
                converted.truncate(limit);
            }
        }

        Ok(ConversionResult {
            converted_count: converted.len(),
            errors_count: errors.len(),
            over_limit,
            converted: to_tab_indented_json(&converted)?,
            errors,
        })
    }
}

/// Folds `#@#` exceptions into the hiding rules with the same selector, by excluding the
/// exception's domains from them.
///
/// A hiding rule that is already restricted to some domains only takes an exception domain that
/// contains one of them as a substring, so `example.com#@#.ad` reaches `ample.com##.ad` too.
/// Rules that end up with both included and excluded domains can't be expressed and are dropped.
fn apply_css_exceptions(
    css_blocking: Vec<SourcedRule>,
    css_exceptions: &[CbRule],
    errors: &mut Vec<ConversionDiagnostic>,
) -> Vec<CbRule> {
    info!("Applying {} css exceptions", css_exceptions.len());

    let mut exceptions_by_selector: IndexMap<&str, Vec<&CbTrigger>> = IndexMap::new();
    for exception in css_exceptions {
        if let Some(selector) = exception.action.selector() {
            exceptions_by_selector
                .entry(selector)
                .or_default()
                .push(&exception.trigger);
        }
    }

    let mut applied_count = 0;
    let mut errors_count = 0;
    let mut result = Vec::with_capacity(css_blocking.len());

    for SourcedRule { mut rule, raw_line } in css_blocking {
        let exceptions = rule
            .action
            .selector()
            .and_then(|selector| exceptions_by_selector.get(selector));
        if let Some(exceptions) = exceptions {
            for exception in exceptions {
                for domain in exception.if_domain.iter().flatten() {
                    push_exception_domain(domain, &mut rule.trigger);
                }
                applied_count += 1;
            }
        }

        if rule.trigger.has_conflicting_domains() {
            debug!("Css exceptions leave `{}` with both permitted and restricted domains", raw_line);
            errors_count += 1;
            errors.push(ConversionDiagnostic::for_rule(
                &raw_line,
                ConversionError::ExceptionDomainConflict,
            ));
        } else {
            result.push(rule);
        }
    }

    info!("Css exceptions applied: {}", applied_count);
    info!("Css exceptions errors: {}", errors_count);
    result
}

fn push_exception_domain(domain: &str, trigger: &mut CbTrigger) {
    if let Some(permitted_domains) = trigger.if_domain.as_ref().filter(|d| !d.is_empty()) {
        let applicable = permitted_domains
            .iter()
            .any(|permitted| domain.contains(permitted.as_str()));
        if !applicable {
            return;
        }
    }

    let restricted_domains = trigger.unless_domain.get_or_insert_with(Vec::new);
    if !restricted_domains.iter().any(|restricted| restricted == domain) {
        restricted_domains.push(String::from(domain));
    }
}

/// Cosmetic hiding rules split by whether they are restricted to some domains.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CompactedCssRules {
    /// Domain-unrestricted rules, with up to the selector cap packed into each.
    pub wide: Vec<CbRule>,
    pub domain_sensitive: Vec<CbRule>,
}

/// Packs the selectors of domain-unrestricted `css-display-none` rules into as few rules as
/// possible, at most `max_selectors` per rule, keeping the input order.
pub fn compact_css_rules(
    css_blocking: Vec<CbRule>,
    max_selectors: usize,
) -> Result<CompactedCssRules, ConverterError> {
    info!("Trying to compact {} elemhide rules", css_blocking.len());

    let max_selectors = max_selectors.max(1);
    let mut compacted = CompactedCssRules::default();
    let mut wide_selectors: Vec<String> = Vec::with_capacity(max_selectors);

    fn flush(wide_selectors: &mut Vec<String>, wide: &mut Vec<CbRule>) {
        if wide_selectors.is_empty() {
            return;
        }
        wide.push(CbRule {
            trigger: CbTrigger {
                url_filter: String::from(URL_FILTER_ANY_URL),
                ..Default::default()
            },
            action: CbAction::CssDisplayNone {
                selector: wide_selectors.join(", "),
            },
        });
        wide_selectors.clear();
    }

    for rule in css_blocking {
        if rule.trigger.has_domain_restriction() {
            compacted.domain_sensitive.push(rule);
            continue;
        }

        match rule.action {
            CbAction::CssDisplayNone { selector } => wide_selectors.push(selector),
            _ => {
                return Err(ConverterError::InternalInvariant(
                    "only css-display-none rules can be compacted",
                ))
            }
        }
        if wide_selectors.len() >= max_selectors {
            flush(&mut wide_selectors, &mut compacted.wide);
        }
    }
    flush(&mut wide_selectors, &mut compacted.wide);

    info!(
        "Compacted result: wide={} domainSensitive={}",
        compacted.wide.len(),
        compacted.domain_sensitive.len()
    );
    Ok(compacted)
}

/// Content blockers match `if-domain`/`unless-domain` entries exactly, unless prefixed with `*`.
fn apply_domain_wildcards(rules: &mut [CbRule]) {
    fn add_wildcard(domains: &mut Option<Vec<String>>) {
        for domain in domains.iter_mut().flatten() {
            domain.insert(0, '*');
        }
    }

    for rule in rules {
        add_wildcard(&mut rule.trigger.if_domain);
        add_wildcard(&mut rule.trigger.unless_domain);
    }
}

fn to_tab_indented_json<T: Serialize + ?Sized>(value: &T) -> Result<String, ConverterError> {
    let mut writer = Vec::with_capacity(128);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
    value.serialize(&mut serializer)?;
    String::from_utf8(writer)
        .map_err(|_| ConverterError::InternalInvariant("serialized rules are not valid UTF-8"))
}

#[cfg(test)]
#[path = "../tests/unit/converter.rs"]
mod unit_tests;
