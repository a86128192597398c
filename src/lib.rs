//! Converts ad blocking filter lists (Adblock Plus / AdGuard syntax) into the declarative
//! trigger/action JSON understood by WebKit content blockers.
//!
//! ```
//! let result = ab2cb::convert_array(["##.banner", "||ads.example.com^"], None).unwrap();
//! assert_eq!(result.converted_count, 2);
//! ```

pub mod content_blocking;
pub mod converter;
pub mod filters;
pub mod lists;
#[doc(hidden)]
pub mod utils;

pub use content_blocking::{CbAction, CbRule, CbTrigger, ConversionError};
pub use converter::{
    convert_array, ContentBlockerConverter, ConversionDiagnostic, ConversionResult,
    ConvertOptions, ConverterError, SAFARI_RULE_LIMIT,
};
pub use filters::FilterRule;
pub use lists::{FilterParser, RuleParser, RuleSource};
