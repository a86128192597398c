//! Small helpers shared by the filter parsers and the converter.

use indexmap::IndexSet;

/// Lower-cases `domain` and converts it to its ASCII (punycode) form.
///
/// ASCII input skips the IDNA machinery entirely, which is the overwhelmingly common case for
/// filter lists.
pub fn normalize_domain(domain: &str) -> Result<String, idna::Errors> {
    let lowercase = domain.trim().to_lowercase();
    if lowercase.is_ascii() {
        Ok(lowercase)
    } else {
        idna::domain_to_ascii(&lowercase)
    }
}

/// Returns `true` if every character of `domain` could appear in an ASCII hostname.
pub fn is_valid_hostname(domain: &str) -> bool {
    !domain.is_empty()
        && domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_')
}

/// Normalizes every entry of `domains`, skipping empty ones and dropping duplicates while keeping
/// the first occurrence of each.
pub fn normalize_domains<'a, I>(domains: I) -> Result<Vec<String>, String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut seen = IndexSet::new();
    for domain in domains {
        if domain.trim().is_empty() {
            continue;
        }
        let normalized = normalize_domain(domain).map_err(|_| domain.clone())?;
        seen.insert(normalized);
    }
    Ok(seen.into_iter().collect())
}

#[inline]
pub fn has_unicode(pattern: &str) -> bool {
    !pattern.is_ascii()
}

#[cfg(test)]
#[path = "../tests/unit/utils.rs"]
mod unit_tests;
