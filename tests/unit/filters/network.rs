#[cfg(test)]
mod parse_tests {
    use super::super::*;

    #[derive(Debug, PartialEq)]
    struct UrlRuleBreakdown {
        regex: Option<String>,
        derived: Option<String>,
        raw: String,
        included_domains: Vec<String>,
        excluded_domains: Vec<String>,

        is_whitelist: bool,
        is_third_party: Option<bool>,
        match_case: bool,

        // Options
        from_image: bool,
        from_script: bool,
        from_stylesheet: bool,
        from_subdocument: bool,
        from_document: bool,
        all_request_types: bool,
    }

    impl From<&UrlRule> for UrlRuleBreakdown {
        fn from(rule: &UrlRule) -> UrlRuleBreakdown {
            UrlRuleBreakdown {
                regex: rule.pattern_source.regex.clone(),
                derived: rule.pattern_source.derived.clone(),
                raw: rule.pattern_source.raw.clone(),
                included_domains: rule.included_domains.clone(),
                excluded_domains: rule.excluded_domains.clone(),

                is_whitelist: rule.is_whitelist,
                is_third_party: rule.is_third_party,
                match_case: rule.match_case,

                from_image: rule.content_type_mask.contains(ContentType::IMAGE),
                from_script: rule.content_type_mask.contains(ContentType::SCRIPT),
                from_stylesheet: rule.content_type_mask.contains(ContentType::STYLESHEET),
                from_subdocument: rule.content_type_mask.contains(ContentType::SUBDOCUMENT),
                from_document: rule.content_type_mask.contains(ContentType::DOCUMENT),
                all_request_types: rule.content_type_mask.contains(ContentType::ALL),
            }
        }
    }

    impl Default for UrlRuleBreakdown {
        fn default() -> Self {
            UrlRuleBreakdown {
                regex: None,
                derived: None,
                raw: String::from(""),
                included_domains: vec![],
                excluded_domains: vec![],

                is_whitelist: false,
                is_third_party: None,
                match_case: false,

                from_image: true,
                from_script: true,
                from_stylesheet: true,
                from_subdocument: false,
                from_document: false,
                all_request_types: true,
            }
        }
    }

    fn check_parse_result(rule: &str, expected: UrlRuleBreakdown) {
        let parsed = UrlRule::parse(rule).expect("Rule under test could not be parsed");
        assert_eq!(UrlRuleBreakdown::from(&parsed), expected);
        assert_eq!(parsed.original_text, rule);
    }

    #[test]
    fn hostname_anchor() {
        check_parse_result(
            "||example.com^",
            UrlRuleBreakdown {
                derived: Some(String::from(
                    "^[^:]+:(//)?([^/]+\\.)?example\\.com([^a-zA-Z0-9_.%-]|$)",
                )),
                raw: String::from("||example.com^"),
                ..Default::default()
            },
        );
        check_parse_result(
            "||пример.рф^",
            UrlRuleBreakdown {
                derived: Some(String::from(
                    "^[^:]+:(//)?([^/]+\\.)?xn--e1afmkfd\\.xn--p1ai([^a-zA-Z0-9_.%-]|$)",
                )),
                raw: String::from("||пример.рф^"),
                ..Default::default()
            },
        );
    }

    #[test]
    fn left_and_right_anchors() {
        check_parse_result(
            "|http://example.com|",
            UrlRuleBreakdown {
                derived: Some(String::from("^http://example\\.com$")),
                raw: String::from("|http://example.com|"),
                ..Default::default()
            },
        );
        check_parse_result(
            "|wss://$third-party",
            UrlRuleBreakdown {
                derived: Some(String::from("^wss?://")),
                raw: String::from("|wss://"),
                is_third_party: Some(true),
                ..Default::default()
            },
        );
    }

    #[test]
    fn wildcards_and_case() {
        check_parse_result(
            "*Ad*Banner*",
            UrlRuleBreakdown {
                derived: Some(String::from("ad.*banner")),
                raw: String::from("*Ad*Banner*"),
                ..Default::default()
            },
        );
        check_parse_result(
            "/Ads/Banner.gif$match-case",
            UrlRuleBreakdown {
                derived: Some(String::from("/Ads/Banner\\.gif")),
                raw: String::from("/Ads/Banner.gif"),
                match_case: true,
                ..Default::default()
            },
        );
        check_parse_result(
            "/ad?id=(1)+[2]$image",
            UrlRuleBreakdown {
                derived: Some(String::from("/ad\\?id=\\(1\\)\\+\\[2\\]")),
                raw: String::from("/ad?id=(1)+[2]"),
                from_script: false,
                from_stylesheet: false,
                all_request_types: false,
                ..Default::default()
            },
        );
    }

    #[test]
    fn regex_patterns() {
        check_parse_result(
            "/banner\\d+\\/ad/$script",
            UrlRuleBreakdown {
                regex: Some(String::from("banner\\d+/ad")),
                raw: String::from("/banner\\d+\\/ad/"),
                from_image: false,
                from_stylesheet: false,
                all_request_types: false,
                ..Default::default()
            },
        );
        check_parse_result(
            "/ad$/",
            UrlRuleBreakdown {
                regex: Some(String::from("ad$")),
                raw: String::from("/ad$/"),
                ..Default::default()
            },
        );
    }

    #[test]
    fn options_only() {
        check_parse_result(
            "$~script,domain=a.com|~b.com|/re/",
            UrlRuleBreakdown {
                derived: Some(String::from("^https?://")),
                included_domains: vec![String::from("a.com")],
                excluded_domains: vec![String::from("b.com")],
                from_script: false,
                all_request_types: false,
                ..Default::default()
            },
        );
    }

    #[test]
    fn exceptions() {
        check_parse_result(
            "@@||example.com^$document",
            UrlRuleBreakdown {
                derived: Some(String::from(
                    "^[^:]+:(//)?([^/]+\\.)?example\\.com([^a-zA-Z0-9_.%-]|$)",
                )),
                raw: String::from("||example.com^"),
                is_whitelist: true,
                from_document: true,
                ..Default::default()
            },
        );
        check_parse_result(
            "@@||example.com^$subdocument,1p",
            UrlRuleBreakdown {
                derived: Some(String::from(
                    "^[^:]+:(//)?([^/]+\\.)?example\\.com([^a-zA-Z0-9_.%-]|$)",
                )),
                raw: String::from("||example.com^"),
                is_whitelist: true,
                is_third_party: Some(false),
                from_image: false,
                from_script: false,
                from_stylesheet: false,
                from_subdocument: true,
                all_request_types: false,
                ..Default::default()
            },
        );
    }

    #[test]
    fn content_type_masks() {
        let mask = |rule: &str| UrlRule::parse(rule).unwrap().content_type_mask;

        assert_eq!(mask("||example.com^"), ContentType::ALL);
        assert_eq!(mask("@@||example.com^$document"), ContentType::DOCUMENT | ContentType::ALL);
        assert_eq!(mask("@@||example.com^$urlblock"), ContentType::URLBLOCK | ContentType::ALL);
        assert_eq!(mask("@@||example.com^$jsinject"), ContentType::JSINJECT | ContentType::ALL);
        assert_eq!(
            mask("||example.com^$image,script,~script"),
            ContentType::IMAGE
        );
        assert_eq!(
            mask("||example.com^$~image"),
            ContentType::ALL & !ContentType::IMAGE
        );
    }

    #[test]
    fn invalid_options() {
        assert_eq!(
            UrlRule::parse("||example.com^$unknown"),
            Err(FilterParseError::UnrecognisedOption(String::from("unknown")))
        );
        assert_eq!(
            UrlRule::parse("@@||example.com^$~document"),
            Err(FilterParseError::NegatedOption(String::from("document")))
        );
        assert_eq!(
            UrlRule::parse("||example.com^$~match-case"),
            Err(FilterParseError::NegatedOption(String::from("match-case")))
        );
        assert_eq!(
            UrlRule::parse("||example.com^$domain=/example/"),
            Err(FilterParseError::NoSupportedDomains)
        );
        assert_eq!(
            UrlRule::parse("||example.com^$image,~image"),
            Err(FilterParseError::FilterParseError)
        );
    }

    #[test]
    fn url_rule_text() {
        let rule = UrlRule::parse("@@||example.com^$document").unwrap();
        assert_eq!(rule.url_rule_text(), "||example.com^$document");
        assert_eq!(rule.to_string(), "@@||example.com^$document");
    }
}

#[cfg(test)]
mod pattern_source_tests {
    use super::super::*;

    #[test]
    fn prefers_regex_then_derived() {
        let mut source = PatternSource {
            regex: Some(String::from("ad[0-9]")),
            derived: Some(String::from("ad")),
            raw: String::from("/ad[0-9]/"),
        };
        assert_eq!(source.url_filter_source(), "ad[0-9]");

        source.regex = None;
        assert_eq!(source.url_filter_source(), "ad");

        source.derived = Some(String::from(""));
        assert_eq!(source.url_filter_source(), "/ad[0-9]/");
    }
}
