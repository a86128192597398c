#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn comment_detection() {
        assert!(is_comment(""));
        assert!(is_comment("   "));
        assert!(is_comment("! Title: EasyList"));
        assert!(is_comment(" ##.banner"));
        assert!(is_comment("Lines with - dashes"));
        assert!(is_comment("[Adblock Plus 2.0]"));

        assert!(!is_comment("##.banner"));
        assert!(!is_comment("||example.com^$domain=a-b.com"));
    }

    #[test]
    fn adguard_cosmetic_detection() {
        assert_eq!(detect_filter_type("example.com##.ad"), FilterType::Cosmetic);
        assert_eq!(detect_filter_type("example.com#@#.ad"), FilterType::Cosmetic);
        assert_eq!(detect_filter_type("example.com#$#body { color: red }"), FilterType::Cosmetic);
        assert_eq!(detect_filter_type("example.com#@$#body { color: red }"), FilterType::Cosmetic);
        assert_eq!(detect_filter_type("example.com#%#window.x = 1;"), FilterType::Script);
        assert_eq!(detect_filter_type("example.com#@%#window.x = 1;"), FilterType::Script);
        assert_eq!(detect_filter_type("example.com##+js(nobab)"), FilterType::Script);
        assert_eq!(
            detect_filter_type("example.com##script:inject(nobab.js)"),
            FilterType::Script
        );
        assert_eq!(
            detect_filter_type("example.com#?#div:has(.ad)"),
            FilterType::Unsupported("extended CSS")
        );
        assert_eq!(
            detect_filter_type("example.com#@$?#div { color: red }"),
            FilterType::Unsupported("extended CSS")
        );
        assert_eq!(
            detect_filter_type("example.com$$script[tag-content=\"ad\"]"),
            FilterType::Unsupported("HTML filtering")
        );
    }

    #[test]
    fn network_detection() {
        assert_eq!(detect_filter_type("||example.com^"), FilterType::Network);
        assert_eq!(detect_filter_type("@@||example.com^$document"), FilterType::Network);
        assert_eq!(detect_filter_type("/ads/banner.gif"), FilterType::Network);
        assert_eq!(detect_filter_type("||example.com/#ads"), FilterType::Network);
        assert_eq!(detect_filter_type("example.com/page#top"), FilterType::Network);
    }

    #[test]
    fn parse_filter_opening_comment() {
        assert_eq!(detect_filter_type("! comment"), FilterType::NotSupported);
        assert_eq!(detect_filter_type("# comment"), FilterType::NotSupported);
        assert_eq!(detect_filter_type("[Adblock Plus 2.0]"), FilterType::NotSupported);
        assert_eq!(
            parse_filter("! comment"),
            Err(FilterParseError::FilterParseError)
        );
        assert_eq!(parse_filter("   "), Err(FilterParseError::FilterParseError));
    }

    #[test]
    fn parse_filter_variants() {
        assert!(matches!(
            parse_filter("example.com##.ad"),
            Ok(FilterRule::Cosmetic(_))
        ));
        assert!(matches!(
            parse_filter("  ||example.com^  "),
            Ok(FilterRule::Url(_))
        ));
        assert_eq!(
            parse_filter("example.com#%#window.x = 1;"),
            Ok(FilterRule::Script(ScriptRule {
                raw_text: String::from("example.com#%#window.x = 1;")
            }))
        );
        assert_eq!(
            parse_filter("example.com#?#div:has(.ad)"),
            Err(FilterParseError::Unsupported("extended CSS"))
        );
    }

    #[test]
    fn raw_line_is_kept() {
        for line in [
            "example.com##.ad",
            "@@||example.com^$document",
            "example.com#%#window.x = 1;",
        ] {
            assert_eq!(parse_filter(line).unwrap().raw_line(), line);
        }
    }

    #[test]
    fn default_parser() {
        let parser = FilterParser::default();
        assert_eq!(parser.parse("##.ad"), parse_filter("##.ad"));
    }

    #[test]
    fn rule_sources() {
        assert_eq!(
            RuleSource::from("##.ad"),
            RuleSource::Text(String::from("##.ad"))
        );
        assert_eq!(
            RuleSource::from(String::from("##.ad")),
            RuleSource::Text(String::from("##.ad"))
        );
        let rule = parse_filter("##.ad").unwrap();
        assert_eq!(RuleSource::from(rule.clone()), RuleSource::Parsed(rule));
    }
}
