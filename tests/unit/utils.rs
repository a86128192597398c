#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn normalize_domain_works() {
        assert_eq!(normalize_domain("Example.COM").unwrap(), "example.com");
        assert_eq!(normalize_domain(" example.com ").unwrap(), "example.com");
        assert_eq!(
            normalize_domain("Bücher.example").unwrap(),
            "xn--bcher-kva.example"
        );
        assert_eq!(normalize_domain("пример.рф").unwrap(), "xn--e1afmkfd.xn--p1ai");
    }

    #[test]
    fn hostname_validity() {
        assert!(is_valid_hostname("example.com"));
        assert!(is_valid_hostname("sub_domain.example-site.co.uk"));
        assert!(is_valid_hostname("xn--e1afmkfd.xn--p1ai"));
        assert!(!is_valid_hostname(""));
        assert!(!is_valid_hostname("~example.com"));
        assert!(!is_valid_hostname("a.com|b.com"));
        assert!(!is_valid_hostname("example.com/path"));
    }

    #[test]
    fn normalize_domains_keeps_first_occurrence() {
        let domains = vec![
            String::from("b.com"),
            String::from("A.com"),
            String::from(""),
            String::from("a.com"),
            String::from("B.COM"),
        ];
        assert_eq!(
            normalize_domains(&domains).unwrap(),
            vec![String::from("b.com"), String::from("a.com")]
        );
        assert!(normalize_domains(&Vec::<String>::new()).unwrap().is_empty());
    }

    #[test]
    fn invalid_punycode_is_rejected() {
        assert!(normalize_domain("xn--\u{f1}.com").is_err());

        let domains = vec![String::from("example.com"), String::from("xn--\u{f1}.com")];
        assert_eq!(
            normalize_domains(&domains),
            Err(String::from("xn--\u{f1}.com"))
        );
    }

    #[test]
    fn unicode_detection() {
        assert!(!has_unicode("example.com"));
        assert!(has_unicode("пример.рф"));
    }
}
