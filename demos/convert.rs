//! Converts a filter list file into a content blocker rule list.
//!
//! `cargo run --example convert -- easylist.txt [limit]`, with `RUST_LOG=ab2cb=debug` to see
//! why individual rules were dropped.

use ab2cb::{ContentBlockerConverter, ConvertOptions, SAFARI_RULE_LIMIT};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ab2cb=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let path = args.next().expect("usage: convert <filter list> [limit]");
    let limit = args
        .next()
        .map(|limit| limit.parse().expect("limit must be an integer"))
        .unwrap_or(SAFARI_RULE_LIMIT as i64);

    let list = std::fs::read_to_string(&path).expect("could not read filter list");
    let converter = ContentBlockerConverter::new(ConvertOptions::with_limit(limit));
    let result = converter
        .convert_array(list.lines())
        .expect("conversion failed");

    eprintln!(
        "Converted {} rules ({} errors, over limit: {})",
        result.converted_count, result.errors_count, result.over_limit
    );
    println!("{}", result.converted);
}
