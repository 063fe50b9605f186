//! Simple CLI that reads HTML from stdin, runs one query, and prints JSON.
//!
//! Usage: `query_stdin <css|css-all|attr|xpath> <expression> [attribute] [--outer]`
//!
//! Logs go to stderr (`RUST_LOG=dom_facade=debug`); stdout carries only the
//! JSON result.

use dom_facade::{DocumentQuery, XPathNode};
use serde::Serialize;
use std::io::{self, Read};
use std::panic;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Serialize)]
#[serde(untagged)]
enum Item {
    Text(String),
    Node(XPathNode),
}

#[derive(Serialize)]
struct Output {
    ok: bool,
    results: Vec<Item>,
    error: Option<String>,
}

const USAGE: &str = "usage: query_stdin <css|css-all|attr|xpath> <expression> [attribute] [--outer]";

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    // Engine panics come back as `ParseError`; log them instead of letting
    // the default hook print to stderr.
    panic::set_hook(Box::new(|info| tracing::debug!(%info, "engine panic caught")));

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let outer = if let Some(index) = args.iter().position(|a| a == "--outer") {
        args.remove(index);
        true
    } else {
        false
    };
    let (Some(mode), Some(expression)) = (args.first(), args.get(1)) else {
        eprintln!("{USAGE}");
        return ExitCode::from(2);
    };

    // Read HTML from stdin
    let mut bytes = Vec::new();
    if io::stdin().read_to_end(&mut bytes).is_err() {
        eprintln!("Failed to read from stdin");
        return ExitCode::FAILURE;
    }
    let html = DocumentQuery::decode(&bytes);
    let query = DocumentQuery::new();

    let result = match mode.as_str() {
        "css" => query
            .select_first(&html, expression, outer)
            .map(|text| vec![Item::Text(text)]),
        "css-all" => query
            .select_all(&html, expression, outer)
            .map(|texts| texts.into_iter().map(Item::Text).collect()),
        "attr" => {
            let Some(attribute) = args.get(2) else {
                eprintln!("{USAGE}");
                return ExitCode::from(2);
            };
            query
                .select_attribute(&html, expression, attribute)
                .map(|value| vec![Item::Text(value)])
        }
        "xpath" => query
            .evaluate_xpath(&html, expression)
            .map(|nodes| nodes.into_iter().map(Item::Node).collect()),
        other => {
            eprintln!("unknown mode `{other}`\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    let (output, code) = match result {
        Ok(results) => (
            Output {
                ok: true,
                results,
                error: None,
            },
            ExitCode::SUCCESS,
        ),
        Err(err) => (
            Output {
                ok: false,
                results: Vec::new(),
                error: Some(err.to_string()),
            },
            ExitCode::FAILURE,
        ),
    };

    println!("{}", serde_json::to_string(&output).unwrap_or_default());
    code
}
