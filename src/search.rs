//! Retrieval commands: `srag query`, `srag context`, `srag ask`.
//!
//! Each opens the store from config, runs one retrieval, and prints the
//! result to stdout.

use anyhow::{bail, Result};
use serde_json::Value;

use crate::answer::{answer_question, create_chat_model};
use crate::config::Config;
use crate::context::format_context;
use crate::models::{keys, MetadataFilter};
use crate::store::VectorStore;

/// Parse a `key=value` filter argument.
///
/// The value is read as JSON when it parses (`year=2020` is an integer,
/// `flag=true` a boolean) and as a plain string otherwise.
pub fn parse_filter_pair(s: &str) -> Result<(String, Value), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    let key = s[..pos].trim();
    if key.is_empty() {
        return Err(format!("invalid KEY=VALUE: empty key in '{}'", s));
    }
    let raw = &s[pos + 1..];
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

/// Combine `--year` and `--filter` arguments into one filter.
pub fn build_filter(year: Option<i64>, pairs: Vec<(String, Value)>) -> Option<MetadataFilter> {
    let mut filter = MetadataFilter::new();
    for (key, value) in pairs {
        filter = filter.equals(key, value);
    }
    if let Some(year) = year {
        filter = filter.equals(keys::YEAR, year);
    }
    (!filter.is_empty()).then_some(filter)
}

fn resolve_top_k(config: &Config, top_k: Option<usize>) -> Result<usize> {
    let k = top_k.unwrap_or(config.retrieval.top_k);
    if k == 0 {
        bail!("--top-k must be >= 1");
    }
    Ok(k)
}

/// `srag query`: print the top-k chunks with scores.
pub async fn run_query(
    config: &Config,
    text: &str,
    top_k: Option<usize>,
    year: Option<i64>,
    filters: Vec<(String, Value)>,
) -> Result<()> {
    if text.trim().is_empty() {
        bail!("query must not be empty");
    }
    let top_k = resolve_top_k(config, top_k)?;
    let filter = build_filter(year, filters);

    let store = VectorStore::open_configured(config).await?;
    let results = store.search(text, top_k, filter.as_ref()).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        let chunk = &result.chunk;
        let name = chunk.file_name().or_else(|| chunk.source()).unwrap_or("unknown");
        let year = chunk
            .year()
            .map(|y| y.to_string())
            .unwrap_or_else(|| "-".to_string());

        println!("{}. [{:.4}] {} ({})", i + 1, result.score, name, year);
        if let Some(idx) = chunk.chunk_index() {
            println!("    chunk: {}", idx);
        }
        println!(
            "    excerpt: \"{}\"",
            excerpt(&chunk.content, 240).replace('\n', " ").trim()
        );
        println!();
    }

    Ok(())
}

/// `srag context`: print the formatted LLM context block.
pub async fn run_context(
    config: &Config,
    text: &str,
    top_k: Option<usize>,
    year: Option<i64>,
) -> Result<()> {
    let top_k = resolve_top_k(config, top_k)?;
    let filter = build_filter(year, Vec::new());

    let store = VectorStore::open_configured(config).await?;
    let chunks = store.query(text, top_k, filter.as_ref()).await?;
    println!("{}", format_context(&chunks));
    Ok(())
}

/// `srag ask`: answer a question with the configured chat model.
pub async fn run_ask(
    config: &Config,
    question: &str,
    top_k: Option<usize>,
    year: Option<i64>,
) -> Result<()> {
    if question.trim().is_empty() {
        bail!("question must not be empty");
    }
    let top_k = resolve_top_k(config, top_k)?;
    let filter = build_filter(year, Vec::new());
    let chat = create_chat_model(&config.llm)?;
    let store = VectorStore::open_configured(config).await?;

    let answer =
        answer_question(&store, chat.as_ref(), question, top_k, filter.as_ref()).await?;

    println!("{}", answer.answer.trim());
    if !answer.sources.is_empty() {
        println!();
        println!("Sources:");
        for (i, chunk) in answer.sources.iter().enumerate() {
            let name = chunk.file_name().or_else(|| chunk.source()).unwrap_or("unknown");
            match chunk.year() {
                Some(year) => println!("  [{}] {} ({})", i + 1, name, year),
                None => println!("  [{}] {}", i + 1, name),
            }
        }
    }
    Ok(())
}

/// First `max_chars` bytes of `text`, cut on a char boundary.
fn excerpt(text: &str, max_chars: usize) -> &str {
    if text.len() <= max_chars {
        return text;
    }
    let mut end = max_chars;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
