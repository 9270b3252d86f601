//! Query-time pipeline: search → rank → assemble → (optionally) generate.

use anyhow::Result;
use std::path::Path;

use crate::config::Config;
use crate::context::{assemble_context, rank_hits, ContextOptions};
use crate::db;
use crate::generate::{answer, create_generator, Answer, DEFAULT_SYSTEM_PROMPT};
use crate::models::ContextBundle;
use crate::search::{search_with_retry, SearchIndex, SqliteIndex};

/// Search `index` for `query` and pack the ranked hits into a context.
pub async fn build_context(
    index: &dyn SearchIndex,
    query: &str,
    limit: usize,
    options: &ContextOptions,
) -> Result<ContextBundle> {
    let mut hits = search_with_retry(index, query, limit).await?;
    rank_hits(&mut hits);
    Ok(assemble_context(&hits, options))
}

async fn context_for(config: &Config, query: &str) -> Result<ContextBundle> {
    let index = SqliteIndex::new(db::connect(config).await?);
    let bundle = build_context(
        &index,
        query,
        config.retrieval.result_limit.max(1) as usize,
        &config.retrieval.context_options(),
    )
    .await;
    index.pool().close().await;
    bundle
}

fn print_sources(bundle: &ContextBundle) {
    println!("Sources:");
    if bundle.sources.is_empty() {
        println!("  (none)");
    }
    for source in &bundle.sources {
        println!("- {}", source);
    }
}

/// CLI entry point for `srag context`.
pub async fn run_context(config: &Config, query: &str) -> Result<()> {
    let bundle = context_for(config, query).await?;
    print_sources(&bundle);
    if bundle.truncated {
        println!("(last source truncated)");
    }
    println!();
    println!("{}", bundle.context);
    Ok(())
}

/// Full retrieval-augmented answer for `query`.
pub async fn ask(config: &Config, query: &str) -> Result<(ContextBundle, Answer)> {
    let bundle = context_for(config, query).await?;
    let generator = create_generator(&config.generation)?;
    let system_prompt = config
        .generation
        .system_prompt
        .as_deref()
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);
    let answer = answer(generator.as_ref(), system_prompt, query, &bundle).await;
    Ok((bundle, answer))
}

/// CLI entry point for `srag ask`.
pub async fn run_ask(config: &Config, query: &str, output: Option<&Path>) -> Result<()> {
    let (bundle, answer) = ask(config, query).await?;

    print_sources(&bundle);
    println!();
    println!("{}", answer.text);

    if let Some(path) = output {
        let mut text = String::from("Sources:\n");
        for source in &bundle.sources {
            text.push_str(&format!("- {}\n", source));
        }
        text.push('\n');
        text.push_str(&answer.text);
        text.push('\n');
        std::fs::write(path, text)?;
        println!();
        println!("Saved to {}", path.display());
    }
    Ok(())
}
