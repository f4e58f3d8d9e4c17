/*
 * Smoke test of a running news service.
 *
 * Steps:
 * 1. Fetch the catalog
 * 2. Summarize the first articles
 * 3. Convert them to audio
 * 4. Open a chat and send one message
 *
 * The service root comes from NEWSFEED_BASE_URL (default http://127.0.0.1:5000).
 */

use anyhow::Result;
use newsfeed::api::http::HttpNewsApi;
use newsfeed::api::{NewsApi, NewsQuery};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let base_url = std::env::var("NEWSFEED_BASE_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:5000".to_string());
    let api = HttpNewsApi::new(&base_url);

    println!("\n{}", "=".repeat(60));
    println!("Probing news service at {}", base_url);
    println!("{}", "=".repeat(60));

    println!("\n[1/4] Fetching catalog...");
    let query = NewsQuery {
        query_news: common::DEFAULT_QUERY_NEWS.to_string(),
        query_edge: common::DEFAULT_QUERY_EDGE.to_string(),
    };
    let ids: Vec<i64> = match api.daily_news(&query).await {
        Ok(articles) => {
            println!("✓ {} articles", articles.len());
            for a in articles.iter().take(3) {
                println!("  #{} {}", a.id, a.title.as_deref().unwrap_or("(untitled)"));
            }
            articles.iter().take(3).map(|a| a.id).collect()
        }
        Err(e) => {
            eprintln!("✗ Failed: {}", e);
            return Ok(());
        }
    };

    if ids.is_empty() {
        println!("No articles to probe further.");
        return Ok(());
    }

    println!("\n[2/4] Summarizing {:?}...", ids);
    match api.summarize(&ids).await {
        Ok(summary) => println!("✓ {}...", summary.chars().take(120).collect::<String>()),
        Err(e) => eprintln!("✗ Failed: {}", e),
    }

    println!("\n[3/4] Converting {:?} to audio...", ids);
    match api.audio(&ids).await {
        Ok(bytes) => println!("✓ {} bytes of audio", bytes.len()),
        Err(e) => eprintln!("✗ Failed: {}", e),
    }

    println!("\n[4/4] Chatting about {:?}...", ids);
    match api.open_chat(&ids).await {
        Ok(chat_id) => {
            println!("✓ session {}", chat_id);
            match api.continue_chat(&chat_id, "What is the main takeaway?").await {
                Ok(reply) => println!("✓ {}...", reply.chars().take(120).collect::<String>()),
                Err(e) => eprintln!("✗ Failed: {}", e),
            }
        }
        Err(e) => eprintln!("✗ Failed: {}", e),
    }

    println!("\n{}", "=".repeat(60));
    println!("Probe completed");
    println!("{}", "=".repeat(60));
    Ok(())
}
