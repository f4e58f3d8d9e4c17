/*
newsfeed - interactive terminal front-end.
Reads one command per line from stdin and applies service results as they arrive.
*/

use anyhow::Result;
use clap::Parser;
use common::Config;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use newsfeed::artifacts::SummarySlot;
use newsfeed::chat::render::RenderTarget;
use newsfeed::chat::Role;
use newsfeed::{Article, ArticleKey, CategoryFilter, FeedCoordinator, FeedEvent};

#[derive(Parser, Debug)]
#[command(name = "newsfeed", about = "Browse, summarize, listen to and chat about the daily news")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

const HELP: &str = "\
Commands:
  list | next | prev | page N      show or move through the catalog
  search TEXT | category NAME|All  filter the catalog
  read ID | close                  article detail view
  save ID | unsave ID | cart       manage the selection
  clear                            empty the selection
  summarize | audio                derive artifacts from the selection
  play KEY | download KEY [DIR]    audio playback and saving
  chat | say TEXT | clearchat      talk about the selection
  hide | show                      close or resume the chat dialog
  help | quit";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so they do not interleave with the listing
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let default_path = PathBuf::from("config.default.toml");
    let override_path = if let Some(p) = args.config {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() { Some(p) } else { None }
    };

    let config = match Config::load_with_defaults(
        if default_path.exists() { Some(&default_path) } else { None },
        override_path.as_deref(),
    )
    .await
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(%e, "failed to load configuration");
            return Err(e);
        }
    };
    info!(default = ?default_path, override = ?override_path, base_url = %config.api.base_url, "configuration loaded");

    let download_dir = PathBuf::from(config.download_dir());
    let mut coordinator = FeedCoordinator::from_config(&config)?;
    coordinator.load_news();
    println!("Loading news from {} ... (type `help` for commands)", config.api.base_url);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    // End of the clip currently playing
    let mut playback: Option<Instant> = None;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("ctrl-c received, exiting");
                break;
            }
            Some(event) = coordinator.next_completion(), if coordinator.in_flight() > 0 => {
                report(&coordinator, &event);
            }
            _ = tokio::time::sleep_until(playback.unwrap_or_else(Instant::now)), if playback.is_some() => {
                playback = None;
                if let Some(key) = coordinator.state().artifacts().playing() {
                    coordinator.playback_finished();
                    println!("Finished playing audio for {}.", key);
                }
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        error!(%e, "failed to read stdin");
                        break;
                    }
                };
                if !dispatch(&mut coordinator, line.trim(), &download_dir, &mut playback).await {
                    break;
                }
            }
        }
    }

    if coordinator.in_flight() > 0 {
        info!(pending = coordinator.in_flight(), "exiting with requests still in flight");
    }
    Ok(())
}

/// Run one command line. Returns false when the user asked to quit.
async fn dispatch(
    coordinator: &mut FeedCoordinator,
    line: &str,
    download_dir: &Path,
    playback: &mut Option<Instant>,
) -> bool {
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((c, r)) => (c, r.trim()),
        None => (line, ""),
    };

    match command {
        "" => {}
        "quit" | "exit" => return false,
        "help" => println!("{}", HELP),
        "list" => print_page(coordinator),
        "next" => {
            if !coordinator.next_page() {
                println!("No next page.");
            }
        }
        "prev" => {
            if !coordinator.previous_page() {
                println!("No previous page.");
            }
        }
        "page" => match rest.parse::<usize>() {
            Ok(page) if page >= 1 => coordinator.set_page(page),
            _ => println!("Usage: page N (N >= 1)"),
        },
        "search" => coordinator.set_search(rest),
        "category" => match rest.parse::<CategoryFilter>() {
            Ok(category) => coordinator.set_category(category),
            Err(e) => match e {},
        },
        "read" => match parse_id(rest) {
            Some(id) if coordinator.open_article(id) => print_detail(coordinator),
            Some(id) => println!("Article {} is not on this page.", id),
            None => println!("Usage: read ID"),
        },
        "close" => coordinator.close_article(),
        "save" => match parse_id(rest) {
            Some(id) if coordinator.add_to_cart(id) => println!("Saved article {}.", id),
            Some(id) => println!("Article {} is already saved or not on this page.", id),
            None => println!("Usage: save ID"),
        },
        "unsave" => match parse_id(rest) {
            Some(id) if coordinator.remove_from_cart(id) => println!("Removed article {}.", id),
            Some(id) => println!("Article {} is not saved.", id),
            None => println!("Usage: unsave ID"),
        },
        "cart" => print_cart(coordinator),
        "clear" => {
            coordinator.clear_cart();
            *playback = None;
            println!("Selection cleared.");
        }
        "summarize" => {
            if coordinator.state().selection().is_empty() {
                println!("Save some articles first.");
            } else {
                coordinator.summarize_selection();
                print_summary(coordinator.state().artifacts().summary());
            }
        }
        "audio" => {
            if coordinator.state().selection().is_empty() {
                println!("Save some articles first.");
            } else {
                coordinator.convert_selection_to_audio();
                print_audio_status(coordinator);
            }
        }
        "play" => match rest.parse::<ArticleKey>() {
            Ok(key) if coordinator.state().artifacts().audio(key).is_none() => {
                println!("No audio for {}.", key)
            }
            Ok(key) => match coordinator.toggle_playback(key) {
                Some(playing) => {
                    let length = coordinator
                        .state()
                        .artifacts()
                        .audio(playing)
                        .map(|handle| handle.estimated_duration())
                        .unwrap_or_default();
                    *playback = Some(Instant::now() + length);
                    println!("Playing audio for {} ({}s).", playing, length.as_secs());
                }
                None => {
                    *playback = None;
                    println!("Playback stopped.");
                }
            },
            Err(_) => println!("Usage: play ID|aggregate"),
        },
        "download" => {
            let (key, dir) = match rest.split_once(char::is_whitespace) {
                Some((k, d)) => (k, PathBuf::from(d.trim())),
                None => (rest, download_dir.to_path_buf()),
            };
            match key.parse::<ArticleKey>() {
                Ok(key) => match coordinator.save_audio(key, &dir).await {
                    Ok(path) => println!("Saved {}", path.display()),
                    Err(e) => println!("Could not save audio: {:#}", e),
                },
                Err(_) => println!("Usage: download ID|aggregate [DIR]"),
            }
        }
        "chat" => {
            if coordinator.state().selection().is_empty() {
                println!("Save some articles first.");
            } else {
                coordinator.open_chat_for_selection();
                print_chat_header(coordinator);
            }
        }
        "say" => {
            if !coordinator.say(rest) {
                println!("Open a chat and type a message first.");
            }
        }
        "clearchat" => {
            coordinator.clear_chat();
            println!("Chat cleared.");
        }
        "hide" => coordinator.close_chat(),
        "show" => {
            if coordinator.show_chat() {
                print_chat_header(coordinator);
                for turn in coordinator.state().chat().transcript() {
                    print_turn(turn.role, &turn.content.render(RenderTarget::Plain));
                }
            } else {
                println!("No chat to resume.");
            }
        }
        other => {
            warn!(command = other, "unknown command");
            println!("Unknown command `{}`. Type `help`.", other);
        }
    }
    true
}

fn parse_id(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

fn report(coordinator: &FeedCoordinator, event: &FeedEvent) {
    let state = coordinator.state();
    match event {
        FeedEvent::CatalogLoaded { .. } => print_page(coordinator),
        FeedEvent::CatalogFailed(message) => println!("Could not load news: {}", message),
        FeedEvent::SummaryUpdated => print_summary(state.artifacts().summary()),
        FeedEvent::AudioReady(key) => println!("Audio ready for {} (`play {}` or `download {}`).", key, key, key),
        FeedEvent::AudioFailed => print_audio_status(coordinator),
        FeedEvent::ChatReady(_) => println!("Chat session ready."),
        FeedEvent::ChatFailed => println!("Could not start a chat session."),
        FeedEvent::ReplyAppended(key) => {
            if let Some(turn) = state.chat().transcript_for(*key).last() {
                print_turn(turn.role, &turn.content.render(RenderTarget::Plain));
            }
        }
        FeedEvent::ReplyFailed(_) => println!("No reply from the chat service."),
        FeedEvent::Stale => {}
        FeedEvent::TaskAborted => println!("A request ended unexpectedly; see the log."),
    }
}

fn print_page(coordinator: &FeedCoordinator) {
    let state = coordinator.state();
    let query = state.query();
    println!(
        "\n--- Page {} | category {} | search \"{}\" ---",
        query.page, query.category, query.search
    );
    if state.is_loading() {
        println!("(loading...)");
    }
    if state.articles().is_empty() {
        println!("No articles.");
    }
    for article in state.articles() {
        print_row(article);
    }
    let mut nav = Vec::new();
    if state.can_go_previous() {
        nav.push("prev");
    }
    if state.can_go_next() {
        nav.push("next");
    }
    if !nav.is_empty() {
        println!("[{}]", nav.join(" | "));
    }
}

fn print_row(article: &Article) {
    let mark = if article.saved { "*" } else { " " };
    println!("{} #{:<5} [{}] {}", mark, article.id, article.category.label(), article.title);
}

fn print_detail(coordinator: &FeedCoordinator) {
    let Some(article) = coordinator.state().detail() else {
        return;
    };
    println!("\n{}", article.title);
    println!("{}", "=".repeat(article.title.chars().count().min(60)));
    if !article.author.is_empty() {
        println!("By {}", article.author);
    }
    println!("Category: {}", article.category.label());
    println!("Image: {}", article.image);
    if let Some(published) = article.published() {
        println!("{}", published.format("%Y-%m-%d %H:%M"));
    }
    if !article.brief.is_empty() {
        println!("\n{}", article.brief);
    }
    println!("\n{}", article.content);
    if !article.source_url.is_empty() {
        println!("\nSource: {}", article.source_url);
    }
}

fn print_cart(coordinator: &FeedCoordinator) {
    let state = coordinator.state();
    let selection = state.selection();
    println!("\n--- Selection ({}) ---", selection.len());
    for article in selection.articles() {
        print_row(article);
    }
    let summary = state.artifacts().summary();
    if !matches!(summary, SummarySlot::Empty) {
        print_summary(summary);
    }
    print_audio_status(coordinator);
    for key in state.artifacts().audio_keys() {
        let playing = if state.artifacts().playing() == Some(key) { " (playing)" } else { "" };
        println!("audio: {}{}", key, playing);
    }
}

fn print_summary(summary: &SummarySlot) {
    println!("\nSummary: {}", summary);
}

fn print_audio_status(coordinator: &FeedCoordinator) {
    if let Some(text) = coordinator.state().artifacts().audio_status().text() {
        println!("{}", text);
    }
}

fn print_chat_header(coordinator: &FeedCoordinator) {
    if let Some(header) = coordinator.state().chat().header() {
        println!("\n{}", header);
    }
}

fn print_turn(role: Role, text: &str) {
    let who = match role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    println!("{}> {}", who, text);
}
