//! Kioku CLI - Memory ingestion, search and questions
//!
//! Simple CLI for interacting with the Kioku API.

mod api;
mod config;
mod ingest;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use dialoguer::{Input, Password};
use std::fs;
use tracing_subscriber::EnvFilter;

use api::{
    AskMemoriesRequest, CreateMemoryRequest, KiokuClient, RerankRequest, SearchMemoriesRequest,
};
use config::{Config, Profile};
use ingest::{IngestOptions, IngestReport};

#[derive(Parser)]
#[command(name = "kioku")]
#[command(about = "Kioku CLI - Memory ingestion, search and questions", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Login and store API key
    Login {
        /// API key (will prompt if not provided)
        #[arg(short, long)]
        key: Option<String>,
        /// API base URL
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Manage profiles (memory scope shortcuts)
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Memory operations
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },

    /// Ask a question answered from your memories
    Ask {
        question: String,
        /// Max memories to retrieve
        #[arg(short, long)]
        limit: Option<usize>,
        /// Minimum similarity (0.0-1.0)
        #[arg(long)]
        threshold: Option<f32>,
        /// Rerank retrieved memories with the LLM
        #[arg(long)]
        rerank: bool,
        /// Profile to use
        #[arg(short, long)]
        profile: Option<String>,
        /// Show the memories the answer was built from
        #[arg(long)]
        verbose: bool,
    },

    /// Show current configuration
    Config,
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Add a new profile
    Add {
        /// Profile name (e.g., "me", "work-bot")
        name: String,
        /// Owner ID
        #[arg(long)]
        owner_id: i64,
        /// Agent ID (optional)
        #[arg(long)]
        agent_id: Option<String>,
        /// Run ID (optional)
        #[arg(long)]
        run_id: Option<String>,
        /// Display name (optional)
        #[arg(long)]
        display_name: Option<String>,
    },
    /// List all profiles
    List,
    /// Set default profile
    Set {
        /// Profile name to set as default
        name: String,
    },
    /// Remove a profile
    Remove {
        /// Profile name to remove
        name: String,
    },
}

#[derive(Subcommand)]
enum MemoryAction {
    /// Add a memory
    Add {
        /// Memory content (or use -f for file)
        content: Option<String>,
        /// Read content from file
        #[arg(short, long)]
        file: Option<String>,
        /// Source tag
        #[arg(short, long, default_value = "cli")]
        source: String,
        /// Title
        #[arg(long)]
        title: Option<String>,
        /// Memory type (text, email, event, fact...)
        #[arg(short = 't', long)]
        r#type: Option<String>,
        /// Importance (0.0-1.0)
        #[arg(short, long)]
        importance: Option<f32>,
        /// Tags for categorization (comma-separated)
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        /// Profile to use (overrides default)
        #[arg(short, long)]
        profile: Option<String>,
    },
    /// Show a memory
    Get { id: i64 },
    /// Delete a memory and its vectors
    Delete { id: i64 },
    /// List memories of the profile owner, newest first
    List {
        #[arg(short, long)]
        profile: Option<String>,
    },
    /// Search memories
    Search {
        /// Search query
        query: String,
        /// Max results
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Minimum similarity (0.0-1.0)
        #[arg(long)]
        threshold: Option<f32>,
        /// Rerank results with the LLM
        #[arg(long)]
        rerank: bool,
        /// Profile to use
        #[arg(short, long)]
        profile: Option<String>,
    },
    /// Ingest a JSONL file of conversation batches
    Ingest {
        /// File with one AddMemories batch per line
        file: String,
        /// Embed messages verbatim instead of extracting facts
        #[arg(long)]
        no_infer: bool,
        /// Concurrent requests per chunk
        #[arg(long, default_value = "10")]
        chunk_size: usize,
        /// Profile providing the scope for batches without one
        #[arg(short, long)]
        profile: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Login { key, base_url } => cmd_login(key, base_url).await,
        Commands::Profile { action } => cmd_profile(action),
        Commands::Memory { action } => cmd_memory(action).await,
        Commands::Ask {
            question,
            limit,
            threshold,
            rerank,
            profile,
            verbose,
        } => cmd_ask(question, limit, threshold, rerank, profile, verbose).await,
        Commands::Config => cmd_config(),
    }
}

fn client(config: &Config) -> Result<KiokuClient> {
    KiokuClient::new(&config.base_url, config.api_key.as_deref())
}

fn rerank_flag(rerank: bool) -> Option<RerankRequest> {
    rerank.then(|| RerankRequest {
        enabled: Some(true),
        top_k: None,
    })
}

// ============================================
// Command Implementations
// ============================================

async fn cmd_login(key: Option<String>, base_url: Option<String>) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(url) = base_url {
        config.base_url = url;
    }

    let api_key = match key {
        Some(k) => k,
        None => Password::new()
            .with_prompt("API Key")
            .interact()
            .context("Failed to read API key")?,
    };

    let client = KiokuClient::new(&config.base_url, Some(&api_key))?;
    print!("Testing connection... ");

    match client.health().await {
        Ok(true) => println!("{}", "OK".green()),
        _ => {
            println!("{}", "Failed".red());
            bail!("Could not connect to Kioku API at {}", config.base_url);
        }
    }

    config.set_api_key(api_key);
    config.save()?;

    println!("{} API key saved to {:?}", "✓".green(), Config::config_path()?);

    if config.profiles.is_empty() {
        println!("\n{}", "Tip: Set up a profile for your memory scope:".yellow());
        println!("  kioku profile add me --owner-id <OWNER_ID>");
        println!("  kioku profile set me");
    }

    Ok(())
}

fn cmd_profile(action: ProfileAction) -> Result<()> {
    let mut config = Config::load()?;

    match action {
        ProfileAction::Add {
            name,
            owner_id,
            agent_id,
            run_id,
            display_name,
        } => {
            if owner_id <= 0 {
                bail!("owner id must be positive");
            }
            config.add_profile(
                name.clone(),
                Profile {
                    owner_id,
                    agent_id,
                    run_id,
                    name: display_name,
                },
            );
            config.save()?;
            println!("{} Profile '{}' added (owner {})", "✓".green(), name, owner_id);
        }

        ProfileAction::List => {
            if config.profiles.is_empty() {
                println!("No profiles configured.");
                println!("\n{}", "Add one with:".dimmed());
                println!("  kioku profile add <name> --owner-id <OWNER_ID>");
                return Ok(());
            }

            println!("{}", "Profiles:".bold());
            for (name, profile) in &config.profiles {
                let is_default = config.default_profile.as_ref() == Some(name);
                let default_marker = if is_default {
                    " (default)".green().to_string()
                } else {
                    String::new()
                };
                let display_name = profile.name.as_deref().unwrap_or("-");

                println!(
                    "  {} {} ({}){}",
                    name.cyan(),
                    display_name.dimmed(),
                    scope_label(profile),
                    default_marker
                );
            }
        }

        ProfileAction::Set { name } => {
            if config.set_default_profile(name.clone()) {
                config.save()?;
                println!("{} Default profile set to '{}'", "✓".green(), name);
            } else {
                bail!("Profile '{}' not found", name);
            }
        }

        ProfileAction::Remove { name } => {
            if config.remove_profile(&name) {
                config.save()?;
                println!("{} Profile '{}' removed", "✓".green(), name);
            } else {
                bail!("Profile '{}' not found", name);
            }
        }
    }

    Ok(())
}

async fn cmd_memory(action: MemoryAction) -> Result<()> {
    let config = Config::load()?;
    let client = client(&config)?;

    match action {
        MemoryAction::Add {
            content,
            file,
            source,
            title,
            r#type,
            importance,
            tags,
            profile,
        } => {
            let scope = config.require_profile(profile.as_deref())?;

            let memory_content = match (content, file) {
                (Some(c), None) => c,
                (None, Some(f)) => {
                    fs::read_to_string(&f).with_context(|| format!("Failed to read file: {}", f))?
                }
                (Some(_), Some(_)) => bail!("Cannot specify both content and --file"),
                (None, None) => Input::new()
                    .with_prompt("Memory content")
                    .interact_text()
                    .context("Failed to read input")?,
            };

            let outcome = client
                .create_memory(&CreateMemoryRequest {
                    owner_id: scope.owner_id,
                    agent_id: scope.agent_id.clone(),
                    run_id: scope.run_id.clone(),
                    source,
                    source_id: uuid::Uuid::new_v4().to_string(),
                    content: memory_content.clone(),
                    title,
                    memory_type: r#type,
                    importance,
                    tags,
                })
                .await?;

            if outcome.is_duplicate {
                println!(
                    "{} Already remembered as #{}",
                    "=".yellow(),
                    outcome.memory.id
                );
            } else {
                let embedded = outcome
                    .embedding_results
                    .iter()
                    .filter(|r| r.success)
                    .count();
                println!(
                    "{} Memory #{} added [{}] ({} facts embedded)",
                    "✓".green(),
                    outcome.memory.id,
                    outcome.memory.memory_type,
                    embedded
                );
            }
            if let Some(note) = outcome.note {
                println!("  {}", note.dimmed());
            }
            println!("  {}", truncate_string(&memory_content, 80).dimmed());
        }

        MemoryAction::Get { id } => {
            let memory = client.get_memory(id).await?;
            println!("{} #{} [{}]", "Memory".bold(), memory.id, memory.memory_type);
            println!("  Owner: {}", memory.owner_id);
            if let Some(agent) = &memory.agent_id {
                println!("  Agent: {}", agent);
            }
            println!("  Source: {} ({})", memory.source, memory.source_id);
            if !memory.title.is_empty() {
                println!("  Title: {}", memory.title);
            }
            if !memory.summary.is_empty() {
                println!("  Summary: {}", memory.summary);
            }
            println!("  Importance: {:.2}", memory.importance);
            println!(
                "  Embedded: {}",
                if memory.embedding_ref.is_some() {
                    "yes".green()
                } else {
                    "no".yellow()
                }
            );
            println!("  Hash: {}", memory.content_hash.dimmed());
            println!("\n{}", memory.content);
        }

        MemoryAction::Delete { id } => {
            let deleted = client.delete_memory(id).await?;
            println!(
                "{} Memory #{} deleted",
                "✓".green(),
                deleted.memory.id
            );
        }

        MemoryAction::List { profile } => {
            let scope = config.require_profile(profile.as_deref())?;
            let memories = client.list_memories(scope.owner_id).await?;

            if memories.is_empty() {
                println!("No memories for owner {}", scope.owner_id);
                return Ok(());
            }

            for mem in memories {
                let type_badge = format!("[{}]", mem.memory_type).dimmed();
                println!(
                    "  #{} {} {}",
                    mem.id,
                    type_badge,
                    truncate_string(&mem.content, 60)
                );
            }
        }

        MemoryAction::Search {
            query,
            limit,
            threshold,
            rerank,
            profile,
        } => {
            let scope = config.require_profile(profile.as_deref())?;

            let response = client
                .search_memories(&SearchMemoriesRequest {
                    query: query.clone(),
                    owner_id: scope.owner_id,
                    agent_id: scope.agent_id.clone(),
                    run_id: scope.run_id.clone(),
                    limit: Some(limit),
                    score_threshold: threshold,
                    rerank: rerank_flag(rerank),
                })
                .await?;

            if response.memories.is_empty() {
                println!("No memories found for '{}'", query);
                return Ok(());
            }

            println!(
                "{} results for '{}':",
                response.count.to_string().green(),
                query
            );
            for hit in response.memories {
                let score = hit.rerank_score.unwrap_or(hit.score);
                println!(
                    "  {} {}",
                    format!("({score:.3})").dimmed(),
                    truncate_string(&hit.text, 70)
                );
            }
        }

        MemoryAction::Ingest {
            file,
            no_infer,
            chunk_size,
            profile,
        } => {
            let content =
                fs::read_to_string(&file).with_context(|| format!("Failed to read file: {}", file))?;
            let (mut batches, parse_errors) = ingest::parse_batches(&content);

            for (line, error) in &parse_errors {
                println!("{} line {} skipped: {}", "!".yellow(), line, error);
            }

            let scope = config.get_profile(profile.as_deref());
            for batch in &mut batches {
                if let Some(scope) = scope {
                    batch.apply_scope(scope);
                }
                if no_infer {
                    batch.infer = Some(false);
                }
            }

            println!("Ingesting {} batches from {}...", batches.len(), file);

            let options = IngestOptions {
                chunk_size,
                ..Default::default()
            };
            let report = ingest::ingest(batches, &options, |batch| {
                let client = &client;
                async move { client.add_memories(&batch).await }
            })
            .await;

            print_report(&report);
            if report.aborted {
                bail!("Ingest aborted: the Kioku API looks unavailable");
            }
        }
    }

    Ok(())
}

async fn cmd_ask(
    question: String,
    limit: Option<usize>,
    threshold: Option<f32>,
    rerank: bool,
    profile: Option<String>,
    verbose: bool,
) -> Result<()> {
    let config = Config::load()?;
    let scope = config.require_profile(profile.as_deref())?;
    let client = client(&config)?;

    let response = client
        .ask(&AskMemoriesRequest {
            question,
            owner_id: scope.owner_id,
            agent_id: scope.agent_id.clone(),
            run_id: scope.run_id.clone(),
            limit,
            score_threshold: threshold,
            rerank: rerank_flag(rerank),
        })
        .await?;

    if verbose {
        // Metadata to stderr so stdout is clean for piping
        eprintln!(
            "{} {} memories, model {}{}",
            "Answered from".dimmed(),
            response.count,
            response.model.green(),
            response
                .rerank_model
                .as_deref()
                .map(|m| format!(", reranked by {m}"))
                .unwrap_or_default()
        );
        for hit in &response.memories {
            eprintln!("  {} {}", format!("[{}]", hit.id).dimmed(), truncate_string(&hit.text, 70));
        }
        eprintln!("{}", "---".dimmed());
    }

    println!("{}", response.answer);

    Ok(())
}

fn print_report(report: &IngestReport) {
    println!(
        "{} {} batches stored ({} memories)",
        "✓".green(),
        report.succeeded,
        report.memories_stored
    );
    if !report.failures.is_empty() {
        println!("{} {} batches failed", "✗".red(), report.failures.len());
        for failure in &report.failures {
            println!(
                "  batch {}: {}",
                failure.index + 1,
                truncate_string(&failure.error, 100).dimmed()
            );
        }
    }
    if report.skipped > 0 {
        println!("{} {} batches not sent", "!".yellow(), report.skipped);
    }
}

fn scope_label(profile: &Profile) -> String {
    let mut label = format!("owner {}", profile.owner_id);
    if let Some(agent) = &profile.agent_id {
        label.push_str(&format!(", agent {agent}"));
    }
    if let Some(run) = &profile.run_id {
        label.push_str(&format!(", run {run}"));
    }
    label
}

/// Truncate string safely for UTF-8 (by char count, not bytes)
fn truncate_string(s: &str, max_chars: usize) -> String {
    let chars: Vec<char> = s.chars().take(max_chars).collect();
    if s.chars().count() > max_chars {
        format!("{}...", chars.into_iter().collect::<String>())
    } else {
        s.to_string()
    }
}

fn cmd_config() -> Result<()> {
    let config = Config::load()?;

    println!("{}", "Configuration:".bold());
    println!("  Path: {:?}", Config::config_path()?);
    println!("  Base URL: {}", config.base_url);
    println!(
        "  API Key: {}",
        if config.api_key.is_some() {
            "Set".green()
        } else {
            "Not set".red()
        }
    );
    println!(
        "  Default Profile: {}",
        config.default_profile.as_deref().unwrap_or("None").cyan()
    );
    println!("  Profiles: {}", config.profiles.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_truncate_string_counts_chars() {
        assert_eq!(truncate_string("記憶の海", 2), "記憶...");
        assert_eq!(truncate_string("short", 10), "short");
    }

    #[test]
    fn test_scope_label() {
        let profile = Profile {
            owner_id: 1,
            agent_id: Some("mail-bot".to_string()),
            ..Default::default()
        };
        assert_eq!(scope_label(&profile), "owner 1, agent mail-bot");
    }

    #[test]
    fn test_parse_ingest_command() {
        let cli = Cli::try_parse_from(["kioku", "memory", "ingest", "chat.jsonl", "--no-infer"])
            .unwrap();
        match cli.command {
            Commands::Memory {
                action:
                    MemoryAction::Ingest {
                        file,
                        no_infer,
                        chunk_size,
                        ..
                    },
            } => {
                assert_eq!(file, "chat.jsonl");
                assert!(no_infer);
                assert_eq!(chunk_size, 10);
            }
            _ => panic!("expected memory ingest"),
        }
    }
}
