//! # Research Harness CLI (`rsch`)
//!
//! The `rsch` binary drives the research pipeline from the command line:
//! plan a goal into subtopics, run the full pipeline to a markdown report,
//! refine a goal through clarifying questions, or search the corpus built
//! for a goal.
//!
//! ## Usage
//!
//! ```bash
//! rsch --config ./config/rsch.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rsch plan "<goal>"` | Show the subtopic plan and search queries for a goal |
//! | `rsch questions "<goal>"` | Show the clarifying questions a refinement session would ask |
//! | `rsch run "<goal>"` | Run the full pipeline and emit a markdown report |
//! | `rsch refine "<goal>" --answer ...` | Run the pipeline on a goal refined with answers |
//! | `rsch search "<query>" --goal "<goal>"` | Build the corpus for a goal, then search it |
//! | `rsch stats --goal "<goal>"` | Build the corpus for a goal and print its statistics |
//! | `rsch sources` | List the configured source adapters |
//!
//! ## Examples
//!
//! ```bash
//! # Inspect the plan without touching the network
//! rsch plan "swarm robotics for disaster response"
//!
//! # Full report to a file
//! rsch run "swarm robotics for disaster response" --output report.md
//!
//! # Answer the clarifying questions non-interactively
//! rsch refine "swarm robotics" \
//!     --answer "deployment" --answer "disaster response" --answer ""
//!
//! # Ad-hoc semantic search over the corpus a goal produces
//! rsch search "pheromone routing" --goal "ant colony optimization" --limit 5
//! ```
//!
//! Running the pipeline requires `OPENAI_API_KEY` in the environment for
//! the embedding provider. `plan`, `questions`, and `sources` are offline.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use research_harness::adapter::AdapterRegistry;
use research_harness::config::{self, Config};
use research_harness::embedding::OpenAiEmbedder;
use research_harness::index::MemoryIndex;
use research_harness::models::ResearchGoal;
use research_harness::pipeline::Pipeline;
use research_harness::report::render_markdown;

/// Research Harness CLI — multi-source research reports from a single goal.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/rsch.example.toml` for a full example; when the file
/// is absent, built-in defaults apply.
#[derive(Parser)]
#[command(
    name = "rsch",
    about = "Research Harness — turn a research goal into a structured, cited report",
    version,
    long_about = "Research Harness plans a checklist of analytical subtopics for a research \
    goal, collects documents from arXiv, Semantic Scholar, and Wikipedia in parallel, embeds \
    them into a vector index, and synthesizes a markdown report with numbered citations and \
    explicit research-gap markers."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/rsch.toml`. Source priority, chunking,
    /// retrieval, embedding, and report settings are read from this file;
    /// a missing file means defaults.
    #[arg(long, global = true, default_value = "./config/rsch.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Show the subtopic plan for a goal.
    ///
    /// Prints the fixed checklist of analytical subtopics with the search
    /// queries derived from the goal. Offline: no network or API key
    /// required.
    Plan {
        /// The research goal, in natural language.
        goal: String,
    },

    /// Show the clarifying questions for a goal.
    ///
    /// These are the questions an interactive refinement session would
    /// ask. Answer them via `rsch refine --answer`.
    Questions {
        /// The research goal, in natural language.
        goal: String,
    },

    /// Run the full research pipeline and emit a markdown report.
    ///
    /// Collects documents from every configured source, chunks and embeds
    /// them, retrieves evidence per subtopic, and synthesizes the report.
    /// Source failures are annotated in the report rather than aborting
    /// the run. Ctrl-C stops collection after the current subtopic; the
    /// subtopics already collected still produce a partial report.
    Run {
        /// The research goal, in natural language.
        goal: String,

        /// Maximum results fetched per source per query (overrides config).
        #[arg(long)]
        max_results: Option<usize>,

        /// Write the markdown report to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Emit the structured report as JSON instead of markdown.
        #[arg(long)]
        json: bool,
    },

    /// Run the pipeline on a refined goal.
    ///
    /// Folds the given answers into the goal (one `--answer` per
    /// clarifying question, in order; empty string skips a question) and
    /// runs the full pipeline on the refined goal.
    Refine {
        /// The original research goal.
        goal: String,

        /// Answer to the next clarifying question (repeatable, in order).
        #[arg(long = "answer")]
        answers: Vec<String>,

        /// Write the markdown report to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Search the corpus built for a goal.
    ///
    /// The index lives in memory for the duration of one invocation, so a
    /// goal is collected and indexed first, then the query runs against
    /// that corpus.
    Search {
        /// The search query string.
        query: String,

        /// Goal whose corpus to build and search.
        #[arg(long)]
        goal: String,

        /// Maximum number of results to return.
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },

    /// Build the corpus for a goal and print its statistics.
    ///
    /// Shows chunk and document counts broken down by source and year.
    Stats {
        /// Goal whose corpus to build.
        #[arg(long)]
        goal: String,
    },

    /// List the configured source adapters.
    ///
    /// Shows each adapter in priority order with its description. Useful
    /// for verifying configuration before a run.
    Sources,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("research_harness=info,rsch=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cfg = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        Config::default()
    };

    // Commands that don't need the embedder or the network
    match &cli.command {
        Commands::Plan { goal } => {
            let registry = AdapterRegistry::from_config(&cfg);
            let pipeline = offline_pipeline(cfg, registry);
            let plan = pipeline.plan(goal)?;
            println!("Goal: {}\n", plan.goal);
            for (i, subtopic) in plan.subtopics.iter().enumerate() {
                println!("{}. {}", i + 1, subtopic.name);
                println!("   {}", subtopic.description);
                for query in &subtopic.queries {
                    println!("   query: {}", query);
                }
            }
            return Ok(());
        }
        Commands::Questions { goal } => {
            let registry = AdapterRegistry::from_config(&cfg);
            let pipeline = offline_pipeline(cfg, registry);
            for (i, question) in pipeline.generate_questions(goal)?.iter().enumerate() {
                println!("{}. {}", i + 1, question);
            }
            return Ok(());
        }
        Commands::Sources => {
            let registry = AdapterRegistry::from_config(&cfg);
            if registry.is_empty() {
                println!("No sources configured.");
                return Ok(());
            }
            for handle in registry.handles() {
                println!("{:<20} {}", handle.source_id(), handle.description());
            }
            return Ok(());
        }
        _ => {}
    }

    let mut cfg = cfg;
    if let Commands::Run {
        max_results: Some(n),
        ..
    } = &cli.command
    {
        cfg.sources.max_results_per_source = *n;
    }

    let embedder = OpenAiEmbedder::new(&cfg.embedding)
        .context("failed to initialize the embedding provider")?;
    let registry = AdapterRegistry::from_config(&cfg);
    let pipeline = Pipeline::new(
        cfg,
        registry,
        Arc::new(embedder),
        Arc::new(MemoryIndex::new()),
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("Interrupt received, finishing the current subtopic...");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Commands::Run {
            goal, output, json, ..
        } => {
            let report = pipeline.run(&ResearchGoal::new(goal), &cancel).await?;
            if json {
                emit(output.as_deref(), &serde_json::to_string_pretty(&report)?)?;
            } else {
                emit(output.as_deref(), &render_markdown(&report))?;
            }
        }
        Commands::Refine {
            goal,
            answers,
            output,
        } => {
            let report = pipeline.run_refined(&goal, answers, &cancel).await?;
            emit(output.as_deref(), &render_markdown(&report))?;
        }
        Commands::Search { query, goal, limit } => {
            let stats = pipeline.ingest(&goal, &cancel).await?;
            println!(
                "Indexed {} chunks from {} documents.\n",
                stats.total_chunks, stats.unique_documents
            );
            let results = pipeline.search(&query, limit).await?;
            if results.is_empty() {
                println!("No results.");
            }
            for (i, result) in results.iter().enumerate() {
                println!(
                    "{}. [{:.3}] {} ({})",
                    i + 1,
                    result.distance,
                    result.chunk.metadata.title,
                    result.chunk.document
                );
                println!("   subtopic: {}", result.subtopic);
                println!("   {}", snippet(&result.chunk.text, 200));
            }
        }
        Commands::Stats { goal } => {
            let stats = pipeline.ingest(&goal, &cancel).await?;
            print_stats(&stats);
        }
        // Handled above (before the pipeline is built)
        Commands::Plan { .. } | Commands::Questions { .. } | Commands::Sources => unreachable!(),
    }

    Ok(())
}

/// Pipeline for offline commands; never embeds or queries.
fn offline_pipeline(cfg: Config, registry: AdapterRegistry) -> Pipeline {
    struct NoEmbedder;

    #[async_trait::async_trait]
    impl research_harness::embedding::Embedder for NoEmbedder {
        fn model_name(&self) -> &str {
            "none"
        }
        fn dims(&self) -> usize {
            0
        }
        async fn embed(
            &self,
            _texts: &[String],
        ) -> Result<Vec<Vec<f32>>, research_harness::error::EmbeddingError> {
            Err(research_harness::error::EmbeddingError(
                "no embedding provider in offline mode".to_string(),
            ))
        }
    }

    Pipeline::new(cfg, registry, Arc::new(NoEmbedder), Arc::new(MemoryIndex::new()))
}

fn emit(output: Option<&std::path::Path>, content: &str) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("failed to write report to {}", path.display()))?;
            println!("Report written to {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

fn print_stats(stats: &research_harness::models::CorpusStats) {
    println!("Total chunks:     {}", stats.total_chunks);
    println!("Unique documents: {}", stats.unique_documents);
    if !stats.per_source_counts.is_empty() {
        println!("\nBy source:");
        for (source, count) in &stats.per_source_counts {
            println!("  {:<20} {}", source, count);
        }
    }
    if !stats.per_year_counts.is_empty() {
        println!("\nBy year:");
        for (year, count) in &stats.per_year_counts {
            println!("  {:<20} {}", year, count);
        }
    }
}

/// First `max_chars` of `text`, whitespace-normalized.
fn snippet(text: &str, max_chars: usize) -> String {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.chars().count() <= max_chars {
        return normalized;
    }
    let cut: String = normalized.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}
