//! # Research Harness
//!
//! A multi-source research pipeline that turns a natural-language goal into
//! a structured, cited report.
//!
//! Research Harness plans a fixed checklist of analytical subtopics for a
//! goal, collects candidate documents from several free scholarly sources in
//! parallel, chunks and embeds them into a vector index, retrieves the best
//! evidence per subtopic, and synthesizes a markdown report with numbered
//! citations and explicit research-gap markers. A small refinement state
//! machine lets a user narrow the goal through clarifying questions before
//! the final run.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌────────────┐   ┌────────────┐
//! │ Planner  │──▶│ Collector │──▶│ Processor  │──▶│ VectorIndex │
//! │ 8 lenses │   │ arXiv/S2/ │   │ chunk+embed│   │ upsert/kNN  │
//! └──────────┘   │ Wikipedia │   └────────────┘   └─────┬──────┘
//!                └───────────┘                          │
//!                                  ┌────────────┐  ┌────▼──────┐
//!                                  │ Synthesizer│◀─│ Retriever │
//!                                  │  (report)  │  │ per lens  │
//!                                  └────────────┘  └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rsch plan "swarm robotics for disaster response"
//! rsch questions "swarm robotics for disaster response"
//! rsch run "swarm robotics for disaster response" --output report.md
//! rsch refine "swarm robotics" --answer "deployment" --answer "disaster response"
//! rsch search "pheromone routing" --goal "ant colony optimization"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`planner`] | Goal-to-subtopic-plan expansion |
//! | [`adapter`] | Source adapter trait and registry |
//! | [`adapter_arxiv`] | arXiv Atom API adapter |
//! | [`adapter_semantic_scholar`] | Semantic Scholar Graph API adapter |
//! | [`adapter_wikipedia`] | Wikipedia MediaWiki API adapter |
//! | [`collector`] | Parallel collection, dedup, partial failure |
//! | [`chunk`] | Overlapping text windowing |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`processor`] | Chunking + batched embedding |
//! | [`index`] | Vector index contract and in-memory reference |
//! | [`retriever`] | Per-subtopic evidence retrieval |
//! | [`report`] | Report synthesis and markdown rendering |
//! | [`refine`] | Conversational refinement state machine |
//! | [`pipeline`] | End-to-end orchestration |

pub mod adapter;
pub mod adapter_arxiv;
pub mod adapter_semantic_scholar;
pub mod adapter_wikipedia;
pub mod chunk;
pub mod collector;
pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod pipeline;
pub mod planner;
pub mod processor;
pub mod refine;
pub mod report;
pub mod retriever;
