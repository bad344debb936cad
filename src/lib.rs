//! # Feedback Triage
//!
//! An automated feedback triage pipeline for product teams.
//!
//! Feedback Triage collects raw user feedback (generated synthetically or
//! ingested from JSON-lines files), classifies each item for sentiment,
//! urgency, and category using a keyword heuristic or an AI provider with
//! heuristic fallback, aggregates classified items into per-category
//! clusters with escalation scoring, and emits daily reports plus a
//! dashboard read model served over HTTP.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────┐
//! │  Generator/ │──▶│   Pipeline   │──▶│  SQLite   │
//! │   Ingest    │   │Classify+Clust│   │ feedback  │
//! └─────────────┘   └──────────────┘   └────┬─────┘
//!                                           │
//!                       ┌───────────────────┤
//!                       ▼                   ▼
//!                  ┌──────────┐       ┌──────────┐
//!                  │   CLI    │       │   HTTP   │
//!                  │ (triage) │       │ (axum)   │
//!                  └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! triage init                   # create database
//! triage run --count 25         # generate, classify, cluster, report
//! triage ingest feedback.jsonl  # triage externally collected feedback
//! triage report                 # print the latest report
//! triage dashboard --json       # dashboard view model as JSON
//! triage serve                  # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`generator`] | Synthetic feedback generation |
//! | [`classifier`] | Heuristic and AI classification |
//! | [`triage`] | Cluster aggregation and escalation scoring |
//! | [`report`] | Report construction and retrieval |
//! | [`pipeline`] | Run orchestration and persistence |
//! | [`dashboard`] | Dashboard read-model projection |
//! | [`server`] | HTTP trigger and read API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod classifier;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod generator;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod server;
pub mod stats;
pub mod triage;
