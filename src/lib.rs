//! # Eco Context
//!
//! Dataset ingestion and semantic retrieval for a climate education
//! backend.
//!
//! Eco Context loads heterogeneous climate datasets (CSV, JSON, JSONL),
//! normalizes each row into descriptive text with lesson/person metadata,
//! embeds the text, and answers metadata-filtered nearest-neighbor queries
//! over a flat in-memory vector index. The chat and quiz services consume
//! it through a JSON HTTP API; a CLI covers ingestion and inspection.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌─────────────┐
//! │  Datasets    │──▶│   Pipeline     │──▶│  Snapshot    │
//! │ CSV/JSON(L)  │   │ Normalize+    │   │ .index/.data │
//! └──────────────┘   │ Chunk+Embed   │   └──────┬──────┘
//!                    └───────────────┘          │
//!                            ┌──────────────────┤
//!                            ▼                  ▼
//!                       ┌──────────┐      ┌──────────┐
//!                       │   CLI    │      │   HTTP   │
//!                       │  (eco)   │      │  (JSON)  │
//!                       └──────────┘      └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! eco ingest                         # build the snapshot
//! eco search "temperature in France" # query it
//! eco context climate_france        # prompt-ready lesson context
//! eco serve                          # start the HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types (records, metadata, filters) |
//! | [`loader`] | Dataset file loading (CSV, JSON, JSONL) |
//! | [`normalize`] | Row → text synthesis and metadata derivation |
//! | [`aggregate`] | Per-country temperature narrative aggregation |
//! | [`chunk`] | Text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Flat exact nearest-neighbor index |
//! | [`store`] | The retrieval store and its snapshot format |
//! | [`server`] | JSON HTTP retrieval server |

pub mod aggregate;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod index;
pub mod ingest;
pub mod loader;
pub mod models;
pub mod normalize;
pub mod search;
pub mod server;
pub mod status;
pub mod store;
