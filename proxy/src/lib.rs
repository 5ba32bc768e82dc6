//! # Rank Sync Proxy Library
//!
//! This library keeps player ranks consistent across a network of game
//! servers that sit behind one proxy. The proxy is the single source of
//! truth: ranks are granted here, persisted here, and pushed outward to the
//! backend servers that need them.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Rank State
//! Every granted rank is recorded in a durable per-player set before any
//! backend hears about it. A backend that misses a push catches up the next
//! time a player connects to it.
//!
//! ### Routing
//! Some ranks only mean something on certain servers. The topology maps
//! each restricted rank to a server category; unrestricted ranks go
//! everywhere.
//!
//! ### Inbound API
//! An authenticated HTTP API lets a website or admin tool check players,
//! grant ranks and trigger resyncs.
//!
//! ## Architecture Design
//!
//! ### Never Block The Event Path
//! Player join and server switch events are handled on the proxy's event
//! path. Disk writes move to the blocking pool and backend pushes run on
//! detached tasks, each bounded by a per-request timeout and an overall
//! deadline.
//!
//! ### Persist Before Propagate
//! A grant is written to disk before any backend push starts, so a crash
//! mid-propagation loses nothing that can't be replayed on reconnect.
//!
//! ## Module Organization
//!
//! ### Rank Store Module (`rank_store`)
//! Durable mapping from username to granted ranks.
//!
//! ### Player Registry Module (`player_registry`)
//! Durable set of every player ever seen by the proxy.
//!
//! ### Topology Module (`topology`)
//! Configured backends and the rank routing rules.
//!
//! ### Sync Engine Module (`sync_engine`)
//! Pushes ranks to backends: single grants, connect-time replays and full
//! resyncs.
//!
//! ### API Module (`api`)
//! The authenticated HTTP surface.
//!
//! ### Event Bridge Module (`event_bridge`)
//! Translates host proxy events into core calls.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use proxy::config::ProxyConfig;
//! use proxy::context::AppContext;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let data_dir = Path::new("plugins/rank-sync");
//!     let config = ProxyConfig::load_or_create(data_dir);
//!     let context = AppContext::initialize(config, data_dir)?;
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8113").await?;
//!     proxy::api::serve(listener, context).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod event_bridge;
pub mod persist;
pub mod player_registry;
pub mod rank_store;
pub mod session;
pub mod sync_engine;
pub mod topology;
