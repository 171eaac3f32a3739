//! # Echoes - Client Core for Echoes of the Void
//!
//! Echoes is the client-side game-state core of "Echoes of the Void", a grid puzzle whose
//! state lives in an on-chain contract. Players spawn an entity, walk through dark chambers
//! and emit pulses to reveal the terrain around them. Every state change is a contract
//! transaction; chamber layouts are read back from an indexer.
//!
//! ## Features
//!
//! - **Optimistic Reconciliation**: Accepted transactions update the local store immediately,
//!   without waiting for the indexer to catch up.
//! - **Reveal Engine**: Euclidean pulse reveal with a timed collapse back to landmarks.
//! - **Transaction Status**: One state machine per action kind with timed auto-clear.
//! - **Death and Completion**: Edge-triggered detection of void cells and the chamber exit.
//! - **Offline Mode**: An in-process chain simulator for play and tests without a network.
//! - **Persistence**: The player snapshot survives restarts through an atomically written
//!   JSON store.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use echoes::config::Config;
//! use echoes::game::session::{GameSession, SessionSettings};
//! use echoes::remote::local::LocalChain;
//! use echoes::storage::GameStore;
//! use std::sync::Arc;
//! use tokio::time::Instant;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let store = GameStore::open(&config.storage.data_dir, &config.storage.store_name)?;
//!     let chain = Arc::new(LocalChain::new());
//!     let (mut session, mut events) =
//!         GameSession::new(chain.clone(), chain, store, SessionSettings::from_config(&config));
//!     session.connect("0x0123");
//!     session.start(Instant::now()).ok();
//!     while let Some(event) = events.recv().await {
//!         session.handle_event(event, Instant::now());
//!         println!("{}", session.render());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`game`] - Map model, reveal engine, action executors and the session controller
//! - [`storage`] - Persisted client store
//! - [`remote`] - Contract call boundary and its adapters
//! - [`indexer`] - Chamber lookup boundary and GraphQL decoding
//! - [`config`] - Configuration management and validation
//! - [`validation`] - Input validation utilities
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  Game Session   │ ← Input, timers, status lines
//! └─────────────────┘
//!     │         │
//! ┌────────┐ ┌──────────────────┐
//! │ Store  │ │ Remote / Indexer │ ← Contract calls and chamber lookups
//! └────────┘ └──────────────────┘
//! ```

pub mod config;
pub mod game;
pub mod indexer;
pub mod logutil;
pub mod metrics;
pub mod remote;
pub mod storage;
pub mod validation;
