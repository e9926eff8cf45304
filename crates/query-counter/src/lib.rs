//! # query-counter
//!
//! An N+1 query detector for test and debug runs.
//!
//! A [`QueryCounter`] subscribes to a stream of executed statements, folds
//! identical statements (optionally split by call site) into counted entries
//! and reports the ones that repeat more often than a configured threshold.
//!
//! ## Features
//!
//! - **Injected event source**: the counter listens on any [`StatementEvents`]
//!   implementation, no global registration
//! - **Scoped tracking**: [`QueryCounter::enter`] returns a guard that detaches on drop
//! - **Call-site provenance**: optional full stack capture and path-filtered
//!   heuristic frames that point at the application code issuing the query
//! - **Postgres integration**: [`InstrumentedClient`] wraps a tokio-postgres
//!   client and publishes every statement before it runs
//!
//! ## Example
//!
//! ```ignore
//! use query_counter::{AnalysisConfig, InstrumentedClient, QueryCounter};
//!
//! let client = InstrumentedClient::new(pg_client);
//! let counter = QueryCounter::new(AnalysisConfig::new().with_alert_threshold(3).raise_if_exceeds())
//!     .with_source(client.events());
//!
//! {
//!     let _scope = counter.enter()?;
//!     for user in client.query("SELECT id FROM users", &[]).await? {
//!         let id: i64 = user.get(0);
//!         client.query("SELECT * FROM posts WHERE user_id = $1", &[&id]).await?;
//!     }
//! }
//!
//! counter.analyze()?; // Err(QueryCountExceeded) when posts were fetched per user
//! ```

pub mod analyzer;
pub mod client;
pub mod config;
pub mod counter;
pub mod error;
pub mod events;
pub mod instance;
pub mod instrumented;
pub mod stack;
pub mod statement;
pub mod store;

pub use analyzer::Analysis;
pub use client::{ClientError, ClientResult, GenericClient};
pub use config::AnalysisConfig;
pub use counter::{CounterScope, QueryCounter};
pub use error::{CounterError, CounterResult};
pub use events::{EventSource, StatementEvents, StatementListener};
pub use instance::{HeuristicFrame, QueryInstance};
pub use instrumented::InstrumentedClient;
pub use statement::{ExecutedStatement, Statement};
pub use store::{Fingerprint, QueryStore};
