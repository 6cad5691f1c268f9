//! # Tributary memory runtime
//!
//! Runs stream event readers on tokio against an in-memory commit log, primarily for testing
//! and development.
//!
//! ```ignore
//! use std::sync::Arc;
//! use tokio_stream::StreamExt;
//! use tributary_core::prelude::*;
//! use tributary_mem::{ExpectedVersion, InMemoryLog, ProposedEvent, spawn_reader};
//!
//! let log = Arc::new(InMemoryLog::new());
//! log.append("orders-1", ExpectedVersion::Any, vec![ProposedEvent::new("OrderPlaced", b"{}".to_vec())])
//!     .await?;
//!
//! let (handle, mut notifications) = spawn_reader(log.clone(), "orders-1", 0, ReaderConfig::default())?;
//! while let Some(notification) = notifications.next().await {
//!     // events in stream order, then an idle notification every time the reader polls the tail
//! }
//! ```
//!
//! See [`ReaderHandle`] for pausing, resuming and stopping a running reader.

#![deny(missing_docs)]

mod bus;
mod commit_log;
mod task;

pub use bus::*;
pub use commit_log::*;
pub use task::*;
