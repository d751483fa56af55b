//! Audible device registration, request signing and chapter metadata
//!
//! ```rust,no_run
//! use audible_chapters::api::{ChapterClient, ClientConfig, Region};
//! use audible_chapters::config::ChapterSecrets;
//! use std::sync::Arc;
//!
//! # async fn example() -> audible_chapters::Result<()> {
//! let transport = Arc::new(ClientConfig::default().transport()?);
//! let client = ChapterClient::new("B079LRSMNN", Region::us(), &ChapterSecrets::from_env(), transport)?;
//!
//! if let Some(chapters) = client.process().await? {
//!     for chapter in &chapters.chapters {
//!         println!("{} @ {}ms", chapter.title, chapter.start_offset_ms);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod api;
pub mod config;
pub mod crypto;
pub mod diagnostics;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{AudibleError, Result};
