//! Audible API client implementation
//!
//! This module covers device onboarding and the chapter metadata endpoint.
//!
//! # Components
//! - **region** - supported marketplaces and their localized vocabulary
//! - **client** - HTTP transport seam and endpoint configuration
//! - **auth** - password-grant token exchange
//! - **registration** - device registration and the one-shot onboarding flow
//! - **content** - chapter payload validation and title cleanup
//! - **chapters** - signed per-item chapter fetch
//!
//! # Flow
//! ```text
//! Credentials ──auth──▶ SessionTokens ──registration──▶ (ADP token, private key)
//!                                                            │
//!                                   ChapterClient ◀──────────┘
//! ```

pub mod auth;
pub mod chapters;
pub mod client;
pub mod content;
pub mod region;
pub mod registration;

// Re-export commonly used types
pub use auth::{Credentials, DeviceAuthenticator, SessionTokens};
pub use chapters::ChapterClient;
pub use client::{ClientConfig, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError};
pub use content::{clean_title, ChapterRecord, ChapterSet, RawChapterPayload};
pub use region::Region;
pub use registration::{
    authenticate_and_register, register_new_device, DeviceRegistrar, DeviceRegistration,
    RegistrationOutcome,
};
