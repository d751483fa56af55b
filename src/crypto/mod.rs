//! Device keys and request signing
//!
//! This module holds everything that touches the device private key.
//!
//! # Components
//! - **device** - RSA keypair and serial number generation, PEM encoding and parsing
//! - **signing** - ADP request signatures for the content API
//!
//! # Key lifecycle
//! 1. `DeviceIdentity::generate()` creates the keypair before registration
//! 2. The public key PEM is sent to `/device/registerDevice`
//! 3. The private key PEM is handed back to the caller with the ADP token
//! 4. Every `ChapterClient` parses it again and signs each request with it

pub mod device;
pub mod signing;

// Re-export commonly used types
pub use device::{parse_private_key, DeviceIdentity, DEVICE_TYPE};
pub use signing::{AdpSigningScheme, RequestMetadata, RequestSigner, SignatureHeaders, SigningScheme};
