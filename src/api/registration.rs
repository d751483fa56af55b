// Audible Chapters - chapter metadata client for the Audible API
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Device registration
//!
//! # API Endpoint
//! `POST {auth_base}/device/registerDevice`
//!
//! Headers: `User-Agent`, `Authorization: Bearer {access_token}`
//!
//! Request body (JSON):
//! ```json
//! {
//!   "app_name": "Audible",
//!   "app_version": "3.56.2",
//!   "device_model": "iPhone",
//!   "device_serial": "A2CZJZGLK2JJVM-3F9A01C2D4E5B6A7980F",
//!   "os_name": "iOS",
//!   "os_version": "15.0.0",
//!   "device_name": "Audible Chapters iPhone 2025-03-01",
//!   "software_version": "35602678",
//!   "device_type": "A2CZJZGLK2JJVM",
//!   "public_key": "-----BEGIN PUBLIC KEY-----\n..."
//! }
//! ```
//!
//! Response: JSON containing `adp_token`
//!
//! # Registration Flow
//! 1. `DeviceAuthenticator::authenticate()` → session access token
//! 2. `DeviceIdentity::generate()` → keypair + serial
//! 3. `DeviceRegistrar::register()` → ADP token
//! 4. Hand (ADP token, private key PEM) back to the caller for configuration

use crate::api::auth::{mask, Credentials, DeviceAuthenticator};
use crate::api::client::{endpoint, ClientConfig, HttpRequest, HttpTransport};
use crate::api::region::Region;
use crate::config::{escape_pem, DeviceCredentials};
use crate::crypto::device::{DeviceIdentity, DEVICE_TYPE};
use crate::error::{AudibleError, Result};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

pub const APP_NAME: &str = "Audible";
pub const APP_VERSION: &str = "3.56.2";
pub const DEVICE_MODEL: &str = "iPhone";
pub const OS_NAME: &str = "iOS";
pub const OS_VERSION: &str = "15.0.0";
pub const SOFTWARE_VERSION: &str = "35602678";

/// Device descriptor sent to the vendor
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub app_name: String,
    pub app_version: String,
    pub device_model: String,
    pub device_serial: String,
    pub os_name: String,
    pub os_version: String,
    pub device_name: String,
    pub software_version: String,
    pub device_type: String,
    pub public_key: String,
}

impl DeviceDescriptor {
    pub fn new(serial: &str, public_key_pem: String, registered_on: NaiveDate) -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            app_version: APP_VERSION.to_string(),
            device_model: DEVICE_MODEL.to_string(),
            device_serial: serial.to_string(),
            os_name: OS_NAME.to_string(),
            os_version: OS_VERSION.to_string(),
            device_name: device_name(registered_on),
            software_version: SOFTWARE_VERSION.to_string(),
            device_type: DEVICE_TYPE.to_string(),
            public_key: public_key_pem,
        }
    }
}

/// Display name shown in the user's device list
pub fn device_name(date: NaiveDate) -> String {
    format!("Audible Chapters {} {}", DEVICE_MODEL, date.format("%Y-%m-%d"))
}

/// Durable authorization for one device
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceRegistration {
    pub adp_token: String,
    pub device_serial: String,
}

impl fmt::Debug for DeviceRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceRegistration")
            .field("adp_token", &mask(&self.adp_token))
            .field("device_serial", &self.device_serial)
            .finish()
    }
}

#[derive(Deserialize)]
struct RegisterDeviceResponse {
    adp_token: Option<String>,
}

/// Registers device identities and remembers what it registered
pub struct DeviceRegistrar {
    transport: Arc<dyn HttpTransport>,
    config: ClientConfig,

    // serial -> ADP token; `None` while the registerDevice call is in flight
    registry: RwLock<HashMap<String, Option<String>>>,
}

impl DeviceRegistrar {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self::with_config(transport, ClientConfig::default())
    }

    pub fn with_config(transport: Arc<dyn HttpTransport>, config: ClientConfig) -> Self {
        Self {
            transport,
            config,
            registry: RwLock::new(HashMap::new()),
        }
    }

    /// Register `identity` and obtain its ADP token
    ///
    /// # Errors
    /// - `Registration` if this registrar already registered the serial, or is
    ///   registering it right now (generate a new identity instead)
    /// - `Registration` for any non-200 status, missing `adp_token`, or network failure
    /// - `Crypto` if the public key cannot be encoded
    pub async fn register(
        &self,
        access_token: &str,
        identity: &DeviceIdentity,
        region: &Region,
    ) -> Result<DeviceRegistration> {
        let serial = identity.serial_number();

        {
            let mut registry = self.registry.write().await;
            if registry.contains_key(serial) {
                return Err(AudibleError::registration(
                    None,
                    format!("device {} is already registered; generate a new identity", serial),
                ));
            }
            registry.insert(serial.to_string(), None);
        }

        match self.send_registration(access_token, identity, region).await {
            Ok(adp_token) => {
                self.registry
                    .write()
                    .await
                    .insert(serial.to_string(), Some(adp_token.clone()));

                tracing::info!(region = %region, serial = %serial, "Device registered");

                Ok(DeviceRegistration {
                    adp_token,
                    device_serial: serial.to_string(),
                })
            }
            Err(e) => {
                self.registry.write().await.remove(serial);
                Err(e)
            }
        }
    }

    async fn send_registration(
        &self,
        access_token: &str,
        identity: &DeviceIdentity,
        region: &Region,
    ) -> Result<String> {
        let serial = identity.serial_number();
        let descriptor =
            DeviceDescriptor::new(serial, identity.public_key_pem()?, Utc::now().date_naive());

        let url = endpoint(&self.config.auth_base(region)?, "/device/registerDevice");
        let request = HttpRequest::post(url)
            .header("User-Agent", self.config.user_agent.as_str())
            .header("Authorization", format!("Bearer {}", access_token))
            .header("Accept", "application/json")
            .json(&descriptor)?;

        tracing::debug!(region = %region, serial = %serial, "Registering device");

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| AudibleError::registration(None, e.to_string()))?;

        if !response.is_ok() {
            tracing::info!(serial = %serial, status = response.status, "Device registration rejected");
            return Err(AudibleError::registration(
                Some(response.status),
                format!("registerDevice returned HTTP {}", response.status),
            ));
        }

        let body: RegisterDeviceResponse = serde_json::from_slice(&response.body).map_err(|e| {
            AudibleError::registration(Some(response.status), format!("unreadable response: {}", e))
        })?;

        body.adp_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AudibleError::registration(Some(response.status), "response has no adp_token"))
    }

    /// Serials registered through this instance, sorted
    pub async fn registered_devices(&self) -> Vec<String> {
        let mut serials: Vec<String> = self
            .registry
            .read()
            .await
            .iter()
            .filter(|(_, token)| token.is_some())
            .map(|(serial, _)| serial.clone())
            .collect();
        serials.sort();
        serials
    }

    pub async fn adp_token_for(&self, serial: &str) -> Option<String> {
        self.registry.read().await.get(serial).cloned().flatten()
    }
}

/// Result record handed to the route or CLI layer
#[derive(Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOutcome {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub adp_token: Option<String>,

    /// Private key PEM with newlines escaped, ready for `PRIVATE_KEY=`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RegistrationOutcome {
    pub fn succeeded(credentials: &DeviceCredentials) -> Self {
        Self {
            success: true,
            adp_token: Some(credentials.adp_token.clone()),
            private_key: Some(escape_pem(&credentials.private_key_pem)),
            message: None,
        }
    }

    pub fn failed(error: &AudibleError) -> Self {
        Self {
            success: false,
            adp_token: None,
            private_key: None,
            message: Some(error.to_string()),
        }
    }
}

impl fmt::Debug for RegistrationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationOutcome")
            .field("success", &self.success)
            .field("adp_token", &self.adp_token.as_ref().map(|_| "<redacted>"))
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("message", &self.message)
            .finish()
    }
}

/// Authenticate, generate a device, register it, return the secret pair
///
/// # Errors
/// Whatever the first failing step returns: `Authentication`, `Crypto`, `Registration`
pub async fn authenticate_and_register(
    authenticator: &DeviceAuthenticator,
    registrar: &DeviceRegistrar,
    credentials: &Credentials,
) -> Result<DeviceCredentials> {
    let session = authenticator.authenticate(credentials).await?;
    let identity = DeviceIdentity::generate()?;
    let registration = registrar
        .register(&session.access_token, &identity, &credentials.region)
        .await?;

    Ok(DeviceCredentials {
        adp_token: registration.adp_token,
        private_key_pem: identity.private_key_pem()?,
    })
}

/// One-shot onboarding for route and CLI layers
///
/// Never fails: errors are folded into `success: false` with a message.
pub async fn register_new_device(
    transport: Arc<dyn HttpTransport>,
    config: ClientConfig,
    credentials: &Credentials,
) -> RegistrationOutcome {
    let authenticator = DeviceAuthenticator::with_config(transport.clone(), config.clone());
    let registrar = DeviceRegistrar::with_config(transport, config);

    match authenticate_and_register(&authenticator, &registrar, credentials).await {
        Ok(device) => RegistrationOutcome::succeeded(&device),
        Err(e) => {
            tracing::warn!(region = %credentials.region, error = %e, "Device onboarding failed");
            RegistrationOutcome::failed(&e)
        }
    }
}
