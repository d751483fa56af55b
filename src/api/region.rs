//! Marketplace catalog
//!
//! Each supported Audible storefront is described by a [`Region`]: the hosts it
//! talks to, the parameters the vendor expects on authentication, and the
//! localized noun used when a chapter title is a bare number.
//!
//! The set is closed. Asking for a code outside of it is a configuration
//! error rather than a silent fallback to the US store.

use crate::error::{AudibleError, Result};
use serde::Serialize;
use std::fmt;

/// Marketplace descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Region {
    /// Short code used in configuration (e.g. "us", "uk")
    pub code: &'static str,

    /// Human readable storefront name
    pub name: &'static str,

    /// Audible domain for the storefront (e.g. "audible.co.uk")
    pub domain: &'static str,

    /// Amazon domain hosting the auth endpoints (e.g. "amazon.co.uk")
    pub amazon_domain: &'static str,

    /// Marketplace identifier
    pub marketplace_id: &'static str,

    /// BCP 47 language tag of the storefront
    pub language: &'static str,

    /// Value sent as `auth_country` on token exchange
    pub auth_country: &'static str,

    /// Localized word for "Chapter"
    pub chapter_noun: &'static str,
}

const US: Region = Region {
    code: "us",
    name: "United States",
    domain: "audible.com",
    amazon_domain: "amazon.com",
    marketplace_id: "AF2M0KC94RCEA",
    language: "en-US",
    auth_country: "US",
    chapter_noun: "Chapter",
};

const UK: Region = Region {
    code: "uk",
    name: "United Kingdom",
    domain: "audible.co.uk",
    amazon_domain: "amazon.co.uk",
    marketplace_id: "A2I9A3Q2GNFNGQ",
    language: "en-GB",
    auth_country: "GB",
    chapter_noun: "Chapter",
};

const CA: Region = Region {
    code: "ca",
    name: "Canada",
    domain: "audible.ca",
    amazon_domain: "amazon.ca",
    marketplace_id: "A2CQZ5RBY40XE",
    language: "en-CA",
    auth_country: "CA",
    chapter_noun: "Chapter",
};

const AU: Region = Region {
    code: "au",
    name: "Australia",
    domain: "audible.com.au",
    amazon_domain: "amazon.com.au",
    marketplace_id: "AN7EY7DTAW63G",
    language: "en-AU",
    auth_country: "AU",
    chapter_noun: "Chapter",
};

const FR: Region = Region {
    code: "fr",
    name: "France",
    domain: "audible.fr",
    amazon_domain: "amazon.fr",
    marketplace_id: "A2728XDNODOQ8T",
    language: "fr-FR",
    auth_country: "FR",
    chapter_noun: "Chapitre",
};

const DE: Region = Region {
    code: "de",
    name: "Germany",
    domain: "audible.de",
    amazon_domain: "amazon.de",
    marketplace_id: "AN7V1F1VY261K",
    language: "de-DE",
    auth_country: "DE",
    chapter_noun: "Kapitel",
};

const JP: Region = Region {
    code: "jp",
    name: "Japan",
    domain: "audible.co.jp",
    amazon_domain: "amazon.co.jp",
    marketplace_id: "A1QAP3MOU4173J",
    language: "ja-JP",
    auth_country: "JP",
    chapter_noun: "チャプター",
};

const IT: Region = Region {
    code: "it",
    name: "Italy",
    domain: "audible.it",
    amazon_domain: "amazon.it",
    marketplace_id: "A2N7FU2W2BU2ZC",
    language: "it-IT",
    auth_country: "IT",
    chapter_noun: "Capitolo",
};

const IN: Region = Region {
    code: "in",
    name: "India",
    domain: "audible.in",
    amazon_domain: "amazon.in",
    marketplace_id: "AJO3FBRUE6J4S",
    language: "en-IN",
    auth_country: "IN",
    chapter_noun: "Chapter",
};

const ES: Region = Region {
    code: "es",
    name: "Spain",
    domain: "audible.es",
    amazon_domain: "amazon.es",
    marketplace_id: "ALMIKO4SZCSAR",
    language: "es-ES",
    auth_country: "ES",
    chapter_noun: "Capítulo",
};

const ALL: [Region; 10] = [US, UK, CA, AU, FR, DE, JP, IT, IN, ES];

impl Region {
    pub fn us() -> Self {
        US
    }

    pub fn uk() -> Self {
        UK
    }

    pub fn ca() -> Self {
        CA
    }

    pub fn au() -> Self {
        AU
    }

    pub fn fr() -> Self {
        FR
    }

    pub fn de() -> Self {
        DE
    }

    pub fn jp() -> Self {
        JP
    }

    pub fn it() -> Self {
        IT
    }

    pub fn india() -> Self {
        IN
    }

    pub fn es() -> Self {
        ES
    }

    /// Every supported marketplace, in catalog order
    pub fn all() -> &'static [Region] {
        &ALL
    }

    /// Look up a region by its short code (case-insensitive)
    ///
    /// # Errors
    /// `UnknownRegion` if the code is not part of the catalog
    pub fn from_code(code: &str) -> Result<Self> {
        let wanted = code.trim().to_ascii_lowercase();
        ALL.iter()
            .copied()
            .find(|region| region.code == wanted)
            .ok_or_else(|| AudibleError::UnknownRegion(code.to_string()))
    }

    /// Base URL for the content API (e.g. `https://api.audible.com`)
    pub fn api_url(&self) -> String {
        format!("https://api.{}", self.domain)
    }

    /// Base URL for token exchange and device registration
    pub fn auth_url(&self) -> String {
        format!("https://api.{}", self.amazon_domain)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code)
    }
}

impl std::str::FromStr for Region {
    type Err = AudibleError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_code(s)
    }
}
