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


//! Chapter metadata: raw payload, normalized records, title cleanup
//!
//! # Response shape
//! `GET /1.0/content/{asin}/metadata?response_groups=chapter_info&quality=High`
//! ```json
//! {
//!   "content_metadata": {
//!     "chapter_info": {
//!       "brandIntroDurationMs": 2043,
//!       "brandOutroDurationMs": 5062,
//!       "chapters": [
//!         { "length_ms": 1563210, "start_offset_ms": 31834, "start_offset_sec": 32, "title": "1" }
//!       ],
//!       "is_accurate": true,
//!       "runtime_length_ms": 5164000,
//!       "runtime_length_sec": 5164
//!     }
//!   },
//!   "response_groups": ["always-returned", "chapter_info"]
//! }
//! ```
//!
//! The schema is not contractually stable, so the payload is kept as an
//! opaque JSON value until [`normalize`] checks the keys it relies on.

use crate::api::region::Region;
use crate::error::{AudibleError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

lazy_static! {
    static ref NUMERIC_TITLE: Regex = Regex::new(r"^[0-9]+$").expect("valid regex");
}

/// Unvalidated vendor response
#[derive(Debug, Clone, PartialEq)]
pub struct RawChapterPayload(serde_json::Value);

impl RawChapterPayload {
    pub fn from_value(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn from_slice(body: &[u8]) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_slice(body).map(Self)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_value(self) -> serde_json::Value {
        self.0
    }
}

/// One normalized chapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRecord {
    pub title: String,
    pub start_offset_ms: u64,
    pub length_ms: u64,

    /// Nested sub-chapters, when the vendor returns a tree
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chapters: Vec<ChapterRecord>,
}

impl ChapterRecord {
    pub fn end_offset_ms(&self) -> u64 {
        self.start_offset_ms.saturating_add(self.length_ms)
    }
}

/// Normalized chapter listing for one item, in vendor order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterSet {
    pub item_id: String,
    pub region: String,
    pub runtime_length_ms: Option<u64>,
    pub runtime_length_sec: Option<u64>,
    pub is_accurate: Option<bool>,
    pub brand_intro_duration_ms: Option<u64>,
    pub brand_outro_duration_ms: Option<u64>,
    pub chapters: Vec<ChapterRecord>,
}

impl ChapterSet {
    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    /// Runtime in milliseconds, falling back to the end of the last chapter
    pub fn total_runtime(&self) -> u64 {
        self.runtime_length_ms.unwrap_or_else(|| {
            self.chapters
                .last()
                .map(ChapterRecord::end_offset_ms)
                .unwrap_or(0)
        })
    }
}

#[derive(Deserialize)]
struct RawChapter {
    #[serde(default)]
    title: Option<String>,
    start_offset_ms: u64,
    length_ms: u64,
    #[serde(default)]
    chapters: Option<Vec<RawChapter>>,
}

#[derive(Deserialize)]
struct RawTotals {
    #[serde(default, deserialize_with = "lenient_u64")]
    runtime_length_ms: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    runtime_length_sec: Option<u64>,
    #[serde(default)]
    is_accurate: Option<bool>,
    #[serde(default, rename = "brandIntroDurationMs", deserialize_with = "lenient_u64")]
    brand_intro_duration_ms: Option<u64>,
    #[serde(default, rename = "brandOutroDurationMs", deserialize_with = "lenient_u64")]
    brand_outro_duration_ms: Option<u64>,
}

// Totals are informational: floats are rounded, numeric strings parsed, and
// anything else is dropped instead of failing the item.
fn lenient_u64<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(u64_from_value))
}

fn u64_from_value(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(u64_from_float)),
        serde_json::Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(u64_from_float))
        }
        _ => None,
    }
}

fn u64_from_float(f: f64) -> Option<u64> {
    (f.is_finite() && f >= 0.0 && f <= u64::MAX as f64).then(|| f.round() as u64)
}

/// Clean one chapter title for `region`
///
/// - all ASCII digits: `"{noun} {digits}"`, nothing else applied
/// - otherwise: underscores become spaces, then one trailing period is dropped
pub fn clean_title(raw: &str, region: &Region) -> String {
    if NUMERIC_TITLE.is_match(raw) {
        return format!("{} {}", region.chapter_noun, raw);
    }

    let spaced = raw.replace('_', " ");
    match spaced.strip_suffix('.') {
        Some(stripped) => stripped.to_string(),
        None => spaced,
    }
}

/// Validate a raw payload and produce the normalized listing
///
/// # Errors
/// - `Validation` naming `content_metadata`, `chapter_info` or `chapters`,
///   whichever is the first missing key
/// - `MalformedPayload` if `chapters` is present but not a chapter list
pub fn normalize(payload: &RawChapterPayload, item_id: &str, region: &Region) -> Result<ChapterSet> {
    let metadata = required(payload.as_value(), "content_metadata", item_id)?;
    let info = required(metadata, "chapter_info", item_id)?;
    let chapters = required(info, "chapters", item_id)?;

    let raw_chapters: Vec<RawChapter> =
        serde_json::from_value(chapters.clone()).map_err(|e| AudibleError::MalformedPayload {
            item_id: item_id.to_string(),
            message: format!("chapters: {}", e),
        })?;

    let totals: RawTotals =
        serde_json::from_value(info.clone()).map_err(|e| AudibleError::MalformedPayload {
            item_id: item_id.to_string(),
            message: format!("chapter_info: {}", e),
        })?;

    Ok(ChapterSet {
        item_id: item_id.to_string(),
        region: region.code.to_string(),
        runtime_length_ms: totals.runtime_length_ms,
        runtime_length_sec: totals.runtime_length_sec,
        is_accurate: totals.is_accurate,
        brand_intro_duration_ms: totals.brand_intro_duration_ms,
        brand_outro_duration_ms: totals.brand_outro_duration_ms,
        chapters: convert(raw_chapters, region),
    })
}

fn required<'a>(
    value: &'a serde_json::Value,
    key: &str,
    item_id: &str,
) -> Result<&'a serde_json::Value> {
    value
        .get(key)
        .filter(|v| !v.is_null())
        .ok_or_else(|| AudibleError::validation(key, item_id))
}

fn convert(raw: Vec<RawChapter>, region: &Region) -> Vec<ChapterRecord> {
    raw.into_iter()
        .map(|chapter| ChapterRecord {
            title: clean_title(chapter.title.as_deref().unwrap_or_default(), region),
            start_offset_ms: chapter.start_offset_ms,
            length_ms: chapter.length_ms,
            chapters: convert(chapter.chapters.unwrap_or_default(), region),
        })
        .collect()
}
