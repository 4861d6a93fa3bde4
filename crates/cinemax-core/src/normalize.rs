//! Mapping of raw staging rows into canonical records.
//!
//! Normalization is pure: no I/O, and no input can make it fail. Fields the
//! upstream catalog left empty or malformed degrade to their defaults.

use chrono::{Datelike, NaiveDate};
use tracing::trace;

use crate::defaults::{OVERVIEW_PLACEHOLDER, POSTER_BASE_URL, RATING_MAX};
use crate::models::{CanonicalRecord, RawRecord};

/// Format of `release_date` in the staging relation.
pub const RELEASE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Builds the embedding input for a movie.
///
/// Stored embeddings are only comparable while this template is unchanged.
pub fn embedding_text(title: &str, overview: &str) -> String {
    format!("Movie Title: {}. Overview: {}", title, overview)
}

/// Year of a strictly formatted `YYYY-MM-DD` date, or `None`.
///
/// The shape is checked before calling chrono because `%Y` also accepts
/// signed and shorter years.
pub fn parse_release_year(date: &str) -> Option<i32> {
    let bytes = date.as_bytes();
    let shaped = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !shaped {
        return None;
    }

    NaiveDate::parse_from_str(date, RELEASE_DATE_FORMAT)
        .ok()
        .map(|d| d.year())
        .filter(|year| (1000..=9999).contains(year))
}

/// Round a vote average to one decimal place.
///
/// The value is clamped to `[0.0, 10.0]`, multiplied by ten and rounded half
/// away from zero, so `7.25` becomes `7.3`. Absent and non-finite values give
/// `0.0`.
pub fn round_rating(vote_average: Option<f64>) -> f64 {
    match vote_average {
        Some(v) if v.is_finite() => (v.clamp(0.0, RATING_MAX) * 10.0).round() / 10.0,
        _ => 0.0,
    }
}

/// Converts staging rows into canonical records.
#[derive(Debug, Clone)]
pub struct RecordNormalizer {
    poster_base_url: String,
}

impl Default for RecordNormalizer {
    fn default() -> Self {
        Self::new(POSTER_BASE_URL)
    }
}

impl RecordNormalizer {
    /// Create a normalizer that builds poster URLs from `poster_base_url`.
    pub fn new(poster_base_url: impl Into<String>) -> Self {
        Self {
            poster_base_url: poster_base_url.into(),
        }
    }

    pub fn poster_base_url(&self) -> &str {
        &self.poster_base_url
    }

    /// Normalize one staging row.
    pub fn normalize(&self, raw: &RawRecord) -> CanonicalRecord {
        let title = raw.title.clone().unwrap_or_default();
        let overview = raw
            .overview
            .clone()
            .filter(|o| !o.is_empty())
            .unwrap_or_else(|| OVERVIEW_PLACEHOLDER.to_string());

        let release_year = raw.release_date.as_deref().and_then(parse_release_year);
        if release_year.is_none() {
            if let Some(date) = raw.release_date.as_deref() {
                trace!(movie_id = raw.id, release_date = date, "Unparseable release date");
            }
        }

        let poster_url = raw
            .poster_path
            .as_deref()
            .filter(|path| !path.is_empty())
            .map(|path| format!("{}{}", self.poster_base_url, path));

        let embedding_text = embedding_text(&title, &overview);

        CanonicalRecord {
            id: raw.id,
            title,
            overview,
            release_year,
            rating: round_rating(raw.vote_average),
            poster_url,
            embedding_text,
        }
    }

    /// Normalize a batch, returning records and embedding texts as parallel
    /// vectors in input order.
    pub fn normalize_all(&self, raws: &[RawRecord]) -> (Vec<CanonicalRecord>, Vec<String>) {
        let records: Vec<CanonicalRecord> = raws.iter().map(|raw| self.normalize(raw)).collect();
        let texts = records.iter().map(|r| r.embedding_text.clone()).collect();
        (records, texts)
    }
}
