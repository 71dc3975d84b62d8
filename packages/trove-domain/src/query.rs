use time::{Date, OffsetDateTime, macros::time};
use uuid::Uuid;

use crate::EMBEDDING_DIM;

/// Canonical, request-scoped form of a search. Built once per request and
/// discarded with the response.
#[derive(Debug, Clone)]
pub struct SearchQuery {
	/// Always taken from the caller identity, never from the request body.
	pub organization_id: Uuid,
	/// Trimmed and lower-cased; `None` when blank.
	pub keyword: Option<String>,
	pub start: Option<OffsetDateTime>,
	pub end: Option<OffsetDateTime>,
	/// Present only when exactly [`EMBEDDING_DIM`] values were supplied or
	/// resolved.
	pub embedding: Option<Vec<f32>>,
}

impl SearchQuery {
	pub fn normalize(
		organization_id: Uuid,
		keyword: Option<&str>,
		start_date: Option<Date>,
		end_date: Option<Date>,
		embedding: Option<Vec<f32>>,
	) -> Self {
		let keyword = keyword
			.map(|raw| raw.trim().to_lowercase())
			.filter(|normalized| !normalized.is_empty());
		let embedding = embedding.filter(|vec| vec.len() == EMBEDDING_DIM);

		Self {
			organization_id,
			keyword,
			start: start_date.map(day_start),
			end: end_date.map(day_end),
			embedding,
		}
	}

	pub fn keyword(&self) -> Option<&str> {
		self.keyword.as_deref()
	}
}

/// Inclusive lower bound of a whole-day window.
pub fn day_start(date: Date) -> OffsetDateTime {
	date.midnight().assume_utc()
}

/// Inclusive upper bound of a whole-day window, millisecond precision to
/// match the store's timestamp domain.
pub fn day_end(date: Date) -> OffsetDateTime {
	date.with_time(time!(23:59:59.999)).assume_utc()
}
