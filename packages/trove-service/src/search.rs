use time::{Date, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use trove_config::EmbeddingProviderConfig;
use trove_domain::{
	EMBEDDING_DIM,
	query::SearchQuery,
	strategy::{cascade_plan, loose_pattern},
};
use trove_storage::{models::ItemHit, search as store};

use crate::{Providers, ServiceError, ServiceResult, TroveService};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
	pub keyword: Option<String>,
	#[serde(default, with = "crate::date_serde")]
	pub start_date: Option<Date>,
	#[serde(default, with = "crate::date_serde")]
	pub end_date: Option<Date>,
	pub embedding: Option<Vec<f32>>,
}

/// One item as returned to the caller: the stored descriptive fields, the
/// merged claim status, and the vector similarity when one guided the
/// search. The raw embedding never leaves the store.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ItemRecord {
	pub id: Uuid,
	pub organization_id: Uuid,
	pub record_number: String,
	pub ocr_text: String,
	pub tags: Vec<String>,
	pub location: String,
	#[serde(with = "crate::time_serde")]
	pub found_at: OffsetDateTime,
	pub description: String,
	pub description_score: f32,
	pub length_cm: Option<f32>,
	pub width_cm: Option<f32>,
	pub height_cm: Option<f32>,
	pub weight_kg: Option<f32>,
	pub is_document: bool,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	pub claim_initiated: bool,
	pub verified: bool,
	pub shipping_confirmed: bool,
	pub payment_status: Option<String>,
	pub shipped: bool,
	pub owner_name: Option<String>,
	pub similarity: Option<f64>,
}

impl From<ItemHit> for ItemRecord {
	fn from(hit: ItemHit) -> Self {
		Self {
			id: hit.id,
			organization_id: hit.organization_id,
			record_number: hit.record_number,
			ocr_text: hit.ocr_text,
			tags: hit.tags,
			location: hit.location,
			found_at: hit.found_at,
			description: hit.description,
			description_score: hit.description_score,
			length_cm: hit.length_cm,
			width_cm: hit.width_cm,
			height_cm: hit.height_cm,
			weight_kg: hit.weight_kg,
			is_document: hit.is_document,
			created_at: hit.created_at,
			claim_initiated: hit.claim_initiated,
			verified: hit.verified,
			shipping_confirmed: hit.shipping_confirmed,
			payment_status: hit.payment_status,
			shipped: hit.shipped,
			owner_name: hit.owner_name,
			similarity: hit.similarity,
		}
	}
}

impl TroveService {
	/// Search the caller's organization for matching found items.
	///
	/// Strategies run strictly sequentially, loosest last; the first variant
	/// that yields rows is the final answer and later variants never run. An
	/// exhausted cascade is an empty list, not an error.
	pub async fn search(
		&self,
		organization_id: Uuid,
		req: SearchRequest,
	) -> ServiceResult<Vec<ItemRecord>> {
		let mut query = SearchQuery::normalize(
			organization_id,
			req.keyword.as_deref(),
			req.start_date,
			req.end_date,
			req.embedding,
		);

		resolve_query_embedding(&self.providers, &self.cfg.providers.embedding, &mut query).await;

		for strategy in cascade_plan(query.embedding.is_some()) {
			let hits = store::run_strategy(
				&self.db.pool,
				&query,
				*strategy,
				self.cfg.search.min_similarity,
			)
			.await?;

			debug!(?strategy, rows = hits.len(), "Search strategy executed.");

			if !hits.is_empty() {
				return Ok(assemble(hits));
			}
		}

		if query.embedding.is_none()
			&& let Some(pattern) = query.keyword().and_then(loose_pattern)
		{
			let hits = store::run_loose(&self.db.pool, &query, &pattern).await?;

			debug!(rows = hits.len(), "Loosened wildcard pass executed.");

			return Ok(assemble(hits));
		}

		Ok(Vec::new())
	}

	/// Fetch one item by id, scoped to the caller's organization.
	pub async fn fetch_item(
		&self,
		organization_id: Uuid,
		item_id: Uuid,
	) -> ServiceResult<ItemRecord> {
		let hit = store::fetch_item(&self.db.pool, organization_id, item_id).await?;

		hit.map(ItemRecord::from).ok_or_else(|| ServiceError::NotFound {
			message: format!("Item {item_id} does not exist in this organization."),
		})
	}
}

/// Fill in a missing query embedding from the text-embedding collaborator.
/// Resolution failure is absorbed here: the search degrades to lexical and
/// fuzzy matching instead of failing.
pub(crate) async fn resolve_query_embedding(
	providers: &Providers,
	cfg: &EmbeddingProviderConfig,
	query: &mut SearchQuery,
) {
	if query.embedding.is_some() {
		return;
	}

	let Some(keyword) = query.keyword() else {
		return;
	};

	match providers.embedding.embed_text(cfg, keyword).await {
		Ok(vec) if vec.len() == EMBEDDING_DIM => {
			query.embedding = Some(vec);
		},
		Ok(vec) => {
			warn!(
				dimensions = vec.len(),
				"Embedding service returned unexpected dimensionality; searching without an embedding."
			);
		},
		Err(err) => {
			warn!(error = %err, "Embedding resolution failed; searching without an embedding.");
		},
	}
}

fn assemble(hits: Vec<ItemHit>) -> Vec<ItemRecord> {
	hits.into_iter().map(ItemRecord::from).collect()
}
