use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use trove_domain::{escape_like, query::SearchQuery, strategy::Strategy};

use crate::{Result, models::ItemHit, vector_to_pg};

/// Per-strategy row cap. Ordering happens in the same query that filters, so
/// the cap always keeps the best-ranked rows.
pub const MAX_RESULTS: i64 = 20;

/// Owner identity as disclosed next to an item: the trimmed shipping-address
/// name, falling back to the local part of the claim email.
const OWNER_NAME: &str =
	"COALESCE(NULLIF(BTRIM(c.shipping_address->>'name'), ''), split_part(c.email, '@', 1))";

/// Run one cascade strategy. Which predicates apply is controlled by the
/// strategy flags; the three scores are computed for every candidate row
/// regardless and only drive the ordering.
pub async fn run_strategy(
	pool: &PgPool,
	query: &SearchQuery,
	strategy: Strategy,
	min_similarity: Option<f32>,
) -> Result<Vec<ItemHit>> {
	let keyword = query.keyword();
	let pattern = keyword.map(|keyword| format!("%{}%", escape_like(keyword)));
	let vec_text = query.embedding.as_deref().map(vector_to_pg);
	let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT ");

	push_item_columns(&mut qb);

	match pattern.as_deref() {
		Some(pattern) => {
			qb.push(", CASE WHEN ");
			push_lexical_predicate(&mut qb, pattern);
			qb.push(" THEN 1 ELSE 0 END AS text_boost");
		},
		None => {
			qb.push(", 0 AS text_boost");
		},
	}

	match keyword {
		Some(keyword) => {
			qb.push(", ");
			push_fuzzy_score(&mut qb, keyword);
			qb.push(" AS fuzzy_score");
		},
		None => {
			qb.push(", 0::real AS fuzzy_score");
		},
	}

	match vec_text.as_deref() {
		Some(vec_text) => {
			qb.push(", ");
			push_similarity_expr(&mut qb, vec_text);
			qb.push(" AS similarity");
		},
		None => {
			qb.push(", NULL::float8 AS similarity");
		},
	}

	push_from_and_scope(&mut qb, query);

	if strategy.lexical_filter
		&& let Some(pattern) = pattern.as_deref()
	{
		qb.push(" AND ");
		push_lexical_predicate(&mut qb, pattern);
	}
	if strategy.similarity_gate
		&& let (Some(vec_text), Some(threshold)) = (vec_text.as_deref(), min_similarity)
	{
		qb.push(" AND ");
		push_similarity_expr(&mut qb, vec_text);
		qb.push(" >= ");
		qb.push_bind(threshold);
	}

	qb.push(" ORDER BY text_boost DESC, fuzzy_score DESC NULLS LAST, similarity DESC NULLS LAST");

	// Recency breaks ties only when no embedding guided the search.
	if query.embedding.is_none() {
		qb.push(", fi.found_at DESC");
	}

	qb.push(" LIMIT ");
	qb.push_bind(MAX_RESULTS);

	Ok(qb.build_query_as().fetch_all(pool).await?)
}

/// Last-resort pass with an interleaved-wildcard pattern over the lexical
/// fields, ordered by recency alone.
pub async fn run_loose(pool: &PgPool, query: &SearchQuery, pattern: &str) -> Result<Vec<ItemHit>> {
	let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT ");

	push_item_columns(&mut qb);

	qb.push(", 0 AS text_boost, 0::real AS fuzzy_score, NULL::float8 AS similarity");

	push_from_and_scope(&mut qb, query);

	qb.push(" AND ");
	push_lexical_predicate(&mut qb, pattern);
	qb.push(" ORDER BY fi.found_at DESC LIMIT ");
	qb.push_bind(MAX_RESULTS);

	Ok(qb.build_query_as().fetch_all(pool).await?)
}

pub async fn fetch_item(
	pool: &PgPool,
	organization_id: Uuid,
	item_id: Uuid,
) -> Result<Option<ItemHit>> {
	let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT ");

	push_item_columns(&mut qb);

	qb.push(", 0 AS text_boost, 0::real AS fuzzy_score, NULL::float8 AS similarity \
		FROM found_items fi LEFT JOIN claims c ON c.item_id = fi.id WHERE fi.id = ");
	qb.push_bind(item_id);
	qb.push(" AND fi.organization_id = ");
	qb.push_bind(organization_id);

	Ok(qb.build_query_as().fetch_optional(pool).await?)
}

fn push_item_columns(qb: &mut QueryBuilder<'_, Postgres>) {
	qb.push(
		"fi.id, fi.organization_id, fi.record_number, fi.ocr_text, fi.tags, fi.location, \
		fi.found_at, fi.description, fi.description_score, fi.length_cm, fi.width_cm, \
		fi.height_cm, fi.weight_kg, fi.is_document, fi.created_at, \
		COALESCE(c.claim_initiated, FALSE) AS claim_initiated, \
		COALESCE(c.verified, FALSE) AS verified, \
		COALESCE(c.shipping_confirmed, FALSE) AS shipping_confirmed, \
		c.payment_status, \
		COALESCE(c.shipped, FALSE) AS shipped, \
		CASE WHEN COALESCE(c.verified, FALSE) THEN ",
	);
	qb.push(OWNER_NAME);
	qb.push(" END AS owner_name");
}

fn push_from_and_scope(qb: &mut QueryBuilder<'_, Postgres>, query: &SearchQuery) {
	qb.push(
		" FROM found_items fi LEFT JOIN claims c ON c.item_id = fi.id \
		WHERE fi.organization_id = ",
	);
	qb.push_bind(query.organization_id);

	if let Some(start) = query.start {
		qb.push(" AND fi.found_at >= ");
		qb.push_bind(start);
	}
	if let Some(end) = query.end {
		qb.push(" AND fi.found_at <= ");
		qb.push_bind(end);
	}
}

/// Substring predicate over every lexical field the engine matches against:
/// OCR text, tags, location, description, claim email, and the derived owner
/// name. `pattern` must already be escaped for `ESCAPE '\'`.
fn push_lexical_predicate(qb: &mut QueryBuilder<'_, Postgres>, pattern: &str) {
	qb.push("(fi.ocr_text ILIKE ");
	qb.push_bind(pattern.to_string());
	qb.push(" ESCAPE '\\' OR EXISTS (SELECT 1 FROM unnest(fi.tags) AS tag WHERE tag ILIKE ");
	qb.push_bind(pattern.to_string());
	qb.push(" ESCAPE '\\') OR fi.location ILIKE ");
	qb.push_bind(pattern.to_string());
	qb.push(" ESCAPE '\\' OR fi.description ILIKE ");
	qb.push_bind(pattern.to_string());
	qb.push(" ESCAPE '\\' OR c.email ILIKE ");
	qb.push_bind(pattern.to_string());
	qb.push(" ESCAPE '\\' OR ");
	qb.push(OWNER_NAME);
	qb.push(" ILIKE ");
	qb.push_bind(pattern.to_string());
	qb.push(" ESCAPE '\\')");
}

/// Best pairwise trigram similarity between the keyword and each lexical
/// field, with the best-matching tag standing in for the tag set.
fn push_fuzzy_score(qb: &mut QueryBuilder<'_, Postgres>, keyword: &str) {
	qb.push("GREATEST(similarity(fi.ocr_text, ");
	qb.push_bind(keyword.to_string());
	qb.push("), similarity(fi.description, ");
	qb.push_bind(keyword.to_string());
	qb.push("), similarity(fi.location, ");
	qb.push_bind(keyword.to_string());
	qb.push("), COALESCE(similarity(c.email, ");
	qb.push_bind(keyword.to_string());
	qb.push("), 0), COALESCE(similarity(");
	qb.push(OWNER_NAME);
	qb.push(", ");
	qb.push_bind(keyword.to_string());
	qb.push("), 0), COALESCE((SELECT max(similarity(tag, ");
	qb.push_bind(keyword.to_string());
	qb.push(")) FROM unnest(fi.tags) AS tag), 0))");
}

/// Vector similarity as the negated inner-product distance; higher means
/// more semantically similar.
fn push_similarity_expr(qb: &mut QueryBuilder<'_, Postgres>, vec_text: &str) {
	qb.push("-(fi.embedding <#> ");
	qb.push_bind(vec_text.to_string());
	qb.push("::text::vector)");
}
