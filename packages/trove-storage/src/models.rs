use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

/// A logged found item. Written by the ingestion collaborator; the search
/// engine only reads it, and `organization_id` never changes after creation.
#[derive(Debug, Clone)]
pub struct FoundItem {
	pub id: Uuid,
	pub organization_id: Uuid,
	pub record_number: String,
	pub ocr_text: String,
	pub tags: Vec<String>,
	pub embedding: Vec<f32>,
	pub location: String,
	pub found_at: OffsetDateTime,
	pub description: String,
	pub description_score: f32,
	pub length_cm: Option<f32>,
	pub width_cm: Option<f32>,
	pub height_cm: Option<f32>,
	pub weight_kg: Option<f32>,
	pub is_document: bool,
	pub created_at: OffsetDateTime,
}

/// The zero-or-one claim attached to an item. The token columns belong to the
/// claim-verification collaborator and are never read here.
#[derive(Debug, Clone)]
pub struct Claim {
	pub id: Uuid,
	pub item_id: Uuid,
	pub email: String,
	pub token: Option<String>,
	pub token_expires: Option<OffsetDateTime>,
	pub claim_initiated: bool,
	pub verified: bool,
	pub shipping_confirmed: bool,
	pub payment_status: String,
	pub shipped: bool,
	pub shipping_address: Option<Value>,
	pub created_at: OffsetDateTime,
}

/// One candidate row as returned by a strategy query: item columns, merged
/// claim status, and the ranking scores computed alongside.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ItemHit {
	pub id: Uuid,
	pub organization_id: Uuid,
	pub record_number: String,
	pub ocr_text: String,
	pub tags: Vec<String>,
	pub location: String,
	pub found_at: OffsetDateTime,
	pub description: String,
	pub description_score: f32,
	pub length_cm: Option<f32>,
	pub width_cm: Option<f32>,
	pub height_cm: Option<f32>,
	pub weight_kg: Option<f32>,
	pub is_document: bool,
	pub created_at: OffsetDateTime,
	pub claim_initiated: bool,
	pub verified: bool,
	pub shipping_confirmed: bool,
	pub payment_status: Option<String>,
	pub shipped: bool,
	/// Disclosed only for verified claims; NULL otherwise.
	pub owner_name: Option<String>,
	pub text_boost: i32,
	pub fuzzy_score: f32,
	pub similarity: Option<f64>,
}
