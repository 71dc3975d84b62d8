use crate::{
	Result, db::Db,
	models::{Claim, FoundItem},
	vector_to_pg,
};

pub async fn insert_organization(db: &Db, id: uuid::Uuid, name: &str) -> Result<()> {
	sqlx::query("INSERT INTO organizations (id, name) VALUES ($1, $2)")
		.bind(id)
		.bind(name)
		.execute(&db.pool)
		.await?;

	Ok(())
}

pub async fn insert_found_item(db: &Db, item: &FoundItem) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO found_items (
	id,
	organization_id,
	record_number,
	ocr_text,
	tags,
	embedding,
	location,
	found_at,
	description,
	description_score,
	length_cm,
	width_cm,
	height_cm,
	weight_kg,
	is_document,
	created_at
)
VALUES ($1,$2,$3,$4,$5,$6::text::vector,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16)",
	)
	.bind(item.id)
	.bind(item.organization_id)
	.bind(item.record_number.as_str())
	.bind(item.ocr_text.as_str())
	.bind(&item.tags)
	.bind(vector_to_pg(&item.embedding))
	.bind(item.location.as_str())
	.bind(item.found_at)
	.bind(item.description.as_str())
	.bind(item.description_score)
	.bind(item.length_cm)
	.bind(item.width_cm)
	.bind(item.height_cm)
	.bind(item.weight_kg)
	.bind(item.is_document)
	.bind(item.created_at)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn insert_claim(db: &Db, claim: &Claim) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO claims (
	id,
	item_id,
	email,
	token,
	token_expires,
	claim_initiated,
	verified,
	shipping_confirmed,
	payment_status,
	shipped,
	shipping_address,
	created_at
)
VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)",
	)
	.bind(claim.id)
	.bind(claim.item_id)
	.bind(claim.email.as_str())
	.bind(claim.token.as_deref())
	.bind(claim.token_expires)
	.bind(claim.claim_initiated)
	.bind(claim.verified)
	.bind(claim.shipping_confirmed)
	.bind(claim.payment_status.as_str())
	.bind(claim.shipped)
	.bind(claim.shipping_address.as_ref())
	.bind(claim.created_at)
	.execute(&db.pool)
	.await?;

	Ok(())
}
