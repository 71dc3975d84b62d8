//! End-to-end engine tests against a real Postgres with the `vector` and
//! `pg_trgm` extensions. Gated behind TROVE_PG_DSN.

use std::sync::Arc;

use serde_json::Map;
use time::macros::{date, datetime};
use uuid::Uuid;

use trove_config::{
	Config, EmbeddingProviderConfig, Postgres, Search, Security, Service, Storage,
};
use trove_domain::EMBEDDING_DIM;
use trove_service::{
	BoxFuture, EmbeddingProvider, Providers, SearchRequest, ServiceError, TroveService,
};
use trove_storage::{
	db::Db,
	models::{Claim, FoundItem},
	queries,
};
use trove_testkit::TestDatabase;

struct FailingProvider;

impl EmbeddingProvider for FailingProvider {
	fn embed_text<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		_text: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		Box::pin(async { Err(color_eyre::eyre::eyre!("embedding service unavailable")) })
	}
}

fn test_config(dsn: &str, min_similarity: Option<f32>) -> Config {
	Config {
		service: Service {
			http_bind: "127.0.0.1:0".to_string(),
			log_level: "info".to_string(),
		},
		storage: Storage {
			postgres: Postgres { dsn: dsn.to_string(), pool_max_conns: 1 },
		},
		providers: trove_config::Providers {
			embedding: EmbeddingProviderConfig {
				api_base: "http://127.0.0.1:1".to_string(),
				path: "/embed_text".to_string(),
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
		},
		search: Search { min_similarity },
		security: Security { jwt_secret: "test-secret".to_string(), bind_localhost_only: true },
	}
}

async fn service_for(test_db: &TestDatabase, min_similarity: Option<f32>) -> TroveService {
	let cfg = test_config(test_db.dsn(), min_similarity);
	let db = Db::connect(&cfg.storage.postgres).await.expect("Failed to connect to Postgres.");

	db.ensure_schema(EMBEDDING_DIM as u32).await.expect("Failed to ensure schema.");

	TroveService::with_providers(cfg, db, Providers::new(Arc::new(FailingProvider)))
}

fn unit_embedding(index: usize, scale: f32) -> Vec<f32> {
	let mut vec = vec![0.0; EMBEDDING_DIM];

	vec[index] = scale;

	vec
}

fn item(org: Uuid, ocr_text: &str, tags: &[&str], embedding: Vec<f32>) -> FoundItem {
	let id = Uuid::new_v4();

	FoundItem {
		id,
		organization_id: org,
		record_number: format!("LF-{}", id.simple()),
		ocr_text: ocr_text.to_string(),
		tags: tags.iter().map(|tag| tag.to_string()).collect(),
		embedding,
		location: "terminal 1 counter".to_string(),
		found_at: datetime!(2024-05-10 12:00 UTC),
		description: "handed in at the information desk".to_string(),
		description_score: 0.9,
		length_cm: None,
		width_cm: None,
		height_cm: None,
		weight_kg: None,
		is_document: false,
		created_at: datetime!(2024-05-10 12:05 UTC),
	}
}

fn claim(item_id: Uuid, email: &str, verified: bool, shipping_name: Option<&str>) -> Claim {
	Claim {
		id: Uuid::new_v4(),
		item_id,
		email: email.to_string(),
		token: None,
		token_expires: None,
		claim_initiated: true,
		verified,
		shipping_confirmed: false,
		payment_status: "unpaid".to_string(),
		shipped: false,
		shipping_address: shipping_name
			.map(|name| serde_json::json!({ "name": name, "country": "DE" })),
		created_at: datetime!(2024-05-11 09:00 UTC),
	}
}

fn keyword_request(keyword: &str) -> SearchRequest {
	SearchRequest { keyword: Some(keyword.to_string()), start_date: None, end_date: None, embedding: None }
}

fn embedding_request(embedding: Vec<f32>) -> SearchRequest {
	SearchRequest { keyword: None, start_date: None, end_date: None, embedding: Some(embedding) }
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set TROVE_PG_DSN to run."]
async fn exact_keyword_returns_the_matching_item() {
	let Some(base_dsn) = trove_testkit::env_dsn() else {
		eprintln!("Skipping; set TROVE_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let service = service_for(&test_db, None).await;
	let org = Uuid::new_v4();

	queries::insert_organization(&service.db, org, "Airport West").await.expect("seed org");

	let wallet = item(
		org,
		"black leather wallet found near gate 3",
		&["wallet"],
		unit_embedding(0, 1.0),
	);
	let umbrella = item(org, "red umbrella", &["umbrella"], unit_embedding(1, 1.0));

	queries::insert_found_item(&service.db, &wallet).await.expect("seed item");
	queries::insert_found_item(&service.db, &umbrella).await.expect("seed item");

	let results = service.search(org, keyword_request("Wallet")).await.expect("search failed");

	assert_eq!(results.len(), 1);
	assert_eq!(results[0].id, wallet.id);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set TROVE_PG_DSN to run."]
async fn organization_isolation_holds_for_every_strategy() {
	let Some(base_dsn) = trove_testkit::env_dsn() else {
		eprintln!("Skipping; set TROVE_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let service = service_for(&test_db, None).await;
	let org_a = Uuid::new_v4();
	let org_b = Uuid::new_v4();

	queries::insert_organization(&service.db, org_a, "Org A").await.expect("seed org");
	queries::insert_organization(&service.db, org_b, "Org B").await.expect("seed org");

	let wallet =
		item(org_a, "black leather wallet", &["wallet"], unit_embedding(0, 1.0));

	queries::insert_found_item(&service.db, &wallet).await.expect("seed item");

	// Lexical pass plus the loosened wildcard pass both stay scoped.
	let lexical = service.search(org_b, keyword_request("wallet")).await.expect("search failed");

	assert!(lexical.is_empty());

	// Semantic-only strategies stay scoped as well.
	let semantic = service
		.search(org_b, embedding_request(unit_embedding(0, 1.0)))
		.await
		.expect("search failed");

	assert!(semantic.is_empty());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set TROVE_PG_DSN to run."]
async fn embedding_orders_by_vector_similarity() {
	let Some(base_dsn) = trove_testkit::env_dsn() else {
		eprintln!("Skipping; set TROVE_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let service = service_for(&test_db, None).await;
	let org = Uuid::new_v4();

	queries::insert_organization(&service.db, org, "Org").await.expect("seed org");

	let close = item(org, "silver laptop", &["laptop"], unit_embedding(0, 1.0));
	let far = item(org, "blue backpack", &["backpack"], unit_embedding(1, 1.0));

	queries::insert_found_item(&service.db, &close).await.expect("seed item");
	queries::insert_found_item(&service.db, &far).await.expect("seed item");

	let mut query_embedding = vec![0.0; EMBEDDING_DIM];

	query_embedding[0] = 0.82;
	query_embedding[1] = 0.31;

	let results =
		service.search(org, embedding_request(query_embedding)).await.expect("search failed");

	assert_eq!(results.len(), 2);
	assert_eq!(results[0].id, close.id);
	assert_eq!(results[1].id, far.id);

	let top_similarity = results[0].similarity.expect("similarity missing");
	let second_similarity = results[1].similarity.expect("similarity missing");

	assert!((top_similarity - 0.82).abs() < 1e-3);
	assert!((second_similarity - 0.31).abs() < 1e-3);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set TROVE_PG_DSN to run."]
async fn misspelled_keyword_recovers_via_the_loosened_pass() {
	let Some(base_dsn) = trove_testkit::env_dsn() else {
		eprintln!("Skipping; set TROVE_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let service = service_for(&test_db, None).await;
	let org = Uuid::new_v4();

	queries::insert_organization(&service.db, org, "Org").await.expect("seed org");

	let wallet = item(
		org,
		"black leather wallet found near gate 3",
		&["wallet"],
		unit_embedding(0, 1.0),
	);

	queries::insert_found_item(&service.db, &wallet).await.expect("seed item");

	// No exact substring for the misspelling and no embedding available, so
	// only the interleaved wildcard pass can surface the item.
	let results = service.search(org, keyword_request("wallett")).await.expect("search failed");

	assert_eq!(results.len(), 1);
	assert_eq!(results[0].id, wallet.id);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set TROVE_PG_DSN to run."]
async fn similarity_gate_defers_low_scores_to_ungated_strategies() {
	let Some(base_dsn) = trove_testkit::env_dsn() else {
		eprintln!("Skipping; set TROVE_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let service = service_for(&test_db, Some(0.5)).await;
	let org = Uuid::new_v4();

	queries::insert_organization(&service.db, org, "Org").await.expect("seed org");

	let low = item(org, "silver laptop", &["laptop"], unit_embedding(0, 1.0));

	queries::insert_found_item(&service.db, &low).await.expect("seed item");

	// Similarity 0.3 is below the gate; the keyword matches nothing
	// lexically, so strategies A-C stay empty and D must surface the item.
	let mut request = embedding_request(unit_embedding(0, 0.3));

	request.keyword = Some("zzz".to_string());

	let results = service.search(org, request).await.expect("search failed");

	assert_eq!(results.len(), 1);
	assert_eq!(results[0].id, low.id);

	let similarity = results[0].similarity.expect("similarity missing");

	assert!(similarity < 0.5);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set TROVE_PG_DSN to run."]
async fn similarity_gate_keeps_high_scores_in_gated_strategies() {
	let Some(base_dsn) = trove_testkit::env_dsn() else {
		eprintln!("Skipping; set TROVE_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let service = service_for(&test_db, Some(0.5)).await;
	let org = Uuid::new_v4();

	queries::insert_organization(&service.db, org, "Org").await.expect("seed org");

	let high = item(org, "silver laptop", &["laptop"], unit_embedding(0, 1.0));
	let low = item(org, "blue backpack", &["backpack"], unit_embedding(1, 1.0));

	queries::insert_found_item(&service.db, &high).await.expect("seed item");
	queries::insert_found_item(&service.db, &low).await.expect("seed item");

	// 0.8 vs 0.2: the gated first strategy already yields the high-scoring
	// item, so the low one never appears.
	let mut query_embedding = vec![0.0; EMBEDDING_DIM];

	query_embedding[0] = 0.8;
	query_embedding[1] = 0.2;

	let results =
		service.search(org, embedding_request(query_embedding)).await.expect("search failed");

	assert_eq!(results.len(), 1);
	assert_eq!(results[0].id, high.id);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set TROVE_PG_DSN to run."]
async fn date_window_is_inclusive_of_whole_days() {
	let Some(base_dsn) = trove_testkit::env_dsn() else {
		eprintln!("Skipping; set TROVE_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let service = service_for(&test_db, None).await;
	let org = Uuid::new_v4();

	queries::insert_organization(&service.db, org, "Org").await.expect("seed org");

	let wallet = item(org, "black leather wallet", &["wallet"], unit_embedding(0, 1.0));

	queries::insert_found_item(&service.db, &wallet).await.expect("seed item");

	let mut inside = keyword_request("wallet");

	inside.start_date = Some(date!(2024 - 05 - 10));
	inside.end_date = Some(date!(2024 - 05 - 10));

	let results = service.search(org, inside).await.expect("search failed");

	assert_eq!(results.len(), 1);

	let mut outside = keyword_request("wallet");

	outside.start_date = Some(date!(2024 - 06 - 01));
	outside.end_date = Some(date!(2024 - 06 - 30));

	let results = service.search(org, outside).await.expect("search failed");

	assert!(results.is_empty());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set TROVE_PG_DSN to run."]
async fn owner_name_is_disclosed_only_for_verified_claims() {
	let Some(base_dsn) = trove_testkit::env_dsn() else {
		eprintln!("Skipping; set TROVE_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let service = service_for(&test_db, None).await;
	let org = Uuid::new_v4();

	queries::insert_organization(&service.db, org, "Org").await.expect("seed org");

	let verified_item =
		item(org, "black leather wallet", &["wallet"], unit_embedding(0, 1.0));
	let pending_item = item(org, "brown wallet", &["wallet"], unit_embedding(1, 1.0));

	queries::insert_found_item(&service.db, &verified_item).await.expect("seed item");
	queries::insert_found_item(&service.db, &pending_item).await.expect("seed item");
	queries::insert_claim(
		&service.db,
		&claim(verified_item.id, "anna@example.com", true, Some("  Anna Example ")),
	)
	.await
	.expect("seed claim");
	queries::insert_claim(&service.db, &claim(pending_item.id, "bob@example.com", false, None))
		.await
		.expect("seed claim");

	let results = service.search(org, keyword_request("wallet")).await.expect("search failed");

	assert_eq!(results.len(), 2);

	let verified_row = results.iter().find(|row| row.id == verified_item.id).expect("row");
	let pending_row = results.iter().find(|row| row.id == pending_item.id).expect("row");

	assert_eq!(verified_row.owner_name.as_deref(), Some("Anna Example"));
	assert!(verified_row.verified);
	assert_eq!(pending_row.owner_name, None);
	assert!(pending_row.claim_initiated);
	assert!(!pending_row.verified);
	assert_eq!(pending_row.payment_status.as_deref(), Some("unpaid"));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set TROVE_PG_DSN to run."]
async fn owner_name_falls_back_to_the_email_local_part() {
	let Some(base_dsn) = trove_testkit::env_dsn() else {
		eprintln!("Skipping; set TROVE_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let service = service_for(&test_db, None).await;
	let org = Uuid::new_v4();

	queries::insert_organization(&service.db, org, "Org").await.expect("seed org");

	let wallet = item(org, "black leather wallet", &["wallet"], unit_embedding(0, 1.0));

	queries::insert_found_item(&service.db, &wallet).await.expect("seed item");
	queries::insert_claim(&service.db, &claim(wallet.id, "carol@example.com", true, None))
		.await
		.expect("seed claim");

	let results = service.search(org, keyword_request("wallet")).await.expect("search failed");

	assert_eq!(results.len(), 1);
	assert_eq!(results[0].owner_name.as_deref(), Some("carol"));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set TROVE_PG_DSN to run."]
async fn first_non_empty_strategy_is_the_final_answer() {
	let Some(base_dsn) = trove_testkit::env_dsn() else {
		eprintln!("Skipping; set TROVE_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let service = service_for(&test_db, None).await;
	let org = Uuid::new_v4();

	queries::insert_organization(&service.db, org, "Org").await.expect("seed org");

	let wallet = item(org, "black leather wallet", &["wallet"], unit_embedding(0, 1.0));
	let umbrella = item(org, "red umbrella", &["umbrella"], unit_embedding(1, 1.0));

	queries::insert_found_item(&service.db, &wallet).await.expect("seed item");
	queries::insert_found_item(&service.db, &umbrella).await.expect("seed item");

	// The embedding points at the umbrella, but the lexical-filtered first
	// strategy already matches the wallet; looser semantic strategies never
	// run and the umbrella stays out of the response.
	let mut request = embedding_request(unit_embedding(1, 1.0));

	request.keyword = Some("wallet".to_string());

	let results = service.search(org, request).await.expect("search failed");

	assert_eq!(results.len(), 1);
	assert_eq!(results[0].id, wallet.id);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set TROVE_PG_DSN to run."]
async fn exhausted_cascade_returns_an_empty_list() {
	let Some(base_dsn) = trove_testkit::env_dsn() else {
		eprintln!("Skipping; set TROVE_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let service = service_for(&test_db, None).await;
	let org = Uuid::new_v4();

	queries::insert_organization(&service.db, org, "Org").await.expect("seed org");

	let results = service.search(org, keyword_request("wallet")).await.expect("search failed");

	assert!(results.is_empty());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set TROVE_PG_DSN to run."]
async fn fetch_item_is_scoped_to_the_caller_organization() {
	let Some(base_dsn) = trove_testkit::env_dsn() else {
		eprintln!("Skipping; set TROVE_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let service = service_for(&test_db, None).await;
	let org_a = Uuid::new_v4();
	let org_b = Uuid::new_v4();

	queries::insert_organization(&service.db, org_a, "Org A").await.expect("seed org");
	queries::insert_organization(&service.db, org_b, "Org B").await.expect("seed org");

	let wallet = item(org_a, "black leather wallet", &["wallet"], unit_embedding(0, 1.0));

	queries::insert_found_item(&service.db, &wallet).await.expect("seed item");

	let fetched = service.fetch_item(org_a, wallet.id).await.expect("fetch failed");

	assert_eq!(fetched.id, wallet.id);

	let foreign = service.fetch_item(org_b, wallet.id).await;

	assert!(matches!(foreign, Err(ServiceError::NotFound { .. })));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
