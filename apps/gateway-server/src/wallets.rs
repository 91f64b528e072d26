//! In-memory wallet endpoints exercising the response contract end to end.
//!
//! - `GET    /api/wallets?PageNumber=&PageSize=` paged listing
//! - `GET    /api/wallets/{id}`                  single wallet or not-found envelope
//! - `POST   /api/wallets`                       bound and gated creation
//! - `DELETE /api/wallets/{id}`                  removal answered with an Empty envelope

use std::sync::Arc;

use api_contract::{
    AcceptHeader, CountModel, Envelope, MediaType, NotFoundPolicy, Page, PageQuery, PageRequest,
    Reply, UntypedEnvelope,
};
use api_ingress::{validated, AppError, Bound};
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    response::Response,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub const MODULE_NAME: &str = "wallets";

const CONTENT_TYPES: [MediaType; 2] = [MediaType::Json, MediaType::Xml];

/// `modules.wallets` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct WalletsConfig {
    /// How a missing wallet is tagged on the wire.
    pub not_found: NotFoundPolicy,
    /// Upper bound on `PageSize`.
    pub max_page_size: i64,
    /// Owners to create a wallet for at startup.
    pub seed_owners: Vec<String>,
}

impl Default for WalletsConfig {
    fn default() -> Self {
        Self {
            not_found: NotFoundPolicy::Legacy,
            max_page_size: 100,
            seed_owners: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    #[serde(rename = "Id")]
    pub id: Uuid,
    #[serde(rename = "Owner")]
    pub owner: String,
    #[serde(rename = "Currency")]
    pub currency: String,
    #[serde(rename = "Balance")]
    pub balance: i64,
    #[serde(rename = "CreatedAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewWallet {
    #[serde(rename = "Owner")]
    #[validate(length(min = 1, max = 64, message = "Owner must be 1-64 characters"))]
    pub owner: String,
    #[serde(rename = "Currency")]
    #[validate(length(equal = 3, message = "Currency must be a 3-letter ISO code"))]
    pub currency: String,
    #[serde(rename = "OpeningBalance", default)]
    #[validate(range(min = 0, message = "Opening balance cannot be negative"))]
    pub opening_balance: i64,
}

/// Wallets in creation order.
#[derive(Default)]
pub struct WalletStore {
    wallets: RwLock<Vec<Wallet>>,
}

impl WalletStore {
    pub fn insert(&self, new: NewWallet) -> Wallet {
        let wallet = Wallet {
            id: Uuid::new_v4(),
            owner: new.owner,
            currency: new.currency.to_ascii_uppercase(),
            balance: new.opening_balance,
            created_at: Utc::now(),
        };
        self.wallets.write().push(wallet.clone());
        wallet
    }

    pub fn get(&self, id: Uuid) -> Option<Wallet> {
        self.wallets.read().iter().find(|w| w.id == id).cloned()
    }

    pub fn remove(&self, id: Uuid) -> bool {
        let mut wallets = self.wallets.write();
        let before = wallets.len();
        wallets.retain(|w| w.id != id);
        wallets.len() != before
    }

    pub fn page(&self, request: PageRequest) -> Page<Wallet> {
        Page::from_source(self.wallets.read().iter(), request).map_items(Wallet::clone)
    }

    pub fn len(&self) -> usize {
        self.wallets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.read().is_empty()
    }
}

#[derive(Clone)]
struct WalletsState {
    store: Arc<WalletStore>,
    config: Arc<WalletsConfig>,
}

pub fn router(store: Arc<WalletStore>, config: WalletsConfig) -> Router {
    for owner in &config.seed_owners {
        store.insert(NewWallet {
            owner: owner.clone(),
            currency: "EUR".to_string(),
            opening_balance: 0,
        });
    }
    tracing::debug!(module = MODULE_NAME, wallets = store.len(), "wallet routes ready");

    let state = WalletsState {
        store,
        config: Arc::new(config),
    };

    Router::new()
        .route(
            "/api/wallets",
            get(list_wallets).merge(validated::<NewWallet, WalletsState>(
                axum::routing::post(create_wallet),
            )),
        )
        .route("/api/wallets/{id}", get(get_wallet).delete(delete_wallet))
        .with_state(state)
}

async fn list_wallets(
    State(state): State<WalletsState>,
    query: Result<Query<PageQuery>, QueryRejection>,
    accept: AcceptHeader,
) -> Result<Response, AppError> {
    let Query(query) = query?;
    let request = PageRequest::try_from(query)?;
    if query.page_size > state.config.max_page_size {
        return Err(AppError::BadRequest(format!(
            "page size must be at most {} (got {})",
            state.config.max_page_size, query.page_size
        )));
    }

    let page = state.store.page(request);
    let body = if page.total_count() == 0 {
        CountModel::empty()
    } else {
        CountModel::from(page)
    };

    Ok(accept.respond(Reply::ok(Envelope::success_with(body)).with_content_types(CONTENT_TYPES)))
}

async fn get_wallet(
    State(state): State<WalletsState>,
    Path(id): Path<Uuid>,
    accept: AcceptHeader,
) -> Response {
    let reply = match state.store.get(id) {
        Some(wallet) => Reply::ok(Envelope::success_with(wallet)),
        None => Reply::not_found(Envelope::not_found_as(
            state.config.not_found,
            format!("Wallet {id} not found"),
        )),
    };
    accept.respond(reply.with_content_types(CONTENT_TYPES))
}

async fn create_wallet(
    State(state): State<WalletsState>,
    Bound(new): Bound<NewWallet>,
    accept: AcceptHeader,
) -> Response {
    let wallet = state.store.insert(new);
    tracing::info!(wallet_id = %wallet.id, owner = %wallet.owner, "wallet created");

    let envelope = if wallet.balance == 0 {
        Envelope::warning_with("Wallet created with a zero balance", wallet)
    } else {
        Envelope::success_with(wallet)
    };
    accept.respond(Reply::created(envelope).with_content_types(CONTENT_TYPES))
}

async fn delete_wallet(
    State(state): State<WalletsState>,
    Path(id): Path<Uuid>,
) -> Result<UntypedEnvelope, AppError> {
    if state.store.remove(id) {
        tracing::info!(wallet_id = %id, "wallet removed");
        Ok(UntypedEnvelope::empty())
    } else {
        Err(AppError::not_found_as(
            state.config.not_found,
            format!("Wallet {id} not found"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::Value;
    use tower::util::ServiceExt; // for `oneshot`

    fn seeded(n: usize) -> Arc<WalletStore> {
        let store = Arc::new(WalletStore::default());
        for i in 0..n {
            store.insert(NewWallet {
                owner: format!("owner-{i:03}"),
                currency: "eur".to_string(),
                opening_balance: i as i64,
            });
        }
        store
    }

    fn app(store: Arc<WalletStore>, config: WalletsConfig) -> Router {
        router(store, config)
    }

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_req(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/wallets")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn lists_third_page_of_95() {
        let (status, json) = call(
            app(seeded(95), WalletsConfig::default()),
            get_req("/api/wallets?PageNumber=3&PageSize=20"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ResultType"], 1);
        let data = &json["ResponseData"];
        assert_eq!(data["CurrentPage"], 3);
        assert_eq!(data["TotalPages"], 5);
        assert_eq!(data["PageSize"], 20);
        assert_eq!(data["TotalCount"], 95);
        assert_eq!(data["HasPrevious"], true);
        assert_eq!(data["HasNext"], true);
        let items = data["Items"].as_array().unwrap();
        assert_eq!(items.len(), 20);
        assert_eq!(items[0]["Owner"], "owner-040");
        assert_eq!(items[0]["Currency"], "EUR");
    }

    #[tokio::test]
    async fn default_paging_applies_without_query() {
        let (status, json) = call(
            app(seeded(12), WalletsConfig::default()),
            get_req("/api/wallets"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ResponseData"]["CurrentPage"], 1);
        assert_eq!(json["ResponseData"]["PageSize"], 10);
        assert_eq!(json["ResponseData"]["Items"].as_array().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn empty_store_lists_the_empty_count_model() {
        let (status, json) = call(
            app(seeded(0), WalletsConfig::default()),
            get_req("/api/wallets?PageNumber=1&PageSize=10"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ResponseData"]["TotalCount"], 0);
        assert_eq!(json["ResponseData"]["CurrentPage"], 0);
        assert_eq!(json["ResponseData"]["HasNext"], false);
    }

    #[tokio::test]
    async fn invalid_paging_is_rejected() {
        for uri in [
            "/api/wallets?PageSize=0",
            "/api/wallets?PageNumber=0",
            "/api/wallets?PageSize=1000",
        ] {
            let (status, json) = call(app(seeded(3), WalletsConfig::default()), get_req(uri)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(json["ResultType"], 2, "{uri}");
        }
    }

    #[tokio::test]
    async fn malformed_paging_query_is_a_validation_error() {
        for uri in ["/api/wallets?PageSize=abc", "/api/wallets?PageNumber=1.5"] {
            let (status, json) = call(app(seeded(3), WalletsConfig::default()), get_req(uri)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(json["ResultType"], 3, "{uri}");
            assert_eq!(json["ValidationMessages"].as_array().map(Vec::len), Some(1), "{uri}");
        }
    }

    #[tokio::test]
    async fn missing_wallet_follows_not_found_policy() {
        let uri = format!("/api/wallets/{}", Uuid::new_v4());

        let (status, json) = call(app(seeded(1), WalletsConfig::default()), get_req(&uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["ResultType"], 2);

        let distinct = WalletsConfig {
            not_found: NotFoundPolicy::Distinct,
            ..WalletsConfig::default()
        };
        let (status, json) = call(app(seeded(1), distinct), get_req(&uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["ResultType"], 5);
    }

    #[tokio::test]
    async fn creates_then_fetches_wallet() {
        let store = seeded(0);
        let (status, json) = call(
            app(store.clone(), WalletsConfig::default()),
            post_req(serde_json::json!({ "Owner": "ada", "Currency": "gbp", "OpeningBalance": 500 })),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["ResultType"], 1);
        assert_eq!(json["ResponseData"]["Currency"], "GBP");
        let id = json["ResponseData"]["Id"].as_str().unwrap().to_string();

        let (status, json) = call(
            app(store, WalletsConfig::default()),
            get_req(&format!("/api/wallets/{id}")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ResponseData"]["Balance"], 500);
    }

    #[tokio::test]
    async fn zero_opening_balance_is_a_warning() {
        let (status, json) = call(
            app(seeded(0), WalletsConfig::default()),
            post_req(serde_json::json!({ "Owner": "bob", "Currency": "USD" })),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["ResultType"], 4);
        assert_eq!(json["Message"], "Wallet created with a zero balance");
        assert_eq!(json["ResponseData"]["Owner"], "bob");
    }

    #[tokio::test]
    async fn invalid_wallet_is_rejected_by_the_gate() {
        let store = seeded(0);
        let (status, json) = call(
            app(store.clone(), WalletsConfig::default()),
            post_req(serde_json::json!({ "Owner": "", "Currency": "EURO", "OpeningBalance": -5 })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["ResultType"], 3);
        assert_eq!(
            json["ValidationMessages"],
            serde_json::json!([
                "Currency must be a 3-letter ISO code",
                "Opening balance cannot be negative",
                "Owner must be 1-64 characters"
            ])
        );
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn delete_answers_empty_then_not_found() {
        let store = seeded(1);
        let id = store.page(PageRequest::new(1, 1).unwrap()).items()[0].id;
        let uri = format!("/api/wallets/{id}");
        let delete = || {
            Request::builder()
                .method("DELETE")
                .uri(&uri)
                .body(Body::empty())
                .unwrap()
        };

        let (status, json) = call(app(store.clone(), WalletsConfig::default()), delete()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ResultType"], 6);

        let (status, json) = call(app(store, WalletsConfig::default()), delete()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["ResultType"], 2);
    }

    #[tokio::test]
    async fn delete_of_missing_wallet_follows_not_found_policy() {
        let distinct = WalletsConfig {
            not_found: NotFoundPolicy::Distinct,
            ..WalletsConfig::default()
        };
        let request = Request::builder()
            .method("DELETE")
            .uri(format!("/api/wallets/{}", Uuid::new_v4()))
            .body(Body::empty())
            .unwrap();

        let (status, json) = call(app(seeded(1), distinct), request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["ResultType"], 5);
        assert_eq!(json["Message"].as_str().map(|m| m.ends_with("not found")), Some(true));
    }

    #[test]
    fn seed_owners_are_created() {
        let store = Arc::new(WalletStore::default());
        let _ = router(
            store.clone(),
            WalletsConfig {
                seed_owners: vec!["treasury".into(), "ops".into()],
                ..WalletsConfig::default()
            },
        );
        assert_eq!(store.len(), 2);
    }
}
