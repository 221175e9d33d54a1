//! # HTTP Routes
//!
//! ```text
//! POST /sales                           create a sale      → 201 {sale}
//! POST /sales/{id}/cancel               cancel a sale      → 200 {message}
//! GET  /sales?limit=                    recent sales
//! GET  /sales/{id}                      sale detail
//! POST /products/{id}/stock-movements   manual movement    → 201 StockChange
//! GET  /products/{id}/stock-movements   movement history
//! GET  /health                          SELECT 1
//! ```
//!
//! The operator is taken from the `x-operator-id` header.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::ApiError;
use crate::AppState;
use paws_core::costing::StockChange;
use paws_core::validation::{normalize_limit, validate_movement};
use paws_core::{Money, MovementType, Sale, StockMovement};
use paws_db::{CreateSaleRequest, SaleDetail};

/// Header carrying the authenticated operator's user ID.
pub const OPERATOR_HEADER: &str = "x-operator-id";

/// `?limit=` on list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
}

/// Body of a manual stock movement.
#[derive(Debug, Deserialize)]
pub struct StockMovementBody {
    pub movement_type: MovementType,
    pub quantity: i64,
    pub unit_cost: Option<Money>,
    pub notes: Option<String>,
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::validation(rejection.body_text()))
}

pub async fn create_sale(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateSaleRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let request = json_body(payload)?;
    let operator = headers.get(OPERATOR_HEADER).and_then(|v| v.to_str().ok());

    debug!(lines = request.items.len(), operator, "create_sale request");

    let created = state.engine.create_sale(request, operator).await?;

    Ok((StatusCode::CREATED, Json(json!({ "sale": created }))))
}

pub async fn cancel_sale(
    State(state): State<AppState>,
    Path(sale_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let cancelled = state.engine.cancel_sale(&sale_id).await?;

    Ok(Json(json!({
        "message": format!("Sale #{} cancelled", cancelled.sale_number)
    })))
}

pub async fn list_sales(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Sale>>, ApiError> {
    let sales = state.db.sales().list_recent(normalize_limit(params.limit)).await?;
    Ok(Json(sales))
}

pub async fn get_sale(
    State(state): State<AppState>,
    Path(sale_id): Path<String>,
) -> Result<Json<SaleDetail>, ApiError> {
    state
        .db
        .sales()
        .get_detail(&sale_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Sale", &sale_id))
}

pub async fn record_stock_movement(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    payload: Result<Json<StockMovementBody>, JsonRejection>,
) -> Result<(StatusCode, Json<StockChange>), ApiError> {
    let body = json_body(payload)?;
    validate_movement(body.movement_type, body.quantity, body.unit_cost.map(|c| c.cents()))?;

    let change = state
        .db
        .inventory()
        .record_manual(
            &product_id,
            body.movement_type,
            body.quantity,
            body.unit_cost,
            body.notes.as_deref(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(change)))
}

pub async fn stock_movements(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<StockMovement>>, ApiError> {
    let movements = state
        .db
        .inventory()
        .history(&product_id, normalize_limit(params.limit))
        .await?;
    Ok(Json(movements))
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    if state.db.health_check().await {
        (StatusCode::OK, Json(json!({ "status": "ok" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable" })),
        )
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use chrono::Utc;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::{router, AppState};
    use paws_core::Product;
    use paws_db::{Database, DbConfig, OperatorPolicy};

    struct Fixture {
        app: Router,
        db: Database,
        user_id: String,
        product_id: String,
    }

    async fn fixture(policy: OperatorPolicy) -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let user_id = db.settings().insert_user("Owner").await.unwrap();

        let now = Utc::now();
        let product = db
            .products()
            .insert(&Product {
                id: "prod-a".to_string(),
                sku: "FOOD-A".to_string(),
                name: "Dog food 1kg".to_string(),
                price_cents: 5000,
                cost_price_cents: 3000,
                last_cost_cents: None,
                stock_quantity: 10,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        let app = router(AppState::new(db.clone(), policy));
        Fixture {
            app,
            db,
            user_id,
            product_id: product.id,
        }
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn cart(product_id: &str) -> Value {
        json!({
            "items": [{ "product_id": product_id, "quantity": 2, "unit_price": 5000 }],
            "payment_method": "cash"
        })
    }

    #[tokio::test]
    async fn test_health() {
        let f = fixture(OperatorPolicy::default()).await;
        let (status, body) = send(&f.app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_create_then_cancel_sale() {
        let f = fixture(OperatorPolicy::default()).await;

        let (status, body) = send(&f.app, post("/sales", cart(&f.product_id))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["sale"]["sale_number"], "1");
        assert_eq!(body["sale"]["total"], 10000);
        assert_eq!(body["sale"]["payment_method"], "cash");

        let sale_id = body["sale"]["id"].as_str().unwrap().to_string();

        let (status, detail) = send(&f.app, get(&format!("/sales/{sale_id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["items"].as_array().unwrap().len(), 1);
        assert_eq!(detail["payments"][0]["amount_cents"], 10000);
        assert_eq!(detail["receivables"][0]["status"], "paid");

        let (status, body) = send(&f.app, post(&format!("/sales/{sale_id}/cancel"), json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].as_str().unwrap().contains("#1"));

        let (status, body) = send(&f.app, post(&format!("/sales/{sale_id}/cancel"), json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "ALREADY_CANCELLED");

        let product = f.db.products().get_by_id(&f.product_id).await.unwrap().unwrap();
        assert_eq!(product.stock_quantity, 10);
    }

    #[tokio::test]
    async fn test_create_sale_validation() {
        let f = fixture(OperatorPolicy::default()).await;

        let (status, body) = send(&f.app, post("/sales", json!({ "payment_method": "cash" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, _) = send(
            &f.app,
            post("/sales", json!({ "items": [{ "product_id": f.product_id, "quantity": 1, "unit_price": 5000 }] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&f.app, post("/sales", json!({ "items": "nope" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_oversized_cart_is_400() {
        let f = fixture(OperatorPolicy::default()).await;
        let body = json!({
            "items": [{ "product_id": f.product_id, "quantity": 10_000_000_000_i64, "unit_price": 10_000_000_000_i64 }],
            "payment_method": "cash"
        });

        let (status, body) = send(&f.app, post("/sales", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_cashback_is_not_a_tender() {
        let f = fixture(OperatorPolicy::default()).await;
        let mut body = cart(&f.product_id);
        body["payment_method"] = json!("cashback");

        let (status, body) = send(&f.app, post("/sales", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_unknown_product_is_404() {
        let f = fixture(OperatorPolicy::default()).await;
        let (status, body) = send(&f.app, post("/sales", cart("missing"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_required_operator_header() {
        let f = fixture(OperatorPolicy::Require).await;

        let (status, _) = send(&f.app, post("/sales", cart(&f.product_id))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let mut request = post("/sales", cart(&f.product_id));
        request
            .headers_mut()
            .insert("x-operator-id", f.user_id.parse().unwrap());
        let (status, _) = send(&f.app, request).await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, sales) = send(&f.app, get("/sales?limit=10")).await;
        assert_eq!(sales.as_array().unwrap().len(), 1);
        assert_eq!(sales[0]["user_id"], f.user_id.as_str());
    }

    #[tokio::test]
    async fn test_cancel_unknown_sale_is_404() {
        let f = fixture(OperatorPolicy::default()).await;
        let (status, _) = send(&f.app, post("/sales/ghost/cancel", json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&f.app, get("/sales/ghost")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_manual_stock_movement() {
        let f = fixture(OperatorPolicy::default()).await;
        let uri = format!("/products/{}/stock-movements", f.product_id);

        let (status, change) = send(
            &f.app,
            post(&uri, json!({ "movement_type": "IN", "quantity": 10, "unit_cost": 5000 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(change["new_stock"], 20);
        assert_eq!(change["new_avg_cost"], 4000);

        let (status, _) = send(&f.app, post(&uri, json!({ "movement_type": "OUT", "quantity": 0 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, history) = send(&f.app, get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history.as_array().unwrap().len(), 1);
        assert_eq!(history[0]["reference_type"], "manual");
    }
}
