use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use clearplate_core::error::AnalysisError;
use clearplate_core::models::{
    BreakoutRecord, IngredientAssessment, MealRecord, MealType, Severity, UpdateBreakout,
    UpdateMeal, parse_local_datetime, validate_foods,
};
use clearplate_core::service::{AnalysisService, CompletionProvider};
use clearplate_core::store::RecordStore;

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB

struct AppState<P> {
    store: Arc<Mutex<RecordStore>>,
    service: Arc<AnalysisService<P>>,
}

impl<P> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            service: Arc::clone(&self.service),
        }
    }
}

impl<P> AppState<P> {
    fn store(&self) -> MutexGuard<'_, RecordStore> {
        self.store
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct CreateMealRequest {
    #[serde(default)]
    foods: Vec<String>,
    #[serde(default)]
    selected_ingredients: Vec<IngredientAssessment>,
    date: Option<String>,
    meal_type: Option<String>,
}

fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[derive(Deserialize)]
struct UpdateMealRequest {
    foods: Option<Vec<String>>,
    selected_ingredients: Option<Vec<IngredientAssessment>>,
    date: Option<String>,
    meal_type: Option<String>,
}

#[derive(Deserialize)]
struct CreateBreakoutRequest {
    severity: String,
    date: Option<String>,
    notes: Option<String>,
}

#[derive(Deserialize)]
#[allow(clippy::option_option)]
struct UpdateBreakoutRequest {
    severity: Option<String>,
    date: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    notes: Option<Option<String>>,
}

#[derive(Deserialize)]
struct DayQuery {
    date: Option<String>,
}

#[derive(Deserialize)]
struct AnalyzeMealRequest {
    foods: Vec<String>,
}

#[derive(Deserialize)]
struct AnalyzeIngredientRequest {
    name: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unavailable(String),
    Upstream(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            Self::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            Self::Internal(err) => {
                error!("internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        warn!(error = %err, "meal analysis failed");
        match err {
            AnalysisError::Config(_) => Self::Unavailable(format!("Analysis failed: {err}")),
            AnalysisError::Api(_) | AnalysisError::Parse { .. } => {
                Self::Upstream(format!("Analysis failed: {err}"))
            }
        }
    }
}

fn bad_request(err: &anyhow::Error) -> ApiError {
    ApiError::BadRequest(format!("{err}"))
}

fn parse_day(s: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("Invalid date '{s}'. Use YYYY-MM-DD")))
}

fn parse_timestamp(s: Option<&str>) -> Result<DateTime<Local>, ApiError> {
    match s {
        Some(s) => parse_local_datetime(s).map_err(|e| bad_request(&e)),
        None => Ok(Local::now()),
    }
}

fn clean_foods(foods: &[String]) -> Vec<String> {
    foods
        .iter()
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .collect()
}

// --- Middleware ---

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Meals ---

async fn create_meal<P>(
    State(state): State<AppState<P>>,
    Json(req): Json<CreateMealRequest>,
) -> Result<(StatusCode, Json<MealRecord>), ApiError> {
    let foods = clean_foods(&req.foods);
    if foods.is_empty() && req.selected_ingredients.is_empty() {
        return Err(ApiError::BadRequest(
            "A meal needs at least one food or selected ingredient".to_string(),
        ));
    }
    let meal_type = match req.meal_type.as_deref() {
        Some(m) => m.parse::<MealType>().map_err(|e| bad_request(&e))?,
        None => MealType::default(),
    };
    let date = parse_timestamp(req.date.as_deref())?;

    let record = MealRecord::new(foods, req.selected_ingredients, date, meal_type);
    let record = state.store().append_meal(record);
    Ok((StatusCode::CREATED, Json(record)))
}

async fn list_meals<P>(
    State(state): State<AppState<P>>,
    Query(query): Query<DayQuery>,
) -> Result<Json<Vec<MealRecord>>, ApiError> {
    let day = match query.date.as_deref() {
        Some(d) => parse_day(d)?,
        None => Local::now().date_naive(),
    };
    Ok(Json(state.store().meals_for_day(day)))
}

async fn update_meal<P>(
    State(state): State<AppState<P>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateMealRequest>,
) -> Result<Json<MealRecord>, ApiError> {
    let update = UpdateMeal {
        foods: req.foods.as_deref().map(clean_foods),
        selected_ingredients: req.selected_ingredients,
        date: req
            .date
            .as_deref()
            .map(parse_local_datetime)
            .transpose()
            .map_err(|e| bad_request(&e))?,
        meal_type: req
            .meal_type
            .as_deref()
            .map(str::parse::<MealType>)
            .transpose()
            .map_err(|e| bad_request(&e))?,
    };
    if update.is_empty() {
        return Err(ApiError::BadRequest(
            "At least one field must be provided".to_string(),
        ));
    }

    let mut store = state.store();
    let Some(current) = store.get_meal(id) else {
        return Err(ApiError::NotFound(format!("Meal {id} not found")));
    };
    let no_foods = update
        .foods
        .as_ref()
        .map_or(current.foods.is_empty(), Vec::is_empty);
    let no_ingredients = update
        .selected_ingredients
        .as_ref()
        .map_or(current.selected_ingredients.is_empty(), Vec::is_empty);
    if no_foods && no_ingredients {
        return Err(ApiError::BadRequest(
            "A meal needs at least one food or selected ingredient".to_string(),
        ));
    }

    let record = store
        .update_meal(id, &update)
        .map_err(|_| ApiError::NotFound(format!("Meal {id} not found")))?;
    Ok(Json(record))
}

async fn delete_meal<P>(
    State(state): State<AppState<P>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.store().delete_meal(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Meal {id} not found")))
    }
}

// --- Breakouts ---

async fn create_breakout<P>(
    State(state): State<AppState<P>>,
    Json(req): Json<CreateBreakoutRequest>,
) -> Result<(StatusCode, Json<BreakoutRecord>), ApiError> {
    let severity = req
        .severity
        .parse::<Severity>()
        .map_err(|e| bad_request(&e))?;
    let date = parse_timestamp(req.date.as_deref())?;

    let record = BreakoutRecord::new(date, severity, req.notes);
    let record = state.store().append_breakout(record);
    Ok((StatusCode::CREATED, Json(record)))
}

async fn list_breakouts<P>(
    State(state): State<AppState<P>>,
    Query(query): Query<DayQuery>,
) -> Result<Json<Vec<BreakoutRecord>>, ApiError> {
    let day = match query.date.as_deref() {
        Some(d) => parse_day(d)?,
        None => Local::now().date_naive(),
    };
    Ok(Json(state.store().breakouts_for_day(day)))
}

async fn update_breakout<P>(
    State(state): State<AppState<P>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateBreakoutRequest>,
) -> Result<Json<BreakoutRecord>, ApiError> {
    let update = UpdateBreakout {
        date: req
            .date
            .as_deref()
            .map(parse_local_datetime)
            .transpose()
            .map_err(|e| bad_request(&e))?,
        severity: req
            .severity
            .as_deref()
            .map(str::parse::<Severity>)
            .transpose()
            .map_err(|e| bad_request(&e))?,
        notes: req.notes,
    };
    if update.is_empty() {
        return Err(ApiError::BadRequest(
            "At least one field must be provided".to_string(),
        ));
    }

    let record = state
        .store()
        .update_breakout(id, &update)
        .map_err(|_| ApiError::NotFound(format!("Breakout {id} not found")))?;
    Ok(Json(record))
}

async fn delete_breakout<P>(
    State(state): State<AppState<P>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.store().delete_breakout(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Breakout {id} not found")))
    }
}

// --- Calendar ---

async fn get_day_summary<P>(
    State(state): State<AppState<P>>,
    Path(date_str): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let day = parse_day(&date_str)?;
    let summary = state.store().build_day_summary(day);
    let value = serde_json::to_value(summary).context("failed to serialize day summary")?;
    Ok(Json(value))
}

async fn get_calendar_month<P>(
    State(state): State<AppState<P>>,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !(1..=12).contains(&month) {
        return Err(ApiError::BadRequest(format!(
            "Invalid month {month}. Must be 1-12"
        )));
    }
    let days = state.store().days_with_entries(year, month);
    Ok(Json(json!({ "year": year, "month": month, "days": days })))
}

// --- Analysis ---

async fn analyze_meal<P: CompletionProvider>(
    State(state): State<AppState<P>>,
    Json(req): Json<AnalyzeMealRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let foods = validate_foods(&req.foods).map_err(|e| bad_request(&e))?;
    let dishes = state.service.analyze_meal(&foods.join(", ")).await?;
    Ok(Json(json!({ "meals": dishes })))
}

async fn analyze_ingredient<P: CompletionProvider>(
    State(state): State<AppState<P>>,
    Json(req): Json<AnalyzeIngredientRequest>,
) -> Result<Json<IngredientAssessment>, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Ingredient name is required".to_string(),
        ));
    }
    Ok(Json(
        state.service.analyze_ingredient_or_default(&req.name).await,
    ))
}

fn build_router<P: CompletionProvider + 'static>(state: AppState<P>) -> Router {
    Router::new()
        .route("/api/meals", post(create_meal::<P>).get(list_meals::<P>))
        .route(
            "/api/meals/{id}",
            put(update_meal::<P>).delete(delete_meal::<P>),
        )
        .route(
            "/api/breakouts",
            post(create_breakout::<P>).get(list_breakouts::<P>),
        )
        .route(
            "/api/breakouts/{id}",
            put(update_breakout::<P>).delete(delete_breakout::<P>),
        )
        .route("/api/days/{date}", get(get_day_summary::<P>))
        .route(
            "/api/calendar/{year}/{month}",
            get(get_calendar_month::<P>),
        )
        .route("/api/analyze", post(analyze_meal::<P>))
        .route("/api/analyze/ingredient", post(analyze_ingredient::<P>))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server<P: CompletionProvider + 'static>(
    service: Arc<AnalysisService<P>>,
    port: u16,
    bind: &str,
) -> anyhow::Result<()> {
    let state = AppState {
        store: Arc::new(Mutex::new(RecordStore::new())),
        service,
    };
    let app = build_router(state);

    if bind != "127.0.0.1" && bind != "localhost" {
        warn!(bind, "listening beyond localhost; the API has no authentication");
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    info!("Listening on http://{bind}:{port}");
    eprintln!("Records are kept in memory and discarded when the server stops.");
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use clearplate_core::models::{ANALYSIS_FAILED_EXPLANATION, AcneRisk};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct StubProvider(Result<String, AnalysisError>);

    impl CompletionProvider for StubProvider {
        async fn complete(&self, _prompt: &str) -> Result<String, AnalysisError> {
            self.0.clone()
        }
    }

    const PIZZA: &str = r#"{"meals":[{"dish":"Pizza","ingredients":[{"name":"Cheese","acneRisk":"high","explanation":"dairy"}]}]}"#;

    fn test_state(answer: Result<String, AnalysisError>) -> AppState<StubProvider> {
        AppState {
            store: Arc::new(Mutex::new(RecordStore::new())),
            service: Arc::new(AnalysisService::new(StubProvider(answer))),
        }
    }

    fn test_app() -> Router {
        build_router(test_state(Ok(PIZZA.to_string())))
    }

    fn post_json(uri: &str, body: &serde_json::Value) -> axum::http::Request<Body> {
        axum::http::Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn put_json(uri: &str, body: &serde_json::Value) -> axum::http::Request<Body> {
        axum::http::Request::put(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::get(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn create_and_list_meals() {
        let app = test_app();

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/meals",
                &json!({
                    "foods": ["Pizza", "  "],
                    "date": "2024-03-10 12:30",
                    "meal_type": "lunch",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["foods"], json!(["Pizza"]));
        assert_eq!(created["meal_type"], "lunch");

        let response = app
            .clone()
            .oneshot(get_request("/api/meals?date=2024-03-10"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let meals = body_json(response).await;
        assert_eq!(meals.as_array().unwrap().len(), 1);
        assert_eq!(meals[0]["id"], created["id"]);

        let response = app
            .oneshot(get_request("/api/meals?date=2024-03-11"))
            .await
            .unwrap();
        assert_eq!(body_json(response).await, json!([]));
    }

    #[tokio::test]
    async fn create_meal_requires_content() {
        let response = test_app()
            .oneshot(post_json("/api/meals", &json!({"foods": [" "]})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_meal_invalid_meal_type_returns_400() {
        let response = test_app()
            .oneshot(post_json(
                "/api/meals",
                &json!({"foods": ["Toast"], "meal_type": "brunch"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("brunch"));
    }

    #[tokio::test]
    async fn update_and_delete_meal() {
        let app = test_app();
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/meals",
                &json!({"foods": ["Toast"], "date": "2024-03-10 08:00"}),
            ))
            .await
            .unwrap();
        let created = body_json(response).await;
        let id = created["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(put_json(
                &format!("/api/meals/{id}"),
                &json!({"meal_type": "breakfast"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let updated = body_json(response).await;
        assert_eq!(updated["id"], created["id"]);
        assert_eq!(updated["meal_type"], "breakfast");
        assert_eq!(updated["foods"], json!(["Toast"]));

        let response = app
            .clone()
            .oneshot(put_json(&format!("/api/meals/{id}"), &json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(
                axum::http::Request::delete(format!("/api/meals/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(
                axum::http::Request::delete(format!("/api/meals/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_meal_cannot_leave_it_empty() {
        let app = test_app();
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/meals",
                &json!({"foods": ["Toast"], "date": "2024-03-10 08:00"}),
            ))
            .await
            .unwrap();
        let created = body_json(response).await;
        let id = created["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(put_json(
                &format!("/api/meals/{id}"),
                &json!({"foods": ["  "], "selected_ingredients": []}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(get_request("/api/meals?date=2024-03-10"))
            .await
            .unwrap();
        let meals = body_json(response).await;
        assert_eq!(meals[0]["foods"], json!(["Toast"]));
    }

    #[tokio::test]
    async fn update_unknown_meal_returns_404() {
        let response = test_app()
            .oneshot(put_json(
                &format!("/api/meals/{}", Uuid::new_v4()),
                &json!({"foods": ["Soup"]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn breakout_lifecycle() {
        let app = test_app();
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/breakouts",
                &json!({"severity": "moderate", "date": "2024-03-10 21:00", "notes": "chin"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        let id = created["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(put_json(
                &format!("/api/breakouts/{id}"),
                &json!({"severity": "severe", "notes": null}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let updated = body_json(response).await;
        assert_eq!(updated["severity"], "severe");
        assert!(updated.get("notes").is_none());

        let response = app
            .clone()
            .oneshot(get_request("/api/breakouts?date=2024-03-10"))
            .await
            .unwrap();
        assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

        let response = app
            .oneshot(
                axum::http::Request::delete(format!("/api/breakouts/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn invalid_severity_returns_400() {
        let response = test_app()
            .oneshot(post_json("/api/breakouts", &json!({"severity": "awful"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn day_summary_and_calendar() {
        let app = test_app();
        app.clone()
            .oneshot(post_json(
                "/api/meals",
                &json!({
                    "foods": ["Pizza"],
                    "selected_ingredients": [{
                        "id": Uuid::new_v4(),
                        "name": "Cheese",
                        "acne_risk": "high",
                        "explanation": "dairy",
                    }],
                    "date": "2024-03-10 19:00",
                    "meal_type": "dinner",
                }),
            ))
            .await
            .unwrap();
        app.clone()
            .oneshot(post_json(
                "/api/breakouts",
                &json!({"severity": "mild", "date": "2024-03-12 09:00"}),
            ))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(get_request("/api/days/2024-03-10"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let summary = body_json(response).await;
        assert_eq!(summary["date"], "2024-03-10");
        assert_eq!(summary["meals"][0]["meal_type"], "dinner");
        assert_eq!(summary["high_risk_ingredients"], json!(["Cheese"]));

        let response = app
            .clone()
            .oneshot(get_request("/api/calendar/2024/3"))
            .await
            .unwrap();
        let calendar = body_json(response).await;
        assert_eq!(calendar["days"], json!(["2024-03-10", "2024-03-12"]));

        let response = app.oneshot(get_request("/api/calendar/2024/13")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn invalid_day_returns_400() {
        let response = test_app()
            .oneshot(get_request("/api/days/10-03-2024"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn analyze_returns_dishes() {
        let response = test_app()
            .oneshot(post_json("/api/analyze", &json!({"foods": ["Pizza"]})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["meals"][0]["dish"], "Pizza");
        assert_eq!(json["meals"][0]["ingredients"][0]["acne_risk"], "high");
    }

    #[tokio::test]
    async fn analyze_empty_foods_returns_400() {
        let response = test_app()
            .oneshot(post_json("/api/analyze", &json!({"foods": ["", " "]})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn analyze_error_mapping() {
        let app = build_router(test_state(Err(AnalysisError::Config(
            "no key".to_string(),
        ))));
        let response = app
            .oneshot(post_json("/api/analyze", &json!({"foods": ["Pizza"]})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let app = build_router(test_state(Ok("not json at all".to_string())));
        let response = app
            .oneshot(post_json("/api/analyze", &json!({"foods": ["Pizza"]})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().starts_with("Analysis failed"));
    }

    #[tokio::test]
    async fn analyze_ingredient_falls_back_to_medium() {
        let app = build_router(test_state(Err(AnalysisError::Api(
            "503 Service Unavailable".to_string(),
        ))));
        let response = app
            .oneshot(post_json(
                "/api/analyze/ingredient",
                &json!({"name": "Saffron"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["name"], "Saffron");
        assert_eq!(json["acne_risk"], AcneRisk::Medium.as_str());
        assert_eq!(json["explanation"], ANALYSIS_FAILED_EXPLANATION);
    }

    #[tokio::test]
    async fn analyze_ingredient_blank_returns_400() {
        let response = test_app()
            .oneshot(post_json("/api/analyze/ingredient", &json!({"name": " "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn security_headers_present() {
        let response = test_app()
            .oneshot(get_request("/api/meals"))
            .await
            .unwrap();

        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
        assert_eq!(
            response.headers().get("content-security-policy").unwrap(),
            "default-src 'none'"
        );
    }

    #[tokio::test]
    async fn body_size_limit_rejects_oversized() {
        let big_body = vec![0u8; BODY_LIMIT + 1];
        let response = test_app()
            .oneshot(
                axum::http::Request::post("/api/meals")
                    .header("content-type", "application/json")
                    .body(Body::from(big_body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn internal_error_does_not_leak_details() {
        let error = ApiError::Internal(anyhow::anyhow!("secret upstream key sk-12345"));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["error"], "Internal server error");
        assert!(!json["error"].as_str().unwrap().contains("secret"));
    }
}
