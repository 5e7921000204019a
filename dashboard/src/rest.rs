use crate::analytics::{self, Analytics, Chart, MetricCard};
use crate::chat::{ChatClient, ChatLog, SUGGESTED_QUESTIONS};
use crate::errors::Error;
use crate::export::{export_filename, to_csv};
use crate::market::{MarketClient, MarketFilters, MarketPage, POPULAR_COMMODITIES};
use crate::model::{display_cmp, ChatMessage, PollPhase, Reading, ReadingsResponse, SensorReading};
use crate::scheduler::RefreshTrigger;
use crate::store::ReadingStore;
use crate::table::{Page, SearchField, TableView};
use crate::weather::{WeatherClient, WeatherReport};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::error;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ReadingStore>,
    pub refresh: Option<RefreshTrigger>,
    pub chat: ChatClient,
    pub chat_log: Arc<Mutex<ChatLog>>,
    pub weather: Option<WeatherClient>,
    pub weather_location: String,
    pub market: Option<MarketClient>,
}

impl AppState {
    pub fn new(store: Arc<ReadingStore>, chat: ChatClient) -> Self {
        Self {
            store,
            refresh: None,
            chat,
            chat_log: Arc::new(Mutex::new(ChatLog::new())),
            weather: None,
            weather_location: "Tirupati".to_string(),
            market: None,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/readings", get(get_readings))
        .route("/api/v1/dashboard", get(get_dashboard))
        .route("/api/v1/analytics", get(get_analytics))
        .route("/api/v1/table", get(get_table))
        .route("/api/v1/table/export", get(export_table))
        .route("/api/v1/refresh", post(refresh))
        .route("/api/v1/chat", get(get_chat).post(post_chat))
        .route("/api/v1/weather", get(get_weather))
        .route("/api/v1/market", get(get_market))
        .route("/api/v1/market/districts", get(get_districts))
        .with_state(state)
}

async fn get_readings(State(state): State<AppState>) -> Json<ReadingsResponse> {
    let snapshot = state.store.snapshot();
    let mut data: Vec<Reading> = snapshot.readings.to_vec();
    data.sort_by(display_cmp);

    Json(ReadingsResponse {
        total: data.len(),
        data,
        phase: state.store.phase(),
        version: snapshot.version,
        last_updated: snapshot.last_updated,
    })
}

#[derive(Debug, Serialize)]
struct Gauge {
    label: &'static str,
    value: String,
    percent: f64,
}

#[derive(Debug, Serialize)]
struct CurrentCard {
    reading: SensorReading,
    gauges: Vec<Gauge>,
    pump_class: &'static str,
    alert_class: &'static str,
}

impl CurrentCard {
    fn new(reading: &SensorReading) -> Self {
        Self {
            gauges: vec![
                Gauge {
                    label: "Temperature",
                    value: format!("{}°C", analytics::one_decimal(reading.temperature)),
                    percent: analytics::gauge_percent(reading.temperature, 50.0),
                },
                Gauge {
                    label: "Humidity",
                    value: format!("{:.0}%", reading.humidity),
                    percent: analytics::gauge_percent(reading.humidity, 100.0),
                },
                Gauge {
                    label: "Soil Moisture",
                    value: reading.soil_moisture.to_string(),
                    percent: analytics::gauge_percent(reading.soil_moisture as f64, 4095.0),
                },
                Gauge {
                    label: "Water Level",
                    value: format!("{}%", analytics::one_decimal(reading.water_level_percent)),
                    percent: analytics::gauge_percent(reading.water_level_percent, 100.0),
                },
            ],
            pump_class: crate::model::pump_css_class(&reading.pump_status),
            alert_class: reading.alert_level().css_class(),
            reading: reading.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DashboardResponse {
    phase: PollPhase,
    current: Option<CurrentCard>,
    temperature_trend: Chart,
    temperature_humidity: Chart,
    soil_water: Chart,
}

async fn get_dashboard(State(state): State<AppState>) -> Json<DashboardResponse> {
    let snapshot = state.store.snapshot();
    let current = snapshot.current();
    let (temperature_trend, temperature_humidity) = analytics::rolling_charts(&state.store.trend());
    let latest: Vec<SensorReading> = current.cloned().into_iter().collect();

    Json(DashboardResponse {
        phase: state.store.phase(),
        current: current.map(CurrentCard::new),
        temperature_trend,
        temperature_humidity,
        soil_water: analytics::soil_water_snapshot(&latest),
    })
}

#[derive(Debug, Serialize)]
struct AnalyticsCharts {
    temperature: Chart,
    temperature_humidity: Chart,
    soil_water: Chart,
    soil_water_trend: Chart,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum AnalyticsResponse {
    Ready {
        metrics: Analytics,
        cards: Vec<MetricCard>,
        charts: AnalyticsCharts,
    },
    InsufficientData {
        readings: usize,
    },
}

async fn get_analytics(State(state): State<AppState>) -> Json<AnalyticsResponse> {
    let readings = state.store.snapshot().chronological();

    let response = match Analytics::compute(&readings) {
        Some(metrics) => AnalyticsResponse::Ready {
            cards: metrics.cards(),
            metrics,
            charts: AnalyticsCharts {
                temperature: analytics::temperature_chart(&readings),
                temperature_humidity: analytics::temperature_humidity_chart(&readings),
                soil_water: analytics::soil_water_snapshot(&readings),
                soil_water_trend: analytics::soil_water_chart(&readings),
            },
        },
        None => AnalyticsResponse::InsufficientData {
            readings: readings.len(),
        },
    };
    Json(response)
}

#[derive(Debug, Deserialize)]
pub struct TableQuery {
    term: Option<String>,
    field: Option<SearchField>,
    page: Option<usize>,
}

impl TableQuery {
    fn view(&self, store: &ReadingStore) -> TableView {
        TableView::with_filter(
            store.snapshot().readings,
            self.term.as_deref().unwrap_or_default(),
            self.field.unwrap_or_default(),
        )
    }
}

#[derive(Debug, Serialize)]
struct TableResponse {
    term: String,
    field: SearchField,
    #[serde(flatten)]
    page: Page,
}

/// Each request is a fresh view over the latest snapshot. The client owns
/// the page: it drops `page` when it changes the term or field, and a stale
/// page is clamped into range.
async fn get_table(
    State(state): State<AppState>,
    Query(params): Query<TableQuery>,
) -> Json<TableResponse> {
    let mut view = params.view(&state.store);
    view.go_to(params.page.unwrap_or(1));

    Json(TableResponse {
        term: params.term.unwrap_or_default(),
        field: params.field.unwrap_or_default(),
        page: view.current_page(),
    })
}

async fn export_table(
    State(state): State<AppState>,
    Query(params): Query<TableQuery>,
) -> Result<Response, AppError> {
    let view = params.view(&state.store);
    let csv = to_csv(view.filtered())?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        export_filename(Local::now().date_naive())
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}

#[derive(Debug, Serialize)]
struct RefreshResponse {
    queued: bool,
}

async fn refresh(State(state): State<AppState>) -> (StatusCode, Json<RefreshResponse>) {
    let queued = state.refresh.as_ref().is_some_and(RefreshTrigger::refresh);
    (StatusCode::ACCEPTED, Json(RefreshResponse { queued }))
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    reply: Option<ChatMessage>,
    messages: Vec<ChatMessage>,
    suggestions: [&'static str; 5],
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    message: String,
}

async fn get_chat(State(state): State<AppState>) -> Json<ChatResponse> {
    let log = state.chat_log.lock().await;
    Json(ChatResponse {
        reply: None,
        messages: log.messages().to_vec(),
        suggestions: SUGGESTED_QUESTIONS,
    })
}

async fn post_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Json<ChatResponse> {
    // The lock is released while the backend answers.
    let query = state.chat_log.lock().await.begin_turn(&request.message);

    let reply = match query {
        Some(query) => {
            let message = ChatMessage::assistant(state.chat.ask(&query).await);
            state.chat_log.lock().await.push(message.clone());
            Some(message)
        }
        None => None,
    };

    let log = state.chat_log.lock().await;
    Json(ChatResponse {
        reply,
        messages: log.messages().to_vec(),
        suggestions: SUGGESTED_QUESTIONS,
    })
}

#[derive(Debug, Deserialize)]
pub struct WeatherQuery {
    q: Option<String>,
}

async fn get_weather(
    State(state): State<AppState>,
    Query(params): Query<WeatherQuery>,
) -> Result<Json<WeatherReport>, AppError> {
    let client = state
        .weather
        .as_ref()
        .ok_or_else(|| Error::Config("weather API key is not configured".to_string()))?;
    let location = params
        .q
        .filter(|q| !q.trim().is_empty())
        .unwrap_or_else(|| state.weather_location.clone());

    Ok(Json(client.forecast(&location).await?))
}

#[derive(Debug, Deserialize)]
pub struct MarketQuery {
    state: Option<String>,
    district: Option<String>,
    market: Option<String>,
    commodity: Option<String>,
    variety: Option<String>,
    grade: Option<String>,
    offset: Option<usize>,
}

impl MarketQuery {
    fn filters(&self) -> MarketFilters {
        let text = |value: &Option<String>| value.as_deref().unwrap_or_default().trim().to_string();
        let mut filters = MarketFilters {
            market: text(&self.market),
            commodity: text(&self.commodity),
            variety: text(&self.variety),
            grade: text(&self.grade),
            ..Default::default()
        };
        filters.set_state(&text(&self.state));
        // A district only narrows a chosen state.
        if !filters.state.is_empty() {
            filters.district = text(&self.district);
        }
        filters
    }
}

fn market_client(state: &AppState) -> Result<&MarketClient, Error> {
    state
        .market
        .as_ref()
        .ok_or_else(|| Error::Config("market API key is not configured".to_string()))
}

#[derive(Debug, Serialize)]
struct MarketResponse {
    #[serde(flatten)]
    page: MarketPage,
    filters: MarketFilters,
    commodities: [&'static str; 9],
}

async fn get_market(
    State(state): State<AppState>,
    Query(params): Query<MarketQuery>,
) -> Result<Json<MarketResponse>, AppError> {
    let client = market_client(&state)?;
    let filters = params.filters();
    let page = client
        .records(&filters, params.offset.unwrap_or(0))
        .await?;
    Ok(Json(MarketResponse {
        page,
        filters,
        commodities: POPULAR_COMMODITIES,
    }))
}

#[derive(Debug, Deserialize)]
pub struct DistrictQuery {
    state: Option<String>,
}

async fn get_districts(
    State(state): State<AppState>,
    Query(params): Query<DistrictQuery>,
) -> Result<Json<Vec<String>>, AppError> {
    let client = market_client(&state)?;
    let districts = client
        .districts(params.state.as_deref().unwrap_or_default().trim())
        .await?;
    Ok(Json(districts))
}

struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("API error: {}", self.error);
        (self.status, format!("{}", self.error)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let error = err.into();
        let status = match error.downcast_ref::<Error>() {
            Some(Error::Http(_)) | Some(Error::Status { .. }) | Some(Error::Upstream(_)) => {
                StatusCode::BAD_GATEWAY
            }
            Some(Error::Config(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Some(Error::Validation(_)) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, error }
    }
}
