use axum::extract::{Form, Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::db::Store;
use crate::error::Error;
use crate::grid::{format_percentage, Grid};
use crate::html;
use crate::types::{Mood, ProgressStats, Settings, WeekEdit, WeekRecord};

/// Application state shared across requests
pub struct AppState {
    pub store: Mutex<Store>,
}

impl AppState {
    pub fn new(store: Store) -> Arc<Self> {
        Arc::new(Self {
            store: Mutex::new(store),
        })
    }
}

/// Start the web server on localhost
pub async fn serve(port: u16, store: Store) -> anyhow::Result<()> {
    let app = router(AppState::new(store));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    println!("\nLifeGrid running at http://{}", addr);
    println!("Press Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/settings", axum::routing::post(settings_form_handler))
        .route("/weeks/{index}", get(editor_handler).post(week_form_handler))
        .route(
            "/local/settings",
            get(get_settings_handler).post(save_settings_handler),
        )
        .route("/local/weeks", get(list_weeks_handler))
        .route(
            "/local/weeks/{id}",
            get(get_week_handler).put(update_week_handler),
        )
        .route("/local/stats", get(stats_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::OutOfRange { .. } => StatusCode::NOT_FOUND,
            Error::MissingSettings => StatusCode::CONFLICT,
            Error::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        if status.is_server_error() {
            warn!(error = %self, "Request failed");
        }
        (status, self.to_string()).into_response()
    }
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Settings and records as currently stored; every request derives from a fresh load
fn load(store: &Store) -> Result<(Settings, Vec<WeekRecord>), Error> {
    let settings = store.get_settings()?.ok_or(Error::MissingSettings)?;
    let records = store.list_week_records()?;
    Ok((settings, records))
}

// ========== HTML pages ==========

async fn index_handler(State(state): State<Arc<AppState>>) -> Result<Html<String>, Error> {
    let store = state.store.lock().await;
    let markup = match store.get_settings()? {
        None => html::render_onboarding(None),
        Some(settings) => {
            let records = store.list_week_records()?;
            let grid = Grid::new(&settings, &records, now());
            html::render_page(&grid)
        }
    };
    Ok(Html(markup.into_string()))
}

#[derive(Debug, Deserialize)]
struct SettingsForm {
    #[serde(default)]
    name: Option<String>,
    dob: String,
    #[serde(default)]
    life_expectancy_years: Option<u32>,
}

async fn settings_form_handler(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SettingsForm>,
) -> Response {
    let settings = match Settings::parse(&form.dob, form.life_expectancy_years, form.name) {
        Ok(settings) => settings,
        Err(e) => {
            let page = html::render_onboarding(Some(&e.to_string()));
            return (StatusCode::UNPROCESSABLE_ENTITY, Html(page.into_string())).into_response();
        }
    };

    let store = state.store.lock().await;
    match store.put_settings(settings) {
        Ok(saved) => {
            info!(dob = %saved.dob, years = saved.life_expectancy_years, "Settings saved");
            Redirect::to("/").into_response()
        }
        Err(e) => e.into_response(),
    }
}

async fn editor_handler(
    State(state): State<Arc<AppState>>,
    Path(index): Path<u32>,
) -> Result<Html<String>, Error> {
    let store = state.store.lock().await;
    let (settings, records) = load(&store)?;
    let grid = Grid::new(&settings, &records, now());
    let markup = html::render_editor(&grid, index)?;
    Ok(Html(markup.into_string()))
}

/// Fields posted by the week editor. A radio group with nothing selected
/// sends no `mood` at all.
#[derive(Debug, Deserialize)]
struct WeekForm {
    #[serde(default)]
    title: String,
    #[serde(default)]
    notes: String,
    #[serde(default)]
    mood: Option<String>,
    #[serde(default)]
    color: String,
}

impl WeekForm {
    fn into_edit(self) -> Result<WeekEdit, Error> {
        let mood = match self.mood.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(m) => Some(m.parse::<Mood>()?),
        };
        Ok(WeekEdit {
            title: Some(self.title),
            notes: Some(self.notes),
            mood,
            color: Some(self.color),
        })
    }
}

async fn week_form_handler(
    State(state): State<Arc<AppState>>,
    Path(index): Path<u32>,
    Form(form): Form<WeekForm>,
) -> Result<Redirect, Error> {
    let edit = form.into_edit()?;

    let store = state.store.lock().await;
    let (settings, records) = load(&store)?;
    let record = Grid::new(&settings, &records, now()).compose(index, edit)?;
    let saved = store.put_week_record(record)?;

    info!(id = %saved.id, week_index = saved.week_index, "Week saved");
    Ok(Redirect::to("/"))
}

// ========== Local JSON API ==========

async fn get_settings_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Option<Settings>>, Error> {
    let store = state.store.lock().await;
    Ok(Json(store.get_settings()?))
}

async fn save_settings_handler(
    State(state): State<Arc<AppState>>,
    Json(settings): Json<Settings>,
) -> Result<Json<Settings>, Error> {
    let store = state.store.lock().await;
    Ok(Json(store.put_settings(settings)?))
}

async fn list_weeks_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<WeekRecord>>, Error> {
    let store = state.store.lock().await;
    Ok(Json(store.list_week_records()?))
}

async fn get_week_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Option<WeekRecord>>, Error> {
    let store = state.store.lock().await;
    Ok(Json(store.get_week_record(&id)?))
}

/// Partial update: fields present in the body are merged onto the stored
/// record, or onto a blank week if nothing is stored under `id` yet
async fn update_week_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<WeekEdit>,
) -> Result<Json<WeekRecord>, Error> {
    let store = state.store.lock().await;
    let (settings, records) = load(&store)?;
    let grid = Grid::new(&settings, &records, now());
    let index = grid.index_of_id(&id)?;

    let mut record = match store.get_week_record(&id)? {
        Some(existing) => existing,
        None => grid.envelope(index)?,
    };
    record.week_index = index;
    record.apply_patch(patch);

    Ok(Json(store.put_week_record(record)?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(flatten)]
    stats: ProgressStats,
    percent_label: String,
    current_week_index: i64,
}

async fn stats_handler(State(state): State<Arc<AppState>>) -> Result<Json<StatsResponse>, Error> {
    let store = state.store.lock().await;
    let (settings, records) = load(&store)?;
    let grid = Grid::new(&settings, &records, now());
    let stats = grid.progress();

    Ok(Json(StatsResponse {
        percent_label: format_percentage(stats.percent_lived),
        current_week_index: grid.current_week_index(),
        stats,
    }))
}
