use std::fmt::Write as _;

use axum::extract::State;
use axum::response::{Html, Redirect};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::billing::Tariff;
use crate::display::{fee_label, format_balance};
use crate::session::{SessionHandle, ToggleOutcome};
use crate::state::{SharedState, Snapshot};

use super::DashboardError;

/// Everything the handlers need: a read view of the state and the session
/// queue.
#[derive(Clone)]
pub struct DashboardState {
    pub shared: SharedState,
    pub session: SessionHandle,
    pub tariff: Tariff,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub service: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    #[serde(flatten)]
    pub outcome: ToggleOutcome,
    pub state: Snapshot,
}

pub fn build_router(state: DashboardState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ac", get(snapshot))
        .route("/ac/toggle", post(toggle_form))
        .route("/api/toggle", post(toggle_api))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy",
        service: "acmeter",
    })
}

async fn snapshot(State(state): State<DashboardState>) -> Json<Snapshot> {
    Json(state.shared.snapshot())
}

/// Form target: the toggle goes through the same queue as the button.
async fn toggle_form(State(state): State<DashboardState>) -> Result<Redirect, DashboardError> {
    let outcome = state.session.toggle_and_wait().await?;
    tracing::info!(?outcome, "Dashboard toggle");
    Ok(Redirect::to("/"))
}

async fn toggle_api(
    State(state): State<DashboardState>,
) -> Result<Json<ToggleResponse>, DashboardError> {
    let outcome = state.session.toggle_and_wait().await?;
    tracing::info!(?outcome, "API toggle");
    Ok(Json(ToggleResponse {
        outcome,
        state: state.shared.snapshot(),
    }))
}

async fn index(State(state): State<DashboardState>) -> Html<String> {
    Html(render_page(&state.shared.snapshot(), &state.tariff))
}

fn render_page(snapshot: &Snapshot, tariff: &Tariff) -> String {
    let status = snapshot
        .status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "UNKNOWN".to_string());
    let temperature = snapshot
        .temperature
        .map(|t| format!("{:.1}&deg;C", t))
        .unwrap_or_else(|| "n/a".to_string());

    let mut page = String::from(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>acmeter</title></head>\n<body>\n",
    );
    if let Some(fault) = snapshot.fault() {
        let _ = writeln!(page, "<p class=\"fault\">{}</p>", escape_html(fault));
    }
    let _ = writeln!(page, "<p>Status: <b>{}</b></p>", status);
    let _ = writeln!(page, "<p>Room temperature: {}</p>", temperature);
    let _ = writeln!(
        page,
        "<p>Balance: {} ({} min)</p>",
        escape_html(&format_balance(snapshot.balance)),
        tariff.minutes_covered(snapshot.balance)
    );
    let _ = writeln!(page, "<p>{}</p>", escape_html(&fee_label(tariff)));
    match &snapshot.address {
        Some(address) => {
            let _ = writeln!(page, "<p>Pay to: <code>{}</code></p>", escape_html(address));
        }
        None => page.push_str("<p>No deposit address available</p>\n"),
    }
    page.push_str(
        "<form method=\"post\" action=\"/ac/toggle\"><button type=\"submit\">Toggle</button></form>\n",
    );
    page.push_str("</body>\n</html>\n");
    page
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
