/**
 * API REST WATTDOG - Surface d'administration et d'onboarding
 *
 * RÔLE :
 * Expose les flows externes au scheduler : onboarding d'un user (probe
 * initiale incluse), changement d'adresse, activation/désactivation,
 * consultation de l'état et de l'historique.
 *
 * FONCTIONNEMENT :
 * - Serveur Axum avec middleware auth API key
 * - Routes : /health, /system/health, /users...
 * - Gestion erreurs HTTP standardisée (400, 404, 409, 502...)
 *
 * SÉCURITÉ :
 * - Header x-api-key obligatoire sur toutes routes sauf /health
 */

use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::net::Ipv4Addr;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::health::{HealthTracker, KernelHealth};
use crate::models::{Power, User};
use crate::probe::{PingProbe, Probe, ProbeError};
use crate::registry::{RegistryError, SharedUserRegistry};

#[derive(serde::Serialize)]
pub struct UserView {
    user_id: u64,
    address: String,
    is_active: bool,
    power: Power,
    updated_at: String,          // RFC3339 pour l'API
    in_state_for_seconds: i64,   // durée de l'état courant
}

#[derive(serde::Serialize)]
pub struct ObservationView {
    at: String,
    power: Power,
}

fn to_view(u: &User) -> UserView {
    let now = OffsetDateTime::now_utc();
    let age = now - u.updated_at;
    UserView {
        user_id: u.user_id,
        address: u.address.clone(),
        is_active: u.is_active,
        power: u.power,
        updated_at: u.updated_at.format(&Rfc3339).unwrap_or_default(),
        in_state_for_seconds: age.whole_seconds().max(0),
    }
}

async fn require_api_key(req: Request, next: Next) -> Result<Response, StatusCode> {
    let path = req.uri().path();

    // Health check toujours accessible
    if path == "/health" {
        return Ok(next.run(req).await);
    }

    let expected = std::env::var("WATTDOG_API_KEY").unwrap_or_default();
    if expected.is_empty() {
        eprintln!("SECURITY: WATTDOG_API_KEY not set - API access denied");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let ok = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == expected)
        .unwrap_or(false);

    if !ok {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

#[derive(Clone)]
pub struct AppState {
    pub registry: SharedUserRegistry,
    pub health_tracker: HealthTracker,
    pub probe: PingProbe,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/users", get(get_users).post(register_user))
        .route("/users/{id}", get(get_user))
        .route("/users/{id}/history", get(get_user_history))
        .route("/users/{id}/address", post(change_address))
        .route("/users/{id}/activate", post(activate_user))
        .route("/users/{id}/deactivate", post(deactivate_user))
        .with_state(app_state)
        .layer(middleware::from_fn(require_api_key))
}

// GET /system/health (état du daemon)
async fn get_system_health(State(app): State<AppState>) -> Json<KernelHealth> {
    Json(app.health_tracker.get_health(&app.registry).await)
}

// GET /users (liste)
async fn get_users(State(app): State<AppState>) -> Json<Vec<UserView>> {
    let mut list: Vec<UserView> = app.registry.list_users().await.values().map(to_view).collect();
    list.sort_by_key(|v| v.user_id);
    Json(list)
}

// GET /users/{id} (détail)
async fn get_user(
    State(app): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<UserView>, StatusCode> {
    let Some(user) = app.registry.get_user(id).await else {
        return Err(StatusCode::NOT_FOUND);
    };
    Ok(Json(to_view(&user)))
}

// GET /users/{id}/history (reporting uniquement, jamais lu par le scheduler)
async fn get_user_history(
    State(app): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Vec<ObservationView>>, StatusCode> {
    let Some(user) = app.registry.get_user(id).await else {
        return Err(StatusCode::NOT_FOUND);
    };
    let history = user
        .history
        .iter()
        .map(|o| ObservationView {
            at: o.created_at.format(&Rfc3339).unwrap_or_default(),
            power: o.power,
        })
        .collect();
    Ok(Json(history))
}

#[derive(Debug, Deserialize)]
struct RegisterUserRequest {
    user_id: u64,
    address: String,
}

// POST /users (onboarding : probe initiale puis création)
async fn register_user(
    State(app): State<AppState>,
    Json(req): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<UserView>), StatusCode> {
    // La probe initiale seed l'état connu ; le premier tick du scheduler
    // n'est pas traité différemment des suivants
    let power = match app.probe.probe(&req.address).await {
        Ok(power) => power,
        Err(ProbeError::InvalidAddress(_)) => return Err(StatusCode::BAD_REQUEST),
        Err(e) => {
            eprintln!("[http] onboarding probe failed for {}: {}", req.address, e);
            return Err(StatusCode::BAD_GATEWAY);
        }
    };

    match app.registry.register_user(req.user_id, req.address, power).await {
        Ok(user) => Ok((StatusCode::CREATED, Json(to_view(&user)))),
        Err(RegistryError::AlreadyRegistered(_)) => Err(StatusCode::CONFLICT),
        Err(e) => {
            eprintln!("[http] register failed: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChangeAddressRequest {
    address: String,
}

// POST /users/{id}/address (l'état se resynchronise au tick suivant)
async fn change_address(
    State(app): State<AppState>,
    Path(id): Path<u64>,
    Json(req): Json<ChangeAddressRequest>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    if req.address.parse::<Ipv4Addr>().is_err() {
        return Err(StatusCode::BAD_REQUEST);
    }

    match app.registry.change_address(id, req.address).await {
        Ok(()) => Ok(Json(serde_json::json!({ "ok": true }))),
        Err(RegistryError::UnknownUser(_)) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            eprintln!("[http] change address failed: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn activate_user(
    State(app): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    set_active(&app, id, true).await
}

async fn deactivate_user(
    State(app): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    set_active(&app, id, false).await
}

async fn set_active(
    app: &AppState,
    id: u64,
    active: bool,
) -> Result<Json<serde_json::Value>, StatusCode> {
    match app.registry.set_active(id, active).await {
        Ok(()) => Ok(Json(serde_json::json!({ "ok": true, "is_active": active }))),
        Err(RegistryError::UnknownUser(_)) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            eprintln!("[http] set active failed: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
