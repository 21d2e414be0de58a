use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::serve;
use axum::{Json, Router};
use env_logger::Env;
use fuel_router::common::config::ServiceConfig;
use fuel_router::common::error::FuelRouteError;
use fuel_router::loading::petgraph::WaypointGraph;
use fuel_router::pipeline::{cheapest_route, prepare_graph, save_cheapest_route};
use log::{error, info, warn};
use serde_json::json;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Clone)]
struct AppState {
    graph: Arc<WaypointGraph>,
}

/// Convert a failed search into a JSON error response
fn error_response(err: FuelRouteError) -> Response {
    let status = match err {
        FuelRouteError::Unreachable => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let json_response = json!({
        "status": "error",
        "message": err.to_string()
    });

    (status, Json(json_response)).into_response()
}

async fn get_route(State(state): State<AppState>) -> Response {
    match cheapest_route(&state.graph) {
        Ok(route) => (StatusCode::OK, Json(route)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn get_route_geojson(State(state): State<AppState>) -> Response {
    match cheapest_route(&state.graph) {
        Ok(route) => (StatusCode::OK, Json(route.to_geojson())).into_response(),
        Err(err) => error_response(err),
    }
}

async fn health_check() -> impl IntoResponse {
    let msg = "Hello World!";

    let json_response = json!({
        "status": "success",
        "message": msg
    });

    Json(json_response)
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("Invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    // Preparation is CPU bound, keep it off the async workers
    let prep_config = config.clone();
    let graph = match tokio::task::spawn_blocking(move || prepare_graph(&prep_config)).await {
        Ok(Ok(graph)) => graph,
        Ok(Err(err)) => {
            error!("Unable to prepare graph: {err}");
            return ExitCode::FAILURE;
        }
        Err(err) => {
            error!("Graph preparation panicked: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(route_path) = &config.route_path {
        match save_cheapest_route(&graph, route_path) {
            Ok(_) => (),
            Err(FuelRouteError::Unreachable) => {
                warn!("No route exists yet, {} was not written", route_path.display())
            }
            Err(err) => {
                error!("Unable to save route: {err}");
                return ExitCode::FAILURE;
            }
        }
    }

    let state = AppState {
        graph: Arc::new(graph),
    };

    let router = Router::new()
        .route("/healthcheck", get(health_check))
        .route("/route", get(get_route))
        .route("/route/geojson", get(get_route_geojson))
        .with_state(state);

    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("Error binding to {}: {err}", config.bind_addr);
            return ExitCode::FAILURE;
        }
    };
    info!("Serving routes on {}", config.bind_addr);

    if let Err(err) = serve(listener, router).await {
        error!("Error serving API: {err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
