// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! ReliefGrid HTTP server
//!
//! Wires the point table, the object store and the ingestion pipeline
//! together and serves the REST API.

pub mod api;
pub mod config;

use anyhow::Result;
use axum::{http::HeaderValue, Router};
use reliefgrid_index::ProximityIndex;
use reliefgrid_ingest::{
    AnthropicExtractor, DispatcherConfig, Extractor, HttpTranscriber, Pipeline,
    TriggerDispatcher, UnconfiguredExtractor,
};
use reliefgrid_storage::{KeyedStore, LocalObjectStore, ObjectStore, TableStore};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::AppState;
use config::{HttpServerConfig, ServerConfig};

pub async fn run_server(config: ServerConfig) -> Result<()> {
    init_tracing(config.server.json_logs);

    tracing::info!("Starting ReliefGrid Server");
    tracing::debug!("Configuration: {:#?}", config);

    config.validate()?;

    let state = build_state(&config).await?;
    let app = build_app(state, &config.server);

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "reliefgrid_server=info,reliefgrid_ingest=info,tower_http=info".into()
    });
    let (json_layer, text_layer) = if json {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer()))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

/// Open storage, build the pipeline and start the trigger dispatcher
pub async fn build_state(config: &ServerConfig) -> Result<AppState> {
    let table_dir = config.table_dir();
    let table: Arc<dyn KeyedStore> = Arc::new(TableStore::open(&table_dir).await?);
    tracing::info!("Point table opened at {:?}", table_dir);

    let object_dir = config.object_dir();
    let (objects, notifications) = LocalObjectStore::with_notifications(&object_dir);
    let objects: Arc<dyn ObjectStore> = Arc::new(objects);
    tracing::info!("Object store rooted at {:?}", object_dir);

    let pipeline_config = &config.pipeline;
    let timeout = pipeline_config.timeout();

    if pipeline_config.transcription.api_key.is_none() {
        tracing::warn!(
            "No transcription api_key set (OPENAI_API_KEY); requests to {} are unauthenticated",
            pipeline_config.transcription.endpoint
        );
    }
    let transcriber = Arc::new(HttpTranscriber::new(
        pipeline_config.transcription.clone(),
        objects.clone(),
        timeout,
    )?);

    let extractor: Arc<dyn Extractor> =
        match AnthropicExtractor::new(pipeline_config.extraction.clone(), timeout) {
            Ok(extractor) => Arc::new(extractor),
            Err(e) => {
                tracing::warn!(
                    "Extraction disabled ({}); set ANTHROPIC_API_KEY to index voice reports",
                    e
                );
                Arc::new(UnconfiguredExtractor::new(e.to_string()))
            }
        };

    let partition = config.storage.partition_key.clone();
    let precision = config.storage.precision;

    let pipeline = Arc::new(
        Pipeline::new(objects, table.clone(), transcriber, extractor)
            .with_partition(partition.clone(), precision)
            .with_timeout(timeout),
    );
    let index = ProximityIndex::new(table, partition, precision)?;

    let trigger =
        TriggerDispatcher::new(DispatcherConfig::from(pipeline_config), pipeline.clone()).spawn();
    let _forwarder = trigger.forward(notifications);

    Ok(AppState::new(index, pipeline)
        .with_trigger(trigger)
        .with_page_size(config.storage.page_size)
        .with_request_timeout(Duration::from_secs(config.server.request_timeout_secs)))
}

/// API router with CORS and request tracing
pub fn build_app(state: AppState, server: &HttpServerConfig) -> Router {
    api::router(state)
        .layer(cors_layer(server))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(server: &HttpServerConfig) -> CorsLayer {
    if !server.enable_cors {
        return CorsLayer::new();
    }

    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if server.cors_origins.is_empty() {
        tracing::warn!("CORS: Allowing all origins. Set cors_origins in production!");
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("CORS: ignoring invalid origin {:?}", origin);
                None
            }
        })
        .collect();
    tracing::info!("CORS: Allowing origins: {:?}", server.cors_origins);
    cors.allow_origin(AllowOrigin::list(origins))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
