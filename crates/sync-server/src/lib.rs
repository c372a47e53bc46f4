pub mod config;
pub mod error;
pub mod http;
pub mod metrics;
pub mod middleware;
pub mod state;
pub mod ws;

use crate::config::Config;
use crate::state::SharedState;
use anyhow::{Context, Result};
use axum::http::Method;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use some_services::rate_limiter::token_bucket::{rate_limit_middleware, TokenBucketRateLimiter};
use std::str::FromStr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::JsonFields;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Mirrors `nest::init_tracing`: JSON fields in production, pretty-printed
/// locally, both gated by the same `EnvFilter`.
pub fn init_tracing(config: &Config) {
	let filter = EnvFilter::from_str(&config.rust_log).unwrap_or_else(|_| EnvFilter::new("info"));

	let registry = tracing_subscriber::registry();
	if config.log_json {
		registry
			.with(
				tracing_subscriber::fmt::layer()
					.fmt_fields(JsonFields::default())
					.event_format(tracing_subscriber::fmt::format().json().flatten_event(true).with_span_list(false))
					.with_filter(filter),
			)
			.init();
	} else {
		registry
			.with(tracing_subscriber::fmt::layer().event_format(tracing_subscriber::fmt::format().pretty().with_ansi(config.log_color)).with_filter(filter))
			.init();
	}
}

fn cors_layer(config: &Config) -> CorsLayer {
	let origin = if config.cors_origin == "*" {
		AllowOrigin::any()
	} else {
		AllowOrigin::exact(config.cors_origin.parse().unwrap_or_else(|_| "*".parse().unwrap()))
	};

	CorsLayer::new()
		.allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
		.allow_origin(origin)
		.allow_credentials(config.cors_credentials)
}

async fn metrics_endpoint(axum::extract::State(state): axum::extract::State<SharedState>) -> String {
	use prometheus::Encoder;
	let encoder = prometheus::TextEncoder::new();
	let mut buf = Vec::new();
	if let Err(err) = encoder.encode(&state.registry.gather(), &mut buf) {
		tracing::warn!(%err, "failed to encode metrics");
	}
	String::from_utf8(buf).unwrap_or_default()
}

/// Builds the router, layers ordered middleware (§9: admission gate, then
/// handler, then metrics interceptor), and serves until the process is
/// killed. Grounded in `nest::ApiBuilder::serve`, flattened to a single
/// `SharedState` instead of the teacher's multi-SQLite-pool abstraction.
pub async fn serve(config: Config, state: SharedState) -> Result<()> {
	let listen_addr = config.listen_addr();
	let rate_limiter = Arc::new(TokenBucketRateLimiter::new_with_refill_period(config.rate_limit_max, config.rate_limit_window_secs * 1000));
	let cors = cors_layer(&config);

	let api = http::routes::routes()
		.layer(from_fn_with_state(state.clone(), middleware::metrics_middleware))
		.layer(from_fn_with_state(state.clone(), middleware::admission_middleware));

	let app = Router::new()
		.nest("/api/v1/sync-storage", api)
		.route("/sync", get(ws::upgrade))
		.route("/metrics", get(metrics_endpoint))
		.fallback(middleware::not_found)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(cors)
				.layer(from_fn_with_state(rate_limiter, rate_limit_middleware)),
		)
		.with_state(state);

	let listener = TcpListener::bind(&listen_addr).await.with_context(|| format!("could not bind {listen_addr}"))?;
	tracing::info!(%listen_addr, "listening");
	axum::serve(listener, app).await.context("server error")?;
	Ok(())
}
