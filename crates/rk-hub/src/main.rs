use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use clap::Parser;
use rk_core::Paginate;
use rk_service::{ErrorKind, MemoryModel, RecordService, ServiceOptions};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tracing::Instrument;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod qs;

// =============================================================================
// CLI
// =============================================================================

#[derive(Parser)]
#[command(
    name = "rk-hub",
    version = "0.1.0",
    about = "REST hub serving recordkit resources"
)]
struct Args {
    /// Path to config file
    #[arg(long, default_value = "rk-hub.toml")]
    config: PathBuf,

    /// Server bind address (overrides the config file)
    #[arg(long)]
    bind: Option<String>,
}

// =============================================================================
// Config
// =============================================================================

#[derive(Deserialize, Clone)]
struct Config {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default = "default_resources")]
    resources: Vec<ResourceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            resources: default_resources(),
        }
    }
}

#[derive(Deserialize, Clone)]
struct ServerConfig {
    #[serde(default = "default_bind")]
    bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Deserialize, Clone)]
struct ResourceConfig {
    name: String,
    #[serde(default = "default_id")]
    id: String,
    columns: Vec<String>,
    /// Column defaults applied on insert.
    #[serde(default)]
    defaults: Map<String, Value>,
    #[serde(default)]
    paginate: Option<Paginate>,
    #[serde(default)]
    events: Vec<String>,
}

fn default_bind() -> String {
    "127.0.0.1:3030".into()
}
fn default_id() -> String {
    "id".into()
}
fn default_resources() -> Vec<ResourceConfig> {
    vec![ResourceConfig {
        name: "todos".into(),
        id: default_id(),
        columns: vec!["text".into(), "complete".into()],
        defaults: Map::new(),
        paginate: None,
        events: Vec::new(),
    }]
}

// =============================================================================
// Application State
// =============================================================================

pub struct AppState {
    pub resources: HashMap<String, Arc<RecordService>>,
    pub start_time: Instant,
}

fn build_service(resource: &ResourceConfig) -> rk_service::Result<RecordService> {
    let model = resource.defaults.iter().fold(
        MemoryModel::new(&resource.name, &resource.id, &resource.columns),
        |model, (column, value)| model.with_default(column, value.clone()),
    );

    let name = resource.name.clone();
    let mut options = ServiceOptions::new(Arc::new(model))
        .id(&resource.id)
        .name(&resource.name)
        .events(&resource.events)
        .on_error(move |err| {
            if err.kind() == ErrorKind::Storage {
                tracing::error!(resource = %name, "storage failure: {}", err);
            }
            err
        });
    if let Some(paginate) = resource.paginate {
        options = options.paginate(paginate);
    }
    RecordService::new(options)
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "rk_hub=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config: Config = if args.config.exists() {
        let content = std::fs::read_to_string(&args.config)?;
        toml::from_str(&content)?
    } else {
        tracing::warn!("Config {:?} not found, serving defaults", args.config);
        Config::default()
    };

    let mut resources = HashMap::new();
    for resource in &config.resources {
        let service = build_service(resource)?;
        tracing::info!(
            resource = %resource.name,
            id = %service.id_field(),
            paginated = service.paginate().is_enabled(),
            "Mounted /{}",
            resource.name
        );
        resources.insert(resource.name.clone(), Arc::new(service));
    }

    let state = Arc::new(AppState {
        resources,
        start_time: Instant::now(),
    });

    let app = router(state);

    let bind = args.bind.unwrap_or(config.server.bind);
    let addr: SocketAddr = bind.parse()?;
    tracing::info!("recordkit hub listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route(
            "/:resource",
            get(api::find)
                .post(api::create)
                .patch(api::patch_many)
                .put(api::update_many)
                .delete(api::remove_many),
        )
        .route(
            "/:resource/:id",
            get(api::get)
                .put(api::update)
                .patch(api::patch)
                .delete(api::remove),
        )
        .layer(middleware::from_fn(request_span))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Tags every request with an `x-request-id` and logs its outcome.
async fn request_span(req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let span = tracing::info_span!(
        "request",
        id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        let start = Instant::now();
        let mut response = next.run(req).await;
        tracing::info!(
            status = response.status().as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "handled"
        );
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert("x-request-id", value);
        }
        response
    }
    .instrument(span)
    .await
}
