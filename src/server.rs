mod extractors;
mod handlers;
mod responses;

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::Config;
use crate::outbound::webhook::{
    InMemorySubscriptionStore, SubscriptionRegistry, WebhookDispatcher, WebhookNotifier,
};
use crate::server::handlers::health::health_check;
use crate::server::handlers::webhooks::{
    delete_webhook, list_webhooks, register_webhook, test_webhook,
};
use axum::http::Method;
use axum::{
    Router,
    routing::{delete, get, post},
};
use color_eyre::eyre::{Context, Result};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use extractors::{ApiJson, OWNER_HEADER, OwnerId};
pub use responses::{ApiError, ListResponse};

#[derive(Clone)]
/// The global application state shared between all request handlers.
pub(crate) struct AppState {
    pub(crate) notifier: Arc<WebhookNotifier>,
}

pub struct Server {
    router: Router,
    listener: TcpListener,
    notifier: Arc<WebhookNotifier>,
}

impl Server {
    /// Creates a new HTTP server backed by an in-memory subscription store.
    pub async fn new(config: &Config) -> Result<Self> {
        let dispatcher = WebhookDispatcher::from_config(&config.webhook)
            .wrap_err("Failed to build webhook dispatcher")?;
        let registry = SubscriptionRegistry::new(Arc::new(InMemorySubscriptionStore::new()));
        let notifier = Arc::new(WebhookNotifier::new(registry, Arc::new(dispatcher)));

        let trace_layer =
            TraceLayer::new_for_http().make_span_with(|request: &'_ axum::extract::Request<_>| {
                let uri = request.uri().to_string();
                tracing::info_span!("request", method = %request.method(), uri)
            });

        let cors_layer = CorsLayer::new()
            .allow_origin(Any)
            .allow_headers(Any)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS]);

        let state = AppState {
            notifier: Arc::clone(&notifier),
        };

        let router = Router::new()
            .route("/health", get(health_check))
            .route("/v1/webhooks", post(register_webhook).get(list_webhooks))
            .route("/v1/webhooks/test", post(test_webhook))
            .route("/v1/webhooks/{id}", delete(delete_webhook))
            .layer(cors_layer)
            .layer(trace_layer)
            .with_state(state);

        let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))
            .await
            .wrap_err_with(|| format!("Failed to bind to port {}", config.server.port))?;

        Ok(Self {
            router,
            listener,
            notifier,
        })
    }

    pub fn port(&self) -> Result<u16> {
        Ok(self.listener.local_addr()?.port())
    }

    /// Handle other subsystems use to fire events.
    pub fn notifier(&self) -> Arc<WebhookNotifier> {
        Arc::clone(&self.notifier)
    }

    /// Runs the HTTP server.
    pub async fn run(self) -> Result<()> {
        tracing::info!("Server listening on {}", self.listener.local_addr()?);
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }
}
