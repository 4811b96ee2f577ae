#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use webhook_notifier::config::Config;
use webhook_notifier::outbound::webhook::{
    InMemorySubscriptionStore, RetryStrategy, SubscriptionRegistry, WebhookDispatcher,
    WebhookHttpClient, WebhookNotifier,
};
use webhook_notifier::server::Server;
use wiremock::{Request, Respond, ResponseTemplate};

pub const DEFAULT_SECRET: &str = "integration-default-secret";

pub struct TestApp {
    pub address: String,
    pub notifier: Arc<WebhookNotifier>,
}

fn test_config() -> Config {
    let mut config = Config::load_with_sources(Some(HashMap::new())).unwrap();
    config.server.host = "localhost".to_string();
    config.server.port = 0;
    config.webhook.default_secret = DEFAULT_SECRET.to_string();
    config.webhook.request_timeout_ms = 1000;
    config.webhook.retry_delays_ms = vec![10, 20];
    config
}

pub async fn spawn_server() -> String {
    spawn_app().await.address
}

pub async fn spawn_app() -> TestApp {
    let config = test_config();

    let server = Server::new(&config).await.unwrap();

    let port = server.port().unwrap();
    let notifier = server.notifier();
    tokio::spawn(server.run());

    TestApp {
        address: format!("http://{}:{}", config.server.host, port),
        notifier,
    }
}

/// A notifier wired directly, without the HTTP surface
pub fn make_notifier(timeout: Duration, strategy: RetryStrategy) -> WebhookNotifier {
    let client = WebhookHttpClient::with_timeout(timeout).unwrap();
    let dispatcher = WebhookDispatcher::new(client, DEFAULT_SECRET).with_retry_strategy(strategy);
    let registry = SubscriptionRegistry::new(Arc::new(InMemorySubscriptionStore::new()));
    WebhookNotifier::new(registry, Arc::new(dispatcher))
}

/// A captured HTTP request with body and headers.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
    pub received_at: Instant,
}

impl CapturedRequest {
    pub fn body_json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    /// Get a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn capture(request: &Request) -> CapturedRequest {
    CapturedRequest {
        body: request.body.clone(),
        headers: request
            .headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
            .collect(),
        received_at: Instant::now(),
    }
}

/// Captures every request and answers with a fixed status.
#[derive(Clone)]
pub struct CaptureResponder {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    status: u16,
    delay: Duration,
}

impl CaptureResponder {
    pub fn with_status(status: u16) -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            status,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Respond for CaptureResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        self.requests.lock().unwrap().push(capture(request));
        ResponseTemplate::new(self.status).set_delay(self.delay)
    }
}

/// Fails a given number of times with 500, then answers 200.
#[derive(Clone)]
pub struct FailingResponder {
    attempts: Arc<AtomicU32>,
    failures_before_success: u32,
}

impl FailingResponder {
    pub fn fail_times(n: u32) -> Self {
        Self {
            attempts: Arc::new(AtomicU32::new(0)),
            failures_before_success: n,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Respond for FailingResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.failures_before_success {
            ResponseTemplate::new(500)
        } else {
            ResponseTemplate::new(200)
        }
    }
}
