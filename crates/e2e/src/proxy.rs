//! Response interception
//!
//! A transforming reverse proxy between the browser and the app's origin
//! server. Documents (any request whose `Accept` header includes
//! `text/html`) pass through an ordered chain of markup transformers;
//! the compiled script bundle passes through an ordered chain of script
//! transformers, with conditional request headers stripped so the upstream
//! always hands us a fresh body to patch. HTTP 304 responses pass through
//! unmodified in both cases — there is no cached body to patch, the
//! browser already holds the previously transformed one.
//!
//! A request to the dev server's auto-reload probe trips a latch that
//! fails the run: a mid-run hot reload silently discards the patched
//! runtime and produces maddeningly flaky tests, so it is forbidden
//! outright. Serve the app with a non-reloading server while testing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use bytes::Bytes;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use cubedrill_common::ProgramText;
use cubedrill_patch::{add_state_observers, fix_randomness_seed, inject_helpers, test_mode_overrides};

use crate::error::{E2eError, E2eResult};

/// One step of a transformation chain. Each transformer receives the
/// previous transformer's output; chains apply strictly in registration
/// order.
pub type BodyTransformer = Box<dyn Fn(&ProgramText) -> E2eResult<ProgramText> + Send + Sync>;

/// Configuration for the interception proxy
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Origin serving the real app
    pub upstream: String,
    /// Path of the compiled script bundle
    pub script_path: String,
    /// Path of the dev server's auto-reload probe
    pub reload_probe_path: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            upstream: "http://127.0.0.1:8000".to_string(),
            script_path: "/main.js".to_string(),
            reload_probe_path: "/reload/reload.js".to_string(),
        }
    }
}

/// Builder for a proxy with registered transformer chains
pub struct InterceptionProxy {
    config: ProxyConfig,
    markup_chain: Vec<BodyTransformer>,
    script_chain: Vec<BodyTransformer>,
}

impl InterceptionProxy {
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            config,
            markup_chain: Vec::new(),
            script_chain: Vec::new(),
        }
    }

    /// Append a markup transformer to the document chain.
    pub fn on_markup<F>(mut self, transformer: F) -> Self
    where
        F: Fn(&ProgramText) -> E2eResult<ProgramText> + Send + Sync + 'static,
    {
        self.markup_chain.push(Box::new(transformer));
        self
    }

    /// Append a script transformer to the bundle chain.
    pub fn on_script<F>(mut self, transformer: F) -> Self
    where
        F: Fn(&ProgramText) -> E2eResult<ProgramText> + Send + Sync + 'static,
    {
        self.script_chain.push(Box::new(transformer));
        self
    }

    /// Bind a local port and start serving.
    pub async fn spawn(self) -> E2eResult<ProxyHandle> {
        let state = Arc::new(ProxyState {
            config: self.config,
            client: reqwest::Client::new(),
            markup_chain: self.markup_chain,
            script_chain: self.script_chain,
            reload_tripped: AtomicBool::new(false),
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);
        info!(%base_url, upstream = %state.config.upstream, "interception proxy listening");

        let router = Router::new()
            .fallback(intercept)
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::clone(&state));
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!("interception proxy stopped: {e}");
            }
        });

        Ok(ProxyHandle {
            base_url,
            state,
            task,
        })
    }
}

/// Handle to a running proxy. Dropping it stops the server.
pub struct ProxyHandle {
    base_url: String,
    state: Arc<ProxyState>,
    task: tokio::task::JoinHandle<()>,
}

impl ProxyHandle {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fail the run if the app ever asked for the dev server's auto-reload
    /// script. Call this at least once per test teardown.
    pub fn ensure_no_reload(&self) -> E2eResult<()> {
        if self.state.reload_tripped.load(Ordering::SeqCst) {
            return Err(E2eError::ReloadDetected);
        }
        Ok(())
    }
}

impl Drop for ProxyHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct ProxyState {
    config: ProxyConfig,
    client: reqwest::Client,
    markup_chain: Vec<BodyTransformer>,
    script_chain: Vec<BodyTransformer>,
    reload_tripped: AtomicBool,
}

/// The default chains: install the browser helper and flip test-mode
/// switches in served documents; splice state observers and pin the
/// randomness seed in the served bundle.
pub fn standard_interception(config: ProxyConfig) -> InterceptionProxy {
    InterceptionProxy::new(config)
        .on_markup(|markup| inject_helpers(markup).map_err(E2eError::from))
        .on_markup(|markup| test_mode_overrides(markup).map_err(E2eError::from))
        .on_script(|script| add_state_observers(script).map_err(E2eError::from))
        .on_script(|script| fix_randomness_seed(script, 0).map_err(E2eError::from))
}

async fn intercept(State(state): State<Arc<ProxyState>>, request: Request) -> Response {
    match handle(&state, request).await {
        Ok(response) => response,
        Err(error) => {
            warn!("interception failed: {error}");
            (StatusCode::BAD_GATEWAY, error.to_string()).into_response()
        }
    }
}

async fn handle(state: &ProxyState, request: Request) -> E2eResult<Response> {
    let path = request.uri().path().to_string();

    if path == state.config.reload_probe_path {
        state.reload_tripped.store(true, Ordering::SeqCst);
        warn!("auto-reload probe requested; failing the run");
        return Ok((StatusCode::CONFLICT, E2eError::ReloadDetected.to_string()).into_response());
    }

    let is_script = path == state.config.script_path;
    let is_document = wants_html(request.headers());

    let mut url = format!("{}{}", state.config.upstream, path);
    if let Some(query) = request.uri().query() {
        url.push('?');
        url.push_str(query);
    }

    let mut upstream_request = state.client.get(&url);
    for (name, value) in request.headers() {
        let lowered = name.as_str().to_ascii_lowercase();
        if matches!(lowered.as_str(), "host" | "connection" | "content-length") {
            continue;
        }
        // Always fetch a fresh bundle body; a 304 would leave us nothing
        // to patch.
        if is_script && matches!(lowered.as_str(), "if-modified-since" | "if-none-match") {
            continue;
        }
        upstream_request = upstream_request.header(name, value);
    }

    let upstream = upstream_request.send().await?;
    let status = upstream.status();
    let upstream_headers = upstream.headers().clone();
    let body = upstream.bytes().await?;

    let (body, transformed) = if status == StatusCode::NOT_MODIFIED {
        debug!(%path, "passing 304 through unmodified");
        (body, false)
    } else if is_script && status.is_success() {
        let text = utf8_body(body, &path)?;
        let out = apply_chain(&state.script_chain, ProgramText::script(text))?;
        debug!(%path, "script bundle transformed");
        (Bytes::from(out.into_string()), true)
    } else if is_document && status.is_success() {
        let text = utf8_body(body, &path)?;
        let out = apply_chain(&state.markup_chain, ProgramText::markup(text))?;
        debug!(%path, "document transformed");
        (Bytes::from(out.into_string()), true)
    } else {
        (body, false)
    };

    let mut builder = Response::builder().status(status);
    for (name, value) in upstream_headers.iter() {
        let lowered = name.as_str();
        if matches!(lowered, "content-length" | "transfer-encoding" | "connection") {
            continue;
        }
        // A transformed body invalidates the upstream's validators.
        if transformed && matches!(lowered, "etag" | "last-modified" | "content-encoding") {
            continue;
        }
        builder = builder.header(name, value);
    }
    builder
        .body(Body::from(body))
        .map_err(|e| E2eError::Proxy(format!("failed to assemble response: {e}")))
}

fn wants_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .map(|accept| {
            accept
                .split(',')
                .any(|part| part.trim().starts_with("text/html"))
        })
        .unwrap_or(false)
}

fn utf8_body(body: Bytes, path: &str) -> E2eResult<String> {
    String::from_utf8(body.to_vec())
        .map_err(|_| E2eError::Proxy(format!("body of `{path}` was not valid UTF-8 text")))
}

fn apply_chain(chain: &[BodyTransformer], body: ProgramText) -> E2eResult<ProgramText> {
    chain.iter().try_fold(body, |current, transform| transform(&current))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn transformers_apply_in_registration_order() {
        let chain: Vec<BodyTransformer> = vec![
            Box::new(|t| Ok(t.with_text(format!("{}a", t.as_str())))),
            Box::new(|t| Ok(t.with_text(format!("{}b", t.as_str())))),
            Box::new(|t| Ok(t.with_text(format!("{}c", t.as_str())))),
        ];
        let out = apply_chain(&chain, ProgramText::markup("x")).unwrap();
        assert_eq!(out.as_str(), "xabc");
    }

    #[test]
    fn a_failing_transformer_stops_the_chain() {
        let chain: Vec<BodyTransformer> = vec![
            Box::new(|_| Err(E2eError::Proxy("boom".into()))),
            Box::new(|t| Ok(t.with_text("should not run"))),
        ];
        assert!(apply_chain(&chain, ProgramText::markup("x")).is_err());
    }

    #[test]
    fn accept_header_gates_the_document_chain() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml"),
        );
        assert!(wants_html(&headers));

        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        assert!(!wants_html(&headers));

        headers.remove(header::ACCEPT);
        assert!(!wants_html(&headers));
    }

    #[test]
    fn standard_chains_patch_markup_and_script() {
        let proxy = standard_interception(ProxyConfig::default());
        let page = ProgramText::markup("<html><head></head><body></body></html>");
        let out = apply_chain(&proxy.markup_chain, page).unwrap();
        assert!(out.as_str().contains("window.E2E_TEST_HELPERS"));

        // an unpatchable bundle is a hard failure, not a silent pass-through
        let bundle = ProgramText::script("var nothing = 0;");
        assert!(apply_chain(&proxy.script_chain, bundle).is_err());
    }
}
