//! Interception proxy tests against a real upstream
//!
//! Spins up a plain axum server with a fixture document and bundle, puts
//! the interception proxy in front of it, and checks what the browser
//! would actually receive.

use axum::http::{header, StatusCode};
use axum::routing::get;
use axum::Router;

use cubedrill_e2e::proxy::{standard_interception, ProxyConfig};

const PAGE: &str = "<!DOCTYPE html><html><head><title>trainer</title></head>\
    <body><script>var testMode = false/*E2E_TEST_MODE*/;\
    var handleError = () => {}/*HANDLE_ERROR_E2E*/;</script></body></html>";

// An unminified bundle with the state handoff and the randomness manager,
// the two sites the standard script chain rewrites.
const BUNDLE: &str = "\
var app = window.app || {};

function _Platform_initialize(flagDecoder, args, init, update, subscriptions, stepperBuilder)
{
\tvar managers = {};
\tvar initPair = init(args);
\tvar model = initPair.a;
\tvar stepper = stepperBuilder(sendToApp, model);
\tvar ports = _Platform_setupEffects(managers, sendToApp);

\tfunction sendToApp(msg, viewMetadata)
\t{
\t\tvar pair = A2(update, msg, model);
\t\tstepper(model = pair.a, viewMetadata);
\t\t_Platform_enqueueEffects(managers, pair.b, subscriptions(model));
\t}

\t_Platform_enqueueEffects(managers, initPair.b, subscriptions(model));

\treturn ports ? { ports: ports } : {};
}

function _Platform_setupEffects(managers, sendToApp)
{
\treturn { ready: true };
}

_Platform_effectManagers['Random'] = _Platform_createManager($app$random$Random$init, $app$random$Random$onEffects, $app$random$Random$onSelfMsg, $app$random$Random$cmdMap);

var $app$random$Random$init = A2(
\t$app$core$Task$andThen,
\tfunction (time) {
\t\treturn $app$core$Task$succeed(
\t\t\t$app$random$Random$initialSeed(
\t\t\t\t$app$time$Time$posixToMillis(time)));
\t},
\t$app$time$Time$now);
";

async fn spawn_upstream() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = Router::new()
        .route("/", get(|| async { axum::response::Html(PAGE) }))
        .route(
            "/main.js",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "application/javascript")],
                    BUNDLE,
                )
            }),
        )
        .route("/cached", get(|| async { StatusCode::NOT_MODIFIED }))
        .route("/data.json", get(|| async { "{\"plain\":true}" }))
        .route("/reload/reload.js", get(|| async { "reload()" }));
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn spawn_proxy() -> cubedrill_e2e::proxy::ProxyHandle {
    let upstream = spawn_upstream().await;
    standard_interception(ProxyConfig {
        upstream,
        ..ProxyConfig::default()
    })
    .spawn()
    .await
    .unwrap()
}

#[tokio::test]
async fn documents_get_the_helper_and_test_mode_flips() {
    let proxy = spawn_proxy().await;
    let client = reqwest::Client::new();

    let body = client
        .get(proxy.base_url())
        .header(header::ACCEPT, "text/html,application/xhtml+xml")
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(body.contains("<head><script>(function () {"));
    assert!(body.contains("window.E2E_TEST_HELPERS"));
    assert!(body.contains("var testMode = true;"));
    assert!(body.contains("x => {throw new Error(x)}"));
    proxy.ensure_no_reload().unwrap();
}

#[tokio::test]
async fn the_bundle_is_patched_and_seeded() {
    let proxy = spawn_proxy().await;
    let client = reqwest::Client::new();

    let body = client
        .get(format!("{}/main.js", proxy.base_url()))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    // observers on both model assignment sites plus the updater hook
    assert_eq!(body.matches("internal.setModel(").count(), 2);
    assert!(body.contains("internal.registerModelUpdater("));
    // the randomness seed is pinned
    assert!(body.contains("$app$random$Random$initialSeed(0))"));
    assert!(!body.contains("posixToMillis"));
    // text before the initialize function is untouched
    assert!(body.starts_with("var app = window.app || {};"));
}

#[tokio::test]
async fn non_html_responses_pass_through_untouched() {
    let proxy = spawn_proxy().await;
    let client = reqwest::Client::new();

    let body = client
        .get(format!("{}/data.json", proxy.base_url()))
        .header(header::ACCEPT, "application/json")
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "{\"plain\":true}");
}

#[tokio::test]
async fn not_modified_responses_pass_through_unmodified() {
    let proxy = spawn_proxy().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/cached", proxy.base_url()))
        .header(header::ACCEPT, "text/html")
        .send()
        .await
        .unwrap();
    // a 304 has no body to patch; it must not become a transform error
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
}

#[tokio::test]
async fn requesting_the_reload_probe_fails_the_run() {
    let proxy = spawn_proxy().await;
    let client = reqwest::Client::new();

    proxy.ensure_no_reload().unwrap();
    let response = client
        .get(format!("{}/reload/reload.js", proxy.base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(proxy.ensure_no_reload().is_err());
}
