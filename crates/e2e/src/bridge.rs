//! Browser bridge
//!
//! A persistent Playwright page driven from Rust. A small generated driver
//! script runs under `node`, reads one JSON command per stdin line and
//! answers on stdout, so the whole test run works against a single page
//! with one strictly ordered command queue: callers enqueue through the
//! session lock and commands execute in exactly that order, never in
//! parallel. Every DOM query, navigation and wait is one queued command;
//! the Rust side that builds the queue runs freely, effects are observed
//! when the command's reply arrives.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tracing::{debug, warn};

use crate::error::{E2eError, E2eResult};

/// Browser engine to launch
#[derive(Debug, Clone, Copy, Default)]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

/// Element states a wait can target
#[derive(Debug, Clone, Copy, Default)]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl WaitState {
    fn as_str(&self) -> &'static str {
        match self {
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
            WaitState::Attached => "attached",
            WaitState::Detached => "detached",
        }
    }
}

/// Configuration for the browser bridge
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Base URL the page navigates relative to (normally the proxy)
    pub base_url: String,
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
        }
    }
}

/// The queued browser operations every harness component drives.
///
/// [`PageSession`] is the real implementation; tests for the pure harness
/// layers substitute scripted fakes.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn navigate(&self, path: &str) -> E2eResult<()>;
    async fn click(&self, selector: &str) -> E2eResult<()>;
    async fn press_key(&self, key: &str) -> E2eResult<()>;
    async fn type_text(&self, selector: &str, text: &str) -> E2eResult<()>;
    async fn eval(&self, script: &str) -> E2eResult<Value>;
    async fn wait_for(&self, selector: &str, state: WaitState, timeout_ms: u64) -> E2eResult<()>;
    async fn text_content(&self, selector: &str) -> E2eResult<Option<String>>;
    async fn is_visible(&self, selector: &str) -> E2eResult<bool>;
    async fn is_focused(&self, selector: &str) -> E2eResult<bool>;
    async fn count(&self, selector: &str) -> E2eResult<usize>;
    async fn attribute(&self, selector: &str, name: &str) -> E2eResult<Option<String>>;
    async fn screenshot(&self, path: &Path, full_page: bool) -> E2eResult<()>;
}

struct BridgeInner {
    _child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
}

/// A live Playwright page
pub struct PageSession {
    inner: tokio::sync::Mutex<BridgeInner>,
    // Keeps the generated driver script alive for the child's lifetime
    _script_dir: tempfile::TempDir,
}

impl PageSession {
    /// Launch the browser and open one page against `config.base_url`.
    pub async fn launch(config: BridgeConfig) -> E2eResult<Self> {
        Self::check_playwright_installed()?;

        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("driver.js");
        std::fs::write(&script_path, driver_script(&config))?;

        debug!(path = %script_path.display(), "spawning bridge driver");
        let mut child = TokioCommand::new("node")
            .arg(&script_path)
            .current_dir(script_dir.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| E2eError::Bridge(format!("failed to spawn node: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Bridge("bridge stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Bridge("bridge stdout unavailable".into()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!(target: "bridge", "{line}");
                }
            });
        }

        Ok(Self {
            inner: tokio::sync::Mutex::new(BridgeInner {
                _child: child,
                stdin,
                stdout: BufReader::new(stdout).lines(),
                next_id: 1,
            }),
            _script_dir: script_dir,
        })
    }

    fn check_playwright_installed() -> E2eResult<()> {
        let status = std::process::Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    /// Close the page and shut the driver down.
    pub async fn close(&self) -> E2eResult<()> {
        self.send(json!({ "cmd": "close" })).await.map(|_| ())
    }

    /// Enqueue one command and wait for its reply. The session lock is the
    /// command queue: commands run strictly in enqueue order.
    async fn send(&self, mut command: Value) -> E2eResult<Value> {
        let name = command["cmd"].as_str().unwrap_or("?").to_string();
        let mut inner = self.inner.lock().await;
        let id = inner.next_id;
        inner.next_id += 1;
        command["id"] = json!(id);

        let line = serde_json::to_string(&command)?;
        debug!(target: "bridge", %name, id, "sending command");
        inner.stdin.write_all(line.as_bytes()).await?;
        inner.stdin.write_all(b"\n").await?;
        inner.stdin.flush().await?;

        loop {
            let Some(reply_line) = inner.stdout.next_line().await? else {
                return Err(E2eError::Bridge(format!(
                    "bridge exited while waiting for reply to `{name}`"
                )));
            };
            // The driver only writes replies, but a page's console output
            // could leak through; skip anything that isn't our reply.
            let Ok(reply) = serde_json::from_str::<Value>(&reply_line) else {
                continue;
            };
            if reply["id"].as_u64() != Some(id) {
                continue;
            }
            if reply["ok"].as_bool() == Some(true) {
                return Ok(reply.get("value").cloned().unwrap_or(Value::Null));
            }
            return Err(E2eError::Browser {
                command: name,
                message: reply["error"].as_str().unwrap_or("unknown error").to_string(),
            });
        }
    }
}

#[async_trait]
impl Driver for PageSession {
    async fn navigate(&self, path: &str) -> E2eResult<()> {
        self.send(json!({ "cmd": "navigate", "path": path })).await.map(|_| ())
    }

    async fn click(&self, selector: &str) -> E2eResult<()> {
        self.send(json!({ "cmd": "click", "selector": selector, "timeoutMs": 5000 }))
            .await
            .map(|_| ())
    }

    async fn press_key(&self, key: &str) -> E2eResult<()> {
        self.send(json!({ "cmd": "press", "key": key })).await.map(|_| ())
    }

    async fn type_text(&self, selector: &str, text: &str) -> E2eResult<()> {
        self.send(json!({ "cmd": "type", "selector": selector, "text": text }))
            .await
            .map(|_| ())
    }

    async fn eval(&self, script: &str) -> E2eResult<Value> {
        self.send(json!({ "cmd": "eval", "script": script })).await
    }

    async fn wait_for(&self, selector: &str, state: WaitState, timeout_ms: u64) -> E2eResult<()> {
        self.send(json!({
            "cmd": "waitFor",
            "selector": selector,
            "state": state.as_str(),
            "timeoutMs": timeout_ms,
        }))
        .await
        .map(|_| ())
    }

    async fn text_content(&self, selector: &str) -> E2eResult<Option<String>> {
        let value = self
            .send(json!({ "cmd": "textContent", "selector": selector }))
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn is_visible(&self, selector: &str) -> E2eResult<bool> {
        let value = self
            .send(json!({ "cmd": "isVisible", "selector": selector }))
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn is_focused(&self, selector: &str) -> E2eResult<bool> {
        let value = self
            .send(json!({ "cmd": "isFocused", "selector": selector }))
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn count(&self, selector: &str) -> E2eResult<usize> {
        let value = self
            .send(json!({ "cmd": "count", "selector": selector }))
            .await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn attribute(&self, selector: &str, name: &str) -> E2eResult<Option<String>> {
        let value = self
            .send(json!({ "cmd": "attribute", "selector": selector, "name": name }))
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn screenshot(&self, path: &Path, full_page: bool) -> E2eResult<()> {
        self.send(json!({
            "cmd": "screenshot",
            "path": path.to_string_lossy(),
            "fullPage": full_page,
        }))
        .await
        .map(|_| ())
    }
}

/// Generate the node driver script for one session.
fn driver_script(config: &BridgeConfig) -> String {
    format!(
        r#"const readline = require('readline');
const {{ chromium, firefox, webkit }} = require('playwright');

(async () => {{
  const browser = await {browser}.launch({{ headless: {headless} }});
  const context = await browser.newContext({{
    viewport: {{ width: {width}, height: {height} }}
  }});
  const page = await context.newPage();
  const baseUrl = '{base_url}';
  const rl = readline.createInterface({{ input: process.stdin, terminal: false }});
  for await (const line of rl) {{
    const req = JSON.parse(line);
    let reply = {{ id: req.id, ok: true }};
    try {{
      switch (req.cmd) {{
        case 'navigate':
          await page.goto(baseUrl + req.path);
          break;
        case 'click':
          await page.click(req.selector, {{ timeout: req.timeoutMs }});
          break;
        case 'press':
          await page.keyboard.press(req.key);
          break;
        case 'type':
          await page.type(req.selector, req.text, {{ delay: 0 }});
          break;
        case 'waitFor':
          await page.waitForSelector(req.selector, {{ state: req.state, timeout: req.timeoutMs }});
          break;
        case 'eval':
          reply.value = await page.evaluate(req.script);
          if (reply.value === undefined) reply.value = null;
          break;
        case 'textContent':
          reply.value = await page.textContent(req.selector);
          break;
        case 'isVisible':
          reply.value = await page.isVisible(req.selector);
          break;
        case 'isFocused':
          reply.value = await page.$eval(req.selector, (el) => el === document.activeElement);
          break;
        case 'count':
          reply.value = await page.locator(req.selector).count();
          break;
        case 'attribute':
          reply.value = await page.getAttribute(req.selector, req.name);
          break;
        case 'screenshot':
          await page.screenshot({{ path: req.path, fullPage: !!req.fullPage }});
          break;
        case 'close':
          await browser.close();
          process.stdout.write(JSON.stringify(reply) + '\n');
          process.exit(0);
        default:
          throw new Error('unknown command: ' + req.cmd);
      }}
    }} catch (error) {{
      reply = {{ id: req.id, ok: false, error: String((error && error.message) || error) }};
    }}
    process.stdout.write(JSON.stringify(reply) + '\n');
  }}
}})().catch((error) => {{
  process.stderr.write(String((error && error.stack) || error) + '\n');
  process.exit(1);
}});
"#,
        browser = config.browser.as_str(),
        headless = config.headless,
        width = config.viewport_width,
        height = config.viewport_height,
        base_url = config.base_url,
    )
}
