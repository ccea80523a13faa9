//! Test support: a scripted in-memory driver
//!
//! The harness layers above the bridge (clock, state cache, elements,
//! scenarios) are pure sequencing logic; [`FakeDriver`] lets their tests
//! run without a browser by recording every queued command and answering
//! value-returning commands from scripted queues.

use std::collections::VecDeque;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::bridge::{Driver, WaitState};
use crate::error::E2eResult;

/// Driver double that records commands and replays scripted answers
#[derive(Default)]
pub struct FakeDriver {
    commands: Mutex<Vec<String>>,
    eval_results: Mutex<VecDeque<Value>>,
    attributes: Mutex<VecDeque<Option<String>>>,
    texts: Mutex<VecDeque<Option<String>>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next `eval` result.
    pub fn push_eval_result(&self, value: Value) {
        self.eval_results.lock().push_back(value);
    }

    /// Queue the next `attribute` answer.
    pub fn push_attribute(&self, value: Option<&str>) {
        self.attributes.lock().push_back(value.map(str::to_string));
    }

    /// Queue the next `text_content` answer.
    pub fn push_text(&self, value: Option<&str>) {
        self.texts.lock().push_back(value.map(str::to_string));
    }

    /// Every command queued so far, in enqueue order.
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }

    fn record(&self, command: String) {
        self.commands.lock().push(command);
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn navigate(&self, path: &str) -> E2eResult<()> {
        self.record(format!("navigate {path}"));
        Ok(())
    }

    async fn click(&self, selector: &str) -> E2eResult<()> {
        self.record(format!("click {selector}"));
        Ok(())
    }

    async fn press_key(&self, key: &str) -> E2eResult<()> {
        self.record(format!("press {key}"));
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> E2eResult<()> {
        self.record(format!("type {selector} {text}"));
        Ok(())
    }

    async fn eval(&self, script: &str) -> E2eResult<Value> {
        self.record(format!("eval {script}"));
        Ok(self
            .eval_results
            .lock()
            .pop_front()
            .unwrap_or(Value::Null))
    }

    async fn wait_for(&self, selector: &str, _state: WaitState, _timeout_ms: u64) -> E2eResult<()> {
        self.record(format!("waitFor {selector}"));
        Ok(())
    }

    async fn text_content(&self, selector: &str) -> E2eResult<Option<String>> {
        self.record(format!("textContent {selector}"));
        Ok(self.texts.lock().pop_front().flatten())
    }

    async fn is_visible(&self, selector: &str) -> E2eResult<bool> {
        self.record(format!("isVisible {selector}"));
        Ok(true)
    }

    async fn is_focused(&self, selector: &str) -> E2eResult<bool> {
        self.record(format!("isFocused {selector}"));
        Ok(true)
    }

    async fn count(&self, selector: &str) -> E2eResult<usize> {
        self.record(format!("count {selector}"));
        Ok(1)
    }

    async fn attribute(&self, selector: &str, name: &str) -> E2eResult<Option<String>> {
        self.record(format!("attribute {selector} {name}"));
        Ok(self.attributes.lock().pop_front().flatten())
    }

    async fn screenshot(&self, path: &Path, _full_page: bool) -> E2eResult<()> {
        self.record(format!("screenshot {}", path.display()));
        Ok(())
    }
}
