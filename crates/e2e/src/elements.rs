//! Page-object DSL
//!
//! Declarative element descriptions over the app's `data-testid`
//! attributes, producing getters, waiters and visibility/focus assertions.
//! Elements come in three kinds: plain nodes, cube renderings (which are
//! only meaningful once the cube has actually been painted) and error
//! messages (which carry an alert role). Categories group the elements of
//! one page behind a shared container so member lookups cannot leak into
//! other pages; the root category additionally exposes the app's discrete
//! state attribute with an enumerated domain.

use tracing::debug;

use cubedrill_patch::HELPERS_GLOBAL;

use crate::bridge::{Driver, WaitState};
use crate::error::{E2eError, E2eResult};

pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 5000;

/// What kind of node an element is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Plain,
    Cube,
    ErrorMessage,
}

/// One registered element of a page
#[derive(Debug, Clone, Copy)]
pub struct Element {
    test_id: &'static str,
    kind: ElementKind,
    optional: bool,
    container: Option<&'static str>,
}

impl Element {
    pub fn test_id(&self) -> &'static str {
        self.test_id
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// CSS selector for this element, scoped to its container when it has
    /// one.
    pub fn selector(&self) -> String {
        let own = match self.kind {
            ElementKind::Plain => format!("[data-testid={}]", self.test_id),
            // a cube node exists before its rendering finishes; only the
            // painted state counts
            ElementKind::Cube => {
                format!("[data-testid={}][data-cube-displayed=true]", self.test_id)
            }
            ElementKind::ErrorMessage => format!("[data-testid={}][role=alert]", self.test_id),
        };
        match self.container {
            Some(container) => format!("[data-testid={container}] {own}"),
            None => own,
        }
    }

    pub async fn wait_for(&self, driver: &dyn Driver) -> E2eResult<()> {
        driver
            .wait_for(&self.selector(), WaitState::Visible, DEFAULT_WAIT_TIMEOUT_MS)
            .await
    }

    pub async fn click(&self, driver: &dyn Driver) -> E2eResult<()> {
        driver.click(&self.selector()).await
    }

    pub async fn type_text(&self, driver: &dyn Driver, text: &str) -> E2eResult<()> {
        driver.type_text(&self.selector(), text).await
    }

    pub async fn text(&self, driver: &dyn Driver) -> E2eResult<String> {
        driver
            .text_content(&self.selector())
            .await?
            .ok_or_else(|| E2eError::Assertion(format!("`{}` has no text content", self.test_id)))
    }

    pub async fn assert_shown(&self, driver: &dyn Driver) -> E2eResult<()> {
        if !driver.is_visible(&self.selector()).await? {
            return Err(E2eError::Assertion(format!(
                "expected `{}` to be visible",
                self.test_id
            )));
        }
        Ok(())
    }

    pub async fn assert_absent(&self, driver: &dyn Driver) -> E2eResult<()> {
        let count = driver.count(&self.selector()).await?;
        if count != 0 {
            return Err(E2eError::Assertion(format!(
                "expected `{}` to not exist, found {count}",
                self.test_id
            )));
        }
        Ok(())
    }

    pub async fn assert_focused(&self, driver: &dyn Driver) -> E2eResult<()> {
        if !driver.is_focused(&self.selector()).await? {
            return Err(E2eError::Assertion(format!(
                "expected `{}` to have focus",
                self.test_id
            )));
        }
        Ok(())
    }

    pub async fn assert_text(&self, driver: &dyn Driver, expected: &str) -> E2eResult<()> {
        let actual = self.text(driver).await?;
        if actual != expected {
            return Err(E2eError::Assertion(format!(
                "`{}` shows {actual:?}, expected {expected:?}",
                self.test_id
            )));
        }
        Ok(())
    }
}

/// A named group of elements sharing one container element
pub struct ElementCategory {
    container: Element,
    members: Vec<Element>,
}

impl ElementCategory {
    pub fn new(container_id: &'static str) -> Self {
        Self {
            container: Element {
                test_id: container_id,
                kind: ElementKind::Plain,
                optional: false,
                container: None,
            },
            members: Vec::new(),
        }
    }

    pub fn container(&self) -> Element {
        self.container
    }

    fn add(&mut self, test_id: &'static str, kind: ElementKind, optional: bool) -> Element {
        let element = Element {
            test_id,
            kind,
            optional,
            container: Some(self.container.test_id),
        };
        self.members.push(element);
        element
    }

    pub fn plain(&mut self, test_id: &'static str) -> Element {
        self.add(test_id, ElementKind::Plain, false)
    }

    pub fn cube(&mut self, test_id: &'static str) -> Element {
        self.add(test_id, ElementKind::Cube, false)
    }

    pub fn optional(&mut self, test_id: &'static str) -> Element {
        self.add(test_id, ElementKind::Plain, true)
    }

    /// Error messages only exist while their error is active.
    pub fn error_message(&mut self, test_id: &'static str) -> Element {
        self.add(test_id, ElementKind::ErrorMessage, true)
    }

    /// Assert the container and every non-optional member is visible.
    pub async fn assert_all_shown(&self, driver: &dyn Driver) -> E2eResult<()> {
        self.container.assert_shown(driver).await?;
        for member in self.members.iter().filter(|m| !m.is_optional()) {
            member.assert_shown(driver).await?;
        }
        Ok(())
    }
}

/// The app's root element, exposing a discrete state attribute with an
/// enumerated domain.
pub struct RootCategory {
    test_id: &'static str,
    state_attribute: &'static str,
    values: &'static [&'static str],
}

impl RootCategory {
    pub fn new(test_id: &'static str, values: &'static [&'static str]) -> Self {
        Self {
            test_id,
            state_attribute: "data-app-state",
            values,
        }
    }

    fn selector(&self) -> String {
        format!("[data-testid={}]", self.test_id)
    }

    /// Current value of the state attribute; values outside the enumerated
    /// domain mean the page map is stale and fail immediately.
    pub async fn state_value(&self, driver: &dyn Driver) -> E2eResult<String> {
        let value = driver
            .attribute(&self.selector(), self.state_attribute)
            .await?
            .ok_or_else(|| {
                E2eError::Assertion(format!(
                    "root `{}` carries no `{}` attribute",
                    self.test_id, self.state_attribute
                ))
            })?;
        self.require_known(&value)?;
        debug!(state = %value, "read root state");
        Ok(value)
    }

    /// Wait until the state attribute holds anything but `value`.
    pub async fn wait_for_state_change_away_from(
        &self,
        driver: &dyn Driver,
        value: &str,
    ) -> E2eResult<()> {
        self.require_known(value)?;
        let selector = format!(
            "[data-testid={}]:not([{}={}])",
            self.test_id, self.state_attribute, value
        );
        driver
            .wait_for(&selector, WaitState::Visible, DEFAULT_WAIT_TIMEOUT_MS)
            .await
    }

    fn require_known(&self, value: &str) -> E2eResult<()> {
        if !self.values.contains(&value) {
            return Err(E2eError::UnknownStateValue {
                value: value.to_string(),
            });
        }
        Ok(())
    }
}

/// Wait until every one of `events` has at least one active document
/// listener, polling the injected helper. The UI registering its
/// listeners is the observable end of a (re)subscription pass.
pub async fn wait_for_document_event_listeners(
    driver: &dyn Driver,
    events: &[&str],
    timeout_ms: u64,
) -> E2eResult<()> {
    let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_millis(timeout_ms);
    let script = format!("window.{HELPERS_GLOBAL}.getDocumentEventListeners()");
    loop {
        let value = driver.eval(&script).await?;
        let active: Vec<&str> = value
            .as_array()
            .map(|list| list.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default();
        if events.iter().all(|event| active.contains(event)) {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(E2eError::Timeout(format!(
                "document listeners {events:?}, currently active: {active:?}"
            )));
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDriver;

    #[test]
    fn selectors_scope_to_the_container_and_kind() {
        let mut page = ElementCategory::new("evaluate-test-result-container");
        let button = page.plain("correct-button");
        let cube = page.cube("expected-cube-front");
        let error = page.error_message("input-required");

        assert_eq!(
            button.selector(),
            "[data-testid=evaluate-test-result-container] [data-testid=correct-button]"
        );
        assert_eq!(
            cube.selector(),
            "[data-testid=evaluate-test-result-container] \
             [data-testid=expected-cube-front][data-cube-displayed=true]"
        );
        assert_eq!(
            error.selector(),
            "[data-testid=evaluate-test-result-container] \
             [data-testid=input-required][role=alert]"
        );
    }

    #[tokio::test]
    async fn assert_all_shown_skips_optional_members() {
        let mut page = ElementCategory::new("correct-container");
        let _next = page.plain("next-button");
        let _good_job = page.optional("good-job-text");

        let driver = FakeDriver::new();
        page.assert_all_shown(&driver).await.unwrap();
        let commands = driver.commands();
        assert_eq!(commands.len(), 2); // container + next-button only
        assert!(commands.iter().all(|c| !c.contains("good-job-text")));
    }

    #[tokio::test]
    async fn state_values_outside_the_domain_are_rejected() {
        let root = RootCategory::new("trainer-root", &["start-page", "test-running-state"]);
        let driver = FakeDriver::new();
        driver.push_attribute(Some("totally-new-page"));
        let err = root.state_value(&driver).await.unwrap_err();
        assert!(matches!(err, E2eError::UnknownStateValue { .. }));

        let err = root
            .wait_for_state_change_away_from(&driver, "not-a-state")
            .await
            .unwrap_err();
        assert!(matches!(err, E2eError::UnknownStateValue { .. }));
    }

    #[tokio::test]
    async fn state_change_wait_uses_a_negated_selector() {
        let root = RootCategory::new("trainer-root", &["start-page", "test-running-state"]);
        let driver = FakeDriver::new();
        root.wait_for_state_change_away_from(&driver, "start-page")
            .await
            .unwrap();
        assert_eq!(
            driver.commands(),
            vec!["waitFor [data-testid=trainer-root]:not([data-app-state=start-page])"]
        );
    }

    #[tokio::test]
    async fn listener_wait_resolves_once_events_are_active() {
        let driver = FakeDriver::new();
        driver.push_eval_result(serde_json::json!(["mousedown"]));
        driver.push_eval_result(serde_json::json!(["mousedown", "keydown"]));
        wait_for_document_event_listeners(&driver, &["keydown", "mousedown"], 1000)
            .await
            .unwrap();
        assert_eq!(driver.commands().len(), 2);
    }
}
