//! Browser-side helper installation
//!
//! The helper script below is injected into the served document's head and
//! installs a global registry object the patched bundle reports into. The
//! registry has a two-phase lifecycle: until the patched code registers a
//! model updater, forcing a model from test code is an error; until the
//! patched code sets a model for the first time, reading one is an error.
//! Test code must never touch the `internal` namespace — that side belongs
//! to the patched bundle.

use cubedrill_common::{ProgramText, TextKind};

use crate::error::{PatchError, PatchResult};

/// Name of the global registry object installed on `window`.
pub const HELPERS_GLOBAL: &str = "E2E_TEST_HELPERS";

/// The helper script installed into the document head.
///
/// Besides the model registry it wraps the timer functions so pending
/// handles can be cleared when a model is forced (stale timers must not
/// fire against a replaced model), tracks which document event names have
/// active listeners so tests can wait for the UI to finish
/// (re)subscribing, overrides event timestamps so mocked time is
/// respected, and carries the installable deterministic clock the harness
/// drives through `clock.install` / `clock.tick` / `clock.setTime`.
pub const HELPER_SCRIPT: &str = r#"(function () {
  "use strict";
  var documentEventListeners = trackDocumentEventListeners();
  var model = null;
  var modelUpdater = null;

  var timeoutIds = [];
  var intervalIds = [];

  function clearAllTimers() {
    timeoutIds.forEach(function (id) { window.clearTimeout(id); });
    timeoutIds = [];
    intervalIds.forEach(function (id) { window.clearInterval(id); });
    intervalIds = [];
  }

  var originalSetTimeout = window.setTimeout;
  window.setTimeout = function () {
    var id = originalSetTimeout.apply(window, arguments);
    timeoutIds.push(id);
    return id;
  };
  var originalSetInterval = window.setInterval;
  window.setInterval = function () {
    var id = originalSetInterval.apply(window, arguments);
    intervalIds.push(id);
    return id;
  };

  window.E2E_TEST_HELPERS = {
    getModel: function () {
      if (model === null) {
        throw new Error("Model was attempted to be accessed before it has been set");
      }
      return model;
    },
    setModel: function (newModel) {
      if (modelUpdater === null) {
        throw new Error("Model attempted to be set before a model updater has been registered");
      }
      modelUpdater(newModel);
      clearAllTimers();
      model = newModel;
    },
    getDocumentEventListeners: function () {
      return Array.from(documentEventListeners.values());
    },
    internal: {
      setModel: function (newModel) { model = newModel; },
      registerModelUpdater: function (updater) { modelUpdater = updater; }
    },
    clock: makeClock()
  };

  function trackDocumentEventListeners() {
    var eventListeners = new Set();
    var add = document.addEventListener;
    var remove = document.removeEventListener;
    var documentCreationTime = Date.now();

    document.addEventListener = function (eventName, eventListener, options) {
      eventListeners.add(eventName);
      // The native timestamp is created outside Date.now, so it would
      // ignore the installed clock without this override.
      var listenerWithTimestampOverriding = function (e) {
        if (!e.timeStampModified) {
          e.timeStampModified = true;
          var newTimestamp = Date.now() - documentCreationTime;
          Object.defineProperty(e, "timeStamp", {
            get: function () { return newTimestamp; }
          });
          if (typeof eventListener === "object" && "handleEvent" in eventListener) {
            eventListener.handleEvent(e);
          } else {
            eventListener(e);
          }
        }
      };
      add.call(this, eventName, listenerWithTimestampOverriding, options);
    };
    document.removeEventListener = function (eventName, eventListener, options) {
      eventListeners.delete(eventName);
      remove.call(this, eventName, eventListener, options);
    };
    return eventListeners;
  }

  function makeClock() {
    var installed = false;
    var virtualNow = 0;
    var nextHandle = 100000;
    var scheduled = [];

    function requireInstalled() {
      if (!installed) {
        throw new Error("Can't call a clock method before the clock was installed");
      }
    }
    function addTimer(callback, delay, repeats) {
      var handle = nextHandle++;
      scheduled.push({
        handle: handle,
        callback: callback,
        dueAt: virtualNow + (delay || 0),
        interval: repeats ? Math.max(delay || 0, 1) : null
      });
      if (repeats) { intervalIds.push(handle); } else { timeoutIds.push(handle); }
      return handle;
    }
    function removeTimer(handle) {
      scheduled = scheduled.filter(function (t) { return t.handle !== handle; });
    }
    function earliest() {
      return scheduled.reduce(function (best, t) {
        return best === null || t.dueAt < best.dueAt ? t : best;
      }, null);
    }
    function fireOne(timer) {
      if (timer.dueAt > virtualNow) { virtualNow = timer.dueAt; }
      if (timer.interval === null) {
        removeTimer(timer.handle);
      } else {
        timer.dueAt = timer.dueAt + timer.interval;
      }
      timer.callback();
    }

    return {
      install: function () {
        if (installed) {
          throw new Error("Clock was already installed");
        }
        installed = true;
        virtualNow = Date.now();
        window.setTimeout = function (callback, delay) { return addTimer(callback, delay, false); };
        window.setInterval = function (callback, delay) { return addTimer(callback, delay, true); };
        window.clearTimeout = function (handle) { removeTimer(handle); };
        window.clearInterval = function (handle) { removeTimer(handle); };
        Date.now = function () { return virtualNow; };
      },
      tick: function (ms) {
        requireInstalled();
        var target = virtualNow + ms;
        for (;;) {
          var next = earliest();
          if (next === null || next.dueAt > target) { break; }
          fireOne(next);
        }
        virtualNow = target;
      },
      setTime: function (ms) {
        requireInstalled();
        virtualNow = ms;
        var next = earliest();
        if (next !== null) { fireOne(next); }
      },
      now: function () {
        requireInstalled();
        return virtualNow;
      }
    };
  }
}())"#;

/// Install the helper script into the document head.
pub fn inject_helpers(markup: &ProgramText) -> PatchResult<ProgramText> {
    if markup.kind() != TextKind::Markup {
        return Err(PatchError::WrongTextKind {
            expected: "markup",
            got: "script",
        });
    }
    let text = markup.as_str();
    let Some(head) = text.find("<head>") else {
        return Err(PatchError::MissingHeadTag);
    };
    let insert_at = head + "<head>".len();
    let mut out = String::with_capacity(text.len() + HELPER_SCRIPT.len() + 32);
    out.push_str(&text[..insert_at]);
    out.push_str("<script>");
    out.push_str(HELPER_SCRIPT);
    out.push_str("</script>");
    out.push_str(&text[insert_at..]);
    Ok(markup.with_text(out))
}

/// Flip the served markup's test-mode switches: enable the test-mode flag
/// wherever it appears and replace the swallowed error handler with one
/// that surfaces application errors as test failures.
pub fn test_mode_overrides(markup: &ProgramText) -> PatchResult<ProgramText> {
    if markup.kind() != TextKind::Markup {
        return Err(PatchError::WrongTextKind {
            expected: "markup",
            got: "script",
        });
    }
    let flipped = markup
        .as_str()
        .replace("false/*E2E_TEST_MODE*/", "true")
        .replacen(
            "() => {}/*HANDLE_ERROR_E2E*/",
            "x => {throw new Error(x)}",
            1,
        );
    Ok(markup.with_text(flipped))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "<!DOCTYPE html><html><head><title>t</title></head>\
        <body><script>var handleError = () => {}/*HANDLE_ERROR_E2E*/;\
        var testMode = false/*E2E_TEST_MODE*/;\
        var other = false/*E2E_TEST_MODE*/;</script></body></html>";

    #[test]
    fn helper_script_lands_directly_after_head_open() {
        let out = inject_helpers(&ProgramText::markup(PAGE)).unwrap();
        let text = out.as_str();
        assert!(text.starts_with("<!DOCTYPE html><html><head><script>(function () {"));
        assert!(text.contains("</script><title>t</title>"));
        // the rest of the document is untouched
        assert!(text.ends_with("</script></body></html>"));
    }

    #[test]
    fn markup_without_a_head_is_rejected() {
        let err = inject_helpers(&ProgramText::markup("<html><body></body></html>")).unwrap_err();
        assert!(matches!(err, PatchError::MissingHeadTag));
    }

    #[test]
    fn test_mode_flags_flip_everywhere_error_handler_once() {
        let out = test_mode_overrides(&ProgramText::markup(PAGE)).unwrap();
        let text = out.as_str();
        assert!(!text.contains("false/*E2E_TEST_MODE*/"));
        assert_eq!(text.matches("var testMode = true;").count(), 1);
        assert!(text.contains("var handleError = x => {throw new Error(x)};"));
    }

    #[test]
    fn script_input_is_rejected() {
        let err = inject_helpers(&ProgramText::script("var x;")).unwrap_err();
        assert!(matches!(err, PatchError::WrongTextKind { .. }));
    }
}
