//! Remote session abstraction.
//!
//! A [`Session`] is the external collaborator: a remote browser automation
//! session exposing element lookup, state queries, element actions, script
//! execution, frame/window/alert switching, and navigation. The session is
//! not safe for concurrent use; callers issue at most one command at a time
//! and pass the session explicitly to every operation.
//!
//! [`FakeSession`] is an in-crate scripted implementation for unit testing
//! wait/retry behavior without a browser.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::locator::Locator;
use crate::result::{EsperarError, EsperarResult};

/// Opaque reference to a remote UI node.
///
/// Handles are borrowed for the duration of one operation and may become
/// stale at any time due to page mutation outside this crate's control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Remote session's identifier for the node
    pub id: String,
    /// Element tag name
    pub tag_name: String,
}

impl ElementHandle {
    /// Create a new element handle
    #[must_use]
    pub fn new(id: impl Into<String>, tag_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag_name: tag_name.into(),
        }
    }
}

/// Opaque reference to a browser window or tab
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowHandle(String);

impl WindowHandle {
    /// Create a new window handle
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw handle string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How to pick an option inside a select element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionSpec {
    /// Match the option's value attribute
    Value(String),
    /// Match the option's visible text
    VisibleText(String),
}

impl fmt::Display for OptionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "value={v}"),
            Self::VisibleText(t) => write!(f, "text={t}"),
        }
    }
}

/// Synchronous remote browser session.
///
/// Each method maps to one remote command. Implementations report failures
/// through the [`EsperarError`](crate::EsperarError) taxonomy so wait
/// policies can classify them by kind.
pub trait Session: Send {
    /// Resolve a locator to the first matching element
    fn resolve(&self, locator: &Locator) -> EsperarResult<ElementHandle>;

    /// Resolve a locator to all matching elements
    fn resolve_all(&self, locator: &Locator) -> EsperarResult<Vec<ElementHandle>>;

    /// Check whether the element is rendered visible
    fn is_displayed(&self, handle: &ElementHandle) -> EsperarResult<bool>;

    /// Check whether the element accepts interaction
    fn is_enabled(&self, handle: &ElementHandle) -> EsperarResult<bool>;

    /// Check whether the element (checkbox, radio, option) is selected
    fn is_selected(&self, handle: &ElementHandle) -> EsperarResult<bool>;

    /// Click the element
    fn click(&self, handle: &ElementHandle) -> EsperarResult<()>;

    /// Type text into the element
    fn type_text(&self, handle: &ElementHandle, text: &str) -> EsperarResult<()>;

    /// Clear the element's value
    fn clear(&self, handle: &ElementHandle) -> EsperarResult<()>;

    /// Get the element's text content
    fn text_of(&self, handle: &ElementHandle) -> EsperarResult<String>;

    /// Get an attribute value, if present
    fn attribute(&self, handle: &ElementHandle, name: &str) -> EsperarResult<Option<String>>;

    /// Select an option inside a select element
    fn select_option(&self, handle: &ElementHandle, option: &OptionSpec) -> EsperarResult<()>;

    /// Execute JavaScript in the page context and return its value
    fn execute(&self, script: &str) -> EsperarResult<serde_json::Value>;

    /// Switch the session's context into a frame element
    fn switch_to_frame(&self, handle: &ElementHandle) -> EsperarResult<()>;

    /// Switch the session's context into a frame by index
    fn switch_to_frame_index(&self, index: u16) -> EsperarResult<()>;

    /// Switch the session's context back to the top document
    fn switch_to_default_content(&self) -> EsperarResult<()>;

    /// List all open window handles
    fn window_handles(&self) -> EsperarResult<Vec<WindowHandle>>;

    /// Get the window the session currently drives
    fn current_window(&self) -> EsperarResult<WindowHandle>;

    /// Switch the session to another window
    fn switch_to_window(&self, handle: &WindowHandle) -> EsperarResult<()>;

    /// Close the current window
    fn close_window(&self) -> EsperarResult<()>;

    /// Get the text of the open alert
    fn alert_text(&self) -> EsperarResult<String>;

    /// Accept the open alert
    fn accept_alert(&self) -> EsperarResult<()>;

    /// Dismiss the open alert
    fn dismiss_alert(&self) -> EsperarResult<()>;

    /// Navigate to a URL
    fn goto(&self, url: &str) -> EsperarResult<()>;

    /// Get the current URL
    fn current_url(&self) -> EsperarResult<String>;

    /// Get the current page title
    fn title(&self) -> EsperarResult<String>;

    /// Reload the current page
    fn refresh(&self) -> EsperarResult<()>;

    /// Go back in history
    fn back(&self) -> EsperarResult<()>;

    /// Capture a PNG screenshot of the viewport
    fn screenshot(&self) -> EsperarResult<Vec<u8>>;
}

// ============================================================================
// FAKE SESSION
// ============================================================================

/// Scripted behavior for one element inside a [`FakeSession`]
#[derive(Debug, Clone)]
pub struct FakeElement {
    handle: ElementHandle,
    appears_after: u32,
    displayed_after: u32,
    enabled: bool,
    selected: bool,
    stale_actions: u32,
    stale_checks: u32,
    intercepted_clicks: u32,
    text: String,
    attributes: HashMap<String, String>,
    options: Vec<(String, String)>,
}

impl FakeElement {
    /// Create a new element script
    #[must_use]
    pub fn new(id: impl Into<String>, tag_name: impl Into<String>) -> Self {
        Self {
            handle: ElementHandle::new(id, tag_name),
            appears_after: 0,
            displayed_after: 0,
            enabled: true,
            selected: false,
            stale_actions: 0,
            stale_checks: 0,
            intercepted_clicks: 0,
            text: String::new(),
            attributes: HashMap::new(),
            options: Vec::new(),
        }
    }

    /// Fail the first `n` resolutions with not-found
    #[must_use]
    pub const fn appears_after(mut self, n: u32) -> Self {
        self.appears_after = n;
        self
    }

    /// Report not-displayed for the first `n` visibility checks
    #[must_use]
    pub const fn displayed_after(mut self, n: u32) -> Self {
        self.displayed_after = n;
        self
    }

    /// Set whether the element accepts interaction
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the initial selected state
    #[must_use]
    pub const fn selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    /// Fail the first `n` actions with a stale handle
    #[must_use]
    pub const fn stale_actions(mut self, n: u32) -> Self {
        self.stale_actions = n;
        self
    }

    /// Fail the first `n` state queries with a stale handle
    #[must_use]
    pub const fn stale_checks(mut self, n: u32) -> Self {
        self.stale_checks = n;
        self
    }

    /// Intercept the first `n` clicks
    #[must_use]
    pub const fn intercepted_clicks(mut self, n: u32) -> Self {
        self.intercepted_clicks = n;
        self
    }

    /// Set the element's text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.attributes.insert(name.into(), value.into());
        self
    }

    /// Add a select option as (value, visible text)
    #[must_use]
    pub fn with_option(mut self, value: impl Into<String>, text: impl Into<String>) -> Self {
        self.options.push((value.into(), text.into()));
        self
    }
}

#[derive(Debug)]
struct ElementState {
    behavior: FakeElement,
    resolves: u32,
    displayed_checks: u32,
    stale_actions_left: u32,
    stale_checks_left: u32,
    intercepts_left: u32,
    clicks: u32,
    clears: u32,
    typed: Vec<String>,
    selected: bool,
    selected_option: Option<String>,
}

impl ElementState {
    fn new(behavior: FakeElement) -> Self {
        Self {
            resolves: 0,
            displayed_checks: 0,
            stale_actions_left: behavior.stale_actions,
            stale_checks_left: behavior.stale_checks,
            intercepts_left: behavior.intercepted_clicks,
            clicks: 0,
            clears: 0,
            typed: Vec::new(),
            selected: behavior.selected,
            selected_option: None,
            behavior,
        }
    }

    fn action_gate(&mut self) -> EsperarResult<()> {
        if self.stale_actions_left > 0 {
            self.stale_actions_left -= 1;
            return Err(EsperarError::stale(self.behavior.handle.id.clone()));
        }
        Ok(())
    }

    fn check_gate(&mut self) -> EsperarResult<()> {
        if self.stale_checks_left > 0 {
            self.stale_checks_left -= 1;
            return Err(EsperarError::stale(self.behavior.handle.id.clone()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct FakeWindow {
    handle: WindowHandle,
    title: String,
    url: String,
}

#[derive(Debug)]
struct FakeInner {
    elements: HashMap<String, ElementState>,
    windows: Vec<FakeWindow>,
    current_window: usize,
    frame: Option<String>,
    alert: Option<String>,
    accepted_alerts: Vec<String>,
    dismissed_alerts: Vec<String>,
    script_results: VecDeque<serde_json::Value>,
    scripts: Vec<String>,
    screenshot: Vec<u8>,
    calls: Vec<String>,
}

/// Scripted in-memory session for unit tests.
///
/// Elements are registered per locator with a behavior script
/// ([`FakeElement`]) controlling when they appear, when they report
/// displayed, and which transient failures to inject. All interactions are
/// recorded for verification.
#[derive(Debug)]
pub struct FakeSession {
    inner: Mutex<FakeInner>,
}

impl Default for FakeSession {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSession {
    /// Create a new fake session with a single blank window
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(FakeInner {
                elements: HashMap::new(),
                windows: vec![FakeWindow {
                    handle: WindowHandle::new("main"),
                    title: String::new(),
                    url: "about:blank".to_string(),
                }],
                current_window: 0,
                frame: None,
                alert: None,
                accepted_alerts: Vec::new(),
                dismissed_alerts: Vec::new(),
                script_results: VecDeque::new(),
                scripts: Vec::new(),
                screenshot: Vec::new(),
                calls: Vec::new(),
            }),
        }
    }

    fn locked(&self) -> MutexGuard<'_, FakeInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn key(locator: &Locator) -> String {
        locator.selector().to_string()
    }

    /// Register an element behind a locator
    pub fn add_element(&self, locator: &Locator, behavior: FakeElement) {
        let mut inner = self.locked();
        let _ = inner
            .elements
            .insert(Self::key(locator), ElementState::new(behavior));
    }

    fn with_element<T>(
        &self,
        handle: &ElementHandle,
        f: impl FnOnce(&mut ElementState) -> EsperarResult<T>,
    ) -> EsperarResult<T> {
        let mut inner = self.locked();
        let state = inner
            .elements
            .values_mut()
            .find(|s| s.behavior.handle.id == handle.id)
            .ok_or_else(|| EsperarError::stale(handle.id.clone()))?;
        f(state)
    }

    /// Number of successful clicks delivered to the element
    #[must_use]
    pub fn clicks(&self, locator: &Locator) -> u32 {
        self.locked()
            .elements
            .get(&Self::key(locator))
            .map_or(0, |s| s.clicks)
    }

    /// Number of resolve attempts made for the locator
    #[must_use]
    pub fn resolve_attempts(&self, locator: &Locator) -> u32 {
        self.locked()
            .elements
            .get(&Self::key(locator))
            .map_or(0, |s| s.resolves)
    }

    /// Number of visibility checks made against the element
    #[must_use]
    pub fn displayed_checks(&self, locator: &Locator) -> u32 {
        self.locked()
            .elements
            .get(&Self::key(locator))
            .map_or(0, |s| s.displayed_checks)
    }

    /// Text typed into the element, in order
    #[must_use]
    pub fn typed(&self, locator: &Locator) -> Vec<String> {
        self.locked()
            .elements
            .get(&Self::key(locator))
            .map_or_else(Vec::new, |s| s.typed.clone())
    }

    /// Number of clears delivered to the element
    #[must_use]
    pub fn clears(&self, locator: &Locator) -> u32 {
        self.locked()
            .elements
            .get(&Self::key(locator))
            .map_or(0, |s| s.clears)
    }

    /// Currently selected option value, if any
    #[must_use]
    pub fn selected_option(&self, locator: &Locator) -> Option<String> {
        self.locked()
            .elements
            .get(&Self::key(locator))
            .and_then(|s| s.selected_option.clone())
    }

    /// Current selected state of the element
    #[must_use]
    pub fn is_checked(&self, locator: &Locator) -> bool {
        self.locked()
            .elements
            .get(&Self::key(locator))
            .is_some_and(|s| s.selected)
    }

    /// Queue a result for the next script execution
    pub fn push_script_result(&self, value: serde_json::Value) {
        self.locked().script_results.push_back(value);
    }

    /// All scripts executed so far, in order
    #[must_use]
    pub fn scripts(&self) -> Vec<String> {
        self.locked().scripts.clone()
    }

    /// Open an alert with the given message
    pub fn set_alert(&self, message: impl Into<String>) {
        self.locked().alert = Some(message.into());
    }

    /// Alerts accepted so far
    #[must_use]
    pub fn accepted_alerts(&self) -> Vec<String> {
        self.locked().accepted_alerts.clone()
    }

    /// Alerts dismissed so far
    #[must_use]
    pub fn dismissed_alerts(&self) -> Vec<String> {
        self.locked().dismissed_alerts.clone()
    }

    /// Open an additional window
    pub fn open_window(&self, id: impl Into<String>, title: impl Into<String>) {
        self.locked().windows.push(FakeWindow {
            handle: WindowHandle::new(id),
            title: title.into(),
            url: "about:blank".to_string(),
        });
    }

    /// Set the current window's title
    pub fn set_title(&self, title: impl Into<String>) {
        let mut inner = self.locked();
        let idx = inner.current_window;
        if let Some(window) = inner.windows.get_mut(idx) {
            window.title = title.into();
        }
    }

    /// Set the screenshot bytes returned by [`Session::screenshot`]
    pub fn set_screenshot(&self, data: Vec<u8>) {
        self.locked().screenshot = data;
    }

    /// The frame the session currently drives, if any
    #[must_use]
    pub fn current_frame(&self) -> Option<String> {
        self.locked().frame.clone()
    }

    /// Every session call recorded so far
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.locked().calls.clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.locked().calls.push(call.into());
    }
}

impl Session for FakeSession {
    fn resolve(&self, locator: &Locator) -> EsperarResult<ElementHandle> {
        self.record(format!("resolve:{locator}"));
        let mut inner = self.locked();
        let key = Self::key(locator);
        let Some(state) = inner.elements.get_mut(&key) else {
            return Err(EsperarError::not_found(locator.to_string()));
        };
        state.resolves += 1;
        if state.resolves <= state.behavior.appears_after {
            return Err(EsperarError::not_found(locator.to_string()));
        }
        Ok(state.behavior.handle.clone())
    }

    fn resolve_all(&self, locator: &Locator) -> EsperarResult<Vec<ElementHandle>> {
        self.record(format!("resolve_all:{locator}"));
        let mut inner = self.locked();
        let key = Self::key(locator);
        let Some(state) = inner.elements.get_mut(&key) else {
            return Ok(Vec::new());
        };
        state.resolves += 1;
        if state.resolves <= state.behavior.appears_after {
            return Ok(Vec::new());
        }
        Ok(vec![state.behavior.handle.clone()])
    }

    fn is_displayed(&self, handle: &ElementHandle) -> EsperarResult<bool> {
        self.with_element(handle, |state| {
            state.check_gate()?;
            state.displayed_checks += 1;
            Ok(state.displayed_checks > state.behavior.displayed_after)
        })
    }

    fn is_enabled(&self, handle: &ElementHandle) -> EsperarResult<bool> {
        self.with_element(handle, |state| {
            state.check_gate()?;
            Ok(state.behavior.enabled)
        })
    }

    fn is_selected(&self, handle: &ElementHandle) -> EsperarResult<bool> {
        self.with_element(handle, |state| {
            state.check_gate()?;
            Ok(state.selected)
        })
    }

    fn click(&self, handle: &ElementHandle) -> EsperarResult<()> {
        self.record(format!("click:{}", handle.id));
        self.with_element(handle, |state| {
            state.action_gate()?;
            if state.intercepts_left > 0 {
                state.intercepts_left -= 1;
                return Err(EsperarError::intercepted(state.behavior.handle.id.clone()));
            }
            state.clicks += 1;
            state.selected = !state.selected;
            Ok(())
        })
    }

    fn type_text(&self, handle: &ElementHandle, text: &str) -> EsperarResult<()> {
        self.record(format!("type:{}", handle.id));
        let text = text.to_string();
        self.with_element(handle, move |state| {
            state.action_gate()?;
            state.typed.push(text);
            Ok(())
        })
    }

    fn clear(&self, handle: &ElementHandle) -> EsperarResult<()> {
        self.record(format!("clear:{}", handle.id));
        self.with_element(handle, |state| {
            state.action_gate()?;
            state.clears += 1;
            Ok(())
        })
    }

    fn text_of(&self, handle: &ElementHandle) -> EsperarResult<String> {
        self.with_element(handle, |state| {
            state.action_gate()?;
            Ok(state.behavior.text.clone())
        })
    }

    fn attribute(&self, handle: &ElementHandle, name: &str) -> EsperarResult<Option<String>> {
        let name = name.to_string();
        self.with_element(handle, move |state| {
            Ok(state.behavior.attributes.get(&name).cloned())
        })
    }

    fn select_option(&self, handle: &ElementHandle, option: &OptionSpec) -> EsperarResult<()> {
        self.record(format!("select:{}:{option}", handle.id));
        let option = option.clone();
        self.with_element(handle, move |state| {
            state.action_gate()?;
            let found = state.behavior.options.iter().find(|(value, text)| match &option {
                OptionSpec::Value(v) => value == v,
                OptionSpec::VisibleText(t) => text == t,
            });
            match found {
                Some((value, _)) => {
                    state.selected_option = Some(value.clone());
                    Ok(())
                }
                None => Err(EsperarError::not_found(format!(
                    "option {option} in {}",
                    state.behavior.handle.tag_name
                ))),
            }
        })
    }

    fn execute(&self, script: &str) -> EsperarResult<serde_json::Value> {
        let mut inner = self.locked();
        inner.scripts.push(script.to_string());
        inner.calls.push("execute".to_string());
        Ok(inner
            .script_results
            .pop_front()
            .unwrap_or(serde_json::Value::Null))
    }

    fn switch_to_frame(&self, handle: &ElementHandle) -> EsperarResult<()> {
        self.record(format!("switch_to_frame:{}", handle.id));
        self.locked().frame = Some(handle.id.clone());
        Ok(())
    }

    fn switch_to_frame_index(&self, index: u16) -> EsperarResult<()> {
        self.record(format!("switch_to_frame_index:{index}"));
        self.locked().frame = Some(format!("index:{index}"));
        Ok(())
    }

    fn switch_to_default_content(&self) -> EsperarResult<()> {
        self.record("switch_to_default_content");
        self.locked().frame = None;
        Ok(())
    }

    fn window_handles(&self) -> EsperarResult<Vec<WindowHandle>> {
        Ok(self
            .locked()
            .windows
            .iter()
            .map(|w| w.handle.clone())
            .collect())
    }

    fn current_window(&self) -> EsperarResult<WindowHandle> {
        let inner = self.locked();
        inner
            .windows
            .get(inner.current_window)
            .map(|w| w.handle.clone())
            .ok_or_else(|| EsperarError::NoSuchWindow {
                description: "no window open".to_string(),
            })
    }

    fn switch_to_window(&self, handle: &WindowHandle) -> EsperarResult<()> {
        self.record(format!("switch_to_window:{handle}"));
        let mut inner = self.locked();
        match inner.windows.iter().position(|w| &w.handle == handle) {
            Some(idx) => {
                inner.current_window = idx;
                Ok(())
            }
            None => Err(EsperarError::NoSuchWindow {
                description: handle.to_string(),
            }),
        }
    }

    fn close_window(&self) -> EsperarResult<()> {
        self.record("close_window");
        let mut inner = self.locked();
        let idx = inner.current_window;
        if idx >= inner.windows.len() {
            return Err(EsperarError::NoSuchWindow {
                description: "no window open".to_string(),
            });
        }
        let _ = inner.windows.remove(idx);
        inner.current_window = 0;
        Ok(())
    }

    fn alert_text(&self) -> EsperarResult<String> {
        self.locked().alert.clone().ok_or(EsperarError::NoAlert)
    }

    fn accept_alert(&self) -> EsperarResult<()> {
        let mut inner = self.locked();
        match inner.alert.take() {
            Some(message) => {
                inner.accepted_alerts.push(message);
                Ok(())
            }
            None => Err(EsperarError::NoAlert),
        }
    }

    fn dismiss_alert(&self) -> EsperarResult<()> {
        let mut inner = self.locked();
        match inner.alert.take() {
            Some(message) => {
                inner.dismissed_alerts.push(message);
                Ok(())
            }
            None => Err(EsperarError::NoAlert),
        }
    }

    fn goto(&self, url: &str) -> EsperarResult<()> {
        self.record(format!("goto:{url}"));
        let mut inner = self.locked();
        let idx = inner.current_window;
        if let Some(window) = inner.windows.get_mut(idx) {
            window.url = url.to_string();
        }
        Ok(())
    }

    fn current_url(&self) -> EsperarResult<String> {
        let inner = self.locked();
        Ok(inner
            .windows
            .get(inner.current_window)
            .map(|w| w.url.clone())
            .unwrap_or_default())
    }

    fn title(&self) -> EsperarResult<String> {
        let inner = self.locked();
        Ok(inner
            .windows
            .get(inner.current_window)
            .map(|w| w.title.clone())
            .unwrap_or_default())
    }

    fn refresh(&self) -> EsperarResult<()> {
        self.record("refresh");
        Ok(())
    }

    fn back(&self) -> EsperarResult<()> {
        self.record("back");
        Ok(())
    }

    fn screenshot(&self) -> EsperarResult<Vec<u8>> {
        self.record("screenshot");
        Ok(self.locked().screenshot.clone())
    }
}
