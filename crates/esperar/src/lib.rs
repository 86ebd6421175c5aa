//! Esperar: Page Object base for browser-driven UI test automation.
//!
//! Esperar (Spanish: "to wait") wraps an abstract remote browser session
//! with the one thing flaky UI tests need done right: a bounded
//! **wait-and-act** contract. Every element operation resolves a locator,
//! polls a readiness condition, then performs its action exactly once, with
//! one re-resolve for a stale handle and one fallback for an intercepted
//! click.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     ESPERAR Architecture                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌─────────────┐    ┌──────────────┐      │
//! │   │ PageObject │    │ wait-and-   │    │ Session      │      │
//! │   │ + Locators │───►│ act core    │───►│ (remote      │      │
//! │   │            │    │ (poll/retry)│    │  browser)    │      │
//! │   └────────────┘    └─────────────┘    └──────────────┘      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The session is always passed explicitly; there is no ambient global
//! handle, so a [`FakeSession`] can stand in for the browser in unit tests.

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod dialog;
pub mod frame;
pub mod locator;
pub mod page;
pub mod result;
pub mod script;
pub mod session;
pub mod wait;

pub use dialog::{alert_text, handle_alert, DialogAction};
pub use frame::{
    switch_to_default_content, switch_to_frame, switch_to_new_window, switch_to_window_titled,
    wait_for_window_count, FrameTarget,
};
pub use locator::{Locator, Selector};
pub use page::{
    attribute, click, is_at, open, read_text, select_option, set_checkbox, type_text,
    wait_displayed, wait_enabled, wait_hidden, PageObject, UrlMatcher,
};
pub use result::{EsperarError, EsperarResult, FailureKind};
pub use script::{
    run_script, CanvasPixel, ClearDateOverride, DateOverride, DirectClick, RemoteScript, Rgba,
    ScrollIntoView, ShadowProbe, ShadowQuery,
};
pub use session::{ElementHandle, FakeElement, FakeSession, OptionSpec, Session, WindowHandle};
pub use wait::{
    wait_and_act, wait_and_act_with_fallback, wait_for, wait_until, WaitPolicy,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_TIMEOUT_MS,
};
