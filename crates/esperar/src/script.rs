//! Typed script capabilities.
//!
//! JavaScript-injection helpers (date overrides, canvas pixel reads, shadow
//! DOM probes, programmatic clicks) are modeled as [`RemoteScript`] values
//! with a typed output contract per script, so a test double can stub exact
//! return shapes instead of free-form string payloads.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::locator::{Locator, Selector};
use crate::result::{EsperarError, EsperarResult};
use crate::session::Session;

/// One JavaScript capability with a typed result.
///
/// `source()` renders the page-context expression, `decode` turns the raw
/// JSON value the session returns into the script's output type.
pub trait RemoteScript {
    /// Decoded result type
    type Output;

    /// Render the JavaScript expression to execute
    fn source(&self) -> String;

    /// Human-readable description for logs and errors
    fn describe(&self) -> String;

    /// Decode the session's raw return value
    ///
    /// # Errors
    ///
    /// Returns an error when the value does not match the script's contract.
    fn decode(&self, value: serde_json::Value) -> EsperarResult<Self::Output>;
}

/// Execute a script against the session and decode its result.
///
/// # Errors
///
/// Propagates session execution failures and decode failures.
pub fn run_script<S, R>(session: &S, script: &R) -> EsperarResult<R::Output>
where
    S: Session + ?Sized,
    R: RemoteScript,
{
    debug!("executing script: {}", script.describe());
    let value = session.execute(&script.source())?;
    script.decode(value)
}

// ============================================================================
// DATE OVERRIDE
// ============================================================================

/// Pin the page's `Date` to a fixed instant and timezone offset.
///
/// Installs a `Date` subclass so `Date.now()` and zero-argument
/// `new Date()` return the pinned epoch, and `getTimezoneOffset()` returns
/// the configured value. The native constructor is stashed so
/// [`ClearDateOverride`] can restore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateOverride {
    /// Milliseconds since the Unix epoch
    pub epoch_ms: i64,
    /// Minutes returned by `getTimezoneOffset()` (positive west of UTC)
    pub tz_offset_minutes: i32,
}

impl DateOverride {
    /// Create an override at the given epoch and timezone offset
    #[must_use]
    pub const fn new(epoch_ms: i64, tz_offset_minutes: i32) -> Self {
        Self {
            epoch_ms,
            tz_offset_minutes,
        }
    }

    /// Parse an RFC 3339 datetime into an override carrying its instant and
    /// offset
    ///
    /// # Errors
    ///
    /// Returns [`EsperarError::InvalidArgument`] when the string is not
    /// valid RFC 3339.
    pub fn from_iso(iso: &str) -> EsperarResult<Self> {
        let parsed =
            DateTime::parse_from_rfc3339(iso).map_err(|e| EsperarError::InvalidArgument {
                message: format!("invalid RFC 3339 datetime {iso:?}: {e}"),
            })?;
        Ok(Self {
            epoch_ms: parsed.timestamp_millis(),
            // JS getTimezoneOffset is minutes behind UTC
            tz_offset_minutes: -(parsed.offset().local_minus_utc() / 60),
        })
    }
}

impl RemoteScript for DateOverride {
    type Output = ();

    fn source(&self) -> String {
        format!(
            r"(() => {{
  if (!window.__esperarNativeDate) {{ window.__esperarNativeDate = Date; }}
  const NativeDate = window.__esperarNativeDate;
  const epoch = {epoch};
  const tz = {tz};
  class PinnedDate extends NativeDate {{
    constructor(...args) {{
      if (args.length === 0) {{ super(epoch); }} else {{ super(...args); }}
    }}
    static now() {{ return epoch; }}
    getTimezoneOffset() {{ return tz; }}
  }}
  window.Date = PinnedDate;
  return true;
}})()",
            epoch = self.epoch_ms,
            tz = self.tz_offset_minutes
        )
    }

    fn describe(&self) -> String {
        format!(
            "pin Date to epoch {}ms (tz offset {}min)",
            self.epoch_ms, self.tz_offset_minutes
        )
    }

    fn decode(&self, _value: serde_json::Value) -> EsperarResult<()> {
        Ok(())
    }
}

/// Restore the page's native `Date` constructor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearDateOverride;

impl RemoteScript for ClearDateOverride {
    type Output = ();

    fn source(&self) -> String {
        r"(() => {
  if (window.__esperarNativeDate) {
    window.Date = window.__esperarNativeDate;
    delete window.__esperarNativeDate;
  }
  return true;
})()"
            .to_string()
    }

    fn describe(&self) -> String {
        "restore native Date".to_string()
    }

    fn decode(&self, _value: serde_json::Value) -> EsperarResult<()> {
        Ok(())
    }
}

// ============================================================================
// CANVAS PIXEL
// ============================================================================

/// One RGBA pixel sampled from a canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba {
    /// Red channel
    pub r: u8,
    /// Green channel
    pub g: u8,
    /// Blue channel
    pub b: u8,
    /// Alpha channel
    pub a: u8,
}

/// Read one pixel from a canvas element via `getImageData`
#[derive(Debug, Clone)]
pub struct CanvasPixel {
    /// Canvas element to sample
    pub locator: Locator,
    /// X coordinate in canvas pixels
    pub x: u32,
    /// Y coordinate in canvas pixels
    pub y: u32,
}

impl CanvasPixel {
    /// Create a pixel read at the given canvas coordinates
    #[must_use]
    pub const fn new(locator: Locator, x: u32, y: u32) -> Self {
        Self { locator, x, y }
    }
}

impl RemoteScript for CanvasPixel {
    type Output = Rgba;

    fn source(&self) -> String {
        format!(
            r"(() => {{
  const canvas = {query};
  if (!canvas) {{ return null; }}
  const d = canvas.getContext('2d').getImageData({x}, {y}, 1, 1).data;
  return {{ r: d[0], g: d[1], b: d[2], a: d[3] }};
}})()",
            query = self.locator.selector().to_query(),
            x = self.x,
            y = self.y
        )
    }

    fn describe(&self) -> String {
        format!("canvas pixel ({}, {}) of {}", self.x, self.y, self.locator)
    }

    fn decode(&self, value: serde_json::Value) -> EsperarResult<Rgba> {
        if value.is_null() {
            return Err(EsperarError::not_found(self.locator.to_string()));
        }
        Ok(serde_json::from_value(value)?)
    }
}

// ============================================================================
// SHADOW DOM PROBE
// ============================================================================

/// Result of a shadow-piercing element probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowProbe {
    /// Whether the chain resolved to an element
    pub found: bool,
    /// The element's text content, when found
    pub text: Option<String>,
}

/// Probe for an element behind one or more shadow roots.
///
/// The chain descends one shadow root per hop, null-safe at every step, and
/// reports presence plus text content.
#[derive(Debug, Clone)]
pub struct ShadowQuery {
    selector: Selector,
}

impl ShadowQuery {
    /// Parse a `"host >>> inner"` chain into a probe
    #[must_use]
    pub fn new(chain: &str) -> Self {
        Self {
            selector: Selector::deep(chain),
        }
    }
}

impl RemoteScript for ShadowQuery {
    type Output = ShadowProbe;

    fn source(&self) -> String {
        format!(
            r"(() => {{
  const el = {query};
  return el ? {{ found: true, text: el.textContent }} : {{ found: false, text: null }};
}})()",
            query = self.selector.to_query()
        )
    }

    fn describe(&self) -> String {
        format!("shadow probe {}", self.selector)
    }

    fn decode(&self, value: serde_json::Value) -> EsperarResult<ShadowProbe> {
        Ok(serde_json::from_value(value)?)
    }
}

// ============================================================================
// DIRECT INVOCATION
// ============================================================================

/// Programmatic `.click()` through the hosting document.
///
/// Bypasses hit-testing entirely, so it serves as the fallback when a normal
/// click is intercepted by an overlay.
#[derive(Debug, Clone)]
pub struct DirectClick {
    /// Element to click
    pub locator: Locator,
}

impl DirectClick {
    /// Create a direct click on the given element
    #[must_use]
    pub const fn new(locator: Locator) -> Self {
        Self { locator }
    }
}

impl RemoteScript for DirectClick {
    type Output = ();

    fn source(&self) -> String {
        format!(
            r"(() => {{
  const el = {query};
  if (!el) {{ return false; }}
  el.click();
  return true;
}})()",
            query = self.locator.selector().to_query()
        )
    }

    fn describe(&self) -> String {
        format!("direct click on {}", self.locator)
    }

    fn decode(&self, value: serde_json::Value) -> EsperarResult<()> {
        match value {
            serde_json::Value::Bool(true) => Ok(()),
            serde_json::Value::Bool(false) | serde_json::Value::Null => {
                Err(EsperarError::not_found(self.locator.to_string()))
            }
            other => Err(EsperarError::Script {
                message: format!("unexpected direct-click result: {other}"),
            }),
        }
    }
}

/// Scroll an element into the center of the viewport
#[derive(Debug, Clone)]
pub struct ScrollIntoView {
    /// Element to scroll to
    pub locator: Locator,
}

impl ScrollIntoView {
    /// Create a scroll to the given element
    #[must_use]
    pub const fn new(locator: Locator) -> Self {
        Self { locator }
    }
}

impl RemoteScript for ScrollIntoView {
    type Output = ();

    fn source(&self) -> String {
        format!(
            r"(() => {{
  const el = {query};
  if (!el) {{ return false; }}
  el.scrollIntoView({{ block: 'center', inline: 'center' }});
  return true;
}})()",
            query = self.locator.selector().to_query()
        )
    }

    fn describe(&self) -> String {
        format!("scroll {} into view", self.locator)
    }

    fn decode(&self, value: serde_json::Value) -> EsperarResult<()> {
        match value {
            serde_json::Value::Bool(true) => Ok(()),
            _ => Err(EsperarError::not_found(self.locator.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::FailureKind;
    use crate::session::FakeSession;
    use serde_json::json;

    mod date_tests {
        use super::*;

        #[test]
        fn test_from_iso_utc() {
            let ovr = DateOverride::from_iso("2024-03-01T12:00:00Z").unwrap();
            assert_eq!(ovr.epoch_ms, 1_709_294_400_000);
            assert_eq!(ovr.tz_offset_minutes, 0);
        }

        #[test]
        fn test_from_iso_with_offset() {
            let ovr = DateOverride::from_iso("2024-03-01T12:00:00+02:00").unwrap();
            assert_eq!(ovr.epoch_ms, 1_709_287_200_000);
            // UTC+2 is 120 minutes ahead, so getTimezoneOffset reports -120
            assert_eq!(ovr.tz_offset_minutes, -120);
        }

        #[test]
        fn test_from_iso_rejects_garbage() {
            let err = DateOverride::from_iso("next tuesday").unwrap_err();
            assert_eq!(err.kind(), FailureKind::InvalidArgument);
        }

        #[test]
        fn test_source_pins_epoch_and_offset() {
            let source = DateOverride::new(1_709_294_400_000, -120).source();
            assert!(source.contains("1709294400000"));
            assert!(source.contains("-120"));
            assert!(source.contains("Date.now") || source.contains("static now"));
        }

        #[test]
        fn test_clear_restores_native_constructor() {
            let source = ClearDateOverride.source();
            assert!(source.contains("__esperarNativeDate"));
            assert!(source.contains("window.Date ="));
        }

        #[test]
        fn test_run_against_session() {
            let session = FakeSession::new();
            session.push_script_result(json!(true));
            run_script(&session, &DateOverride::new(0, 0)).unwrap();
            assert_eq!(session.scripts().len(), 1);
        }
    }

    mod canvas_tests {
        use super::*;

        #[test]
        fn test_pixel_decode() {
            let session = FakeSession::new();
            session.push_script_result(json!({"r": 255, "g": 128, "b": 0, "a": 255}));

            let pixel = run_script(
                &session,
                &CanvasPixel::new(Locator::id("board"), 10, 20),
            )
            .unwrap();
            assert_eq!(
                pixel,
                Rgba {
                    r: 255,
                    g: 128,
                    b: 0,
                    a: 255
                }
            );
        }

        #[test]
        fn test_missing_canvas_is_not_found() {
            let session = FakeSession::new();
            session.push_script_result(json!(null));

            let err = run_script(
                &session,
                &CanvasPixel::new(Locator::id("board"), 0, 0),
            )
            .unwrap_err();
            assert_eq!(err.kind(), FailureKind::NotFound);
        }

        #[test]
        fn test_source_embeds_coordinates() {
            let source = CanvasPixel::new(Locator::id("board"), 7, 9).source();
            assert!(source.contains("getImageData(7, 9, 1, 1)"));
            assert!(source.contains("getElementById"));
        }
    }

    mod shadow_tests {
        use super::*;

        #[test]
        fn test_probe_found() {
            let session = FakeSession::new();
            session.push_script_result(json!({"found": true, "text": "OK"}));

            let probe = run_script(&session, &ShadowQuery::new("my-app >>> button")).unwrap();
            assert!(probe.found);
            assert_eq!(probe.text, Some("OK".to_string()));
        }

        #[test]
        fn test_source_descends_shadow_roots() {
            let source = ShadowQuery::new("my-app >>> my-panel >>> button").source();
            assert_eq!(source.matches("shadowRoot").count(), 2);
        }
    }

    mod direct_click_tests {
        use super::*;

        #[test]
        fn test_click_ok() {
            let session = FakeSession::new();
            session.push_script_result(json!(true));
            run_script(&session, &DirectClick::new(Locator::css("button.ok"))).unwrap();
        }

        #[test]
        fn test_click_missing_element() {
            let session = FakeSession::new();
            session.push_script_result(json!(false));

            let err = run_script(&session, &DirectClick::new(Locator::css("button.ok")))
                .unwrap_err();
            assert_eq!(err.kind(), FailureKind::NotFound);
        }

        #[test]
        fn test_click_unexpected_result() {
            let session = FakeSession::new();
            session.push_script_result(json!(42));

            let err = run_script(&session, &DirectClick::new(Locator::css("button.ok")))
                .unwrap_err();
            assert_eq!(err.kind(), FailureKind::Script);
        }
    }

    mod scroll_tests {
        use super::*;

        #[test]
        fn test_scroll_source_centers() {
            let source = ScrollIntoView::new(Locator::css(".row")).source();
            assert!(source.contains("scrollIntoView"));
            assert!(source.contains("center"));
        }

        #[test]
        fn test_scroll_missing_element() {
            let session = FakeSession::new();
            session.push_script_result(json!(false));

            let err = run_script(&session, &ScrollIntoView::new(Locator::css(".row")))
                .unwrap_err();
            assert_eq!(err.kind(), FailureKind::NotFound);
        }
    }
}
