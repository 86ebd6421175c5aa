//! Page Object surface.
//!
//! Page objects encapsulate the structure of one UI page: a URL pattern, an
//! optional readiness marker, and the locators its flows interact with. The
//! free functions here are the element operations every page object builds
//! on; each one is a parameterization of the wait-and-act core and takes the
//! session explicitly, so a single fake session can drive a whole page in
//! tests.

use std::collections::HashMap;
use tracing::info;

use crate::locator::Locator;
use crate::result::EsperarResult;
use crate::script::{run_script, DirectClick};
use crate::session::{ElementHandle, OptionSpec, Session};
use crate::wait::{wait_and_act, wait_and_act_with_fallback, wait_for, WaitPolicy};

/// A page or component in the UI under test.
///
/// Implementations hold their locators and expose flow methods that thread
/// a session through the element operations in this module.
pub trait PageObject {
    /// URL pattern matching this page (e.g., `/login`, `/users/:id`)
    fn url_pattern(&self) -> &str;

    /// Element whose visibility marks the page as loaded, if any
    fn ready_marker(&self) -> Option<&Locator> {
        None
    }

    /// Wait policy used while loading the page
    fn load_policy(&self) -> WaitPolicy {
        WaitPolicy::new()
    }

    /// Page name for logging and diagnostics
    fn page_name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Navigate to a URL and wait for the page's readiness marker.
///
/// # Errors
///
/// Propagates navigation failures and a timeout if the marker never becomes
/// visible within the page's load policy.
pub fn open<S, P>(session: &S, page: &P, url: &str) -> EsperarResult<()>
where
    S: Session + ?Sized,
    P: PageObject,
{
    info!("opening {} at {url}", page.page_name());
    session.goto(url)?;
    if let Some(marker) = page.ready_marker() {
        let _ = wait_displayed(session, marker, &page.load_policy())?;
    }
    Ok(())
}

/// Check whether the session's current URL matches the page's pattern.
///
/// # Errors
///
/// Propagates session failures from the URL query.
pub fn is_at<S, P>(session: &S, page: &P) -> EsperarResult<bool>
where
    S: Session + ?Sized,
    P: PageObject,
{
    let url = session.current_url()?;
    Ok(UrlMatcher::new(page.url_pattern()).matches(url_path(&url)))
}

/// Path component of a URL: scheme, host, query, and fragment stripped
fn url_path(url: &str) -> &str {
    let after_scheme = url.find("://").map_or(url, |i| {
        let rest = &url[i + 3..];
        rest.find('/').map_or("/", |j| &rest[j..])
    });
    let end = after_scheme
        .find(['?', '#'])
        .unwrap_or(after_scheme.len());
    &after_scheme[..end]
}

// ============================================================================
// ELEMENT OPERATIONS
// ============================================================================

/// Wait until the element is displayed and enabled, then click it.
///
/// An intercepted click falls back once to a programmatic `.click()` through
/// the document; a stale handle earns one re-resolve and retry.
///
/// # Errors
///
/// Returns a timeout naming the locator, or the click/fallback failure.
pub fn click<S>(session: &S, locator: &Locator, policy: &WaitPolicy) -> EsperarResult<()>
where
    S: Session + ?Sized,
{
    let fallback = DirectClick::new(locator.clone());
    wait_and_act_with_fallback(
        session,
        &format!("{locator} to be clickable"),
        policy,
        |s: &S| s.resolve(locator),
        |s: &S, h: &ElementHandle| Ok(s.is_displayed(h)? && s.is_enabled(h)?),
        |s: &S, h: &ElementHandle| s.click(h),
        |s: &S, _: &ElementHandle| run_script(s, &fallback),
    )
}

/// Wait until the element is displayed, clear it, then type into it.
///
/// # Errors
///
/// Returns a timeout naming the locator, or the session failure.
pub fn type_text<S>(
    session: &S,
    locator: &Locator,
    text: &str,
    policy: &WaitPolicy,
) -> EsperarResult<()>
where
    S: Session + ?Sized,
{
    wait_and_act(
        session,
        &format!("{locator} to accept input"),
        policy,
        |s: &S| s.resolve(locator),
        |s: &S, h: &ElementHandle| s.is_displayed(h),
        |s: &S, h: &ElementHandle| {
            s.clear(h)?;
            s.type_text(h, text)
        },
    )
}

/// Wait until the element is displayed, then read its text content.
///
/// # Errors
///
/// Returns a timeout naming the locator, or the session failure.
pub fn read_text<S>(session: &S, locator: &Locator, policy: &WaitPolicy) -> EsperarResult<String>
where
    S: Session + ?Sized,
{
    wait_and_act(
        session,
        &format!("{locator} to show text"),
        policy,
        |s: &S| s.resolve(locator),
        |s: &S, h: &ElementHandle| s.is_displayed(h),
        |s: &S, h: &ElementHandle| s.text_of(h),
    )
}

/// Wait until the element exists, then read an attribute.
///
/// # Errors
///
/// Returns a timeout naming the locator, or the session failure.
pub fn attribute<S>(
    session: &S,
    locator: &Locator,
    name: &str,
    policy: &WaitPolicy,
) -> EsperarResult<Option<String>>
where
    S: Session + ?Sized,
{
    wait_and_act(
        session,
        &format!("{locator} to be present"),
        policy,
        |s: &S| s.resolve(locator),
        |_: &S, _: &ElementHandle| Ok(true),
        |s: &S, h: &ElementHandle| s.attribute(h, name),
    )
}

/// Wait until the select element is interactable, then pick an option.
///
/// A missing option surfaces as [`NotFound`](crate::EsperarError::NotFound)
/// from the action; it is not absorbed by the wait.
///
/// # Errors
///
/// Returns a timeout naming the locator, or the selection failure.
pub fn select_option<S>(
    session: &S,
    locator: &Locator,
    option: &OptionSpec,
    policy: &WaitPolicy,
) -> EsperarResult<()>
where
    S: Session + ?Sized,
{
    wait_and_act(
        session,
        &format!("{locator} to accept selection"),
        policy,
        |s: &S| s.resolve(locator),
        |s: &S, h: &ElementHandle| Ok(s.is_displayed(h)? && s.is_enabled(h)?),
        |s: &S, h: &ElementHandle| s.select_option(h, option),
    )
}

/// Bring a checkbox to the desired state, clicking only when it differs.
///
/// # Errors
///
/// Returns a timeout naming the locator, or the session failure.
pub fn set_checkbox<S>(
    session: &S,
    locator: &Locator,
    checked: bool,
    policy: &WaitPolicy,
) -> EsperarResult<()>
where
    S: Session + ?Sized,
{
    wait_and_act(
        session,
        &format!("{locator} to be interactable"),
        policy,
        |s: &S| s.resolve(locator),
        |s: &S, h: &ElementHandle| Ok(s.is_displayed(h)? && s.is_enabled(h)?),
        |s: &S, h: &ElementHandle| {
            if s.is_selected(h)? == checked {
                Ok(())
            } else {
                s.click(h)
            }
        },
    )
}

/// Wait until the element is displayed and return its handle.
///
/// # Errors
///
/// Returns a timeout naming the locator.
pub fn wait_displayed<S>(
    session: &S,
    locator: &Locator,
    policy: &WaitPolicy,
) -> EsperarResult<ElementHandle>
where
    S: Session + ?Sized,
{
    wait_and_act(
        session,
        &format!("{locator} to be displayed"),
        policy,
        |s: &S| s.resolve(locator),
        |s: &S, h: &ElementHandle| s.is_displayed(h),
        |_: &S, h: &ElementHandle| Ok(h.clone()),
    )
}

/// Wait until the element is enabled and return its handle.
///
/// # Errors
///
/// Returns a timeout naming the locator.
pub fn wait_enabled<S>(
    session: &S,
    locator: &Locator,
    policy: &WaitPolicy,
) -> EsperarResult<ElementHandle>
where
    S: Session + ?Sized,
{
    wait_and_act(
        session,
        &format!("{locator} to be enabled"),
        policy,
        |s: &S| s.resolve(locator),
        |s: &S, h: &ElementHandle| s.is_enabled(h),
        |_: &S, h: &ElementHandle| Ok(h.clone()),
    )
}

/// Wait until the element is hidden.
///
/// An element that cannot be resolved, or whose handle went stale, counts
/// as hidden.
///
/// # Errors
///
/// Returns a timeout naming the locator if the element stays visible.
pub fn wait_hidden<S>(session: &S, locator: &Locator, policy: &WaitPolicy) -> EsperarResult<()>
where
    S: Session + ?Sized,
{
    wait_for(
        session,
        &format!("{locator} to be hidden"),
        policy,
        |s: &S| match s.resolve(locator) {
            Ok(handle) => match s.is_displayed(&handle) {
                Ok(true) => Ok(None),
                Ok(false) => Ok(Some(())),
                Err(err) if err.is_transient() => Ok(Some(())),
                Err(err) => Err(err),
            },
            Err(err) if err.is_transient() => Ok(Some(())),
            Err(err) => Err(err),
        },
    )
}

// ============================================================================
// URL MATCHING
// ============================================================================

/// URL pattern matcher for page objects.
///
/// Patterns are slash-separated segments: literals (`/login`), wildcards
/// (`/users/*`), and named parameters (`/users/:id`). Wildcards and
/// parameters each consume exactly one segment.
#[derive(Debug, Clone)]
pub struct UrlMatcher {
    pattern: String,
    segments: Vec<UrlSegment>,
}

#[derive(Debug, Clone)]
enum UrlSegment {
    Literal(String),
    Wildcard,
    Parameter(String),
}

impl UrlMatcher {
    /// Parse a pattern into a matcher
    #[must_use]
    pub fn new(pattern: &str) -> Self {
        let segments = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| {
                if s == "*" {
                    UrlSegment::Wildcard
                } else if let Some(name) = s.strip_prefix(':') {
                    UrlSegment::Parameter(name.to_string())
                } else {
                    UrlSegment::Literal(s.to_string())
                }
            })
            .collect();
        Self {
            pattern: pattern.to_string(),
            segments,
        }
    }

    /// Check if a URL path matches the pattern
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        let parts: Vec<&str> = url.split('/').filter(|s| !s.is_empty()).collect();
        if parts.len() != self.segments.len() {
            return false;
        }
        self.segments.iter().zip(&parts).all(|(segment, part)| {
            match segment {
                UrlSegment::Literal(lit) => lit == part,
                UrlSegment::Wildcard | UrlSegment::Parameter(_) => true,
            }
        })
    }

    /// Extract named parameter values from a URL path
    #[must_use]
    pub fn extract_params(&self, url: &str) -> HashMap<String, String> {
        let parts: Vec<&str> = url.split('/').filter(|s| !s.is_empty()).collect();
        self.segments
            .iter()
            .zip(&parts)
            .filter_map(|(segment, part)| match segment {
                UrlSegment::Parameter(name) => Some((name.clone(), (*part).to_string())),
                _ => None,
            })
            .collect()
    }

    /// Get the original pattern
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::FailureKind;
    use crate::session::{FakeElement, FakeSession};
    use std::time::Duration;

    fn fast_policy() -> WaitPolicy {
        WaitPolicy::new()
            .with_timeout(Duration::from_millis(300))
            .with_poll_interval(Duration::from_millis(10))
    }

    mod operation_tests {
        use super::*;

        #[test]
        fn test_click_waits_for_displayed_and_enabled() {
            let session = FakeSession::new();
            let locator = Locator::css("button.save");
            session.add_element(&locator, FakeElement::new("b1", "button").displayed_after(2));

            click(&session, &locator, &fast_policy()).unwrap();
            assert_eq!(session.clicks(&locator), 1);
            assert_eq!(session.displayed_checks(&locator), 3);
        }

        #[test]
        fn test_click_on_disabled_times_out() {
            let session = FakeSession::new();
            let locator = Locator::css("button.save");
            session.add_element(&locator, FakeElement::new("b1", "button").enabled(false));

            let err = click(&session, &locator, &fast_policy()).unwrap_err();
            assert_eq!(err.kind(), FailureKind::Timeout);
            assert_eq!(session.clicks(&locator), 0);
        }

        #[test]
        fn test_intercepted_click_falls_back_to_script() {
            let session = FakeSession::new();
            let locator = Locator::css("button.save");
            session.add_element(
                &locator,
                FakeElement::new("b1", "button").intercepted_clicks(1),
            );
            session.push_script_result(serde_json::json!(true));

            click(&session, &locator, &fast_policy()).unwrap();

            assert_eq!(session.clicks(&locator), 0);
            let scripts = session.scripts();
            assert_eq!(scripts.len(), 1);
            assert!(scripts[0].contains(".click()"));
        }

        #[test]
        fn test_type_text_clears_first() {
            let session = FakeSession::new();
            let locator = Locator::id("username");
            session.add_element(&locator, FakeElement::new("i1", "input"));

            type_text(&session, &locator, "alice", &fast_policy()).unwrap();

            assert_eq!(session.clears(&locator), 1);
            assert_eq!(session.typed(&locator), vec!["alice".to_string()]);
        }

        #[test]
        fn test_read_text() {
            let session = FakeSession::new();
            let locator = Locator::css(".status");
            session.add_element(&locator, FakeElement::new("s1", "span").with_text("ready"));

            let text = read_text(&session, &locator, &fast_policy()).unwrap();
            assert_eq!(text, "ready");
        }

        #[test]
        fn test_attribute() {
            let session = FakeSession::new();
            let locator = Locator::css("a.next");
            session.add_element(
                &locator,
                FakeElement::new("a1", "a").with_attribute("href", "/page/2"),
            );

            let href = attribute(&session, &locator, "href", &fast_policy()).unwrap();
            assert_eq!(href, Some("/page/2".to_string()));
        }

        #[test]
        fn test_select_option_missing_surfaces_not_found() {
            let session = FakeSession::new();
            let locator = Locator::id("country");
            session.add_element(
                &locator,
                FakeElement::new("sel", "select").with_option("de", "Germany"),
            );

            let err = select_option(
                &session,
                &locator,
                &OptionSpec::VisibleText("Atlantis".into()),
                &fast_policy(),
            )
            .unwrap_err();
            assert_eq!(err.kind(), FailureKind::NotFound);
        }

        #[test]
        fn test_set_checkbox_clicks_only_on_change() {
            let session = FakeSession::new();
            let locator = Locator::id("subscribe");
            session.add_element(&locator, FakeElement::new("c1", "input").selected(false));

            set_checkbox(&session, &locator, true, &fast_policy()).unwrap();
            assert_eq!(session.clicks(&locator), 1);
            assert!(session.is_checked(&locator));

            // already in the desired state
            set_checkbox(&session, &locator, true, &fast_policy()).unwrap();
            assert_eq!(session.clicks(&locator), 1);
        }

        #[test]
        fn test_wait_hidden_missing_element_counts_as_hidden() {
            let session = FakeSession::new();
            wait_hidden(&session, &Locator::css(".spinner"), &fast_policy()).unwrap();
        }

        #[test]
        fn test_wait_hidden_visible_element_times_out() {
            let session = FakeSession::new();
            let locator = Locator::css(".modal");
            session.add_element(&locator, FakeElement::new("m1", "div"));

            let err = wait_hidden(&session, &locator, &fast_policy()).unwrap_err();
            assert_eq!(err.kind(), FailureKind::Timeout);
        }

        #[test]
        fn test_wait_enabled_returns_handle() {
            let session = FakeSession::new();
            let locator = Locator::css("button");
            session.add_element(&locator, FakeElement::new("b1", "button"));

            let handle = wait_enabled(&session, &locator, &fast_policy()).unwrap();
            assert_eq!(handle.id, "b1");
        }
    }

    mod page_object_tests {
        use super::*;

        struct LoginPage {
            form: Locator,
        }

        impl LoginPage {
            fn new() -> Self {
                Self {
                    form: Locator::id("login-form").described("login form"),
                }
            }
        }

        impl PageObject for LoginPage {
            fn url_pattern(&self) -> &str {
                "/login"
            }

            fn ready_marker(&self) -> Option<&Locator> {
                Some(&self.form)
            }

            fn load_policy(&self) -> WaitPolicy {
                WaitPolicy::new()
                    .with_timeout(Duration::from_millis(300))
                    .with_poll_interval(Duration::from_millis(10))
            }
        }

        #[test]
        fn test_open_waits_for_ready_marker() {
            let session = FakeSession::new();
            let page = LoginPage::new();
            session.add_element(&page.form, FakeElement::new("f1", "form").appears_after(2));

            open(&session, &page, "https://example.com/login").unwrap();

            assert_eq!(
                session.current_url().unwrap(),
                "https://example.com/login"
            );
            assert!(session.resolve_attempts(&page.form) >= 3);
        }

        #[test]
        fn test_open_times_out_when_marker_never_appears() {
            let session = FakeSession::new();
            let page = LoginPage::new();

            let err = open(&session, &page, "https://example.com/login").unwrap_err();
            assert_eq!(err.kind(), FailureKind::Timeout);
            assert!(err.to_string().contains("login form"));
        }

        #[test]
        fn test_is_at_matches_path() {
            let session = FakeSession::new();
            let page = LoginPage::new();
            session.goto("https://example.com/login?next=%2Fhome").unwrap();

            assert!(is_at(&session, &page).unwrap());

            session.goto("https://example.com/signup").unwrap();
            assert!(!is_at(&session, &page).unwrap());
        }

        #[test]
        fn test_page_name_defaults_to_type() {
            let page = LoginPage::new();
            assert!(page.page_name().contains("LoginPage"));
        }
    }

    mod url_tests {
        use super::*;

        #[test]
        fn test_url_path_strips_scheme_host_query() {
            assert_eq!(url_path("https://example.com/users/42?tab=posts"), "/users/42");
            assert_eq!(url_path("https://example.com"), "/");
            assert_eq!(url_path("/plain/path#section"), "/plain/path");
        }

        #[test]
        fn test_literal_match() {
            let matcher = UrlMatcher::new("/login");
            assert!(matcher.matches("/login"));
            assert!(!matcher.matches("/register"));
            assert!(!matcher.matches("/login/extra"));
        }

        #[test]
        fn test_wildcard_consumes_one_segment() {
            let matcher = UrlMatcher::new("/users/*");
            assert!(matcher.matches("/users/123"));
            assert!(!matcher.matches("/users"));
            assert!(!matcher.matches("/users/123/posts"));
        }

        #[test]
        fn test_extract_params() {
            let matcher = UrlMatcher::new("/users/:id/posts/:post_id");
            let params = matcher.extract_params("/users/42/posts/100");
            assert_eq!(params.get("id"), Some(&"42".to_string()));
            assert_eq!(params.get("post_id"), Some(&"100".to_string()));
        }

        #[test]
        fn test_pattern_getter() {
            assert_eq!(UrlMatcher::new("/a/:b").pattern(), "/a/:b");
        }
    }
}
