//! Locator abstraction for element selection.
//!
//! A [`Locator`] is a declarative query resolved against the remote document
//! at lookup time; it carries no handle and never goes stale. Selectors can
//! also render themselves as JavaScript query expressions for the
//! script-based helpers (Shadow DOM descent, direct invocation).

use std::fmt;

/// Selector type for locating elements
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// CSS selector (e.g., "button.primary")
    Css(String),
    /// Element id attribute
    Id(String),
    /// XPath selector
    XPath(String),
    /// Text content selector
    Text(String),
    /// Test ID selector (data-testid attribute)
    TestId(String),
    /// CSS selector narrowed by text content
    CssWithText {
        /// Base CSS selector
        css: String,
        /// Text content to match
        text: String,
    },
    /// Shadow-piercing chain of CSS selectors, one hop per shadow root
    ShadowChain(Vec<String>),
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create an id selector
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    /// Create an XPath selector
    #[must_use]
    pub fn xpath(expr: impl Into<String>) -> Self {
        Self::XPath(expr.into())
    }

    /// Create a text selector
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create a test ID selector
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::TestId(id.into())
    }

    /// Parse a shadow-piercing selector of the form `"host >>> inner"`.
    ///
    /// Each `>>>` hop descends into the shadow root of the previous match.
    #[must_use]
    pub fn deep(chain: &str) -> Self {
        Self::ShadowChain(
            chain
                .split(">>>")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }

    /// Convert to a JavaScript expression evaluating to the first match (or
    /// `null`)
    #[must_use]
    pub fn to_query(&self) -> String {
        match self {
            Self::Css(s) => format!("document.querySelector({s:?})"),
            Self::Id(id) => format!("document.getElementById({id:?})"),
            Self::XPath(s) => {
                format!("document.evaluate({s:?}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue")
            }
            Self::Text(t) => {
                format!("Array.from(document.querySelectorAll('*')).find(el => el.textContent.includes({t:?}))")
            }
            Self::TestId(id) => {
                format!("document.querySelector('[data-testid=\"{id}\"]')")
            }
            Self::CssWithText { css, text } => {
                format!("Array.from(document.querySelectorAll({css:?})).find(el => el.textContent.includes({text:?}))")
            }
            Self::ShadowChain(hops) => shadow_query(hops),
        }
    }

    /// Convert to a JavaScript expression counting matches
    #[must_use]
    pub fn to_count_query(&self) -> String {
        match self {
            Self::Css(s) => format!("document.querySelectorAll({s:?}).length"),
            Self::Id(id) => {
                format!("(document.getElementById({id:?}) ? 1 : 0)")
            }
            Self::XPath(s) => {
                format!("document.evaluate({s:?}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null).snapshotLength")
            }
            Self::Text(t) => {
                format!("Array.from(document.querySelectorAll('*')).filter(el => el.textContent.includes({t:?})).length")
            }
            Self::TestId(id) => {
                format!("document.querySelectorAll('[data-testid=\"{id}\"]').length")
            }
            Self::CssWithText { css, text } => {
                format!("Array.from(document.querySelectorAll({css:?})).filter(el => el.textContent.includes({text:?})).length")
            }
            Self::ShadowChain(hops) => {
                format!("({} ? 1 : 0)", shadow_query(hops))
            }
        }
    }
}

/// Chained `shadowRoot.querySelector` descent, null-safe at every hop
fn shadow_query(hops: &[String]) -> String {
    let mut expr = String::from("document");
    for (i, hop) in hops.iter().enumerate() {
        if i == 0 {
            expr = format!("{expr}.querySelector({hop:?})");
        } else {
            expr = format!("({expr} || {{}}).shadowRoot?.querySelector({hop:?})");
        }
    }
    expr
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(s) => write!(f, "css={s}"),
            Self::Id(id) => write!(f, "id={id}"),
            Self::XPath(s) => write!(f, "xpath={s}"),
            Self::Text(t) => write!(f, "text={t}"),
            Self::TestId(id) => write!(f, "testid={id}"),
            Self::CssWithText { css, text } => write!(f, "css={css}[text~{text}]"),
            Self::ShadowChain(hops) => write!(f, "deep={}", hops.join(" >>> ")),
        }
    }
}

/// A declarative element query plus a human-readable description.
///
/// The description appears in timeout and not-found messages, so name
/// locators by what they point at ("save button"), not how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    selector: Selector,
    description: String,
}

impl Locator {
    /// Create a locator from a selector, described by the selector itself
    #[must_use]
    pub fn new(selector: Selector) -> Self {
        let description = selector.to_string();
        Self {
            selector,
            description,
        }
    }

    /// Create a CSS locator
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::new(Selector::css(selector))
    }

    /// Create an id locator
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self::new(Selector::id(id))
    }

    /// Create an XPath locator
    #[must_use]
    pub fn xpath(expr: impl Into<String>) -> Self {
        Self::new(Selector::xpath(expr))
    }

    /// Create a text locator
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Selector::text(text))
    }

    /// Create a test ID locator
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::new(Selector::test_id(id))
    }

    /// Create a shadow-piercing locator from a `"host >>> inner"` chain
    #[must_use]
    pub fn deep(chain: &str) -> Self {
        Self::new(Selector::deep(chain))
    }

    /// Replace the human-readable description
    #[must_use]
    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Get the selector
    #[must_use]
    pub const fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Get the description
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description)
    }
}
