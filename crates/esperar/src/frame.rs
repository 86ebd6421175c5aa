//! Frame and window switching.
//!
//! Frame switches wait for the frame element first; window helpers come in
//! two flavors: a single-shot inspection for "a new window just opened"
//! (surfacing [`NoSuchWindow`](crate::EsperarError::NoSuchWindow)
//! immediately) and polling variants built on the wait module.

use std::fmt;
use tracing::debug;

use crate::locator::Locator;
use crate::page::wait_displayed;
use crate::result::{EsperarError, EsperarResult};
use crate::session::{Session, WindowHandle};
use crate::wait::{wait_for, WaitPolicy};

/// Which frame to switch into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameTarget {
    /// Frame by zero-based index in the current document
    Index(u16),
    /// Frame element located in the current document
    Element(Locator),
}

impl fmt::Display for FrameTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "frame #{i}"),
            Self::Element(locator) => write!(f, "frame {locator}"),
        }
    }
}

/// Switch the session into a frame.
///
/// For an element target, waits for the frame element to be displayed
/// before switching; an index target switches immediately.
///
/// # Errors
///
/// Returns a timeout if the frame element never appears, or the session's
/// switch failure.
pub fn switch_to_frame<S>(
    session: &S,
    target: &FrameTarget,
    policy: &WaitPolicy,
) -> EsperarResult<()>
where
    S: Session + ?Sized,
{
    debug!("switching to {target}");
    match target {
        FrameTarget::Index(index) => session.switch_to_frame_index(*index),
        FrameTarget::Element(locator) => {
            let handle = wait_displayed(session, locator, policy)?;
            session.switch_to_frame(&handle)
        }
    }
}

/// Switch the session back to the top document.
///
/// # Errors
///
/// Propagates the session's switch failure.
pub fn switch_to_default_content<S>(session: &S) -> EsperarResult<()>
where
    S: Session + ?Sized,
{
    session.switch_to_default_content()
}

/// Switch to the one window not in `known`, without waiting.
///
/// This is a single inspection: if no new handle exists right now,
/// [`EsperarError::NoSuchWindow`] surfaces immediately. Callers expecting
/// the window to open asynchronously should first use
/// [`wait_for_window_count`].
///
/// # Errors
///
/// Returns [`EsperarError::NoSuchWindow`] when every open handle is already
/// known, or the session's switch failure.
pub fn switch_to_new_window<S>(
    session: &S,
    known: &[WindowHandle],
) -> EsperarResult<WindowHandle>
where
    S: Session + ?Sized,
{
    let handle = session
        .window_handles()?
        .into_iter()
        .find(|h| !known.contains(h))
        .ok_or_else(|| EsperarError::NoSuchWindow {
            description: "no new window appeared".to_string(),
        })?;
    session.switch_to_window(&handle)?;
    Ok(handle)
}

/// Wait until the session reports the given number of open windows.
///
/// # Errors
///
/// Returns a timeout if the count is never reached.
pub fn wait_for_window_count<S>(
    session: &S,
    count: usize,
    policy: &WaitPolicy,
) -> EsperarResult<()>
where
    S: Session + ?Sized,
{
    wait_for(
        session,
        &format!("{count} open windows"),
        policy,
        |s: &S| {
            if s.window_handles()?.len() == count {
                Ok(Some(()))
            } else {
                Ok(None)
            }
        },
    )
}

/// Wait for a window with the given title and switch to it.
///
/// Each poll walks the open windows, switching through them to read their
/// titles; if no window matches, the session is returned to the window it
/// started the poll on.
///
/// # Errors
///
/// Returns a timeout if no window ever carries the title.
pub fn switch_to_window_titled<S>(
    session: &S,
    title: &str,
    policy: &WaitPolicy,
) -> EsperarResult<WindowHandle>
where
    S: Session + ?Sized,
{
    wait_for(
        session,
        &format!("window titled {title:?}"),
        policy,
        |s: &S| {
            let origin = s.current_window()?;
            for handle in s.window_handles()? {
                s.switch_to_window(&handle)?;
                if s.title()? == title {
                    return Ok(Some(handle));
                }
            }
            s.switch_to_window(&origin)?;
            Ok(None)
        },
    )
}
