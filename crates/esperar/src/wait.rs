//! The wait-and-act polling core.
//!
//! Every element operation in this crate is a parameterization of one
//! contract: resolve a handle, evaluate a readiness condition, sleep-poll
//! until it holds or a deadline passes, then perform the action exactly once.
//! Recovery is bounded: a stale handle during the action earns one
//! re-resolution and one retry, an intercepted action earns one fallback
//! invocation, and nothing is retried beyond that.
//!
//! Remote UI state changes out of band (network, animation, page scripts),
//! so single-shot checks are flaky. The bounds keep transient races from
//! masking real failures behind open-ended retry loops.

use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use crate::result::{EsperarError, EsperarResult, FailureKind};
use crate::session::{ElementHandle, Session};

/// Default wait timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Default poll interval in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// Configuration for one wait: deadline, poll cadence, and which failure
/// kinds count as "not yet" while polling.
///
/// A policy is a value; it is never mutated after construction. The default
/// absorbs `NotFound` and `StaleHandle`, the two transient races a polling
/// loop is expected to ride out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitPolicy {
    timeout: Duration,
    poll_interval: Duration,
    ignored: Vec<FailureKind>,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitPolicy {
    /// Create a policy with default timeout, poll interval, and ignored kinds
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            ignored: vec![FailureKind::NotFound, FailureKind::StaleHandle],
        }
    }

    /// Set the timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Replace the set of failure kinds absorbed while polling
    #[must_use]
    pub fn with_ignored(mut self, kinds: Vec<FailureKind>) -> Self {
        self.ignored = kinds;
        self
    }

    /// Additionally absorb one failure kind while polling
    #[must_use]
    pub fn also_ignoring(mut self, kind: FailureKind) -> Self {
        if !self.ignored.contains(&kind) {
            self.ignored.push(kind);
        }
        self
    }

    /// Get the timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Get the poll interval
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Get the absorbed failure kinds
    #[must_use]
    pub fn ignored(&self) -> &[FailureKind] {
        &self.ignored
    }

    /// Check whether a failure kind is absorbed while polling
    #[must_use]
    pub fn ignores(&self, kind: FailureKind) -> bool {
        self.ignored.contains(&kind)
    }

    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Poll until `condition` holds for the resolved handle, then run `action`
/// exactly once.
///
/// Failures from `resolve` or `condition` whose kind the policy ignores are
/// treated as "not yet satisfied"; any other failure surfaces immediately.
/// The deadline is checked after each evaluation and before the sleep, so at
/// least one evaluation happens even when the timeout is shorter than the
/// poll interval, and a timeout error arrives no later than
/// `timeout + poll_interval`.
///
/// If `action` fails with a stale handle, the handle is re-resolved once and
/// the action retried once; a second stale failure surfaces as
/// [`EsperarError::StaleHandle`]. The condition is not re-evaluated for the
/// retry.
///
/// # Errors
///
/// Returns [`EsperarError::Timeout`] naming `description` when the deadline
/// elapses, or any non-ignored failure from the session.
pub fn wait_and_act<S, T, R, C, A>(
    session: &S,
    description: &str,
    policy: &WaitPolicy,
    mut resolve: R,
    mut condition: C,
    mut action: A,
) -> EsperarResult<T>
where
    S: Session + ?Sized,
    R: FnMut(&S) -> EsperarResult<ElementHandle>,
    C: FnMut(&S, &ElementHandle) -> EsperarResult<bool>,
    A: FnMut(&S, &ElementHandle) -> EsperarResult<T>,
{
    wait_and_act_inner(
        session,
        description,
        policy,
        &mut resolve,
        &mut condition,
        &mut action,
        None,
    )
}

/// [`wait_and_act`], plus one bounded fallback for intercepted actions.
///
/// If `action` fails because the target is obscured, `fallback` runs exactly
/// once against the same handle; if the fallback also fails, the fallback's
/// own failure surfaces, not the original interception.
///
/// # Errors
///
/// As [`wait_and_act`], with [`EsperarError::Intercepted`] replaced by the
/// fallback outcome.
pub fn wait_and_act_with_fallback<S, T, R, C, A, F>(
    session: &S,
    description: &str,
    policy: &WaitPolicy,
    mut resolve: R,
    mut condition: C,
    mut action: A,
    mut fallback: F,
) -> EsperarResult<T>
where
    S: Session + ?Sized,
    R: FnMut(&S) -> EsperarResult<ElementHandle>,
    C: FnMut(&S, &ElementHandle) -> EsperarResult<bool>,
    A: FnMut(&S, &ElementHandle) -> EsperarResult<T>,
    F: FnMut(&S, &ElementHandle) -> EsperarResult<T>,
{
    wait_and_act_inner(
        session,
        description,
        policy,
        &mut resolve,
        &mut condition,
        &mut action,
        Some(&mut fallback),
    )
}

#[allow(clippy::type_complexity)]
fn wait_and_act_inner<S, T>(
    session: &S,
    description: &str,
    policy: &WaitPolicy,
    resolve: &mut dyn FnMut(&S) -> EsperarResult<ElementHandle>,
    condition: &mut dyn FnMut(&S, &ElementHandle) -> EsperarResult<bool>,
    action: &mut dyn FnMut(&S, &ElementHandle) -> EsperarResult<T>,
    fallback: Option<&mut dyn FnMut(&S, &ElementHandle) -> EsperarResult<T>>,
) -> EsperarResult<T>
where
    S: Session + ?Sized,
{
    let start = Instant::now();
    let mut polls: u32 = 0;
    loop {
        polls += 1;
        match probe_once(session, resolve, condition) {
            Ok(Some(handle)) => {
                debug!("condition satisfied for {description} on poll {polls}");
                return run_action(session, description, &handle, resolve, action, fallback);
            }
            Ok(None) => {
                trace!("{description}: not yet satisfied (poll {polls})");
            }
            Err(err) if policy.ignores(err.kind()) => {
                trace!("{description}: absorbed {:?} (poll {polls})", err.kind());
            }
            Err(err) => return Err(err),
        }
        if start.elapsed() >= policy.timeout() {
            warn!("timed out waiting for {description} after {polls} polls");
            return Err(EsperarError::Timeout {
                description: description.to_string(),
                ms: policy.timeout_ms(),
            });
        }
        thread::sleep(policy.poll_interval());
    }
}

fn probe_once<S>(
    session: &S,
    resolve: &mut dyn FnMut(&S) -> EsperarResult<ElementHandle>,
    condition: &mut dyn FnMut(&S, &ElementHandle) -> EsperarResult<bool>,
) -> EsperarResult<Option<ElementHandle>>
where
    S: Session + ?Sized,
{
    let handle = resolve(session)?;
    if condition(session, &handle)? {
        Ok(Some(handle))
    } else {
        Ok(None)
    }
}

fn run_action<S, T>(
    session: &S,
    description: &str,
    handle: &ElementHandle,
    resolve: &mut dyn FnMut(&S) -> EsperarResult<ElementHandle>,
    action: &mut dyn FnMut(&S, &ElementHandle) -> EsperarResult<T>,
    fallback: Option<&mut dyn FnMut(&S, &ElementHandle) -> EsperarResult<T>>,
) -> EsperarResult<T>
where
    S: Session + ?Sized,
{
    match action(session, handle) {
        Ok(value) => Ok(value),
        Err(err) if err.kind() == FailureKind::StaleHandle => {
            debug!("{description}: handle went stale during action, re-resolving once");
            let fresh = resolve(session)?;
            action(session, &fresh)
        }
        Err(err) if err.kind() == FailureKind::Intercepted => match fallback {
            Some(fb) => {
                warn!("{description}: action intercepted, engaging fallback");
                fb(session, handle)
            }
            None => Err(err),
        },
        Err(err) => Err(err),
    }
}

/// Poll a probe until it yields a value.
///
/// `probe` returns `Ok(Some(value))` when ready, `Ok(None)` or an ignored
/// failure to keep polling. Used for waits that produce something other
/// than an element handle (window handles, counts, text).
///
/// # Errors
///
/// Returns [`EsperarError::Timeout`] naming `description` when the deadline
/// elapses, or any non-ignored failure from the probe.
pub fn wait_for<S, T, P>(
    session: &S,
    description: &str,
    policy: &WaitPolicy,
    mut probe: P,
) -> EsperarResult<T>
where
    S: Session + ?Sized,
    P: FnMut(&S) -> EsperarResult<Option<T>>,
{
    let start = Instant::now();
    loop {
        match probe(session) {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(err) if policy.ignores(err.kind()) => {}
            Err(err) => return Err(err),
        }
        if start.elapsed() >= policy.timeout() {
            warn!("timed out waiting for {description}");
            return Err(EsperarError::Timeout {
                description: description.to_string(),
                ms: policy.timeout_ms(),
            });
        }
        thread::sleep(policy.poll_interval());
    }
}

/// Poll a session-free predicate until it returns true.
///
/// # Errors
///
/// Returns [`EsperarError::Timeout`] naming `description` when the deadline
/// elapses.
pub fn wait_until<F>(description: &str, policy: &WaitPolicy, mut check: F) -> EsperarResult<()>
where
    F: FnMut() -> bool,
{
    let start = Instant::now();
    loop {
        if check() {
            return Ok(());
        }
        if start.elapsed() >= policy.timeout() {
            return Err(EsperarError::Timeout {
                description: description.to_string(),
                ms: policy.timeout_ms(),
            });
        }
        thread::sleep(policy.poll_interval());
    }
}
