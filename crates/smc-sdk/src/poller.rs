// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Async operation poller.
//!
//! A poller wraps one [`OperationHandle`] and a [`StatusProbe`] that knows
//! how to ask the server about it. The state machine is
//! `Created → Polling → {Succeeded | Failed}`; terminal states are sticky
//! and answered from the cached result without further requests.
//!
//! The poller never spawns threads. [`OperationPoller::wait`] occupies the
//! calling thread; callers that track several operations run one poller per
//! handle on their own threads.

use std::mem;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, instrument};

use crate::error::{PollError, Result};
use crate::operation::{OperationHandle, PollResult};

/// Resource-specific status check.
pub trait StatusProbe: Send + Sync {
    /// Issue one status request and map the answer to a [`PollResult`].
    fn probe(&self, handle: &OperationHandle) -> Result<PollResult>;
}

impl<F> StatusProbe for F
where
    F: Fn(&OperationHandle) -> Result<PollResult> + Send + Sync,
{
    fn probe(&self, handle: &OperationHandle) -> Result<PollResult> {
        self(handle)
    }
}

/// Lifecycle of a poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    /// No status check issued yet.
    Created,
    /// At least one status check issued, no terminal result yet.
    Polling,
    Succeeded,
    Failed,
}

type Callback = Box<dyn FnOnce(&PollResult) + Send>;

struct Inner {
    state: PollerState,
    last: PollResult,
    callbacks: Vec<Callback>,
}

/// Tracks one submitted operation until it reaches a terminal state.
pub struct OperationPoller<P> {
    probe: P,
    handle: OperationHandle,
    inner: Mutex<Inner>,
}

impl<P> std::fmt::Debug for OperationPoller<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("OperationPoller")
            .field("handle", &self.handle)
            .field("state", &inner.state)
            .field("last", &inner.last)
            .finish()
    }
}

impl<P: StatusProbe> OperationPoller<P> {
    pub fn new(probe: P, handle: OperationHandle) -> Self {
        Self {
            probe,
            handle,
            inner: Mutex::new(Inner {
                state: PollerState::Created,
                last: PollResult::Pending,
                callbacks: Vec::new(),
            }),
        }
    }

    pub fn handle(&self) -> &OperationHandle {
        &self.handle
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    pub fn state(&self) -> PollerState {
        self.inner.lock().state
    }

    /// Last observed result; `Pending` before the first status check.
    pub fn last_result(&self) -> PollResult {
        self.inner.lock().last.clone()
    }

    /// Whether a terminal result has been observed. Never touches the network.
    pub fn done(&self) -> bool {
        self.inner.lock().last.is_terminal()
    }

    /// Issue one status check.
    ///
    /// Once a terminal result has been observed it is returned again without
    /// contacting the server. Errors leave the cached state untouched.
    pub fn poll_once(&self) -> std::result::Result<PollResult, PollError> {
        {
            let mut inner = self.inner.lock();
            if inner.last.is_terminal() {
                return Ok(inner.last.clone());
            }
            if inner.state == PollerState::Created {
                inner.state = PollerState::Polling;
            }
        }

        let observed = self
            .probe
            .probe(&self.handle)
            .map_err(|e| PollError::new(self.handle.job_id.clone(), e))?;

        let callbacks = {
            let mut inner = self.inner.lock();
            if inner.last.is_terminal() {
                return Ok(inner.last.clone());
            }
            inner.last = observed.clone();
            match &observed {
                PollResult::Pending => return Ok(observed),
                PollResult::Succeeded { .. } => inner.state = PollerState::Succeeded,
                PollResult::Failed { .. } => inner.state = PollerState::Failed,
            }
            mem::take(&mut inner.callbacks)
        };

        info!(
            job_id = %self.handle.job_id,
            operation = %self.handle.operation,
            result = ?observed,
            "Operation reached terminal state"
        );
        for callback in callbacks {
            callback(&observed);
        }
        Ok(observed)
    }

    /// Poll every `interval` until the operation is terminal or `timeout`
    /// elapses.
    ///
    /// On timeout the last non-terminal result is returned; callers detect
    /// it with [`PollResult::is_terminal`]. The call never blocks longer than
    /// `timeout` plus one status round trip. Status check errors end the
    /// wait and are returned to the caller.
    #[instrument(skip(self), fields(job_id = %self.handle.job_id))]
    pub fn wait(
        &self,
        interval: Duration,
        timeout: Option<Duration>,
    ) -> std::result::Result<PollResult, PollError> {
        // A timeout past the end of the clock means no deadline.
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));

        loop {
            let result = self.poll_once()?;
            if result.is_terminal() {
                return Ok(result);
            }

            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        debug!("Wait timed out with operation still pending");
                        return Ok(result);
                    }
                    interval.min(deadline - now)
                }
                None => interval,
            };
            std::thread::sleep(pause);
        }
    }

    /// Register a callback for the terminal transition.
    ///
    /// Fires exactly once, synchronously, on the thread that observes the
    /// transition. If the operation is already terminal the callback runs
    /// immediately, before this method returns.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(&PollResult) + Send + 'static,
    {
        let mut inner = self.inner.lock();
        if inner.last.is_terminal() {
            let result = inner.last.clone();
            drop(inner);
            callback(&result);
        } else {
            inner.callbacks.push(Box::new(callback));
        }
    }

    /// Give up tracking and recover the handle.
    ///
    /// Nothing is sent to the server: abandoning a poller does not cancel
    /// the remote operation.
    pub fn into_handle(self) -> OperationHandle {
        self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ElementKind, RemoteRef};
    use crate::error::SdkError;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Plays back a fixed sequence of answers, repeating the last one.
    struct ScriptedProbe {
        script: Mutex<VecDeque<Result<PollResult>>>,
        calls: AtomicUsize,
    }

    impl ScriptedProbe {
        fn new(script: Vec<Result<PollResult>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl StatusProbe for ScriptedProbe {
        fn probe(&self, _handle: &OperationHandle) -> Result<PollResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock();
            if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                match script.front() {
                    Some(Ok(result)) => Ok(result.clone()),
                    Some(Err(e)) => Err(SdkError::Connection(e.to_string())),
                    None => Ok(PollResult::Pending),
                }
            }
        }
    }

    fn handle(job: &str) -> OperationHandle {
        OperationHandle::new(
            RemoteRef::new(ElementKind::ReportDesign, "http://smc/elements/report_design/1", None),
            "generate",
            job,
        )
    }

    fn succeeded(href: &str) -> PollResult {
        PollResult::Succeeded {
            resources: vec![RemoteRef::from_href(href)],
        }
    }

    fn failed() -> PollResult {
        PollResult::Failed {
            reason: "Policy is locked".to_string(),
            code: Some(7),
        }
    }

    #[test]
    fn test_pending_until_terminal_then_sticky() {
        let poller = OperationPoller::new(
            ScriptedProbe::new(vec![
                Ok(PollResult::Pending),
                Ok(PollResult::Pending),
                Ok(succeeded("http://smc/elements/report_file/1")),
                Ok(failed()),
            ]),
            handle("task-1"),
        );

        assert_eq!(poller.state(), PollerState::Created);
        assert_eq!(poller.poll_once().unwrap(), PollResult::Pending);
        assert_eq!(poller.state(), PollerState::Polling);
        assert_eq!(poller.poll_once().unwrap(), PollResult::Pending);

        let terminal = poller.poll_once().unwrap();
        assert_eq!(terminal, succeeded("http://smc/elements/report_file/1"));
        assert_eq!(poller.state(), PollerState::Succeeded);

        for _ in 0..3 {
            assert_eq!(poller.poll_once().unwrap(), terminal);
        }
        assert_eq!(poller.probe().calls(), 3);
    }

    #[test]
    fn test_failed_is_terminal() {
        let poller = OperationPoller::new(ScriptedProbe::new(vec![Ok(failed())]), handle("t"));
        assert_eq!(poller.poll_once().unwrap(), failed());
        assert_eq!(poller.state(), PollerState::Failed);
        assert!(poller.done());
        assert_eq!(poller.poll_once().unwrap(), failed());
        assert_eq!(poller.probe().calls(), 1);
    }

    #[test]
    fn test_done_tracks_observed_state_only() {
        let poller = OperationPoller::new(
            ScriptedProbe::new(vec![Ok(PollResult::Pending), Ok(failed())]),
            handle("t"),
        );
        assert!(!poller.done());
        assert_eq!(poller.probe().calls(), 0);

        poller.poll_once().unwrap();
        assert!(!poller.done());
        poller.poll_once().unwrap();
        assert!(poller.done());
        assert!(poller.done());
        assert_eq!(poller.probe().calls(), 2);
    }

    #[test]
    fn test_callbacks_before_completion_fire_once() {
        let poller = OperationPoller::new(
            ScriptedProbe::new(vec![Ok(PollResult::Pending), Ok(failed())]),
            handle("t"),
        );
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let c = first.clone();
        poller.on_complete(move |result| {
            assert!(result.is_terminal());
            c.fetch_add(1, Ordering::SeqCst);
        });
        let c = second.clone();
        poller.on_complete(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        poller.poll_once().unwrap();
        assert_eq!(first.load(Ordering::SeqCst), 0);

        poller.poll_once().unwrap();
        poller.poll_once().unwrap();
        poller.wait(Duration::from_millis(1), None).unwrap();
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_after_completion_fires_immediately() {
        let poller = OperationPoller::new(
            ScriptedProbe::new(vec![Ok(succeeded("http://smc/elements/report_file/9"))]),
            handle("t"),
        );
        poller.poll_once().unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        let c = fired.clone();
        poller.on_complete(move |result| {
            assert_eq!(result.resources().len(), 1);
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        poller.poll_once().unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_may_reenter_poller() {
        let poller = Arc::new(OperationPoller::new(
            ScriptedProbe::new(vec![Ok(failed())]),
            handle("t"),
        ));
        let seen_done = Arc::new(AtomicUsize::new(0));

        let p = poller.clone();
        let c = seen_done.clone();
        poller.on_complete(move |_| {
            if p.done() && p.state() == PollerState::Failed {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });
        poller.poll_once().unwrap();
        assert_eq!(seen_done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_poll_error_is_distinct_and_recoverable() {
        let poller = OperationPoller::new(
            ScriptedProbe::new(vec![
                Err(SdkError::Connection("reset by peer".into())),
                Ok(failed()),
            ]),
            handle("task-7"),
        );

        let err = poller.poll_once().unwrap_err();
        assert_eq!(err.job_id, "task-7");
        assert!(matches!(*err.source, SdkError::Connection(_)));
        assert!(!poller.done());
        assert_eq!(poller.last_result(), PollResult::Pending);

        assert_eq!(poller.poll_once().unwrap(), failed());
    }

    #[test]
    fn test_wait_returns_terminal() {
        let poller = OperationPoller::new(
            ScriptedProbe::new(vec![
                Ok(PollResult::Pending),
                Ok(PollResult::Pending),
                Ok(succeeded("http://smc/elements/report_file/1")),
            ]),
            handle("t"),
        );
        let result = poller
            .wait(Duration::from_millis(5), Some(Duration::from_secs(5)))
            .unwrap();
        assert!(result.is_success());
        assert_eq!(poller.probe().calls(), 3);
    }

    #[test]
    fn test_wait_timeout_returns_pending_within_bound() {
        let poller = OperationPoller::new(
            ScriptedProbe::new(vec![Ok(PollResult::Pending)]),
            handle("t"),
        );
        let timeout = Duration::from_millis(120);

        let start = Instant::now();
        let result = poller.wait(Duration::from_millis(50), Some(timeout)).unwrap();
        let elapsed = start.elapsed();

        assert_eq!(result, PollResult::Pending);
        assert!(!poller.done());
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + Duration::from_millis(500), "took {:?}", elapsed);
        assert!(poller.probe().calls() >= 3);
    }

    #[test]
    fn test_wait_with_unbounded_timeout() {
        let poller = OperationPoller::new(
            ScriptedProbe::new(vec![
                Ok(PollResult::Pending),
                Ok(succeeded("http://smc/elements/report_file/1")),
            ]),
            handle("t"),
        );
        let result = poller
            .wait(Duration::from_millis(1), Some(Duration::MAX))
            .unwrap();
        assert!(result.is_success());
        assert_eq!(poller.probe().calls(), 2);
    }

    #[test]
    fn test_callback_fires_on_transition_inside_wait() {
        let poller = OperationPoller::new(
            ScriptedProbe::new(vec![
                Ok(PollResult::Pending),
                Ok(PollResult::Pending),
                Ok(failed()),
            ]),
            handle("t"),
        );
        let fired = Arc::new(AtomicUsize::new(0));
        let c = fired.clone();
        poller.on_complete(move |result| {
            assert_eq!(result, &failed());
            c.fetch_add(1, Ordering::SeqCst);
        });

        let result = poller.wait(Duration::from_millis(1), None).unwrap();
        assert_eq!(result, failed());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(poller.probe().calls(), 3);

        poller.wait(Duration::from_millis(1), None).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_wait_with_zero_timeout_polls_once() {
        let poller = OperationPoller::new(
            ScriptedProbe::new(vec![Ok(PollResult::Pending)]),
            handle("t"),
        );
        let result = poller
            .wait(Duration::from_secs(60), Some(Duration::ZERO))
            .unwrap();
        assert_eq!(result, PollResult::Pending);
        assert_eq!(poller.probe().calls(), 1);
    }

    #[test]
    fn test_wait_surfaces_poll_error() {
        let poller = OperationPoller::new(
            ScriptedProbe::new(vec![
                Ok(PollResult::Pending),
                Err(SdkError::Connection("timeout".into())),
            ]),
            handle("t"),
        );
        let err = poller.wait(Duration::from_millis(1), None).unwrap_err();
        assert!(err.to_string().contains("timeout"));
        assert_eq!(poller.state(), PollerState::Polling);
    }

    #[test]
    fn test_closure_probe() {
        let poller = OperationPoller::new(
            |h: &OperationHandle| -> Result<PollResult> {
                Ok(PollResult::Failed {
                    reason: format!("{} rejected", h.job_id),
                    code: None,
                })
            },
            handle("job-42"),
        );
        match poller.poll_once().unwrap() {
            PollResult::Failed { reason, .. } => assert_eq!(reason, "job-42 rejected"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_independent_handles_on_separate_threads() {
        let a = OperationPoller::new(
            ScriptedProbe::new(vec![
                Ok(PollResult::Pending),
                Ok(PollResult::Pending),
                Ok(succeeded("http://smc/elements/report_file/a")),
            ]),
            handle("job-a"),
        );
        let b = OperationPoller::new(
            ScriptedProbe::new(vec![Ok(PollResult::Pending), Ok(failed())]),
            handle("job-b"),
        );

        let (ra, rb) = std::thread::scope(|s| {
            let ta = s.spawn(|| a.wait(Duration::from_millis(2), Some(Duration::from_secs(5))));
            let tb = s.spawn(|| b.wait(Duration::from_millis(3), Some(Duration::from_secs(5))));
            (ta.join().unwrap().unwrap(), tb.join().unwrap().unwrap())
        });

        assert_eq!(ra, succeeded("http://smc/elements/report_file/a"));
        assert_eq!(rb, failed());
        assert_eq!(a.state(), PollerState::Succeeded);
        assert_eq!(b.state(), PollerState::Failed);
        assert_eq!(a.last_result(), ra);
        assert_eq!(b.last_result(), rb);
    }

    #[test]
    fn test_into_handle() {
        let poller = OperationPoller::new(ScriptedProbe::new(vec![]), handle("job-x"));
        let h = poller.into_handle();
        assert_eq!(h.job_id, "job-x");
        assert_eq!(h.operation, "generate");
    }
}
