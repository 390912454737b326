//! Per-flow deferral queues.
//!
//! A flow is one outermost `emit` on one emitter, on one thread, together with
//! everything its synchronous listeners do. The drain loop never suspends, so
//! a thread-local slot identifies the flow exactly, including inside Tokio
//! tasks. The slot is owned by a [`DeferralContext`] guard held by the
//! outermost `emit` frame.

use crate::args::EventArgs;
use crate::name::EventName;
use fxhash::FxHashMap;
use std::cell::RefCell;
use std::collections::VecDeque;
use tracing::warn;

/// One pending dispatch round.
#[derive(Debug)]
pub(crate) struct Round {
    pub(crate) event: EventName,
    pub(crate) args: EventArgs,
}

thread_local! {
    static ACTIVE_FLOWS: RefCell<FxHashMap<u64, VecDeque<Round>>> = RefCell::new(FxHashMap::default());
}

/// Guard over the active flow of one emitter on the current thread.
///
/// Dropping it dismantles the queue, discarding rounds that never ran.
#[derive(Debug)]
pub(crate) struct DeferralContext {
    emitter_id: u64,
}

/// Result of trying to start a flow.
#[derive(Debug)]
pub(crate) enum Entry {
    /// No flow was active; the caller now owns it and must drain it.
    Owner(DeferralContext),
    /// A flow is already draining further up the stack; the round was queued there.
    Deferred,
}

impl DeferralContext {
    /// Starts a flow seeded with `round`, or queues `round` onto the active one.
    pub(crate) fn enter(emitter_id: u64, round: Round) -> Entry {
        ACTIVE_FLOWS.with(|flows| {
            let mut flows = flows.borrow_mut();
            if let Some(queue) = flows.get_mut(&emitter_id) {
                queue.push_back(round);
                return Entry::Deferred;
            }
            flows.insert(emitter_id, VecDeque::from([round]));
            Entry::Owner(Self { emitter_id })
        })
    }

    /// Pops the oldest pending round.
    ///
    /// The borrow ends before the caller runs any listener, so listeners are
    /// free to queue more rounds.
    pub(crate) fn next_round(&self) -> Option<Round> {
        ACTIVE_FLOWS.with(|flows| flows.borrow_mut().get_mut(&self.emitter_id)?.pop_front())
    }

    /// Whether a flow for `emitter_id` is draining on this thread.
    pub(crate) fn is_active(emitter_id: u64) -> bool {
        ACTIVE_FLOWS.with(|flows| flows.borrow().contains_key(&emitter_id))
    }
}

impl Drop for DeferralContext {
    fn drop(&mut self) {
        // `try_with`: the guard may be dropped while the thread-local is being torn down.
        let discarded = ACTIVE_FLOWS
            .try_with(|flows| flows.borrow_mut().remove(&self.emitter_id).map_or(0, |q| q.len()))
            .unwrap_or(0);
        if discarded > 0 {
            warn!(emitter_id = self.emitter_id, discarded, "Deferred rounds abandoned");
        }
    }
}
