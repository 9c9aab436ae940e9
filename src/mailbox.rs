//! FIFO handoff from worker threads to the expiry actor.
//!
//! `crossbeam-channel` gives us the blocking, deadline-aware receive the
//! spec describes as "a condition variable plus FIFO" for free, but a
//! plain channel has no front-insertion, and spec.md's mailbox needs
//! one: `DYING` mail must preempt to the head so kill notifications
//! never wait behind an insertion burst (§4.2). We get that by running
//! two channels — one for `DYING` mail, one for everything else — and
//! always draining the priority channel first.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Select, Sender};

use crate::object::ObjectCore;

/// The actor's inbox: a priority lane for `DYING` mail and a normal
/// lane for everything else.
pub struct Mailbox {
    priority_tx: Sender<Arc<ObjectCore>>,
    priority_rx: Receiver<Arc<ObjectCore>>,
    normal_tx: Sender<Arc<ObjectCore>>,
    normal_rx: Receiver<Arc<ObjectCore>>,
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailbox {
    /// Creates an empty mailbox.
    #[must_use]
    pub fn new() -> Self {
        let (priority_tx, priority_rx) = crossbeam_channel::unbounded();
        let (normal_tx, normal_rx) = crossbeam_channel::unbounded();
        Self {
            priority_tx,
            priority_rx,
            normal_tx,
            normal_rx,
        }
    }

    /// Enqueues `oc`. `dying` objects go to the head-priority lane; the
    /// caller's reference is expected to have already transferred to
    /// `oc`'s `Arc` clone passed in here.
    pub fn mail(&self, oc: Arc<ObjectCore>, dying: bool) {
        let tx = if dying { &self.priority_tx } else { &self.normal_tx };
        // Both channels are unbounded and never closed while the
        // actor's Mailbox is alive, so send only fails if every
        // receiver was dropped — which only happens at shutdown.
        let _ = tx.send(oc);
    }

    /// Non-blocking drain: priority mail first, then normal mail.
    #[must_use]
    pub fn try_recv(&self) -> Option<Arc<ObjectCore>> {
        if let Ok(oc) = self.priority_rx.try_recv() {
            return Some(oc);
        }
        self.normal_rx.try_recv().ok()
    }

    /// Blocks until mail arrives or `timeout` elapses, then drains with
    /// the same priority-first discipline as [`Mailbox::try_recv`].
    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Arc<ObjectCore>> {
        if let Some(oc) = self.try_recv() {
            return Some(oc);
        }
        let mut select = Select::new();
        select.recv(&self.priority_rx);
        select.recv(&self.normal_rx);
        if select.select_timeout(timeout).is_ok() {
            // Something became ready on one of the two lanes; re-check
            // with priority-first ordering rather than trusting which
            // operation `select` woke us for.
            self.try_recv()
        } else {
            None
        }
    }

    /// Whether both lanes are currently empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.priority_rx.is_empty() && self.normal_rx.is_empty()
    }
}
