//! Delivery of completions onto the UI-affine context
//!
//! Callers that mutate UI-owned state receive transfer results and reanchor
//! batches through a [`UiDispatcher`] rather than on the worker that produced
//! them.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// A unit of work to run on the UI-affine context
pub type UiTask = Box<dyn FnOnce() + Send + 'static>;

/// Schedules tasks onto the UI-affine context
pub trait UiDispatcher: Send + Sync {
    fn dispatch(&self, task: UiTask);
}

/// Runs tasks immediately on the calling thread.
///
/// Suitable for headless use where there is no UI loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineDispatcher;

impl UiDispatcher for InlineDispatcher {
    fn dispatch(&self, task: UiTask) {
        task();
    }
}

/// Queues tasks for a UI loop that drains a [`UiQueue`]
#[derive(Clone)]
pub struct ChannelDispatcher {
    sender: UnboundedSender<UiTask>,
}

/// Receiving end owned by the UI loop
pub struct UiQueue {
    receiver: UnboundedReceiver<UiTask>,
}

impl ChannelDispatcher {
    pub fn new() -> (Self, UiQueue) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, UiQueue { receiver })
    }
}

impl UiDispatcher for ChannelDispatcher {
    fn dispatch(&self, task: UiTask) {
        if self.sender.send(task).is_err() {
            tracing::warn!("UI queue closed, dropping completion");
        }
    }
}

impl UiQueue {
    /// Run every task queued so far, returning how many ran
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.receiver.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Wait for the next task and run it. Returns `false` once all
    /// dispatchers are gone.
    pub async fn run_next(&mut self) -> bool {
        match self.receiver.recv().await {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_inline_dispatcher_runs_immediately() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        InlineDispatcher.dispatch(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_channel_dispatcher_defers_until_drained() {
        let (dispatcher, mut queue) = ChannelDispatcher::new();
        let hits = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let counter = hits.clone();
            dispatcher.dispatch(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(queue.run_pending(), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_next_stops_when_dispatchers_dropped() {
        let (dispatcher, mut queue) = ChannelDispatcher::new();
        dispatcher.dispatch(Box::new(|| {}));
        drop(dispatcher);

        assert!(queue.run_next().await);
        assert!(!queue.run_next().await);
    }
}
