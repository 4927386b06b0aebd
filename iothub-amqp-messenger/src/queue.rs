//! Ordered send queue with per-message timeout, retry and completion routing
//!
//! The queue is the concurrency boundary of the messenger: it only makes
//! progress when its owner calls [`do_work`](MessageQueue::do_work). Items
//! wait in the pending partition in FIFO enqueue order, move to the
//! in-flight partition when presented to the processing callback, and leave
//! the queue through exactly one [`Completion`].

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use fe2o3_amqp_types::definitions::Seconds;
use tracing::{debug, warn};

use crate::constants::{
    DEFAULT_EVENT_SEND_RETRY_LIMIT, DEFAULT_EVENT_SEND_TIMEOUT_SECS,
    OPTION_MAX_MESSAGE_ENQUEUED_TIME_SECS, OPTION_MAX_MESSAGE_PROCESSING_TIME_SECS,
    OPTION_MAX_RETRY_COUNT,
};
use crate::error::OptionError;
use crate::options::{OptionValue, OptionsSnapshot};

/// Identity of a queued message while it is in flight. Tokens are assigned
/// at enqueue time and echoed back by the transport when the send settles.
pub type SendToken = u64;

/// Terminal result of a queued item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueResult {
    /// The item was processed successfully.
    Success,

    /// Processing failed and no retries were left.
    Error,

    /// The item aged out before or during processing.
    Timeout,

    /// The queue was torn down while the item was still queued.
    Cancelled,
}

/// What the processing callback did with a presented item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The item was handed to the transport; a completion will follow.
    Dispatched,

    /// The item could not be handed over; it completes immediately.
    Failed,
}

/// Configuration knobs of a [`MessageQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueOptions {
    /// How many times a failed item is re-queued before completing with
    /// [`QueueResult::Error`]. 0 means do not retry.
    pub max_retry_count: u32,

    /// Bound on the total time an item may spend in the queue, in seconds.
    /// 0 disables the bound.
    pub max_enqueued_time_secs: Seconds,

    /// Bound on the time an item may spend in flight, in seconds. 0 means
    /// unbounded.
    pub max_processing_time_secs: Seconds,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            max_retry_count: DEFAULT_EVENT_SEND_RETRY_LIMIT,
            max_enqueued_time_secs: DEFAULT_EVENT_SEND_TIMEOUT_SECS,
            max_processing_time_secs: 0,
        }
    }
}

/// A completed queue item: the caller-supplied context plus how the item
/// ended.
pub struct Completion<C> {
    /// Context the item was enqueued with.
    pub context: C,

    /// How the item ended.
    pub result: QueueResult,
}

impl<C> fmt::Debug for Completion<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("result", &self.result)
            .finish_non_exhaustive()
    }
}

struct Item<M, C> {
    token: SendToken,
    message: M,
    context: C,
    enqueued_at: Instant,
    processing_since: Option<Instant>,
    retry_count: u32,
}

/// FIFO queue of not-yet-completed messages, generic over the message type
/// and a per-item context (typically the completion callback).
pub struct MessageQueue<M, C> {
    options: QueueOptions,
    next_token: SendToken,
    pending: VecDeque<Item<M, C>>,
    in_flight: VecDeque<Item<M, C>>,
}

impl<M, C> MessageQueue<M, C> {
    /// Creates an empty queue.
    pub fn new(options: QueueOptions) -> Self {
        Self {
            options,
            next_token: 0,
            pending: VecDeque::new(),
            in_flight: VecDeque::new(),
        }
    }

    /// Appends an item to the pending partition.
    pub fn enqueue(&mut self, message: M, context: C, now: Instant) -> SendToken {
        let token = self.next_token;
        self.next_token += 1;
        self.pending.push_back(Item {
            token,
            message,
            context,
            enqueued_at: now,
            processing_since: None,
            retry_count: 0,
        });
        token
    }

    /// Expires aged items, then presents every pending item to `process` in
    /// FIFO order. Items reported as [`ProcessOutcome::Failed`] complete
    /// immediately (or re-enter pending while retries remain); dispatched
    /// items stay in flight until [`complete`](Self::complete) is called
    /// with their token.
    pub fn do_work<F>(&mut self, now: Instant, mut process: F) -> Vec<Completion<C>>
    where
        M: Clone,
        F: FnMut(SendToken, M) -> ProcessOutcome,
    {
        let mut completions = self.expire(now);

        let mut ready = std::mem::take(&mut self.pending);
        while let Some(mut item) = ready.pop_front() {
            item.processing_since = Some(now);
            let token = item.token;
            let message = item.message.clone();
            self.in_flight.push_back(item);
            if process(token, message) == ProcessOutcome::Failed {
                completions.extend(self.complete(token, QueueResult::Error));
            }
        }

        completions
    }

    /// Settles an in-flight item. Returns `None` when the token is unknown
    /// (for example a confirmation that raced a [`move_all_back_to_pending`]
    /// call) or when the item re-entered pending for a retry.
    ///
    /// [`move_all_back_to_pending`]: Self::move_all_back_to_pending
    pub fn complete(&mut self, token: SendToken, result: QueueResult) -> Option<Completion<C>> {
        let index = match self.in_flight.iter().position(|item| item.token == token) {
            Some(index) => index,
            None => {
                debug!(token, "completion for an unknown or already settled message");
                return None;
            }
        };
        let mut item = self.in_flight.remove(index)?;

        if result == QueueResult::Error && item.retry_count < self.options.max_retry_count {
            item.retry_count += 1;
            item.processing_since = None;
            self.pending.push_front(item);
            return None;
        }

        Some(Completion {
            context: item.context,
            result,
        })
    }

    /// Moves every in-flight item back to the head of the pending partition,
    /// preserving relative order. Used by the messenger's `stop` so queued
    /// sends survive a restart.
    pub fn move_all_back_to_pending(&mut self) {
        for mut item in self.in_flight.drain(..).rev() {
            item.processing_since = None;
            self.pending.push_front(item);
        }
    }

    /// Completes every queued item with [`QueueResult::Cancelled`].
    pub fn cancel_all(&mut self) -> Vec<Completion<C>> {
        self.in_flight
            .drain(..)
            .chain(self.pending.drain(..))
            .map(|item| Completion {
                context: item.context,
                result: QueueResult::Cancelled,
            })
            .collect()
    }

    /// Whether both partitions are empty.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_empty()
    }

    /// Rewrites the bound on total enqueued time.
    pub fn set_max_enqueued_time_secs(&mut self, secs: Seconds) {
        self.options.max_enqueued_time_secs = secs;
    }

    /// Sets a single queue option by name.
    pub fn set_option(&mut self, name: &str, value: OptionValue) -> Result<(), OptionError> {
        match (name, value) {
            (OPTION_MAX_MESSAGE_ENQUEUED_TIME_SECS, OptionValue::Seconds(secs)) => {
                self.options.max_enqueued_time_secs = secs;
                Ok(())
            }
            (OPTION_MAX_MESSAGE_PROCESSING_TIME_SECS, OptionValue::Seconds(secs)) => {
                self.options.max_processing_time_secs = secs;
                Ok(())
            }
            (OPTION_MAX_RETRY_COUNT, OptionValue::Count(count)) => {
                self.options.max_retry_count = count;
                Ok(())
            }
            (
                OPTION_MAX_MESSAGE_ENQUEUED_TIME_SECS
                | OPTION_MAX_MESSAGE_PROCESSING_TIME_SECS
                | OPTION_MAX_RETRY_COUNT,
                _,
            ) => Err(OptionError::InvalidValue {
                name: name.to_owned(),
            }),
            _ => Err(OptionError::UnsupportedName(name.to_owned())),
        }
    }

    /// Snapshots the current queue options.
    pub fn retrieve_options(&self) -> OptionsSnapshot {
        let mut snapshot = OptionsSnapshot::default();
        snapshot.push(
            OPTION_MAX_MESSAGE_ENQUEUED_TIME_SECS,
            OptionValue::Seconds(self.options.max_enqueued_time_secs),
        );
        snapshot.push(
            OPTION_MAX_MESSAGE_PROCESSING_TIME_SECS,
            OptionValue::Seconds(self.options.max_processing_time_secs),
        );
        snapshot.push(
            OPTION_MAX_RETRY_COUNT,
            OptionValue::Count(self.options.max_retry_count),
        );
        snapshot
    }

    /// Applies a snapshot previously produced by
    /// [`retrieve_options`](Self::retrieve_options).
    pub fn apply_options(&mut self, snapshot: &OptionsSnapshot) -> Result<(), OptionError> {
        for (name, value) in snapshot.iter() {
            self.set_option(name, value.clone())?;
        }
        Ok(())
    }

    fn expire(&mut self, now: Instant) -> Vec<Completion<C>> {
        let mut expired = Vec::new();
        let enqueued_bound = duration_bound(self.options.max_enqueued_time_secs);
        let processing_bound = duration_bound(self.options.max_processing_time_secs);

        if let Some(bound) = enqueued_bound {
            drain_expired(&mut self.pending, &mut expired, |item| {
                now.saturating_duration_since(item.enqueued_at) >= bound
            });
        }

        if enqueued_bound.is_some() || processing_bound.is_some() {
            drain_expired(&mut self.in_flight, &mut expired, |item| {
                let aged_out = enqueued_bound
                    .is_some_and(|bound| now.saturating_duration_since(item.enqueued_at) >= bound);
                let processing_too_long = processing_bound.is_some_and(|bound| {
                    item.processing_since
                        .is_some_and(|since| now.saturating_duration_since(since) >= bound)
                });
                aged_out || processing_too_long
            });
        }

        expired
    }
}

impl<M, C> fmt::Debug for MessageQueue<M, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageQueue")
            .field("options", &self.options)
            .field("pending", &self.pending.len())
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

fn duration_bound(secs: Seconds) -> Option<Duration> {
    (secs != 0).then(|| Duration::from_secs(u64::from(secs)))
}

fn drain_expired<M, C>(
    items: &mut VecDeque<Item<M, C>>,
    expired: &mut Vec<Completion<C>>,
    mut is_expired: impl FnMut(&Item<M, C>) -> bool,
) {
    let mut kept = VecDeque::with_capacity(items.len());
    for item in items.drain(..) {
        if is_expired(&item) {
            warn!(token = item.token, "message expired in the send queue");
            expired.push(Completion {
                context: item.context,
                result: QueueResult::Timeout,
            });
        } else {
            kept.push_back(item);
        }
    }
    *items = kept;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(options: QueueOptions) -> MessageQueue<&'static str, &'static str> {
        MessageQueue::new(options)
    }

    fn dispatch_all(
        queue: &mut MessageQueue<&'static str, &'static str>,
        now: Instant,
        presented: &mut Vec<(SendToken, &'static str)>,
    ) -> Vec<Completion<&'static str>> {
        queue.do_work(now, |token, message| {
            presented.push((token, message));
            ProcessOutcome::Dispatched
        })
    }

    #[test]
    fn presents_pending_items_in_enqueue_order() {
        let now = Instant::now();
        let mut queue = queue(QueueOptions::default());
        queue.enqueue("a", "ctx-a", now);
        queue.enqueue("b", "ctx-b", now);
        queue.enqueue("c", "ctx-c", now);

        let mut presented = Vec::new();
        let completions = dispatch_all(&mut queue, now, &mut presented);

        assert!(completions.is_empty());
        let messages: Vec<_> = presented.iter().map(|(_, m)| *m).collect();
        assert_eq!(messages, vec!["a", "b", "c"]);
        assert!(!queue.is_empty());
    }

    #[test]
    fn completes_in_flight_items_by_token() {
        let now = Instant::now();
        let mut queue = queue(QueueOptions::default());
        let token_a = queue.enqueue("a", "ctx-a", now);
        let token_b = queue.enqueue("b", "ctx-b", now);

        let mut presented = Vec::new();
        dispatch_all(&mut queue, now, &mut presented);

        let completion = queue.complete(token_b, QueueResult::Error).unwrap();
        assert_eq!(completion.context, "ctx-b");
        assert_eq!(completion.result, QueueResult::Error);

        let completion = queue.complete(token_a, QueueResult::Success).unwrap();
        assert_eq!(completion.context, "ctx-a");
        assert_eq!(completion.result, QueueResult::Success);

        assert!(queue.is_empty());
    }

    #[test]
    fn unknown_token_completion_is_ignored() {
        let now = Instant::now();
        let mut queue = queue(QueueOptions::default());
        queue.enqueue("a", "ctx-a", now);

        assert!(queue.complete(42, QueueResult::Success).is_none());
        assert!(!queue.is_empty());
    }

    #[test]
    fn pending_items_age_out_before_being_presented() {
        let now = Instant::now();
        let mut queue = queue(QueueOptions {
            max_enqueued_time_secs: 30,
            ..QueueOptions::default()
        });
        queue.enqueue("a", "ctx-a", now);

        let mut presented = Vec::new();
        let completions = dispatch_all(&mut queue, now + Duration::from_secs(31), &mut presented);

        assert!(presented.is_empty());
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].result, QueueResult::Timeout);
        assert!(queue.is_empty());
    }

    #[test]
    fn in_flight_items_age_out_on_total_enqueued_time() {
        let now = Instant::now();
        let mut queue = queue(QueueOptions {
            max_enqueued_time_secs: 30,
            ..QueueOptions::default()
        });
        queue.enqueue("a", "ctx-a", now);

        let mut presented = Vec::new();
        dispatch_all(&mut queue, now, &mut presented);
        assert_eq!(presented.len(), 1);

        let completions = dispatch_all(&mut queue, now + Duration::from_secs(31), &mut presented);
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].result, QueueResult::Timeout);
        assert!(queue.is_empty());
    }

    #[test]
    fn in_flight_items_time_out_on_processing_bound() {
        let now = Instant::now();
        let mut queue = queue(QueueOptions {
            max_enqueued_time_secs: 0,
            max_processing_time_secs: 10,
            ..QueueOptions::default()
        });
        queue.enqueue("a", "ctx-a", now);

        let mut presented = Vec::new();
        dispatch_all(&mut queue, now, &mut presented);

        let completions = dispatch_all(&mut queue, now + Duration::from_secs(9), &mut presented);
        assert!(completions.is_empty());

        let completions = dispatch_all(&mut queue, now + Duration::from_secs(10), &mut presented);
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].result, QueueResult::Timeout);
    }

    #[test]
    fn failed_items_are_retried_until_the_limit() {
        let now = Instant::now();
        let mut queue = queue(QueueOptions {
            max_retry_count: 2,
            ..QueueOptions::default()
        });
        let token = queue.enqueue("a", "ctx-a", now);

        let mut presented = Vec::new();
        dispatch_all(&mut queue, now, &mut presented);

        // first two errors re-enter pending
        assert!(queue.complete(token, QueueResult::Error).is_none());
        dispatch_all(&mut queue, now, &mut presented);
        assert!(queue.complete(token, QueueResult::Error).is_none());
        dispatch_all(&mut queue, now, &mut presented);

        // third error exhausts the retries
        let completion = queue.complete(token, QueueResult::Error).unwrap();
        assert_eq!(completion.result, QueueResult::Error);
        assert_eq!(presented.len(), 3);
        assert!(queue.is_empty());
    }

    #[test]
    fn immediate_dispatch_failure_completes_without_retries() {
        let now = Instant::now();
        let mut queue = queue(QueueOptions::default());
        queue.enqueue("a", "ctx-a", now);

        let completions = queue.do_work(now, |_, _| ProcessOutcome::Failed);
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].result, QueueResult::Error);
        assert!(queue.is_empty());
    }

    #[test]
    fn move_all_back_to_pending_preserves_order() {
        let now = Instant::now();
        let mut queue = queue(QueueOptions::default());
        queue.enqueue("a", "ctx-a", now);
        queue.enqueue("b", "ctx-b", now);
        queue.enqueue("c", "ctx-c", now);

        let mut presented = Vec::new();
        dispatch_all(&mut queue, now, &mut presented);
        presented.clear();

        queue.move_all_back_to_pending();
        dispatch_all(&mut queue, now, &mut presented);

        let messages: Vec<_> = presented.iter().map(|(_, m)| *m).collect();
        assert_eq!(messages, vec!["a", "b", "c"]);
    }

    #[test]
    fn cancel_all_completes_everything() {
        let now = Instant::now();
        let mut queue = queue(QueueOptions::default());
        queue.enqueue("a", "ctx-a", now);
        queue.enqueue("b", "ctx-b", now);

        let mut presented = Vec::new();
        dispatch_all(&mut queue, now, &mut presented);
        queue.enqueue("c", "ctx-c", now);

        let completions = queue.cancel_all();
        assert_eq!(completions.len(), 3);
        assert!(completions
            .iter()
            .all(|c| c.result == QueueResult::Cancelled));
        assert!(queue.is_empty());
    }

    #[test]
    fn options_snapshot_round_trips() {
        let mut queue = queue(QueueOptions {
            max_retry_count: 3,
            max_enqueued_time_secs: 120,
            max_processing_time_secs: 60,
        });

        let snapshot = queue.retrieve_options();
        let mut other = MessageQueue::<&str, &str>::new(QueueOptions::default());
        other.apply_options(&snapshot).unwrap();

        assert_eq!(other.retrieve_options(), snapshot);
        queue.set_max_enqueued_time_secs(30);
        assert_ne!(queue.retrieve_options(), snapshot);
    }

    #[test]
    fn unknown_option_names_and_wrong_types_fail() {
        let mut queue = queue(QueueOptions::default());
        assert!(queue.set_option("bogus", OptionValue::Count(1)).is_err());
        assert!(queue
            .set_option(OPTION_MAX_RETRY_COUNT, OptionValue::Seconds(1))
            .is_err());
    }
}
