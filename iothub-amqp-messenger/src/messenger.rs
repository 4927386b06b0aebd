//! The AMQP messenger: link lifecycle, state machine and dispatch loop

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use fe2o3_amqp_types::definitions::ReceiverSettleMode;
use fe2o3_amqp_types::messaging::{Message, Outcome, Source, Target};
use serde_amqp::primitives::OrderedMap;
use serde_amqp::Value;
use tracing::{debug, error, warn};

use crate::addressing::{self, AddressError};
use crate::attach;
use crate::constants::{
    DEFAULT_DEVICES_PATH_FORMAT, DEFAULT_MAX_SEND_ERROR_COUNT, DEFAULT_RECEIVE_LINK_SOURCE_SUFFIX,
    DEFAULT_SEND_LINK_TARGET_SUFFIX, MAX_MESSAGE_RECEIVER_STATE_CHANGE_TIMEOUT,
    MAX_MESSAGE_SENDER_STATE_CHANGE_TIMEOUT, MESSAGE_RECEIVER_LINK_NAME_PREFIX,
    MESSAGE_RECEIVER_MAX_MESSAGE_SIZE, MESSAGE_SENDER_LINK_NAME_PREFIX,
    MESSAGE_SENDER_MAX_MESSAGE_SIZE, OPTION_EVENT_SEND_TIMEOUT_SECS,
    OPTION_SAVED_MESSAGE_QUEUE_OPTIONS,
};
use crate::disposition::{DispositionInfo, DispositionResult};
use crate::error::{CreateError, DispositionError, OptionError, StateError, SubscribeError};
use crate::options::{OptionValue, OptionsSnapshot};
use crate::queue::{Completion, MessageQueue, ProcessOutcome, QueueOptions, QueueResult};
use crate::session::{
    AttachError, LinkState, ReceiverAttach, ReceiverEndpoint, SenderAttach, SenderEndpoint,
    Session,
};
use crate::time::{Clock, WallClock};

/// Coarse state of the messenger, as reported to the state-change observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessengerState {
    /// `start` was called; the sender link is being provisioned.
    Starting,

    /// The sender link is open; sends and receives flow.
    Started,

    /// `stop` is tearing the links down.
    Stopping,

    /// Initial state, and the state after a successful `stop`.
    Stopped,

    /// The messenger gave up; recover with `stop` followed by `start`.
    Error,
}

/// How a send handed to [`AmqpMessenger::send_async`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendResult {
    /// The peer accepted the message.
    Ok,

    /// The message could not be converted for the wire. Not produced by
    /// this crate; carried for layers that translate application messages
    /// before enqueueing.
    CannotParse,

    /// The transport failed to deliver the message.
    FailSending,

    /// The message aged out before the peer accepted it.
    Timeout,

    /// The messenger was destroyed while the message was still queued.
    MessengerDestroyed,
}

/// Whether the messenger still has sends in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// The send queue is empty.
    Idle,

    /// At least one send is pending or in flight.
    Busy,
}

type StateChangedHandler = Box<dyn FnMut(MessengerState, MessengerState)>;
type MessageReceivedHandler = Box<dyn FnMut(Message<Value>, DispositionInfo) -> DispositionResult>;
type SendCompleteHandler = Box<dyn FnOnce(SendResult)>;

/// Configuration for [`AmqpMessenger::new`].
///
/// `device_id` and `iothub_host_fqdn` are mandatory; the address templates
/// default to the telemetry link layout
/// (`%s/devices/%s` + `messages/events` / `messages/devicebound`).
pub struct MessengerConfig {
    pub(crate) device_id: String,
    pub(crate) iothub_host_fqdn: String,
    pub(crate) devices_path_format: String,
    pub(crate) send_link_target_suffix: String,
    pub(crate) receive_link_source_suffix: String,
    pub(crate) send_link_attach_properties: Option<OrderedMap<String, String>>,
    pub(crate) receive_link_attach_properties: Option<OrderedMap<String, String>>,
    pub(crate) on_state_changed: Option<StateChangedHandler>,
    pub(crate) clock: Option<Arc<dyn Clock>>,
}

impl MessengerConfig {
    /// Creates a configuration with the default telemetry address layout.
    pub fn new(device_id: impl Into<String>, iothub_host_fqdn: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            iothub_host_fqdn: iothub_host_fqdn.into(),
            devices_path_format: DEFAULT_DEVICES_PATH_FORMAT.to_owned(),
            send_link_target_suffix: DEFAULT_SEND_LINK_TARGET_SUFFIX.to_owned(),
            receive_link_source_suffix: DEFAULT_RECEIVE_LINK_SOURCE_SUFFIX.to_owned(),
            send_link_attach_properties: None,
            receive_link_attach_properties: None,
            on_state_changed: None,
            clock: None,
        }
    }

    /// Overrides the devices-path format. The format must carry two `%s`
    /// substitutions, receiving the host fqdn and the device id.
    pub fn devices_path_format(mut self, format: impl Into<String>) -> Self {
        self.devices_path_format = format.into();
        self
    }

    /// Overrides the suffix appended to the devices path for the sender
    /// link target address.
    pub fn send_link_target_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.send_link_target_suffix = suffix.into();
        self
    }

    /// Overrides the suffix appended to the devices path for the receiver
    /// link source address.
    pub fn receive_link_source_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.receive_link_source_suffix = suffix.into();
        self
    }

    /// Properties applied to the sender link at attach time.
    pub fn send_link_attach_properties(mut self, properties: OrderedMap<String, String>) -> Self {
        self.send_link_attach_properties = Some(properties);
        self
    }

    /// Properties applied to the receiver link at attach time.
    pub fn receive_link_attach_properties(
        mut self,
        properties: OrderedMap<String, String>,
    ) -> Self {
        self.receive_link_attach_properties = Some(properties);
        self
    }

    /// Observer invoked on every actual messenger state transition with
    /// `(previous, new)`.
    pub fn on_state_changed<F>(mut self, on_state_changed: F) -> Self
    where
        F: FnMut(MessengerState, MessengerState) + 'static,
    {
        self.on_state_changed = Some(Box::new(on_state_changed));
        self
    }

    /// Overrides the time source. Defaults to [`WallClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }
}

impl fmt::Debug for MessengerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessengerConfig")
            .field("device_id", &self.device_id)
            .field("iothub_host_fqdn", &self.iothub_host_fqdn)
            .field("devices_path_format", &self.devices_path_format)
            .field("send_link_target_suffix", &self.send_link_target_suffix)
            .field(
                "receive_link_source_suffix",
                &self.receive_link_source_suffix,
            )
            .finish_non_exhaustive()
    }
}

/// Latest observed state of a link endpoint, with the time of the last
/// change.
#[derive(Debug, Clone, Copy, Default)]
struct LinkShadow {
    current: LinkState,
    previous: LinkState,
    last_change: Option<Instant>,
}

impl LinkShadow {
    fn observe(&mut self, state: LinkState, now: Instant) {
        if state != self.current {
            self.previous = self.current;
            self.current = state;
            self.last_change = Some(now);
        }
    }

    fn timed_out(&self, timeout: Duration, now: Instant) -> bool {
        self.last_change
            .is_some_and(|at| now.saturating_duration_since(at) >= timeout)
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum LinkCreateError {
    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Attach(#[from] AttachError),

    #[error("no session is stored on the messenger")]
    NoSession,
}

/// A per-device AMQP application messenger.
///
/// Owns a telemetry sender link and, while subscribed, a cloud-to-device
/// receiver link on the session supplied to [`start`](Self::start). The
/// messenger is cooperative: nothing progresses between calls to
/// [`do_work`](Self::do_work), which the host must invoke regularly from a
/// single thread.
pub struct AmqpMessenger {
    device_id: String,
    iothub_host_fqdn: String,
    devices_path_format: String,
    send_link_target_suffix: String,
    receive_link_source_suffix: String,
    send_link_attach_properties: Option<OrderedMap<String, String>>,
    receive_link_attach_properties: Option<OrderedMap<String, String>>,

    on_state_changed: Option<StateChangedHandler>,

    receive_messages: bool,
    on_message_received: Option<MessageReceivedHandler>,

    send_queue: MessageQueue<Message<Value>, SendCompleteHandler>,
    state: MessengerState,

    session: Option<Box<dyn Session>>,
    sender: Option<Box<dyn SenderEndpoint>>,
    sender_shadow: LinkShadow,
    receiver: Option<Box<dyn ReceiverEndpoint>>,
    receiver_shadow: LinkShadow,

    send_error_count: u32,
    max_send_error_count: u32,
    clock: Arc<dyn Clock>,
}

impl AmqpMessenger {
    /// Creates a messenger in the [`Stopped`](MessengerState::Stopped)
    /// state.
    pub fn new(config: MessengerConfig) -> Result<Self, CreateError> {
        if config.device_id.is_empty() {
            return Err(CreateError::EmptyDeviceId);
        }
        if config.iothub_host_fqdn.is_empty() {
            return Err(CreateError::EmptyHostFqdn);
        }

        Ok(Self {
            device_id: config.device_id,
            iothub_host_fqdn: config.iothub_host_fqdn,
            devices_path_format: config.devices_path_format,
            send_link_target_suffix: config.send_link_target_suffix,
            receive_link_source_suffix: config.receive_link_source_suffix,
            send_link_attach_properties: config.send_link_attach_properties,
            receive_link_attach_properties: config.receive_link_attach_properties,
            on_state_changed: config.on_state_changed,
            receive_messages: false,
            on_message_received: None,
            send_queue: MessageQueue::new(QueueOptions::default()),
            state: MessengerState::Stopped,
            session: None,
            sender: None,
            sender_shadow: LinkShadow::default(),
            receiver: None,
            receiver_shadow: LinkShadow::default(),
            send_error_count: 0,
            max_send_error_count: DEFAULT_MAX_SEND_ERROR_COUNT,
            clock: config.clock.unwrap_or_else(|| Arc::new(WallClock)),
        })
    }

    /// Current messenger state.
    pub fn state(&self) -> MessengerState {
        self.state
    }

    /// Stores the session and moves to
    /// [`Starting`](MessengerState::Starting). The sender link is attached
    /// on the next [`do_work`](Self::do_work).
    pub fn start(&mut self, session: Box<dyn Session>) -> Result<(), StateError> {
        if self.state != MessengerState::Stopped {
            return Err(StateError::NotStopped(self.state));
        }
        self.session = Some(session);
        self.update_state(MessengerState::Starting);
        Ok(())
    }

    /// Destroys both links synchronously and moves every in-flight send
    /// back to pending so it survives a later [`start`](Self::start).
    pub fn stop(&mut self) -> Result<(), StateError> {
        if self.state == MessengerState::Stopped {
            return Err(StateError::AlreadyStopped);
        }
        self.update_state(MessengerState::Stopping);
        self.destroy_message_sender();
        self.destroy_message_receiver();
        self.send_queue.move_all_back_to_pending();
        self.update_state(MessengerState::Stopped);
        Ok(())
    }

    /// One cooperative tick: observe link states, advance the state
    /// machine, provision or tear down links for the current phase, and
    /// pump the send queue. Never blocks.
    pub fn do_work(&mut self) {
        let now = self.clock.now();
        self.observe_link_states(now);
        self.process_state_changes(now);

        match self.state {
            MessengerState::Starting => {
                if self.sender.is_none() {
                    if let Err(error) = self.create_message_sender() {
                        error!(
                            device_id = %self.device_id,
                            %error,
                            "failed creating the message sender"
                        );
                        self.update_state(MessengerState::Error);
                    }
                }
            }
            MessengerState::Started => {
                if self.receive_messages && self.receiver.is_none() {
                    if let Err(error) = self.create_message_receiver() {
                        warn!(
                            device_id = %self.device_id,
                            %error,
                            "failed creating the message receiver"
                        );
                    }
                } else if !self.receive_messages && self.receiver.is_some() {
                    self.destroy_message_receiver();
                }

                self.drain_received_messages();
                self.pump_send_queue(now);

                if self.send_error_count >= self.max_send_error_count {
                    error!(
                        device_id = %self.device_id,
                        "reached the maximum number of consecutive send failures"
                    );
                    self.update_state(MessengerState::Error);
                }
            }
            _ => {}
        }
    }

    /// Enqueues a message for delivery. The completion callback fires
    /// exactly once with the terminal [`SendResult`], from within a later
    /// [`do_work`](Self::do_work) tick or from drop.
    pub fn send_async<F>(&mut self, message: Message<Value>, on_send_complete: F)
    where
        F: FnOnce(SendResult) + 'static,
    {
        let now = self.clock.now();
        self.send_queue
            .enqueue(message, Box::new(on_send_complete), now);
    }

    /// [`SendStatus::Idle`] when the send queue is empty, otherwise
    /// [`SendStatus::Busy`].
    pub fn send_status(&self) -> SendStatus {
        if self.send_queue.is_empty() {
            SendStatus::Idle
        } else {
            SendStatus::Busy
        }
    }

    /// Installs the cloud-to-device message callback. The receiver link is
    /// attached on the next [`do_work`](Self::do_work) tick that finds the
    /// messenger [`Started`](MessengerState::Started).
    pub fn subscribe<F>(&mut self, on_message_received: F) -> Result<(), SubscribeError>
    where
        F: FnMut(Message<Value>, DispositionInfo) -> DispositionResult + 'static,
    {
        if self.receive_messages {
            return Err(SubscribeError::AlreadySubscribed);
        }
        self.on_message_received = Some(Box::new(on_message_received));
        self.receive_messages = true;
        Ok(())
    }

    /// Removes the message callback; the receiver link is torn down on the
    /// next tick.
    pub fn unsubscribe(&mut self) -> Result<(), SubscribeError> {
        if !self.receive_messages {
            return Err(SubscribeError::NotSubscribed);
        }
        self.receive_messages = false;
        self.on_message_received = None;
        Ok(())
    }

    /// Issues a disposition for a message received earlier. Valid only
    /// while the receiver link the message arrived on is still attached.
    pub fn send_disposition(
        &mut self,
        info: DispositionInfo,
        result: DispositionResult,
    ) -> Result<(), DispositionError> {
        let receiver = self
            .receiver
            .as_deref_mut()
            .ok_or(DispositionError::ReceiverNotAttached)?;
        if receiver.link_name() != info.link_name {
            return Err(DispositionError::UnknownLink {
                link_name: info.link_name,
            });
        }
        let outcome = result
            .into_outcome()
            .ok_or(DispositionError::UnsupportedResult)?;
        receiver.disposition(info.delivery_number, outcome)?;
        Ok(())
    }

    /// Sets a messenger option. Supported names are
    /// [`OPTION_EVENT_SEND_TIMEOUT_SECS`] (a [`OptionValue::Seconds`]) and
    /// [`OPTION_SAVED_MESSAGE_QUEUE_OPTIONS`] (a nested
    /// [`OptionValue::Snapshot`]).
    pub fn set_option(&mut self, name: &str, value: OptionValue) -> Result<(), OptionError> {
        match name {
            OPTION_EVENT_SEND_TIMEOUT_SECS => match value {
                OptionValue::Seconds(secs) => {
                    self.send_queue.set_max_enqueued_time_secs(secs);
                    Ok(())
                }
                _ => Err(OptionError::InvalidValue {
                    name: name.to_owned(),
                }),
            },
            OPTION_SAVED_MESSAGE_QUEUE_OPTIONS => match value {
                OptionValue::Snapshot(snapshot) => self.send_queue.apply_options(&snapshot),
                _ => Err(OptionError::InvalidValue {
                    name: name.to_owned(),
                }),
            },
            _ => Err(OptionError::UnsupportedName(name.to_owned())),
        }
    }

    /// Snapshots the configurable knobs, embedding the send queue's own
    /// snapshot under [`OPTION_SAVED_MESSAGE_QUEUE_OPTIONS`].
    pub fn retrieve_options(&self) -> OptionsSnapshot {
        let mut snapshot = OptionsSnapshot::default();
        snapshot.push(
            OPTION_SAVED_MESSAGE_QUEUE_OPTIONS,
            OptionValue::Snapshot(self.send_queue.retrieve_options()),
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

    fn update_state(&mut self, new_state: MessengerState) {
        if new_state != self.state {
            let previous = self.state;
            self.state = new_state;
            debug!(
                device_id = %self.device_id,
                ?previous,
                state = ?new_state,
                "messenger state changed"
            );
            if let Some(on_state_changed) = self.on_state_changed.as_mut() {
                on_state_changed(previous, new_state);
            }
        }
    }

    fn observe_link_states(&mut self, now: Instant) {
        if let Some(sender) = self.sender.as_deref() {
            self.sender_shadow.observe(sender.state(), now);
        }
        if let Some(receiver) = self.receiver.as_deref() {
            self.receiver_shadow.observe(receiver.state(), now);
        }
    }

    // Sets the messenger state based on the states observed from the sender
    // and receiver endpoints. Links are created and destroyed synchronously
    // in the other states, so only Started and Starting need checking.
    fn process_state_changes(&mut self, now: Instant) {
        match self.state {
            MessengerState::Started => {
                if self.sender_shadow.current != LinkState::Open {
                    error!(
                        device_id = %self.device_id,
                        state = ?self.sender_shadow.current,
                        previous = ?self.sender_shadow.previous,
                        "message sender reported an unexpected state while the messenger was started"
                    );
                    self.update_state(MessengerState::Error);
                } else if self.receiver.is_some() && self.receiver_shadow.current != LinkState::Open
                {
                    match self.receiver_shadow.current {
                        LinkState::Opening => {
                            if self
                                .receiver_shadow
                                .timed_out(MAX_MESSAGE_RECEIVER_STATE_CHANGE_TIMEOUT, now)
                            {
                                error!(
                                    device_id = %self.device_id,
                                    "message receiver failed to open within the expected timeout"
                                );
                                self.update_state(MessengerState::Error);
                            }
                        }
                        LinkState::Error | LinkState::Idle => {
                            error!(
                                device_id = %self.device_id,
                                state = ?self.receiver_shadow.current,
                                previous = ?self.receiver_shadow.previous,
                                "message receiver reported an unexpected state"
                            );
                            self.update_state(MessengerState::Error);
                        }
                        _ => {}
                    }
                }
            }
            MessengerState::Starting => match self.sender_shadow.current {
                LinkState::Open => self.update_state(MessengerState::Started),
                LinkState::Opening => {
                    if self
                        .sender_shadow
                        .timed_out(MAX_MESSAGE_SENDER_STATE_CHANGE_TIMEOUT, now)
                    {
                        error!(
                            device_id = %self.device_id,
                            "message sender failed to open within the expected timeout"
                        );
                        self.update_state(MessengerState::Error);
                    }
                }
                LinkState::Error | LinkState::Closing => {
                    error!(
                        device_id = %self.device_id,
                        state = ?self.sender_shadow.current,
                        previous = ?self.sender_shadow.previous,
                        "message sender reported an unexpected state while the messenger was starting"
                    );
                    self.update_state(MessengerState::Error);
                }
                // Idle is only legitimate while the sender has not been
                // created yet.
                LinkState::Idle if self.sender.is_some() => {
                    error!(
                        device_id = %self.device_id,
                        "message sender fell back to idle while the messenger was starting"
                    );
                    self.update_state(MessengerState::Error);
                }
                LinkState::Idle => {}
            },
            _ => {}
        }
    }

    fn create_message_sender(&mut self) -> Result<(), LinkCreateError> {
        let devices_path = addressing::devices_path(
            &self.devices_path_format,
            &self.iothub_host_fqdn,
            &self.device_id,
        )?;
        let send_link_address =
            addressing::link_address(&devices_path, &self.send_link_target_suffix);
        let link_name =
            addressing::unique_link_name(MESSAGE_SENDER_LINK_NAME_PREFIX, &self.device_id);
        let source_name = addressing::link_source_name(&link_name);

        let attach = SenderAttach {
            name: link_name,
            source: Source::builder().address(source_name).build(),
            target: Target::builder().address(send_link_address).build(),
            max_message_size: MESSAGE_SENDER_MAX_MESSAGE_SIZE,
            properties: self
                .send_link_attach_properties
                .as_ref()
                .map(attach::link_attach_properties),
        };

        let session = self.session.as_mut().ok_or(LinkCreateError::NoSession)?;
        let sender = session.attach_sender(attach)?;
        self.sender = Some(sender);
        self.sender_shadow = LinkShadow::default();
        Ok(())
    }

    fn create_message_receiver(&mut self) -> Result<(), LinkCreateError> {
        let devices_path = addressing::devices_path(
            &self.devices_path_format,
            &self.iothub_host_fqdn,
            &self.device_id,
        )?;
        let receive_link_address =
            addressing::link_address(&devices_path, &self.receive_link_source_suffix);
        let link_name =
            addressing::unique_link_name(MESSAGE_RECEIVER_LINK_NAME_PREFIX, &self.device_id);
        let target_name = addressing::link_target_name(&link_name);

        let attach = ReceiverAttach {
            name: link_name,
            source: Source::builder().address(receive_link_address).build(),
            target: Target::builder().address(target_name).build(),
            rcv_settle_mode: ReceiverSettleMode::First,
            max_message_size: MESSAGE_RECEIVER_MAX_MESSAGE_SIZE,
            properties: self
                .receive_link_attach_properties
                .as_ref()
                .map(attach::link_attach_properties),
        };

        let session = self.session.as_mut().ok_or(LinkCreateError::NoSession)?;
        let receiver = session.attach_receiver(attach)?;
        self.receiver = Some(receiver);
        self.receiver_shadow = LinkShadow::default();
        Ok(())
    }

    fn destroy_message_sender(&mut self) {
        if let Some(mut sender) = self.sender.take() {
            sender.close();
            self.sender_shadow = LinkShadow::default();
        }
    }

    fn destroy_message_receiver(&mut self) {
        if let Some(mut receiver) = self.receiver.take() {
            receiver.close();
            self.receiver_shadow = LinkShadow::default();
        }
    }

    fn drain_received_messages(&mut self) {
        let (Some(receiver), Some(on_message)) = (
            self.receiver.as_deref_mut(),
            self.on_message_received.as_mut(),
        ) else {
            return;
        };

        while let Some((delivery_number, message)) = receiver.try_recv() {
            let info = DispositionInfo {
                delivery_number,
                link_name: receiver.link_name().to_owned(),
            };
            let verdict = on_message(message, info);
            if let Some(outcome) = verdict.into_outcome() {
                if let Err(error) = receiver.disposition(delivery_number, outcome) {
                    warn!(
                        %error,
                        delivery_number,
                        "failed sending the disposition for a received message"
                    );
                }
            }
        }
    }

    fn pump_send_queue(&mut self, now: Instant) {
        let mut completions = Vec::new();

        if let Some(sender) = self.sender.as_deref_mut() {
            while let Some(confirmation) = sender.try_recv_confirmation() {
                let result = match confirmation.outcome {
                    Ok(Outcome::Accepted(_)) => QueueResult::Success,
                    Ok(outcome) => {
                        warn!(?outcome, "send settled with a non-accepted outcome");
                        QueueResult::Error
                    }
                    Err(error) => {
                        warn!(%error, "send failed in the transport");
                        QueueResult::Error
                    }
                };
                completions.extend(self.send_queue.complete(confirmation.token, result));
            }
        }

        let mut sender = self.sender.as_deref_mut();
        completions.extend(self.send_queue.do_work(now, |token, message| {
            let Some(sender) = sender.as_mut() else {
                return ProcessOutcome::Failed;
            };
            match sender.send(token, message) {
                Ok(()) => ProcessOutcome::Dispatched,
                Err(error) => {
                    error!(%error, token, "failed handing a message to the sender link");
                    ProcessOutcome::Failed
                }
            }
        }));

        for completion in completions {
            self.route_completion(completion);
        }
    }

    // Translates a queue completion into the user-facing send result.
    fn route_completion(&mut self, completion: Completion<SendCompleteHandler>) {
        let result = match completion.result {
            QueueResult::Success => SendResult::Ok,
            QueueResult::Timeout => SendResult::Timeout,
            QueueResult::Cancelled if self.state == MessengerState::Stopped => {
                SendResult::MessengerDestroyed
            }
            QueueResult::Cancelled | QueueResult::Error => {
                self.send_error_count += 1;
                SendResult::FailSending
            }
        };
        (completion.context)(result);
    }
}

impl fmt::Debug for AmqpMessenger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmqpMessenger")
            .field("device_id", &self.device_id)
            .field("iothub_host_fqdn", &self.iothub_host_fqdn)
            .field("state", &self.state)
            .field("receive_messages", &self.receive_messages)
            .field("send_queue", &self.send_queue)
            .field("send_error_count", &self.send_error_count)
            .finish_non_exhaustive()
    }
}

impl Drop for AmqpMessenger {
    // Destroy is stop-then-free: tear the links down and complete every
    // remaining send exactly once.
    fn drop(&mut self) {
        if self.state != MessengerState::Stopped {
            let _ = self.stop();
        }
        for completion in self.send_queue.cancel_all() {
            self.route_completion(completion);
        }
    }
}
