use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use vehiclelink_frame::{Frame, FrameError, MessageType, RecordCodec};
use vehiclelink_transport::{Connector, PortInfo};

use crate::ack::AckCorrelator;
use crate::bus::{DisconnectReason, EventBus, LinkNotification, SubscriptionId, Topic};
use crate::command::{encode_command, CommandId, CommandOptions};
use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::event::{decode_event, EventError};
use crate::liveness::{LivenessConfig, LivenessMonitor};

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Disconnected => f.write_str("disconnected"),
            LinkState::Connecting => f.write_str("connecting"),
            LinkState::Connected => f.write_str("connected"),
        }
    }
}

/// Owns one link to the microcontroller.
///
/// Construct one per port at the composition root and share it by reference
/// or `Arc`. Subscriptions outlive individual connections.
pub struct ConnectionManager {
    config: LinkConfig,
    connector: Arc<dyn Connector>,
    bus: Arc<EventBus>,
    state: Arc<watch::Sender<LinkState>>,
    active: Mutex<Option<ActiveLink>>,
}

struct ActiveLink {
    port: String,
    session: Arc<Session>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl ConnectionManager {
    pub fn new(config: LinkConfig, connector: Arc<dyn Connector>) -> Self {
        let (state, _) = watch::channel(LinkState::Disconnected);
        Self {
            config,
            connector,
            bus: Arc::new(EventBus::new()),
            state: Arc::new(state),
            active: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Open `port` and start the reader and writer tasks.
    pub async fn connect(&self, port: &str) -> Result<()> {
        let mut active = self.active.lock().await;
        if *self.state.borrow() != LinkState::Disconnected {
            return Err(LinkError::AlreadyConnected);
        }
        // Tasks of a link that failed on its own have already stopped.
        active.take();

        self.state.send_replace(LinkState::Connecting);
        info!(
            port,
            transport = self.connector.transport_name(),
            format = %self.config.frame.record_format,
            "connecting"
        );

        let stream = match self.connector.open(port) {
            Ok(stream) => stream,
            Err(source) => {
                self.state.send_replace(LinkState::Disconnected);
                warn!(port, error = %source, "port unavailable");
                return Err(LinkError::PortUnavailable {
                    port: port.to_string(),
                    source,
                });
            }
        };

        let (read_half, write_half) = tokio::io::split(stream);
        let (outbound_tx, outbound_rx) = mpsc::channel(self.config.outbound_queue);
        let session = Arc::new(Session {
            cancel: CancellationToken::new(),
            acks: AckCorrelator::new(self.config.ack.clone()),
            outbound: outbound_tx,
            closed: AtomicBool::new(false),
            bus: Arc::clone(&self.bus),
            state: Arc::clone(&self.state),
        });

        // Connected before the tasks start so an immediate EOF is not overwritten.
        self.state.send_replace(LinkState::Connected);

        let records = FramedRead::new(read_half, RecordCodec::new(self.config.frame.clone()));
        let sink = FramedWrite::new(write_half, RecordCodec::new(self.config.frame.clone()));
        let reader = tokio::spawn(read_loop(
            Arc::clone(&session),
            records,
            self.config.liveness.clone(),
        ));
        let writer = tokio::spawn(write_loop(Arc::clone(&session), sink, outbound_rx));

        *active = Some(ActiveLink {
            port: port.to_string(),
            session,
            reader,
            writer,
        });
        info!(port, "connected");
        Ok(())
    }

    /// Tear the link down. Calling it while disconnected does nothing.
    pub async fn disconnect(&self) {
        let mut active = self.active.lock().await;
        let Some(link) = active.take() else {
            return;
        };
        link.session.close(DisconnectReason::Requested);
        let _ = link.reader.await;
        let _ = link.writer.await;
        debug!(port = %link.port, "transport released");
    }

    /// Send a command and wait for the device to acknowledge it.
    pub async fn send_command(&self, command: CommandId, options: CommandOptions) -> Result<()> {
        let session = {
            let active = self.active.lock().await;
            match active.as_ref() {
                Some(link) if !link.session.is_closed() => Arc::clone(&link.session),
                _ => return Err(LinkError::NotConnected),
            }
        };

        let frame = Frame::new(MessageType::Command, encode_command(command, &options));
        info!(%command, duration = ?options.duration, "sending command");
        let result = session
            .acks
            .send(command.as_u8(), frame, |frame| session.enqueue(frame))
            .await;
        match &result {
            Ok(()) => info!(%command, "command acknowledged"),
            Err(err) => warn!(%command, error = %err, "command failed"),
        }
        result
    }

    /// Register `handler` for a notification name, an event name, or `*`.
    pub fn subscribe<F>(&self, topic: impl Into<Topic>, handler: F) -> SubscriptionId
    where
        F: Fn(&LinkNotification) + Send + Sync + 'static,
    {
        self.bus.subscribe(topic, handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    pub fn state(&self) -> LinkState {
        *self.state.borrow()
    }

    /// Follow state changes.
    pub fn watch_state(&self) -> watch::Receiver<LinkState> {
        self.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == LinkState::Connected
    }

    /// Ports the connector can open.
    pub fn list_ports(&self) -> Result<Vec<PortInfo>> {
        Ok(self.connector.list_ports()?)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(link) = self.active.get_mut().take() {
            link.session.cancel.cancel();
        }
    }
}

/// State shared by the tasks of one connection.
struct Session {
    cancel: CancellationToken,
    acks: AckCorrelator,
    outbound: mpsc::Sender<Frame>,
    closed: AtomicBool,
    bus: Arc<EventBus>,
    state: Arc<watch::Sender<LinkState>>,
}

impl Session {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    async fn enqueue(&self, frame: Frame) -> Result<()> {
        if self.is_closed() {
            return Err(LinkError::Disconnected);
        }
        self.outbound
            .send(frame)
            .await
            .map_err(|_| LinkError::Disconnected)
    }

    /// Runs once per connection, whichever side notices first.
    fn close(&self, reason: DisconnectReason) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel.cancel();
        let failed = self.acks.fail_all();
        self.state.send_replace(LinkState::Disconnected);
        match &reason {
            DisconnectReason::Requested => {
                info!(%reason, failed_commands = failed, "link disconnected")
            }
            _ => warn!(%reason, failed_commands = failed, "link disconnected"),
        }
        self.bus.publish(&LinkNotification::Disconnected { reason });
    }

    async fn handle_frame(&self, frame: Frame) {
        match frame.message_type {
            MessageType::Event => self.handle_event(frame).await,
            MessageType::Ack => match frame.leading_byte() {
                Some(id) => {
                    self.acks.on_ack(id);
                }
                None => trace!("keep-alive ACK"),
            },
            MessageType::Command => {
                debug!(payload = ?frame.payload, "ignoring COMMAND frame from device");
            }
            MessageType::Unknown(tag) => {
                warn!(tag, len = frame.payload.len(), "unknown message type");
                self.bus.publish(&LinkNotification::Unrecognized {
                    message_type: frame.message_type,
                    payload: frame.payload,
                });
            }
        }
    }

    async fn handle_event(&self, frame: Frame) {
        let Some(id) = frame.leading_byte() else {
            warn!("EVENT frame with empty payload");
            return;
        };

        match decode_event(&frame.payload, SystemTime::now()) {
            Ok(event) => {
                info!(event = event.name(), "event received");
                self.bus.publish(&LinkNotification::Event(event));
            }
            Err(EventError::UnknownEvent(raw)) => {
                warn!(id = raw, "unknown event id");
                self.bus.publish(&LinkNotification::Unrecognized {
                    message_type: MessageType::Event,
                    payload: frame.payload.clone(),
                });
            }
            Err(err) => warn!(error = %err, "malformed event payload"),
        }

        // Every event id is ACKed, known or not.
        if let Err(err) = self.enqueue(Frame::ack(id)).await {
            debug!(id, error = %err, "could not queue event ACK");
        }
    }
}

async fn read_loop<R>(
    session: Arc<Session>,
    mut records: FramedRead<R, RecordCodec>,
    liveness: LivenessConfig,
) where
    R: AsyncRead + Unpin,
{
    let start = Instant::now();
    let mut monitor = LivenessMonitor::new(liveness.silence_threshold, start);
    let mut ticker = tokio::time::interval_at(
        start + liveness.check_interval,
        liveness.check_interval,
    );
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let reason = loop {
        tokio::select! {
            _ = session.cancel.cancelled() => return,
            item = records.next() => match item {
                Some(Ok(Ok(frame))) => {
                    monitor.record_activity(Instant::now());
                    trace!(message_type = %frame.message_type, len = frame.payload.len(), "frame received");
                    session.handle_frame(frame).await;
                }
                Some(Ok(Err(err))) => {
                    warn!(kind = err.kind(), error = %err, "dropping malformed record");
                }
                Some(Err(err)) => break DisconnectReason::PortError(err.to_string()),
                None => break DisconnectReason::Closed,
            },
            _ = ticker.tick() => {
                if let Some(silent_for) = monitor.check(Instant::now()) {
                    warn!(?silent_for, "no data received, connection may be lost");
                    session
                        .bus
                        .publish(&LinkNotification::ConnectionLost { silent_for });
                }
                if liveness.heartbeat {
                    match session.outbound.try_send(Frame::new(MessageType::Command, Bytes::new())) {
                        Ok(()) => trace!("heartbeat queued"),
                        Err(_) => debug!("outbound queue full, skipping heartbeat"),
                    }
                }
            }
        }
    };
    session.close(reason);
}

async fn write_loop<W>(
    session: Arc<Session>,
    mut sink: FramedWrite<W, RecordCodec>,
    mut outbound: mpsc::Receiver<Frame>,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let frame = tokio::select! {
            _ = session.cancel.cancelled() => break,
            frame = outbound.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };
        trace!(message_type = %frame.message_type, len = frame.payload.len(), "writing frame");

        let written = tokio::select! {
            _ = session.cancel.cancelled() => break,
            written = sink.send(frame) => written,
        };
        match written {
            Ok(()) => {}
            Err(FrameError::Io(err)) => {
                session.close(DisconnectReason::PortError(err.to_string()));
                break;
            }
            Err(err) => warn!(error = %err, "dropping unencodable frame"),
        }
    }
}
