use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, error, info, warn};
use rumqttc::{AsyncClient, Event, MqttOptions, Outgoing, Packet, QoS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::backoff::Backoff;
use crate::config::{self, ReconnectConfig};
use crate::error::TransportError;
use crate::messages::{LOCATION_UPDATE, LocationUpdate, TrackerRequest, TransportEvent};
use crate::transport::{Connection, Transport};

#[derive(Debug, Clone)]
pub struct MqttTransport {
    config: config::MqttConfig,
    reconnect: ReconnectConfig,
}

#[derive(Debug)]
pub struct MqttConnection {
    outbox: mpsc::UnboundedSender<Outbound>,
    topic_path: String,
    connected: Arc<AtomicBool>,
    closing: Arc<AtomicBool>,
    task: JoinHandle<()>,
    sender: JoinHandle<()>,
}

/// Requests queued for the client. Unbounded so a burst of sends never
/// overflows the client's request channel; the sender task awaits capacity.
#[derive(Debug)]
enum Outbound {
    Publish { topic: String, body: Vec<u8> },
    Subscribe(String),
    Disconnect,
}

/// State shared with the task polling the event loop.
struct EventLoopTask {
    outbox: mpsc::UnboundedSender<Outbound>,
    inbound_topic: String,
    connected: Arc<AtomicBool>,
    closing: Arc<AtomicBool>,
    backoff: Backoff,
    events: mpsc::Sender<TransportEvent>,
}

fn topic(topic_path: &str, event: &str) -> String {
    format!("{topic_path}/{event}")
}

impl MqttTransport {
    pub fn new(config: &config::MqttConfig, reconnect: &ReconnectConfig) -> Self {
        MqttTransport {
            config: config.clone(),
            reconnect: reconnect.clone(),
        }
    }

    fn options(&self) -> MqttOptions {
        let mut mqttoptions = MqttOptions::new(
            self.config.client_id(),
            self.config.host.clone(),
            self.config.port(),
        );

        mqttoptions.set_keep_alive(self.config.keep_alive());

        if let (Some(username), Some(password)) = (
            self.config.username.as_ref(),
            self.config.password.as_ref(),
        ) {
            mqttoptions.set_credentials(username.clone(), password.clone());
        }

        mqttoptions
    }
}

impl Transport for MqttTransport {
    type Connection = MqttConnection;

    fn open(&self, events: mpsc::Sender<TransportEvent>) -> MqttConnection {
        info!(
            "Connecting to location tracking server at {}:{}",
            self.config.host,
            self.config.port()
        );
        let (client, eventloop) = AsyncClient::new(self.options(), 10);
        let topic_path = self.config.topic_path();
        let connected = Arc::new(AtomicBool::new(false));
        let closing = Arc::new(AtomicBool::new(false));
        let (outbox, requests) = mpsc::unbounded_channel();

        let task = EventLoopTask {
            outbox: outbox.clone(),
            inbound_topic: topic(&topic_path, LOCATION_UPDATE),
            connected: connected.clone(),
            closing: closing.clone(),
            backoff: Backoff::new(&self.reconnect),
            events,
        };

        MqttConnection {
            outbox,
            topic_path,
            connected,
            closing,
            task: tokio::spawn(task.run(eventloop)),
            sender: tokio::spawn(send_requests(client, requests)),
        }
    }
}

impl EventLoopTask {
    async fn run(mut self, mut eventloop: rumqttc::EventLoop) {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("Connected to location tracking server");
                    self.connected.store(true, Ordering::SeqCst);
                    self.backoff.reset();
                    if self
                        .outbox
                        .send(Outbound::Subscribe(self.inbound_topic.clone()))
                        .is_err()
                    {
                        error!("Error subscribing to {}: sender stopped", self.inbound_topic);
                    }
                    if !self.forward(TransportEvent::Connected).await {
                        break;
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(_))) => {
                    debug!("Subscription acknowledged");
                }
                Ok(Event::Incoming(Packet::Publish(p))) => {
                    if p.topic != self.inbound_topic {
                        debug!("Ignoring message on topic {}", p.topic);
                        continue;
                    }
                    match serde_json::from_slice::<LocationUpdate>(&p.payload) {
                        Ok(update) => {
                            debug!(
                                "Location update for tracker {}: {}",
                                update.tracker_id, update.location
                            );
                            if !self.forward(TransportEvent::LocationUpdate(update)).await {
                                break;
                            }
                        }
                        Err(err) => warn!("Malformed location update: {err}"),
                    }
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    self.connected.store(false, Ordering::SeqCst);
                    info!("Disconnected from location tracking server");
                    break;
                }
                Ok(_) => {}
                Err(err) => {
                    if self.closing.load(Ordering::SeqCst) {
                        break;
                    }
                    if self.connected.swap(false, Ordering::SeqCst) {
                        info!("Disconnected from location tracking server");
                        if !self.forward(TransportEvent::Disconnected).await {
                            break;
                        }
                    }
                    warn!("Error polling MQTT event loop: {err:?}");

                    let Some(delay) = self.backoff.next_delay() else {
                        error!(
                            "Giving up on location tracking server after {} attempts",
                            self.backoff.attempt()
                        );
                        self.forward(TransportEvent::GaveUp).await;
                        break;
                    };
                    let reconnecting = TransportEvent::Reconnecting {
                        attempt: self.backoff.attempt(),
                        delay,
                    };
                    if !self.forward(reconnecting).await {
                        break;
                    }
                    tokio::time::sleep(delay).await;
                }
            }
        }
        debug!("MQTT event loop finished");
    }

    /// Returns `false` once nobody is listening.
    async fn forward(&self, event: TransportEvent) -> bool {
        self.events.send(event).await.is_ok()
    }
}

/// Feeds queued requests to the client in order, waiting for room in its
/// request channel instead of failing when it is full.
async fn send_requests(client: AsyncClient, mut requests: mpsc::UnboundedReceiver<Outbound>) {
    while let Some(request) = requests.recv().await {
        match request {
            Outbound::Publish { topic, body } => {
                if let Err(err) = client.publish(&topic, QoS::AtMostOnce, false, body).await {
                    error!("Error publishing to {topic}: {err:?}");
                }
            }
            Outbound::Subscribe(topic) => {
                if let Err(err) = client.subscribe(&topic, QoS::AtMostOnce).await {
                    error!("Error subscribing to {topic}: {err:?}");
                }
            }
            Outbound::Disconnect => {
                if let Err(err) = client.disconnect().await {
                    debug!("Error disconnecting MQTT client: {err:?}");
                }
                break;
            }
        }
    }
}

impl Connection for MqttConnection {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn is_active(&self) -> bool {
        !self.closing.load(Ordering::SeqCst) && !self.task.is_finished()
    }

    fn emit(&self, event: &str, payload: &TrackerRequest) -> Result<(), TransportError> {
        if self.closing.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        let body = serde_json::to_vec(payload)?;
        self.outbox
            .send(Outbound::Publish {
                topic: topic(&self.topic_path, event),
                body,
            })
            .map_err(|_| TransportError::NotConnected)
    }

    fn close(&self) -> Result<(), TransportError> {
        debug!("Disconnecting MQTT client");
        self.closing.store(true, Ordering::SeqCst);
        if self.outbox.send(Outbound::Disconnect).is_err() {
            self.task.abort();
            return Err(TransportError::NotConnected);
        }
        Ok(())
    }
}

impl Drop for MqttConnection {
    fn drop(&mut self) {
        // A closed connection is left to flush its queue and disconnect.
        if !self.closing.load(Ordering::SeqCst) {
            self.task.abort();
            self.sender.abort();
        }
    }
}
