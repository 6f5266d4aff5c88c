use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::io::{split, AsyncRead, AsyncWrite, BufReader, WriteHalf};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

use mqtt_core::err::client::{ClientError, ErrorKind};
use mqtt_core::id;
use mqtt_core::qos::QosLevel;
use mqtt_core::session::{MessageContext, SessionQueue};
use mqtt_core::topic::{TopicFilter, TopicName, TopicSubscription};
use mqtt_core::v3::{ConnectPacket, PublishPacket, SubscribePacket, UnsubscribePacket};

use crate::dispatch::{dispatch_task, keepalive_task, receive_task, retry_task};
use crate::handler::{ClientHandler, NoopHandler};
use crate::options::ClientOptions;
use crate::transport::Disconnect;

type Reconnector<T> = Arc<dyn Fn() -> BoxFuture<'static, std::io::Result<T>> + Send + Sync>;

/// State shared between the `Client` handle and its receive/dispatch/timer tasks.
pub(crate) struct Shared<T, H> {
    pub(crate) options: ClientOptions,
    pub(crate) write: Mutex<Option<WriteHalf<T>>>,
    pub(crate) send_queue: SessionQueue,
    pub(crate) in_flight: SessionQueue,
    pub(crate) handler: H,
    pub(crate) connected: AtomicBool,
    pub(crate) connack_pending: AtomicBool,
    pub(crate) ping_pending: AtomicBool,
    pub(crate) sub_id: Mutex<Option<u16>>,
    pub(crate) unsub_id: Mutex<Option<u16>>,
    on_disconnect_called: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    reconnector: Mutex<Option<Reconnector<T>>>,
}

/// A session-managed MQTT 3.1.1 client over a single transport connection.
///
/// `T` is the byte stream (`tokio::net::TcpStream` or
/// `tokio_rustls::client::TlsStream<TcpStream>`, or anything else implementing
/// `AsyncRead + AsyncWrite + Unpin`). `H` is an application [`ClientHandler`]; defaults to a
/// handler that ignores every event.
pub struct Client<T, H = NoopHandler> {
    pub(crate) shared: Arc<Shared<T, H>>,
}

impl<T, H> Clone for Client<T, H> {
    fn clone(&self) -> Self {
        return Self {
            shared: self.shared.clone(),
        };
    }
}

impl<T, H> Client<T, H>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    H: ClientHandler,
{
    pub fn new(options: ClientOptions, handler: H) -> Self {
        let send_queue = SessionQueue::new(options.send_queue_size);
        let in_flight = SessionQueue::new(options.inflight_queue_size);

        return Self {
            shared: Arc::new(Shared {
                options,
                write: Mutex::new(None),
                send_queue,
                in_flight,
                handler,
                connected: AtomicBool::new(false),
                connack_pending: AtomicBool::new(false),
                ping_pending: AtomicBool::new(false),
                sub_id: Mutex::new(None),
                unsub_id: Mutex::new(None),
                on_disconnect_called: AtomicBool::new(true),
                tasks: Mutex::new(Vec::new()),
                reconnector: Mutex::new(None),
            }),
        };
    }

    pub fn connected(&self) -> bool {
        return self.shared.connected.load(Ordering::SeqCst);
    }

    /// Registers a factory used by the reconnect timer (see `reconnect_s` in [`ClientOptions`])
    /// to obtain a fresh transport. Opening the connection itself stays the caller's
    /// responsibility, per the transport contract in the external interfaces.
    pub async fn set_reconnector<F>(&self, factory: F)
    where
        F: Fn() -> BoxFuture<'static, std::io::Result<T>> + Send + Sync + 'static,
    {
        *self.shared.reconnector.lock().await = Some(Arc::new(factory));
    }

    /// Opens a session over `stream`. Refuses if a CONNACK is already pending on this client.
    pub async fn connect(&self, stream: T) -> Result<(), ClientError> {
        if self.shared.connack_pending.swap(true, Ordering::SeqCst) {
            return Err(ClientError::new(
                ErrorKind::ProtocolError,
                String::from("a CONNACK is already pending on this client"),
            ));
        }

        if self.shared.options.clean_session {
            self.shared.send_queue.clear().await;
            self.shared.in_flight.clear().await;
        }

        let (read_half, write_half) = split(stream);
        *self.shared.write.lock().await = Some(write_half);
        self.shared.on_disconnect_called.store(false, Ordering::SeqCst);

        let connect_packet = build_connect(&self.shared.options);
        self.write_direct(&connect_packet.encode()?).await?;

        {
            let mut tasks = self.shared.tasks.lock().await;
            tasks.push(tokio::spawn(receive_task(
                self.shared.clone(),
                BufReader::new(read_half),
            )));
            tasks.push(tokio::spawn(dispatch_task(self.shared.clone())));
            tasks.push(tokio::spawn(retry_task(self.shared.clone())));

            if self.shared.options.keep_alive_s > 0 {
                tasks.push(tokio::spawn(keepalive_task(self.shared.clone())));
            }
        }

        let shared = self.shared.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(5)).await;
            if shared.connack_pending.load(Ordering::SeqCst) {
                log::warn!("CONNACK not received within 5s, disconnecting");
                Client { shared }.fail_connection().await;
            }
        });

        return Ok(());
    }

    /// Caller-initiated disconnect: sends `Disconnect`, flushes, and closes the transport.
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        let mut guard = self.shared.write.lock().await;
        if let Some(write_half) = guard.as_mut() {
            let _ = write_half.disconnect().await;
        }
        drop(guard);
        self.on_disconnect().await;
        return Ok(());
    }

    /// Runs the same teardown as [`Client::disconnect`] without attempting to notify the broker
    /// first; used when the transport has already failed.
    pub(crate) async fn fail_connection(&self) {
        self.on_disconnect().await;
    }

    pub(crate) async fn on_disconnect(&self) {
        if self.shared.on_disconnect_called.swap(true, Ordering::SeqCst) {
            return;
        }

        self.shared.connected.store(false, Ordering::SeqCst);
        self.shared.connack_pending.store(false, Ordering::SeqCst);
        self.shared.ping_pending.store(false, Ordering::SeqCst);
        *self.shared.sub_id.lock().await = None;
        *self.shared.unsub_id.lock().await = None;
        *self.shared.write.lock().await = None;

        for task in self.shared.tasks.lock().await.drain(..) {
            task.abort();
        }

        self.shared.handler.on_disconnect();

        if self.shared.options.reconnect_s > 0 {
            let reconnector = self.shared.reconnector.lock().await.clone();
            if let Some(reconnector) = reconnector {
                let client = self.clone();
                let delay = Duration::from_secs(self.shared.options.reconnect_s as u64);
                tokio::spawn(async move {
                    sleep(delay).await;
                    match reconnector().await {
                        Ok(stream) => {
                            if let Err(err) = client.connect(stream).await {
                                log::error!("reconnect attempt failed: {err}");
                            }
                        }
                        Err(err) => log::error!("reconnect transport open failed: {err}"),
                    }
                });
            }
        }
    }

    pub(crate) async fn write_direct(&self, bytes: &Bytes) -> Result<(), ClientError> {
        use tokio::io::AsyncWriteExt;

        let mut guard = self.shared.write.lock().await;
        match guard.as_mut() {
            Some(write_half) => {
                write_half.write_all(bytes).await?;
                write_half.flush().await?;
                return Ok(());
            }
            None => {
                return Err(ClientError::new(
                    ErrorKind::IoError(std::io::Error::new(
                        std::io::ErrorKind::NotConnected,
                        "client is not connected",
                    )),
                    String::new(),
                ));
            }
        }
    }

    /// Enqueues an application message for delivery. QoS 0 publishes on a full send queue are
    /// dropped silently rather than blocking; QoS 1/2 publishes park until space frees up.
    pub async fn publish(
        &self,
        topic: &TopicName,
        payload: Bytes,
        qos: QosLevel,
        retain: bool,
    ) -> Result<(), ClientError> {
        let mut packet = PublishPacket::new(topic, payload);
        packet.set_retain(retain);

        let ctx = match qos {
            QosLevel::AtMostOnce => {
                packet.set_qos_atmostonce();
                MessageContext::originate(packet, None)
            }
            QosLevel::AtLeastOnce => {
                let packet_id = id::next().await;
                packet.set_qos_atleastonce(packet_id);
                MessageContext::originate(packet, Some(packet_id))
            }
            QosLevel::ExactlyOnce => {
                let packet_id = id::next().await;
                packet.set_qos_exactlyonce(packet_id);
                MessageContext::originate(packet, Some(packet_id))
            }
        };

        self.shared.send_queue.add(ctx).await;
        return Ok(());
    }

    /// Subscribes to the given filters. Only one subscribe may be in flight at a time.
    pub async fn subscribe(&self, topics: Vec<TopicSubscription>) -> Result<u16, ClientError> {
        let mut guard = self.shared.sub_id.lock().await;
        if guard.is_some() {
            return Err(ClientError::new(
                ErrorKind::ProtocolError,
                String::from("a SUBSCRIBE is already pending on this client"),
            ));
        }

        let packet_id = id::next().await;
        *guard = Some(packet_id);
        drop(guard);

        let packet = SubscribePacket::new(packet_id, topics);
        self.write_direct(&packet.encode()?).await?;

        let shared = self.shared.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(1)).await;
            let mut guard = shared.sub_id.lock().await;
            if *guard == Some(packet_id) {
                log::warn!("SUBACK for id {packet_id} not received within 1s, disconnecting");
                *guard = None;
                drop(guard);
                id::mark_free(packet_id);
                Client { shared }.fail_connection().await;
            }
        });

        return Ok(packet_id);
    }

    /// Unsubscribes from the given filters. Only one unsubscribe may be in flight at a time.
    pub async fn unsubscribe(&self, filters: Vec<TopicFilter>) -> Result<u16, ClientError> {
        let mut guard = self.shared.unsub_id.lock().await;
        if guard.is_some() {
            return Err(ClientError::new(
                ErrorKind::ProtocolError,
                String::from("an UNSUBSCRIBE is already pending on this client"),
            ));
        }

        let packet_id = id::next().await;
        *guard = Some(packet_id);
        drop(guard);

        let packet = UnsubscribePacket::new(packet_id, filters);
        self.write_direct(&packet.encode()?).await?;

        let shared = self.shared.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(1)).await;
            let mut guard = shared.unsub_id.lock().await;
            if *guard == Some(packet_id) {
                log::warn!("UNSUBACK for id {packet_id} not received within 1s, disconnecting");
                *guard = None;
                drop(guard);
                id::mark_free(packet_id);
                Client { shared }.fail_connection().await;
            }
        });

        return Ok(packet_id);
    }
}

fn build_connect(options: &ClientOptions) -> ConnectPacket {
    let password = options.password.clone().map(Bytes::from);
    return ConnectPacket::new(
        options.clean_session,
        options.keep_alive_s,
        options.client_id.clone(),
        None,
        options.user_name.clone(),
        password,
    );
}
