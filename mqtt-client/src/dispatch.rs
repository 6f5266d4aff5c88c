use std::sync::atomic::Ordering;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite, BufReader, ReadHalf};
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};

use mqtt_core::err::client::ClientError;
use mqtt_core::id;
use mqtt_core::io::read_packet;
use mqtt_core::qos::QosLevel;
use mqtt_core::session::{MessageContext, PacketState};
use mqtt_core::v3::{
    ConnAckPacket, MqttPacket, PingReqPacket, PubAckPacket, PubCompPacket, PubRecPacket,
    PubRelPacket, PublishPacket, SubAckPacket, UnsubAckPacket,
};
use mqtt_core::{ConnectReturnCode, Encode};

use crate::client::{Client, Shared};
use crate::handler::ClientHandler;

fn client<T, H>(shared: Arc<Shared<T, H>>) -> Client<T, H> {
    return Client { shared };
}

/// Reads frames off the connection and dispatches each to its handler.
///
/// Exits (tearing the session down) on a decode error or a clean EOF. A packet the broker
/// has no business sending (`Connect`, `Subscribe`, `Unsubscribe`) is a protocol violation and
/// also ends the session; anything else that arrives unexpected (an ack for an id we don't
/// recognize) is logged and otherwise handled per the normal QoS rules.
pub(crate) async fn receive_task<T, H>(
    shared: Arc<Shared<T, H>>,
    mut reader: BufReader<ReadHalf<T>>,
) where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    H: ClientHandler,
{
    let mut buf = BytesMut::with_capacity(4096);

    loop {
        match read_packet::<_, ClientError>(&mut reader, &mut buf).await {
            Ok(Some(packet)) => handle_packet(&shared, packet).await,
            Ok(None) => {
                log::warn!("connection closed by peer");
                client(shared.clone()).fail_connection().await;
                return;
            }
            Err(err) => {
                log::warn!("error reading from stream, disconnecting: {err}");
                client(shared.clone()).fail_connection().await;
                return;
            }
        }
    }
}

async fn handle_packet<T, H>(shared: &Arc<Shared<T, H>>, packet: MqttPacket)
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    H: ClientHandler,
{
    match packet {
        MqttPacket::ConnAck(ack) => handle_connack(shared, ack).await,
        MqttPacket::PingResp(_) => {
            shared.ping_pending.store(false, Ordering::SeqCst);
            shared.handler.on_pingresp();
        }
        MqttPacket::Publish(publish) => handle_publish(shared, publish).await,
        MqttPacket::PubAck(ack) => handle_puback(shared, ack).await,
        MqttPacket::PubRec(ack) => handle_pubrec(shared, ack).await,
        MqttPacket::PubRel(rel) => handle_pubrel(shared, rel).await,
        MqttPacket::PubComp(comp) => handle_pubcomp(shared, comp).await,
        MqttPacket::SubAck(ack) => handle_suback(shared, ack).await,
        MqttPacket::UnsubAck(ack) => handle_unsuback(shared, ack).await,
        MqttPacket::Connect(_) | MqttPacket::Subscribe(_) | MqttPacket::Unsubscribe(_) => {
            log::warn!("received a packet type the broker is never allowed to send, disconnecting");
            client(shared.clone()).fail_connection().await;
        }
    }
}

async fn handle_connack<T, H>(shared: &Arc<Shared<T, H>>, ack: ConnAckPacket)
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    H: ClientHandler,
{
    if !shared.connack_pending.swap(false, Ordering::SeqCst) {
        log::warn!("received unexpected CONNACK, ignoring");
        return;
    }

    if ack.return_code() != ConnectReturnCode::Accept {
        log::warn!("broker refused connection: {}", ack.return_code());
        client(shared.clone()).fail_connection().await;
        return;
    }

    shared.connected.store(true, Ordering::SeqCst);
    shared.handler.on_connack(ack.session_present());
}

async fn handle_publish<T, H>(shared: &Arc<Shared<T, H>>, publish: PublishPacket)
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    H: ClientHandler,
{
    let qos = publish.qos();
    let topic = publish.topic().clone();
    let payload = publish.payload().clone();
    let retain = publish.retain();

    match qos {
        QosLevel::AtMostOnce => {
            shared.handler.on_publish(&topic, &payload, qos, retain);
        }
        QosLevel::AtLeastOnce => {
            let Some(id) = publish.id() else {
                log::warn!("received QoS 1 PUBLISH with no packet id, ignoring");
                return;
            };
            shared.handler.on_publish(&topic, &payload, qos, retain);
            let _ = client(shared.clone())
                .write_direct(&PubAckPacket::new(id).encode())
                .await;
        }
        QosLevel::ExactlyOnce => {
            let Some(id) = publish.id() else {
                log::warn!("received QoS 2 PUBLISH with no packet id, ignoring");
                return;
            };

            // A retransmitted PUBLISH with the same id arrives before our PUBREL is
            // acknowledged with a PUBCOMP; deliver once, on first receipt, and just
            // re-send the PUBREC on any repeat.
            if shared
                .in_flight
                .find(id, &[PacketState::WaitPubRel])
                .await
                .is_none()
            {
                shared.handler.on_publish(&topic, &payload, qos, retain);
                shared
                    .in_flight
                    .add(MessageContext::receive_wait_rel(publish, id))
                    .await;
            }

            let _ = client(shared.clone())
                .write_direct(&PubRecPacket::new(id).encode())
                .await;
        }
    }
}

async fn handle_puback<T, H>(shared: &Arc<Shared<T, H>>, ack: PubAckPacket) {
    match shared.in_flight.find(ack.id(), &[PacketState::WaitPubAck]).await {
        Some(idx) => {
            shared.in_flight.remove_at(idx).await;
        }
        None => log::warn!("received PUBACK for unknown or already-acked id {}", ack.id()),
    }
}

async fn handle_pubrec<T, H>(shared: &Arc<Shared<T, H>>, ack: PubRecPacket)
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    H: ClientHandler,
{
    match shared
        .in_flight
        .find(ack.id(), &[PacketState::WaitPubRec, PacketState::WaitPubComp])
        .await
    {
        Some(idx) => {
            shared
                .in_flight
                .with_mut(idx, |ctx| ctx.set_state(PacketState::WaitPubComp))
                .await;
        }
        None => log::warn!("received PUBREC for unknown id {}, responding anyway", ack.id()),
    }

    // PUBREL always goes out, even for an id we no longer recognize: the broker is waiting
    // for one before it will send PUBCOMP, and ack packets bypass the send queue entirely.
    let _ = client(shared.clone())
        .write_direct(&PubRelPacket::new(ack.id()).encode())
        .await;
}

async fn handle_pubrel<T, H>(shared: &Arc<Shared<T, H>>, rel: PubRelPacket)
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    H: ClientHandler,
{
    match shared.in_flight.find(rel.id(), &[PacketState::WaitPubRel]).await {
        Some(idx) => {
            shared.in_flight.remove_at(idx).await;
        }
        None => log::warn!("received PUBREL for unknown id {}, responding anyway", rel.id()),
    }

    let _ = client(shared.clone())
        .write_direct(&PubCompPacket::new(rel.id()).encode())
        .await;
}

async fn handle_pubcomp<T, H>(shared: &Arc<Shared<T, H>>, comp: PubCompPacket) {
    match shared.in_flight.find(comp.id(), &[PacketState::WaitPubComp]).await {
        Some(idx) => {
            shared.in_flight.remove_at(idx).await;
        }
        None => log::warn!("received PUBCOMP for unknown id {}", comp.id()),
    }
}

async fn handle_suback<T, H>(shared: &Arc<Shared<T, H>>, ack: SubAckPacket)
where
    H: ClientHandler,
{
    let mut guard = shared.sub_id.lock().await;
    if *guard == Some(ack.id()) {
        *guard = None;
        drop(guard);
        id::mark_free(ack.id());
        shared.handler.on_suback(ack.id(), ack.return_codes());
    } else {
        drop(guard);
        log::warn!("received SUBACK for id {} with no pending SUBSCRIBE, ignoring", ack.id());
    }
}

async fn handle_unsuback<T, H>(shared: &Arc<Shared<T, H>>, ack: UnsubAckPacket)
where
    H: ClientHandler,
{
    let mut guard = shared.unsub_id.lock().await;
    if *guard == Some(ack.id()) {
        *guard = None;
        drop(guard);
        id::mark_free(ack.id());
        shared.handler.on_unsuback(ack.id());
    } else {
        drop(guard);
        log::warn!(
            "received UNSUBACK for id {} with no pending UNSUBSCRIBE, ignoring",
            ack.id()
        );
    }
}

/// Drains the send queue in order, handing each queued `Publish` its in-flight bookkeeping
/// before it goes out. Parks (rather than busy-polling) while disconnected or idle.
pub(crate) async fn dispatch_task<T, H>(shared: Arc<Shared<T, H>>)
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    H: ClientHandler,
{
    loop {
        if !shared.connected.load(Ordering::SeqCst) {
            shared.send_queue.wait(Some(Duration::from_millis(100))).await;
            continue;
        }

        let Some(ctx) = shared.send_queue.front().await else {
            shared.send_queue.wait(Some(Duration::from_millis(250))).await;
            continue;
        };

        let needs_in_flight = matches!(
            ctx.state(),
            PacketState::QueuedQoS1 | PacketState::QueuedQoS2
        );

        if needs_in_flight && shared.in_flight.is_full().await {
            shared.in_flight.wait(Some(Duration::from_millis(100))).await;
            continue;
        }

        let Some(mut ctx) = shared.send_queue.pop_front().await else {
            continue;
        };

        let bytes = match ctx.packet().encode() {
            Ok(bytes) => bytes,
            Err(err) => {
                log::error!("failed to encode queued PUBLISH, dropping: {err}");
                continue;
            }
        };

        if let Err(err) = client(shared.clone()).write_direct(&bytes).await {
            log::warn!("write failed dispatching queued PUBLISH, disconnecting: {err}");
            client(shared.clone()).fail_connection().await;
            return;
        }

        match ctx.state() {
            PacketState::QueuedQoS1 => {
                ctx.set_state(PacketState::WaitPubAck);
                shared.in_flight.add(ctx).await;
            }
            PacketState::QueuedQoS2 => {
                ctx.set_state(PacketState::WaitPubRec);
                shared.in_flight.add(ctx).await;
            }
            _ => {}
        }
    }
}

/// Scans the in-flight queue for entries whose retry clock has elapsed and resends them with
/// `DUP` set, up to `retry_attempts` resends per entry. An entry that exhausts its attempts is
/// logged and left in place rather than torn down: the underlying transport's own retransmission
/// (e.g. TCP) is the backstop once this layer gives up.
pub(crate) async fn retry_task<T, H>(shared: Arc<Shared<T, H>>)
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    H: ClientHandler,
{
    let scan_period = Duration::from_millis((shared.options.retry_delay_ms as u64 / 2).max(100));
    let mut ticker = interval(scan_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if !shared.connected.load(Ordering::SeqCst) {
            continue;
        }

        for idx in shared.in_flight.timed_out_indices().await {
            let resend = shared
                .in_flight
                .with_mut(idx, |ctx| {
                    let exhausted = ctx.attempts() >= shared.options.retry_attempts;
                    ctx.record_retry();
                    if exhausted {
                        return None;
                    }
                    let mut packet = (**ctx.packet()).clone();
                    packet.set_dup(true);
                    return Some(packet);
                })
                .await
                .flatten();

            match resend {
                Some(packet) => {
                    let bytes = match packet.encode() {
                        Ok(bytes) => bytes,
                        Err(err) => {
                            log::error!("failed to re-encode in-flight PUBLISH: {err}");
                            continue;
                        }
                    };
                    if let Err(err) = client(shared.clone()).write_direct(&bytes).await {
                        log::warn!("retry write failed, disconnecting: {err}");
                        client(shared.clone()).fail_connection().await;
                        return;
                    }
                }
                None => {
                    log::warn!(
                        "in-flight publish exhausted {} retry attempts, leaving it in place",
                        shared.options.retry_attempts
                    );
                }
            }
        }
    }
}

/// Sends a `PingReq` every `keep_alive_s` (unless one is already outstanding), arming a
/// 10-second `PingResp` timeout on each send. Only spawned when `keep_alive_s > 0`.
pub(crate) async fn keepalive_task<T, H>(shared: Arc<Shared<T, H>>)
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    H: ClientHandler,
{
    let period = Duration::from_secs(shared.options.keep_alive_s as u64);

    loop {
        sleep(period).await;

        if !shared.connected.load(Ordering::SeqCst) {
            return;
        }

        if shared.ping_pending.swap(true, Ordering::SeqCst) {
            // A PingResp is already outstanding; its own 10s timer will catch a stall.
            continue;
        }

        if let Err(err) = client(shared.clone())
            .write_direct(&PingReqPacket::new().encode())
            .await
        {
            log::warn!("keepalive PINGREQ write failed, disconnecting: {err}");
            client(shared.clone()).fail_connection().await;
            return;
        }

        let shared = shared.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(10)).await;
            if shared.ping_pending.load(Ordering::SeqCst) {
                log::warn!("PINGRESP not received within 10s, disconnecting");
                client(shared).fail_connection().await;
            }
        });
    }
}
