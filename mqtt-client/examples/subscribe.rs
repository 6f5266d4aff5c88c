use std::env;

use bytes::Bytes;
use mqtt_client::{Client, ClientHandler, ClientOptions};
use mqtt_core::qos::{QosLevel, SubAckQoS};
use mqtt_core::topic::{TopicFilter, TopicName, TopicSubscription};
use tokio::net::TcpStream;

struct PrintHandler;

impl ClientHandler for PrintHandler {
    fn on_connack(&self, session_present: bool) {
        println!("connected, session_present={session_present}");
    }

    fn on_publish(&self, topic: &TopicName, payload: &Bytes, qos: QosLevel, retain: bool) {
        println!("{} ({qos:?}, retain={retain}): {payload:?}", topic.clone().to_string());
    }

    fn on_suback(&self, packet_id: u16, return_codes: &[SubAckQoS]) {
        println!("subscribed, packet_id={packet_id}, granted={return_codes:?}");
    }
}

#[tokio::main]
async fn main() {
    let filters: Vec<String> = env::args().skip(1).collect();
    let filters = if filters.is_empty() {
        vec![String::from("demo/#")]
    } else {
        filters
    };

    let options = ClientOptions::new("subscriber").host("127.0.0.1").port(1883);
    let stream = TcpStream::connect(options.addr()).await.unwrap();

    let client: Client<TcpStream, PrintHandler> = Client::new(options, PrintHandler);
    client.connect(stream).await.unwrap();

    let subs = filters
        .into_iter()
        .map(|f| TopicSubscription::new(TopicFilter::from_str(&f).unwrap(), QosLevel::ExactlyOnce))
        .collect();

    client.subscribe(subs).await.unwrap();

    // block forever; delivery happens via PrintHandler::on_publish on the receive task.
    std::future::pending::<()>().await;
}
