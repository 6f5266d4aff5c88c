//! Publishes one retained message, so that a subscriber connecting afterward receives the
//! last known value immediately on subscribing.

use bytes::Bytes;
use mqtt_client::{Client, ClientOptions, NoopHandler};
use mqtt_core::qos::QosLevel;
use mqtt_core::topic::TopicName;
use tokio::net::TcpStream;

#[tokio::main]
async fn main() {
    let options = ClientOptions::new("pub-retain").host("127.0.0.1").port(1883);
    let stream = TcpStream::connect(options.addr()).await.unwrap();

    let client: Client<TcpStream> = Client::new(options, NoopHandler);
    client.connect(stream).await.unwrap();

    let topic = TopicName::from_str("demo/retained").unwrap();
    client
        .publish(&topic, Bytes::from_static(b"last known value"), QosLevel::AtLeastOnce, true)
        .await
        .unwrap();

    client.disconnect().await.unwrap();
}
