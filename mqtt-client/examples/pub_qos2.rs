use bytes::Bytes;
use mqtt_client::{Client, ClientOptions, NoopHandler};
use mqtt_core::qos::QosLevel;
use mqtt_core::topic::TopicName;
use tokio::net::TcpStream;
use tokio::time::{sleep, Duration};

#[tokio::main]
async fn main() {
    let options = ClientOptions::new("pub-qos2")
        .host("127.0.0.1")
        .port(1883)
        .retry(5_000, 5);
    let stream = TcpStream::connect(options.addr()).await.unwrap();

    let client: Client<TcpStream> = Client::new(options, NoopHandler);
    client.connect(stream).await.unwrap();

    let topic = TopicName::from_str("demo/qos2").unwrap();
    let mut idx: u64 = 0;
    loop {
        sleep(Duration::from_millis(500)).await;
        let payload = Bytes::from(format!("exactly once #{idx}"));
        client
            .publish(&topic, payload, QosLevel::ExactlyOnce, false)
            .await
            .unwrap();
        println!("queued idx {idx}");
        idx += 1;
    }
}
