use std::env;

use mqtt_client::{Client, ClientOptions, NoopHandler};
use mqtt_core::topic::TopicFilter;
use tokio::net::TcpStream;
use tokio::time::{sleep, Duration};

#[tokio::main]
async fn main() {
    let filters: Vec<String> = env::args().skip(1).collect();
    let filters = if filters.is_empty() {
        vec![String::from("demo/#")]
    } else {
        filters
    };

    let options = ClientOptions::new("unsubscriber").host("127.0.0.1").port(1883);
    let stream = TcpStream::connect(options.addr()).await.unwrap();

    let client: Client<TcpStream> = Client::new(options, NoopHandler);
    client.connect(stream).await.unwrap();

    sleep(Duration::from_millis(200)).await;

    let filters = filters
        .into_iter()
        .map(|f| TopicFilter::from_str(&f).unwrap())
        .collect();

    client.unsubscribe(filters).await.unwrap();

    sleep(Duration::from_secs(1)).await;
    client.disconnect().await.unwrap();
}
