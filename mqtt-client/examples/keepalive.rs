//! A client that sends no application traffic, relying entirely on the keep-alive timer to
//! hold the session open and detect a dead broker.

use mqtt_client::{Client, ClientHandler, ClientOptions};
use tokio::net::TcpStream;

struct PingLogger;

impl ClientHandler for PingLogger {
    fn on_pingresp(&self) {
        println!("pingresp received");
    }

    fn on_disconnect(&self) {
        println!("disconnected");
    }
}

#[tokio::main]
async fn main() {
    let options = ClientOptions::new("idle-keepalive")
        .host("127.0.0.1")
        .port(1883)
        .keep_alive_s(15);
    let stream = TcpStream::connect(options.addr()).await.unwrap();

    let client: Client<TcpStream, PingLogger> = Client::new(options, PingLogger);
    client.connect(stream).await.unwrap();

    std::future::pending::<()>().await;
}
