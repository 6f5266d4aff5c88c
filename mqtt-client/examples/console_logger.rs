//! A minimal `log::Log` implementation for manual testing against a live broker: colorized,
//! console-only, no file sink. Modeled on the broker's own logger, with the file-writing half
//! dropped since an application embedding this crate owns its own log sinks.

use bytes::Bytes;
use colored::Colorize;
use log::{Level, LevelFilter, Metadata, Record};
use mqtt_client::{Client, ClientHandler, ClientOptions};
use mqtt_core::qos::QosLevel;
use mqtt_core::topic::TopicName;
use tokio::net::TcpStream;

struct ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Info
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let level = match record.level() {
            Level::Error => record.level().to_string().red(),
            Level::Warn => record.level().to_string().yellow(),
            Level::Info => record.level().to_string().cyan(),
            Level::Debug => record.level().to_string().purple(),
            Level::Trace => record.level().to_string().normal(),
        };

        println!("{level} - {}", record.args());
    }

    fn flush(&self) {}
}

struct PrintHandler;

impl ClientHandler for PrintHandler {
    fn on_publish(&self, topic: &TopicName, payload: &Bytes, qos: QosLevel, retain: bool) {
        println!(
            "{} ({qos:?}, retain={retain}): {payload:?}",
            topic.clone().to_string()
        );
    }
}

#[tokio::main]
async fn main() {
    log::set_max_level(LevelFilter::Info);
    log::set_logger(&ConsoleLogger).expect("a logger was already installed");

    let options = ClientOptions::new("console-logger-demo").host("127.0.0.1").port(1883);
    let stream = TcpStream::connect(options.addr()).await.unwrap();

    let client: Client<TcpStream, PrintHandler> = Client::new(options, PrintHandler);
    client.connect(stream).await.unwrap();

    std::future::pending::<()>().await;
}
