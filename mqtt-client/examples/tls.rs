//! Connects over TLS. Pass the broker's CA certificate (PEM) as the first argument.

use std::{env, sync::Arc};

use mqtt_client::{Client, ClientOptions, NoopHandler};
use tokio::net::TcpStream;
use tokio_rustls::{
    rustls::{
        self,
        pki_types::{pem::PemObject, CertificateDer, ServerName},
    },
    TlsConnector,
};

#[tokio::main]
async fn main() {
    let cert_path = env::args().nth(1).expect("usage: tls <ca-cert.pem>");

    let options = ClientOptions::new("tls-client").host("broker.example.com").port(8883);
    let tcp = TcpStream::connect(options.addr()).await.unwrap();

    let mut root_cert_store = rustls::RootCertStore::empty();
    for cert in CertificateDer::pem_file_iter(&cert_path).unwrap() {
        root_cert_store.add(cert.unwrap()).unwrap();
    }

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_cert_store)
        .with_no_client_auth();

    let connector = TlsConnector::from(Arc::new(config));
    let domain = ServerName::try_from(options.host.clone()).unwrap();
    let stream = connector.connect(domain, tcp).await.unwrap();

    let client: Client<_> = Client::new(options, NoopHandler);
    client.connect(stream).await.unwrap();

    std::future::pending::<()>().await;
}
