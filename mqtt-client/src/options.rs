use std::{fs::File, io::Read as _, path::Path};

use serde::Deserialize;

/// Configuration for a single client connection.
///
/// A builder for programmatic construction (the primary path for a library) plus an optional
/// `TryFrom<&Path>` for callers that prefer a TOML config file.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub user_name: Option<String>,
    pub password: Option<String>,
    pub retry_delay_ms: u32,
    pub retry_attempts: u32,
    pub clean_session: bool,
    pub send_queue_size: usize,
    pub inflight_queue_size: usize,
    pub keep_alive_s: u16,
    pub reconnect_s: u16,
}

impl Default for ClientOptions {
    fn default() -> Self {
        return Self {
            host: String::from("127.0.0.1"),
            port: 1883,
            client_id: String::from("vibe-mqtt"),
            user_name: None,
            password: None,
            retry_delay_ms: 10_000,
            retry_attempts: 3,
            clean_session: true,
            send_queue_size: 1000,
            inflight_queue_size: 10,
            keep_alive_s: 0,
            reconnect_s: 0,
        };
    }
}

impl ClientOptions {
    pub fn new(client_id: impl Into<String>) -> Self {
        return Self {
            client_id: client_id.into(),
            ..Self::default()
        };
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        return self;
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        return self;
    }

    pub fn credentials(mut self, user_name: impl Into<String>, password: impl Into<String>) -> Self {
        self.user_name = Some(user_name.into());
        self.password = Some(password.into());
        return self;
    }

    pub fn clean_session(mut self, val: bool) -> Self {
        self.clean_session = val;
        return self;
    }

    pub fn keep_alive_s(mut self, secs: u16) -> Self {
        self.keep_alive_s = secs;
        return self;
    }

    pub fn reconnect_s(mut self, secs: u16) -> Self {
        self.reconnect_s = secs;
        return self;
    }

    pub fn retry(mut self, delay_ms: u32, attempts: u32) -> Self {
        self.retry_delay_ms = delay_ms;
        self.retry_attempts = attempts;
        return self;
    }

    pub fn queue_sizes(mut self, send: usize, inflight: usize) -> Self {
        self.send_queue_size = send;
        self.inflight_queue_size = inflight;
        return self;
    }

    pub fn addr(&self) -> String {
        return format!("{}:{}", self.host, self.port);
    }
}

impl TryFrom<&Path> for ClientOptions {
    type Error = toml::de::Error;

    fn try_from(value: &Path) -> Result<Self, toml::de::Error> {
        let mut file = match File::open(value) {
            Ok(file) => file,
            Err(err) => {
                log::warn!(
                    "Could not load file: {} to initialize client options.",
                    value.to_str().unwrap_or("")
                );
                log::error!("{err}");
                panic!();
            }
        };

        let mut buf = String::new();
        if let Err(err) = file.read_to_string(&mut buf) {
            log::warn!("Could not read file {}", value.to_str().unwrap_or(""));
            log::error!("{err}");
        }

        let options: ClientOptions = toml::from_str(&buf)?;

        if options.port == 8883 {
            log::warn!(
                "Connecting on port 8883 over what this crate treats as a plaintext transport; that port is conventionally reserved for TLS."
            );
        }

        return Ok(options);
    }
}

#[cfg(test)]
mod options {
    use super::ClientOptions;

    #[test]
    fn defaults_match_settings_table() {
        let opts = ClientOptions::default();
        assert_eq!(opts.host, "127.0.0.1");
        assert_eq!(opts.port, 1883);
        assert_eq!(opts.client_id, "vibe-mqtt");
        assert_eq!(opts.retry_delay_ms, 10_000);
        assert_eq!(opts.retry_attempts, 3);
        assert!(opts.clean_session);
        assert_eq!(opts.send_queue_size, 1000);
        assert_eq!(opts.inflight_queue_size, 10);
        assert_eq!(opts.keep_alive_s, 0);
        assert_eq!(opts.reconnect_s, 0);
    }

    #[test]
    fn builder_overrides_fields() {
        let opts = ClientOptions::new("device-1")
            .host("broker.example.com")
            .port(8883)
            .clean_session(false)
            .keep_alive_s(30);

        assert_eq!(opts.client_id, "device-1");
        assert_eq!(opts.host, "broker.example.com");
        assert_eq!(opts.port, 8883);
        assert!(!opts.clean_session);
        assert_eq!(opts.keep_alive_s, 30);
    }
}
