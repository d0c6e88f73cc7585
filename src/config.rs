use crate::internals::*;
use std::time::Duration;

/// Connection settings for an LMS400.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    /// Host name or IP address of the sensor.
    pub host: String,

    /// TCP port of the CoLa-A interface.
    pub port: u16,

    /// How long `connect` waits for the TCP handshake, per resolved address.
    pub connect_timeout: Duration,

    /// Deadline for one complete telegram. A stalled device fails the read with
    /// `Error::OperationTimeout` instead of blocking forever.
    pub read_timeout: Duration,

    /// Socket read timeout. Must be shorter than `read_timeout`.
    pub poll_interval: Duration,

    /// Socket write timeout.
    pub write_timeout: Duration,
}

impl DeviceConfig {
    /// Creates a config for the given address with default timeouts.
    ///
    /// # Arguments
    ///
    /// * `host` - Host name or IP address of the sensor.
    /// * `port` - TCP port, usually `2111`.
    pub fn new(host: impl Into<String>, port: u16) -> DeviceConfig {
        DeviceConfig {
            host: host.into(),
            port,
            ..DeviceConfig::default()
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> DeviceConfig {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> DeviceConfig {
        self.read_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> DeviceConfig {
        self.poll_interval = interval;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> DeviceConfig {
        self.write_timeout = timeout;
        self
    }

    /// `host:port`, for logs.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for DeviceConfig {
    /// Factory address `192.168.0.1:2111` with the default timeouts.
    fn default() -> DeviceConfig {
        DeviceConfig {
            host: LMS400_DEFAULT_HOST.to_owned(),
            port: LMS400_DEFAULT_PORT,
            connect_timeout: LMS400_DEFAULT_CONNECT_TIMEOUT,
            read_timeout: LMS400_DEFAULT_READ_TIMEOUT,
            poll_interval: LMS400_DEFAULT_POLL_INTERVAL,
            write_timeout: LMS400_DEFAULT_WRITE_TIMEOUT,
        }
    }
}
