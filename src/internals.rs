use std::time::Duration;

/// Factory address of the LMS400 Ethernet interface.
pub const LMS400_DEFAULT_HOST: &str = "192.168.0.1";

/// TCP port of the CoLa-A binary interface.
pub const LMS400_DEFAULT_PORT: u16 = 2111;

/// Default timeout for establishing the TCP connection.
pub const LMS400_DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Default deadline for receiving one complete telegram.
pub const LMS400_DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Default socket read timeout. Bounds a single blocking read inside a telegram deadline.
pub const LMS400_DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Default socket write timeout.
pub const LMS400_DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);
