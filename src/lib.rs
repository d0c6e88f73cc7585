//! # LMS400 Driver
//!
//! `lms400` talks to SICK LMS400 laser measurement sensors over the binary CoLa-A interface
//! (TCP port 2111). It covers the connection lifecycle, the SOPAS request / acknowledge /
//! answer handshake, bounded capture of measurement telegrams with cooperative cancellation,
//! and conversion of the captured telegrams into polar/Cartesian points.
//!
//! ```ignore
//! use lms400::{DeviceConfig, Lms400Device, TextFileSink};
//!
//! let mut lms = Lms400Device::new(DeviceConfig::new("192.168.0.1", 2111));
//! lms.connect()?;
//! lms.scan(10)?;
//! lms.process_captured()?;
//! lms.save(&mut TextFileSink::new("."), "scan")?;
//! lms.disconnect()?;
//! ```

extern crate byteorder;
extern crate log;

pub mod base;
mod cancel;
mod checksum;
mod cmds;
mod config;
mod export;
mod handshake;
mod internals;
pub mod parsers;
mod protocol;
mod scanner;
pub mod types;
pub mod utils;

#[cfg(test)]
mod testing;

pub use crate::base::{Channel, Error, Result, Telegram, Transport};
pub use crate::cancel::ResetSignal;
pub use crate::checksum::Checksum;
pub use crate::cmds::*;
pub use crate::config::DeviceConfig;
pub use crate::export::{write_point_cloud, ScanSink, TextFileSink};
pub use crate::handshake::{classify, CommandProtocol, HandshakeOutcome};
pub use crate::internals::*;
pub use crate::protocol::{encode_frame, ColaProtocol};
pub use crate::scanner::{ScanController, ScanState};

use crate::types::{ConnectionState, ScanRecord};
use crate::utils::{format_scan_history, simulate_scan};
use log::{debug, error, info, trace, warn};
use std::io;
use std::net::{TcpStream, ToSocketAddrs};

/// Connection to and control interface for one LMS400.
///
/// The device owns the session (the framed channel over the socket), the handshake driver
/// with its stray-telegram log, the scan controller with its captured telegrams, and the
/// history of processed scan records. The history survives reconnects until cleared.
///
/// All calls block the calling thread. The device can be moved to a worker thread; the only
/// state another thread may touch while a call is in progress is the [`ResetSignal`] obtained
/// from [`Lms400Device::reset_signal`].
pub struct Lms400Device {
    config: DeviceConfig,
    channel: Option<Channel<ColaProtocol, dyn Transport + Send>>,
    commands: CommandProtocol,
    scanner: ScanController,
    reset: ResetSignal,
    scan_history: Vec<ScanRecord>,
}

impl Lms400Device {
    /// Creates a disconnected device for the configured address.
    pub fn new(config: DeviceConfig) -> Lms400Device {
        trace!("Creating new Lms400Device for {}", config.address());
        Lms400Device {
            commands: CommandProtocol::new(config.read_timeout),
            scanner: ScanController::new(config.read_timeout),
            config,
            channel: None,
            reset: ResetSignal::new(),
            scan_history: Vec::new(),
        }
    }

    /// Creates a disconnected device for `host:port` with default timeouts.
    pub fn with_address(host: impl Into<String>, port: u16) -> Lms400Device {
        Lms400Device::new(DeviceConfig::new(host, port))
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn connection_state(&self) -> ConnectionState {
        if self.channel.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    /// `true` while measurement output is started and not yet confirmed stopped.
    pub fn is_working(&self) -> bool {
        self.scanner.is_working()
    }

    pub fn scan_state(&self) -> ScanState {
        self.scanner.state()
    }

    /// Opens the TCP session.
    ///
    /// Fails with `Error::AlreadyConnected` (leaving the open session untouched) or with the
    /// transport error of the last address tried.
    pub fn connect(&mut self) -> Result<()> {
        if self.channel.is_some() {
            warn!("connect called while already connected");
            return Err(Error::AlreadyConnected);
        }
        info!("Connecting to {}", self.config.address());
        let stream = match self.open_tcp_stream() {
            Ok(stream) => stream,
            Err(e) => {
                error!("Cannot connect to {}: {}", self.config.address(), e);
                return Err(e.into());
            }
        };
        self.attach(Box::new(stream))
    }

    fn open_tcp_stream(&self) -> io::Result<TcpStream> {
        let mut last_error = io::Error::new(
            io::ErrorKind::NotFound,
            format!("no address found for {}", self.config.address()),
        );
        for addr in (self.config.host.as_str(), self.config.port).to_socket_addrs()? {
            trace!("Trying {}", addr);
            match TcpStream::connect_timeout(&addr, self.config.connect_timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(self.config.poll_interval))?;
                    stream.set_write_timeout(Some(self.config.write_timeout))?;
                    stream.set_nodelay(true)?;
                    return Ok(stream);
                }
                Err(e) => {
                    debug!("Connecting to {} failed: {}", addr, e);
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    /// Starts a session over an already open transport instead of a TCP socket.
    ///
    /// Reinitializes the session state: working flag, captured telegrams, stray log and any
    /// pending reset. The scan history is kept.
    pub fn attach(&mut self, transport: Box<dyn Transport + Send>) -> Result<()> {
        if self.channel.is_some() {
            warn!("attach called while already connected");
            return Err(Error::AlreadyConnected);
        }
        self.channel = Some(Channel::new(ColaProtocol::new(), transport));
        self.commands.clear_stray_telegrams();
        self.scanner.reset_session();
        self.reset.take();
        info!("Session open");
        Ok(())
    }

    /// Closes the session.
    ///
    /// The device is disconnected afterwards even when closing the transport fails; the close
    /// error is still reported. Fails with `Error::NotConnected` when there is no session.
    pub fn disconnect(&mut self) -> Result<()> {
        let mut channel = match self.channel.take() {
            Some(channel) => channel,
            None => {
                warn!("disconnect called while not connected");
                return Err(Error::NotConnected);
            }
        };
        self.scanner.mark_disconnected();

        let closed = channel.close();
        drop(channel);
        match closed {
            Ok(()) => {
                info!("Session closed");
                Ok(())
            }
            Err(e) => {
                error!("Error while closing session: {}", e);
                Err(e.into())
            }
        }
    }

    /// Disconnects when connected, connects otherwise. Returns the new state.
    pub fn toggle_connection(&mut self) -> Result<ConnectionState> {
        if self.is_connected() {
            self.disconnect()?;
        } else {
            self.connect()?;
        }
        Ok(self.connection_state())
    }

    /// Runs one SOPAS handshake on the open session.
    pub fn execute(&mut self, command: &SopasCommand) -> Result<()> {
        let channel = self.channel.as_mut().ok_or(Error::NotConnected)?;
        self.commands.execute(channel, command)
    }

    /// Starts continuous measurement output.
    pub fn start_scanning(&mut self) -> Result<()> {
        let channel = self.channel.as_mut().ok_or(Error::NotConnected)?;
        self.scanner.start_scanning(channel, &mut self.commands)
    }

    /// Captures `count` measurement telegrams; see [`ScanController::capture_measurements`].
    pub fn capture_measurements(&mut self, count: usize) -> Result<()> {
        let channel = self.channel.as_mut().ok_or(Error::NotConnected)?;
        self.scanner.capture_measurements(channel, count, &self.reset)
    }

    /// Stops continuous measurement output.
    pub fn stop_scanning(&mut self) -> Result<()> {
        let channel = self.channel.as_mut().ok_or(Error::NotConnected)?;
        self.scanner.stop_scanning(channel, &mut self.commands)
    }

    /// Start, capture `count` telegrams, stop; see [`ScanController::scan`].
    ///
    /// A pending reset is consumed by every call, including one made while disconnected.
    pub fn scan(&mut self, count: usize) -> Result<()> {
        let channel = match self.channel.as_mut() {
            Some(channel) => channel,
            None => {
                self.reset.take();
                return Err(Error::NotConnected);
            }
        };
        info!("Scanning {} telegrams", count);
        self.scanner
            .scan(channel, &mut self.commands, count, &self.reset)
    }

    /// Parses the captured telegrams and appends the records to the scan history.
    ///
    /// Returns the records added by this call. Captured telegrams stay until
    /// [`Lms400Device::clear_captured`] is called.
    pub fn process_captured(&mut self) -> Result<&[ScanRecord]> {
        let records = self.scanner.process_captured()?;
        let first_new = self.scan_history.len();
        self.scan_history.extend(records);
        debug!(
            "Scan history holds {} records",
            self.scan_history.len()
        );
        Ok(&self.scan_history[first_new..])
    }

    /// Requests a cooperative reset of the capture in progress (or the next one).
    pub fn request_reset(&self) {
        debug!("Reset requested");
        self.reset.request();
    }

    pub fn is_reset_requested(&self) -> bool {
        self.reset.is_requested()
    }

    /// A handle for requesting resets from another thread.
    pub fn reset_signal(&self) -> ResetSignal {
        self.reset.clone()
    }

    pub fn captured_telegrams(&self) -> &[Telegram] {
        self.scanner.captured_telegrams()
    }

    pub fn clear_captured(&mut self) {
        self.scanner.clear_captured();
    }

    /// Telegrams that arrived where a handshake expected something else.
    pub fn stray_telegrams(&self) -> &[Telegram] {
        self.commands.stray_telegrams()
    }

    pub fn clear_stray_telegrams(&mut self) {
        self.commands.clear_stray_telegrams();
    }

    pub fn scan_history(&self) -> &[ScanRecord] {
        &self.scan_history
    }

    pub fn scan_record(&self, index: usize) -> Option<&ScanRecord> {
        self.scan_history.get(index)
    }

    pub fn clear_scan_history(&mut self) {
        trace!("Clearing {} scan records", self.scan_history.len());
        self.scan_history.clear();
    }

    /// Hands the scan history to `sink` under `identifier`.
    pub fn save(&self, sink: &mut dyn ScanSink, identifier: &str) -> Result<()> {
        if self.scan_history.is_empty() {
            warn!("Nothing to save for '{}'", identifier);
            return Err(Error::EmptyResult);
        }
        sink.save(identifier, &self.scan_history)
    }

    /// Appends up to `count` synthetic records to the history without touching the device.
    ///
    /// Returns how many records were added; a pending reset stops early and is consumed.
    pub fn simulate_scan(&mut self, count: usize) -> usize {
        let records = simulate_scan(count, &self.reset);
        let added = records.len();
        self.scan_history.extend(records);
        added
    }

    /// The scan history as text, one line per record.
    pub fn scan_summary(&self) -> String {
        format_scan_history(&self.scan_history)
    }
}

impl Default for Lms400Device {
    /// A device for the factory address `192.168.0.1:2111`.
    fn default() -> Self {
        Lms400Device::new(DeviceConfig::default())
    }
}
