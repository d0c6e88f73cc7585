use crate::base::{Channel, Error, Result, Telegram, Transport};
use crate::cancel::ResetSignal;
use crate::cmds::{LMS400_CMD_START_MEASUREMENT_OUTPUT, LMS400_CMD_STOP_MEASUREMENT_OUTPUT};
use crate::handshake::CommandProtocol;
use crate::parsers::measurement_parser::parse_measurement;
use crate::protocol::ColaProtocol;
use crate::types::ScanRecord;
use log::{debug, error, trace, warn};
use std::time::Duration;

/// Where the controller is in a scan cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanState {
    /// No measurement output requested. Initial state, and again after captured data is cleared.
    #[default]
    Idle,
    /// The device confirmed continuous measurement output.
    Scanning,
    /// Measurement telegrams are being (or were last) captured.
    CapturingMeasurements,
    /// The device confirmed that measurement output stopped.
    Stopped,
    /// Captured telegrams were turned into scan records.
    Processed,
}

/// Drives a scan session: start output, capture a bounded burst, stop output, process.
#[derive(Debug, Clone)]
pub struct ScanController {
    state: ScanState,
    working: bool,
    frame_timeout: Duration,
    captured: Vec<Telegram>,
}

impl ScanController {
    /// Creates a controller that waits at most `frame_timeout` for each measurement telegram.
    pub fn new(frame_timeout: Duration) -> ScanController {
        ScanController {
            state: ScanState::Idle,
            working: false,
            frame_timeout,
            captured: Vec::new(),
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// `true` while measurement output is started and not yet confirmed stopped.
    pub fn is_working(&self) -> bool {
        self.working
    }

    /// Raw measurement telegrams captured so far, in capture order.
    pub fn captured_telegrams(&self) -> &[Telegram] {
        &self.captured
    }

    /// Drops captured telegrams, typically after their records were persisted.
    pub fn clear_captured(&mut self) {
        trace!("Clearing {} captured telegrams", self.captured.len());
        self.captured.clear();
        if matches!(self.state, ScanState::Stopped | ScanState::Processed) {
            self.state = ScanState::Idle;
        }
    }

    /// Forgets everything about the previous session.
    pub fn reset_session(&mut self) {
        self.state = ScanState::Idle;
        self.working = false;
        self.captured.clear();
    }

    /// The session ended. Captured telegrams stay available for processing.
    pub fn mark_disconnected(&mut self) {
        self.working = false;
        if matches!(
            self.state,
            ScanState::Scanning | ScanState::CapturingMeasurements
        ) {
            self.state = ScanState::Idle;
        }
    }

    /// Asks the device to start continuous measurement output.
    pub fn start_scanning<T>(
        &mut self,
        channel: &mut Channel<ColaProtocol, T>,
        commands: &mut CommandProtocol,
    ) -> Result<()>
    where
        T: Transport + ?Sized,
    {
        let result = commands.execute(channel, &LMS400_CMD_START_MEASUREMENT_OUTPUT);
        self.working = result.is_ok();
        match &result {
            Ok(()) => {
                debug!("Measurement output started");
                self.state = ScanState::Scanning;
            }
            Err(e) => {
                warn!("Failed to start measurement output: {}", e);
                self.state = ScanState::Idle;
            }
        }
        result
    }

    /// Captures `count` raw measurement telegrams straight off the channel.
    ///
    /// The reset signal is checked after every telegram. A pending reset discards all
    /// captured telegrams and fails with `Error::Cancelled`. A transport failure discards the
    /// telegrams of this burst only.
    pub fn capture_measurements<T>(
        &mut self,
        channel: &mut Channel<ColaProtocol, T>,
        count: usize,
        reset: &ResetSignal,
    ) -> Result<()>
    where
        T: Transport + ?Sized,
    {
        if count == 0 {
            return Err(Error::OperationFail {
                description: "measurement count must be positive".to_owned(),
            });
        }
        if !self.working {
            warn!("Capturing measurements without confirmed measurement output");
        }

        debug!("Capturing {} measurement telegrams", count);
        self.state = ScanState::CapturingMeasurements;
        let burst_start = self.captured.len();

        for i in 0..count {
            match channel.read_until(self.frame_timeout) {
                Ok(telegram) => {
                    trace!("Captured telegram {}/{} ({} bytes)", i + 1, count, telegram.len());
                    self.captured.push(telegram);
                }
                Err(e) => {
                    error!(
                        "Capture failed after {} of {} telegrams: {}",
                        i, count, e
                    );
                    self.captured.truncate(burst_start);
                    return Err(e);
                }
            }

            if reset.take() {
                warn!(
                    "Reset requested after {} of {} telegrams, discarding capture",
                    i + 1,
                    count
                );
                self.captured.clear();
                return Err(Error::Cancelled);
            }
        }
        Ok(())
    }

    /// Asks the device to stop continuous measurement output.
    pub fn stop_scanning<T>(
        &mut self,
        channel: &mut Channel<ColaProtocol, T>,
        commands: &mut CommandProtocol,
    ) -> Result<()>
    where
        T: Transport + ?Sized,
    {
        let result = commands.execute(channel, &LMS400_CMD_STOP_MEASUREMENT_OUTPUT);
        self.working = result.is_err();
        match &result {
            Ok(()) => {
                debug!("Measurement output stopped");
                self.state = ScanState::Stopped;
            }
            Err(e) => warn!("Failed to stop measurement output: {}", e),
        }
        result
    }

    /// Start, capture `count` telegrams, stop.
    ///
    /// The stop handshake is always attempted. Capture is skipped when start fails, the state
    /// stays `Idle` and the start error is returned. Otherwise the capture outcome decides the result; a failed stop
    /// after a complete capture is only logged. Any reset still pending when the cycle ends is
    /// consumed.
    pub fn scan<T>(
        &mut self,
        channel: &mut Channel<ColaProtocol, T>,
        commands: &mut CommandProtocol,
        count: usize,
        reset: &ResetSignal,
    ) -> Result<()>
    where
        T: Transport + ?Sized,
    {
        let captured = match self.start_scanning(channel, commands) {
            Ok(()) => self.capture_measurements(channel, count, reset),
            Err(e) => {
                let stopped = self.stop_scanning(channel, commands);
                if let Err(stop_err) = stopped {
                    debug!("Stop after failed start also failed: {}", stop_err);
                }
                // never started, so the cycle stays idle
                self.state = ScanState::Idle;
                reset.take();
                return Err(e);
            }
        };
        let stopped = self.stop_scanning(channel, commands);

        if reset.take() {
            debug!("Reset requested after the capture finished; consumed");
        }

        match captured {
            Ok(()) => {
                if let Err(e) = stopped {
                    warn!("Capture complete but stop failed: {}", e);
                }
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Parses every captured telegram, in capture order.
    ///
    /// Captured telegrams are left in place. Fails with `Error::EmptyResult` when nothing was
    /// captured, or with the parser error of the first malformed telegram.
    pub fn process_captured(&mut self) -> Result<Vec<ScanRecord>> {
        if self.captured.is_empty() {
            return Err(Error::EmptyResult);
        }

        let records = self
            .captured
            .iter()
            .map(parse_measurement)
            .collect::<Result<Vec<ScanRecord>>>()?;

        debug!("Processed {} captured telegrams", records.len());
        self.state = ScanState::Processed;
        Ok(records)
    }
}
