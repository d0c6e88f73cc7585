use crate::base::{Channel, Error, Result, Telegram, Transport};
use crate::cmds::{SopasCommand, SOPAS_FAULT_MARKER};
use crate::protocol::ColaProtocol;
use log::{debug, trace, warn};
use std::time::Duration;

/// How a received telegram relates to the one a handshake step expected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
    /// Exactly the expected telegram.
    Matched,
    /// A SOPAS fault answer.
    Fault,
    /// Anything else; the telegram is kept for inspection.
    Unexpected(Telegram),
}

impl HandshakeOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, HandshakeOutcome::Matched)
    }
}

/// Classifies `received` against the `expected` telegram text.
///
/// An exact match wins over the fault marker, so an expected fault telegram still matches.
pub fn classify(received: &Telegram, expected: &str) -> HandshakeOutcome {
    if received.as_bytes() == expected.as_bytes() {
        HandshakeOutcome::Matched
    } else if received.contains(SOPAS_FAULT_MARKER.as_bytes()) {
        HandshakeOutcome::Fault
    } else {
        HandshakeOutcome::Unexpected(received.clone())
    }
}

/// Runs the request / acknowledge / answer exchange of SOPAS method calls.
///
/// Telegrams that arrive where a specific acknowledge or answer was required are kept in a
/// stray log, so out-of-band data received during a handshake can be inspected afterwards.
/// Fault answers are not logged.
#[derive(Debug, Clone)]
pub struct CommandProtocol {
    timeout: Duration,
    stray_telegrams: Vec<Telegram>,
}

impl CommandProtocol {
    /// Creates a handshake driver that waits at most `timeout` for each of the two replies.
    pub fn new(timeout: Duration) -> CommandProtocol {
        CommandProtocol {
            timeout,
            stray_telegrams: Vec::new(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Telegrams classified as unexpected, oldest first.
    pub fn stray_telegrams(&self) -> &[Telegram] {
        &self.stray_telegrams
    }

    pub fn clear_stray_telegrams(&mut self) {
        self.stray_telegrams.clear();
    }

    /// Classifies a reply and records it in the stray log when it is unexpected.
    pub fn check(&mut self, received: &Telegram, expected: &str) -> HandshakeOutcome {
        let outcome = classify(received, expected);
        match &outcome {
            HandshakeOutcome::Matched => trace!("Received expected '{}'", expected),
            HandshakeOutcome::Fault => warn!("Device fault while expecting '{}': {:?}", expected, received),
            HandshakeOutcome::Unexpected(telegram) => {
                warn!(
                    "Unexpected telegram while expecting '{}': {:?}",
                    expected, telegram
                );
                self.stray_telegrams.push(telegram.clone());
            }
        }
        outcome
    }

    /// Sends `command.request`, then requires `command.ack` followed by `command.answer`.
    ///
    /// A fault or unexpected acknowledge aborts before the answer is read. Both are reported
    /// as errors; `Error::ProtocolFault` and `Error::UnexpectedAnswer` tell them apart.
    pub fn execute<T>(
        &mut self,
        channel: &mut Channel<ColaProtocol, T>,
        command: &SopasCommand,
    ) -> Result<()>
    where
        T: Transport + ?Sized,
    {
        debug!("Executing '{}'", command.request);
        let ack = channel.invoke(&Telegram::from_command(command.request), self.timeout)?;
        self.expect(&ack, command.ack)?;

        let answer = channel.read_until(self.timeout)?;
        self.expect(&answer, command.answer)?;

        debug!("'{}' confirmed", command.request);
        Ok(())
    }

    fn expect(&mut self, received: &Telegram, expected: &str) -> Result<()> {
        match self.check(received, expected) {
            HandshakeOutcome::Matched => Ok(()),
            HandshakeOutcome::Fault => Err(Error::ProtocolFault {
                telegram: received.text().into_owned(),
            }),
            HandshakeOutcome::Unexpected(telegram) => Err(Error::UnexpectedAnswer {
                expected: expected.to_owned(),
                received: telegram.text().into_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmds::LMS400_CMD_START_MEASUREMENT_OUTPUT;
    use crate::protocol::encode_frame;
    use crate::testing::ScriptedStream;

    const TIMEOUT: Duration = Duration::from_millis(200);

    #[test]
    fn matching_ack_is_matched() {
        let mut commands = CommandProtocol::new(TIMEOUT);
        let outcome = commands.check(&Telegram::from_command("sMA mLRreqdata"), "sMA mLRreqdata");
        assert_eq!(outcome, HandshakeOutcome::Matched);
        assert!(commands.stray_telegrams().is_empty());
    }

    #[test]
    fn fault_is_recognized_and_not_logged() {
        let mut commands = CommandProtocol::new(TIMEOUT);
        let outcome = commands.check(&Telegram::from_command("sFA FF something"), "sMA mLRreqdata");
        assert_eq!(outcome, HandshakeOutcome::Fault);
        assert!(commands.stray_telegrams().is_empty());
    }

    #[test]
    fn unexpected_is_logged() {
        let mut commands = CommandProtocol::new(TIMEOUT);
        let received = Telegram::from_command("sAN other 00");
        let outcome = commands.check(&received, "sAN mLRreqdata 00000000");
        assert_eq!(outcome, HandshakeOutcome::Unexpected(received.clone()));
        assert_eq!(commands.stray_telegrams(), &[received]);
        commands.clear_stray_telegrams();
        assert!(commands.stray_telegrams().is_empty());
    }

    #[test]
    fn execute_sends_request_and_accepts_both_replies() {
        let stream = ScriptedStream::replying(&[
            "sMA mLRreqdata",
            "sAN mLRreqdata 00000000",
        ]);
        let written = stream.written();
        let mut channel = Channel::new(ColaProtocol::new(), Box::new(stream));
        let mut commands = CommandProtocol::new(TIMEOUT);

        commands
            .execute(&mut channel, &LMS400_CMD_START_MEASUREMENT_OUTPUT)
            .unwrap();
        assert_eq!(
            *written.lock().unwrap(),
            encode_frame(&Telegram::from_command("sMN mLRreqdata 0021")).unwrap()
        );
    }

    #[test]
    fn execute_stops_after_fault_ack() {
        let stream = ScriptedStream::replying(&["sFA FF01", "sAN mLRreqdata 00000000"]);
        let mut channel = Channel::new(ColaProtocol::new(), Box::new(stream));
        let mut commands = CommandProtocol::new(TIMEOUT);

        let err = commands
            .execute(&mut channel, &LMS400_CMD_START_MEASUREMENT_OUTPUT)
            .unwrap_err();
        assert!(matches!(err, Error::ProtocolFault { .. }));
        assert!(commands.stray_telegrams().is_empty());

        // the answer was never consumed
        assert_eq!(
            channel.read_until(TIMEOUT).unwrap().text(),
            "sAN mLRreqdata 00000000"
        );
    }

    #[test]
    fn execute_rejects_unexpected_answer() {
        let stream = ScriptedStream::replying(&["sMA mLRreqdata", "sAN mLRreqdata 00000001"]);
        let mut channel = Channel::new(ColaProtocol::new(), Box::new(stream));
        let mut commands = CommandProtocol::new(TIMEOUT);

        match commands.execute(&mut channel, &LMS400_CMD_START_MEASUREMENT_OUTPUT) {
            Err(Error::UnexpectedAnswer { expected, received }) => {
                assert_eq!(expected, "sAN mLRreqdata 00000000");
                assert_eq!(received, "sAN mLRreqdata 00000001");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(commands.stray_telegrams().len(), 1);
    }

    #[test]
    fn execute_reports_closed_stream() {
        let stream = ScriptedStream::replying(&["sMA mLRreqdata"]);
        let mut channel = Channel::new(ColaProtocol::new(), Box::new(stream));
        let mut commands = CommandProtocol::new(TIMEOUT);

        let err = commands
            .execute(&mut channel, &LMS400_CMD_START_MEASUREMENT_OUTPUT)
            .unwrap_err();
        assert!(err.is_transport());
    }
}
