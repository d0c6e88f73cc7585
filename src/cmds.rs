// SOPAS telegrams exchanged over CoLa-A.
//
// A method call is sent as `sMN <name> <args>`, the device acknowledges with `sMA <name>` and
// then answers with `sAN <name> <status>`. Faults come back as `sFA <code>`.

/// Marker contained in every fault answer of the device.
pub const SOPAS_FAULT_MARKER: &str = "sFA FF";

/// Prefix of a method-by-name request.
pub const SOPAS_METHOD_PREFIX: &str = "sMN";

/// Prefix of a method acknowledge.
pub const SOPAS_ACK_PREFIX: &str = "sMA";

/// Prefix of a method answer.
pub const SOPAS_ANSWER_PREFIX: &str = "sAN";

/// A request together with the acknowledge and answer that confirm it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SopasCommand {
    /// The method telegram sent to the device.
    pub request: &'static str,
    /// The acknowledge expected first.
    pub ack: &'static str,
    /// The answer expected after the acknowledge.
    pub answer: &'static str,
}

/// Starts continuous measurement output. `0021` selects the measurement-data telegram format.
pub const LMS400_CMD_START_MEASUREMENT_OUTPUT: SopasCommand = SopasCommand {
    request: "sMN mLRreqdata 0021",
    ack: "sMA mLRreqdata",
    answer: "sAN mLRreqdata 00000000",
};

/// Stops continuous measurement output.
pub const LMS400_CMD_STOP_MEASUREMENT_OUTPUT: SopasCommand = SopasCommand {
    request: "sMN mLRstopdata",
    ack: "sMA mLRstopdata",
    answer: "sAN mLRstopdata 00000000",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_table_follows_sopas_shape() {
        for cmd in [
            LMS400_CMD_START_MEASUREMENT_OUTPUT,
            LMS400_CMD_STOP_MEASUREMENT_OUTPUT,
        ] {
            assert!(cmd.request.starts_with(SOPAS_METHOD_PREFIX));
            assert!(cmd.ack.starts_with(SOPAS_ACK_PREFIX));
            assert!(cmd.answer.starts_with(SOPAS_ANSWER_PREFIX));
            let name = cmd.ack.split(' ').nth(1).unwrap();
            assert!(cmd.request.contains(name));
            assert!(cmd.answer.contains(name));
        }
    }
}
