//! In-memory transport replaying scripted device output.

use crate::base::{Telegram, Transport};
use crate::cancel::ResetSignal;
use crate::protocol::encode_frame;
use std::io::{self, Cursor, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// How long a stalled read blocks, like a socket read timeout.
pub(crate) const STALL_POLL: Duration = Duration::from_millis(5);

pub(crate) struct ScriptedStream {
    input: Cursor<Vec<u8>>,
    written: Arc<Mutex<Vec<u8>>>,
    closed: Arc<AtomicBool>,
    max_read: usize,
    reset_trigger: Option<(u64, ResetSignal)>,
    fail_close: bool,
    stalls_before_data: usize,
    stall_when_drained: bool,
}

/// Concatenated frames for the given telegrams.
pub(crate) fn frames(telegrams: &[Telegram]) -> Vec<u8> {
    telegrams
        .iter()
        .flat_map(|t| encode_frame(t).unwrap())
        .collect()
}

impl ScriptedStream {
    pub(crate) fn new(input: Vec<u8>) -> ScriptedStream {
        ScriptedStream {
            input: Cursor::new(input),
            written: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
            max_read: usize::MAX,
            reset_trigger: None,
            fail_close: false,
            stalls_before_data: 0,
            stall_when_drained: false,
        }
    }

    /// A stream that answers with the given ASCII telegrams, in order.
    pub(crate) fn replying(answers: &[&str]) -> ScriptedStream {
        let telegrams: Vec<Telegram> = answers.iter().map(|a| Telegram::from_command(a)).collect();
        ScriptedStream::new(frames(&telegrams))
    }

    /// Hands out at most `max_read` bytes per `read` call.
    pub(crate) fn with_max_read(mut self, max_read: usize) -> ScriptedStream {
        self.max_read = max_read;
        self
    }

    /// Requests a reset on `signal` once `offset` bytes have been read.
    pub(crate) fn reset_after(mut self, offset: usize, signal: ResetSignal) -> ScriptedStream {
        self.reset_trigger = Some((offset as u64, signal));
        self
    }

    /// Times out `polls` reads before handing out any data.
    pub(crate) fn stalling_first(mut self, polls: usize) -> ScriptedStream {
        self.stalls_before_data = polls;
        self
    }

    /// Once the script is consumed, reads time out instead of reporting end of stream.
    pub(crate) fn silent_when_drained(mut self) -> ScriptedStream {
        self.stall_when_drained = true;
        self
    }

    pub(crate) fn failing_close(mut self) -> ScriptedStream {
        self.fail_close = true;
        self
    }

    pub(crate) fn written(&self) -> Arc<Mutex<Vec<u8>>> {
        Arc::clone(&self.written)
    }

    pub(crate) fn closed(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.stalls_before_data > 0 {
            self.stalls_before_data -= 1;
            return stall();
        }
        let len = buf.len().min(self.max_read);
        let read = self.input.read(&mut buf[..len])?;
        if read == 0 && len > 0 && self.stall_when_drained {
            return stall();
        }
        let position = self.input.position();
        let due = matches!(&self.reset_trigger, Some((offset, _)) if position >= *offset);
        if due {
            if let Some((_, signal)) = self.reset_trigger.take() {
                signal.request();
            }
        }
        Ok(read)
    }
}

fn stall() -> io::Result<usize> {
    thread::sleep(STALL_POLL);
    Err(io::Error::new(io::ErrorKind::WouldBlock, "read timed out"))
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for ScriptedStream {
    fn close(&mut self) -> io::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        if self.fail_close {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "close failed"))
        } else {
            Ok(())
        }
    }
}
