use std::io::BufRead;

use log::{debug, info};

use crate::config::ModemConfig;
use crate::encoder::SymbolEncoder;
use crate::error::Result;
use crate::queue::SymbolSender;

const LINE_TERMINATOR: u8 = b'\n';

/// Summary of a completed transmission
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionReport {
    /// Lines read from input
    pub lines: usize,
    /// Bytes encoded, line terminators included
    pub bytes: usize,
    /// Symbols queued, trailer included
    pub symbols: u64,
}

/// Producer side of a transmission: reads lines, encodes them, flushes the tail.
pub struct Session {
    config: ModemConfig,
    encoder: SymbolEncoder,
    sender: SymbolSender,
}

impl Session {
    /// `config.drain_timeout` also bounds how long any single push may wait on a full queue,
    /// so a stalled output fails the session while input is still being read.
    pub fn new(config: ModemConfig, mut sender: SymbolSender) -> Self {
        sender.set_stall_timeout(config.drain_timeout);
        let encoder = SymbolEncoder::new(&config);
        Self {
            config,
            encoder,
            sender,
        }
    }

    pub fn sender(&self) -> &SymbolSender {
        &self.sender
    }

    /// Transmit every line of `reader`, then the idle trailer, and wait for the synthesizer
    /// to consume all of it.
    ///
    /// Lines are raw bytes; the trailing `\n` is replaced by a single encoded `\n`, so the
    /// last line gets a terminator even if the input didn't end with one.
    pub fn transmit<R: BufRead>(&mut self, mut reader: R) -> Result<SessionReport> {
        let mut report = SessionReport::default();
        let mut line = Vec::new();

        loop {
            line.clear();
            if reader.read_until(LINE_TERMINATOR, &mut line)? == 0 {
                break;
            }
            if line.last() == Some(&LINE_TERMINATOR) {
                line.pop();
            }

            self.encoder.encode_bytes(&line, &mut self.sender)?;
            self.encoder.encode(LINE_TERMINATOR, &mut self.sender)?;

            report.lines += 1;
            report.bytes += line.len() + 1;
            debug!("Queued line {} ({} bytes)", report.lines, line.len() + 1);
        }

        self.finish(report)
    }

    fn finish(&mut self, mut report: SessionReport) -> Result<SessionReport> {
        let trailer = self.config.trailer_symbols();
        self.sender.push_idle(trailer)?;
        report.symbols = self.sender.pushed();

        debug!(
            "Input exhausted, waiting for {} symbols to drain",
            self.sender.pending()
        );
        self.sender
            .wait_drained(self.config.drain_poll_interval, self.config.drain_timeout)?;

        info!(
            "Transmitted {} lines, {} bytes, {} symbols",
            report.lines, report.bytes, report.symbols
        );
        Ok(report)
    }
}
