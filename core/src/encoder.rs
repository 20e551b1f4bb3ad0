use crate::config::ModemConfig;
use crate::error::Result;
use crate::queue::{SymbolPeriod, SymbolSender};
use crate::SYMBOLS_PER_BYTE;

/// Byte-to-tone encoder
///
/// Every byte becomes exactly ten symbols:
/// - START0, START1 (preamble marking the byte boundary)
/// - one tone per bit, LSB first: HIGH for a set bit, LOW for a clear bit
///
/// There is no escaping, framing or error correction beyond the preamble; all 256 byte
/// values encode the same way.
#[derive(Debug, Clone, Copy)]
pub struct SymbolEncoder {
    start0: SymbolPeriod,
    start1: SymbolPeriod,
    low: SymbolPeriod,
    high: SymbolPeriod,
}

impl SymbolEncoder {
    pub fn new(config: &ModemConfig) -> Self {
        Self {
            start0: 1.0 / config.freq_start0,
            start1: 1.0 / config.freq_start1,
            low: 1.0 / config.freq_low,
            high: 1.0 / config.freq_high,
        }
    }

    /// The ten symbol periods for one byte, in transmit order
    pub fn symbols(&self, byte: u8) -> [SymbolPeriod; SYMBOLS_PER_BYTE] {
        let mut symbols = [self.low; SYMBOLS_PER_BYTE];
        symbols[0] = self.start0;
        symbols[1] = self.start1;

        for bit in 0..8 {
            if byte & (1 << bit) != 0 {
                symbols[2 + bit] = self.high;
            }
        }

        symbols
    }

    /// Queue the symbols for one byte
    pub fn encode(&self, byte: u8, sender: &mut SymbolSender) -> Result<()> {
        for period in self.symbols(byte) {
            sender.push(period)?;
        }
        Ok(())
    }

    pub fn encode_bytes(&self, bytes: &[u8], sender: &mut SymbolSender) -> Result<()> {
        for &byte in bytes {
            self.encode(byte, sender)?;
        }
        Ok(())
    }
}

impl Default for SymbolEncoder {
    fn default() -> Self {
        Self::new(&ModemConfig::default())
    }
}
