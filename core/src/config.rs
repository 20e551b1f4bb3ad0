use std::time::Duration;

use crate::error::{ModemError, Result};
use crate::{
    DEFAULT_QUEUE_CAPACITY, FREQ_HIGH, FREQ_LOW, FREQ_START0, FREQ_START1, SAMPLE_RATE,
    SYMBOL_RATE,
};

/// Transmitter configuration
///
/// Fixed for the lifetime of a session. Every derived timing quantity (symbol length,
/// callback buffer size, trailer length) is computed from the two rates.
#[derive(Debug, Clone)]
pub struct ModemConfig {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Symbols per second
    pub symbol_rate: u32,
    /// First preamble tone (Hz)
    pub freq_start0: f64,
    /// Second preamble tone (Hz)
    pub freq_start1: f64,
    /// Tone for a 0 bit (Hz)
    pub freq_low: f64,
    /// Tone for a 1 bit (Hz)
    pub freq_high: f64,
    /// Capacity of the symbol ring between producer and synthesizer
    pub queue_capacity: usize,
    /// How often the producer checks whether the queue has drained
    pub drain_poll_interval: Duration,
    /// Give up after waiting this long for the drain, or for room in a full queue
    /// (None = wait forever)
    pub drain_timeout: Option<Duration>,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            symbol_rate: SYMBOL_RATE,
            freq_start0: FREQ_START0,
            freq_start1: FREQ_START1,
            freq_low: FREQ_LOW,
            freq_high: FREQ_HIGH,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            drain_poll_interval: Duration::from_secs(1),
            drain_timeout: None,
        }
    }
}

impl ModemConfig {
    /// Duration of one symbol in seconds
    pub fn symbol_length(&self) -> f64 {
        1.0 / self.symbol_rate as f64
    }

    /// Duration of one output sample in seconds
    pub fn sample_period(&self) -> f64 {
        1.0 / self.sample_rate as f64
    }

    pub fn samples_per_symbol(&self) -> f64 {
        self.sample_rate as f64 / self.symbol_rate as f64
    }

    /// Device callback buffer size in frames: two callbacks per symbol
    pub fn callback_frames(&self) -> usize {
        (self.sample_rate / (2 * self.symbol_rate).max(1)).max(1) as usize
    }

    /// Number of idle symbols appended after the last line (half a second)
    pub fn trailer_symbols(&self) -> usize {
        (self.symbol_rate / 2) as usize
    }

    /// The same configuration at another sample rate (e.g. the rate a device actually runs at).
    ///
    /// Symbol timing follows the sample clock, so only the tones need re-checking.
    pub fn with_sample_rate(&self, sample_rate: u32) -> Result<Self> {
        let config = Self {
            sample_rate,
            ..self.clone()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(ModemError::InvalidConfig("sample rate must be non-zero".into()));
        }
        if self.symbol_rate == 0 {
            return Err(ModemError::InvalidConfig("symbol rate must be non-zero".into()));
        }
        if self.symbol_rate > self.sample_rate {
            return Err(ModemError::InvalidConfig(format!(
                "symbol rate {} exceeds sample rate {}",
                self.symbol_rate, self.sample_rate
            )));
        }
        if self.queue_capacity == 0 {
            return Err(ModemError::InvalidConfig("queue capacity must be non-zero".into()));
        }

        let nyquist = self.sample_rate as f64 / 2.0;
        let tones = [
            ("start0", self.freq_start0),
            ("start1", self.freq_start1),
            ("low", self.freq_low),
            ("high", self.freq_high),
        ];
        for (name, freq) in tones {
            if !freq.is_finite() || freq <= 0.0 {
                return Err(ModemError::InvalidConfig(format!(
                    "{} frequency must be positive, got {}",
                    name, freq
                )));
            }
            if freq >= nyquist {
                return Err(ModemError::InvalidConfig(format!(
                    "{} frequency {} Hz is at or above Nyquist ({} Hz)",
                    name, freq, nyquist
                )));
            }
        }

        Ok(())
    }
}
