//! One-way acoustic FSK modem transmitter
//!
//! Text bytes become a stream of tone periods (two preamble tones plus eight data tones per
//! byte), which a real-time synthesizer turns into phase-continuous audio samples.

pub mod error;
pub mod config;
pub mod queue;
pub mod encoder;
pub mod synth;
pub mod session;

pub use config::ModemConfig;
pub use encoder::SymbolEncoder;
pub use error::{ModemError, Result};
pub use queue::{symbol_queue, SymbolPeriod, SymbolReceiver, SymbolSender, IDLE_PERIOD};
pub use session::{Session, SessionReport};
pub use synth::{OutputSample, Synthesizer};

// Timing configuration
pub const SAMPLE_RATE: u32 = 44100;
pub const SYMBOL_RATE: u32 = 100; // 10ms per symbol

// Frequency plan (Hz). FREQ_LOW intentionally shares its value with FREQ_START0;
// a receiver tells them apart by position within the byte.
pub const FREQ_START0: f64 = 1000.0;
pub const FREQ_START1: f64 = 2000.0;
pub const FREQ_LOW: f64 = 1000.0;
pub const FREQ_HIGH: f64 = 1500.0;

// Symbols per byte: 2 preamble + 8 data bits
pub const SYMBOLS_PER_BYTE: usize = 10;

/// Default ring capacity in symbols (~40s of audio at 100 symbols/sec)
pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;
