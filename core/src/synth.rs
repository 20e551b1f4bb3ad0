//! Real-time tone synthesizer
//!
//! Runs inside the audio device callback. Tone phase is derived from the time elapsed since
//! the current symbol started (`position / period`), so each symbol begins at phase 0 and
//! the position is reduced by one symbol length at every boundary instead of growing.
//!
//! Nothing here allocates, blocks or returns an error: an empty queue just means silence.

use std::f64::consts::PI;

use crate::config::ModemConfig;
use crate::queue::{SymbolPeriod, SymbolReceiver, IDLE_PERIOD};

/// Peak deviation from the center value, in 16-bit sample units
pub const AMPLITUDE_SCALE: f64 = 20000.0;

/// A device sample format the synthesizer can write.
///
/// `SILENCE` is the center (zero-deviation) value. `from_tone` maps a unit sine value in
/// [-1, 1] to `SILENCE + scale * value`, with the scale small enough that the result always
/// fits the format.
pub trait OutputSample: Copy + Send + 'static {
    const SILENCE: Self;

    fn from_tone(value: f64) -> Self;
}

impl OutputSample for u16 {
    const SILENCE: Self = 32768;

    fn from_tone(value: f64) -> Self {
        (32768.0 + AMPLITUDE_SCALE * value) as u16
    }
}

impl OutputSample for i16 {
    const SILENCE: Self = 0;

    fn from_tone(value: f64) -> Self {
        (AMPLITUDE_SCALE * value) as i16
    }
}

impl OutputSample for f32 {
    const SILENCE: Self = 0.0;

    fn from_tone(value: f64) -> Self {
        (AMPLITUDE_SCALE / 32768.0 * value) as f32
    }
}

pub struct Synthesizer {
    receiver: SymbolReceiver,
    /// Period of the tone being played, IDLE_PERIOD for silence
    current_period: SymbolPeriod,
    /// Seconds since the current symbol started, in [0, symbol_length)
    position: f64,
    symbol_length: f64,
    sample_period: f64,
    symbols_started: u64,
}

impl Synthesizer {
    pub fn new(config: &ModemConfig, receiver: SymbolReceiver) -> Self {
        Self {
            receiver,
            current_period: IDLE_PERIOD,
            position: 0.0,
            symbol_length: config.symbol_length(),
            sample_period: config.sample_period(),
            symbols_started: 0,
        }
    }

    pub fn current_period(&self) -> SymbolPeriod {
        self.current_period
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    /// Number of symbol boundaries crossed so far
    pub fn symbols_started(&self) -> u64 {
        self.symbols_started
    }

    /// Symbols still waiting in the queue
    pub fn pending(&self) -> u64 {
        self.receiver.pending()
    }

    #[inline]
    fn next_sample<T: OutputSample>(&mut self) -> T {
        if self.position >= self.symbol_length {
            // Carry the remainder so boundaries don't drift
            self.position -= self.symbol_length;
            self.current_period = self.receiver.pop_or_idle();
            self.symbols_started += 1;
        }

        let sample = if self.current_period != IDLE_PERIOD {
            T::from_tone((2.0 * PI * self.position / self.current_period).sin())
        } else {
            T::SILENCE
        };

        self.position += self.sample_period;
        sample
    }

    /// Fill a mono buffer.
    pub fn fill<T: OutputSample>(&mut self, out: &mut [T]) {
        for slot in out.iter_mut() {
            *slot = self.next_sample();
        }
    }

    /// Fill an interleaved buffer, writing the same sample to every channel of a frame.
    pub fn fill_frames<T: OutputSample>(&mut self, out: &mut [T], channels: usize) {
        if channels <= 1 {
            self.fill(out);
            return;
        }
        for frame in out.chunks_mut(channels) {
            let sample = self.next_sample();
            frame.fill(sample);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::symbol_queue;

    /// 64 samples per symbol, with every timing quantity exact in binary
    fn exact_config() -> ModemConfig {
        ModemConfig {
            sample_rate: 8192,
            symbol_rate: 128,
            ..Default::default()
        }
    }

    #[test]
    fn test_idle_produces_exact_silence() {
        let config = ModemConfig::default();
        let (_tx, rx) = symbol_queue(16);
        let mut synth = Synthesizer::new(&config, rx);

        let mut out = vec![0u16; 4096];
        synth.fill(&mut out);
        assert!(out.iter().all(|&s| s == 32768));

        let mut out = vec![1i16; 1024];
        synth.fill(&mut out);
        assert!(out.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_first_symbol_slot_is_idle() {
        let config = exact_config();
        let (mut tx, rx) = symbol_queue(16);
        tx.push(1.0 / 1000.0).unwrap();
        let mut synth = Synthesizer::new(&config, rx);

        let mut out = vec![0.0f32; 64];
        synth.fill(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(synth.symbols_started(), 0);
        assert_eq!(tx.pending(), 1);
    }

    #[test]
    fn test_symbols_play_in_order_for_one_symbol_length() {
        let config = exact_config();
        let (mut tx, rx) = symbol_queue(16);
        let periods = [1.0 / 1000.0, 1.0 / 2000.0, 1.0 / 1500.0];
        for p in periods {
            tx.push(p).unwrap();
        }
        let mut synth = Synthesizer::new(&config, rx);

        let mut out = vec![0.0f32; 64 * 5];
        synth.fill(&mut out);

        let dt = config.sample_period();
        let scale = (AMPLITUDE_SCALE / 32768.0) as f32;
        for (k, &period) in periods.iter().enumerate() {
            let start = 64 * (k + 1);
            for i in 0..64 {
                let expected = scale * (2.0 * PI * i as f64 * dt / period).sin() as f32;
                let actual = out[start + i];
                assert!(
                    (actual - expected).abs() < 1e-5,
                    "symbol {} sample {}: {} vs {}",
                    k,
                    i,
                    actual,
                    expected
                );
            }
        }

        // Queue exhausted: back to silence
        assert!(out[64 * 4..].iter().all(|&s| s == 0.0));
        assert!(tx.is_drained());
    }

    #[test]
    fn test_phase_resets_at_symbol_boundary() {
        let config = exact_config();
        let (mut tx, rx) = symbol_queue(16);
        tx.push(1.0 / 1500.0).unwrap();
        tx.push(1.0 / 1500.0).unwrap();
        let mut synth = Synthesizer::new(&config, rx);

        let mut out = vec![0.0f32; 64 * 3];
        synth.fill(&mut out);

        // Each symbol starts at sin(0) even though the tone didn't change
        assert_eq!(out[64], 0.0);
        assert_eq!(out[128], 0.0);
        assert_eq!(&out[64..128], &out[128..192]);
    }

    #[test]
    fn test_callback_chunking_does_not_matter() {
        let config = ModemConfig::default();
        let encoder = crate::SymbolEncoder::new(&config);

        let (mut tx_a, rx_a) = symbol_queue(64);
        let (mut tx_b, rx_b) = symbol_queue(64);
        encoder.encode_bytes(b"ok", &mut tx_a).unwrap();
        encoder.encode_bytes(b"ok", &mut tx_b).unwrap();

        let mut whole = Synthesizer::new(&config, rx_a);
        let mut chunked = Synthesizer::new(&config, rx_b);

        let total = 441 * 25;
        let mut a = vec![0u16; total];
        whole.fill(&mut a);

        let mut b = vec![0u16; total];
        for chunk in b.chunks_mut(config.callback_frames()) {
            chunked.fill(chunk);
        }

        assert_eq!(a, b);
    }

    #[test]
    fn test_boundaries_do_not_drift() {
        let config = ModemConfig::default();
        let (_tx, rx) = symbol_queue(4);
        let mut synth = Synthesizer::new(&config, rx);

        let samples_per_symbol = config.samples_per_symbol();
        let mut buf = [0u16; 1];
        let mut boundaries = 0u64;

        for index in 0..(441 * 5000) {
            synth.fill(&mut buf);
            if synth.symbols_started() != boundaries {
                boundaries = synth.symbols_started();
                let ideal = boundaries as f64 * samples_per_symbol;
                assert!(
                    (index as f64 - ideal).abs() <= 1.0,
                    "boundary {} at sample {}, ideal {}",
                    boundaries,
                    index,
                    ideal
                );
            }
            assert!(synth.position() < config.symbol_length() + config.sample_period());
        }

        assert!(boundaries >= 4999);
    }

    #[test]
    fn test_u16_stays_in_range() {
        let config = ModemConfig::default();
        let (mut tx, rx) = symbol_queue(64);
        crate::SymbolEncoder::new(&config)
            .encode(0xA5, &mut tx)
            .unwrap();
        let mut synth = Synthesizer::new(&config, rx);

        let mut out = vec![0u16; 441 * 12];
        synth.fill(&mut out);

        let min = *out.iter().min().unwrap();
        let max = *out.iter().max().unwrap();
        assert!(min >= 32768 - 20000);
        assert!(max <= 32768 + 20000);
        assert!(max > 32768 + 15000, "tone never reached near full amplitude");
    }

    #[test]
    fn test_fill_frames_duplicates_channels() {
        let config = exact_config();
        let (mut tx, rx) = symbol_queue(16);
        tx.push(1.0 / 1000.0).unwrap();
        let mut synth = Synthesizer::new(&config, rx);

        let mut out = vec![0i16; 2 * 64 * 2];
        synth.fill_frames(&mut out, 2);

        for frame in out.chunks(2) {
            assert_eq!(frame[0], frame[1]);
        }
        assert!(out[128..].iter().any(|&s| s != 0));
    }

    #[test]
    fn test_pop_happens_only_at_boundaries() {
        let config = exact_config();
        let (mut tx, rx) = symbol_queue(64);
        for _ in 0..10 {
            tx.push(1.0 / 1000.0).unwrap();
        }
        let mut synth = Synthesizer::new(&config, rx);

        let mut out = vec![0u16; 65];
        synth.fill(&mut out);
        assert_eq!(tx.pending(), 9);

        let mut out = vec![0u16; 63];
        synth.fill(&mut out);
        assert_eq!(tx.pending(), 9);

        let mut out = vec![0u16; 1];
        synth.fill(&mut out);
        assert_eq!(tx.pending(), 8);
        assert_eq!(synth.current_period(), 1.0 / 1000.0);
    }
}
