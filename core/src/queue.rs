//! Symbol queue between the encoder (producer) and the synthesizer (real-time consumer)
//!
//! A single-producer/single-consumer lock-free ring. The consumer side never blocks and never
//! allocates; only the producer waits, and only when the ring is full.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::error::{ModemError, Result};

/// Duration of one cycle of the tone to emit, in seconds (1 / frequency)
pub type SymbolPeriod = f64;

/// Period value meaning "no tone" for a symbol slot
pub const IDLE_PERIOD: SymbolPeriod = 0.0;

/// Producer back-off while the ring is full
const FULL_BACKOFF: Duration = Duration::from_millis(1);

struct Counters {
    // Incremented before the symbol enters the ring, so pushed - popped never reads 0
    // while a symbol is still queued.
    pushed: AtomicU64,
    // Incremented after the symbol is in the ring, so enqueued - popped never counts a
    // symbol the consumer can't pop yet.
    enqueued: AtomicU64,
    popped: AtomicU64,
    receiver_alive: AtomicBool,
}

impl Counters {
    fn pending(&self) -> u64 {
        let popped = self.popped.load(Ordering::Acquire);
        let pushed = self.pushed.load(Ordering::Acquire);
        pushed.saturating_sub(popped)
    }

    fn poppable(&self) -> u64 {
        let popped = self.popped.load(Ordering::Acquire);
        let enqueued = self.enqueued.load(Ordering::Acquire);
        enqueued.saturating_sub(popped)
    }
}

/// Create a connected sender/receiver pair holding up to `capacity` symbols.
pub fn symbol_queue(capacity: usize) -> (SymbolSender, SymbolReceiver) {
    let ring = HeapRb::<SymbolPeriod>::new(capacity.max(1));
    let (producer, consumer) = ring.split();
    let counters = Arc::new(Counters {
        pushed: AtomicU64::new(0),
        enqueued: AtomicU64::new(0),
        popped: AtomicU64::new(0),
        receiver_alive: AtomicBool::new(true),
    });

    (
        SymbolSender {
            producer,
            counters: counters.clone(),
            stall_timeout: None,
        },
        SymbolReceiver { consumer, counters },
    )
}

/// Producer half, owned by the thread that encodes input.
pub struct SymbolSender {
    producer: HeapProd<SymbolPeriod>,
    counters: Arc<Counters>,
    stall_timeout: Option<Duration>,
}

impl SymbolSender {
    /// Limit how long a single `push` may wait on a full ring (None = wait forever).
    pub fn set_stall_timeout(&mut self, timeout: Option<Duration>) {
        self.stall_timeout = timeout;
    }

    /// Append one symbol period, waiting for room if the ring is full.
    ///
    /// Fails if the receiver has been dropped, or with `DrainTimeout` if the ring stays full
    /// longer than the stall timeout. A failed push leaves nothing queued.
    pub fn push(&mut self, period: SymbolPeriod) -> Result<()> {
        self.counters.pushed.fetch_add(1, Ordering::AcqRel);

        let mut item = period;
        let mut blocked_since: Option<Instant> = None;
        loop {
            match self.producer.try_push(item) {
                Ok(()) => {
                    self.counters.enqueued.fetch_add(1, Ordering::AcqRel);
                    return Ok(());
                }
                Err(rejected) => {
                    if !self.counters.receiver_alive.load(Ordering::Acquire) {
                        self.counters.pushed.fetch_sub(1, Ordering::AcqRel);
                        return Err(ModemError::Disconnected);
                    }

                    let since = *blocked_since.get_or_insert_with(Instant::now);
                    if let Some(limit) = self.stall_timeout {
                        if since.elapsed() >= limit {
                            self.counters.pushed.fetch_sub(1, Ordering::AcqRel);
                            return Err(ModemError::DrainTimeout {
                                pending: self.pending(),
                            });
                        }
                    }

                    item = rejected;
                    thread::sleep(FULL_BACKOFF);
                }
            }
        }
    }

    /// Append `count` silent symbols.
    pub fn push_idle(&mut self, count: usize) -> Result<()> {
        for _ in 0..count {
            self.push(IDLE_PERIOD)?;
        }
        Ok(())
    }

    /// Symbols pushed but not yet taken by the synthesizer
    pub fn pending(&self) -> u64 {
        self.counters.pending()
    }

    pub fn is_drained(&self) -> bool {
        self.pending() == 0
    }

    /// Total symbols pushed so far
    pub fn pushed(&self) -> u64 {
        self.counters.pushed.load(Ordering::Acquire)
    }

    /// Poll until every pushed symbol has been consumed.
    ///
    /// With `timeout = None` this waits indefinitely, as long as the receiver is alive.
    pub fn wait_drained(&self, poll_interval: Duration, timeout: Option<Duration>) -> Result<()> {
        let start = Instant::now();
        let poll_interval = poll_interval.max(Duration::from_millis(1));

        loop {
            let pending = self.pending();
            if pending == 0 {
                return Ok(());
            }
            if !self.counters.receiver_alive.load(Ordering::Acquire) {
                return Err(ModemError::Disconnected);
            }

            let mut nap = poll_interval;
            if let Some(limit) = timeout {
                let elapsed = start.elapsed();
                if elapsed >= limit {
                    return Err(ModemError::DrainTimeout { pending });
                }
                nap = nap.min(limit - elapsed);
            }
            thread::sleep(nap);
        }
    }
}

/// Consumer half, owned by the real-time synthesizer.
pub struct SymbolReceiver {
    consumer: HeapCons<SymbolPeriod>,
    counters: Arc<Counters>,
}

impl SymbolReceiver {
    /// Take the next symbol period, or [`IDLE_PERIOD`] if nothing is queued. Never blocks.
    pub fn pop_or_idle(&mut self) -> SymbolPeriod {
        self.try_pop().unwrap_or(IDLE_PERIOD)
    }

    /// Take the next symbol period if one is queued.
    ///
    /// Unlike [`pop_or_idle`](Self::pop_or_idle) this distinguishes a queued idle symbol from
    /// an empty queue.
    pub fn try_pop(&mut self) -> Option<SymbolPeriod> {
        let period = self.consumer.try_pop()?;
        self.counters.popped.fetch_add(1, Ordering::AcqRel);
        Some(period)
    }

    /// Symbols in the ring right now; each of them is returned by the next `try_pop` calls.
    pub fn pending(&self) -> u64 {
        self.counters.poppable()
    }
}

impl Drop for SymbolReceiver {
    fn drop(&mut self) {
        self.counters.receiver_alive.store(false, Ordering::Release);
    }
}
