//! Simulated incremental delivery of a complete reply
//!
//! The backend answers in one piece; this module reveals that answer a unit at
//! a time on a fixed tick so the transcript grows the way a streamed reply
//! would. Each run is a spawned tokio task controlled through a
//! [`DeliveryHandle`].

use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_TICK: Duration = Duration::from_millis(20);

/// Size of one revealed unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Granularity {
    /// One Unicode scalar value per tick
    #[default]
    Char,
    /// One word plus the whitespace after it per tick
    Word,
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "char" | "chars" | "character" => Ok(Granularity::Char),
            "word" | "words" => Ok(Granularity::Word),
            other => Err(format!("unknown stream unit '{other}' (expected char or word)")),
        }
    }
}

/// Split `text` into display units. Concatenating the result gives back `text`.
#[allow(clippy::string_slice)] // boundaries come from char_indices
pub fn split_units(text: &str, granularity: Granularity) -> Vec<&str> {
    match granularity {
        Granularity::Char => text
            .char_indices()
            .map(|(start, c)| &text[start..start + c.len_utf8()])
            .collect(),
        Granularity::Word => {
            // A unit ends after the whitespace run that follows a word
            let mut units = Vec::new();
            let mut start = 0;
            let mut in_space = false;
            for (i, c) in text.char_indices() {
                if c.is_whitespace() {
                    in_space = true;
                } else if in_space {
                    units.push(&text[start..i]);
                    start = i;
                    in_space = false;
                }
            }
            if start < text.len() {
                units.push(&text[start..]);
            }
            units
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    Completed,
    Cancelled,
}

struct Shared {
    /// Held while a chunk is being delivered, so `cancel` cannot interleave
    phase: Mutex<Phase>,
    /// Wakes the ticking task early on cancel
    stop: CancellationToken,
    /// Fires once the task has exited, however it ended
    settled: CancellationToken,
}

impl Shared {
    /// A panicking callback poisons the lock; the phase it guards stays valid
    fn phase(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Settles the run when the ticking task exits, including by panic
struct SettleOnDrop(Arc<Shared>);

impl Drop for SettleOnDrop {
    fn drop(&mut self) {
        let mut phase = self.0.phase();
        if *phase == Phase::Running {
            *phase = Phase::Cancelled;
        }
        drop(phase);
        self.0.settled.cancel();
    }
}

/// Control handle for one delivery run.
///
/// Dropping the handle does not stop the run.
#[derive(Clone)]
pub struct DeliveryHandle {
    shared: Arc<Shared>,
}

impl DeliveryHandle {
    /// Halt the run. After this returns, no chunk or completion callback will
    /// start. Returns `true` only for the call that actually cancelled.
    ///
    /// Must not be called from inside the run's own chunk callback.
    pub fn cancel(&self) -> bool {
        let mut phase = self.shared.phase();
        if *phase != Phase::Running {
            return false;
        }
        *phase = Phase::Cancelled;
        drop(phase);
        self.shared.stop.cancel();
        true
    }

    /// True until the run completes or is cancelled
    pub fn is_active(&self) -> bool {
        *self.shared.phase() == Phase::Running
    }

    pub fn is_completed(&self) -> bool {
        *self.shared.phase() == Phase::Completed
    }

    pub fn is_cancelled(&self) -> bool {
        *self.shared.phase() == Phase::Cancelled
    }

    /// Wait until the run has ended, by completion or cancellation
    pub async fn finished(&self) {
        self.shared.settled.cancelled().await;
    }
}

/// One in-flight run, advanced synchronously on each tick
struct Run<C, D> {
    text: String,
    ends: std::vec::IntoIter<usize>,
    on_chunk: C,
    on_done: Option<D>,
    shared: Arc<Shared>,
}

impl<C, D> Run<C, D>
where
    C: FnMut(&str),
    D: FnOnce(),
{
    /// Reveal the next unit. Returns `false` once the run is over.
    fn tick(&mut self) -> bool {
        let mut phase = self.shared.phase();
        if *phase != Phase::Running {
            return false;
        }

        if let Some(end) = self.ends.next() {
            if let Some(revealed) = self.text.get(..end) {
                (self.on_chunk)(revealed);
            }
            return true;
        }

        *phase = Phase::Completed;
        drop(phase);
        if let Some(on_done) = self.on_done.take() {
            on_done();
        }
        false
    }
}

/// Reveals complete texts incrementally on a fixed tick
#[derive(Debug, Clone, Copy)]
pub struct DeliverySimulator {
    tick: Duration,
    granularity: Granularity,
}

impl Default for DeliverySimulator {
    fn default() -> Self {
        Self::new(DEFAULT_TICK, Granularity::default())
    }
}

impl DeliverySimulator {
    pub fn new(tick: Duration, granularity: Granularity) -> Self {
        Self {
            // A zero period would make tokio's interval panic
            tick: tick.max(Duration::from_millis(1)),
            granularity,
        }
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Start revealing `full_text`.
    ///
    /// `on_chunk` receives the revealed prefix after every tick; `on_done`
    /// runs once after the last unit unless the run is cancelled first. Must
    /// be called from within a tokio runtime.
    pub fn start<C, D>(&self, full_text: impl Into<String>, on_chunk: C, on_done: D) -> DeliveryHandle
    where
        C: FnMut(&str) + Send + 'static,
        D: FnOnce() + Send + 'static,
    {
        let text = full_text.into();
        let ends: Vec<usize> = {
            let mut offset = 0;
            split_units(&text, self.granularity)
                .into_iter()
                .map(|unit| {
                    offset += unit.len();
                    offset
                })
                .collect()
        };

        let shared = Arc::new(Shared {
            phase: Mutex::new(Phase::Running),
            stop: CancellationToken::new(),
            settled: CancellationToken::new(),
        });

        tracing::debug!(
            units = ends.len(),
            tick_ms = self.tick.as_millis(),
            "Starting delivery"
        );

        let mut run = Run {
            text,
            ends: ends.into_iter(),
            on_chunk,
            on_done: Some(on_done),
            shared: Arc::clone(&shared),
        };
        let period = self.tick;

        tokio::spawn(async move {
            let _settle = SettleOnDrop(Arc::clone(&run.shared));
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; units start one period in
            interval.tick().await;

            loop {
                tokio::select! {
                    () = run.shared.stop.cancelled() => break,
                    _ = interval.tick() => {}
                }
                if !run.tick() {
                    break;
                }
            }
        });

        DeliveryHandle { shared }
    }
}
