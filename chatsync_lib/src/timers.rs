use crate::config::PollIntervals;
use crate::types::TimerKind;
use crate::widget::Msg;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Everything that reaches the client's event loop.
#[derive(Debug)]
pub(crate) enum Inbound {
    Msg(Msg),
    /// A firing from timer instance `seq` of `kind`.
    Timer { kind: TimerKind, seq: u64 },
}

#[derive(Debug)]
struct Running {
    seq: u64,
    handle: JoinHandle<()>,
}

/// Task-backed scheduler with at most one live timer per [`TimerKind`].
///
/// Starting a kind that is already running aborts the old task first. Each
/// instance stamps its firings with a sequence number, so a tick that was
/// already queued when its timer got replaced is recognised and dropped.
#[derive(Debug)]
pub struct Timers {
    tx: UnboundedSender<Inbound>,
    intervals: PollIntervals,
    running: HashMap<TimerKind, Running>,
    next_seq: u64,
}

impl Timers {
    pub(crate) fn new(tx: UnboundedSender<Inbound>, intervals: PollIntervals) -> Self {
        Self {
            tx,
            intervals,
            running: HashMap::new(),
            next_seq: 0,
        }
    }

    pub fn is_running(&self, kind: TimerKind) -> bool {
        self.running.contains_key(&kind)
    }

    pub fn running(&self) -> Vec<TimerKind> {
        TimerKind::ALL
            .iter()
            .copied()
            .filter(|kind| self.is_running(*kind))
            .collect()
    }

    /// Start (or replace) a repeating timer. The first tick comes one full
    /// period after the start.
    pub fn start(&mut self, kind: TimerKind) {
        self.stop(kind);
        let seq = self.bump_seq();
        let period = self.intervals.period(kind).max(MIN_PERIOD);
        let first = Instant::now() + period;
        let tx = self.tx.clone();
        debug!("Starting {:?} timer every {:?}", kind, period);

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(first, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if tx.send(Inbound::Timer { kind, seq }).is_err() {
                    break;
                }
            }
        });
        self.running.insert(kind, Running { seq, handle });
    }

    /// Start (or replace) a timer that fires once.
    pub fn start_once(&mut self, kind: TimerKind) {
        self.stop(kind);
        let seq = self.bump_seq();
        let delay = self.intervals.period(kind);
        let deadline = Instant::now() + delay;
        let tx = self.tx.clone();
        debug!("Arming one-shot {:?} timer in {:?}", kind, delay);

        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = tx.send(Inbound::Timer { kind, seq });
        });
        self.running.insert(kind, Running { seq, handle });
    }

    pub fn stop(&mut self, kind: TimerKind) -> bool {
        match self.running.remove(&kind) {
            Some(running) => {
                debug!("Stopping {:?} timer", kind);
                running.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&mut self) {
        for (_, running) in self.running.drain() {
            running.handle.abort();
        }
    }

    /// Whether a firing belongs to the live instance of its kind. A one-shot
    /// timer is retired by its firing.
    pub(crate) fn accept(&mut self, kind: TimerKind, seq: u64) -> bool {
        let live = self.running.get(&kind).map(|r| r.seq) == Some(seq);
        if live && !kind.is_repeating() {
            self.running.remove(&kind);
        }
        live
    }

    fn bump_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

impl Drop for Timers {
    fn drop(&mut self) {
        self.stop_all();
    }
}
