//! Synchronized 1 Hz refresh of every credential's code.
//!
//! All credentials share one countdown. Codes are recomputed together when
//! the wall clock sits on a period boundary (or has moved into a different
//! time step since the last computation); between boundaries the cached
//! codes are reused. Detection looks only at absolute time, so a host that
//! sleeps through whole periods skips them and shows the current one when it
//! wakes up.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::otp::core;
use crate::otp::service::OtpServiceState;
use crate::otp::types::*;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Clock
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Source of wall-clock unix seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        core::current_unix_time()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    secs: AtomicU64,
}

impl ManualClock {
    pub fn new(unix_seconds: u64) -> Self {
        Self {
            secs: AtomicU64::new(unix_seconds),
        }
    }

    pub fn set(&self, unix_seconds: u64) {
        self.secs.store(unix_seconds, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: u64) {
        self.secs.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.secs.load(Ordering::SeqCst)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Sinks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Receives every frame the scheduler produces.
pub trait FrameSink: Send + Sync {
    fn publish(&self, frame: &TickFrame);
}

/// Forwards frames into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<TickFrame>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TickFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl FrameSink for ChannelSink {
    fn publish(&self, frame: &TickFrame) {
        if self.tx.send(frame.clone()).is_err() {
            log::debug!("Frame receiver gone, dropping frame at {}", frame.now);
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Scheduler
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-tick code computation with a cache keyed by credential id.
pub struct RefreshScheduler {
    clock: Arc<dyn Clock>,
    period: u32,
    digits: u8,
    cache: HashMap<String, String>,
    /// Time step the cached codes belong to.
    cached_step: Option<u64>,
}

impl std::fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("period", &self.period)
            .field("digits", &self.digits)
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl RefreshScheduler {
    pub fn new(clock: Arc<dyn Clock>, period: u32) -> Result<Self, OtpError> {
        Ok(Self {
            clock,
            period: core::validate_period(period)?,
            digits: DEFAULT_DIGITS,
            cache: HashMap::new(),
            cached_step: None,
        })
    }

    pub fn with_digits(mut self, digits: u8) -> Result<Self, OtpError> {
        self.digits = core::validate_digits(digits)?;
        Ok(self)
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    pub fn digits(&self) -> u8 {
        self.digits
    }

    /// Compute the frame for the clock's current second.
    pub fn tick(&mut self, credentials: &[Credential]) -> TickFrame {
        let now = self.clock.now();
        let remaining = core::seconds_remaining_at(now, self.period);
        let step = core::time_step_at(now, self.period);
        let boundary = remaining == self.period
            || self.cached_step.is_some_and(|cached| cached != step);
        self.cached_step = Some(step);

        if boundary {
            log::debug!("Period boundary at {}, refreshing {} codes", now, credentials.len());
            self.cache.clear();
        } else {
            self.cache
                .retain(|id, _| credentials.iter().any(|c| &c.id == id));
        }

        let (period, digits) = (self.period, self.digits);
        let codes = credentials
            .iter()
            .map(|cred| {
                let code = self
                    .cache
                    .entry(cred.id.clone())
                    .or_insert_with(|| core::code_or_placeholder(&cred.secret, now, period, digits))
                    .clone();
                CodeView {
                    id: cred.id.clone(),
                    display_name: cred.display_name(),
                    formatted: core::format_code_display(&code),
                    code,
                }
            })
            .collect();

        TickFrame {
            now,
            period,
            remaining,
            progress: core::progress_at(now, period),
            urgency: Urgency::from_remaining(remaining),
            recomputed: boundary,
            codes,
        }
    }

    /// Drive `tick` once per second on a background task, reading the
    /// credential list from `state` each time and publishing to `sink`.
    pub fn spawn(mut self, state: OtpServiceState, sink: Arc<dyn FrameSink>) -> SchedulerHandle {
        log::info!("Starting refresh scheduler (period {}s)", self.period);
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                let credentials = state.lock().await.list().to_vec();
                let frame = self.tick(&credentials);
                sink.publish(&frame);
            }
        });
        SchedulerHandle { task: Some(task) }
    }
}

/// Owns the running scheduler task. Dropping the handle also stops it.
#[derive(Debug)]
pub struct SchedulerHandle {
    task: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Cancel the task and wait for it to wind down. No frame is published
    /// after this returns.
    pub async fn stop(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
            log::info!("Refresh scheduler stopped");
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otp::persist::MemoryPersistence;
    use crate::otp::service::OtpService;

    const SECRET_A: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";
    const SECRET_B: &str = "JBSWY3DPEHPK3PXP";

    fn scheduler_at(t: u64) -> (RefreshScheduler, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(t));
        let sched = RefreshScheduler::new(clock.clone(), 30).unwrap();
        (sched, clock)
    }

    fn expected(secret: &str, t: u64) -> String {
        core::generate_for_secret(secret, t, 30, 6).unwrap()
    }

    #[test]
    fn rejects_bad_settings() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));
        assert_eq!(
            RefreshScheduler::new(clock.clone(), 0).unwrap_err().kind,
            OtpErrorKind::InvalidPeriod
        );
        let err = RefreshScheduler::new(clock, 30).unwrap().with_digits(9).unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::InvalidDigits);
    }

    #[test]
    fn countdown_fields() {
        let (mut s, clock) = scheduler_at(1_000_000_020); // now % 30 == 0
        let frame = s.tick(&[]);
        assert_eq!(frame.remaining, 30);
        assert!((frame.progress - 1.0).abs() < 1e-9);
        assert_eq!(frame.urgency, Urgency::Normal);
        assert!(frame.recomputed);

        clock.advance(22);
        let frame = s.tick(&[]);
        assert_eq!(frame.remaining, 8);
        assert_eq!(frame.urgency, Urgency::Warning);
        assert!(!frame.recomputed);

        clock.advance(4);
        assert_eq!(s.tick(&[]).urgency, Urgency::Danger);
    }

    #[test]
    fn first_tick_computes_current_codes() {
        let t = 1_111_111_109;
        let (mut s, _) = scheduler_at(t);
        let creds = vec![Credential::new("a", SECRET_A, "Acme")];
        let frame = s.tick(&creds);
        assert_eq!(frame.codes.len(), 1);
        assert_eq!(frame.codes[0].code, expected(SECRET_A, t));
        assert_eq!(frame.codes[0].display_name, "Acme (a)");
        assert_eq!(frame.codes[0].formatted.len(), 7);
    }

    #[test]
    fn boundary_recomputes_every_code() {
        let (mut s, clock) = scheduler_at(59);
        let creds = vec![
            Credential::new("a", SECRET_A, ""),
            Credential::new("b", SECRET_B, ""),
        ];
        let before = s.tick(&creds);
        clock.set(60);
        let after = s.tick(&creds);
        assert!(after.recomputed);
        assert_eq!(after.remaining, 30);
        for (view, cred) in after.codes.iter().zip(&creds) {
            assert_eq!(view.code, expected(&cred.secret, 60));
        }
        assert_ne!(before.codes[0].code, after.codes[0].code);
    }

    #[test]
    fn cached_codes_are_reused_between_boundaries() {
        let (mut s, clock) = scheduler_at(31);
        let creds = vec![Credential::new("a", SECRET_A, "")];
        let first = s.tick(&creds).codes[0].code.clone();
        // Corrupt the cache to prove no recomputation happens mid-period.
        s.cache.insert(creds[0].id.clone(), "000000".into());
        clock.advance(5);
        let frame = s.tick(&creds);
        assert!(!frame.recomputed);
        assert_eq!(frame.codes[0].code, "000000");
        assert_ne!(first, "000000");
    }

    #[test]
    fn new_credential_gets_code_before_boundary() {
        let (mut s, clock) = scheduler_at(40);
        let mut creds = vec![Credential::new("a", SECRET_A, "")];
        s.tick(&creds);
        clock.advance(3);
        creds.push(Credential::new("b", SECRET_B, ""));
        let frame = s.tick(&creds);
        assert_eq!(frame.codes.len(), 2);
        assert_eq!(frame.codes[1].code, expected(SECRET_B, 43));
    }

    #[test]
    fn deleted_credential_is_evicted() {
        let (mut s, clock) = scheduler_at(40);
        let creds = vec![
            Credential::new("a", SECRET_A, ""),
            Credential::new("b", SECRET_B, ""),
        ];
        s.tick(&creds);
        clock.advance(1);
        let frame = s.tick(&creds[1..]);
        assert_eq!(frame.codes.len(), 1);
        assert_eq!(frame.codes[0].id, creds[1].id);
        assert!(!s.cache.contains_key(&creds[0].id));
    }

    #[test]
    fn broken_secret_is_isolated() {
        let (mut s, _) = scheduler_at(59);
        let mut bad = Credential::new("bad", SECRET_A, "");
        bad.secret = "!!!".into();
        let good = Credential::new("good", SECRET_B, "");
        let frame = s.tick(&[bad, good]);
        assert_eq!(frame.codes[0].code, "------");
        assert!(core::is_placeholder(&frame.codes[0].code));
        assert_eq!(frame.codes[1].code, expected(SECRET_B, 59));
    }

    #[test]
    fn suspended_host_shows_only_current_period() {
        let (mut s, clock) = scheduler_at(45);
        let creds = vec![Credential::new("a", SECRET_A, "")];
        s.tick(&creds);
        // Sleep through several periods, waking mid-period.
        let woke = 45 + 30 * 7 + 2;
        clock.set(woke);
        let frame = s.tick(&creds);
        assert!(frame.recomputed);
        assert_eq!(frame.codes[0].code, expected(SECRET_A, woke));
        assert_ne!(frame.codes[0].code, expected(SECRET_A, 45));
    }

    #[tokio::test]
    async fn spawned_scheduler_publishes_and_stops() {
        let state = OtpService::new(Box::new(MemoryPersistence::new())).unwrap();
        state.lock().await.add_manual("alice", SECRET_B).unwrap();

        let clock = Arc::new(ManualClock::new(1_000_000_020));
        let sched = RefreshScheduler::new(clock, 30).unwrap();
        let (sink, mut rx) = ChannelSink::new();
        let handle = sched.spawn(state.clone(), Arc::new(sink));

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.codes.len(), 1);
        assert_eq!(frame.codes[0].code, expected(SECRET_B, 1_000_000_020));
        assert!(handle.is_running());

        handle.stop().await;
        // The sink is dropped with the task, so the stream ends.
        while rx.recv().await.is_some() {}
    }
}
