use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;

use crate::inst::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle(pub u64);

/// What a timer is for. Interface timers carry the ifindex, neighbor timers
/// the ifindex and neighbor address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Hello(u32),
    LsAck(u32),
    Inactivity(u32, Ipv4Addr),
    DbDesc(u32, Ipv4Addr),
    LsReq(u32, Ipv4Addr),
    LsUpd(u32, Ipv4Addr),
    Age,
}

/// Identifies the owner incarnation of a timer. A firing whose owner id or
/// epoch no longer matches is stale and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken {
    pub kind: TimerKind,
    pub owner: u64,
    pub epoch: u64,
}

impl TimerToken {
    pub fn new(kind: TimerKind, owner: u64, epoch: u64) -> Self {
        Self { kind, owner, epoch }
    }
}

pub trait TimerService: Send {
    /// Arm a one shot timer. When it fires the token is handed back to the
    /// instance together with the returned handle.
    fn schedule(&mut self, delay: Duration, token: TimerToken) -> TimerHandle;

    fn cancel(&mut self, handle: TimerHandle);
}

pub fn timer_arm(
    timers: &mut dyn TimerService,
    slot: &mut Option<TimerHandle>,
    delay: Duration,
    token: TimerToken,
) {
    timer_cancel(timers, slot);
    *slot = Some(timers.schedule(delay, token));
}

pub fn timer_cancel(timers: &mut dyn TimerService, slot: &mut Option<TimerHandle>) {
    if let Some(handle) = slot.take() {
        timers.cancel(handle);
    }
}

/// One shot tokio timer. Dropping it before expiry stops the task.
#[derive(Debug)]
pub struct Timer {
    _stop: oneshot::Sender<()>,
}

impl Timer {
    pub fn new<F, Fut>(duration: Duration, cb: F) -> Timer
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (stop, rx) = oneshot::channel();

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => (cb)().await,
                _ = rx => {}
            }
        });
        Timer { _stop: stop }
    }
}

#[derive(Debug, Default)]
struct TokioInner {
    next: u64,
    timers: HashMap<TimerHandle, Timer>,
}

/// Timer service backed by tokio tasks. Expiry is posted to the instance
/// channel as `Message::Timer`. An entry lives until its handle is
/// cancelled, which the instance does for every firing it receives.
#[derive(Clone)]
pub struct TokioTimers {
    tx: UnboundedSender<Message>,
    inner: Arc<Mutex<TokioInner>>,
}

impl TokioTimers {
    pub fn new(tx: UnboundedSender<Message>) -> Self {
        Self {
            tx,
            inner: Arc::new(Mutex::new(TokioInner::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TokioInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().timers.is_empty()
    }
}

impl TimerService for TokioTimers {
    fn schedule(&mut self, delay: Duration, token: TimerToken) -> TimerHandle {
        let mut inner = self.lock();
        inner.next += 1;
        let handle = TimerHandle(inner.next);
        let tx = self.tx.clone();
        let timer = Timer::new(delay.max(Duration::from_millis(1)), move || async move {
            let _ = tx.send(Message::Timer(handle, token));
        });
        inner.timers.insert(handle, timer);
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.lock().timers.remove(&handle);
    }
}

#[derive(Debug, Default)]
struct ManualInner {
    next: u64,
    armed: BTreeMap<TimerHandle, (Duration, TimerToken)>,
}

/// Timer service that never fires on its own. The owner inspects what is
/// armed and delivers expiries explicitly, which makes runs deterministic.
#[derive(Debug, Default, Clone)]
pub struct ManualTimers {
    inner: Arc<Mutex<ManualInner>>,
}

impl ManualTimers {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ManualInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Armed timers in arming order.
    pub fn armed(&self) -> Vec<(TimerHandle, TimerToken, Duration)> {
        self.lock()
            .armed
            .iter()
            .map(|(handle, (delay, token))| (*handle, *token, *delay))
            .collect()
    }

    pub fn is_armed(&self, handle: TimerHandle) -> bool {
        self.lock().armed.contains_key(&handle)
    }

    pub fn find(&self, kind: TimerKind) -> Option<(TimerHandle, TimerToken)> {
        self.lock()
            .armed
            .iter()
            .find(|(_, (_, token))| token.kind == kind)
            .map(|(handle, (_, token))| (*handle, *token))
    }

    /// Remove and return the first armed timer of the given kind, as if it
    /// had fired.
    pub fn take(&self, kind: TimerKind) -> Option<(TimerHandle, TimerToken)> {
        let mut inner = self.lock();
        let handle = inner
            .armed
            .iter()
            .find(|(_, (_, token))| token.kind == kind)
            .map(|(handle, _)| *handle)?;
        inner.armed.remove(&handle).map(|(_, token)| (handle, token))
    }

    pub fn len(&self) -> usize {
        self.lock().armed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().armed.is_empty()
    }
}

impl TimerService for ManualTimers {
    fn schedule(&mut self, delay: Duration, token: TimerToken) -> TimerHandle {
        let mut inner = self.lock();
        inner.next += 1;
        let handle = TimerHandle(inner.next);
        inner.armed.insert(handle, (delay, token));
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.lock().armed.remove(&handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OspfConfig;
    use crate::inst::Ospf;
    use crate::network::QueueTransport;
    use tokio::sync::mpsc;

    fn token(kind: TimerKind) -> TimerToken {
        TimerToken::new(kind, 1, 0)
    }

    #[test]
    fn test_manual_timers() {
        let mut timers = ManualTimers::new();
        let observer = timers.clone();
        let hello = timers.schedule(Duration::from_secs(10), token(TimerKind::Hello(1)));
        let age = timers.schedule(Duration::from_secs(1), token(TimerKind::Age));
        assert_eq!(observer.len(), 2);
        assert!(observer.is_armed(hello));

        timers.cancel(hello);
        assert!(!observer.is_armed(hello));
        assert!(observer.find(TimerKind::Hello(1)).is_none());

        let (handle, fired) = observer.take(TimerKind::Age).unwrap();
        assert_eq!(handle, age);
        assert_eq!(fired.kind, TimerKind::Age);
        assert!(observer.is_empty());
    }

    #[test]
    fn test_timer_arm_replaces() {
        let mut timers = ManualTimers::new();
        let observer = timers.clone();
        let mut slot = None;
        timer_arm(&mut timers, &mut slot, Duration::from_secs(5), token(TimerKind::Age));
        let first = slot.unwrap();
        timer_arm(&mut timers, &mut slot, Duration::from_secs(5), token(TimerKind::Age));
        assert_ne!(slot, Some(first));
        assert_eq!(observer.len(), 1);

        timer_cancel(&mut timers, &mut slot);
        assert!(slot.is_none());
        assert!(observer.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_timers_fire_and_cancel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = TokioTimers::new(tx);
        let cancelled = timers.schedule(Duration::from_secs(1), token(TimerKind::Hello(3)));
        let fired = timers.schedule(Duration::from_secs(2), token(TimerKind::Age));
        timers.cancel(cancelled);
        assert_eq!(timers.len(), 1);

        match rx.recv().await {
            Some(Message::Timer(handle, token)) => {
                assert_eq!(handle, fired);
                assert_eq!(token.kind, TimerKind::Age);
            }
            _ => panic!("expected timer message"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_timers_released_after_firing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let timers = TokioTimers::new(tx);
        let (notify, _notify_rx) = mpsc::unbounded_channel();
        let mut ospf = Ospf::new(
            OspfConfig::new(Ipv4Addr::new(1, 1, 1, 1)),
            Box::new(timers.clone()),
            Box::new(QueueTransport::new()),
            notify,
        )
        .unwrap();

        // The age tick re-arms itself on every firing.
        ospf.start();
        for _ in 0..100 {
            let msg = rx.recv().await.unwrap();
            assert!(matches!(msg, Message::Timer(_, token) if token.kind == TimerKind::Age));
            ospf.process_msg(msg, std::time::Instant::now());
            assert_eq!(timers.len(), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_timers_stale_firing_released() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let timers = TokioTimers::new(tx);
        let (notify, _notify_rx) = mpsc::unbounded_channel();
        let mut ospf = Ospf::new(
            OspfConfig::new(Ipv4Addr::new(1, 1, 1, 1)),
            Box::new(timers.clone()),
            Box::new(QueueTransport::new()),
            notify,
        )
        .unwrap();

        // A firing nobody owns any more is still dropped from the service.
        let mut service = timers.clone();
        service.schedule(Duration::from_secs(1), TimerToken::new(TimerKind::Hello(9), 7, 0));
        assert_eq!(timers.len(), 1);
        let msg = rx.recv().await.unwrap();
        ospf.process_msg(msg, std::time::Instant::now());
        assert!(timers.is_empty());
    }
}
