//! Signal sources for triggering lame-duck mode.
//!
//! The runner never talks to the OS directly. It subscribes through the
//! process-wide [`SignalSource`], which defaults to [`OsSignals`] and can be
//! swapped with [`replace_source`] so tests (or embedders) can deliver signals
//! themselves via [`ManualSignals`].

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// A signal that can trigger lame-duck mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Signal {
    Interrupt,
    Terminate,
    Hangup,
    Quit,
    User1,
    User2,
}

impl Signal {
    /// Signals that trigger lame-duck mode unless configured otherwise.
    pub const DEFAULTS: [Signal; 2] = [Signal::Interrupt, Signal::Terminate];

    pub fn name(self) -> &'static str {
        match self {
            Signal::Interrupt => "SIGINT",
            Signal::Terminate => "SIGTERM",
            Signal::Hangup => "SIGHUP",
            Signal::Quit => "SIGQUIT",
            Signal::User1 => "SIGUSR1",
            Signal::User2 => "SIGUSR2",
        }
    }

    #[cfg(unix)]
    fn kind(self) -> tokio::signal::unix::SignalKind {
        use tokio::signal::unix::SignalKind;

        match self {
            Signal::Interrupt => SignalKind::interrupt(),
            Signal::Terminate => SignalKind::terminate(),
            Signal::Hangup => SignalKind::hangup(),
            Signal::Quit => SignalKind::quit(),
            Signal::User1 => SignalKind::user_defined1(),
            Signal::User2 => SignalKind::user_defined2(),
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accepts "SIGTERM", "TERM" or "terminate" (any case).
impl FromStr for Signal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let name = upper.strip_prefix("SIG").unwrap_or(&upper);
        match name {
            "INT" | "INTERRUPT" => Ok(Signal::Interrupt),
            "TERM" | "TERMINATE" => Ok(Signal::Terminate),
            "HUP" | "HANGUP" => Ok(Signal::Hangup),
            "QUIT" => Ok(Signal::Quit),
            "USR1" => Ok(Signal::User1),
            "USR2" => Ok(Signal::User2),
            _ => Err(format!("unknown signal '{}'", s)),
        }
    }
}

impl TryFrom<String> for Signal {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Signal> for String {
    fn from(signal: Signal) -> Self {
        signal.name().to_string()
    }
}

/// Identifies one subscription on a [`SignalSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Delivers signals to subscribed sinks.
///
/// Deliveries must not block: if a sink is full the signal is dropped for
/// that sink.
pub trait SignalSource: Send + Sync {
    /// Start delivering any of `signals` to `sink`.
    fn subscribe(
        &self,
        signals: &[Signal],
        sink: mpsc::Sender<Signal>,
    ) -> io::Result<SubscriptionId>;

    /// Stop deliveries for a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Signal source backed by the operating system.
///
/// Unsubscribing stops forwarding, but tokio keeps its handler installed for
/// the rest of the process. Once a signal has been subscribed to, its default
/// disposition (e.g. terminating on SIGINT or SIGTERM) is not restored: after
/// [`Runner::run`](crate::Runner::run) returns, further deliveries are
/// swallowed. Callers that need the default behaviour back must exit the
/// process themselves.
#[derive(Default)]
pub struct OsSignals {
    listeners: Mutex<HashMap<SubscriptionId, Vec<JoinHandle<()>>>>,
}

impl OsSignals {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SignalSource for OsSignals {
    #[cfg(unix)]
    fn subscribe(
        &self,
        signals: &[Signal],
        sink: mpsc::Sender<Signal>,
    ) -> io::Result<SubscriptionId> {
        use tokio::signal::unix::signal;

        // Register every handler before spawning so a failure leaves nothing behind.
        let mut streams = Vec::with_capacity(signals.len());
        for &sig in signals {
            streams.push((sig, signal(sig.kind())?));
        }

        let handles = streams
            .into_iter()
            .map(|(sig, mut stream)| {
                let sink = sink.clone();
                tokio::spawn(async move {
                    while stream.recv().await.is_some() {
                        debug!(signal = %sig, "signal delivered");
                        if let Err(mpsc::error::TrySendError::Closed(_)) = sink.try_send(sig) {
                            break;
                        }
                    }
                })
            })
            .collect();

        let id = SubscriptionId::next();
        self.listeners.lock().insert(id, handles);
        Ok(id)
    }

    #[cfg(not(unix))]
    fn subscribe(
        &self,
        signals: &[Signal],
        sink: mpsc::Sender<Signal>,
    ) -> io::Result<SubscriptionId> {
        let mut handles = Vec::new();

        for &sig in signals {
            if sig != Signal::Interrupt {
                tracing::warn!(signal = %sig, "signal not supported on this platform; ignoring");
                continue;
            }
            let sink = sink.clone();
            handles.push(tokio::spawn(async move {
                while tokio::signal::ctrl_c().await.is_ok() {
                    if let Err(mpsc::error::TrySendError::Closed(_)) = sink.try_send(sig) {
                        break;
                    }
                }
            }));
        }

        let id = SubscriptionId::next();
        self.listeners.lock().insert(id, handles);
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        if let Some(handles) = self.listeners.lock().remove(&id) {
            for handle in handles {
                handle.abort();
            }
        }
    }
}

/// Signal source whose deliveries are made by calling [`ManualSignals::emit`].
#[derive(Default)]
pub struct ManualSignals {
    subscribers: Mutex<HashMap<SubscriptionId, (Vec<Signal>, mpsc::Sender<Signal>)>>,
}

impl ManualSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `signal` to every subscriber interested in it.
    ///
    /// Returns the number of sinks that accepted the signal.
    pub fn emit(&self, signal: Signal) -> usize {
        let mut delivered = 0;
        for (signals, sink) in self.subscribers.lock().values() {
            if signals.contains(&signal) && sink.try_send(signal).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Number of active subscriptions.
    pub fn subscriptions(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl SignalSource for ManualSignals {
    fn subscribe(
        &self,
        signals: &[Signal],
        sink: mpsc::Sender<Signal>,
    ) -> io::Result<SubscriptionId> {
        let id = SubscriptionId::next();
        self.subscribers.lock().insert(id, (signals.to_vec(), sink));
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.lock().remove(&id);
    }
}

struct Installed(Arc<dyn SignalSource>);

static SOURCE: LazyLock<ArcSwap<Installed>> =
    LazyLock::new(|| ArcSwap::from_pointee(Installed(Arc::new(OsSignals::new()))));

/// The process-wide signal source.
pub fn source() -> Arc<dyn SignalSource> {
    Arc::clone(&SOURCE.load().0)
}

/// Install `source` as the process-wide signal source.
///
/// The previous source is restored when the returned guard is dropped.
/// Production code has no reason to call this.
#[must_use = "the previous source is restored when the guard is dropped"]
pub fn replace_source(source: Arc<dyn SignalSource>) -> SourceGuard {
    let previous = SOURCE.swap(Arc::new(Installed(source)));
    SourceGuard {
        previous: Some(previous),
    }
}

/// Restores the previously installed signal source on drop.
pub struct SourceGuard {
    previous: Option<Arc<Installed>>,
}

impl Drop for SourceGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            SOURCE.store(previous);
        }
    }
}

/// An active subscription; unsubscribes when dropped.
pub(crate) struct Subscription {
    source: Arc<dyn SignalSource>,
    id: SubscriptionId,
    rx: mpsc::Receiver<Signal>,
}

impl Subscription {
    /// Subscribe to `signals` on the process-wide source.
    pub(crate) fn new(signals: &[Signal]) -> io::Result<Self> {
        let source = source();
        let (tx, rx) = mpsc::channel(1);
        let id = source.subscribe(signals, tx)?;
        Ok(Self { source, id, rx })
    }

    /// Wait for the next delivered signal.
    pub(crate) async fn recv(&mut self) -> Option<Signal> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.source.unsubscribe(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_signal_names() {
        assert_eq!("SIGTERM".parse::<Signal>().unwrap(), Signal::Terminate);
        assert_eq!("int".parse::<Signal>().unwrap(), Signal::Interrupt);
        assert_eq!("hangup".parse::<Signal>().unwrap(), Signal::Hangup);
        assert_eq!("SIGUSR2".parse::<Signal>().unwrap(), Signal::User2);
        assert!("SIGKILL".parse::<Signal>().is_err());
    }

    #[test]
    fn test_signal_serde() {
        let signals: Vec<Signal> = serde_yaml::from_str("[SIGINT, term, quit]").unwrap();
        assert_eq!(signals, vec![Signal::Interrupt, Signal::Terminate, Signal::Quit]);

        let yaml = serde_yaml::to_string(&Signal::Terminate).unwrap();
        assert_eq!(yaml.trim(), "SIGTERM");
    }

    #[tokio::test]
    async fn test_manual_emit_only_reaches_interested_subscribers() {
        let source = ManualSignals::new();
        let (tx, mut rx) = mpsc::channel(1);
        let id = source.subscribe(&[Signal::Terminate], tx).unwrap();

        assert_eq!(source.emit(Signal::Hangup), 0);
        assert_eq!(source.emit(Signal::Terminate), 1);
        assert_eq!(rx.recv().await, Some(Signal::Terminate));

        source.unsubscribe(id);
        assert_eq!(source.subscriptions(), 0);
        assert_eq!(source.emit(Signal::Terminate), 0);
    }

    #[tokio::test]
    async fn test_manual_emit_drops_when_sink_full() {
        let source = ManualSignals::new();
        let (tx, _rx) = mpsc::channel(1);
        source.subscribe(&[Signal::Interrupt], tx).unwrap();

        assert_eq!(source.emit(Signal::Interrupt), 1);
        assert_eq!(source.emit(Signal::Interrupt), 0);
    }

    #[tokio::test]
    #[serial(signal_source)]
    async fn test_subscription_unsubscribes_on_drop() {
        let manual = Arc::new(ManualSignals::new());
        let _guard = replace_source(manual.clone());

        let mut sub = Subscription::new(&[Signal::Quit]).unwrap();
        assert_eq!(manual.subscriptions(), 1);

        manual.emit(Signal::Quit);
        assert_eq!(sub.recv().await, Some(Signal::Quit));

        drop(sub);
        assert_eq!(manual.subscriptions(), 0);
    }

    #[test]
    #[serial(signal_source)]
    fn test_replace_source_restores_previous() {
        let first = Arc::new(ManualSignals::new());
        let second = Arc::new(ManualSignals::new());

        let _outer = replace_source(first.clone());
        {
            let _inner = replace_source(second.clone());
            let (tx, _rx) = mpsc::channel(1);
            source().subscribe(&[Signal::Hangup], tx).unwrap();
            assert_eq!(second.subscriptions(), 1);
        }

        let (tx, _rx) = mpsc::channel(1);
        source().subscribe(&[Signal::Hangup], tx).unwrap();
        assert_eq!(first.subscriptions(), 1);
        assert_eq!(second.subscriptions(), 1);
    }
}
