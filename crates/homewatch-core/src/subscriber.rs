// ── Client realtime subscriber ──
//
// Owns the WebSocket link to the relay, exposes its lifecycle as a
// `watch` channel and re-emits typed messages to per-channel listeners.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use dashmap::DashMap;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use homewatch_api::{Channel, LinkEvent, ReconnectConfig, RealtimeMessage, WebSocketHandle};

// ── ConnectionState ──────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting { attempt: u32 },
    Connected,
}

// ── Listener types ───────────────────────────────────────────────────

/// What a listener returns. An error is logged and does not stop delivery
/// to the remaining listeners.
pub type ListenerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

type Listener = Arc<dyn Fn(&RealtimeMessage) -> ListenerResult + Send + Sync>;
type Hook = Arc<dyn Fn() + Send + Sync>;

/// Callbacks fired on connect and disconnect.
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    on_connect: Option<Hook>,
    on_disconnect: Option<Hook>,
}

impl LifecycleHooks {
    pub fn on_connect(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connect = Some(Arc::new(hook));
        self
    }

    pub fn on_disconnect(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_disconnect = Some(Arc::new(hook));
        self
    }

    fn fire_connect(&self) {
        if let Some(hook) = &self.on_connect {
            hook();
        }
    }

    fn fire_disconnect(&self) {
        if let Some(hook) = &self.on_disconnect {
            hook();
        }
    }
}

// ── RealtimeSubscriber ───────────────────────────────────────────────

/// Cheaply cloneable handle to the client side of the realtime channel.
#[derive(Clone)]
pub struct RealtimeSubscriber {
    inner: Arc<SubscriberInner>,
}

struct SubscriberInner {
    url: Url,
    reconnect: ReconnectConfig,
    state: watch::Sender<ConnectionState>,
    /// Registration order is preserved per channel.
    listeners: DashMap<Channel, Vec<(u64, Listener)>>,
    next_listener_id: AtomicU64,
    session: Mutex<Option<Session>>,
}

struct Session {
    link: WebSocketHandle,
    cancel: CancellationToken,
    driver: JoinHandle<()>,
    hooks: LifecycleHooks,
}

impl RealtimeSubscriber {
    /// Create a subscriber for `url`. Does NOT connect.
    pub fn new(url: Url, reconnect: ReconnectConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(SubscriberInner {
                url,
                reconnect,
                state,
                listeners: DashMap::new(),
                next_listener_id: AtomicU64::new(1),
                session: Mutex::new(None),
            }),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Open the connection and start delivering messages.
    ///
    /// Idempotent while a session is active: returns `false` and leaves
    /// the running session alone. After the reconnect limit is exhausted
    /// the subscriber stays `Disconnected` until `connect` is called again.
    pub fn connect(&self, hooks: LifecycleHooks) -> bool {
        let mut session = self.lock_session();
        if session.as_ref().is_some_and(|s| !s.driver.is_finished()) {
            tracing::debug!("realtime session already active");
            return false;
        }

        let cancel = CancellationToken::new();
        let (link, events) = WebSocketHandle::connect(
            self.inner.url.clone(),
            self.inner.reconnect.clone(),
            cancel.clone(),
        );
        let driver = tokio::spawn(drive(Arc::downgrade(&self.inner), events, hooks.clone()));

        *session = Some(Session {
            link,
            cancel,
            driver,
            hooks,
        });
        true
    }

    /// Close the connection and drop every listener.
    pub fn disconnect(&self) {
        let session = self.lock_session().take();
        self.inner.listeners.clear();
        let previous = self.inner.state.send_replace(ConnectionState::Disconnected);

        if let Some(session) = session {
            session.cancel.cancel();
            session.driver.abort();
            if previous == ConnectionState::Connected {
                session.hooks.fire_disconnect();
            }
        }
    }

    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        *self.inner.state.borrow() == ConnectionState::Connected
    }

    // ── Listeners ────────────────────────────────────────────────────

    /// Register `callback` for `channel`. The listener stays registered
    /// until the returned [`Subscription`] is dropped or unsubscribed.
    #[must_use = "dropping the Subscription unregisters the listener"]
    pub fn on(
        &self,
        channel: Channel,
        callback: impl Fn(&RealtimeMessage) -> ListenerResult + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .entry(channel)
            .or_default()
            .push((id, Arc::new(callback)));

        Subscription {
            id,
            channel,
            inner: Arc::downgrade(&self.inner),
            active: true,
        }
    }

    pub fn listener_count(&self, channel: Channel) -> usize {
        self.inner.listeners.get(&channel).map_or(0, |l| l.len())
    }

    /// Deliver `message` to every listener of its channel, in registration
    /// order. Returns how many listeners ran without error.
    pub fn dispatch(&self, message: &RealtimeMessage) -> usize {
        self.inner.dispatch(message)
    }

    // ── Outbound ─────────────────────────────────────────────────────

    /// Send a message to the relay. Dropped (returns `false`) unless
    /// currently connected.
    pub fn send(&self, message: &RealtimeMessage) -> bool {
        if !self.is_connected() {
            tracing::debug!(channel = %message.channel(), "not connected, dropping outbound message");
            return false;
        }
        let session = self.lock_session();
        let Some(session) = session.as_ref() else {
            return false;
        };
        match session.link.send(message) {
            Ok(queued) => queued,
            Err(e) => {
                tracing::warn!(error = %e, "could not encode outbound message");
                false
            }
        }
    }

    /// Liveness check; the relay answers on the `pong` channel.
    pub fn ping(&self) -> bool {
        self.send(&RealtimeMessage::Ping)
    }

    fn lock_session(&self) -> std::sync::MutexGuard<'_, Option<Session>> {
        self.inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl SubscriberInner {
    fn dispatch(&self, message: &RealtimeMessage) -> usize {
        let channel = message.channel();
        // Snapshot so listeners may (un)register from inside a callback.
        let listeners: Vec<(u64, Listener)> = self
            .listeners
            .get(&channel)
            .map(|l| l.value().clone())
            .unwrap_or_default();

        let mut ok = 0;
        for (id, listener) in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(message))) {
                Ok(Ok(())) => ok += 1,
                Ok(Err(e)) => {
                    tracing::warn!(%channel, listener = id, error = %e, "realtime listener failed");
                }
                Err(_) => {
                    tracing::error!(%channel, listener = id, "realtime listener panicked");
                }
            }
        }
        ok
    }
}

/// Consume link events for one session.
async fn drive(
    inner: Weak<SubscriberInner>,
    mut events: mpsc::Receiver<LinkEvent>,
    hooks: LifecycleHooks,
) {
    let mut connected = false;

    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        match event {
            LinkEvent::Connecting { attempt } => {
                if attempt > 1 {
                    tracing::warn!(attempt, "reconnecting to relay");
                }
                inner.state.send_replace(ConnectionState::Connecting { attempt });
            }
            LinkEvent::Connected => {
                connected = true;
                inner.state.send_replace(ConnectionState::Connected);
                hooks.fire_connect();
            }
            LinkEvent::Disconnected => {
                inner.state.send_replace(ConnectionState::Disconnected);
                if std::mem::take(&mut connected) {
                    hooks.fire_disconnect();
                }
            }
            LinkEvent::Message(message) => {
                inner.dispatch(&message);
            }
            LinkEvent::GaveUp => {
                tracing::error!("realtime link gave up reconnecting");
                inner.state.send_replace(ConnectionState::Disconnected);
                break;
            }
        }
    }

    if connected {
        hooks.fire_disconnect();
    }
    if let Some(inner) = inner.upgrade() {
        inner.state.send_replace(ConnectionState::Disconnected);
    }
}

// ── Subscription ─────────────────────────────────────────────────────

/// Registration handle returned by [`RealtimeSubscriber::on`].
pub struct Subscription {
    id: u64,
    channel: Channel,
    inner: Weak<SubscriberInner>,
    active: bool,
}

impl Subscription {
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Remove the listener now.
    pub fn unsubscribe(mut self) {
        self.remove();
    }

    /// Keep the listener registered for the subscriber's lifetime.
    pub fn detach(mut self) {
        self.active = false;
    }

    fn remove(&mut self) {
        if !std::mem::take(&mut self.active) {
            return;
        }
        if let Some(inner) = self.inner.upgrade() {
            if let Some(mut listeners) = inner.listeners.get_mut(&self.channel) {
                listeners.retain(|(id, _)| *id != self.id);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}

/// Tally of registrations per channel, for diagnostics.
pub fn listener_summary(subscriber: &RealtimeSubscriber) -> HashMap<Channel, usize> {
    subscriber
        .inner
        .listeners
        .iter()
        .map(|entry| (*entry.key(), entry.value().len()))
        .filter(|(_, n)| *n > 0)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use homewatch_api::CameraStatus;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    fn subscriber() -> RealtimeSubscriber {
        RealtimeSubscriber::new(
            Url::parse("ws://127.0.0.1:9/ws").unwrap(),
            ReconnectConfig {
                delay: Duration::from_millis(5),
                max_attempts: Some(2),
            },
        )
    }

    fn camera(status: &str) -> RealtimeMessage {
        RealtimeMessage::CameraStatus(CameraStatus {
            camera_id: "raspberry-01".into(),
            status: status.into(),
        })
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let sub = subscriber();
        let seen = Arc::new(StdMutex::new(Vec::new()));

        let s1 = {
            let seen = seen.clone();
            sub.on(Channel::CameraStatus, move |_| {
                seen.lock().unwrap().push(1);
                Ok(())
            })
        };
        let s2 = {
            let seen = seen.clone();
            sub.on(Channel::CameraStatus, move |_| {
                seen.lock().unwrap().push(2);
                Ok(())
            })
        };

        assert_eq!(sub.dispatch(&camera("online")), 2);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        drop((s1, s2));
    }

    #[test]
    fn failing_and_panicking_listeners_do_not_stop_delivery() {
        let sub = subscriber();
        let reached = Arc::new(StdMutex::new(false));

        let _bad = sub.on(Channel::CameraStatus, |_| Err("boom".into()));
        let _panics = sub.on(Channel::CameraStatus, |_| panic!("listener bug"));
        let _good = {
            let reached = reached.clone();
            sub.on(Channel::CameraStatus, move |_| {
                *reached.lock().unwrap() = true;
                Ok(())
            })
        };

        assert_eq!(sub.dispatch(&camera("offline")), 1);
        assert!(*reached.lock().unwrap());
    }

    #[test]
    fn dropping_or_unsubscribing_removes_listener() {
        let sub = subscriber();
        let a = sub.on(Channel::Alert, |_| Ok(()));
        let b = sub.on(Channel::Alert, |_| Ok(()));
        assert_eq!(sub.listener_count(Channel::Alert), 2);

        a.unsubscribe();
        assert_eq!(sub.listener_count(Channel::Alert), 1);
        drop(b);
        assert_eq!(sub.listener_count(Channel::Alert), 0);

        sub.on(Channel::Alert, |_| Ok(())).detach();
        assert_eq!(sub.listener_count(Channel::Alert), 1);
        assert_eq!(listener_summary(&sub).get(&Channel::Alert), Some(&1));
    }

    #[test]
    fn other_channels_are_not_delivered() {
        let sub = subscriber();
        let _s = sub.on(Channel::MotionDetected, |_| Ok(()));
        assert_eq!(sub.dispatch(&camera("online")), 0);
    }

    #[test]
    fn send_while_disconnected_is_dropped() {
        let sub = subscriber();
        assert!(!sub.send(&RealtimeMessage::Ping));
        assert!(!sub.ping());
    }

    #[tokio::test]
    async fn disconnect_clears_listeners_and_state() {
        let sub = subscriber();
        sub.on(Channel::Event, |_| Ok(())).detach();
        assert!(sub.connect(LifecycleHooks::default()));
        assert!(!sub.connect(LifecycleHooks::default()));

        sub.disconnect();
        assert_eq!(sub.listener_count(Channel::Event), 0);
        assert_eq!(*sub.state().borrow(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn unreachable_relay_ends_disconnected_and_can_reconnect() {
        let sub = subscriber();
        assert!(sub.connect(LifecycleHooks::default()));

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let finished = sub
                    .lock_session()
                    .as_ref()
                    .is_some_and(|s| s.driver.is_finished());
                if finished {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(*sub.state().borrow(), ConnectionState::Disconnected);
        assert!(!sub.is_connected());
        assert!(sub.connect(LifecycleHooks::default()));
        sub.disconnect();
    }
}
