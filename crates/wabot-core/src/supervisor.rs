//! Per-session supervision: connect, dispatch, reconnect.
//!
//! One supervisor owns one session identifier for its full lifetime. The
//! restart path is an explicit loop with bounded exponential backoff: a
//! close-with-error keeps the identifier alive through a fresh connect, a
//! logout or an exhausted reconnect budget ends it.

use std::{sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::{
    dispatch::{Dispatcher, SessionExit},
    domain::SessionId,
    ports::{ConnectOptions, Session, WaTransport},
    reply::{ReplyEngine, ReplyMode, TypingDelays},
    retry::RetryCounterCache,
    store::InMemoryStore,
    Error, Result,
};

/// Reconnect policy: `initial * 2^(attempt-1)`, capped at `max`, at most
/// `max_attempts` consecutive failures before giving up. The attempt counter
/// resets once a connection reaches `Open`.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
            max_attempts: 10,
        }
    }
}

impl BackoffPolicy {
    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let ms = (self.initial.as_millis() as u64).saturating_mul(1u64 << shift);
        Duration::from_millis(ms).min(self.max)
    }
}

/// Per-session behavior knobs, fixed for the supervisor's lifetime.
#[derive(Clone, Debug)]
pub struct SessionOptions {
    pub session: SessionId,
    pub auto_reply: bool,
    pub reply_mode: ReplyMode,
    pub typing: TypingDelays,
    pub use_pairing_code: bool,
    pub mobile: bool,
}

pub struct Supervisor {
    transport: Arc<dyn WaTransport>,
    retry_counters: RetryCounterCache,
    store: Option<Arc<InMemoryStore>>,
    backoff: BackoffPolicy,
    opts: SessionOptions,
}

impl Supervisor {
    pub fn new(
        transport: Arc<dyn WaTransport>,
        retry_counters: RetryCounterCache,
        store: Option<Arc<InMemoryStore>>,
        backoff: BackoffPolicy,
        opts: SessionOptions,
    ) -> Self {
        Self {
            transport,
            retry_counters,
            store,
            backoff,
            opts,
        }
    }

    /// Run the session until logout, reconnect exhaustion, or a startup
    /// failure. The very first connect failure propagates directly; there
    /// is nothing to restart yet.
    pub async fn run(&self) -> Result<()> {
        let mut attempts: u32 = 0;
        let mut first_connect = true;

        loop {
            let session = match self.connect_once().await {
                Ok(session) => session,
                Err(e) if first_connect => return Err(e),
                Err(e) => {
                    warn!(session = %self.opts.session, error = %e, "reconnect failed");
                    self.pause_or_give_up(&mut attempts, false).await?;
                    continue;
                }
            };
            first_connect = false;

            let Session {
                socket,
                events,
                save_creds,
            } = session;

            let reply = ReplyEngine::new(
                Arc::clone(&socket),
                self.opts.typing,
                self.opts.reply_mode,
            );
            let dispatcher = Dispatcher::new(
                self.opts.session.clone(),
                socket,
                save_creds,
                reply,
                self.store.clone(),
                self.opts.auto_reply,
            );

            let report = dispatcher.run(events).await?;
            match report.exit {
                SessionExit::Logout => {
                    info!(session = %self.opts.session, "logged out, not reconnecting");
                    return Ok(());
                }
                SessionExit::Restart => {
                    self.pause_or_give_up(&mut attempts, report.reached_open)
                        .await?;
                }
            }
        }
    }

    async fn connect_once(&self) -> Result<Session> {
        let version = self.transport.fetch_latest_version().await?;
        info!(session = %self.opts.session, version = %version, "using WA protocol version");

        self.transport
            .connect(ConnectOptions {
                session: self.opts.session.clone(),
                version,
                retry_counters: self.retry_counters.clone(),
                generate_link_previews: true,
                use_pairing_code: self.opts.use_pairing_code,
                mobile: self.opts.mobile,
            })
            .await
    }

    /// Account for one failed run and sleep before the next attempt, or give
    /// up once the budget is exhausted. `reached_open` resets the budget: the
    /// failures were not consecutive connect misses.
    async fn pause_or_give_up(&self, attempts: &mut u32, reached_open: bool) -> Result<()> {
        if reached_open {
            *attempts = 0;
        }
        *attempts += 1;

        if *attempts > self.backoff.max_attempts {
            error!(
                session = %self.opts.session,
                attempts = *attempts - 1,
                "reconnect attempts exhausted, giving up"
            );
            return Err(Error::Transport(format!(
                "session {}: reconnect attempts exhausted after {}",
                self.opts.session,
                *attempts - 1
            )));
        }

        let delay = self.backoff.delay(*attempts);
        info!(
            session = %self.opts.session,
            attempt = *attempts,
            delay_ms = delay.as_millis() as u64,
            "reconnecting after delay"
        );
        sleep(delay).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ConnectionState, ConnectionUpdate, Event};
    use crate::testutil::ScriptedTransport;

    fn fast_backoff(max_attempts: u32) -> BackoffPolicy {
        BackoffPolicy {
            initial: Duration::from_millis(1),
            max: Duration::from_millis(2),
            max_attempts,
        }
    }

    fn opts(session: &str) -> SessionOptions {
        SessionOptions {
            session: SessionId::new(session),
            auto_reply: true,
            reply_mode: ReplyMode::Greeting,
            typing: TypingDelays {
                subscribe_pause: Duration::ZERO,
                composing_pause: Duration::ZERO,
            },
            use_pairing_code: false,
            mobile: false,
        }
    }

    fn open() -> Event {
        Event::Connection(ConnectionUpdate {
            state: Some(ConnectionState::Open),
            error: None,
            qr: None,
        })
    }

    fn close_with_error() -> Event {
        Event::Connection(ConnectionUpdate {
            state: Some(ConnectionState::Close),
            error: Some("stream errored".to_string()),
            qr: None,
        })
    }

    fn close_logout() -> Event {
        Event::Connection(ConnectionUpdate {
            state: Some(ConnectionState::Close),
            error: None,
            qr: None,
        })
    }

    fn supervisor(transport: Arc<ScriptedTransport>, backoff: BackoffPolicy) -> Supervisor {
        Supervisor::new(
            transport,
            RetryCounterCache::new(),
            None,
            backoff,
            opts("s1"),
        )
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = BackoffPolicy {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
            max_attempts: 10,
        };
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(2), Duration::from_secs(2));
        assert_eq!(policy.delay(3), Duration::from_secs(4));
        assert_eq!(policy.delay(6), Duration::from_secs(30)); // capped at 32 -> 30
        assert_eq!(policy.delay(40), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn error_close_reconnects_exactly_once_more() {
        let transport = ScriptedTransport::new(vec![
            vec![open(), close_with_error()],
            vec![close_logout()],
        ]);

        supervisor(transport.clone(), fast_backoff(5))
            .run()
            .await
            .unwrap();

        assert_eq!(transport.connect_count(), 2);

        // The replaced handle receives no further deliveries.
        let senders = transport.senders.lock().unwrap();
        assert!(senders[0].try_send(close_logout()).is_err());
    }

    #[tokio::test]
    async fn logout_close_never_reconnects() {
        let transport = ScriptedTransport::new(vec![vec![open(), close_logout()]]);

        supervisor(transport.clone(), fast_backoff(5))
            .run()
            .await
            .unwrap();

        assert_eq!(transport.connect_count(), 1);
    }

    #[tokio::test]
    async fn gives_up_after_the_reconnect_budget() {
        // Never reaches Open, always closes with an error.
        let transport = ScriptedTransport::new(vec![
            vec![close_with_error()],
            vec![close_with_error()],
            vec![close_with_error()],
        ]);

        let err = supervisor(transport.clone(), fast_backoff(2))
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));

        // Initial connect + two budgeted retries.
        assert_eq!(transport.connect_count(), 3);
    }

    #[tokio::test]
    async fn reaching_open_resets_the_reconnect_budget() {
        // Budget of one, but every run reaches Open first, so the counter
        // never accumulates and all four scripts get played.
        let transport = ScriptedTransport::new(vec![
            vec![open(), close_with_error()],
            vec![open(), close_with_error()],
            vec![open(), close_with_error()],
            vec![open(), close_logout()],
        ]);

        supervisor(transport.clone(), fast_backoff(1))
            .run()
            .await
            .unwrap();

        assert_eq!(transport.connect_count(), 4);
    }

    #[tokio::test]
    async fn startup_connect_failure_propagates() {
        let transport = ScriptedTransport::new(vec![]);

        let err = supervisor(transport.clone(), fast_backoff(5))
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(transport.connect_count(), 1);
    }
}
