//! Interactive terminal session driven by the guard
//!
//! Each stdin line is a key press while the session is open and a PIN
//! attempt while it is locked. Lines starting with `:` are commands.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use pinlock_core::lockout::describe;
use pinlock_core::{ActivityBus, GuardProvider, InputEvent, SessionGuard, UnlockAttempts};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use zeroize::Zeroizing;

/// One line of terminal input
#[derive(Debug, PartialEq, Eq)]
pub enum SessionInput {
    /// `:lock`
    Lock,
    /// `:logout`
    Logout,
    /// `:login`
    Login,
    /// `:status`
    Status,
    /// `:quit`
    Quit,
    /// Unknown `:` command
    Unknown(String),
    /// Any other line
    Text(String),
}

impl SessionInput {
    /// Classify a line of input
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed {
            ":lock" => Self::Lock,
            ":logout" => Self::Logout,
            ":login" => Self::Login,
            ":status" => Self::Status,
            ":quit" | ":q" => Self::Quit,
            cmd if cmd.starts_with(':') => Self::Unknown(cmd.to_string()),
            text => Self::Text(text.to_string()),
        }
    }
}

/// What the loop should do after handling a line
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Keep reading
    Continue(Option<String>),
    /// Leave the session
    Quit,
}

/// Session state shared by the input handler
pub struct Session {
    guard: Arc<SessionGuard>,
    bus: Arc<ActivityBus>,
    auth_tx: watch::Sender<bool>,
    attempts: Option<UnlockAttempts>,
}

impl Session {
    /// Create a session; `backoff` enables the unlock cool-down
    pub fn new(
        guard: Arc<SessionGuard>,
        bus: Arc<ActivityBus>,
        auth_tx: watch::Sender<bool>,
        backoff: bool,
    ) -> Self {
        Self {
            guard,
            bus,
            auth_tx,
            attempts: backoff.then(UnlockAttempts::default),
        }
    }

    /// Handle one line of input
    pub fn handle(&mut self, input: SessionInput, now: Instant) -> Outcome {
        let message = match input {
            SessionInput::Quit => return Outcome::Quit,
            SessionInput::Lock => {
                if !self.guard.is_pin_set() {
                    Some("No PIN configured, nothing to lock".to_string())
                } else {
                    self.guard.lock_app();
                    None
                }
            }
            SessionInput::Logout => {
                self.auth_tx.send_replace(false);
                Some("Logged out, activity tracking paused".to_string())
            }
            SessionInput::Login => {
                self.auth_tx.send_replace(true);
                Some("Logged in".to_string())
            }
            SessionInput::Status => Some(format!(
                "state: {:?}, idle: {}s, timeout: {}ms",
                self.guard.state(),
                self.guard.idle_time().as_secs(),
                self.guard.inactivity_timeout()
            )),
            SessionInput::Unknown(cmd) => Some(format!("Unknown command {}", cmd)),
            SessionInput::Text(text) => {
                if self.guard.is_locked() {
                    Some(self.attempt_unlock(Zeroizing::new(text), now))
                } else {
                    self.bus.emit(InputEvent::KeyDown);
                    None
                }
            }
        };
        Outcome::Continue(message)
    }

    fn attempt_unlock(&mut self, pin: Zeroizing<String>, now: Instant) -> String {
        if let Some(remaining) = self
            .attempts
            .as_ref()
            .and_then(|attempts| attempts.remaining_lockout(now))
        {
            return format!("Too many attempts, try again in {}", describe(remaining));
        }

        if self.guard.unlock_app(&pin) {
            if let Some(attempts) = self.attempts.as_mut() {
                attempts.record_success();
            }
            return "Unlocked".to_string();
        }

        match self.attempts.as_mut().and_then(|a| a.record_failure(now)) {
            Some(cool_down) => format!("Incorrect PIN, locked for {}", describe(cool_down)),
            None => "Incorrect PIN".to_string(),
        }
    }
}

/// Mount the guard and run the interactive loop until `:quit` or EOF
pub async fn run(guard: Arc<SessionGuard>, backoff: bool) -> Result<()> {
    let bus = Arc::new(ActivityBus::new());
    let (auth_tx, auth_rx) = watch::channel(true);
    let provider = GuardProvider::mount(guard.clone(), bus.clone(), auth_rx).await?;

    if !guard.is_pin_set() {
        println!("No PIN configured; this session will never lock. Run `pinlock setup` first.");
    }
    println!(
        "Session open. Type to stay active, `:lock` to lock, `:quit` to exit. Timeout: {} ms",
        guard.inactivity_timeout()
    );

    let mut session = Session::new(guard, bus, auth_tx, backoff);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        match session.handle(SessionInput::parse(&line), Instant::now()) {
            Outcome::Quit => break,
            Outcome::Continue(Some(message)) => println!("{}", message),
            Outcome::Continue(None) => {}
        }
    }

    provider.unmount();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinlock_core::{GuardConfig, MemoryStore, NavigationHistory};
    use std::time::Duration;

    async fn session(backoff: bool) -> (Session, Arc<SessionGuard>, Arc<ActivityBus>) {
        let guard = Arc::new(SessionGuard::new(
            Arc::new(MemoryStore::new()),
            Arc::new(NavigationHistory::new()),
            GuardConfig::testing(),
        ));
        guard.hydrate().await.unwrap();
        guard.setup_pin("7412").await.unwrap();

        let bus = Arc::new(ActivityBus::new());
        let (auth_tx, _auth_rx) = watch::channel(true);
        let session = Session::new(guard.clone(), bus.clone(), auth_tx, backoff);
        (session, guard, bus)
    }

    #[test]
    fn test_parse_input() {
        assert_eq!(SessionInput::parse(":lock"), SessionInput::Lock);
        assert_eq!(SessionInput::parse("  :q "), SessionInput::Quit);
        assert_eq!(
            SessionInput::parse(":nope"),
            SessionInput::Unknown(":nope".to_string())
        );
        assert_eq!(
            SessionInput::parse("7412\n"),
            SessionInput::Text("7412".to_string())
        );
    }

    #[tokio::test]
    async fn test_lock_then_unlock() {
        let (mut session, guard, _bus) = session(false).await;
        let now = Instant::now();

        assert_eq!(session.handle(SessionInput::Lock, now), Outcome::Continue(None));
        assert!(guard.is_locked());

        assert_eq!(
            session.handle(SessionInput::Text("0000".to_string()), now),
            Outcome::Continue(Some("Incorrect PIN".to_string()))
        );
        assert_eq!(
            session.handle(SessionInput::Text("7412".to_string()), now),
            Outcome::Continue(Some("Unlocked".to_string()))
        );
        assert!(!guard.is_locked());
    }

    #[tokio::test]
    async fn test_text_counts_as_activity_when_unlocked() {
        let (mut session, _guard, bus) = session(false).await;
        let mut rx = pinlock_core::ActivitySource::subscribe(bus.as_ref());

        session.handle(SessionInput::Text("hello".to_string()), Instant::now());
        assert_eq!(rx.recv().await.unwrap(), InputEvent::KeyDown);
    }

    #[tokio::test]
    async fn test_backoff_blocks_attempts() {
        let (mut session, guard, _bus) = session(true).await;
        let now = Instant::now();
        guard.lock_app();

        for _ in 0..3 {
            session.handle(SessionInput::Text("0000".to_string()), now);
        }
        assert_eq!(
            session.handle(SessionInput::Text("0000".to_string()), now),
            Outcome::Continue(Some("Incorrect PIN, locked for 30 seconds".to_string()))
        );

        // Correct PIN is refused during the cool-down
        assert_eq!(
            session.handle(SessionInput::Text("7412".to_string()), now + Duration::from_secs(10)),
            Outcome::Continue(Some("Too many attempts, try again in 20 seconds".to_string()))
        );
        assert!(guard.is_locked());

        assert_eq!(
            session.handle(SessionInput::Text("7412".to_string()), now + Duration::from_secs(31)),
            Outcome::Continue(Some("Unlocked".to_string()))
        );
    }

    #[tokio::test]
    async fn test_quit() {
        let (mut session, _guard, _bus) = session(false).await;
        assert_eq!(session.handle(SessionInput::Quit, Instant::now()), Outcome::Quit);
    }
}
