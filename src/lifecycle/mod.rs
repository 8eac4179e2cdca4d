//! Drives service registration to a single terminal outcome.
//!
//! The service facility has no synchronous "installed" answer: it reports
//! progress as [`InstallationEvent`]s. [`drive`] attaches to that stream,
//! issues requests in response to events and stops at the first terminal
//! state, ignoring anything emitted afterwards.

#[cfg(windows)]
pub mod scm;

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{Instant, timeout_at};

use crate::error::InstallError;
use crate::helpers::config::ServiceDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Install,
    AlreadyInstalled,
    Start,
    Error,
    InvalidInstallation,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Install => "install",
            EventKind::AlreadyInstalled => "alreadyinstalled",
            EventKind::Start => "start",
            EventKind::Error => "error",
            EventKind::InvalidInstallation => "invalidinstallation",
        };
        f.write_str(name)
    }
}

/// One notification from the service facility. `args` carries diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationEvent {
    pub kind: EventKind,
    pub args: Vec<String>,
}

impl InstallationEvent {
    pub fn new(kind: EventKind) -> Self {
        Self { kind, args: Vec::new() }
    }

    pub fn with_args<I, S>(kind: EventKind, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind,
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::with_args(EventKind::Error, [message])
    }

    pub fn invalid_installation(message: impl Into<String>) -> Self {
        Self::with_args(EventKind::InvalidInstallation, [message])
    }

    fn diagnostic(&self) -> String {
        self.args.join(" ")
    }
}

/// Requests the orchestrator sends to the facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Install,
    Start,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    NotRegistered,
    Registering,
    Starting,
    Started,
    Errored(String),
    InvalidInstallation(String),
}

impl LifecycleState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LifecycleState::Started
                | LifecycleState::Errored(_)
                | LifecycleState::InvalidInstallation(_)
        )
    }

    /// Leave `NotRegistered` by asking for registration.
    pub fn begin(self) -> (LifecycleState, Option<Request>) {
        match self {
            LifecycleState::NotRegistered => (LifecycleState::Registering, Some(Request::Install)),
            other => (other, None),
        }
    }

    pub fn on_event(self, event: &InstallationEvent) -> (LifecycleState, Option<Request>) {
        use EventKind::*;
        use LifecycleState::*;

        match (self, event.kind) {
            (state, _) if state.is_terminal() => (state, None),
            (Registering, Install | AlreadyInstalled) => (Starting, Some(Request::Start)),
            (Registering | Starting, Start) => (Started, None),
            (Registering | Starting, Error) => (Errored(event.diagnostic()), None),
            (Registering | Starting, EventKind::InvalidInstallation) => {
                (LifecycleState::InvalidInstallation(event.diagnostic()), None)
            }
            (state, _) => (state, None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Started,
    Errored(String),
    InvalidInstallation(String),
}

impl Outcome {
    fn from_terminal(state: LifecycleState) -> Option<Self> {
        match state {
            LifecycleState::Started => Some(Outcome::Started),
            LifecycleState::Errored(diag) => Some(Outcome::Errored(diag)),
            LifecycleState::InvalidInstallation(diag) => Some(Outcome::InvalidInstallation(diag)),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<(), InstallError> {
        match self {
            Outcome::Started => Ok(()),
            Outcome::Errored(diag) => Err(InstallError::Registration(diag)),
            Outcome::InvalidInstallation(diag) => Err(InstallError::InvalidInstallation(diag)),
        }
    }
}

/// The OS mechanism that registers and starts services.
///
/// Requests return immediately; results arrive as events on the receiver
/// handed out by [`ServiceFacility::subscribe`], which may be fed from within
/// the request itself.
pub trait ServiceFacility {
    fn subscribe(&mut self) -> UnboundedReceiver<InstallationEvent>;
    fn install(&mut self, definition: &ServiceDefinition);
    fn start(&mut self, definition: &ServiceDefinition);
}

fn issue<F: ServiceFacility + ?Sized>(facility: &mut F, definition: &ServiceDefinition, request: Request) {
    log::debug!("requesting {:?} for service {}", request, definition.name);
    match request {
        Request::Install => facility.install(definition),
        Request::Start => facility.start(definition),
    }
}

/// Register and start `definition`, waiting at most `wait` overall.
///
/// Error and invalid-installation events end the run with the matching
/// [`Outcome`] rather than an `Err`; only a silent or vanished facility does.
pub async fn drive<F: ServiceFacility + ?Sized>(
    facility: &mut F,
    definition: &ServiceDefinition,
    wait: Option<Duration>,
) -> Result<Outcome, InstallError> {
    // a wait too long to represent as an instant never expires
    let deadline = wait.and_then(|wait| Some((Instant::now().checked_add(wait)?, wait)));
    let mut events = facility.subscribe();

    // listener is attached; let anything already scheduled run before registering
    tokio::task::yield_now().await;

    let (mut state, request) = LifecycleState::NotRegistered.begin();
    if let Some(request) = request {
        issue(facility, definition, request);
    }

    loop {
        let received = match deadline {
            Some((at, wait)) => timeout_at(at, events.recv())
                .await
                .map_err(|_| InstallError::Timeout(wait))?,
            None => events.recv().await,
        };
        let event = received.ok_or(InstallError::EventStreamClosed)?;
        log::debug!("service facility reported {} {:?}", event.kind, event.args);

        let (next, request) = state.on_event(&event);
        state = next;
        if let Some(request) = request {
            issue(facility, definition, request);
        }

        if state.is_terminal() {
            break;
        }
    }

    match &state {
        LifecycleState::Started => log::info!("Service {} started", definition.name),
        LifecycleState::Errored(diag) => log::error!("service facility reports error {}", diag),
        LifecycleState::InvalidInstallation(diag) => {
            log::error!("service facility reports invalid installation {}", diag)
        }
        _ => {}
    }

    Outcome::from_terminal(state).ok_or(InstallError::EventStreamClosed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};

    use crate::helpers::config::LogMode;

    /// Replies to each request with the next scripted batch of events.
    struct Scripted {
        replies: Vec<Vec<InstallationEvent>>,
        requests: Vec<Request>,
        tx: Option<UnboundedSender<InstallationEvent>>,
    }

    impl Scripted {
        fn new(replies: Vec<Vec<InstallationEvent>>) -> Self {
            Self { replies, requests: Vec::new(), tx: None }
        }

        fn reply(&mut self, request: Request) {
            self.requests.push(request);
            if self.replies.is_empty() {
                return;
            }
            let batch = self.replies.remove(0);
            if let Some(tx) = &self.tx {
                for event in batch {
                    let _ = tx.send(event);
                }
            }
        }
    }

    impl ServiceFacility for Scripted {
        fn subscribe(&mut self) -> UnboundedReceiver<InstallationEvent> {
            let (tx, rx) = unbounded_channel();
            self.tx = Some(tx);
            rx
        }

        fn install(&mut self, _: &ServiceDefinition) {
            self.reply(Request::Install);
        }

        fn start(&mut self, _: &ServiceDefinition) {
            self.reply(Request::Start);
        }
    }

    fn definition() -> ServiceDefinition {
        ServiceDefinition {
            name: "PM2".into(),
            description: None,
            script: PathBuf::from("pm2-service-host.exe"),
            stop_parent_first: true,
            logging: LogMode::RollByTime { pattern: "yyyyMMdd".into() },
            log_path: PathBuf::from("logs"),
            env: Vec::new(),
        }
    }

    fn ev(kind: EventKind) -> InstallationEvent {
        InstallationEvent::new(kind)
    }

    #[tokio::test]
    async fn install_then_start_reaches_started() {
        let mut facility = Scripted::new(vec![vec![ev(EventKind::Install)], vec![ev(EventKind::Start)]]);
        let outcome = drive(&mut facility, &definition(), None).await.unwrap();
        assert_eq!(outcome, Outcome::Started);
        assert_eq!(facility.requests, [Request::Install, Request::Start]);
    }

    #[tokio::test]
    async fn already_installed_converges_like_install() {
        let mut facility =
            Scripted::new(vec![vec![ev(EventKind::AlreadyInstalled)], vec![ev(EventKind::Start)]]);
        let outcome = drive(&mut facility, &definition(), None).await.unwrap();
        assert_eq!(outcome, Outcome::Started);
        assert_eq!(facility.requests, [Request::Install, Request::Start]);
    }

    #[tokio::test]
    async fn error_ends_without_further_requests() {
        let mut facility = Scripted::new(vec![vec![InstallationEvent::error("access denied")]]);
        let outcome = drive(&mut facility, &definition(), None).await.unwrap();
        assert_eq!(outcome, Outcome::Errored("access denied".into()));
        assert_eq!(facility.requests, [Request::Install]);
    }

    #[tokio::test]
    async fn invalid_installation_is_terminal() {
        let mut facility =
            Scripted::new(vec![vec![InstallationEvent::invalid_installation("missing pm2.exe")]]);
        let outcome = drive(&mut facility, &definition(), None).await.unwrap();
        assert_eq!(outcome, Outcome::InvalidInstallation("missing pm2.exe".into()));
        assert_eq!(facility.requests, [Request::Install]);
    }

    #[tokio::test]
    async fn nothing_is_acted_on_after_a_terminal_event() {
        let mut facility = Scripted::new(vec![vec![
            ev(EventKind::Install),
            ev(EventKind::AlreadyInstalled),
        ], vec![
            ev(EventKind::Start),
            ev(EventKind::Install),
            InstallationEvent::error("late"),
        ]]);
        let outcome = drive(&mut facility, &definition(), None).await.unwrap();
        assert_eq!(outcome, Outcome::Started);
        assert_eq!(facility.requests, [Request::Install, Request::Start]);
    }

    #[tokio::test]
    async fn error_while_starting_is_reported() {
        let mut facility = Scripted::new(vec![
            vec![ev(EventKind::Install)],
            vec![InstallationEvent::with_args(EventKind::Error, ["start", "failed"])],
        ]);
        let outcome = drive(&mut facility, &definition(), None).await.unwrap();
        assert_eq!(outcome, Outcome::Errored("start failed".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_facility_times_out() {
        let mut facility = Scripted::new(vec![vec![ev(EventKind::Install)]]);
        let wait = Duration::from_secs(30);
        let result = drive(&mut facility, &definition(), Some(wait)).await;
        assert!(matches!(result, Err(InstallError::Timeout(d)) if d == wait));
        assert_eq!(facility.requests, [Request::Install, Request::Start]);
    }

    #[tokio::test]
    async fn unrepresentable_wait_means_no_deadline() {
        let mut facility = Scripted::new(vec![vec![ev(EventKind::Install)], vec![ev(EventKind::Start)]]);
        let wait = Some(Duration::from_secs(u64::MAX));
        let outcome = drive(&mut facility, &definition(), wait).await.unwrap();
        assert_eq!(outcome, Outcome::Started);
    }

    #[tokio::test]
    async fn dropped_sender_is_an_error() {
        struct Vanishing;
        impl ServiceFacility for Vanishing {
            fn subscribe(&mut self) -> UnboundedReceiver<InstallationEvent> {
                unbounded_channel().1
            }
            fn install(&mut self, _: &ServiceDefinition) {}
            fn start(&mut self, _: &ServiceDefinition) {}
        }

        let result = drive(&mut Vanishing, &definition(), None).await;
        assert!(matches!(result, Err(InstallError::EventStreamClosed)));
    }

    #[test]
    fn start_before_install_event_still_succeeds() {
        let (state, _) = LifecycleState::NotRegistered.begin();
        let (state, request) = state.on_event(&ev(EventKind::Start));
        assert_eq!(state, LifecycleState::Started);
        assert_eq!(request, None);
    }

    #[test]
    fn outcomes_map_to_results() {
        assert!(Outcome::Started.into_result().is_ok());
        assert!(matches!(
            Outcome::Errored("x".into()).into_result(),
            Err(InstallError::Registration(_))
        ));
        assert!(matches!(
            Outcome::InvalidInstallation("y".into()).into_result(),
            Err(InstallError::InvalidInstallation(_))
        ));
    }
}
