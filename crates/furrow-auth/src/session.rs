//! Session manager: the single source of truth for who is signed in.
//!
//! All session mutations flow through here: resolved sign-in/sign-up/sign-out
//! calls and identity provider notifications. State is one value published
//! through a `watch` channel and replaced as a whole, never patched in place
//! where a reader could see it.
//!
//! Notifications always win. Every applied notification bumps an epoch; an
//! auth call remembers the epoch it started at and only writes the user back
//! if no notification landed in between.

use crate::auth_fsm::{SessionMachine, SessionMachineInput, SessionPhase};
use crate::{AuthError, AuthResult, IdentityProvider, SessionChanges, SessionUser};
use furrow_storage::SnapshotManager;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Observable session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Signed-in user, if any.
    pub user: Option<SessionUser>,
    /// True while an auth call is in flight or before the first notification.
    pub loading: bool,
    /// Message of the last failed auth call.
    pub error: Option<String>,
    pub phase: SessionPhase,
}

impl SessionState {
    fn initial(user: Option<SessionUser>) -> Self {
        Self {
            user,
            loading: true,
            error: None,
            phase: SessionPhase::Uninitialized,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

/// Owns the session and mediates every sign-in and sign-out.
///
/// Share it through `Arc`; [`SessionManager::initialize`] needs the `Arc` to
/// hand the notification listener a weak reference.
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    snapshots: Option<Arc<SnapshotManager>>,
    state_tx: watch::Sender<SessionState>,
    fsm: Mutex<SessionMachine>,
    /// Count of applied provider notifications.
    notification_epoch: AtomicU64,
    /// Serialises auth calls so at most one is in flight.
    op_guard: tokio::sync::Mutex<()>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    /// Create a session manager without local persistence.
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self::build(provider, None, None)
    }

    /// Create a session manager that persists the user snapshot.
    ///
    /// A previously saved user is shown immediately while the phase stays
    /// `Uninitialized` until the provider confirms or replaces it.
    pub fn with_persistence(
        provider: Arc<dyn IdentityProvider>,
        snapshots: Arc<SnapshotManager>,
    ) -> Self {
        let restored = match snapshots.load_snapshot::<SessionUser>() {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable session snapshot");
                None
            }
        };
        if let Some(user) = &restored {
            debug!(user_id = %user.user_id, "Restored session snapshot");
        }
        Self::build(provider, Some(snapshots), restored)
    }

    fn build(
        provider: Arc<dyn IdentityProvider>,
        snapshots: Option<Arc<SnapshotManager>>,
        restored: Option<SessionUser>,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::initial(restored));
        Self {
            provider,
            snapshots,
            state_tx,
            fsm: Mutex::new(SessionMachine::new()),
            notification_epoch: AtomicU64::new(0),
            op_guard: tokio::sync::Mutex::new(()),
            listener: Mutex::new(None),
        }
    }

    // ==========================================
    // Reads
    // ==========================================

    /// Snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.state_tx.borrow().clone()
    }

    pub fn current_user(&self) -> Option<SessionUser> {
        self.state_tx.borrow().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state_tx.borrow().is_authenticated()
    }

    pub fn phase(&self) -> SessionPhase {
        self.state_tx.borrow().phase
    }

    /// Watch the state for changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Wait until the first resolved call or notification has been applied.
    pub async fn wait_until_settled(&self) -> SessionState {
        let mut rx = self.subscribe();
        let settled = rx
            .wait_for(|state| state.phase.is_settled())
            .await
            .map(|state| state.clone());
        settled.unwrap_or_else(|_| self.state())
    }

    // ==========================================
    // Auth operations
    // ==========================================

    /// Sign in with email and password.
    ///
    /// Returns [`AuthError::Superseded`] when a provider notification lands
    /// while the call is in flight; the notified state is kept.
    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<SessionUser> {
        self.run_sign_in("sign_in", self.provider.sign_in(email, password))
            .await
    }

    /// Create an account and sign it in.
    pub async fn sign_up(&self, email: &str, password: &str) -> AuthResult<SessionUser> {
        self.run_sign_in("sign_up", self.provider.sign_up(email, password))
            .await
    }

    /// Interactive Google sign-in.
    pub async fn sign_in_with_google(&self) -> AuthResult<SessionUser> {
        self.run_sign_in("sign_in_with_google", self.provider.sign_in_with_google())
            .await
    }

    /// Sign out. The user is only cleared once the provider confirms.
    pub async fn sign_out(&self) -> AuthResult<()> {
        let _guard = self.op_guard.lock().await;
        let started_epoch = self.notification_epoch.load(Ordering::SeqCst);
        self.begin_operation();

        match self.provider.sign_out().await {
            Ok(()) => {
                self.resolve_operation(started_epoch, SessionMachineInput::SignedOut, None);
                info!("Signed out");
                Ok(())
            }
            Err(err) => {
                self.fail_operation("sign_out", &err);
                Err(err)
            }
        }
    }

    /// Clear the stored error message.
    pub fn clear_error(&self) {
        self.state_tx.send_if_modified(|state| state.error.take().is_some());
    }

    async fn run_sign_in<F>(&self, operation: &'static str, call: F) -> AuthResult<SessionUser>
    where
        F: Future<Output = AuthResult<crate::ProviderUser>>,
    {
        let _guard = self.op_guard.lock().await;
        let started_epoch = self.notification_epoch.load(Ordering::SeqCst);
        self.begin_operation();

        match call.await {
            Ok(provider_user) => {
                let user = SessionUser::from_provider(&provider_user);
                let applied = self.resolve_operation(
                    started_epoch,
                    SessionMachineInput::SignedIn,
                    Some(user.clone()),
                );
                if !applied {
                    info!(operation, "Session changed during call, keeping notified state");
                    return Err(AuthError::Superseded);
                }
                info!(operation, user_id = %user.user_id, "Sign-in resolved");
                Ok(user)
            }
            Err(err) => {
                self.fail_operation(operation, &err);
                Err(err)
            }
        }
    }

    // ==========================================
    // Lifecycle
    // ==========================================

    /// Subscribe to provider notifications. Calling it again while subscribed
    /// does nothing.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn initialize(self: &Arc<Self>) {
        let mut listener = self.listener.lock();
        if listener.is_some() {
            debug!("Session listener already running");
            return;
        }

        let changes = self.provider.on_session_changed();
        let manager = Arc::downgrade(self);
        *listener = Some(tokio::spawn(Self::listen(manager, changes)));
        info!("Session listener started");
    }

    /// Release the provider subscription. `initialize` may be called again.
    pub fn teardown(&self) {
        if let Some(handle) = self.listener.lock().take() {
            handle.abort();
            info!("Session listener stopped");
        }
    }

    async fn listen(manager: Weak<Self>, mut changes: SessionChanges) {
        match manager.upgrade() {
            Some(manager) => manager.replay_persisted_session().await,
            None => return,
        }

        loop {
            let change = changes.recv().await;
            let Some(manager) = manager.upgrade() else {
                break;
            };
            match change {
                Ok(user) => {
                    let user = user.as_ref().map(SessionUser::from_provider);
                    manager.apply_notification(user, None);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Session listener lagged behind provider");
                }
                Err(RecvError::Closed) => {
                    debug!("Identity provider closed its notification stream");
                    break;
                }
            }
        }
    }

    /// Ask the provider for its persisted session and treat the answer as a
    /// notification, unless a live notification already arrived.
    async fn replay_persisted_session(&self) {
        let started_epoch = self.notification_epoch.load(Ordering::SeqCst);

        let user = match self.provider.restore_session().await {
            Ok(user) => user.as_ref().map(SessionUser::from_provider),
            Err(err) if err.is_transient() => {
                warn!(error = %err, "Identity provider unreachable, keeping restored session");
                self.current_user()
            }
            Err(err) => {
                warn!(code = err.code(), error = %err, "Could not restore provider session");
                None
            }
        };

        if !self.apply_notification(user, Some(started_epoch)) {
            debug!("Live notification arrived first, skipping replay");
        }
    }

    // ==========================================
    // State updates
    // ==========================================

    fn transition(&self, input: &SessionMachineInput) -> AuthResult<SessionPhase> {
        let mut fsm = self.fsm.lock();
        let old_phase = SessionPhase::from(fsm.state());

        fsm.consume(input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                fsm.state()
            ))
        })?;

        let new_phase = SessionPhase::from(fsm.state());
        if old_phase != new_phase {
            debug!(old_phase = ?old_phase, new_phase = ?new_phase, "Session phase transition");
        }
        Ok(new_phase)
    }

    fn begin_operation(&self) {
        self.state_tx.send_if_modified(|state| {
            let changed = !state.loading || state.error.is_some();
            state.loading = true;
            state.error = None;
            changed
        });
    }

    fn fail_operation(&self, operation: &'static str, err: &AuthError) {
        warn!(operation, code = err.code(), error = %err, "Auth call failed");
        let message = err.to_string();
        self.state_tx.send_modify(|state| {
            state.loading = false;
            state.error = Some(message);
        });
    }

    /// Settle a successful auth call. Returns false when a notification
    /// arrived since `started_epoch`, in which case the user is left alone.
    fn resolve_operation(
        &self,
        started_epoch: u64,
        input: SessionMachineInput,
        user: Option<SessionUser>,
    ) -> bool {
        let mut applied = false;
        self.state_tx.send_modify(|state| {
            state.loading = false;
            state.error = None;
            if self.notification_epoch.load(Ordering::SeqCst) != started_epoch {
                return;
            }
            match self.transition(&input) {
                Ok(phase) => {
                    state.phase = phase;
                    state.user = user;
                    applied = true;
                }
                Err(e) => warn!(error = %e, "Dropping auth result"),
            }
        });
        if applied {
            self.persist_snapshot();
        }
        applied
    }

    /// Overwrite the user from a provider notification. With `expected_epoch`
    /// set, the write only happens if no other notification got there first.
    fn apply_notification(&self, user: Option<SessionUser>, expected_epoch: Option<u64>) -> bool {
        let input = if user.is_some() {
            SessionMachineInput::UserNotified
        } else {
            SessionMachineInput::AnonymousNotified
        };

        let applied = self.state_tx.send_if_modified(|state| {
            if let Some(expected) = expected_epoch {
                if self.notification_epoch.load(Ordering::SeqCst) != expected {
                    return false;
                }
            }
            self.notification_epoch.fetch_add(1, Ordering::SeqCst);
            match self.transition(&input) {
                Ok(phase) => state.phase = phase,
                Err(e) => warn!(error = %e, "Session FSM rejected notification"),
            }
            state.user = user;
            state.loading = false;
            true
        });

        if applied {
            let state = self.state();
            info!(
                user_id = state.user.as_ref().map(|u| u.user_id.as_str()).unwrap_or("-"),
                phase = ?state.phase,
                "Session notification applied"
            );
            self.persist_snapshot();
        }
        applied
    }

    fn persist_snapshot(&self) {
        let Some(snapshots) = &self.snapshots else {
            return;
        };
        let user = self.current_user();
        if let Err(e) = snapshots.save_snapshot(user.as_ref()) {
            warn!(error = %e, "Failed to persist session snapshot");
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.get_mut().take() {
            handle.abort();
        }
    }
}
