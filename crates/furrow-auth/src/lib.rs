//! Authentication and session state for Furrow clients.
//!
//! This crate provides:
//! - An explicit FSM for the session phase
//! - `SessionManager`, the single source of truth for the signed-in user
//! - The `IdentityProvider` contract and a Supabase Auth implementation
//! - Browser-based Google sign-in over a loopback PKCE callback

mod auth_fsm;
mod error;
mod oauth;
mod provider;
mod session;
mod supabase;
mod user;

pub use auth_fsm::session_machine;
pub use auth_fsm::{
    RefreshConfig, SessionMachine, SessionMachineInput, SessionMachineState, SessionPhase,
};
pub use error::{AuthError, AuthResult};
pub use oauth::{authorize_url, BoundCallback, OAuthCallbackServer, PkcePair};
pub use provider::{AccessTokenSource, IdentityProvider, ProviderUser, SessionChanges};
pub use session::{SessionManager, SessionState};
pub use supabase::SupabaseAuthClient;
pub use user::SessionUser;
