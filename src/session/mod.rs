//! Client-side session lifecycle: persisted store, state channel,
//! lifecycle controller and sign-out coordinator.

pub mod lifecycle;
pub mod lock;
pub mod sign_out;
pub mod state;
pub mod store;

pub use lifecycle::{RefreshOutcome, SessionLifecycleController, SessionLifecycleDeps, StartOutcome};
pub use lock::{AuthAction, AuthActionLock, AuthActionPermit};
pub use sign_out::{SignOutCoordinator, SignedOut};
pub use state::{AuthState, AuthStateObserver, LifecyclePhase};
pub use store::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore, SessionStore, StoreError};
