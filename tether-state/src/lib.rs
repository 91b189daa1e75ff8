//! Tether State Management
//!
//! Persists what an apply created so the next plan can diff against it.
//!
//! - **StateFile**: every tracked resource, with a lineage and serial
//! - **StateBackend**: storage for the state file, with locking
//! - **LockInfo**: who holds the state lock and until when
//!
//! # Example
//!
//! ```ignore
//! use tether_state::{create_backend, BackendConfig};
//!
//! let backend = create_backend(&BackendConfig::local())?;
//! let lock = backend.acquire_lock("apply").await?;
//!
//! let mut state = backend.read_state().await?.unwrap_or_default();
//! // ... apply effects, upsert resources ...
//! state.increment_serial();
//! backend.write_state(&state).await?;
//!
//! backend.release_lock(&lock).await?;
//! ```

pub mod backend;
pub mod backends;
pub mod lock;
pub mod state;

pub use backend::{BackendConfig, BackendError, BackendResult, StateBackend};
pub use backends::{LocalBackend, create_backend};
pub use lock::{ExistingLock, LockInfo};
pub use state::{ResourceState, StateFile};
