//! OTP engine: sub-modules.

pub mod types;
pub mod base32;
pub mod core;
pub mod uri;
pub mod persist;
pub mod storage;
pub mod scheduler;
pub mod scan;
pub mod export;
pub mod service;

// Re-export top-level items for convenience.
pub use types::*;
pub use persist::{CredentialPersistence, MemoryPersistence};
pub use scheduler::{Clock, FrameSink, ManualClock, RefreshScheduler, SchedulerHandle, SystemClock};
pub use service::{OtpService, OtpServiceState};
