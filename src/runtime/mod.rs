//! Runtime adapters.

#[cfg(feature = "tokio-runtime")]
pub mod timeout;
#[cfg(feature = "tokio-runtime")]
pub mod tokio_spawner;

#[cfg(feature = "tokio-runtime")]
pub use timeout::with_timeout;
#[cfg(feature = "tokio-runtime")]
pub use tokio_spawner::TokioSpawner;
