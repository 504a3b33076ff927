//! # Call SID Poller
//!
//! Client side of the call relay. Queries `GET /api/call-sid` on a fixed
//! interval (2 seconds by default), keeps the latest call identifier for UI
//! consumers, and logs every transition it sees.
//!
//! ```rust,no_run
//! use callrelay_core::config::PollerConfig;
//! use callrelay_poller::CallSidPoller;
//!
//! # async fn example() -> callrelay_poller::Result<()> {
//! let poller = CallSidPoller::from_config(&PollerConfig::default())?;
//! let mut updates = poller.subscribe();
//! while updates.changed().await.is_ok() {
//!     println!("active call: {:?}", *updates.borrow());
//! }
//! poller.stop();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod poller;
pub mod source;

pub use error::{PollerError, Result};
pub use poller::{CallSidPoller, PollerStats, Transition};
pub use source::{HttpStatusSource, StatusSource};
