//! n2p-dcim-core: Core library for moving digitized negatives off a card.
//!
//! A card reserved for negatives carries a marker file (`n2p`) at its root.
//! When such a card is mounted, its raw files are moved into a local staging
//! directory, the card is unmounted and the external `n2p` post-processor is
//! started in the background.
//!
//! # Modules
//!
//! - [`config`]: Runtime configuration (paths, timings, layout)
//! - [`detect`]: Detection of marked cards under the mount root
//! - [`session`]: Session identifiers and staging directory names
//! - [`scan`]: Enumeration of DCIM directories and raw files
//! - [`transfer`]: File moves with bounded exponential backoff
//! - [`launch`]: Unmounting and starting the post-processor
//! - [`poll`]: The poll loop state machine
//! - [`announce`]: Spoken feedback
//! - [`executor`]: Command execution with privilege escalation
//! - [`mount`]: Mount point inspection and `umount`
//! - [`shutdown`]: Interrupt handling
//! - [`error`]: Error types
//!
//! # Example
//!
//! ```no_run
//! use n2p_dcim_core::{Config, Poller, Shutdown};
//!
//! let config = Config::defaults().unwrap();
//! let shutdown = Shutdown::new();
//!
//! let mut poller = Poller::new(config, shutdown.clone());
//! poller.run().unwrap();
//! ```

pub mod announce;
pub mod config;
pub mod detect;
pub mod error;
pub mod executor;
pub mod launch;
pub mod mount;
pub mod poll;
pub mod scan;
pub mod session;
pub mod shutdown;
pub mod transfer;

// Re-export commonly used types
pub use config::{Config, StagingLayout};
pub use detect::{Detector, Device};
pub use error::{Error, Result};
pub use poll::{Iteration, PollState, Poller, SessionSummary, UnmountStatus};
pub use session::Session;
pub use shutdown::Shutdown;
pub use transfer::{RetryPolicy, TransferEngine, TransferReport};
