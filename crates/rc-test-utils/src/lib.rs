//! # RC Test Utilities
//!
//! Shared test utilities for the Room Controller (RC) service.
//!
//! - `mock_worker` - scripted worker processes behind a [`MockLauncher`]
//! - `test_connection` - a signaling connection whose outbound frames are
//!   read directly from its mailbox
//! - `fixtures` - participants and orchestrator settings
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rc_test_utils::*;
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_example() {
//!     let launcher = MockLauncher::new();
//!     let (orchestrator, _task) = OrchestratorActor::spawn(
//!         "rc-test".to_string(),
//!         test_settings(),
//!         launcher.clone(),
//!         ActorMetrics::new(),
//!     );
//!
//!     orchestrator.spawn("room-1".to_string(), SpawnRequest::default()).await.unwrap();
//!     let worker = launcher.worker("room-1").unwrap();
//!     worker.ready().await;
//! }
//! ```

pub mod fixtures;
pub mod mock_worker;
pub mod test_connection;

pub use fixtures::*;
pub use mock_worker::*;
pub use test_connection::*;
