//! Common utilities and shared types for the volunteer hub client.
//!
//! This crate provides foundational components used across all workspace crates:
//!
//! - **Configuration**: Client settings via [`Config`]
//! - **Error handling**: Unified error taxonomy via [`ClientError`] and [`ClientResult`]
//! - **Session**: Explicit bearer credential passed into every backend call via [`Session`]
//!
//! # Example
//!
//! ```no_run
//! use volunteer_common::{ClientResult, Config, Session};
//!
//! fn example() -> ClientResult<()> {
//!     let config = Config::load()?;
//!     let session = config
//!         .session
//!         .token
//!         .as_deref()
//!         .map_or_else(Session::anonymous, Session::bearer);
//!     println!("authenticated: {}", session.is_authenticated());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod session;

pub use config::Config;
pub use error::{ClientError, ClientResult};
pub use session::Session;
