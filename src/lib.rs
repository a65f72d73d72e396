//! A lightweight SOCKS5 proxy library
//!
//! ## SOCKS5 Implementation
//!
//! - Features:
//!     - CONNECT over IPv4 and domain-name targets
//!     - No Authentication
//!     - Username/Password Authentication with a pluggable credential checker
//!     - Optional dial timeout for outbound connections
//!     - Async using tokio, one task per client
//! - Not served: BIND, UDP ASSOCIATE, IPv6 targets
//! - [SOCKS5 (RFC 1928)](https://datatracker.ietf.org/doc/html/rfc1928)
//! - [Username/Password Authentication (RFC 1929)](https://datatracker.ietf.org/doc/html/rfc1929)
//!
//! # Example
//! ```no_run
//! use s5proxy::{AuthMethod, Config, Socks5Server, UserTable};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let users: UserTable = [("admin", "123456")].into_iter().collect();
//!     let config = Config::builder()
//!         .auth_method(AuthMethod::UserPass)
//!         .credential_checker(users)
//!         .dial_timeout(Duration::from_secs(5))
//!         .build()?;
//!
//!     let mut server = Socks5Server::new("127.0.0.1:1080").with_config(config);
//!     server.run().await
//! }
//! ```

pub mod address;
pub mod auth;
pub mod commands;
pub mod config;
pub mod error;
pub mod messages;
pub mod protocol;
pub mod relay;
pub mod server;

// Re-export main types at crate root for convenience
pub use auth::{CredentialChecker, UserPass, UserTable};
pub use config::Config;
pub use error::Socks5Error;
pub use protocol::{AddressType, AuthMethod, Command, ReplyCode, Version};
pub use server::Socks5Server;

// Re-export the request outcome enum if users need it
pub use commands::TransportProtocol;
