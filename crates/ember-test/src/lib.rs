//! Ember Test - Shared test utilities for the Ember plugin host.
//!
//! Fixtures for building throwaway plugin roots on disk and recorders for
//! observing destroy callbacks.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! ember-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use ember_test::PluginRootFixture;
//!
//! #[test]
//! fn test_loads() {
//!     let root = PluginRootFixture::new();
//!     root.add_plugin("hello", r#"console::log("hi");"#);
//!
//!     let mut manager = root.manager();
//!     assert!(manager.load_plugin("hello").is_ok());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;
