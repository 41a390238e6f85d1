//! Infrastructure layer for the host engine.
//!
//! Contains the OS-facing adapters behind the application seams.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `rcs_core`, but MUST NOT be imported by the `application` or domain
//! layers.
//!
//! # Sub-modules
//!
//! - **`platform`** – Input injection, cursor and screen queries, and screen
//!   capture.  The native implementation is selected at compile time with
//!   `#[cfg(target_os)]` and re-exported as `NativePlatform`.  A recording
//!   `MockPlatform` is always compiled for tests.
//!
//! - **`audio`** – Audio devices through `cpal` (feature `audio`), or a
//!   backend that reports every device as unavailable.
//!
//! - **`clipboard`** – System clipboard text through `arboard`.
//!
//! - **`storage`** – TOML configuration file loading and saving.

pub mod audio;
pub mod clipboard;
pub mod platform;
pub mod storage;
