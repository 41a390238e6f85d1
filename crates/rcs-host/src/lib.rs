//! rcs-host library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does rcs-host do?
//!
//! The host is the machine being controlled.  A transport collaborator (web
//! server, socket layer) accepts the operator's connection and calls into the
//! [`SessionRegistry`](application::session_registry::SessionRegistry), which
//! runs the real-time session engine:
//!
//! 1. A video loop grabs the newest screen frame, scales and JPEG-encodes it,
//!    and publishes it into a keep-latest slot alongside the cursor position.
//! 2. Audio loops capture the host microphone and system audio in fixed-size
//!    PCM chunks, and play the operator's audio on the host speakers.
//! 3. Pseudo-terminal shells run one per session id with their output
//!    buffered until the transport polls it.
//! 4. Logical pointer and keyboard events are translated into OS-level
//!    injected input (`SendInput` on Windows, XTest on Linux).

/// Application layer: engine use cases and the platform seams they drive.
pub mod application;

/// Infrastructure layer: OS adapters, audio devices, clipboard, and config storage.
pub mod infrastructure;
