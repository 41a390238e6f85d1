//! Application layer use cases for the host engine.
//!
//! # What use cases does the host have?
//!
//! - **`input_injector`** – Translates logical pointer and keyboard events
//!   into raw OS input.  The actual OS call is made by an `InputBackend`
//!   implementation that is injected at construction time.
//!
//! - **`capture_pipeline`** – Owns the single screen-capture device and runs
//!   the frame-production and cursor-broadcast loops.
//!
//! - **`frame_encoder`** – Scales raw frames and encodes them as JPEG for the
//!   stream or PNG for screenshots.
//!
//! - **`audio_router`** – Runs the microphone, system-audio, and playback
//!   channels, each on its own device and thread.
//!
//! - **`shell_sessions`** – Spawns and supervises pty-backed shells.
//!
//! - **`session_registry`** – The control-plane facade over all of the above.
//!
//! - **`platform`** – The error type shared by every platform seam and the
//!   bundle of backends handed to the engine.

pub mod audio_router;
pub mod capture_pipeline;
pub mod frame_encoder;
pub mod input_injector;
pub mod platform;
pub mod session_registry;
pub mod shell_sessions;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks `mutex`, recovering the data if a panicking thread poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
