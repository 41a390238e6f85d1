//! # rcs-core
//!
//! Shared library for the remote-control host containing the session-engine
//! domain types, the keyboard scan-code tables, and the error taxonomy that
//! crosses the control-plane boundary.
//!
//! This crate has zero dependencies on OS APIs, device drivers, or threads.
//! Everything here can be compiled and tested on any platform.
//!
//! # Architecture overview
//!
//! The host gives a single remote operator live screen video, duplex audio,
//! keyboard/mouse injection, and interactive shells.  The engine that does the
//! work lives in `rcs-host`; this crate defines what flows through it:
//!
//! - **`domain`** – Stream channels and their lifecycle state, the fixed
//!   settings records per channel kind, the logical input events, and the
//!   records the engine publishes (video frames, cursor positions, audio
//!   chunks, lifecycle events).
//!
//! - **`keymap`** – Translation tables from logical key names and characters
//!   to PC set-1 scan codes, the shift decomposition table, the X11 keycode
//!   conversion, and the named shortcut aliases.
//!
//! - **`error`** – [`EngineError`], the four-way error taxonomy surfaced to the
//!   transport layer.

pub mod domain;
pub mod error;
pub mod keymap;

pub use domain::channel::{ChannelConfig, ChannelKind, ChannelState, StreamChannel};
pub use domain::input::{InputEvent, PointerButton, WHEEL_DELTA};
pub use domain::settings::{
    AudioConfig, AudioSettingsUpdate, AudioTarget, VideoConfig, VideoSettingsUpdate,
};
pub use domain::stream::{AudioChunk, CursorPosition, EngineEvent, VideoFrame};
pub use error::{EngineError, EngineResult, ErrorKind};
pub use keymap::{KeyMapper, KeyStroke, ScanCode};
