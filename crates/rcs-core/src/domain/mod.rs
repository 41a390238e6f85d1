//! Domain entities for the remote-control session engine.
//!
//! Pure data and validation rules with no infrastructure dependencies.  The
//! engine in `rcs-host` moves these values between its loops and the
//! transport collaborator; nothing here owns a thread or an OS handle.

/// Stream channel identity and lifecycle state.
pub mod channel;

/// Logical pointer and keyboard events.
pub mod input;

/// Fixed, range-validated configuration records per channel kind.
pub mod settings;

/// Records published by the engine's producer loops.
pub mod stream;
