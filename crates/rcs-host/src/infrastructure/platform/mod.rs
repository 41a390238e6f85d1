//! Platform input and capture backends.
//!
//! The correct implementation is selected at compile time via
//! `#[cfg(target_os = ...)]` and exposed as [`NativePlatform`].

pub mod mock;
pub mod unavailable;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(all(target_os = "linux", feature = "x11"))]
pub mod linux;

#[cfg(target_os = "windows")]
pub use self::windows::WindowsPlatform as NativePlatform;

#[cfg(all(target_os = "linux", feature = "x11"))]
pub use self::linux::X11Platform as NativePlatform;

#[cfg(not(any(target_os = "windows", all(target_os = "linux", feature = "x11"))))]
pub use self::unavailable::UnavailablePlatform as NativePlatform;
