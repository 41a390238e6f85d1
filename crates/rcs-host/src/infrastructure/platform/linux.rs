//! Linux X11 backend: XTest injection and `XGetImage` capture.
//!
//! # Key codes
//!
//! `XTestFakeKeyEvent` takes a server keycode.  On evdev-based servers that
//! is the Linux input code plus 8, which [`KeyMapper::scan_to_x11_keycode`]
//! derives from the set-1 scan code.  Layout-independent like the Windows
//! scan-code path.
//!
//! # Scrolling
//!
//! X11 has no wheel API; each notch is a press+release of button 4 (up),
//! 5 (down), 6 (left) or 7 (right).
//!
//! # Threads
//!
//! `XInitThreads` is called before the first connection.  Injection shares
//! one connection behind a mutex; each capture device opens its own.

#![cfg(all(target_os = "linux", feature = "x11"))]

use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_uint};
use std::ptr;
use std::sync::{Mutex, Once};

use rcs_core::keymap::KeyMapper;
use rcs_core::{PointerButton, WHEEL_DELTA};
use x11::{xlib, xtest};

use crate::application::capture_pipeline::{CaptureBackend, CaptureDevice};
use crate::application::frame_encoder::RawFrame;
use crate::application::input_injector::{InputBackend, RawInput};
use crate::application::lock;
use crate::application::platform::PlatformError;

/// `CurrentTime` for synthesized events.
const CURRENT_TIME: u64 = 0;
/// `XTestFakeMotionEvent` screen argument meaning "the pointer's screen".
const SCREEN_DEFAULT: c_int = -1;

static XLIB_THREADS: Once = Once::new();

/// An owned Xlib connection.
struct Connection(*mut xlib::Display);

// SAFETY: the connection is only used behind a `Mutex` or by the single
// thread that owns a capture device, after `XInitThreads`.
unsafe impl Send for Connection {}

impl Connection {
    fn open() -> Result<Self, PlatformError> {
        XLIB_THREADS.call_once(|| {
            // SAFETY: called once, before any other Xlib call in this process.
            unsafe {
                xlib::XInitThreads();
            }
        });
        // SAFETY: a null name selects the display named by `DISPLAY`.
        let display = unsafe { xlib::XOpenDisplay(ptr::null()) };
        if display.is_null() {
            let name = std::env::var("DISPLAY").unwrap_or_else(|_| "<unset>".to_string());
            return Err(PlatformError::DeviceUnavailable(format!(
                "XOpenDisplay failed; DISPLAY={name}"
            )));
        }
        Ok(Self(display))
    }

    fn root(&self) -> xlib::Window {
        // SAFETY: `self.0` is a live connection.
        unsafe { xlib::XDefaultRootWindow(self.0) }
    }

    fn screen_size(&self) -> (u32, u32) {
        // SAFETY: `self.0` is a live connection.
        unsafe {
            let screen = xlib::XDefaultScreen(self.0);
            (
                xlib::XDisplayWidth(self.0, screen).max(0) as u32,
                xlib::XDisplayHeight(self.0, screen).max(0) as u32,
            )
        }
    }

    fn flush(&self) {
        // SAFETY: `self.0` is a live connection.
        unsafe {
            xlib::XFlush(self.0);
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // SAFETY: opened by `XOpenDisplay` and closed exactly once.
        unsafe {
            xlib::XCloseDisplay(self.0);
        }
    }
}

/// X11 implementation of the input and capture seams.
pub struct X11Platform {
    conn: Mutex<Connection>,
}

impl X11Platform {
    /// Connects to the X display.
    ///
    /// # Errors
    ///
    /// [`PlatformError::DeviceUnavailable`] if `DISPLAY` is unset or the
    /// server is unreachable.
    pub fn new() -> Result<Self, PlatformError> {
        Ok(Self {
            conn: Mutex::new(Connection::open()?),
        })
    }
}

fn button_number(button: PointerButton) -> c_uint {
    match button {
        PointerButton::Left => 1,
        PointerButton::Middle => 2,
        PointerButton::Right => 3,
    }
}

/// Wheel button and click count for a delta in `WHEEL_DELTA` units.
fn wheel_clicks(delta: i32, horizontal: bool) -> (c_uint, u32) {
    let button = match (horizontal, delta > 0) {
        (false, true) => 4,
        (false, false) => 5,
        (true, true) => 7,
        (true, false) => 6,
    };
    let clicks = (delta.unsigned_abs() / WHEEL_DELTA as u32).max(1);
    (button, clicks)
}

impl InputBackend for X11Platform {
    fn inject(&self, input: RawInput) -> Result<(), PlatformError> {
        let conn = lock(&self.conn);
        let display = conn.0;
        // SAFETY: `display` is a live connection held under the mutex.
        let status = unsafe {
            match input {
                RawInput::MouseMove { x, y, .. } => {
                    xtest::XTestFakeMotionEvent(display, SCREEN_DEFAULT, x, y, CURRENT_TIME)
                }
                RawInput::MouseButton { button, down } => xtest::XTestFakeButtonEvent(
                    display,
                    button_number(button),
                    down as c_int,
                    CURRENT_TIME,
                ),
                RawInput::Wheel { delta, horizontal } => {
                    let (button, clicks) = wheel_clicks(delta, horizontal);
                    let mut status = 1;
                    for _ in 0..clicks {
                        status &= xtest::XTestFakeButtonEvent(display, button, 1, CURRENT_TIME);
                        status &= xtest::XTestFakeButtonEvent(display, button, 0, CURRENT_TIME);
                    }
                    status
                }
                RawInput::Key { code, down } => {
                    let keycode = KeyMapper::scan_to_x11_keycode(code).ok_or_else(|| {
                        PlatformError::Unsupported(format!("no X11 keycode for {code:?}"))
                    })?;
                    xtest::XTestFakeKeyEvent(
                        display,
                        c_uint::from(keycode),
                        down as c_int,
                        CURRENT_TIME,
                    )
                }
                RawInput::Unicode { .. } => {
                    return Err(PlatformError::Unsupported(
                        "unicode injection is not available through XTest".into(),
                    ));
                }
            }
        };
        conn.flush();
        if status == 0 {
            return Err(PlatformError::Io(format!("XTest rejected {input:?}")));
        }
        Ok(())
    }

    fn cursor_position(&self) -> Result<(i32, i32), PlatformError> {
        let conn = lock(&self.conn);
        let (mut root, mut child) = (0, 0);
        let (mut root_x, mut root_y, mut win_x, mut win_y) = (0, 0, 0, 0);
        let mut mask = 0;
        // SAFETY: every out-pointer refers to a local of the right type.
        let ok = unsafe {
            xlib::XQueryPointer(
                conn.0,
                conn.root(),
                &mut root,
                &mut child,
                &mut root_x,
                &mut root_y,
                &mut win_x,
                &mut win_y,
                &mut mask,
            )
        };
        if ok == 0 {
            return Err(PlatformError::Io("pointer is on another screen".into()));
        }
        Ok((root_x, root_y))
    }

    fn screen_size(&self) -> Result<(u32, u32), PlatformError> {
        Ok(lock(&self.conn).screen_size())
    }
}

// ── Capture ───────────────────────────────────────────────────────────────────

struct X11Capture {
    conn: Connection,
}

impl CaptureDevice for X11Capture {
    fn latest_frame(&mut self) -> Result<Option<RawFrame>, PlatformError> {
        let (width, height) = self.conn.screen_size();
        // SAFETY: the connection is live; the image is destroyed below.
        let image = unsafe {
            xlib::XGetImage(
                self.conn.0,
                self.conn.root(),
                0,
                0,
                width,
                height,
                xlib::XAllPlanes(),
                xlib::ZPixmap,
            )
        };
        if image.is_null() {
            return Err(PlatformError::Io("XGetImage returned no image".into()));
        }
        // SAFETY: `image` is non-null and owned here until XDestroyImage.
        let frame = unsafe { convert_image(&*image) };
        // SAFETY: destroyed exactly once.
        unsafe {
            xlib::XDestroyImage(image);
        }
        frame.map(Some)
    }
}

/// Converts a 32-bit ZPixmap image to packed RGB using its channel masks.
///
/// # Safety
///
/// `image.data` must point to `bytes_per_line * height` readable bytes.
unsafe fn convert_image(image: &xlib::XImage) -> Result<RawFrame, PlatformError> {
    if image.bits_per_pixel != 32 {
        return Err(PlatformError::Unsupported(format!(
            "{}-bit visuals are not supported",
            image.bits_per_pixel
        )));
    }
    let (w, h) = (image.width.max(0) as usize, image.height.max(0) as usize);
    let stride = image.bytes_per_line.max(0) as usize;
    let data = std::slice::from_raw_parts(image.data as *const u8, stride * h);
    let channel = |pixel: u32, mask: u64| -> u8 {
        let mask = mask as u32;
        if mask == 0 {
            return 0;
        }
        ((pixel & mask) >> mask.trailing_zeros()) as u8
    };

    let mut rgb = Vec::with_capacity(w * h * 3);
    for row in data.chunks_exact(stride).take(h) {
        for px in row[..w * 4].chunks_exact(4) {
            let pixel = u32::from_le_bytes([px[0], px[1], px[2], px[3]]);
            rgb.push(channel(pixel, image.red_mask));
            rgb.push(channel(pixel, image.green_mask));
            rgb.push(channel(pixel, image.blue_mask));
        }
    }
    Ok(RawFrame {
        width: w as u32,
        height: h as u32,
        rgb,
    })
}

impl CaptureBackend for X11Platform {
    fn open_capture(&self, _target_fps: u32) -> Result<Box<dyn CaptureDevice>, PlatformError> {
        let conn = Connection::open()?;
        Ok(Box::new(X11Capture { conn }))
    }

    fn active_window_title(&self) -> String {
        let conn = lock(&self.conn);
        let mut window: xlib::Window = 0;
        let mut revert: c_int = 0;
        let mut name: *mut c_char = ptr::null_mut();
        // SAFETY: out-pointers refer to locals; a fetched name is freed once.
        unsafe {
            xlib::XGetInputFocus(conn.0, &mut window, &mut revert);
            if window == 0 || xlib::XFetchName(conn.0, window, &mut name) == 0 || name.is_null() {
                return String::new();
            }
            let title = CStr::from_ptr(name).to_string_lossy().into_owned();
            xlib::XFree(name.cast());
            title
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wheel_maps_direction_to_button() {
        assert_eq!(wheel_clicks(240, false), (4, 2));
        assert_eq!(wheel_clicks(-120, false), (5, 1));
        assert_eq!(wheel_clicks(120, true), (7, 1));
        assert_eq!(wheel_clicks(-360, true), (6, 3));
    }

    #[test]
    fn test_sub_notch_delta_still_clicks_once() {
        assert_eq!(wheel_clicks(30, false), (4, 1));
    }

    #[test]
    fn test_button_numbers() {
        assert_eq!(button_number(PointerButton::Left), 1);
        assert_eq!(button_number(PointerButton::Middle), 2);
        assert_eq!(button_number(PointerButton::Right), 3);
    }
}
