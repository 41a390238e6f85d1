//! Windows backend: `SendInput` injection and GDI screen capture.
//!
//! Keys are injected by scan code (`KEYEVENTF_SCANCODE`), so the result is
//! independent of the active keyboard layout.  Extended keys add
//! `KEYEVENTF_EXTENDEDKEY`.  Characters outside the scan-code table use
//! `KEYEVENTF_UNICODE`, one event per UTF-16 code unit.
//!
//! Mouse moves use `MOUSEEVENTF_ABSOLUTE` with coordinates already
//! normalized to `[1, 65535]` by the pointer controller.
//!
//! Capture copies the primary screen into a memory DC with `BitBlt` and reads
//! it back as a top-down 32-bit DIB.

#![cfg(target_os = "windows")]

use std::ffi::c_void;

use windows::Win32::Foundation::{HWND, POINT};
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC,
    GetDIBits, ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS,
    HBITMAP, HDC, HGDIOBJ, SRCCOPY,
};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYBD_EVENT_FLAGS,
    KEYEVENTF_EXTENDEDKEY, KEYEVENTF_KEYUP, KEYEVENTF_SCANCODE, KEYEVENTF_UNICODE,
    MOUSEEVENTF_ABSOLUTE, MOUSEEVENTF_HWHEEL, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP,
    MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP, MOUSEEVENTF_MOVE, MOUSEEVENTF_RIGHTDOWN,
    MOUSEEVENTF_RIGHTUP, MOUSEEVENTF_WHEEL, MOUSEINPUT, MOUSE_EVENT_FLAGS, VIRTUAL_KEY,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetCursorPos, GetForegroundWindow, GetSystemMetrics, GetWindowTextW, SM_CXSCREEN,
    SM_CYSCREEN,
};

use rcs_core::PointerButton;

use crate::application::capture_pipeline::{CaptureBackend, CaptureDevice};
use crate::application::frame_encoder::RawFrame;
use crate::application::input_injector::{InputBackend, RawInput};
use crate::application::platform::PlatformError;

/// Windows implementation of the input and capture seams.
#[derive(Debug, Default)]
pub struct WindowsPlatform;

impl WindowsPlatform {
    pub fn new() -> Result<Self, PlatformError> {
        Ok(Self)
    }
}

fn primary_screen() -> (i32, i32) {
    // SAFETY: GetSystemMetrics has no preconditions.
    unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) }
}

impl InputBackend for WindowsPlatform {
    fn inject(&self, input: RawInput) -> Result<(), PlatformError> {
        let event = match input {
            RawInput::MouseMove { nx, ny, .. } => {
                mouse(nx, ny, 0, MOUSEEVENTF_MOVE | MOUSEEVENTF_ABSOLUTE)
            }
            RawInput::MouseButton { button, down } => {
                let flags = match (button, down) {
                    (PointerButton::Left, true) => MOUSEEVENTF_LEFTDOWN,
                    (PointerButton::Left, false) => MOUSEEVENTF_LEFTUP,
                    (PointerButton::Right, true) => MOUSEEVENTF_RIGHTDOWN,
                    (PointerButton::Right, false) => MOUSEEVENTF_RIGHTUP,
                    (PointerButton::Middle, true) => MOUSEEVENTF_MIDDLEDOWN,
                    (PointerButton::Middle, false) => MOUSEEVENTF_MIDDLEUP,
                };
                mouse(0, 0, 0, flags)
            }
            RawInput::Wheel { delta, horizontal } => {
                let flags = if horizontal {
                    MOUSEEVENTF_HWHEEL
                } else {
                    MOUSEEVENTF_WHEEL
                };
                // mouseData carries the signed delta in its two's-complement bits.
                mouse(0, 0, delta as u32, flags)
            }
            RawInput::Key { code, down } => {
                let mut flags = KEYEVENTF_SCANCODE;
                if code.extended {
                    flags |= KEYEVENTF_EXTENDEDKEY;
                }
                if !down {
                    flags |= KEYEVENTF_KEYUP;
                }
                keyboard(code.code, flags)
            }
            RawInput::Unicode { unit, down } => {
                let mut flags = KEYEVENTF_UNICODE;
                if !down {
                    flags |= KEYEVENTF_KEYUP;
                }
                keyboard(unit, flags)
            }
        };
        send(event)
    }

    fn cursor_position(&self) -> Result<(i32, i32), PlatformError> {
        let mut point = POINT::default();
        // SAFETY: `point` is a valid, writable POINT on the stack.
        unsafe { GetCursorPos(&mut point) }
            .map_err(|e| PlatformError::Io(format!("GetCursorPos: {e}")))?;
        Ok((point.x, point.y))
    }

    fn screen_size(&self) -> Result<(u32, u32), PlatformError> {
        let (w, h) = primary_screen();
        if w <= 0 || h <= 0 {
            return Err(PlatformError::DeviceUnavailable(
                "GetSystemMetrics reported no screen".into(),
            ));
        }
        Ok((w as u32, h as u32))
    }
}

fn mouse(dx: i32, dy: i32, data: u32, flags: MOUSE_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx,
                dy,
                mouseData: data,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn keyboard(scan: u16, flags: KEYBD_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: VIRTUAL_KEY(0),
                wScan: scan,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn send(input: INPUT) -> Result<(), PlatformError> {
    // SAFETY: `input` is a fully initialised INPUT structure on the stack.
    let sent = unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
    if sent == 1 {
        Ok(())
    } else {
        Err(PlatformError::Io(format!(
            "SendInput rejected the event: {}",
            windows::core::Error::from_win32()
        )))
    }
}

// ── Capture ───────────────────────────────────────────────────────────────────

/// GDI handles for one capture session, released on drop.
struct GdiCapture {
    screen_dc: HDC,
    mem_dc: HDC,
    bitmap: HBITMAP,
    previous: HGDIOBJ,
    width: i32,
    height: i32,
}

impl GdiCapture {
    fn open() -> Result<Self, PlatformError> {
        let (width, height) = primary_screen();
        if width <= 0 || height <= 0 {
            return Err(PlatformError::DeviceUnavailable("no primary screen".into()));
        }
        // SAFETY: a null HWND requests the DC of the whole screen.  Every
        // handle created here is released in `Drop`, or right here on failure.
        unsafe {
            let screen_dc = GetDC(HWND::default());
            if screen_dc.is_invalid() {
                return Err(PlatformError::DeviceUnavailable("GetDC failed".into()));
            }
            let mem_dc = CreateCompatibleDC(screen_dc);
            if mem_dc.is_invalid() {
                ReleaseDC(HWND::default(), screen_dc);
                return Err(PlatformError::DeviceUnavailable(
                    "CreateCompatibleDC failed".into(),
                ));
            }
            let bitmap = CreateCompatibleBitmap(screen_dc, width, height);
            if bitmap.is_invalid() {
                let _ = DeleteDC(mem_dc);
                ReleaseDC(HWND::default(), screen_dc);
                return Err(PlatformError::DeviceUnavailable(
                    "CreateCompatibleBitmap failed".into(),
                ));
            }
            let previous = SelectObject(mem_dc, bitmap);
            Ok(Self {
                screen_dc,
                mem_dc,
                bitmap,
                previous,
                width,
                height,
            })
        }
    }

    fn grab(&mut self) -> Result<RawFrame, PlatformError> {
        let (w, h) = (self.width, self.height);
        let mut info = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: w,
                // Negative height selects a top-down DIB.
                biHeight: -h,
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut bgra = vec![0u8; w as usize * h as usize * 4];

        // SAFETY: both DCs and the bitmap are live for the lifetime of
        // `self`; `bgra` holds exactly `h` rows of `w` 32-bit pixels.
        unsafe {
            BitBlt(self.mem_dc, 0, 0, w, h, self.screen_dc, 0, 0, SRCCOPY)
                .map_err(|e| PlatformError::Io(format!("BitBlt: {e}")))?;
            let rows = GetDIBits(
                self.mem_dc,
                self.bitmap,
                0,
                h as u32,
                Some(bgra.as_mut_ptr() as *mut c_void),
                &mut info,
                DIB_RGB_COLORS,
            );
            if rows != h {
                return Err(PlatformError::Io(format!("GetDIBits copied {rows} of {h} rows")));
            }
        }

        let rgb = bgra
            .chunks_exact(4)
            .flat_map(|px| [px[2], px[1], px[0]])
            .collect();
        Ok(RawFrame {
            width: w as u32,
            height: h as u32,
            rgb,
        })
    }
}

impl CaptureDevice for GdiCapture {
    fn latest_frame(&mut self) -> Result<Option<RawFrame>, PlatformError> {
        self.grab().map(Some)
    }
}

impl Drop for GdiCapture {
    fn drop(&mut self) {
        // SAFETY: the handles were created in `open` and are released once.
        unsafe {
            SelectObject(self.mem_dc, self.previous);
            let _ = DeleteObject(self.bitmap);
            let _ = DeleteDC(self.mem_dc);
            ReleaseDC(HWND::default(), self.screen_dc);
        }
    }
}

impl CaptureBackend for WindowsPlatform {
    fn open_capture(&self, _target_fps: u32) -> Result<Box<dyn CaptureDevice>, PlatformError> {
        Ok(Box::new(GdiCapture::open()?))
    }

    fn active_window_title(&self) -> String {
        let mut buf = [0u16; 512];
        // SAFETY: `buf` is a writable UTF-16 buffer; a null foreground window
        // simply yields zero characters.
        let len = unsafe {
            let hwnd = GetForegroundWindow();
            GetWindowTextW(hwnd, &mut buf)
        };
        String::from_utf16_lossy(&buf[..len.max(0) as usize])
    }
}
