//! Window-server identity and (on macOS) the raw on-screen window listing.
//!
//! A window is identified by its CGWindowID, which is stable for the lifetime
//! of the window and shared between the window server and the Accessibility
//! API. Everything above this layer treats the id as opaque.

use serde::{Deserialize, Serialize};

#[allow(non_camel_case_types)]
pub type pid_t = i32;

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(u32);

impl WindowId {
    pub const fn new(id: u32) -> Self { WindowId(id) }

    pub fn get(&self) -> u32 { self.0 }
}

impl std::fmt::Debug for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "w#{}", self.0)
    }
}

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of the window-server listing.
#[derive(Clone, Copy, Debug)]
pub struct RawWindowInfo {
    pub wid: WindowId,
    pub pid: pid_t,
    pub layer: i32,
}

#[cfg(target_os = "macos")]
pub use macos::onscreen_windows;

#[cfg(target_os = "macos")]
mod macos {
    use std::ffi::{CString, c_char, c_void};

    use super::{RawWindowInfo, WindowId, pid_t};

    type CFTypeRef = *const c_void;
    type CFArrayRef = *const c_void;
    type CFDictionaryRef = *const c_void;
    type CFStringRef = *const c_void;

    const K_CG_WINDOW_LIST_OPTION_ON_SCREEN_ONLY: u32 = 1 << 0;
    const K_CG_WINDOW_LIST_EXCLUDE_DESKTOP_ELEMENTS: u32 = 1 << 4;
    const K_CG_NULL_WINDOW_ID: u32 = 0;

    const K_CF_STRING_ENCODING_UTF8: u32 = 0x0800_0100;
    const K_CF_NUMBER_SINT32_TYPE: i64 = 3;

    #[link(name = "CoreGraphics", kind = "framework")]
    unsafe extern "C" {
        fn CGWindowListCopyWindowInfo(option: u32, relative_to: u32) -> CFArrayRef;
    }

    #[link(name = "CoreFoundation", kind = "framework")]
    unsafe extern "C" {
        fn CFRelease(cf: CFTypeRef);
        fn CFArrayGetCount(array: CFArrayRef) -> isize;
        fn CFArrayGetValueAtIndex(array: CFArrayRef, idx: isize) -> CFTypeRef;
        fn CFDictionaryGetValue(dict: CFDictionaryRef, key: CFTypeRef) -> CFTypeRef;
        fn CFNumberGetValue(number: CFTypeRef, the_type: i64, value_ptr: *mut c_void) -> bool;
        fn CFStringCreateWithCString(
            alloc: *const c_void,
            c_str: *const c_char,
            encoding: u32,
        ) -> CFStringRef;
    }

    fn cfstr(s: &str) -> CFStringRef {
        let c = CString::new(s).expect("static key");
        unsafe { CFStringCreateWithCString(std::ptr::null(), c.as_ptr(), K_CF_STRING_ENCODING_UTF8) }
    }

    fn dict_i32(dict: CFDictionaryRef, key: CFStringRef) -> Option<i32> {
        let value = unsafe { CFDictionaryGetValue(dict, key) };
        if value.is_null() {
            return None;
        }
        let mut out: i32 = 0;
        let ok = unsafe {
            CFNumberGetValue(
                value,
                K_CF_NUMBER_SINT32_TYPE,
                (&raw mut out).cast::<c_void>(),
            )
        };
        ok.then_some(out)
    }

    /// Every on-screen window the window server reports, desktop elements
    /// excluded. Callers filter by layer; layer 0 is the normal window layer.
    pub fn onscreen_windows() -> Vec<RawWindowInfo> {
        let list = unsafe {
            CGWindowListCopyWindowInfo(
                K_CG_WINDOW_LIST_OPTION_ON_SCREEN_ONLY | K_CG_WINDOW_LIST_EXCLUDE_DESKTOP_ELEMENTS,
                K_CG_NULL_WINDOW_ID,
            )
        };
        if list.is_null() {
            return Vec::new();
        }
        let key_number = cfstr("kCGWindowNumber");
        let key_pid = cfstr("kCGWindowOwnerPID");
        let key_layer = cfstr("kCGWindowLayer");

        let count = unsafe { CFArrayGetCount(list) };
        let mut out = Vec::with_capacity(count as usize);
        for idx in 0..count {
            let dict = unsafe { CFArrayGetValueAtIndex(list, idx) };
            if dict.is_null() {
                continue;
            }
            let (Some(number), Some(pid)) = (dict_i32(dict, key_number), dict_i32(dict, key_pid))
            else {
                continue;
            };
            let layer = dict_i32(dict, key_layer).unwrap_or(0);
            out.push(RawWindowInfo {
                wid: WindowId::new(number as u32),
                pid: pid as pid_t,
                layer,
            });
        }
        unsafe {
            CFRelease(key_number);
            CFRelease(key_pid);
            CFRelease(key_layer);
            CFRelease(list);
        }
        out
    }
}
