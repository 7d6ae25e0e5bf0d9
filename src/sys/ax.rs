//! Thin safe layer over the Accessibility C API.
//!
//! Everything here is per-window fallible: elements go stale whenever the
//! window server destroys a window behind our back, and a wedged app answers
//! nothing until the messaging timeout fires. Callers treat every error as
//! "skip this window".

use std::ffi::{CString, c_char, c_void};

use crate::sys::geometry::Frame;
use crate::sys::window_server::{WindowId, pid_t};

pub type CFTypeRef = *const c_void;
type CFStringRef = *const c_void;
type CFArrayRef = *const c_void;
pub type AXObserverRef = *const c_void;

#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct CgPoint {
    pub x: f64,
    pub y: f64,
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct CgSize {
    pub width: f64,
    pub height: f64,
}

const K_AX_VALUE_CGPOINT_TYPE: i32 = 1;
const K_AX_VALUE_CGSIZE_TYPE: i32 = 2;

const K_CF_STRING_ENCODING_UTF8: u32 = 0x0800_0100;

const AX_ERR_SUCCESS: i32 = 0;
const AX_ERR_INVALID_ELEMENT: i32 = -25202;
const AX_ERR_CANNOT_COMPLETE: i32 = -25204;
const AX_ERR_NO_VALUE: i32 = -25212;

/// Messaging timeout applied to every app element the transport talks to. A
/// hung app costs at most this much per batch.
pub const AX_MESSAGING_TIMEOUT_S: f32 = 0.1;

pub type AXObserverCallback =
    unsafe extern "C" fn(AXObserverRef, CFTypeRef, CFStringRef, *mut c_void);

#[link(name = "ApplicationServices", kind = "framework")]
unsafe extern "C" {
    fn AXIsProcessTrusted() -> bool;
    fn AXUIElementCreateApplication(pid: pid_t) -> CFTypeRef;
    fn AXUIElementCopyAttributeValue(
        element: CFTypeRef,
        attribute: CFStringRef,
        value: *mut CFTypeRef,
    ) -> i32;
    fn AXUIElementSetAttributeValue(
        element: CFTypeRef,
        attribute: CFStringRef,
        value: CFTypeRef,
    ) -> i32;
    fn AXUIElementPerformAction(element: CFTypeRef, action: CFStringRef) -> i32;
    fn AXUIElementSetMessagingTimeout(element: CFTypeRef, timeout_s: f32) -> i32;
    fn AXValueCreate(the_type: i32, value_ptr: *const c_void) -> CFTypeRef;
    fn AXValueGetValue(value: CFTypeRef, the_type: i32, value_ptr: *mut c_void) -> bool;
    fn AXObserverCreate(
        pid: pid_t,
        callback: AXObserverCallback,
        out_observer: *mut AXObserverRef,
    ) -> i32;
    fn AXObserverAddNotification(
        observer: AXObserverRef,
        element: CFTypeRef,
        notification: CFStringRef,
        refcon: *mut c_void,
    ) -> i32;
    fn AXObserverRemoveNotification(
        observer: AXObserverRef,
        element: CFTypeRef,
        notification: CFStringRef,
    ) -> i32;
    fn AXObserverGetRunLoopSource(observer: AXObserverRef) -> CFTypeRef;
    /// Private, but load-bearing for every AX window manager: maps an AX
    /// window element to its CGWindowID.
    fn _AXUIElementGetWindow(element: CFTypeRef, out_wid: *mut u32) -> i32;
}

#[link(name = "CoreFoundation", kind = "framework")]
unsafe extern "C" {
    fn CFRetain(cf: CFTypeRef) -> CFTypeRef;
    fn CFRelease(cf: CFTypeRef);
    fn CFArrayGetCount(array: CFArrayRef) -> isize;
    fn CFArrayGetValueAtIndex(array: CFArrayRef, idx: isize) -> CFTypeRef;
    fn CFBooleanGetValue(boolean: CFTypeRef) -> bool;
    fn CFStringCreateWithCString(
        alloc: *const c_void,
        c_str: *const c_char,
        encoding: u32,
    ) -> CFStringRef;
    fn CFStringGetCString(
        string: CFStringRef,
        buffer: *mut c_char,
        buffer_size: isize,
        encoding: u32,
    ) -> bool;
    fn CFRunLoopGetCurrent() -> CFTypeRef;
    fn CFRunLoopAddSource(run_loop: CFTypeRef, source: CFTypeRef, mode: CFStringRef);
    fn CFRunLoopRemoveSource(run_loop: CFTypeRef, source: CFTypeRef, mode: CFStringRef);
    fn CFRunLoopRunInMode(mode: CFStringRef, seconds: f64, return_after_source: bool) -> i32;
    static kCFBooleanTrue: CFTypeRef;
    static kCFBooleanFalse: CFTypeRef;
    static kCFRunLoopDefaultMode: CFStringRef;
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxError {
    #[error("process is not trusted for accessibility")]
    NotTrusted,
    #[error("element is stale")]
    Stale,
    #[error("app did not answer within the messaging timeout")]
    Timeout,
    #[error("attribute has no value")]
    NoValue,
    #[error("accessibility call failed (AXError {0})")]
    Api(i32),
}

fn check(code: i32) -> Result<(), AxError> {
    match code {
        AX_ERR_SUCCESS => Ok(()),
        AX_ERR_INVALID_ELEMENT => Err(AxError::Stale),
        AX_ERR_CANNOT_COMPLETE => Err(AxError::Timeout),
        AX_ERR_NO_VALUE => Err(AxError::NoValue),
        other => Err(AxError::Api(other)),
    }
}

pub fn process_trusted() -> bool { unsafe { AXIsProcessTrusted() } }

/// Pump the current CFRunLoop once. The manager interleaves this with its
/// event queue so observer callbacks run on the cooperative thread.
pub fn pump_run_loop(seconds: f64) {
    unsafe {
        CFRunLoopRunInMode(kCFRunLoopDefaultMode, seconds, true);
    }
}

fn cfstr(s: &str) -> CFStringRef {
    let c = CString::new(s).expect("attribute name");
    unsafe { CFStringCreateWithCString(std::ptr::null(), c.as_ptr(), K_CF_STRING_ENCODING_UTF8) }
}

fn string_from_cf(value: CFTypeRef) -> Option<String> {
    let mut buf = [0 as c_char; 1024];
    let ok = unsafe {
        CFStringGetCString(value, buf.as_mut_ptr(), buf.len() as isize, K_CF_STRING_ENCODING_UTF8)
    };
    if !ok {
        return None;
    }
    let cstr = unsafe { std::ffi::CStr::from_ptr(buf.as_ptr()) };
    Some(cstr.to_string_lossy().into_owned())
}

/// An owned AXUIElement reference.
pub struct AxElement(CFTypeRef);

impl AxElement {
    pub fn application(pid: pid_t) -> AxElement {
        AxElement(unsafe { AXUIElementCreateApplication(pid) })
    }

    pub fn set_messaging_timeout(&self, timeout_s: f32) {
        unsafe {
            AXUIElementSetMessagingTimeout(self.0, timeout_s);
        }
    }

    fn copy_attr(&self, name: &str) -> Result<CFTypeRef, AxError> {
        let attr = cfstr(name);
        let mut value: CFTypeRef = std::ptr::null();
        let code = unsafe { AXUIElementCopyAttributeValue(self.0, attr, &raw mut value) };
        unsafe { CFRelease(attr) };
        check(code)?;
        if value.is_null() {
            return Err(AxError::NoValue);
        }
        Ok(value)
    }

    fn set_attr(&self, name: &str, value: CFTypeRef) -> Result<(), AxError> {
        let attr = cfstr(name);
        let code = unsafe { AXUIElementSetAttributeValue(self.0, attr, value) };
        unsafe { CFRelease(attr) };
        check(code)
    }

    /// The app's window elements, front to back.
    pub fn windows(&self) -> Result<Vec<AxElement>, AxError> {
        let array = self.copy_attr("AXWindows")?;
        let count = unsafe { CFArrayGetCount(array) };
        let mut out = Vec::with_capacity(count as usize);
        for idx in 0..count {
            let element = unsafe { CFArrayGetValueAtIndex(array, idx) };
            if !element.is_null() {
                out.push(AxElement(unsafe { CFRetain(element) }));
            }
        }
        unsafe { CFRelease(array) };
        Ok(out)
    }

    pub fn focused_window(&self) -> Result<AxElement, AxError> {
        Ok(AxElement(self.copy_attr("AXFocusedWindow")?))
    }

    pub fn window_id(&self) -> Result<WindowId, AxError> {
        let mut wid: u32 = 0;
        check(unsafe { _AXUIElementGetWindow(self.0, &raw mut wid) })?;
        Ok(WindowId::new(wid))
    }

    pub fn position(&self) -> Result<(f64, f64), AxError> {
        let value = self.copy_attr("AXPosition")?;
        let mut point = CgPoint::default();
        let ok = unsafe {
            AXValueGetValue(value, K_AX_VALUE_CGPOINT_TYPE, (&raw mut point).cast::<c_void>())
        };
        unsafe { CFRelease(value) };
        if !ok {
            return Err(AxError::NoValue);
        }
        Ok((point.x, point.y))
    }

    pub fn size(&self) -> Result<(f64, f64), AxError> {
        let value = self.copy_attr("AXSize")?;
        let mut size = CgSize::default();
        let ok = unsafe {
            AXValueGetValue(value, K_AX_VALUE_CGSIZE_TYPE, (&raw mut size).cast::<c_void>())
        };
        unsafe { CFRelease(value) };
        if !ok {
            return Err(AxError::NoValue);
        }
        Ok((size.width, size.height))
    }

    pub fn frame(&self) -> Result<Frame, AxError> {
        let (x, y) = self.position()?;
        let (w, h) = self.size()?;
        Ok(Frame::new(x, y, w, h))
    }

    pub fn set_position(&self, x: f64, y: f64) -> Result<(), AxError> {
        let point = CgPoint { x, y };
        let value =
            unsafe { AXValueCreate(K_AX_VALUE_CGPOINT_TYPE, (&raw const point).cast::<c_void>()) };
        let result = self.set_attr("AXPosition", value);
        unsafe { CFRelease(value) };
        result
    }

    pub fn set_size(&self, w: f64, h: f64) -> Result<(), AxError> {
        let size = CgSize { width: w, height: h };
        let value =
            unsafe { AXValueCreate(K_AX_VALUE_CGSIZE_TYPE, (&raw const size).cast::<c_void>()) };
        let result = self.set_attr("AXSize", value);
        unsafe { CFRelease(value) };
        result
    }

    /// Apply a full frame in size, position, size order. macOS clamps the
    /// position against the current size and may then clamp the size against
    /// the screen edge; the second size pass recovers from both.
    pub fn apply_frame(&self, frame: &Frame) -> Result<(), AxError> {
        self.set_size(frame.w, frame.h)?;
        self.set_position(frame.x, frame.y)?;
        self.set_size(frame.w, frame.h)
    }

    pub fn bool_attr(&self, name: &str) -> Result<bool, AxError> {
        let value = self.copy_attr(name)?;
        let result = unsafe { CFBooleanGetValue(value) };
        unsafe { CFRelease(value) };
        Ok(result)
    }

    pub fn set_bool_attr(&self, name: &str, value: bool) -> Result<(), AxError> {
        let boolean = unsafe {
            if value {
                kCFBooleanTrue
            } else {
                kCFBooleanFalse
            }
        };
        self.set_attr(name, boolean)
    }

    pub fn string_attr(&self, name: &str) -> Option<String> {
        let value = self.copy_attr(name).ok()?;
        let result = string_from_cf(value);
        unsafe { CFRelease(value) };
        result
    }

    /// Number of elements in an array-valued attribute, if the attribute
    /// resolves at all.
    pub fn array_attr_len(&self, name: &str) -> Option<usize> {
        let array = self.copy_attr(name).ok()?;
        let count = unsafe { CFArrayGetCount(array) };
        unsafe { CFRelease(array) };
        Some(count as usize)
    }

    pub fn raise(&self) -> Result<(), AxError> {
        let action = cfstr("AXRaise");
        let code = unsafe { AXUIElementPerformAction(self.0, action) };
        unsafe { CFRelease(action) };
        check(code)
    }
}

impl Clone for AxElement {
    fn clone(&self) -> Self { AxElement(unsafe { CFRetain(self.0) }) }
}

impl Drop for AxElement {
    fn drop(&mut self) {
        unsafe { CFRelease(self.0) };
    }
}

/// An AXObserver bound to one app, delivering notifications for one window
/// element into its registered callback on the current run loop.
pub struct AxObserver {
    observer: AXObserverRef,
    element: AxElement,
    notifications: Vec<&'static str>,
    refcon: *mut c_void,
    installed: bool,
}

impl AxObserver {
    pub fn create(
        pid: pid_t,
        element: AxElement,
        notifications: Vec<&'static str>,
        callback: AXObserverCallback,
        refcon: *mut c_void,
    ) -> Result<AxObserver, AxError> {
        let mut observer: AXObserverRef = std::ptr::null();
        check(unsafe { AXObserverCreate(pid, callback, &raw mut observer) })?;
        Ok(AxObserver {
            observer,
            element,
            notifications,
            refcon,
            installed: false,
        })
    }

    pub fn install(&mut self) {
        if self.installed {
            return;
        }
        for name in &self.notifications {
            let cf_name = cfstr(name);
            let code = unsafe {
                AXObserverAddNotification(self.observer, self.element.0, cf_name, self.refcon)
            };
            unsafe { CFRelease(cf_name) };
            if let Err(err) = check(code) {
                tracing::warn!(?err, notification = *name, "failed to add AX notification");
            }
        }
        unsafe {
            let source = AXObserverGetRunLoopSource(self.observer);
            CFRunLoopAddSource(CFRunLoopGetCurrent(), source, kCFRunLoopDefaultMode);
        }
        self.installed = true;
    }

    pub fn uninstall(&mut self) {
        if !self.installed {
            return;
        }
        for name in &self.notifications {
            let cf_name = cfstr(name);
            unsafe {
                AXObserverRemoveNotification(self.observer, self.element.0, cf_name);
                CFRelease(cf_name);
            }
        }
        unsafe {
            let source = AXObserverGetRunLoopSource(self.observer);
            CFRunLoopRemoveSource(CFRunLoopGetCurrent(), source, kCFRunLoopDefaultMode);
        }
        self.installed = false;
    }
}

impl Drop for AxObserver {
    // The refcon is owned by the caller and must outlive the observer.
    fn drop(&mut self) {
        self.uninstall();
        unsafe { CFRelease(self.observer) };
    }
}
