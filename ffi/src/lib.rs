mod types;

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use pdf_rebuild::{Line, PageLines, RebuiltFile, Rebuilder};

pub use types::FfiLine;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = RefCell::new(None);
}

fn set_last_error(err: String) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(err).ok();
    });
}

pub struct PdfRebuildHandle {
    file: RebuiltFile,
    name: CString,
}

pub struct PdfLinesHandle {
    lines: Vec<(u32, Line)>,
}

unsafe fn bytes_arg<'a>(data: *const u8, len: usize, what: &str) -> Option<&'a [u8]> {
    if data.is_null() {
        set_last_error(format!("{} pointer is null", what));
        return None;
    }
    Some(unsafe { std::slice::from_raw_parts(data, len) })
}

unsafe fn str_arg<'a>(s: *const c_char, what: &str) -> Option<&'a str> {
    if s.is_null() {
        set_last_error(format!("{} pointer is null", what));
        return None;
    }
    match unsafe { CStr::from_ptr(s) }.to_str() {
        Ok(s) => Some(s),
        Err(e) => {
            set_last_error(format!("Invalid UTF-8 in {}: {}", what, e));
            None
        }
    }
}

unsafe fn rebuilder(password: *const c_char) -> Option<Rebuilder> {
    if password.is_null() {
        return Some(Rebuilder::default());
    }
    let password = unsafe { str_arg(password, "password") }?;
    Some(Rebuilder::builder().password(password).build())
}

fn into_handle(result: Result<RebuiltFile, pdf_rebuild::RebuildError>) -> *mut PdfRebuildHandle {
    match result {
        Ok(file) => {
            let name = CString::new(file.name.replace('\0', "")).unwrap_or_default();
            Box::into_raw(Box::new(PdfRebuildHandle { file, name }))
        }
        Err(e) => {
            set_last_error(format!("Failed to rebuild PDF: {}", e));
            ptr::null_mut()
        }
    }
}

/// Rebuild a PDF held in memory with a TrueType/OpenType font program.
///
/// `password` may be null. Returns null on failure; see `pdf_last_error`.
#[no_mangle]
pub extern "C" fn pdf_rebuild_from_bytes(
    name: *const c_char,
    data: *const u8,
    len: usize,
    font: *const u8,
    font_len: usize,
    password: *const c_char,
) -> *mut PdfRebuildHandle {
    let args = unsafe {
        (
            str_arg(name, "name"),
            bytes_arg(data, len, "Data"),
            bytes_arg(font, font_len, "Font"),
        )
    };
    let (Some(name), Some(pdf), Some(font)) = args else {
        return ptr::null_mut();
    };
    let Some(rebuilder) = (unsafe { rebuilder(password) }) else {
        return ptr::null_mut();
    };

    into_handle(rebuilder.rebuild(name, pdf, font.to_vec()))
}

/// Like `pdf_rebuild_from_bytes`, with the font given as a base64 string.
#[no_mangle]
pub extern "C" fn pdf_rebuild_from_bytes_base64(
    name: *const c_char,
    data: *const u8,
    len: usize,
    font_base64: *const c_char,
    password: *const c_char,
) -> *mut PdfRebuildHandle {
    let args = unsafe {
        (
            str_arg(name, "name"),
            bytes_arg(data, len, "Data"),
            str_arg(font_base64, "font"),
        )
    };
    let (Some(name), Some(pdf), Some(font)) = args else {
        return ptr::null_mut();
    };
    let Some(rebuilder) = (unsafe { rebuilder(password) }) else {
        return ptr::null_mut();
    };

    into_handle(rebuilder.rebuild_base64(name, pdf, font))
}

#[no_mangle]
pub extern "C" fn pdf_rebuild_data(handle: *const PdfRebuildHandle) -> *const u8 {
    if handle.is_null() {
        set_last_error("Handle is null".to_string());
        return ptr::null();
    }
    let handle = unsafe { &*handle };
    handle.file.bytes.as_ptr()
}

#[no_mangle]
pub extern "C" fn pdf_rebuild_len(handle: *const PdfRebuildHandle) -> usize {
    if handle.is_null() {
        set_last_error("Handle is null".to_string());
        return 0;
    }
    let handle = unsafe { &*handle };
    handle.file.len()
}

/// Name of the rebuilt file. Borrowed from the handle.
#[no_mangle]
pub extern "C" fn pdf_rebuild_name(handle: *const PdfRebuildHandle) -> *const c_char {
    if handle.is_null() {
        set_last_error("Handle is null".to_string());
        return ptr::null();
    }
    let handle = unsafe { &*handle };
    handle.name.as_ptr()
}

/// Unix timestamp, in seconds, of the rebuild.
#[no_mangle]
pub extern "C" fn pdf_rebuild_last_modified(handle: *const PdfRebuildHandle) -> i64 {
    if handle.is_null() {
        set_last_error("Handle is null".to_string());
        return 0;
    }
    let handle = unsafe { &*handle };
    handle.file.last_modified.timestamp()
}

#[no_mangle]
pub extern "C" fn pdf_rebuild_free(handle: *mut PdfRebuildHandle) {
    if !handle.is_null() {
        unsafe {
            drop(Box::from_raw(handle));
        }
    }
}

/// Reconstruct the lines of every page without rebuilding.
#[no_mangle]
pub extern "C" fn pdf_reconstruct_from_bytes(
    data: *const u8,
    len: usize,
    password: *const c_char,
) -> *mut PdfLinesHandle {
    let Some(pdf) = (unsafe { bytes_arg(data, len, "Data") }) else {
        return ptr::null_mut();
    };
    let Some(rebuilder) = (unsafe { rebuilder(password) }) else {
        return ptr::null_mut();
    };

    match rebuilder.reconstruct(pdf) {
        Ok(pages) => {
            let lines = pages
                .into_iter()
                .flat_map(|PageLines { number, lines, .. }| {
                    lines.into_iter().map(move |line| (number, line))
                })
                .collect();
            Box::into_raw(Box::new(PdfLinesHandle { lines }))
        }
        Err(e) => {
            set_last_error(format!("Failed to reconstruct lines: {}", e));
            ptr::null_mut()
        }
    }
}

#[no_mangle]
pub extern "C" fn pdf_line_count(handle: *const PdfLinesHandle) -> usize {
    if handle.is_null() {
        set_last_error("Handle is null".to_string());
        return 0;
    }
    let handle = unsafe { &*handle };
    handle.lines.len()
}

/// Copy line `line_idx` into `out`. Returns 0 on success, -1 on error.
#[no_mangle]
pub extern "C" fn pdf_get_line(
    handle: *const PdfLinesHandle,
    line_idx: usize,
    out: *mut FfiLine,
) -> i32 {
    if handle.is_null() {
        set_last_error("Handle is null".to_string());
        return -1;
    }

    if out.is_null() {
        set_last_error("Output pointer is null".to_string());
        return -1;
    }

    let handle = unsafe { &*handle };

    let (page, line) = match handle.lines.get(line_idx) {
        Some(entry) => entry,
        None => {
            set_last_error(format!("Line index {} out of bounds", line_idx));
            return -1;
        }
    };

    unsafe {
        *out = FfiLine::from_line(line, *page);
    }

    0
}

#[no_mangle]
pub extern "C" fn pdf_lines_free(handle: *mut PdfLinesHandle) {
    if !handle.is_null() {
        unsafe {
            drop(Box::from_raw(handle));
        }
    }
}

#[no_mangle]
pub extern "C" fn pdf_string_free(s: *mut c_char) {
    if !s.is_null() {
        unsafe {
            drop(CString::from_raw(s));
        }
    }
}

#[no_mangle]
pub extern "C" fn pdf_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match e.borrow().as_ref() {
        Some(err) => err.as_ptr(),
        None => ptr::null(),
    })
}
