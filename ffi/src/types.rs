use std::ffi::CString;
use std::os::raw::c_char;

/// One reconstructed line. `text` is owned by the caller and must be
/// released with `pdf_string_free`.
#[repr(C)]
pub struct FfiLine {
    pub text: *mut c_char,
    pub x: f64,
    pub anchor_y: f64,
    pub font_size: f64,
    pub page: u32,
}

impl FfiLine {
    pub fn from_line(line: &pdf_rebuild::Line, page: u32) -> Self {
        // Interior NULs cannot cross the C boundary.
        let text = CString::new(line.combined_text().replace('\0', "")).unwrap_or_default();

        FfiLine {
            text: text.into_raw(),
            x: line.x(),
            anchor_y: line.anchor_y,
            font_size: line.representative_font_size(),
            page,
        }
    }
}
