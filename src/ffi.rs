//! C-compatible FFI API for cross-language bindings.
//!
//! # ABI Contract
//!
//! All exported functions use `extern "C"` calling convention and `#[no_mangle]`
//! to ensure stable symbol names.
//!
//! ## Handles
//! - A document is an opaque `HpdfDocument*` created by `hpdf_document_new`
//!   and released with `hpdf_document_free`.
//!
//! ## Memory management
//! - Strings returned through `out_*` parameters are allocated on the Rust
//!   heap and **must** be freed with `hpdf_free_string`.
//! - Passing a null pointer to a free function is a no-op.
//!
//! ## Error handling
//! - Functions that can fail return a `c_int` (0 = success, non-zero = error).
//! - Error details can be retrieved via `hpdf_last_error`.
//!
//! ## Thread safety
//! - `hpdf_last_error` uses a thread-local, so it is safe to call from
//!   multiple threads. A single document handle must not be used from two
//!   threads at once.
//!
//! ## Usage from Go (cgo)
//! ```go
//! // #cgo LDFLAGS: -lhtmltopdf
//! // #include "hpdf.h"
//! import "C"
//!
//! doc := C.hpdf_document_new(C.CString(`{"marginTop": 30}`), nil)
//! defer C.hpdf_document_free(doc)
//! C.hpdf_document_set_html(doc, C.HPDF_REGION_BODY, C.CString("<h1>Hi</h1>"))
//! var path *C.char
//! if C.hpdf_document_create_pdf(doc, &path) == 0 { defer C.hpdf_free_string(path) }
//! ```

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::path::Path;
use std::ptr;

use crate::config::Config;
use crate::document::{Document, Engine};
use crate::region::RegionKind;
use crate::settings::DocumentSettings;

const ERR_NULL: c_int = 1;
const ERR_UTF8: c_int = 2;
const ERR_OPERATION: c_int = 3;
const ERR_JSON: c_int = 4;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Borrow a C string as UTF-8, recording the error on failure.
///
/// # Safety
/// `p`, if non-null, must point to a valid null-terminated string that
/// outlives `'a`.
unsafe fn utf8<'a>(p: *const c_char) -> Result<&'a str, c_int> {
    if p.is_null() {
        set_last_error("Null pointer argument");
        return Err(ERR_NULL);
    }
    CStr::from_ptr(p).to_str().map_err(|e| {
        set_last_error(&format!("Invalid UTF-8: {e}"));
        ERR_UTF8
    })
}

fn into_c_string(s: String) -> Result<*mut c_char, c_int> {
    CString::new(s).map(CString::into_raw).map_err(|_| {
        set_last_error("String contained null byte");
        ERR_OPERATION
    })
}

/// Decode an optional JSON string array.
///
/// # Safety
/// `p`, if non-null, must point to a valid null-terminated string.
unsafe fn parse_params(p: *const c_char) -> Result<Vec<String>, c_int> {
    if p.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_str(utf8(p)?).map_err(|e| {
        set_last_error(&format!("Invalid parameter JSON: {e}"));
        ERR_JSON
    })
}

// ---------------------------------------------------------------------------
// C-compatible types
// ---------------------------------------------------------------------------

/// Document region selector.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub enum HpdfRegion {
    Header = 0,
    Body = 1,
    Footer = 2,
}

impl From<HpdfRegion> for RegionKind {
    fn from(r: HpdfRegion) -> Self {
        match r {
            HpdfRegion::Header => RegionKind::Header,
            HpdfRegion::Body => RegionKind::Body,
            HpdfRegion::Footer => RegionKind::Footer,
        }
    }
}

/// Opaque document handle.
pub struct HpdfDocument {
    inner: Document,
}

// ---------------------------------------------------------------------------
// Document lifecycle
// ---------------------------------------------------------------------------

/// Create a document.
///
/// # Parameters
/// - `settings_json`: document settings as a JSON object, or `NULL` for
///   defaults (e.g. `{"marginTop": 30, "showPageNumbers": false}`)
/// - `config_path`: converter config TOML file, or `NULL` to configure from
///   `HTMLTOPDF_*` environment variables only
///
/// # Returns
/// A handle, or `NULL` on error (see `hpdf_last_error`).
///
/// # Safety
/// Both arguments, if non-null, must be valid null-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn hpdf_document_new(
    settings_json: *const c_char,
    config_path: *const c_char,
) -> *mut HpdfDocument {
    let settings = if settings_json.is_null() {
        DocumentSettings::default()
    } else {
        let json = match utf8(settings_json) {
            Ok(s) => s,
            Err(_) => return ptr::null_mut(),
        };
        match DocumentSettings::from_json(json) {
            Ok(s) => s,
            Err(e) => {
                set_last_error(&format!("Invalid settings JSON: {e}"));
                return ptr::null_mut();
            }
        }
    };

    let config = if config_path.is_null() {
        Config::from_env()
    } else {
        let path = match utf8(config_path) {
            Ok(s) => s,
            Err(_) => return ptr::null_mut(),
        };
        match Config::load(Some(Path::new(path))) {
            Ok(c) => c,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    let inner = Engine::new(config).document(settings);
    Box::into_raw(Box::new(HpdfDocument { inner }))
}

/// Release a document handle. Produced files stay on disk.
///
/// # Safety
/// `doc` must come from `hpdf_document_new` and not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn hpdf_document_free(doc: *mut HpdfDocument) {
    if !doc.is_null() {
        drop(Box::from_raw(doc));
    }
}

/// Return the document id. Free with `hpdf_free_string`.
///
/// # Safety
/// `doc` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn hpdf_document_id(doc: *const HpdfDocument) -> *mut c_char {
    match doc.as_ref() {
        Some(d) => into_c_string(d.inner.id().to_string()).unwrap_or(ptr::null_mut()),
        None => {
            set_last_error("Null pointer argument");
            ptr::null_mut()
        }
    }
}

// ---------------------------------------------------------------------------
// Regions
// ---------------------------------------------------------------------------

/// Replace a region's HTML content.
///
/// # Safety
/// `doc` must be a live handle; `html` a valid null-terminated string.
#[no_mangle]
pub unsafe extern "C" fn hpdf_document_set_html(
    doc: *mut HpdfDocument,
    region: HpdfRegion,
    html: *const c_char,
) -> c_int {
    let Some(d) = doc.as_mut() else {
        set_last_error("Null pointer argument");
        return ERR_NULL;
    };
    match utf8(html) {
        Ok(html) => {
            d.inner.region_mut(region.into()).set_content(html);
            0
        }
        Err(code) => code,
    }
}

/// Replace a region's HTML content with the contents of a file.
///
/// # Safety
/// `doc` must be a live handle; `path` a valid null-terminated string.
#[no_mangle]
pub unsafe extern "C" fn hpdf_document_set_html_file(
    doc: *mut HpdfDocument,
    region: HpdfRegion,
    path: *const c_char,
) -> c_int {
    let Some(d) = doc.as_mut() else {
        set_last_error("Null pointer argument");
        return ERR_NULL;
    };
    let path = match utf8(path) {
        Ok(p) => p,
        Err(code) => return code,
    };
    match d.inner.region_mut(region.into()).set_content_from_file(path) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            ERR_OPERATION
        }
    }
}

/// Replace a region's inline CSS.
///
/// # Safety
/// `doc` must be a live handle; `css` a valid null-terminated string.
#[no_mangle]
pub unsafe extern "C" fn hpdf_document_set_css(
    doc: *mut HpdfDocument,
    region: HpdfRegion,
    css: *const c_char,
) -> c_int {
    let Some(d) = doc.as_mut() else {
        set_last_error("Null pointer argument");
        return ERR_NULL;
    };
    match utf8(css) {
        Ok(css) => {
            d.inner.region_mut(region.into()).set_css(css);
            0
        }
        Err(code) => code,
    }
}

/// Append a stylesheet file to a region. Fails when the file does not exist.
///
/// # Safety
/// `doc` must be a live handle; `path` a valid null-terminated string.
#[no_mangle]
pub unsafe extern "C" fn hpdf_document_add_css_file(
    doc: *mut HpdfDocument,
    region: HpdfRegion,
    path: *const c_char,
) -> c_int {
    let Some(d) = doc.as_mut() else {
        set_last_error("Null pointer argument");
        return ERR_NULL;
    };
    let path = match utf8(path) {
        Ok(p) => p,
        Err(code) => return code,
    };
    match d.inner.region_mut(region.into()).add_css_file(path) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            ERR_OPERATION
        }
    }
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// Convert the document to PDF.
///
/// # Parameters
/// - `out_path`: on success, receives the PDF path (free with
///   `hpdf_free_string`)
///
/// # Returns
/// `0` on success.
///
/// # Safety
/// `doc` must be a live handle; `out_path` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn hpdf_document_create_pdf(
    doc: *mut HpdfDocument,
    out_path: *mut *mut c_char,
) -> c_int {
    let Some(d) = doc.as_mut() else {
        set_last_error("Null pointer argument");
        return ERR_NULL;
    };
    if out_path.is_null() {
        set_last_error("Null pointer argument");
        return ERR_NULL;
    }

    match d.inner.create_pdf() {
        Ok(pdf) => match into_c_string(pdf.to_string_lossy().into_owned()) {
            Ok(s) => {
                *out_path = s;
                0
            }
            Err(code) => code,
        },
        Err(e) => {
            set_last_error(&e.to_string());
            ERR_OPERATION
        }
    }
}

/// Rasterize the document to JPEG image(s).
///
/// # Parameters
/// - `extra_params_json`: JSON array of extra converter parameters such as
///   `["-background white", "-alpha remove"]`, or `NULL` for none
/// - `delete_pdf`: remove the intermediate PDF afterwards
/// - `trim`: crop page margins
/// - `out_json`: on success, receives a JSON array of image paths in page
///   order (free with `hpdf_free_string`)
///
/// # Returns
/// `0` on success.
///
/// # Safety
/// `doc` must be a live handle; `out_json` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn hpdf_document_create_image(
    doc: *mut HpdfDocument,
    extra_params_json: *const c_char,
    delete_pdf: bool,
    trim: bool,
    out_json: *mut *mut c_char,
) -> c_int {
    let Some(d) = doc.as_mut() else {
        set_last_error("Null pointer argument");
        return ERR_NULL;
    };
    if out_json.is_null() {
        set_last_error("Null pointer argument");
        return ERR_NULL;
    }
    let extra = match parse_params(extra_params_json) {
        Ok(p) => p,
        Err(code) => return code,
    };

    match d.inner.create_image(delete_pdf, &extra, trim) {
        Ok(output) => {
            let paths: Vec<String> = output
                .paths()
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect();
            let json = serde_json::to_string(&paths).unwrap_or_default();
            match into_c_string(json) {
                Ok(s) => {
                    *out_json = s;
                    0
                }
                Err(code) => code,
            }
        }
        Err(e) => {
            set_last_error(&e.to_string());
            ERR_OPERATION
        }
    }
}

// ---------------------------------------------------------------------------
// Memory management
// ---------------------------------------------------------------------------

/// Free a string returned through an `out_*` parameter.
///
/// # Safety
/// `s` must have been returned by Rust's `CString::into_raw`.
#[no_mangle]
pub unsafe extern "C" fn hpdf_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = CString::from_raw(s);
    }
}

/// Retrieve the last error message. Returns a null-terminated string.
///
/// The returned pointer is valid until the next `hpdf_*` call on the same
/// thread. The caller should **not** free this pointer – it is managed
/// internally.
///
/// Returns null if no error has occurred.
#[no_mangle]
pub extern "C" fn hpdf_last_error() -> *const c_char {
    LAST_ERROR.with(|e| {
        let borrow = e.borrow();
        match borrow.as_ref() {
            Some(cs) => cs.as_ptr(),
            None => ptr::null(),
        }
    })
}

/// Return the library version as a null-terminated string.
/// The caller must **not** free this pointer.
#[no_mangle]
pub extern "C" fn hpdf_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const c_char
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn last_error() -> String {
        unsafe { CStr::from_ptr(hpdf_last_error()) }
            .to_str()
            .unwrap()
            .to_string()
    }

    #[test]
    fn ffi_version() {
        let v = hpdf_version();
        let version = unsafe { CStr::from_ptr(v) }.to_str().unwrap();
        assert_eq!(version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn ffi_invalid_settings_json() {
        let json = CString::new("{not json").unwrap();
        let doc = unsafe { hpdf_document_new(json.as_ptr(), ptr::null()) };
        assert!(doc.is_null());
        assert!(last_error().starts_with("Invalid settings JSON"));
    }

    #[test]
    fn ffi_null_handle() {
        let html = CString::new("<p>x</p>").unwrap();
        let rc = unsafe { hpdf_document_set_html(ptr::null_mut(), HpdfRegion::Body, html.as_ptr()) };
        assert_eq!(rc, ERR_NULL);
        assert!(unsafe { hpdf_document_id(ptr::null()) }.is_null());
    }

    #[test]
    fn ffi_regions_and_css_files() {
        let json = CString::new(r#"{"marginTop": 30}"#).unwrap();
        let doc = unsafe { hpdf_document_new(json.as_ptr(), ptr::null()) };
        assert!(!doc.is_null());

        let html = CString::new("<h1>Header</h1>").unwrap();
        let css = CString::new("h1 { color: red; }").unwrap();
        let missing = CString::new("/nonexistent/htmltopdf.css").unwrap();
        unsafe {
            assert_eq!(hpdf_document_set_html(doc, HpdfRegion::Header, html.as_ptr()), 0);
            assert_eq!(hpdf_document_set_css(doc, HpdfRegion::Header, css.as_ptr()), 0);
            assert_eq!(
                hpdf_document_add_css_file(doc, HpdfRegion::Footer, missing.as_ptr()),
                ERR_OPERATION
            );
            assert!(last_error().contains("/nonexistent/htmltopdf.css"));

            let d = &(*doc).inner;
            assert_eq!(d.settings().margin_top, 30.0);
            assert_eq!(d.region(RegionKind::Header).content(), "<h1>Header</h1>");
            assert_eq!(d.region(RegionKind::Header).css(), "h1 { color: red; }");

            let id = hpdf_document_id(doc);
            assert_eq!(CStr::from_ptr(id).to_str().unwrap(), d.id());
            hpdf_free_string(id);

            hpdf_document_free(doc);
        }
    }

    #[test]
    fn ffi_html_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let html_path = dir.path().join("footer.html");
        std::fs::write(&html_path, "<p>Footer</p>").unwrap();
        let path = CString::new(html_path.to_string_lossy().into_owned()).unwrap();
        let missing = CString::new("/nonexistent/footer.html").unwrap();

        let doc = unsafe { hpdf_document_new(ptr::null(), ptr::null()) };
        unsafe {
            assert_eq!(hpdf_document_set_html_file(doc, HpdfRegion::Footer, path.as_ptr()), 0);
            assert_eq!((*doc).inner.region(RegionKind::Footer).content(), "<p>Footer</p>");
            assert_eq!(
                hpdf_document_set_html_file(doc, HpdfRegion::Header, missing.as_ptr()),
                ERR_OPERATION
            );
            hpdf_document_free(doc);
        }
    }

    #[test]
    fn ffi_image_params_json() {
        let json = CString::new(r#"["-background white", "-alpha remove"]"#).unwrap();
        assert_eq!(
            unsafe { parse_params(json.as_ptr()) }.unwrap(),
            vec!["-background white", "-alpha remove"]
        );
        assert!(unsafe { parse_params(ptr::null()) }.unwrap().is_empty());

        let bad = CString::new(r#"{"not": "an array"}"#).unwrap();
        assert_eq!(unsafe { parse_params(bad.as_ptr()) }, Err(ERR_JSON));
        assert!(last_error().starts_with("Invalid parameter JSON"));
    }

    #[test]
    fn ffi_create_image_rejects_bad_params_before_converting() {
        let doc = unsafe { hpdf_document_new(ptr::null(), ptr::null()) };
        let bad = CString::new("[1, 2]").unwrap();
        let mut out: *mut c_char = ptr::null_mut();
        let rc = unsafe { hpdf_document_create_image(doc, bad.as_ptr(), false, true, &mut out) };
        assert_eq!(rc, ERR_JSON);
        assert!(out.is_null());
        unsafe { hpdf_document_free(doc) };
    }

    #[test]
    fn ffi_create_pdf_requires_out_pointer() {
        let doc = unsafe { hpdf_document_new(ptr::null(), ptr::null()) };
        assert!(!doc.is_null());
        let rc = unsafe { hpdf_document_create_pdf(doc, ptr::null_mut()) };
        assert_eq!(rc, ERR_NULL);
        unsafe { hpdf_document_free(doc) };
    }
}
