//! FFI bindings to the native GSF library
//!
//! One shared library is built per format version and named
//! `libgsf-<arch>-<version>.so`. The library matching the session's
//! version is loaded when the session opens, so two sessions with
//! different versions never share symbol tables.

use super::{NativeDecoder, NativeHandle, OpenCall};
use crate::config::{FileMode, FormatVersion};
use crate::types::{DecoderError, Result};
use libloading::{Library, Symbol};
use std::ffi::{CStr, CString};
use std::io;
use std::os::raw::{c_char, c_int};
use std::path::{Path, PathBuf};

/// Return value of `gsfNextJsonRecord`
#[repr(C)]
struct NextJsonRecord {
    last_return_value: c_int,
    json_record: *const c_char,
}

type GsfOpenFn = unsafe extern "C" fn(*const c_char, c_int, *mut c_int) -> c_int;
type GsfOpenBufferedFn = unsafe extern "C" fn(*const c_char, c_int, *mut c_int, c_int) -> c_int;
type GsfOpenForJsonFn =
    unsafe extern "C" fn(*const c_char, c_int, *mut c_int, c_int, c_int, c_int) -> c_int;
type GsfNextJsonRecordFn = unsafe extern "C" fn(c_int, c_int) -> NextJsonRecord;
type GsfGetNumberRecordsFn = unsafe extern "C" fn(c_int, c_int) -> c_int;
type GsfCloseFn = unsafe extern "C" fn(c_int) -> c_int;
type GsfIntErrorFn = unsafe extern "C" fn() -> c_int;

/// Native GSF library, loaded lazily per format version
pub struct LibGsf {
    library_dir: PathBuf,
    library_file: Option<PathBuf>,
    loaded: Option<(FormatVersion, Library)>,
}

impl LibGsf {
    /// Look for versioned libraries in `library_dir`
    pub fn new(library_dir: impl Into<PathBuf>) -> Self {
        Self {
            library_dir: library_dir.into(),
            library_file: None,
            loaded: None,
        }
    }

    /// Use one explicit library file regardless of version
    pub fn with_library_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            library_dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            library_file: Some(path),
            loaded: None,
        }
    }

    /// Library file used for `version`
    pub fn library_path(&self, version: FormatVersion) -> PathBuf {
        match &self.library_file {
            Some(path) => path.clone(),
            None => self.library_dir.join(format!(
                "libgsf-{}-{}.so",
                std::env::consts::ARCH,
                version.tag()
            )),
        }
    }

    fn load(&mut self, version: FormatVersion) -> Result<&Library> {
        let reload = !matches!(&self.loaded, Some((loaded, _)) if *loaded == version);
        if reload {
            let path = self.library_path(version);
            log::info!("Loading GSF {} library: {:?}", version, path);
            // SAFETY: loading runs the library's initialisers; libgsf has none
            // with side effects beyond its own static state.
            let library = unsafe { Library::new(&path) }.map_err(|e| {
                DecoderError::Library(format!("cannot load {}: {}", path.display(), e))
            })?;
            self.loaded = Some((version, library));
        }

        self.library()
    }

    fn library(&self) -> Result<&Library> {
        self.loaded
            .as_ref()
            .map(|(_, library)| library)
            .ok_or_else(|| DecoderError::Library("no GSF library loaded".to_string()))
    }
}

fn symbol<'lib, T>(library: &'lib Library, name: &'static [u8]) -> Result<Symbol<'lib, T>> {
    // SAFETY: every call site pairs the symbol name with its C signature
    unsafe { library.get::<T>(name) }.map_err(|e| {
        let printable = String::from_utf8_lossy(&name[..name.len().saturating_sub(1)]);
        DecoderError::Library(format!("missing symbol {}: {}", printable, e))
    })
}

fn c_path(path: &Path) -> Result<CString> {
    let path_str = path.to_str().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, format!("Invalid UTF-8 in path: {:?}", path))
    })?;

    CString::new(path_str).map_err(|e| {
        DecoderError::IoError(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Failed to convert path to C string: {}", e),
        ))
    })
}

fn c_size(size: Option<usize>) -> c_int {
    size.map_or(0, |s| c_int::try_from(s).unwrap_or(c_int::MAX))
}

impl NativeDecoder for LibGsf {
    fn open(
        &mut self,
        path: &Path,
        mode: FileMode,
        version: FormatVersion,
        call: &OpenCall,
    ) -> Result<(i32, NativeHandle)> {
        let c_path = c_path(path)?;
        let library = self.load(version)?;
        let mut handle: c_int = 0;

        let status = match *call {
            OpenCall::Plain { buffer_size: None } => {
                let open = symbol::<GsfOpenFn>(library, b"gsfOpen\0")?;
                unsafe { open(c_path.as_ptr(), mode.native_code(), &mut handle) }
            }
            OpenCall::Plain { buffer_size: Some(size) } => {
                let open = symbol::<GsfOpenBufferedFn>(library, b"gsfOpenBuffered\0")?;
                unsafe { open(c_path.as_ptr(), mode.native_code(), &mut handle, c_size(Some(size))) }
            }
            OpenCall::ForJson {
                buffer_size,
                include_denormalized_fields,
            } => {
                let open = symbol::<GsfOpenForJsonFn>(library, b"gsfOpenForJson\0")?;
                // Flattening is done on the Rust side, never natively
                unsafe {
                    open(
                        c_path.as_ptr(),
                        mode.native_code(),
                        &mut handle,
                        c_size(buffer_size),
                        include_denormalized_fields as c_int,
                        0,
                    )
                }
            }
        };

        Ok((status, NativeHandle(handle)))
    }

    fn next_record(&mut self, handle: NativeHandle, filter_code: i32) -> Result<(i32, Option<Vec<u8>>)> {
        let library = self.library()?;
        let next = symbol::<GsfNextJsonRecordFn>(library, b"gsfNextJsonRecord\0")?;
        let reply = unsafe { next(handle.0, filter_code) };

        if reply.last_return_value <= 0 || reply.json_record.is_null() {
            return Ok((reply.last_return_value, None));
        }

        // The buffer belongs to the library and is reused by the next call
        let payload = unsafe { CStr::from_ptr(reply.json_record) }.to_bytes().to_vec();
        Ok((reply.last_return_value, Some(payload)))
    }

    fn count_records(&mut self, handle: NativeHandle, record_type_code: i32) -> Result<i32> {
        let library = self.library()?;
        let count = symbol::<GsfGetNumberRecordsFn>(library, b"gsfGetNumberRecords\0")?;
        Ok(unsafe { count(handle.0, record_type_code) })
    }

    fn close(&mut self, handle: NativeHandle) -> Result<i32> {
        let library = self.library()?;
        let close = symbol::<GsfCloseFn>(library, b"gsfClose\0")?;
        Ok(unsafe { close(handle.0) })
    }

    fn last_error(&mut self) -> Result<i32> {
        let library = self.library()?;
        let int_error = symbol::<GsfIntErrorFn>(library, b"gsfIntError\0")?;
        Ok(unsafe { int_error() })
    }
}
