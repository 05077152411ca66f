//! Native decoder backends
//!
//! The native GSF library is an external collaborator. This module defines
//! the narrow status-code contract the session layer drives, plus two
//! implementations of it:
//!
//! - [`LibGsf`]: the version-specific shared library loaded at open time
//! - [`JsonLinesReplay`]: replays a previously exported streaming-line file
//!
//! Status conventions follow the native library: open/close return 0 on
//! success, reads return a positive value with a payload, 0 at end of
//! stream, and a negative value on failure. After a `-1` the real error code
//! is fetched with [`NativeDecoder::last_error`].

use crate::config::{Capabilities, FileMode, FormatVersion, OpenOptions, OpenStyle};
use crate::types::Result;
use std::path::Path;

pub mod libgsf;
pub mod replay;

pub use libgsf::LibGsf;
pub use replay::JsonLinesReplay;

/// Handle returned by a successful native open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeHandle(pub i32);

/// The concrete native open call for one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenCall {
    /// `gsfOpen`, or `gsfOpenBuffered` when a buffer size is given
    Plain { buffer_size: Option<usize> },
    /// `gsfOpenForJson`
    ForJson {
        buffer_size: Option<usize>,
        include_denormalized_fields: bool,
    },
}

impl OpenCall {
    /// Pick the open call for a version's capabilities
    pub fn build(capabilities: &Capabilities, options: &OpenOptions) -> Self {
        if options.include_denormalized_fields && !capabilities.denormalized_fields {
            log::warn!("Denormalized fields are not supported by this GSF version; ignoring");
        }

        match capabilities.open_style {
            OpenStyle::Plain => OpenCall::Plain {
                buffer_size: options.buffer_size,
            },
            OpenStyle::ForJson => OpenCall::ForJson {
                buffer_size: options.buffer_size,
                include_denormalized_fields: options.include_denormalized_fields,
            },
        }
    }

    /// Native entry point this call resolves to
    pub fn function_name(&self) -> &'static str {
        match self {
            OpenCall::Plain { buffer_size: None } => "gsfOpen",
            OpenCall::Plain { buffer_size: Some(_) } => "gsfOpenBuffered",
            OpenCall::ForJson { .. } => "gsfOpenForJson",
        }
    }
}

/// Status-code level contract of the native decoder
///
/// The outer `Result` only reports failures of the backend itself (e.g. a
/// shared library that cannot be loaded); native failures travel as
/// negative status values.
pub trait NativeDecoder {
    /// Open `path`; returns the status and, on success, the handle
    fn open(
        &mut self,
        path: &Path,
        mode: FileMode,
        version: FormatVersion,
        call: &OpenCall,
    ) -> Result<(i32, NativeHandle)>;

    /// Read the next record matching `filter_code` (0 = any type)
    fn next_record(&mut self, handle: NativeHandle, filter_code: i32) -> Result<(i32, Option<Vec<u8>>)>;

    /// Count records of one type; indexed mode only
    fn count_records(&mut self, handle: NativeHandle, record_type_code: i32) -> Result<i32>;

    fn close(&mut self, handle: NativeHandle) -> Result<i32>;

    /// Most recent native error code
    fn last_error(&mut self) -> Result<i32>;
}

impl<T: NativeDecoder + ?Sized> NativeDecoder for Box<T> {
    fn open(
        &mut self,
        path: &Path,
        mode: FileMode,
        version: FormatVersion,
        call: &OpenCall,
    ) -> Result<(i32, NativeHandle)> {
        (**self).open(path, mode, version, call)
    }

    fn next_record(&mut self, handle: NativeHandle, filter_code: i32) -> Result<(i32, Option<Vec<u8>>)> {
        (**self).next_record(handle, filter_code)
    }

    fn count_records(&mut self, handle: NativeHandle, record_type_code: i32) -> Result<i32> {
        (**self).count_records(handle, record_type_code)
    }

    fn close(&mut self, handle: NativeHandle) -> Result<i32> {
        (**self).close(handle)
    }

    fn last_error(&mut self) -> Result<i32> {
        (**self).last_error()
    }
}
