//! Replay backend for exported streaming-line files
//!
//! Each non-blank line is one record payload, exactly as the native decoder
//! would have returned it. Status codes and `last_error` values mirror the
//! native library so sessions behave identically on either backend.

use super::{NativeDecoder, NativeHandle, OpenCall};
use crate::config::{FileMode, FormatVersion};
use crate::types::Result;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

const HANDLE: NativeHandle = NativeHandle(1);

const ERROR_OPEN: i32 = -1;
const ERROR_BAD_ACCESS_MODE: i32 = -3;
const ERROR_READ: i32 = -4;
const ERROR_TOO_MANY_OPEN_FILES: i32 = -11;
const ERROR_STREAM_DECODE: i32 = -14;
const ERROR_READ_TO_END_OF_FILE: i32 = -23;
const ERROR_BAD_FILE_HANDLE: i32 = -24;
const ERROR_CORRUPT_INDEX: i32 = -37;

/// Just enough of a payload to filter and index by type
#[derive(Deserialize)]
struct TypeProbe {
    record_type: i32,
}

struct OpenFile {
    reader: BufReader<File>,
    counts: Option<HashMap<i32, i32>>,
}

/// Serves records from a JSON-lines file, one open file at a time
#[derive(Default)]
pub struct JsonLinesReplay {
    file: Option<OpenFile>,
    last_error: i32,
}

impl JsonLinesReplay {
    pub fn new() -> Self {
        Self::default()
    }

    fn fail(&mut self, code: i32) -> i32 {
        self.last_error = code;
        -1
    }

    fn file_for(&mut self, handle: NativeHandle) -> Option<&mut OpenFile> {
        if handle != HANDLE {
            return None;
        }
        self.file.as_mut()
    }

    /// Per-type record counts, built by a full pass over the file
    fn index(path: &Path) -> std::result::Result<HashMap<i32, i32>, i32> {
        let reader = BufReader::new(File::open(path).map_err(|_| ERROR_OPEN)?);
        let mut counts = HashMap::new();

        for line in reader.lines() {
            let line = line.map_err(|_| ERROR_READ)?;
            if line.trim().is_empty() {
                continue;
            }
            let probe: TypeProbe = serde_json::from_str(&line).map_err(|_| ERROR_CORRUPT_INDEX)?;
            *counts.entry(probe.record_type).or_insert(0) += 1;
        }

        log::debug!("Indexed {} record types in {:?}", counts.len(), path);
        Ok(counts)
    }
}

impl NativeDecoder for JsonLinesReplay {
    fn open(
        &mut self,
        path: &Path,
        mode: FileMode,
        version: FormatVersion,
        call: &OpenCall,
    ) -> Result<(i32, NativeHandle)> {
        if self.file.is_some() {
            return Ok((self.fail(ERROR_TOO_MANY_OPEN_FILES), NativeHandle(0)));
        }

        log::debug!("Replaying {:?} as GSF {}", path, version);

        let counts = match mode {
            FileMode::Indexed => match Self::index(path) {
                Ok(counts) => Some(counts),
                Err(code) => return Ok((self.fail(code), NativeHandle(0))),
            },
            FileMode::Sequential => None,
        };

        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                log::debug!("Replay open failed: {}", e);
                return Ok((self.fail(ERROR_OPEN), NativeHandle(0)));
            }
        };

        let buffer_size = match *call {
            OpenCall::Plain { buffer_size } | OpenCall::ForJson { buffer_size, .. } => buffer_size,
        };
        let reader = match buffer_size {
            Some(size) => BufReader::with_capacity(size, file),
            None => BufReader::new(file),
        };

        self.file = Some(OpenFile { reader, counts });
        self.last_error = 0;
        Ok((0, HANDLE))
    }

    fn next_record(&mut self, handle: NativeHandle, filter_code: i32) -> Result<(i32, Option<Vec<u8>>)> {
        let Some(file) = self.file_for(handle) else {
            return Ok((self.fail(ERROR_BAD_FILE_HANDLE), None));
        };

        let mut line = String::new();
        loop {
            line.clear();
            let read = match file.reader.read_line(&mut line) {
                Ok(read) => read,
                Err(_) => return Ok((self.fail(ERROR_READ), None)),
            };
            if read == 0 {
                return Ok((self.fail(ERROR_READ_TO_END_OF_FILE), None));
            }

            let payload = line.trim();
            if payload.is_empty() {
                continue;
            }

            if filter_code != 0 {
                match serde_json::from_str::<TypeProbe>(payload) {
                    Ok(probe) if probe.record_type != filter_code => continue,
                    Ok(_) => {}
                    Err(_) => return Ok((self.fail(ERROR_STREAM_DECODE), None)),
                }
            }

            let status = i32::try_from(payload.len()).unwrap_or(i32::MAX);
            return Ok((status, Some(payload.as_bytes().to_vec())));
        }
    }

    fn count_records(&mut self, handle: NativeHandle, record_type_code: i32) -> Result<i32> {
        let Some(file) = self.file_for(handle) else {
            return Ok(self.fail(ERROR_BAD_FILE_HANDLE));
        };

        match &file.counts {
            Some(counts) => Ok(counts.get(&record_type_code).copied().unwrap_or(0)),
            None => Ok(self.fail(ERROR_BAD_ACCESS_MODE)),
        }
    }

    fn close(&mut self, handle: NativeHandle) -> Result<i32> {
        if self.file_for(handle).is_none() {
            return Ok(self.fail(ERROR_BAD_FILE_HANDLE));
        }
        self.file = None;
        Ok(0)
    }

    fn last_error(&mut self) -> Result<i32> {
        Ok(self.last_error)
    }
}
