//! Decoder sessions
//!
//! A [`Session`] owns one open native handle for one file and one format
//! version. It turns native status codes into [`DecoderError`]s, decodes
//! payloads with the layout the version dictates, and closes the handle
//! when dropped.

use crate::codec::{self, PayloadFormat};
use crate::config::{Capabilities, FileMode, FormatVersion, SessionConfig};
use crate::native::{JsonLinesReplay, NativeDecoder, NativeHandle, OpenCall};
use crate::records::{Record, RecordType};
use crate::types::{DecoderError, Result};
use std::path::{Path, PathBuf};

const READ_TO_END_OF_FILE: i32 = -23;
const STREAM_DECODE_FAILURE: i32 = -14;

/// An undecoded payload as handed back by the native decoder
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub payload: Vec<u8>,
    pub format: PayloadFormat,
    /// 1-based position in this session's read order
    pub sequence: u64,
}

impl RawRecord {
    /// Decode and validate
    pub fn decode(&self) -> Result<Record> {
        let record = codec::decode(&self.payload, self.format)?;
        Ok(record.validate()?)
    }
}

/// One open file on one native backend
pub struct Session<B: NativeDecoder> {
    backend: B,
    handle: Option<NativeHandle>,
    path: PathBuf,
    config: SessionConfig,
    capabilities: Capabilities,
    records_read: u64,
}

impl Session<JsonLinesReplay> {
    /// Open an exported streaming-line file
    pub fn replay(path: &Path, config: SessionConfig) -> Result<Self> {
        Self::open(JsonLinesReplay::new(), path, config)
    }
}

impl<B: NativeDecoder> Session<B> {
    /// Open `path` on `backend` with the version-specific open call
    pub fn open(mut backend: B, path: &Path, config: SessionConfig) -> Result<Self> {
        let capabilities = config.version.capabilities();
        let call = OpenCall::build(&capabilities, &config.options);

        log::info!(
            "Opening GSF {} file ({:?} mode): {:?}",
            config.version,
            config.mode,
            path
        );

        let (status, handle) = backend.open(path, config.mode, config.version, &call)?;
        if status != 0 {
            let code = resolve_status(&mut backend, status)?;
            return Err(DecoderError::native(
                code,
                format!("{} {}", call.function_name(), path.display()),
            ));
        }

        log::debug!("Opened {:?} with handle {}", path, handle.0);

        Ok(Self {
            backend,
            handle: Some(handle),
            path: path.to_path_buf(),
            config,
            capabilities,
            records_read: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn version(&self) -> FormatVersion {
        self.config.version
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Payloads read so far
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    fn handle(&self) -> Result<NativeHandle> {
        self.handle.ok_or(DecoderError::SessionClosed)
    }

    /// Pull the next payload matching `filter` (`None` = any type)
    ///
    /// Returns `Ok(None)` at end of stream.
    pub fn next(&mut self, filter: Option<RecordType>) -> Result<Option<RawRecord>> {
        let handle = self.handle()?;
        let (status, payload) = self
            .backend
            .next_record(handle, RecordType::filter_code(filter))?;

        if status > 0 {
            let payload = payload
                .ok_or_else(|| DecoderError::native(STREAM_DECODE_FAILURE, "gsfNextJsonRecord"))?;
            self.records_read += 1;
            return Ok(Some(RawRecord {
                payload,
                format: self.capabilities.payload,
                sequence: self.records_read,
            }));
        }

        if status == 0 {
            log::debug!("End of stream after {} records", self.records_read);
            return Ok(None);
        }

        let code = resolve_status(&mut self.backend, status)?;
        if code == READ_TO_END_OF_FILE {
            // The native decoder cannot tell "end of file" from "no more
            // records of the filtered type"; both end the stream.
            log::debug!("Read to end of file after {} records", self.records_read);
            return Ok(None);
        }

        Err(DecoderError::native(code, "gsfNextJsonRecord"))
    }

    /// Pull, decode and validate the next record
    pub fn read(&mut self, filter: Option<RecordType>) -> Result<Option<Record>> {
        match self.next(filter)? {
            Some(raw) => raw.decode().map(Some),
            None => Ok(None),
        }
    }

    /// Number of records of one type in the file
    ///
    /// Only available on sessions opened in [`FileMode::Indexed`].
    pub fn count(&mut self, record_type: RecordType) -> Result<usize> {
        let handle = self.handle()?;
        if self.config.mode != FileMode::Indexed {
            return Err(DecoderError::NotIndexed("count"));
        }

        let status = self.backend.count_records(handle, record_type.code())?;
        if status < 0 {
            let code = resolve_status(&mut self.backend, status)?;
            return Err(DecoderError::native(code, "gsfGetNumberRecords"));
        }

        Ok(status as usize)
    }

    /// Release the native handle; closing twice is a no-op
    pub fn close(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        let status = self.backend.close(handle)?;
        if status != 0 {
            let code = resolve_status(&mut self.backend, status)?;
            return Err(DecoderError::native(code, "gsfClose"));
        }

        log::debug!("Closed {:?} after {} records", self.path, self.records_read);
        Ok(())
    }

    /// Iterate decoded records until end of stream or the first error
    pub fn records(&mut self, filter: Option<RecordType>) -> Records<'_, B> {
        Records {
            session: self,
            filter,
            done: false,
        }
    }
}

impl<B: NativeDecoder> Drop for Session<B> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Failed to close {:?}: {}", self.path, e);
        }
    }
}

/// `-1` means "look at the native error register"
fn resolve_status<B: NativeDecoder>(backend: &mut B, status: i32) -> Result<i32> {
    if status != -1 {
        return Ok(status);
    }
    let code = backend.last_error()?;
    Ok(if code == 0 { status } else { code })
}

/// Fused iterator over a session's records
pub struct Records<'s, B: NativeDecoder> {
    session: &'s mut Session<B>,
    filter: Option<RecordType>,
    done: bool,
}

impl<B: NativeDecoder> Iterator for Records<'_, B> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.session.read(self.filter) {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<B: NativeDecoder> std::iter::FusedIterator for Records<'_, B> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ErrorKind;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Backend that plays back a fixed script of read statuses
    #[derive(Default)]
    struct Scripted {
        open_status: i32,
        reads: VecDeque<(i32, Option<Vec<u8>>)>,
        last_error: i32,
        closes: Rc<Cell<usize>>,
    }

    impl NativeDecoder for Scripted {
        fn open(
            &mut self,
            _path: &Path,
            _mode: FileMode,
            _version: FormatVersion,
            _call: &OpenCall,
        ) -> Result<(i32, NativeHandle)> {
            Ok((self.open_status, NativeHandle(3)))
        }

        fn next_record(&mut self, handle: NativeHandle, _filter: i32) -> Result<(i32, Option<Vec<u8>>)> {
            assert_eq!(handle, NativeHandle(3));
            Ok(self.reads.pop_front().unwrap_or((0, None)))
        }

        fn count_records(&mut self, _handle: NativeHandle, record_type_code: i32) -> Result<i32> {
            Ok(record_type_code * 10)
        }

        fn close(&mut self, _handle: NativeHandle) -> Result<i32> {
            self.closes.set(self.closes.get() + 1);
            Ok(0)
        }

        fn last_error(&mut self) -> Result<i32> {
            Ok(self.last_error)
        }
    }

    fn comment_payload() -> Vec<u8> {
        br#"{"time":"2017-03-17T21:13:24Z","source_file_name":"a.gsf","record_id":6,
            "record_number":1,"record_type":6,"version":"GSF-v03.10",
            "body":{"comment_length":2,"comment":"ok"}}"#
            .to_vec()
    }

    fn open(backend: Scripted) -> Result<Session<Scripted>> {
        Session::open(backend, Path::new("survey.gsf"), SessionConfig::new())
    }

    #[test]
    fn test_open_failure_resolves_last_error() {
        let backend = Scripted {
            open_status: -1,
            last_error: -36,
            ..Default::default()
        };
        let err = open(backend).err().unwrap();
        assert_eq!(err.code(), Some(-36));
        assert!(err.to_string().contains("gsfOpenForJson"));
    }

    #[test]
    fn test_read_then_end_of_stream() {
        let mut backend = Scripted::default();
        backend.reads.push_back((120, Some(comment_payload())));
        backend.reads.push_back((-1, None));
        backend.last_error = READ_TO_END_OF_FILE;

        let mut session = open(backend).unwrap();
        let record = session.read(None).unwrap().unwrap();
        assert_eq!(record.record_type, RecordType::Comment);
        assert!(session.read(None).unwrap().is_none());
        assert_eq!(session.records_read(), 1);
    }

    #[test]
    fn test_native_error_code_is_preserved() {
        let mut backend = Scripted::default();
        backend.reads.push_back((-1, None));
        backend.last_error = -8;

        let mut session = open(backend).unwrap();
        let err = session.next(None).unwrap_err();
        assert_eq!(err.code(), Some(-8));
        assert_eq!(err.kind(), ErrorKind::Decoder);
    }

    #[test]
    fn test_positive_status_without_payload() {
        let mut backend = Scripted::default();
        backend.reads.push_back((10, None));
        let mut session = open(backend).unwrap();
        assert_eq!(session.next(None).unwrap_err().code(), Some(STREAM_DECODE_FAILURE));
    }

    #[test]
    fn test_records_iterator_stops_after_error() {
        let mut backend = Scripted::default();
        backend.reads.push_back((120, Some(comment_payload())));
        backend.reads.push_back((5, Some(b"{bad".to_vec())));
        backend.reads.push_back((120, Some(comment_payload())));

        let mut session = open(backend).unwrap();
        let results: Vec<_> = session.records(None).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut session = open(Scripted::default()).unwrap();
        session.close().unwrap();
        session.close().unwrap();
        assert!(!session.is_open());
        assert_eq!(session.backend.closes.get(), 1);
        assert!(matches!(session.next(None), Err(DecoderError::SessionClosed)));
        assert!(matches!(
            session.count(RecordType::Header),
            Err(DecoderError::SessionClosed)
        ));
    }

    #[test]
    fn test_drop_closes_the_handle() {
        let closes = Rc::new(Cell::new(0));
        let mut backend = Scripted {
            closes: Rc::clone(&closes),
            ..Default::default()
        };
        backend.reads.push_back((120, Some(comment_payload())));

        {
            let mut session = open(backend).unwrap();
            assert!(session.read(None).unwrap().is_some());
        }
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn test_drop_after_native_error_closes_once() {
        let closes = Rc::new(Cell::new(0));
        let mut backend = Scripted {
            closes: Rc::clone(&closes),
            last_error: -8,
            ..Default::default()
        };
        backend.reads.push_back((-1, None));

        let mut session = open(backend).unwrap();
        assert_eq!(session.next(None).unwrap_err().code(), Some(-8));
        assert!(session.is_open());
        drop(session);
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn test_drop_after_decode_error_in_iterator() {
        let closes = Rc::new(Cell::new(0));
        let mut backend = Scripted {
            closes: Rc::clone(&closes),
            ..Default::default()
        };
        backend.reads.push_back((5, Some(b"{bad".to_vec())));

        let mut session = open(backend).unwrap();
        let first = session.records(None).next().unwrap();
        assert!(first.is_err());
        drop(session);
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn test_explicit_close_then_drop_closes_once() {
        let closes = Rc::new(Cell::new(0));
        let backend = Scripted {
            closes: Rc::clone(&closes),
            ..Default::default()
        };

        let mut session = open(backend).unwrap();
        session.close().unwrap();
        drop(session);
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn test_count_needs_indexed_mode() {
        let mut session = open(Scripted::default()).unwrap();
        assert!(matches!(
            session.count(RecordType::SwathBathyPing),
            Err(DecoderError::NotIndexed(_))
        ));

        let mut indexed = Session::open(
            Scripted::default(),
            Path::new("survey.gsf"),
            SessionConfig::new().with_mode(FileMode::Indexed),
        )
        .unwrap();
        assert_eq!(indexed.count(RecordType::SwathBathyPing).unwrap(), 20);
    }
}
