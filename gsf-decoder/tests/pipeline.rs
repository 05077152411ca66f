// End-to-end runs over exported JSON-lines fixtures
use gsf_decoder::{
    load_all, CsvSink, DecoderError, ErrorKind, FileMode, FormatVersion, JsonLinesSink, Pipeline,
    Record, RecordType, SchemaError, Session, SessionConfig, SinkShape,
};
use serde_json::{json, Value};
use std::io::Write;
use tempfile::NamedTempFile;

fn meta(record_type: i32, record_number: u64) -> Value {
    json!({
        "time": format!("2017-03-17T21:13:{:02}Z", 20 + record_number),
        "source_file_name": "16mbs17076_211324_p_100.gsf",
        "record_id": record_type,
        "record_number": record_number,
        "record_type": record_type,
        "version": "GSF-v03.10",
        "location": {"latitude": 53.25, "longitude": -4.5},
    })
}

fn enveloped(record_type: i32, record_number: u64, body: Value) -> Value {
    let mut record = meta(record_type, record_number);
    record["body"] = body;
    record
}

fn ping_body(depth: &[f64]) -> Value {
    json!({
        "height": 1.5, "sep": 0.25, "number_beams": depth.len(), "center_beam": 1,
        "reserved": 0, "tide_corrector": 0.1, "gps_tide_corrector": 0.2,
        "depth_corrector": 0.3, "heading": 90.0, "pitch": 0.5, "roll": -0.5,
        "heave": 0.01, "course": 91.0, "speed": 4.5,
        "depth": depth, "nominal_depth": null,
        "sensor_id": 149,
    })
}

fn summary_body() -> Value {
    json!({
        "start_time": "2017-03-17T21:13:24Z",
        "end_time": "2017-03-17T21:15:00Z",
        "min_location": {"latitude": 53.0, "longitude": -4.75},
        "max_location": {"latitude": 53.5, "longitude": -4.25},
        "min_depth": 1.0,
        "max_depth": 9.0,
    })
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn write_lines(values: &[Value]) -> NamedTempFile {
    init_logging();
    let mut file = NamedTempFile::new().unwrap();
    for value in values {
        writeln!(file, "{}", value).unwrap();
    }
    file.flush().unwrap();
    file
}

/// 1 header, 3 pings, 1 summary
fn survey() -> NamedTempFile {
    write_lines(&[
        enveloped(1, 1, json!({"version": "GSF-v03.10"})),
        enveloped(2, 2, ping_body(&[1.0, 2.0, 3.0])),
        enveloped(2, 3, ping_body(&[4.0, 5.0, 6.0])),
        enveloped(2, 4, ping_body(&[7.0, 8.0, 9.0])),
        enveloped(9, 5, summary_body()),
    ])
}

#[test]
fn indexed_counts() {
    let file = survey();
    let config = SessionConfig::new().with_mode(FileMode::Indexed);
    let mut session = Session::replay(file.path(), config).unwrap();

    assert_eq!(session.count(RecordType::SwathBathyPing).unwrap(), 3);
    assert_eq!(session.count(RecordType::SwathBathySummary).unwrap(), 1);
    assert_eq!(session.count(RecordType::Attitude).unwrap(), 0);
}

#[test]
fn sequential_read_yields_every_record() {
    let file = survey();
    let mut session = Session::replay(file.path(), SessionConfig::new()).unwrap();

    let types: Vec<RecordType> = session
        .records(None)
        .map(|r| r.unwrap().record_type)
        .collect();
    assert_eq!(
        types,
        vec![
            RecordType::Header,
            RecordType::SwathBathyPing,
            RecordType::SwathBathyPing,
            RecordType::SwathBathyPing,
            RecordType::SwathBathySummary,
        ]
    );
    assert!(session.read(None).unwrap().is_none());
}

#[test]
fn filtered_read_and_limit() {
    let file = survey();
    let mut session = Session::replay(file.path(), SessionConfig::new()).unwrap();
    let pings = load_all(&mut session, Some(RecordType::SwathBathyPing), None).unwrap();
    assert_eq!(pings.len(), 3);
    assert_eq!(pings.count_of(RecordType::SwathBathyPing), 3);

    let mut session = Session::replay(file.path(), SessionConfig::new()).unwrap();
    let first_two = load_all(&mut session, None, Some(2)).unwrap();
    assert_eq!(first_two.len(), 2);
}

#[test]
fn csv_outputs() {
    let file = survey();
    let mut session = Session::replay(file.path(), SessionConfig::new()).unwrap();

    let mut unflattened = CsvSink::from_writer(Vec::new(), SinkShape::Unflattened);
    let mut flattened = CsvSink::from_writer(Vec::new(), SinkShape::Flattened);
    let stats = Pipeline::new()
        .run(&mut session, &mut [&mut unflattened, &mut flattened])
        .unwrap();

    assert_eq!(stats.records_read, 5);
    assert_eq!(stats.pings, 3);
    assert_eq!(stats.by_type[&RecordType::SwathBathyPing], 3);
    assert_eq!(unflattened.skipped(), 2);

    let unflattened = String::from_utf8(unflattened.into_inner().unwrap()).unwrap();
    let lines: Vec<&str> = unflattened.lines().collect();
    assert_eq!(lines.len(), 1 + 3);
    assert!(lines[0].starts_with("time,latitude,longitude,height,number_beams"));
    assert!(lines[0].ends_with(",sensor_id,depth"));
    assert!(!lines[0].contains("nominal_depth"));
    assert!(!lines[0].contains("sep"));
    assert!(lines[1].ends_with("\"[1.0, 2.0, 3.0]\""));

    let flattened = String::from_utf8(flattened.into_inner().unwrap()).unwrap();
    let mut reader = csv::Reader::from_reader(flattened.as_bytes());
    let headers = reader.headers().unwrap().clone();
    let depth = headers.iter().position(|h| h == "depth").unwrap();
    let depths: Vec<String> = reader
        .records()
        .map(|r| r.unwrap()[depth].to_string())
        .collect();
    assert_eq!(depths, vec!["1.0", "2.0", "3.0", "4.0", "5.0", "6.0", "7.0", "8.0", "9.0"]);
}

#[test]
fn json_lines_round_trip() {
    let file = survey();
    let mut session = Session::replay(file.path(), SessionConfig::new()).unwrap();
    let original = load_all(&mut session, None, None).unwrap();

    let mut sink = JsonLinesSink::from_writer(Vec::new(), SinkShape::Records);
    Pipeline::new()
        .run_collection(&original, &mut [&mut sink])
        .unwrap();

    let output = String::from_utf8(sink.into_inner()).unwrap();
    let decoded: Vec<Record> = output
        .lines()
        .map(|line| Record::from_json_line(line).unwrap())
        .collect();
    assert_eq!(decoded, original.records);

    // Exported lines replay as-is
    let exported = write_lines(
        &output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect::<Vec<Value>>(),
    );
    let mut replayed = Session::replay(exported.path(), SessionConfig::new()).unwrap();
    assert_eq!(load_all(&mut replayed, None, None).unwrap(), original);
}

#[test]
fn flattened_json_lines_hold_only_beam_rows() {
    let file = survey();
    let mut session = Session::replay(file.path(), SessionConfig::new()).unwrap();

    let mut sink = JsonLinesSink::from_writer(Vec::new(), SinkShape::Flattened);
    let stats = Pipeline::new().run(&mut session, &mut [&mut sink]).unwrap();
    assert_eq!(stats.rows_written, 9);
    assert_eq!(sink.skipped(), 2);

    let output = String::from_utf8(sink.into_inner()).unwrap();
    let rows: Vec<Value> = output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(rows.len(), 9);
    for row in &rows {
        assert!(row.get("body").is_none());
        assert!(row["depth"].is_f64());
    }
    assert_eq!(rows[8]["depth"], json!(9.0));
}

#[test]
fn text_quality_flags_and_scalar_snr_are_accepted() {
    let mut ping = ping_body(&[1.0, 2.0, 3.0]);
    ping["quality_flags"] = json!("000");
    ping["signal_to_noise"] = json!(12.5);
    let file = write_lines(&[
        enveloped(1, 1, json!({"version": "GSF-v03.10"})),
        enveloped(2, 2, ping),
    ]);

    let mut session = Session::replay(file.path(), SessionConfig::new()).unwrap();
    let mut sink = CsvSink::from_writer(Vec::new(), SinkShape::Flattened);
    let stats = Pipeline::new().run(&mut session, &mut [&mut sink]).unwrap();
    assert_eq!(stats.pings, 1);

    let output = String::from_utf8(sink.into_inner().unwrap()).unwrap();
    let mut reader = csv::Reader::from_reader(output.as_bytes());
    let headers = reader.headers().unwrap().clone();
    let flags = headers.iter().position(|h| h == "quality_flags").unwrap();
    let snr = headers.iter().position(|h| h == "signal_to_noise").unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| &r[flags] == "0" && &r[snr] == "12.5"));
}

#[test]
fn slotted_payloads_for_oldest_version() {
    let mut header = meta(1, 1);
    header["header"] = json!({"version": "GSF-v03.08"});
    let mut ping = meta(2, 2);
    ping["mb_ping"] = ping_body(&[1.0, 2.0]);
    let file = write_lines(&[header, ping]);

    let config = SessionConfig::new().with_version(FormatVersion::V1);
    let mut session = Session::replay(file.path(), config).unwrap();
    let records = load_all(&mut session, None, None).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records.records[1].ping().unwrap().number_beams, 2);

    // The same lines are not valid enveloped payloads
    let mut session = Session::replay(file.path(), SessionConfig::new()).unwrap();
    let err = session.read(None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaValidation);
}

#[test]
fn count_needs_indexed_session() {
    let file = survey();
    let mut session = Session::replay(file.path(), SessionConfig::new()).unwrap();
    let err = session.count(RecordType::SwathBathyPing).unwrap_err();
    assert!(matches!(err, DecoderError::NotIndexed(_)));
    assert_eq!(err.kind(), ErrorKind::Resource);
}

#[test]
fn reads_after_close_fail() {
    let file = survey();
    let mut session = Session::replay(file.path(), SessionConfig::new()).unwrap();
    assert!(session.read(None).unwrap().is_some());
    session.close().unwrap();
    session.close().unwrap();
    assert!(matches!(session.read(None), Err(DecoderError::SessionClosed)));
}

#[test]
fn missing_file_reports_native_code() {
    let err = Session::replay(
        std::path::Path::new("/nonexistent/survey.jsonl"),
        SessionConfig::new(),
    )
    .err()
    .unwrap();
    assert_eq!(err.code(), Some(-1));
    assert_eq!(err.kind(), ErrorKind::Decoder);
}

#[test]
fn beam_count_mismatch_aborts_the_run() {
    let mut bad = ping_body(&[1.0, 2.0, 3.0]);
    bad["number_beams"] = json!(4);
    let file = write_lines(&[
        enveloped(1, 1, json!({"version": "GSF-v03.10"})),
        enveloped(2, 2, bad),
        enveloped(2, 3, ping_body(&[4.0, 5.0, 6.0])),
    ]);

    let mut session = Session::replay(file.path(), SessionConfig::new()).unwrap();
    let mut sink = CsvSink::from_writer(Vec::new(), SinkShape::Flattened);
    let err = Pipeline::new()
        .run(&mut session, &mut [&mut sink])
        .unwrap_err();

    assert!(matches!(
        err,
        DecoderError::Schema(SchemaError::BeamCountMismatch {
            field: "depth",
            expected: 4,
            actual: 3,
        })
    ));
    assert_eq!(session.records_read(), 2);
}
