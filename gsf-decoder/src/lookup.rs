//! Static lookups for native status codes, record types and sensor models
//!
//! Every lookup here degrades to a fallback label instead of failing; the
//! strict `Option` variants are available for callers that want to treat
//! an unmapped code as an error themselves.

use std::borrow::Cow;

/// Fallback message for status codes missing from the table
pub const UNKNOWN_ERROR: &str = "Unknown GSF error";

const ERRORS: &[(i32, &str)] = &[
    (0, "Normal completion"),
    (-1, "Error opening file"),
    (-2, "Unrecognized file type"),
    (-3, "Bad access mode"),
    (-4, "Read error"),
    (-5, "Write error"),
    (-6, "Insufficient size"),
    (-7, "Record size error"),
    (-8, "Checksum failure"),
    (-9, "File close error"),
    (-10, "Too many array subrecords"),
    (-11, "Too many open files"),
    (-12, "Memory allocation failed"),
    (-13, "Unrecognized record ID"),
    (-14, "Stream decode failure"),
    (-15, "Bad seek option"),
    (-16, "File seek error"),
    (-17, "Unrecognized sensor ID"),
    (-18, "Unrecognized data record"),
    (-19, "Unrecognized array subrecord ID"),
    (-20, "Unrecognized subrecord ID"),
    (-21, "Illegal scale factor multiplier"),
    (-22, "Cannot represent precision"),
    (-23, "Read to end of file"),
    (-24, "Bad file handle"),
    (-25, "Header record decode failed"),
    (-26, "MB ping record decode failed"),
    (-27, "SVP record decode failed"),
    (-28, "Process param record decode failed"),
    (-29, "Sensor param record decode failed"),
    (-30, "Comment record decode failed"),
    (-31, "History record decode failed"),
    (-32, "Navigation error record decode failed"),
    (-33, "Set buffer size error"),
    (-34, "Flush error"),
    (-35, "File tell error"),
    (-36, "Index file open error"),
    (-37, "Corrupt index file error"),
    (-38, "Scale index calloc error"),
    (-39, "Record type not available"),
    (-40, "Summary record decode failed"),
    (-41, "Summary record encode failed"),
    (-42, "Invalid number of beams"),
    (-43, "Invalid record number"),
    (-44, "Index file read error"),
    (-45, "Parameter size fixed"),
];

const RECORD_TYPES: &[(i32, &str)] = &[
    (1, "Header record"),
    (2, "Swath bathymetry ping record"),
    (3, "Sound velocity profile record"),
    (4, "Processing parameters record"),
    (5, "Sensor parameters record"),
    (6, "Comment record"),
    (7, "History record"),
    (8, "Navigation error record (obsolete)"),
    (9, "Swath bathymetry summary record"),
    (10, "Single beam ping record"),
    (11, "Horizontal/Vertical navigation error record"),
    (12, "Attitude record"),
];

const SENSORS: &[(i32, &str)] = &[
    (141, "Kongsberg EM 1002"),
    (142, "Kongsberg EM 2000"),
    (143, "Kongsberg EM 3000"),
    (144, "Kongsberg EM 120"),
    (145, "Kongsberg EM 3002"),
    (146, "Kongsberg EM 3000D"),
    (147, "Kongsberg EM 3002D"),
    (148, "Kongsberg EM 121A"),
    (149, "Kongsberg EM 2040"),
    (150, "Imagenex Delta T"),
    (151, "R2Sonic model 2022"),
    (152, "R2Sonic model 2024"),
    (153, "R2Sonic model 2020"),
    (154, "Reson T Series"),
    (155, "Kongsberg KMALL"),
];

const SUBRECORDS: &[(i32, &str)] = &[
    (1, "Depth array"),
    (2, "Across track array"),
    (3, "Along track array"),
    (4, "Travel time array"),
    (5, "Beam angle array"),
    (6, "Mean calibrated amplitude array"),
    (7, "Mean relative amplitude array"),
    (8, "Echo width array"),
    (9, "Quality factor array"),
    (10, "Receive heave array"),
    (11, "Depth error array (obsolete)"),
    (12, "Across track error array (obsolete)"),
    (13, "Along track error array (obsolete)"),
    (14, "Nominal depth array"),
    (15, "Quality flags array"),
    (16, "Beam flags array"),
    (17, "Signal to noise array"),
    (18, "Beam angle forward array"),
    (19, "Vertical error array"),
    (20, "Horizontal error array"),
    (21, "Intensity series array"),
    (22, "Sector number array"),
    (23, "Detection info array"),
    (24, "Incident beam adjustment array"),
    (25, "System cleaning array"),
    (26, "Doppler correction array"),
    (27, "Sonar vertical uncertainty array"),
    (28, "Sonar horizontal uncertainty array"),
    (29, "Detection window array"),
    (30, "Mean absolute coefficient array"),
];

fn find(table: &'static [(i32, &'static str)], code: i32) -> Option<&'static str> {
    table
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, label)| *label)
}

/// Describe a native status code; unknown codes get [`UNKNOWN_ERROR`]
pub fn describe_error(code: i32) -> &'static str {
    find(ERRORS, code).unwrap_or(UNKNOWN_ERROR)
}

/// Strict record type lookup
pub fn record_type_name(code: i32) -> Option<&'static str> {
    find(RECORD_TYPES, code)
}

/// Label a record type code, falling back to a generic label
pub fn label_record_type(code: i32) -> Cow<'static, str> {
    match record_type_name(code) {
        Some(label) => Cow::Borrowed(label),
        None => {
            log::warn!("Unmapped record type code {}", code);
            Cow::Owned(format!("Unknown record type ({})", code))
        }
    }
}

/// Strict sensor model lookup
pub fn sensor_name(code: i32) -> Option<&'static str> {
    find(SENSORS, code)
}

/// Label a sensor id, falling back to a generic label
pub fn label_sensor(code: i32) -> Cow<'static, str> {
    match sensor_name(code) {
        Some(label) => Cow::Borrowed(label),
        None => {
            log::debug!("Unmapped sensor id {}", code);
            Cow::Owned(format!("Unknown sensor ({})", code))
        }
    }
}

/// Label a per-beam array subrecord id
pub fn label_subrecord(code: i32) -> &'static str {
    find(SUBRECORDS, code).unwrap_or("Unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_table_code_has_a_message() {
        for (code, _) in ERRORS {
            let message = describe_error(*code);
            assert!(!message.is_empty());
            assert_ne!(message, UNKNOWN_ERROR, "code {} fell through", code);
        }
        assert_eq!(ERRORS.len(), 46);
    }

    #[test]
    fn test_unknown_error_falls_back() {
        for code in [-46, -1000, 1, 42, i32::MIN, i32::MAX] {
            assert_eq!(describe_error(code), UNKNOWN_ERROR);
        }
    }

    #[test]
    fn test_known_labels() {
        assert_eq!(describe_error(-42), "Invalid number of beams");
        assert_eq!(label_record_type(2), "Swath bathymetry ping record");
        assert_eq!(label_sensor(149), "Kongsberg EM 2040");
        assert_eq!(label_subrecord(1), "Depth array");
        assert_eq!(label_subrecord(30), "Mean absolute coefficient array");
    }

    #[test]
    fn test_unmapped_codes_degrade() {
        assert_eq!(sensor_name(999), None);
        assert_eq!(label_sensor(999), "Unknown sensor (999)");
        assert_eq!(record_type_name(13), None);
        assert_eq!(label_record_type(13), "Unknown record type (13)");
        assert_eq!(label_subrecord(0), "Unknown");
    }
}
