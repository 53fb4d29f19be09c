//! S08 dispatch manifest parser.
//!
//! Manifests are fixed-width text files, one unit per line. Only "B" records
//! (record type byte at offset 25) describe vehicles; every other line —
//! headers, totals, other record types — is ignored. Fields live at fixed
//! byte offsets, padded with spaces. Lines are at least 180 bytes; the
//! engine number column extends past that minimum, so it is clamped to the
//! actual line length and may come back empty.

use tracing::debug;

const MIN_LINE_BYTES: usize = 180;
const RECORD_TYPE_POS: usize = 25;
const RECORD_TYPE: u8 = b'B';

const MODEL_CODE: (usize, usize) = (27, 38);
const VARIANT_CODE: (usize, usize) = (38, 45);
const COLOR_CODE: (usize, usize) = (45, 60);
const LOAD_REFERENCE: (usize, usize) = (84, 97);
const CHASSIS_NO: (usize, usize) = (113, 130);
const ENGINE_NO: (usize, usize) = (173, 186);

/// One vehicle line from a manifest, fields trimmed but still coded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRecord {
    pub model_code: String,
    pub variant_code: String,
    pub color_code: String,
    pub load_reference: String,
    pub chassis_no: String,
    pub engine_no: String,
}

/// Result of scanning a whole manifest file.
#[derive(Debug, Default)]
pub struct ParsedManifest {
    /// Well-formed vehicle records, in file order.
    pub records: Vec<ManifestRecord>,
    /// Qualifying lines dropped for missing a chassis or load reference.
    pub line_errors: usize,
}

enum LineClass {
    Ignored,
    Malformed,
    Record(ManifestRecord),
}

fn field(bytes: &[u8], (start, end): (usize, usize)) -> String {
    let end = end.min(bytes.len());
    if start >= end {
        return String::new();
    }
    String::from_utf8_lossy(&bytes[start..end]).trim().to_string()
}

fn classify(line: &str) -> LineClass {
    let bytes = line.as_bytes();
    if bytes.len() < MIN_LINE_BYTES || bytes[RECORD_TYPE_POS] != RECORD_TYPE {
        return LineClass::Ignored;
    }
    let chassis_no = field(bytes, CHASSIS_NO);
    let load_reference = field(bytes, LOAD_REFERENCE);
    if chassis_no.is_empty() || load_reference.is_empty() {
        return LineClass::Malformed;
    }
    LineClass::Record(ManifestRecord {
        model_code: field(bytes, MODEL_CODE),
        variant_code: field(bytes, VARIANT_CODE),
        color_code: field(bytes, COLOR_CODE),
        load_reference,
        chassis_no,
        engine_no: field(bytes, ENGINE_NO),
    })
}

/// Scan a manifest file, keeping well-formed vehicle records in file order
/// and counting malformed ones.
pub fn parse_manifest(text: &str) -> ParsedManifest {
    let mut parsed = ParsedManifest::default();
    for (line_no, raw) in text.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        match classify(line) {
            LineClass::Ignored => {}
            LineClass::Malformed => {
                debug!(
                    line = line_no + 1,
                    "Skipping manifest line without chassis or load reference"
                );
                parsed.line_errors += 1;
            }
            LineClass::Record(record) => parsed.records.push(record),
        }
    }
    parsed
}

/// Load reference of the first well-formed vehicle record, if any. Used to
/// decide whether an attachment's load is already in the system before
/// parsing it in full.
pub fn peek_load_reference(text: &str) -> Option<String> {
    for raw in text.lines() {
        let line = raw.trim_end_matches('\r');
        if let LineClass::Record(record) = classify(line) {
            return Some(record.load_reference);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(line: &mut [u8], start: usize, value: &str) {
        line[start..start + value.len()].copy_from_slice(value.as_bytes());
    }

    fn build_line(
        model_code: &str,
        variant_code: &str,
        color_code: &str,
        load_reference: &str,
        chassis_no: &str,
        engine_no: &str,
    ) -> String {
        let mut line = vec![b' '; 186];
        line[RECORD_TYPE_POS] = RECORD_TYPE;
        place(&mut line, MODEL_CODE.0, model_code);
        place(&mut line, VARIANT_CODE.0, variant_code);
        place(&mut line, COLOR_CODE.0, color_code);
        place(&mut line, LOAD_REFERENCE.0, load_reference);
        place(&mut line, CHASSIS_NO.0, chassis_no);
        place(&mut line, ENGINE_NO.0, engine_no);
        String::from_utf8(line).unwrap()
    }

    #[test]
    fn test_parses_all_fields_from_a_vehicle_line() {
        let line = build_line("M1", "V1", "C1", "LOAD001", "CH123", "ENG456");
        let parsed = parse_manifest(&line);
        assert_eq!(parsed.line_errors, 0);
        assert_eq!(
            parsed.records,
            vec![ManifestRecord {
                model_code: "M1".to_string(),
                variant_code: "V1".to_string(),
                color_code: "C1".to_string(),
                load_reference: "LOAD001".to_string(),
                chassis_no: "CH123".to_string(),
                engine_no: "ENG456".to_string(),
            }]
        );
    }

    #[test]
    fn test_short_lines_and_other_record_types_are_ignored() {
        let short = "B".repeat(179);
        let mut bytes = build_line("M1", "V1", "C1", "LOAD001", "CH123", "ENG456").into_bytes();
        bytes[RECORD_TYPE_POS] = b'A';
        let not_b = String::from_utf8(bytes).unwrap();
        let header = "S08 DISPATCH ADVICE 2026-08-01";

        let text = format!("{header}\n{short}\n{not_b}\n");
        let parsed = parse_manifest(&text);
        assert!(parsed.records.is_empty());
        assert_eq!(parsed.line_errors, 0, "non-qualifying lines are not errors");
    }

    #[test]
    fn test_line_of_exactly_minimum_length_clamps_engine_column() {
        let full = build_line("M1", "V1", "C1", "LOAD001", "CH123", "ENG4567890123");
        let clamped: String = full.chars().take(MIN_LINE_BYTES).collect();

        let parsed = parse_manifest(&clamped);
        assert_eq!(parsed.records.len(), 1);
        // Engine column runs 173..186; only 173..180 survives the clamp.
        assert_eq!(parsed.records[0].engine_no, "ENG4567");
        assert_eq!(parsed.records[0].chassis_no, "CH123");
    }

    #[test]
    fn test_malformed_lines_are_counted_and_skipped_in_order() {
        let good_a = build_line("M1", "V1", "C1", "LOAD001", "CH001", "E1");
        let no_chassis = build_line("M1", "V1", "C1", "LOAD001", "", "E2");
        let good_b = build_line("M2", "V2", "C2", "LOAD001", "CH002", "E3");
        let no_load = build_line("M1", "V1", "C1", "", "CH003", "E4");

        let text = format!("{good_a}\n{no_chassis}\n{good_b}\n{no_load}\n");
        let parsed = parse_manifest(&text);
        assert_eq!(parsed.line_errors, 2);
        let chassis: Vec<&str> =
            parsed.records.iter().map(|r| r.chassis_no.as_str()).collect();
        assert_eq!(chassis, vec!["CH001", "CH002"]);
    }

    #[test]
    fn test_peek_skips_malformed_lines() {
        let no_chassis = build_line("M1", "V1", "C1", "LOAD001", "", "E1");
        let good = build_line("M1", "V1", "C1", "LOAD002", "CH001", "E2");
        let text = format!("{no_chassis}\n{good}\n");

        assert_eq!(peek_load_reference(&text), Some("LOAD002".to_string()));
        assert_eq!(peek_load_reference("no vehicle lines here\n"), None);
    }

    #[test]
    fn test_carriage_returns_are_stripped() {
        let line = build_line("M1", "V1", "C1", "LOAD001", "CH123", "ENG456");
        let text = format!("{line}\r\n{line}\r\n");

        let parsed = parse_manifest(&text);
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[1].engine_no, "ENG456");
    }
}
