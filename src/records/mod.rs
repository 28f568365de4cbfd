//! CSV row codecs for logging and replay
//!
//! Column order is the contract; converters emit no header rows. Numbers
//! are formatted with Rust's shortest round-trip notation so that
//! `from_row(to_row(x)) == x` holds bit-for-bit, including when the row
//! arrives with every field as a string. File handling is the caller's
//! concern; these codecs only encode and decode rows.

use crate::core::types::{
    DwmDistanceAndPosition, DwmLocationResponse, DwmPosition, PositionInput,
};
use crate::math::{Quaternion, Vector};
use std::fmt;

/// Result type for row codecs
pub type RecordResult<T> = Result<T, RecordError>;

/// Row decoding errors
#[derive(Debug, Clone, PartialEq)]
pub enum RecordError {
    /// Row has the wrong number of columns for this record type
    ColumnCount { expected: String, actual: usize },
    /// A column failed to parse
    MalformedField {
        column: usize,
        value: String,
        reason: String,
    },
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::ColumnCount { expected, actual } => {
                write!(f, "expected {} columns, got {}", expected, actual)
            }
            RecordError::MalformedField {
                column,
                value,
                reason,
            } => {
                write!(f, "column {} value '{}': {}", column, value, reason)
            }
        }
    }
}

impl std::error::Error for RecordError {}

/// Bit-exact row codec for one record type
pub trait CsvRecord: Sized {
    /// Encode as an ordered list of column values
    fn to_row(&self) -> Vec<String>;

    /// Decode from an ordered list of column values
    fn from_row(row: &[&str]) -> RecordResult<Self>;
}

fn parse_f64(row: &[&str], column: usize) -> RecordResult<f64> {
    row[column]
        .trim()
        .parse()
        .map_err(|_| RecordError::MalformedField {
            column,
            value: row[column].to_string(),
            reason: "not a number".to_string(),
        })
}

fn parse_u32(row: &[&str], column: usize) -> RecordResult<u32> {
    row[column]
        .trim()
        .parse()
        .map_err(|_| RecordError::MalformedField {
            column,
            value: row[column].to_string(),
            reason: "not an unsigned integer".to_string(),
        })
}

fn parse_u8(row: &[&str], column: usize) -> RecordResult<u8> {
    row[column]
        .trim()
        .parse()
        .map_err(|_| RecordError::MalformedField {
            column,
            value: row[column].to_string(),
            reason: "not a byte value".to_string(),
        })
}

fn check_len(row: &[&str], expected: usize, type_name: &str) -> RecordResult<()> {
    if row.len() != expected {
        return Err(RecordError::ColumnCount {
            expected: format!("{} ({})", expected, type_name),
            actual: row.len(),
        });
    }
    Ok(())
}

/// Reverse the byte order of a hex string ("CDAB" <-> "ABCD")
///
/// Anchor ids appear byte-reversed in rows (wire order); the in-memory
/// representation uses display order. The reversal is its own inverse.
fn reverse_hex_bytes(value: &str, column: usize) -> RecordResult<String> {
    let malformed = |reason: &str| RecordError::MalformedField {
        column,
        value: value.to_string(),
        reason: reason.to_string(),
    };
    if value.is_empty() || value.len() % 2 != 0 {
        return Err(malformed("hex id must have an even, non-zero number of digits"));
    }
    if !value.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(malformed("not a hex id"));
    }
    let bytes = value.as_bytes();
    let mut reversed = String::with_capacity(value.len());
    for pair in bytes.chunks(2).rev() {
        reversed.push(pair[0] as char);
        reversed.push(pair[1] as char);
    }
    Ok(reversed)
}

impl CsvRecord for Vector {
    fn to_row(&self) -> Vec<String> {
        vec![self.x.to_string(), self.y.to_string(), self.z.to_string()]
    }

    fn from_row(row: &[&str]) -> RecordResult<Self> {
        check_len(row, 3, "Vector")?;
        Ok(Vector::new(
            parse_f64(row, 0)?,
            parse_f64(row, 1)?,
            parse_f64(row, 2)?,
        ))
    }
}

impl CsvRecord for Quaternion {
    fn to_row(&self) -> Vec<String> {
        vec![
            self.w.to_string(),
            self.i.to_string(),
            self.j.to_string(),
            self.k.to_string(),
        ]
    }

    fn from_row(row: &[&str]) -> RecordResult<Self> {
        check_len(row, 4, "Quaternion")?;
        Ok(Quaternion::new(
            parse_f64(row, 0)?,
            parse_f64(row, 1)?,
            parse_f64(row, 2)?,
            parse_f64(row, 3)?,
        ))
    }
}

/// Encode an optional field group: absent groups become empty columns
fn push_optional(row: &mut Vec<String>, columns: usize, encoded: Option<Vec<String>>) {
    match encoded {
        Some(mut cols) => row.append(&mut cols),
        None => row.extend(std::iter::repeat(String::new()).take(columns)),
    }
}

/// Decode an optional field group starting at `offset`: all columns empty
/// means absent, otherwise every column must parse
fn optional_group<T>(
    row: &[&str],
    offset: usize,
    columns: usize,
    decode: impl Fn(&[&str]) -> RecordResult<T>,
) -> RecordResult<Option<T>> {
    let group = &row[offset..offset + columns];
    if group.iter().all(|field| field.trim().is_empty()) {
        return Ok(None);
    }
    // Shift reported column indices to this group's position in the row
    decode(group)
        .map(Some)
        .map_err(|err| match err {
            RecordError::MalformedField {
                column,
                value,
                reason,
            } => RecordError::MalformedField {
                column: column + offset,
                value,
                reason,
            },
            other => other,
        })
}

impl CsvRecord for PositionInput {
    fn to_row(&self) -> Vec<String> {
        let mut row = Vec::with_capacity(13);
        push_optional(&mut row, 4, self.attitude.map(|q| q.to_row()));
        push_optional(&mut row, 3, self.acceleration.map(|v| v.to_row()));
        push_optional(&mut row, 3, self.velocity.map(|v| v.to_row()));
        push_optional(&mut row, 3, self.position.map(|v| v.to_row()));
        row
    }

    fn from_row(row: &[&str]) -> RecordResult<Self> {
        check_len(row, 13, "PositionInput")?;
        Ok(PositionInput {
            attitude: optional_group(row, 0, 4, Quaternion::from_row)?,
            acceleration: optional_group(row, 4, 3, Vector::from_row)?,
            velocity: optional_group(row, 7, 3, Vector::from_row)?,
            position: optional_group(row, 10, 3, Vector::from_row)?,
        })
    }
}

impl CsvRecord for DwmPosition {
    fn to_row(&self) -> Vec<String> {
        vec![
            self.x.to_string(),
            self.y.to_string(),
            self.z.to_string(),
            self.quality_factor.to_string(),
        ]
    }

    fn from_row(row: &[&str]) -> RecordResult<Self> {
        check_len(row, 4, "DwmPosition")?;
        Ok(DwmPosition::new(
            parse_f64(row, 0)?,
            parse_f64(row, 1)?,
            parse_f64(row, 2)?,
            parse_u8(row, 3)?,
        ))
    }
}

impl CsvRecord for DwmDistanceAndPosition {
    /// Columns: anchor_id (byte-reversed hex), anchor_address,
    /// quality_factor, anchor x, y, z, distance_mm. The quality factor
    /// column applies to both the measurement and the anchor position.
    fn to_row(&self) -> Vec<String> {
        // Encoding re-applies the byte reversal; ids are validated hex so
        // this cannot fail for values built through from_row
        let wire_id = reverse_hex_bytes(&self.anchor_id, 0)
            .unwrap_or_else(|_| self.anchor_id.clone());
        vec![
            wire_id,
            self.anchor_address.to_string(),
            self.quality_factor.to_string(),
            self.anchor_position.x.to_string(),
            self.anchor_position.y.to_string(),
            self.anchor_position.z.to_string(),
            self.distance_mm.to_string(),
        ]
    }

    fn from_row(row: &[&str]) -> RecordResult<Self> {
        check_len(row, 7, "DwmDistanceAndPosition")?;
        let quality_factor = parse_u8(row, 2)?;
        Ok(DwmDistanceAndPosition {
            anchor_id: reverse_hex_bytes(row[0].trim(), 0)?,
            anchor_address: parse_u32(row, 1)?,
            quality_factor,
            anchor_position: DwmPosition::new(
                parse_f64(row, 3)?,
                parse_f64(row, 4)?,
                parse_f64(row, 5)?,
                quality_factor,
            ),
            distance_mm: parse_f64(row, 6)?,
        })
    }
}

impl CsvRecord for DwmLocationResponse {
    /// Columns: tag position (4, empty when absent) followed by 7 per
    /// visible anchor
    fn to_row(&self) -> Vec<String> {
        let mut row = Vec::with_capacity(4 + 7 * self.anchors.len());
        push_optional(&mut row, 4, self.position.map(|p| p.to_row()));
        for anchor in &self.anchors {
            row.append(&mut anchor.to_row());
        }
        row
    }

    fn from_row(row: &[&str]) -> RecordResult<Self> {
        if row.len() < 4 || (row.len() - 4) % 7 != 0 {
            return Err(RecordError::ColumnCount {
                expected: "4 + 7n (DwmLocationResponse)".to_string(),
                actual: row.len(),
            });
        }
        let position = optional_group(row, 0, 4, DwmPosition::from_row)?;
        let mut anchors = Vec::with_capacity((row.len() - 4) / 7);
        for offset in (4..row.len()).step_by(7) {
            let anchor = optional_group(row, offset, 7, DwmDistanceAndPosition::from_row)?
                .ok_or_else(|| RecordError::MalformedField {
                    column: offset,
                    value: String::new(),
                    reason: "anchor entry may not be empty".to_string(),
                })?;
            anchors.push(anchor);
        }
        Ok(DwmLocationResponse { position, anchors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<T: CsvRecord + PartialEq + std::fmt::Debug>(value: &T) {
        let row = value.to_row();
        let borrowed: Vec<&str> = row.iter().map(String::as_str).collect();
        let decoded = T::from_row(&borrowed).unwrap();
        assert_eq!(&decoded, value);
        assert_eq!(decoded.to_row(), row);
    }

    #[test]
    fn test_vector_round_trip() {
        round_trip(&Vector::new(1.5, -2.25, 0.000244140625));
        round_trip(&Vector::zero());
    }

    #[test]
    fn test_vector_from_string_fields() {
        let decoded = Vector::from_row(&["3", "2", "1"]).unwrap();
        assert_eq!(decoded, Vector::new(3.0, 2.0, 1.0));
        assert_eq!(decoded.to_row(), vec!["3", "2", "1"]);
    }

    #[test]
    fn test_quaternion_round_trip() {
        round_trip(&Quaternion::new(0.7071067811865476, 0.0, -0.7071067811865476, 1.0));
    }

    #[test]
    fn test_position_input_round_trip_full_and_partial() {
        round_trip(&PositionInput {
            attitude: Some(Quaternion::new(1.0, 0.0, 0.0, 0.0)),
            acceleration: Some(Vector::new(0.1, 0.2, 9.8)),
            velocity: Some(Vector::zero()),
            position: Some(Vector::new(1200.0, 340.0, 80.0)),
        });
        round_trip(&PositionInput {
            attitude: None,
            acceleration: Some(Vector::new(0.1, 0.2, 9.8)),
            velocity: None,
            position: None,
        });
        round_trip(&PositionInput::default());
    }

    #[test]
    fn test_position_input_absent_attitude_is_four_empty_columns() {
        let input = PositionInput {
            acceleration: Some(Vector::one()),
            ..Default::default()
        };
        let row = input.to_row();
        assert_eq!(row.len(), 13);
        assert!(row[0..4].iter().all(String::is_empty));
        assert_eq!(&row[4..7], &["1", "1", "1"]);
    }

    #[test]
    fn test_dwm_distance_decodes_reversed_hex_id() {
        let row = ["CDAB", "558065031", "16", "121", "50", "251", "100"];
        let decoded = DwmDistanceAndPosition::from_row(&row).unwrap();
        assert_eq!(decoded.anchor_id, "ABCD");
        assert_eq!(decoded.anchor_address, 558065031);
        assert_eq!(decoded.quality_factor, 16);
        assert_eq!(decoded.anchor_position.x, 121.0);
        assert_eq!(decoded.anchor_position.y, 50.0);
        assert_eq!(decoded.anchor_position.z, 251.0);
        assert_eq!(decoded.distance_mm, 100.0);

        // Re-encoding reproduces the original row exactly
        assert_eq!(
            decoded.to_row(),
            vec!["CDAB", "558065031", "16", "121", "50", "251", "100"]
        );
    }

    #[test]
    fn test_location_response_round_trip() {
        let row = [
            "1000", "2000", "150", "90", // tag estimate
            "CDAB", "558065031", "16", "121", "50", "251", "100",
            "3412", "99", "80", "0", "0", "0", "2500",
        ];
        let decoded = DwmLocationResponse::from_row(&row).unwrap();
        assert_eq!(decoded.anchors.len(), 2);
        assert_eq!(decoded.anchors[1].anchor_id, "1234");
        assert_eq!(
            decoded.position,
            Some(DwmPosition::new(1000.0, 2000.0, 150.0, 90))
        );
        round_trip(&decoded);
    }

    #[test]
    fn test_location_response_without_tag_estimate() {
        let row = [
            "", "", "", "",
            "CDAB", "558065031", "16", "121", "50", "251", "100",
        ];
        let decoded = DwmLocationResponse::from_row(&row).unwrap();
        assert!(decoded.position.is_none());
        round_trip(&decoded);
    }

    #[test]
    fn test_column_count_mismatch() {
        let err = Vector::from_row(&["1", "2"]).unwrap_err();
        assert!(matches!(err, RecordError::ColumnCount { actual: 2, .. }));

        let err = DwmLocationResponse::from_row(&["1", "2", "3", "4", "5"]).unwrap_err();
        assert!(matches!(err, RecordError::ColumnCount { actual: 5, .. }));
    }

    #[test]
    fn test_malformed_field_reports_column() {
        let err = DwmPosition::from_row(&["1", "x", "3", "4"]).unwrap_err();
        assert_eq!(
            err,
            RecordError::MalformedField {
                column: 1,
                value: "x".to_string(),
                reason: "not a number".to_string(),
            }
        );
    }

    #[test]
    fn test_bad_hex_id_is_rejected() {
        let err =
            DwmDistanceAndPosition::from_row(&["WXYZ", "1", "2", "3", "4", "5", "6"]).unwrap_err();
        assert!(matches!(err, RecordError::MalformedField { column: 0, .. }));
        let err =
            DwmDistanceAndPosition::from_row(&["ABC", "1", "2", "3", "4", "5", "6"]).unwrap_err();
        assert!(matches!(err, RecordError::MalformedField { column: 0, .. }));
    }
}
