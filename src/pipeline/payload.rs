//! Publish payload schema
//!
//! Outbound records cross the process boundary as JSON with an explicit,
//! versioned schema: an envelope carrying the schema version and sample
//! timestamp, and a tagged union over the known record kinds. Decoders
//! check the version before interpreting the record.

use crate::core::types::{AttitudeOutput, DwmLocationResponse, DwmPosition, PositionInput};
use crate::math::{Quaternion, Vector};
use serde::{Deserialize, Serialize};

/// Current payload schema version
pub const PAYLOAD_SCHEMA_VERSION: u32 = 1;

/// Tagged union over every record kind the pipeline can publish
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordPayload {
    Vector {
        x: f64,
        y: f64,
        z: f64,
    },
    Quaternion {
        w: f64,
        i: f64,
        j: f64,
        k: f64,
    },
    AttitudeOutput {
        attitude: Quaternion,
        acceleration: Vector,
        status: u32,
    },
    PositionInput {
        attitude: Option<Quaternion>,
        acceleration: Option<Vector>,
        velocity: Option<Vector>,
        position: Option<Vector>,
    },
    DwmPosition {
        position: DwmPosition,
    },
    DwmLocationResponse {
        response: DwmLocationResponse,
    },
}

/// Versioned wrapper shipped over the bus: schema version, the record's
/// sample timestamp, and the record itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadEnvelope {
    pub version: u32,
    pub timestamp: f64,
    pub record: RecordPayload,
}

impl PayloadEnvelope {
    pub fn new(timestamp: f64, record: RecordPayload) -> Self {
        Self {
            version: PAYLOAD_SCHEMA_VERSION,
            timestamp,
            record,
        }
    }

    /// Encode to the JSON wire form
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode from the JSON wire form
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Conversion into the publish schema, implemented per record kind
pub trait ToPayload {
    fn to_payload(&self) -> RecordPayload;
}

impl ToPayload for Vector {
    fn to_payload(&self) -> RecordPayload {
        RecordPayload::Vector {
            x: self.x,
            y: self.y,
            z: self.z,
        }
    }
}

impl ToPayload for Quaternion {
    fn to_payload(&self) -> RecordPayload {
        RecordPayload::Quaternion {
            w: self.w,
            i: self.i,
            j: self.j,
            k: self.k,
        }
    }
}

impl ToPayload for AttitudeOutput {
    fn to_payload(&self) -> RecordPayload {
        RecordPayload::AttitudeOutput {
            attitude: self.attitude,
            acceleration: self.acceleration,
            status: self.status.bits(),
        }
    }
}

impl ToPayload for PositionInput {
    fn to_payload(&self) -> RecordPayload {
        RecordPayload::PositionInput {
            attitude: self.attitude,
            acceleration: self.acceleration,
            velocity: self.velocity,
            position: self.position,
        }
    }
}

impl ToPayload for DwmPosition {
    fn to_payload(&self) -> RecordPayload {
        RecordPayload::DwmPosition { position: *self }
    }
}

impl ToPayload for DwmLocationResponse {
    fn to_payload(&self) -> RecordPayload {
        RecordPayload::DwmLocationResponse {
            response: self.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_round_trip() {
        let envelope = PayloadEnvelope::new(12.5, Vector::new(1.0, 2.0, 3.0).to_payload());
        let bytes = envelope.to_json().unwrap();
        let decoded = PayloadEnvelope::from_json(&bytes).unwrap();
        assert_eq!(decoded, envelope);
        assert_eq!(decoded.version, PAYLOAD_SCHEMA_VERSION);
    }

    #[test]
    fn test_kind_tag_on_wire() {
        let envelope = PayloadEnvelope::new(0.0, Quaternion::identity().to_payload());
        let json = String::from_utf8(envelope.to_json().unwrap()).unwrap();
        assert!(json.contains("\"kind\":\"quaternion\""));
        assert!(json.contains("\"version\":1"));
    }

    #[test]
    fn test_position_input_payload_keeps_absent_fields() {
        let record = PositionInput {
            position: Some(Vector::new(1.0, 2.0, 3.0)),
            ..Default::default()
        }
        .to_payload();
        match record {
            RecordPayload::PositionInput {
                attitude,
                position,
                ..
            } => {
                assert!(attitude.is_none());
                assert_eq!(position, Some(Vector::new(1.0, 2.0, 3.0)));
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_unknown_version_still_decodes_envelope() {
        let bytes =
            b"{\"version\":99,\"timestamp\":1.0,\"record\":{\"kind\":\"vector\",\"x\":0,\"y\":0,\"z\":0}}";
        let decoded = PayloadEnvelope::from_json(bytes).unwrap();
        assert_eq!(decoded.version, 99);
    }
}
