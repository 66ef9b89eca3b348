use serde::{Deserialize, Serialize};

use cairn_canon::ContentHasher;
use cairn_types::{ObjectHash, Record};

use crate::error::{ProtocolError, ProtocolResult};

pub const PROTOCOL_VERSION: u32 = 1;

/// Default ceiling on objects per `POST /v1/objects`.
pub const MAX_BATCH_OBJECTS: usize = 10_000;

/// One record on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireObject {
    pub hash: ObjectHash,
    /// Canonical JSON text of the record.
    pub content: String,
}

impl WireObject {
    /// Encode a record. Fails if its payload is not UTF-8, which canonical
    /// JSON always is.
    pub fn from_record(record: &Record) -> ProtocolResult<Self> {
        let content = record.payload_str().ok_or_else(|| {
            ProtocolError::Serialization(format!("record {} is not UTF-8", record.hash))
        })?;
        Ok(Self {
            hash: record.hash,
            content: content.to_string(),
        })
    }

    /// Decode into a record after checking the declared hash against the
    /// content.
    pub fn into_record(self) -> ProtocolResult<Record> {
        let computed = ContentHasher::NODE.hash(self.content.as_bytes());
        if computed != self.hash {
            return Err(ProtocolError::HashMismatch {
                declared: self.hash,
                computed,
            });
        }
        Ok(Record::new(self.hash, self.content))
    }
}

/// Body of `POST /v1/objects`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectBatch {
    pub objects: Vec<WireObject>,
}

impl ObjectBatch {
    pub fn from_records(records: &[Record]) -> ProtocolResult<Self> {
        let objects = records
            .iter()
            .map(WireObject::from_record)
            .collect::<ProtocolResult<_>>()?;
        Ok(Self { objects })
    }

    /// Verify every object and convert the batch into records.
    ///
    /// All-or-nothing: the first mismatch rejects the whole batch.
    pub fn into_records(self) -> ProtocolResult<Vec<Record>> {
        self.objects.into_iter().map(WireObject::into_record).collect()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Response to an accepted batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchAck {
    pub accepted: usize,
}

/// JSON body of every non-2xx response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_types::Node;

    fn make_record(name: &str) -> Record {
        let (hash, bytes) = ContentHasher::NODE
            .hash_node(&Node::new().with("name", name))
            .unwrap();
        Record::new(hash, bytes)
    }

    #[test]
    fn wire_object_carries_canonical_text() {
        let record = make_record("beam");
        let wire = WireObject::from_record(&record).unwrap();
        assert_eq!(wire.content, r#"{"name":"beam"}"#);
        assert_eq!(wire.into_record().unwrap(), record);
    }

    #[test]
    fn tampered_content_is_rejected() {
        let record = make_record("beam");
        let mut wire = WireObject::from_record(&record).unwrap();
        wire.content = r#"{"name":"column"}"#.into();
        assert!(matches!(
            wire.into_record(),
            Err(ProtocolError::HashMismatch { declared, .. }) if declared == record.hash
        ));
    }

    #[test]
    fn non_utf8_payload_cannot_be_sent() {
        let record = Record::new(ObjectHash::from_bytes(b"bin"), vec![0xff, 0xfe]);
        assert!(matches!(
            WireObject::from_record(&record),
            Err(ProtocolError::Serialization(_))
        ));
    }

    #[test]
    fn batch_json_shape() {
        let record = make_record("slab");
        let batch = ObjectBatch::from_records(std::slice::from_ref(&record)).unwrap();
        let json = serde_json::to_value(&batch).unwrap();
        assert_eq!(json["objects"][0]["hash"], record.hash.to_hex());
        assert_eq!(json["objects"][0]["content"], r#"{"name":"slab"}"#);

        let parsed: ObjectBatch = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.into_records().unwrap(), vec![record]);
    }

    #[test]
    fn one_bad_object_rejects_the_batch() {
        let good = WireObject::from_record(&make_record("a")).unwrap();
        let mut bad = WireObject::from_record(&make_record("b")).unwrap();
        bad.hash = good.hash;
        let batch = ObjectBatch {
            objects: vec![good, bad],
        };
        assert!(batch.into_records().is_err());
    }
}
