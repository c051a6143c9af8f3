//! Persisted record shapes for the content-addressed object store.
//!
//! Every record is immutable and identified by the SHA-256 hash of its
//! canonical serialized form: field-equal records are the same record.
//! The field order of each struct is the canonical order and must not change.

use crate::model::EmbeddingModel;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// Content-hash identity of a stored record.
///
/// Displayed and serialized as 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId([u8; 32]);

impl RecordId {
    /// Hash arbitrary canonical bytes into an id.
    pub fn from_content(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        RecordId(hasher.finalize().into())
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(RecordId(arr))
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl std::fmt::Debug for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RecordId({})", &hex::encode(self.0)[..12])
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        RecordId::from_hex(&s)
            .ok_or_else(|| D::Error::custom(format!("invalid record id: {s:?}")))
    }
}

/// Type tags recognized by the store and its reverse maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    Dimension,
    MeaningNode,
    MeaningDimensionValue,
    CubeObject,
}

/// A point in semantic space: an embedding vector plus its model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeaningNode {
    pub embedding: Vec<f32>,
    pub model: EmbeddingModel,
    pub dimensions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// Association between the meaning dimension and a [`MeaningNode`].
///
/// Must never exist without a resolvable meaning node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeaningDimensionValue {
    pub dimension_id: RecordId,
    pub meaning_node_id: RecordId,
    /// Monotonic epoch milliseconds at creation.
    pub created: u64,
}

/// Singleton descriptor of one dimension of the cube.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionRecord {
    pub name: String,
    pub data_type: String,
    pub standard: bool,
    pub shared: bool,
    pub package_name: String,
}

/// A domain object persisted by cube collaborators.
///
/// This crate never writes cube objects; it only follows their references
/// to dimension values during rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CubeObject {
    pub payload: serde_json::Value,
    pub dimension_values: Vec<RecordId>,
}

/// Type-tagged union of everything the store holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Record {
    Dimension(DimensionRecord),
    MeaningNode(MeaningNode),
    MeaningDimensionValue(MeaningDimensionValue),
    CubeObject(CubeObject),
}

impl Record {
    /// Type tag of this record.
    pub fn record_type(&self) -> RecordType {
        match self {
            Record::Dimension(_) => RecordType::Dimension,
            Record::MeaningNode(_) => RecordType::MeaningNode,
            Record::MeaningDimensionValue(_) => RecordType::MeaningDimensionValue,
            Record::CubeObject(_) => RecordType::CubeObject,
        }
    }

    /// Ids of the records this record references, in field order.
    ///
    /// Drives reverse-map maintenance in store implementations.
    pub fn references(&self) -> Vec<RecordId> {
        match self {
            Record::Dimension(_) | Record::MeaningNode(_) => Vec::new(),
            Record::MeaningDimensionValue(v) => vec![v.dimension_id, v.meaning_node_id],
            Record::CubeObject(o) => o.dimension_values.clone(),
        }
    }

    /// Content hash of this record's canonical serialized form.
    pub fn content_id(&self) -> RecordId {
        let bytes = serde_json::to_vec(self).expect("record serialization is infallible");
        RecordId::from_content(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(embedding: Vec<f32>) -> Record {
        let dimensions = embedding.len();
        Record::MeaningNode(MeaningNode {
            embedding,
            model: EmbeddingModel::Custom,
            dimensions,
            source_text: None,
            content_type: None,
        })
    }

    #[test]
    fn test_content_id_is_field_determined() {
        let a = node(vec![1.0, 2.0]);
        let b = node(vec![1.0, 2.0]);
        let c = node(vec![1.0, 3.0]);
        assert_eq!(a.content_id(), b.content_id());
        assert_ne!(a.content_id(), c.content_id());
    }

    #[test]
    fn test_optional_fields_change_identity() {
        let bare = node(vec![1.0]);
        let with_text = Record::MeaningNode(MeaningNode {
            embedding: vec![1.0],
            model: EmbeddingModel::Custom,
            dimensions: 1,
            source_text: Some("hello".into()),
            content_type: Some("text".into()),
        });
        assert_ne!(bare.content_id(), with_text.content_id());
    }

    #[test]
    fn test_record_id_hex_round_trip() {
        let id = node(vec![0.5]).content_id();
        let parsed = RecordId::from_hex(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
        assert!(RecordId::from_hex("not-hex").is_none());
        assert!(RecordId::from_hex("abcd").is_none());
    }

    #[test]
    fn test_references() {
        let dim_id = RecordId::from_content(b"dim");
        let node_id = RecordId::from_content(b"node");
        let value = Record::MeaningDimensionValue(MeaningDimensionValue {
            dimension_id: dim_id,
            meaning_node_id: node_id,
            created: 42,
        });
        assert_eq!(value.references(), vec![dim_id, node_id]);
        assert!(node(vec![1.0]).references().is_empty());
    }

    #[test]
    fn test_type_tag_in_serialized_form() {
        let json = serde_json::to_string(&node(vec![1.0])).unwrap();
        assert!(json.contains("\"type\":\"MeaningNode\""));
    }
}
