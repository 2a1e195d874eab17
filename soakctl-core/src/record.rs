use serde::{Deserialize, Serialize};

use crate::error::{Result, SoakError};

/// One `{type, phone}` pair inside a record's `phones` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub phone: String,
}

/// Decoded form of one `data` column value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub phones: Vec<PhoneEntry>,
}

/// Records decoded from a single query execution, in row arrival order.
pub type ResultSet = Vec<Record>;

impl PhoneEntry {
    pub fn new(kind: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            phone: phone.into(),
        }
    }
}

impl Record {
    /// Decode the JSON text of row `row` into a record.
    ///
    /// Field names are matched exactly; anything that does not have the
    /// `{"phones": [{"type": .., "phone": ..}]}` shape is rejected whole.
    pub fn decode(row: usize, json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|source| SoakError::Decode { row, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED_ROW: &str =
        r#"{"phones":[{"type":"mobile","phone":"001001"},{"type":"fix","phone":"002002"}]}"#;

    #[test]
    fn test_decode_seed_row() {
        let record = Record::decode(0, SEED_ROW).unwrap();
        assert_eq!(
            record.phones,
            vec![
                PhoneEntry::new("mobile", "001001"),
                PhoneEntry::new("fix", "002002"),
            ]
        );
    }

    #[test]
    fn test_decode_tolerates_whitespace() {
        // jsonb text output spaces things differently than the seed literals
        let json = r#"{ "phones":[ {"type": "mobile-2", "phone": "001001"} , {"type": "fix-2", "phone": "002002"} ] }"#;
        let record = Record::decode(1, json).unwrap();
        assert_eq!(record.phones.len(), 2);
        assert_eq!(record.phones[1].kind, "fix-2");
    }

    #[test]
    fn test_decode_field_names_are_case_sensitive() {
        let json = r#"{"phones":[{"Type":"mobile","phone":"001001"}]}"#;
        let err = Record::decode(0, json).unwrap_err();
        assert!(matches!(err, SoakError::Decode { row: 0, .. }));
    }

    #[test]
    fn test_decode_rejects_malformed_json() {
        let err = Record::decode(2, r#"{"phones":["#).unwrap_err();
        assert!(matches!(err, SoakError::Decode { row: 2, .. }));
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        assert!(Record::decode(0, r#"{"phones":"001001"}"#).is_err());
        assert!(Record::decode(0, r#"[1,2,3]"#).is_err());
        assert!(Record::decode(0, r#"{}"#).is_err());
    }

    #[test]
    fn test_decode_empty_phone_list() {
        let record = Record::decode(0, r#"{"phones":[]}"#).unwrap();
        assert!(record.phones.is_empty());
    }
}
