//! JSON bodies exchanged between `RemoteBackend` and the HTTP server.

use crate::backend::SearchRequest;
use crate::entity::Entity;
use crate::error::{Result, VectorDbError};
use crate::schema::CollectionSchema;
use serde::{Deserialize, Serialize};

/// Response envelope. `code == 0` means success and `data` holds the payload.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
    // Missing `data` reads as None; a field-level default would add `T: Default`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: 0,
            message: None,
            detail: None,
            data: Some(data),
        }
    }

    pub fn error(err: &VectorDbError) -> Self {
        Self {
            code: err.code(),
            message: Some(err.message()),
            detail: err.detail(),
            data: None,
        }
    }

    pub fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::error(&e),
        }
    }

    /// Turn the envelope back into the typed result it was built from.
    pub fn into_result(self) -> Result<T> {
        if self.code != 0 {
            return Err(VectorDbError::from_code(
                self.code,
                self.message.unwrap_or_default(),
                self.detail.as_ref(),
            ));
        }
        self.data
            .ok_or_else(|| VectorDbError::backend("response envelope carried no data"))
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionNameRequest {
    pub collection_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCollectionRequest {
    pub collection_name: String,
    pub schema: CollectionSchema,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertRequest {
    pub collection_name: String,
    pub data: Vec<Entity>,
}

/// Delete by primary keys or by filter; exactly one must be set.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    pub collection_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchBody {
    pub collection_name: String,
    #[serde(flatten)]
    pub request: SearchRequest,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub collection_name: String,
    #[serde(default)]
    pub filter: String,
    #[serde(default)]
    pub output_fields: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetRequest {
    pub collection_name: String,
    pub id: Vec<i64>,
    #[serde(default)]
    pub output_fields: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HasResponse {
    pub has: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DropResponse {
    pub dropped: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub delete_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::Vector;

    #[test]
    fn test_error_envelope_roundtrip() {
        let err = VectorDbError::DuplicateKey {
            collection: "docs".to_string(),
            id: 4,
        };
        let json = serde_json::to_string(&Envelope::<HasResponse>::error(&err)).unwrap();
        assert!(!json.contains("data"));

        let decoded: Envelope<HasResponse> = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.code, 1101);
        match decoded.into_result() {
            Err(VectorDbError::DuplicateKey { collection, id }) => {
                assert_eq!(collection, "docs");
                assert_eq!(id, 4);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_ok_envelope() {
        let json = r#"{"code":0,"data":{"has":true}}"#;
        let decoded: Envelope<HasResponse> = serde_json::from_str(json).unwrap();
        assert!(decoded.into_result().unwrap().has);
    }

    #[test]
    fn test_search_body_is_flat_camel_case() {
        let body = SearchBody {
            collection_name: "demo_collection".to_string(),
            request: SearchRequest::new(vec![Vector::new(vec![0.5, 0.5])], 2)
                .output_fields(["text", "subject"])
                .filter("subject == 'biology'"),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["collectionName"], "demo_collection");
        assert_eq!(value["limit"], 2);
        assert_eq!(value["outputFields"][1], "subject");
        assert_eq!(value["filter"], "subject == 'biology'");
        assert_eq!(value["data"][0][1], 0.5);

        let back: SearchBody = serde_json::from_value(value).unwrap();
        assert_eq!(back.request, body.request);
    }

    #[test]
    fn test_delete_request_optional_parts() {
        let req: DeleteRequest =
            serde_json::from_str(r#"{"collectionName":"c","filter":"id > 3"}"#).unwrap();
        assert!(req.ids.is_none());
        assert_eq!(req.filter.as_deref(), Some("id > 3"));
    }
}
