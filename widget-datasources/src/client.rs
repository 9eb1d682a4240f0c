use crate::query::QueryOptions;
use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};

pub const STATUS_OK: &str = "ok";
pub const STATUS_API_ERROR: &str = "Api Error";

/// The `result` field of a backend response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum BackendStatus {
    Ok,
    /// The metrics endpoint failed; passed through to the chart as is.
    ApiError,
    Other(String),
    #[default]
    Missing,
}

impl From<Option<String>> for BackendStatus {
    fn from(value: Option<String>) -> Self {
        match value.as_deref() {
            None | Some("") => BackendStatus::Missing,
            Some(STATUS_OK) => BackendStatus::Ok,
            Some(STATUS_API_ERROR) => BackendStatus::ApiError,
            Some(other) => BackendStatus::Other(other.to_owned()),
        }
    }
}

impl From<BackendStatus> for Option<String> {
    fn from(value: BackendStatus) -> Self {
        match value {
            BackendStatus::Ok => Some(STATUS_OK.to_owned()),
            BackendStatus::ApiError => Some(STATUS_API_ERROR.to_owned()),
            BackendStatus::Other(other) => Some(other),
            BackendStatus::Missing => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendResponse {
    #[serde(default)]
    pub result: BackendStatus,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl BackendResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            result: BackendStatus::Ok,
            data,
        }
    }

    pub fn api_error() -> Self {
        Self {
            result: BackendStatus::ApiError,
            data: serde_json::Value::Null,
        }
    }
}

/// Backend service client. Retries and timeouts are up to the implementation.
#[automock]
#[async_trait]
pub trait QueryClient: Send + Sync {
    async fn query(
        &self,
        target: &str,
        options: &QueryOptions,
    ) -> Result<BackendResponse, anyhow::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!({"result": "ok", "data": [1]}), BackendStatus::Ok)]
    #[case(json!({"result": "Api Error"}), BackendStatus::ApiError)]
    #[case(json!({"result": "timeout", "data": null}), BackendStatus::Other("timeout".into()))]
    #[case(json!({"result": null}), BackendStatus::Missing)]
    #[case(json!({"data": []}), BackendStatus::Missing)]
    fn statuses(#[case] raw: serde_json::Value, #[case] expected: BackendStatus) {
        let response: BackendResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(response.result, expected);
    }

    #[test]
    fn status_serializes_back_to_wire_value() {
        assert_eq!(
            serde_json::to_value(BackendResponse::api_error()).unwrap(),
            json!({"result": "Api Error", "data": null})
        );
    }
}
