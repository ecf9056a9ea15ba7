//! The uniform remote data source contract.

use crate::{Error, Result, TemplateParams};
use async_trait::async_trait;
use serde_json::Value;

/// A remote endpoint that can be read and, optionally, written.
///
/// Every operation returns either the payload or an [`Error`]; nothing else
/// is signalled out of band.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Role name used in logs and errors (e.g. `user_preferences`)
    fn role(&self) -> &str;

    /// Fetch the payload at the endpoint resolved from `params`.
    async fn fetch(&self, params: &TemplateParams) -> Result<Value>;

    /// Persist `payload` at the endpoint resolved from `params`.
    ///
    /// Returns the backend's confirmation payload (`Value::Null` when the
    /// backend sends none).
    async fn write(&self, _params: &TemplateParams, _payload: &Value) -> Result<Value> {
        Err(Error::NotWritable(self.role().to_string()))
    }
}

/// Map a successfully received payload that carries `"isError": true` to
/// [`Error::Remote`].
pub(crate) fn check_error_flag(role: &str, payload: Value) -> Result<Value> {
    let flagged = payload
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !flagged {
        return Ok(payload);
    }

    let message = payload
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unspecified error")
        .to_string();
    Err(Error::Remote {
        role: role.to_string(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct ReadOnly;

    #[async_trait]
    impl DataSource for ReadOnly {
        fn role(&self) -> &str {
            "device_reporter"
        }

        async fn fetch(&self, _params: &TemplateParams) -> Result<Value> {
            Ok(json!({"os": "linux"}))
        }
    }

    #[tokio::test]
    async fn test_default_write_is_rejected() {
        let err = ReadOnly
            .write(&TemplateParams::new(), &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotWritable(role) if role == "device_reporter"));
    }

    #[test]
    fn test_error_flag_passthrough() {
        let payload = json!({"lang": "en", "isError": false});
        assert_eq!(check_error_flag("p", payload.clone()).unwrap(), payload);
        assert_eq!(check_error_flag("p", json!([1, 2])).unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_error_flag_maps_to_remote() {
        let err = check_error_flag(
            "user_preferences",
            json!({"isError": true, "message": "no such token"}),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "user_preferences reported an error: no such token");
    }

    #[test]
    fn test_error_flag_without_message() {
        let err = check_error_flag("match_maker", json!({"isError": true})).unwrap_err();
        assert!(err.to_string().contains("unspecified error"));
    }
}
