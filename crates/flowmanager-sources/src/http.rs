//! HTTP data source backed by `reqwest`.

use crate::config::WriteMethod;
use crate::source::check_error_flag;
use crate::{DataSource, Error, Result, TemplateParams, UrlTemplate};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Data source talking JSON over HTTP.
///
/// `fetch` issues a GET; `write` sends the payload as a JSON body with the
/// configured method. No timeout or retry is applied.
pub struct HttpDataSource {
    role: String,
    template: UrlTemplate,
    writable: bool,
    write_method: WriteMethod,
    client: reqwest::Client,
}

impl HttpDataSource {
    /// Create a source with its own client.
    pub fn new(role: &str, template: UrlTemplate, writable: bool, write_method: WriteMethod) -> Self {
        Self::with_client(role, template, writable, write_method, reqwest::Client::new())
    }

    /// Create a source sharing an existing client.
    pub fn with_client(
        role: &str,
        template: UrlTemplate,
        writable: bool,
        write_method: WriteMethod,
        client: reqwest::Client,
    ) -> Self {
        Self {
            role: role.to_string(),
            template,
            writable,
            write_method,
            client,
        }
    }

    /// Endpoint address before per-call substitution.
    pub fn endpoint(&self) -> &str {
        self.template.base()
    }

    async fn read_body(&self, resp: reqwest::Response) -> Result<Vec<u8>> {
        let status = resp.status();
        let body = resp.bytes().await.map_err(|e| Error::Request {
            role: self.role.clone(),
            message: format!("failed to read response body: {e}"),
        })?;

        if !status.is_success() {
            return Err(Error::Status {
                role: self.role.clone(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(body.to_vec())
    }

    fn decode(&self, body: &[u8]) -> Result<Value> {
        serde_json::from_slice(body).map_err(|e| Error::Decode {
            role: self.role.clone(),
            message: e.to_string(),
        })
    }

    fn request_error(&self, e: reqwest::Error) -> Error {
        Error::Request {
            role: self.role.clone(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl DataSource for HttpDataSource {
    fn role(&self) -> &str {
        &self.role
    }

    async fn fetch(&self, params: &TemplateParams) -> Result<Value> {
        let url = self.template.resolve(params)?;
        debug!(role = %self.role, url = %url, "GET");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let body = self.read_body(resp).await?;
        let payload = self.decode(&body)?;
        check_error_flag(&self.role, payload)
    }

    async fn write(&self, params: &TemplateParams, payload: &Value) -> Result<Value> {
        if !self.writable {
            return Err(Error::NotWritable(self.role.clone()));
        }

        let url = self.template.resolve(params)?;
        debug!(role = %self.role, url = %url, method = ?self.write_method, "write");

        let request = match self.write_method {
            WriteMethod::Post => self.client.post(&url),
            WriteMethod::Put => self.client.put(&url),
        };
        let resp = request
            .json(payload)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let body = self.read_body(resp).await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        let confirmation = self.decode(&body)?;
        check_error_flag(&self.role, confirmation)
    }
}
