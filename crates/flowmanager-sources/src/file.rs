//! `file://` data source.
//!
//! Development configs point roles at JSON files on disk instead of live
//! backends. Reads parse the file; writes replace it.

use crate::source::check_error_flag;
use crate::{DataSource, Error, Result, TemplateParams, UrlTemplate};
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use tracing::debug;

const FILE_SCHEME: &str = "file://";

/// Data source reading and writing local JSON files.
pub struct FileDataSource {
    role: String,
    template: UrlTemplate,
    writable: bool,
}

impl FileDataSource {
    /// Create a file source. The template must use the `file://` scheme.
    pub fn new(role: &str, template: UrlTemplate, writable: bool) -> Result<Self> {
        if !template.base().starts_with(FILE_SCHEME) {
            return Err(Error::Configuration(format!(
                "{role}: '{}' is not a file:// url",
                template.base()
            )));
        }
        Ok(Self {
            role: role.to_string(),
            template,
            writable,
        })
    }

    /// Resolved path, percent-decoded so an encoded token maps to its file.
    fn path(&self, params: &TemplateParams) -> Result<PathBuf> {
        let url = self.template.resolve(params)?;
        let path = urlencoding::decode(&url[FILE_SCHEME.len()..]).map_err(|e| {
            Error::Configuration(format!("{}: invalid percent-encoding in '{url}': {e}", self.role))
        })?;
        Ok(PathBuf::from(path.into_owned()))
    }
}

#[async_trait]
impl DataSource for FileDataSource {
    fn role(&self) -> &str {
        &self.role
    }

    async fn fetch(&self, params: &TemplateParams) -> Result<Value> {
        let path = self.path(params)?;
        debug!(role = %self.role, path = %path.display(), "read");

        let bytes = tokio::fs::read(&path).await?;
        let payload = serde_json::from_slice(&bytes).map_err(|e| Error::Decode {
            role: self.role.clone(),
            message: format!("{}: {e}", path.display()),
        })?;
        check_error_flag(&self.role, payload)
    }

    async fn write(&self, params: &TemplateParams, payload: &Value) -> Result<Value> {
        if !self.writable {
            return Err(Error::NotWritable(self.role.clone()));
        }

        let path = self.path(params)?;
        debug!(role = %self.role, path = %path.display(), "write");

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_vec_pretty(payload).map_err(|e| Error::Decode {
            role: self.role.clone(),
            message: e.to_string(),
        })?;
        tokio::fs::write(&path, content).await?;

        Ok(Value::Null)
    }
}
