//! Flow Manager Sources - remote data source contract
//!
//! Every backend the pipeline talks to (preferences, device reporter,
//! match maker, transformer, launch manager, snapshot store) is reached
//! through the [`DataSource`] trait:
//! - HTTP backends via [`HttpDataSource`]
//! - On-disk JSON fixtures via [`FileDataSource`]
//! - Endpoint addresses via [`UrlTemplate`] (`${var}` and `%term` substitution)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod file;
pub mod http;
pub mod source;
pub mod template;

pub use config::{build_source, Role, SourceConfig, SourcesConfig, WriteMethod};
pub use error::{Error, Result};
pub use file::FileDataSource;
pub use http::HttpDataSource;
pub use source::DataSource;
pub use template::{expand_vars, TemplateParams, UrlTemplate};
