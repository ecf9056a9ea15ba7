//! `flowmanager check`: validate source configuration.

use crate::server::config::AppConfig;
use anyhow::{Context, Result};
use flowmanager_core::DataSources;
use flowmanager_sources::{expand_vars, Role, SourcesConfig};

/// One resolved source, as printed by `check`.
#[derive(Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub role: Role,
    pub url: String,
    pub writable: bool,
}

/// Build every source and resolve its `${var}` references.
pub fn resolve(sources: &SourcesConfig) -> Result<Vec<Endpoint>> {
    DataSources::from_config(sources, &reqwest::Client::new())
        .context("Data source configuration is invalid")?;

    Role::ALL
        .into_iter()
        .map(|role| {
            let config = sources.get(role);
            let url = expand_vars(&config.url, &sources.vars)
                .with_context(|| format!("Failed to resolve {role} url"))?;
            Ok(Endpoint {
                role,
                url,
                writable: config.writable.unwrap_or_else(|| role.default_writable()),
            })
        })
        .collect()
}

/// Print the resolved endpoints; errors exit non-zero.
pub fn run(config: &AppConfig) -> Result<()> {
    let endpoints = resolve(&config.sources)?;

    println!(
        "Flow Manager v{}, listening on {}:{}",
        env!("CARGO_PKG_VERSION"),
        config.server.host,
        config.server.port
    );
    for endpoint in endpoints {
        let mode = if endpoint.writable { "rw" } else { "ro" };
        println!("  {:<18} {}  {}", endpoint.role.as_str(), mode, endpoint.url);
    }
    Ok(())
}
