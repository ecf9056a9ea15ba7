//! Endpoint URL templates.
//!
//! Two kinds of substitution happen on a configured URL:
//!
//! - `${var}` references are expanded once, when the source is built, from
//!   the `[sources] vars` table (e.g. `${db}` pointing at a data directory).
//! - Term-map placeholders such as `%token` or `%query` are replaced on every
//!   call with the matching [`TemplateParams`] entry.
//!
//! Values are inserted verbatim. Callers are responsible for passing
//! URL-safe values (percent-encoded tokens, urlencoded query strings).

use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap};

/// Named values substituted into an endpoint URL for one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateParams(BTreeMap<String, String>);

impl TemplateParams {
    /// Create an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Look up a parameter.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Whether no parameters are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Expand `${var}` references in `url` from `vars`.
///
/// Unknown variables and unterminated references are configuration errors.
pub fn expand_vars(url: &str, vars: &HashMap<String, String>) -> Result<String> {
    let mut out = String::with_capacity(url.len());
    let mut rest = url;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or_else(|| {
            Error::Configuration(format!("unterminated variable reference in '{url}'"))
        })?;
        let name = &after[..end];
        let value = vars.get(name).ok_or_else(|| {
            Error::Configuration(format!("unknown variable '${{{name}}}' in '{url}'"))
        })?;
        out.push_str(value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    Ok(out)
}

/// An endpoint address with its term map, resolved per call.
#[derive(Debug, Clone)]
pub struct UrlTemplate {
    role: String,
    url: String,
    term_map: BTreeMap<String, String>,
}

impl UrlTemplate {
    /// Build a template, expanding `${var}` references immediately.
    pub fn new(
        role: &str,
        url: &str,
        term_map: BTreeMap<String, String>,
        vars: &HashMap<String, String>,
    ) -> Result<Self> {
        let url = expand_vars(url, vars)?;
        if url.trim().is_empty() {
            return Err(Error::Configuration(format!("{role}: endpoint url is empty")));
        }
        Ok(Self {
            role: role.to_string(),
            url,
            term_map,
        })
    }

    /// The URL after variable expansion, placeholders still in place.
    pub fn base(&self) -> &str {
        &self.url
    }

    /// Substitute every term-map placeholder from `params`.
    pub fn resolve(&self, params: &TemplateParams) -> Result<String> {
        let mut url = self.url.clone();
        for (param, placeholder) in &self.term_map {
            let value = params.get(param).ok_or_else(|| Error::Template {
                role: self.role.clone(),
                param: param.clone(),
            })?;
            url = url.replace(placeholder.as_str(), value);
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> HashMap<String, String> {
        HashMap::from([("db".to_string(), "/var/lib/flow".to_string())])
    }

    fn term_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_expand_vars() {
        let url = expand_vars("file://${db}/device.json", &vars()).unwrap();
        assert_eq!(url, "file:///var/lib/flow/device.json");
    }

    #[test]
    fn test_expand_vars_without_references() {
        let url = expand_vars("http://localhost:8082/device", &vars()).unwrap();
        assert_eq!(url, "http://localhost:8082/device");
    }

    #[test]
    fn test_expand_unknown_var() {
        let err = expand_vars("file://${root}/x.json", &vars()).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("${root}"));
    }

    #[test]
    fn test_expand_unterminated_var() {
        let err = expand_vars("file://${db/x.json", &vars()).unwrap_err();
        assert!(err.to_string().contains("unterminated"));
    }

    #[test]
    fn test_resolve_token() {
        let template = UrlTemplate::new(
            "user_preferences",
            "http://prefs/user/%token",
            term_map(&[("token", "%token")]),
            &vars(),
        )
        .unwrap();

        let url = template
            .resolve(&TemplateParams::new().with("token", "abc"))
            .unwrap();
        assert_eq!(url, "http://prefs/user/abc");
        assert_eq!(template.base(), "http://prefs/user/%token");
    }

    #[test]
    fn test_resolve_missing_param() {
        let template = UrlTemplate::new(
            "match_maker",
            "http://match/match?%query",
            term_map(&[("query", "%query")]),
            &vars(),
        )
        .unwrap();

        let err = template.resolve(&TemplateParams::new()).unwrap_err();
        match err {
            Error::Template { role, param } => {
                assert_eq!(role, "match_maker");
                assert_eq!(param, "query");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_resolve_ignores_unmapped_params() {
        let template =
            UrlTemplate::new("device_reporter", "http://device/", BTreeMap::new(), &vars())
                .unwrap();
        let url = template
            .resolve(&TemplateParams::new().with("token", "abc"))
            .unwrap();
        assert_eq!(url, "http://device/");
    }

    #[test]
    fn test_empty_url_rejected() {
        let err = UrlTemplate::new("snapshot", "  ", BTreeMap::new(), &vars()).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
