use pyo3::prelude::*;

use crate::error::QkError;

/// Validated connection parameters for the remote table store.
///
/// Resolved once at startup from whatever settings store the embedding
/// application uses (the crate never reads secrets itself). Resolution
/// either yields a usable config or a single clear error, instead of a
/// cascade of fallbacks to placeholder values.
#[pyclass]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    #[pyo3(get)]
    pub url: String,
    #[pyo3(get)]
    pub key: String,
}

impl SourceConfig {
    pub fn resolve(url: Option<&str>, key: Option<&str>) -> Result<Self, QkError> {
        let url = url
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| QkError::Validation("source url missing or empty".into()))?;
        let key = key
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| QkError::Validation("source key missing or empty".into()))?;
        if !url.contains("://") {
            return Err(QkError::Validation(format!(
                "source url '{url}' is not a valid URL"
            )));
        }

        Ok(Self {
            url: url.to_string(),
            key: key.to_string(),
        })
    }
}

#[pymethods]
impl SourceConfig {
    #[staticmethod]
    #[pyo3(signature = (url=None, key=None))]
    fn from_settings(url: Option<String>, key: Option<String>) -> PyResult<Self> {
        Ok(Self::resolve(url.as_deref(), key.as_deref())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_settings_resolve() {
        let config =
            SourceConfig::resolve(Some("https://example.supabase.co"), Some("service-key"))
                .unwrap();
        assert_eq!(config.url, "https://example.supabase.co");
        assert_eq!(config.key, "service-key");
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        let config =
            SourceConfig::resolve(Some("  https://example.supabase.co "), Some(" k ")).unwrap();
        assert_eq!(config.url, "https://example.supabase.co");
        assert_eq!(config.key, "k");
    }

    #[test]
    fn test_missing_or_blank_settings_fail() {
        assert!(SourceConfig::resolve(None, Some("k")).is_err());
        assert!(SourceConfig::resolve(Some("https://x"), None).is_err());
        assert!(SourceConfig::resolve(Some("   "), Some("k")).is_err());
        assert!(SourceConfig::resolve(Some("https://x"), Some("")).is_err());
    }

    #[test]
    fn test_url_shape_checked() {
        assert!(SourceConfig::resolve(Some("example.supabase.co"), Some("k")).is_err());
    }
}
