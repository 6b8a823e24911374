use http::Method;
use serde::Deserialize;

use crate::ConfigError;

pub const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;
pub const MIN_BUFFER_SIZE: usize = 64;
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;
pub const DEFAULT_MIN_GZIP_SIZE: u64 = 32;
pub const DEFAULT_POOL_CAPACITY: usize = 1024;
pub const DEFAULT_VARY: &str = "Accept-Encoding";

const DEFAULT_EXCLUDED_MIME_TYPES: &[&str] = &[
    "application/compress",
    "application/zip",
    "application/gzip",
    "application/x-gzip",
    "application/bzip2",
    "application/brotli",
    "application/x-br",
    "application/x-xz",
    "application/x-rar-compressed",
    "application/zstd",
    "application/x-zstd",
    "image/png",
    "image/gif",
    "image/jpeg",
    "image/webp",
    "image/avif",
    "audio/*",
    "video/*",
    "text/event-stream",
];

/// Settings of the gzip response stage.
///
/// ```json
/// { "buffer-size": 8192, "sync-flush": true, "excluded-paths": ["/download"] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GzipConfig {
    buffer_size: usize,
    sync_flush: bool,
    compression_level: u32,
    min_gzip_size: u64,
    pool_capacity: usize,
    included_methods: Vec<String>,
    excluded_paths: Vec<String>,
    excluded_mime_types: Vec<String>,
    vary: Option<String>,
}

impl Default for GzipConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            sync_flush: false,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            min_gzip_size: DEFAULT_MIN_GZIP_SIZE,
            pool_capacity: DEFAULT_POOL_CAPACITY,
            included_methods: vec![Method::GET.to_string()],
            excluded_paths: Vec::new(),
            excluded_mime_types: DEFAULT_EXCLUDED_MIME_TYPES.iter().map(ToString::to_string).collect(),
            vary: Some(DEFAULT_VARY.into()),
        }
    }
}

impl GzipConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: GzipConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_size < MIN_BUFFER_SIZE {
            return Err(ConfigError::BufferTooSmall { size: self.buffer_size, min: MIN_BUFFER_SIZE });
        }
        if self.compression_level > 9 {
            return Err(ConfigError::InvalidCompressionLevel { level: self.compression_level });
        }
        self.methods()?;
        for pattern in &self.excluded_mime_types {
            if !is_valid_mime_pattern(pattern) {
                return Err(ConfigError::invalid_mime_type(pattern));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Flush the deflater after every write instead of letting it buffer.
    #[must_use]
    pub fn with_sync_flush(mut self, sync_flush: bool) -> Self {
        self.sync_flush = sync_flush;
        self
    }

    #[must_use]
    pub fn with_compression_level(mut self, compression_level: u32) -> Self {
        self.compression_level = compression_level;
        self
    }

    #[must_use]
    pub fn with_min_gzip_size(mut self, min_gzip_size: u64) -> Self {
        self.min_gzip_size = min_gzip_size;
        self
    }

    #[must_use]
    pub fn with_pool_capacity(mut self, pool_capacity: usize) -> Self {
        self.pool_capacity = pool_capacity;
        self
    }

    #[must_use]
    pub fn with_included_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.included_methods = methods.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_excluded_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_excluded_mime_types<I, S>(mut self, mime_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_mime_types = mime_types.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_vary<S: Into<String>>(mut self, vary: Option<S>) -> Self {
        self.vary = vary.map(Into::into);
        self
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn sync_flush(&self) -> bool {
        self.sync_flush
    }

    pub fn compression_level(&self) -> u32 {
        self.compression_level
    }

    pub fn min_gzip_size(&self) -> u64 {
        self.min_gzip_size
    }

    pub fn pool_capacity(&self) -> usize {
        self.pool_capacity
    }

    pub fn excluded_paths(&self) -> &[String] {
        &self.excluded_paths
    }

    pub fn excluded_mime_types(&self) -> &[String] {
        &self.excluded_mime_types
    }

    pub fn vary(&self) -> Option<&str> {
        self.vary.as_deref().map(str::trim).filter(|vary| !vary.is_empty())
    }

    pub fn methods(&self) -> Result<Vec<Method>, ConfigError> {
        self.included_methods
            .iter()
            .map(|method| {
                Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
                    .map_err(|_e| ConfigError::invalid_method(method))
            })
            .collect()
    }
}

fn is_valid_mime_pattern(pattern: &str) -> bool {
    match pattern.strip_suffix("/*") {
        Some(top_level) => !top_level.is_empty() && !top_level.contains('/'),
        None => pattern.parse::<mime::Mime>().is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn defaults_are_valid() {
        let config = GzipConfig::default();
        config.validate().unwrap();
        assert_eq!(config.buffer_size(), 32 * 1024);
        assert_eq!(config.methods().unwrap(), vec![Method::GET]);
        assert_eq!(config.vary(), Some("Accept-Encoding"));
        assert!(config.excluded_mime_types().iter().any(|m| m == "video/*"));
    }

    #[test]
    fn from_json() {
        let json = indoc! {r#"
            {
                "buffer-size": 4096,
                "sync-flush": true,
                "compression-level": 9,
                "included-methods": ["get", "POST"],
                "excluded-paths": ["/download"],
                "vary": null
            }
        "#};

        let config = GzipConfig::from_json(json).unwrap();
        assert_eq!(config.buffer_size(), 4096);
        assert!(config.sync_flush());
        assert_eq!(config.compression_level(), 9);
        assert_eq!(config.methods().unwrap(), vec![Method::GET, Method::POST]);
        assert_eq!(config.excluded_paths(), ["/download".to_string()]);
        assert_eq!(config.vary(), None);
        assert_eq!(config.min_gzip_size(), DEFAULT_MIN_GZIP_SIZE);
    }

    #[test]
    fn rejects_small_buffer() {
        let error = GzipConfig::from_json(r#"{ "buffer-size": 16 }"#).unwrap_err();
        assert!(matches!(error, ConfigError::BufferTooSmall { size: 16, min: 64 }));
    }

    #[test]
    fn rejects_bad_values() {
        let config = GzipConfig::default().with_compression_level(12);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidCompressionLevel { level: 12 })));

        let config = GzipConfig::default().with_excluded_mime_types(["not a mime"]);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidMimeType { .. })));

        let config = GzipConfig::default().with_included_methods(["GE T"]);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidMethod { .. })));
    }
}
