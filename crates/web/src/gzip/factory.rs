use flate2::Compression;
use tracing::debug;

use crate::ConfigError;
use crate::gzip::config::GzipConfig;
use crate::gzip::pool::{DeflaterEntry, DeflaterPool};

/// Decides which responses may be compressed and hands out deflaters.
#[cfg_attr(test, mockall::automock)]
pub trait GzipFactory: Send + Sync {
    /// Whether a `Content-Type` value may be compressed.
    fn is_mime_type_gzipable(&self, content_type: &str) -> bool;

    /// A deflater for a response of the given length, or `None` to leave the
    /// response uncompressed.
    fn deflater_entry(&self, content_length: Option<u64>) -> Option<DeflaterEntry>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MimePattern {
    Exact(String),
    TopLevel(String),
}

impl MimePattern {
    fn parse(pattern: &str) -> Result<Self, ConfigError> {
        if let Some(top_level) = pattern.strip_suffix("/*") {
            if top_level.is_empty() || top_level.contains('/') {
                return Err(ConfigError::invalid_mime_type(pattern));
            }
            return Ok(MimePattern::TopLevel(top_level.to_ascii_lowercase()));
        }

        let mime = pattern.parse::<mime::Mime>().map_err(|_e| ConfigError::invalid_mime_type(pattern))?;
        Ok(MimePattern::Exact(mime.essence_str().to_ascii_lowercase()))
    }

    fn matches(&self, mime: &mime::Mime) -> bool {
        match self {
            MimePattern::Exact(essence) => mime.essence_str().eq_ignore_ascii_case(essence),
            MimePattern::TopLevel(top_level) => mime.type_().as_str().eq_ignore_ascii_case(top_level),
        }
    }
}

/// The [`GzipFactory`] built from a [`GzipConfig`].
#[derive(Debug, Clone)]
pub struct DefaultGzipFactory {
    excluded: Vec<MimePattern>,
    min_gzip_size: u64,
    pool: DeflaterPool,
}

impl DefaultGzipFactory {
    pub fn new(config: &GzipConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let excluded = config.excluded_mime_types().iter().map(|pattern| MimePattern::parse(pattern)).collect::<Result<_, _>>()?;
        Ok(Self {
            excluded,
            min_gzip_size: config.min_gzip_size(),
            pool: DeflaterPool::new(config.pool_capacity(), Compression::new(config.compression_level())),
        })
    }

    pub fn pool(&self) -> &DeflaterPool {
        &self.pool
    }
}

impl GzipFactory for DefaultGzipFactory {
    fn is_mime_type_gzipable(&self, content_type: &str) -> bool {
        // an unparsable type is compressed, there is nothing to exclude it by
        let Ok(mime) = content_type.trim().parse::<mime::Mime>() else {
            return true;
        };
        !self.excluded.iter().any(|pattern| pattern.matches(&mime))
    }

    fn deflater_entry(&self, content_length: Option<u64>) -> Option<DeflaterEntry> {
        if content_length.is_some_and(|length| length < self.min_gzip_size) {
            debug!(content_length, min_gzip_size = self.min_gzip_size, "response too small to compress");
            return None;
        }

        let entry = self.pool.acquire();
        if entry.is_none() {
            debug!(capacity = self.pool.capacity(), "deflater pool exhausted");
        }
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_exclusions() {
        let factory = DefaultGzipFactory::new(&GzipConfig::default()).unwrap();

        assert!(factory.is_mime_type_gzipable("text/html; charset=utf-8"));
        assert!(factory.is_mime_type_gzipable("application/json"));
        assert!(!factory.is_mime_type_gzipable("image/PNG"));
        assert!(!factory.is_mime_type_gzipable("video/mp4"));
        assert!(!factory.is_mime_type_gzipable("text/event-stream;charset=utf-8"));
        assert!(!factory.is_mime_type_gzipable("application/zip"));
    }

    #[test]
    fn small_bodies_are_not_compressed() {
        let factory = DefaultGzipFactory::new(&GzipConfig::default().with_min_gzip_size(100)).unwrap();

        assert!(factory.deflater_entry(Some(99)).is_none());
        assert!(factory.deflater_entry(Some(100)).is_some());
        assert!(factory.deflater_entry(None).is_some());
    }

    #[test]
    fn pool_exhaustion() {
        let factory = DefaultGzipFactory::new(&GzipConfig::default().with_pool_capacity(1)).unwrap();

        let entry = factory.deflater_entry(None).unwrap();
        assert!(factory.deflater_entry(None).is_none());
        entry.release();
        assert!(factory.deflater_entry(None).is_some());
    }
}
