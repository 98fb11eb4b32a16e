//! # Codec Session
//!
//! Bundles everything one worker needs: the generic codec table, a
//! [`SchemaCodecFactory`] sharing specialized serializers, and the codec
//! settings. Codecs and comparators handed out by a session are immutable
//! or owned by the caller, so a session can be shared behind an `Arc`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let session = CodecSession::new(Config::load()?);
//! let codec = session.codec_for(&schema);
//! let mut comparator = session.comparator_for(&schema);
//! ```

use std::sync::Arc;

use tracing::info;

use crate::codec::{GenericCodec, SchemaCodec, SchemaCodecFactory};
use crate::comparator::Comparator;
use crate::config::{CodecConfig, Config};
use crate::error::{CodecError, CodecResult};
use crate::schema::Schema;
use crate::value::ArrayBuilder;

#[derive(Debug)]
pub struct CodecSession {
    config: Config,
    factory: SchemaCodecFactory,
}

impl CodecSession {
    /// # Panics
    ///
    /// If the generic codec table is incomplete; see [`CodecSession::try_new`].
    pub fn new(config: Config) -> Self {
        match Self::try_new(config) {
            Ok(session) => session,
            Err(e) => panic!("codec session: {e}"),
        }
    }

    pub fn try_new(config: Config) -> CodecResult<Self> {
        let generic = GenericCodec::try_new()?;
        info!(
            lazy_field_threshold = config.codec.lazy_field_threshold,
            spill_threshold = config.codec.spill_threshold,
            verify_writes = config.codec.verify_writes,
            "codec session started"
        );
        Ok(CodecSession {
            factory: SchemaCodecFactory::new(generic, config.codec.clone()),
            config,
        })
    }

    /// Session configured from `spindle.toml`, `spindle.local.toml` and
    /// `SPINDLE_*` variables.
    pub fn from_environment() -> CodecResult<Self> {
        let config = Config::load().map_err(|e| CodecError::Config(e.to_string()))?;
        Self::try_new(config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn codec_config(&self) -> &CodecConfig {
        &self.config.codec
    }

    pub fn generic(&self) -> &GenericCodec {
        self.factory.generic()
    }

    pub fn factory(&self) -> &SchemaCodecFactory {
        &self.factory
    }

    pub fn codec_for(&self, schema: &Schema) -> SchemaCodec {
        self.factory.codec(schema)
    }

    /// Comparator over generic-encoded values.
    pub fn comparator(&self) -> Comparator {
        Comparator::new(Arc::new(self.generic().clone()))
    }

    /// Comparator over values encoded with the codec for `schema`.
    pub fn comparator_for(&self, schema: &Schema) -> Comparator {
        Comparator::new(Arc::new(self.codec_for(schema)))
    }

    /// An array builder that spills past the configured threshold.
    pub fn array_builder(&self) -> ArrayBuilder {
        ArrayBuilder::spilling(self.generic().clone(), self.config.codec.spill_threshold)
    }
}

impl Default for CodecSession {
    fn default() -> Self {
        CodecSession::new(Config::default())
    }
}
