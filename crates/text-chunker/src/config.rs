use crate::error::{ChunkerError, Result};
use serde::{Deserialize, Serialize};

/// Characters per approximated token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Weight of a chunk's own embedding in the late-context blend.
pub const LATE_CONTEXT_LOCAL_WEIGHT: f32 = 0.7;

/// Weight of the whole-document embedding in the late-context blend.
pub const LATE_CONTEXT_GLOBAL_WEIGHT: f32 = 0.3;

/// Configuration for text chunking behavior.
///
/// Sizes are character-oriented: `chunk_size` and `chunk_overlap` are window
/// units (characters, or approximated tokens of [`CHARS_PER_TOKEN`] characters
/// for the fixed-size strategy), and every structural strategy targets
/// `chunk_size * CHARS_PER_TOKEN` characters per chunk. `min_chunk_size` and
/// `max_chunk_size` are measured in characters of trimmed content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size (window units)
    pub chunk_size: usize,

    /// Backward overlap between consecutive fixed-size windows (window units)
    pub chunk_overlap: usize,

    /// Minimum chunk size in characters (avoid too small chunks)
    pub min_chunk_size: usize,

    /// Maximum chunk size in characters (soft cap, refinement splits at 1.5x)
    pub max_chunk_size: usize,

    /// Unit of `chunk_size`/`chunk_overlap` for fixed-size windows
    pub length_unit: LengthUnit,

    /// Pull fixed-size window ends back to a sentence break
    pub preserve_sentences: bool,

    /// Pull fixed-size window ends back to a paragraph break
    pub preserve_paragraphs: bool,

    /// Lower bound for the adaptive semantic boundary threshold
    pub similarity_threshold: f32,

    /// Number of texts per embedding request
    pub embedding_batch_size: usize,

    /// Line prefixes recognized as headings in marked-up text
    pub header_markers: Vec<String>,

    /// Section separators tried in order by the hierarchical strategy
    pub section_markers: Vec<String>,

    /// Sampling temperature passed to the completion service
    pub llm_temperature: f32,

    /// Maximum characters of document text sent in a single prompt
    pub llm_max_input_chars: usize,

    /// Document prefix length embedded as global context
    pub late_context_max_chars: usize,

    /// Weight of the local chunk embedding in the late-context blend
    pub late_context_local_weight: f32,

    /// Weight of the document embedding in the late-context blend
    pub late_context_global_weight: f32,

    /// Cache sentence embeddings for the lifetime of a strategy instance
    pub enable_embedding_cache: bool,

    /// Maximum number of cached embeddings
    pub embedding_cache_capacity: usize,

    /// Dispatch embedding batches concurrently (requires a tokio runtime)
    pub parallel_embedding: bool,

    /// Run the refinement pass over deterministic strategy output
    pub refine_output: bool,

    /// Record creation time in chunk metadata
    pub include_timestamps: bool,

    /// Copy caller-supplied document metadata onto every chunk
    pub include_document_metadata: bool,

    /// Attach embeddings computed by similarity-aware strategies
    pub include_embeddings: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 50,
            min_chunk_size: 100,
            max_chunk_size: 2000,
            length_unit: LengthUnit::Characters,
            preserve_sentences: false,
            preserve_paragraphs: false,
            similarity_threshold: 0.5,
            embedding_batch_size: 32,
            header_markers: (1..=6).map(|n| "#".repeat(n)).collect(),
            section_markers: vec!["\n\n\n".to_string(), "\n\n".to_string()],
            llm_temperature: 0.1,
            llm_max_input_chars: 12_000,
            late_context_max_chars: 8_000,
            late_context_local_weight: LATE_CONTEXT_LOCAL_WEIGHT,
            late_context_global_weight: LATE_CONTEXT_GLOBAL_WEIGHT,
            enable_embedding_cache: true,
            embedding_cache_capacity: 10_000,
            parallel_embedding: false,
            refine_output: false,
            include_timestamps: true,
            include_document_metadata: true,
            include_embeddings: true,
        }
    }
}

impl ChunkingConfig {
    /// Create config optimized for embeddings (smaller, focused chunks)
    pub fn for_embeddings() -> Self {
        Self {
            chunk_size: 256,
            chunk_overlap: 32,
            min_chunk_size: 80,
            max_chunk_size: 1200,
            ..Default::default()
        }
    }

    /// Create config optimized for LLM context (larger, comprehensive chunks)
    pub fn for_llm_context() -> Self {
        Self {
            chunk_size: 1024,
            chunk_overlap: 128,
            min_chunk_size: 200,
            max_chunk_size: 4096,
            ..Default::default()
        }
    }

    /// Create config optimized for speed (no caching overhead, no timestamps)
    pub fn for_speed() -> Self {
        Self {
            enable_embedding_cache: false,
            include_timestamps: false,
            include_embeddings: false,
            ..Default::default()
        }
    }

    /// Parse configuration from TOML; missing keys fall back to defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)
            .map_err(|e| ChunkerError::invalid_config(format!("failed to parse TOML: {e}")))?;
        config.validate().map_err(ChunkerError::InvalidConfig)?;
        Ok(config)
    }

    /// Serialize configuration to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self)
            .map_err(|e| ChunkerError::invalid_config(format!("failed to encode TOML: {e}")))
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be > 0".to_string());
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            ));
        }

        if self.max_chunk_size == 0 {
            return Err("max_chunk_size must be > 0".to_string());
        }

        if self.min_chunk_size > self.max_chunk_size {
            return Err(format!(
                "min_chunk_size ({}) cannot exceed max_chunk_size ({})",
                self.min_chunk_size, self.max_chunk_size
            ));
        }

        if !(-1.0..=1.0).contains(&self.similarity_threshold) {
            return Err(format!(
                "similarity_threshold ({}) must be within [-1, 1]",
                self.similarity_threshold
            ));
        }

        if self.embedding_batch_size == 0 {
            return Err("embedding_batch_size must be > 0".to_string());
        }

        if self.enable_embedding_cache && self.embedding_cache_capacity == 0 {
            return Err("embedding_cache_capacity must be > 0 when caching is enabled".to_string());
        }

        let (local, global) = (
            self.late_context_local_weight,
            self.late_context_global_weight,
        );
        if !local.is_finite() || !global.is_finite() {
            return Err(format!(
                "late-context weights must be finite (local={local}, global={global})"
            ));
        }
        if local < 0.0 || global < 0.0 || local + global == 0.0 {
            return Err(format!(
                "late-context weights must be non-negative and not both zero \
                 (local={local}, global={global})"
            ));
        }

        Ok(())
    }

    /// Characters a structural strategy aims for per chunk
    #[must_use]
    pub const fn target_chars(&self) -> usize {
        self.chunk_size * CHARS_PER_TOKEN
    }

    /// Characters covered by one fixed-size window unit
    #[must_use]
    pub const fn chars_per_unit(&self) -> usize {
        match self.length_unit {
            LengthUnit::Characters => 1,
            LengthUnit::Tokens => CHARS_PER_TOKEN,
        }
    }

    /// Size above which the refinement pass splits a chunk
    #[must_use]
    pub const fn split_threshold(&self) -> usize {
        self.max_chunk_size + self.max_chunk_size / 2
    }
}

/// Unit used to measure fixed-size windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthUnit {
    /// Plain characters
    #[default]
    Characters,

    /// Approximated tokens of [`CHARS_PER_TOKEN`] characters
    Tokens,
}

impl LengthUnit {
    /// Get unit name as string
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Characters => "characters",
            Self::Tokens => "tokens",
        }
    }
}
