use super::{base_metadata, validated};
use crate::completion::{parse_json, CompletionProvider};
use crate::config::ChunkingConfig;
use crate::dispatch::{auto_select, Capabilities, Strategy, StrategyKind};
use crate::error::{ChunkerError, Result};
use crate::refine::RefinementPass;
use crate::text::{paragraph_groups, paragraph_spans, truncate_chars, Span};
use crate::types::{Chunk, DocumentMetadata};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

const SEGMENTER_SYSTEM_PROMPT: &str =
    "You split documents into coherent, self-contained chunks. Respond with JSON only.";

const PLANNER_SYSTEM_PROMPT: &str =
    "You analyze documents and plan how to chunk them for retrieval. Respond with JSON only.";

/// Fewest characters of each paragraph shown to the segmenter
const MIN_PREVIEW_CHARS: usize = 40;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BoundaryProposal {
    Object { boundaries: Vec<usize> },
    List(Vec<usize>),
}

impl BoundaryProposal {
    fn into_boundaries(self) -> Vec<usize> {
        match self {
            Self::Object { boundaries } | Self::List(boundaries) => boundaries,
        }
    }
}

/// Paragraph grouping proposed by a completion service, refined locally.
///
/// A failed call or an unusable answer falls back to plain paragraph grouping.
pub struct LlmAssistedChunker {
    config: ChunkingConfig,
    completer: Arc<dyn CompletionProvider>,
}

impl LlmAssistedChunker {
    pub const NAME: &'static str = "llm_assisted";

    pub fn new(config: ChunkingConfig, completer: Arc<dyn CompletionProvider>) -> Result<Self> {
        Ok(Self {
            config: validated(config)?,
            completer,
        })
    }

    pub async fn chunk(&self, text: &str) -> Result<Vec<Chunk>> {
        let whole = Span::new(0, text.len());
        let paragraphs = paragraph_spans(text, whole);
        if paragraphs.is_empty() {
            return Ok(Vec::new());
        }

        let (groups, source) = match self.propose(text, &paragraphs).await {
            Ok(boundaries) => (group_paragraphs(&paragraphs, &boundaries), "llm"),
            Err(e) => {
                log::warn!("llm_assisted: falling back to paragraph grouping: {e}");
                (
                    paragraph_groups(text, whole, self.config.target_chars()),
                    "heuristic",
                )
            }
        };

        let chunks: Vec<Chunk> = groups
            .into_iter()
            .enumerate()
            .map(|(idx, group)| {
                let metadata = base_metadata(&self.config, Self::NAME)
                    .attr("boundary_source", source)
                    .attr("group_index", idx);
                Chunk::new(group.start, group.end, group.slice(text), metadata)
            })
            .collect();

        Ok(RefinementPass::new(self.config.clone()).refine(text, chunks))
    }

    async fn propose(&self, text: &str, paragraphs: &[Span]) -> Result<Vec<usize>> {
        let preview_chars =
            (self.config.llm_max_input_chars / paragraphs.len()).max(MIN_PREVIEW_CHARS);
        let mut prompt = format!(
            "The document below is split into {} numbered paragraphs. Group consecutive \
             paragraphs into coherent chunks of roughly {} characters each.\n\
             Reply with {{\"boundaries\": [...]}} listing the index of the first paragraph \
             of every chunk, in ascending order.\n\n",
            paragraphs.len(),
            self.config.target_chars()
        );
        for (idx, paragraph) in paragraphs.iter().enumerate() {
            let preview = truncate_chars(paragraph.slice(text).trim(), preview_chars);
            prompt.push_str(&format!("[{idx}] {preview}\n"));
        }

        let response = self
            .completer
            .complete(&prompt, Some(SEGMENTER_SYSTEM_PROMPT), self.config.llm_temperature)
            .await?;
        let proposal: BoundaryProposal = parse_json(&response)?;
        validate_boundaries(proposal.into_boundaries(), paragraphs.len())
    }
}

impl std::fmt::Debug for LlmAssistedChunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmAssistedChunker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Sorted, deduplicated paragraph indices starting at 0.
fn validate_boundaries(mut boundaries: Vec<usize>, paragraph_count: usize) -> Result<Vec<usize>> {
    if let Some(&bad) = boundaries.iter().find(|&&idx| idx >= paragraph_count) {
        return Err(ChunkerError::external_service(format!(
            "proposed boundary {bad} is out of range for {paragraph_count} paragraphs"
        )));
    }
    boundaries.push(0);
    boundaries.sort_unstable();
    boundaries.dedup();
    Ok(boundaries)
}

fn group_paragraphs(paragraphs: &[Span], boundaries: &[usize]) -> Vec<Span> {
    boundaries
        .iter()
        .enumerate()
        .map(|(idx, &start)| {
            let end = boundaries.get(idx + 1).copied().unwrap_or(paragraphs.len());
            paragraphs[start].union(paragraphs[end - 1])
        })
        .collect()
}

/// Document analysis returned by the planning step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentPlan {
    #[serde(default)]
    pub document_type: Option<String>,

    #[serde(default)]
    pub strategy: Option<String>,

    #[serde(default)]
    pub topics: Vec<String>,
}

/// Lets a completion service pick the deterministic strategy for a document.
///
/// The plan only chooses; chunking itself is always done locally, then
/// normalized by the refinement pass (hierarchical trees are left intact).
pub struct AgenticChunker {
    config: ChunkingConfig,
    completer: Arc<dyn CompletionProvider>,
}

impl AgenticChunker {
    pub const NAME: &'static str = "agentic";

    pub fn new(config: ChunkingConfig, completer: Arc<dyn CompletionProvider>) -> Result<Self> {
        Ok(Self {
            config: validated(config)?,
            completer,
        })
    }

    /// Ask the completion service to analyze `text`
    pub async fn plan(&self, text: &str) -> Result<AgentPlan> {
        let sample = truncate_chars(text, self.config.llm_max_input_chars);
        let names = StrategyKind::ALL
            .iter()
            .filter(|kind| kind.is_deterministic())
            .map(|kind| kind.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let prompt = format!(
            "Analyze the document below and choose how to chunk it.\n\
             Reply with {{\"document_type\": string, \"strategy\": one of [{names}], \
             \"topics\": [string]}}.\n\n---\n{sample}\n---"
        );

        let response = self
            .completer
            .complete(&prompt, Some(PLANNER_SYSTEM_PROMPT), self.config.llm_temperature)
            .await?;
        parse_json(&response)
    }

    pub async fn chunk(&self, text: &str, metadata: &DocumentMetadata) -> Result<Vec<Chunk>> {
        let plan = match self.plan(text).await {
            Ok(plan) => Some(plan),
            Err(e) => {
                log::warn!("agentic: planning failed, using heuristic selection: {e}");
                None
            }
        };
        let (kind, source) = self.choose(text, plan.as_ref());
        log::debug!("agentic: running {kind} (chosen by {source})");

        let strategy = Strategy::build(kind, self.config.clone(), &Capabilities::default())?;
        let chunks = strategy.chunk_sync(text, metadata).ok_or_else(|| {
            ChunkerError::invalid_config(format!("strategy '{kind}' cannot run without services"))
        })?;
        let mut chunks = if kind == StrategyKind::Hierarchical {
            chunks
        } else {
            RefinementPass::new(self.config.clone()).refine(text, chunks)
        };

        for chunk in &mut chunks {
            chunk.metadata.strategy = Self::NAME.to_string();
            chunk.metadata.set("agent_strategy", kind.as_str());
            chunk.metadata.set("agent_plan_source", source);
            if let Some(plan) = &plan {
                if let Some(document_type) = &plan.document_type {
                    chunk.metadata.set("document_type", document_type.as_str());
                }
                if !plan.topics.is_empty() {
                    let topics: Vec<Value> = plan
                        .topics
                        .iter()
                        .map(|t| Value::from(t.as_str()))
                        .collect();
                    chunk.metadata.set("topics", topics);
                }
            }
        }
        Ok(chunks)
    }

    /// Plan strategy if deterministic, else the document type table, else the
    /// dispatcher heuristic.
    fn choose(&self, text: &str, plan: Option<&AgentPlan>) -> (StrategyKind, &'static str) {
        let planned = plan
            .and_then(|p| p.strategy.as_deref())
            .and_then(|name| StrategyKind::from_name(name).ok())
            .filter(|kind| kind.is_deterministic());
        if let Some(kind) = planned {
            return (kind, "llm");
        }

        let by_type = plan
            .and_then(|p| p.document_type.as_deref())
            .map(StrategyKind::recommended_for_document_type)
            .filter(|kind| kind.is_deterministic());
        if let Some(kind) = by_type {
            return (kind, "document_type");
        }

        (auto_select(text, &self.config), "heuristic")
    }
}

impl std::fmt::Debug for AgenticChunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgenticChunker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
