use crate::error::{ChunkerError, Result};
use async_trait::async_trait;
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinSet;

/// Maps text to a fixed-length vector.
///
/// Implementations wrap a real model or remote service; the engine only calls
/// through this trait. Callers apply timeouts here, the engine has none.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, returning vectors in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Vector length, when known up front
    fn dimension(&self) -> Option<usize> {
        None
    }
}

/// Deterministic hash-based embedder for tests and offline runs.
///
/// Identical text always maps to the same unit vector.
#[derive(Debug)]
pub struct StubEmbedder {
    dimension: usize,
    batch_calls: AtomicUsize,
}

impl StubEmbedder {
    #[must_use]
    pub const fn new(dimension: usize) -> Self {
        Self {
            dimension,
            batch_calls: AtomicUsize::new(0),
        }
    }

    /// Number of provider round-trips served so far
    #[must_use]
    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.batch_calls.fetch_add(1, Ordering::Relaxed);
        Ok(stub_embed(text, self.dimension))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.batch_calls.fetch_add(1, Ordering::Relaxed);
        Ok(texts
            .iter()
            .map(|text| stub_embed(text, self.dimension))
            .collect())
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }
}

/// Embedding cache keyed by exact text.
///
/// Scoped to the strategy (or chunker) that creates it; the mutex makes it
/// safe to share one instance between concurrent `chunk` calls.
pub struct EmbeddingCache {
    entries: Mutex<LruCache<String, Vec<f32>>>,
}

impl EmbeddingCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    #[must_use]
    pub fn get(&self, text: &str) -> Option<Vec<f32>> {
        let mut guard = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        guard.get(text).cloned()
    }

    pub fn put(&self, text: &str, vector: Vec<f32>) {
        let mut guard = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        guard.put(text.to_string(), vector);
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for EmbeddingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingCache")
            .field("len", &self.len())
            .finish()
    }
}

/// How [`embed_texts`] talks to the provider
#[derive(Debug, Clone, Copy)]
pub struct BatchPlan {
    pub batch_size: usize,
    pub parallel: bool,
}

/// Embed `texts` in order, serving repeats from `cache` and sending only
/// distinct misses to the provider in batches of `plan.batch_size`.
///
/// With `plan.parallel` the batches run concurrently on the current tokio
/// runtime and are reassembled by batch index.
pub async fn embed_texts(
    provider: &Arc<dyn EmbeddingProvider>,
    texts: &[String],
    plan: BatchPlan,
    cache: Option<&EmbeddingCache>,
) -> Result<Vec<Vec<f32>>> {
    let mut resolved: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
    let mut misses: Vec<String> = Vec::new();
    let mut miss_slots: HashMap<&str, usize> = HashMap::new();

    for (idx, text) in texts.iter().enumerate() {
        if let Some(hit) = cache.and_then(|c| c.get(text)) {
            log::trace!("embedding cache hit for sentence #{idx}");
            resolved[idx] = Some(hit);
        } else if !miss_slots.contains_key(text.as_str()) {
            miss_slots.insert(text.as_str(), misses.len());
            misses.push(text.clone());
        }
    }

    let batches: Vec<Vec<String>> = misses
        .chunks(plan.batch_size.max(1))
        .map(<[String]>::to_vec)
        .collect();
    let batch_results = if plan.parallel && batches.len() > 1 {
        embed_batches_parallel(provider, batches).await?
    } else {
        let mut out = Vec::with_capacity(batches.len());
        for batch in &batches {
            out.push(checked_batch(provider, batch).await?);
        }
        out
    };
    let fresh: Vec<Vec<f32>> = batch_results.into_iter().flatten().collect();

    for (idx, text) in texts.iter().enumerate() {
        if resolved[idx].is_some() {
            continue;
        }
        let slot = miss_slots[text.as_str()];
        let vector = fresh[slot].clone();
        if let Some(cache) = cache {
            cache.put(text, vector.clone());
        }
        resolved[idx] = Some(vector);
    }

    Ok(resolved.into_iter().flatten().collect())
}

async fn checked_batch(
    provider: &Arc<dyn EmbeddingProvider>,
    batch: &[String],
) -> Result<Vec<Vec<f32>>> {
    let vectors = provider.embed_batch(batch).await?;
    if vectors.len() != batch.len() {
        return Err(ChunkerError::external_service(format!(
            "embedding service returned {} vectors for {} inputs",
            vectors.len(),
            batch.len()
        )));
    }
    Ok(vectors)
}

async fn embed_batches_parallel(
    provider: &Arc<dyn EmbeddingProvider>,
    batches: Vec<Vec<String>>,
) -> Result<Vec<Vec<Vec<f32>>>> {
    let total = batches.len();
    let mut join = JoinSet::new();
    for (idx, batch) in batches.into_iter().enumerate() {
        let provider = Arc::clone(provider);
        join.spawn(async move { (idx, checked_batch(&provider, &batch).await) });
    }

    let mut slots: Vec<Option<Vec<Vec<f32>>>> = vec![None; total];
    while let Some(joined) = join.join_next().await {
        let (idx, result) = joined
            .map_err(|e| ChunkerError::external_service(format!("embedding task failed: {e}")))?;
        slots[idx] = Some(result?);
    }
    Ok(slots.into_iter().flatten().collect())
}

/// Similarity of two sentence embeddings in `[-1, 1]`.
///
/// Vectors of different lengths, or with a zero norm, score 0 so they never
/// look related.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let (norm_a, norm_b) = (l2_norm(a), l2_norm(b));
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / (norm_a * norm_b)
}

/// Scale `vec` to unit length in place; zero vectors are left untouched.
pub fn normalize(vec: &mut [f32]) {
    let norm = l2_norm(vec);
    if norm > 0.0 {
        vec.iter_mut().for_each(|value| *value /= norm);
    }
}

fn l2_norm(vec: &[f32]) -> f32 {
    vec.iter().map(|v| v * v).sum::<f32>().sqrt()
}

/// Element-wise mean of equally sized vectors
#[must_use]
pub fn mean_vector(vectors: &[&[f32]]) -> Option<Vec<f32>> {
    let first = vectors.first()?;
    let mut sum = vec![0.0f32; first.len()];
    for vector in vectors {
        if vector.len() != sum.len() {
            return None;
        }
        for (acc, value) in sum.iter_mut().zip(vector.iter()) {
            *acc += value;
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let n = vectors.len() as f32;
    for value in &mut sum {
        *value /= n;
    }
    Some(sum)
}

/// `local_weight * local + global_weight * global`, L2-normalized
pub fn blend(
    local: &[f32],
    global: &[f32],
    local_weight: f32,
    global_weight: f32,
) -> Result<Vec<f32>> {
    if local.len() != global.len() {
        return Err(ChunkerError::DimensionMismatch {
            expected: global.len(),
            actual: local.len(),
        });
    }
    let mut combined: Vec<f32> = local
        .iter()
        .zip(global.iter())
        .map(|(l, g)| local_weight.mul_add(*l, global_weight * g))
        .collect();
    normalize(&mut combined);
    Ok(combined)
}

/// Unit vector seeded from the text hash: identical texts embed identically,
/// different texts land on unrelated directions.
fn stub_embed(text: &str, dimension: usize) -> Vec<f32> {
    let mut state =
        fnv1a_64(text.as_bytes()) ^ (dimension as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let mut vec: Vec<f32> = (0..dimension)
        .map(|_| {
            // Top 23 bits as a mantissa in [1, 2), shifted to [-1, 1).
            let mantissa = (splitmix64(&mut state) >> 41) as u32;
            let unit = f32::from_bits(0x3f80_0000 | mantissa) - 1.0;
            unit.mul_add(2.0, -1.0)
        })
        .collect();
    normalize(&mut vec);
    vec
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

const fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
