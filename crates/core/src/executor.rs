//! Async Batch Executor (spec §4.6). Compatible consecutive blocks are
//! grouped into one translation call through the markdown-aware transport,
//! dispatched concurrently behind a semaphore and a token-bucket rate
//! limiter, retried with backoff+jitter on transient upstream errors, and
//! reassembled in document order once every task lands — no matter which
//! batch finishes first. Grounded in the page-processing Semaphore+JoinSet
//! pattern used elsewhere in this pipeline for per-page concurrency.

use crate::cache::{quality_score_for, CacheEntry, CacheHit, CacheKey, SemanticCache};
use crate::config::{GroupingConfig, PipelineConfig};
use crate::document::{BlockId, ContentBlock, Document};
use crate::error::{PipelineError, PipelineResult};
use crate::provider::{TranslationEndpoint, TranslationRequest};
use crate::quarantine::{QuarantineRecord, QuarantineStore};
use crate::router::{self, ModelTier, Strategy};
use crate::transport;
use crate::translator;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

const MAX_RATE_LIMIT_RETRIES: u32 = 5;
const MAX_TRANSIENT_RETRIES: u32 = 3;
const BACKOFF_BASE_MS: u64 = 250;
const BACKOFF_CAP_MS: u64 = 16_000;
/// A length-capped group can be halved this many times before it's treated
/// as unrecoverable; a single-block batch has nowhere left to split.
const MAX_SPLIT_DEPTH: u32 = 4;

/// A token-bucket limiter shared across every in-flight translation call.
/// Refills continuously rather than in discrete ticks, so bursty workloads
/// smooth out instead of waiting for a whole-second boundary.
pub struct RateLimiter {
    capacity: f64,
    refill_per_ms: f64,
    state: Mutex<(f64, std::time::Instant)>,
}

impl RateLimiter {
    pub fn new(requests_per_minute: f64) -> Self {
        let capacity = requests_per_minute.max(1.0);
        Self {
            capacity,
            refill_per_ms: capacity / 60_000.0,
            state: Mutex::new((capacity, std::time::Instant::now())),
        }
    }

    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut guard = self.state.lock().unwrap();
                let (tokens, last) = &mut *guard;
                let now = std::time::Instant::now();
                let elapsed_ms = now.duration_since(*last).as_secs_f64() * 1000.0;
                *tokens = (*tokens + elapsed_ms * self.refill_per_ms).min(self.capacity);
                *last = now;
                if *tokens >= 1.0 {
                    *tokens -= 1.0;
                    None
                } else {
                    let deficit = 1.0 - *tokens;
                    Some(Duration::from_secs_f64(deficit / self.refill_per_ms / 1000.0))
                }
            };
            match wait {
                None => return,
                Some(d) => tokio::time::sleep(d.max(Duration::from_millis(5))).await,
            }
        }
    }
}

/// Exponential backoff with full jitter. `RateLimited` gets up to
/// `MAX_RATE_LIMIT_RETRIES` (5), `TranslationEndpointTransient` up to
/// `MAX_TRANSIENT_RETRIES` (3) (spec §7's error-kind table); everything else
/// (including structural validation) is the self-correcting translator's
/// concern, not the executor's.
async fn call_with_backoff<F, Fut, T>(limiter: &RateLimiter, cancel: &CancellationToken, mut call: F) -> PipelineResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = PipelineResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        if cancel.is_cancelled() {
            return Err(PipelineError::RateLimited("cancelled before dispatch".to_string()));
        }
        limiter.acquire().await;
        match call().await {
            Ok(v) => return Ok(v),
            Err(e @ PipelineError::RateLimited(_)) => {
                if attempt >= MAX_RATE_LIMIT_RETRIES {
                    return Err(e);
                }
                attempt = backoff_and_bump(attempt, cancel, e).await?;
            }
            Err(e @ PipelineError::TranslationEndpointTransient(_)) => {
                if attempt >= MAX_TRANSIENT_RETRIES {
                    return Err(e);
                }
                attempt = backoff_and_bump(attempt, cancel, e).await?;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn backoff_and_bump(attempt: u32, cancel: &CancellationToken, e: PipelineError) -> PipelineResult<u32> {
    let backoff_ms = (BACKOFF_BASE_MS * 2u64.pow(attempt)).min(BACKOFF_CAP_MS);
    let jittered = rand::thread_rng().gen_range(0..=backoff_ms);
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_millis(jittered)) => {}
        _ = cancel.cancelled() => return Err(e),
    }
    Ok(attempt + 1)
}

/// Translates one group's worth of texts as a single markdown-aware call,
/// halving the batch and retrying each half whenever the provider reports
/// `length_cap` (spec §6.3) instead of silently accepting a truncated
/// translation. `raw_split` on each returned item records whether its half
/// of the batch came back cleanly separated by the transport's item-break
/// token, for the quality score the caller stamps onto the cache entry.
async fn translate_batch(
    endpoint: &dyn TranslationEndpoint,
    limiter: &RateLimiter,
    cancel: &CancellationToken,
    texts: &[String],
    target_language: &str,
    model: &str,
    temperature: f64,
    depth: u32,
) -> PipelineResult<Vec<(String, bool)>> {
    let refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
    let payload = transport::build_payload(&refs);
    let request = TranslationRequest {
        text: payload,
        source_language_hint: None,
        target_language: target_language.to_string(),
        model_identifier: model.to_string(),
        temperature,
        system_instructions: None,
    };

    let response = call_with_backoff(limiter, cancel, || async { endpoint.translate(&request).await }).await?;

    if response.finish_reason == "length_cap" && texts.len() > 1 && depth < MAX_SPLIT_DEPTH {
        let mid = texts.len() / 2;
        let (left, right) = texts.split_at(mid);
        let left = Box::pin(translate_batch(
            endpoint, limiter, cancel, left, target_language, model, temperature, depth + 1,
        ));
        let right = Box::pin(translate_batch(
            endpoint, limiter, cancel, right, target_language, model, temperature, depth + 1,
        ));
        let (left_out, right_out) = tokio::try_join!(left, right)?;
        return Ok(left_out.into_iter().chain(right_out).collect());
    }

    if response.finish_reason == "length_cap" {
        return Err(PipelineError::TranslationEndpointTransient(
            "translation stayed length-capped down to the smallest splittable batch".to_string(),
        ));
    }

    let raw_split =
        response.translated_text.matches(transport::ITEM_BREAK).count() + 1 == texts.len();
    let split = transport::split_payload(&response.translated_text, texts.len());
    Ok(split.into_iter().map(|t| (t, raw_split)).collect())
}

/// One dispatch-able unit: either a single preserve/self-correcting block,
/// or a group of markdown-aware blocks sharing one translation call.
enum Unit {
    Preserve(BlockId),
    SelfCorrecting(BlockId, ModelTier),
    Group(Vec<BlockId>, ModelTier),
}

/// Group adjacent blocks that share a `Strategy` and `ModelTier` under the
/// markdown-aware strategies. Headings are always kept as their own
/// single-item group so their translated title never gets spliced against
/// neighboring body text; preserve and self-correcting blocks are never
/// grouped at all (spec §4.6).
fn plan(document: &Document, routing_cfg: &crate::config::RoutingConfig, grouping: &GroupingConfig) -> Vec<Unit> {
    let mut units = Vec::new();
    let mut pending: Vec<BlockId> = Vec::new();
    let mut pending_chars = 0usize;
    let mut pending_tier: Option<ModelTier> = None;

    let flush = |units: &mut Vec<Unit>, pending: &mut Vec<BlockId>, pending_tier: &mut Option<ModelTier>| {
        if !pending.is_empty() {
            units.push(Unit::Group(std::mem::take(pending), pending_tier.take().unwrap()));
        }
    };

    for block in document.blocks() {
        let routing = router::route(block, routing_cfg);
        match routing.strategy {
            Strategy::Preserve => {
                flush(&mut units, &mut pending, &mut pending_tier);
                pending_chars = 0;
                units.push(Unit::Preserve(block.id()));
            }
            Strategy::SelfCorrecting => {
                flush(&mut units, &mut pending, &mut pending_tier);
                pending_chars = 0;
                units.push(Unit::SelfCorrecting(block.id(), routing.tier.unwrap_or(ModelTier::Quality)));
            }
            Strategy::MarkdownAwareQuality | Strategy::MarkdownAwareCost => {
                let tier = routing.tier.unwrap_or(ModelTier::Quality);
                let is_heading = matches!(block, ContentBlock::Heading { .. });
                let chars = block.original_text().len();
                let would_overflow = pending_chars + chars > grouping.max_group_size_chars
                    || pending.len() >= grouping.max_items_per_group
                    || pending_tier.is_some_and(|t| t != tier);

                if is_heading || !grouping.enable {
                    flush(&mut units, &mut pending, &mut pending_tier);
                    pending_chars = 0;
                    units.push(Unit::Group(vec![block.id()], tier));
                    continue;
                }

                if would_overflow {
                    flush(&mut units, &mut pending, &mut pending_tier);
                    pending_chars = 0;
                }
                pending.push(block.id());
                pending_chars += chars;
                pending_tier = Some(tier);
            }
        }
    }
    flush(&mut units, &mut pending, &mut pending_tier);
    units
}

pub struct ExecutionOutcome {
    pub translated_blocks: usize,
    pub cache_hits: usize,
    pub api_calls: usize,
    pub quarantined: usize,
}

/// Per-block result metadata, stamped onto [`BlockMetadata`] once every
/// task lands (spec §4.4 step 4, §4.5 cache-hit bookkeeping).
struct BlockOutcome {
    cache_hit: bool,
    quarantined: bool,
    validator_confidence: Option<f64>,
}

impl BlockOutcome {
    fn cache_hit() -> Self {
        Self { cache_hit: true, quarantined: false, validator_confidence: None }
    }
    /// No cache lookup and no validator ran: either a preserve-strategy
    /// block, or a placeholder overwritten once the group's live call lands.
    fn none() -> Self {
        Self { cache_hit: false, quarantined: false, validator_confidence: None }
    }
    fn translated(validator_confidence: f64) -> Self {
        Self { cache_hit: false, quarantined: false, validator_confidence: Some(validator_confidence) }
    }
    fn quarantined() -> Self {
        Self { cache_hit: false, quarantined: true, validator_confidence: Some(0.0) }
    }
}

/// Runs every [`Unit`] of `document` concurrently, writing `translated_text`
/// directly onto each block, and returns aggregate counters for the trace.
pub async fn execute(
    document: &mut Document,
    endpoint: Arc<dyn TranslationEndpoint>,
    cache: Arc<SemanticCache>,
    quarantine: Arc<QuarantineStore>,
    config: &PipelineConfig,
    cancel: CancellationToken,
) -> PipelineResult<ExecutionOutcome> {
    let units = plan(document, &config.routing, &config.grouping);
    let limiter = Arc::new(RateLimiter::new(config.translation.requests_per_minute));
    let semaphore = Arc::new(Semaphore::new(config.translation.max_concurrent_translations));

    let cache_hits = Arc::new(AtomicU64::new(0));
    let api_calls = Arc::new(AtomicU64::new(0));
    let quarantined_count = Arc::new(AtomicU64::new(0));

    let mut join_set: JoinSet<PipelineResult<Vec<(BlockId, String, BlockOutcome)>>> = JoinSet::new();

    for unit in units {
        let permit = semaphore.clone().acquire_owned().await.map_err(|_| {
            PipelineError::RateLimited("translation semaphore closed".to_string())
        })?;
        let endpoint = endpoint.clone();
        let cache = cache.clone();
        let quarantine = quarantine.clone();
        let limiter = limiter.clone();
        let cancel = cancel.clone();
        let target_language = config.translation.target_language.clone();
        let temperature = config.translation.temperature;
        let cost_model = config.routing.cost_model.clone();
        let quality_model = config.routing.quality_model.clone();
        let max_attempts = config.self_correction.max_attempts;
        let document_id = document.document_id.clone();

        let blocks: Vec<ContentBlock> = match &unit {
            Unit::Preserve(id) | Unit::SelfCorrecting(id, _) => {
                vec![document.find_block(*id).expect("planned block id must exist").clone()]
            }
            Unit::Group(ids, _) => ids
                .iter()
                .map(|id| document.find_block(*id).expect("planned block id must exist").clone())
                .collect(),
        };

        let cache_hits = cache_hits.clone();
        let api_calls = api_calls.clone();
        let quarantined_count = quarantined_count.clone();

        join_set.spawn(async move {
            let _permit = permit;
            match unit {
                Unit::Preserve(id) => {
                    Ok(vec![(id, blocks[0].original_text().to_string(), BlockOutcome::none())])
                }

                Unit::SelfCorrecting(id, tier) => {
                    let model = model_for(tier, &cost_model, &quality_model);
                    let block = &blocks[0];
                    let key = CacheKey::new(block.original_text(), &target_language, model);
                    if let CacheHit::Exact(entry) = cache.lookup(&key) {
                        cache_hits.fetch_add(1, Ordering::Relaxed);
                        return Ok(vec![(id, entry.translated_text, BlockOutcome::cache_hit())]);
                    }

                    api_calls.fetch_add(1, Ordering::Relaxed);
                    let outcome = translator::translate_with_self_correction(
                        endpoint.as_ref(),
                        &limiter,
                        &cancel,
                        block,
                        &target_language,
                        model,
                        temperature,
                        max_attempts,
                    )
                    .await;

                    if outcome.quarantined {
                        quarantined_count.fetch_add(1, Ordering::Relaxed);
                        quarantine
                            .record(&QuarantineRecord {
                                document_id,
                                block_id: id,
                                block_type: block_type_name(block),
                                original_text: block.original_text().to_string(),
                                last_error: outcome.last_error.unwrap_or_default(),
                                attempt_count: outcome.attempts,
                                timestamp: chrono::Utc::now().timestamp(),
                                context_neighbors: Vec::new(),
                            })
                            .await?;
                        return Ok(vec![(id, outcome.translated_text, BlockOutcome::quarantined())]);
                    }

                    cache
                        .store(
                            key,
                            CacheEntry {
                                translated_text: outcome.translated_text.clone(),
                                embedding: Vec::new(),
                                quality_score: quality_score_for(outcome.validator_confidence, false),
                                timestamp: chrono::Utc::now().timestamp(),
                            },
                            chrono::Utc::now().timestamp(),
                        )
                        .await?;

                    Ok(vec![(id, outcome.translated_text, BlockOutcome::translated(outcome.validator_confidence))])
                }

                Unit::Group(ids, tier) => {
                    let model = model_for(tier, &cost_model, &quality_model);
                    let mut results = Vec::with_capacity(ids.len());
                    let mut to_translate_idx = Vec::new();
                    let mut to_translate_text = Vec::new();

                    for (idx, block) in blocks.iter().enumerate() {
                        let key = CacheKey::new(block.original_text(), &target_language, model);
                        if let CacheHit::Exact(entry) = cache.lookup(&key) {
                            cache_hits.fetch_add(1, Ordering::Relaxed);
                            results.push((ids[idx], entry.translated_text, BlockOutcome::cache_hit()));
                        } else {
                            results.push((ids[idx], String::new(), BlockOutcome::none()));
                            to_translate_idx.push(idx);
                            to_translate_text.push(block.original_text().to_string());
                        }
                    }

                    if !to_translate_idx.is_empty() {
                        api_calls.fetch_add(1, Ordering::Relaxed);
                        match translate_batch(
                            endpoint.as_ref(),
                            &limiter,
                            &cancel,
                            &to_translate_text,
                            &target_language,
                            model,
                            temperature,
                            0,
                        )
                        .await
                        {
                            Ok(translated) => {
                                for (split_idx, &idx) in to_translate_idx.iter().enumerate() {
                                    let (translated_text, raw_split) =
                                        translated.get(split_idx).cloned().unwrap_or_default();
                                    let key = CacheKey::new(&to_translate_text[split_idx], &target_language, model);
                                    let confidence = quality_score_for(1.0, !raw_split);
                                    cache
                                        .store(
                                            key,
                                            CacheEntry {
                                                translated_text: translated_text.clone(),
                                                embedding: Vec::new(),
                                                quality_score: confidence,
                                                timestamp: chrono::Utc::now().timestamp(),
                                            },
                                            chrono::Utc::now().timestamp(),
                                        )
                                        .await?;
                                    results[idx] = (ids[idx], translated_text, BlockOutcome::translated(confidence));
                                }
                            }
                            // Block-scoped failure (exhausted retries, or a policy block
                            // surfaced after backoff gave up): quarantine just this
                            // group's untranslated blocks instead of failing the task,
                            // so one bad batch never aborts the whole Document (spec §7).
                            Err(e) => {
                                for (split_idx, &idx) in to_translate_idx.iter().enumerate() {
                                    quarantined_count.fetch_add(1, Ordering::Relaxed);
                                    quarantine
                                        .record(&QuarantineRecord {
                                            document_id: document_id.clone(),
                                            block_id: ids[idx],
                                            block_type: block_type_name(&blocks[idx]),
                                            original_text: to_translate_text[split_idx].clone(),
                                            last_error: e.to_string(),
                                            attempt_count: 1,
                                            timestamp: chrono::Utc::now().timestamp(),
                                            context_neighbors: Vec::new(),
                                        })
                                        .await?;
                                    results[idx] =
                                        (ids[idx], to_translate_text[split_idx].clone(), BlockOutcome::quarantined());
                                }
                            }
                        }
                    }

                    Ok(results)
                }
            }
        });
    }

    let mut assignments: Vec<(BlockId, String, BlockOutcome)> = Vec::new();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(Ok(items)) => assignments.extend(items),
            Ok(Err(e)) => return Err(e),
            Err(e) => {
                return Err(PipelineError::TranslationEndpointTransient(format!(
                    "translation task panicked: {e}"
                )))
            }
        }
    }

    let translated_blocks = assignments.len();
    for (id, text, outcome) in assignments {
        if let Some(block) = document.find_block_mut(id) {
            if block.is_preserve_only() {
                block.preserve();
            } else {
                block.set_translated_text(text);
            }
            let metadata = block.metadata_mut();
            metadata.translation_failed = outcome.quarantined;
            metadata.cache_hit = outcome.cache_hit;
            if let Some(confidence) = outcome.validator_confidence {
                metadata.validator_confidence = Some(confidence);
            }
        }
    }

    Ok(ExecutionOutcome {
        translated_blocks,
        cache_hits: cache_hits.load(Ordering::Relaxed) as usize,
        api_calls: api_calls.load(Ordering::Relaxed) as usize,
        quarantined: quarantined_count.load(Ordering::Relaxed) as usize,
    })
}

fn model_for<'a>(tier: ModelTier, cost_model: &'a str, quality_model: &'a str) -> &'a str {
    match tier {
        ModelTier::Cost => cost_model,
        ModelTier::Quality => quality_model,
    }
}

fn block_type_name(block: &ContentBlock) -> String {
    match block {
        ContentBlock::Heading { .. } => "Heading",
        ContentBlock::Paragraph { .. } => "Paragraph",
        ContentBlock::ListItem { .. } => "ListItem",
        ContentBlock::Footnote { .. } => "Footnote",
        ContentBlock::Table { .. } => "Table",
        ContentBlock::Caption { .. } => "Caption",
        ContentBlock::MathFormula { .. } => "MathFormula",
        ContentBlock::CodeBlock { .. } => "CodeBlock",
        ContentBlock::ImagePlaceholder { .. } => "ImagePlaceholder",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoutingConfig;
    use crate::document::{BlockId, BlockMetadata, BoundingBox, HeadingBlock, BookmarkId, Page, ParagraphBlock};

    fn bbox() -> BoundingBox {
        BoundingBox { x: 0.0, y: 0.0, width: 10.0, height: 10.0 }
    }

    fn paragraph(text: &str) -> ContentBlock {
        ContentBlock::Paragraph {
            id: BlockId::new(),
            page_number: 1,
            bounding_box: bbox(),
            original_text: text.to_string(),
            translated_text: None,
            metadata: BlockMetadata::default(),
            paragraph: ParagraphBlock { is_continuation: false },
        }
    }

    fn heading(text: &str) -> ContentBlock {
        ContentBlock::Heading {
            id: BlockId::new(),
            page_number: 1,
            bounding_box: bbox(),
            original_text: text.to_string(),
            translated_text: None,
            metadata: BlockMetadata::default(),
            heading: HeadingBlock { level: 1, bookmark_id: BookmarkId::new(), numbering: None },
        }
    }

    #[test]
    fn adjacent_paragraphs_are_grouped_and_headings_stand_alone() {
        let mut document = Document::new("doc-1");
        document.pages.push(Page {
            page_number: 1,
            blocks: vec![heading("Intro"), paragraph("Short sentence one."), paragraph("Short sentence two.")],
        });
        let routing = RoutingConfig::default();
        let grouping = GroupingConfig::default();
        let units = plan(&document, &routing, &grouping);

        assert_eq!(units.len(), 2);
        match &units[0] {
            Unit::Group(ids, _) => assert_eq!(ids.len(), 1),
            _ => panic!("expected heading to be its own group"),
        }
        match &units[1] {
            Unit::Group(ids, _) => assert_eq!(ids.len(), 2),
            _ => panic!("expected paragraphs to be grouped together"),
        }
    }

    #[test]
    fn group_size_cap_splits_oversized_runs() {
        let mut document = Document::new("doc-1");
        let long_text = "word ".repeat(50);
        document.pages.push(Page {
            page_number: 1,
            blocks: (0..5).map(|_| paragraph(&long_text)).collect(),
        });
        let routing = RoutingConfig::default();
        let mut grouping = GroupingConfig::default();
        grouping.max_items_per_group = 2;
        let units = plan(&document, &routing, &grouping);
        assert!(units.len() >= 3);
    }

    #[tokio::test]
    async fn rate_limiter_throttles_bursts() {
        let limiter = RateLimiter::new(6000.0);
        let start = std::time::Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    struct AlwaysBlockedEndpoint;

    #[async_trait::async_trait]
    impl TranslationEndpoint for AlwaysBlockedEndpoint {
        async fn translate(&self, _request: &TranslationRequest) -> PipelineResult<crate::provider::TranslationResponse> {
            Err(PipelineError::TranslationEndpointBlocked("policy refused this content".to_string()))
        }
        async fn check(&self) -> PipelineResult<()> {
            Ok(())
        }
        fn provider_name(&self) -> &str {
            "stub-blocked"
        }
        fn model_identifier(&self) -> &str {
            "stub-model"
        }
    }

    struct LengthCappedThenCompleteEndpoint;

    #[async_trait::async_trait]
    impl TranslationEndpoint for LengthCappedThenCompleteEndpoint {
        async fn translate(&self, request: &TranslationRequest) -> PipelineResult<crate::provider::TranslationResponse> {
            let item_count = request.text.matches(transport::ITEM_BREAK).count() + 1;
            if item_count > 1 {
                return Ok(crate::provider::TranslationResponse {
                    translated_text: "truncated".to_string(),
                    finish_reason: "length_cap".to_string(),
                    usage_tokens: None,
                });
            }
            Ok(crate::provider::TranslationResponse {
                translated_text: "translated.".to_string(),
                finish_reason: "complete".to_string(),
                usage_tokens: None,
            })
        }
        async fn check(&self) -> PipelineResult<()> {
            Ok(())
        }
        fn provider_name(&self) -> &str {
            "stub-length-cap"
        }
        fn model_identifier(&self) -> &str {
            "stub-model"
        }
    }

    async fn empty_cache() -> Arc<SemanticCache> {
        Arc::new(SemanticCache::new(None, &crate::config::CacheConfig::default()).await.unwrap())
    }

    fn quarantine_store() -> (Arc<QuarantineStore>, tempfile::TempDir) {
        let dir = tempfile::TempDir::new().unwrap();
        let storage: Box<dyn pdf_transl_storage::StorageBackend> =
            Box::new(pdf_transl_storage::LocalStorage::new(dir.path().to_path_buf(), "http://localhost".to_string()));
        (Arc::new(QuarantineStore::new(storage, "quarantine")), dir)
    }

    #[tokio::test]
    async fn blocked_group_is_quarantined_without_aborting_the_document() {
        let mut document = Document::new("doc-1");
        document.pages.push(Page {
            page_number: 1,
            blocks: vec![paragraph("Short sentence one."), paragraph("Short sentence two.")],
        });
        let (quarantine, _dir) = quarantine_store();
        let config = PipelineConfig::default();

        let outcome = execute(
            &mut document,
            Arc::new(AlwaysBlockedEndpoint),
            empty_cache().await,
            quarantine,
            &config,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.quarantined, 2);
        for block in document.blocks() {
            assert!(block.metadata().translation_failed);
        }
    }

    #[tokio::test]
    async fn length_capped_group_splits_and_retries_until_each_half_completes() {
        let mut document = Document::new("doc-1");
        document.pages.push(Page {
            page_number: 1,
            blocks: vec![paragraph("Short sentence one."), paragraph("Short sentence two.")],
        });
        let (quarantine, _dir) = quarantine_store();
        let config = PipelineConfig::default();

        let outcome = execute(
            &mut document,
            Arc::new(LengthCappedThenCompleteEndpoint),
            empty_cache().await,
            quarantine,
            &config,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.quarantined, 0);
        for block in document.blocks() {
            assert_eq!(block.translated_text(), Some("translated."));
        }
    }
}
