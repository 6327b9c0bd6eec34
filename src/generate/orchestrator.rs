//! Drives one generation request through the chosen strategy.
//!
//! The direct and summary paths are a single prompt (fanned out when the
//! provider cannot return several choices per call). The chunked path asks
//! for one message per chunk, skips chunks that fail, and then merges the
//! survivors with a synthesis call. When every chunk fails a last call is
//! made from the changed file names alone.

use std::sync::Arc;

use tokio::task::JoinError;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::diff::{
    ChangeDigest, ChangeStatistics, DEFAULT_CHUNK_TOKENS, DEFAULT_TOP_FILES, DiffChunk,
    StagedDiff, TokenEstimator, partition_diff, summarize,
};
use crate::error::{CompletionError, GenerationError};
use crate::generate::postprocess::{
    CleanOptions, MIN_MESSAGE_LENGTH, clean_message, dedupe, process_candidates,
};
use crate::generate::prompt::{
    build_system_prompt, chunk_payload, diff_payload, digest_payload, file_list_payload,
    synthesis_payload,
};
use crate::generate::request::{CandidateMessage, GenerationRequest, MessageOrigin};
use crate::generate::strategy::{SizePolicy, Strategy, select_strategy};
use crate::llm::service::{CompletionOptions, CompletionRequest, CompletionService};

/// Model context window assumed when sizing per-chunk output budgets.
pub const DEFAULT_CONTEXT_TOKENS: usize = 4_096;

/// Tokens reserved for the system prompt and chunk framing.
pub const DEFAULT_PROMPT_OVERHEAD_TOKENS: usize = 500;

/// Lower bound for a chunk call's output budget.
pub const MIN_CHUNK_OUTPUT_TOKENS: usize = 200;

/// Output budget for direct, summary, synthesis, and fallback calls.
pub const DEFAULT_MESSAGE_TOKENS: u32 = 200;

/// Tunables for the generator. Every threshold here is a knob, not a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub policy: SizePolicy,
    pub estimator: TokenEstimator,
    /// Chunk budget used when the request does not override it.
    pub chunk_tokens: usize,
    /// Entries kept in a digest before the rest are counted as omitted.
    pub top_files: usize,
    pub context_tokens: usize,
    pub prompt_overhead_tokens: usize,
    pub min_chunk_output_tokens: usize,
    pub message_tokens: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            policy: SizePolicy::default(),
            estimator: TokenEstimator::default(),
            chunk_tokens: DEFAULT_CHUNK_TOKENS,
            top_files: DEFAULT_TOP_FILES,
            context_tokens: DEFAULT_CONTEXT_TOKENS,
            prompt_overhead_tokens: DEFAULT_PROMPT_OVERHEAD_TOKENS,
            min_chunk_output_tokens: MIN_CHUNK_OUTPUT_TOKENS,
            message_tokens: DEFAULT_MESSAGE_TOKENS,
        }
    }
}

impl GeneratorConfig {
    /// Output budget for one chunk call: context minus overhead minus input,
    /// never below the floor.
    pub fn chunk_output_tokens(&self, chunk: &DiffChunk) -> u32 {
        let budget = self
            .context_tokens
            .saturating_sub(self.prompt_overhead_tokens)
            .saturating_sub(chunk.estimated_tokens)
            .max(self.min_chunk_output_tokens);
        u32::try_from(budget).unwrap_or(u32::MAX)
    }
}

/// Prepared prompt material for one strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationInput {
    Diff(String),
    Digest(ChangeDigest),
    Chunks(Vec<DiffChunk>),
}

impl GenerationInput {
    fn is_empty(&self) -> bool {
        match self {
            GenerationInput::Diff(diff) => diff.trim().is_empty(),
            GenerationInput::Digest(digest) => digest.is_empty(),
            GenerationInput::Chunks(chunks) => chunks.is_empty(),
        }
    }
}

/// Generates commit messages against any [`CompletionService`].
pub struct Generator {
    service: Arc<dyn CompletionService>,
    config: GeneratorConfig,
}

impl Generator {
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self::with_config(service, GeneratorConfig::default())
    }

    pub fn with_config(service: Arc<dyn CompletionService>, config: GeneratorConfig) -> Self {
        Self { service, config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Classify the staged changes and prepare the matching input.
    ///
    /// `stats` is `None` when statistics could not be collected; large
    /// diffs then fall back to chunking.
    pub fn plan(
        &self,
        request: &GenerationRequest,
        staged: &StagedDiff,
        stats: Option<&ChangeStatistics>,
    ) -> (Strategy, GenerationInput) {
        let stats = stats.filter(|s| !s.per_file.is_empty());
        let strategy = select_strategy(
            staged.raw_diff.len(),
            staged.files.len(),
            stats.is_some(),
            request.large_diff,
            &self.config.policy,
        );

        let input = match (strategy, stats) {
            (Strategy::Summary, Some(stats)) => {
                GenerationInput::Digest(summarize(&stats.per_file, self.config.top_files))
            }
            (Strategy::Chunked, _) | (Strategy::Summary, None) => {
                let budget = request.chunk_tokens.unwrap_or(self.config.chunk_tokens);
                GenerationInput::Chunks(partition_diff(
                    &staged.raw_diff,
                    budget,
                    self.config.estimator,
                ))
            }
            (Strategy::Direct, _) => GenerationInput::Diff(staged.raw_diff.clone()),
        };

        debug!(
            "Planned {} generation for {} bytes across {} files",
            strategy,
            staged.raw_diff.len(),
            staged.files.len()
        );
        (strategy, input)
    }

    /// Plan and generate in one step.
    pub async fn generate_for_staged(
        &self,
        request: &GenerationRequest,
        staged: &StagedDiff,
        stats: Option<&ChangeStatistics>,
    ) -> Result<Vec<CandidateMessage>, GenerationError> {
        let (strategy, input) = self.plan(request, staged, stats);
        info!("Generating commit message using the {} strategy", strategy);
        self.generate(request, input).await
    }

    /// Produce deduplicated candidates in generation order.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        input: GenerationInput,
    ) -> Result<Vec<CandidateMessage>, GenerationError> {
        if input.is_empty() {
            return Err(GenerationError::EmptyInput);
        }

        match input {
            GenerationInput::Diff(diff) => {
                self.generate_single(request, diff_payload(&diff), MessageOrigin::Direct)
                    .await
            }
            GenerationInput::Digest(digest) => {
                self.generate_single(request, digest_payload(&digest), MessageOrigin::Summary)
                    .await
            }
            GenerationInput::Chunks(chunks) => self.generate_chunked(request, &chunks).await,
        }
    }

    async fn generate_single(
        &self,
        request: &GenerationRequest,
        payload: String,
        origin: MessageOrigin,
    ) -> Result<Vec<CandidateMessage>, GenerationError> {
        let system = build_system_prompt(request);
        let raws = self
            .complete_many(request, system, payload)
            .await
            .map_err(GenerationError::Provider)?;

        let messages = process_candidates(raws, CleanOptions::new(request.max_length));
        if messages.is_empty() {
            return Err(GenerationError::NoMessagesGenerated { last_error: None });
        }
        Ok(candidates(messages, origin))
    }

    /// Run `completions` choices for one prompt.
    ///
    /// Fan-out results are merged in issuance order. The call only fails
    /// when every branch failed.
    async fn complete_many(
        &self,
        request: &GenerationRequest,
        system: String,
        user: String,
    ) -> Result<Vec<String>, CompletionError> {
        let n = request.completions.max(1);
        if n == 1 || self.service.supports_multiple_choices() {
            let call = CompletionRequest::new(system, user, self.options(request, None, n));
            return complete_with_timeout(self.service.as_ref(), &call).await;
        }

        debug!("Provider returns one choice per call, issuing {} calls", n);
        let handles: Vec<_> = (0..n)
            .map(|_| {
                let call = CompletionRequest::new(
                    system.clone(),
                    user.clone(),
                    self.options(request, None, 1),
                );
                self.spawn_call(call)
            })
            .collect();

        let mut texts = Vec::new();
        let mut first_error = None;
        for handle in handles {
            match flatten_join(handle.await) {
                Ok(choices) => texts.extend(choices),
                Err(err) => {
                    warn!("{} completion call failed: {}", self.service.name(), err);
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) if texts.is_empty() => Err(err),
            _ => Ok(texts),
        }
    }

    async fn generate_chunked(
        &self,
        request: &GenerationRequest,
        chunks: &[DiffChunk],
    ) -> Result<Vec<CandidateMessage>, GenerationError> {
        let system = build_system_prompt(request);
        let clean_options = merged_clean_options(request);
        let total = chunks.len();
        info!("Generating messages for {} diff chunks", total);

        let handles: Vec<_> = chunks
            .iter()
            .enumerate()
            .map(|(index, chunk)| {
                let tokens = self.config.chunk_output_tokens(chunk);
                let call = CompletionRequest::new(
                    system.clone(),
                    chunk_payload(&chunk.text, index, total, request.max_length),
                    self.options(request, Some(tokens), 1),
                );
                self.spawn_call(call)
            })
            .collect();

        let mut messages = Vec::new();
        let mut last_error = None;
        for (index, handle) in handles.into_iter().enumerate() {
            match flatten_join(handle.await) {
                Ok(choices) => match first_clean(&choices, clean_options) {
                    Some(message) => messages.push(message),
                    None => {
                        warn!("Chunk {}/{} produced no usable message", index + 1, total);
                    }
                },
                Err(err) => {
                    warn!(
                        "Chunk {}/{} failed on {}, skipping: {}",
                        index + 1,
                        total,
                        self.service.name(),
                        err
                    );
                    last_error = Some(err);
                }
            }
        }

        let mut messages = dedupe(messages);
        match messages.len() {
            0 => self.fallback(request, &system, chunks, last_error).await,
            1 => Ok(candidates(messages.drain(..), MessageOrigin::ChunkSynthesis)),
            _ => Ok(self.synthesize(request, &system, messages).await),
        }
    }

    /// Merge chunk messages into one. Degrades to the unmerged list on failure.
    async fn synthesize(
        &self,
        request: &GenerationRequest,
        system: &str,
        messages: Vec<String>,
    ) -> Vec<CandidateMessage> {
        let call = CompletionRequest::new(
            system,
            synthesis_payload(&messages),
            self.options(request, None, 1),
        );

        match complete_with_timeout(self.service.as_ref(), &call).await {
            Ok(choices) => {
                if let Some(merged) = first_clean(&choices, merged_clean_options(request)) {
                    return vec![CandidateMessage {
                        text: merged,
                        origin: MessageOrigin::ChunkSynthesis,
                    }];
                }
                warn!("Synthesis returned no usable message, keeping per-chunk messages");
            }
            Err(err) => warn!(
                "Synthesis on {} failed, keeping per-chunk messages: {}",
                self.service.name(),
                err
            ),
        }
        candidates(messages, MessageOrigin::ChunkSynthesis)
    }

    /// Last attempt when every chunk failed: describe the change from file names.
    async fn fallback(
        &self,
        request: &GenerationRequest,
        system: &str,
        chunks: &[DiffChunk],
        last_error: Option<CompletionError>,
    ) -> Result<Vec<CandidateMessage>, GenerationError> {
        let files = dedupe(chunks.iter().flat_map(DiffChunk::file_names));
        if files.is_empty() {
            warn!("All chunks failed and no file names were found");
            return Err(GenerationError::NoMessagesGenerated { last_error });
        }

        warn!("All chunks failed, retrying from {} file names", files.len());
        let call = CompletionRequest::new(
            system,
            file_list_payload(&files),
            self.options(request, None, 1),
        );

        match complete_with_timeout(self.service.as_ref(), &call).await {
            Ok(choices) => match first_clean(&choices, merged_clean_options(request)) {
                Some(message) => Ok(vec![CandidateMessage {
                    text: message,
                    origin: MessageOrigin::ChunkSynthesis,
                }]),
                None => Err(GenerationError::NoMessagesGenerated { last_error }),
            },
            Err(err) => {
                warn!("File name fallback on {} failed: {}", self.service.name(), err);
                Err(GenerationError::NoMessagesGenerated {
                    last_error: Some(err),
                })
            }
        }
    }

    fn options(
        &self,
        request: &GenerationRequest,
        max_tokens: Option<u32>,
        n: u32,
    ) -> CompletionOptions {
        CompletionOptions {
            max_tokens: max_tokens.unwrap_or(self.config.message_tokens),
            n,
            timeout: request.timeout,
            proxy: request.proxy.clone(),
            ..CompletionOptions::default()
        }
    }

    fn spawn_call(
        &self,
        call: CompletionRequest,
    ) -> tokio::task::JoinHandle<Result<Vec<String>, CompletionError>> {
        let service = Arc::clone(&self.service);
        tokio::spawn(async move { complete_with_timeout(service.as_ref(), &call).await })
    }
}

/// One completion call bounded by its own timeout.
async fn complete_with_timeout(
    service: &dyn CompletionService,
    call: &CompletionRequest,
) -> Result<Vec<String>, CompletionError> {
    let limit = call.options.timeout;
    timeout(limit, service.complete(call))
        .await
        .map_err(|_| CompletionError::Timeout(limit))?
}

fn flatten_join(
    joined: Result<Result<Vec<String>, CompletionError>, JoinError>,
) -> Result<Vec<String>, CompletionError> {
    joined.map_err(|e| CompletionError::InvalidResponse(format!("completion task failed: {e}")))?
}

/// Cleaning for chunk, synthesis, and fallback messages.
fn merged_clean_options(request: &GenerationRequest) -> CleanOptions {
    CleanOptions::new(request.max_length).with_min_length(MIN_MESSAGE_LENGTH)
}

fn first_clean(choices: &[String], options: CleanOptions) -> Option<String> {
    choices.iter().find_map(|c| clean_message(c, options))
}

fn candidates<I>(messages: I, origin: MessageOrigin) -> Vec<CandidateMessage>
where
    I: IntoIterator<Item = String>,
{
    messages
        .into_iter()
        .map(|text| CandidateMessage { text, origin })
        .collect()
}
