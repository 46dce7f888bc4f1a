//! Depth-first collection walker.

use tracing::{debug, info, warn};

use crate::checkpoint::{CheckpointManager, CollectionCheckpoint};
use crate::pacing::{OperationClass, RateGovernor};
use crate::paginator::{Cursor, PageLimit, PageStep, Paginator};
use crate::provider::youtube::DETAIL_BATCH_SIZE;
use crate::provider::{ApiMethod, DataProvider, ProviderError};
use crate::quota::QuotaLedger;
use crate::retry::with_retry;
use crate::shutdown::{SharedShutdown, ShutdownCoordinator};
use crate::sources::{extract_channel_ref, Source};
use crate::stats::{FailureTracker, RunRecord, RunStats, RunStatus};
use crate::store::{Store, StoreError};
use crate::VideoRef;

use super::{CollectorConfig, CollectorError};

/// Why a run halted before processing every source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HaltReason {
    QuotaExhausted,
    Shutdown,
}

#[derive(Debug)]
struct Halt {
    reason: HaltReason,
    video_cursor: Option<Cursor>,
    videos_completed: u64,
}

#[derive(Debug)]
enum SourceStep {
    Collected,
    Failed,
    Halted(Halt),
}

#[derive(Debug)]
enum BatchOutcome {
    Done(u64),
    Halted(HaltReason),
}

/// Walks sources depth-first against a provider and a store.
///
/// The walker owns the run's mutable state: the quota ledger, the rate
/// governor, the accumulated statistics and the resume position. Halts
/// (quota, shutdown) end the run at a page boundary; because the store is
/// idempotent, the checkpoint rewinds to the start of the interrupted
/// page and the replay on resume is harmless.
pub struct EntityWalker<'a> {
    provider: &'a dyn DataProvider,
    store: &'a dyn Store,
    config: CollectorConfig,
    governor: RateGovernor,
    ledger: QuotaLedger,
    stats: RunStats,
    tracker: FailureTracker,
    checkpoints: Option<CheckpointManager>,
    shutdown: Option<SharedShutdown>,
    start_index: usize,
    resume_cursor: Option<Cursor>,
    resume_videos_completed: u64,
}

impl<'a> EntityWalker<'a> {
    /// Create a walker over `provider` and `store` with `config`
    pub fn new(provider: &'a dyn DataProvider, store: &'a dyn Store, config: CollectorConfig) -> Self {
        let governor = config.governor();
        let ledger = config.ledger();
        let tracker = FailureTracker::new(config.failure_threshold);
        Self {
            provider,
            store,
            config,
            governor,
            ledger,
            stats: RunStats::default(),
            tracker,
            checkpoints: None,
            shutdown: None,
            start_index: 0,
            resume_cursor: None,
            resume_videos_completed: 0,
        }
    }

    /// Enable periodic and halt-time checkpointing through `manager`
    pub fn with_checkpoints(mut self, manager: CheckpointManager) -> Self {
        self.checkpoints = Some(manager);
        self
    }

    /// Observe `shutdown` so the run can stop at safe boundaries
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Resume from a previously saved checkpoint.
    ///
    /// Restores position and statistics; `restore_quota` additionally
    /// restores the consumed quota units, which is correct when resuming
    /// within the same quota day and should be false after the daily reset.
    pub fn resume_from(mut self, checkpoint: CollectionCheckpoint, restore_quota: bool) -> Self {
        info!(
            source_index = checkpoint.source_index,
            videos_completed = checkpoint.videos_completed,
            restore_quota,
            "Resuming from checkpoint"
        );
        self.start_index = checkpoint.source_index;
        self.resume_cursor = checkpoint.video_cursor;
        self.resume_videos_completed = checkpoint.videos_completed;
        self.stats = checkpoint.stats;
        if restore_quota {
            self.ledger.set_consumed(checkpoint.quota_consumed);
        }
        self
    }

    /// Statistics accumulated so far
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Quota units consumed so far
    pub fn quota_consumed(&self) -> u64 {
        self.ledger.consumed()
    }

    fn halt_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|s| s.halt_requested())
            .unwrap_or(false)
    }

    fn save_checkpoint(
        &mut self,
        source_index: usize,
        video_cursor: Option<Cursor>,
        videos_completed: u64,
    ) -> Result<(), CollectorError> {
        self.stats.quota_used = self.ledger.consumed();
        if let Some(manager) = &self.checkpoints {
            let checkpoint = if video_cursor.is_some() || videos_completed > 0 {
                CollectionCheckpoint::mid_source(
                    source_index,
                    video_cursor,
                    videos_completed,
                    self.stats.clone(),
                    self.ledger.consumed(),
                )
            } else {
                CollectionCheckpoint::at_source(
                    source_index,
                    self.stats.clone(),
                    self.ledger.consumed(),
                )
            };
            manager.save(&checkpoint)?;
        }
        Ok(())
    }

    /// Process `sources` until done, quota runs out, the circuit breaker
    /// trips or shutdown is requested. Returns the finished run record,
    /// which is also persisted to the store.
    pub async fn run(&mut self, sources: &[Source]) -> Result<RunRecord, CollectorError> {
        let mut record = RunRecord::started_now();
        let run_id = self.store.begin_run(&record)?;
        info!(
            total_sources = sources.len(),
            start_index = self.start_index,
            quota_remaining = self.ledger.remaining(),
            "Starting collection run"
        );

        let mut halt_status: Option<RunStatus> = None;
        let mut capped = false;
        let mut processed = 0usize;
        let mut index = self.start_index;

        while index < sources.len() {
            if let Some(max) = self.config.max_channels {
                if processed >= max {
                    debug!(max_channels = max, "Source cap reached");
                    // Capped runs keep their checkpoint so the next run
                    // picks up where this one stopped
                    self.save_checkpoint(index, None, 0)?;
                    capped = true;
                    break;
                }
            }
            if self.halt_requested() {
                warn!(source_index = index, "Shutdown requested, stopping before next source");
                self.save_checkpoint(index, None, 0)?;
                halt_status = Some(RunStatus::Interrupted);
                break;
            }

            match self.collect_source(&sources[index]).await? {
                SourceStep::Collected => {
                    self.stats.record_source_success();
                }
                SourceStep::Failed => {
                    self.stats.record_source_failure();
                    if self.tracker.is_tripped(&self.stats) {
                        warn!(
                            consecutive_failures = self.stats.consecutive_failures,
                            "Circuit breaker tripped, stopping run"
                        );
                        self.save_checkpoint(index + 1, None, 0)?;
                        halt_status = Some(RunStatus::CircuitBreakerTripped);
                        break;
                    }
                }
                SourceStep::Halted(halt) => {
                    let status = match halt.reason {
                        HaltReason::QuotaExhausted => RunStatus::QuotaExhausted,
                        HaltReason::Shutdown => RunStatus::Interrupted,
                    };
                    info!(
                        source_index = index,
                        reason = status.as_str(),
                        "Run halted mid-source"
                    );
                    self.save_checkpoint(index, halt.video_cursor, halt.videos_completed)?;
                    halt_status = Some(status);
                    break;
                }
            }

            processed += 1;
            index += 1;
            if self.config.checkpoint_every > 0 && processed % self.config.checkpoint_every == 0 {
                self.save_checkpoint(index, None, 0)?;
            }
            self.stats.log_progress();
        }

        let status = halt_status.unwrap_or(RunStatus::Completed);
        if status == RunStatus::Completed && !capped {
            if let Some(manager) = &self.checkpoints {
                manager.clear()?;
            }
        }
        self.stats.quota_used = self.ledger.consumed();
        record.finish(status, self.stats.clone());
        self.store.finish_run(run_id, &record)?;
        info!(
            status = status.as_str(),
            channels = self.stats.channels_processed,
            videos = self.stats.videos_collected,
            comments = self.stats.comments_collected,
            quota_used = self.stats.quota_used,
            "Collection run finished"
        );
        Ok(record)
    }

    async fn collect_source(&mut self, source: &Source) -> Result<SourceStep, CollectorError> {
        // Resume state applies only to the first source processed this run
        let resume_cursor = self.resume_cursor.take();
        let resume_completed = std::mem::take(&mut self.resume_videos_completed);

        let reference = match extract_channel_ref(&source.url) {
            Ok(reference) => reference,
            Err(e) => {
                warn!(url = %source.url, error = %e, "Skipping unrecognized source URL");
                return Ok(SourceStep::Failed);
            }
        };

        self.governor.wait_for(OperationClass::ChannelResolution).await;
        if self.ledger.reserve(ApiMethod::ChannelsList.quota_cost()).is_err() {
            return Ok(SourceStep::Halted(Halt {
                reason: HaltReason::QuotaExhausted,
                video_cursor: resume_cursor,
                videos_completed: resume_completed,
            }));
        }

        let provider = self.provider;
        let retry = self.config.retry;
        let mut channel = match with_retry(retry, "resolve_channel", || {
            provider.resolve_channel(&reference)
        })
        .await
        {
            Ok(channel) => channel,
            Err(ProviderError::QuotaExceeded) => {
                return Ok(SourceStep::Halted(Halt {
                    reason: HaltReason::QuotaExhausted,
                    video_cursor: resume_cursor,
                    videos_completed: resume_completed,
                }));
            }
            Err(e) => {
                warn!(reference = %reference, error = %e, "Failed to resolve channel");
                return Ok(SourceStep::Failed);
            }
        };
        channel.source_url = Some(source.url.clone());
        channel.source_metadata = source.metadata.clone();
        match self.store.upsert_channel(&channel) {
            Ok(()) => {}
            Err(StoreError::InvalidRecord(msg)) => {
                warn!(channel_id = %channel.channel_id, error = %msg, "Resolved channel failed validation");
                return Ok(SourceStep::Failed);
            }
            Err(e) => return Err(e.into()),
        }
        info!(
            channel_id = %channel.channel_id,
            title = %channel.title,
            video_count = channel.video_count,
            "Resolved channel"
        );

        let governor = &self.governor;
        let playlist_id = channel.uploads_playlist_id.clone();
        let fetch = move |cursor: Option<Cursor>| {
            let playlist_id = playlist_id.clone();
            async move {
                governor.wait_for(OperationClass::VideoPage).await;
                with_retry(retry, "list_videos", || {
                    provider.list_videos(&playlist_id, cursor.clone())
                })
                .await
            }
        };
        let limit = PageLimit {
            pages: None,
            items: self
                .config
                .max_videos_per_channel
                .map(|max| max.saturating_sub(resume_completed as usize)),
        };
        let mut paginator = Paginator::resume(fetch, resume_cursor, limit);
        let mut videos_completed = resume_completed;

        loop {
            if self.halt_requested() {
                return Ok(SourceStep::Halted(Halt {
                    reason: HaltReason::Shutdown,
                    video_cursor: paginator.cursor().cloned(),
                    videos_completed,
                }));
            }
            // Remember the page we are about to fetch; a halt while
            // processing its items rewinds here and replays the page
            let page_cursor = paginator.cursor().cloned();
            match paginator
                .next_page(&mut self.ledger, ApiMethod::PlaylistItemsList.quota_cost())
                .await
            {
                Ok(PageStep::Items(refs)) => {
                    let outcome = collect_video_batch(
                        provider,
                        self.store,
                        &self.governor,
                        &self.config,
                        &mut self.ledger,
                        &mut self.stats,
                        &refs,
                        self.shutdown.as_deref(),
                    )
                    .await?;
                    match outcome {
                        BatchOutcome::Done(count) => videos_completed += count,
                        BatchOutcome::Halted(reason) => {
                            return Ok(SourceStep::Halted(Halt {
                                reason,
                                video_cursor: page_cursor,
                                videos_completed,
                            }));
                        }
                    }
                }
                Ok(PageStep::QuotaExhausted) => {
                    return Ok(SourceStep::Halted(Halt {
                        reason: HaltReason::QuotaExhausted,
                        video_cursor: page_cursor,
                        videos_completed,
                    }));
                }
                Ok(PageStep::End) => break,
                Err(ProviderError::QuotaExceeded) => {
                    return Ok(SourceStep::Halted(Halt {
                        reason: HaltReason::QuotaExhausted,
                        video_cursor: page_cursor,
                        videos_completed,
                    }));
                }
                Err(e) => {
                    warn!(channel_id = %channel.channel_id, error = %e, "Video listing failed");
                    return Ok(SourceStep::Failed);
                }
            }
        }

        info!(
            channel_id = %channel.channel_id,
            videos = videos_completed,
            "Source collected"
        );
        Ok(SourceStep::Collected)
    }
}

#[allow(clippy::too_many_arguments)]
async fn collect_video_batch(
    provider: &dyn DataProvider,
    store: &dyn Store,
    governor: &RateGovernor,
    config: &CollectorConfig,
    ledger: &mut QuotaLedger,
    stats: &mut RunStats,
    refs: &[VideoRef],
    shutdown: Option<&ShutdownCoordinator>,
) -> Result<BatchOutcome, CollectorError> {
    let retry = config.retry;
    let mut completed = 0u64;

    for chunk in refs.chunks(DETAIL_BATCH_SIZE) {
        governor.wait_for(OperationClass::VideoDetailBatch).await;
        if ledger.reserve(ApiMethod::VideosList.quota_cost()).is_err() {
            return Ok(BatchOutcome::Halted(HaltReason::QuotaExhausted));
        }
        let ids: Vec<String> = chunk.iter().map(|r| r.video_id.clone()).collect();
        let videos = match with_retry(retry, "fetch_video_details", || {
            provider.fetch_video_details(&ids)
        })
        .await
        {
            Ok(videos) => videos,
            Err(ProviderError::QuotaExceeded) => {
                return Ok(BatchOutcome::Halted(HaltReason::QuotaExhausted));
            }
            Err(e) => {
                warn!(batch = ids.len(), error = %e, "Video detail batch failed, skipping batch");
                continue;
            }
        };

        for video in videos {
            if shutdown.map(|s| s.halt_requested()).unwrap_or(false) {
                return Ok(BatchOutcome::Halted(HaltReason::Shutdown));
            }
            match store.upsert_video(&video) {
                Ok(()) => {}
                Err(StoreError::IntegrityViolation { .. }) | Err(StoreError::InvalidRecord(_)) => {
                    stats.integrity_skips += 1;
                    warn!(video_id = %video.video_id, "Skipping video that failed integrity checks");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
            stats.videos_collected += 1;

            if let Some(reason) =
                collect_comments(provider, store, governor, config, ledger, stats, &video.video_id)
                    .await?
            {
                return Ok(BatchOutcome::Halted(reason));
            }
            if !config.skip_captions {
                if let Some(reason) = collect_captions(
                    provider,
                    store,
                    governor,
                    config,
                    ledger,
                    stats,
                    &video.video_id,
                )
                .await?
                {
                    return Ok(BatchOutcome::Halted(reason));
                }
            }
            completed += 1;
        }
    }
    Ok(BatchOutcome::Done(completed))
}

async fn collect_comments(
    provider: &dyn DataProvider,
    store: &dyn Store,
    governor: &RateGovernor,
    config: &CollectorConfig,
    ledger: &mut QuotaLedger,
    stats: &mut RunStats,
    video_id: &str,
) -> Result<Option<HaltReason>, CollectorError> {
    let retry = config.retry;
    let video = video_id.to_string();
    let fetch = move |cursor: Option<Cursor>| {
        let video = video.clone();
        async move {
            governor.wait_for(OperationClass::CommentPage).await;
            with_retry(retry, "list_comment_threads", || {
                provider.list_comment_threads(&video, cursor.clone())
            })
            .await
        }
    };
    let limit = PageLimit {
        pages: None,
        items: config.max_comments_per_video,
    };
    let mut paginator = Paginator::new(fetch, limit);

    loop {
        match paginator
            .next_page(ledger, ApiMethod::CommentThreadsList.quota_cost())
            .await
        {
            Ok(PageStep::Items(threads)) => {
                for thread in threads {
                    // Top-level first so replies never reference a parent
                    // the store has not seen
                    match store.upsert_comment(&thread.top_level) {
                        Ok(()) => stats.comments_collected += 1,
                        Err(StoreError::IntegrityViolation { .. })
                        | Err(StoreError::InvalidRecord(_)) => {
                            stats.integrity_skips += 1;
                            warn!(
                                comment_id = %thread.top_level.comment_id,
                                "Skipping comment thread that failed integrity checks"
                            );
                            continue;
                        }
                        Err(e) => return Err(e.into()),
                    }
                    for reply in &thread.replies {
                        match store.upsert_comment(reply) {
                            Ok(()) => stats.comments_collected += 1,
                            Err(StoreError::IntegrityViolation { .. })
                            | Err(StoreError::InvalidRecord(_)) => {
                                stats.integrity_skips += 1;
                                warn!(comment_id = %reply.comment_id, "Skipping reply that failed integrity checks");
                            }
                            Err(e) => return Err(e.into()),
                        }
                    }
                }
            }
            Ok(PageStep::QuotaExhausted) => return Ok(Some(HaltReason::QuotaExhausted)),
            Ok(PageStep::End) => return Ok(None),
            Err(ProviderError::CommentsDisabled) => {
                stats.comments_disabled_skips += 1;
                debug!(video_id, "Comments disabled, skipping video's comments");
                return Ok(None);
            }
            Err(ProviderError::QuotaExceeded) => return Ok(Some(HaltReason::QuotaExhausted)),
            Err(e) => {
                warn!(video_id, error = %e, "Comment listing failed, continuing without comments");
                return Ok(None);
            }
        }
    }
}

async fn collect_captions(
    provider: &dyn DataProvider,
    store: &dyn Store,
    governor: &RateGovernor,
    config: &CollectorConfig,
    ledger: &mut QuotaLedger,
    stats: &mut RunStats,
    video_id: &str,
) -> Result<Option<HaltReason>, CollectorError> {
    governor.wait_for(OperationClass::CaptionLookup).await;
    if ledger.reserve(ApiMethod::CaptionsList.quota_cost()).is_err() {
        return Ok(Some(HaltReason::QuotaExhausted));
    }
    let retry = config.retry;
    match with_retry(retry, "list_caption_tracks", || {
        provider.list_caption_tracks(video_id)
    })
    .await
    {
        Ok(tracks) => {
            for track in tracks {
                match store.upsert_caption_track(&track) {
                    Ok(()) => stats.caption_tracks_collected += 1,
                    Err(StoreError::IntegrityViolation { .. })
                    | Err(StoreError::InvalidRecord(_)) => {
                        stats.integrity_skips += 1;
                        warn!(caption_id = %track.caption_id, "Skipping caption track that failed integrity checks");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Ok(None)
        }
        Err(ProviderError::QuotaExceeded) => Ok(Some(HaltReason::QuotaExhausted)),
        Err(e) => {
            warn!(video_id, error = %e, "Caption lookup failed, continuing without captions");
            Ok(None)
        }
    }
}
