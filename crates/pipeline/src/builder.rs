//! Job Spec Builder: raw selections in, a fully-resolved batch plan out.
//!
//! All fallible work (precondition checks, validation, and media
//! resolution) happens here, before any job is submitted. A failure
//! returns no partial plan and leaves no persisted state behind.

use futures::future::try_join_all;
use hookreel_core::hooks::{is_blank_hook_text, parse_hook_lines, HookLine};
use hookreel_core::job::{
    DurationRange, JobSpec, MediaPart, SongPart, StyleConfig, TemplatePart,
};
use hookreel_core::media::MediaReference;
use hookreel_core::selections::BatchSelections;
use validator::Validate;

use crate::resolve::{MediaResolver, ResolveError};

/// Why a batch could not be built.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A required selection is missing. Nothing has run.
    #[error("{0}")]
    Precondition(String),

    /// A selection is present but malformed.
    #[error("Invalid selections: {0}")]
    Invalid(String),

    /// One of the selected payloads could not be made inline.
    #[error("Failed to resolve {part}: {source}")]
    Resolve {
        part: String,
        #[source]
        source: ResolveError,
    },
}

/// Everything the dispatch loop needs, with every payload inline.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    hooks: Vec<HookLine>,
    style: StyleConfig,
    template: TemplatePart,
    media: Vec<MediaReference>,
    media_duration: DurationRange,
    song: SongPart,
}

impl BatchPlan {
    /// Number of jobs: one per hook line, independent of media count.
    pub fn total(&self) -> u32 {
        self.hooks.len() as u32
    }

    pub fn media_count(&self) -> u32 {
        self.media.len() as u32
    }

    pub fn hooks(&self) -> &[HookLine] {
        &self.hooks
    }

    /// The spec for hook `hook_index` paired with media `media_index`
    /// (taken modulo the pool size).
    pub fn job(&self, hook_index: u32, media_index: u32) -> Option<JobSpec> {
        let hook = self.hooks.get(hook_index as usize)?;
        let media = self.media.get(media_index as usize % self.media.len().max(1))?;

        Some(JobSpec {
            hook_text: hook.as_str().to_string(),
            style: self.style,
            template: self.template.clone(),
            media: MediaPart {
                payload: media.clone(),
                duration_range: self.media_duration,
            },
            song: self.song.clone(),
        })
    }

    /// Specs in fresh-run order: job `i` pairs hook `i` with media
    /// `i mod len(media)`.
    pub fn job_specs(&self) -> Vec<JobSpec> {
        (0..self.total())
            .filter_map(|i| self.job(i, i % self.media_count().max(1)))
            .collect()
    }
}

fn precondition(selections: &BatchSelections) -> Result<(), BuildError> {
    if selections.template.is_none() {
        return Err(BuildError::Precondition("Please select a template".into()));
    }
    if selections.media.is_empty() {
        return Err(BuildError::Precondition("Please select at least one media item".into()));
    }
    if selections.song.is_none() {
        return Err(BuildError::Precondition("Please select a song".into()));
    }
    if is_blank_hook_text(&selections.hooks) {
        return Err(BuildError::Precondition("Please enter at least one hook".into()));
    }
    Ok(())
}

async fn resolve_part(
    resolver: &MediaResolver,
    part: String,
    media: &MediaReference,
) -> Result<MediaReference, BuildError> {
    resolver
        .resolve(media)
        .await
        .map_err(|source| BuildError::Resolve { part, source })
}

/// Validate `selections`, parse the hooks, and resolve every payload up
/// front.
pub async fn build_batch(
    selections: &BatchSelections,
    resolver: &MediaResolver,
) -> Result<BatchPlan, BuildError> {
    precondition(selections)?;

    selections
        .validate()
        .map_err(|e| BuildError::Invalid(e.to_string()))?;

    let hooks = parse_hook_lines(&selections.hooks);
    if hooks.is_empty() {
        return Err(BuildError::Precondition("Please enter at least one hook".into()));
    }

    let (Some(template), Some(song)) = (&selections.template, &selections.song) else {
        return Err(BuildError::Precondition("Please select a template and a song".into()));
    };

    template
        .validate()
        .map_err(|e| BuildError::Invalid(format!("template: {e}")))?;
    for (i, media) in selections.media.iter().enumerate() {
        media
            .validate()
            .map_err(|e| BuildError::Invalid(format!("media[{i}]: {e}")))?;
    }

    let template = resolve_part(resolver, "template".into(), template).await?;
    let media = try_join_all(
        selections
            .media
            .iter()
            .enumerate()
            .map(|(i, media)| resolve_part(resolver, format!("media[{i}]"), media)),
    )
    .await?;
    let song_payload = resolve_part(resolver, "song".into(), &song.payload).await?;

    tracing::info!(
        total = hooks.len(),
        media = media.len(),
        "Batch built",
    );

    Ok(BatchPlan {
        hooks,
        style: selections.style,
        template: TemplatePart {
            payload: template,
            position: selections.template_position,
            duration_range: selections.template_duration,
        },
        media,
        media_duration: selections.media_duration,
        song: SongPart {
            id: song.id.clone(),
            payload: song_payload,
        },
    })
}
