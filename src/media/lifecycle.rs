/// Processing state machine driven by transcoder callbacks
///
/// Events arrive at least once and possibly out of order. Every transition
/// is a single conditional write keyed by the external upload reference
/// (asset reference for track events): a row that no longer matches makes
/// the event a successful no-op, and re-applying an event is a pure
/// overwrite. A late `Created` cannot regress a video that already moved
/// past it; `Ready` and `Errored` stay last-write-wins.
use crate::{
    catalog::videos::ProcessingState,
    error::{ApiError, ApiResult},
    media::{
        events::{
            self, AssetCreated, AssetDeleted, AssetErrored, AssetReady, LifecycleEvent,
            TrackUpdate,
        },
        signature::EventAuthenticator,
    },
    metrics,
};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

/// What applying an event did to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// A video row was updated or removed
    Applied,
    /// No row matched the correlating reference; acknowledged as a no-op
    NoMatch,
    /// Event type the platform does not consume
    Ignored,
}

impl EventOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventOutcome::Applied => "applied",
            EventOutcome::NoMatch => "no_match",
            EventOutcome::Ignored => "ignored",
        }
    }
}

pub struct MediaLifecycle {
    db: SqlitePool,
    authenticator: EventAuthenticator,
    image_base_url: String,
}

impl MediaLifecycle {
    pub fn new(db: SqlitePool, authenticator: EventAuthenticator, image_base_url: String) -> Self {
        Self {
            db,
            authenticator,
            image_base_url,
        }
    }

    /// Full callback path: authenticate, parse, apply.
    ///
    /// The signature check runs against the raw body before anything else;
    /// a rejected event is logged and surfaced as a 401-class error without
    /// touching state. Redelivery is the sender's job, never ours.
    pub async fn handle(
        &self,
        raw_body: &[u8],
        signature_header: Option<&str>,
    ) -> ApiResult<EventOutcome> {
        let Some(header) = signature_header else {
            warn!("lifecycle event rejected: missing signature header");
            metrics::record_lifecycle_event("unknown", "rejected");
            return Err(ApiError::Authentication(
                "Missing signature header".to_string(),
            ));
        };

        if let Err(e) = self.authenticator.verify(raw_body, header) {
            warn!(error = %e, "lifecycle event rejected: signature verification failed");
            metrics::record_lifecycle_event("unknown", "rejected");
            return Err(e);
        }

        let event = match events::parse(raw_body) {
            Ok(Some(event)) => event,
            Ok(None) => {
                debug!("acknowledged lifecycle event type the platform does not consume");
                metrics::record_lifecycle_event("other", EventOutcome::Ignored.as_str());
                return Ok(EventOutcome::Ignored);
            }
            Err(e) => {
                warn!(error = %e, "lifecycle event rejected: malformed payload");
                metrics::record_lifecycle_event("unknown", "invalid");
                return Err(e);
            }
        };

        let kind = event.kind();
        let outcome = self.apply(event).await?;
        metrics::record_lifecycle_event(kind, outcome.as_str());
        Ok(outcome)
    }

    /// Apply an already-authenticated event.
    pub async fn apply(&self, event: LifecycleEvent) -> ApiResult<EventOutcome> {
        match event {
            LifecycleEvent::Created(payload) => self.apply_created(payload).await,
            LifecycleEvent::Ready(payload) => self.apply_ready(payload).await,
            LifecycleEvent::Errored(payload) => self.apply_errored(payload).await,
            LifecycleEvent::Deleted(payload) => self.apply_deleted(payload).await,
            LifecycleEvent::TrackReady(payload) => {
                self.apply_track(payload, ProcessingState::Ready.as_str()).await
            }
            LifecycleEvent::TrackErrored(payload) => {
                self.apply_track(payload, ProcessingState::Errored.as_str()).await
            }
        }
    }

    /// Waiting|Created -> Created, recording the asset reference.
    /// The status guard keeps a stale redelivery from clobbering a video
    /// that already reached Ready or Errored.
    async fn apply_created(&self, payload: AssetCreated) -> ApiResult<EventOutcome> {
        let result = sqlx::query(
            "UPDATE videos SET asset_ref = ?, status = ? \
             WHERE upload_ref = ? AND status IN (?, ?)",
        )
        .bind(&payload.asset_ref)
        .bind(ProcessingState::Created.as_str())
        .bind(&payload.upload_ref)
        .bind(ProcessingState::Waiting.as_str())
        .bind(ProcessingState::Created.as_str())
        .execute(&self.db)
        .await?;

        let outcome = outcome_of(result.rows_affected());
        match outcome {
            EventOutcome::Applied => info!(
                upload_ref = %payload.upload_ref,
                asset_ref = %payload.asset_ref,
                "video asset created"
            ),
            _ => debug!(upload_ref = %payload.upload_ref, "created event matched no updatable video"),
        }
        Ok(outcome)
    }

    /// -> Ready, deriving the playable fields from the payload.
    async fn apply_ready(&self, payload: AssetReady) -> ApiResult<EventOutcome> {
        // reject before mutating: a ready asset without a playback id is nonsense
        let playback_id = payload
            .playback_ids
            .first()
            .map(|p| p.id.as_str())
            .ok_or_else(|| {
                ApiError::Validation("Ready event carries no playback id".to_string())
            })?;

        let duration_ms = payload
            .duration
            .map(|secs| (secs * 1000.0).round() as i64)
            .unwrap_or(0);
        let thumbnail_url = super::thumbnail_url(&self.image_base_url, playback_id);
        let preview_url = super::preview_url(&self.image_base_url, playback_id);

        let result = sqlx::query(
            "UPDATE videos SET status = ?, playback_id = ?, thumbnail_url = ?, \
             preview_url = ?, duration_ms = ? WHERE upload_ref = ?",
        )
        .bind(ProcessingState::Ready.as_str())
        .bind(playback_id)
        .bind(&thumbnail_url)
        .bind(&preview_url)
        .bind(duration_ms)
        .bind(&payload.upload_ref)
        .execute(&self.db)
        .await?;

        let outcome = outcome_of(result.rows_affected());
        match outcome {
            EventOutcome::Applied => info!(
                upload_ref = %payload.upload_ref,
                playback_id = %playback_id,
                duration_ms,
                "video ready for playback"
            ),
            _ => debug!(upload_ref = %payload.upload_ref, "ready event matched no video"),
        }
        Ok(outcome)
    }

    /// -> Errored. Status only; derived fields are left as they were.
    async fn apply_errored(&self, payload: AssetErrored) -> ApiResult<EventOutcome> {
        let result = sqlx::query("UPDATE videos SET status = ? WHERE upload_ref = ?")
            .bind(ProcessingState::Errored.as_str())
            .bind(&payload.upload_ref)
            .execute(&self.db)
            .await?;

        let outcome = outcome_of(result.rows_affected());
        match outcome {
            EventOutcome::Applied => info!(
                upload_ref = %payload.upload_ref,
                pipeline_status = %payload.status,
                "video processing errored"
            ),
            _ => debug!(upload_ref = %payload.upload_ref, "errored event matched no video"),
        }
        Ok(outcome)
    }

    /// -> Deleted. The row is removed outright; no further events will
    /// reference this upload.
    async fn apply_deleted(&self, payload: AssetDeleted) -> ApiResult<EventOutcome> {
        let result = sqlx::query("DELETE FROM videos WHERE upload_ref = ?")
            .bind(&payload.upload_ref)
            .execute(&self.db)
            .await?;

        let outcome = outcome_of(result.rows_affected());
        match outcome {
            EventOutcome::Applied => {
                info!(upload_ref = %payload.upload_ref, "video removed by pipeline deletion")
            }
            _ => debug!(upload_ref = %payload.upload_ref, "deleted event matched no video"),
        }
        Ok(outcome)
    }

    /// Subtitle track updates are keyed by asset reference and orthogonal
    /// to the processing status.
    async fn apply_track(&self, payload: TrackUpdate, track_status: &str) -> ApiResult<EventOutcome> {
        let result = sqlx::query(
            "UPDATE videos SET track_ref = ?, track_status = ? WHERE asset_ref = ?",
        )
        .bind(&payload.track_ref)
        .bind(track_status)
        .bind(&payload.asset_ref)
        .execute(&self.db)
        .await?;

        let outcome = outcome_of(result.rows_affected());
        match outcome {
            EventOutcome::Applied => info!(
                asset_ref = %payload.asset_ref,
                track_ref = %payload.track_ref,
                track_status,
                "subtitle track updated"
            ),
            _ => debug!(asset_ref = %payload.asset_ref, "track event matched no video"),
        }
        Ok(outcome)
    }
}

fn outcome_of(rows_affected: u64) -> EventOutcome {
    if rows_affected > 0 {
        EventOutcome::Applied
    } else {
        EventOutcome::NoMatch
    }
}
