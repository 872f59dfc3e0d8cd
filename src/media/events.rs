/// Inbound lifecycle event parsing
///
/// Callbacks arrive as `{"type": "...", "data": {...}}`. Types the platform
/// does not consume are acknowledged and dropped so the sender never
/// redelivers them; a recognized type with a bad payload is a validation
/// error and must be rejected before any store write.
use crate::error::{ApiError, ApiResult};
use serde::de::DeserializeOwned;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackRef {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetCreated {
    pub upload_ref: String,
    pub asset_ref: String,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetReady {
    pub upload_ref: String,
    pub asset_ref: String,
    pub status: String,
    #[serde(default)]
    pub playback_ids: Vec<PlaybackRef>,
    /// fractional seconds; absent when the pipeline could not measure
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetErrored {
    pub upload_ref: String,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetDeleted {
    pub upload_ref: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackUpdate {
    pub asset_ref: String,
    pub track_ref: String,
    pub status: String,
}

#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    Created(AssetCreated),
    Ready(AssetReady),
    Errored(AssetErrored),
    Deleted(AssetDeleted),
    TrackReady(TrackUpdate),
    TrackErrored(TrackUpdate),
}

impl LifecycleEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleEvent::Created(_) => "asset.created",
            LifecycleEvent::Ready(_) => "asset.ready",
            LifecycleEvent::Errored(_) => "asset.errored",
            LifecycleEvent::Deleted(_) => "asset.deleted",
            LifecycleEvent::TrackReady(_) => "asset.track.ready",
            LifecycleEvent::TrackErrored(_) => "asset.track.errored",
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Parse a raw callback body. `Ok(None)` means the event type is not one the
/// platform consumes.
pub fn parse(raw: &[u8]) -> ApiResult<Option<LifecycleEvent>> {
    let envelope: Envelope = serde_json::from_slice(raw)
        .map_err(|_| ApiError::Validation("Malformed event body".to_string()))?;

    let event = match envelope.kind.as_str() {
        "asset.created" => LifecycleEvent::Created(payload(envelope.data)?),
        "asset.ready" => LifecycleEvent::Ready(payload(envelope.data)?),
        "asset.errored" => LifecycleEvent::Errored(payload(envelope.data)?),
        "asset.deleted" => LifecycleEvent::Deleted(payload(envelope.data)?),
        "asset.track.ready" => LifecycleEvent::TrackReady(payload(envelope.data)?),
        "asset.track.errored" => LifecycleEvent::TrackErrored(payload(envelope.data)?),
        _ => return Ok(None),
    };

    Ok(Some(event))
}

fn payload<T: DeserializeOwned>(data: serde_json::Value) -> ApiResult<T> {
    serde_json::from_value(data)
        .map_err(|e| ApiError::Validation(format!("Invalid event payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_created_event() {
        let raw = br#"{
            "type": "asset.created",
            "data": {"upload_ref": "up-1", "asset_ref": "as-1", "status": "preparing"}
        }"#;
        match parse(raw).unwrap() {
            Some(LifecycleEvent::Created(p)) => {
                assert_eq!(p.upload_ref, "up-1");
                assert_eq!(p.asset_ref, "as-1");
            }
            other => panic!("unexpected parse result: {:?}", other),
        }
    }

    #[test]
    fn parses_a_ready_event_with_and_without_duration() {
        let raw = br#"{
            "type": "asset.ready",
            "data": {
                "upload_ref": "up-1",
                "asset_ref": "as-1",
                "status": "ready",
                "playback_ids": [{"id": "pb-1"}, {"id": "pb-2"}],
                "duration": 12.345
            }
        }"#;
        match parse(raw).unwrap() {
            Some(LifecycleEvent::Ready(p)) => {
                assert_eq!(p.playback_ids[0].id, "pb-1");
                assert_eq!(p.duration, Some(12.345));
            }
            other => panic!("unexpected parse result: {:?}", other),
        }

        let raw = br#"{
            "type": "asset.ready",
            "data": {"upload_ref": "up-1", "asset_ref": "as-1", "status": "ready", "playback_ids": [{"id": "pb-1"}]}
        }"#;
        match parse(raw).unwrap() {
            Some(LifecycleEvent::Ready(p)) => assert_eq!(p.duration, None),
            other => panic!("unexpected parse result: {:?}", other),
        }
    }

    #[test]
    fn parses_track_events_keyed_by_asset_ref() {
        let raw = br#"{
            "type": "asset.track.errored",
            "data": {"asset_ref": "as-1", "track_ref": "tr-1", "status": "errored"}
        }"#;
        match parse(raw).unwrap() {
            Some(LifecycleEvent::TrackErrored(p)) => assert_eq!(p.track_ref, "tr-1"),
            other => panic!("unexpected parse result: {:?}", other),
        }
    }

    #[test]
    fn missing_correlating_ref_is_a_validation_error() {
        let raw = br#"{"type": "asset.created", "data": {"asset_ref": "as-1", "status": "preparing"}}"#;
        let err = parse(raw).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn unknown_event_types_are_ignored() {
        let raw = br#"{"type": "asset.annotation.added", "data": {"whatever": true}}"#;
        assert!(parse(raw).unwrap().is_none());
    }

    #[test]
    fn non_json_body_is_a_validation_error() {
        assert!(matches!(
            parse(b"not json").unwrap_err(),
            ApiError::Validation(_)
        ));
    }
}
