/// Media lifecycle: signed transcoder callbacks and the processing state
/// machine they drive.
pub mod events;
pub mod lifecycle;
pub mod signature;

pub use lifecycle::{EventOutcome, MediaLifecycle};
pub use signature::EventAuthenticator;

/// Derived imagery endpoints are a fixed template over the playback id.
pub fn thumbnail_url(image_base_url: &str, playback_id: &str) -> String {
    format!(
        "{}/{}/thumbnail.jpg",
        image_base_url.trim_end_matches('/'),
        playback_id
    )
}

pub fn preview_url(image_base_url: &str, playback_id: &str) -> String {
    format!(
        "{}/{}/animated.gif",
        image_base_url.trim_end_matches('/'),
        playback_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_urls_are_templated_from_playback_id() {
        assert_eq!(
            thumbnail_url("https://img.example.com/", "pb-123"),
            "https://img.example.com/pb-123/thumbnail.jpg"
        );
        assert_eq!(
            preview_url("https://img.example.com", "pb-123"),
            "https://img.example.com/pb-123/animated.gif"
        );
    }
}
