/// Keyset pagination for list endpoints
///
/// Every listing in the platform pages the same way: rows are ordered
/// descending by a composite sort key whose trailing field is a unique id,
/// the caller passes an opaque cursor naming the last row it saw, and the
/// store is asked for `limit + 1` rows past that anchor. The extra row only
/// signals that another page exists; it is never returned.
///
/// Cursors are value-anchored, so a page walk never skips or repeats items
/// when rows are inserted or deleted concurrently, and a cursor pointing at
/// a since-deleted row stays valid.
use crate::error::{ApiError, ApiResult};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::future::Future;

/// Page size when the request does not name one
pub const DEFAULT_PAGE_LIMIT: i64 = 20;
/// Hard ceiling on requested page size
pub const MAX_PAGE_LIMIT: i64 = 100;

/// A composite sort key that can anchor a cursor.
///
/// `TAG` names the sort order a token was minted under; a token is rejected
/// when presented to a listing that sorts differently. The trailing field of
/// every key is a unique id, so the induced order is total.
pub trait SortKey: Serialize + DeserializeOwned {
    const TAG: &'static str;
}

/// `(updated_at, id)` — recency feeds, studio listings, comments, playlists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecencyKey {
    pub updated_at: i64,
    pub id: String,
}

impl SortKey for RecencyKey {
    const TAG: &'static str = "recency";
}

/// `(view_count, id)` — the trending feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewCountKey {
    pub view_count: i64,
    pub id: String,
}

impl SortKey for ViewCountKey {
    const TAG: &'static str = "view-count";
}

/// `(liked_at, id)` — the liked-videos feed; liked_at is the reaction row's
/// updated_at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikedAtKey {
    pub liked_at: i64,
    pub id: String,
}

impl SortKey for LikedAtKey {
    const TAG: &'static str = "liked-at";
}

/// `(viewed_at, id)` — the watch-history feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewedAtKey {
    pub viewed_at: i64,
    pub id: String,
}

impl SortKey for ViewedAtKey {
    const TAG: &'static str = "viewed-at";
}

/// `(updated_at, creator_id)` — the subscription listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatorKey {
    pub updated_at: i64,
    pub creator_id: String,
}

impl SortKey for CreatorKey {
    const TAG: &'static str = "subscription";
}

/// One page of results plus the token for the next one.
/// `next_cursor` is non-null iff more matching rows exist past the last item.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct TokenEnvelope<K> {
    k: String,
    c: K,
}

/// Encode a sort key as an opaque transport-safe token
pub fn encode_cursor<K: SortKey>(key: &K) -> ApiResult<String> {
    let envelope = TokenEnvelope {
        k: K::TAG.to_string(),
        c: key,
    };
    let bytes = serde_json::to_vec(&envelope)
        .map_err(|e| ApiError::Internal(format!("Failed to encode cursor: {}", e)))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Decode a cursor token back into its sort key.
///
/// Any failure is a ValidationError: silently restarting from the top of the
/// collection would break the walk-completeness guarantee.
pub fn decode_cursor<K: SortKey>(token: &str) -> ApiResult<K> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|_| ApiError::Validation("Malformed cursor".to_string()))?;
    let envelope: TokenEnvelope<K> = serde_json::from_slice(&bytes)
        .map_err(|_| ApiError::Validation("Malformed cursor".to_string()))?;
    if envelope.k != K::TAG {
        return Err(ApiError::Validation(
            "Cursor does not belong to this listing".to_string(),
        ));
    }
    Ok(envelope.c)
}

/// Validate a requested page size down to the usable bounds.
/// Absent means the default; out-of-range values are rejected outright.
pub fn validate_limit(requested: Option<i64>) -> ApiResult<i64> {
    match requested {
        None => Ok(DEFAULT_PAGE_LIMIT),
        Some(n) if n < 1 => Err(ApiError::Validation(
            "Limit must be at least 1".to_string(),
        )),
        Some(n) if n > MAX_PAGE_LIMIT => Err(ApiError::Validation(format!(
            "Limit must not exceed {}",
            MAX_PAGE_LIMIT
        ))),
        Some(n) => Ok(n),
    }
}

/// Assemble a page from a `limit + 1` fetch.
///
/// The overfetched row is dropped; the next cursor is minted from the last
/// retained row's sort key, and only when the extra row proved there is more.
pub fn build_page<T, K: SortKey>(
    mut rows: Vec<T>,
    limit: i64,
    key_of: impl Fn(&T) -> K,
) -> ApiResult<Page<T>> {
    let has_more = rows.len() as i64 > limit;
    if has_more {
        rows.truncate(limit as usize);
    }
    let next_cursor = match (has_more, rows.last()) {
        (true, Some(last)) => Some(encode_cursor(&key_of(last))?),
        _ => None,
    };
    Ok(Page {
        items: rows,
        next_cursor,
    })
}

/// Run one paged fetch: validate the limit, decode the cursor, ask the store
/// for `limit + 1` rows past it, and assemble the page.
///
/// `fetch` receives the decoded anchor (if any) and the row count to request;
/// it owns the SQL, including the tie-broken predicate
/// `a < ?1 OR (a = ?1 AND b < ?2)` that strictly excludes the anchor row.
pub async fn fetch_page<T, K, F, Fut>(
    cursor: Option<&str>,
    limit: Option<i64>,
    fetch: F,
    key_of: impl Fn(&T) -> K,
) -> ApiResult<Page<T>>
where
    K: SortKey,
    F: FnOnce(Option<K>, i64) -> Fut,
    Fut: Future<Output = ApiResult<Vec<T>>>,
{
    let limit = validate_limit(limit)?;
    let anchor = match cursor {
        Some(token) => Some(decode_cursor::<K>(token)?),
        None => None,
    };
    let rows = fetch(anchor, limit + 1).await?;
    build_page(rows, limit, key_of)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_when_absent() {
        assert_eq!(validate_limit(None).unwrap(), DEFAULT_PAGE_LIMIT);
    }

    #[test]
    fn limit_rejects_zero_and_negative() {
        assert!(validate_limit(Some(0)).is_err());
        assert!(validate_limit(Some(-5)).is_err());
    }

    #[test]
    fn limit_rejects_above_ceiling() {
        assert!(validate_limit(Some(MAX_PAGE_LIMIT + 1)).is_err());
        assert_eq!(validate_limit(Some(MAX_PAGE_LIMIT)).unwrap(), MAX_PAGE_LIMIT);
    }

    #[test]
    fn cursor_round_trips_exactly() {
        let key = RecencyKey {
            updated_at: 1_723_798_800_123,
            id: "b54f5a9e-9df1-4d4f-8f6e-0c1d2e3f4a5b".to_string(),
        };
        let token = encode_cursor(&key).unwrap();
        let decoded: RecencyKey = decode_cursor(&token).unwrap();
        assert_eq!(decoded, key);
    }

    #[test]
    fn garbage_token_is_a_validation_error() {
        let err = decode_cursor::<RecencyKey>("not//valid//base64!").unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        // valid base64, invalid payload
        let token = URL_SAFE_NO_PAD.encode(b"plain text");
        let err = decode_cursor::<RecencyKey>(&token).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn cursor_from_another_sort_order_is_rejected() {
        let key = ViewCountKey {
            view_count: 42,
            id: "b54f5a9e-9df1-4d4f-8f6e-0c1d2e3f4a5b".to_string(),
        };
        let token = encode_cursor(&key).unwrap();
        let err = decode_cursor::<RecencyKey>(&token).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn empty_collection_yields_empty_page() {
        let page = build_page(Vec::<(i64, String)>::new(), 10, |(u, id)| RecencyKey {
            updated_at: *u,
            id: id.clone(),
        })
        .unwrap();
        assert!(page.items.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn exact_fit_has_no_next_cursor() {
        let rows: Vec<(i64, String)> = (0..3).map(|i| (100 - i, format!("id-{}", i))).collect();
        let page = build_page(rows, 3, |(u, id)| RecencyKey {
            updated_at: *u,
            id: id.clone(),
        })
        .unwrap();
        assert_eq!(page.items.len(), 3);
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn overfetch_truncates_and_mints_cursor_from_last_retained() {
        let rows: Vec<(i64, String)> = (0..4).map(|i| (100 - i, format!("id-{}", i))).collect();
        let page = build_page(rows, 3, |(u, id)| RecencyKey {
            updated_at: *u,
            id: id.clone(),
        })
        .unwrap();
        assert_eq!(page.items.len(), 3);
        let key: RecencyKey = decode_cursor(&page.next_cursor.unwrap()).unwrap();
        assert_eq!(key.updated_at, 98);
        assert_eq!(key.id, "id-2");
    }

    // In-memory stand-in for a keyset query: descending (updated_at, id)
    // order with the strict tie-broken anchor predicate.
    fn fetch_after(
        rows: &[(i64, String)],
        anchor: Option<&RecencyKey>,
        count: i64,
    ) -> Vec<(i64, String)> {
        let mut matching: Vec<(i64, String)> = rows
            .iter()
            .filter(|(u, id)| match anchor {
                None => true,
                Some(c) => *u < c.updated_at || (*u == c.updated_at && *id < c.id),
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.cmp(a));
        matching.truncate(count as usize);
        matching
    }

    async fn walk(rows: &[(i64, String)], limit: i64) -> Vec<(i64, String)> {
        let mut seen = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = fetch_page(
                cursor.as_deref(),
                Some(limit),
                |anchor, count| async move { Ok(fetch_after(rows, anchor.as_ref(), count)) },
                |(u, id): &(i64, String)| RecencyKey {
                    updated_at: *u,
                    id: id.clone(),
                },
            )
            .await
            .unwrap();
            seen.extend(page.items);
            match page.next_cursor {
                Some(token) => cursor = Some(token),
                None => return seen,
            }
        }
    }

    #[tokio::test]
    async fn walk_visits_every_item_exactly_once() {
        // ties on updated_at force the id tie-break to carry the walk
        let rows: Vec<(i64, String)> = vec![
            (300, "f0".into()),
            (200, "a1".into()),
            (200, "a2".into()),
            (200, "a3".into()),
            (200, "a4".into()),
            (100, "b1".into()),
            (100, "b2".into()),
        ];

        let mut expected = rows.clone();
        expected.sort_by(|a, b| b.cmp(a));

        for limit in [1, 2, 50] {
            let seen = walk(&rows, limit).await;
            assert_eq!(seen, expected, "limit {}", limit);
        }
    }

    #[tokio::test]
    async fn tied_rows_are_ordered_by_trailing_id() {
        let rows: Vec<(i64, String)> = (0..4).map(|i| (7, format!("c{}", i))).collect();
        let seen = walk(&rows, 2).await;
        let ids: Vec<&str> = seen.iter().map(|(_, id)| id.as_str()).collect();
        assert_eq!(ids, ["c3", "c2", "c1", "c0"]);
    }

    #[tokio::test]
    async fn insertion_behind_the_cursor_does_not_disturb_the_walk() {
        let mut rows: Vec<(i64, String)> = vec![
            (400, "d4".into()),
            (300, "d3".into()),
            (200, "d2".into()),
            (100, "d1".into()),
        ];

        let page1 = fetch_page(
            None,
            Some(2),
            |anchor, count| {
                let rows = &rows;
                async move { Ok(fetch_after(rows, anchor.as_ref(), count)) }
            },
            |(u, id): &(i64, String)| RecencyKey {
                updated_at: *u,
                id: id.clone(),
            },
        )
        .await
        .unwrap();
        assert_eq!(page1.items[0].1, "d4");
        assert_eq!(page1.items[1].1, "d3");

        // new row sorts ahead of the cursor position; the in-flight walk
        // must neither duplicate already-seen rows nor skip remaining ones
        rows.push((500, "d5".into()));

        let page2 = fetch_page(
            page1.next_cursor.as_deref(),
            Some(2),
            |anchor, count| {
                let rows = &rows;
                async move { Ok(fetch_after(rows, anchor.as_ref(), count)) }
            },
            |(u, id): &(i64, String)| RecencyKey {
                updated_at: *u,
                id: id.clone(),
            },
        )
        .await
        .unwrap();
        let ids: Vec<&str> = page2.items.iter().map(|(_, id)| id.as_str()).collect();
        assert_eq!(ids, ["d2", "d1"]);
        assert!(page2.next_cursor.is_none());
    }

    #[tokio::test]
    async fn cursor_for_a_deleted_row_still_anchors() {
        let mut rows: Vec<(i64, String)> = vec![
            (300, "e3".into()),
            (200, "e2".into()),
            (100, "e1".into()),
        ];

        let page1 = fetch_page(
            None,
            Some(2),
            |anchor, count| {
                let rows = &rows;
                async move { Ok(fetch_after(rows, anchor.as_ref(), count)) }
            },
            |(u, id): &(i64, String)| RecencyKey {
                updated_at: *u,
                id: id.clone(),
            },
        )
        .await
        .unwrap();

        // drop the row the cursor points at; its values keep anchoring
        rows.retain(|(_, id)| id != "e2");

        let page2 = fetch_page(
            page1.next_cursor.as_deref(),
            Some(2),
            |anchor, count| {
                let rows = &rows;
                async move { Ok(fetch_after(rows, anchor.as_ref(), count)) }
            },
            |(u, id): &(i64, String)| RecencyKey {
                updated_at: *u,
                id: id.clone(),
            },
        )
        .await
        .unwrap();
        let ids: Vec<&str> = page2.items.iter().map(|(_, id)| id.as_str()).collect();
        assert_eq!(ids, ["e1"]);
        assert!(page2.next_cursor.is_none());
    }

    #[tokio::test]
    async fn bad_limit_never_reaches_the_store() {
        let result = fetch_page(
            None,
            Some(0),
            |_anchor: Option<RecencyKey>, _count| async move {
                if true {
                    panic!("store must not be called for a rejected limit");
                }
                Ok(Vec::<(i64, String)>::new())
            },
            |(u, id): &(i64, String)| RecencyKey {
                updated_at: *u,
                id: id.clone(),
            },
        )
        .await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }
}
