//! Bucket clock for 15-minute Up/Down market windows
//!
//! Polymarket creates one market per 15-minute wall-clock bucket and keys its
//! slug by the bucket's start timestamp. There is no index endpoint for these
//! markets: discovery works by generating the slugs a bucket range *would*
//! carry and probing each one individually.

/// Length of one market window in seconds.
pub const BUCKET_SIZE_SECS: i64 = 900;

/// Slug prefix shared by all 15-minute BTC Up/Down markets.
pub const SLUG_PREFIX: &str = "btc-updown-15m";

/// Start of the bucket containing `epoch`: the largest multiple of the
/// bucket size that is <= epoch.
pub fn bucket_start(epoch: i64) -> i64 {
    epoch.div_euclid(BUCKET_SIZE_SECS) * BUCKET_SIZE_SECS
}

/// Market slug for the bucket starting at `bucket_start`.
///
/// Byte-stable for equal input; slugs double as idempotency keys.
pub fn window_slug(bucket_start: i64) -> String {
    format!("{SLUG_PREFIX}-{bucket_start}")
}

/// Slugs for the buckets surrounding `epoch`: `back` buckets behind the
/// containing one, the containing one itself, and `forward` ahead, in
/// ascending chronological order.
pub fn candidate_slugs(epoch: i64, back: i64, forward: i64) -> Vec<String> {
    let start = bucket_start(epoch);
    (-back..=forward)
        .map(|k| window_slug(start + k * BUCKET_SIZE_SECS))
        .collect()
}

/// Recover the bucket start encoded in a slug produced by [`window_slug`].
pub fn slug_start(slug: &str) -> Option<i64> {
    let raw = slug.strip_prefix(SLUG_PREFIX)?.strip_prefix('-')?;
    raw.parse().ok()
}

/// End of the window whose slug encodes `bucket_start`.
pub fn slug_end(slug: &str) -> Option<i64> {
    slug_start(slug).map(|start| start + BUCKET_SIZE_SECS)
}
