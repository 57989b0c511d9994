//! Wire framing and transport headers for the push channel.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CACHE_CONTROL, CONNECTION, CONTENT_TYPE};

use super::events::StreamEvent;

/// Encode one event as a `data: <json>\n\n` frame.
pub fn encode_frame(event: &StreamEvent) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(event)?;
    Ok(format!("data: {json}\n\n"))
}

/// Headers for a long-lived server-to-client event stream: no buffering,
/// no caching, keep-alive.
pub fn sse_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(
        HeaderName::from_static("x-accel-buffering"),
        HeaderValue::from_static("no"),
    );
    headers
}

/// Parse the JSON body of a frame produced by [`encode_frame`].
pub fn decode_frame(frame: &str) -> Option<serde_json::Value> {
    let data = frame.trim_end_matches('\n').strip_prefix("data: ")?;
    serde_json::from_str(data).ok()
}
