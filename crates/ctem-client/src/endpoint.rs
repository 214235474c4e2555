//! Endpoint builder
//!
//! Pure functions from a resource and its filter object to a request path.
//! No state, no I/O. Keys come out of [`QueryParams`] already sorted, so two
//! filters with the same fields produce the same string no matter the order
//! they were set in.

use ctem_model::{QueryParams, Resource, ResourceFilter};
use std::fmt::Write as _;

/// Versioned API prefix
pub const API_PREFIX: &str = "/api/v1";

/// Append serialized filters to a base path
///
/// Absent and empty filters both return `base_url` unchanged, with no `?`.
#[must_use]
pub fn build(base_url: &str, params: Option<&QueryParams>) -> String {
    let mut url = base_url.to_string();
    let Some(params) = params.filter(|p| !p.is_empty()) else {
        return url;
    };

    url.push('?');
    for (i, (key, value)) in params.iter().enumerate() {
        if i > 0 {
            url.push('&');
        }
        encode_into(&mut url, key);
        url.push('=');
        encode_into(&mut url, value);
    }
    url
}

/// Percent-encode one query component
///
/// Unreserved characters pass through, as does `,` which joins array values.
#[must_use]
pub fn encode_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    encode_into(&mut out, raw);
    out
}

fn encode_into(out: &mut String, raw: &str) {
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b',' => {
                out.push(char::from(byte));
            }
            _ => {
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
}

/// `/api/v1/{ns}`
#[must_use]
pub fn collection<R: Resource>() -> String {
    format!("{API_PREFIX}/{}", R::NAMESPACE)
}

/// `/api/v1/{ns}?{filters}`
#[must_use]
pub fn list<R: Resource>(filters: Option<&R::Filters>) -> String {
    let params = filters.map(ResourceFilter::query_params);
    build(&collection::<R>(), params.as_ref())
}

/// `/api/v1/{ns}/{id}`
#[must_use]
pub fn record<R: Resource>(id: &str) -> String {
    format!("{}/{}", collection::<R>(), encode_component(id))
}

/// `/api/v1/{ns}/bulk` for bulk updates
#[must_use]
pub fn bulk_update<R: Resource>() -> String {
    format!("{}/bulk", collection::<R>())
}

/// `/api/v1/{ns}/bulk-delete`
#[must_use]
pub fn bulk_delete<R: Resource>() -> String {
    format!("{}/bulk-delete", collection::<R>())
}

/// `/api/v1/{ns}/{id}/assets` for group membership
#[must_use]
pub fn members<R: Resource>(id: &str) -> String {
    format!("{}/assets", record::<R>(id))
}

/// `/api/v1/{ns}/{id}/retry`
#[must_use]
pub fn retry<R: Resource>(id: &str) -> String {
    format!("{}/retry", record::<R>(id))
}

/// Prefix shared by every path of a resource, used for invalidation
#[must_use]
pub fn namespace_prefix<R: Resource>() -> String {
    collection::<R>()
}
