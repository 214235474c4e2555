//! In-memory stand-in for the CTEM REST API
//!
//! Records are kept as JSON per namespace. List filtering understands the
//! query parameters the endpoint builder emits: `search`, comma-separated
//! facets, `{field}_min`/`{field}_max`, paging and sorting.

use async_trait::async_trait;
use ctem_client::{ApiError, ApiRequest, ApiResult, HttpClient, Method};
use ctem_model::Resource;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

const PREFIX: &str = "/api/v1/";
const SEARCH_FIELDS: &[&str] = &[
    "name",
    "title",
    "description",
    "hostname",
    "ip_address",
    "subject",
    "recipient",
];

#[derive(Debug, Clone)]
struct Failure {
    method: Option<Method>,
    error: ApiError,
}

/// Fake backend implementing [`HttpClient`]
#[derive(Debug, Default)]
pub struct FakeBackend {
    records: Mutex<HashMap<String, Vec<Value>>>,
    requests: Mutex<Vec<ApiRequest>>,
    failures: Mutex<VecDeque<Failure>>,
    latency: Mutex<Option<Duration>>,
    next_id: AtomicU64,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Backend holding every fixture set
    pub fn seeded() -> Arc<Self> {
        let backend = Self::default();
        backend.seed::<ctem_model::AssetGroups>(ctem_data::fixtures::asset_groups());
        backend.seed::<ctem_model::Exposures>(ctem_data::fixtures::exposures());
        backend.seed::<ctem_model::ScanProfiles>(ctem_data::fixtures::scan_profiles());
        backend.seed::<ctem_model::NotificationOutbox>(ctem_data::fixtures::outbox_entries());
        backend.seed::<ctem_model::Workflows>(ctem_data::fixtures::workflows());
        backend.seed::<ctem_model::Agents>(ctem_data::fixtures::agents());
        Arc::new(backend)
    }

    /// Replace a namespace's records
    pub fn seed<R: Resource>(&self, records: Vec<R::Record>) {
        let values = records
            .iter()
            .map(|record| serde_json::to_value(record).unwrap())
            .collect();
        self.records.lock().insert(R::NAMESPACE.to_string(), values);
    }

    /// Typed copy of a namespace's records
    pub fn records<R: Resource>(&self) -> Vec<R::Record> {
        self.records
            .lock()
            .get(R::NAMESPACE)
            .map(|values| {
                values
                    .iter()
                    .map(|v| serde_json::from_value(v.clone()).unwrap())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Change one stored record behind the client's back
    pub fn edit<R: Resource>(&self, id: &str, change: impl FnOnce(&mut Map<String, Value>)) {
        let mut records = self.records.lock();
        if let Some(Value::Object(record)) = records
            .get_mut(R::NAMESPACE)
            .and_then(|values| values.iter_mut().find(|v| v["id"] == id))
        {
            change(record);
        }
    }

    /// Fail the next request with `error`
    pub fn fail_next(&self, error: ApiError) {
        self.failures.lock().push_back(Failure {
            method: None,
            error,
        });
    }

    /// Fail the next request using `method` with `error`
    pub fn fail_next_with(&self, method: Method, error: ApiError) {
        self.failures.lock().push_back(Failure {
            method: Some(method),
            error,
        });
    }

    /// Delay every response
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Requests with this method whose route starts with `route_prefix`
    pub fn count(&self, method: Method, route_prefix: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == method && r.route().starts_with(route_prefix))
            .count()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().clear();
    }

    fn take_failure(&self, method: Method) -> Option<ApiError> {
        let mut failures = self.failures.lock();
        let index = failures
            .iter()
            .position(|f| f.method.map_or(true, |m| m == method))?;
        failures.remove(index).map(|f| f.error)
    }

    fn handle(&self, request: &ApiRequest) -> ApiResult<Value> {
        let (route, query) = request
            .path
            .split_once('?')
            .unwrap_or((request.path.as_str(), ""));
        let rest = route
            .strip_prefix(PREFIX)
            .ok_or_else(|| ApiError::http(404, format!("no route {route}")))?;
        let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
        let body = request.body.clone().unwrap_or(Value::Null);

        match (request.method, segments.as_slice()) {
            (Method::Get, [ns]) => Ok(self.list(ns, &parse_query(query))),
            (Method::Get, [ns, id]) => self.find(ns, id),
            (Method::Post, [ns]) => Ok(self.create(ns, body)),
            (Method::Put | Method::Patch, [ns, "bulk"]) => Ok(self.bulk_update(ns, &body)),
            (Method::Put | Method::Patch, [ns, id]) => self.update(ns, id, &body),
            (Method::Delete, [ns, id]) => self.delete(ns, id).map(|()| Value::Null),
            (Method::Post, [ns, "bulk-delete"]) => Ok(self.bulk_delete(ns, &body)),
            (Method::Post, [ns, id, "assets"]) => self.adjust_assets(ns, id, &body, true),
            (Method::Delete, [ns, id, "assets"]) => {
                self.adjust_assets(ns, id, &body, false).map(|_| Value::Null)
            }
            (Method::Post, [ns, id, "retry"]) => self.retry(ns, id),
            _ => Err(ApiError::http(404, format!("no route {} {route}", request.method))),
        }
    }

    fn list(&self, ns: &str, params: &[(String, String)]) -> Value {
        let records = self.records.lock();
        let mut matching: Vec<Value> = records
            .get(ns)
            .map(|values| {
                values
                    .iter()
                    .filter(|record| params.iter().all(|(k, v)| param_matches(record, k, v)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let param = |name: &str| params.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str());
        if let Some(field) = param("sort_by") {
            let descending = param("sort_order") == Some("desc");
            matching.sort_by(|a, b| {
                let ordering = compare_values(&a[field], &b[field]);
                if descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        let page: usize = param("page").and_then(|p| p.parse().ok()).unwrap_or(1).max(1);
        let per_page: usize = param("per_page").and_then(|p| p.parse().ok()).unwrap_or(50).max(1);
        let total = matching.len();
        let data: Vec<Value> = matching.into_iter().skip((page - 1) * per_page).take(per_page).collect();

        json!({
            "data": data,
            "total": total,
            "page": page,
            "per_page": per_page,
            "total_pages": total.div_ceil(per_page),
        })
    }

    fn find(&self, ns: &str, id: &str) -> ApiResult<Value> {
        self.records
            .lock()
            .get(ns)
            .and_then(|values| values.iter().find(|v| v["id"] == id).cloned())
            .ok_or_else(|| not_found(id))
    }

    fn create(&self, ns: &str, body: Value) -> Value {
        let n = self.next_id.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        let mut records = self.records.lock();
        let values = records.entry(ns.to_string()).or_default();

        // Server-computed fields come from the first stored record.
        let mut record = values.first().cloned().unwrap_or_else(|| json!({}));
        merge(&mut record, &body);
        record["id"] = json!(format!("{ns}-new-{n}"));
        values.push(record.clone());
        record
    }

    fn update(&self, ns: &str, id: &str, body: &Value) -> ApiResult<Value> {
        let mut records = self.records.lock();
        let record = records
            .get_mut(ns)
            .and_then(|values| values.iter_mut().find(|v| v["id"] == id))
            .ok_or_else(|| not_found(id))?;
        merge(record, body);
        Ok(record.clone())
    }

    fn delete(&self, ns: &str, id: &str) -> ApiResult<()> {
        let mut records = self.records.lock();
        let values = records.get_mut(ns).ok_or_else(|| not_found(id))?;
        let before = values.len();
        values.retain(|v| v["id"] != id);
        if values.len() == before {
            return Err(not_found(id));
        }
        Ok(())
    }

    fn bulk_update(&self, ns: &str, body: &Value) -> Value {
        let ids = string_list(&body["ids"]);
        let mut affected = 0;
        if let Some(values) = self.records.lock().get_mut(ns) {
            for record in values.iter_mut().filter(|v| ids.iter().any(|id| v["id"] == **id)) {
                merge(record, &body["updates"]);
                affected += 1;
            }
        }
        json!({ "affected": affected })
    }

    fn bulk_delete(&self, ns: &str, body: &Value) -> Value {
        let ids = string_list(&body["ids"]);
        let mut affected = 0;
        if let Some(values) = self.records.lock().get_mut(ns) {
            let before = values.len();
            values.retain(|v| !ids.iter().any(|id| v["id"] == **id));
            affected = before - values.len();
        }
        json!({ "affected": affected })
    }

    fn adjust_assets(&self, ns: &str, id: &str, body: &Value, add: bool) -> ApiResult<Value> {
        let delta = i64::try_from(string_list(&body["asset_ids"]).len()).unwrap_or(i64::MAX);
        let mut records = self.records.lock();
        let record = records
            .get_mut(ns)
            .and_then(|values| values.iter_mut().find(|v| v["id"] == id))
            .ok_or_else(|| not_found(id))?;
        let count = record["asset_count"].as_i64().unwrap_or(0);
        let next = if add { count + delta } else { (count - delta).max(0) };
        record["asset_count"] = json!(next);
        Ok(record.clone())
    }

    fn retry(&self, ns: &str, id: &str) -> ApiResult<Value> {
        let mut records = self.records.lock();
        let record = records
            .get_mut(ns)
            .and_then(|values| values.iter_mut().find(|v| v["id"] == id))
            .ok_or_else(|| not_found(id))?;
        record["status"] = json!("pending");
        record["last_error"] = Value::Null;
        Ok(record.clone())
    }
}

#[async_trait]
impl HttpClient for FakeBackend {
    async fn send(&self, request: ApiRequest) -> ApiResult<Value> {
        self.requests.lock().push(request.clone());
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if request.tenant.is_none() {
            return Err(ApiError::http(400, "missing tenant"));
        }
        if let Some(error) = self.take_failure(request.method) {
            return Err(error);
        }
        self.handle(&request)
    }
}

fn not_found(id: &str) -> ApiError {
    ApiError::Http {
        status: 404,
        code: Some("not_found".into()),
        message: format!("{id} not found"),
    }
}

// Keys are normalised to the stored snake_case form.
fn merge(target: &mut Value, patch: &Value) {
    if let (Value::Object(target), Value::Object(patch)) = (target, patch) {
        for (key, value) in patch {
            target.insert(snake_case(key), value.clone());
        }
    }
}

fn snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(ToString::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn param_matches(record: &Value, key: &str, value: &str) -> bool {
    match key {
        "page" | "per_page" | "sort_by" | "sort_order" => true,
        "search" => {
            let needle = value.to_lowercase();
            SEARCH_FIELDS.iter().any(|field| {
                record[*field]
                    .as_str()
                    .is_some_and(|text| text.to_lowercase().contains(&needle))
            })
        }
        _ => {
            if let Some(field) = key.strip_suffix("_min") {
                if let (Some(actual), Ok(bound)) = (record[field].as_f64(), value.parse::<f64>()) {
                    return actual >= bound;
                }
            }
            if let Some(field) = key.strip_suffix("_max") {
                if let (Some(actual), Ok(bound)) = (record[field].as_f64(), value.parse::<f64>()) {
                    return actual <= bound;
                }
            }
            match as_text(&record[key]) {
                Some(actual) => value.split(',').any(|allowed| allowed == actual),
                None => true,
            }
        }
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .unwrap_or_default()
            .total_cmp(&b.as_f64().unwrap_or_default()),
        (Value::String(a), Value::String(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
        _ => Ordering::Equal,
    }
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (percent_decode(k), percent_decode(v)))
        .collect()
}

fn percent_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant;

    fn get(path: &str) -> ApiRequest {
        ApiRequest::new(Method::Get, path).with_tenant(tenant())
    }

    #[tokio::test]
    async fn lists_with_filters() {
        let backend = FakeBackend::seeded();
        let page = backend
            .send(get("/api/v1/asset-groups?environment=production,staging&search=core"))
            .await
            .unwrap();
        assert_eq!(page["total"], 1);
        assert_eq!(page["data"][0]["name"], "Production - Core Banking");

        let page = backend
            .send(get("/api/v1/asset-groups?risk_score_min=70&per_page=2&sort_by=risk_score&sort_order=desc"))
            .await
            .unwrap();
        assert_eq!(page["total"], 3);
        assert_eq!(page["data"][0]["id"], "ag-003");
        assert_eq!(page["total_pages"], 2);
    }

    #[tokio::test]
    async fn decodes_search_text() {
        let backend = FakeBackend::seeded();
        let page = backend
            .send(get("/api/v1/asset-groups?search=core%20banking"))
            .await
            .unwrap();
        assert_eq!(page["total"], 1);
    }

    #[tokio::test]
    async fn injected_failures_match_method() {
        let backend = FakeBackend::seeded();
        backend.fail_next_with(Method::Post, ApiError::Network("reset".into()));

        assert!(backend.send(get("/api/v1/agents")).await.is_ok());
        let create = ApiRequest::new(Method::Post, "/api/v1/agents")
            .with_tenant(tenant())
            .with_body(json!({ "hostname": "new-host" }));
        assert!(backend.send(create.clone()).await.is_err());
        assert!(backend.send(create).await.is_ok());
        assert_eq!(backend.count(Method::Post, "/api/v1/agents"), 2);
    }

    #[test]
    fn percent_decoding() {
        assert_eq!(percent_decode("a%20b%26c"), "a b&c");
        assert_eq!(percent_decode("100%"), "100%");
    }

    #[test]
    fn camel_keys_are_stored_snake() {
        let mut record = json!({ "business_unit": "Finance" });
        merge(&mut record, &json!({ "businessUnit": "Ops", "name": "x" }));
        assert_eq!(record["business_unit"], "Ops");
        assert_eq!(record["name"], "x");
    }
}
