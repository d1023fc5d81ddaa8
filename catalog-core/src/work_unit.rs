//! Work Unit (§4.3): per-item state machine implementing the three verbs
//! GET, POST/LAUNCH, MONITOR. Grounded on
//! `original_source/workunit.go`'s `WorkUnit`/`dispatch`/`get`/`post`/`monitor`.

use std::time::Duration;

use serde_json::{Map, Value};
use url::Url;

use crate::channels::WorkChannels;
use crate::error::WorkUnitError;
use crate::filter::Filter;
use crate::sanitize::sanitize_artifacts;
use crate::task::{JobParam, Page, RelatedSpec};
use crate::upstream_client::{is_success_status, UpstreamClient};

const TERMINAL_STATUSES: &[&str] = &["successful", "failed", "error", "canceled"];
const NON_TERMINAL_STATUSES: &[&str] = &["new", "pending", "waiting", "running"];
const DEFAULT_REFRESH_INTERVAL_SECONDS: u64 = 10;

pub struct WorkUnit {
    job: JobParam,
    absolute_url: Url,
    filter: Option<Filter>,
    upstream: UpstreamClient,
    channels: WorkChannels,
}

impl WorkUnit {
    /// Resolve the Job Param's `href_slug` against the upstream host,
    /// overlaying the configured scheme and authority while preserving
    /// the slug's own path and query (§4.3 step 1).
    pub fn new(
        job: JobParam,
        upstream_host: &Url,
        upstream: UpstreamClient,
        channels: WorkChannels,
    ) -> Result<Self, WorkUnitError> {
        let absolute_url = upstream_host.join(&job.href_slug).map_err(|e| WorkUnitError::InvalidUrl {
            url: job.href_slug.clone(),
            message: e.to_string(),
        })?;

        let filter = match &job.apply_filter {
            Some(expr) => Some(Filter::compile(expr)?),
            None => None,
        };

        Ok(WorkUnit {
            job,
            absolute_url,
            filter,
            upstream,
            channels,
        })
    }

    /// Entry point: dispatch on method, case-insensitively (§4.3 step 3).
    pub async fn run(mut self) -> Result<(), WorkUnitError> {
        let verb = self.job.method.clone();
        match verb.to_ascii_lowercase().as_str() {
            "get" => self.get().await,
            "post" | "launch" => self.post_or_launch().await,
            "monitor" => self.monitor().await,
            _ => Err(WorkUnitError::InvalidMethod {
                url: self.job.href_slug.clone(),
                method: verb,
            }),
        }
    }

    // ---- GET (§4.3.1) ----

    async fn get(&mut self) -> Result<(), WorkUnitError> {
        let mut page_num: u64 = 1;
        loop {
            let body = self.fetch_page().await?;
            let doc = self.decode_and_transform(&body)?;
            let filename = format!("{}{}.json", self.job.page_prefix, page_num);
            self.emit_page(&doc, &filename).await;
            self.expand_related(&doc).await;

            if !self.job.fetch_all_pages {
                break;
            }
            match doc.get("next") {
                Some(Value::String(_)) => {
                    page_num += 1;
                    self.job
                        .params
                        .insert("page".to_string(), Value::String(page_num.to_string()));
                }
                _ => break,
            }
        }
        Ok(())
    }

    // ---- POST / LAUNCH (§4.3.2) ----

    async fn post_or_launch(&mut self) -> Result<(), WorkUnitError> {
        let is_launch = self.job.method.eq_ignore_ascii_case("launch");
        let body_bytes = serde_json::to_vec(&self.job.params).map_err(|e| WorkUnitError::Decode {
            url: self.job.href_slug.clone(),
            source: e,
        })?;

        let response = self
            .upstream
            .post(self.absolute_url.as_str(), &body_bytes)
            .await
            .map_err(|e| WorkUnitError::Transport {
                url: self.job.href_slug.clone(),
                source: e,
            })?;

        if !is_success_status(response.status) {
            return Err(WorkUnitError::UpstreamStatus {
                url: self.job.href_slug.clone(),
                status: response.status,
                body: String::from_utf8_lossy(&response.body).to_string(),
            });
        }

        let doc = self.decode_and_transform(&response.body)?;
        self.emit_page(&doc, "response.json").await;

        if is_launch {
            let launch_url = doc
                .get("url")
                .and_then(Value::as_str)
                .ok_or_else(|| WorkUnitError::Decode {
                    url: self.job.href_slug.clone(),
                    source: serde_json::Error::io(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "launch response missing string \"url\" field",
                    )),
                })?;
            let monitor_job = JobParam {
                method: "monitor".to_string(),
                href_slug: launch_url.to_string(),
                fetch_all_pages: false,
                params: Map::new(),
                apply_filter: self.job.apply_filter.clone(),
                refresh_interval_seconds: None,
                fetch_related: Vec::new(),
                page_prefix: "page".to_string(),
            };
            self.channels.dispatch(monitor_job).await;
        }

        Ok(())
    }

    // ---- MONITOR (§4.3.3) ----

    async fn monitor(&mut self) -> Result<(), WorkUnitError> {
        let refresh = self
            .job
            .refresh_interval_seconds
            .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECONDS);

        loop {
            let body = self.fetch_page().await?;
            let doc = self.decode_and_transform(&body)?;

            let status = doc
                .get("status")
                .and_then(Value::as_str)
                .map(|s| s.to_string());

            match status {
                None => {
                    return Err(WorkUnitError::MonitorMissingStatus {
                        url: self.job.href_slug.clone(),
                    })
                }
                Some(s) if TERMINAL_STATUSES.contains(&s.as_str()) => {
                    self.emit_page(&doc, "response.json").await;
                    return Ok(());
                }
                Some(s) if NON_TERMINAL_STATUSES.contains(&s.as_str()) => {
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_secs(refresh)) => {}
                        _ = self.channels.shutdown.cancelled() => {
                            return Err(WorkUnitError::Cancelled);
                        }
                    }
                }
                Some(s) => {
                    return Err(WorkUnitError::MonitorUnknownStatus {
                        url: self.job.href_slug.clone(),
                        status: s,
                    })
                }
            }
        }
    }

    // ---- shared helpers ----

    fn current_url(&self) -> Url {
        let mut url = self.absolute_url.clone();
        apply_query_overrides(&mut url, &self.job.params);
        url
    }

    async fn fetch_page(&self) -> Result<Vec<u8>, WorkUnitError> {
        let url = self.current_url();
        let response = self
            .upstream
            .get(url.as_str())
            .await
            .map_err(|e| WorkUnitError::Transport {
                url: self.job.href_slug.clone(),
                source: e,
            })?;

        if !is_success_status(response.status) {
            return Err(WorkUnitError::UpstreamStatus {
                url: self.job.href_slug.clone(),
                status: response.status,
                body: String::from_utf8_lossy(&response.body).to_string(),
            });
        }
        Ok(response.body)
    }

    /// Decode JSON preserving numeric precision, apply the filter if one
    /// was configured, and sanitize `artifacts` if present (§4.3.1).
    fn decode_and_transform(&self, body: &[u8]) -> Result<Value, WorkUnitError> {
        let mut value: Value = serde_json::from_slice(body).map_err(|e| WorkUnitError::Decode {
            url: self.job.href_slug.clone(),
            source: e,
        })?;

        if let Some(filter) = &self.filter {
            value = filter.apply(&value)?;
        }

        if let Value::Object(ref mut map) = value {
            if let Some(Value::Object(artifacts)) = map.get("artifacts").cloned() {
                let sanitized = sanitize_artifacts(&artifacts)?;
                map.insert("artifacts".to_string(), Value::Object(sanitized));
            }
        }

        Ok(value)
    }

    async fn emit_page(&self, doc: &Value, filename: &str) {
        let data = serde_json::to_vec(doc).unwrap_or_default();
        let name = self.page_name(filename);
        self.channels.emit_page(Page { name, data }).await;
    }

    fn page_name(&self, filename: &str) -> String {
        let path = self.absolute_url.path().trim_end_matches('/');
        format!("{path}/{filename}")
    }

    async fn expand_related(&self, doc: &Value) {
        let Some(results) = doc.get("results").and_then(Value::as_array) else {
            return;
        };
        for item in results {
            let Some(obj) = item.as_object() else {
                continue;
            };
            for related in &self.job.fetch_related {
                if !related_predicate_holds(obj, related) {
                    continue;
                }
                if let Some(slug) = obj.get(&related.href_slug_attr).and_then(Value::as_str) {
                    let job = JobParam {
                        method: "get".to_string(),
                        href_slug: slug.to_string(),
                        fetch_all_pages: false,
                        params: Map::new(),
                        apply_filter: related.apply_filter.clone(),
                        refresh_interval_seconds: None,
                        fetch_related: Vec::new(),
                        page_prefix: "page".to_string(),
                    };
                    self.channels.dispatch(job).await;
                }
            }
        }
    }
}

/// "Include this follow-up only if the predicate attribute is absent, or
/// present and true" (§9 Design notes).
fn related_predicate_holds(obj: &Map<String, Value>, related: &RelatedSpec) -> bool {
    match &related.predicate_attr {
        None => true,
        Some(attr) => match obj.get(attr) {
            None => true,
            Some(v) => v.as_bool().unwrap_or(false),
        },
    }
}

/// Merge the Job Param's typed `params` map into the URL's query string,
/// preserving any keys already present in the slug's own query and
/// overriding duplicates (§4.3 step 2, used by GET and MONITOR).
fn apply_query_overrides(url: &mut Url, params: &Map<String, Value>) {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    for (key, value) in params {
        let Some(formatted) = format_query_value(value) else {
            continue;
        };
        if let Some(existing) = pairs.iter_mut().find(|(k, _)| k == key) {
            existing.1 = formatted;
        } else {
            pairs.push((key.clone(), formatted));
        }
    }

    let mut serializer = url.query_pairs_mut();
    serializer.clear();
    for (k, v) in &pairs {
        serializer.append_pair(k, v);
    }
    drop(serializer);
}

/// Canonical string forms for typed query values: booleans as `true`/`false`,
/// integers in base-10, floats in scientific notation with minimal digits
/// (§4.3 step 2).
fn format_query_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                n.as_f64().map(format_scientific)
            }
        }
        _ => None,
    }
}

fn format_scientific(f: f64) -> String {
    let s = format!("{f:E}");
    match s.find('E') {
        Some(pos) => {
            let (mantissa, exp) = s.split_at(pos);
            let exp_val: i32 = exp[1..].parse().unwrap_or(0);
            let sign = if exp_val < 0 { "-" } else { "+" };
            format!("{mantissa}E{sign}{:02}", exp_val.abs())
        }
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::new_work_channels;
    use httpmock::prelude::*;
    use reqwest::Client;
    use tokio_util::sync::CancellationToken;

    fn job(method: &str, href_slug: &str) -> JobParam {
        JobParam {
            method: method.to_string(),
            href_slug: href_slug.to_string(),
            fetch_all_pages: false,
            params: Map::new(),
            apply_filter: None,
            refresh_interval_seconds: None,
            fetch_related: Vec::new(),
            page_prefix: "page".to_string(),
        }
    }

    #[test]
    fn scientific_formatting_has_explicit_sign_and_two_digit_exponent() {
        assert_eq!(format_scientific(1.5), "1.5E+00");
        assert_eq!(format_scientific(0.001), "1E-03");
    }

    #[test]
    fn query_overrides_preserve_existing_and_add_new() {
        let mut url = Url::parse("https://upstream.example/api/v2/x?existing=1").unwrap();
        let mut params = Map::new();
        params.insert("page".to_string(), Value::String("2".to_string()));
        apply_query_overrides(&mut url, &params);
        let pairs: Vec<_> = url.query_pairs().collect();
        assert!(pairs.iter().any(|(k, v)| k == "existing" && v == "1"));
        assert!(pairs.iter().any(|(k, v)| k == "page" && v == "2"));
    }

    #[tokio::test]
    async fn single_get_emits_one_page() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v2/x");
            then.status(200).body("{\"a\":1}");
        });

        let host = Url::parse(&server.base_url()).unwrap();
        let (handle, mut dispatcher, _processor) = new_work_channels(CancellationToken::new());
        let upstream = UpstreamClient::new(Client::new(), None);
        let unit = WorkUnit::new(job("get", "/api/v2/x"), &host, upstream, handle).unwrap();

        unit.run().await.unwrap();
        drop(dispatcher.dispatch_rx);
        let page = dispatcher.pages_rx.recv().await.unwrap();
        assert_eq!(page.name, "/api/v2/x/page1.json");
        assert_eq!(page.data, b"{\"a\":1}");
    }

    #[tokio::test]
    async fn unknown_method_reports_spec_error_format() {
        let host = Url::parse("https://upstream.example").unwrap();
        let (handle, _dispatcher, _processor) = new_work_channels(CancellationToken::new());
        let upstream = UpstreamClient::new(Client::new(), None);
        let unit = WorkUnit::new(job("unknown", "/api/v2/x"), &host, upstream, handle).unwrap();

        let err = unit.run().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "URL: /api/v2/x Status: 0 Message: Invalid method received unknown"
        );
    }

    #[tokio::test]
    async fn upstream_failure_reports_spec_error_format() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v2/jobs/15");
            then.status(404).body("Job Missing");
        });

        let host = Url::parse(&server.base_url()).unwrap();
        let (handle, _dispatcher, _processor) = new_work_channels(CancellationToken::new());
        let upstream = UpstreamClient::new(Client::new(), None);
        let unit = WorkUnit::new(job("monitor", "/api/v2/jobs/15"), &host, upstream, handle).unwrap();

        let err = unit.run().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "URL: /api/v2/jobs/15 Status: 404 Message: Job Missing"
        );
    }
}
