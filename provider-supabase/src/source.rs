//! PostgREST-backed result source
//!
//! Implements `RemoteResultSource` for a Supabase table of draw results.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::remote::{Condition, LottoResult, RemoteResultSource, ResultQuery};
use core_runtime::logging::redact_if_sensitive;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::config::SupabaseConfig;
use crate::error::SupabaseError;

/// Newest first; draw number breaks ties so pages are stable
const ORDER: &str = "date.desc,draw_num.desc";

/// Per-request timeout handed to the HTTP client
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// PostgREST error body
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
    #[serde(default)]
    hint: Option<String>,
}

/// Supabase result source
///
/// Talks to `{url}/rest/v1/{table}` through the `HttpClient` bridge, sending
/// the anon key both as `apikey` and as a bearer token.
///
/// # Example
///
/// ```ignore
/// use provider_supabase::{SupabaseConfig, SupabaseResultSource};
/// use bridge_traits::remote::{RemoteResultSource, ResultQuery};
///
/// let source = SupabaseResultSource::new(http_client, SupabaseConfig::from_env()?);
/// let total = source.count(&[]).await?;
/// let newest = source.fetch(&ResultQuery::page(0, 20)).await?;
/// ```
pub struct SupabaseResultSource {
    http_client: Arc<dyn HttpClient>,
    config: SupabaseConfig,
    retry_policy: RetryPolicy,
}

impl SupabaseResultSource {
    pub fn new(http_client: Arc<dyn HttpClient>, config: SupabaseConfig) -> Self {
        info!(
            url = config.url(),
            table = config.table(),
            anon_key = %redact_if_sensitive("anon_key", config.anon_key()),
            "Configured Supabase result source"
        );

        Self {
            http_client,
            config,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn config(&self) -> &SupabaseConfig {
        &self.config
    }

    fn request(&self, method: HttpMethod, params: &[(String, String)]) -> HttpRequest {
        let request = HttpRequest::new(method, self.config.table_endpoint())
            .header("apikey", self.config.anon_key())
            .bearer_token(self.config.anon_key())
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT);

        params.iter().fold(request, |request, (key, value)| {
            request.query_param(key, &urlencoding::encode(value))
        })
    }

    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, SupabaseError> {
        let response = self
            .http_client
            .execute_with_retry(request, self.retry_policy.clone())
            .await?;

        if response.is_success() {
            return Ok(response);
        }

        let message = match response.json::<ApiErrorBody>() {
            Ok(ApiErrorBody {
                message,
                hint: Some(hint),
            }) => format!("{} ({})", message, hint),
            Ok(body) => body.message,
            Err(_) => String::from_utf8_lossy(&response.body).trim().to_string(),
        };
        warn!(status = response.status, %message, "Supabase request failed");

        Err(SupabaseError::ApiError {
            status_code: response.status,
            message,
        })
    }

    fn parse_count(response: &HttpResponse) -> std::result::Result<u64, SupabaseError> {
        // e.g. `0-24/3573` or `*/3573`
        let range = response
            .header("Content-Range")
            .ok_or_else(|| SupabaseError::ParseError("missing Content-Range header".to_string()))?;

        range
            .rsplit_once('/')
            .and_then(|(_, total)| total.trim().parse().ok())
            .ok_or_else(|| SupabaseError::ParseError(format!("unexpected Content-Range '{}'", range)))
    }
}

/// PostgREST query parameters for a set of AND-ed conditions.
pub(crate) fn filter_params(conditions: &[Condition]) -> Vec<(String, String)> {
    conditions
        .iter()
        .map(|condition| match condition {
            Condition::AnyOf(any) => ("or".to_string(), disjunction(any)),
            Condition::DateEq(d) => ("date".to_string(), format!("eq.{}", d)),
            Condition::DateGt(d) => ("date".to_string(), format!("gt.{}", d)),
            Condition::DateGte(d) => ("date".to_string(), format!("gte.{}", d)),
            Condition::DateLt(d) => ("date".to_string(), format!("lt.{}", d)),
            Condition::IntEq(field, v) => (field.column().to_string(), format!("eq.{}", v)),
            Condition::TextContains(field, needle) => {
                (field.column().to_string(), format!("ilike.*{}*", needle))
            }
        })
        .collect()
}

fn disjunction(conditions: &[Condition]) -> String {
    let terms: Vec<String> = conditions.iter().map(term).collect();
    format!("({})", terms.join(","))
}

/// A condition in the `column.operator.value` form used inside `or=(...)`.
fn term(condition: &Condition) -> String {
    match condition {
        Condition::AnyOf(any) => format!("or{}", disjunction(any)),
        Condition::DateEq(d) => format!("date.eq.{}", d),
        Condition::DateGt(d) => format!("date.gt.{}", d),
        Condition::DateGte(d) => format!("date.gte.{}", d),
        Condition::DateLt(d) => format!("date.lt.{}", d),
        Condition::IntEq(field, v) => format!("{}.eq.{}", field.column(), v),
        Condition::TextContains(field, needle) => {
            format!("{}.ilike.{}", field.column(), quote(&format!("*{}*", needle)))
        }
    }
}

/// Double-quote values containing PostgREST reserved characters.
fn quote(value: &str) -> String {
    let reserved = |c: char| matches!(c, ',' | '(' | ')' | '"' | '\\' | ':') || c.is_whitespace();
    if !value.chars().any(reserved) {
        return value.to_string();
    }

    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

#[async_trait]
impl RemoteResultSource for SupabaseResultSource {
    #[instrument(skip(self), fields(filters = conditions.len()))]
    async fn count(&self, conditions: &[Condition]) -> Result<u64> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(filter_params(conditions));

        let request = self
            .request(HttpMethod::Head, &params)
            .header("Prefer", "count=exact");

        let response = self.send(request).await?;
        let total = Self::parse_count(&response)?;

        debug!(total, "Counted remote results");
        Ok(total)
    }

    #[instrument(skip(self), fields(offset = query.offset, limit = query.limit))]
    async fn fetch(&self, query: &ResultQuery) -> Result<Vec<LottoResult>> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(filter_params(&query.conditions));
        params.push(("order".to_string(), ORDER.to_string()));
        params.push(("offset".to_string(), query.offset.to_string()));
        params.push(("limit".to_string(), query.limit.to_string()));

        let response = self.send(self.request(HttpMethod::Get, &params)).await?;
        let results: Vec<LottoResult> = serde_json::from_slice(&response.body).map_err(|e| {
            SupabaseError::ParseError(format!("Failed to parse result rows: {}", e))
        })?;

        debug!(records = results.len(), "Fetched remote results");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;
    use bridge_traits::remote::{IntField, TextField};
    use bytes::Bytes;
    use chrono::NaiveDate;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
            async fn execute_with_retry(&self, request: HttpRequest, policy: RetryPolicy) -> Result<HttpResponse>;
        }
    }

    fn config() -> SupabaseConfig {
        SupabaseConfig::new("https://abc.supabase.co", "anon-key").unwrap()
    }

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    fn response(status: u16, headers: &[(&str, &str)], body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
            body: Bytes::from(body.to_string()),
        }
    }

    #[test]
    fn test_filter_params() {
        let params = filter_params(&[
            Condition::DateGte(date("2024-08-01")),
            Condition::DateLt(date("2024-09-01")),
            Condition::TextContains(TextField::Numbers, "12".to_string()),
        ]);

        assert_eq!(
            params,
            vec![
                ("date".to_string(), "gte.2024-08-01".to_string()),
                ("date".to_string(), "lt.2024-09-01".to_string()),
                ("numbers".to_string(), "ilike.*12*".to_string()),
            ]
        );
    }

    #[test]
    fn test_disjunction_params() {
        let params = filter_params(&[Condition::AnyOf(vec![
            Condition::IntEq(IntField::DrawNum, 7),
            Condition::IntEq(IntField::PowerBall, 7),
            Condition::TextContains(TextField::Numbers, "7".to_string()),
        ])]);

        assert_eq!(
            params,
            vec![(
                "or".to_string(),
                "(draw_num.eq.7,power_ball.eq.7,numbers.ilike.*7*)".to_string()
            )]
        );
    }

    #[test]
    fn test_reserved_values_are_quoted() {
        assert_eq!(
            term(&Condition::TextContains(TextField::Numbers, "1,2".to_string())),
            "numbers.ilike.\"*1,2*\""
        );
    }

    #[tokio::test]
    async fn test_fetch_builds_postgrest_request() {
        let mut http = MockHttpClient::new();
        http.expect_execute_with_retry()
            .withf(|req, _| {
                req.method == HttpMethod::Get
                    && req.url.starts_with("https://abc.supabase.co/rest/v1/lotto_results?select=%2A")
                    && req.url.contains("date=gt.2024-01-02")
                    && req.url.contains("order=date.desc%2Cdraw_num.desc")
                    && req.url.contains("offset=1000")
                    && req.url.contains("limit=1000")
                    && req.headers.get("apikey").map(String::as_str) == Some("anon-key")
                    && req.headers.get("Authorization").map(String::as_str) == Some("Bearer anon-key")
            })
            .times(1)
            .returning(|_, _| {
                Ok(response(
                    200,
                    &[],
                    r#"[{"id":88,"date":"2024-01-03","draw_num":2210,"numbers":"02|09|17|33|48","power_ball":5,"multiplier":2,"jackpot":12000000,"wins":0}]"#,
                ))
            });

        let source = SupabaseResultSource::new(Arc::new(http), config());
        let query = ResultQuery::page(1000, 1000).filter(Condition::DateGt(date("2024-01-02")));
        let results = source.fetch(&query).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].draw_num, 2210);
        assert_eq!(results[0].numbers.as_slice(), &["02", "09", "17", "33", "48"]);
    }

    #[tokio::test]
    async fn test_count_reads_content_range() {
        let mut http = MockHttpClient::new();
        http.expect_execute_with_retry()
            .withf(|req, _| {
                req.method == HttpMethod::Head
                    && req.headers.get("Prefer").map(String::as_str) == Some("count=exact")
            })
            .times(1)
            .returning(|_, _| Ok(response(200, &[("content-range", "0-24/3573")], "")));

        let source = SupabaseResultSource::new(Arc::new(http), config());
        assert_eq!(source.count(&[]).await.unwrap(), 3573);
    }

    #[tokio::test]
    async fn test_count_without_range_header_fails() {
        let mut http = MockHttpClient::new();
        http.expect_execute_with_retry()
            .times(1)
            .returning(|_, _| Ok(response(200, &[], "")));

        let source = SupabaseResultSource::new(Arc::new(http), config());
        let err = source.count(&[]).await.unwrap_err();

        assert!(matches!(err, BridgeError::OperationFailed(msg) if msg.contains("Content-Range")));
    }

    #[tokio::test]
    async fn test_api_error_carries_message() {
        let mut http = MockHttpClient::new();
        http.expect_execute_with_retry()
            .times(1)
            .returning(|_, _| {
                Ok(response(
                    401,
                    &[],
                    r#"{"message":"Invalid API key","hint":"Double check your Supabase anon key"}"#,
                ))
            });

        let source = SupabaseResultSource::new(Arc::new(http), config());
        let err = source.fetch(&ResultQuery::page(0, 10)).await.unwrap_err();

        let message = err.to_string();
        assert!(message.contains("401"));
        assert!(message.contains("Invalid API key"));
    }

    #[tokio::test]
    async fn test_transport_error_passes_through() {
        let mut http = MockHttpClient::new();
        http.expect_execute_with_retry()
            .times(1)
            .returning(|_, _| Err(BridgeError::OperationFailed("connection reset".into())));

        let source = SupabaseResultSource::new(Arc::new(http), config());
        let err = source.fetch(&ResultQuery::page(0, 10)).await.unwrap_err();

        assert!(err.to_string().contains("connection reset"));
    }
}
