use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;

use crate::api_key::{ApiKeyProvider, StaticApiKey};
use crate::http_client::{HttpClient, HttpRequest, HttpResponse, NoopHttpClient};
use crate::source::{FetchError, QuoteSource};
use crate::{CalendarDate, HistoryPoint, HistorySeries, QuoteRecord, Symbol, UtcDateTime};

const BASE_URL: &str = "https://www.alphavantage.co/query";
const REQUEST_TIMEOUT_MS: u64 = 5_000;

/// Alpha Vantage adapter supporting both real API calls and mock mode.
///
/// The adapter issues one outbound call per operation and classifies the
/// response; it never touches the cache or the call budget. With a mock
/// transport it answers deterministic seeded data for offline tests.
#[derive(Clone)]
pub struct AlphaVantageSource {
    http_client: Arc<dyn HttpClient>,
    api_key: Arc<dyn ApiKeyProvider>,
    timeout_ms: u64,
    use_real_api: bool,
}

impl Default for AlphaVantageSource {
    fn default() -> Self {
        Self {
            http_client: Arc::new(NoopHttpClient),
            api_key: Arc::new(StaticApiKey::from_env()),
            timeout_ms: REQUEST_TIMEOUT_MS,
            use_real_api: false,
        }
    }
}

impl AlphaVantageSource {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: Arc<dyn ApiKeyProvider>) -> Self {
        let use_real_api = !http_client.is_mock();
        Self {
            http_client,
            api_key,
            timeout_ms: REQUEST_TIMEOUT_MS,
            use_real_api,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    fn endpoint(&self, function: &str, symbol: &Symbol) -> String {
        format!(
            "{BASE_URL}?function={function}&symbol={}&apikey={}",
            urlencoding::encode(symbol.as_str()),
            self.api_key.api_key()
        )
    }

    async fn execute(&self, url: String) -> Result<HttpResponse, FetchError> {
        let request = HttpRequest::get(url).with_timeout_ms(self.timeout_ms);
        let response = self.http_client.execute(request).await.map_err(|error| {
            if error.is_timeout() {
                FetchError::timeout(format!("alphavantage timed out: {}", error.message()))
            } else {
                FetchError::upstream(format!(
                    "alphavantage transport error: {}",
                    error.message()
                ))
            }
        })?;

        if !response.is_success() {
            return Err(FetchError::upstream(format!(
                "alphavantage returned status {}",
                response.status
            )));
        }

        Ok(response)
    }

    async fn fetch_real_quote(&self, symbol: &Symbol) -> Result<QuoteRecord, FetchError> {
        let response = self.execute(self.endpoint("GLOBAL_QUOTE", symbol)).await?;
        let envelope = classify_envelope(&response.body)?;

        let payload: GlobalQuoteResponse = serde_json::from_value(envelope)
            .map_err(|e| FetchError::malformed(format!("unexpected quote envelope: {e}")))?;

        let Some(quote) = payload.quote.filter(|q| !q.price.is_empty()) else {
            return Err(FetchError::not_found(format!(
                "no quote data for '{symbol}' in alphavantage response"
            )));
        };

        let price = parse_decimal("05. price", &quote.price)?;
        let change_percent = parse_percent("10. change percent", &quote.change_percent)?;
        let volume = parse_integer("06. volume", &quote.volume)?;

        QuoteRecord::new(
            symbol.clone(),
            price,
            change_percent,
            volume,
            UtcDateTime::now(),
            true,
        )
        .map_err(|e| FetchError::malformed(e.to_string()))
    }

    async fn fetch_real_history(
        &self,
        symbol: &Symbol,
        window: usize,
    ) -> Result<HistorySeries, FetchError> {
        let response = self
            .execute(self.endpoint("TIME_SERIES_DAILY", symbol))
            .await?;
        let envelope = classify_envelope(&response.body)?;

        let payload: TimeSeriesDailyResponse = serde_json::from_value(envelope)
            .map_err(|e| FetchError::malformed(format!("unexpected series envelope: {e}")))?;

        let Some(series) = payload.series.filter(|s| !s.is_empty()) else {
            return Err(FetchError::not_found(format!(
                "no daily series for '{symbol}' in alphavantage response"
            )));
        };

        // BTreeMap keys are YYYY-MM-DD, so iteration order is already
        // chronological; keep only the trailing window.
        let skip = series.len().saturating_sub(window);
        let mut points = Vec::with_capacity(series.len().min(window));
        for (date_str, bar) in series.into_iter().skip(skip) {
            let date = CalendarDate::parse(&date_str)
                .map_err(|e| FetchError::malformed(e.to_string()))?;
            let close = parse_decimal("4. close", &bar.close)?;
            let volume = parse_integer("5. volume", &bar.volume)?;
            let point = HistoryPoint::new(date, close, volume)
                .map_err(|e| FetchError::malformed(e.to_string()))?;
            points.push(point);
        }

        HistorySeries::new(symbol.clone(), points, UtcDateTime::now(), true)
            .map_err(|e| FetchError::malformed(e.to_string()))
    }
}

// Mock data methods for deterministic offline runs.
impl AlphaVantageSource {
    async fn fetch_mock_quote(&self, symbol: &Symbol) -> Result<QuoteRecord, FetchError> {
        self.execute(self.endpoint("GLOBAL_QUOTE", symbol)).await?;

        let seed = symbol_seed(symbol);
        let price = 91.0 + (seed % 520) as f64 / 10.0;
        let change_percent = ((seed % 400) as f64 - 200.0) / 100.0;
        let volume = 30_000 + seed % 12_000;

        QuoteRecord::new(
            symbol.clone(),
            price,
            change_percent,
            volume,
            UtcDateTime::now(),
            true,
        )
        .map_err(|e| FetchError::malformed(e.to_string()))
    }

    async fn fetch_mock_history(
        &self,
        symbol: &Symbol,
        window: usize,
    ) -> Result<HistorySeries, FetchError> {
        self.execute(self.endpoint("TIME_SERIES_DAILY", symbol))
            .await?;

        let seed = symbol_seed(symbol);
        let now = UtcDateTime::now();
        let today = now.calendar_date();
        let mut points = Vec::with_capacity(window);

        for index in 0..window {
            let offset = (window - 1 - index) as u16;
            let date = today.minus_days(offset);
            let close = 88.0 + ((seed + index as u64 * 5) % 500) as f64 / 10.0;
            let volume = 18_000 + (index as u64) * 20;
            let point = HistoryPoint::new(date, close, volume)
                .map_err(|e| FetchError::malformed(e.to_string()))?;
            points.push(point);
        }

        HistorySeries::new(symbol.clone(), points, now, true)
            .map_err(|e| FetchError::malformed(e.to_string()))
    }
}

impl QuoteSource for AlphaVantageSource {
    fn id(&self) -> &'static str {
        "alphavantage"
    }

    fn fetch_quote<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> Pin<Box<dyn Future<Output = Result<QuoteRecord, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            if self.use_real_api {
                self.fetch_real_quote(symbol).await
            } else {
                self.fetch_mock_quote(symbol).await
            }
        })
    }

    fn fetch_history<'a>(
        &'a self,
        symbol: &'a Symbol,
        window: usize,
    ) -> Pin<Box<dyn Future<Output = Result<HistorySeries, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            if self.use_real_api {
                self.fetch_real_history(symbol, window).await
            } else {
                self.fetch_mock_history(symbol, window).await
            }
        })
    }
}

/// Parse the body and reject rate-limit notices before typed decoding.
///
/// Alpha Vantage reports free-tier exhaustion as a 200 response whose body
/// carries a `Note` or `Information` field instead of data.
fn classify_envelope(body: &str) -> Result<serde_json::Value, FetchError> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| FetchError::malformed(format!("alphavantage sent invalid JSON: {e}")))?;

    if let Some(object) = value.as_object() {
        for key in ["Note", "Information"] {
            if let Some(notice) = object.get(key).and_then(serde_json::Value::as_str) {
                return Err(FetchError::rate_limited(format!(
                    "alphavantage rate limit notice: {notice}"
                )));
            }
        }
    }

    Ok(value)
}

fn parse_decimal(field: &'static str, raw: &str) -> Result<f64, FetchError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| FetchError::malformed(format!("field '{field}' is not a decimal: '{raw}'")))
}

fn parse_percent(field: &'static str, raw: &str) -> Result<f64, FetchError> {
    let trimmed = raw.trim().trim_end_matches('%');
    trimmed.parse::<f64>().map_err(|_| {
        FetchError::malformed(format!("field '{field}' is not a percentage: '{raw}'"))
    })
}

fn parse_integer(field: &'static str, raw: &str) -> Result<u64, FetchError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| FetchError::malformed(format!("field '{field}' is not an integer: '{raw}'")))
}

fn symbol_seed(symbol: &Symbol) -> u64 {
    symbol.as_str().bytes().fold(11_u64, |acc, byte| {
        acc.wrapping_mul(31).wrapping_add(byte as u64)
    })
}

// Alpha Vantage wire structures. Numeric fields arrive as strings.
#[derive(Debug, Clone, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote", default)]
    quote: Option<GlobalQuotePayload>,
}

#[derive(Debug, Clone, Deserialize)]
struct GlobalQuotePayload {
    #[serde(rename = "05. price", default)]
    price: String,
    #[serde(rename = "10. change percent", default)]
    change_percent: String,
    #[serde(rename = "06. volume", default)]
    volume: String,
}

#[derive(Debug, Clone, Deserialize)]
struct TimeSeriesDailyResponse {
    #[serde(rename = "Time Series (Daily)", default)]
    series: Option<BTreeMap<String, DailyBarPayload>>,
}

#[derive(Debug, Clone, Deserialize)]
struct DailyBarPayload {
    #[serde(rename = "4. close", default)]
    close: String,
    #[serde(rename = "5. volume", default)]
    volume: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::HttpError;
    use crate::source::FetchErrorKind;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct ScriptedHttpClient {
        response: Result<HttpResponse, HttpError>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedHttpClient {
        fn with_body(body: &str) -> Self {
            Self {
                response: Ok(HttpResponse::ok_json(body)),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn failing(error: HttpError) -> Self {
            Self {
                response: Err(error),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn recorded_urls(&self) -> Vec<String> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .iter()
                .map(|request| request.url.clone())
                .collect()
        }
    }

    impl HttpClient for ScriptedHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .push(request);
            let response = self.response.clone();
            Box::pin(async move { response })
        }
    }

    fn adapter_with(client: Arc<ScriptedHttpClient>) -> AlphaVantageSource {
        AlphaVantageSource::new(client, Arc::new(StaticApiKey::new("alpha-key")))
    }

    const VALID_QUOTE_BODY: &str = r#"{
        "Global Quote": {
            "01. symbol": "AAPL",
            "05. price": "178.7200",
            "06. volume": "48120394",
            "10. change percent": "1.2345%"
        }
    }"#;

    #[tokio::test]
    async fn quote_request_targets_global_quote_with_api_key() {
        let client = Arc::new(ScriptedHttpClient::with_body(VALID_QUOTE_BODY));
        let adapter = adapter_with(client.clone());
        let symbol = Symbol::parse("AAPL").expect("valid symbol");

        adapter.fetch_quote(&symbol).await.expect("quote fetch");

        let urls = client.recorded_urls();
        assert_eq!(urls.len(), 1);
        assert!(urls[0].contains("function=GLOBAL_QUOTE"));
        assert!(urls[0].contains("symbol=AAPL"));
        assert!(urls[0].contains("apikey=alpha-key"));
    }

    #[tokio::test]
    async fn valid_quote_body_parses_string_fields() {
        let client = Arc::new(ScriptedHttpClient::with_body(VALID_QUOTE_BODY));
        let adapter = adapter_with(client);
        let symbol = Symbol::parse("AAPL").expect("valid symbol");

        let record = adapter.fetch_quote(&symbol).await.expect("quote fetch");
        assert_eq!(record.price, 178.72);
        assert_eq!(record.change_percent, 1.2345);
        assert_eq!(record.volume, 48_120_394);
        assert!(record.is_real);
    }

    #[tokio::test]
    async fn rate_limit_notice_maps_to_rate_limited() {
        let body = r#"{"Note": "Thank you for using Alpha Vantage! Our standard API rate limit is 25 requests per day."}"#;
        let client = Arc::new(ScriptedHttpClient::with_body(body));
        let adapter = adapter_with(client);
        let symbol = Symbol::parse("AAPL").expect("valid symbol");

        let error = adapter.fetch_quote(&symbol).await.expect_err("must fail");
        assert_eq!(error.kind(), FetchErrorKind::RateLimited);
    }

    #[tokio::test]
    async fn empty_payload_maps_to_not_found() {
        let client = Arc::new(ScriptedHttpClient::with_body(r#"{"Global Quote": {}}"#));
        let adapter = adapter_with(client);
        let symbol = Symbol::parse("ZZZZ").expect("valid symbol");

        let error = adapter.fetch_quote(&symbol).await.expect_err("must fail");
        assert_eq!(error.kind(), FetchErrorKind::NotFound);
    }

    #[tokio::test]
    async fn garbage_price_maps_to_malformed() {
        let body = r#"{"Global Quote": {"05. price": "n/a", "06. volume": "1", "10. change percent": "0%"}}"#;
        let client = Arc::new(ScriptedHttpClient::with_body(body));
        let adapter = adapter_with(client);
        let symbol = Symbol::parse("AAPL").expect("valid symbol");

        let error = adapter.fetch_quote(&symbol).await.expect_err("must fail");
        assert_eq!(error.kind(), FetchErrorKind::Malformed);
    }

    #[tokio::test]
    async fn transport_timeout_maps_to_timeout() {
        let client = Arc::new(ScriptedHttpClient::failing(HttpError::timeout(
            "deadline exceeded",
        )));
        let adapter = adapter_with(client);
        let symbol = Symbol::parse("TSLA").expect("valid symbol");

        let error = adapter.fetch_quote(&symbol).await.expect_err("must fail");
        assert_eq!(error.kind(), FetchErrorKind::Timeout);
    }

    #[tokio::test]
    async fn history_is_truncated_and_ascending() {
        let body = r#"{
            "Time Series (Daily)": {
                "2026-03-02": {"4. close": "171.10", "5. volume": "1000"},
                "2026-02-27": {"4. close": "170.30", "5. volume": "1100"},
                "2026-02-26": {"4. close": "169.90", "5. volume": "1200"},
                "2026-02-25": {"4. close": "168.40", "5. volume": "1300"}
            }
        }"#;
        let client = Arc::new(ScriptedHttpClient::with_body(body));
        let adapter = adapter_with(client);
        let symbol = Symbol::parse("AAPL").expect("valid symbol");

        let series = adapter
            .fetch_history(&symbol, 3)
            .await
            .expect("history fetch");

        assert_eq!(series.len(), 3);
        assert_eq!(series.points[0].date.format_calendar(), "2026-02-26");
        assert_eq!(series.points[2].date.format_calendar(), "2026-03-02");
        assert_eq!(series.points[2].close, 171.10);
        assert!(series.is_real);
    }

    #[tokio::test]
    async fn mock_mode_answers_full_windows_offline() {
        let adapter = AlphaVantageSource::default();
        let symbol = Symbol::parse("MSFT").expect("valid symbol");

        let series = adapter
            .fetch_history(&symbol, 30)
            .await
            .expect("mock history");

        assert_eq!(series.len(), 30);
        for pair in series.points.windows(2) {
            assert_eq!(pair[0].date.next_day(), pair[1].date);
        }
    }
}
