//! The request builder: queue features, then resolve them in one call.

use serde_json::Value;
use std::{
    future::Future,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use crate::{
    Config, Error, Outcome,
    cache::{DEFAULT_SWEEP_SECS, DEFAULT_TTL_SECS, ResponseCache, TtlCache},
    feature::Feature,
    limiter::{GovernorLimiter, IntervalUnit, TokenLimiter},
    queue::FeatureQueue,
    request::{DEFAULT_BASE_URL, ResolvedRequest},
    transport::{HttpTransport, Transport, TransportResponse, truncate_body},
};

/// Settings owned by one orchestrator. Only changed through its setters.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub cache_ttl: Duration,
    pub cache_sweep: Duration,
    pub debug: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            cache_ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            cache_sweep: Duration::from_secs(DEFAULT_SWEEP_SECS),
            debug: false,
        }
    }
}

/// Stateful Weather Underground request builder.
///
/// Feature methods queue path segments; [`Wundergrounded::request`] turns the
/// queue plus a query into exactly one network call, consulting the cache
/// first and the rate limiter second when those are enabled.
///
/// ```no_run
/// # async fn demo() -> Result<(), wunderground_core::Error> {
/// use wunderground_core::{IntervalUnit, Wundergrounded};
///
/// let mut wu = Wundergrounded::new();
/// wu.api_key("KEY").cache(300, 30).limit(10, IntervalUnit::Minute);
///
/// let body = wu.conditions().forecast().request("94107").await?;
/// println!("{body}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Wundergrounded {
    config: OrchestratorConfig,
    queue: Mutex<FeatureQueue>,
    transport: Arc<dyn Transport>,
    cache: Option<Arc<dyn ResponseCache>>,
    limiter: Option<Arc<dyn TokenLimiter>>,
}

impl Default for Wundergrounded {
    fn default() -> Self {
        Self::new()
    }
}

impl Wundergrounded {
    pub fn new() -> Self {
        Self::with_transport(Arc::new(HttpTransport::new()))
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            config: OrchestratorConfig::default(),
            queue: Mutex::new(FeatureQueue::new()),
            transport,
            cache: None,
            limiter: None,
        }
    }

    /// Build from persisted configuration, enabling cache and limiter as configured.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let mut wu = Self::new();
        wu.debug(config.debug);

        if let Some(key) = config.effective_api_key() {
            wu.api_key(key);
        }
        if let Some(base) = &config.base_url {
            wu.base_url(base);
        }
        if let Some(cache) = &config.cache {
            wu.cache(cache.ttl_secs, cache.sweep_secs);
        }
        if let Some(limit) = &config.limit {
            wu.try_limit(limit.tokens, limit.interval)?;
        }

        Ok(wu)
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn api_key(&mut self, value: impl Into<String>) -> &mut Self {
        self.config.api_key = Some(value.into());
        self
    }

    pub fn base_url(&mut self, value: impl Into<String>) -> &mut Self {
        self.config.base_url = value.into();
        self
    }

    pub fn debug(&mut self, flag: bool) -> &mut Self {
        self.config.debug = flag;
        self
    }

    /// Enable the in-memory response cache. `0` selects the default for either value.
    pub fn cache(&mut self, ttl_secs: u64, sweep_secs: u64) -> &mut Self {
        let cache = TtlCache::from_secs(ttl_secs, sweep_secs);
        self.config.cache_ttl = cache.ttl();
        self.config.cache_sweep = cache.sweep_interval();
        if self.config.debug {
            tracing::debug!(
                ttl_secs = cache.ttl().as_secs(),
                sweep_secs = cache.sweep_interval().as_secs(),
                "Enabling results cache"
            );
        }
        self.cache = Some(Arc::new(cache));
        self
    }

    /// Use a caller-supplied cache; entries are stored with the configured TTL.
    pub fn with_cache(&mut self, cache: Arc<dyn ResponseCache>) -> &mut Self {
        self.cache = Some(cache);
        self
    }

    /// Enable request throttling. `0` tokens selects the default of 10.
    pub fn limit(&mut self, tokens_per_interval: u32, interval: IntervalUnit) -> &mut Self {
        // fails only when the per-token period rounds down to zero
        if let Err(err) = self.try_limit(tokens_per_interval, interval) {
            tracing::warn!(%err, "Request throttling left unchanged");
        }
        self
    }

    pub fn try_limit(
        &mut self,
        tokens_per_interval: u32,
        interval: IntervalUnit,
    ) -> Result<&mut Self, Error> {
        let limiter = GovernorLimiter::with_defaults(tokens_per_interval, interval)?;
        if self.config.debug {
            tracing::debug!(
                tokens = limiter.tokens_per_interval(),
                interval = interval.as_str(),
                "Enabling request throttling"
            );
        }
        self.limiter = Some(Arc::new(limiter));
        Ok(self)
    }

    pub fn with_limiter(&mut self, limiter: Arc<dyn TokenLimiter>) -> &mut Self {
        self.limiter = Some(limiter);
        self
    }

    /// Snapshot of the features waiting for the next request.
    pub fn queued(&self) -> Vec<String> {
        self.lock_queue().tokens().to_vec()
    }

    /// Queue any feature.
    pub fn feature(&self, feature: Feature) -> &Self {
        self.lock_queue().enqueue(feature.token());
        self
    }

    pub fn alerts(&self) -> &Self {
        self.feature(Feature::Alerts)
    }

    pub fn almanac(&self) -> &Self {
        self.feature(Feature::Almanac)
    }

    pub fn astronomy(&self) -> &Self {
        self.feature(Feature::Astronomy)
    }

    pub fn autocomplete(&self) -> &Self {
        self.feature(Feature::Autocomplete)
    }

    pub fn conditions(&self) -> &Self {
        self.feature(Feature::Conditions)
    }

    pub fn current_hurricane(&self) -> &Self {
        self.feature(Feature::CurrentHurricane)
    }

    pub fn forecast(&self) -> &Self {
        self.feature(Feature::Forecast)
    }

    pub fn forecast10day(&self) -> &Self {
        self.feature(Feature::Forecast10Day)
    }

    pub fn geolookup(&self) -> &Self {
        self.feature(Feature::Geolookup)
    }

    pub fn hourly(&self) -> &Self {
        self.feature(Feature::Hourly)
    }

    pub fn hourly7day(&self) -> &Self {
        self.feature(Feature::Hourly7Day)
    }

    pub fn hourly10day(&self) -> &Self {
        self.feature(Feature::Hourly10Day)
    }

    pub fn rawtide(&self) -> &Self {
        self.feature(Feature::RawTide)
    }

    pub fn tide(&self) -> &Self {
        self.feature(Feature::Tide)
    }

    pub fn webcams(&self) -> &Self {
        self.feature(Feature::Webcams)
    }

    pub fn yesterday(&self) -> &Self {
        self.feature(Feature::Yesterday)
    }

    /// Queue `history_YYYYMMDD`. A malformed date queues nothing.
    pub fn history(&self, date: &str) -> &Self {
        match Feature::history_from(date) {
            Ok(feature) => self.feature(feature),
            Err(err) => self.skip(err),
        }
    }

    /// Queue `planner_MMDDMMDD`. A malformed start or end queues nothing.
    pub fn planner(&self, start: &str, end: &str) -> &Self {
        match Feature::planner_from(start, end) {
            Ok(feature) => self.feature(feature),
            Err(err) => self.skip(err),
        }
    }

    pub fn try_history(&self, date: &str) -> Result<&Self, Error> {
        Ok(self.feature(Feature::history_from(date)?))
    }

    pub fn try_planner(&self, start: &str, end: &str) -> Result<&Self, Error> {
        Ok(self.feature(Feature::planner_from(start, end)?))
    }

    fn skip(&self, err: Error) -> &Self {
        if self.config.debug {
            tracing::debug!(%err, "Ignoring feature with invalid parameters");
        }
        self
    }

    /// Resolve the queued features against `query`.
    ///
    /// Preconditions are checked and the queue is drained right here, before
    /// the returned future is polled. Features queued afterwards go into the
    /// next batch, even while this one is still waiting on the limiter or the
    /// network. On a precondition failure the queue is left untouched.
    pub fn request(&self, query: &str) -> impl Future<Output = Outcome> + Send + use<> {
        let resolved = self.resolve(query);
        let transport = Arc::clone(&self.transport);
        let cache = self.cache.clone();
        let limiter = self.limiter.clone();
        let cache_ttl = self.config.cache_ttl;
        let debug = self.config.debug;

        async move {
            let url = resolved?;

            if let Some(cache) = &cache {
                if let Some(json) = cache.get(&url) {
                    if debug {
                        tracing::debug!(%url, "Returning cached response");
                    }
                    return Ok(json);
                }
            }

            if let Some(limiter) = &limiter {
                if let Err(err) = limiter.request_tokens(1).await {
                    if debug {
                        tracing::debug!(%url, %err, "Request failed");
                    }
                    return Err(Error::RateLimit(format!("{err:#}")));
                }
            }

            if debug {
                tracing::debug!(%url, "Making request to Wunderground API");
            }
            let json = match transport.get(&url).await {
                Ok(response) => classify(&url, response),
                Err(err) => Err(Error::Transport {
                    url: url.clone(),
                    status: None,
                    message: format!("{err:#}"),
                }),
            };

            match json {
                Ok(json) => {
                    if let Some(cache) = &cache {
                        if debug {
                            tracing::debug!(%url, "Caching API response");
                        }
                        cache.set(&url, json.clone(), cache_ttl);
                    }
                    if debug {
                        tracing::debug!(%url, "Returning API response");
                    }
                    Ok(json)
                }
                Err(err) => {
                    if debug {
                        tracing::debug!(%url, %err, "Request failed");
                    }
                    Err(err)
                }
            }
        }
    }

    /// Run [`request`](Self::request) on the current tokio runtime and hand the
    /// outcome to `callback`, exactly once.
    ///
    /// The queue is drained before this returns. Panics if called outside a
    /// tokio runtime.
    pub fn request_with<F>(&self, query: &str, callback: F) -> tokio::task::JoinHandle<()>
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        let pending = self.request(query);
        tokio::spawn(async move { callback(pending.await) })
    }

    /// Check preconditions, drain the queue and fix the URL.
    fn resolve(&self, query: &str) -> Result<String, Error> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::MissingQuery);
        }
        let api_key = match self.config.api_key.as_deref() {
            Some(key) if !key.is_empty() => key,
            _ => return Err(Error::MissingApiKey),
        };

        let mut queue = self.lock_queue();
        if queue.is_empty() {
            return Err(Error::EmptyQueue);
        }
        let features = queue.drain_all();
        drop(queue);

        let request = ResolvedRequest::new(features, query);
        Ok(request.url(&self.config.base_url, api_key))
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, FeatureQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn classify(url: &str, response: TransportResponse) -> Result<Value, Error> {
    if !response.is_ok() {
        return Err(Error::Transport {
            url: url.to_string(),
            status: Some(response.status),
            message: format!(
                "request failed with status {}: {}",
                response.status,
                truncate_body(&response.body)
            ),
        });
    }

    let json: Value = serde_json::from_str(&response.body).map_err(|err| Error::Transport {
        url: url.to_string(),
        status: Some(response.status),
        message: format!(
            "failed to parse response JSON ({err}): {}",
            truncate_body(&response.body)
        ),
    })?;

    match json.pointer("/response/error") {
        Some(payload) if is_error_payload(payload) => Err(Error::Provider {
            url: url.to_string(),
            payload: payload.clone(),
        }),
        _ => Ok(json),
    }
}

/// `null`, `false`, `0` and `""` in `response.error` mean "no error".
fn is_error_payload(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
