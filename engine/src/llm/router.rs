//! Fallback Router
//!
//! Tries an ordered list of providers for one operation until one succeeds.
//! The order is the configured priority; there is no ranking, no retry and no
//! backoff. Each attempt may be bounded by a timeout, which counts as a
//! transport failure and advances the list.

use super::{Provider, ProviderError};
use std::sync::Arc;
use std::time::Duration;

/// A successful call and where it came from
#[derive(Debug, Clone)]
pub struct Routed<T> {
    pub output: T,

    /// Name of the provider that produced `output`
    pub provider: String,

    /// Number of providers invoked, including the successful one
    pub attempts: usize,
}

/// Ordered provider list for one operation
pub struct FallbackRouter<Req, Out> {
    /// Operation name used in logs and errors (e.g. "simulate")
    operation: &'static str,

    providers: Vec<Arc<dyn Provider<Req, Output = Out>>>,

    /// Per-attempt timeout
    timeout: Option<Duration>,
}

impl<Req, Out> FallbackRouter<Req, Out>
where
    Req: Sync + Send + 'static,
    Out: Send + 'static,
{
    /// Create a router
    ///
    /// # Arguments
    /// * `operation` - Operation name for logging
    /// * `providers` - Providers in trial order
    pub fn new(
        operation: &'static str,
        providers: Vec<Arc<dyn Provider<Req, Output = Out>>>,
    ) -> Self {
        Self {
            operation,
            providers,
            timeout: None,
        }
    }

    /// Bound every attempt by `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Provider names in trial order
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    /// Each provider's name and whether its credential is present
    pub fn provider_status(&self) -> Vec<(String, bool)> {
        self.providers
            .iter()
            .map(|p| (p.name().to_string(), p.is_configured()))
            .collect()
    }

    /// Call providers in order, returning the first success
    ///
    /// Every provider is invoked at most once. When all fail, the error wraps
    /// the last failure and lists the providers attempted.
    pub async fn call(&self, request: &Req) -> super::Result<Routed<Out>> {
        if self.providers.is_empty() {
            return Err(ProviderError::NoProviders(self.operation.to_string()));
        }

        let mut attempted = Vec::with_capacity(self.providers.len());
        let mut last_error = None;

        for provider in &self.providers {
            let name = provider.name().to_string();
            tracing::debug!(operation = self.operation, provider = %name, "Attempting provider");
            attempted.push(name.clone());

            let result = match self.timeout {
                Some(limit) => match tokio::time::timeout(limit, provider.invoke(request)).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Transport(format!(
                        "timed out after {}s",
                        limit.as_secs_f32()
                    ))),
                },
                None => provider.invoke(request).await,
            };

            match result {
                Ok(output) => {
                    tracing::info!(
                        operation = self.operation,
                        provider = %name,
                        attempts = attempted.len(),
                        "Provider succeeded"
                    );
                    return Ok(Routed {
                        output,
                        provider: name,
                        attempts: attempted.len(),
                    });
                }
                Err(e) if e.is_configuration() => {
                    tracing::debug!(operation = self.operation, provider = %name, "Skipped: {}", e);
                    last_error = Some(e);
                }
                Err(e) => {
                    tracing::warn!(operation = self.operation, provider = %name, "Provider failed: {}", e);
                    last_error = Some(e);
                }
            }
        }

        tracing::error!(operation = self.operation, "All providers exhausted");
        let last = last_error
            .unwrap_or_else(|| ProviderError::NoProviders(self.operation.to_string()));
        Err(ProviderError::AllProvidersFailed {
            operation: self.operation.to_string(),
            attempted,
            last: Box::new(last),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Scripted provider that records every invocation in a shared log
    struct ScriptedProvider {
        name: String,
        outcome: fn() -> super::super::Result<String>,
        delay: Option<Duration>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedProvider {
        fn new(
            name: &str,
            outcome: fn() -> super::super::Result<String>,
            log: &Arc<Mutex<Vec<String>>>,
        ) -> Self {
            Self {
                name: name.to_string(),
                outcome,
                delay: None,
                log: Arc::clone(log),
            }
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }
    }

    #[async_trait]
    impl Provider<String> for ScriptedProvider {
        type Output = String;

        fn name(&self) -> &str {
            &self.name
        }

        async fn invoke(&self, _request: &String) -> super::super::Result<String> {
            self.log.lock().unwrap().push(self.name.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            (self.outcome)()
        }
    }

    fn ok() -> super::super::Result<String> {
        Ok("answer".to_string())
    }

    fn upstream() -> super::super::Result<String> {
        Err(ProviderError::Upstream {
            status: 500,
            message: "boom".to_string(),
        })
    }

    fn transport() -> super::super::Result<String> {
        Err(ProviderError::Transport("connection reset".to_string()))
    }

    fn unconfigured() -> super::super::Result<String> {
        Err(ProviderError::Configuration("missing key".to_string()))
    }

    fn router(
        providers: Vec<ScriptedProvider>,
    ) -> FallbackRouter<String, String> {
        let providers = providers
            .into_iter()
            .map(|p| Arc::new(p) as Arc<dyn Provider<String, Output = String>>)
            .collect();
        FallbackRouter::new("test", providers)
    }

    #[tokio::test]
    async fn test_falls_through_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let router = router(vec![
            ScriptedProvider::new("a", upstream, &log),
            ScriptedProvider::new("b", transport, &log),
            ScriptedProvider::new("c", ok, &log),
        ]);

        let routed = router.call(&"prompt".to_string()).await.unwrap();
        assert_eq!(routed.output, "answer");
        assert_eq!(routed.provider, "c");
        assert_eq!(routed.attempts, 3);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_first_success_stops() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let router = router(vec![
            ScriptedProvider::new("a", ok, &log),
            ScriptedProvider::new("b", ok, &log),
        ]);

        let routed = router.call(&"prompt".to_string()).await.unwrap();
        assert_eq!(routed.provider, "a");
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_exhaustion_wraps_last_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let router = router(vec![
            ScriptedProvider::new("a", unconfigured, &log),
            ScriptedProvider::new("b", upstream, &log),
            ScriptedProvider::new("c", transport, &log),
        ]);

        match router.call(&"prompt".to_string()).await {
            Err(ProviderError::AllProvidersFailed {
                operation,
                attempted,
                last,
            }) => {
                assert_eq!(operation, "test");
                assert_eq!(attempted, vec!["a", "b", "c"]);
                assert!(matches!(*last, ProviderError::Transport(_)));
            }
            other => panic!("Expected AllProvidersFailed, got {:?}", other.map(|r| r.output)),
        }
        assert_eq!(log.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_list() {
        let router = router(vec![]);
        assert!(matches!(
            router.call(&"prompt".to_string()).await,
            Err(ProviderError::NoProviders(_))
        ));
    }

    #[tokio::test]
    async fn test_timeout_advances_to_next_provider() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let router = router(vec![
            ScriptedProvider::new("slow", ok, &log).slow(Duration::from_secs(5)),
            ScriptedProvider::new("fast", ok, &log),
        ])
        .with_timeout(Some(Duration::from_millis(50)));

        let routed = router.call(&"prompt".to_string()).await.unwrap();
        assert_eq!(routed.provider, "fast");
        assert_eq!(routed.attempts, 2);
    }

    #[test]
    fn test_provider_names_keep_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let router = router(vec![
            ScriptedProvider::new("gemini", ok, &log),
            ScriptedProvider::new("openai", ok, &log),
        ]);
        assert_eq!(router.provider_names(), vec!["gemini", "openai"]);
        assert_eq!(router.operation(), "test");
    }
}
