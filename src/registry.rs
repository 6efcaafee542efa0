//! Hostname → spider routing table.
//!
//! Built once before the crawl starts and shared read-only afterwards. Keys
//! are ASCII-lowercased hostnames without port, matching how `url::Url`
//! reports hosts, so `Example.com` and `example.com:8080` route to the same
//! spider. Subdomains are distinct keys.
//!
//! Registering a host twice is resolved at startup: [`SpiderRegistry::register`]
//! keeps the last spider (and logs the overwrite), [`SpiderRegistry::try_register`]
//! refuses with [`SpiderError::RegistrationConflict`].

use crate::error::SpiderError;
use crate::spider::{ScrapedItem, Spider};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Shared spider handle stored in the registry.
pub type SharedSpider<I> = Arc<dyn Spider<Item = I>>;

pub struct SpiderRegistry<I: ScrapedItem> {
    spiders: HashMap<String, SharedSpider<I>>,
}

impl<I: ScrapedItem> SpiderRegistry<I> {
    pub fn new() -> Self {
        Self {
            spiders: HashMap::new(),
        }
    }

    /// Binds `host` to `spider`, replacing and returning any previous binding.
    pub fn register<S>(&mut self, host: &str, spider: S) -> Option<SharedSpider<I>>
    where
        S: Spider<Item = I>,
    {
        self.register_shared(host, Arc::new(spider))
    }

    pub fn register_shared(
        &mut self,
        host: &str,
        spider: SharedSpider<I>,
    ) -> Option<SharedSpider<I>> {
        let key = normalize_host(host);
        debug!("Registering spider '{}' for host '{}'", spider.name(), key);
        let previous = self.spiders.insert(key.clone(), spider);
        if let Some(old) = &previous {
            warn!(
                "Spider '{}' for host '{}' replaced by a later registration",
                old.name(),
                key
            );
        }
        previous
    }

    /// Binds `host` to `spider` unless the host is already claimed.
    pub fn try_register<S>(&mut self, host: &str, spider: S) -> Result<(), SpiderError>
    where
        S: Spider<Item = I>,
    {
        let key = normalize_host(host);
        if self.spiders.contains_key(&key) {
            return Err(SpiderError::RegistrationConflict { host: key });
        }
        self.register(&key, spider);
        Ok(())
    }

    /// Looks up the spider for `host`.
    pub fn get(&self, host: &str) -> Option<&SharedSpider<I>> {
        self.spiders.get(&normalize_host(host))
    }

    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.spiders.keys().map(String::as_str)
    }

    pub fn spiders(&self) -> impl Iterator<Item = &SharedSpider<I>> {
        self.spiders.values()
    }

    pub fn len(&self) -> usize {
        self.spiders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spiders.is_empty()
    }
}

impl<I: ScrapedItem> Default for SpiderRegistry<I> {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('.');
    let host = match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') && port.chars().all(|c| c.is_ascii_digit()) => {
            name
        }
        _ => host,
    };
    host.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::Response;
    use crate::spider::ItemEmitter;
    use async_trait::async_trait;

    struct Named(&'static str);

    #[async_trait]
    impl Spider for Named {
        type Item = String;

        fn name(&self) -> &str {
            self.0
        }

        async fn parse(
            &self,
            _response: Response,
            _output: &ItemEmitter<String>,
        ) -> Result<(), SpiderError> {
            Ok(())
        }
    }

    #[test]
    fn lookup_is_case_and_port_insensitive() {
        let mut registry = SpiderRegistry::new();
        registry.register("Example.TEST", Named("a"));
        assert_eq!(registry.get("example.test").unwrap().name(), "a");
        assert_eq!(registry.get("example.test:8080").unwrap().name(), "a");
        assert!(registry.get("www.example.test").is_none());
    }

    #[test]
    fn last_registration_wins() {
        let mut registry = SpiderRegistry::new();
        assert!(registry.register("example.test", Named("first")).is_none());
        let previous = registry.register("example.test", Named("second"));
        assert_eq!(previous.unwrap().name(), "first");
        assert_eq!(registry.get("example.test").unwrap().name(), "second");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn strict_registration_rejects_duplicates() {
        let mut registry = SpiderRegistry::new();
        registry.try_register("example.test", Named("first")).unwrap();
        let err = registry
            .try_register("EXAMPLE.test", Named("second"))
            .unwrap_err();
        assert!(matches!(
            err,
            SpiderError::RegistrationConflict { ref host } if host == "example.test"
        ));
        assert_eq!(registry.get("example.test").unwrap().name(), "first");
    }
}
