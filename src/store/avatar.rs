//! Asynchronous avatar lookup for chat participants

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::{self, BoxFuture, FutureExt};
use reqwest::Client;
use tracing::debug;

/// Resolves a username to an avatar reference. Lookups run off the
/// simulation thread; a missing avatar is never an error.
pub trait AvatarResolver: Send + Sync {
    fn resolve(&self, username: &str) -> BoxFuture<'static, Option<String>>;
}

/// Resolver used when no avatar source is configured
pub struct NoAvatars;

impl AvatarResolver for NoAvatars {
    fn resolve(&self, _username: &str) -> BoxFuture<'static, Option<String>> {
        future::ready(None).boxed()
    }
}

/// Builds avatar URLs from a template containing `{username}` and keeps
/// only those that answer a HEAD request
#[derive(Clone)]
pub struct TemplateAvatarResolver {
    client: Client,
    template: String,
    cache: Arc<DashMap<String, Option<String>>>,
}

impl TemplateAvatarResolver {
    pub fn new(template: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(3))
            .build()
            .unwrap_or_default();
        Self {
            client,
            template: template.into(),
            cache: Arc::default(),
        }
    }

    pub fn url_for(&self, username: &str) -> String {
        self.template.replace("{username}", username)
    }
}

impl AvatarResolver for TemplateAvatarResolver {
    fn resolve(&self, username: &str) -> BoxFuture<'static, Option<String>> {
        if let Some(hit) = self.cache.get(username) {
            return future::ready(hit.value().clone()).boxed();
        }

        let url = self.url_for(username);
        let username = username.to_string();
        let client = self.client.clone();
        let cache = self.cache.clone();

        async move {
            let avatar = match client.head(&url).send().await {
                Ok(resp) if resp.status().is_success() => Some(url),
                Ok(resp) => {
                    debug!(username = %username, status = %resp.status(), "No avatar");
                    None
                }
                Err(e) => {
                    debug!(username = %username, error = %e, "Avatar lookup failed");
                    None
                }
            };
            cache.insert(username, avatar.clone());
            avatar
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_avatars_resolves_to_none() {
        assert_eq!(NoAvatars.resolve("anyone").await, None);
    }

    #[tokio::test]
    async fn cached_lookups_skip_the_network() {
        let resolver = TemplateAvatarResolver::new("https://cdn.example/{username}.png");
        assert_eq!(resolver.url_for("noor"), "https://cdn.example/noor.png");

        resolver
            .cache
            .insert("noor".into(), Some("https://cdn.example/noor.png".into()));
        resolver.cache.insert("ghost".into(), None);

        assert_eq!(
            resolver.resolve("noor").await.as_deref(),
            Some("https://cdn.example/noor.png")
        );
        assert_eq!(resolver.resolve("ghost").await, None);
    }
}
