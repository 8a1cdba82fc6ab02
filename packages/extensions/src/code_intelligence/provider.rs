//! Highlight providers detect the language of a code sample.
//!
//! A provider is injected into the code intelligence extension, either
//! directly or through an async loader that runs at most once per extension
//! instance. Without either, [`KeywordProvider`] is used.

use futures::future::{BoxFuture, FutureExt};
use futures::lock::Mutex;
use std::sync::Arc;

pub trait HighlightProvider: Send + Sync {
    /// Best language for `source` among `subset`, if any is likely
    fn detect<'a>(&'a self, source: &'a str, subset: &'a [String]) -> BoxFuture<'a, Option<String>>;
}

pub type ProviderLoader =
    Arc<dyn Fn() -> BoxFuture<'static, Option<Arc<dyn HighlightProvider>>> + Send + Sync>;

/// Signature tokens per language. A sample scores one point per token it
/// contains.
const SIGNATURES: &[(&str, &[&str])] = &[
    ("rust", &["fn ", "let mut ", "impl ", "pub fn", "::", "-> ", "&self", "match ", "use std"]),
    ("python", &["def ", "import ", "self.", "elif ", "print(", "None", "lambda ", "__init__"]),
    ("typescript", &["interface ", ": string", ": number", ": boolean", "readonly ", "as const", "export type"]),
    ("javascript", &["function ", "const ", "=> ", "console.", "require(", "var ", "document."]),
    ("go", &["func ", "package ", ":= ", "fmt.", "import (", "go func"]),
    ("java", &["public class", "System.out", "private ", "public static void", "import java"]),
    ("cpp", &["#include", "std::", "cout", "template<", "namespace "]),
    ("c", &["#include", "printf(", "int main", "malloc(", "->"]),
    ("sql", &["SELECT ", "FROM ", "WHERE ", "INSERT INTO", "CREATE TABLE", "JOIN "]),
    ("bash", &["#!/bin/", "echo ", "$(", "fi\n", "then\n", "sudo ", "export "]),
    ("html", &["<!DOCTYPE", "<html", "<div", "</", "class=\""]),
    ("css", &["px;", "color:", "margin:", "padding:", "@media", "display:"]),
    ("json", &["\": ", "{\n  \"", "[\n"]),
    ("yaml", &["---\n", ":\n  ", "- name:"]),
    ("markdown", &["# ", "## ", "](", "**", "- [ ]"]),
];

/// Minimum score for a confident guess
const MIN_SCORE: usize = 2;

/// Scores a sample against per-language signature tokens. Ties go to the
/// language listed first.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordProvider;

impl KeywordProvider {
    pub fn detect_sync(&self, source: &str, subset: &[String]) -> Option<String> {
        let mut best: Option<(&str, usize)> = None;
        for (language, tokens) in SIGNATURES {
            if !subset.is_empty() && !subset.iter().any(|allowed| allowed == language) {
                continue;
            }
            let score = tokens.iter().filter(|token| source.contains(*token)).count();
            if score >= MIN_SCORE && best.map_or(true, |(_, top)| score > top) {
                best = Some((language, score));
            }
        }
        best.map(|(language, _)| language.to_string())
    }
}

impl HighlightProvider for KeywordProvider {
    fn detect<'a>(&'a self, source: &'a str, subset: &'a [String]) -> BoxFuture<'a, Option<String>> {
        futures::future::ready(self.detect_sync(source, subset)).boxed()
    }
}

enum Source {
    Explicit(Arc<dyn HighlightProvider>),
    Loader(ProviderLoader),
    Default,
}

/// Resolves the provider once and keeps it for the owning extension
pub struct ProviderCache {
    source: Source,
    resolved: Mutex<Option<Option<Arc<dyn HighlightProvider>>>>,
}

impl ProviderCache {
    pub fn explicit(provider: Arc<dyn HighlightProvider>) -> Self {
        Self::with_source(Source::Explicit(provider))
    }

    pub fn loader(loader: ProviderLoader) -> Self {
        Self::with_source(Source::Loader(loader))
    }

    pub fn keyword() -> Self {
        Self::with_source(Source::Default)
    }

    fn with_source(source: Source) -> Self {
        Self {
            source,
            resolved: Mutex::new(None),
        }
    }

    /// The provider, loading it on first use. A loader that yields nothing
    /// is not retried.
    pub async fn get(&self) -> Option<Arc<dyn HighlightProvider>> {
        let mut resolved = self.resolved.lock().await;
        if let Some(provider) = resolved.as_ref() {
            return provider.clone();
        }
        let provider = match &self.source {
            Source::Explicit(provider) => Some(Arc::clone(provider)),
            Source::Loader(loader) => {
                let provider = loader().await;
                if provider.is_none() {
                    tracing::warn!("highlight provider loader returned nothing, language detection disabled");
                }
                provider
            }
            Source::Default => Some(Arc::new(KeywordProvider) as Arc<dyn HighlightProvider>),
        };
        *resolved = Some(provider.clone());
        provider
    }

    /// Detect with the resolved provider. Blank samples are never sent.
    pub async fn detect(&self, source: &str, subset: &[String]) -> Option<String> {
        if source.trim().is_empty() {
            return None;
        }
        let provider = self.get().await?;
        provider.detect(source, subset).await
    }
}

impl std::fmt::Debug for ProviderCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match self.source {
            Source::Explicit(_) => "explicit",
            Source::Loader(_) => "loader",
            Source::Default => "keyword",
        };
        f.debug_struct("ProviderCache").field("source", &source).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_keyword_scoring() {
        let provider = KeywordProvider;
        let rust = "fn main() {\n    let mut x = 1;\n}";
        assert_eq!(provider.detect_sync(rust, &[]), Some("rust".to_string()));

        let python = "def greet(name):\n    print(name)";
        assert_eq!(provider.detect_sync(python, &[]), Some("python".to_string()));

        assert_eq!(provider.detect_sync("hello there", &[]), None);
    }

    #[test]
    fn test_subset_limits_candidates() {
        let rust = "fn main() {\n    let mut x = 1;\n}";
        assert_eq!(KeywordProvider.detect_sync(rust, &["python".to_string()]), None);
    }

    #[tokio::test]
    async fn test_loader_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache = ProviderCache::loader(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Some(Arc::new(KeywordProvider) as Arc<dyn HighlightProvider>) }.boxed()
        }));

        let sample = "def f():\n    print(1)";
        assert_eq!(cache.detect(sample, &[]).await, Some("python".to_string()));
        assert_eq!(cache.detect(sample, &[]).await, Some("python".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_loader_disables_detection() {
        let cache = ProviderCache::loader(Arc::new(|| async { None }.boxed()));
        assert_eq!(cache.detect("fn main() { let mut x = 1; }", &[]).await, None);
    }
}
