//! Exact tokenizer capability
//!
//! A model's registry entry is mapped to a `ModelFamily` descriptor, and
//! an ordered chain of `TokenizerLoader`s is tried for that family. The
//! approximate counter in `counter.rs` is the terminal fallback, so every
//! failure here is reported as an error value for the counter to absorb.

use hf_hub::{api::sync::Api, Repo, RepoType};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

use crate::context::registry::ModelInfo;
use crate::errors::{ContextError, Result};

/// Turns text into token ids
pub trait Tokenizer: Send + Sync {
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    fn count(&self, text: &str) -> Result<usize> {
        Ok(self.encode(text)?.len())
    }
}

/// Tokenizer backed by a HuggingFace `tokenizer.json`
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
}

impl HfTokenizer {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let inner = tokenizers::Tokenizer::from_file(path).map_err(|e| {
            ContextError::Tokenizer(format!("failed to load {}: {}", path.display(), e))
        })?;
        Ok(Self { inner })
    }
}

impl Tokenizer for HfTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        self.inner
            .encode(text, false)
            .map(|encoding| encoding.get_ids().to_vec())
            .map_err(|e| ContextError::Tokenizer(e.to_string()))
    }
}

/// Tokenizer family descriptor derived from a registry entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelFamily {
    /// Local `tokenizer.json` (or a model directory containing one)
    HuggingFace { tokenizer_file: PathBuf },
    /// Repository id on the HuggingFace hub
    HuggingFaceHub { repo: String },
    /// Quantized single-file weights; no standalone tokenizer
    Gguf { path: PathBuf },
    /// Declared family no built-in loader understands
    Other { model_type: String },
}

impl ModelFamily {
    /// Pick a family from the declared type, falling back to the path suffix
    pub fn from_info(info: &ModelInfo) -> Self {
        let declared = info.model_type.trim().to_lowercase();
        let path = Path::new(&info.path);

        match declared.as_str() {
            "huggingface" | "hf" | "transformers" | "safetensors" => ModelFamily::HuggingFace {
                tokenizer_file: tokenizer_file_for(path),
            },
            "hf-hub" | "hub" | "huggingface-hub" => ModelFamily::HuggingFaceHub {
                repo: info.path.clone(),
            },
            "gguf" | "ggml" | "llama.cpp" => ModelFamily::Gguf {
                path: path.to_path_buf(),
            },
            _ => Self::from_suffix(path).unwrap_or(ModelFamily::Other {
                model_type: declared,
            }),
        }
    }

    fn from_suffix(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        match extension.as_str() {
            "gguf" | "ggml" => Some(ModelFamily::Gguf {
                path: path.to_path_buf(),
            }),
            "json" => Some(ModelFamily::HuggingFace {
                tokenizer_file: path.to_path_buf(),
            }),
            _ => None,
        }
    }
}

fn tokenizer_file_for(path: &Path) -> PathBuf {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        path.to_path_buf()
    } else {
        path.join("tokenizer.json")
    }
}

/// Builds a tokenizer for one family
pub trait TokenizerLoader: Send + Sync {
    fn name(&self) -> &'static str;
    fn supports(&self, family: &ModelFamily) -> bool;
    fn load(&self, family: &ModelFamily) -> Result<Arc<dyn Tokenizer>>;
}

/// Loads a local `tokenizer.json`
pub struct LocalFileLoader;

impl TokenizerLoader for LocalFileLoader {
    fn name(&self) -> &'static str {
        "local-file"
    }

    fn supports(&self, family: &ModelFamily) -> bool {
        matches!(family, ModelFamily::HuggingFace { .. })
    }

    fn load(&self, family: &ModelFamily) -> Result<Arc<dyn Tokenizer>> {
        match family {
            ModelFamily::HuggingFace { tokenizer_file } => {
                Ok(Arc::new(HfTokenizer::from_file(tokenizer_file)?))
            }
            other => Err(ContextError::Tokenizer(format!(
                "local-file loader cannot handle {:?}",
                other
            ))),
        }
    }
}

/// Fetches `tokenizer.json` from the HuggingFace hub
pub struct HubLoader;

impl TokenizerLoader for HubLoader {
    fn name(&self) -> &'static str {
        "hf-hub"
    }

    fn supports(&self, family: &ModelFamily) -> bool {
        matches!(family, ModelFamily::HuggingFaceHub { .. })
    }

    fn load(&self, family: &ModelFamily) -> Result<Arc<dyn Tokenizer>> {
        let ModelFamily::HuggingFaceHub { repo } = family else {
            return Err(ContextError::Tokenizer(format!(
                "hf-hub loader cannot handle {:?}",
                family
            )));
        };

        let api = Api::new()
            .map_err(|e| ContextError::Tokenizer(format!("hub client: {}", e)))?;
        let tokenizer_path = api
            .repo(Repo::new(repo.clone(), RepoType::Model))
            .get("tokenizer.json")
            .map_err(|e| ContextError::Tokenizer(format!("download {}: {}", repo, e)))?;

        Ok(Arc::new(HfTokenizer::from_file(tokenizer_path)?))
    }
}

/// Default bound on a single loader attempt
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(5);

/// Ordered chain of loaders
///
/// Each load runs on a worker thread and is abandoned after `load_timeout`;
/// a stalled download keeps running detached but no longer blocks the
/// caller.
#[derive(Clone)]
pub struct TokenizerResolver {
    loaders: Vec<Arc<dyn TokenizerLoader>>,
    load_timeout: Duration,
}

impl TokenizerResolver {
    /// Resolver with no loaders; every lookup falls back to the heuristic
    pub fn empty() -> Self {
        Self {
            loaders: Vec::new(),
            load_timeout: DEFAULT_LOAD_TIMEOUT,
        }
    }

    /// Append a loader to the end of the chain
    pub fn with_loader(mut self, loader: Arc<dyn TokenizerLoader>) -> Self {
        self.loaders.push(loader);
        self
    }

    /// Bound each loader attempt
    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    pub fn load_timeout(&self) -> Duration {
        self.load_timeout
    }

    pub fn loader_names(&self) -> Vec<&'static str> {
        self.loaders.iter().map(|l| l.name()).collect()
    }

    /// Try each supporting loader in order; the first success wins
    pub fn resolve(&self, info: &ModelInfo) -> Result<Arc<dyn Tokenizer>> {
        let family = ModelFamily::from_info(info);
        let mut last_error = None;

        for loader in self.loaders.iter().filter(|l| l.supports(&family)) {
            match self.load_bounded(loader, &family) {
                Ok(tokenizer) => return Ok(tokenizer),
                Err(e) => {
                    tracing::debug!(loader = loader.name(), error = %e, "tokenizer loader failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ContextError::Tokenizer(format!("no tokenizer available for {:?}", family))
        }))
    }

    fn load_bounded(
        &self,
        loader: &Arc<dyn TokenizerLoader>,
        family: &ModelFamily,
    ) -> Result<Arc<dyn Tokenizer>> {
        let (tx, rx) = mpsc::channel();
        let worker = Arc::clone(loader);
        let worker_family = family.clone();

        thread::Builder::new()
            .name(format!("tokenizer-{}", loader.name()))
            .spawn(move || {
                let outcome = catch_unwind(AssertUnwindSafe(|| worker.load(&worker_family)));
                // receiver is gone after a timeout
                let _ = tx.send(outcome);
            })
            .map_err(|e| ContextError::Tokenizer(format!("spawn loader thread: {}", e)))?;

        match rx.recv_timeout(self.load_timeout) {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ContextError::Tokenizer(format!(
                "{} loader panicked",
                loader.name()
            ))),
            Err(RecvTimeoutError::Timeout) => Err(ContextError::Tokenizer(format!(
                "{} loader timed out after {:?}",
                loader.name(),
                self.load_timeout
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(ContextError::Tokenizer(format!(
                "{} loader exited without a result",
                loader.name()
            ))),
        }
    }
}

impl Default for TokenizerResolver {
    fn default() -> Self {
        Self::empty()
            .with_loader(Arc::new(LocalFileLoader))
            .with_loader(Arc::new(HubLoader))
    }
}

/// Memoized tokenizers keyed by model id
///
/// Failed resolutions are cached as `None` so a broken model is only
/// resolved once. Concurrent builders may both construct a tokenizer; the
/// first insert is kept and returned to everyone.
#[derive(Default)]
pub struct TokenizerCache {
    entries: RwLock<HashMap<String, Option<Arc<dyn Tokenizer>>>>,
}

impl TokenizerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outer `None` means the model has not been resolved yet
    pub fn get(&self, model_id: &str) -> Option<Option<Arc<dyn Tokenizer>>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(model_id).cloned()
    }

    /// Insert unless another caller got there first; returns the stored value
    pub fn insert(
        &self,
        model_id: &str,
        tokenizer: Option<Arc<dyn Tokenizer>>,
    ) -> Option<Arc<dyn Tokenizer>> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries
            .entry(model_id.to_string())
            .or_insert(tokenizer)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct WordTokenizer;

    impl Tokenizer for WordTokenizer {
        fn encode(&self, text: &str) -> Result<Vec<u32>> {
            Ok(text.split_whitespace().map(|_| 1).collect())
        }
    }

    struct PanickingLoader;

    impl TokenizerLoader for PanickingLoader {
        fn name(&self) -> &'static str {
            "panics"
        }

        fn supports(&self, _family: &ModelFamily) -> bool {
            true
        }

        fn load(&self, _family: &ModelFamily) -> Result<Arc<dyn Tokenizer>> {
            panic!("backend exploded")
        }
    }

    struct SlowLoader;

    impl TokenizerLoader for SlowLoader {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn supports(&self, _family: &ModelFamily) -> bool {
            true
        }

        fn load(&self, _family: &ModelFamily) -> Result<Arc<dyn Tokenizer>> {
            std::thread::sleep(Duration::from_secs(2));
            Ok(Arc::new(WordTokenizer))
        }
    }

    struct WordLoader;

    impl TokenizerLoader for WordLoader {
        fn name(&self) -> &'static str {
            "words"
        }

        fn supports(&self, family: &ModelFamily) -> bool {
            matches!(family, ModelFamily::Other { model_type } if model_type == "words")
        }

        fn load(&self, _family: &ModelFamily) -> Result<Arc<dyn Tokenizer>> {
            Ok(Arc::new(WordTokenizer))
        }
    }

    #[test]
    fn test_family_from_declared_type() {
        let info = ModelInfo::new("/models/mistral", "huggingface");
        assert_eq!(
            ModelFamily::from_info(&info),
            ModelFamily::HuggingFace {
                tokenizer_file: PathBuf::from("/models/mistral/tokenizer.json")
            }
        );

        let hub = ModelInfo::new("org/model", "hf-hub");
        assert_eq!(
            ModelFamily::from_info(&hub),
            ModelFamily::HuggingFaceHub {
                repo: "org/model".to_string()
            }
        );
    }

    #[test]
    fn test_family_from_suffix() {
        let gguf = ModelInfo::new("/models/tiny-1.1b.Q4.gguf", "unknown");
        assert!(matches!(ModelFamily::from_info(&gguf), ModelFamily::Gguf { .. }));

        let json = ModelInfo::new("/tok/tokenizer.json", "custom");
        assert!(matches!(
            ModelFamily::from_info(&json),
            ModelFamily::HuggingFace { .. }
        ));

        let other = ModelInfo::new("/models/thing", "Onnx");
        assert_eq!(
            ModelFamily::from_info(&other),
            ModelFamily::Other {
                model_type: "onnx".to_string()
            }
        );
    }

    #[test]
    fn test_missing_local_file_is_error() {
        let resolver = TokenizerResolver::default();
        let info = ModelInfo::new("/definitely/not/here/tokenizer.json", "huggingface");
        assert!(resolver.resolve(&info).is_err());
    }

    #[test]
    fn test_gguf_has_no_default_loader() {
        let resolver = TokenizerResolver::default();
        let info = ModelInfo::new("/models/x.gguf", "gguf");
        assert!(matches!(
            resolver.resolve(&info),
            Err(ContextError::Tokenizer(_))
        ));
    }

    #[test]
    fn test_panicking_loader_is_contained() {
        let resolver = TokenizerResolver::empty()
            .with_loader(Arc::new(PanickingLoader))
            .with_loader(Arc::new(WordLoader));
        let info = ModelInfo::new("/m", "words");

        let tokenizer = resolver.resolve(&info).unwrap();
        assert_eq!(tokenizer.count("one two three").unwrap(), 3);
    }

    #[test]
    fn test_slow_loader_times_out() {
        let resolver = TokenizerResolver::empty()
            .with_loader(Arc::new(SlowLoader))
            .with_load_timeout(Duration::from_millis(50));
        let info = ModelInfo::new("org/model", "hf-hub");

        let started = std::time::Instant::now();
        let result = resolver.resolve(&info);

        assert!(matches!(result, Err(ContextError::Tokenizer(ref m)) if m.contains("timed out")));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_slow_loader_skipped_for_next_in_chain() {
        let resolver = TokenizerResolver::empty()
            .with_loader(Arc::new(SlowLoader))
            .with_loader(Arc::new(WordLoader))
            .with_load_timeout(Duration::from_millis(50));
        let info = ModelInfo::new("/m", "words");

        let tokenizer = resolver.resolve(&info).unwrap();
        assert_eq!(tokenizer.count("a b").unwrap(), 2);
    }

    #[test]
    fn test_default_timeout() {
        assert_eq!(TokenizerResolver::default().load_timeout(), DEFAULT_LOAD_TIMEOUT);
    }

    #[test]
    fn test_cache_first_writer_wins() {
        let cache = TokenizerCache::new();
        assert!(cache.get("m").is_none());

        let first: Arc<dyn Tokenizer> = Arc::new(WordTokenizer);
        let stored = cache.insert("m", Some(first.clone()));
        assert!(Arc::ptr_eq(stored.as_ref().unwrap(), &first));

        let second = cache.insert("m", None);
        assert!(second.is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_remembers_failures() {
        let cache = TokenizerCache::new();
        cache.insert("broken", None);
        assert!(matches!(cache.get("broken"), Some(None)));
    }
}
