use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use super::context::WidgetContext;

/// Function a guest module exports as its entry point.
pub type EntryPoint = Rc<dyn Fn(&WidgetContext, Value) -> anyhow::Result<()>>;

#[derive(Debug, Clone, Error)]
pub enum LoadError {
    #[error("invalid module URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("no module found at {0}")]
    NotFound(Url),
    #[error("module {url} did not load within {after:?}")]
    Timeout { url: String, after: Duration },
    #[error("module import task was aborted: {0}")]
    Aborted(String),
    #[error("failed to load module {url}: {reason}")]
    Failed { url: Url, reason: String },
}

/// A single named export of a guest module.
#[derive(Clone)]
pub enum Export {
    Function(EntryPoint),
    Value(Value),
}

/// A loaded guest module: a set of named exports.
#[derive(Clone, Default)]
pub struct GuestModule {
    exports: BTreeMap<String, Export>,
}

impl GuestModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Export a callable under `name`.
    pub fn with_function<F>(mut self, name: impl Into<String>, entry: F) -> Self
    where
        F: Fn(&WidgetContext, Value) -> anyhow::Result<()> + 'static,
    {
        self.exports
            .insert(name.into(), Export::Function(Rc::new(entry)));
        self
    }

    /// Export a plain value under `name`.
    pub fn with_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.exports.insert(name.into(), Export::Value(value));
        self
    }

    /// Every exported name, sorted.
    pub fn export_names(&self) -> Vec<String> {
        self.exports.keys().cloned().collect()
    }

    /// Look up a callable export. Value exports of the same name do not count.
    pub fn entry_point(&self, name: &str) -> Option<EntryPoint> {
        match self.exports.get(name)? {
            Export::Function(entry) => Some(Rc::clone(entry)),
            Export::Value(_) => None,
        }
    }
}

impl fmt::Debug for GuestModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuestModule")
            .field("exports", &self.export_names())
            .finish()
    }
}

/// Resolves a module URL into a loaded guest module.
pub trait ModuleLoader {
    fn import(&self, url: Url) -> LocalBoxFuture<'static, Result<Rc<GuestModule>, LoadError>>;
}

/// In-process loader serving modules registered by absolute URL.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: RefCell<HashMap<String, Rc<GuestModule>>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, url: &Url, module: GuestModule) {
        self.modules
            .borrow_mut()
            .insert(url.as_str().to_string(), Rc::new(module));
    }
}

impl ModuleLoader for ModuleRegistry {
    fn import(&self, url: Url) -> LocalBoxFuture<'static, Result<Rc<GuestModule>, LoadError>> {
        let found = self.modules.borrow().get(url.as_str()).cloned();
        async move {
            match found {
                Some(module) => {
                    tracing::debug!(target: "loader", url = %url, "module registry hit");
                    Ok(module)
                }
                None => Err(LoadError::NotFound(url)),
            }
        }
        .boxed_local()
    }
}

/// Join the host-supplied base and module path by plain concatenation.
///
/// The document base is not consulted: it may be replaced while the import
/// is in flight.
pub fn module_url(base_url: &str, js_path: &str) -> Result<Url, LoadError> {
    let joined = format!("{base_url}{js_path}");
    Url::parse(&joined).map_err(|err| LoadError::InvalidUrl {
        url: joined,
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn module_url_concatenates_literally() {
        assert_eq!(
            module_url("https://h/", "w.js").unwrap().as_str(),
            "https://h/w.js"
        );
        assert_eq!(
            module_url("https://h/widgets/", "v2/w.js").unwrap().as_str(),
            "https://h/widgets/v2/w.js"
        );
        // No join semantics: a base without a trailing slash is not treated as a directory.
        assert_eq!(
            module_url("https://h/app", "w.js").unwrap().as_str(),
            "https://h/appw.js"
        );
    }

    #[test]
    fn module_url_rejects_relative_result() {
        let err = module_url("", "w.js").unwrap_err();
        assert!(matches!(err, LoadError::InvalidUrl { ref url, .. } if url == "w.js"));
    }

    #[test]
    fn entry_point_ignores_value_exports() {
        let module = GuestModule::new()
            .with_value("render", json!("not callable"))
            .with_function("setup", |_, _| Ok(()));
        assert!(module.entry_point("render").is_none());
        assert!(module.entry_point("setup").is_some());
        assert_eq!(module.export_names(), vec!["render", "setup"]);
    }

    #[tokio::test]
    async fn registry_serves_registered_modules() {
        let registry = ModuleRegistry::new();
        let url = Url::parse("https://h/w.js").unwrap();
        registry.register(&url, GuestModule::new().with_function("render", |_, _| Ok(())));

        let module = registry.import(url.clone()).await.unwrap();
        assert!(module.entry_point("render").is_some());

        let missing = Url::parse("https://h/missing.js").unwrap();
        let err = registry.import(missing).await.unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)));
    }
}
