//! Filename-keyed resource cache with pluggable loaders.
//!
//! Each resource type gets one handler: a subfolder under the resource
//! root plus a loader callback. `load` hits the cache first; on a miss it
//! calls the loader with `<root>/<subfolder>/<filename>` and caches the
//! result. A missing handler or a failing loader is a configuration
//! error the engine cannot limp past, so both are fatal.

use std::any::Any;
use std::path::{Path, PathBuf};

use ahash::AHashMap;

use crate::meta::TypeKey;

struct Handler {
    folder: String,
    load: Box<dyn Fn(&Path) -> eyre::Result<Box<dyn Any>>>,
}

pub struct Resources {
    root: PathBuf,
    handlers: AHashMap<TypeKey, Handler>,
    cache: AHashMap<(TypeKey, String), Box<dyn Any>>,
}

impl Resources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            handlers: AHashMap::new(),
            cache: AHashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Register the loader for `T`, replacing any prior one. `folder` is
    /// the subfolder of the resource root `T`'s files live in.
    pub fn add_handler<T: 'static>(
        &mut self,
        folder: impl Into<String>,
        load: impl Fn(&Path) -> eyre::Result<T> + 'static,
    ) {
        let handler = Handler {
            folder: folder.into(),
            load: Box::new(move |path| load(path).map(|it| Box::new(it) as Box<dyn Any>)),
        };
        self.handlers.insert(TypeKey::of::<T>(), handler);
    }

    /// Fetch `file`, loading it on first use. The returned reference is
    /// stable for the life of the cache.
    ///
    /// Panics if no handler is registered for `T` or the loader fails;
    /// both are fatal configuration errors.
    pub fn load<T: 'static>(&mut self, file: &str) -> &T {
        let tid = TypeKey::of::<T>();
        let key = (tid, file.to_owned());

        if !self.cache.contains_key(&key) {
            let Some(handler) = self.handlers.get(&tid) else {
                tracing::error!(
                    "aborting... no resource handler was added for {}",
                    tid.type_name()
                );
                panic!("no resource handler for {}", tid.type_name());
            };
            let path = self.root.join(&handler.folder).join(file);
            match (handler.load)(&path) {
                Ok(resource) => {
                    tracing::info!("loaded {} from {}", tid.type_name(), path.display());
                    self.cache.insert(key.clone(), resource);
                }
                Err(err) => {
                    tracing::error!(
                        "aborting... failed to load {} from {}: {}",
                        tid.type_name(),
                        path.display(),
                        err
                    );
                    panic!("failed to load resource {}", path.display());
                }
            }
        }

        // SAFETY: cache entries are keyed by their type id.
        unsafe {
            self.cache
                .get(&key)
                .unwrap()
                .downcast_ref()
                .unwrap_unchecked()
        }
    }

    /// Is `file` already cached for `T`?
    pub fn contains<T: 'static>(&self, file: &str) -> bool {
        self.cache
            .contains_key(&(TypeKey::of::<T>(), file.to_owned()))
    }
}
