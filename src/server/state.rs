//! Shared state for request handlers.

use crate::config::ServerConfig;
use crate::convert::Converter;
use crate::pipeline::render::PageRasterizer;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Cheap to clone; every handler gets its own copy.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    converter: Converter,
    conversions: Arc<Semaphore>,
}

impl AppState {
    /// Every conversion uses `config.render`.
    pub fn new(config: ServerConfig, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        let permits = config.max_concurrent_conversions.max(1);
        let converter = Converter::new(rasterizer, config.render.clone());
        Self {
            inner: Arc::new(AppStateInner {
                config,
                converter,
                conversions: Arc::new(Semaphore::new(permits)),
            }),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    pub fn converter(&self) -> &Converter {
        &self.inner.converter
    }

    /// Bounds how many conversions run at once.
    pub fn conversions(&self) -> Arc<Semaphore> {
        Arc::clone(&self.inner.conversions)
    }
}
