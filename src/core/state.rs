use std::sync::Arc;

use crate::core::config::Settings;
use crate::repositories::Repositories;
use crate::services::template_renderer::TemplateRenderer;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    repos: Repositories,
    renderer: Arc<dyn TemplateRenderer>,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        repos: Repositories,
        renderer: Arc<dyn TemplateRenderer>,
    ) -> Self {
        Self { inner: Arc::new(InnerState { settings, repos, renderer }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn repos(&self) -> &Repositories {
        &self.inner.repos
    }

    pub(crate) fn renderer(&self) -> &dyn TemplateRenderer {
        self.inner.renderer.as_ref()
    }
}
