use metrics_exporter_prometheus::PrometheusHandle;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) static_root: Arc<PathBuf>,
}

impl AppState {
    pub(crate) fn page(&self, name: &str) -> PathBuf {
        self.static_root.join(name)
    }
}
