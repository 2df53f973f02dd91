use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::dataset::{Dataset, DatasetSummary};
use crate::error::{LoadError, RenderError};
use crate::loader::{DatasetLoader, DatasetSource};
use crate::navigator::{path_string, Navigator};
use crate::notes::{FileBackend, NotesStore, UnavailableBackend};
use crate::render::{Renderer, View};
use crate::sanitize::Sanitizer;

/// One user session: the active dataset with its navigator, the notes store
/// and the loader feeding new datasets in.
///
/// Installing a dataset swaps the dataset, its index and the navigator in one
/// step; a failed load leaves all three untouched.
pub struct Session {
    config: Config,
    sanitizer: Sanitizer,
    loader: DatasetLoader,
    navigator: Option<Navigator>,
    notes: NotesStore,
}

impl Session {
    /// Session with file-backed notes at the configured path
    pub fn new(config: Config) -> Self {
        let backend: Box<dyn crate::notes::NotesBackend> =
            match FileBackend::open(&config.notes_path) {
                Ok(backend) => Box::new(backend),
                Err(err) => {
                    warn!(path = %config.notes_path.display(), error = %err, "notes storage unavailable");
                    Box::new(UnavailableBackend::new(err.to_string()))
                }
            };
        let notes = NotesStore::new(backend, config.notes_prefix.clone());
        Self::with_notes(config, notes)
    }

    pub fn with_notes(config: Config, notes: NotesStore) -> Self {
        let sanitizer = Sanitizer::new(config.max_depth);
        Self {
            loader: DatasetLoader::new(sanitizer),
            sanitizer,
            config,
            navigator: None,
            notes,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn notes(&self) -> &NotesStore {
        &self.notes
    }

    pub fn dataset(&self) -> Option<&Arc<Dataset>> {
        self.navigator.as_ref().map(Navigator::dataset)
    }

    pub fn navigator(&self) -> Option<&Navigator> {
        self.navigator.as_ref()
    }

    pub fn navigator_mut(&mut self) -> Option<&mut Navigator> {
        self.navigator.as_mut()
    }

    /// Path string of the current center, used as the notes key
    pub fn current_path_string(&self) -> Option<String> {
        self.navigator
            .as_ref()
            .map(|nav| path_string(&nav.current().path))
    }

    /// Replace the active dataset and start navigation at its root
    pub fn install(&mut self, dataset: Dataset) -> DatasetSummary {
        let summary = dataset.summary();
        info!(
            origin = %summary.origin,
            nodes = summary.node_count,
            leaves = summary.leaf_count,
            "installed dataset"
        );
        self.navigator = Some(Navigator::new(Arc::new(dataset)));
        summary
    }

    /// Load on the calling thread and install on success.
    ///
    /// Any background load still in flight is superseded, even when this one fails.
    pub fn load_blocking(&mut self, source: &DatasetSource) -> Result<DatasetSummary, LoadError> {
        self.loader.supersede();
        let dataset = source.load(&self.sanitizer)?;
        Ok(self.install(dataset))
    }

    /// Start a background load; any load still in flight is superseded
    pub fn request_load(&mut self, source: DatasetSource) -> u64 {
        self.loader.request(source)
    }

    pub fn is_loading(&self) -> bool {
        self.loader.is_loading()
    }

    /// Install the latest finished load, if any. `None` when nothing new arrived.
    pub fn poll_loads(&mut self) -> Option<Result<DatasetSummary, LoadError>> {
        let outcome = self.loader.poll()?;
        Some(self.finish_load(outcome.result))
    }

    /// Like [`Session::poll_loads`] but blocks up to `timeout`
    pub fn wait_for_load(&mut self, timeout: Duration) -> Option<Result<DatasetSummary, LoadError>> {
        let outcome = self.loader.wait(timeout)?;
        Some(self.finish_load(outcome.result))
    }

    fn finish_load(&mut self, result: Result<Dataset, LoadError>) -> Result<DatasetSummary, LoadError> {
        match result {
            Ok(dataset) => Ok(self.install(dataset)),
            Err(err) => {
                warn!(error = %err, "dataset load failed, keeping current dataset");
                Err(err)
            }
        }
    }

    /// Hand the current view to a renderer. Nothing is drawn before the first load.
    pub fn render(&self, renderer: &mut dyn Renderer) -> Result<(), RenderError> {
        let Some(nav) = self.navigator.as_ref() else {
            return Ok(());
        };
        let view = View::new(nav.dataset(), nav.current());
        renderer.render(&view)
    }

    /// Ask the renderer for an image of the current view at the configured scale
    pub fn export_image(&self, renderer: &mut dyn Renderer) -> Result<Option<Vec<u8>>, RenderError> {
        let Some(nav) = self.navigator.as_ref() else {
            return Ok(None);
        };
        let view = View::new(nav.dataset(), nav.current());
        renderer
            .export_image(&view, self.config.export_scale)
            .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::OutlineRenderer;
    use std::path::PathBuf;

    const WAIT: Duration = Duration::from_secs(5);

    fn session() -> Session {
        Session::with_notes(Config::default(), NotesStore::in_memory())
    }

    fn inline(text: &str) -> DatasetSource {
        DatasetSource::Inline(text.to_string())
    }

    #[test]
    fn test_install_resets_navigation() {
        let mut session = session();
        session
            .load_blocking(&inline(r#"{ "name": "A", "children": [{ "name": "B", "children": [{ "name": "C" }] }] }"#))
            .unwrap();
        session.navigator_mut().unwrap().open_path(&["B"]).unwrap();
        assert_eq!(session.current_path_string().unwrap(), "/A/B");

        session.load_blocking(&inline(r#"{ "name": "Z" }"#)).unwrap();
        let nav = session.navigator().unwrap();
        assert_eq!(nav.depth(), 0);
        assert_eq!(session.current_path_string().unwrap(), "/Z");
    }

    #[test]
    fn test_failed_load_keeps_previous_dataset() {
        let mut session = session();
        session.load_blocking(&inline(r#"{ "name": "Kept", "children": [{ "name": "Child" }] }"#)).unwrap();
        session.navigator_mut().unwrap().open_path(&["Child"]).unwrap();

        assert!(session.load_blocking(&inline("{ broken")).is_err());
        assert!(session
            .load_blocking(&DatasetSource::File(PathBuf::from("/no/such/file.json")))
            .is_err());

        assert_eq!(session.dataset().unwrap().root_name(), "Kept");
        assert_eq!(session.navigator().unwrap().depth(), 1);
    }

    #[test]
    fn test_background_load_installs_latest() {
        let mut session = session();
        session.request_load(inline(r#"{ "name": "Old" }"#));
        session.request_load(inline(r#"{ "name": "New" }"#));
        let summary = session.wait_for_load(WAIT).unwrap().unwrap();
        assert_eq!(summary.name, "New");
        assert_eq!(session.dataset().unwrap().root_name(), "New");
        assert!(!session.is_loading());
    }

    #[test]
    fn test_blocking_load_supersedes_background_load() {
        let mut session = session();
        session.request_load(inline(r#"{ "name": "Older" }"#));
        session.load_blocking(&inline(r#"{ "name": "Newer" }"#)).unwrap();
        assert!(!session.is_loading());

        std::thread::sleep(Duration::from_millis(50));
        assert!(session.poll_loads().is_none());
        assert!(session.wait_for_load(Duration::from_millis(10)).is_none());
        assert_eq!(session.dataset().unwrap().root_name(), "Newer");
    }

    #[test]
    fn test_default_source_falls_back_to_demo() {
        let mut session = session();
        session
            .load_blocking(&DatasetSource::Default(PathBuf::from("/no/such/default.json")))
            .unwrap();
        assert!(session.navigator().unwrap().resolve_by_query("Ministry of Finance").is_ok());
    }

    #[test]
    fn test_render_before_and_after_load() {
        let mut session = session();
        let mut renderer = OutlineRenderer::new(Vec::new(), 0);
        session.render(&mut renderer).unwrap();
        assert!(session.export_image(&mut renderer).unwrap().is_none());

        session.load_blocking(&inline(r#"{ "name": "Root", "value": 5 }"#)).unwrap();
        session.render(&mut renderer).unwrap();
        assert_eq!(String::from_utf8(renderer.into_inner()).unwrap(), "Root • 5 (100.00%)\n");
    }
}
