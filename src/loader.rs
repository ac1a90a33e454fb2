//! Component Loader
//!
//! Fetch, snip, and (optionally) minify one component. Build-time only.

use tracing::debug;

use crate::assets::AssetStore;
use crate::bootstrap::BuildError;
use crate::components::{snip, Component};
use crate::minify::Minifier;

pub struct ComponentLoader<'a> {
    store: &'a dyn AssetStore,
    minifier: Option<&'a dyn Minifier>,
}

impl<'a> ComponentLoader<'a> {
    pub fn new(store: &'a dyn AssetStore) -> Self {
        Self { store, minifier: None }
    }

    /// Pass every loaded component through `minifier`.
    pub fn minified(mut self, minifier: &'a dyn Minifier) -> Self {
        self.minifier = Some(minifier);
        self
    }

    pub fn load(&self, component: &Component) -> Result<String, BuildError> {
        let path = component.asset_path();
        let raw = self.store.read(&path)?;

        let snipped = snip(&raw, component.exclusions())
            .map_err(|source| BuildError::Exclusion { component: path.clone(), source })?;

        let text = match self.minifier {
            Some(minifier) => minifier
                .minify(component.kind, &snipped)
                .map_err(|source| BuildError::Minify { component: path.clone(), source })?,
            None => snipped,
        };

        debug!(
            component = %path,
            raw_bytes = raw.len(),
            bytes = text.len(),
            minified = self.minifier.is_some(),
            "loaded component"
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetError, MemoryAssetStore};
    use crate::components::ExclusionRange;
    use crate::minify::{BuiltinMinifier, MinifyError};

    fn store() -> MemoryAssetStore {
        MemoryAssetStore::new()
            .with("components/lib.js", "keep();\ndrop();\n/* note */ keep ( 2 );")
            .with("components/site.css", "body {\n  margin : 0;\n}")
            .with("components/broken.js", "var s = 'open")
    }

    #[test]
    fn test_load_applies_exclusions() {
        let store = store();
        let component = Component::script("lib").excluding(&[ExclusionRange::new(1, 1).unwrap()]).unwrap();
        let text = ComponentLoader::new(&store).load(&component).unwrap();
        assert_eq!(text, "keep();\n/* note */ keep ( 2 );");
    }

    #[test]
    fn test_load_minified() {
        let store = store();
        let loader = ComponentLoader::new(&store).minified(&BuiltinMinifier);
        assert_eq!(loader.load(&Component::script("lib")).unwrap(), "keep();drop();keep(2);");
        assert_eq!(loader.load(&Component::style("site")).unwrap(), "body{margin:0}");
    }

    #[test]
    fn test_missing_component() {
        let store = store();
        let err = ComponentLoader::new(&store).load(&Component::style("lib")).unwrap_err();
        assert!(matches!(err, BuildError::Asset(AssetError::NotFound(p)) if p == "components/lib.css"));
    }

    #[test]
    fn test_exclusion_out_of_bounds() {
        let store = store();
        let component = Component::style("site").excluding(&[ExclusionRange::new(2, 5).unwrap()]).unwrap();
        let err = ComponentLoader::new(&store).load(&component).unwrap_err();
        assert!(matches!(err, BuildError::Exclusion { .. }));
    }

    #[test]
    fn test_minifier_failure_is_fatal() {
        let store = store();
        let loader = ComponentLoader::new(&store).minified(&BuiltinMinifier);
        let err = loader.load(&Component::script("broken")).unwrap_err();
        assert!(matches!(
            err,
            BuildError::Minify { source: MinifyError::UnterminatedString('\''), .. }
        ));
        // Unminified, the same source loads fine.
        assert!(ComponentLoader::new(&store).load(&Component::script("broken")).is_ok());
    }
}
