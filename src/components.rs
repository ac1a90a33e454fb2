//! Component System - Ordered Script/Style Contracts
//!
//! An application is a shell plus an ordered list of components. Order is
//! significant: scripts are concatenated in declared order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

use crate::MIN_ENGINE_VERSION;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnipError {
    #[error("Exclusion {0} has start after end")]
    Inverted(ExclusionRange),

    #[error("Exclusions {0} and {1} overlap")]
    Overlap(ExclusionRange, ExclusionRange),

    #[error("Exclusion {range} is out of bounds for {lines} lines")]
    OutOfBounds { range: ExclusionRange, lines: usize },
}

/// Closed, zero-indexed line interval. Serialized as `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "[usize; 2]", into = "[usize; 2]")]
pub struct ExclusionRange {
    pub start: usize,
    pub end: usize,
}

impl ExclusionRange {
    pub fn new(start: usize, end: usize) -> Result<Self, SnipError> {
        let range = Self { start, end };
        if start > end {
            return Err(SnipError::Inverted(range));
        }
        Ok(range)
    }

    fn overlaps(&self, other: &ExclusionRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl TryFrom<[usize; 2]> for ExclusionRange {
    type Error = SnipError;

    fn try_from(pair: [usize; 2]) -> Result<Self, Self::Error> {
        Self::new(pair[0], pair[1])
    }
}

impl From<ExclusionRange> for [usize; 2] {
    fn from(range: ExclusionRange) -> Self {
        [range.start, range.end]
    }
}

impl fmt::Display for ExclusionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Check that no two ranges overlap. Returns them sorted by start.
pub fn check_exclusions(exclusions: &[ExclusionRange]) -> Result<Vec<ExclusionRange>, SnipError> {
    let mut sorted = exclusions.to_vec();
    sorted.sort();
    for pair in sorted.windows(2) {
        if pair[0].overlaps(&pair[1]) {
            return Err(SnipError::Overlap(pair[0], pair[1]));
        }
    }
    Ok(sorted)
}

/// Remove the given line ranges from `text`.
///
/// Ranges are deleted last-first so earlier indices stay valid; the remaining
/// lines are rejoined with `\n`. An empty exclusion list returns `text` as is.
pub fn snip(text: &str, exclusions: &[ExclusionRange]) -> Result<String, SnipError> {
    if exclusions.is_empty() {
        return Ok(text.to_string());
    }

    let sorted = check_exclusions(exclusions)?;
    let mut lines: Vec<&str> = text.lines().collect();

    if let Some(last) = sorted.last() {
        if last.end >= lines.len() {
            return Err(SnipError::OutOfBounds { range: *last, lines: lines.len() });
        }
    }

    for range in sorted.iter().rev() {
        lines.drain(range.start..=range.end);
    }

    Ok(lines.join("\n"))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Script,
    Style,
}

impl ComponentKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ComponentKind::Script => "js",
            ComponentKind::Style => "css",
        }
    }

    /// Asset store path for a component of this kind.
    pub fn asset_path(&self, id: &str) -> String {
        format!("components/{}.{}", id, self.extension())
    }
}

/// Asset store path for an HTML shell.
pub fn shell_path(name: &str) -> String {
    format!("components/{}.html", name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub id: String,
    pub kind: ComponentKind,
    exclusions: Vec<ExclusionRange>,
}

impl Component {
    pub fn script(id: impl Into<String>) -> Self {
        Self { id: id.into(), kind: ComponentKind::Script, exclusions: vec![] }
    }

    pub fn style(id: impl Into<String>) -> Self {
        Self { id: id.into(), kind: ComponentKind::Style, exclusions: vec![] }
    }

    /// Attach exclusion ranges, rejecting overlapping ones.
    pub fn excluding(mut self, exclusions: &[ExclusionRange]) -> Result<Self, SnipError> {
        self.exclusions = check_exclusions(exclusions)?;
        Ok(self)
    }

    pub fn exclusions(&self) -> &[ExclusionRange] {
        &self.exclusions
    }

    pub fn asset_path(&self) -> String {
        self.kind.asset_path(&self.id)
    }
}

/// Ordered, immutable set of components for one application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentSet {
    components: Vec<Component>,
}

impl ComponentSet {
    pub fn new(components: Vec<Component>) -> Self {
        Self { components }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.components.iter()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl<'a> IntoIterator for &'a ComponentSet {
    type Item = &'a Component;
    type IntoIter = std::slice::Iter<'a, Component>;

    fn into_iter(self) -> Self::IntoIter {
        self.components.iter()
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AppVariant {
    /// Renders both existing and freshly created records.
    #[default]
    Editable,
    /// Renders existing records only; no write key.
    ReadOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    pub id: String,
    #[serde(default)]
    pub exclude: Vec<ExclusionRange>,
}

impl ComponentSpec {
    fn plain(id: &str) -> Self {
        Self { id: id.to_string(), exclude: vec![] }
    }
}

/// Declarative description of one application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppManifest {
    pub name: String,
    pub shell: String,
    #[serde(default)]
    pub variant: AppVariant,
    #[serde(default = "default_engine_min_version")]
    pub engine_min_version: String,
    #[serde(default)]
    pub scripts: Vec<ComponentSpec>,
    #[serde(default)]
    pub styles: Vec<ComponentSpec>,
}

fn default_engine_min_version() -> String { MIN_ENGINE_VERSION.to_string() }

// The crypto library ships a CCM mode the client never uses.
fn jscrypto_spec() -> ComponentSpec {
    ComponentSpec {
        id: "jscrypto".to_string(),
        exclude: vec![
            ExclusionRange { start: 72, end: 72 },
            ExclusionRange { start: 544, end: 846 },
        ],
    }
}

impl AppManifest {
    /// The editable pad application.
    pub fn pad() -> Self {
        Self {
            name: "pad".to_string(),
            shell: "pad".to_string(),
            variant: AppVariant::Editable,
            engine_min_version: default_engine_min_version(),
            scripts: vec![
                ComponentSpec::plain("jquery-1.3.2"),
                ComponentSpec::plain("jquery.simplemodal-1.3.3"),
                jscrypto_spec(),
                ComponentSpec::plain("pad"),
            ],
            styles: vec![
                ComponentSpec::plain("resetfontsbase"),
                ComponentSpec::plain("pad"),
            ],
        }
    }

    /// Read-only converter for legacy pad data.
    pub fn converter() -> Self {
        Self {
            name: "converter".to_string(),
            shell: "converter".to_string(),
            variant: AppVariant::ReadOnly,
            engine_min_version: default_engine_min_version(),
            scripts: vec![
                ComponentSpec::plain("jquery-1.3.2"),
                jscrypto_spec(),
                ComponentSpec::plain("converter"),
            ],
            styles: vec![
                ComponentSpec::plain("resetfontsbase"),
                ComponentSpec::plain("pad"),
            ],
        }
    }

    /// Scripts in declared order, then styles in declared order.
    pub fn component_set(&self) -> Result<ComponentSet, SnipError> {
        let scripts = self.scripts.iter().map(|s| Component::script(&s.id).excluding(&s.exclude));
        let styles = self.styles.iter().map(|s| Component::style(&s.id).excluding(&s.exclude));
        let components = scripts.chain(styles).collect::<Result<Vec<_>, _>>()?;
        Ok(ComponentSet::new(components))
    }
}

/// Manifest registry - built-in applications plus any loaded from disk
pub struct ManifestRegistry {
    manifests: BTreeMap<String, AppManifest>,
}

impl ManifestRegistry {
    pub fn new() -> Self {
        Self { manifests: BTreeMap::new() }
    }

    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(AppManifest::pad());
        registry.register(AppManifest::converter());
        registry
    }

    /// Add every `*.json` manifest in `dir`. Unparseable files are skipped.
    pub fn load_from_dir(&mut self, dir: &Path) -> Result<(), std::io::Error> {
        if !dir.exists() {
            return Ok(());
        }
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().map_or(false, |e| e == "json") {
                let content = fs::read_to_string(&path)?;
                match serde_json::from_str::<AppManifest>(&content) {
                    Ok(manifest) => self.register(manifest),
                    Err(e) => warn!(path = %path.display(), error = %e, "skipping manifest"),
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&AppManifest> {
        self.manifests.get(name)
    }

    pub fn list(&self) -> Vec<&AppManifest> {
        self.manifests.values().collect()
    }

    pub fn register(&mut self, manifest: AppManifest) {
        self.manifests.insert(manifest.name.clone(), manifest);
    }
}

impl Default for ManifestRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
