//! Bootstrapper - Build Once, Instantiate Per Record
//!
//! CRITICAL: every component is loaded and every build-time variable bound
//! exactly once, here. The compiled template that comes out only has the
//! record name, write key and payload left to fill in.
//!
//! 1. Assembly: load components in declared order.
//! 2. Shell compilation: render the shell with all build variables; the
//!    three record tokens are bound to themselves so they survive.
//! 3. Re-templating: parse that output again and lower it into literal
//!    segments and record slots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::assets::{AssetError, AssetStore};
use crate::components::{shell_path, AppManifest, ComponentKind, ComponentSet, SnipError};
use crate::hashing::{app_digest_hex, compute_manifest_hash, hostile_zone, sha256_hex, HOSTILE_MARKER};
use crate::loader::ComponentLoader;
use crate::minify::{Minifier, MinifyError};
use crate::template::{Node, Template, TemplateError, Value, Variables};
use crate::ENGINE_VERSION;

/// Build variables every shell may use; statics may not shadow them.
const RESERVED_VARIABLES: &[&str] = &["domain", "dev", "jslibs", "css", "name", "writekey", "data"];

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("Bad exclusions for {component}: {source}")]
    Exclusion {
        component: String,
        #[source]
        source: SnipError,
    },

    #[error("Minification of {component} failed: {source}")]
    Minify {
        component: String,
        #[source]
        source: MinifyError,
    },

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("App {0} requires engine >= {1}, current is {2}")]
    EngineVersionMismatch(String, String, String),

    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    #[error("Invalid token {token:?}: {reason}")]
    InvalidToken { token: String, reason: &'static str },

    #[error("Token {token:?} collides with content in {location}")]
    TokenCollision { token: String, location: String },

    #[error("Data marker {marker:?} must occur exactly once in the shell, found {count}")]
    MarkerCount { marker: String, count: usize },

    #[error("Data marker {0:?} lies outside the hostile zone")]
    MarkerOutsideHostileZone(String),

    #[error("Static inclusion {0:?} shadows a reserved build variable")]
    ReservedVariable(String),

    #[error("Compiled template references unexpected variable {0:?}")]
    UnexpectedSlot(String),

    #[error("Compiled template still contains a block directive")]
    UnexpectedBlock,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Build-time settings shared by every application in a process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOptions {
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub minimized: bool,
    #[serde(default)]
    pub dev: bool,
    /// Extra named inclusions, each bound as a text variable.
    #[serde(default)]
    pub statics: BTreeMap<String, String>,
}

/// Sentinels that survive shell compilation and are filled per record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tokens {
    pub name: String,
    pub writekey: String,
    pub data_marker: String,
}

impl Default for Tokens {
    fn default() -> Self {
        Self {
            name: "@!name!@".to_string(),
            writekey: "@!writekey!@".to_string(),
            data_marker: "%%CIPHERMARKER%%".to_string(),
        }
    }
}

impl Tokens {
    fn all(&self) -> [&str; 3] {
        [self.name.as_str(), self.writekey.as_str(), self.data_marker.as_str()]
    }

    /// Variable names of the name and writekey slots.
    fn slots(&self) -> Result<(String, String), BuildError> {
        let [name, writekey, marker] = self.all();
        for token in self.all() {
            if token.is_empty() {
                return Err(BuildError::InvalidToken { token: token.to_string(), reason: "empty" });
            }
        }
        let duplicate = if name == writekey || name == marker {
            Some(name)
        } else if writekey == marker {
            Some(writekey)
        } else {
            None
        };
        if let Some(token) = duplicate {
            return Err(BuildError::InvalidToken {
                token: token.to_string(),
                reason: "tokens must be distinct",
            });
        }

        let plain = Template::parse(marker)
            .map(|t| t.nodes() == [Node::Text(marker.to_string())])
            .unwrap_or(false);
        if !plain {
            return Err(BuildError::InvalidToken {
                token: marker.to_string(),
                reason: "data marker must be plain text",
            });
        }

        Ok((field_slot(name)?, field_slot(writekey)?))
    }
}

/// A field token must be exactly one escaped expression.
fn field_slot(token: &str) -> Result<String, BuildError> {
    let template = Template::parse(token).map_err(|_| BuildError::InvalidToken {
        token: token.to_string(),
        reason: "not a template expression",
    })?;
    match template.nodes() {
        [Node::Expr { name, escape: true }] => Ok(name.clone()),
        _ => Err(BuildError::InvalidToken {
            token: token.to_string(),
            reason: "must be a single @!ident!@ expression",
        }),
    }
}

/// Everything needed to compile one application.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub app: String,
    pub shell: String,
    pub components: ComponentSet,
    pub options: BuildOptions,
    pub tokens: Tokens,
    pub hostile_marker: String,
}

impl BuildContext {
    pub fn new(app: impl Into<String>, shell: impl Into<String>, components: ComponentSet) -> Self {
        Self {
            app: app.into(),
            shell: shell.into(),
            components,
            options: BuildOptions::default(),
            tokens: Tokens::default(),
            hostile_marker: HOSTILE_MARKER.to_string(),
        }
    }

    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_tokens(mut self, tokens: Tokens) -> Self {
        self.tokens = tokens;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComponentDigest {
    pub path: String,
    pub kind: ComponentKind,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildManifest {
    pub id: String,
    pub app: String,
    pub engine_version: String,
    pub created_at: DateTime<Utc>,
    pub minimized: bool,
    pub dev: bool,
    pub components: Vec<ComponentDigest>,
    /// Application digest of the compiled source, hostile zone excluded.
    pub template_hash: String,
    pub manifest_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Name,
    Writekey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field { field: Field, escape: bool },
    Data,
}

/// The reusable build artifact. Immutable; instantiation only reads it.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    segments: Vec<Segment>,
    source: String,
    data_marker: String,
    hostile_marker: String,
    manifest: BuildManifest,
}

impl CompiledTemplate {
    /// Fill the record slots. `data` goes in verbatim at the data marker;
    /// callers escape it first.
    pub(crate) fn instantiate(&self, name: &str, writekey: &str, data: &str) -> String {
        let mut out = String::with_capacity(self.source.len() + data.len() + name.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field { field, escape } => {
                    let value = match field {
                        Field::Name => name,
                        Field::Writekey => writekey,
                    };
                    if *escape {
                        out.push_str(&crate::escape::html_escape(value));
                    } else {
                        out.push_str(value);
                    }
                }
                Segment::Data => out.push_str(data),
            }
        }
        out
    }

    /// Compiled source, with the record tokens and data marker still literal.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn data_marker(&self) -> &str {
        &self.data_marker
    }

    pub fn hostile_marker(&self) -> &str {
        &self.hostile_marker
    }

    pub fn manifest(&self) -> &BuildManifest {
        &self.manifest
    }
}

/// Split the reparsed shell into literal segments and record slots.
fn lower(template: &Template, marker: &str, name_slot: &str, writekey_slot: &str) -> Result<Vec<Segment>, BuildError> {
    let mut segments = Vec::new();
    let mut data_count = 0;

    for node in template.nodes() {
        match node {
            Node::Text(text) => {
                for (i, part) in text.split(marker).enumerate() {
                    if i > 0 {
                        segments.push(Segment::Data);
                        data_count += 1;
                    }
                    if !part.is_empty() {
                        segments.push(Segment::Literal(part.to_string()));
                    }
                }
            }
            Node::Expr { name, escape } => {
                let field = if name == name_slot {
                    Field::Name
                } else if name == writekey_slot {
                    Field::Writekey
                } else {
                    return Err(BuildError::UnexpectedSlot(name.clone()));
                };
                segments.push(Segment::Field { field, escape: *escape });
            }
            Node::For { .. } | Node::If { .. } => return Err(BuildError::UnexpectedBlock),
        }
    }

    if data_count != 1 {
        return Err(BuildError::MarkerCount { marker: marker.to_string(), count: data_count });
    }
    Ok(segments)
}

/// Build inputs may not contain a record token or the hostile marker; either
/// would move a slot or the digest boundary into component code.
fn check_collisions(text: &str, ctx: &BuildContext, location: &str) -> Result<(), BuildError> {
    let hostile = Some(ctx.hostile_marker.as_str()).filter(|m| !m.is_empty());
    match ctx.tokens.all().into_iter().chain(hostile).find(|token| text.contains(token)) {
        Some(token) => Err(BuildError::TokenCollision {
            token: token.to_string(),
            location: location.to_string(),
        }),
        None => Ok(()),
    }
}

/// The bootstrapper - single entry point for compiling applications
pub struct Bootstrapper<'a> {
    store: &'a dyn AssetStore,
    minifier: &'a dyn Minifier,
}

impl<'a> Bootstrapper<'a> {
    pub fn new(store: &'a dyn AssetStore, minifier: &'a dyn Minifier) -> Self {
        Self { store, minifier }
    }

    /// Resolve a manifest into a build context, reading its shell.
    pub fn context_for(&self, manifest: &AppManifest, options: BuildOptions) -> Result<BuildContext, BuildError> {
        self.check_engine_version(manifest)?;
        let components = manifest.component_set().map_err(|source| BuildError::Exclusion {
            component: manifest.name.clone(),
            source,
        })?;
        let shell = self.store.read(&shell_path(&manifest.shell))?;
        Ok(BuildContext::new(&manifest.name, shell, components).with_options(options))
    }

    pub fn build(&self, ctx: &BuildContext) -> Result<CompiledTemplate, BuildError> {
        let tokens = &ctx.tokens;
        let (name_slot, writekey_slot) = tokens.slots()?;
        let options = &ctx.options;

        info!(
            app = %ctx.app,
            components = ctx.components.len(),
            minimized = options.minimized,
            dev = options.dev,
            "building application"
        );

        // Phase 1: assembly
        let mut loader = ComponentLoader::new(self.store);
        if options.minimized {
            loader = loader.minified(self.minifier);
        }
        let mut jslibs = Vec::new();
        let mut css = Vec::new();
        let mut digests = Vec::new();
        for component in &ctx.components {
            let text = loader.load(component)?;
            let path = component.asset_path();
            check_collisions(&text, ctx, &path)?;
            digests.push(ComponentDigest {
                path,
                kind: component.kind,
                sha256: sha256_hex(text.as_bytes()),
            });
            match component.kind {
                ComponentKind::Script => jslibs.push(text),
                ComponentKind::Style => css.push(text),
            }
        }

        // Phase 2: shell compilation
        let mut vars = Variables::new();
        check_collisions(&options.domain, ctx, "domain")?;
        for (key, text) in &options.statics {
            if RESERVED_VARIABLES.contains(&key.as_str()) {
                return Err(BuildError::ReservedVariable(key.clone()));
            }
            check_collisions(text, ctx, key)?;
            vars.insert(key.clone(), Value::from(text.as_str()));
        }
        vars.insert("domain".into(), Value::from(options.domain.as_str()));
        vars.insert("dev".into(), Value::Flag(options.dev));
        vars.insert("jslibs".into(), Value::List(jslibs));
        vars.insert("css".into(), Value::List(css));
        vars.insert("name".into(), Value::from(tokens.name.as_str()));
        vars.insert("writekey".into(), Value::from(tokens.writekey.as_str()));
        vars.insert("data".into(), Value::from(tokens.data_marker.as_str()));

        let source = Template::parse(&ctx.shell)?.render(&vars)?;

        let marker = tokens.data_marker.as_str();
        let count = source.matches(marker).count();
        if count != 1 {
            return Err(BuildError::MarkerCount { marker: marker.to_string(), count });
        }
        match hostile_zone(&source, &ctx.hostile_marker) {
            Some(zone) => {
                let inside = source.find(marker).map_or(false, |pos| {
                    pos >= zone.start && pos + marker.len() <= zone.end
                });
                if !inside {
                    return Err(BuildError::MarkerOutsideHostileZone(marker.to_string()));
                }
            }
            None => warn!(app = %ctx.app, "shell has no hostile zone; digests will cover the payload"),
        }

        // Phase 3: re-templating
        let segments = lower(&Template::parse(&source)?, marker, &name_slot, &writekey_slot)?;

        let mut manifest = BuildManifest {
            id: Uuid::new_v4().to_string(),
            app: ctx.app.clone(),
            engine_version: ENGINE_VERSION.to_string(),
            created_at: Utc::now(),
            minimized: options.minimized,
            dev: options.dev,
            components: digests,
            template_hash: app_digest_hex(&source, &ctx.hostile_marker),
            manifest_hash: String::new(), // Computed after
        };
        manifest.manifest_hash = compute_manifest_hash(&manifest)?;

        info!(app = %ctx.app, template_hash = %manifest.template_hash, bytes = source.len(), "built application");

        Ok(CompiledTemplate {
            segments,
            source,
            data_marker: marker.to_string(),
            hostile_marker: ctx.hostile_marker.clone(),
            manifest,
        })
    }

    fn check_engine_version(&self, manifest: &AppManifest) -> Result<(), BuildError> {
        let engine_ver = semver::Version::parse(ENGINE_VERSION)
            .map_err(|_| BuildError::InvalidVersion(ENGINE_VERSION.to_string()))?;
        let min_ver = semver::Version::parse(&manifest.engine_min_version)
            .map_err(|_| BuildError::InvalidVersion(manifest.engine_min_version.clone()))?;

        if engine_ver < min_ver {
            return Err(BuildError::EngineVersionMismatch(
                manifest.name.clone(),
                manifest.engine_min_version.clone(),
                ENGINE_VERSION.to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryAssetStore;
    use crate::components::Component;
    use crate::minify::BuiltinMinifier;

    const SHELL: &str = "<html><head><!--(for c in css)--><style>$!c!$</style><!--(end)--></head>\n\
        <body data-domain=\"@!domain!@\">\n\
        <!--(for js in jslibs)--><script>$!js!$</script>\n<!--(end)-->\
        <script>\n\
        var name = \"@!name!@\";\n\
        var writekey = \"@!writekey!@\";\n\
        // APPHASH_HOSTILE_ZONE\n\
        var data = \"@!data!@\";\n\
        // APPHASH_HOSTILE_ZONE\n\
        </script><!--(if dev)--><p>dev</p><!--(end)--></body></html>";

    fn store() -> MemoryAssetStore {
        MemoryAssetStore::new()
            .with("components/app.js", "function go ( ) {\n  return 1;\n}\n// tail\n")
            .with("components/app.css", "body { margin : 0; }")
            .with("components/pad.html", SHELL)
    }

    fn ctx(shell: &str) -> BuildContext {
        let components = ComponentSet::new(vec![Component::script("app"), Component::style("app")]);
        BuildContext::new("pad", shell, components).with_options(BuildOptions {
            domain: "example.org".to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_build_leaves_only_record_tokens() {
        let store = store();
        let compiled = Bootstrapper::new(&store, &BuiltinMinifier).build(&ctx(SHELL)).unwrap();
        let source = compiled.source();
        assert!(source.contains("var name = \"@!name!@\";"));
        assert!(source.contains("var writekey = \"@!writekey!@\";"));
        assert!(source.contains("var data = \"%%CIPHERMARKER%%\";"));
        assert!(source.contains("data-domain=\"example.org\""));
        assert!(source.contains("<script>function go ( ) {"));
        assert!(source.contains("<style>body { margin : 0; }</style>"));
        assert!(!source.contains("<p>dev</p>"));
        assert!(!source.contains("<!--("));
    }

    #[test]
    fn test_instantiate() {
        let store = store();
        let compiled = Bootstrapper::new(&store, &BuiltinMinifier).build(&ctx(SHELL)).unwrap();
        let out = compiled.instantiate("a&b", "key", "PAYLOAD");
        assert!(out.contains("var name = \"a&amp;b\";"));
        assert!(out.contains("var writekey = \"key\";"));
        assert!(out.contains("var data = \"PAYLOAD\";"));
        assert!(!out.contains("%%CIPHERMARKER%%"));
    }

    #[test]
    fn test_minimized_dev_build() {
        let store = store();
        let mut context = ctx(SHELL);
        context.options.minimized = true;
        context.options.dev = true;
        let compiled = Bootstrapper::new(&store, &BuiltinMinifier).build(&context).unwrap();
        assert!(compiled.source().contains("<script>function go(){return 1;}</script>"));
        assert!(compiled.source().contains("<style>body{margin:0}</style>"));
        assert!(compiled.source().contains("<p>dev</p>"));
        assert!(compiled.manifest().minimized);
    }

    #[test]
    fn test_manifest_records_components() {
        let store = store();
        let compiled = Bootstrapper::new(&store, &BuiltinMinifier).build(&ctx(SHELL)).unwrap();
        let manifest = compiled.manifest();
        assert_eq!(manifest.app, "pad");
        assert_eq!(manifest.components.len(), 2);
        assert_eq!(manifest.components[0].path, "components/app.js");
        assert_eq!(manifest.components[1].kind, ComponentKind::Style);
        assert_eq!(manifest.template_hash.len(), 64);
        assert_eq!(manifest.manifest_hash.len(), 64);
    }

    #[test]
    fn test_template_hash_is_stable_across_builds() {
        let store = store();
        let boot = Bootstrapper::new(&store, &BuiltinMinifier);
        let a = boot.build(&ctx(SHELL)).unwrap();
        let b = boot.build(&ctx(SHELL)).unwrap();
        assert_eq!(a.manifest().template_hash, b.manifest().template_hash);
        assert_ne!(a.manifest().id, b.manifest().id);
    }

    #[test]
    fn test_context_for_manifest() {
        let store = store();
        let manifest: AppManifest = serde_json::from_str(
            r#"{"name": "pad", "shell": "pad", "scripts": [{"id": "app"}], "styles": [{"id": "app"}]}"#,
        )
        .unwrap();
        let boot = Bootstrapper::new(&store, &BuiltinMinifier);
        let context = boot.context_for(&manifest, BuildOptions::default()).unwrap();
        assert_eq!(context.shell, SHELL);
        assert!(boot.build(&context).is_ok());
    }

    #[test]
    fn test_engine_version_gate() {
        let store = store();
        let mut manifest = AppManifest::pad();
        manifest.engine_min_version = "99.0.0".to_string();
        let err = Bootstrapper::new(&store, &BuiltinMinifier)
            .context_for(&manifest, BuildOptions::default())
            .unwrap_err();
        assert!(matches!(err, BuildError::EngineVersionMismatch(..)));
    }

    #[test]
    fn test_missing_shell_is_fatal() {
        let store = store();
        let err = Bootstrapper::new(&store, &BuiltinMinifier)
            .context_for(&AppManifest::converter(), BuildOptions::default())
            .unwrap_err();
        assert!(matches!(err, BuildError::Asset(AssetError::NotFound(p)) if p == "components/converter.html"));
    }

    #[test]
    fn test_component_token_collision() {
        let store = store().with("components/app.js", "var s = '%%CIPHERMARKER%%';");
        let err = Bootstrapper::new(&store, &BuiltinMinifier).build(&ctx(SHELL)).unwrap_err();
        assert!(matches!(
            err,
            BuildError::TokenCollision { ref location, .. } if location == "components/app.js"
        ));
    }

    #[test]
    fn test_component_template_syntax_rejected() {
        let store = store().with("components/app.js", "var s = '$!secret!$';");
        let err = Bootstrapper::new(&store, &BuiltinMinifier).build(&ctx(SHELL)).unwrap_err();
        assert!(matches!(err, BuildError::UnexpectedSlot(ref s) if s == "secret"));
    }

    #[test]
    fn test_marker_must_be_unique() {
        let store = store();
        let shell = format!("{}<!-- @!data!@ -->", SHELL);
        let err = Bootstrapper::new(&store, &BuiltinMinifier).build(&ctx(&shell)).unwrap_err();
        assert!(matches!(err, BuildError::MarkerCount { count: 2, .. }));

        let err = Bootstrapper::new(&store, &BuiltinMinifier).build(&ctx("<p>@!name!@</p>")).unwrap_err();
        assert!(matches!(err, BuildError::MarkerCount { count: 0, .. }));
    }

    #[test]
    fn test_marker_outside_hostile_zone() {
        let store = store();
        let shell = "// APPHASH_HOSTILE_ZONE\n// APPHASH_HOSTILE_ZONE\nvar d = \"@!data!@\";";
        let err = Bootstrapper::new(&store, &BuiltinMinifier).build(&ctx(shell)).unwrap_err();
        assert!(matches!(err, BuildError::MarkerOutsideHostileZone(_)));
    }

    #[test]
    fn test_shell_without_zone_still_builds() {
        let store = store();
        let compiled = Bootstrapper::new(&store, &BuiltinMinifier)
            .build(&ctx("<p>@!name!@ %%CIPHERMARKER%%</p>"))
            .unwrap();
        assert_eq!(compiled.instantiate("n", "", "d"), "<p>n d</p>");
    }

    #[test]
    fn test_statics() {
        let store = store();
        let mut context = ctx("$!banner!$ @!name!@ @!data!@");
        context.options.statics.insert("banner".into(), "<b>hi</b>".into());
        let compiled = Bootstrapper::new(&store, &BuiltinMinifier).build(&context).unwrap();
        assert_eq!(compiled.instantiate("n", "", "x"), "<b>hi</b> n x");

        let mut context = ctx(SHELL);
        context.options.statics.insert("css".into(), "".into());
        let err = Bootstrapper::new(&store, &BuiltinMinifier).build(&context).unwrap_err();
        assert!(matches!(err, BuildError::ReservedVariable(ref k) if k == "css"));
    }

    #[test]
    fn test_invalid_tokens() {
        let store = store();
        let boot = Bootstrapper::new(&store, &BuiltinMinifier);

        let bad = [
            Tokens { name: "NAME".into(), ..Tokens::default() },
            Tokens { writekey: "$!writekey!$".into(), ..Tokens::default() },
            Tokens { data_marker: "@!data!@".into(), ..Tokens::default() },
            Tokens { data_marker: String::new(), ..Tokens::default() },
            Tokens { writekey: "@!name!@".into(), ..Tokens::default() },
        ];
        for tokens in bad {
            let err = boot.build(&ctx(SHELL).with_tokens(tokens)).unwrap_err();
            assert!(matches!(err, BuildError::InvalidToken { .. }), "{err}");
        }
    }

    #[test]
    fn test_duplicate_token_is_named() {
        let store = store();
        let boot = Bootstrapper::new(&store, &BuiltinMinifier);

        let tokens = Tokens { writekey: "@!name!@".into(), ..Tokens::default() };
        let err = boot.build(&ctx(SHELL).with_tokens(tokens)).unwrap_err();
        assert!(matches!(err, BuildError::InvalidToken { ref token, .. } if token == "@!name!@"), "{err}");

        let tokens = Tokens { data_marker: "@!writekey!@".into(), ..Tokens::default() };
        let err = boot.build(&ctx(SHELL).with_tokens(tokens)).unwrap_err();
        assert!(matches!(err, BuildError::InvalidToken { ref token, .. } if token == "@!writekey!@"), "{err}");
    }

    #[test]
    fn test_component_cannot_move_hostile_zone() {
        let store = store().with("components/app.js", "// APPHASH_HOSTILE_ZONE
evil();
");
        let err = Bootstrapper::new(&store, &BuiltinMinifier).build(&ctx(SHELL)).unwrap_err();
        assert!(matches!(
            err,
            BuildError::TokenCollision { ref token, ref location }
                if token == HOSTILE_MARKER && location == "components/app.js"
        ));

        let mut context = ctx("$!banner!$\n// APPHASH_HOSTILE_ZONE\n@!data!@\n// APPHASH_HOSTILE_ZONE\n");
        context.options.statics.insert("banner".into(), HOSTILE_MARKER.into());
        let err = Bootstrapper::new(&self::store(), &BuiltinMinifier).build(&context).unwrap_err();
        assert!(matches!(err, BuildError::TokenCollision { ref location, .. } if location == "banner"));

        context.options.statics.clear();
        context.options.domain = format!("x {} y", HOSTILE_MARKER);
        let err = Bootstrapper::new(&self::store(), &BuiltinMinifier).build(&context).unwrap_err();
        assert!(matches!(err, BuildError::TokenCollision { ref location, .. } if location == "domain"));
    }

    #[test]
    fn test_custom_tokens() {
        let store = store();
        let tokens = Tokens {
            name: "@!who!@".into(),
            writekey: "@!key!@".into(),
            data_marker: "%%MARK%%".into(),
        };
        let compiled = Bootstrapper::new(&store, &BuiltinMinifier)
            .build(&ctx(SHELL).with_tokens(tokens))
            .unwrap();
        assert!(compiled.source().contains("var name = \"@!who!@\";"));
        assert_eq!(compiled.data_marker(), "%%MARK%%");
        let out = compiled.instantiate("alice", "k", "d");
        assert!(out.contains("var name = \"alice\";"));
        assert!(out.contains("var data = \"d\";"));
    }
}
