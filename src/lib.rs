//! Crypclient Core - Browser Application Compiler
//!
//! # The Guarantees
//! 1. Components Load Once
//! 2. Payloads Are Data, Never Markup
//! 3. Digests Ignore the Hostile Zone
//! 4. Tokens Are Checked Before They Are Trusted

pub mod escape;
pub mod components;
pub mod assets;
pub mod minify;
pub mod template;
pub mod loader;
pub mod bootstrap;
pub mod render;
pub mod hashing;

pub use escape::js_quote;
pub use components::{snip, AppManifest, AppVariant, Component, ComponentKind, ComponentSet, ExclusionRange, ManifestRegistry};
pub use assets::{AssetError, AssetStore, DirAssetStore, MemoryAssetStore};
pub use minify::{BuiltinMinifier, Minifier};
pub use bootstrap::{Bootstrapper, BuildContext, BuildError, BuildManifest, BuildOptions, CompiledTemplate, Tokens};
pub use render::{AppRenderer, ReadOnlyRenderer, Record};
pub use hashing::{app_digest, app_digest_hex, app_digest_sri, strip_hostile_zone, HOSTILE_MARKER};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const MIN_ENGINE_VERSION: &str = "1.0.0";
