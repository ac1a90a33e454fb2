//! Application Renderers
//!
//! The per-record hot path. A renderer wraps one compiled template and only
//! reads it, so a single renderer can serve any number of threads.

use serde::{Deserialize, Serialize};

use crate::bootstrap::{BuildContext, BuildError, Bootstrapper, CompiledTemplate};
use crate::escape::js_quote;
use crate::hashing::{app_digest, app_digest_hex};

/// One rendering request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub name: String,
    /// Present only for a record that is being created.
    #[serde(default)]
    pub writekey: Option<String>,
    #[serde(default)]
    pub payload: String,
}

/// Renderer for applications that can create records.
#[derive(Debug, Clone)]
pub struct AppRenderer {
    template: CompiledTemplate,
}

impl AppRenderer {
    pub fn new(template: CompiledTemplate) -> Self {
        Self { template }
    }

    pub fn build(bootstrapper: &Bootstrapper<'_>, ctx: &BuildContext) -> Result<Self, BuildError> {
        Ok(Self::new(bootstrapper.build(ctx)?))
    }

    /// Render an existing record with its payload.
    pub fn render_existing(&self, name: &str, payload: &str) -> String {
        self.template.instantiate(name, "", &js_quote(payload))
    }

    /// Render a freshly created record; it has no payload yet.
    pub fn render_new(&self, name: &str, writekey: &str) -> String {
        self.template.instantiate(name, writekey, "")
    }

    pub fn render_record(&self, record: &Record) -> String {
        match &record.writekey {
            Some(writekey) => self.render_new(&record.name, writekey),
            None => self.render_existing(&record.name, &record.payload),
        }
    }

    pub fn digest(&self, document: &str) -> [u8; 32] {
        app_digest(document, self.template.hostile_marker())
    }

    pub fn digest_hex(&self, document: &str) -> String {
        app_digest_hex(document, self.template.hostile_marker())
    }

    pub fn template(&self) -> &CompiledTemplate {
        &self.template
    }
}

/// Renderer for view-only applications. No write key.
#[derive(Debug, Clone)]
pub struct ReadOnlyRenderer {
    template: CompiledTemplate,
}

impl ReadOnlyRenderer {
    pub fn new(template: CompiledTemplate) -> Self {
        Self { template }
    }

    pub fn build(bootstrapper: &Bootstrapper<'_>, ctx: &BuildContext) -> Result<Self, BuildError> {
        Ok(Self::new(bootstrapper.build(ctx)?))
    }

    pub fn render(&self, name: &str, payload: &str) -> String {
        self.template.instantiate(name, "", &js_quote(payload))
    }

    pub fn digest_hex(&self, document: &str) -> String {
        app_digest_hex(document, self.template.hostile_marker())
    }

    pub fn template(&self) -> &CompiledTemplate {
        &self.template
    }
}
