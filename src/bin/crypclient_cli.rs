//! Crypclient CLI - build and render applications from the command line
//!
//! Commands: apps, build, existing, new, view, digest
//! Documents go to stdout, logs to stderr, errors as JSON on stdout
//! Returns 1 on usage/config errors, 2 on build failure

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crypclient_core::{
    app_digest_hex, app_digest_sri, AppRenderer, AppVariant, Bootstrapper, BuildOptions, BuiltinMinifier,
    CompiledTemplate, DirAssetStore, ManifestRegistry, ReadOnlyRenderer, HOSTILE_MARKER,
};

#[derive(Parser)]
#[command(name = "crypclient-cli")]
#[command(about = "Crypclient CLI - Browser Application Compiler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding components/
    #[arg(short, long, default_value = ".")]
    assets: PathBuf,

    /// Directory of extra JSON app manifests
    #[arg(short, long)]
    manifests: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[derive(clap::Args)]
struct BuildArgs {
    /// App name
    #[arg(long)]
    app: String,

    /// Domain the app is served from
    #[arg(long, default_value = "")]
    domain: String,

    /// Minify components
    #[arg(long)]
    minify: bool,

    /// Development build
    #[arg(long)]
    dev: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List available apps
    Apps,

    /// Build an app and print its build manifest
    Build {
        #[command(flatten)]
        build: BuildArgs,
    },

    /// Render an existing record
    Existing {
        #[command(flatten)]
        build: BuildArgs,

        #[arg(long)]
        name: String,

        /// File holding the record payload
        #[arg(long)]
        payload_file: Option<PathBuf>,
    },

    /// Render a new record
    New {
        #[command(flatten)]
        build: BuildArgs,

        #[arg(long)]
        name: String,

        #[arg(long)]
        writekey: String,
    },

    /// Render a record with a read-only app
    View {
        #[command(flatten)]
        build: BuildArgs,

        #[arg(long)]
        name: String,

        #[arg(long)]
        payload_file: Option<PathBuf>,
    },

    /// Digest a rendered document, hostile zone excluded
    Digest {
        file: PathBuf,

        #[arg(long, value_enum, default_value_t = DigestFormat::Hex)]
        format: DigestFormat,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DigestFormat {
    Hex,
    Sri,
}

fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    if json {
        tracing_subscriber::registry().with(env_filter).with(layer.json()).try_init().ok();
    } else {
        tracing_subscriber::registry().with(env_filter).with(layer).try_init().ok();
    }
}

fn fail(code: u8, error: impl std::fmt::Display) -> ExitCode {
    let output = serde_json::json!({
        "success": false,
        "error": error.to_string(),
    });
    println!("{}", output);
    ExitCode::from(code)
}

fn read_payload(path: &Option<PathBuf>) -> Result<String, std::io::Error> {
    match path {
        Some(p) => fs::read_to_string(p),
        None => Ok(String::new()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json, if cli.verbose { Level::DEBUG } else { Level::INFO });

    let mut registry = ManifestRegistry::builtin();
    if let Some(dir) = &cli.manifests {
        if let Err(e) = registry.load_from_dir(dir) {
            return fail(1, format!("Failed to load manifests: {}", e));
        }
    }

    let store = DirAssetStore::new(&cli.assets);
    let minifier = BuiltinMinifier;
    let bootstrapper = Bootstrapper::new(&store, &minifier);

    let compile = |args: &BuildArgs, expected: Option<AppVariant>| -> Result<CompiledTemplate, ExitCode> {
        let manifest = registry
            .get(&args.app)
            .ok_or_else(|| fail(1, format!("App not found: {}", args.app)))?;
        if let Some(variant) = expected {
            if manifest.variant != variant {
                return Err(fail(1, format!("App {} is {:?}, expected {:?}", args.app, manifest.variant, variant)));
            }
        }
        let options = BuildOptions {
            domain: args.domain.clone(),
            minimized: args.minify,
            dev: args.dev,
            ..Default::default()
        };
        bootstrapper
            .context_for(manifest, options)
            .and_then(|ctx| bootstrapper.build(&ctx))
            .map_err(|e| fail(2, e))
    };

    match cli.command {
        Commands::Apps => {
            let apps: Vec<_> = registry
                .list()
                .iter()
                .map(|m| serde_json::json!({
                    "name": m.name,
                    "shell": m.shell,
                    "variant": m.variant,
                    "scripts": m.scripts.len(),
                    "styles": m.styles.len(),
                }))
                .collect();
            match serde_json::to_string_pretty(&apps) {
                Ok(json) => {
                    println!("{}", json);
                    ExitCode::SUCCESS
                }
                Err(e) => fail(1, e),
            }
        }

        Commands::Build { build } => match compile(&build, None) {
            Ok(compiled) => match serde_json::to_string_pretty(compiled.manifest()) {
                Ok(json) => {
                    println!("{}", json);
                    ExitCode::SUCCESS
                }
                Err(e) => fail(1, e),
            },
            Err(code) => code,
        },

        Commands::Existing { build, name, payload_file } => {
            let payload = match read_payload(&payload_file) {
                Ok(p) => p,
                Err(e) => return fail(1, format!("Failed to read payload: {}", e)),
            };
            match compile(&build, Some(AppVariant::Editable)) {
                Ok(compiled) => {
                    print!("{}", AppRenderer::new(compiled).render_existing(&name, &payload));
                    ExitCode::SUCCESS
                }
                Err(code) => code,
            }
        }

        Commands::New { build, name, writekey } => match compile(&build, Some(AppVariant::Editable)) {
            Ok(compiled) => {
                print!("{}", AppRenderer::new(compiled).render_new(&name, &writekey));
                ExitCode::SUCCESS
            }
            Err(code) => code,
        },

        Commands::View { build, name, payload_file } => {
            let payload = match read_payload(&payload_file) {
                Ok(p) => p,
                Err(e) => return fail(1, format!("Failed to read payload: {}", e)),
            };
            match compile(&build, Some(AppVariant::ReadOnly)) {
                Ok(compiled) => {
                    print!("{}", ReadOnlyRenderer::new(compiled).render(&name, &payload));
                    ExitCode::SUCCESS
                }
                Err(code) => code,
            }
        }

        Commands::Digest { file, format } => {
            let document = match fs::read_to_string(&file) {
                Ok(d) => d,
                Err(e) => return fail(1, format!("Failed to read {}: {}", file.display(), e)),
            };
            let digest = match format {
                DigestFormat::Hex => app_digest_hex(&document, HOSTILE_MARKER),
                DigestFormat::Sri => app_digest_sri(&document, HOSTILE_MARKER),
            };
            println!("{}", digest);
            ExitCode::SUCCESS
        }
    }
}
