use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use dtext_core::{DTextError, RenderOptions, render};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Render DText markup to HTML.
#[derive(Parser)]
#[command(name = "dtext", version, about)]
struct Cli {
    /// Input file. Reads stdin when omitted.
    input: Option<PathBuf>,

    /// Render without paragraphs, quotes, lists or tables.
    #[arg(long)]
    inline: bool,

    /// Allow `[color=#hex]` and named CSS colors.
    #[arg(long)]
    allow_color: bool,

    /// Render `{{search}}` links as quick tags.
    #[arg(long)]
    qtags: bool,

    /// Prefix for site-relative links.
    #[arg(long, env = "DTEXT_BASE_URL", default_value = "")]
    base_url: String,

    /// Domain of the site; links to it are not marked external.
    #[arg(long, env = "DTEXT_DOMAIN", default_value = "")]
    domain: String,

    /// Extra domains treated as internal. May be repeated.
    #[arg(long = "internal-domain")]
    internal_domains: Vec<String>,

    /// Print the HTML together with the collected references as JSON.
    #[arg(long)]
    json: bool,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("failed to read {source_name}: {source}")]
    Io {
        source_name: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Render(#[from] DTextError),
    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
}

impl Cli {
    fn options(&self) -> RenderOptions {
        let mut options = RenderOptions::default()
            .with_inline_only(self.inline)
            .with_allow_color(self.allow_color)
            .with_quick_tags(self.qtags)
            .with_base_url(self.base_url.as_str())
            .with_site_domain(self.domain.as_str());
        for domain in &self.internal_domains {
            options = options.with_internal_domain(domain.as_str());
        }
        options
    }

    fn read_source(&self) -> Result<String, CliError> {
        match &self.input {
            Some(path) => fs::read_to_string(path).map_err(|source| CliError::Io {
                source_name: path.display().to_string(),
                source,
            }),
            None => {
                let mut buffer = String::new();
                io::stdin()
                    .read_to_string(&mut buffer)
                    .map_err(|source| CliError::Io {
                        source_name: "stdin".to_string(),
                        source,
                    })?;
                Ok(buffer)
            }
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose && std::env::var_os("RUST_LOG").is_none() {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    if let Err(err) = run(&cli) {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let source = cli.read_source()?;
    let options = cli.options();
    tracing::debug!(bytes = source.len(), ?options, "rendering");

    let rendered = render(&source, &options)?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&rendered)?);
    } else {
        print!("{}", rendered.html);
    }
    Ok(())
}
