mod blog;
mod cmd_encode;
mod cmd_negotiate;
mod cmd_params;
mod request;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use request::RequestArgs;

#[derive(Parser, Debug)]
#[command(name = "sideload")]
#[command(about = "Encode, parse, and negotiate JSON:API documents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encode resources from a blog dataset as a JSON:API document
    Encode {
        /// Dataset file (JSON); the built-in sample blog when omitted
        #[arg(short, long)]
        dataset: Option<PathBuf>,

        /// Primary resource as TYPE:ID, repeat for a collection
        #[arg(long = "root", required = true)]
        roots: Vec<String>,

        /// Emit a collection even for a single root
        #[arg(long)]
        collection: bool,

        /// Emit resource identifiers only
        #[arg(long)]
        identifiers: bool,

        /// Prefix for every relative link, e.g. http://example.com
        #[arg(long)]
        url_prefix: Option<String>,

        /// Add a top-level jsonapi member with this version
        #[arg(long)]
        jsonapi_version: Option<String>,

        #[command(flatten)]
        request: RequestArgs,
    },
    /// Parse a query string into encoding parameters
    Params {
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Check Content-Type and Accept against application/vnd.api+json
    Negotiate {
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Print the built-in sample dataset
    Sample,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Encode {
            dataset,
            roots,
            collection,
            identifiers,
            url_prefix,
            jsonapi_version,
            request,
        } => cmd_encode::run(
            cmd_encode::EncodeArgs {
                dataset,
                roots,
                collection,
                identifiers,
                url_prefix,
                jsonapi_version,
            },
            request,
            cli.pretty,
        ),
        Commands::Params { request } => cmd_params::run(request, cli.pretty),
        Commands::Negotiate { request } => cmd_negotiate::run(request, cli.pretty),
        Commands::Sample => {
            println!("{}", blog::SAMPLE.trim());
            Ok(())
        }
    }
}
