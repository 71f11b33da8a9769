//! evelink CLI
//!
//! Command-line client for Eve REST document stores.
//!
//! # Commands
//!
//! - `get` - Fetch a document, optionally conditional on an etag
//! - `list` - List the documents of a resource
//! - `post` / `put` - Create or replace a document
//! - `delete` - Delete a document, conditional on its etag
//! - `clear` - Delete every document of a resource

mod commands;

use clap::{Args, Parser, Subcommand};
use commands::Format;
use evelink_client::{ClientConfig, EveClient, StaticAuthorization, Transport};
use tracing_subscriber::EnvFilter;

/// Command-line client for Eve REST document stores.
#[derive(Parser)]
#[command(name = "evelink")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    connection: Connection,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// How to reach the service.
#[derive(Args)]
struct Connection {
    /// Base address of the service
    #[arg(global = true, short, long)]
    base_url: Option<String>,

    /// Value of the Authorization header
    #[arg(global = true, short, long)]
    authorization: Option<String>,

    /// Extra header sent with every request (NAME=VALUE)
    #[arg(global = true, short = 'H', long = "header", value_parser = commands::parse_header)]
    headers: Vec<(String, String)>,
}

impl Connection {
    fn connect(&self) -> Result<EveClient, Box<dyn std::error::Error>> {
        let base_url = self.base_url.as_deref().ok_or("--base-url is required")?;
        let mut config = ClientConfig::new(base_url);
        for (name, value) in &self.headers {
            config = config.with_header(name.as_str(), value.as_str());
        }
        let mut client = EveClient::http(config)?;
        if let Some(authorization) = &self.authorization {
            client = client.with_authenticator(StaticAuthorization::new(authorization.as_str()));
        }
        Ok(client)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a document by id
    Get {
        /// Resource name
        resource: String,

        /// Document id
        id: String,

        /// Known etag; an unchanged document is reported as not modified
        #[arg(short, long)]
        etag: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// List the documents of a resource
    List {
        /// Resource name
        resource: String,

        /// Filter object, e.g. '{"name": "Acme"}'
        #[arg(short = 'w', long = "where")]
        filter: Option<String>,

        /// Only documents modified after this RFC 1123 date
        #[arg(short, long)]
        since: Option<String>,

        /// Include soft-deleted documents
        #[arg(short = 'd', long)]
        show_deleted: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Create a document from a JSON object, or several from a JSON array
    Post {
        /// Resource name
        resource: String,

        /// Document body
        json: String,
    },

    /// Replace a document; the JSON must carry `_id` and `_etag`
    Put {
        /// Resource name
        resource: String,

        /// Document body
        json: String,
    },

    /// Delete a document
    Delete {
        /// Resource name
        resource: String,

        /// Document id
        id: String,

        /// Current etag of the document
        #[arg(short, long)]
        etag: String,
    },

    /// Delete every document of a resource
    Clear {
        /// Resource name
        resource: String,

        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let output = match cli.command {
        Commands::Version => format!("evelink CLI v{}", env!("CARGO_PKG_VERSION")),
        command => {
            let client = cli.connection.connect()?;
            execute(&client, command).await?
        }
    };

    println!("{output}");
    Ok(())
}

async fn execute<T: Transport>(
    client: &EveClient<T>,
    command: Commands,
) -> Result<String, Box<dyn std::error::Error>> {
    let output = match command {
        Commands::Get {
            resource,
            id,
            etag,
            format,
        } => commands::get::run(client, &resource, &id, etag.as_deref(), format).await?,
        Commands::List {
            resource,
            filter,
            since,
            show_deleted,
            format,
        } => {
            let options = commands::list::ListOptions {
                filter,
                since,
                show_deleted,
            };
            commands::list::run(client, &resource, &options, format).await?
        }
        Commands::Post { resource, json } => commands::write::post(client, &resource, &json).await?,
        Commands::Put { resource, json } => commands::write::put(client, &resource, &json).await?,
        Commands::Delete { resource, id, etag } => {
            commands::delete::run(client, &resource, &id, &etag).await?
        }
        Commands::Clear { resource, yes } => commands::delete::clear(client, &resource, yes).await?,
        Commands::Version => format!("evelink CLI v{}", env!("CARGO_PKG_VERSION")),
    };
    Ok(output)
}
