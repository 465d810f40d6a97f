mod client;
mod serve;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "routinely", about = "Personal task and routine manager")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server and the reminder scheduler
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Add a task from a natural-language description
    Add {
        /// What to do, e.g. "call mom at 3pm tomorrow"
        text: String,

        #[command(flatten)]
        server: ServerArgs,
    },
    /// List tasks
    List {
        /// Include completed tasks
        #[arg(short, long)]
        all: bool,

        #[command(flatten)]
        server: ServerArgs,
    },
    /// Mark a task completed
    Done {
        /// Task id
        id: i64,

        #[command(flatten)]
        server: ServerArgs,
    },
    /// Delete a task
    Rm {
        /// Task id
        id: i64,

        #[command(flatten)]
        server: ServerArgs,
    },
    /// Chat with the assistant
    Chat {
        /// Message to send
        message: String,

        #[command(flatten)]
        server: ServerArgs,
    },
    /// Show scheduler status
    Status {
        #[command(flatten)]
        server: ServerArgs,
    },
    /// Check server health
    Health {
        #[command(flatten)]
        server: ServerArgs,
    },
}

#[derive(clap::Args)]
struct ServerArgs {
    /// Server base URL
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    url: String,

    /// Bearer token for authentication
    #[arg(long)]
    token: Option<String>,
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let rt = tokio::runtime::Runtime::new()?;

    match cli.command {
        Commands::Serve { port } => {
            rt.block_on(serve::run_serve(port))?;
        }
        Commands::Add { text, server } => {
            rt.block_on(client::run_add(text, server.url, server.token))?;
        }
        Commands::List { all, server } => {
            rt.block_on(client::run_list(all, server.url, server.token))?;
        }
        Commands::Done { id, server } => {
            rt.block_on(client::run_done(id, server.url, server.token))?;
        }
        Commands::Rm { id, server } => {
            rt.block_on(client::run_rm(id, server.url, server.token))?;
        }
        Commands::Chat { message, server } => {
            rt.block_on(client::run_chat(message, server.url, server.token))?;
        }
        Commands::Status { server } => {
            rt.block_on(client::run_status(server.url, server.token))?;
        }
        Commands::Health { server } => {
            rt.block_on(client::run_health(server.url, server.token))?;
        }
    }

    Ok(())
}
