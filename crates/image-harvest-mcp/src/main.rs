//! Image Harvest MCP server entry point.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use image_harvest::Harvester;
use image_harvest_mcp::config::ServerOptions;
use image_harvest_mcp::protocol::ProtocolHandler;
use image_harvest_mcp::tools::ToolRegistry;
use image_harvest_mcp::transport::StdioTransport;

#[derive(Parser)]
#[command(
    name = "image-harvest-mcp",
    about = "MCP server for Image Harvest: collect full-size images for a search query",
    version
)]
struct Cli {
    #[command(flatten)]
    server: ServerArgs,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Clone, Default)]
struct ServerArgs {
    /// Directory that per-query image folders are created in.
    /// Also reads IMAGE_HARVEST_DIR.
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Path to the Chrome/Chromium binary.
    /// Also reads IMAGE_HARVEST_CHROME.
    #[arg(long, global = true)]
    chrome: Option<PathBuf>,

    /// Show the browser window instead of running headless.
    #[arg(long, global = true)]
    headful: bool,

    /// How many times to scroll for more results before giving up.
    #[arg(long, global = true)]
    scroll_budget: Option<u32>,
}

impl From<ServerArgs> for ServerOptions {
    fn from(args: ServerArgs) -> Self {
        ServerOptions {
            output_dir: args.output_dir,
            chrome: args.chrome,
            headful: args.headful,
            scroll_budget: args.scroll_budget,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server over stdio (default).
    Serve,

    /// Print server capabilities and resolved settings as JSON.
    Info,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   image-harvest-mcp completions bash > ~/.local/share/bash-completion/completions/image-harvest-mcp
    ///   image-harvest-mcp completions zsh > ~/.zfunc/_image-harvest-mcp
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let options = ServerOptions::from(cli.server.clone());

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let config = options.harvest_config();
            tracing::info!("Image Harvest MCP server");
            tracing::info!("Output: {}", config.output_root.display());
            let launcher = options.launcher(&config);
            let harvester = Arc::new(Harvester::new(config, launcher));
            let transport = StdioTransport::new(ProtocolHandler::new(harvester));
            transport.run().await?;
        }

        Commands::Info => {
            let capabilities = image_harvest_mcp::types::InitializeResult::default_result();
            let config = options.harvest_config();
            let tools = ToolRegistry::list_tools();
            let info = serde_json::json!({
                "server": capabilities.server_info,
                "protocol_version": capabilities.protocol_version,
                "capabilities": capabilities.capabilities,
                "tools": tools.iter().map(|t| &t.name).collect::<Vec<_>>(),
                "tool_count": tools.len(),
                "output_root": config.output_root,
                "browser": config.browser.executable,
                "headless": config.browser.headless,
                "scroll_budget": config.scroll_budget,
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(
                shell,
                &mut cmd,
                "image-harvest-mcp",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}
