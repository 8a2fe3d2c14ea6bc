use anyhow::Result;
use clap::{Parser, Subcommand};
use silverhand::config::Paths;
use silverhand::mods::ModMetadataPatch;
use silverhand::{App, Config};
use std::collections::BTreeSet;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "silverhand")]
#[command(
    author,
    version,
    about = "A non-destructive mod loader for Cyberpunk 2077"
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Imported mods directory override for this invocation
    #[arg(long)]
    mods_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage imported mods
    Mod {
        #[command(subcommand)]
        action: ModCommands,
    },

    /// Show or change the load order
    Order {
        #[command(subcommand)]
        action: OrderCommands,
    },

    /// Manage profiles
    Profile {
        #[command(subcommand)]
        action: ProfileCommands,
    },

    /// Game installation and frameworks
    Game {
        #[command(subcommand)]
        action: GameCommands,
    },

    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: SettingsCommands,
    },

    /// Preview the merged tree and list conflicting files
    Conflicts {
        /// List every conflicting path
        #[arg(long)]
        verbose: bool,
    },

    /// Build the virtual environment and start the game
    Launch {
        /// Stay attached until the game exits
        #[arg(long)]
        wait: bool,
    },

    /// Delete the virtual environment
    Clean,

    /// Show current status
    Status,
}

#[derive(Subcommand)]
enum ModCommands {
    /// List imported mods
    List,
    /// Import mods from zip archives
    Import {
        #[arg(required = true)]
        archives: Vec<String>,
        /// Enable each mod after importing it
        #[arg(long)]
        enable: bool,
    },
    /// Enable mods
    Enable {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Disable mods
    Disable {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Delete a mod
    Remove { id: String },
    /// Show mod info
    Info { id: String },
    /// Edit mod metadata
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        version: Option<String>,
        /// Replace tags (comma separated, empty clears)
        #[arg(long)]
        tags: Option<String>,
    },
    /// Open a mod's folder in the file browser
    Open { id: String },
    /// List known categories and tags
    Categories,
}

#[derive(Subcommand)]
enum OrderCommands {
    /// Show the load order
    Show,
    /// Replace the load order (lowest precedence first)
    Set {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Move a mod to a position (1 = lowest precedence)
    Move { id: String, position: usize },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// List profiles
    List,
    /// Save the current mods and order as a profile
    Save {
        key: String,
        /// Display name
        #[arg(long)]
        name: Option<String>,
    },
    /// Switch to a profile
    Switch { key: String },
    /// Delete a profile
    Delete { key: String },
}

#[derive(Subcommand)]
enum GameCommands {
    /// Set the game installation directory
    SetPath { path: String },
    /// Open the installation (or virtual environment) in the file browser
    Open {
        #[arg(long = "virtual")]
        virtual_env: bool,
    },
    /// Check which frameworks are installed
    Frameworks,
    /// Describe the known frameworks
    ListFrameworks,
    /// Scan a script compiler log for missing frameworks
    CheckLog { path: String },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Show current settings
    Show,
    /// Set the mirror method: symlink, hardlink, copy
    Mirror { method: String },
    /// Run the game through a wrapper command (e.g. wine)
    Wrapper { command: String },
    /// Run the game directly
    ClearWrapper,
}

fn setup_logging(verbosity: u8, paths: &Paths) {
    let filter = match verbosity {
        0 => "silverhand=info",
        1 => "silverhand=debug",
        2 => "silverhand=trace",
        _ => "trace",
    };

    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let log_dir = paths.logs_dir();
    std::fs::create_dir_all(&log_dir).ok();
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("silverhand.log"));

    match file {
        Ok(file) => tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(std::sync::Arc::new(file)),
            )
            .init(),
        Err(e) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .init();
            tracing::warn!("Logging to stderr only: {}", e);
        }
    }
}

fn edit_patch(
    name: Option<String>,
    description: Option<String>,
    category: Option<String>,
    author: Option<String>,
    version: Option<String>,
    tags: Option<String>,
) -> ModMetadataPatch {
    ModMetadataPatch {
        display_name: name,
        description,
        category,
        author,
        version,
        tags: tags.map(|t| {
            t.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect::<BTreeSet<_>>()
        }),
        ..ModMetadataPatch::default()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = Paths::new();
    setup_logging(cli.verbose, &paths);

    // Load configuration
    let mut config = Config::load_with(paths).await?;
    if let Some(mods_dir) = cli.mods_dir.as_deref() {
        let trimmed = mods_dir.trim();
        if trimmed.is_empty() {
            anyhow::bail!("--mods-dir cannot be empty");
        }
        config.mods_dir_override = Some(trimmed.to_string());
    }

    let app = App::new(config).await?;

    match cli.command {
        Commands::Mod { action } => match action {
            ModCommands::List => app.cmd_mod_list().await?,
            ModCommands::Import { archives, enable } => {
                app.cmd_mod_import(&archives, enable).await?
            }
            ModCommands::Enable { ids } => app.cmd_mod_enable(&ids).await?,
            ModCommands::Disable { ids } => app.cmd_mod_disable(&ids).await?,
            ModCommands::Remove { id } => app.cmd_mod_remove(&id).await?,
            ModCommands::Info { id } => app.cmd_mod_info(&id).await?,
            ModCommands::Edit {
                id,
                name,
                description,
                category,
                author,
                version,
                tags,
            } => {
                let patch = edit_patch(name, description, category, author, version, tags);
                app.cmd_mod_edit(&id, patch).await?
            }
            ModCommands::Open { id } => app.cmd_mod_open(&id).await?,
            ModCommands::Categories => app.cmd_mod_categories().await?,
        },
        Commands::Order { action } => match action {
            OrderCommands::Show => app.cmd_order_show().await?,
            OrderCommands::Set { ids } => app.cmd_order_set(ids).await?,
            OrderCommands::Move { id, position } => app.cmd_order_move(&id, position).await?,
        },
        Commands::Profile { action } => match action {
            ProfileCommands::List => app.cmd_profile_list().await?,
            ProfileCommands::Save { key, name } => {
                app.cmd_profile_save(&key, name.as_deref()).await?
            }
            ProfileCommands::Switch { key } => app.cmd_profile_switch(&key).await?,
            ProfileCommands::Delete { key } => app.cmd_profile_delete(&key).await?,
        },
        Commands::Game { action } => match action {
            GameCommands::SetPath { path } => app.cmd_game_set_path(&path).await?,
            GameCommands::Open { virtual_env } => app.cmd_game_open(virtual_env).await?,
            GameCommands::Frameworks => app.cmd_game_frameworks().await?,
            GameCommands::ListFrameworks => app.cmd_game_list_frameworks().await?,
            GameCommands::CheckLog { path } => app.cmd_game_check_log(&path).await?,
        },
        Commands::Settings { action } => match action {
            SettingsCommands::Show => app.cmd_settings_show().await?,
            SettingsCommands::Mirror { method } => app.cmd_settings_mirror(&method).await?,
            SettingsCommands::Wrapper { command } => {
                app.cmd_settings_wrapper(Some(&command)).await?
            }
            SettingsCommands::ClearWrapper => app.cmd_settings_wrapper(None).await?,
        },
        Commands::Conflicts { verbose } => app.cmd_conflicts(verbose).await?,
        Commands::Launch { wait } => app.cmd_launch(wait).await?,
        Commands::Clean => app.cmd_clean().await?,
        Commands::Status => app.cmd_status().await?,
    }

    Ok(())
}
