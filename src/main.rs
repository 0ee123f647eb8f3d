use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use webchat::app;
use webchat::config::{Config, WEBHOOK_URL_ENV};
use webchat::controller::ChatController;
use webchat::logging;
use webchat::transport::WebhookClient;
use webchat::ui::chat::transcript::display_text;

#[derive(Parser)]
#[command(name = "webchat")]
#[command(version)]
#[command(about = "Floating chat widget for webhook-driven assistants", long_about = None)]
struct Cli {
    /// Webhook endpoint, overriding the config file
    #[arg(long, global = true, env = WEBHOOK_URL_ENV)]
    webhook_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect or reset the persisted chat session
    Session {
        #[command(subcommand)]
        action: SessionCommand,
    },
    /// Print the previous session's transcript
    History,
    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum SessionCommand {
    /// Show the current session id, creating one if needed
    Show,
    /// Forget the session id so the next message starts a new session
    Reset,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Write a config file with default settings
    Init,
    /// Print where the config file lives
    Path,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(url) = cli.webhook_url {
        config.set_webhook_url(url);
    }

    let _log_guard = logging::init(&config.log_dir())?;

    match cli.command {
        None => app::run(config).await,
        Some(Commands::Session { action }) => session_command(&config, action),
        Some(Commands::History) => print_history(&config).await,
        Some(Commands::Config { action }) => config_command(&config, action),
    }
}

fn session_command(config: &Config, action: SessionCommand) -> Result<()> {
    let sessions = app::session_provider(config);
    match action {
        SessionCommand::Show => {
            println!("{}", sessions.session_id());
        }
        SessionCommand::Reset => {
            sessions.reset().context("Failed to reset session")?;
            println!("🧹 Session cleared. The next message starts a new conversation.");
        }
    }
    Ok(())
}

async fn print_history(config: &Config) -> Result<()> {
    let client = WebhookClient::new(config)?;
    let (controller, _events) = ChatController::new(
        client,
        app::session_provider(config),
        config.widget.error_text.clone(),
    );

    let Some(history) = controller.fetch_history().await else {
        println!("📭 No previous conversation.");
        return Ok(());
    };

    for message in history {
        let author = if message.is_user() {
            "You"
        } else {
            config.widget.assistant_name.as_str()
        };
        println!(
            "[{}] {}: {}",
            message.timestamp.format("%H:%M"),
            author,
            display_text(&message)
        );
    }
    Ok(())
}

fn config_command(config: &Config, action: ConfigCommand) -> Result<()> {
    match action {
        ConfigCommand::Init => {
            let path = config.config_path();
            if config.init_file()? {
                println!("✅ Wrote default config to {}", path.display());
            } else {
                println!("Config already exists at {}", path.display());
            }
        }
        ConfigCommand::Path => println!("{}", config.config_path().display()),
    }
    Ok(())
}
