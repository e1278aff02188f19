//! BucketDeck CLI — Terminal front end for an Appwrite file bucket
//!
//! Usage:
//!   bucketdeck-cli configure --project <id> --bucket <id> --session <secret>
//!   bucketdeck-cli ls [--filter images] [--sort size] [--search term]
//!   bucketdeck-cli upload <paths...>       Upload files one after another
//!   bucketdeck-cli rm <id> [--yes]         Delete a file
//!   bucketdeck-cli download <id> [--print] Open (or print) the download link
//!   bucketdeck-cli preview <id>            Show preview link or file details
//!   bucketdeck-cli usage                   Used space against the quota
//!   bucketdeck-cli logout                  End the session

use anyhow::Context;
use bucketdeck::dashboard_config::{
    clear_session_secret, config_path, load_config, load_config_from, save_config,
};
use bucketdeck::{
    format_file_size, DeleteOutcome, FileViewController, Landing, Preview, RenderedView,
    SortKey, UploadFile, UploadProgress, ViewError, ViewEvents, ViewFilter, ViewState,
};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex};
use tracing::Level;
use url::Url;

#[derive(Parser)]
#[command(
    name = "bucketdeck-cli",
    about = "BucketDeck CLI — Browse and manage files in an Appwrite storage bucket",
    version,
    long_about = "Reads connection settings from the config file written by `configure`.\nEnvironment overrides: BUCKETDECK_ENDPOINT, BUCKETDECK_PROJECT, BUCKETDECK_BUCKET, BUCKETDECK_SESSION, BUCKETDECK_QUOTA_BYTES"
)]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store connection settings
    Configure {
        /// API endpoint (e.g., https://cloud.appwrite.io/v1)
        #[arg(long)]
        endpoint: Option<String>,
        /// Project ID
        #[arg(long)]
        project: Option<String>,
        /// Storage bucket ID
        #[arg(long)]
        bucket: Option<String>,
        /// Session secret of a signed-in user
        #[arg(long)]
        session: Option<String>,
        /// Quota used for the usage summary
        #[arg(long)]
        quota_bytes: Option<u64>,
    },
    /// Show the signed-in user
    Whoami,
    /// List files
    Ls {
        /// all, recent, images, documents or trash
        #[arg(long, default_value = "all")]
        filter: ViewFilter,
        /// name, date, size or type
        #[arg(long, default_value = "name")]
        sort: SortKey,
        /// Case-insensitive name filter
        #[arg(long, default_value = "")]
        search: String,
        /// Print the rendered view as JSON
        #[arg(long)]
        json: bool,
    },
    /// Upload local files
    Upload {
        /// Local file paths
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Delete a file
    Rm {
        /// File ID
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Open the download link of a file
    Download {
        /// File ID
        id: String,
        /// Only print the link
        #[arg(long)]
        print: bool,
    },
    /// Show the preview of a file
    Preview {
        /// File ID
        id: String,
    },
    /// Show used space against the quota
    Usage,
    /// End the current session
    Logout,
}

/// Terminal implementation of the controller's UI hooks
struct TerminalEvents {
    assume_yes: bool,
    open_links: bool,
    bar: Mutex<Option<ProgressBar>>,
}

impl TerminalEvents {
    fn new(assume_yes: bool, open_links: bool) -> Self {
        Self { assume_yes, open_links, bar: Mutex::new(None) }
    }
}

impl ViewEvents for TerminalEvents {
    fn upload_progress(&self, progress: &UploadProgress) {
        let Ok(mut slot) = self.bar.lock() else { return };
        let bar = slot.get_or_insert_with(|| {
            let bar = ProgressBar::new(100);
            if let Ok(style) = ProgressStyle::with_template("{bar:30.cyan/blue} {pos:>3}% {msg}") {
                bar.set_style(style);
            }
            bar
        });
        bar.set_position((progress.fraction() * 100.0).round() as u64);
        bar.set_message(progress.label());
    }

    fn upload_finished(&self, _uploaded: usize, _total: usize) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(bar) = slot.take() {
                bar.finish_and_clear();
            }
        }
    }

    fn open_url(&self, url: &Url) {
        if !self.open_links {
            return;
        }
        if let Err(e) = open::that(url.as_str()) {
            eprintln!("Could not open browser ({}), link: {}", e, url);
        }
    }

    fn alert(&self, error: &ViewError) {
        eprintln!("Error: {}", error);
    }

    fn redirect(&self, to: Landing) {
        match to {
            Landing::Login => eprintln!(
                "Not signed in or session expired. Run `bucketdeck-cli configure --session <secret>`."
            ),
            Landing::Home => println!("Signed out."),
        }
    }

    fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        eprint!("{} [y/N] ", prompt);
        let _ = std::io::stderr().flush();
        let mut answer = String::new();
        if std::io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::ERROR };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_view(view: &RenderedView) {
    println!("{} ({})", view.title, view.count_label);
    if view.is_empty() {
        println!("  No files yet");
        return;
    }
    for card in &view.cards {
        println!(
            "  {:<20}  {:<7}  {:<32}  {:>10}  {}",
            card.id,
            card.icon.label(),
            card.name,
            card.size,
            card.age
        );
    }
}

fn controller(events: Arc<TerminalEvents>, view: ViewState) -> anyhow::Result<FileViewController> {
    let config = load_config()?;
    config.validate()?;
    Ok(FileViewController::from_config(&config)?.with_events(events).with_view(view))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Configure { endpoint, project, bucket, session, quota_bytes } => {
            let path = config_path();
            let mut config = load_config_from(&path);
            if let Some(v) = endpoint {
                config.endpoint = v;
            }
            if let Some(v) = project {
                config.project_id = v;
            }
            if let Some(v) = bucket {
                config.bucket_id = v;
            }
            if let Some(v) = session {
                config.session_secret = Some(v);
            }
            if let Some(v) = quota_bytes {
                config.quota_bytes = v;
            }
            save_config(&config, &path)?;
            println!("Saved {}", path.display());
            if let Err(e) = config.validate() {
                println!("Note: {}", e);
            }
        }
        Commands::Whoami => {
            let events = Arc::new(TerminalEvents::new(false, false));
            let mut ctl = controller(events, ViewState::default())?;
            let session = ctl.initialize().await?;
            match session.email {
                Some(email) => println!("{} <{}> ({})", session.user_name, email, session.user_id),
                None => println!("{} ({})", session.user_name, session.user_id),
            }
        }
        Commands::Ls { filter, sort, search, json } => {
            let events = Arc::new(TerminalEvents::new(false, false));
            let mut ctl = controller(events, ViewState::new(filter, sort, search))?;
            ctl.initialize().await?;
            let view = ctl.render();
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_view(&view);
            }
        }
        Commands::Upload { paths } => {
            let mut files = Vec::with_capacity(paths.len());
            for path in &paths {
                let file = UploadFile::from_path(path)
                    .await
                    .with_context(|| format!("Cannot read {}", path))?;
                files.push(file);
            }

            let events = Arc::new(TerminalEvents::new(false, false));
            let mut ctl = controller(events, ViewState::default())?;
            ctl.initialize().await?;
            for meta in ctl.upload(&files).await? {
                println!("Uploaded {} ({}, {})", meta.name, meta.id, format_file_size(meta.size_bytes));
            }
        }
        Commands::Rm { id, yes } => {
            let events = Arc::new(TerminalEvents::new(yes, false));
            let mut ctl = controller(events, ViewState::default())?;
            ctl.initialize().await?;
            match ctl.delete_one(&id).await? {
                DeleteOutcome::Deleted => println!("Deleted {}", id),
                DeleteOutcome::Cancelled => println!("Cancelled"),
            }
        }
        Commands::Download { id, print } => {
            let events = Arc::new(TerminalEvents::new(false, !print));
            let ctl = controller(events, ViewState::default())?;
            let url = ctl.download(&id)?;
            println!("{}", url);
        }
        Commands::Preview { id } => {
            let events = Arc::new(TerminalEvents::new(false, false));
            let mut ctl = controller(events, ViewState::default())?;
            ctl.initialize().await?;
            match ctl.preview(&id)? {
                Preview::Image { name, url } => {
                    println!("{}", name);
                    println!("  preview: {}", url);
                }
                Preview::Details { name, icon, size, mime_type, created } => {
                    println!("{}", name);
                    println!("  kind:    {}", icon.label());
                    println!("  type:    {}", mime_type);
                    println!("  size:    {}", size);
                    println!("  created: {}", created);
                }
            }
        }
        Commands::Usage => {
            let events = Arc::new(TerminalEvents::new(false, false));
            let mut ctl = controller(events, ViewState::default())?;
            ctl.initialize().await?;
            let usage = ctl.usage();
            println!(
                "{} of {} used ({:.1}%)",
                format_file_size(usage.used),
                format_file_size(usage.total),
                usage.percent()
            );
        }
        Commands::Logout => {
            // no bucket needed to end a session
            let events = Arc::new(TerminalEvents::new(false, false));
            let ended = match load_config()
                .map_err(anyhow::Error::from)
                .and_then(|config| Ok(FileViewController::from_config(&config)?))
            {
                Ok(ctl) => {
                    let mut ctl = ctl.with_events(events);
                    ctl.logout().await.map_err(anyhow::Error::from)
                }
                Err(e) => {
                    events.redirect(Landing::Home);
                    Err(e)
                }
            };

            clear_session_secret(&config_path())?;
            if let Err(e) = ended {
                eprintln!("Warning: {:#}", e);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        // controller errors have already been shown through alert/redirect
        if e.downcast_ref::<ViewError>().is_none() {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }
}
