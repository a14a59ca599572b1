use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod bookmarks;
mod catalog;
mod csv;
mod error;
mod favorites;
mod interchange;
mod library;
mod settings;
mod storage;
mod watch;

use catalog::{RestCatalogClient, fetch_details};
use interchange::Interchange;
use library::Library;
use settings::Settings;
use storage::FileStorage;

#[derive(Debug, Parser)]
#[command(
    name = "anishelf",
    about = "Keep anime favorites and continue-watching bookmarks.",
    version
)]
struct Cli {
    /// Directory for saved favorites and bookmarks.
    #[arg(long, value_name = "DIR", global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Manage favorite titles.
    #[command(subcommand)]
    Favorites(FavoritesCommand),
    /// Bookmark an episode as the one you are watching.
    Mark { id: String, episode: u32 },
    /// Remove the bookmark of a title.
    Unmark { id: String },
    /// Show favorite and bookmark state of a title.
    Status {
        id: String,
        #[arg(short = 'e', long, value_name = "EPISODE")]
        episode: Option<u32>,
    },
    /// Pick a bookmark and open its player page.
    Continue {
        /// Print the link instead of opening it.
        #[arg(long)]
        print: bool,
    },
    /// Write favorites to a CSV file.
    Export {
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,
    },
    /// Add favorites from a CSV file with an `id` column.
    Import { file: PathBuf },
    /// Favorite every bookmarked title that is missing from favorites.
    Reconcile,
    /// Print the effective settings.
    Config,
}

#[derive(Debug, Subcommand)]
enum FavoritesCommand {
    Add { id: String },
    Remove { id: String },
    Has { id: String },
    List {
        /// Look up titles in the catalog.
        #[arg(long)]
        details: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let result = run().await;
    if let Err(err) = &result {
        eprintln!("error: {err:?}");
    }
    result
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load()?;
    init_tracing(&settings.log_filter);

    let storage = FileStorage::new(settings.storage_dir(cli.data_dir.as_deref())?);
    tracing::debug!(dir = %storage.dir().display(), "using data directory");
    let mut library = Library::open(Arc::new(storage));
    let interchange = Interchange::new();

    match cli.command {
        Command::Favorites(command) => run_favorites(command, &mut library, &settings).await?,
        Command::Mark { id, episode } => match library.mark_episode(&id, episode) {
            Ok(outcome) if outcome.favorited => {
                println!("Marked {id} at episode {episode} and added it to favorites.")
            }
            Ok(_) => println!("Marked {id} at episode {episode}."),
            Err(err) => println!("{}", err.message()),
        },
        Command::Unmark { id } => {
            if library.unmark(&id) {
                println!("Removed the bookmark for {id}.");
            } else {
                println!("{id} has no bookmark.");
            }
        }
        Command::Status { id, episode } => print_status(&library, &id, episode),
        Command::Continue { print } => run_continue(&library, &settings, print)?,
        Command::Export { out } => {
            run_export(&interchange, &library, &settings, out.as_deref()).await?
        }
        Command::Import { file } => run_import(&interchange, &mut library, &file).await?,
        Command::Reconcile => {
            let repaired = library.reconcile();
            if repaired.is_empty() {
                println!("Favorites and bookmarks already agree.");
            } else {
                println!(
                    "Added {} bookmarked titles to favorites: {}",
                    repaired.len(),
                    repaired.join(", ")
                );
            }
        }
        Command::Config => print!("{}", settings.to_toml()?),
    }
    Ok(())
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn catalog_client(settings: &Settings) -> Result<RestCatalogClient> {
    RestCatalogClient::new(&settings.catalog_url, settings.request_timeout())
}

async fn run_favorites(
    command: FavoritesCommand,
    library: &mut Library,
    settings: &Settings,
) -> Result<()> {
    match command {
        FavoritesCommand::Add { id } => match library.add_favorite(&id) {
            Ok(true) => println!("Added {id} to favorites."),
            Ok(false) => println!("{id} is already a favorite."),
            Err(err) => println!("{}", err.message()),
        },
        FavoritesCommand::Remove { id } => {
            if library.remove_favorite(&id) {
                println!("Removed {id} from favorites.");
            } else {
                println!("{id} is not a favorite.");
            }
        }
        FavoritesCommand::Has { id } => {
            if library.is_favorite(&id) {
                println!("{id} is a favorite.");
            } else {
                println!("{id} is not a favorite.");
            }
        }
        FavoritesCommand::List { details } => {
            let ids = library.favorites().list();
            if ids.is_empty() {
                println!("No favorites yet. Add one with `anishelf favorites add <ID>`.");
                return Ok(());
            }
            let cards = if details {
                let catalog = catalog_client(settings)?;
                fetch_details(&catalog, &ids).await
            } else {
                vec![None; ids.len()]
            };
            for (id, card) in ids.iter().zip(cards) {
                let mut line = match card {
                    Some(detail) => match detail.total_episodes {
                        Some(total) => format!("{id}  {} ({total} episodes)", detail.title),
                        None => format!("{id}  {}", detail.title),
                    },
                    None => id.clone(),
                };
                if let Some(episode) = library.bookmark(id) {
                    line.push_str(&format!("  [watching episode {episode}]"));
                }
                println!("{line}");
            }
        }
    }
    Ok(())
}

fn print_status(library: &Library, id: &str, episode: Option<u32>) {
    let favorite = if library.is_favorite(id) {
        "a favorite"
    } else {
        "not a favorite"
    };
    match library.bookmark(id) {
        Some(current) => println!("{id} is {favorite}, bookmarked at episode {current}."),
        None => println!("{id} is {favorite}, with no bookmark."),
    }
    if let Some(episode) = episode {
        if library.is_bookmarked(id, episode) {
            println!("Episode {episode} is the bookmarked episode.");
        } else {
            println!("Episode {episode} is not the bookmarked episode.");
        }
    }
}

fn run_continue(library: &Library, settings: &Settings, print: bool) -> Result<()> {
    let entries = library.continue_watching();
    if entries.is_empty() {
        println!("Nothing to continue. Bookmark an episode with `anishelf mark <ID> <EPISODE>`.");
        return Ok(());
    }
    let Some(entry) = watch::select_entry(&entries)? else {
        println!("Cancelled.");
        return Ok(());
    };
    let link = watch::watch_link(&settings.watch_url, &entry.title_id, entry.episode)?;
    if print {
        println!("{link}");
        return Ok(());
    }
    if let Err(err) = watch::open_link(&link) {
        tracing::warn!(error = %format!("{err:#}"), "could not open browser");
        println!("Could not open a browser. Visit {link}");
    } else {
        println!("Opening {} episode {}.", entry.title_id, entry.episode);
    }
    Ok(())
}

async fn run_export(
    interchange: &Interchange,
    library: &Library,
    settings: &Settings,
    out: Option<&Path>,
) -> Result<()> {
    let catalog = catalog_client(settings)?;
    let outcome = match interchange.export(library, &catalog).await {
        Ok(outcome) => outcome,
        Err(err) => {
            println!("{}", err.message());
            return Ok(());
        }
    };
    if let Some(file) = outcome.file() {
        let dir = match out {
            Some(dir) => dir.to_path_buf(),
            None => std::env::current_dir().context("failed to resolve current directory")?,
        };
        let path = dir.join(&settings.export_file_name);
        tokio::fs::write(&path, &file.contents)
            .await
            .with_context(|| format!("failed to write export file {}", path.display()))?;
        println!("{} Saved to {}.", outcome.message(), path.display());
    } else {
        println!("{}", outcome.message());
    }
    Ok(())
}

async fn run_import(interchange: &Interchange, library: &mut Library, file: &Path) -> Result<()> {
    let text = match tokio::fs::read_to_string(file).await {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(path = %file.display(), error = %err, "failed to read import file");
            println!("Could not read {}.", file.display());
            return Ok(());
        }
    };
    match interchange.import(library, &text) {
        Ok(outcome) => println!("{}", outcome.message()),
        Err(err) => println!("{}", err.message()),
    }
    Ok(())
}
