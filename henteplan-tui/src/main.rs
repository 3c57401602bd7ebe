//! Command line and terminal UI for looking up Norwegian waste pickup schedules.

mod app;
mod input;
mod logging;
mod ui;
mod wiring;

use std::{io, path::PathBuf, sync::Arc, time::Duration as StdDuration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event as CEvent},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use henteplan_core::{HenteplanService, LocationId, ProviderId, config::ConfigLoader};
use ratatui::{Terminal, backend::CrosstermBackend};
use serde::Serialize;
use tracing::{debug, info};

use crate::app::{App, detect_query};
use crate::input::Action;

#[derive(Debug, Parser)]
#[command(name = "henteplan", version, about = "Tømmekalender for norske renovasjonsselskap")]
struct Cli {
    /// TOML configuration file (default: ./henteplan.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List registered providers
    Providers,
    /// Guess the provider for a postal code or city
    Detect {
        #[arg(long)]
        postal_code: Option<String>,
        #[arg(long)]
        city: Option<String>,
    },
    /// Search addresses, in one provider or all of them
    Search {
        #[arg(long)]
        provider: Option<String>,
        query: String,
    },
    /// Upcoming pickups for a location key returned by `search`
    Schedule { provider: String, location: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loader = match &cli.config {
        Some(path) => ConfigLoader::new().with_config_path(path),
        None => ConfigLoader::new(),
    };
    let config = loader.load().context("loading configuration")?;

    let interactive = cli.command.is_none();
    let _guard = logging::init_logging(&config.logging, interactive)?;
    debug!(?config, "configuration loaded");

    let client = config.http.build_client()?;
    let service = Arc::new(wiring::build_service(&client));

    match cli.command {
        Some(command) => run_command(&service, command).await,
        None => run_tui(service).await,
    }
}

async fn run_command(service: &HenteplanService, command: Command) -> Result<()> {
    match command {
        Command::Providers => print_json(&service.providers()),
        Command::Detect { postal_code, city } => {
            let found = service.detect(postal_code.as_deref(), city.as_deref()).await;
            print_json(&found)
        }
        Command::Search { provider, query } => {
            let provider_id = provider.map(ProviderId);
            let matches = service.search(provider_id.as_ref(), &query).await?;
            info!(count = matches.len(), "search finished");
            print_json(&matches)
        }
        Command::Schedule { provider, location } => {
            let pickups = service
                .schedule(&ProviderId(provider), &LocationId(location))
                .await?;
            print_json(&*pickups)
        }
    }
}

#[expect(clippy::print_stdout, reason = "subcommands write their result to stdout")]
fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

async fn run_tui(service: Arc<HenteplanService>) -> Result<()> {
    let app = App::new(service);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run(&mut terminal, app).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res
}

async fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, mut app: App) -> Result<()> {
    loop {
        terminal.draw(|frame| ui::draw(frame, &app))?;

        // Short timeout keeps CPU low
        if !event::poll(StdDuration::from_millis(100))? {
            continue;
        }
        let CEvent::Key(key) = event::read()? else {
            continue;
        };

        let action = input::handle_key_event(key, &mut app);
        if action == Action::Quit {
            return Ok(());
        }
        if action == Action::None {
            continue;
        }

        app.is_loading = true;
        app.error_message = None;
        terminal.draw(|frame| ui::draw(frame, &app))?;

        app.error_message = match action {
            Action::DetectProvider => detect_provider(&mut app).await,
            Action::SearchAddresses => search_addresses(&mut app).await,
            Action::LoadScheduleForCurrentAddress => load_schedule(&mut app).await,
            Action::Quit | Action::None => None,
        };
        app.is_loading = false;
    }
}

/// Each handler returns the message for the status bar, if any.
async fn detect_provider(app: &mut App) -> Option<String> {
    let (postal_code, city) = detect_query(&app.detect_input);
    if postal_code.is_none() && city.is_none() {
        return Some("Skriv et postnummer eller et stedsnavn".to_owned());
    }

    let found = app
        .service
        .detect(postal_code.as_deref(), city.as_deref())
        .await;
    match found {
        Some(id) => {
            info!(provider = %id, "provider detected");
            app.select_detected_provider(&id);
            None
        }
        None => Some(format!("Fant ingen leverandør for «{}»", app.detect_input.trim())),
    }
}

async fn search_addresses(app: &mut App) -> Option<String> {
    let query = app.address_input.trim().to_owned();
    if query.is_empty() {
        return Some("Skriv en gateadresse med husnummer og trykk Enter".to_owned());
    }

    let outcome = app.service.search(app.selected_provider.as_ref(), &query).await;
    app.address_list_index = 0;
    app.selected_address = None;
    match outcome {
        Ok(addresses) => {
            app.address_results = addresses;
            app.address_results
                .is_empty()
                .then(|| format!("Ingen treff for «{query}»"))
        }
        Err(err) => {
            app.address_results.clear();
            Some(format!("Søket feilet: {err}"))
        }
    }
}

async fn load_schedule(app: &mut App) -> Option<String> {
    let Some(addr) = app.select_current_address() else {
        return Some("Velg en adresse fra søket først".to_owned());
    };

    match app.service.schedule(&addr.provider, &addr.location_id).await {
        Ok(pickups) => {
            app.pickups = pickups;
            None
        }
        Err(err) => {
            app.pickups = Arc::from([]);
            Some(format!("Kunne ikke hente tømmekalender: {err}"))
        }
    }
}
