mod tui;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use padloop::clock::{Clock, SystemClock};
use padloop::config::{self, Config, PADLOOP_DIR};
use padloop::loader::signer::{HttpSigner, NoSigner, UrlSigner};
use padloop::pipeline::catalog::{DirectoryCatalog, SoundCatalog, SoundInfo};
use padloop::pipeline::persistence::{FragmentRepository, JsonFragmentStore};
use padloop::shared::{InputEvent, PadEvent};
use padloop::{AudioEngine, PadSession};
use tui::mode::{Overlay, SheetEntry, TuiState};

const LOG_FILE: &str = "padloop.log";

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let project_dir: PathBuf = match std::env::args().nth(1) {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir()?,
    };
    init_logging(&project_dir)?;

    let config_path = config::config_path(&project_dir);
    let config: Config = config::load_config(&config_path);
    if !config_path.exists() {
        // leave the defaults somewhere they can be edited
        if let Err(e) = config::save_config(&config, &config_path) {
            log::warn!("could not write default config: {e:#}");
        }
    }
    let catalog = DirectoryCatalog::open(&project_dir, &config.loader.sounds_dir)
        .with_context(|| format!("reading sounds from {}", project_dir.display()))?;
    let sheet_entries = catalog.entries();
    let signer: Arc<dyn UrlSigner> = match &config.storage.signer_endpoint {
        Some(endpoint) => Arc::new(HttpSigner::new(
            endpoint.clone(),
            Duration::from_secs(config.storage.timeout_secs),
        )),
        None => Arc::new(NoSigner),
    };

    // reopen the newest fragment, or start a blank one
    let mut store = JsonFragmentStore::in_project(&project_dir);
    let mut session = match store.list(1, None) {
        Ok((page, _)) if !page.is_empty() => {
            log::info!("reopening {}", page[0].id.as_deref().unwrap_or("fragment"));
            PadSession::from_record(&page[0], &config, Box::new(catalog), signer)
        }
        Ok(_) => PadSession::new(&config, Box::new(catalog), signer),
        Err(e) => {
            log::warn!("could not list fragments ({e}), starting blank");
            PadSession::new(&config, Box::new(catalog), signer)
        }
    };

    let mut engine = AudioEngine::init(&config, &project_dir);
    session.prepare(&engine);

    terminal::enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), EnterAlternateScreen, EnableMouseCapture)?;
    let _guard = RawModeGuard; // auto drops when out of scope

    let backend = CrosstermBackend::new(std::io::stdout());
    let mut term = Terminal::new(backend)?;
    term.clear()?;

    let clock = SystemClock::new();
    let tick_rate = Duration::from_millis(16); // ~60fps
    let mut ts = TuiState::new(config.gesture.cell_width_px);

    'frames: loop {
        let ds = session.display_state(&engine);
        sync_sheet(&mut ts, &session, &sheet_entries);

        term.draw(|frame| {
            tui::view::render(frame, frame.area(), &ds, &mut ts);
        })?;

        for event in tui::input::poll_input(tick_rate, &mut ts)? {
            if event == InputEvent::Quit {
                break 'frames;
            }
            let events = session.handle_input(event, clock.now(), &mut engine);
            react(&mut ts, &events);
        }

        let events = session.tick(clock.now(), &engine);
        react(&mut ts, &events);
    }

    // save before quitting
    session.teardown();
    if let Err(e) = store.save(&session.to_record()) {
        log::error!("could not save fragment: {e}");
    }
    drop(term);
    engine.dispose();
    Ok(())
}

// things the tui itself has to do something about
fn react(ts: &mut TuiState, events: &[PadEvent]) {
    for event in events {
        match event {
            PadEvent::LongPressed { pad } => {
                ts.dragging = None;
                ts.overlay = Overlay::SoundSheet { pad: *pad, page: 0 };
            }
            PadEvent::Tapped { pad, .. } | PadEvent::Swiped { pad, .. } => ts.last_pad = *pad,
            _ => {}
        }
    }
}

fn sync_sheet(ts: &mut TuiState, session: &PadSession, entries: &[SoundInfo]) {
    let Some(pad) = ts.sheet_pad() else {
        return;
    };
    ts.sheet_entries = entries
        .iter()
        .map(|info| SheetEntry {
            sound_id: info.id.clone(),
            name: info.name.clone(),
            color: session.color_of(&info.id).map(str::to_string),
        })
        .collect();
    ts.sheet_on_pad = session
        .grid()
        .pad(pad)
        .map(|p| p.sounds.iter().map(|s| s.sound_id.clone()).collect())
        .unwrap_or_default();
}

// the terminal is ours, so logs go to <project>/.padloop/padloop.log
fn init_logging(project_dir: &Path) -> anyhow::Result<()> {
    let dir = project_dir.join(PADLOOP_DIR);
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE))
        .context("opening log file")?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::execute!(std::io::stdout(), DisableMouseCapture, LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}
