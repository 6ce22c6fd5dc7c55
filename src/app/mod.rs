mod state;
mod event_loop;
mod render;
mod input;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen, Clear, ClearType},
};
use tokio_util::sync::CancellationToken;

use crate::batch::BatchCoordinator;
use crate::config::Settings;
use crate::deploy::DeploymentPipeline;
use crate::executor::CommandExecutor;
use crate::poller::StatusPoller;
use crate::registry::NodeRegistry;
use crate::ssh::RemoteSession;
use crate::tracker::TimeoutTracker;
use crate::ui::{self, Operator, UiHandle, UiOperator, UiReceiver};
use crate::view::Presenter;

pub use state::{Alert, ConsoleState};

/// Restore the terminal to normal mode. Safe to call multiple times.
pub fn restore_terminal() {
    let _ = execute!(io::stdout(), LeaveAlternateScreen);
    let _ = disable_raw_mode();
}

/// Inputs the console is started with.
pub struct ConsoleConfig {
    pub registry: NodeRegistry,
    pub session: Arc<dyn RemoteSession>,
    pub settings: Settings,
    pub library: Option<PathBuf>,
    pub archive: Option<PathBuf>,
    pub deploy_target: String,
}

/// Console state plus handles to the background services.
pub struct App {
    pub rt: Arc<tokio::runtime::Runtime>,
    pub console: ConsoleState,
    pub ui: UiHandle,
    ui_rx: UiReceiver,
    pub token: CancellationToken,
    pub poller: Arc<StatusPoller>,
    pub executor: CommandExecutor,
    pub batch: BatchCoordinator,
    pub deployer: Arc<DeploymentPipeline>,
    pub operator: Arc<dyn Operator>,
    pub library: Option<PathBuf>,
    pub archive: Option<PathBuf>,
    pub deploy_target: String,
    pub tick_rate: Duration,
}

impl App {
    pub fn new(rt: Arc<tokio::runtime::Runtime>, config: ConsoleConfig) -> Self {
        let token = CancellationToken::new();
        let (ui, ui_rx) = ui::channel(token.clone());
        let operator: Arc<dyn Operator> = Arc::new(UiOperator::new(ui.clone()));
        let ConsoleConfig {
            registry,
            session,
            settings,
            library,
            archive,
            deploy_target,
        } = config;

        let tracker = Arc::new(TimeoutTracker::new(settings.skip_policy));
        let poller = Arc::new(StatusPoller::new(
            registry.clone(),
            Arc::clone(&session),
            tracker,
            ui.clone(),
            settings.clone(),
        ));
        let executor = CommandExecutor::new(
            registry.clone(),
            Arc::clone(&session),
            Arc::clone(&operator),
            ui.clone(),
            settings.clone(),
        );
        let batch = BatchCoordinator::new(
            registry.clone(),
            Arc::clone(&session),
            Arc::clone(&operator),
            ui.clone(),
            settings,
        );
        let deployer = Arc::new(DeploymentPipeline::new(
            registry.clone(),
            session,
            Arc::clone(&operator),
            ui.clone(),
        ));

        Self {
            rt,
            console: ConsoleState::new(registry.list_nodes()),
            ui,
            ui_rx,
            token,
            poller,
            executor,
            batch,
            deployer,
            operator,
            library,
            archive,
            deploy_target,
            tick_rate: Duration::from_millis(100),
        }
    }

    /// Start the background status poller.
    pub fn start_poller(&self) {
        let poller = Arc::clone(&self.poller);
        let token = self.token.clone();
        self.rt.spawn(poller.run(token));
    }

    /// Cancel background work; queued events are dropped from here on.
    pub fn shutdown(&mut self) {
        self.token.cancel();
        for prompt in self.console.prompts.drain(..) {
            prompt.answer(false);
        }
    }
}

/// Run the console. Sets up the terminal, runs the main loop, restores the
/// terminal on exit.
pub fn run(should_quit: Arc<AtomicBool>, rt: Arc<tokio::runtime::Runtime>, config: ConsoleConfig) -> io::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, Clear(ClearType::All))?;

    let mut app = App::new(rt, config);
    app.start_poller();
    app.ui.info(format!("Console started with {} nodes", app.console.nodes.len()));
    let mut needs_render = true;

    let result = (|| -> io::Result<()> {
        loop {
            if should_quit.load(Ordering::Relaxed) {
                break;
            }

            if app.poll_events() {
                needs_render = true;
            }

            if needs_render {
                if Presenter::render_size_guard()? {
                    needs_render = false;
                    if crossterm::event::poll(app.tick_rate)? {
                        let _ = crossterm::event::read()?;
                    }
                    continue;
                }
                render::render(&app)?;
                needs_render = false;
            }

            if crossterm::event::poll(app.tick_rate)? {
                match crossterm::event::read()? {
                    crossterm::event::Event::Key(key_event) => match input::handle_key(&mut app, key_event) {
                        Some(input::InputResult::Quit) => break,
                        Some(input::InputResult::Consumed) => needs_render = true,
                        None => {}
                    },
                    crossterm::event::Event::Resize(_, _) => needs_render = true,
                    _ => {}
                }
            }
        }
        Ok(())
    })();

    app.shutdown();
    restore_terminal();
    result
}
