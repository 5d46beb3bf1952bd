use anyhow::Context;
use calloop::{
    EventLoop, Interest, LoopSignal, Mode, PostAction,
    generic::Generic,
    signals::{Signal, Signals},
};
use std::{backtrace::Backtrace, fs, io::Write, path::PathBuf};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use wren::{
    Wren, WmError,
    backend::x11::X11Display,
    config::RuntimeConfig,
    handlers::WmEvent,
    supervisor::Supervisor,
};

const DEFAULT_LOG_FILTER: &str = "wren=info";

/// Everything the event loop callbacks share.
struct Session {
    wm: Wren<X11Display>,
    supervisor: Supervisor,
    signal: LoopSignal,
    failure: Option<WmError>,
}

impl Session {
    /// Fatal errors stop the loop; the rest are logged.
    fn settle(&mut self, result: wren::Result<()>) {
        let Err(err) = result else {
            return;
        };
        if err.is_fatal() {
            tracing::error!("fatal: {err}");
            self.failure = Some(err);
            self.signal.stop();
        } else {
            tracing::warn!("{err}");
        }
    }

    /// Handles every event the connection has buffered, including those
    /// read while answering replies for earlier ones. Stops as soon as quit
    /// is requested.
    fn drain_display(&mut self) {
        while self.failure.is_none() && self.wm.is_running() {
            let events = match self.wm.display.pending_events() {
                Ok(events) => events,
                Err(err) => {
                    self.settle(Err(err));
                    return;
                }
            };
            if events.is_empty() {
                return;
            }
            let result = self.wm.handle_events(events);
            self.settle(result);
        }
    }

    fn launch_pending(&mut self) {
        for intent in self.wm.take_launches() {
            match self.supervisor.launch(&intent) {
                Ok(pid) => tracing::debug!(pid, command = %intent.command_line(), "spawned"),
                Err(err) => tracing::warn!("{err}"),
            }
        }
    }

    fn publish_status(&mut self) {
        let Some(line) = self.wm.status_line() else {
            return;
        };
        let mut stdout = std::io::stdout().lock();
        if let Err(err) = writeln!(stdout, "{line}").and_then(|()| stdout.flush()) {
            tracing::warn!("failed to write desktop status: {err}");
        }
    }
}

fn main() {
    init_backtrace_defaults();
    if let Err(err) = init_logging() {
        tracing::warn!("{err:#}, logging to stderr only");
    }
    std::panic::set_hook(Box::new(|panic_info| {
        let backtrace = Backtrace::force_capture();
        tracing::error!("panic: {panic_info}\n{backtrace}");
        eprintln!("panic: {panic_info}\n{backtrace}");
    }));

    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            tracing::error!("{err:#}");
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> anyhow::Result<i32> {
    let display = X11Display::connect()?;
    let event_fd = display
        .event_fd()
        .context("failed to duplicate the display connection")?;
    let wm = Wren::new(display, RuntimeConfig::default())?;

    let mut event_loop: EventLoop<Session> =
        EventLoop::try_new().map_err(|e| WmError::EventLoop(e.to_string()))?;
    let handle = event_loop.handle();

    handle
        .insert_source(
            Generic::new(event_fd, Interest::READ, Mode::Level),
            |_, _, session: &mut Session| {
                session.drain_display();
                Ok(PostAction::Continue)
            },
        )
        .map_err(|e| WmError::EventLoop(format!("failed to watch display connection: {e}")))?;

    let children = Signals::new(&[Signal::SIGCHLD])
        .map_err(|e| WmError::EventLoop(format!("failed to watch SIGCHLD: {e}")))?;
    handle
        .insert_source(children, |_, _, session: &mut Session| {
            let exits: Vec<WmEvent> = session
                .supervisor
                .reap()
                .into_iter()
                .map(WmEvent::ChildExited)
                .collect();
            let result = session.wm.handle_events(exits);
            session.settle(result);
        })
        .map_err(|e| WmError::EventLoop(format!("failed to insert SIGCHLD source: {e}")))?;

    let mut session = Session {
        wm,
        supervisor: Supervisor::new(),
        signal: event_loop.get_signal(),
        failure: None,
    };
    // Replies read during start-up may have pulled events off the socket.
    session.drain_display();
    session.publish_status();

    if session.failure.is_none() && session.wm.is_running() {
        event_loop
            .run(None, &mut session, |session| {
                session.drain_display();
                session.launch_pending();
                session.publish_status();
                if !session.wm.is_running() {
                    session.signal.stop();
                }
            })
            .map_err(|e| WmError::EventLoop(e.to_string()))?;
    }

    if let Some(err) = session.failure.take() {
        return Err(err.into());
    }

    let code = session.wm.exit_code();
    tracing::debug!(code, children = session.supervisor.running(), "event loop stopped");
    session.wm.shutdown()?;
    Ok(code)
}

fn init_backtrace_defaults() {
    if std::env::var_os("RUST_BACKTRACE").is_none() {
        // Safety: called at startup before creating any threads.
        unsafe { std::env::set_var("RUST_BACKTRACE", "1") };
    }
    if std::env::var_os("RUST_LIB_BACKTRACE").is_none() {
        // Safety: called at startup before creating any threads.
        unsafe { std::env::set_var("RUST_LIB_BACKTRACE", "0") };
    }
}

fn log_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_STATE_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local/state")))
        .map(|state| state.join("wren"))
}

fn init_logging() -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let log_dir = log_dir()
        .context("neither XDG_STATE_HOME nor HOME is set")
        .and_then(|dir| {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
            Ok(dir)
        });
    let file_layer = log_dir.as_ref().ok().map(|dir| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(tracing_appender::rolling::never(dir, "wren.log"))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(true)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    let log_file = log_dir?.join("wren.log");
    tracing::info!(path = %log_file.display(), "logging initialized");

    Ok(())
}
