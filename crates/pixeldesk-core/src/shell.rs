//! Line-oriented terminal front-end. It owns the purely visual state (whether
//! the task scroll is open, any help or theme listing on screen) and forwards
//! everything else to the [`Dashboard`].

use std::io::{self, Write};

use anyhow::{Context, anyhow, bail};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::render::Renderer;
use crate::router::{Dashboard, Snapshot};
use crate::settings::{AppearanceKind, Catalog};
use crate::store::KeyValueStore;

const COMMAND_NAMES: &[&str] = &[
    "add", "toggle", "clear", "bg", "color", "themes", "scroll", "show", "help", "quit", "exit",
];

const HELP: &str = "\
commands:
  add <text>     append a task
  toggle <n>     mark task n done / not done
  clear          remove finished tasks
  bg <n>         pick background n
  color <n>      pick clock color n
  themes         list backgrounds and colors
  scroll         open / close the task scroll
  show           redraw
  quit           leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Add(String),
    Toggle(usize),
    Clear,
    Pick(AppearanceKind, usize),
    Themes,
    Scroll,
    Show,
    Help,
    Quit,
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// Parses one input line. Blank lines yield `None`. Task and option numbers
/// are 1-based as displayed.
pub fn parse_command(line: &str) -> anyhow::Result<Option<ShellCommand>> {
    let line = line.trim_start();
    if line.trim().is_empty() {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest),
        None => (line, ""),
    };
    let token = word.to_ascii_lowercase();
    let command = expand_command_abbrev(&token, COMMAND_NAMES)
        .ok_or_else(|| anyhow!("unknown command: {word} (try `help`)"))?;

    let parsed = match command {
        "add" => ShellCommand::Add(rest.trim_end_matches(['\r', '\n']).to_string()),
        "toggle" => ShellCommand::Toggle(parse_position(rest)?),
        "clear" => ShellCommand::Clear,
        "bg" => ShellCommand::Pick(AppearanceKind::Background, parse_position(rest)?),
        "color" => ShellCommand::Pick(AppearanceKind::Color, parse_position(rest)?),
        "themes" => ShellCommand::Themes,
        "scroll" => ShellCommand::Scroll,
        "show" => ShellCommand::Show,
        "help" => ShellCommand::Help,
        _ => ShellCommand::Quit,
    };
    Ok(Some(parsed))
}

fn parse_position(raw: &str) -> anyhow::Result<usize> {
    let raw = raw.trim();
    if raw.is_empty() {
        bail!("expected a number");
    }
    let n: usize = raw
        .parse()
        .with_context(|| format!("expected a number, got: {raw}"))?;
    if n == 0 {
        bail!("numbers start at 1");
    }
    Ok(n - 1)
}

/// Reads commands from stdin until `quit`, end of input or Ctrl-C.
#[tracing::instrument(skip_all)]
pub async fn run_shell<S: KeyValueStore>(
    dashboard: &Dashboard<S>,
    renderer: &Renderer,
) -> anyhow::Result<()> {
    let input = BufReader::new(tokio::io::stdin());
    drive_shell(dashboard, renderer, input, io::stdout(), tokio::signal::ctrl_c()).await
}

/// Runs the command loop over any line source and screen. A live renderer
/// also redraws whenever the dashboard publishes, so the clock keeps moving
/// between commands.
pub async fn drive_shell<S, R, W, F>(
    dashboard: &Dashboard<S>,
    renderer: &Renderer,
    input: R,
    mut out: W,
    shutdown: F,
) -> anyhow::Result<()>
where
    S: KeyValueStore,
    R: AsyncBufRead + Unpin,
    W: Write,
    F: Future<Output = io::Result<()>>,
{
    let mut screen = Screen {
        scroll_open: true,
        aside: None,
    };
    let mut updates = dashboard.subscribe();
    let mut follow_updates = renderer.is_live();
    let mut lines = input.lines();
    tokio::pin!(shutdown);

    screen.redraw(&mut out, renderer, &mut updates, dashboard.catalog())?;

    loop {
        let line = tokio::select! {
            res = &mut shutdown => {
                if let Err(err) = res {
                    warn!(error = %err, "failed waiting for shutdown signal");
                }
                info!("interrupted; leaving");
                break;
            }
            changed = updates.changed(), if follow_updates => {
                match changed {
                    Ok(()) => screen.redraw(&mut out, renderer, &mut updates, dashboard.catalog())?,
                    Err(_) => follow_updates = false,
                }
                continue;
            }
            line = lines.next_line() => line.context("failed reading input")?,
        };

        let Some(line) = line else {
            debug!("input closed");
            break;
        };

        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                eprintln!("{err:#}");
                continue;
            }
        };
        debug!(?command, "shell command");

        screen.aside = None;
        match command {
            ShellCommand::Add(text) => {
                dashboard.on_task_submit(&text);
            }
            ShellCommand::Toggle(index) => {
                dashboard.on_task_toggle(index);
            }
            ShellCommand::Clear => {
                dashboard.on_clear_completed();
            }
            ShellCommand::Pick(kind, index) => {
                if !dashboard.on_appearance_pick(kind, index) {
                    let count = dashboard.catalog().option_count(kind);
                    eprintln!("no {kind} {} (choose 1-{count})", index + 1);
                    continue;
                }
            }
            ShellCommand::Themes => {
                let mut listing = Vec::new();
                renderer.write_themes(&mut listing, &dashboard.snapshot(), dashboard.catalog())?;
                screen.aside = Some(String::from_utf8_lossy(&listing).into_owned());
            }
            ShellCommand::Scroll => screen.scroll_open = !screen.scroll_open,
            ShellCommand::Show => {}
            ShellCommand::Help => screen.aside = Some(format!("{HELP}\n")),
            ShellCommand::Quit => break,
        }

        screen.redraw(&mut out, renderer, &mut updates, dashboard.catalog())?;
    }

    Ok(())
}

/// Visual state that lives only in the terminal.
struct Screen {
    scroll_open: bool,
    /// Help or theme listing shown under the desk until the next command.
    aside: Option<String>,
}

impl Screen {
    fn redraw<W: Write>(
        &self,
        out: &mut W,
        renderer: &Renderer,
        updates: &mut watch::Receiver<Snapshot>,
        catalog: &Catalog,
    ) -> anyhow::Result<()> {
        let snapshot = updates.borrow_and_update().clone();
        renderer.write_clear(&mut *out)?;
        renderer.write_snapshot(&mut *out, &snapshot, catalog, self.scroll_open)?;
        if let Some(aside) = &self.aside {
            writeln!(out)?;
            write!(out, "{aside}")?;
        }
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ShellCommand, parse_command};
    use crate::settings::AppearanceKind;

    fn parse(line: &str) -> ShellCommand {
        parse_command(line)
            .expect("parse")
            .expect("command")
    }

    #[test]
    fn commands_and_prefixes() {
        assert_eq!(parse("add Buy milk"), ShellCommand::Add("Buy milk".to_string()));
        assert_eq!(parse("a  two  spaces "), ShellCommand::Add(" two  spaces ".to_string()));
        assert_eq!(parse("add"), ShellCommand::Add(String::new()));
        assert_eq!(parse("to 3"), ShellCommand::Toggle(2));
        assert_eq!(parse("CLEAR"), ShellCommand::Clear);
        assert_eq!(parse("bg 2"), ShellCommand::Pick(AppearanceKind::Background, 1));
        assert_eq!(parse("co 4"), ShellCommand::Pick(AppearanceKind::Color, 3));
        assert_eq!(parse("th"), ShellCommand::Themes);
        assert_eq!(parse("sc"), ShellCommand::Scroll);
        assert_eq!(parse("q"), ShellCommand::Quit);
        assert_eq!(parse("exit"), ShellCommand::Quit);
    }

    #[test]
    fn blank_lines_are_skipped() {
        assert_eq!(parse_command("").expect("parse"), None);
        assert_eq!(parse_command("   ").expect("parse"), None);
    }

    #[test]
    fn invalid_input_is_rejected() {
        assert!(parse_command("launch").is_err());
        // "s" matches both "scroll" and "show", "t" both "toggle" and "themes".
        assert!(parse_command("s").is_err());
        assert!(parse_command("t 1").is_err());
        assert!(parse_command("toggle").is_err());
        assert!(parse_command("toggle 0").is_err());
        assert!(parse_command("toggle -1").is_err());
        assert!(parse_command("bg two").is_err());
    }
}
