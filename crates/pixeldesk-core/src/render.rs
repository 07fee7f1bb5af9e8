use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{DateTime, Local};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::settings::{AppearanceKind, Catalog};
use crate::router::Snapshot;

pub fn format_time(now: &DateTime<Local>) -> String {
    now.format("%H:%M:%S").to_string()
}

pub fn format_date(now: &DateTime<Local>) -> String {
    now.format("%Y/%m/%d · %A").to_string()
}

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    /// Redraws in place on every update instead of appending frames.
    live: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        let terminal = io::stdout().is_terminal();
        Ok(Self {
            color: color && terminal,
            live: terminal,
        })
    }

    pub fn plain() -> Self {
        Self {
            color: false,
            live: false,
        }
    }

    pub fn with_live(mut self, live: bool) -> Self {
        self.live = live;
        self
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Clears the terminal before a frame; appends nothing when not live.
    pub fn write_clear<W: Write>(&self, mut out: W) -> anyhow::Result<()> {
        if self.live {
            write!(out, "\x1b[2J\x1b[H")?;
        }
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    pub fn write_snapshot<W: Write>(
        &self,
        mut out: W,
        snapshot: &Snapshot,
        catalog: &Catalog,
        scroll_open: bool,
    ) -> anyhow::Result<()> {
        let color_index = snapshot.settings.color_index;
        let hex = catalog
            .option(AppearanceKind::Color, color_index)
            .unwrap_or_default();
        let background = catalog
            .option(AppearanceKind::Background, snapshot.settings.background_index)
            .unwrap_or_default();

        writeln!(out, "[{background}]")?;
        writeln!(out, "  {}", self.paint_hex(&format_time(&snapshot.now), hex))?;
        writeln!(out, "  {}", self.paint_hex(&format_date(&snapshot.now), hex))?;
        writeln!(out)?;

        if !scroll_open {
            writeln!(out, "(task scroll closed; `scroll` to open)")?;
            return Ok(());
        }

        if snapshot.tasks.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }

        let headers = vec!["#".to_string(), "Done".to_string(), "Task".to_string()];
        let rows = snapshot
            .tasks
            .iter()
            .enumerate()
            .map(|(idx, task)| {
                let mark = if task.done { "[x]" } else { "[ ]" };
                let text = if task.done {
                    self.paint(&task.text, "9")
                } else {
                    task.text.clone()
                };
                vec![self.paint(&(idx + 1).to_string(), "33"), mark.to_string(), text]
            })
            .collect();

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    pub fn write_themes<W: Write>(
        &self,
        mut out: W,
        snapshot: &Snapshot,
        catalog: &Catalog,
    ) -> anyhow::Result<()> {
        for kind in [AppearanceKind::Background, AppearanceKind::Color] {
            writeln!(out, "{kind}s:")?;
            let active = snapshot.settings.index(kind);
            for (idx, option) in catalog.options(kind).iter().enumerate() {
                let marker = if idx == active { '*' } else { ' ' };
                let label = match kind {
                    AppearanceKind::Color => self.paint_hex(option, option),
                    AppearanceKind::Background => option.clone(),
                };
                writeln!(out, " {marker} {} {label}", idx + 1)?;
            }
        }
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }

    fn paint_hex(&self, text: &str, hex: &str) -> String {
        match parse_hex_color(hex) {
            Some((r, g, b)) => self.paint(text, &format!("38;2;{r};{g};{b}")),
            None => text.to_string(),
        }
    }
}

fn parse_hex_color(hex: &str) -> Option<(u8, u8, u8)> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).ok();
    Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::{Local, TimeZone};

    use super::{Renderer, format_date, format_time, parse_hex_color, strip_ansi};
    use crate::router::Snapshot;
    use crate::settings::{AppearanceSettings, Catalog};
    use crate::tasks::Task;

    fn snapshot(tasks: Vec<Task>) -> Snapshot {
        Snapshot {
            tasks,
            settings: AppearanceSettings {
                background_index: 2,
                color_index: 1,
            },
            now: Local
                .with_ymd_and_hms(2026, 3, 7, 9, 5, 3)
                .single()
                .expect("unambiguous local time"),
        }
    }

    #[test]
    fn time_and_date_formats() {
        let snap = snapshot(vec![]);
        assert_eq!(format_time(&snap.now), "09:05:03");
        assert_eq!(format_date(&snap.now), "2026/03/07 · Saturday");
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_hex_color("#00ffcc"), Some((0, 255, 204)));
        assert_eq!(parse_hex_color("00ffcc"), None);
        assert_eq!(parse_hex_color("#fff"), None);
        assert_eq!(parse_hex_color("#gg0000"), None);
    }

    #[test]
    fn snapshot_lists_tasks_with_one_based_numbers() {
        let snap = snapshot(vec![
            Task::new("Buy milk"),
            Task {
                text: "Feed cat".to_string(),
                done: true,
            },
        ]);
        let mut out = Vec::new();
        Renderer::plain()
            .write_snapshot(&mut out, &snap, &Catalog::default(), true)
            .expect("render");
        let text = String::from_utf8(out).expect("utf8");

        assert!(text.starts_with("[pixel-sunset]\n  09:05:03\n"));
        assert!(text.contains("1 [ ]  Buy milk"));
        assert!(text.contains("2 [x]  Feed cat"));
    }

    #[test]
    fn closed_scroll_hides_tasks() {
        let snap = snapshot(vec![Task::new("secret")]);
        let mut out = Vec::new();
        Renderer::plain()
            .write_snapshot(&mut out, &snap, &Catalog::default(), false)
            .expect("render");
        let text = String::from_utf8(out).expect("utf8");
        assert!(!text.contains("secret"));
        assert!(text.contains("scroll closed"));
    }

    #[test]
    fn only_live_frames_clear_the_screen() {
        let mut out = Vec::new();
        Renderer::plain().write_clear(&mut out).expect("clear");
        assert!(out.is_empty());

        Renderer::plain()
            .with_live(true)
            .write_clear(&mut out)
            .expect("clear");
        assert_eq!(out, b"\x1b[2J\x1b[H");
    }

    #[test]
    fn themes_mark_active_options() {
        let snap = snapshot(vec![]);
        let mut out = Vec::new();
        Renderer::plain()
            .write_themes(&mut out, &snap, &Catalog::default())
            .expect("render");
        let text = strip_ansi(&String::from_utf8(out).expect("utf8"));
        assert!(text.contains(" * 3 pixel-sunset"));
        assert!(text.contains(" * 2 #ffcc00"));
        assert!(text.contains("   1 #00ffcc"));
    }
}
