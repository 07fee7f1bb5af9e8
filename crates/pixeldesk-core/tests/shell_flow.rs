use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use pixeldesk_core::clock::Clock;
use pixeldesk_core::render::Renderer;
use pixeldesk_core::router::Dashboard;
use pixeldesk_core::settings::Catalog;
use pixeldesk_core::shell::drive_shell;
use pixeldesk_core::store::MemoryStore;
use pixeldesk_core::tasks::Task;
use tokio::io::{AsyncWriteExt, BufReader};

/// Advances one second per reading.
struct SteppingClock {
    base: DateTime<Local>,
    steps: AtomicI64,
}

impl SteppingClock {
    fn new() -> Self {
        Self {
            base: Local
                .with_ymd_and_hms(2026, 1, 2, 8, 0, 0)
                .single()
                .expect("unambiguous local time"),
            steps: AtomicI64::new(0),
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Local> {
        let step = self.steps.fetch_add(1, Ordering::SeqCst);
        self.base + chrono::Duration::seconds(step)
    }
}

async fn start() -> (Arc<MemoryStore>, Dashboard<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let dashboard = Dashboard::start_with_clock(
        Arc::clone(&store),
        Catalog::default(),
        SteppingClock::new(),
        Duration::from_secs(1),
    )
    .await;
    (store, dashboard)
}

/// Feeds `script` to the shell after `delay`, then closes the input.
fn typed_later(script: &'static str, delay: Duration) -> BufReader<tokio::io::DuplexStream> {
    let (mut keyboard, shell_side) = tokio::io::duplex(1024);
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        keyboard
            .write_all(script.as_bytes())
            .await
            .expect("write script");
    });
    BufReader::new(shell_side)
}

#[tokio::test(start_paused = true)]
async fn live_screen_follows_the_clock_between_commands() {
    let (store, dashboard) = start().await;
    let input = typed_later("add Water plants\nquit\n", Duration::from_millis(3500));
    let mut out = Vec::new();

    drive_shell(
        &dashboard,
        &Renderer::plain().with_live(true),
        input,
        &mut out,
        std::future::pending(),
    )
    .await
    .expect("shell");
    dashboard.shutdown().await;

    let text = String::from_utf8(out).expect("utf8");
    assert!(text.contains("08:00:00"), "first frame shows the start time");
    assert!(text.contains("08:00:03"), "clock ticks are redrawn without input");
    assert!(text.matches("\x1b[2J").count() >= 4);
    assert!(text.contains("Water plants"));
    assert_eq!(
        store.peek("tasks").as_deref(),
        Some(r#"[{"text":"Water plants","done":false}]"#)
    );
}

#[tokio::test(start_paused = true)]
async fn plain_screen_redraws_only_after_commands() {
    let (_store, dashboard) = start().await;
    let input = typed_later("add Feed cat\nhelp\n", Duration::from_millis(3500));
    let mut out = Vec::new();

    drive_shell(
        &dashboard,
        &Renderer::plain(),
        input,
        &mut out,
        std::future::pending(),
    )
    .await
    .expect("shell");

    let text = String::from_utf8(out).expect("utf8");
    assert_eq!(text.matches("[pixel-sky]").count(), 3);
    assert!(!text.contains('\x1b'));
    assert!(text.contains("commands:"));
    assert_eq!(dashboard.snapshot().tasks, vec![Task::new("Feed cat")]);
    dashboard.shutdown().await;
}

#[tokio::test]
async fn shutdown_signal_ends_the_session() {
    let (_store, dashboard) = start().await;
    let (_keyboard, shell_side) = tokio::io::duplex(64);
    let mut out = Vec::new();

    drive_shell(
        &dashboard,
        &Renderer::plain(),
        BufReader::new(shell_side),
        &mut out,
        async { Ok(()) },
    )
    .await
    .expect("shell");

    assert!(String::from_utf8(out).expect("utf8").contains("No tasks."));
    dashboard.shutdown().await;
}
