pub mod cli;
pub mod clock;
pub mod config;
pub mod desk;
pub mod render;
pub mod router;
pub mod settings;
pub mod shell;
pub mod store;
pub mod tasks;

use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

use crate::router::Dashboard;
use crate::settings::Catalog;
use crate::store::{
  FileStore,
  KeyValueStore,
  MemoryStore
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    ephemeral = cli.ephemeral,
    "starting pixeldesk"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.deskrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let catalog =
    Catalog::from_config(&cfg)
      .context(
        "invalid appearance options"
      )?;
  let tick = cfg.clock_interval()?;
  let renderer =
    render::Renderer::new(&cfg)?;

  let runtime =
    tokio::runtime::Builder::new_multi_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async runtime"
      )?;

  let result = if cli.ephemeral {
    let store = Arc::new(MemoryStore::new());
    runtime.block_on(session(
      store, catalog, tick, &renderer
    ))
  } else {
    let data_dir =
      config::resolve_data_dir(
        &cfg,
        cli.data.as_deref()
      )
      .context(
        "failed to resolve data \
         directory"
      )?;
    let store = Arc::new(
      FileStore::open(&data_dir)
        .with_context(|| {
          format!(
            "failed to open store at \
             {}",
            data_dir.display()
          )
        })?
    );
    runtime.block_on(session(
      store, catalog, tick, &renderer
    ))
  };

  info!("done");
  result
}

async fn session<S: KeyValueStore>(
  store: Arc<S>,
  catalog: Catalog,
  tick: Duration,
  renderer: &render::Renderer
) -> anyhow::Result<()> {
  let dashboard =
    Dashboard::start(store, catalog, tick)
      .await;
  let result =
    shell::run_shell(&dashboard, renderer)
      .await;
  dashboard.shutdown().await;
  result
}
