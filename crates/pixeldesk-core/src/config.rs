//! `deskrc` settings: built-in
//! defaults, one optional file, then
//! command-line overrides.

use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow,
  bail
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::clock::DEFAULT_TICK;

pub const DEFAULT_BACKGROUNDS: &str =
  "pixel-sky,pixel-grass,pixel-sunset";
pub const DEFAULT_COLORS: &str =
  "#00ffcc,#ffcc00,#ff6699,#ffffff";

const DATA_LOCATION: &str =
  "data.location";
const CLOCK_INTERVAL_MS: &str =
  "clock.interval.ms";

/// Every key the desk reads, with its
/// value when nothing overrides it.
const KNOWN_KEYS: [(&str, &str); 5] = [
  (DATA_LOCATION, "~/.pixeldesk"),
  (CLOCK_INTERVAL_MS, "1000"),
  ("color", "on"),
  ("backgrounds", DEFAULT_BACKGROUNDS),
  ("colors", DEFAULT_COLORS)
];

#[derive(Debug, Clone)]
pub struct Config {
  values: HashMap<String, String>,
  /// The deskrc that was read, if any.
  pub source: Option<PathBuf>
}

impl Config {
  pub fn defaults() -> Self {
    Self {
      values: KNOWN_KEYS
        .iter()
        .map(|(key, value)| {
          (
            (*key).to_string(),
            (*value).to_string()
          )
        })
        .collect(),
      source: None
    }
  }

  /// Defaults, then the deskrc named by
  /// `deskrc_override`, `$DESKRC` or
  /// `~/.deskrc`, whichever comes first.
  #[tracing::instrument]
  pub fn load(
    deskrc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Self::defaults();

    match resolve_deskrc_path(
      deskrc_override
    )? {
      Some(path) => {
        let path = expand_tilde(&path);
        let text =
          fs::read_to_string(&path)
            .with_context(|| {
              format!(
                "failed to read {}",
                path.display()
              )
            })?;
        let entries =
          parse_deskrc(&text, &path)?;
        info!(
          deskrc = %path.display(),
          entries = entries.len(),
          "loaded deskrc"
        );
        cfg.values.extend(entries);
        cfg.source = Some(path);
      }
      None => {
        debug!("no deskrc; using defaults")
      }
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip_all)]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      warn_if_unknown(&key);
      debug!(key = %key, value = %v, "applying override");
      self.values.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.values.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .values
      .get(key)
      .map(|v| parse_bool(v))
  }

  pub fn get_u64(
    &self,
    key: &str
  ) -> anyhow::Result<Option<u64>> {
    self
      .values
      .get(key)
      .map(|v| {
        v.trim().parse::<u64>().map_err(
          |_| {
            anyhow!(
              "config key {key} \
               expects a whole \
               number, got: {v}"
            )
          }
        )
      })
      .transpose()
  }

  /// Comma separated, blanks dropped.
  pub fn get_list(
    &self,
    key: &str
  ) -> Option<Vec<String>> {
    self.values.get(key).map(|v| {
      v.split(',')
        .map(str::trim)
        .filter(|item| {
          !item.is_empty()
        })
        .map(str::to_string)
        .collect()
    })
  }

  /// Period between clock readings.
  /// Zero is rejected.
  pub fn clock_interval(
    &self
  ) -> anyhow::Result<Duration> {
    let millis = match self
      .get_u64(CLOCK_INTERVAL_MS)?
    {
      Some(0) => bail!(
        "{CLOCK_INTERVAL_MS} must be \
         greater than zero"
      ),
      Some(millis) => millis,
      None => {
        return Ok(DEFAULT_TICK);
      }
    };
    Ok(Duration::from_millis(millis))
  }
}

/// `key = value` lines. Blank lines and
/// lines starting with `#` are skipped;
/// ` # ` starts a trailing comment (a
/// bare `#` is part of color values).
fn parse_deskrc(
  text: &str,
  path: &Path
) -> anyhow::Result<Vec<(String, String)>>
{
  let mut entries = Vec::new();

  for (index, raw_line) in
    text.lines().enumerate()
  {
    let line = raw_line
      .split_once(" # ")
      .map_or(raw_line, |(kept, _)| kept)
      .trim();
    if line.is_empty()
      || line.starts_with('#')
    {
      continue;
    }

    let Some((key, value)) =
      line.split_once('=')
    else {
      bail!(
        "invalid config line {}:{}: \
         {raw_line}",
        path.display(),
        index + 1
      );
    };

    let key = key.trim();
    if key.is_empty() {
      bail!(
        "missing key on config line \
         {}:{}",
        path.display(),
        index + 1
      );
    }

    warn_if_unknown(key);
    trace!(key, value = value.trim(), "deskrc entry");
    entries.push((
      key.to_string(),
      value.trim().to_string()
    ));
  }

  Ok(entries)
}

fn warn_if_unknown(key: &str) {
  if !KNOWN_KEYS
    .iter()
    .any(|(known, _)| *known == key)
  {
    warn!(key, "unknown config key; ignored by the desk");
  }
}

/// `override_dir`, else
/// `data.location`; created when
/// missing.
#[tracing::instrument(skip(cfg))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = match override_dir {
    Some(path) => path.to_path_buf(),
    None => match cfg.get(DATA_LOCATION)
    {
      Some(location) => {
        expand_tilde(Path::new(&location))
      }
      None => home_dir()?.join(".pixeldesk")
    }
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

/// `DESKRC=/dev/null` disables the
/// file entirely.
fn resolve_deskrc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(env_path) =
    std::env::var("DESKRC")
  {
    return Ok(
      (env_path != "/dev/null")
        .then(|| PathBuf::from(env_path))
    );
  }

  let candidate =
    home_dir()?.join(".deskrc");
  Ok(candidate.exists().then_some(candidate))
}

fn home_dir() -> anyhow::Result<PathBuf> {
  dirs::home_dir().ok_or_else(|| {
    anyhow!(
      "cannot determine home directory"
    )
  })
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}
