use std::fmt;

use anyhow::{anyhow, bail};
use tracing::{debug, warn};

use crate::config::Config;
use crate::store::KeyValueStore;

pub const BACKGROUND_KEY: &str = "bgIndex";
pub const COLOR_KEY: &str = "colorIndex";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppearanceKind {
    Background,
    Color,
}

impl AppearanceKind {
    pub fn storage_key(self) -> &'static str {
        match self {
            AppearanceKind::Background => BACKGROUND_KEY,
            AppearanceKind::Color => COLOR_KEY,
        }
    }
}

impl fmt::Display for AppearanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppearanceKind::Background => f.write_str("background"),
            AppearanceKind::Color => f.write_str("color"),
        }
    }
}

/// The fixed option sets the appearance indices point into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    backgrounds: Vec<String>,
    colors: Vec<String>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            backgrounds: vec![
                "pixel-sky".to_string(),
                "pixel-grass".to_string(),
                "pixel-sunset".to_string(),
            ],
            colors: vec![
                "#00ffcc".to_string(),
                "#ffcc00".to_string(),
                "#ff6699".to_string(),
                "#ffffff".to_string(),
            ],
        }
    }
}

impl Catalog {
    pub fn new(backgrounds: Vec<String>, colors: Vec<String>) -> anyhow::Result<Self> {
        if backgrounds.is_empty() {
            bail!("at least one background option is required");
        }
        if colors.is_empty() {
            bail!("at least one color option is required");
        }
        Ok(Self {
            backgrounds,
            colors,
        })
    }

    #[tracing::instrument(skip(cfg))]
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let backgrounds = cfg.get_list("backgrounds").unwrap_or(defaults.backgrounds);
        let colors = cfg.get_list("colors").unwrap_or(defaults.colors);
        debug!(
            backgrounds = backgrounds.len(),
            colors = colors.len(),
            "resolved appearance catalog"
        );
        Self::new(backgrounds, colors)
    }

    pub fn options(&self, kind: AppearanceKind) -> &[String] {
        match kind {
            AppearanceKind::Background => &self.backgrounds,
            AppearanceKind::Color => &self.colors,
        }
    }

    pub fn option(&self, kind: AppearanceKind, index: usize) -> Option<&str> {
        self.options(kind).get(index).map(String::as_str)
    }

    pub fn option_count(&self, kind: AppearanceKind) -> usize {
        self.options(kind).len()
    }

    pub fn check_index(&self, kind: AppearanceKind, index: usize) -> anyhow::Result<()> {
        let count = self.option_count(kind);
        if index >= count {
            return Err(anyhow!(
                "{kind} index {index} is out of range (0..{count})"
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppearanceSettings {
    pub background_index: usize,
    pub color_index: usize,
}

impl AppearanceSettings {
    pub fn index(&self, kind: AppearanceKind) -> usize {
        match kind {
            AppearanceKind::Background => self.background_index,
            AppearanceKind::Color => self.color_index,
        }
    }

    pub(crate) fn set_index(&mut self, kind: AppearanceKind, index: usize) {
        match kind {
            AppearanceKind::Background => self.background_index = index,
            AppearanceKind::Color => self.color_index = index,
        }
    }
}

/// Reads both stored indices. Never writes back, even when a value had to be
/// corrected.
#[tracing::instrument(skip(store, catalog))]
pub async fn load_settings<S: KeyValueStore>(store: &S, catalog: &Catalog) -> AppearanceSettings {
    let mut settings = AppearanceSettings::default();
    for kind in [AppearanceKind::Background, AppearanceKind::Color] {
        let raw = match store.get(kind.storage_key()).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(
                    key = kind.storage_key(),
                    error = %format!("{err:#}"),
                    "failed to read stored index; using default"
                );
                None
            }
        };
        let index = resolve_stored_index(kind, raw.as_deref(), catalog.option_count(kind));
        settings.set_index(kind, index);
    }
    debug!(?settings, "loaded appearance settings");
    settings
}

/// Turns a stored decimal string into a valid index for `count` options.
/// Missing or non-numeric values become 0; numeric values are clamped, however
/// many digits they have.
pub fn resolve_stored_index(kind: AppearanceKind, raw: Option<&str>, count: usize) -> usize {
    let Some(raw) = raw else {
        return 0;
    };

    let Some(value) = parse_stored_integer(raw.trim()) else {
        warn!(key = kind.storage_key(), raw, "stored index is not a number; using 0");
        return 0;
    };

    let max = count.saturating_sub(1);
    let clamped = if value < 0 {
        0
    } else {
        usize::try_from(value).map_or(max, |index| index.min(max))
    };
    if i128::try_from(clamped).ok() != Some(value) {
        warn!(
            key = kind.storage_key(),
            stored = raw.trim(),
            corrected = clamped,
            "stored index out of range; clamped"
        );
    }
    clamped
}

/// Decimal integer with optional sign. Too many digits saturate instead of
/// failing, so only non-numeric text yields `None`.
fn parse_stored_integer(text: &str) -> Option<i128> {
    let negative = text.starts_with('-');
    let digits = text.strip_prefix(['-', '+']).unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(text.parse::<i128>().unwrap_or(if negative { i128::MIN } else { i128::MAX }))
}
