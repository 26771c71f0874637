//! Font loading and cached glyph subsetting for the vector exporter.

pub(crate) mod subset;
#[cfg(test)]
pub(crate) mod testfont;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use log::{debug, warn};
use thiserror::Error;

const SUBSET_ATTEMPTS: u32 = 3;
const SUBSET_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubsetError {
    #[error("failed to parse font: {0}")]
    Parse(String),
    #[error("font is missing required table `{0}`")]
    MissingTable(&'static str),
    #[error("font has no glyphs (missing notdef)")]
    MissingNotdef,
    #[error("malformed font data: {0}")]
    Malformed(&'static str),
    #[error("font subsetting failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

/// A loaded font: the raw sfnt bytes the subsetter slices tables from plus
/// the parsed [`fontdue::Font`] used for glyph lookup and rasterization.
pub struct FontFace {
    data: Arc<Vec<u8>>,
    font: fontdue::Font,
    family: String,
    style: String,
    units_per_em: u16,
    ascender: i16,
    descender: i16,
}

impl FontFace {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, SubsetError> {
        let font = fontdue::Font::from_bytes(data.as_slice(), fontdue::FontSettings::default())
            .map_err(|err| SubsetError::Parse(err.to_string()))?;
        let (family, style) = subset::font_names(&data)?;
        let units_per_em = subset::units_per_em(&data)?;
        let (ascender, descender) = subset::ascent_descent(&data)?;
        debug!("loaded font {family} {style} ({units_per_em} units/em)");

        Ok(Self { data: Arc::new(data), font, family, style, units_per_em, ascender, descender })
    }

    pub fn fontdue(&self) -> &fontdue::Font {
        &self.font
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn style(&self) -> &str {
        &self.style
    }

    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    pub fn ascender(&self) -> i16 {
        self.ascender
    }

    pub fn descender(&self) -> i16 {
        self.descender
    }

    /// Glyph index for a character; 0 (notdef) when uncovered.
    pub fn glyph_index(&self, c: char) -> u16 {
        self.font.lookup_glyph_index(c)
    }
}

type CacheSlot = Arc<OnceLock<Result<Arc<Vec<u8>>, SubsetError>>>;

/// Builds and caches glyph-subset fonts keyed by the exact character set.
/// Concurrent requests for the same set share one in-flight build; a second
/// request for a cached set never re-invokes construction.
pub struct FontSubsetter {
    face: Arc<FontFace>,
    cache: Mutex<HashMap<String, CacheSlot>>,
    builds: AtomicUsize,
}

impl FontSubsetter {
    pub fn new(face: Arc<FontFace>) -> Self {
        Self { face, cache: Mutex::new(HashMap::new()), builds: AtomicUsize::new(0) }
    }

    pub fn face(&self) -> &FontFace {
        &self.face
    }

    /// Number of times an actual subset build ran; cache hits do not count.
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    /// Returns a minimal font binary covering `chars` (deduplicated and
    /// sorted internally). Transient failures are retried with a short
    /// backoff before a terminal error is returned; terminal errors are not
    /// cached, so a later request starts fresh.
    pub fn subset(&self, chars: &str) -> Result<Arc<Vec<u8>>, SubsetError> {
        let key = canonical_key(chars);

        let slot = {
            let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            cache.entry(key.clone()).or_default().clone()
        };

        let result = slot.get_or_init(|| self.build_with_retry(&key)).clone();
        if result.is_err() {
            let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            cache.remove(&key);
        }
        result
    }

    fn build_with_retry(&self, chars: &str) -> Result<Arc<Vec<u8>>, SubsetError> {
        self.builds.fetch_add(1, Ordering::SeqCst);

        let mut last = None;
        for attempt in 1..=SUBSET_ATTEMPTS {
            match subset::build_subset(&self.face, chars) {
                Ok(bytes) => {
                    debug!("subset font for {chars:?}: {} bytes", bytes.len());
                    return Ok(Arc::new(bytes));
                },
                Err(err) => {
                    warn!("font subset attempt {attempt}/{SUBSET_ATTEMPTS} failed: {err}");
                    last = Some(err);
                    if attempt < SUBSET_ATTEMPTS {
                        std::thread::sleep(SUBSET_BACKOFF);
                    }
                },
            }
        }

        let last = last.map(|err| err.to_string()).unwrap_or_default();
        Err(SubsetError::Exhausted { attempts: SUBSET_ATTEMPTS, last })
    }
}

/// Deduplicated, codepoint-sorted cache key for a character set.
fn canonical_key(chars: &str) -> String {
    let mut set: Vec<char> = chars.chars().collect();
    set.sort_unstable();
    set.dedup();
    set.into_iter().collect()
}
