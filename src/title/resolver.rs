use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::{debug, warn};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::{FALLBACK_TITLES, MAX_TITLE_CHARS};
use crate::pipeline::error::ShortsError;
use crate::video::detached;

/// Supplies a caption for a source video.
///
/// Implementations may return anything; [`resolve_title`] validates the
/// result and substitutes a fallback caption when it is unusable.
pub trait TitleResolver: Send + Sync {
    fn resolve(&self, source: &Path) -> Result<String, ShortsError>;
}

/// Resolver for runs with no title service configured.
pub struct NoResolver;

impl TitleResolver for NoResolver {
    fn resolve(&self, _source: &Path) -> Result<String, ShortsError> {
        Err(ShortsError::TitleResolution(
            "no title resolver configured".into(),
        ))
    }
}

/// Derives a caption from a descriptive file name such as
/// `the_final_chase-02.mp4` ("The final chase").
pub struct FilenameResolver;

impl TitleResolver for FilenameResolver {
    fn resolve(&self, source: &Path) -> Result<String, ShortsError> {
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        caption_from_stem(stem).ok_or_else(|| {
            ShortsError::TitleResolution(format!("file name '{stem}' is not descriptive"))
        })
    }
}

fn caption_from_stem(stem: &str) -> Option<String> {
    let cleaned: String = stem
        .chars()
        .filter(|c| !c.is_ascii_digit())
        .map(|c| if c == '_' || c == '-' { ' ' } else { c })
        .collect();
    let words: Vec<&str> = cleaned.split_whitespace().collect();
    if words.len() < 2 || cleaned.trim().to_lowercase().starts_with("video") {
        return None;
    }
    let joined = words.join(" ").to_lowercase();
    let mut chars = joined.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars).collect())
}

/// Runs an external program with the video path as its last argument and
/// takes the first non-empty line of its stdout as the caption.
///
/// This is the hook for transcription or generative titling services,
/// which live outside this crate.
pub struct CommandResolver {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandResolver {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl TitleResolver for CommandResolver {
    fn resolve(&self, source: &Path) -> Result<String, ShortsError> {
        let out = detached(&mut Command::new(&self.program))
            .args(&self.args)
            .arg(source)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|e| {
                ShortsError::TitleResolution(format!(
                    "failed to run {}: {e}",
                    self.program.display()
                ))
            })?;
        if !out.status.success() {
            return Err(ShortsError::TitleResolution(format!(
                "{} exited with status: {}",
                self.program.display(),
                out.status
            )));
        }
        String::from_utf8_lossy(&out.stdout)
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ShortsError::TitleResolution("title command printed nothing".into()))
    }
}

/// Where the final caption came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TitleSource {
    Override,
    Resolved,
    /// The resolver failed or returned something unusable.
    Fallback(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTitle {
    pub text: String,
    pub source: TitleSource,
}

/// Pick the caption for one video: a non-empty override wins outright;
/// otherwise the resolver's answer is used when it is 1..=40 characters;
/// otherwise one of the fallback captions is chosen uniformly.
pub fn resolve_title<R: Rng>(
    override_title: Option<&str>,
    resolver: &dyn TitleResolver,
    source: &Path,
    rng: &mut R,
) -> ResolvedTitle {
    if let Some(text) = override_title.filter(|t| !t.trim().is_empty()) {
        return ResolvedTitle {
            text: text.to_string(),
            source: TitleSource::Override,
        };
    }

    let reason = match resolver.resolve(source) {
        Ok(raw) => {
            let candidate = raw.trim();
            let chars = candidate.chars().count();
            if chars == 0 {
                "resolver returned an empty title".to_string()
            } else if chars > MAX_TITLE_CHARS {
                format!("resolved title has {chars} characters, limit is {MAX_TITLE_CHARS}")
            } else {
                debug!("resolved title for {}: {candidate}", source.display());
                return ResolvedTitle {
                    text: candidate.to_string(),
                    source: TitleSource::Resolved,
                };
            }
        }
        Err(e) => e.to_string(),
    };

    warn!("using fallback caption for {}: {reason}", source.display());
    let text = FALLBACK_TITLES
        .choose(rng)
        .copied()
        .unwrap_or(FALLBACK_TITLES[0])
        .to_string();
    ResolvedTitle {
        text,
        source: TitleSource::Fallback(reason),
    }
}
