pub mod openai;

use crate::storage::write_atomic;
use std::path::Path;

/// Turns the morning digest into audio.
#[async_trait::async_trait]
pub trait Narrator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn synthesize(&self, text: &str) -> anyhow::Result<Vec<u8>>;
}

/// Synthesizes `text` and writes the audio to `path`. Failures are logged and swallowed;
/// returns whether a file was written.
pub async fn narrate_best_effort(narrator: &dyn Narrator, text: &str, path: &Path) -> bool {
    if text.trim().is_empty() {
        tracing::info!(narrator = narrator.name(), "nothing to narrate; skipping");
        return false;
    }

    let audio = match narrator.synthesize(text).await {
        Ok(audio) if !audio.is_empty() => audio,
        Ok(_) => {
            tracing::warn!(narrator = narrator.name(), "narration returned no audio");
            return false;
        }
        Err(err) => {
            tracing::warn!(narrator = narrator.name(), error = %format!("{err:#}"), "narration failed; skipping");
            return false;
        }
    };

    match write_atomic(path, &audio) {
        Ok(()) => {
            tracing::info!(path = %path.display(), bytes = audio.len(), "narration written");
            true
        }
        Err(err) => {
            tracing::warn!(error = %err, "narration could not be saved");
            false
        }
    }
}
