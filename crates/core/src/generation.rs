//! Generation defaults, prompt composition and input validation.

use std::time::Duration;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Total tries for a wrapped external call (first try included).
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
/// Delay before the first retry; doubles on every further retry.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Fixed interval between polls of a running video operation.
pub const DEFAULT_VIDEO_POLL_INTERVAL: Duration = Duration::from_secs(10);
/// Polls before a video operation is treated as timed out.
pub const DEFAULT_VIDEO_POLL_MAX_ATTEMPTS: u32 = 60;

/// Clip length used when a scene does not carry a usable duration.
pub const DEFAULT_CLIP_DURATION_SECS: f64 = 5.0;
/// Longest clip a video backend is asked for.
pub const MAX_CLIP_DURATION_SECS: f64 = 10.0;

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

/// Pick the prompt to generate with: a non-blank override wins over the
/// stored scene prompt. Returns `None` when both are blank.
pub fn effective_prompt(override_prompt: Option<&str>, stored: &str) -> Option<String> {
    override_prompt
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .or_else(|| Some(stored.trim()).filter(|p| !p.is_empty()))
        .map(str::to_string)
}

/// Prefix the locked video style onto a scene's video prompt.
pub fn compose_video_prompt(video_style: &str, scene_prompt: &str) -> String {
    let style = video_style.trim();
    let prompt = scene_prompt.trim();
    match (style.is_empty(), prompt.is_empty()) {
        (true, _) => prompt.to_string(),
        (false, true) => style.to_string(),
        (false, false) => format!("{style} {prompt}"),
    }
}

/// Validate and normalise a caller-supplied video style.
pub fn validate_video_style(video_style: Option<&str>) -> Result<String, CoreError> {
    match video_style.map(str::trim) {
        Some(style) if !style.is_empty() => Ok(style.to_string()),
        _ => Err(CoreError::Validation(
            "video_style must be a non-empty string".to_string(),
        )),
    }
}

/// Clamp a scene's requested duration into the range video backends accept.
pub fn clip_duration_secs(requested: Option<f64>) -> f64 {
    match requested {
        Some(d) if d.is_finite() && d > 0.0 => d.min(MAX_CLIP_DURATION_SECS),
        _ => DEFAULT_CLIP_DURATION_SECS,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_wins_over_stored_prompt() {
        assert_eq!(
            effective_prompt(Some("  a red fox "), "a dog").as_deref(),
            Some("a red fox")
        );
    }

    #[test]
    fn blank_override_falls_back_to_stored() {
        assert_eq!(effective_prompt(Some("  "), "a dog").as_deref(), Some("a dog"));
        assert_eq!(effective_prompt(None, "a dog").as_deref(), Some("a dog"));
    }

    #[test]
    fn both_blank_yields_none() {
        assert_eq!(effective_prompt(None, "   "), None);
    }

    #[test]
    fn style_prefixes_prompt() {
        assert_eq!(
            compose_video_prompt("Slow dolly, warm light.", "Fox runs"),
            "Slow dolly, warm light. Fox runs"
        );
    }

    #[test]
    fn style_alone_when_prompt_blank() {
        assert_eq!(compose_video_prompt("noir", " "), "noir");
        assert_eq!(compose_video_prompt("", "Fox runs"), "Fox runs");
    }

    #[test]
    fn video_style_must_not_be_blank() {
        assert!(validate_video_style(None).is_err());
        assert!(validate_video_style(Some("  ")).is_err());
        assert_eq!(validate_video_style(Some(" noir ")).unwrap(), "noir");
    }

    #[test]
    fn clip_duration_defaults_and_clamps() {
        assert_eq!(clip_duration_secs(None), DEFAULT_CLIP_DURATION_SECS);
        assert_eq!(clip_duration_secs(Some(0.0)), DEFAULT_CLIP_DURATION_SECS);
        assert_eq!(clip_duration_secs(Some(f64::NAN)), DEFAULT_CLIP_DURATION_SECS);
        assert_eq!(clip_duration_secs(Some(4.0)), 4.0);
        assert_eq!(clip_duration_secs(Some(30.0)), MAX_CLIP_DURATION_SECS);
    }
}
