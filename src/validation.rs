//! Field validation rules for the wizard.
//!
//! Everything here is a pure function of the form: no side effects, and the
//! same input always yields the same errors regardless of evaluation order.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::form::{ContentMode, FormState, MediaSource};
use crate::wizard::WizardStep;

/// Minimum script length in characters.
pub const MIN_SCRIPT_CHARS: usize = 300;
/// Minimum target audience description length in characters.
pub const MIN_AUDIENCE_CHARS: usize = 10;

static VIDEO_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?://)?(www\.)?(youtube\.com/watch\?v=|youtu\.be/)[A-Za-z0-9_-]{11}$")
        .expect("video url pattern compiles")
});

static PROFILE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(www\.)?(twitter|x)\.com/[A-Za-z0-9_]+/?$")
        .expect("profile url pattern compiles")
});

/// Validated fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    VideoUrl,
    ScriptText,
    ProfileUrl,
    TargetAudience,
}

impl Field {
    pub const ALL: [Field; 4] = [
        Field::VideoUrl,
        Field::ScriptText,
        Field::ProfileUrl,
        Field::TargetAudience,
    ];
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::VideoUrl => "videoUrl",
            Self::ScriptText => "scriptText",
            Self::ProfileUrl => "profileUrl",
            Self::TargetAudience => "targetAudience",
        };
        write!(f, "{s}")
    }
}

/// Field name → message. Empty means the step is valid.
pub type ValidationErrors = BTreeMap<Field, String>;

pub fn is_video_url(value: &str) -> bool {
    VIDEO_URL.is_match(value)
}

pub fn is_profile_url(value: &str) -> bool {
    PROFILE_URL.is_match(value)
}

/// Validate one field against the current form.
pub fn validate(field: Field, form: &FormState) -> Option<String> {
    match field {
        Field::VideoUrl => {
            if form.content_mode != ContentMode::Video || form.media_source != MediaSource::Url {
                return None;
            }
            match form.media_remote_url.as_deref() {
                None | Some("") => Some("Video URL is required".to_string()),
                Some(url) if !is_video_url(url) => {
                    Some("Please enter a valid YouTube URL".to_string())
                }
                Some(_) => None,
            }
        }
        Field::ScriptText => {
            if form.content_mode != ContentMode::Text {
                return None;
            }
            if form.script_text.is_empty() {
                Some("Script text is required".to_string())
            } else if form.script_text.chars().count() < MIN_SCRIPT_CHARS {
                Some(format!("Script must be at least {MIN_SCRIPT_CHARS} characters"))
            } else {
                None
            }
        }
        Field::ProfileUrl => {
            if form.profile_url.is_empty() {
                Some("Profile URL is required".to_string())
            } else if !is_profile_url(&form.profile_url) {
                Some("Please enter a valid Twitter/X profile URL".to_string())
            } else {
                None
            }
        }
        Field::TargetAudience => {
            if form.target_audience.is_empty() {
                Some("Target audience is required".to_string())
            } else if form.target_audience.chars().count() < MIN_AUDIENCE_CHARS {
                Some("Please provide more detail about your target audience".to_string())
            } else {
                None
            }
        }
    }
}

/// Fields checked before leaving a step.
pub fn fields_for_step(step: WizardStep) -> &'static [Field] {
    match step {
        WizardStep::StarterInfo => &Field::ALL,
        WizardStep::AdvancedOptions | WizardStep::Submitted => &[],
    }
}

/// Run every rule for `step` and collect the failures.
pub fn validate_step(step: WizardStep, form: &FormState) -> ValidationErrors {
    fields_for_step(step)
        .iter()
        .filter_map(|&field| validate(field, form).map(|msg| (field, msg)))
        .collect()
}

/// Mode-specific readiness of the source content.
///
/// `upload_failed` is whether the current upload session ended in failure.
pub fn content_ready(form: &FormState, upload_failed: bool) -> bool {
    match (form.content_mode, form.media_source) {
        (ContentMode::Video, MediaSource::File) => {
            !upload_failed
                && form.media.is_some()
                && form.upload_progress == 100
                && form.media_remote_url.is_some()
        }
        (ContentMode::Video, MediaSource::Url) => form
            .media_remote_url
            .as_deref()
            .is_some_and(is_video_url),
        (ContentMode::Text, _) => form.script_text.chars().count() >= MIN_SCRIPT_CHARS,
    }
}

/// Whether the user may leave `step`.
pub fn step_eligible(step: WizardStep, form: &FormState, upload_failed: bool) -> bool {
    if !validate_step(step, form).is_empty() {
        return false;
    }
    match step {
        WizardStep::StarterInfo => content_ready(form, upload_failed),
        WizardStep::AdvancedOptions => true,
        WizardStep::Submitted => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_text_form() -> FormState {
        FormState {
            profile_url: "https://x.com/someone".into(),
            target_audience: "Indie founders building SaaS".into(),
            script_text: "a".repeat(300),
            ..FormState::default()
        }
    }

    #[test]
    fn video_url_patterns() {
        assert!(is_video_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_video_url("youtu.be/dQw4w9WgXcQ"));
        assert!(is_video_url("http://youtube.com/watch?v=abc-def_123"));
        assert!(!is_video_url("https://youtube.com/watch?v=short"));
        assert!(!is_video_url("https://vimeo.com/123456789"));
        assert!(!is_video_url("https://youtu.be/dQw4w9WgXcQ?t=10"));
    }

    #[test]
    fn profile_url_patterns() {
        assert!(is_profile_url("https://twitter.com/jack"));
        assert!(is_profile_url("https://www.x.com/some_user/"));
        assert!(!is_profile_url("twitter.com/jack"));
        assert!(!is_profile_url("https://x.com/jack/status/1"));
        assert!(!is_profile_url("https://facebook.com/jack"));
    }

    #[test]
    fn valid_text_form_has_no_errors() {
        let form = valid_text_form();
        assert!(validate_step(WizardStep::StarterInfo, &form).is_empty());
        assert!(step_eligible(WizardStep::StarterInfo, &form, false));
    }

    #[test]
    fn script_length_boundary() {
        let mut form = valid_text_form();
        form.script_text = "a".repeat(299);
        assert!(!step_eligible(WizardStep::StarterInfo, &form, false));
        assert_eq!(
            validate(Field::ScriptText, &form).as_deref(),
            Some("Script must be at least 300 characters")
        );

        form.script_text = "a".repeat(300);
        assert!(step_eligible(WizardStep::StarterInfo, &form, false));
    }

    #[test]
    fn script_length_counts_characters_not_bytes() {
        let mut form = valid_text_form();
        form.script_text = "é".repeat(299);
        assert!(validate(Field::ScriptText, &form).is_some());
    }

    #[test]
    fn short_audience_always_blocks() {
        let mut form = valid_text_form();
        form.target_audience = "founders".into();
        assert!(!step_eligible(WizardStep::StarterInfo, &form, false));

        form.content_mode = ContentMode::Video;
        form.media_source = MediaSource::Url;
        form.media_remote_url = Some("https://youtu.be/dQw4w9WgXcQ".into());
        assert!(!step_eligible(WizardStep::StarterInfo, &form, false));
        assert!(validate_step(WizardStep::StarterInfo, &form).contains_key(&Field::TargetAudience));
    }

    #[test]
    fn rules_scoped_to_mode() {
        let mut form = valid_text_form();
        form.script_text.clear();
        form.content_mode = ContentMode::Video;
        form.media_source = MediaSource::Url;
        assert!(validate(Field::ScriptText, &form).is_none());
        assert_eq!(
            validate(Field::VideoUrl, &form).as_deref(),
            Some("Video URL is required")
        );

        form.media_source = MediaSource::File;
        assert!(validate(Field::VideoUrl, &form).is_none());
    }

    #[test]
    fn video_file_needs_finished_upload() {
        let mut form = valid_text_form();
        form.content_mode = ContentMode::Video;
        form.media_source = MediaSource::File;
        form.media = Some(crate::upload::MediaFile::new("a.mp4", "video/mp4", vec![0; 8]));
        form.upload_progress = 60;
        assert!(!content_ready(&form, false));

        form.upload_progress = 100;
        assert!(!content_ready(&form, false), "no durable url yet");

        form.media_remote_url = Some("https://res.cloudinary.com/demo/video/upload/a.mp4".into());
        assert!(content_ready(&form, false));
        assert!(!content_ready(&form, true));
    }

    #[test]
    fn validation_is_idempotent() {
        let mut form = valid_text_form();
        form.profile_url = "nope".into();
        form.target_audience = "x".into();
        let first = validate_step(WizardStep::StarterInfo, &form);
        let second = validate_step(WizardStep::StarterInfo, &form);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn advanced_step_has_no_required_fields() {
        let form = FormState::default();
        assert!(validate_step(WizardStep::AdvancedOptions, &form).is_empty());
        assert!(step_eligible(WizardStep::AdvancedOptions, &form, false));
    }
}
