//! Wizard form data.
//!
//! `FormState` is owned by the wizard controller; everything else sees it
//! through a shared reference.

use serde::{Deserialize, Serialize};

use crate::upload::MediaFile;

/// Lower bound for `max_chars_per_tweet`.
pub const MIN_CHARS_PER_TWEET: u32 = 50;
/// Upper bound for `max_chars_per_tweet`.
pub const MAX_CHARS_PER_TWEET: u32 = 250;
/// Slider step for `max_chars_per_tweet`.
pub const CHARS_PER_TWEET_STEP: u32 = 10;

/// Suggestions offered by the style tag input.
pub const STYLE_TAG_SUGGESTIONS: &[&str] = &[
    "Mini Lessons",
    "Myth Busting",
    "Quotes + Take",
    "Thread Starters",
    "Hot Takes",
    "Case Studies",
];

/// Where the source content comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentMode {
    Video,
    #[default]
    Text,
}

/// How a video is provided when `ContentMode::Video` is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaSource {
    Url,
    #[default]
    File,
}

/// Number of tweets to generate, restricted to the offered choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct TweetCount(u32);

impl TweetCount {
    /// Every value the picker offers.
    pub const OPTIONS: [u32; 16] = [5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 20, 25, 30, 40, 50];

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for TweetCount {
    fn default() -> Self {
        Self(5)
    }
}

impl TryFrom<u32> for TweetCount {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if Self::OPTIONS.contains(&value) {
            Ok(Self(value))
        } else {
            Err(format!("{value} is not an offered tweet count"))
        }
    }
}

impl From<TweetCount> for u32 {
    fn from(count: TweetCount) -> Self {
        count.0
    }
}

/// Ordered set of tags. Insertion order is kept; duplicates are rejected
/// case-sensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct TagSet(Vec<String>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tag after trimming. Returns false for empty or duplicate tags.
    pub fn insert(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || self.contains(tag) {
            return false;
        }
        self.0.push(tag.to_string());
        true
    }

    pub fn remove(&mut self, tag: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|t| t != tag);
        self.0.len() != before
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<Vec<String>> for TagSet {
    fn from(tags: Vec<String>) -> Self {
        let mut set = TagSet::new();
        for tag in &tags {
            set.insert(tag);
        }
        set
    }
}

impl From<TagSet> for Vec<String> {
    fn from(set: TagSet) -> Self {
        set.0
    }
}

/// Round to the nearest multiple of 10 (halves round up) and clamp to
/// `[50, 250]`.
pub fn normalize_max_chars(value: i64) -> u32 {
    let step = CHARS_PER_TWEET_STEP as i64;
    let rounded = value.saturating_add(step / 2).div_euclid(step) * step;
    rounded.clamp(MIN_CHARS_PER_TWEET as i64, MAX_CHARS_PER_TWEET as i64) as u32
}

/// All wizard input.
#[derive(Debug, Clone, PartialEq)]
pub struct FormState {
    pub content_mode: ContentMode,
    pub media_source: MediaSource,
    /// Locally selected file, if any.
    pub media: Option<MediaFile>,
    /// Pasted video link, or the durable URL of a finished upload.
    pub media_remote_url: Option<String>,
    pub script_text: String,
    pub profile_url: String,
    pub target_audience: String,
    pub tweet_count: TweetCount,
    pub max_chars_per_tweet: u32,
    pub niches: TagSet,
    pub style_tags: TagSet,
    pub tone: String,
    pub hobbies: String,
    pub age: Option<u32>,
    pub gender: String,
    pub extra_context: String,
    pub upload_progress: u8,
}

impl Default for FormState {
    fn default() -> Self {
        Self {
            content_mode: ContentMode::default(),
            media_source: MediaSource::default(),
            media: None,
            media_remote_url: None,
            script_text: String::new(),
            profile_url: String::new(),
            target_audience: String::new(),
            tweet_count: TweetCount::default(),
            max_chars_per_tweet: 150,
            niches: TagSet::new(),
            style_tags: TagSet::new(),
            tone: "Casual".to_string(),
            hobbies: String::new(),
            age: None,
            gender: String::new(),
            extra_context: String::new(),
            upload_progress: 0,
        }
    }
}

/// A single user edit.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    ContentMode(ContentMode),
    MediaSource(MediaSource),
    MediaUrl(String),
    ScriptText(String),
    ProfileUrl(String),
    TargetAudience(String),
    TweetCount(TweetCount),
    /// Raw slider value; normalized on write.
    MaxCharsPerTweet(i64),
    AddNiche(String),
    RemoveNiche(String),
    AddStyleTag(String),
    RemoveStyleTag(String),
    Tone(String),
    Hobbies(String),
    Age(Option<u32>),
    Gender(String),
    ExtraContext(String),
}

impl FormState {
    /// Apply a user edit. Only the wizard controller calls this.
    pub(crate) fn apply(&mut self, update: FieldUpdate) {
        match update {
            FieldUpdate::ContentMode(mode) => {
                self.content_mode = mode;
                if mode == ContentMode::Video {
                    self.media_source = MediaSource::File;
                }
            }
            FieldUpdate::MediaSource(source) => self.media_source = source,
            FieldUpdate::MediaUrl(url) => {
                let url = url.trim();
                self.media_remote_url = (!url.is_empty()).then(|| url.to_string());
            }
            FieldUpdate::ScriptText(text) => self.script_text = text,
            FieldUpdate::ProfileUrl(url) => self.profile_url = url,
            FieldUpdate::TargetAudience(audience) => self.target_audience = audience,
            FieldUpdate::TweetCount(count) => self.tweet_count = count,
            FieldUpdate::MaxCharsPerTweet(raw) => {
                self.max_chars_per_tweet = normalize_max_chars(raw);
            }
            FieldUpdate::AddNiche(tag) => {
                self.niches.insert(&tag);
            }
            FieldUpdate::RemoveNiche(tag) => {
                self.niches.remove(&tag);
            }
            FieldUpdate::AddStyleTag(tag) => {
                self.style_tags.insert(&tag);
            }
            FieldUpdate::RemoveStyleTag(tag) => {
                self.style_tags.remove(&tag);
            }
            FieldUpdate::Tone(tone) => self.tone = tone,
            FieldUpdate::Hobbies(hobbies) => self.hobbies = hobbies,
            FieldUpdate::Age(age) => self.age = age,
            FieldUpdate::Gender(gender) => self.gender = gender,
            FieldUpdate::ExtraContext(context) => self.extra_context = context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_rounds_and_clamps() {
        assert_eq!(normalize_max_chars(150), 150);
        assert_eq!(normalize_max_chars(154), 150);
        assert_eq!(normalize_max_chars(155), 160);
        assert_eq!(normalize_max_chars(0), 50);
        assert_eq!(normalize_max_chars(-5), 50);
        assert_eq!(normalize_max_chars(44), 50);
        assert_eq!(normalize_max_chars(251), 250);
        assert_eq!(normalize_max_chars(i64::MAX), 250);
        assert_eq!(normalize_max_chars(i64::MIN), 50);
    }

    #[test]
    fn normalize_is_idempotent_over_range() {
        for raw in -100..400 {
            let once = normalize_max_chars(raw);
            assert_eq!(normalize_max_chars(once as i64), once, "raw = {raw}");
            assert!((50..=250).contains(&once));
            assert_eq!(once % 10, 0);
        }
    }

    #[test]
    fn tweet_count_rejects_unoffered_values() {
        assert_eq!(TweetCount::try_from(20).unwrap().get(), 20);
        assert!(TweetCount::try_from(16).is_err());
        assert!(TweetCount::try_from(0).is_err());
        assert!(serde_json::from_str::<TweetCount>("17").is_err());
        assert_eq!(serde_json::to_string(&TweetCount::default()).unwrap(), "5");
    }

    #[test]
    fn tag_set_dedupes_case_sensitively() {
        let mut tags = TagSet::new();
        assert!(tags.insert("Hot Takes"));
        assert!(!tags.insert("Hot Takes"));
        assert!(!tags.insert("  Hot Takes "));
        assert!(tags.insert("hot takes"));
        assert!(!tags.insert("   "));
        assert_eq!(tags.iter().collect::<Vec<_>>(), vec!["Hot Takes", "hot takes"]);

        assert!(tags.remove("Hot Takes"));
        assert!(!tags.remove("Hot Takes"));
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn tag_set_deserialize_dedupes() {
        let tags: TagSet = serde_json::from_str(r#"["a", "b", "a"]"#).unwrap();
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn defaults_match_fresh_wizard() {
        let form = FormState::default();
        assert_eq!(form.content_mode, ContentMode::Text);
        assert_eq!(form.tweet_count.get(), 5);
        assert_eq!(form.max_chars_per_tweet, 150);
        assert_eq!(form.tone, "Casual");
        assert_eq!(form.upload_progress, 0);
        assert!(form.media.is_none());
    }

    #[test]
    fn apply_normalizes_slider() {
        let mut form = FormState::default();
        form.apply(FieldUpdate::MaxCharsPerTweet(263));
        assert_eq!(form.max_chars_per_tweet, 250);
        form.apply(FieldUpdate::MaxCharsPerTweet(96));
        assert_eq!(form.max_chars_per_tweet, 100);
    }

    #[test]
    fn switching_to_video_defaults_to_file_source() {
        let mut form = FormState::default();
        form.apply(FieldUpdate::MediaSource(MediaSource::Url));
        form.apply(FieldUpdate::ContentMode(ContentMode::Video));
        assert_eq!(form.media_source, MediaSource::File);
    }

    #[test]
    fn blank_media_url_clears() {
        let mut form = FormState::default();
        form.apply(FieldUpdate::MediaUrl(" https://youtu.be/abcdefghijk ".into()));
        assert_eq!(form.media_remote_url.as_deref(), Some("https://youtu.be/abcdefghijk"));
        form.apply(FieldUpdate::MediaUrl(String::new()));
        assert!(form.media_remote_url.is_none());
    }
}
