//! WizardController: owns the form and gates every step change.
//!
//! All form writes go through one private path that re-runs validation, so
//! field edits and upload events can never race each other. Upload events
//! arrive over the pipeline's channel and are applied here, never by the
//! transfer task itself.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::{IntakeConfig, Timings, UploadLimits};
use crate::error::{UploadError, WizardError};
use crate::form::{ContentMode, FieldUpdate, FormState, MediaSource};
use crate::store::{IdentityStore, UserSession};
use crate::submission::{JobDispatcher, JobPayload, JobReceipt};
use crate::upload::{MediaFile, ObjectStore, SessionId, UploadEvent, UploadPipeline, UploadSession, UploadUpdate};
use crate::validation::{self, ValidationErrors};
use crate::verification::VerificationProtocol;

use super::step::WizardStep;

/// Remote collaborators the wizard talks to.
#[derive(Clone)]
pub struct WizardDeps {
    pub identity: Arc<dyn IdentityStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub dispatcher: Arc<dyn JobDispatcher>,
    pub clock: Arc<dyn Clock>,
    /// Needed only when `require_verified_email` is set.
    pub verification: Option<Arc<VerificationProtocol>>,
}

/// Tunables taken from [`IntakeConfig`].
#[derive(Debug, Clone, Default)]
pub struct WizardSettings {
    pub timings: Timings,
    pub upload: UploadLimits,
    pub require_verified_email: bool,
}

impl From<&IntakeConfig> for WizardSettings {
    fn from(config: &IntakeConfig) -> Self {
        Self {
            timings: config.timings.clone(),
            upload: config.upload.clone(),
            require_verified_email: config.require_verified_email,
        }
    }
}

/// Result of pressing the continue/submit button.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Nothing happened. Field errors, if any, say why; an empty map means
    /// the source content is not ready yet.
    Blocked(ValidationErrors),
    /// Final submission requires a verified email.
    NeedsVerification,
    Advanced(WizardStep),
    Submitted(JobReceipt),
}

pub struct WizardController {
    user: UserSession,
    identity: Arc<dyn IdentityStore>,
    dispatcher: Arc<dyn JobDispatcher>,
    clock: Arc<dyn Clock>,
    verification: Option<Arc<VerificationProtocol>>,
    settings: WizardSettings,
    step: WizardStep,
    form: FormState,
    errors: ValidationErrors,
    uploads: UploadPipeline,
    upload_error: Option<UploadError>,
    banner_until: Option<Instant>,
}

impl WizardController {
    /// Open the wizard for the signed-in user.
    pub async fn mount(deps: WizardDeps, settings: WizardSettings) -> Result<Self, WizardError> {
        let user = deps
            .identity
            .current_session()
            .await?
            .ok_or(WizardError::NotSignedIn)?;
        info!(user_id = %user.user_id, "Wizard mounted");

        let form = FormState::default();
        let step = WizardStep::default();
        Ok(Self {
            errors: validation::validate_step(step, &form),
            uploads: UploadPipeline::new(deps.objects, settings.upload.clone()),
            user,
            identity: deps.identity,
            dispatcher: deps.dispatcher,
            clock: deps.clock,
            verification: deps.verification,
            settings,
            step,
            form,
            upload_error: None,
            banner_until: None,
        })
    }

    pub fn user(&self) -> &UserSession {
        &self.user
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    /// Field errors for the current step, as of the last write.
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn upload_session(&self) -> Option<&UploadSession> {
        self.uploads.session()
    }

    pub fn upload_error(&self) -> Option<&UploadError> {
        self.upload_error.as_ref()
    }

    /// Local preview of the file being uploaded, until the upload completes.
    pub fn preview_url(&self) -> Option<String> {
        self.uploads.session().and_then(UploadSession::preview_url)
    }

    /// Whether the transient "upload complete" notice is showing.
    pub fn upload_complete_visible(&self) -> bool {
        self.banner_until
            .is_some_and(|until| self.clock.now() < until)
    }

    /// Whether the current step may be left right now.
    pub fn is_step_eligible(&self) -> bool {
        validation::step_eligible(self.step, &self.form, self.upload_failed())
    }

    fn upload_failed(&self) -> bool {
        self.uploads.session().is_some_and(UploadSession::is_failed)
    }

    /// Single write path for the form.
    fn write(&mut self, mutate: impl FnOnce(&mut FormState)) {
        mutate(&mut self.form);
        self.errors = validation::validate_step(self.step, &self.form);
    }

    /// Apply a user edit.
    pub fn update(&mut self, update: FieldUpdate) {
        self.write(|form| form.apply(update));
    }

    /// Pick a video file: switches to video mode and starts uploading it.
    ///
    /// A rejected file leaves the form as it was.
    pub fn select_media(&mut self, file: MediaFile) -> Result<SessionId, WizardError> {
        let id = match self.uploads.start(file.clone()) {
            Ok(id) => id,
            Err(e) => {
                self.upload_error = Some(e.clone());
                return Err(e.into());
            }
        };
        self.upload_error = None;
        self.banner_until = None;
        self.write(|form| {
            form.content_mode = ContentMode::Video;
            form.media_source = MediaSource::File;
            form.media = Some(file);
            form.media_remote_url = None;
            form.script_text.clear();
            form.upload_progress = 0;
        });
        Ok(id)
    }

    /// Remove the selected file and fall back to text mode.
    pub fn clear_media(&mut self) {
        self.uploads.clear();
        self.upload_error = None;
        self.banner_until = None;
        self.write(|form| {
            form.media = None;
            form.media_remote_url = None;
            form.upload_progress = 0;
            form.content_mode = ContentMode::Text;
        });
    }

    /// Restart a failed upload with the same file.
    pub fn retry_upload(&mut self) -> Option<Result<SessionId, WizardError>> {
        let result = self.uploads.retry()?;
        if result.is_ok() {
            self.upload_error = None;
            self.write(|form| form.upload_progress = 0);
        }
        Some(result.map_err(WizardError::from))
    }

    /// Apply every upload event already queued. Returns how many changed state.
    pub fn pump_upload_events(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.uploads.try_next_event() {
            if self.apply_upload_event(event) {
                applied += 1;
            }
        }
        applied
    }

    /// Wait for the next upload event and apply it. Returns whether it
    /// changed state; stale events do not.
    pub async fn next_upload_event(&mut self) -> bool {
        match self.uploads.next_event().await {
            Some(event) => self.apply_upload_event(event),
            None => false,
        }
    }

    fn apply_upload_event(&mut self, event: UploadEvent) -> bool {
        let Some(update) = self.uploads.apply(event) else {
            return false;
        };
        match update {
            UploadUpdate::Progress { percent, reached_full } => {
                self.write(|form| form.upload_progress = percent);
                if reached_full {
                    self.show_banner();
                }
            }
            UploadUpdate::Completed { url } => {
                if self.form.upload_progress < 100 {
                    self.show_banner();
                }
                self.write(|form| {
                    form.upload_progress = 100;
                    form.media_remote_url = Some(url);
                });
            }
            UploadUpdate::Failed(e) => {
                self.upload_error = Some(e);
                self.write(|_| {});
            }
        }
        true
    }

    fn show_banner(&mut self) {
        self.banner_until = Some(self.clock.now() + self.settings.timings.upload_banner);
    }

    /// Return to the previous step, keeping everything entered.
    pub fn back(&mut self) -> bool {
        let Some(previous) = self.step.previous() else {
            return false;
        };
        debug!(from = %self.step, to = %previous, "Wizard stepped back");
        self.step = previous;
        self.errors = validation::validate_step(self.step, &self.form);
        true
    }

    /// Start a new intake after a successful submission.
    pub fn restart(&mut self) {
        if self.step.is_terminal() {
            self.step = WizardStep::StarterInfo;
            self.errors = validation::validate_step(self.step, &self.form);
        }
    }

    /// Ask for a verification code for the signed-in email.
    pub async fn request_email_verification(&self) -> Result<(), WizardError> {
        let Some(protocol) = &self.verification else {
            return Ok(());
        };
        protocol.request(&self.user.email).await?;
        Ok(())
    }

    async fn email_verified(&self) -> bool {
        match &self.verification {
            Some(protocol) => protocol
                .verified_email()
                .await
                .is_some_and(|email| email == self.user.email),
            None => false,
        }
    }

    /// Advance from the current step, or send the job from the last one.
    ///
    /// An ineligible step is a no-op reported as [`SubmitOutcome::Blocked`].
    /// The final step also re-checks the starter fields and content, and
    /// sends the user back to the first step when they no longer pass.
    /// A failed dispatch keeps the form and step so the user can resubmit.
    pub async fn submit(&mut self) -> Result<SubmitOutcome, WizardError> {
        self.pump_upload_events();
        self.errors = validation::validate_step(self.step, &self.form);

        if !self.is_step_eligible() {
            debug!(step = %self.step, errors = self.errors.len(), "Submit ignored, step not eligible");
            return Ok(SubmitOutcome::Blocked(self.errors.clone()));
        }

        if !self.step.is_final() {
            let Some(next) = self.step.next() else {
                return Ok(SubmitOutcome::Blocked(ValidationErrors::new()));
            };
            info!(from = %self.step, to = %next, "Wizard advanced");
            self.step = next;
            self.errors = validation::validate_step(self.step, &self.form);
            return Ok(SubmitOutcome::Advanced(next));
        }

        // Starter fields stay editable on later steps.
        if !validation::step_eligible(WizardStep::StarterInfo, &self.form, self.upload_failed()) {
            info!(from = %self.step, "Starter info no longer valid, returning to first step");
            self.step = WizardStep::StarterInfo;
            self.errors = validation::validate_step(self.step, &self.form);
            return Ok(SubmitOutcome::Blocked(self.errors.clone()));
        }

        if self.settings.require_verified_email && !self.email_verified().await {
            debug!(user_id = %self.user.user_id, "Submit ignored, email not verified");
            return Ok(SubmitOutcome::NeedsVerification);
        }

        let receipt = self.dispatch().await?;
        self.uploads.clear();
        self.upload_error = None;
        self.banner_until = None;
        self.form = FormState::default();
        self.step = WizardStep::Submitted;
        self.errors = ValidationErrors::new();
        Ok(SubmitOutcome::Submitted(receipt))
    }

    /// Send the job, then hold until the submission floor has passed.
    async fn dispatch(&self) -> Result<JobReceipt, WizardError> {
        let started = self.clock.now();
        let payload = JobPayload::new(&self.form, &self.user);
        info!(user_id = %self.user.user_id, mode = ?payload.content_mode, "Dispatching generation job");

        let receipt = match self.dispatcher.dispatch(&payload).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(error = %e, "Job dispatch failed");
                return Err(e.into());
            }
        };

        let elapsed = self.clock.now().saturating_duration_since(started);
        let floor = self.settings.timings.submit_floor;
        if elapsed < floor {
            debug!(elapsed_ms = elapsed.as_millis() as u64, "Holding for submission floor");
            self.clock.sleep(floor - elapsed).await;
        }
        info!(status = receipt.status, elapsed_ms = elapsed.as_millis() as u64, "Generation job accepted");
        Ok(receipt)
    }

    /// Re-read the session; the user may have signed out elsewhere.
    pub async fn still_signed_in(&self) -> bool {
        matches!(
            self.identity.current_session().await,
            Ok(Some(session)) if session.user_id == self.user.user_id
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::clock::ManualClock;
    use crate::error::SubmissionError;
    use crate::store::MemoryStore;
    use crate::upload::testing::FakeStore;
    use crate::upload::UploadEventKind;
    use crate::validation::Field;
    use crate::verification::testing::FakeIssuer;

    /// Dispatcher that takes `delay` of virtual time to answer.
    struct FakeDispatcher {
        clock: ManualClock,
        delay: Duration,
        fail: bool,
        sent: Mutex<Vec<JobPayload>>,
    }

    impl FakeDispatcher {
        fn new(clock: &ManualClock, delay: Duration) -> Self {
            Self {
                clock: clock.clone(),
                delay,
                fail: false,
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl JobDispatcher for FakeDispatcher {
        async fn dispatch(&self, payload: &JobPayload) -> Result<JobReceipt, SubmissionError> {
            self.clock.advance(self.delay);
            self.sent.lock().unwrap().push(payload.clone());
            if self.fail {
                return Err(SubmissionError::Rejected {
                    status: 500,
                    message: "worker unavailable".into(),
                });
            }
            Ok(JobReceipt {
                status: 200,
                body: None,
            })
        }
    }

    struct Harness {
        clock: ManualClock,
        identity: Arc<MemoryStore>,
        dispatcher: Arc<FakeDispatcher>,
    }

    impl Harness {
        async fn new(delay: Duration) -> Self {
            let clock = ManualClock::new();
            Self {
                identity: Arc::new(MemoryStore::with_signed_in("ada@example.com", "hunter22").await.unwrap()),
                dispatcher: Arc::new(FakeDispatcher::new(&clock, delay)),
                clock,
            }
        }

        fn deps(&self, objects: Arc<dyn ObjectStore>) -> WizardDeps {
            WizardDeps {
                identity: self.identity.clone(),
                objects,
                dispatcher: self.dispatcher.clone(),
                clock: Arc::new(self.clock.clone()),
                verification: None,
            }
        }

        async fn mount(&self) -> WizardController {
            WizardController::mount(self.deps(FakeStore::instant()), WizardSettings::default())
                .await
                .unwrap()
        }
    }

    fn fill_starter(wizard: &mut WizardController, script_len: usize) {
        wizard.update(FieldUpdate::ProfileUrl("https://x.com/ada".into()));
        wizard.update(FieldUpdate::TargetAudience("Early-stage founders".into()));
        wizard.update(FieldUpdate::ScriptText("s".repeat(script_len)));
    }

    async fn wait_for_upload(wizard: &mut WizardController) {
        while wizard.form().media_remote_url.is_none() && wizard.upload_error().is_none() {
            tokio::time::timeout(Duration::from_secs(5), wizard.next_upload_event())
                .await
                .expect("upload event");
        }
    }

    #[tokio::test]
    async fn mount_requires_signed_in_user() {
        let harness = Harness::new(Duration::ZERO).await;
        harness.identity.sign_out().await;
        let result = WizardController::mount(harness.deps(FakeStore::instant()), WizardSettings::default()).await;
        assert!(matches!(result, Err(WizardError::NotSignedIn)));
    }

    #[tokio::test]
    async fn notices_sign_out() {
        let harness = Harness::new(Duration::ZERO).await;
        let wizard = harness.mount().await;
        assert!(wizard.still_signed_in().await);
        harness.identity.sign_out().await;
        assert!(!wizard.still_signed_in().await);
    }

    #[tokio::test]
    async fn script_length_boundary() {
        let harness = Harness::new(Duration::ZERO).await;
        let mut wizard = harness.mount().await;

        fill_starter(&mut wizard, 299);
        let outcome = wizard.submit().await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Blocked(ref e) if e.contains_key(&Field::ScriptText)));
        assert_eq!(wizard.step(), WizardStep::StarterInfo);

        wizard.update(FieldUpdate::ScriptText("s".repeat(300)));
        assert!(wizard.errors().is_empty());
        assert_eq!(
            wizard.submit().await.unwrap(),
            SubmitOutcome::Advanced(WizardStep::AdvancedOptions)
        );
    }

    #[tokio::test]
    async fn short_audience_blocks_regardless_of_other_fields() {
        let harness = Harness::new(Duration::ZERO).await;
        let mut wizard = harness.mount().await;
        fill_starter(&mut wizard, 500);
        wizard.update(FieldUpdate::TargetAudience("devs".into()));

        assert!(!wizard.is_step_eligible());
        let SubmitOutcome::Blocked(errors) = wizard.submit().await.unwrap() else {
            panic!("expected blocked");
        };
        assert_eq!(errors.keys().collect::<Vec<_>>(), vec![&Field::TargetAudience]);
    }

    #[tokio::test]
    async fn submit_waits_out_floor_after_fast_dispatch() {
        let harness = Harness::new(Duration::from_secs(2)).await;
        let mut wizard = harness.mount().await;
        fill_starter(&mut wizard, 300);
        wizard.submit().await.unwrap();

        let start = harness.clock.elapsed();
        let outcome = wizard.submit().await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Submitted(_)));
        assert_eq!(harness.clock.elapsed() - start, Duration::from_secs(20));
        assert_eq!(wizard.step(), WizardStep::Submitted);
        assert_eq!(wizard.form(), &FormState::default());

        assert!(matches!(wizard.submit().await.unwrap(), SubmitOutcome::Blocked(_)));
        wizard.restart();
        assert_eq!(wizard.step(), WizardStep::StarterInfo);
    }

    #[tokio::test]
    async fn slow_dispatch_gets_no_extra_wait() {
        let harness = Harness::new(Duration::from_secs(25)).await;
        let mut wizard = harness.mount().await;
        fill_starter(&mut wizard, 300);
        wizard.submit().await.unwrap();

        let start = harness.clock.elapsed();
        wizard.submit().await.unwrap();
        assert_eq!(harness.clock.elapsed() - start, Duration::from_secs(25));
    }

    #[tokio::test]
    async fn failed_dispatch_keeps_form() {
        let clock = ManualClock::new();
        let harness = Harness {
            identity: Arc::new(MemoryStore::with_signed_in("ada@example.com", "hunter22").await.unwrap()),
            dispatcher: Arc::new(FakeDispatcher {
                fail: true,
                ..FakeDispatcher::new(&clock, Duration::from_secs(1))
            }),
            clock,
        };
        let mut wizard = harness.mount().await;
        fill_starter(&mut wizard, 300);
        wizard.update(FieldUpdate::AddNiche("SaaS".into()));
        wizard.submit().await.unwrap();

        let err = wizard.submit().await.unwrap_err();
        assert_eq!(err.user_message(), "Failed to generate tweets. Please try again.");
        assert_eq!(wizard.step(), WizardStep::AdvancedOptions);
        assert!(wizard.form().niches.contains("SaaS"));
        assert_eq!(wizard.form().script_text.len(), 300);

        let sent = harness.dispatcher.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].user_email, "ada@example.com");
    }

    #[tokio::test]
    async fn back_keeps_entered_data() {
        let harness = Harness::new(Duration::ZERO).await;
        let mut wizard = harness.mount().await;
        assert!(!wizard.back());
        fill_starter(&mut wizard, 300);
        wizard.submit().await.unwrap();
        wizard.update(FieldUpdate::MaxCharsPerTweet(203));

        assert!(wizard.back());
        assert_eq!(wizard.step(), WizardStep::StarterInfo);
        assert_eq!(wizard.form().max_chars_per_tweet, 200);
        assert_eq!(wizard.form().target_audience, "Early-stage founders");
    }

    #[tokio::test]
    async fn starter_edits_on_final_step_block_dispatch() {
        let harness = Harness::new(Duration::ZERO).await;
        let mut wizard = harness.mount().await;
        fill_starter(&mut wizard, 300);
        assert_eq!(
            wizard.submit().await.unwrap(),
            SubmitOutcome::Advanced(WizardStep::AdvancedOptions)
        );

        wizard.update(FieldUpdate::ScriptText("short".into()));
        wizard.update(FieldUpdate::ProfileUrl("not a url".into()));
        let SubmitOutcome::Blocked(errors) = wizard.submit().await.unwrap() else {
            panic!("expected blocked");
        };
        assert_eq!(
            errors.keys().collect::<Vec<_>>(),
            vec![&Field::ScriptText, &Field::ProfileUrl]
        );
        assert_eq!(wizard.step(), WizardStep::StarterInfo);
        assert_eq!(wizard.errors(), &errors);
        assert!(harness.dispatcher.sent.lock().unwrap().is_empty());

        fill_starter(&mut wizard, 300);
        wizard.submit().await.unwrap();
        assert!(matches!(wizard.submit().await.unwrap(), SubmitOutcome::Submitted(_)));
        assert_eq!(harness.dispatcher.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn clearing_video_on_final_step_blocks_dispatch() {
        let harness = Harness::new(Duration::ZERO).await;
        let mut wizard = harness.mount().await;
        fill_starter(&mut wizard, 0);
        wizard
            .select_media(MediaFile::new("talk.mp4", "video/mp4", vec![1; 2048]))
            .unwrap();
        wait_for_upload(&mut wizard).await;
        assert_eq!(
            wizard.submit().await.unwrap(),
            SubmitOutcome::Advanced(WizardStep::AdvancedOptions)
        );

        wizard.clear_media();
        let SubmitOutcome::Blocked(errors) = wizard.submit().await.unwrap() else {
            panic!("expected blocked");
        };
        assert!(errors.contains_key(&Field::ScriptText));
        assert_eq!(wizard.step(), WizardStep::StarterInfo);
        assert!(harness.dispatcher.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_upload_on_final_step_blocks_dispatch() {
        let harness = Harness::new(Duration::ZERO).await;
        let mut wizard = WizardController::mount(harness.deps(FakeStore::failing()), WizardSettings::default())
            .await
            .unwrap();
        fill_starter(&mut wizard, 300);
        wizard.submit().await.unwrap();
        assert_eq!(wizard.step(), WizardStep::AdvancedOptions);

        wizard
            .select_media(MediaFile::new("talk.mp4", "video/mp4", vec![1; 400]))
            .unwrap();
        wait_for_upload(&mut wizard).await;
        assert!(wizard.upload_error().is_some());

        assert!(matches!(wizard.submit().await.unwrap(), SubmitOutcome::Blocked(_)));
        assert_eq!(wizard.step(), WizardStep::StarterInfo);
        assert!(harness.dispatcher.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn uploaded_video_makes_step_eligible() {
        let harness = Harness::new(Duration::ZERO).await;
        let mut wizard = harness.mount().await;
        fill_starter(&mut wizard, 0);
        wizard.update(FieldUpdate::ScriptText("draft".into()));

        wizard
            .select_media(MediaFile::new("talk.mp4", "video/mp4", vec![1; 2048]))
            .unwrap();
        assert_eq!(wizard.form().content_mode, ContentMode::Video);
        assert!(wizard.form().script_text.is_empty());
        assert!(wizard.preview_url().is_some());
        assert!(!wizard.is_step_eligible());

        wait_for_upload(&mut wizard).await;
        assert_eq!(wizard.form().upload_progress, 100);
        assert_eq!(
            wizard.form().media_remote_url.as_deref(),
            Some("https://cdn.example.com/talk.mp4")
        );
        assert!(wizard.preview_url().is_none());

        assert!(wizard.upload_complete_visible());
        harness.clock.advance(Duration::from_secs(3));
        assert!(!wizard.upload_complete_visible());

        assert_eq!(
            wizard.submit().await.unwrap(),
            SubmitOutcome::Advanced(WizardStep::AdvancedOptions)
        );
    }

    #[tokio::test]
    async fn stale_upload_event_does_not_complete_new_session() {
        let harness = Harness::new(Duration::ZERO).await;
        let gate = Arc::new(Notify::new());
        let mut wizard =
            WizardController::mount(harness.deps(FakeStore::gated(Arc::clone(&gate))), WizardSettings::default())
                .await
                .unwrap();

        let first = wizard
            .select_media(MediaFile::new("a.mp4", "video/mp4", vec![0; 1000]))
            .unwrap();
        let second = wizard
            .select_media(MediaFile::new("b.mp4", "video/mp4", vec![0; 1000]))
            .unwrap();
        assert_ne!(first, second);

        wizard.uploads.inject(UploadEvent {
            session_id: first,
            kind: UploadEventKind::Progress(100),
        });
        wizard.uploads.inject(UploadEvent {
            session_id: first,
            kind: UploadEventKind::Completed("https://cdn.example.com/a.mp4".into()),
        });
        tokio::task::yield_now().await;
        wizard.pump_upload_events();

        assert!(wizard.form().upload_progress < 100);
        assert!(wizard.form().media_remote_url.is_none());
        assert!(!wizard.upload_complete_visible());
        assert_eq!(wizard.upload_session().map(|s| s.id), Some(second));
    }

    #[tokio::test]
    async fn rejected_file_leaves_form_untouched() {
        let harness = Harness::new(Duration::ZERO).await;
        let settings = WizardSettings {
            upload: UploadLimits {
                max_bytes: 1000,
                allowed_types: None,
            },
            ..WizardSettings::default()
        };
        let mut wizard = WizardController::mount(harness.deps(FakeStore::instant()), settings)
            .await
            .unwrap();
        wizard.update(FieldUpdate::ScriptText("keep me".into()));

        let err = wizard
            .select_media(MediaFile::new("big.mp4", "video/mp4", vec![0; 1001]))
            .unwrap_err();
        assert_eq!(err.user_message(), "File size must be less than 100 MB");
        assert_eq!(wizard.form().upload_progress, 0);
        assert_eq!(wizard.form().content_mode, ContentMode::Text);
        assert_eq!(wizard.form().script_text, "keep me");
        assert!(wizard.upload_session().is_none());
    }

    #[tokio::test]
    async fn failed_upload_blocks_until_retry() {
        let harness = Harness::new(Duration::ZERO).await;
        let mut wizard = WizardController::mount(harness.deps(FakeStore::failing()), WizardSettings::default())
            .await
            .unwrap();
        fill_starter(&mut wizard, 0);
        wizard
            .select_media(MediaFile::new("talk.mp4", "video/mp4", vec![1; 400]))
            .unwrap();
        wait_for_upload(&mut wizard).await;

        assert_eq!(
            wizard.upload_error().map(UploadError::user_message),
            Some("Failed to upload video")
        );
        assert!(matches!(wizard.submit().await.unwrap(), SubmitOutcome::Blocked(_)));
        assert!(wizard.form().media.is_some());

        assert!(matches!(wizard.retry_upload(), Some(Ok(_))));
        assert!(wizard.upload_error().is_none());
        assert_eq!(wizard.form().upload_progress, 0);
    }

    #[tokio::test]
    async fn clear_media_returns_to_text_mode() {
        let harness = Harness::new(Duration::ZERO).await;
        let mut wizard = harness.mount().await;
        wizard
            .select_media(MediaFile::new("talk.mp4", "video/mp4", vec![1; 400]))
            .unwrap();
        wizard.clear_media();

        assert_eq!(wizard.form().content_mode, ContentMode::Text);
        assert!(wizard.form().media.is_none());
        assert!(wizard.upload_session().is_none());
        assert_eq!(wizard.uploads.previews().live(), 0);
    }

    #[tokio::test]
    async fn final_submit_gated_on_verified_email() {
        let harness = Harness::new(Duration::ZERO).await;
        let records = Arc::new(MemoryStore::new());
        let issuer = FakeIssuer::new(Arc::clone(&records), "424242");
        let protocol = Arc::new(VerificationProtocol::new(
            Arc::new(issuer),
            records,
            Arc::new(harness.clock.clone()),
            Timings::default(),
        ));
        let deps = WizardDeps {
            verification: Some(Arc::clone(&protocol)),
            ..harness.deps(FakeStore::instant())
        };
        let settings = WizardSettings {
            require_verified_email: true,
            ..WizardSettings::default()
        };
        let mut wizard = WizardController::mount(deps, settings).await.unwrap();
        fill_starter(&mut wizard, 300);
        wizard.submit().await.unwrap();

        assert_eq!(wizard.submit().await.unwrap(), SubmitOutcome::NeedsVerification);

        wizard.request_email_verification().await.unwrap();
        protocol.submit_code("424242").await.unwrap();
        assert!(matches!(wizard.submit().await.unwrap(), SubmitOutcome::Submitted(_)));
    }
}
