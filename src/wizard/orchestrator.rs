use crate::gateway::{GatewayError, ListingGateway, SUBMISSION_FALLBACK};
use crate::wizard::draft::{DraftError, ListingFormState};
use crate::wizard::media::{PreviewRegistry, StagedMedia};
use crate::wizard::payload::build_payload;
use crate::wizard::schema::{ListingCategory, WizardStep, resolve_steps};
use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use std::{sync::Arc, time::Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WizardState {
    SelectingCategory,
    AtStep { index: usize },
    Submitting,
    Succeeded { message: Option<String> },
    Failed { reason: String },
}

impl WizardState {
    pub fn name(&self) -> &'static str {
        match self {
            WizardState::SelectingCategory => "selecting_category",
            WizardState::AtStep { .. } => "at_step",
            WizardState::Submitting => "submitting",
            WizardState::Succeeded { .. } => "succeeded",
            WizardState::Failed { .. } => "failed",
        }
    }
}

/// Checked in this order; the first failure is the one reported.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a property title")]
    MissingTitle,
    #[error("Please enter the property location")]
    MissingLocation,
    #[error("Please enter a price")]
    MissingPrice,
    #[error("Please add at least one photo")]
    MissingPhoto,
    #[error("Please select a category type")]
    MissingCategoryType,
    #[error("Please select a property type")]
    MissingPropertySubType,
    #[error("Please enter the lease duration")]
    MissingLeaseDuration,
}

pub fn validate(form: &ListingFormState) -> Result<(), ValidationError> {
    let draft = form.draft();
    let blank = |value: &str| value.trim().is_empty();
    if blank(&draft.title) {
        return Err(ValidationError::MissingTitle);
    }
    if blank(&draft.location) {
        return Err(ValidationError::MissingLocation);
    }
    if blank(&draft.price) {
        return Err(ValidationError::MissingPrice);
    }
    if form.media().photos().is_empty() {
        return Err(ValidationError::MissingPhoto);
    }
    if blank(&draft.category_type) {
        return Err(ValidationError::MissingCategoryType);
    }
    if blank(&draft.property_sub_type) {
        return Err(ValidationError::MissingPropertySubType);
    }
    if draft.category == ListingCategory::Lease
        && draft.terms.lease_duration().is_none_or(blank)
    {
        return Err(ValidationError::MissingLeaseDuration);
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("select a listing category first")]
    NoCategory,
    #[error("a submission is already in progress")]
    Busy,
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
    #[error(transparent)]
    Draft(#[from] DraftError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmissionResult {
    Success { message: Option<String> },
    Failure { reason: String },
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "progress", rename_all = "snake_case")]
pub enum Progress {
    Advanced { index: usize },
    Submitted(SubmissionResult),
}

/// One listing wizard: category choice, step navigation and the
/// upload-then-create submission.
pub struct ListingWizard {
    gateway: Arc<dyn ListingGateway>,
    previews: PreviewRegistry,
    state: WizardState,
    form: Option<ListingFormState>,
    notice: Option<String>,
}

impl ListingWizard {
    pub fn new(gateway: Arc<dyn ListingGateway>, previews: PreviewRegistry) -> Self {
        Self {
            gateway,
            previews,
            state: WizardState::SelectingCategory,
            form: None,
            notice: None,
        }
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    /// Error text currently on display, if any.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn form(&self) -> Option<&ListingFormState> {
        self.form.as_ref()
    }

    pub fn category(&self) -> Option<ListingCategory> {
        self.form.as_ref().map(ListingFormState::category)
    }

    pub fn steps(&self) -> &'static [WizardStep] {
        self.category().map(resolve_steps).unwrap_or(&[])
    }

    pub fn current_step(&self) -> Option<&'static WizardStep> {
        let steps = self.steps();
        match self.state {
            WizardState::AtStep { index } => steps.get(index),
            WizardState::Submitting | WizardState::Failed { .. } => steps.last(),
            _ => None,
        }
    }

    fn last_index(&self) -> usize {
        self.steps().len().saturating_sub(1)
    }

    /// Mutable draft access, open while a step or a failed submission is showing.
    pub fn form_mut(&mut self) -> Result<&mut ListingFormState, WizardError> {
        match self.state {
            WizardState::AtStep { .. } | WizardState::Failed { .. } => {}
            WizardState::Submitting => return Err(WizardError::Busy),
            WizardState::SelectingCategory => return Err(WizardError::NoCategory),
            WizardState::Succeeded { .. } => {
                return Err(WizardError::InvalidTransition {
                    action: "edit the draft",
                    state: "showing a completed submission",
                });
            }
        }
        self.form.as_mut().ok_or(WizardError::NoCategory)
    }

    /// Starts a fresh draft for `category`, discarding any previous draft.
    pub fn select_category(&mut self, category: ListingCategory) -> Result<(), WizardError> {
        if self.state == WizardState::Submitting {
            return Err(WizardError::Busy);
        }
        self.form = None;
        self.form = Some(ListingFormState::new(category, self.previews.clone()));
        self.state = WizardState::AtStep { index: 0 };
        self.notice = None;
        info!(target = "listing.wizard", category = %category, "category selected");
        Ok(())
    }

    pub fn reset_form(&mut self) -> Result<(), WizardError> {
        self.form_mut()?.reset_form();
        if let WizardState::Failed { .. } = self.state {
            self.state = WizardState::AtStep {
                index: self.last_index(),
            };
        }
        self.notice = None;
        Ok(())
    }

    pub fn go_prev(&mut self) -> &WizardState {
        let target = match self.state {
            WizardState::AtStep { index } if index > 0 => Some(index - 1),
            WizardState::Failed { .. } if self.last_index() > 0 => Some(self.last_index() - 1),
            _ => None,
        };
        if let Some(index) = target {
            self.state = WizardState::AtStep { index };
        }
        &self.state
    }

    /// Advances one step, or validates and submits from the last step.
    /// A failed submission can be retried by calling this again.
    pub async fn go_next(&mut self) -> Result<Progress, WizardError> {
        let last = self.last_index();
        match self.state {
            WizardState::SelectingCategory => Err(WizardError::NoCategory),
            WizardState::Submitting => Err(WizardError::Busy),
            WizardState::Succeeded { .. } => Err(WizardError::InvalidTransition {
                action: "continue",
                state: "showing a completed submission",
            }),
            WizardState::AtStep { index } if index < last => {
                self.state = WizardState::AtStep { index: index + 1 };
                self.notice = None;
                Ok(Progress::Advanced { index: index + 1 })
            }
            WizardState::AtStep { .. } | WizardState::Failed { .. } => self.submit().await,
        }
    }

    pub fn close(&mut self) -> Result<(), WizardError> {
        if self.state == WizardState::Submitting {
            return Err(WizardError::Busy);
        }
        self.form = None;
        self.state = WizardState::SelectingCategory;
        self.notice = None;
        Ok(())
    }

    async fn submit(&mut self) -> Result<Progress, WizardError> {
        let last = self.last_index();
        let Some(form) = self.form.as_ref() else {
            return Err(WizardError::NoCategory);
        };
        if let Err(err) = validate(form) {
            self.state = WizardState::AtStep { index: last };
            self.notice = Some(err.to_string());
            return Err(err.into());
        }

        let category = form.category();
        info!(
            target = "listing.wizard",
            category = %category,
            photos = form.media().photos().len(),
            video = form.media().video().is_some(),
            "submission started"
        );
        let guard = SubmittingGuard::enter(&mut self.state, &mut self.notice, category);

        let started = Instant::now();
        let outcome = run_submission(self.gateway.as_ref(), form).await;
        let elapsed_ms = started.elapsed().as_millis();

        let result = match outcome {
            Ok(message) => {
                if let Some(form) = self.form.as_mut() {
                    form.reset_form();
                }
                crate::metrics::submission_outcome(category.as_str(), "success", elapsed_ms);
                info!(target = "listing.wizard", category = %category, elapsed_ms = elapsed_ms as u64, "listing created");
                guard.settle(
                    WizardState::Succeeded {
                        message: message.clone(),
                    },
                    None,
                );
                SubmissionResult::Success { message }
            }
            Err(err) => {
                crate::metrics::submission_outcome(category.as_str(), err.stage(), elapsed_ms);
                warn!(target = "listing.wizard", category = %category, stage = err.stage(), error = %err.source, "submission failed");
                let reason = err.source.reason();
                guard.settle(
                    WizardState::Failed {
                        reason: reason.clone(),
                    },
                    Some(reason.clone()),
                );
                SubmissionResult::Failure { reason }
            }
        };
        Ok(Progress::Submitted(result))
    }
}

/// Keeps the wizard in `Submitting` while a submission runs. If the
/// submission future is dropped before it settles, the wizard lands in
/// `Failed` with its draft and media intact.
struct SubmittingGuard<'a> {
    state: &'a mut WizardState,
    notice: &'a mut Option<String>,
    category: ListingCategory,
}

impl<'a> SubmittingGuard<'a> {
    fn enter(
        state: &'a mut WizardState,
        notice: &'a mut Option<String>,
        category: ListingCategory,
    ) -> Self {
        *state = WizardState::Submitting;
        *notice = None;
        Self {
            state,
            notice,
            category,
        }
    }

    fn settle(self, state: WizardState, notice: Option<String>) {
        *self.state = state;
        *self.notice = notice;
    }
}

impl Drop for SubmittingGuard<'_> {
    fn drop(&mut self) {
        if *self.state != WizardState::Submitting {
            return;
        }
        warn!(target = "listing.wizard", category = %self.category, "submission dropped before it settled");
        crate::metrics::submission_outcome(self.category.as_str(), "interrupted", 0);
        let reason = SUBMISSION_FALLBACK.to_string();
        *self.notice = Some(reason.clone());
        *self.state = WizardState::Failed { reason };
    }
}

#[derive(Debug)]
struct SubmissionFailure {
    uploading: bool,
    source: GatewayError,
}

impl SubmissionFailure {
    fn stage(&self) -> &'static str {
        if self.uploading {
            "upload_failed"
        } else {
            "create_failed"
        }
    }
}

fn destination_path(category: ListingCategory, stamp: i64, media: &StagedMedia) -> String {
    format!(
        "properties/{}/{stamp}/{}-{}",
        category.as_str(),
        media.id(),
        media.file().file_name
    )
}

async fn upload_staged(
    gateway: &dyn ListingGateway,
    category: ListingCategory,
    stamp: i64,
    media: &StagedMedia,
) -> Result<String, GatewayError> {
    let started = Instant::now();
    let path = destination_path(category, stamp, media);
    let url = gateway.upload(media.file(), &path).await?;
    crate::metrics::upload_elapsed(media.kind().as_str(), started.elapsed().as_millis());
    Ok(url)
}

/// Uploads photos as one batch, then the video, then creates the record.
/// The record is only created once every upload has succeeded.
async fn run_submission(
    gateway: &dyn ListingGateway,
    form: &ListingFormState,
) -> Result<Option<String>, SubmissionFailure> {
    let category = form.category();
    let stamp = Utc::now().timestamp_millis();
    let uploading = |source| SubmissionFailure {
        uploading: true,
        source,
    };

    let settled = join_all(
        form.media()
            .photos()
            .iter()
            .map(|photo| upload_staged(gateway, category, stamp, photo)),
    )
    .await;
    let photo_urls = settled
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .map_err(uploading)?;

    let video_url = match form.media().video() {
        Some(video) => Some(
            upload_staged(gateway, category, stamp, video)
                .await
                .map_err(uploading)?,
        ),
        None => None,
    };

    let payload = build_payload(form.draft(), &photo_urls, video_url.as_deref());
    let receipt = gateway
        .create_listing(&payload)
        .await
        .map_err(|source| SubmissionFailure {
            uploading: false,
            source,
        })?;
    debug!(target = "listing.wizard", listing_id = receipt.id.as_deref().unwrap_or("-"), "listing record created");
    Ok(receipt.message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::InMemoryGateway;
    use crate::wizard::draft::{FieldKey, ListingDraft};
    use crate::wizard::media::{MediaFile, MediaKind};
    use std::time::Duration;

    fn photo(name: &str) -> MediaFile {
        MediaFile::new(name, "image/jpeg", name.as_bytes().to_vec())
    }

    fn new_wizard(gateway: InMemoryGateway) -> (ListingWizard, Arc<InMemoryGateway>, PreviewRegistry) {
        let gateway = Arc::new(gateway);
        let previews = PreviewRegistry::new();
        let wizard = ListingWizard::new(gateway.clone(), previews.clone());
        (wizard, gateway, previews)
    }

    fn fill_required(wizard: &mut ListingWizard) {
        let form = wizard.form_mut().unwrap();
        form.update_field(FieldKey::Title, "Sunset Flat").unwrap();
        form.update_field(FieldKey::Location, "Lagos").unwrap();
        form.update_field(FieldKey::Price, "50000").unwrap();
        form.update_field(FieldKey::CategoryType, "residential").unwrap();
        form.update_field(FieldKey::PropertySubType, "apartment").unwrap();
    }

    async fn walk_to_last(wizard: &mut ListingWizard) {
        while let WizardState::AtStep { index } = *wizard.state() {
            if index == wizard.steps().len() - 1 {
                break;
            }
            wizard.go_next().await.unwrap();
        }
    }

    fn file_name(url: &str) -> &str {
        url.rsplit_once('-').map(|(_, name)| name).unwrap_or(url)
    }

    #[tokio::test]
    async fn rent_listing_end_to_end() {
        let (mut wizard, gateway, previews) = new_wizard(InMemoryGateway::new().with_message("Listing submitted for review"));
        wizard.select_category(ListingCategory::Rent).unwrap();
        fill_required(&mut wizard);
        wizard.form_mut().unwrap().media_mut().add_photos(vec![photo("front.jpg")]);

        assert_eq!(wizard.go_next().await.unwrap(), Progress::Advanced { index: 1 });
        assert_eq!(wizard.go_next().await.unwrap(), Progress::Advanced { index: 2 });
        let progress = wizard.go_next().await.unwrap();

        assert_eq!(
            progress,
            Progress::Submitted(SubmissionResult::Success {
                message: Some("Listing submitted for review".into())
            })
        );
        let created = gateway.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].media.len(), 1);
        assert_eq!(created[0].media[0].sort_order, 1);
        assert_eq!(created[0].media[0].media_type, MediaKind::Image);
        assert!(created[0].media[0].url.contains("properties/rent/"));
        assert_eq!(created[0].price, 50000.0);
        assert!(matches!(wizard.state(), WizardState::Succeeded { .. }));
        let form = wizard.form().unwrap();
        assert_eq!(form.draft(), &ListingDraft::new(ListingCategory::Rent));
        assert!(form.media().photos().is_empty());
        assert_eq!(previews.stats().live, 0);
    }

    #[tokio::test]
    async fn switching_category_discards_the_draft() {
        for first in ListingCategory::ALL {
            for second in ListingCategory::ALL.into_iter().filter(|c| *c != first) {
                let (mut wizard, _, previews) = new_wizard(InMemoryGateway::new());
                wizard.select_category(first).unwrap();
                fill_required(&mut wizard);
                wizard.form_mut().unwrap().media_mut().add_photos(vec![photo("a.jpg")]);
                wizard.go_next().await.unwrap();

                wizard.select_category(second).unwrap();

                assert_eq!(wizard.state(), &WizardState::AtStep { index: 0 });
                assert_eq!(wizard.form().unwrap().draft(), &ListingDraft::new(second));
                assert!(wizard.form().unwrap().media().photos().is_empty());
                assert_eq!(previews.stats().live, 0);
            }
        }
    }

    #[tokio::test]
    async fn reordered_photos_keep_order_regardless_of_completion() {
        let gateway = InMemoryGateway::new()
            .with_delay("A.jpg", 30)
            .with_delay("B.jpg", 15);
        let (mut wizard, gateway, _) = new_wizard(gateway);
        wizard.select_category(ListingCategory::Sell).unwrap();
        fill_required(&mut wizard);
        let form = wizard.form_mut().unwrap();
        let ids = form
            .media_mut()
            .add_photos(vec![photo("A.jpg"), photo("B.jpg"), photo("C.jpg")]);
        form.media_mut()
            .set_video(Some(MediaFile::new("tour.mp4", "video/mp4", vec![9u8])));
        assert!(form.media_mut().reorder_photos(ids[0], ids[2]));

        walk_to_last(&mut wizard).await;
        wizard.go_next().await.unwrap();

        let created = gateway.created();
        let media = &created[0].media;
        let order: Vec<_> = media.iter().map(|m| (m.sort_order, file_name(&m.url))).collect();
        assert_eq!(
            order,
            vec![(1, "B.jpg"), (2, "C.jpg"), (3, "A.jpg"), (4, "tour.mp4")]
        );
        assert_eq!(media[3].media_type, MediaKind::Video);
        let uploads = gateway.uploads.lock().unwrap().clone();
        assert!(uploads.last().unwrap().ends_with("tour.mp4"));
    }

    #[tokio::test]
    async fn validation_reports_first_failing_rule_only() {
        let (mut wizard, gateway, _) = new_wizard(InMemoryGateway::new());
        wizard.select_category(ListingCategory::Rent).unwrap();
        walk_to_last(&mut wizard).await;

        let err = wizard.go_next().await.unwrap_err();

        assert!(matches!(err, WizardError::Validation(ValidationError::MissingTitle)));
        assert_eq!(wizard.notice(), Some("Please enter a property title"));
        assert_eq!(wizard.state(), &WizardState::AtStep { index: 2 });
        assert_eq!(gateway.upload_count(), 0);
    }

    #[tokio::test]
    async fn validation_order_follows_rule_list() {
        let (mut wizard, _, _) = new_wizard(InMemoryGateway::new());
        wizard.select_category(ListingCategory::Rent).unwrap();
        let form = wizard.form_mut().unwrap();
        form.update_field(FieldKey::Title, "Flat").unwrap();
        form.update_field(FieldKey::Location, "Abuja").unwrap();
        form.update_field(FieldKey::Price, "10").unwrap();
        assert_eq!(validate(form), Err(ValidationError::MissingPhoto));
        form.media_mut().add_photos(vec![photo("a.jpg")]);
        assert_eq!(validate(form), Err(ValidationError::MissingCategoryType));
        form.update_field(FieldKey::CategoryType, "residential").unwrap();
        assert_eq!(validate(form), Err(ValidationError::MissingPropertySubType));
        form.update_field(FieldKey::PropertySubType, "duplex").unwrap();
        assert_eq!(validate(form), Ok(()));
    }

    #[tokio::test]
    async fn blank_location_then_price_stop_submission() {
        let (mut wizard, gateway, _) = new_wizard(InMemoryGateway::new());
        wizard.select_category(ListingCategory::Rent).unwrap();
        fill_required(&mut wizard);
        let form = wizard.form_mut().unwrap();
        form.media_mut().add_photos(vec![photo("a.jpg")]);
        form.update_field(FieldKey::Location, "   ").unwrap();
        form.update_field(FieldKey::Price, "").unwrap();
        walk_to_last(&mut wizard).await;

        let err = wizard.go_next().await.unwrap_err();
        assert!(matches!(err, WizardError::Validation(ValidationError::MissingLocation)));
        assert_eq!(wizard.notice(), Some("Please enter the property location"));

        wizard
            .form_mut()
            .unwrap()
            .update_field(FieldKey::Location, "Lagos")
            .unwrap();
        let err = wizard.go_next().await.unwrap_err();
        assert!(matches!(err, WizardError::Validation(ValidationError::MissingPrice)));
        assert_eq!(wizard.notice(), Some("Please enter a price"));
        assert_eq!(gateway.upload_count(), 0);
        assert!(gateway.created().is_empty());
    }

    #[tokio::test]
    async fn dropped_submission_returns_to_an_editable_state() {
        let (mut wizard, gateway, previews) = new_wizard(InMemoryGateway::new().with_delay("a.jpg", 200));
        wizard.select_category(ListingCategory::Rent).unwrap();
        fill_required(&mut wizard);
        wizard.form_mut().unwrap().media_mut().add_photos(vec![photo("a.jpg")]);
        walk_to_last(&mut wizard).await;

        let interrupted = tokio::time::timeout(Duration::from_millis(10), wizard.go_next()).await;

        assert!(interrupted.is_err());
        assert_eq!(
            wizard.state(),
            &WizardState::Failed {
                reason: SUBMISSION_FALLBACK.into()
            }
        );
        assert_eq!(wizard.notice(), Some(SUBMISSION_FALLBACK));
        assert!(gateway.created().is_empty());
        assert_eq!(wizard.form().unwrap().media().photos().len(), 1);
        assert!(wizard.form_mut().is_ok());
        assert_eq!(previews.stats().live, 1);

        let retry = wizard.go_next().await.unwrap();
        assert!(matches!(retry, Progress::Submitted(SubmissionResult::Success { .. })));
        assert_eq!(gateway.created().len(), 1);

        wizard.close().unwrap();
        assert_eq!(previews.stats().live, 0);
    }

    #[tokio::test]
    async fn dropped_submission_can_be_closed() {
        let (mut wizard, _, previews) = new_wizard(InMemoryGateway::new().with_delay("a.jpg", 200));
        wizard.select_category(ListingCategory::Rent).unwrap();
        fill_required(&mut wizard);
        wizard.form_mut().unwrap().media_mut().add_photos(vec![photo("a.jpg")]);
        walk_to_last(&mut wizard).await;
        let _ = tokio::time::timeout(Duration::from_millis(10), wizard.go_next()).await;

        wizard.close().unwrap();

        assert_eq!(wizard.state(), &WizardState::SelectingCategory);
        assert_eq!(previews.stats().live, 0);
        wizard.select_category(ListingCategory::Sell).unwrap();
    }

    #[tokio::test]
    async fn lease_requires_duration_before_uploading() {
        let (mut wizard, gateway, _) = new_wizard(InMemoryGateway::new());
        wizard.select_category(ListingCategory::Lease).unwrap();
        fill_required(&mut wizard);
        wizard.form_mut().unwrap().media_mut().add_photos(vec![photo("a.jpg")]);
        wizard
            .form_mut()
            .unwrap()
            .update_field(FieldKey::LeaseDuration, "  ")
            .unwrap();
        walk_to_last(&mut wizard).await;

        let err = wizard.go_next().await.unwrap_err();

        assert!(matches!(err, WizardError::Validation(ValidationError::MissingLeaseDuration)));
        assert_eq!(wizard.notice(), Some("Please enter the lease duration"));
        assert_eq!(gateway.upload_count(), 0);
    }

    #[tokio::test]
    async fn failed_upload_creates_nothing_and_keeps_files_for_retry() {
        let (mut wizard, gateway, previews) = new_wizard(InMemoryGateway::new().failing_once("b.jpg"));
        wizard.select_category(ListingCategory::Rent).unwrap();
        fill_required(&mut wizard);
        wizard
            .form_mut()
            .unwrap()
            .media_mut()
            .add_photos(vec![photo("a.jpg"), photo("b.jpg"), photo("c.jpg")]);
        walk_to_last(&mut wizard).await;

        let progress = wizard.go_next().await.unwrap();

        assert_eq!(
            progress,
            Progress::Submitted(SubmissionResult::Failure {
                reason: SUBMISSION_FALLBACK.into()
            })
        );
        assert!(gateway.created().is_empty());
        assert_eq!(gateway.upload_count(), 3);
        assert_eq!(wizard.form().unwrap().media().photos().len(), 3);
        assert_eq!(wizard.form().unwrap().draft().title, "Sunset Flat");
        assert_eq!(wizard.notice(), Some(SUBMISSION_FALLBACK));
        assert_eq!(previews.stats().live, 3);

        let retry = wizard.go_next().await.unwrap();
        assert!(matches!(retry, Progress::Submitted(SubmissionResult::Success { .. })));
        assert_eq!(gateway.created()[0].media.len(), 3);
        assert_eq!(previews.stats().live, 0);
    }

    #[tokio::test]
    async fn gateway_rejection_surfaces_server_message() {
        let rejection = GatewayError::Rejected {
            status: 422,
            message: Some("Price must be greater than zero".into()),
        };
        let (mut wizard, _, _) = new_wizard(InMemoryGateway::new().rejecting(rejection));
        wizard.select_category(ListingCategory::ShortLet).unwrap();
        fill_required(&mut wizard);
        wizard.form_mut().unwrap().media_mut().add_photos(vec![photo("a.jpg")]);
        walk_to_last(&mut wizard).await;

        wizard.go_next().await.unwrap();

        assert_eq!(
            wizard.state(),
            &WizardState::Failed {
                reason: "Price must be greater than zero".into()
            }
        );
        assert_eq!(wizard.form().unwrap().media().photos().len(), 1);
        assert_eq!(wizard.current_step().map(|s| s.id), Some("media"));
    }

    #[tokio::test]
    async fn transport_failure_uses_fallback_reason() {
        let gateway = InMemoryGateway::new().rejecting(GatewayError::Transport("timeout".into()));
        let (mut wizard, _, _) = new_wizard(gateway);
        wizard.select_category(ListingCategory::Rent).unwrap();
        fill_required(&mut wizard);
        wizard.form_mut().unwrap().media_mut().add_photos(vec![photo("a.jpg")]);
        walk_to_last(&mut wizard).await;
        wizard.go_next().await.unwrap();
        assert_eq!(
            wizard.state(),
            &WizardState::Failed {
                reason: SUBMISSION_FALLBACK.into()
            }
        );
    }

    #[tokio::test]
    async fn navigation_edges() {
        let (mut wizard, _, _) = new_wizard(InMemoryGateway::new());
        assert!(matches!(wizard.go_next().await, Err(WizardError::NoCategory)));
        assert!(matches!(wizard.form_mut(), Err(WizardError::NoCategory)));

        wizard.select_category(ListingCategory::Sell).unwrap();
        assert_eq!(wizard.go_prev(), &WizardState::AtStep { index: 0 });
        wizard.go_next().await.unwrap();
        wizard.go_next().await.unwrap();
        assert_eq!(wizard.current_step().map(|s| s.id), Some("documents"));
        assert_eq!(wizard.go_prev(), &WizardState::AtStep { index: 1 });
    }

    #[tokio::test]
    async fn next_clears_previous_notice() {
        let (mut wizard, _, _) = new_wizard(InMemoryGateway::new());
        wizard.select_category(ListingCategory::Rent).unwrap();
        walk_to_last(&mut wizard).await;
        assert!(wizard.go_next().await.is_err());
        assert!(wizard.notice().is_some());
        wizard.go_prev();
        wizard.go_next().await.unwrap();
        assert_eq!(wizard.notice(), None);
    }

    #[tokio::test]
    async fn close_releases_staged_media() {
        let (mut wizard, _, previews) = new_wizard(InMemoryGateway::new());
        wizard.select_category(ListingCategory::Lease).unwrap();
        let media = wizard.form_mut().unwrap().media_mut();
        media.add_photos(vec![photo("a.jpg"), photo("b.jpg")]);
        media.set_video(Some(MediaFile::new("v.mp4", "video/mp4", vec![0u8])));
        assert_eq!(previews.stats().live, 3);

        wizard.close().unwrap();

        assert_eq!(wizard.state(), &WizardState::SelectingCategory);
        assert!(wizard.form().is_none());
        assert_eq!(previews.stats(), crate::wizard::media::PreviewStats { issued: 3, released: 3, live: 0 });
    }

    #[tokio::test]
    async fn completed_submission_is_read_only_until_closed() {
        let (mut wizard, _, _) = new_wizard(InMemoryGateway::new());
        wizard.select_category(ListingCategory::Rent).unwrap();
        fill_required(&mut wizard);
        wizard.form_mut().unwrap().media_mut().add_photos(vec![photo("a.jpg")]);
        walk_to_last(&mut wizard).await;
        wizard.go_next().await.unwrap();

        assert!(matches!(wizard.form_mut(), Err(WizardError::InvalidTransition { .. })));
        assert!(matches!(wizard.go_next().await, Err(WizardError::InvalidTransition { .. })));
        wizard.close().unwrap();
        wizard.select_category(ListingCategory::Sell).unwrap();
        assert!(wizard.form_mut().is_ok());
    }
}
