use crate::wizard::media::StagedMedia;
use crate::wizard::{
    FacilitySelection, FieldKey, FieldValue, ListingCategory, ListingDraft, ListingWizard,
    MediaFile, MediaKind, Progress, WizardState, WizardStep,
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OpenWizardRequest {
    #[serde(default)]
    pub category: Option<ListingCategory>,
}

#[derive(Debug, Deserialize)]
pub struct SelectCategoryRequest {
    pub category: ListingCategory,
}

#[derive(Debug, Deserialize)]
pub struct UpdateFieldRequest {
    pub field: FieldKey,
    pub value: FieldValue,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CountInput {
    Number(f64),
    Text(String),
}

#[derive(Debug, Deserialize)]
pub struct FacilityInput {
    pub tag: String,
    pub count: CountInput,
}

impl From<FacilityInput> for FacilitySelection {
    fn from(input: FacilityInput) -> Self {
        let count = match input.count {
            CountInput::Number(n) => n.to_string(),
            CountInput::Text(text) => text,
        };
        FacilitySelection::new(input.tag, count)
    }
}

/// A file sent inline as base64.
#[derive(Debug, Deserialize)]
pub struct MediaUpload {
    pub file_name: String,
    #[serde(default)]
    pub content_type: Option<String>,
    pub data_base64: String,
}

impl MediaUpload {
    pub fn decode(self, fallback_type: &str) -> Result<MediaFile, String> {
        let data = BASE64
            .decode(self.data_base64.trim())
            .map_err(|err| format!("{}: {err}", self.file_name))?;
        let content_type = self
            .content_type
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or_else(|| fallback_type.to_string());
        Ok(MediaFile::new(self.file_name, content_type, data))
    }
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub from: Uuid,
    pub to: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct VideoRequest {
    pub video: Option<MediaUpload>,
}

#[derive(Debug, Serialize)]
pub struct MediaView {
    pub id: Uuid,
    pub kind: MediaKind,
    pub file_name: String,
    pub content_type: String,
    pub size: usize,
    pub preview_url: String,
}

impl From<&StagedMedia> for MediaView {
    fn from(media: &StagedMedia) -> Self {
        Self {
            id: media.id(),
            kind: media.kind(),
            file_name: media.file().file_name.clone(),
            content_type: media.file().content_type.clone(),
            size: media.file().data.len(),
            preview_url: media.preview().url(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    #[serde(flatten)]
    pub state: WizardState,
    pub category: Option<ListingCategory>,
    pub steps: &'static [WizardStep],
    pub current_step: Option<&'static str>,
    pub notice: Option<String>,
    pub draft: Option<ListingDraft>,
    pub photos: Vec<MediaView>,
    pub video: Option<MediaView>,
}

impl SessionView {
    pub fn new(id: Uuid, wizard: &ListingWizard) -> Self {
        let form = wizard.form();
        Self {
            id,
            state: wizard.state().clone(),
            category: wizard.category(),
            steps: wizard.steps(),
            current_step: wizard.current_step().map(|step| step.id),
            notice: wizard.notice().map(str::to_string),
            draft: form.map(|f| f.draft().clone()),
            photos: form
                .map(|f| f.media().photos().iter().map(MediaView::from).collect())
                .unwrap_or_default(),
            video: form.and_then(|f| f.media().video()).map(MediaView::from),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NextResponse {
    pub progress: Progress,
    pub session: SessionView,
}
