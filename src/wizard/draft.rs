use crate::wizard::media::{MediaStagingStore, PreviewRegistry};
use crate::wizard::schema::ListingCategory;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    Title,
    Description,
    Location,
    Size,
    FurnishingStatus,
    CategoryType,
    PropertySubType,
    Price,
    Negotiable,
    PaymentTerm,
    ServiceCharge,
    SecurityDeposit,
    MaintenanceResponsibility,
    MaintenanceCharge,
    OtherCharges,
    LeaseDuration,
    RenewalOption,
    WeeklyRate,
    MonthlyRate,
    MinimumNights,
    PropertyCondition,
}

impl FieldKey {
    pub fn is_flag(&self) -> bool {
        matches!(self, FieldKey::Negotiable | FieldKey::RenewalOption)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Text(String),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Flag(value)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DraftError {
    #[error("field `{field:?}` does not apply to {category} listings")]
    NotApplicable {
        field: FieldKey,
        category: ListingCategory,
    },
    #[error("field `{0:?}` expects a yes/no value")]
    ExpectedFlag(FieldKey),
    #[error("field `{0:?}` expects a text value")]
    ExpectedText(FieldKey),
}

/// A facility tag (`bedroom`, `bathroom`, ...) with its unit count as typed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FacilitySelection {
    pub tag: String,
    pub count: String,
}

impl FacilitySelection {
    pub fn new(tag: impl Into<String>, count: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            count: count.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RentTerms {
    pub payment_term: String,
    pub service_charge: String,
    pub security_deposit: String,
    pub maintenance_responsibility: String,
    pub other_charges: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct LeaseTerms {
    pub lease_duration: String,
    pub renewal_option: bool,
    pub service_charge: String,
    pub security_deposit: String,
    pub maintenance_responsibility: String,
    pub maintenance_charge: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ShortLetTerms {
    pub weekly_rate: String,
    pub monthly_rate: String,
    pub minimum_nights: String,
    pub service_charge: String,
    pub security_deposit: String,
}

impl Default for ShortLetTerms {
    fn default() -> Self {
        Self {
            weekly_rate: String::new(),
            monthly_rate: String::new(),
            minimum_nights: "1".to_string(),
            service_charge: String::new(),
            security_deposit: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SellTerms {
    pub property_condition: String,
    pub other_charges: String,
}

/// Fields that only exist for one listing category.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ListingTerms {
    Rent(RentTerms),
    Lease(LeaseTerms),
    ShortLet(ShortLetTerms),
    Sell(SellTerms),
}

impl ListingTerms {
    pub fn for_category(category: ListingCategory) -> Self {
        match category {
            ListingCategory::Rent => ListingTerms::Rent(RentTerms::default()),
            ListingCategory::Lease => ListingTerms::Lease(LeaseTerms::default()),
            ListingCategory::ShortLet => ListingTerms::ShortLet(ShortLetTerms::default()),
            ListingCategory::Sell => ListingTerms::Sell(SellTerms::default()),
        }
    }

    fn text_mut(&mut self, key: FieldKey) -> Option<&mut String> {
        use FieldKey::*;
        match (self, key) {
            (ListingTerms::Rent(t), PaymentTerm) => Some(&mut t.payment_term),
            (ListingTerms::Rent(t), ServiceCharge) => Some(&mut t.service_charge),
            (ListingTerms::Rent(t), SecurityDeposit) => Some(&mut t.security_deposit),
            (ListingTerms::Rent(t), MaintenanceResponsibility) => {
                Some(&mut t.maintenance_responsibility)
            }
            (ListingTerms::Rent(t), OtherCharges) => Some(&mut t.other_charges),
            (ListingTerms::Lease(t), LeaseDuration) => Some(&mut t.lease_duration),
            (ListingTerms::Lease(t), ServiceCharge) => Some(&mut t.service_charge),
            (ListingTerms::Lease(t), SecurityDeposit) => Some(&mut t.security_deposit),
            (ListingTerms::Lease(t), MaintenanceResponsibility) => {
                Some(&mut t.maintenance_responsibility)
            }
            (ListingTerms::Lease(t), MaintenanceCharge) => Some(&mut t.maintenance_charge),
            (ListingTerms::ShortLet(t), WeeklyRate) => Some(&mut t.weekly_rate),
            (ListingTerms::ShortLet(t), MonthlyRate) => Some(&mut t.monthly_rate),
            (ListingTerms::ShortLet(t), MinimumNights) => Some(&mut t.minimum_nights),
            (ListingTerms::ShortLet(t), ServiceCharge) => Some(&mut t.service_charge),
            (ListingTerms::ShortLet(t), SecurityDeposit) => Some(&mut t.security_deposit),
            (ListingTerms::Sell(t), PropertyCondition) => Some(&mut t.property_condition),
            (ListingTerms::Sell(t), OtherCharges) => Some(&mut t.other_charges),
            _ => None,
        }
    }

    fn flag_mut(&mut self, key: FieldKey) -> Option<&mut bool> {
        match (self, key) {
            (ListingTerms::Lease(t), FieldKey::RenewalOption) => Some(&mut t.renewal_option),
            _ => None,
        }
    }

    pub fn lease_duration(&self) -> Option<&str> {
        match self {
            ListingTerms::Lease(t) => Some(&t.lease_duration),
            _ => None,
        }
    }

    pub fn renewal_option(&self) -> bool {
        matches!(self, ListingTerms::Lease(t) if t.renewal_option)
    }
}

/// Values typed into the wizard for one listing, before media.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ListingDraft {
    pub category: ListingCategory,
    pub title: String,
    pub description: String,
    pub location: String,
    pub size: String,
    pub furnishing_status: String,
    pub category_type: String,
    pub property_sub_type: String,
    pub price: String,
    pub negotiable: bool,
    pub amenities: Vec<String>,
    pub facilities: Vec<FacilitySelection>,
    pub available_documents: Vec<String>,
    pub terms: ListingTerms,
}

impl ListingDraft {
    pub fn new(category: ListingCategory) -> Self {
        Self {
            category,
            title: String::new(),
            description: String::new(),
            location: String::new(),
            size: String::new(),
            furnishing_status: String::new(),
            category_type: String::new(),
            property_sub_type: String::new(),
            price: String::new(),
            negotiable: false,
            amenities: Vec::new(),
            facilities: Vec::new(),
            available_documents: Vec::new(),
            terms: ListingTerms::for_category(category),
        }
    }

    fn not_applicable(&self, field: FieldKey) -> DraftError {
        DraftError::NotApplicable {
            field,
            category: self.category,
        }
    }

    fn text_mut(&mut self, key: FieldKey) -> Result<&mut String, DraftError> {
        let missing = self.not_applicable(key);
        Ok(match key {
            FieldKey::Title => &mut self.title,
            FieldKey::Description => &mut self.description,
            FieldKey::Location => &mut self.location,
            FieldKey::Size => &mut self.size,
            FieldKey::FurnishingStatus => &mut self.furnishing_status,
            FieldKey::CategoryType => &mut self.category_type,
            FieldKey::PropertySubType => &mut self.property_sub_type,
            FieldKey::Price => &mut self.price,
            _ => return self.terms.text_mut(key).ok_or(missing),
        })
    }

    fn flag_mut(&mut self, key: FieldKey) -> Result<&mut bool, DraftError> {
        let missing = self.not_applicable(key);
        match key {
            FieldKey::Negotiable => Ok(&mut self.negotiable),
            _ => self.terms.flag_mut(key).ok_or(missing),
        }
    }

    pub fn set(&mut self, key: FieldKey, value: FieldValue) -> Result<(), DraftError> {
        match (key.is_flag(), value) {
            (true, FieldValue::Flag(flag)) => *self.flag_mut(key)? = flag,
            (false, FieldValue::Text(text)) => *self.text_mut(key)? = text,
            (true, FieldValue::Text(_)) => return Err(DraftError::ExpectedFlag(key)),
            (false, FieldValue::Flag(_)) => return Err(DraftError::ExpectedText(key)),
        }
        Ok(())
    }
}

/// The draft for one wizard session together with its staged media.
#[derive(Debug)]
pub struct ListingFormState {
    draft: ListingDraft,
    media: MediaStagingStore,
}

impl ListingFormState {
    pub fn new(category: ListingCategory, previews: PreviewRegistry) -> Self {
        Self {
            draft: ListingDraft::new(category),
            media: MediaStagingStore::new(previews),
        }
    }

    pub fn category(&self) -> ListingCategory {
        self.draft.category
    }

    pub fn draft(&self) -> &ListingDraft {
        &self.draft
    }

    pub fn media(&self) -> &MediaStagingStore {
        &self.media
    }

    pub fn media_mut(&mut self) -> &mut MediaStagingStore {
        &mut self.media
    }

    pub fn update_field(
        &mut self,
        key: FieldKey,
        value: impl Into<FieldValue>,
    ) -> Result<(), DraftError> {
        self.draft.set(key, value.into())
    }

    pub fn set_facilities(&mut self, facilities: Vec<FacilitySelection>) {
        self.draft.facilities = facilities;
    }

    /// Replaces the amenity list. Tags are trimmed; blanks and repeats are dropped.
    pub fn set_amenities(&mut self, amenities: Vec<String>) {
        self.draft.amenities = dedup_tags(amenities);
    }

    pub fn set_available_documents(&mut self, documents: Vec<String>) {
        self.draft.available_documents = dedup_tags(documents);
    }

    pub fn reset_form(&mut self) {
        self.draft = ListingDraft::new(self.draft.category);
        self.media.clear();
    }
}

fn dedup_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::media::MediaFile;

    fn form(category: ListingCategory) -> (ListingFormState, PreviewRegistry) {
        let registry = PreviewRegistry::new();
        (ListingFormState::new(category, registry.clone()), registry)
    }

    #[test]
    fn update_field_writes_common_and_category_fields() {
        let (mut state, _) = form(ListingCategory::Lease);
        state.update_field(FieldKey::Title, "Harbour Office").unwrap();
        state.update_field(FieldKey::LeaseDuration, "24").unwrap();
        state.update_field(FieldKey::RenewalOption, true).unwrap();
        assert_eq!(state.draft().title, "Harbour Office");
        assert_eq!(state.draft().terms.lease_duration(), Some("24"));
        assert!(state.draft().terms.renewal_option());
    }

    #[test]
    fn update_field_rejects_fields_of_other_categories() {
        let (mut state, _) = form(ListingCategory::Rent);
        let err = state.update_field(FieldKey::LeaseDuration, "12").unwrap_err();
        assert_eq!(
            err,
            DraftError::NotApplicable {
                field: FieldKey::LeaseDuration,
                category: ListingCategory::Rent,
            }
        );
        assert_eq!(state.draft().terms, ListingTerms::Rent(RentTerms::default()));
    }

    #[test]
    fn update_field_checks_value_kind() {
        let (mut state, _) = form(ListingCategory::Sell);
        assert_eq!(
            state.update_field(FieldKey::Negotiable, "yes"),
            Err(DraftError::ExpectedFlag(FieldKey::Negotiable))
        );
        assert_eq!(
            state.update_field(FieldKey::Price, true),
            Err(DraftError::ExpectedText(FieldKey::Price))
        );
        state.update_field(FieldKey::Negotiable, true).unwrap();
        assert!(state.draft().negotiable);
    }

    #[test]
    fn update_field_stores_text_without_validation() {
        let (mut state, _) = form(ListingCategory::ShortLet);
        state.update_field(FieldKey::WeeklyRate, "abc").unwrap();
        state.update_field(FieldKey::Title, "   ").unwrap();
        match &state.draft().terms {
            ListingTerms::ShortLet(t) => assert_eq!(t.weekly_rate, "abc"),
            other => panic!("unexpected terms {other:?}"),
        }
        assert_eq!(state.draft().title, "   ");
    }

    #[test]
    fn bulk_setters_replace_and_dedup() {
        let (mut state, _) = form(ListingCategory::Rent);
        state.set_amenities(vec!["wifi".into(), "pool".into(), "wifi".into(), " ".into()]);
        state.set_amenities(vec!["gym".into(), "wifi".into()]);
        assert_eq!(state.draft().amenities, vec!["gym", "wifi"]);
        state.set_facilities(vec![FacilitySelection::new("bedroom", "3")]);
        assert_eq!(state.draft().facilities.len(), 1);
        state.set_available_documents(vec!["c_of_o".into(), "survey_plan".into()]);
        assert_eq!(state.draft().available_documents, vec!["c_of_o", "survey_plan"]);
    }

    #[test]
    fn tag_lists_are_trimmed_and_deduplicated() {
        let (mut state, _) = form(ListingCategory::Sell);
        state.set_available_documents(vec![
            " c_of_o ".into(),
            "".into(),
            "c_of_o".into(),
            "deed_of_assignment".into(),
        ]);
        assert_eq!(
            state.draft().available_documents,
            vec!["c_of_o", "deed_of_assignment"]
        );
        state.set_amenities(vec!["  pool".into(), "pool  ".into()]);
        assert_eq!(state.draft().amenities, vec!["pool"]);
    }

    #[test]
    fn reset_form_restores_defaults_and_releases_media() {
        let (mut state, registry) = form(ListingCategory::ShortLet);
        state.update_field(FieldKey::Title, "Beach House").unwrap();
        state.update_field(FieldKey::MinimumNights, "3").unwrap();
        state.set_amenities(vec!["wifi".into()]);
        state
            .media_mut()
            .add_photos(vec![MediaFile::new("a.jpg", "image/jpeg", vec![1u8])]);
        state
            .media_mut()
            .set_video(Some(MediaFile::new("v.mp4", "video/mp4", vec![2u8])));

        state.reset_form();

        assert_eq!(state.draft(), &ListingDraft::new(ListingCategory::ShortLet));
        assert!(state.media().photos().is_empty());
        assert!(state.media().video().is_none());
        assert_eq!(registry.stats().live, 0);
        assert_eq!(registry.stats().released, 2);
    }
}
