use crate::wizard::draft::{FacilitySelection, ListingDraft, ListingTerms};
use crate::wizard::media::MediaKind;
use crate::wizard::schema::ListingCategory;
use serde::Serialize;
use serde_with::skip_serializing_none;
use std::collections::BTreeMap;

/// Lenient number parsing for numeric-as-text fields. Blank, missing or
/// unparseable input yields `default`.
pub fn to_number(value: Option<&str>, default: f64) -> f64 {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|n| n.is_finite())
        .unwrap_or(default)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaPayload {
    pub url: String,
    pub alt_text: String,
    pub media_type: MediaKind,
    pub sort_order: u32,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListingPayload {
    pub title: String,
    pub description: String,
    pub location: String,
    pub property_type: ListingCategory,
    pub property_category: String,
    pub category_type: String,
    pub property_sub_type: String,
    pub furnishing_status: String,
    pub facilities: BTreeMap<String, u64>,
    pub price: f64,
    pub renewal_option: bool,
    pub negotiable: bool,
    pub amenities: Vec<String>,
    pub media: Vec<MediaPayload>,
    pub size: Option<String>,
    pub payment_term: Option<String>,
    pub maintenance_responsibility: Option<String>,
    pub property_condition: Option<String>,
    pub lease_duration: Option<f64>,
    pub service_charge: Option<f64>,
    pub security_deposit: Option<f64>,
    pub maintenance_charge: Option<f64>,
    pub other_charges: Option<f64>,
    pub weekly_rate: Option<f64>,
    pub monthly_rate: Option<f64>,
    pub minimum_nights: Option<f64>,
    pub available_documents: Option<Vec<String>>,
}

fn facility_field(tag: &str) -> &str {
    match tag {
        "living_room" => "livingRooms",
        "bedroom" => "bedrooms",
        "bathroom" => "bathrooms",
        "kitchen" => "kitchens",
        "store" => "stores",
        other => other,
    }
}

pub fn facilities_payload(facilities: &[FacilitySelection]) -> BTreeMap<String, u64> {
    let mut out = BTreeMap::new();
    for facility in facilities {
        let tag = facility.tag.trim();
        let count = to_number(Some(&facility.count), 0.0).floor();
        if tag.is_empty() || count < 1.0 {
            continue;
        }
        out.insert(facility_field(tag).to_string(), count as u64);
    }
    out
}

/// Photo URLs in draft order first, then the video.
pub fn media_payload(title: &str, photo_urls: &[String], video_url: Option<&str>) -> Vec<MediaPayload> {
    let title = title.trim();
    let mut media: Vec<MediaPayload> = photo_urls
        .iter()
        .enumerate()
        .map(|(index, url)| MediaPayload {
            url: url.clone(),
            alt_text: format!("{title} photo {}", index + 1),
            media_type: MediaKind::Image,
            sort_order: index as u32 + 1,
        })
        .collect();
    if let Some(url) = video_url {
        media.push(MediaPayload {
            url: url.to_string(),
            alt_text: format!("{title} video"),
            media_type: MediaKind::Video,
            sort_order: media.len() as u32 + 1,
        });
    }
    media
}

fn text(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn number(value: &str) -> Option<f64> {
    text(value).map(|v| to_number(Some(&v), 0.0))
}

pub fn build_payload(
    draft: &ListingDraft,
    photo_urls: &[String],
    video_url: Option<&str>,
) -> ListingPayload {
    let mut payload = ListingPayload {
        title: draft.title.trim().to_string(),
        description: draft.description.trim().to_string(),
        location: draft.location.trim().to_string(),
        property_type: draft.category,
        property_category: draft.category_type.trim().to_string(),
        category_type: draft.category_type.trim().to_string(),
        property_sub_type: draft.property_sub_type.trim().to_string(),
        furnishing_status: draft.furnishing_status.trim().to_string(),
        facilities: facilities_payload(&draft.facilities),
        price: to_number(Some(&draft.price), 0.0),
        renewal_option: draft.terms.renewal_option(),
        negotiable: draft.negotiable,
        amenities: draft.amenities.clone(),
        media: media_payload(&draft.title, photo_urls, video_url),
        size: text(&draft.size),
        payment_term: None,
        maintenance_responsibility: None,
        property_condition: None,
        lease_duration: None,
        service_charge: None,
        security_deposit: None,
        maintenance_charge: None,
        other_charges: None,
        weekly_rate: None,
        monthly_rate: None,
        minimum_nights: None,
        available_documents: (!draft.available_documents.is_empty())
            .then(|| draft.available_documents.clone()),
    };

    match &draft.terms {
        ListingTerms::Rent(t) => {
            payload.payment_term = text(&t.payment_term);
            payload.service_charge = number(&t.service_charge);
            payload.security_deposit = number(&t.security_deposit);
            payload.maintenance_responsibility = text(&t.maintenance_responsibility);
            payload.other_charges = number(&t.other_charges);
        }
        ListingTerms::Lease(t) => {
            payload.lease_duration = number(&t.lease_duration);
            payload.service_charge = number(&t.service_charge);
            payload.security_deposit = number(&t.security_deposit);
            payload.maintenance_responsibility = text(&t.maintenance_responsibility);
            payload.maintenance_charge = number(&t.maintenance_charge);
        }
        ListingTerms::ShortLet(t) => {
            payload.weekly_rate = number(&t.weekly_rate);
            payload.monthly_rate = number(&t.monthly_rate);
            payload.minimum_nights = number(&t.minimum_nights);
            payload.service_charge = number(&t.service_charge);
            payload.security_deposit = number(&t.security_deposit);
        }
        ListingTerms::Sell(t) => {
            payload.property_condition = text(&t.property_condition);
            payload.other_charges = number(&t.other_charges);
        }
    }
    payload
}
