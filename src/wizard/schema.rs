use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ListingCategory {
    Rent,
    Lease,
    ShortLet,
    Sell,
}

impl ListingCategory {
    pub const ALL: [ListingCategory; 4] = [
        ListingCategory::Rent,
        ListingCategory::Lease,
        ListingCategory::ShortLet,
        ListingCategory::Sell,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ListingCategory::Rent => "rent",
            ListingCategory::Lease => "lease",
            ListingCategory::ShortLet => "short_let",
            ListingCategory::Sell => "sell",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown listing category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for ListingCategory {
    type Err = UnknownCategory;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().replace('-', "_").as_str() {
            "rent" => Ok(ListingCategory::Rent),
            "lease" => Ok(ListingCategory::Lease),
            "short_let" | "shortlet" => Ok(ListingCategory::ShortLet),
            "sell" | "sale" => Ok(ListingCategory::Sell),
            _ => Err(UnknownCategory(input.to_string())),
        }
    }
}

impl std::fmt::Display for ListingCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct WizardStep {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
}

const DETAILS: WizardStep = WizardStep {
    id: "details",
    title: "Property details",
    description: "Title, location, property type, facilities and amenities",
};

const MEDIA: WizardStep = WizardStep {
    id: "media",
    title: "Photos & video",
    description: "Add photos (the first one is the thumbnail) and an optional video tour",
};

const DOCUMENTS: WizardStep = WizardStep {
    id: "documents",
    title: "Legal documents",
    description: "Select the title documents available for this property",
};

const RENT_STEPS: [WizardStep; 3] = [
    DETAILS,
    WizardStep {
        id: "rent_terms",
        title: "Rent & charges",
        description: "Annual rent, payment term, deposit and service charges",
    },
    MEDIA,
];

const LEASE_STEPS: [WizardStep; 4] = [
    DETAILS,
    WizardStep {
        id: "lease_terms",
        title: "Lease terms",
        description: "Lease price, duration, renewal option and maintenance",
    },
    DOCUMENTS,
    MEDIA,
];

const SHORT_LET_STEPS: [WizardStep; 3] = [
    DETAILS,
    WizardStep {
        id: "stay_rates",
        title: "Stay rates",
        description: "Nightly price, weekly and monthly rates, minimum nights",
    },
    MEDIA,
];

const SELL_STEPS: [WizardStep; 4] = [
    DETAILS,
    WizardStep {
        id: "sale_terms",
        title: "Sale terms",
        description: "Asking price, negotiability and property condition",
    },
    DOCUMENTS,
    MEDIA,
];

/// Ordered wizard steps for a category. Every list ends with the media step.
pub fn resolve_steps(category: ListingCategory) -> &'static [WizardStep] {
    match category {
        ListingCategory::Rent => &RENT_STEPS,
        ListingCategory::Lease => &LEASE_STEPS,
        ListingCategory::ShortLet => &SHORT_LET_STEPS,
        ListingCategory::Sell => &SELL_STEPS,
    }
}
