// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use time::Date;

use crate::{CascadeField, FormField, Selection};

/// A fully populated selection, ready to send to the estimation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionFormInput {
    pub region: String,
    pub subregion: String,
    pub locality: String,
    pub product: String,
    pub subtype: String,
    pub grade: String,
    pub date: Date,
}

impl PredictionFormInput {
    pub fn from_selection(selection: &Selection) -> Result<Self> {
        if let Some(field) = selection.missing_fields().first() {
            bail!(missing_field_message(*field));
        }

        let value = |field: CascadeField| selection.get(field).unwrap_or_default().to_owned();
        let Some(date) = selection.date() else {
            bail!(missing_field_message(FormField::Date));
        };

        Ok(Self {
            region: value(CascadeField::Region),
            subregion: value(CascadeField::Subregion),
            locality: value(CascadeField::Locality),
            product: value(CascadeField::Product),
            subtype: value(CascadeField::Subtype),
            grade: value(CascadeField::Grade),
            date,
        })
    }

    pub fn value(&self, field: CascadeField) -> &str {
        match field {
            CascadeField::Region => &self.region,
            CascadeField::Subregion => &self.subregion,
            CascadeField::Locality => &self.locality,
            CascadeField::Product => &self.product,
            CascadeField::Subtype => &self.subtype,
            CascadeField::Grade => &self.grade,
        }
    }
}

fn missing_field_message(field: FormField) -> String {
    let name = field.label().to_ascii_lowercase();
    match field {
        FormField::Date => "date is required -- pick a date and retry".to_owned(),
        FormField::Cascade(_) => format!("{name} is required -- choose a {name} and retry"),
    }
}
