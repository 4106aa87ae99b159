// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::Date;

use crate::ids::LookupTicket;

/// Number of base units in the service's bulk pricing unit.
pub const UNITS_PER_BULK: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CascadeField {
    Region,
    Subregion,
    Locality,
    Product,
    Subtype,
    Grade,
}

static CASCADE_ORDER: [CascadeField; 6] = [
    CascadeField::Region,
    CascadeField::Subregion,
    CascadeField::Locality,
    CascadeField::Product,
    CascadeField::Subtype,
    CascadeField::Grade,
];

impl CascadeField {
    pub const ALL: [Self; 6] = [
        Self::Region,
        Self::Subregion,
        Self::Locality,
        Self::Product,
        Self::Subtype,
        Self::Grade,
    ];

    pub const FIRST: Self = Self::Region;

    pub const fn position(self) -> usize {
        match self {
            Self::Region => 0,
            Self::Subregion => 1,
            Self::Locality => 2,
            Self::Product => 3,
            Self::Subtype => 4,
            Self::Grade => 5,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Region => "State",
            Self::Subregion => "District",
            Self::Locality => "Market",
            Self::Product => "Commodity",
            Self::Subtype => "Variety",
            Self::Grade => "Grade",
        }
    }

    /// Query-string and JSON key used by the estimation service.
    pub const fn param(self) -> &'static str {
        match self {
            Self::Region => "state",
            Self::Subregion => "district",
            Self::Locality => "market",
            Self::Product => "commodity",
            Self::Subtype => "variety",
            Self::Grade => "grade",
        }
    }

    /// Path segment of the list endpoint that offers this field's options.
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::Region => "states",
            Self::Subregion => "districts",
            Self::Locality => "markets",
            Self::Product => "commodities",
            Self::Subtype => "varieties",
            Self::Grade => "grades",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.param() == value)
    }

    pub fn next(self) -> Option<Self> {
        CASCADE_ORDER.get(self.position() + 1).copied()
    }

    pub fn ancestors(self) -> &'static [Self] {
        &CASCADE_ORDER[..self.position()]
    }

    pub fn descendants(self) -> &'static [Self] {
        &CASCADE_ORDER[self.position() + 1..]
    }
}

/// A row of the prediction form: the six cascade selects plus the date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormField {
    Cascade(CascadeField),
    Date,
}

impl FormField {
    pub const ALL: [Self; 7] = [
        Self::Cascade(CascadeField::Region),
        Self::Cascade(CascadeField::Subregion),
        Self::Cascade(CascadeField::Locality),
        Self::Cascade(CascadeField::Product),
        Self::Cascade(CascadeField::Subtype),
        Self::Cascade(CascadeField::Grade),
        Self::Date,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Cascade(field) => field.label(),
            Self::Date => "Date",
        }
    }

    pub const fn param(self) -> &'static str {
        match self {
            Self::Cascade(field) => field.param(),
            Self::Date => "date",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupScope {
    pairs: Vec<(CascadeField, String)>,
}

impl LookupScope {
    pub fn pairs(&self) -> &[(CascadeField, String)] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn value(&self, field: CascadeField) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(candidate, _)| *candidate == field)
            .map(|(_, value)| value.as_str())
    }

    pub fn query_pairs(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.pairs
            .iter()
            .map(|(field, value)| (field.param(), value.as_str()))
    }
}

impl FromIterator<(CascadeField, String)> for LookupScope {
    fn from_iter<T: IntoIterator<Item = (CascadeField, String)>>(iter: T) -> Self {
        let mut pairs: Vec<(CascadeField, String)> = iter.into_iter().collect();
        pairs.sort_by_key(|(field, _)| field.position());
        Self { pairs }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    values: [Option<String>; 6],
    date: Option<Date>,
}

impl Selection {
    pub fn get(&self, field: CascadeField) -> Option<&str> {
        self.values[field.position()].as_deref()
    }

    pub fn date(&self) -> Option<Date> {
        self.date
    }

    pub fn is_set(&self, field: FormField) -> bool {
        match field {
            FormField::Cascade(field) => self.get(field).is_some(),
            FormField::Date => self.date.is_some(),
        }
    }

    pub(crate) fn set(&mut self, field: CascadeField, value: Option<String>) {
        self.values[field.position()] = value.filter(|value| !value.is_empty());
    }

    pub(crate) fn set_date(&mut self, date: Option<Date>) {
        self.date = date;
    }

    /// Scope for a lookup of `field`'s options; `None` while any ancestor is unset.
    pub fn scope_for(&self, field: CascadeField) -> Option<LookupScope> {
        field
            .ancestors()
            .iter()
            .map(|ancestor| {
                self.get(*ancestor)
                    .map(|value| (*ancestor, value.to_owned()))
            })
            .collect::<Option<LookupScope>>()
    }

    pub fn missing_fields(&self) -> Vec<FormField> {
        FormField::ALL
            .into_iter()
            .filter(|field| !self.is_set(*field))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionCatalog {
    lists: [Vec<String>; 6],
    outstanding: [Option<LookupTicket>; 6],
}

impl OptionCatalog {
    pub fn options(&self, field: CascadeField) -> &[String] {
        &self.lists[field.position()]
    }

    pub fn contains(&self, field: CascadeField, value: &str) -> bool {
        self.options(field).iter().any(|option| option == value)
    }

    pub fn is_loading(&self, field: CascadeField) -> bool {
        self.outstanding[field.position()].is_some()
    }

    pub fn outstanding(&self, field: CascadeField) -> Option<LookupTicket> {
        self.outstanding[field.position()]
    }

    pub(crate) fn replace(&mut self, field: CascadeField, options: Vec<String>) {
        self.lists[field.position()] = options;
    }

    /// Empties the slot and forgets any lookup still outstanding for it.
    pub(crate) fn clear(&mut self, field: CascadeField) {
        self.lists[field.position()].clear();
        self.outstanding[field.position()] = None;
    }

    pub(crate) fn mark_outstanding(&mut self, field: CascadeField, ticket: LookupTicket) {
        self.outstanding[field.position()] = Some(ticket);
    }

    /// Consumes the outstanding ticket when `ticket` is the newest one for the slot.
    pub(crate) fn accept(&mut self, field: CascadeField, ticket: LookupTicket) -> bool {
        let slot = &mut self.outstanding[field.position()];
        if *slot == Some(ticket) {
            *slot = None;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchProvenance {
    Exact,
    Approximate(String),
}

impl MatchProvenance {
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag.map(str::trim) {
            None | Some("") | Some("exact") => Self::Exact,
            Some(other) => Self::Approximate(other.to_owned()),
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::Exact => "Exact Match",
            Self::Approximate(_) => "Approximate Match",
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            Self::Exact => "exact",
            Self::Approximate(tag) => tag,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub per_bulk_unit: f64,
    pub provenance: MatchProvenance,
    pub date: Date,
}

impl PredictionResult {
    pub fn new(per_bulk_unit: f64, fallback_used: Option<&str>, date: Date) -> Self {
        Self {
            per_bulk_unit,
            provenance: MatchProvenance::from_tag(fallback_used),
            date,
        }
    }

    pub fn per_unit(&self) -> f64 {
        round_to_cents(self.per_bulk_unit / UNITS_PER_BULK)
    }

    pub fn per_unit_display(&self) -> String {
        format!("{:.2}", self.per_unit())
    }

    pub fn per_bulk_unit_display(&self) -> String {
        format_amount(self.per_bulk_unit)
    }
}

fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Formats a service amount without padding zeros: `4250`, `4250.5`, `4250.25`.
pub fn format_amount(value: f64) -> String {
    let fixed = format!("{:.2}", round_to_cents(value));
    fixed
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_owned()
}

pub fn format_iso_date(date: Date) -> String {
    date.format(&time::macros::format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}

#[cfg(test)]
mod tests {
    use super::{
        CascadeField, FormField, LookupScope, MatchProvenance, OptionCatalog, PredictionResult,
        Selection, format_amount, format_iso_date,
    };
    use crate::LookupTicket;
    use time::{Date, Month};

    fn date() -> Date {
        Date::from_calendar_date(2026, Month::March, 14).expect("valid date")
    }

    #[test]
    fn cascade_order_table_is_consistent() {
        for (index, field) in CascadeField::ALL.into_iter().enumerate() {
            assert_eq!(field.position(), index);
            assert_eq!(field.ancestors().len(), index);
            assert_eq!(field.descendants().len(), 5 - index);
            assert_eq!(CascadeField::parse(field.param()), Some(field));
        }
        assert_eq!(CascadeField::Region.next(), Some(CascadeField::Subregion));
        assert_eq!(CascadeField::Grade.next(), None);
        assert_eq!(CascadeField::parse("county"), None);
    }

    #[test]
    fn endpoints_match_service_paths() {
        let endpoints: Vec<&str> = CascadeField::ALL
            .into_iter()
            .map(CascadeField::endpoint)
            .collect();
        assert_eq!(
            endpoints,
            vec![
                "states",
                "districts",
                "markets",
                "commodities",
                "varieties",
                "grades"
            ]
        );
    }

    #[test]
    fn scope_requires_every_ancestor() {
        let mut selection = Selection::default();
        assert_eq!(
            selection.scope_for(CascadeField::Region),
            Some(LookupScope::default())
        );
        assert_eq!(selection.scope_for(CascadeField::Subregion), None);

        selection.set(CascadeField::Region, Some("Kerala".to_owned()));
        selection.set(CascadeField::Subregion, Some("Idukki".to_owned()));
        let scope = selection
            .scope_for(CascadeField::Locality)
            .expect("ancestors are set");
        assert_eq!(
            scope.query_pairs().collect::<Vec<_>>(),
            vec![("state", "Kerala"), ("district", "Idukki")]
        );
        assert_eq!(selection.scope_for(CascadeField::Product), None);
    }

    #[test]
    fn empty_values_are_stored_as_unset() {
        let mut selection = Selection::default();
        selection.set(CascadeField::Region, Some(String::new()));
        assert_eq!(selection.get(CascadeField::Region), None);
    }

    #[test]
    fn missing_fields_lists_unset_rows_in_form_order() {
        let mut selection = Selection::default();
        selection.set(CascadeField::Region, Some("Kerala".to_owned()));
        selection.set_date(Some(date()));
        let missing = selection.missing_fields();
        assert_eq!(missing.first(), Some(&FormField::Cascade(CascadeField::Subregion)));
        assert!(!missing.contains(&FormField::Date));
        assert!(!selection.is_complete());
    }

    #[test]
    fn catalog_accepts_only_the_outstanding_ticket() {
        let mut catalog = OptionCatalog::default();
        catalog.mark_outstanding(CascadeField::Product, LookupTicket::new(3));
        catalog.mark_outstanding(CascadeField::Product, LookupTicket::new(4));
        assert!(!catalog.accept(CascadeField::Product, LookupTicket::new(3)));
        assert!(catalog.is_loading(CascadeField::Product));
        assert!(catalog.accept(CascadeField::Product, LookupTicket::new(4)));
        assert!(!catalog.is_loading(CascadeField::Product));
        assert!(!catalog.accept(CascadeField::Product, LookupTicket::new(4)));
    }

    #[test]
    fn provenance_defaults_to_exact() {
        assert_eq!(MatchProvenance::from_tag(None), MatchProvenance::Exact);
        assert_eq!(MatchProvenance::from_tag(Some("")), MatchProvenance::Exact);
        assert_eq!(MatchProvenance::from_tag(Some("exact")).label(), "Exact Match");
        let approximate = MatchProvenance::from_tag(Some("state+district"));
        assert_eq!(approximate.label(), "Approximate Match");
        assert_eq!(approximate.tag(), "state+district");
    }

    #[test]
    fn per_unit_price_divides_by_hundred_with_two_decimals() {
        let result = PredictionResult::new(4250.0, None, date());
        assert_eq!(result.per_unit_display(), "42.50");
        assert_eq!(result.per_bulk_unit_display(), "4250");

        let odd = PredictionResult::new(1234.56, Some("approximate"), date());
        assert_eq!(odd.per_unit_display(), "12.35");
        assert_eq!(odd.per_bulk_unit_display(), "1234.56");
    }

    #[test]
    fn amount_formatting_drops_trailing_zeros() {
        assert_eq!(format_amount(4250.5), "4250.5");
        assert_eq!(format_amount(0.0), "0");
    }

    #[test]
    fn iso_date_is_zero_padded() {
        let date = Date::from_calendar_date(2026, Month::January, 5).expect("valid date");
        assert_eq!(format_iso_date(date), "2026-01-05");
    }
}
