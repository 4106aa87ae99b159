// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use time::Date;
use tracing::{debug, warn};

use crate::{
    CascadeField, LookupScope, LookupTicket, OptionCatalog, PredictionFormInput, PredictionResult,
    PredictionTicket, Selection,
};

#[derive(Debug, Clone, PartialEq)]
pub enum PredictionPhase {
    Idle,
    Pending { ticket: PredictionTicket, date: Date },
    Succeeded(PredictionResult),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    pub ticket: LookupTicket,
    pub field: CascadeField,
    pub scope: LookupScope,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Options(Vec<String>),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PredictionOutcome {
    Estimate {
        prediction: f64,
        fallback_used: Option<String>,
    },
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Start,
    Select {
        field: CascadeField,
        value: Option<String>,
    },
    SetDate(Option<Date>),
    Submit,
    LookupFinished {
        ticket: LookupTicket,
        field: CascadeField,
        outcome: LookupOutcome,
    },
    PredictionFinished {
        ticket: PredictionTicket,
        outcome: PredictionOutcome,
    },
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    LookupRequested(LookupRequest),
    OptionsReplaced {
        field: CascadeField,
        count: usize,
    },
    LookupDiscarded {
        field: CascadeField,
        ticket: LookupTicket,
    },
    LoadFailed(String),
    FieldChanged(CascadeField),
    FieldsCleared(Vec<CascadeField>),
    SelectionRejected(String),
    DateChanged(Option<Date>),
    PredictionRequested {
        ticket: PredictionTicket,
        input: PredictionFormInput,
    },
    PredictionSucceeded(PredictionResult),
    PredictionFailed(String),
    SubmissionRejected(String),
    StatusUpdated(String),
    StatusCleared,
}

/// One form instance: the selection, its option lists and the prediction cycle.
///
/// The session never performs I/O. Commands that need the service return
/// `LookupRequested` / `PredictionRequested` events; the caller executes them
/// and feeds the outcome back as `LookupFinished` / `PredictionFinished`.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    selection: Selection,
    catalog: OptionCatalog,
    prediction: PredictionPhase,
    load_error: Option<String>,
    status_line: Option<String>,
    last_lookup: LookupTicket,
    last_prediction: PredictionTicket,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            selection: Selection::default(),
            catalog: OptionCatalog::default(),
            prediction: PredictionPhase::Idle,
            load_error: None,
            status_line: None,
            last_lookup: LookupTicket::new(0),
            last_prediction: PredictionTicket::new(0),
        }
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn catalog(&self) -> &OptionCatalog {
        &self.catalog
    }

    pub fn prediction(&self) -> &PredictionPhase {
        &self.prediction
    }

    pub fn result(&self) -> Option<&PredictionResult> {
        match &self.prediction {
            PredictionPhase::Succeeded(result) => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.prediction {
            PredictionPhase::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.prediction, PredictionPhase::Pending { .. })
    }

    pub fn can_submit(&self) -> bool {
        !self.is_pending() && self.selection.is_complete()
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn status_line(&self) -> Option<&str> {
        self.status_line.as_deref()
    }

    pub fn dispatch(&mut self, command: SessionCommand) -> Vec<SessionEvent> {
        match command {
            SessionCommand::Start => {
                self.load_error = None;
                let request = self.issue_lookup(CascadeField::FIRST, LookupScope::default());
                vec![SessionEvent::LookupRequested(request)]
            }
            SessionCommand::Select { field, value } => self.select(field, value),
            SessionCommand::SetDate(date) => {
                self.selection.set_date(date);
                vec![SessionEvent::DateChanged(date)]
            }
            SessionCommand::Submit => self.submit(),
            SessionCommand::LookupFinished {
                ticket,
                field,
                outcome,
            } => self.finish_lookup(ticket, field, outcome),
            SessionCommand::PredictionFinished { ticket, outcome } => {
                self.finish_prediction(ticket, outcome)
            }
            SessionCommand::SetStatus(message) => vec![self.set_status(&message)],
            SessionCommand::ClearStatus => {
                self.status_line = None;
                vec![SessionEvent::StatusCleared]
            }
        }
    }

    fn select(&mut self, field: CascadeField, value: Option<String>) -> Vec<SessionEvent> {
        let value = value.filter(|value| !value.is_empty());
        if let Some(value) = &value
            && !self.catalog.contains(field, value)
        {
            let message = format!(
                "{value:?} is not an offered {} -- pick one from the list",
                field.label().to_ascii_lowercase()
            );
            return vec![
                SessionEvent::SelectionRejected(message.clone()),
                self.set_status(&message),
            ];
        }

        let chosen = value.is_some();
        self.selection.set(field, value);
        let mut events = vec![SessionEvent::FieldChanged(field)];

        let cleared = self.reset_descendants(field);
        if !cleared.is_empty() {
            events.push(SessionEvent::FieldsCleared(cleared));
        }

        if chosen
            && let Some(next) = field.next()
            && let Some(scope) = self.selection.scope_for(next)
        {
            let request = self.issue_lookup(next, scope);
            events.push(SessionEvent::LookupRequested(request));
        }
        events
    }

    fn reset_descendants(&mut self, field: CascadeField) -> Vec<CascadeField> {
        let descendants = field.descendants();
        for descendant in descendants {
            self.selection.set(*descendant, None);
            self.catalog.clear(*descendant);
        }
        descendants.to_vec()
    }

    fn issue_lookup(&mut self, field: CascadeField, scope: LookupScope) -> LookupRequest {
        self.last_lookup = self.last_lookup.next();
        let ticket = self.last_lookup;
        self.catalog.mark_outstanding(field, ticket);
        debug!(%ticket, field = field.param(), "lookup issued");
        LookupRequest {
            ticket,
            field,
            scope,
        }
    }

    fn finish_lookup(
        &mut self,
        ticket: LookupTicket,
        field: CascadeField,
        outcome: LookupOutcome,
    ) -> Vec<SessionEvent> {
        if !self.catalog.accept(field, ticket) {
            debug!(%ticket, field = field.param(), "stale lookup discarded");
            return vec![SessionEvent::LookupDiscarded { field, ticket }];
        }

        match outcome {
            LookupOutcome::Options(options) => {
                let count = options.len();
                self.catalog.replace(field, options);
                if field == CascadeField::FIRST {
                    self.load_error = None;
                }
                vec![SessionEvent::OptionsReplaced { field, count }]
            }
            LookupOutcome::Failed(error) if field == CascadeField::FIRST => {
                self.catalog.replace(field, Vec::new());
                let message = format!("Failed to load {}: {error}", field.endpoint());
                warn!(%ticket, %error, "initial lookup failed");
                self.load_error = Some(message.clone());
                vec![
                    SessionEvent::LoadFailed(message.clone()),
                    self.set_status(&message),
                ]
            }
            LookupOutcome::Failed(error) => {
                self.catalog.replace(field, Vec::new());
                warn!(%ticket, field = field.param(), %error, "lookup failed; offering no options");
                vec![SessionEvent::OptionsReplaced { field, count: 0 }]
            }
        }
    }

    fn submit(&mut self) -> Vec<SessionEvent> {
        if self.is_pending() {
            let message = "prediction already in flight -- wait for the result";
            return vec![
                SessionEvent::SubmissionRejected(message.to_owned()),
                self.set_status(message),
            ];
        }

        let input = match PredictionFormInput::from_selection(&self.selection) {
            Ok(input) => input,
            Err(error) => {
                let message = error.to_string();
                return vec![
                    SessionEvent::SubmissionRejected(message.clone()),
                    self.set_status(&message),
                ];
            }
        };

        self.last_prediction = self.last_prediction.next();
        let ticket = self.last_prediction;
        self.prediction = PredictionPhase::Pending {
            ticket,
            date: input.date,
        };
        debug!(%ticket, "prediction issued");
        vec![SessionEvent::PredictionRequested { ticket, input }]
    }

    fn finish_prediction(
        &mut self,
        ticket: PredictionTicket,
        outcome: PredictionOutcome,
    ) -> Vec<SessionEvent> {
        let PredictionPhase::Pending {
            ticket: pending,
            date,
        } = self.prediction
        else {
            return Vec::new();
        };
        if pending != ticket {
            debug!(%ticket, %pending, "stale prediction discarded");
            return Vec::new();
        }

        match outcome {
            PredictionOutcome::Estimate {
                prediction,
                fallback_used,
            } => {
                let result = PredictionResult::new(prediction, fallback_used.as_deref(), date);
                self.prediction = PredictionPhase::Succeeded(result.clone());
                vec![SessionEvent::PredictionSucceeded(result)]
            }
            PredictionOutcome::Failed(message) => {
                self.prediction = PredictionPhase::Failed(message.clone());
                vec![SessionEvent::PredictionFailed(message)]
            }
        }
    }

    fn set_status(&mut self, message: &str) -> SessionEvent {
        self.status_line = Some(message.to_owned());
        SessionEvent::StatusUpdated(message.to_owned())
    }
}
