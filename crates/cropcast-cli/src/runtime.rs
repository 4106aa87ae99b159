// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use cropcast_api::Client;
use cropcast_app::{
    LookupOutcome, LookupRequest, PredictionFormInput, PredictionOutcome, PredictionTicket,
};
use cropcast_tui::InternalEvent;
use std::sync::mpsc::Sender;
use std::thread;
use tracing::debug;

/// Runs catalog lookups and predictions against the remote service, one
/// short-lived worker thread per call so the UI thread never blocks.
pub struct ServiceRuntime {
    client: Client,
}

impl ServiceRuntime {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl cropcast_tui::AppRuntime for ServiceRuntime {
    fn fetch_options(&mut self, request: &LookupRequest) -> LookupOutcome {
        self.client.fetch_lookup(request)
    }

    fn fetch_prediction(&mut self, input: &PredictionFormInput) -> PredictionOutcome {
        self.client.fetch_prediction(input)
    }

    fn spawn_lookup(&mut self, request: LookupRequest, tx: Sender<InternalEvent>) -> Result<()> {
        let client = self.client.clone();
        thread::Builder::new()
            .name(format!("lookup-{}", request.field.endpoint()))
            .spawn(move || {
                let outcome = client.fetch_lookup(&request);
                let event = InternalEvent::LookupFinished {
                    ticket: request.ticket,
                    field: request.field,
                    outcome,
                };
                if tx.send(event).is_err() {
                    debug!(ticket = %request.ticket, "ui closed before lookup finished");
                }
            })
            .context("spawn lookup worker")?;
        Ok(())
    }

    fn spawn_prediction(
        &mut self,
        ticket: PredictionTicket,
        input: PredictionFormInput,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let client = self.client.clone();
        thread::Builder::new()
            .name("prediction".to_owned())
            .spawn(move || {
                let outcome = client.fetch_prediction(&input);
                if tx
                    .send(InternalEvent::PredictionFinished { ticket, outcome })
                    .is_err()
                {
                    debug!(%ticket, "ui closed before prediction finished");
                }
            })
            .context("spawn prediction worker")?;
        Ok(())
    }
}
