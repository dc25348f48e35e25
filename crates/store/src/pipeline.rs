//! Feeding adapter output into the store.

use std::fmt::Display;

use lotledger_recon::{EntityKind, Observation};

use crate::error::ImportError;
use crate::store::{Outcome, Store};

/// Counts for one import run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub inserted: usize,
    pub merged: usize,
    pub failed: usize,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.inserted + self.merged + self.failed
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Inserted => self.inserted += 1,
            Outcome::Merged => self.merged += 1,
        }
    }
}

pub struct Importer<'s> {
    store: &'s Store,
    seller_stubs: bool,
}

impl<'s> Importer<'s> {
    pub fn new(store: &'s Store) -> Self {
        Self {
            store,
            seller_stubs: false,
        }
    }

    /// Create an empty profile for every listing seller not yet known.
    pub fn with_seller_stubs(mut self, enabled: bool) -> Self {
        self.seller_stubs = enabled;
        self
    }

    pub fn import(&self, observation: &Observation) -> Result<Outcome, ImportError> {
        let stub = self.seller_stubs && observation.kind == EntityKind::Listing;
        self.store
            .upsert(observation, stub)
            .map_err(|e| ImportError::from_store(&observation.origin, e))
    }

    /// Import items in order. A failing item is logged and counted; only a
    /// store fault stops the batch.
    pub fn import_batch<I, E>(&self, items: I) -> Result<BatchReport, ImportError>
    where
        I: IntoIterator<Item = Result<Observation, E>>,
        E: Display,
    {
        let mut report = BatchReport::default();
        for item in items {
            let result = match item {
                Ok(observation) => self.import(&observation),
                Err(e) => Err(ImportError::Source(e.to_string())),
            };
            match result {
                Ok(outcome) => report.record(outcome),
                Err(e) if e.is_fatal() => {
                    tracing::error!(error = %e, done = report.total(), "import aborted");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "skipping item");
                    report.failed += 1;
                }
            }
        }
        tracing::info!(
            inserted = report.inserted,
            merged = report.merged,
            failed = report.failed,
            "import finished"
        );
        Ok(report)
    }
}
