use std::path::PathBuf;

use lotledger_recon::{coerce_record, reconcile, EntityKind, MergeError, Observation, Reconciled, Record, Value};

use crate::error::StoreError;
use crate::gateway::{Gateway, GatewayOptions};
use crate::ops;

/// Settings key holding the directory downloaded images are saved to.
pub const IMAGE_LOCATION_KEY: &str = "image_location";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No row existed for the identity.
    Inserted,
    /// An existing row was reconciled with the observation.
    Merged,
}

/// The listing and profile store.
#[derive(Debug, Clone)]
pub struct Store {
    gateway: Gateway,
}

impl Store {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: impl Into<PathBuf>, options: GatewayOptions) -> Result<Self, StoreError> {
        let gateway = Gateway::new(path, options);
        gateway.run(|tx| ops::create_tables(tx))?;
        tracing::debug!(path = %gateway.path().display(), "store ready");
        Ok(Self { gateway })
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Reconcile one observation with its stored row and write the result,
    /// all in a single transaction.
    ///
    /// With `stub_seller`, a listing's seller also gets an empty profile row
    /// if none exists.
    pub fn upsert(&self, observation: &Observation, stub_seller: bool) -> Result<Outcome, StoreError> {
        let kind = observation.kind;
        self.gateway.run(|tx| {
            let schema = ops::table_schema(tx, kind)?;
            let incoming = coerce_record(&observation.fields, &schema);
            let identity = incoming
                .identity()
                .cloned()
                .ok_or(MergeError::MissingIdentity { kind })?;

            let stored = ops::fetch_record(tx, &schema, &identity)?;
            let Reconciled { mut record, authority } = reconcile(stored.as_ref(), &incoming, &schema)?;
            schema.fill_defaults(&mut record)?;
            ops::replace_record(tx, &schema, &record)?;

            if stub_seller && kind == EntityKind::Listing {
                if let Some(seller) = record.value("seller").as_text() {
                    if ops::ensure_profile_stub(tx, seller)? {
                        tracing::debug!(seller, "created profile stub");
                    }
                }
            }

            tracing::debug!(
                %kind,
                %identity,
                ?authority,
                origin = %observation.origin,
                mode = ?tx.mode(),
                "record written"
            );
            Ok(if stored.is_some() { Outcome::Merged } else { Outcome::Inserted })
        })
    }

    /// The stored row for `identity`, if any.
    pub fn get(&self, kind: EntityKind, identity: &Value) -> Result<Option<Record>, StoreError> {
        self.gateway.run(|tx| {
            let schema = ops::table_schema(tx, kind)?;
            ops::fetch_record(tx, &schema, identity)
        })
    }

    pub fn image_location(&self) -> Result<Option<PathBuf>, StoreError> {
        let value = self
            .gateway
            .run(|tx| ops::get_setting(tx, IMAGE_LOCATION_KEY))?;
        Ok(value.map(PathBuf::from))
    }

    pub fn set_image_location(&self, location: &str) -> Result<(), StoreError> {
        self.gateway
            .run(|tx| ops::put_setting(tx, IMAGE_LOCATION_KEY, location))
    }
}
