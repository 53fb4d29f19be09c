//! Code book lookup for manifest records.
//!
//! Factories ship model, variant and color as short codes. The code book
//! tables map those to showroom names; anything the book does not know is
//! passed through raw, so a stale book never blocks an import — the codes
//! stay searchable and can be backfilled later.

use std::collections::HashMap;

use anyhow::Result;

use crate::db::OpsDb;
use crate::ingest::manifest::ManifestRecord;
use crate::models::IncomingVehicle;

pub struct CodeBook {
    models: HashMap<(String, String), (String, String)>,
    colors: HashMap<String, String>,
}

impl CodeBook {
    /// Load the full code book. Called once per sync run.
    pub fn load(db: &OpsDb) -> Result<Self> {
        let mut models = HashMap::new();
        for (model_code, variant_code, model, variant) in db.model_code_rows()? {
            models.insert((model_code, variant_code), (model, variant));
        }
        let mut colors = HashMap::new();
        for (color_code, color) in db.color_code_rows()? {
            colors.insert(color_code, color);
        }
        Ok(Self { models, colors })
    }

    #[cfg(test)]
    fn empty() -> Self {
        Self {
            models: HashMap::new(),
            colors: HashMap::new(),
        }
    }

    pub fn decode(&self, record: &ManifestRecord) -> IncomingVehicle {
        let key = (record.model_code.clone(), record.variant_code.clone());
        let (model, variant) = match self.models.get(&key) {
            Some((model, variant)) => (model.clone(), variant.clone()),
            None => (record.model_code.clone(), record.variant_code.clone()),
        };
        let color = self
            .colors
            .get(&record.color_code)
            .cloned()
            .unwrap_or_else(|| record.color_code.clone());
        let engine_no = if record.engine_no.is_empty() {
            None
        } else {
            Some(record.engine_no.clone())
        };
        IncomingVehicle {
            chassis_no: record.chassis_no.clone(),
            engine_no,
            model,
            variant,
            color,
        }
    }
}
