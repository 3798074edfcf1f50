use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::cpq::pricing::PriceContribution;
use crate::domain::catalog::{FamilyId, OptionId, VariantId};
use crate::domain::snapshot::ConfigurationSnapshot;
use crate::errors::ConfigurationError;

/// Everything a quote assembler needs to materialize one line item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteLineDraft {
    pub variant_id: VariantId,
    pub family_id: FamilyId,
    pub quantity: u32,
    pub selected_option_ids: Vec<OptionId>,
    pub currency: String,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub breakdown: Vec<PriceContribution>,
    pub configuration_fingerprint: String,
}

impl QuoteLineDraft {
    pub fn from_snapshot(snapshot: &ConfigurationSnapshot) -> Result<Self, ConfigurationError> {
        if !snapshot.is_complete {
            return Err(ConfigurationError::Incomplete {
                unresolved_groups: snapshot.unresolved_required_groups.clone(),
            });
        }

        let selected_option_ids = snapshot.selected_options();
        let configuration_fingerprint = configuration_fingerprint(
            &snapshot.variant_id,
            snapshot.quantity,
            &selected_option_ids,
        );

        Ok(Self {
            variant_id: snapshot.variant_id.clone(),
            family_id: snapshot.family_id.clone(),
            quantity: snapshot.quantity,
            selected_option_ids,
            currency: snapshot.pricing.currency.clone(),
            unit_price: snapshot.pricing.unit_price,
            line_total: snapshot.pricing.total,
            breakdown: snapshot.pricing.entries.clone(),
            configuration_fingerprint,
        })
    }
}

/// Stable identity of a configuration: independent of selection order.
pub fn configuration_fingerprint(
    variant_id: &VariantId,
    quantity: u32,
    options: &[OptionId],
) -> String {
    let mut options = options.iter().map(OptionId::as_str).collect::<Vec<_>>();
    options.sort_unstable();
    options.dedup();

    let canonical = json!({
        "variant_id": variant_id.as_str(),
        "quantity": quantity,
        "options": options,
    });

    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());
    format!("sha256:{:x}", hasher.finalize())
}
