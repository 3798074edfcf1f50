pub mod catalog;
pub mod constraints;
pub mod pricing;

use serde::{Deserialize, Serialize};

use crate::domain::catalog::OptionId;
use crate::domain::configuration::{ConfigurationCommand, ConfigurationState};
use crate::errors::ConfigurationError;

use self::{
    catalog::Catalog,
    constraints::{DeterministicGuidedSelling, GuidanceResult, GuidedSellingEngine},
    pricing::{DeterministicPricingEngine, PriceBreakdown, PricingEngine},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpqEvaluation {
    pub guidance: GuidanceResult,
    pub pricing: PriceBreakdown,
}

pub trait CpqRuntime: Send + Sync {
    fn admit(
        &self,
        catalog: &Catalog,
        state: &ConfigurationState,
        command: &ConfigurationCommand,
    ) -> Result<(), ConfigurationError>;

    fn prune(&self, catalog: &Catalog, state: &mut ConfigurationState) -> Vec<OptionId>;

    fn evaluate(&self, catalog: &Catalog, state: &ConfigurationState) -> CpqEvaluation;
}

pub struct DeterministicCpqRuntime<G, P> {
    guided_selling: G,
    pricing_engine: P,
}

pub type DefaultCpqRuntime =
    DeterministicCpqRuntime<DeterministicGuidedSelling, DeterministicPricingEngine>;

impl<G, P> DeterministicCpqRuntime<G, P> {
    pub fn new(guided_selling: G, pricing_engine: P) -> Self {
        Self { guided_selling, pricing_engine }
    }
}

impl Default for DefaultCpqRuntime {
    fn default() -> Self {
        Self::new(DeterministicGuidedSelling, DeterministicPricingEngine)
    }
}

impl<G, P> CpqRuntime for DeterministicCpqRuntime<G, P>
where
    G: GuidedSellingEngine,
    P: PricingEngine,
{
    fn admit(
        &self,
        catalog: &Catalog,
        state: &ConfigurationState,
        command: &ConfigurationCommand,
    ) -> Result<(), ConfigurationError> {
        self.guided_selling.admit(catalog, state, command)
    }

    fn prune(&self, catalog: &Catalog, state: &mut ConfigurationState) -> Vec<OptionId> {
        self.guided_selling.prune(catalog, state)
    }

    fn evaluate(&self, catalog: &Catalog, state: &ConfigurationState) -> CpqEvaluation {
        let guidance = self.guided_selling.evaluate(catalog, state);
        let pricing = self.pricing_engine.price(catalog, state);

        CpqEvaluation { guidance, pricing }
    }
}
