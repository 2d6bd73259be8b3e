use crate::config::GatewayConfig;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentGateway;
use crate::payments::providers::{FlipGateway, XenditGateway};
use crate::payments::types::ProviderName;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Configured gateway clients plus the choice of which one handles
/// payment requests and which one handles payouts.
#[derive(Clone)]
pub struct GatewayRegistry {
    gateways: HashMap<ProviderName, Arc<dyn PaymentGateway>>,
    payment_gateway: ProviderName,
    payout_gateway: ProviderName,
}

impl GatewayRegistry {
    pub fn from_config(config: &GatewayConfig) -> PaymentResult<Self> {
        let mut gateways: HashMap<ProviderName, Arc<dyn PaymentGateway>> = HashMap::new();
        gateways.insert(
            ProviderName::Xendit,
            Arc::new(XenditGateway::new(config.xendit.clone())?),
        );
        if let Some(flip) = &config.flip {
            gateways.insert(ProviderName::Flip, Arc::new(FlipGateway::new(flip.clone())?));
        }

        let registry = Self::with_gateways(gateways, config.payment_gateway, config.payout_gateway)?;
        info!(
            payment_gateway = %registry.payment_gateway,
            payout_gateway = %registry.payout_gateway,
            "gateway registry initialized"
        );
        Ok(registry)
    }

    pub fn with_gateways(
        gateways: HashMap<ProviderName, Arc<dyn PaymentGateway>>,
        payment_gateway: ProviderName,
        payout_gateway: ProviderName,
    ) -> PaymentResult<Self> {
        for required in [payment_gateway, payout_gateway] {
            if !gateways.contains_key(&required) {
                return Err(PaymentError::ValidationError {
                    message: format!("gateway {} is not configured", required),
                    field: Some("provider".to_string()),
                });
            }
        }

        Ok(Self {
            gateways,
            payment_gateway,
            payout_gateway,
        })
    }

    /// One gateway serving both roles.
    pub fn single(gateway: Arc<dyn PaymentGateway>) -> Self {
        let name = gateway.name();
        let mut gateways: HashMap<ProviderName, Arc<dyn PaymentGateway>> = HashMap::new();
        gateways.insert(name, gateway);
        Self {
            gateways,
            payment_gateway: name,
            payout_gateway: name,
        }
    }

    pub fn get(&self, provider: ProviderName) -> PaymentResult<Arc<dyn PaymentGateway>> {
        self.gateways
            .get(&provider)
            .cloned()
            .ok_or_else(|| PaymentError::ValidationError {
                message: format!("gateway {} is not configured", provider),
                field: Some("provider".to_string()),
            })
    }

    /// Gateway used for new payment requests
    pub fn payments(&self) -> Arc<dyn PaymentGateway> {
        self.gateways[&self.payment_gateway].clone()
    }

    /// Gateway used for new payouts and for the platform balance
    pub fn payouts(&self) -> Arc<dyn PaymentGateway> {
        self.gateways[&self.payout_gateway].clone()
    }

    pub fn list_available(&self) -> Vec<ProviderName> {
        let mut names: Vec<ProviderName> = self.gateways.keys().copied().collect();
        names.sort_by_key(|n| n.as_str());
        names
    }
}
