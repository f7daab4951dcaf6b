// x402 payment protocol (Arc Testnet / USDC)
//
// The service side of the flow: a request answered with HTTP 402 payment
// terms, and a verify-and-unlock call that trades a payment proof for content.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::catalog;
use crate::payment::TokenAmount;
use crate::types::{AppError, AppResult};

pub const PAYMENT_REQUIRED_STATUS: u16 = 402;

/// Arguments of a service request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub service_id: String,
    pub service_name: String,
    pub endpoint: String,
    pub price: String,
    pub provider_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRef {
    pub id: String,
    pub name: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTerms {
    pub amount: TokenAmount,
    pub currency: String,
    pub recipient: String,
    /// Human readable network label
    pub chain: String,
    pub chain_id: u64,
    /// Correlates this 402 response with the proof that settles it
    pub reference: String,
}

/// The 402 response: what must be paid, to whom, on which chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDescriptor {
    pub status: u16,
    pub service: ServiceRef,
    pub payment: PaymentTerms,
}

/// Links a confirmed transaction to the 402 response it settles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentProof {
    pub tx_hash: String,
    pub amount: TokenAmount,
    pub recipient: String,
    pub timestamp: DateTime<Utc>,
    pub reference: String,
}

impl PaymentProof {
    pub fn for_descriptor(descriptor: &PaymentDescriptor, tx_hash: &str) -> Self {
        Self {
            tx_hash: tx_hash.to_string(),
            amount: descriptor.payment.amount,
            recipient: descriptor.payment.recipient.clone(),
            timestamp: Utc::now(),
            reference: descriptor.payment.reference.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnlockResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UnlockResponse {
    pub fn unlocked(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// The paid-service backend
#[async_trait]
pub trait ServiceGateway: Send + Sync {
    /// Request a service; answered with the payment it requires
    async fn request_service(&self, request: &ServiceRequest) -> AppResult<PaymentDescriptor>;

    /// Submit a payment proof and receive the service content
    async fn verify_and_unlock(
        &self,
        proof: &PaymentProof,
        service_id: &str,
    ) -> AppResult<UnlockResponse>;
}

/// In-process gateway that answers every request with a 402 and trusts any
/// well-formed proof
pub struct MockServiceGateway {
    chain_id: u64,
    network_name: String,
    latency: Duration,
    simulated: bool,
}

impl MockServiceGateway {
    pub fn new(chain_id: u64, network_name: impl Into<String>) -> Self {
        Self {
            chain_id,
            network_name: network_name.into(),
            latency: Duration::ZERO,
            simulated: true,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Marks unlocked content as coming from an on-chain payment
    pub fn with_settlement_on_chain(mut self, on_chain: bool) -> Self {
        self.simulated = !on_chain;
        self
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl ServiceGateway for MockServiceGateway {
    async fn request_service(&self, request: &ServiceRequest) -> AppResult<PaymentDescriptor> {
        self.simulate_latency().await;

        if request.service_id.trim().is_empty() {
            return Err(AppError::InvalidRequest("service id is empty".to_string()));
        }
        let amount = TokenAmount::parse(&request.price)
            .map_err(|e| AppError::Gateway(format!("cannot price {}: {}", request.service_id, e)))?;

        let reference = format!("{}-{}", request.service_id, Uuid::new_v4().simple());
        debug!(service = %request.service_id, %reference, "Issuing 402 payment descriptor");

        Ok(PaymentDescriptor {
            status: PAYMENT_REQUIRED_STATUS,
            service: ServiceRef {
                id: request.service_id.clone(),
                name: request.service_name.clone(),
                endpoint: request.endpoint.clone(),
            },
            payment: PaymentTerms {
                amount,
                currency: "USDC".to_string(),
                recipient: request.provider_address.clone(),
                chain: self.network_name.clone(),
                chain_id: self.chain_id,
                reference,
            },
        })
    }

    async fn verify_and_unlock(
        &self,
        proof: &PaymentProof,
        service_id: &str,
    ) -> AppResult<UnlockResponse> {
        self.simulate_latency().await;

        if let Err(reason) = check_proof(proof, service_id) {
            return Ok(UnlockResponse::rejected(reason));
        }

        info!(service = %service_id, tx = %proof.tx_hash, "Payment proof accepted");
        Ok(UnlockResponse::unlocked(catalog::unlocked_content(
            service_id,
            &proof.tx_hash,
            &proof.reference,
            self.simulated,
        )))
    }
}

/// Structural checks only; the proof itself is trusted
fn check_proof(proof: &PaymentProof, service_id: &str) -> Result<(), String> {
    let hash = proof
        .tx_hash
        .strip_prefix("0x")
        .ok_or_else(|| "transaction hash must be 0x-prefixed".to_string())?;
    if hash.is_empty() || hex::decode(hash).is_err() {
        return Err("transaction hash is not valid hex".to_string());
    }
    if proof.amount.is_zero() {
        return Err("payment amount is zero".to_string());
    }
    if proof.recipient.trim().is_empty() {
        return Err("payment recipient is missing".to_string());
    }
    if proof.reference.trim().is_empty() {
        return Err("payment reference is missing".to_string());
    }
    if !proof.reference.starts_with(service_id) {
        return Err(format!(
            "reference {} does not belong to service {}",
            proof.reference, service_id
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn request(service_id: &str, price: &str) -> ServiceRequest {
        ServiceRequest {
            service_id: service_id.to_string(),
            service_name: "Code Review".to_string(),
            endpoint: "/api/services/review".to_string(),
            price: price.to_string(),
            provider_address: "0xprovider".to_string(),
        }
    }

    fn gateway() -> MockServiceGateway {
        MockServiceGateway::new(5042002, "Arc Testnet")
    }

    #[tokio::test]
    async fn test_request_returns_402_descriptor() {
        let descriptor = assert_ok!(gateway().request_service(&request("code-review", "0.15")).await);

        assert_eq!(descriptor.status, 402);
        assert_eq!(descriptor.service.id, "code-review");
        assert_eq!(descriptor.payment.amount.to_string(), "0.15");
        assert_eq!(descriptor.payment.recipient, "0xprovider");
        assert_eq!(descriptor.payment.chain_id, 5042002);
        assert!(descriptor.payment.reference.starts_with("code-review-"));
    }

    #[tokio::test]
    async fn test_references_are_unique_per_request() {
        let gateway = gateway();
        let first = gateway.request_service(&request("code-review", "0.15")).await.unwrap();
        let second = gateway.request_service(&request("code-review", "0.15")).await.unwrap();
        assert_ne!(first.payment.reference, second.payment.reference);
    }

    #[tokio::test]
    async fn test_request_rejects_bad_price() {
        let result = gateway().request_service(&request("code-review", "free")).await;
        assert!(matches!(assert_err!(result), AppError::Gateway(_)));
    }

    #[tokio::test]
    async fn test_unlock_with_valid_proof() {
        let gateway = gateway();
        let descriptor = gateway.request_service(&request("code-review", "0.15")).await.unwrap();
        let proof = PaymentProof::for_descriptor(&descriptor, "0xdeadbeef");

        let response = gateway.verify_and_unlock(&proof, "code-review").await.unwrap();
        assert!(response.success);
        let data = response.data.unwrap();
        assert_eq!(data["tx_hash"], "0xdeadbeef");
        assert_eq!(data["reference"], descriptor.payment.reference.as_str());
    }

    #[tokio::test]
    async fn test_unlock_rejects_malformed_proof() {
        let gateway = gateway();
        let descriptor = gateway.request_service(&request("code-review", "0.15")).await.unwrap();

        let mut proof = PaymentProof::for_descriptor(&descriptor, "not-a-hash");
        let response = gateway.verify_and_unlock(&proof, "code-review").await.unwrap();
        assert!(!response.success);
        assert!(response.error.unwrap().contains("0x-prefixed"));

        proof.tx_hash = "0xabc1".to_string();
        let response = gateway.verify_and_unlock(&proof, "image-gen").await.unwrap();
        assert!(!response.success);
        assert!(response.error.unwrap().contains("does not belong"));
    }

    #[test]
    fn test_unlock_response_serialization() {
        let json = serde_json::to_value(UnlockResponse::rejected("nope")).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "nope");
        assert!(json.get("data").is_none());
    }
}
