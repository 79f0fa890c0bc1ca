//! Pricing gRPC service implementation
//!
//! Implements `PricingService` from `pricing.v1` on top of [`QuoteService`].

use std::sync::Arc;

use opquote_common::{
    Asset, AssetSecurityCommitment, AssetSecurityRequirement, OpQuoteError, QuoteDetails,
    QuoteRequest, RejectionReason, ResourceKind, ResourcePricing, ResourceRequirement, SignedQuote,
};
use rust_decimal::Decimal;
use tonic::{Request, Response, Status};
use tracing::instrument;

use crate::generated::pricing::v1 as proto;
use crate::quote::QuoteService;

/// Pricing gRPC service handler
pub struct PricingGrpcService {
    service: Arc<QuoteService>,
}

impl PricingGrpcService {
    pub fn new(service: Arc<QuoteService>) -> Self {
        Self { service }
    }

    pub fn quote_service(&self) -> &Arc<QuoteService> {
        &self.service
    }
}

// ============================================================================
// Conversions
// ============================================================================

pub fn kind_to_proto(kind: ResourceKind) -> proto::ResourceKind {
    match kind {
        ResourceKind::Cpu => proto::ResourceKind::Cpu,
        ResourceKind::MemoryMb => proto::ResourceKind::MemoryMb,
        ResourceKind::StorageMb => proto::ResourceKind::StorageMb,
        ResourceKind::NetworkEgressMb => proto::ResourceKind::NetworkEgressMb,
        ResourceKind::NetworkIngressMb => proto::ResourceKind::NetworkIngressMb,
        ResourceKind::Gpu => proto::ResourceKind::Gpu,
    }
}

pub fn kind_from_proto(value: i32) -> Result<ResourceKind, Status> {
    match proto::ResourceKind::try_from(value) {
        Ok(proto::ResourceKind::Cpu) => Ok(ResourceKind::Cpu),
        Ok(proto::ResourceKind::MemoryMb) => Ok(ResourceKind::MemoryMb),
        Ok(proto::ResourceKind::StorageMb) => Ok(ResourceKind::StorageMb),
        Ok(proto::ResourceKind::NetworkEgressMb) => Ok(ResourceKind::NetworkEgressMb),
        Ok(proto::ResourceKind::NetworkIngressMb) => Ok(ResourceKind::NetworkIngressMb),
        Ok(proto::ResourceKind::Gpu) => Ok(ResourceKind::Gpu),
        Ok(proto::ResourceKind::Unspecified) | Err(_) => Err(Status::invalid_argument(format!(
            "{}: unknown resource kind {}",
            RejectionReason::UnknownResourceKind,
            value
        ))),
    }
}

fn asset_to_proto(asset: &Asset) -> proto::Asset {
    let asset_type = match asset {
        Asset::Custom(id) => proto::asset::AssetType::Custom(*id),
        Asset::Erc20(address) => proto::asset::AssetType::Erc20(address.to_vec()),
    };
    proto::Asset {
        asset_type: Some(asset_type),
    }
}

fn asset_from_proto(asset: Option<&proto::Asset>) -> Result<Asset, Status> {
    match asset.and_then(|a| a.asset_type.as_ref()) {
        Some(proto::asset::AssetType::Custom(id)) => Ok(Asset::Custom(*id)),
        Some(proto::asset::AssetType::Erc20(address)) => {
            let address: [u8; 20] = address.as_slice().try_into().map_err(|_| {
                Status::invalid_argument(format!(
                    "erc20 address must be 20 bytes, got {}",
                    address.len()
                ))
            })?;
            Ok(Asset::Erc20(address))
        }
        None => Err(Status::invalid_argument("asset is required")),
    }
}

fn percent_from_proto(field: &str, value: u32) -> Result<u8, Status> {
    u8::try_from(value).map_err(|_| {
        Status::invalid_argument(format!(
            "{}: {} = {} is not a percentage",
            RejectionReason::InvalidSecurityRange,
            field,
            value
        ))
    })
}

fn decimal_from_proto(field: &str, value: &str) -> Result<Decimal, Status> {
    value
        .parse::<Decimal>()
        .map_err(|e| Status::invalid_argument(format!("invalid {} {:?}: {}", field, value, e)))
}

fn pricing_to_proto(pricing: &ResourcePricing) -> proto::ResourcePricing {
    proto::ResourcePricing {
        kind: kind_to_proto(pricing.kind) as i32,
        count: pricing.count,
        price_per_unit_rate: pricing.price_per_unit_rate.to_string(),
    }
}

fn pricing_from_proto(pricing: &proto::ResourcePricing) -> Result<ResourcePricing, Status> {
    Ok(ResourcePricing::new(
        kind_from_proto(pricing.kind)?,
        pricing.count,
        decimal_from_proto("price_per_unit_rate", &pricing.price_per_unit_rate)?,
    ))
}

/// Decode a wire request
pub fn request_from_proto(req: proto::GetPriceRequest) -> Result<QuoteRequest, Status> {
    let security = req
        .security_requirements
        .as_ref()
        .ok_or_else(|| Status::invalid_argument("security_requirements is required"))?;

    let resource_requirements = req
        .resource_requirements
        .iter()
        .map(|r| Ok(ResourceRequirement::new(kind_from_proto(r.kind)?, r.count)))
        .collect::<Result<Vec<_>, Status>>()?;

    Ok(QuoteRequest {
        workload_id: req.workload_id,
        ttl_blocks: req.ttl_blocks,
        proof_of_work: req.proof_of_work,
        resource_requirements,
        security_requirements: AssetSecurityRequirement::new(
            asset_from_proto(security.asset.as_ref())?,
            percent_from_proto("minimum_exposure_percent", security.minimum_exposure_percent)?,
            percent_from_proto("maximum_exposure_percent", security.maximum_exposure_percent)?,
        ),
    })
}

/// Encode a domain request, used by clients and tests
pub fn request_to_proto(req: &QuoteRequest) -> proto::GetPriceRequest {
    proto::GetPriceRequest {
        workload_id: req.workload_id,
        ttl_blocks: req.ttl_blocks,
        proof_of_work: req.proof_of_work.clone(),
        resource_requirements: req
            .resource_requirements
            .iter()
            .map(|r| proto::ResourceRequirement {
                kind: kind_to_proto(r.kind) as i32,
                count: r.count,
            })
            .collect(),
        security_requirements: Some(proto::AssetSecurityRequirements {
            asset: Some(asset_to_proto(&req.security_requirements.asset)),
            minimum_exposure_percent: u32::from(req.security_requirements.minimum_exposure_percent),
            maximum_exposure_percent: u32::from(req.security_requirements.maximum_exposure_percent),
        }),
    }
}

/// Encode a signed quote
pub fn signed_quote_to_proto(quote: &SignedQuote) -> proto::GetPriceResponse {
    let details = &quote.quote_details;
    proto::GetPriceResponse {
        quote_details: Some(proto::QuoteDetails {
            workload_id: details.workload_id,
            ttl_blocks: details.ttl_blocks,
            total_cost_rate: details.total_cost_rate.to_string(),
            timestamp: details.timestamp,
            expiry: details.expiry,
            resources: details.resources.iter().map(pricing_to_proto).collect(),
            security_commitment: Some(proto::AssetSecurityCommitment {
                asset: Some(asset_to_proto(&details.security_commitment.asset)),
                exposure_percent: u32::from(details.security_commitment.exposure_percent),
            }),
        }),
        signature: quote.signature.to_vec(),
        operator_id: quote.operator_id.to_vec(),
        proof_of_work_response: quote.proof_of_work_response.clone(),
    }
}

/// Decode a signed quote so a client can verify it
pub fn signed_quote_from_proto(resp: &proto::GetPriceResponse) -> Result<SignedQuote, Status> {
    let details = resp
        .quote_details
        .as_ref()
        .ok_or_else(|| Status::invalid_argument("quote_details is required"))?;
    let commitment = details
        .security_commitment
        .as_ref()
        .ok_or_else(|| Status::invalid_argument("security_commitment is required"))?;

    let signature: [u8; 64] = resp
        .signature
        .as_slice()
        .try_into()
        .map_err(|_| Status::invalid_argument("signature must be 64 bytes"))?;
    let operator_id: [u8; 32] = resp
        .operator_id
        .as_slice()
        .try_into()
        .map_err(|_| Status::invalid_argument("operator_id must be 32 bytes"))?;

    Ok(SignedQuote {
        quote_details: QuoteDetails {
            workload_id: details.workload_id,
            ttl_blocks: details.ttl_blocks,
            total_cost_rate: decimal_from_proto("total_cost_rate", &details.total_cost_rate)?,
            timestamp: details.timestamp,
            expiry: details.expiry,
            resources: details
                .resources
                .iter()
                .map(pricing_from_proto)
                .collect::<Result<Vec<_>, Status>>()?,
            security_commitment: AssetSecurityCommitment {
                asset: asset_from_proto(commitment.asset.as_ref())?,
                exposure_percent: percent_from_proto(
                    "exposure_percent",
                    commitment.exposure_percent,
                )?,
            },
        },
        signature,
        operator_id,
        proof_of_work_response: resp.proof_of_work_response.clone(),
    })
}

/// Map a rejection onto a gRPC status
pub fn status_from_error(err: &OpQuoteError) -> Status {
    let reason = err.rejection_reason();
    let message = format!("{}: {}", reason, err);
    match reason {
        RejectionReason::InvalidProofOfWork => Status::permission_denied(message),
        RejectionReason::UnknownWorkload => Status::not_found(message),
        RejectionReason::UnknownResourceKind
        | RejectionReason::InvalidSecurityRange
        | RejectionReason::InvalidRequest => Status::invalid_argument(message),
        RejectionReason::InsufficientCapacity => Status::resource_exhausted(message),
        RejectionReason::SigningFailure | RejectionReason::InternalComputationError => {
            Status::internal(message)
        }
    }
}

// ============================================================================
// Service Trait Implementation
// ============================================================================

#[tonic::async_trait]
impl PricingService for PricingGrpcService {
    /// Issue a signed quote
    #[instrument(skip(self, request))]
    async fn get_price(
        &self,
        request: Request<proto::GetPriceRequest>,
    ) -> Result<Response<proto::GetPriceResponse>, Status> {
        let req = request_from_proto(request.into_inner())?;

        let quote = self
            .service
            .get_price(&req)
            .map_err(|e| status_from_error(&e))?;

        Ok(Response::new(signed_quote_to_proto(&quote)))
    }

    /// Current proof-of-work challenge for a workload
    #[instrument(skip(self, request))]
    async fn get_challenge(
        &self,
        request: Request<proto::GetChallengeRequest>,
    ) -> Result<Response<proto::GetChallengeResponse>, Status> {
        let req = request.into_inner();
        let challenge = self.service.challenge(req.workload_id);

        Ok(Response::new(proto::GetChallengeResponse {
            workload_id: challenge.workload_id,
            window_start: challenge.window_start,
            window_secs: self.service.pow_settings().window_secs,
            difficulty_bits: u32::from(challenge.difficulty_bits),
            challenge_digest: challenge.digest.to_vec(),
        }))
    }
}

// ============================================================================
// Service Trait Definition
// ============================================================================

/// PricingService trait (matching proto definition)
#[tonic::async_trait]
pub trait PricingService: Send + Sync + 'static {
    async fn get_price(
        &self,
        request: Request<proto::GetPriceRequest>,
    ) -> Result<Response<proto::GetPriceResponse>, Status>;

    async fn get_challenge(
        &self,
        request: Request<proto::GetChallengeRequest>,
    ) -> Result<Response<proto::GetChallengeResponse>, Status>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::InMemoryBenchmarkCache;
    use crate::pow::{PowSettings, ProofOfWorkChallenge, ProofOfWorkGate};
    use crate::pricing::{PriceCalculator, PricingConfig, PricingConfigResolver, PricingTable};
    use crate::quote::QuoteSettings;
    use crate::security::SecurityCommitmentBuilder;
    use opquote_common::{BenchmarkProfile, PricingError, QuoteSigner};
    use rust_decimal_macros::dec;
    use tonic::Code;

    fn create_test_service() -> PricingGrpcService {
        let gate = Arc::new(ProofOfWorkGate::new(PowSettings {
            difficulty_bits: 4,
            window_secs: 3600,
            sweep_interval_secs: 3600,
        }));
        let benchmarks = Arc::new(InMemoryBenchmarkCache::with_profiles([
            BenchmarkProfile::new(7, 0).with_capability(ResourceKind::Cpu, 8),
        ]));
        let table = PricingTable::new()
            .with_entry(ResourcePricing::new(ResourceKind::Cpu, 1, dec!(0.001)))
            .with_entry(ResourcePricing::new(ResourceKind::MemoryMb, 1024, dec!(0.00005)));

        PricingGrpcService::new(Arc::new(QuoteService::new(
            gate,
            benchmarks,
            Arc::new(PricingConfigResolver::new(PricingConfig::new(table))),
            PriceCalculator::new(6),
            SecurityCommitmentBuilder::default(),
            QuoteSigner::generate(),
            QuoteSettings::default(),
        )))
    }

    async fn challenge(service: &PricingGrpcService, workload_id: u64) -> ProofOfWorkChallenge {
        let resp = service
            .get_challenge(Request::new(proto::GetChallengeRequest { workload_id }))
            .await
            .unwrap()
            .into_inner();
        ProofOfWorkChallenge {
            workload_id: resp.workload_id,
            window_start: resp.window_start,
            difficulty_bits: resp.difficulty_bits as u8,
            digest: resp.challenge_digest.as_slice().try_into().unwrap(),
        }
    }

    async fn price_request(service: &PricingGrpcService, workload_id: u64) -> proto::GetPriceRequest {
        let proof = ProofOfWorkGate::solve(&challenge(service, workload_id).await);
        request_to_proto(&QuoteRequest {
            workload_id,
            ttl_blocks: 100,
            proof_of_work: proof.to_bytes().to_vec(),
            resource_requirements: vec![
                ResourceRequirement::new(ResourceKind::Cpu, 2),
                ResourceRequirement::new(ResourceKind::MemoryMb, 1024),
            ],
            security_requirements: AssetSecurityRequirement::new(Asset::Custom(1), 20, 40),
        })
    }

    #[tokio::test]
    async fn test_get_price() {
        let service = create_test_service();
        let req = price_request(&service, 7).await;

        let resp = service
            .get_price(Request::new(req.clone()))
            .await
            .unwrap()
            .into_inner();

        let details = resp.quote_details.clone().unwrap();
        assert_eq!(details.total_cost_rate, "31.92");
        assert_eq!(resp.proof_of_work_response, req.proof_of_work);
        assert_eq!(resp.operator_id.len(), 32);
        assert_eq!(resp.signature.len(), 64);

        let quote = signed_quote_from_proto(&resp).unwrap();
        assert!(quote.verify_self_attested());
        assert_eq!(
            quote.operator_id,
            service.quote_service().signer().operator_id()
        );
    }

    #[tokio::test]
    async fn test_invalid_proof_is_permission_denied() {
        let service = create_test_service();
        let mut req = price_request(&service, 7).await;
        req.proof_of_work = vec![1, 2, 3];

        let status = service.get_price(Request::new(req)).await.unwrap_err();
        assert_eq!(status.code(), Code::PermissionDenied);
    }

    #[tokio::test]
    async fn test_replayed_proof_is_permission_denied() {
        let service = create_test_service();
        let req = price_request(&service, 7).await;

        assert!(service.get_price(Request::new(req.clone())).await.is_ok());
        let status = service.get_price(Request::new(req)).await.unwrap_err();
        assert_eq!(status.code(), Code::PermissionDenied);
    }

    #[tokio::test]
    async fn test_unknown_workload_is_not_found() {
        let service = create_test_service();
        let req = price_request(&service, 404).await;

        let status = service.get_price(Request::new(req)).await.unwrap_err();
        assert_eq!(status.code(), Code::NotFound);
    }

    #[tokio::test]
    async fn test_unspecified_kind_is_invalid_argument() {
        let service = create_test_service();
        let mut req = price_request(&service, 7).await;
        req.resource_requirements[0].kind = proto::ResourceKind::Unspecified as i32;

        let status = service.get_price(Request::new(req)).await.unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_unpriced_kind_is_invalid_argument() {
        let service = create_test_service();
        let mut req = price_request(&service, 7).await;
        req.resource_requirements[0].kind = proto::ResourceKind::Gpu as i32;

        let status = service.get_price(Request::new(req)).await.unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
        assert!(status.message().starts_with("unknown_resource_kind"));
    }

    #[tokio::test]
    async fn test_missing_security_requirements() {
        let service = create_test_service();
        let mut req = price_request(&service, 7).await;
        req.security_requirements = None;

        let status = service.get_price(Request::new(req)).await.unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                OpQuoteError::Pricing(PricingError::CapacityExceeded {
                    kind: ResourceKind::Cpu,
                    requested: 9,
                    capacity: 8,
                }),
                Code::ResourceExhausted,
            ),
            (
                OpQuoteError::Pricing(PricingError::Computation("overflow".into())),
                Code::Internal,
            ),
            (
                OpQuoteError::Pricing(PricingError::InvalidTtl {
                    ttl_blocks: 0,
                    max_ttl_blocks: 10,
                }),
                Code::InvalidArgument,
            ),
        ];
        for (err, code) in cases {
            assert_eq!(status_from_error(&err).code(), code);
        }
    }

    #[test]
    fn test_erc20_address_length_checked() {
        let short = proto::Asset {
            asset_type: Some(proto::asset::AssetType::Erc20(vec![0u8; 19])),
        };
        assert!(asset_from_proto(Some(&short)).is_err());

        let ok = proto::Asset {
            asset_type: Some(proto::asset::AssetType::Erc20(vec![7u8; 20])),
        };
        assert_eq!(asset_from_proto(Some(&ok)).unwrap(), Asset::Erc20([7u8; 20]));
    }
}
