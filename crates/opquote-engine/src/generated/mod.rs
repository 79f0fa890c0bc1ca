//! Protobuf types for the pricing service
//!
//! Hand-maintained to match `pricing.v1`. Byte fields carry raw bytes; rates
//! are decimal strings.

pub mod pricing {
    pub mod v1 {
        use prost::{Enumeration, Message};
        use serde::{Deserialize, Serialize};

        /// Resource kinds; `Unspecified` is never valid in a request
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration, Serialize, Deserialize,
        )]
        #[repr(i32)]
        pub enum ResourceKind {
            Unspecified = 0,
            Cpu = 1,
            MemoryMb = 2,
            StorageMb = 3,
            NetworkEgressMb = 4,
            NetworkIngressMb = 5,
            Gpu = 6,
        }

        #[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
        pub struct ResourceRequirement {
            #[prost(enumeration = "ResourceKind", tag = "1")]
            pub kind: i32,
            #[prost(uint64, tag = "2")]
            pub count: u64,
        }

        #[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
        pub struct ResourcePricing {
            #[prost(enumeration = "ResourceKind", tag = "1")]
            pub kind: i32,
            #[prost(uint64, tag = "2")]
            pub count: u64,
            /// Decimal string
            #[prost(string, tag = "3")]
            pub price_per_unit_rate: String,
        }

        #[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
        pub struct Asset {
            #[prost(oneof = "asset::AssetType", tags = "1, 2")]
            pub asset_type: Option<asset::AssetType>,
        }

        pub mod asset {
            use serde::{Deserialize, Serialize};

            #[derive(Clone, PartialEq, prost::Oneof, Serialize, Deserialize)]
            pub enum AssetType {
                /// Chain-native asset id
                #[prost(uint64, tag = "1")]
                Custom(u64),
                /// 20-byte token address
                #[prost(bytes, tag = "2")]
                Erc20(Vec<u8>),
            }
        }

        #[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
        pub struct AssetSecurityRequirements {
            #[prost(message, optional, tag = "1")]
            pub asset: Option<Asset>,
            #[prost(uint32, tag = "2")]
            pub minimum_exposure_percent: u32,
            #[prost(uint32, tag = "3")]
            pub maximum_exposure_percent: u32,
        }

        #[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
        pub struct AssetSecurityCommitment {
            #[prost(message, optional, tag = "1")]
            pub asset: Option<Asset>,
            #[prost(uint32, tag = "2")]
            pub exposure_percent: u32,
        }

        #[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
        pub struct QuoteDetails {
            #[prost(uint64, tag = "1")]
            pub workload_id: u64,
            #[prost(uint64, tag = "2")]
            pub ttl_blocks: u64,
            /// Decimal string
            #[prost(string, tag = "3")]
            pub total_cost_rate: String,
            #[prost(uint64, tag = "4")]
            pub timestamp: u64,
            #[prost(uint64, tag = "5")]
            pub expiry: u64,
            #[prost(message, repeated, tag = "6")]
            pub resources: Vec<ResourcePricing>,
            #[prost(message, optional, tag = "7")]
            pub security_commitment: Option<AssetSecurityCommitment>,
        }

        #[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
        pub struct GetPriceRequest {
            #[prost(uint64, tag = "1")]
            pub workload_id: u64,
            #[prost(uint64, tag = "2")]
            pub ttl_blocks: u64,
            #[prost(bytes = "vec", tag = "3")]
            pub proof_of_work: Vec<u8>,
            #[prost(message, repeated, tag = "4")]
            pub resource_requirements: Vec<ResourceRequirement>,
            #[prost(message, optional, tag = "5")]
            pub security_requirements: Option<AssetSecurityRequirements>,
        }

        #[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
        pub struct GetPriceResponse {
            #[prost(message, optional, tag = "1")]
            pub quote_details: Option<QuoteDetails>,
            /// Ed25519 signature (64 bytes)
            #[prost(bytes = "vec", tag = "2")]
            pub signature: Vec<u8>,
            /// Operator Ed25519 public key (32 bytes)
            #[prost(bytes = "vec", tag = "3")]
            pub operator_id: Vec<u8>,
            #[prost(bytes = "vec", tag = "4")]
            pub proof_of_work_response: Vec<u8>,
        }

        #[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
        pub struct GetChallengeRequest {
            #[prost(uint64, tag = "1")]
            pub workload_id: u64,
        }

        #[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
        pub struct GetChallengeResponse {
            #[prost(uint64, tag = "1")]
            pub workload_id: u64,
            #[prost(uint64, tag = "2")]
            pub window_start: u64,
            #[prost(uint64, tag = "3")]
            pub window_secs: u64,
            #[prost(uint32, tag = "4")]
            pub difficulty_bits: u32,
            #[prost(bytes = "vec", tag = "5")]
            pub challenge_digest: Vec<u8>,
        }
    }
}
