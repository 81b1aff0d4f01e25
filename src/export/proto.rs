//! Hand-written protobuf types mirroring the GAEN
//! `TemporaryExposureKeyExport` wire contract. Regenerated-from-`.proto`
//! in a real deployment; defined here field-by-field since no `.proto`
//! source is available in this environment (see `build.rs`).

#[derive(Clone, PartialEq, prost::Message)]
pub struct TemporaryExposureKey {
    #[prost(bytes, tag = "1")]
    pub key_data: Vec<u8>,
    #[prost(int32, tag = "2")]
    pub transmission_risk_level: i32,
    #[prost(int32, tag = "3")]
    pub rolling_start_interval_number: i32,
    #[prost(int32, tag = "4")]
    pub rolling_period: i32,
    #[prost(int32, tag = "5")]
    pub report_type: i32,
    #[prost(sint32, tag = "6")]
    pub days_since_onset_of_symptoms: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SignatureInfo {
    #[prost(string, tag = "1")]
    pub app_bundle_id: String,
    #[prost(string, tag = "2")]
    pub android_package: String,
    #[prost(string, tag = "3")]
    pub verification_key_version: String,
    #[prost(string, tag = "4")]
    pub verification_key_id: String,
    #[prost(string, tag = "5")]
    pub signature_algorithm: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TemporaryExposureKeyExport {
    #[prost(int64, tag = "1")]
    pub start_timestamp: i64,
    #[prost(int64, tag = "2")]
    pub end_timestamp: i64,
    #[prost(string, tag = "3")]
    pub region: String,
    #[prost(int32, tag = "4")]
    pub batch_num: i32,
    #[prost(int32, tag = "5")]
    pub batch_size: i32,
    #[prost(message, repeated, tag = "6")]
    pub signature_infos: Vec<SignatureInfo>,
    #[prost(message, repeated, tag = "7")]
    pub keys: Vec<TemporaryExposureKey>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TekSignature {
    #[prost(message, optional, tag = "1")]
    pub signature_info: Option<SignatureInfo>,
    #[prost(int32, tag = "2")]
    pub batch_num: i32,
    #[prost(int32, tag = "3")]
    pub batch_size: i32,
    #[prost(bytes, tag = "4")]
    pub signature: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TekSignatureList {
    #[prost(message, repeated, tag = "1")]
    pub signatures: Vec<TekSignature>,
}
