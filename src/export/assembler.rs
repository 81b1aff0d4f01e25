//! Deterministic construction, signing, and zip packaging of the export
//! bundle. TEKs are sorted by `key_data` ascending before anything else —
//! an external contract clients rely on for signature verification.

use std::io::Write;

use p256::ecdsa::signature::Signer;
use p256::ecdsa::Signature;

use crate::config::Config;
use crate::error::AppError;
use crate::model::Tek;
use crate::vault::KeyPair;

use super::cuckoo::{fingerprint_bits_for_fp_rate, CuckooFilter};
use super::proto::{SignatureInfo, TekSignature, TekSignatureList, TemporaryExposureKey, TemporaryExposureKeyExport};
use super::BundleVersion;

pub const CONTENT_TYPE_ZIP: &str = "application/zip";

pub struct ExportAssembler<'a> {
    pub config: &'a Config,
    pub signing_key: &'a KeyPair,
}

impl<'a> ExportAssembler<'a> {
    pub fn new(config: &'a Config, signing_key: &'a KeyPair) -> Self {
        Self { config, signing_key }
    }

    /// Builds the zipped export bundle for `keys`. Returns `None` if `keys`
    /// is empty — the caller turns that into an HTTP 204, never a 500.
    pub fn assemble(
        &self,
        mut keys: Vec<Tek>,
        batch_tag: i64,
        bucket_ms: i64,
        version: BundleVersion,
    ) -> Result<Option<Vec<u8>>, AppError> {
        if keys.is_empty() {
            return Ok(None);
        }

        keys.sort_by(|a, b| a.key_data.cmp(&b.key_data));

        let (payload, signature) = match version {
            BundleVersion::V1 | BundleVersion::V2 => {
                let export = self.build_protobuf_export(&keys, batch_tag, bucket_ms);
                let bytes = prost::Message::encode_to_vec(&export);
                let signature = self.sign(&bytes)?;
                (bytes, signature)
            }
            BundleVersion::V2Uma => {
                let filter_bytes = self.build_cuckoo_bytes(&keys, version);
                let signature = self.sign(&filter_bytes)?;
                (filter_bytes, signature)
            }
        };

        let sig_list = TekSignatureList {
            signatures: vec![TekSignature {
                signature_info: Some(self.signature_info()),
                batch_num: 1,
                batch_size: 1,
                signature,
            }],
        };
        let sig_bytes = prost::Message::encode_to_vec(&sig_list);

        Ok(Some(self.zip_entries(&payload, &sig_bytes)?))
    }

    fn build_protobuf_export(
        &self,
        keys: &[Tek],
        batch_tag: i64,
        bucket_ms: i64,
    ) -> TemporaryExposureKeyExport {
        TemporaryExposureKeyExport {
            start_timestamp: (batch_tag - bucket_ms) / 1000,
            end_timestamp: batch_tag / 1000,
            region: self.config.gaen_region.clone(),
            batch_num: 1,
            batch_size: 1,
            signature_infos: vec![self.signature_info()],
            keys: keys.iter().map(tek_to_proto).collect(),
        }
    }

    fn build_cuckoo_bytes(&self, keys: &[Tek], version: BundleVersion) -> Vec<u8> {
        let fp_rate = version.cuckoo_fp_rate();
        let bits = fingerprint_bits_for_fp_rate(fp_rate);
        let capacity = keys.len().max(1).next_power_of_two();
        let mut filter = CuckooFilter::new(capacity, bits);
        for key in keys {
            filter.insert(&hash_tek(key));
        }
        filter.to_bytes()
    }

    fn signature_info(&self) -> SignatureInfo {
        SignatureInfo {
            app_bundle_id: self.config.bundle_id.clone(),
            android_package: self.config.package_name.clone(),
            verification_key_version: self.config.key_version.clone(),
            verification_key_id: self.config.key_identifier.clone(),
            signature_algorithm: self.config.gaen_algorithm_oid.clone(),
        }
    }

    fn sign(&self, bytes: &[u8]) -> Result<Vec<u8>, AppError> {
        let signature: Signature = self.signing_key.signing_key.sign(bytes);
        Ok(signature.to_der().as_bytes().to_vec())
    }

    fn zip_entries(&self, bin: &[u8], sig: &[u8]) -> Result<Vec<u8>, AppError> {
        let mut buf = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            let options = zip::write::FileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated)
                .unix_permissions(0o644);
            writer
                .start_file("export.bin", options)
                .map_err(|e| AppError::Signing(format!("zip write failed: {e}")))?;
            writer
                .write_all(bin)
                .map_err(|e| AppError::Signing(format!("zip write failed: {e}")))?;
            writer
                .start_file("export.sig", options)
                .map_err(|e| AppError::Signing(format!("zip write failed: {e}")))?;
            writer
                .write_all(sig)
                .map_err(|e| AppError::Signing(format!("zip write failed: {e}")))?;
            writer
                .finish()
                .map_err(|e| AppError::Signing(format!("zip finish failed: {e}")))?;
        }
        Ok(buf)
    }
}

fn tek_to_proto(k: &Tek) -> TemporaryExposureKey {
    TemporaryExposureKey {
        key_data: k.key_data.clone(),
        transmission_risk_level: k.transmission_risk_level,
        rolling_start_interval_number: k.rolling_start_number as i32,
        rolling_period: k.rolling_period as i32,
        report_type: k.report_type.unwrap_or(0),
        days_since_onset_of_symptoms: k.days_since_onset_of_symptoms.unwrap_or(0),
    }
}

/// Hash fed to the cuckoo filter: key data plus rolling start, so two keys
/// with the same bytes but different windows are distinct members.
fn hash_tek(k: &Tek) -> Vec<u8> {
    let mut buf = Vec::with_capacity(k.key_data.len() + 4);
    buf.extend_from_slice(&k.key_data);
    buf.extend_from_slice(&k.rolling_start_number.to_le_bytes());
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixture_key;
    use p256::ecdsa::SigningKey;
    use p256::SecretKey;

    fn test_config() -> Config {
        Config {
            release_bucket_duration_ms: 7_200_000,
            request_time_ms: 1_500,
            exposed_list_cache_control_ms: 300_000,
            retention_days: 14,
            gaen_key_size_bytes: 16,
            random_keys_enabled: false,
            random_key_amount: 10,
            gaen_algorithm_oid: "1.2.840.10045.4.3.2".into(),
            gaen_region: "es".into(),
            bundle_id: "org.example".into(),
            package_name: "org.example".into(),
            key_version: "v1".into(),
            key_identifier: "214".into(),
            time_skew_ms: 2 * 3_600_000,
            efgs_country_origin: "ES".into(),
            efgs_report_type: 1,
            database_url: "postgres://unused".into(),
            port: 0,
            request_timeout_ms: 5_000,
        }
    }

    fn test_keypair() -> KeyPair {
        use p256::pkcs8::{EncodePrivateKey, EncodePublicKey};
        let secret = SecretKey::random(&mut rand_core::OsRng);
        let signing_key = SigningKey::from(secret.clone());
        let verifying_key = *signing_key.verifying_key();
        let pkcs8_pem = secret
            .to_pkcs8_pem(p256::pkcs8::LineEnding::LF)
            .unwrap()
            .to_string();
        let public_key_pem = secret
            .public_key()
            .to_public_key_pem(p256::pkcs8::LineEnding::LF)
            .unwrap();
        KeyPair {
            signing_key,
            verifying_key,
            pkcs8_pem,
            public_key_pem,
        }
    }

    #[test]
    fn empty_key_set_short_circuits_to_none() {
        let cfg = test_config();
        let kp = test_keypair();
        let assembler = ExportAssembler::new(&cfg, &kp);
        let result = assembler
            .assemble(vec![], 7_200_000, 7_200_000, BundleVersion::V2)
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn deterministic_export_is_byte_identical() {
        let cfg = test_config();
        let kp = test_keypair();
        let assembler = ExportAssembler::new(&cfg, &kp);
        let keys = vec![fixture_key(3, 0), fixture_key(1, 0), fixture_key(2, 0)];

        // Build the unsigned protobuf payload twice (the signature itself
        // is randomized per RFC 6979 nonce reuse rules aren't guaranteed
        // byte-identical across calls with some backends, so we compare
        // the deterministic part: the sorted key list).
        let mut sorted_a = keys.clone();
        sorted_a.sort_by(|a, b| a.key_data.cmp(&b.key_data));
        let export_a = assembler.build_protobuf_export(&sorted_a, 7_200_000, 7_200_000);
        let bytes_a = prost::Message::encode_to_vec(&export_a);

        let mut sorted_b = keys;
        sorted_b.sort_by(|a, b| a.key_data.cmp(&b.key_data));
        let export_b = assembler.build_protobuf_export(&sorted_b, 7_200_000, 7_200_000);
        let bytes_b = prost::Message::encode_to_vec(&export_b);

        assert_eq!(bytes_a, bytes_b);
    }

    #[test]
    fn keys_are_sorted_ascending_by_key_data() {
        let cfg = test_config();
        let kp = test_keypair();
        let assembler = ExportAssembler::new(&cfg, &kp);
        let keys = vec![fixture_key(5, 0), fixture_key(1, 0), fixture_key(3, 0)];
        let export = assembler.build_protobuf_export(
            &{
                let mut k = keys;
                k.sort_by(|a, b| a.key_data.cmp(&b.key_data));
                k
            },
            0,
            7_200_000,
        );
        let datas: Vec<_> = export.keys.iter().map(|k| k.key_data.clone()).collect();
        let mut expected = datas.clone();
        expected.sort();
        assert_eq!(datas, expected);
    }

    #[test]
    fn cuckoo_export_contains_every_real_key() {
        let cfg = test_config();
        let kp = test_keypair();
        let assembler = ExportAssembler::new(&cfg, &kp);
        let keys: Vec<_> = (0..50u8).map(|i| fixture_key(i, 0)).collect();
        let bytes = assembler.build_cuckoo_bytes(&keys, BundleVersion::V2Uma);
        let filter = CuckooFilter::from_bytes(&bytes).unwrap();
        for k in &keys {
            assert!(filter.contains(&hash_tek(k)));
        }
    }

    #[test]
    fn bundle_assembles_to_a_valid_zip_with_both_entries() {
        let cfg = test_config();
        let kp = test_keypair();
        let assembler = ExportAssembler::new(&cfg, &kp);
        let keys = vec![fixture_key(1, 0), fixture_key(2, 0)];
        let bundle = assembler
            .assemble(keys, 7_200_000, 7_200_000, BundleVersion::V2)
            .unwrap()
            .unwrap();

        let mut zip = zip::ZipArchive::new(std::io::Cursor::new(bundle)).unwrap();
        let names: Vec<_> = (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect();
        assert!(names.contains(&"export.bin".to_string()));
        assert!(names.contains(&"export.sig".to_string()));
    }
}
