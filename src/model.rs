//! The TEK wire/domain type shared by every component.

use serde::{Deserialize, Serialize};

/// A Temporary Exposure Key as uploaded by a client or read back from the
/// store. `key_data` travels base64-encoded over the wire; internally we
/// keep it decoded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tek {
    #[serde(with = "base64_bytes")]
    pub key_data: Vec<u8>,
    pub rolling_start_number: u32,
    pub rolling_period: u32,
    #[serde(default)]
    pub transmission_risk_level: i32,
    #[serde(default)]
    pub fake: u8,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub report_type: Option<i32>,
    #[serde(default)]
    pub days_since_onset_of_symptoms: Option<i32>,
}

impl Tek {
    pub fn is_fake(&self) -> bool {
        self.fake == 1
    }

    /// Millisecond start of this key's validity window.
    pub fn start_ms(&self) -> i64 {
        (self.rolling_start_number as i64) * crate::time::TEN_MINUTES_MS
    }

    /// Millisecond end of this key's validity window.
    pub fn end_ms(&self) -> i64 {
        self.start_ms() + (self.rolling_period as i64) * crate::time::TEN_MINUTES_MS
    }
}

/// A row as persisted: a TEK plus the release bucket it landed in and the
/// country it was attributed to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExposedRow {
    pub tek: Tek,
    pub received_at: i64,
    pub country: Option<String>,
}

mod base64_bytes {
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        base64::engine::general_purpose::STANDARD
            .decode(s)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
pub fn fixture_key(byte: u8, rolling_start: u32) -> Tek {
    Tek {
        key_data: vec![byte; 16],
        rolling_start_number: rolling_start,
        rolling_period: 144,
        transmission_risk_level: 1,
        fake: 0,
        origin: None,
        report_type: None,
        days_since_onset_of_symptoms: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_bounds_follow_rolling_fields() {
        let k = fixture_key(1, 100);
        assert_eq!(k.start_ms(), 100 * crate::time::TEN_MINUTES_MS);
        assert_eq!(k.end_ms(), (100 + 144) * crate::time::TEN_MINUTES_MS);
    }

    #[test]
    fn fake_flag_reads_back() {
        let mut k = fixture_key(1, 0);
        assert!(!k.is_fake());
        k.fake = 1;
        assert!(k.is_fake());
    }
}
