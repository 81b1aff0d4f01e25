pub mod assembler;
pub mod cuckoo;
pub mod proto;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BundleVersion {
    V1,
    V2,
    V2Uma,
}

/// Fixed per-version Cuckoo filter parameters (false-positive rate).
impl BundleVersion {
    pub fn cuckoo_fp_rate(self) -> f64 {
        match self {
            BundleVersion::V2Uma => 1.0 / 100_000.0,
            _ => 0.0,
        }
    }
}
