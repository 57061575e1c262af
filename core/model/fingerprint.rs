use serde::{Deserialize, Serialize};

/// The hex-encoded SHA-256 digest identifying everything that determines a rule's outputs.
///
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn from_hex<S: Into<String>>(hex: S) -> Self {
        Self(hex.into())
    }

    /// Stands in for a dependency that was skipped and so never got a fingerprint.
    pub fn absent() -> Self {
        Self("-".to_string())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_ref()
    }

    /// The name of the artifact published for this fingerprint.
    pub fn artifact_name(&self) -> String {
        format!("{}.tar.gz", self.0)
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl quickcheck::Arbitrary for Fingerprint {
        fn arbitrary(g: &mut quickcheck::Gen) -> Self {
            let bytes: Vec<u8> = (0..32).map(|_| u8::arbitrary(g)).collect();
            Self(bytes.iter().map(|b| format!("{:02x}", b)).collect())
        }
    }

    #[quickcheck]
    fn artifact_names_are_derived_from_the_digest(fp: Fingerprint) {
        assert_eq!(fp.artifact_name(), format!("{}.tar.gz", fp.as_str()));
        assert_eq!(fp.as_str().len(), 64);
    }
}
