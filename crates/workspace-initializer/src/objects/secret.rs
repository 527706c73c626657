use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde::Serialize;

use k8_types::Crd;
use k8_types::CrdNames;
use k8_types::Header;
use k8_types::K8Obj;
use k8_types::Spec;
use k8_types::Status;

const SECRET_API: Crd = Crd {
    group: "core",
    version: "v1",
    names: CrdNames {
        kind: "Secret",
        plural: "secrets",
        singular: "secret",
    },
};

pub type SecretObj = K8Obj<SecretSpec>;

/// secrets carry no spec, their payload lives in [`SecretHeader`]
#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct SecretSpec {}

impl Spec for SecretSpec {
    type Status = SecretStatus;
    type Header = SecretHeader;

    fn metadata() -> &'static Crd {
        &SECRET_API
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct SecretStatus {}

impl Status for SecretStatus {}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SecretHeader {
    /// base64 encoded values
    pub data: BTreeMap<String, String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
}

impl Header for SecretHeader {}

impl SecretHeader {
    /// decoded value, `None` if the key is absent
    pub fn decoded(&self, key: &str) -> Option<Result<Vec<u8>, base64::DecodeError>> {
        self.data.get(key).map(|value| STANDARD.decode(value.trim()))
    }

    pub fn insert_encoded(&mut self, key: impl Into<String>, value: impl AsRef<[u8]>) {
        self.data.insert(key.into(), STANDARD.encode(value));
    }
}

#[cfg(test)]
mod test {

    use super::SecretObj;

    #[test]
    fn test_decode_secret() {
        let raw = r#"{"apiVersion":"v1","kind":"Secret",
            "metadata":{"name":"member-1","namespace":"toolchain-host-operator","annotations":{"url":"https://member-1:6443"}},
            "type":"Opaque",
            "data":{"token":"c2VjcmV0","ca.crt":"LS0tLS1CRUdJTg=="}}"#;
        let secret: SecretObj = serde_json::from_str(raw).expect("decode");
        assert_eq!(secret.header.type_.as_deref(), Some("Opaque"));
        let token = secret.header.decoded("token").expect("present").expect("base64");
        assert_eq!(token, b"secret");
        assert!(secret.header.decoded("missing").is_none());
    }
}
