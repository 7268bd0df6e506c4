use serde::{Deserialize, Serialize};

/// The file a record refers to.
///
/// Field order is lexicographic (`file_id` < `file_name`) so the derived
/// [`Serialize`] impl already emits the canonical key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub file_id: String,
    pub file_name: String,
}

/// The user a record refers to. Field order is lexicographic, as above.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub user_id: String,
    pub user_name: String,
}

/// Opaque access-type value (e.g. `READ`, `WRITE`). The core never
/// interprets this beyond copying it through; the value domain belongs to
/// callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessType(pub String);

impl std::fmt::Display for AccessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A signed, client-submitted file-access record.
///
/// `req_id` is the cluster-wide dedup key. `signature`/`public_key` cover
/// the [`canonical_json`] encoding of everything else; they are not part of
/// that encoding themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
    pub req_id: String,
    pub file_info: FileInfo,
    pub user_info: UserInfo,
    pub access_type: AccessType,
    /// Milliseconds since the Unix epoch. Used only for deterministic
    /// ordering and logging — never reinterpreted as wall-clock truth.
    pub timestamp: i64,
    /// Base64-encoded RSA PKCS#1 v1.5 signature over [`canonical_json`].
    pub signature: String,
    /// PEM-encoded RSA public key.
    pub public_key: String,
}

/// The subset of [`Audit`] that is signed and hashed, with fields declared
/// in lexicographic key order: `access_type`, `file_info`, `req_id`,
/// `timestamp`, `user_info`.
#[derive(Serialize)]
struct CanonicalAudit<'a> {
    access_type: &'a str,
    file_info: &'a FileInfo,
    req_id: &'a str,
    timestamp: i64,
    user_info: &'a UserInfo,
}

/// Byte-identical canonical JSON for signing and leaf hashing: lexicographic
/// key order (including nested objects), no whitespace, UTF-8.
///
/// This is the interoperability spine across replicas — any deviation here
/// (key order, whitespace, field type) breaks cross-replica hash agreement.
pub fn canonical_json(audit: &Audit) -> String {
    let view = CanonicalAudit {
        access_type: &audit.access_type.0,
        file_info: &audit.file_info,
        req_id: &audit.req_id,
        timestamp: audit.timestamp,
        user_info: &audit.user_info,
    };
    serde_json::to_string(&view).expect("canonical audit view always serializes")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Audit {
        Audit {
            req_id: "a".to_string(),
            file_info: FileInfo {
                file_id: "f1".to_string(),
                file_name: "report.pdf".to_string(),
            },
            user_info: UserInfo {
                user_id: "u1".to_string(),
                user_name: "alice".to_string(),
            },
            access_type: AccessType("READ".to_string()),
            timestamp: 100,
            signature: "sig".to_string(),
            public_key: "pem".to_string(),
        }
    }

    #[test]
    fn canonical_key_order_and_no_whitespace() {
        let json = canonical_json(&sample());
        assert_eq!(
            json,
            r#"{"access_type":"READ","file_info":{"file_id":"f1","file_name":"report.pdf"},"req_id":"a","timestamp":100,"user_info":{"user_id":"u1","user_name":"alice"}}"#
        );
    }

    #[test]
    fn canonical_json_is_deterministic() {
        let a = sample();
        assert_eq!(canonical_json(&a), canonical_json(&a));
    }
}
