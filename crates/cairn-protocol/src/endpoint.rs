use cairn_types::ObjectHash;

/// HTTP endpoint paths for the mirror protocol.
pub mod endpoints {
    pub const HEALTH: &str = "/v1/health";
    pub const INFO: &str = "/v1/info";
    /// `POST` a batch here.
    pub const OBJECTS: &str = "/v1/objects";
    /// Route pattern for fetching one record.
    pub const OBJECT: &str = "/v1/objects/:hash";
}

/// Path for fetching the record with `hash`.
pub fn object_path(hash: &ObjectHash) -> String {
    format!("{}/{}", endpoints::OBJECTS, hash.to_hex())
}

/// Health check response.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub protocol_version: u32,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            protocol_version: super::message::PROTOCOL_VERSION,
        }
    }
}

/// Describes the transport a server exposes.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct InfoResponse {
    /// Name of the backing transport.
    pub transport: String,
    pub protocol_version: u32,
    pub max_batch_objects: usize,
    pub auth: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_response_defaults() {
        let h = HealthResponse::default();
        assert_eq!(h.status, "ok");
        assert_eq!(h.protocol_version, 1);
    }

    #[test]
    fn endpoint_paths() {
        assert_eq!(endpoints::HEALTH, "/v1/health");
        assert_eq!(endpoints::INFO, "/v1/info");
        assert_eq!(endpoints::OBJECTS, "/v1/objects");
    }

    #[test]
    fn object_path_uses_full_hex() {
        let hash = ObjectHash::from_bytes(b"x");
        assert_eq!(object_path(&hash), format!("/v1/objects/{}", hash.to_hex()));
    }
}
