use std::time::Duration;

use envconfig::Envconfig;
use kvr_backend::CredentialKeys;

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(from = "KVR_HTTP_PORT", default = "3000")]
    pub http_port: u16,
    #[envconfig(from = "KVR_WS_PATH", default = "/ws")]
    pub ws_path: String,
    #[envconfig(from = "KVR_NODE_PREFIX", default = "amazin-object-storage-node")]
    pub node_prefix: String,
    #[envconfig(
        from = "KVR_NODE_NETWORK",
        default = "homework-object-storage-ws_amazin-object-storage"
    )]
    pub node_network: String,
    #[envconfig(from = "KVR_NODE_PORT", default = "9000")]
    pub node_port: u16,
    #[envconfig(from = "KVR_BUCKET", default = "homework")]
    pub bucket: String,
    #[envconfig(from = "KVR_ACCESS_KEY_ENV", default = "MINIO_ACCESS_KEY")]
    pub access_key_env: String,
    #[envconfig(from = "KVR_SECRET_KEY_ENV", default = "MINIO_SECRET_KEY")]
    pub secret_key_env: String,
    #[envconfig(from = "KVR_NODE_REGION", default = "us-east-1")]
    pub node_region: String,
    #[envconfig(from = "KVR_DOCKER_SOCKET")]
    pub docker_socket: Option<String>,
    #[envconfig(from = "KVR_BACKEND_TIMEOUT_MS", default = "10000")]
    pub backend_timeout_ms: u64,
    #[envconfig(from = "KVR_SHUTDOWN_GRACE_MS", default = "5000")]
    pub shutdown_grace_ms: u64,
    /// `json` for structured output, plain text otherwise.
    #[envconfig(from = "KVR_LOG_FORMAT")]
    pub log_format: Option<String>,
}

impl Config {
    pub fn credential_keys(&self) -> CredentialKeys {
        CredentialKeys {
            access: self.access_key_env.clone(),
            secret: self.secret_key_env.clone(),
        }
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn json_logs(&self) -> bool {
        matches!(
            self.log_format.as_deref().map(str::to_ascii_lowercase).as_deref(),
            Some("json") | Some("structured")
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_match_storage_deployment() {
        let conf = Config::init_from_hashmap(&HashMap::new()).unwrap();
        assert_eq!(conf.http_port, 3000);
        assert_eq!(conf.ws_path, "/ws");
        assert_eq!(conf.node_prefix, "amazin-object-storage-node");
        assert_eq!(conf.node_port, 9000);
        assert_eq!(conf.bucket, "homework");
        assert_eq!(conf.credential_keys(), CredentialKeys::default());
        assert_eq!(conf.backend_timeout(), Duration::from_secs(10));
        assert!(conf.docker_socket.is_none());
        assert!(!conf.json_logs());
    }

    #[test]
    fn reads_overrides() {
        let env = HashMap::from([
            ("KVR_HTTP_PORT".to_string(), "8081".to_string()),
            ("KVR_BACKEND_TIMEOUT_MS".to_string(), "250".to_string()),
            ("KVR_LOG_FORMAT".to_string(), "JSON".to_string()),
        ]);
        let conf = Config::init_from_hashmap(&env).unwrap();
        assert_eq!(conf.http_port, 8081);
        assert_eq!(conf.backend_timeout(), Duration::from_millis(250));
        assert!(conf.json_logs());
    }

    #[test]
    fn rejects_invalid_port() {
        let env =
            HashMap::from([("KVR_HTTP_PORT".to_string(), "http".to_string())]);
        assert!(Config::init_from_hashmap(&env).is_err());
    }
}
