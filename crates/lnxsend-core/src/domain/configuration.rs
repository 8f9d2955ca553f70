//! Server-pushed configuration
//!
//! The account service tunes client behavior at runtime: once in the login
//! response (as a feature map) and afterwards through configuration-update
//! notifications carrying a *partial* JSON object. Only the keys present in
//! a patch are overwritten; everything else keeps its current value.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Chunking parameters for buffered cloud uploads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipartUpload {
    pub chunk_size: u64,
    pub parallelism: u32,
}

impl Default for MultipartUpload {
    fn default() -> Self {
        Self {
            chunk_size: 5 * 1024 * 1024,
            parallelism: 4,
        }
    }
}

/// Cloud-buffer storage parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Settings {
    pub multipart_upload: MultipartUpload,
}

/// The merged runtime configuration held by the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub s3: S3Settings,
    /// Files up to this size are mirrored locally before sending
    pub max_mirror_size: u64,
    /// Files up to this size are compressed before sending
    pub max_compress_size: u64,
    pub disable_upnp: bool,
    /// Free-form feature flags forwarded from the server
    pub features: HashMap<String, String>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            s3: S3Settings::default(),
            max_mirror_size: 100 * 1024 * 1024,
            max_compress_size: 10 * 1024 * 1024,
            disable_upnp: false,
            features: HashMap::new(),
        }
    }
}

impl Configuration {
    /// Merges a partial JSON object into this configuration
    ///
    /// Keys absent from the patch keep their value; unknown keys are
    /// ignored so older clients survive newer servers. Feature flags merge
    /// key-by-key rather than replacing the whole map.
    pub fn apply_patch(&mut self, patch: &Value) {
        let Some(object) = patch.as_object() else {
            return;
        };
        if let Some(size) = object.get("max_mirror_size").and_then(Value::as_u64) {
            self.max_mirror_size = size;
        }
        if let Some(size) = object.get("max_compress_size").and_then(Value::as_u64) {
            self.max_compress_size = size;
        }
        if let Some(flag) = object.get("disable_upnp").and_then(Value::as_bool) {
            self.disable_upnp = flag;
        }
        if let Some(upload) = object
            .get("s3")
            .and_then(|s3| s3.get("multipart_upload"))
            .and_then(Value::as_object)
        {
            if let Some(size) = upload.get("chunk_size").and_then(Value::as_u64) {
                self.s3.multipart_upload.chunk_size = size;
            }
            if let Some(parallelism) = upload.get("parallelism").and_then(Value::as_u64) {
                self.s3.multipart_upload.parallelism = parallelism as u32;
            }
        }
        if let Some(features) = object.get("features").and_then(Value::as_object) {
            for (key, value) in features {
                if let Some(value) = value.as_str() {
                    self.features.insert(key.clone(), value.to_string());
                }
            }
        }
    }

    /// Replaces the feature map wholesale (login response form)
    pub fn set_features(&mut self, features: HashMap<String, String>) {
        self.features = features;
    }
}
