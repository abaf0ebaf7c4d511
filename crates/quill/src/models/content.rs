use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextContent {
    pub text: String,
}

/// Binary content attached to a message, e.g. an uploaded pdf or audio recording
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileContent {
    pub mime_type: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl FileContent {
    pub fn new<M: Into<String>>(mime_type: M, data: Vec<u8>, filename: Option<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
            filename,
        }
    }

    /// The attachment bytes encoded as standard base64, the way providers accept inline data
    pub fn base64_data(&self) -> String {
        STANDARD.encode(&self.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// The raw bytes can be megabytes long, keep them out of debug logs
impl std::fmt::Debug for FileContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileContent")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .field("filename", &self.filename)
            .finish()
    }
}

/// An image produced by the model, already base64 encoded by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageContent {
    pub mime_type: String,
    #[serde(rename = "base64Data")]
    pub data: String,
}

impl ImageContent {
    pub fn new<M: Into<String>, D: Into<String>>(mime_type: M, data: D) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_file_content_serializes_data_as_base64() {
        let file = FileContent::new("application/pdf", b"%PDF".to_vec(), Some("a.pdf".into()));
        let value = serde_json::to_value(&file).unwrap();
        assert_eq!(
            value,
            json!({"mimeType": "application/pdf", "data": "JVBERg==", "filename": "a.pdf"})
        );

        let back: FileContent = serde_json::from_value(value).unwrap();
        assert_eq!(back.data, b"%PDF");
    }

    #[test]
    fn test_file_content_debug_hides_bytes() {
        let file = FileContent::new("audio/mpeg", vec![7; 1024], None);
        let debug = format!("{:?}", file);
        assert!(debug.contains("len: 1024"));
        assert!(!debug.contains("7, 7"));
    }

    #[test]
    fn test_image_content_uses_base64_data_key() {
        let image = ImageContent::new("image/png", "iVBORw0KGgo=");
        assert_eq!(
            serde_json::to_value(&image).unwrap(),
            json!({"mimeType": "image/png", "base64Data": "iVBORw0KGgo="})
        );
    }
}
