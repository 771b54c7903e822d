use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::session::Material;

const TRAILING_DIRECTIVE: &str =
    "Create the quiz from the material above. Output only the JSON object described in the instructions.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// One part of a generation request, shaped like a Gemini `Part`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UploadKind {
    PlainText,
    Jpeg,
    Png,
}

#[derive(Clone, Debug)]
pub struct ContentService {
    min_text_chars: usize,
}

impl ContentService {
    pub fn new(min_text_chars: usize) -> Self {
        Self { min_text_chars }
    }

    pub fn min_text_chars(&self) -> usize {
        self.min_text_chars
    }

    /// Length is counted in characters, not bytes, so Japanese text is not
    /// favoured over ASCII.
    pub fn validate_text(&self, text: &str) -> Result<String> {
        let trimmed = text.trim();
        let chars = trimmed.chars().count();
        if chars < self.min_text_chars {
            return Err(Error::BadRequest(format!(
                "Study material must be at least {} characters long (got {})",
                self.min_text_chars, chars
            )));
        }
        Ok(trimmed.to_string())
    }

    pub fn pasted_text(&self, text: &str) -> Result<Material> {
        Ok(Material::Text {
            body: self.validate_text(text)?,
            file_name: None,
        })
    }

    pub fn material_from_upload(
        &self,
        file_name: Option<&str>,
        content_type: Option<&str>,
        data: Bytes,
    ) -> Result<Material> {
        if data.is_empty() {
            return Err(Error::BadRequest("Uploaded file is empty".to_string()));
        }

        let kind = detect_kind(file_name, content_type).ok_or_else(|| {
            Error::BadRequest(
                "Only .txt files and JPEG/PNG images are supported".to_string(),
            )
        })?;
        let file_name = file_name.map(str::to_string);

        match kind {
            UploadKind::PlainText => {
                let text = std::str::from_utf8(&data).map_err(|_| {
                    Error::BadRequest("Text file must be UTF-8 encoded".to_string())
                })?;
                Ok(Material::Text {
                    body: self.validate_text(text)?,
                    file_name,
                })
            }
            UploadKind::Jpeg | UploadKind::Png => {
                let expected = if kind == UploadKind::Png { "image/png" } else { "image/jpeg" };
                if sniff_image(&data) != Some(expected) {
                    return Err(Error::BadRequest(
                        "Uploaded image could not be read as JPEG or PNG".to_string(),
                    ));
                }
                Ok(Material::Image {
                    mime_type: expected.to_string(),
                    data,
                    file_name,
                })
            }
        }
    }

    /// Instruction first, then the material, then a short closing directive.
    pub fn assemble(&self, instruction: &str, material: &Material) -> Vec<ContentPart> {
        let body = match material {
            Material::Text { body, .. } => {
                ContentPart::text(format!("Study material:\n\n{}", body))
            }
            Material::Image {
                mime_type, data, ..
            } => ContentPart::InlineData {
                inline_data: InlineData {
                    mime_type: mime_type.clone(),
                    data: BASE64.encode(data),
                },
            },
        };

        vec![
            ContentPart::text(instruction),
            body,
            ContentPart::text(TRAILING_DIRECTIVE),
        ]
    }
}

fn detect_kind(file_name: Option<&str>, content_type: Option<&str>) -> Option<UploadKind> {
    let by_type = content_type.and_then(|ct| {
        match ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase().as_str() {
            "text/plain" => Some(UploadKind::PlainText),
            "image/jpeg" | "image/jpg" => Some(UploadKind::Jpeg),
            "image/png" => Some(UploadKind::Png),
            _ => None,
        }
    });
    if by_type.is_some() {
        return by_type;
    }

    let ext = file_name
        .and_then(|n| std::path::Path::new(n).extension())
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("txt") => Some(UploadKind::PlainText),
        Some("jpg") | Some("jpeg") => Some(UploadKind::Jpeg),
        Some("png") => Some(UploadKind::Png),
        _ => None,
    }
}

fn sniff_image(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else {
        None
    }
}
