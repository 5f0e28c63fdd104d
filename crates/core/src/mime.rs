//! MIME types accepted for image and document content blocks.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mime {
    Pdf,
    Csv,
    Doc,
    Docx,
    Xls,
    Xlsx,
    Html,
    Txt,
    Md,
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl Mime {
    pub fn from_mime_type(mime_type: &str) -> Option<Self> {
        let mime = match mime_type.trim().to_ascii_lowercase().as_str() {
            "application/pdf" => Self::Pdf,
            "text/csv" => Self::Csv,
            "application/msword" => Self::Doc,
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => Self::Docx,
            "application/vnd.ms-excel" => Self::Xls,
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => Self::Xlsx,
            "text/html" => Self::Html,
            "text/plain" => Self::Txt,
            "text/markdown" => Self::Md,
            "image/png" => Self::Png,
            "image/jpeg" => Self::Jpeg,
            "image/gif" => Self::Gif,
            "image/webp" => Self::Webp,
            _ => return None,
        };
        Some(mime)
    }

    /// The `format` value Bedrock expects in image/document blocks.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Csv => "csv",
            Self::Doc => "doc",
            Self::Docx => "docx",
            Self::Xls => "xls",
            Self::Xlsx => "xlsx",
            Self::Html => "html",
            Self::Txt => "txt",
            Self::Md => "md",
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
            Self::Webp => "webp",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_types_to_extensions() {
        assert_eq!(Mime::from_mime_type("application/pdf").map(Mime::extension), Some("pdf"));
        assert_eq!(Mime::from_mime_type("IMAGE/JPEG").map(Mime::extension), Some("jpeg"));
        assert_eq!(
            Mime::from_mime_type(
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            )
            .map(Mime::extension),
            Some("xlsx")
        );
    }

    #[test]
    fn unknown_type_is_none() {
        assert!(Mime::from_mime_type("video/mp4").is_none());
    }
}
