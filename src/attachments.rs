use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tracing::debug;
use url::Url;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "svg"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "webm", "mkv", "wmv", "flv"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "flac", "m4a", "aac"];
const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "txt", "zip", "rar", "7z"];
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "json", "xml", "html", "css", "js"];

/// Category an attachment falls into, derived from its filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Image,
    Video,
    Audio,
    Text,
    Document,
    Unknown,
}

impl FileType {
    /// Order in which the extension table is consulted when MIME lookup fails.
    /// `txt` appears under both text and document; text wins.
    const FALLBACK_ORDER: [FileType; 5] = [
        FileType::Image,
        FileType::Video,
        FileType::Audio,
        FileType::Text,
        FileType::Document,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FileType::Image => "image",
            FileType::Video => "video",
            FileType::Audio => "audio",
            FileType::Text => "text",
            FileType::Document => "document",
            FileType::Unknown => "unknown",
        }
    }

    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            FileType::Image => IMAGE_EXTENSIONS,
            FileType::Video => VIDEO_EXTENSIONS,
            FileType::Audio => AUDIO_EXTENSIONS,
            FileType::Text => TEXT_EXTENSIONS,
            FileType::Document => DOCUMENT_EXTENSIONS,
            FileType::Unknown => &[],
        }
    }

    /// Parses the `file_type` query option. `all`, `unknown` and anything
    /// unrecognised mean "no restriction" and map to `None`.
    pub fn from_filter(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "image" => Some(FileType::Image),
            "video" => Some(FileType::Video),
            "audio" => Some(FileType::Audio),
            "document" => Some(FileType::Document),
            "text" => Some(FileType::Text),
            _ => None,
        }
    }

    fn from_mime(mime: &str) -> Self {
        match mime.split('/').next().unwrap_or_default() {
            "image" => FileType::Image,
            "video" => FileType::Video,
            "audio" => FileType::Audio,
            "text" => FileType::Text,
            _ => FileType::Document,
        }
    }

    fn from_extension(ext: &str) -> Self {
        Self::FALLBACK_ORDER
            .into_iter()
            .find(|ft| ft.extensions().contains(&ext))
            .unwrap_or(FileType::Unknown)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub url: String,
    pub filename: String,
    pub file_type: FileType,
}

impl Attachment {
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            filename: filename_from_url(&url),
            file_type: classify(&url),
            url,
        }
    }

    fn from_descriptor(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => {
                let field = |key: &str| {
                    map.get(key)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                };
                let url = field("url");
                Some(Self {
                    filename: field("filename"),
                    file_type: classify(&url),
                    url,
                })
            }
            Value::String(url) => Some(Self::from_url(url)),
            Value::Null => None,
            other => Some(Self::from_url(other.to_string())),
        }
    }
}

/// The stored `attachments` column, resolved into one of its possible shapes.
#[derive(Debug, PartialEq)]
pub enum RawAttachments<'a> {
    Empty,
    Url(&'a str),
    List(Vec<Value>),
}

impl<'a> RawAttachments<'a> {
    pub fn parse(raw: &'a str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return RawAttachments::Empty;
        }

        if trimmed.starts_with('[') {
            match serde_json::from_str::<Vec<Value>>(trimmed) {
                Ok(items) => return RawAttachments::List(items),
                Err(e) => debug!("Attachments: not a JSON list, using as URL: {}", e),
            }
        }

        RawAttachments::Url(trimmed)
    }

    pub fn into_attachments(self) -> Vec<Attachment> {
        match self {
            RawAttachments::Empty => Vec::new(),
            RawAttachments::Url(url) => vec![Attachment::from_url(url)],
            RawAttachments::List(items) => items
                .into_iter()
                .filter_map(Attachment::from_descriptor)
                .collect(),
        }
    }
}

/// Turns a raw `attachments` value into attachment records. Never fails.
pub fn normalize(raw: &str) -> Vec<Attachment> {
    RawAttachments::parse(raw).into_attachments()
}

/// Last segment of the URL path, without query string or fragment.
pub fn filename_from_url(url: &str) -> String {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    path.rsplit('/').next().unwrap_or_default().to_string()
}

pub fn classify(url: &str) -> FileType {
    let filename = filename_from_url(url.trim());
    if filename.is_empty() {
        return FileType::Unknown;
    }

    if let Some(mime) = mime_guess::from_path(&filename).first_raw() {
        return FileType::from_mime(mime);
    }

    Path::new(&filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FileType::from_extension(&ext.to_ascii_lowercase()))
        .unwrap_or(FileType::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("https://x.com/a.png", FileType::Image)]
    #[test_case("https://cdn.example.com/attachments/1/2/IMG_01.JPG?ex=abc", FileType::Image)]
    #[test_case("https://x.com/clip.mp4", FileType::Video)]
    #[test_case("https://x.com/clip.mkv", FileType::Video)]
    #[test_case("https://x.com/b.mp3", FileType::Audio)]
    #[test_case("https://x.com/voice.flac", FileType::Audio)]
    #[test_case("https://x.com/notes.txt", FileType::Text)]
    #[test_case("https://x.com/a.pdf", FileType::Document)]
    #[test_case("https://x.com/archive.7z", FileType::Document)]
    #[test_case("https://x.com/download", FileType::Unknown)]
    #[test_case("", FileType::Unknown)]
    fn test_classify(url: &str, expected: FileType) {
        assert_eq!(classify(url), expected);
    }

    #[test]
    fn test_extension_fallback_prefers_text_for_txt() {
        assert_eq!(FileType::from_extension("txt"), FileType::Text);
        assert_eq!(FileType::from_extension("rar"), FileType::Document);
        assert_eq!(FileType::from_extension("exe"), FileType::Unknown);
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(filename_from_url("https://x.com/a/b/c.png?size=10#frag"), "c.png");
        assert_eq!(filename_from_url("not a url/file.gif?x=1"), "file.gif");
        assert_eq!(filename_from_url("https://x.com/"), "");
    }

    #[test]
    fn test_single_url() {
        let attachments = normalize("https://x.com/a.png");
        assert_eq!(
            attachments,
            vec![Attachment {
                url: "https://x.com/a.png".to_string(),
                filename: "a.png".to_string(),
                file_type: FileType::Image,
            }]
        );
    }

    #[test]
    fn test_mixed_json_list() {
        let raw = r#"[{"url":"https://x.com/a.pdf","filename":"a.pdf"},"https://x.com/b.mp3"]"#;
        let attachments = normalize(raw);
        assert_eq!(attachments.len(), 2);
        assert_eq!(attachments[0].filename, "a.pdf");
        assert_eq!(attachments[0].file_type, FileType::Document);
        assert_eq!(attachments[1].url, "https://x.com/b.mp3");
        assert_eq!(attachments[1].filename, "b.mp3");
        assert_eq!(attachments[1].file_type, FileType::Audio);
    }

    #[test]
    fn test_descriptor_missing_keys_default_to_empty() {
        let attachments = normalize(r#"[{"filename":"x.png"}]"#);
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].url, "");
        assert_eq!(attachments[0].filename, "x.png");
        assert_eq!(attachments[0].file_type, FileType::Unknown);
    }

    #[test]
    fn test_empty_and_blank() {
        assert!(normalize("").is_empty());
        assert!(normalize("   ").is_empty());
        assert_eq!(RawAttachments::parse(""), RawAttachments::Empty);
    }

    #[test]
    fn test_malformed_json_falls_back_to_url() {
        let raw = "[not json https://x.com/a.png";
        assert_eq!(RawAttachments::parse(raw), RawAttachments::Url(raw));
        let attachments = normalize(raw);
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].url, raw);
    }

    #[test]
    fn test_filter_values() {
        assert_eq!(FileType::from_filter("image"), Some(FileType::Image));
        assert_eq!(FileType::from_filter("TEXT"), Some(FileType::Text));
        assert_eq!(FileType::from_filter("all"), None);
        assert_eq!(FileType::from_filter("unknown"), None);
        assert_eq!(FileType::from_filter("spreadsheet"), None);
    }

    #[test]
    fn test_file_type_serializes_lowercase() {
        let json = serde_json::to_string(&FileType::Document).unwrap();
        assert_eq!(json, "\"document\"");
    }
}
