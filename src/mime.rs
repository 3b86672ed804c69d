use std::path::Path;

/// MIME type table indexed by enum discriminant instead of a hash map lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MimeType {
    Html = 0,
    Css = 1,
    Javascript = 2,
    Json = 3,
    Xml = 4,
    Xhtml = 5,
    PlainText = 6,
    Icon = 7,
    Png = 8,
    Jpeg = 9,
    Gif = 10,
    Svg = 11,
    Pdf = 12,
    Doc = 13,
    Woff = 14,
    Woff2 = 15,
    Ttf = 16,
    Eot = 17,
    OctetStream = 18,
}

impl MimeType {
    const MIME_STRINGS: [&'static str; 19] = [
        "text/html; charset=utf-8",
        "text/css; charset=utf-8",
        "application/javascript; charset=utf-8",
        "application/json; charset=utf-8",
        "application/xml; charset=utf-8",
        "application/xhtml+xml; charset=utf-8",
        "text/plain; charset=utf-8",
        "image/x-icon",
        "image/png",
        "image/jpeg",
        "image/gif",
        "image/svg+xml",
        "application/pdf",
        "application/msword",
        "font/woff",
        "font/woff2",
        "font/ttf",
        "application/vnd.ms-fontobject",
        "application/octet-stream",
    ];

    pub fn as_str(self) -> &'static str {
        Self::MIME_STRINGS[self as usize]
    }

    /// Whether responses of this type are eligible for compression, mirroring
    /// the original server's prefix-based allowlist (text/*, a handful of
    /// application/* subtypes, svg, and font types).
    pub fn is_compressible(self) -> bool {
        !matches!(
            self,
            MimeType::Png
                | MimeType::Jpeg
                | MimeType::Gif
                | MimeType::Pdf
                | MimeType::Doc
                | MimeType::OctetStream
        )
    }
}

pub fn get_mime_type_enum(file_path: &Path) -> MimeType {
    if let Some(extension) = file_path.extension().and_then(|s| s.to_str()) {
        match extension.to_ascii_lowercase().as_str() {
            "html" | "htm" => MimeType::Html,
            "css" => MimeType::Css,
            "js" | "mjs" => MimeType::Javascript,
            "json" => MimeType::Json,
            "xml" => MimeType::Xml,
            "xhtml" => MimeType::Xhtml,
            "txt" => MimeType::PlainText,
            "ico" => MimeType::Icon,
            "png" => MimeType::Png,
            "jpg" | "jpeg" => MimeType::Jpeg,
            "gif" => MimeType::Gif,
            "svg" => MimeType::Svg,
            "pdf" => MimeType::Pdf,
            "doc" | "docx" => MimeType::Doc,
            "woff" => MimeType::Woff,
            "woff2" => MimeType::Woff2,
            "ttf" => MimeType::Ttf,
            "eot" => MimeType::Eot,
            _ => MimeType::OctetStream,
        }
    } else {
        MimeType::OctetStream
    }
}

pub fn get_mime_type(file_path: &str) -> &'static str {
    get_mime_type_enum(Path::new(file_path)).as_str()
}

/// Cache-Control policy by file extension, matching the handler's
/// extension-keyed table (images immutable for a week, CSS/JS a day,
/// HTML short-lived, everything else an hour).
pub fn cache_control_for(mime: MimeType) -> &'static str {
    match mime {
        MimeType::Css | MimeType::Javascript => "public, max-age=86400, must-revalidate",
        MimeType::Png | MimeType::Jpeg | MimeType::Gif | MimeType::Svg | MimeType::Icon => {
            "public, max-age=604800, immutable"
        }
        MimeType::Html | MimeType::Xhtml => "public, max-age=300, must-revalidate",
        MimeType::Pdf | MimeType::Doc => "public, max-age=86400",
        _ => "public, max-age=3600",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn detects_common_extensions() {
        assert_eq!(get_mime_type_enum(Path::new("a.html")), MimeType::Html);
        assert_eq!(get_mime_type_enum(Path::new("a.CSS")), MimeType::Css);
        assert_eq!(get_mime_type_enum(Path::new("a.unknownext")), MimeType::OctetStream);
    }

    #[test]
    fn compressible_excludes_binary_types() {
        assert!(MimeType::Html.is_compressible());
        assert!(MimeType::Svg.is_compressible());
        assert!(!MimeType::Png.is_compressible());
        assert!(!MimeType::OctetStream.is_compressible());
    }
}
