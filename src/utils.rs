use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

pub const FALLBACK_MIME: &str = "application/octet-stream";
const DOWNLOAD_SUFFIX: &str = "_cleansed";

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

pub fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else {
        None
    }
}

/// Extension first, then content, then [`FALLBACK_MIME`].
pub fn detect_mime(path: &Path, bytes: &[u8]) -> &'static str {
    mime_for_path(path)
        .or_else(|| sniff_image_mime(bytes))
        .unwrap_or(FALLBACK_MIME)
}

pub fn to_data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, BASE64.encode(bytes))
}

/// Everything after the first comma of a data URI.
pub fn data_uri_payload(data_uri: &str) -> Option<&str> {
    data_uri.split_once(',').map(|(_, payload)| payload)
}

pub fn decode_data_uri(data_uri: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let payload = data_uri_payload(data_uri).unwrap_or(data_uri);
    BASE64.decode(payload.as_bytes())
}

/// `photo.png` -> `photo_cleansed.png`. Names without a dot get the suffix appended.
pub fn download_name(original: &str) -> String {
    match original.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}{DOWNLOAD_SUFFIX}.{ext}"),
        None => format!("{original}{DOWNLOAD_SUFFIX}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_name() {
        assert_eq!(download_name("photo.png"), "photo_cleansed.png");
        assert_eq!(download_name("holiday.2024.jpeg"), "holiday.2024_cleansed.jpeg");
        assert_eq!(download_name("README"), "README_cleansed");
        assert_eq!(download_name(".png"), "_cleansed.png");
    }

    #[test]
    fn test_mime_detection() {
        assert_eq!(mime_for_path(Path::new("a/b/Cat.JPG")), Some("image/jpeg"));
        assert_eq!(mime_for_path(Path::new("noext")), None);

        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];
        assert_eq!(detect_mime(Path::new("upload.bin"), &png), "image/png");
        assert_eq!(detect_mime(Path::new("upload.bin"), b"plain"), FALLBACK_MIME);
        assert_eq!(sniff_image_mime(b"RIFF\0\0\0\0WEBPVP8 "), Some("image/webp"));
    }

    #[test]
    fn test_data_uri_helpers() {
        let uri = to_data_uri("image/png", b"hello");
        assert_eq!(uri, "data:image/png;base64,aGVsbG8=");
        assert_eq!(data_uri_payload(&uri), Some("aGVsbG8="));
        assert_eq!(decode_data_uri(&uri).unwrap(), b"hello");
        assert_eq!(data_uri_payload("no-comma"), None);
    }
}
