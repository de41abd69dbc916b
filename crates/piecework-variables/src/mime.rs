/// Media type -> file extension.
const EXTENSIONS: &[(&str, &str)] = &[
  ("application/gzip", "gz"),
  ("application/json", "json"),
  ("application/msword", "doc"),
  ("application/octet-stream", "bin"),
  ("application/pdf", "pdf"),
  ("application/rtf", "rtf"),
  ("application/vnd.ms-excel", "xls"),
  ("application/vnd.ms-powerpoint", "ppt"),
  (
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "pptx",
  ),
  (
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "xlsx",
  ),
  (
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "docx",
  ),
  ("application/x-tar", "tar"),
  ("application/xml", "xml"),
  ("application/zip", "zip"),
  ("audio/mpeg", "mp3"),
  ("audio/ogg", "ogg"),
  ("audio/wav", "wav"),
  ("audio/webm", "weba"),
  ("image/bmp", "bmp"),
  ("image/gif", "gif"),
  ("image/jpeg", "jpg"),
  ("image/jpg", "jpg"),
  ("image/png", "png"),
  ("image/svg+xml", "svg"),
  ("image/tiff", "tiff"),
  ("image/webp", "webp"),
  ("image/x-icon", "ico"),
  ("text/calendar", "ics"),
  ("text/css", "css"),
  ("text/csv", "csv"),
  ("text/html", "html"),
  ("text/javascript", "js"),
  ("text/markdown", "md"),
  ("text/plain", "txt"),
  ("text/xml", "xml"),
  ("video/mp4", "mp4"),
  ("video/mpeg", "mpeg"),
  ("video/quicktime", "mov"),
  ("video/webm", "webm"),
];

/// Infer a file extension from a media type such as `image/png` or
/// `text/plain; charset=utf-8`. Unknown types map to `bin`.
pub fn extension_for_media_type(media_type: &str) -> &'static str {
  let essence = media_type
    .split(';')
    .next()
    .unwrap_or_default()
    .trim()
    .to_ascii_lowercase();

  EXTENSIONS
    .iter()
    .find(|(mime, _)| *mime == essence)
    .map(|(_, ext)| *ext)
    .unwrap_or("bin")
}
