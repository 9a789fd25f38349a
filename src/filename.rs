//! Filename resolution for downloaded results
//!
//! Order of precedence:
//! 1. `Content-Disposition` filename (extended `filename*=` form preferred)
//! 2. Last path segment of the fetched URL
//! 3. A fixed fallback
//!
//! Names without an extension get one from the declared content type.

use url::Url;

/// Name used when neither the headers nor the URL provide one
pub const DEFAULT_FILENAME: &str = "download";

pub const AUDIO_EXTENSION: &str = "mp3";
pub const VIDEO_EXTENSION: &str = "mp4";

/// Filename extracted from a `Content-Disposition` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispositionFilename {
    pub name: String,
    /// Came from the RFC 5987 `filename*=` parameter
    pub extended: bool,
}

/// Parse the filename out of a `Content-Disposition` header value.
///
/// Handles `filename="a b.mp4"`, `filename=a.mp4`, single quotes and
/// `filename*=UTF-8''a%20b.mp4`. Returns `None` when no usable filename
/// parameter is present.
pub fn parse_content_disposition(header: &str) -> Option<DispositionFilename> {
    let mut plain = None;
    let mut extended = None;

    for param in split_params(header) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();

        match key.as_str() {
            "filename*" => {
                let encoded = unquote(value);
                // charset'language'value
                let encoded = match encoded.find("''") {
                    Some(idx) => &encoded[idx + 2..],
                    None => encoded,
                };
                let decoded = urlencoding::decode(encoded)
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|_| encoded.to_string());
                if !decoded.trim().is_empty() {
                    extended = Some(decoded);
                }
            }
            "filename" => {
                let name = unquote(value).replace("\\\"", "\"");
                if !name.trim().is_empty() {
                    plain = Some(name);
                }
            }
            _ => {}
        }
    }

    extended
        .map(|name| DispositionFilename {
            name,
            extended: true,
        })
        .or_else(|| {
            plain.map(|name| DispositionFilename {
                name,
                extended: false,
            })
        })
}

/// Split header parameters on `;`, ignoring separators inside double quotes
fn split_params(header: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in header.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                params.push(&header[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(&header[start..]);
    params
}

fn unquote(value: &str) -> &str {
    let value = value.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = value.strip_prefix(quote) {
            return inner.strip_suffix(quote).unwrap_or(inner);
        }
    }
    value
}

/// Last non-empty path segment of a URL, percent-decoded
pub fn filename_from_url(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    Some(decoded).filter(|s| !s.trim().is_empty())
}

/// A name has an extension when it contains a dot that is neither leading nor trailing
pub fn has_extension(name: &str) -> bool {
    match name.rfind('.') {
        Some(idx) => idx > 0 && idx + 1 < name.len(),
        None => false,
    }
}

/// Extension to use for a declared content type
pub fn extension_for_content_type(content_type: Option<&str>) -> &'static str {
    match content_type {
        Some(ct) if ct.to_ascii_lowercase().contains("audio") => AUDIO_EXTENSION,
        _ => VIDEO_EXTENSION,
    }
}

/// Inputs for [`resolve_filename`]
#[derive(Debug, Clone, Copy, Default)]
pub struct FilenameSources<'a> {
    pub content_disposition: Option<&'a str>,
    pub content_type: Option<&'a str>,
    /// URL the result was fetched from, if its path is meaningful
    pub url: Option<&'a Url>,
    /// Used when nothing else yields a name; defaults to [`DEFAULT_FILENAME`]
    pub fallback: Option<&'a str>,
}

/// Work out the name to save a result under
pub fn resolve_filename(sources: FilenameSources<'_>) -> String {
    let mut name = sources
        .content_disposition
        .and_then(parse_content_disposition)
        .map(|d| d.name)
        .or_else(|| sources.url.and_then(filename_from_url))
        .unwrap_or_else(|| sources.fallback.unwrap_or(DEFAULT_FILENAME).to_string());

    if !has_extension(&name) {
        name.push('.');
        name.push_str(extension_for_content_type(sources.content_type));
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_filename() {
        let parsed = parse_content_disposition(r#"attachment; filename="clip.mp4""#).unwrap();
        assert_eq!(parsed.name, "clip.mp4");
        assert!(!parsed.extended);
    }

    #[test]
    fn test_unquoted_and_single_quoted() {
        assert_eq!(
            parse_content_disposition("attachment; filename=clip.mp4").unwrap().name,
            "clip.mp4"
        );
        assert_eq!(
            parse_content_disposition("attachment; filename='clip.mp4'").unwrap().name,
            "clip.mp4"
        );
    }

    #[test]
    fn test_extended_filename_preferred() {
        let header = r#"attachment; filename="fallback.mp4"; filename*=UTF-8''Caf%C3%A9%20night.mp4"#;
        let parsed = parse_content_disposition(header).unwrap();
        assert_eq!(parsed.name, "Café night.mp4");
        assert!(parsed.extended);
    }

    #[test]
    fn test_parameter_names_case_insensitive() {
        let parsed = parse_content_disposition("ATTACHMENT; FileName=\"A.MP3\"").unwrap();
        assert_eq!(parsed.name, "A.MP3");
    }

    #[test]
    fn test_semicolon_inside_quotes() {
        let parsed = parse_content_disposition(r#"attachment; filename="part 1; intro.mp4""#).unwrap();
        assert_eq!(parsed.name, "part 1; intro.mp4");
    }

    #[test]
    fn test_missing_filename() {
        assert!(parse_content_disposition("inline").is_none());
        assert!(parse_content_disposition(r#"attachment; filename="""#).is_none());
    }

    #[test]
    fn test_resolve_prefers_header() {
        let url = Url::parse("http://host/downloads/other.webm").unwrap();
        let name = resolve_filename(FilenameSources {
            content_disposition: Some(r#"attachment; filename="clip.mp4""#),
            content_type: Some("video/mp4"),
            url: Some(&url),
            fallback: None,
        });
        assert_eq!(name, "clip.mp4");
    }

    #[test]
    fn test_resolve_from_url_with_audio_extension() {
        let url = Url::parse("http://host/downloads/abc123").unwrap();
        let name = resolve_filename(FilenameSources {
            content_type: Some("audio/mpeg"),
            url: Some(&url),
            ..Default::default()
        });
        assert_eq!(name, "abc123.mp3");
    }

    #[test]
    fn test_resolve_url_segment_decoded() {
        let url = Url::parse("http://host/downloads/my%20clip.mp4/").unwrap();
        assert_eq!(filename_from_url(&url).as_deref(), Some("my clip.mp4"));
    }

    #[test]
    fn test_resolve_fallbacks() {
        let root = Url::parse("http://host/").unwrap();
        let name = resolve_filename(FilenameSources {
            url: Some(&root),
            ..Default::default()
        });
        assert_eq!(name, "download.mp4");

        let name = resolve_filename(FilenameSources {
            fallback: Some("audio.mp3"),
            content_type: Some("application/octet-stream"),
            ..Default::default()
        });
        assert_eq!(name, "audio.mp3");
    }

    #[test]
    fn test_has_extension() {
        assert!(has_extension("a.mp4"));
        assert!(!has_extension("clip"));
        assert!(!has_extension(".hidden"));
        assert!(!has_extension("trailing."));
    }
}
