//! Archive filename resolution from a `Content-Disposition` header.
//!
//! Servers are inconsistent about how they spell the filename, so the
//! lookup runs through three forms in order: quoted `filename="..."`,
//! RFC 5987 `filename*=UTF-8''...`, bare `filename=...`. When none parse,
//! the caller-supplied album id yields a deterministic default.

/// Resolve the filename to save an album archive under.
pub fn archive_filename(header: Option<&str>, album_id: &str) -> String {
    header
        .and_then(parse_disposition)
        .and_then(|name| sanitize(&name))
        .unwrap_or_else(|| format!("album_{album_id}.zip"))
}

fn parse_disposition(value: &str) -> Option<String> {
    quoted_filename(value)
        .or_else(|| extended_filename(value))
        .or_else(|| bare_filename(value))
}

/// `filename="some name.zip"`
fn quoted_filename(value: &str) -> Option<String> {
    let start = value.find("filename=\"")? + "filename=\"".len();
    let rest = &value[start..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

/// `filename*=UTF-8''percent%20encoded.zip`
fn extended_filename(value: &str) -> Option<String> {
    let start = value.find("filename*=")? + "filename*=".len();
    let rest = value[start..].split(';').next()?.trim();
    let encoded = rest
        .strip_prefix("UTF-8''")
        .or_else(|| rest.strip_prefix("utf-8''"))?;
    Some(percent_decode(encoded))
}

/// `filename=plain.zip` (unquoted, up to the next parameter)
fn bare_filename(value: &str) -> Option<String> {
    for part in value.split(';') {
        let part = part.trim();
        if let Some(name) = part.strip_prefix("filename=") {
            if !name.is_empty() && !name.starts_with('"') {
                return Some(name.to_string());
            }
        }
    }
    None
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let (Some(hi), Some(lo)) = (
                bytes.get(i + 1).and_then(|b| (*b as char).to_digit(16)),
                bytes.get(i + 2).and_then(|b| (*b as char).to_digit(16)),
            ) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Keep only a plain file name: no directory components, no traversal.
fn sanitize(name: &str) -> Option<String> {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .trim()
        .trim_matches('"');
    if base.is_empty() || base == "." || base == ".." {
        return None;
    }
    Some(base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_filename() {
        let name = archive_filename(Some(r#"attachment; filename="Nunta 2025.zip""#), "9");
        assert_eq!(name, "Nunta 2025.zip");
    }

    #[test]
    fn test_rfc5987_filename() {
        let name = archive_filename(
            Some("attachment; filename*=UTF-8''Album%20Nunt%C4%83.zip"),
            "9",
        );
        assert_eq!(name, "Album Nuntă.zip");
    }

    #[test]
    fn test_bare_filename() {
        let name = archive_filename(Some("attachment; filename=plain.zip"), "9");
        assert_eq!(name, "plain.zip");
    }

    #[test]
    fn test_quoted_wins_over_extended() {
        let header = r#"attachment; filename="simple.zip"; filename*=UTF-8''fancy.zip"#;
        assert_eq!(archive_filename(Some(header), "9"), "simple.zip");
    }

    #[test]
    fn test_missing_header_uses_default() {
        assert_eq!(archive_filename(None, "42"), "album_42.zip");
    }

    #[test]
    fn test_unparseable_header_uses_default() {
        assert_eq!(archive_filename(Some("attachment"), "7"), "album_7.zip");
    }

    #[test]
    fn test_path_components_are_stripped() {
        let name = archive_filename(Some(r#"attachment; filename="../../etc/passwd""#), "1");
        assert_eq!(name, "passwd");
    }

    #[test]
    fn test_traversal_only_name_uses_default() {
        let name = archive_filename(Some(r#"attachment; filename="..""#), "1");
        assert_eq!(name, "album_1.zip");
    }
}
