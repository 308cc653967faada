use url::Url;

use crate::UnfurlError;

/// Scheme and origin (`scheme://host[:port]`) of the page an image was found on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteBase {
    pub scheme: String,
    pub origin: String,
}

pub fn pickup_site_base(url: &str) -> Result<SiteBase, UnfurlError> {
    let parsed_url =
        Url::parse(url).map_err(|e| UnfurlError::InvalidUrl(format!("{url}: {e}")))?;
    let scheme = parsed_url.scheme();
    let host = parsed_url
        .host_str()
        .ok_or_else(|| UnfurlError::InvalidUrl(format!("{url}: no host")))?;

    let port = parsed_url
        .port()
        .map(|x| format!(":{x}"))
        .unwrap_or_default();

    Ok(SiteBase {
        scheme: scheme.to_string(),
        origin: format!("{scheme}://{host}{port}"),
    })
}

/// Makes an `img` source absolute when it is scheme-relative (`//cdn/x`) or
/// host-relative (`/x`). Path-relative sources are returned unchanged.
pub fn resolve_image_src(src: &str, base: &SiteBase) -> String {
    if src.starts_with("//") {
        format!("{}:{}", base.scheme, src)
    } else if src.starts_with('/') {
        format!("{}{}", base.origin, src)
    } else {
        src.to_string()
    }
}

pub fn is_valid_absolute_url(candidate: &str) -> bool {
    Url::parse(candidate)
        .map(|url| url.has_host())
        .unwrap_or(false)
}

/// Safely truncate a string, ensuring it is not truncated in the middle of multi-byte characters
///
/// The result (ellipsis included) never exceeds `max_width` display columns.
#[cfg(feature = "logging")]
pub fn truncate_str(s: &str, max_width: usize) -> String {
    use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

    if s.width() <= max_width {
        return s.to_string();
    }

    let mut result = String::new();
    let mut current_width = 0;

    for c in s.chars() {
        let char_width = c.width().unwrap_or(1);

        if current_width + char_width + 3 > max_width {
            break;
        }

        result.push(c);
        current_width += char_width;
    }

    result.push_str("...");
    result
}
