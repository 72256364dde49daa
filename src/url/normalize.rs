use crate::UrlError;
use url::Url;

/// Parses a crawl seed into a canonical absolute URL
///
/// # Normalization Steps
///
/// 1. Trim surrounding whitespace and parse; reject if malformed
/// 2. Require an `http` or `https` scheme
/// 3. Require a host
/// 4. Remove the fragment
///
/// # Examples
///
/// ```
/// use spiderfrog::url::parse_seed;
///
/// let url = parse_seed("https://Example.com#top").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/");
/// ```
pub fn parse_seed(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingDomain);
    }

    url.set_fragment(None);
    Ok(url)
}

/// Resolves an `href` attribute found on `base` into a canonical absolute URL
///
/// Fragment-only references and `javascript:` pseudo-links are skipped, as is
/// anything that does not resolve to `http(s)`. The fragment of the resolved
/// URL is dropped so that origin, path and query identify the page.
///
/// # Arguments
///
/// * `href` - Raw attribute value
/// * `base` - URL of the page the attribute was found on
///
/// # Returns
///
/// * `Some(Url)` - The resolved link
/// * `None` - The link is not crawlable
pub fn resolve_link(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    if href
        .get(..11)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("javascript:"))
    {
        return None;
    }

    let mut url = base.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.host_str()?;

    url.set_fragment(None);
    Some(url)
}

/// Resolves an asset reference (`img src`, `link href`, `script src`)
///
/// Unlike [`resolve_link`] the fragment is kept and any scheme the URL
/// parser accepts is returned, so `data:` images are still recorded.
pub fn resolve_asset(src: &str, base: &Url) -> Option<Url> {
    let src = src.trim();
    if src.is_empty() {
        return None;
    }
    base.join(src).ok()
}
