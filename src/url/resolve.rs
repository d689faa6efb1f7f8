use crate::url::PAGE_QUERY_PARAM;
use url::Url;

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be ignored:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
        Some(absolute_url)
    } else {
        None
    }
}

/// Extracts the page number a pagination link points at
///
/// The number is read from the `page` query parameter. Hrefs that do not
/// resolve as URLs fall back to scanning for a literal `page=` segment.
///
/// # Examples
///
/// ```
/// use tousu_crawler::url::page_number_from_href;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/list.html?page=1").unwrap();
/// assert_eq!(page_number_from_href("/list.html?brand=0&page=715", &base), Some(715));
/// assert_eq!(page_number_from_href("/list.html", &base), None);
/// ```
pub fn page_number_from_href(href: &str, base_url: &Url) -> Option<u32> {
    let href = href.trim();

    if let Ok(url) = base_url.join(href) {
        return url
            .query_pairs()
            .find(|(key, _)| key == PAGE_QUERY_PARAM)
            .and_then(|(_, value)| value.trim().parse().ok());
    }

    let needle = format!("{}=", PAGE_QUERY_PARAM);
    let (_, rest) = href.split_once(needle.as_str())?;
    rest.split('&').next()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://www.aqsiqauto.com/qichetousu.html?page=3").unwrap()
    }

    #[test]
    fn test_resolve_site_relative() {
        let url = resolve_link("/qichetousu.html?page=4", &base_url()).unwrap();
        assert_eq!(url.as_str(), "https://www.aqsiqauto.com/qichetousu.html?page=4");
    }

    #[test]
    fn test_resolve_absolute() {
        let url = resolve_link("https://other.example.com/list?page=2", &base_url()).unwrap();
        assert_eq!(url.as_str(), "https://other.example.com/list?page=2");
    }

    #[test]
    fn test_resolve_skips_non_navigational() {
        assert!(resolve_link("", &base_url()).is_none());
        assert!(resolve_link("#", &base_url()).is_none());
        assert!(resolve_link("javascript:void(0)", &base_url()).is_none());
        assert!(resolve_link("mailto:a@b.com", &base_url()).is_none());
        assert!(resolve_link("ftp://example.com/file", &base_url()).is_none());
    }

    #[test]
    fn test_page_number_from_query() {
        assert_eq!(
            page_number_from_href(
                "/qichetousu.html?car_brand_id=0&car_series_id=0&page=715&complaint_number=",
                &base_url()
            ),
            Some(715)
        );
    }

    #[test]
    fn test_page_number_ignores_similar_params() {
        assert_eq!(
            page_number_from_href("/list?per_page=20&page=12", &base_url()),
            Some(12)
        );
    }

    #[test]
    fn test_page_number_missing_or_invalid() {
        assert_eq!(page_number_from_href("/list?sort=date", &base_url()), None);
        assert_eq!(page_number_from_href("/list?page=last", &base_url()), None);
    }
}
