use crate::url::PAGE_QUERY_PARAM;
use crate::{UrlError, UrlResult};
use url::Url;

/// A list page URL with fixed filter parameters and a variable page number
///
/// The page number lives in the `page` query parameter. If the configured URL
/// already carries one it is replaced in place, so the remaining filter
/// parameters keep their order.
#[derive(Debug, Clone)]
pub struct PageUrlTemplate {
    base: Url,
}

impl PageUrlTemplate {
    /// Parses a list URL into a template
    ///
    /// # Arguments
    ///
    /// * `list_url` - Absolute HTTP(S) URL of any list page
    ///
    /// # Returns
    ///
    /// * `Ok(PageUrlTemplate)` - The template
    /// * `Err(UrlError)` - The URL is malformed or not HTTP(S)
    ///
    /// # Examples
    ///
    /// ```
    /// use tousu_crawler::url::PageUrlTemplate;
    ///
    /// let template = PageUrlTemplate::new("https://example.com/list.html?brand=0&page=1").unwrap();
    /// assert_eq!(
    ///     template.page_url(57).as_str(),
    ///     "https://example.com/list.html?brand=0&page=57"
    /// );
    /// ```
    pub fn new(list_url: &str) -> UrlResult<Self> {
        let base = Url::parse(list_url).map_err(|e| UrlError::Parse(e.to_string()))?;

        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(UrlError::InvalidScheme(format!(
                "Only HTTP and HTTPS schemes are supported, got: {}",
                base.scheme()
            )));
        }

        Ok(Self { base })
    }

    /// Builds the URL for the given page number
    pub fn page_url(&self, page: u32) -> Url {
        let pairs: Vec<(String, String)> = self.base.query_pairs().into_owned().collect();
        let page_value = page.to_string();

        let mut url = self.base.clone();
        {
            let mut query = url.query_pairs_mut();
            query.clear();

            let mut replaced = false;
            for (key, value) in &pairs {
                if key == PAGE_QUERY_PARAM {
                    if !replaced {
                        query.append_pair(key, &page_value);
                        replaced = true;
                    }
                } else {
                    query.append_pair(key, value);
                }
            }

            if !replaced {
                query.append_pair(PAGE_QUERY_PARAM, &page_value);
            }
        }

        url
    }
}
