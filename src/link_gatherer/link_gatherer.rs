use std::future::Future;

use reqwest::Url;
use scraper::{Html, Selector};

use super::url_content_getter::{ListingPage, URLContentGetter};
use crate::error::FetchError;

pub trait LinkGatherer: Send + Sync + Clone {
    fn get_links(&mut self, url: &str)
        -> impl Future<Output = Result<Vec<String>, FetchError>> + Send;
}

#[derive(Clone, Debug)]
pub struct Page<T = reqwest::Client> {
    client: T,
}

impl<T: URLContentGetter + Clone> Page<T> {
    pub fn new(client: T) -> Self {
        Page { client }
    }
}

impl<T: URLContentGetter + Clone + Send + Sync> LinkGatherer for Page<T> {
    #[tracing::instrument(skip(self))]
    fn get_links(
        &mut self,
        url: &str,
    ) -> impl Future<Output = Result<Vec<String>, FetchError>> + Send {
        async move {
            let page = self.client.get_listing_page(url).await?;
            let links = extract_links(&page)?;
            tracing::debug!("Found {} links", links.len());
            tracing::trace!("Links {:?}", links);
            Ok(links)
        }
    }
}

/// Absolute links of `page` that live strictly below the page's own URL.
///
/// Every href is resolved against the page URL. Links carrying a query or a
/// fragment are dropped, as are links back to the page itself. The result is
/// sorted and free of duplicates.
pub fn extract_links(page: &ListingPage) -> Result<Vec<String>, FetchError> {
    let base = Url::parse(&page.url)
        .map_err(|err| FetchError::Parse(format!("{}: {}", page.url, err)))?;
    let selector =
        Selector::parse("a[href]").map_err(|err| FetchError::Parse(err.to_string()))?;

    let html = Html::parse_document(&page.content);
    let mut links = html
        .select(&selector)
        .filter_map(|anchor| anchor.attr("href"))
        .filter_map(|href| match base.join(href) {
            Ok(link) => Some(link),
            Err(err) => {
                tracing::debug!("Skipping href {:?}: {}", href, err);
                None
            }
        })
        .filter(|link| link.query().is_none() && link.fragment().is_none())
        .map(String::from)
        .filter(|link| link.starts_with(&page.url) && *link != page.url)
        .collect::<Vec<_>>();
    links.sort();
    links.dedup();
    Ok(links)
}
