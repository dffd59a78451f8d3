use std::future::Future;

use crate::error::FetchError;

pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// A fetched listing page. `url` is where the request ended up after redirects.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingPage {
    pub url: String,
    pub content: String,
}

pub trait URLContentGetter {
    fn get_listing_page(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<ListingPage, FetchError>> + Send;
}

impl URLContentGetter for reqwest::Client {
    #[tracing::instrument(skip(self))]
    fn get_listing_page(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<ListingPage, FetchError>> + Send {
        async move {
            let url = url.to_string();
            let resp = match self
                .get(&url)
                .header(reqwest::header::USER_AGENT, USER_AGENT)
                .send()
                .await
                .and_then(|resp| resp.error_for_status())
            {
                Ok(resp) => resp,
                Err(err) => {
                    tracing::error!("{}", err.to_string());
                    return Err(FetchError::from(err));
                }
            };
            let final_url = resp.url().to_string();
            if final_url != url {
                tracing::debug!("Redirected to {}", final_url);
            }
            match resp.text().await {
                Ok(content) => Ok(ListingPage {
                    url: final_url,
                    content,
                }),
                Err(err) => {
                    tracing::error!("{}", err.to_string());
                    Err(FetchError::Content(err.to_string()))
                }
            }
        }
    }
}
