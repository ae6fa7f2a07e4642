//! Authenticated portal client
//!
//! [`StorefrontClient`] owns the cookie-carrying HTTP session and the typed
//! fetches the rest of the crate builds on. The [`StorefrontApi`] trait is
//! the seam between the job/workflow layer and the network: workers close
//! over an `Arc<dyn StorefrontApi>`, so tests drive the job machinery with
//! an in-memory stub instead of a live portal.

mod endpoints;
mod session;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use reqwest::{StatusCode, header};
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::{PortalConfig, RetryConfig};
use crate::error::{Error, Result, SessionError};
use crate::models::{Invoice, InvoiceList, OpenOrders, ProductRecord, SearchPage};
use crate::retry::fetch_with_retry;

use endpoints::Endpoints;

/// Upper bound on pages fetched for one paginated request, against portals
/// that keep advertising more rows than they serve
const MAX_PAGES: u32 = 200;

/// The portal operations the workflow layer depends on
#[async_trait]
pub trait StorefrontApi: Send + Sync {
    /// Search the catalog, following pagination, and merge all pages
    async fn search(&self, query: &str) -> Result<SearchPage>;

    /// Fetch the full record for one product
    async fn product(&self, product_number: &str) -> Result<ProductRecord>;

    /// Fetch the invoice list, following pagination
    async fn invoices(&self) -> Result<InvoiceList>;

    /// Fetch one invoice's detail
    async fn invoice(&self, invoice_number: &str) -> Result<Invoice>;

    /// Fetch the open orders
    async fn open_orders(&self) -> Result<OpenOrders>;
}

/// Cookie-session HTTP client for the storefront portal
pub struct StorefrontClient {
    http: reqwest::Client,
    endpoints: Endpoints,
    portal: PortalConfig,
    retry: RetryConfig,
    authenticated: AtomicBool,
}

impl StorefrontClient {
    /// Build a client; no network traffic happens until [`login`](Self::login)
    pub fn new(portal: PortalConfig, retry: RetryConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(portal.user_agent.clone())
            .build()?;
        let endpoints = Endpoints::new(&portal.base_url)?;
        Ok(Self {
            http,
            endpoints,
            portal,
            retry,
            authenticated: AtomicBool::new(false),
        })
    }

    /// Authenticate the session via the portal's form login
    pub async fn login(&self) -> Result<()> {
        session::login(&self.http, &self.endpoints, &self.portal).await?;
        self.authenticated.store(true, Ordering::SeqCst);
        tracing::info!(user = %self.portal.username, "logged in to portal");
        Ok(())
    }

    /// Whether a login has succeeded and no request has seen it expire since
    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    fn ensure_authenticated(&self) -> Result<()> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(SessionError::NotAuthenticated.into())
        }
    }

    /// GET a JSON endpoint with retry on transient failures
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        self.ensure_authenticated()?;
        let endpoint = url.path().to_string();
        fetch_with_retry(&self.retry, || {
            let url = url.clone();
            let endpoint = endpoint.clone();
            async move {
                let response = self
                    .http
                    .get(url)
                    .header(header::ACCEPT, "application/json")
                    .send()
                    .await?;
                let status = response.status();
                if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                    // The cookie expired server-side; callers must log in again.
                    self.authenticated.store(false, Ordering::SeqCst);
                    return Err(SessionError::NotAuthenticated.into());
                }
                if !status.is_success() {
                    return Err(Error::Portal {
                        status: status.as_u16(),
                        endpoint: endpoint.clone(),
                    });
                }
                let text = response.text().await?;
                serde_json::from_str(&text).map_err(|e| {
                    SessionError::UnexpectedResponse {
                        endpoint,
                        detail: e.to_string(),
                    }
                    .into()
                })
            }
        })
        .await
    }

    /// Fetch one page of search results
    pub async fn search_page(&self, query: &str, page_number: u32) -> Result<SearchPage> {
        let url = self.endpoints.product_search(
            query,
            page_number,
            self.portal.page_size,
            self.portal.account_number.as_deref(),
        )?;
        let mut page: SearchPage = self.get_json(url).await?;
        page.query = query.to_string();
        Ok(page)
    }
}

#[async_trait]
impl StorefrontApi for StorefrontClient {
    async fn search(&self, query: &str) -> Result<SearchPage> {
        let mut merged = self.search_page(query, 0).await?;
        let total = merged.total_hits;
        let page_size = merged.page_size;
        let mut fetched = merged.hits.len() as u64;
        let mut page_number = 1u32;

        while page_size > 0 && fetched < total && page_number < MAX_PAGES {
            let page = self.search_page(query, page_number).await?;
            if page.hits.is_empty() {
                tracing::warn!(
                    query,
                    page_number,
                    fetched,
                    total,
                    "portal served an empty page before the advertised total; stopping"
                );
                break;
            }
            fetched += page.hits.len() as u64;
            merged.merge(page);
            page_number += 1;
        }

        tracing::debug!(
            query,
            hits = merged.hits.len(),
            total_hits = merged.total_hits,
            pages = page_number,
            "search complete"
        );
        Ok(merged)
    }

    async fn product(&self, product_number: &str) -> Result<ProductRecord> {
        let url = self
            .endpoints
            .product(product_number, self.portal.account_number.as_deref())?;
        self.get_json(url).await
    }

    async fn invoices(&self) -> Result<InvoiceList> {
        let account = self.portal.account_number.as_deref();
        let mut merged: InvoiceList = self
            .get_json(self.endpoints.invoices(0, self.portal.page_size, account)?)
            .await?;
        let total = merged.total_count;
        let page_size = merged.page_size;
        let mut fetched = merged.invoices.len() as u64;
        let mut page_number = 1u32;

        while page_size > 0 && fetched < total && page_number < MAX_PAGES {
            let page: InvoiceList = self
                .get_json(
                    self.endpoints
                        .invoices(page_number, self.portal.page_size, account)?,
                )
                .await?;
            if page.invoices.is_empty() {
                break;
            }
            fetched += page.invoices.len() as u64;
            merged.merge(page);
            page_number += 1;
        }
        Ok(merged)
    }

    async fn invoice(&self, invoice_number: &str) -> Result<Invoice> {
        let url = self
            .endpoints
            .invoice(invoice_number, self.portal.account_number.as_deref())?;
        self.get_json(url).await
    }

    async fn open_orders(&self) -> Result<OpenOrders> {
        let url = self
            .endpoints
            .open_orders(self.portal.account_number.as_deref())?;
        self.get_json(url).await
    }
}
