//! Portal endpoint construction
//!
//! All URLs hang off the configured portal base. Paths mirror the portal's
//! API tree: `api/auth/*` for the session, `api/shopping/*` for catalog and
//! order data. Account scoping rides along as a query parameter when the
//! config names an account.

use url::Url;

use crate::error::{Error, Result};

/// URL builder rooted at the portal base
pub(crate) struct Endpoints {
    base: Url,
}

impl Endpoints {
    /// Build an endpoint tree from the portal base URL
    pub(crate) fn new(base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url)?;
        if base.cannot_be_a_base() {
            return Err(Error::Config {
                message: format!("portal base URL {base_url:?} cannot serve as a base"),
                key: Some("portal.base_url".to_string()),
            });
        }
        Ok(Self { base })
    }

    /// The portal home page (primes session cookies)
    pub(crate) fn home(&self) -> Url {
        self.base.clone()
    }

    /// The auth redirect that leads to the login form
    pub(crate) fn login_redirect(&self) -> Result<Url> {
        let mut url = self.base.join("api/auth/login")?;
        url.query_pairs_mut()
            .append_pair("origin", self.base.as_str());
        Ok(url)
    }

    /// Session validation endpoint; answers 200 only when authenticated
    pub(crate) fn auth_validate(&self) -> Result<Url> {
        Ok(self.base.join("api/auth/validate")?)
    }

    /// Paginated product search
    pub(crate) fn product_search(
        &self,
        query: &str,
        page_number: u32,
        page_size: u32,
        account: Option<&str>,
    ) -> Result<Url> {
        let mut url = self.base.join("api/shopping/products")?;
        url.query_pairs_mut()
            .append_pair("query", query)
            .append_pair("pageNumber", &page_number.to_string())
            .append_pair("pageSize", &page_size.to_string());
        append_account(&mut url, account);
        Ok(url)
    }

    /// Product detail by item number
    pub(crate) fn product(&self, product_number: &str, account: Option<&str>) -> Result<Url> {
        let mut url = self.base.join(&format!(
            "api/shopping/products/{}",
            urlencoding::encode(product_number)
        ))?;
        append_account(&mut url, account);
        Ok(url)
    }

    /// Paginated invoice list
    pub(crate) fn invoices(
        &self,
        page_number: u32,
        page_size: u32,
        account: Option<&str>,
    ) -> Result<Url> {
        let mut url = self.base.join("api/shopping/invoices")?;
        url.query_pairs_mut()
            .append_pair("pageNumber", &page_number.to_string())
            .append_pair("pageSize", &page_size.to_string());
        append_account(&mut url, account);
        Ok(url)
    }

    /// Invoice detail by invoice number
    pub(crate) fn invoice(&self, invoice_number: &str, account: Option<&str>) -> Result<Url> {
        let mut url = self.base.join(&format!(
            "api/shopping/invoices/{}",
            urlencoding::encode(invoice_number)
        ))?;
        append_account(&mut url, account);
        Ok(url)
    }

    /// Open (submitted, not yet invoiced) orders
    pub(crate) fn open_orders(&self, account: Option<&str>) -> Result<Url> {
        let mut url = self.base.join("api/shopping/orders/open-orders")?;
        append_account(&mut url, account);
        Ok(url)
    }
}

fn append_account(url: &mut Url, account: Option<&str>) {
    if let Some(account) = account {
        url.query_pairs_mut().append_pair("customerNumber", account);
    }
}
