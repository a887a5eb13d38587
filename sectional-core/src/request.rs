//! Hydration requests and section URL construction.

use url::Url;

use crate::errors::HydrationError;

/// One call to the hydrator: which page URL, which section, which slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HydrationRequest {
    /// Page URL as given by the caller, relative or absolute
    pub url: String,
    /// Section identifier understood by the section rendering endpoint
    pub section_id: String,
    /// Element ids to swap, in order
    pub slots: Vec<String>,
}

impl HydrationRequest {
    /// Creates a request with no slots; the section is still fetched.
    pub fn new(url: impl Into<String>, section_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            section_id: section_id.into(),
            slots: Vec::new(),
        }
    }

    /// Sets the slots to swap.
    pub fn with_slots<I, S>(mut self, slots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.slots = slots.into_iter().map(Into::into).collect();
        self
    }

    /// Resolves the request URL against the origin of `location`.
    ///
    /// Relative URLs resolve from the origin root, not from the current path.
    ///
    /// # Errors
    /// - `HydrationError::InvalidUrl` - The URL cannot be parsed or joined
    pub fn resolve(&self, location: &Url) -> Result<Url, HydrationError> {
        resolve_against_origin(&self.url, location)
    }

    /// Builds the URL actually fetched: the page URL with the section parameter set.
    ///
    /// # Errors
    /// - `HydrationError::InvalidUrl` - The URL cannot be parsed or joined
    pub fn section_url(&self, location: &Url, param_name: &str) -> Result<Url, HydrationError> {
        let mut url = self.resolve(location)?;
        set_query_param(&mut url, param_name, &self.section_id);
        Ok(url)
    }

    /// Builds the URL pushed onto history: the page URL without the section parameter.
    ///
    /// # Errors
    /// - `HydrationError::InvalidUrl` - The URL cannot be parsed or joined
    pub fn history_url(&self, location: &Url, param_name: &str) -> Result<Url, HydrationError> {
        let mut url = self.resolve(location)?;
        remove_query_param(&mut url, param_name);
        Ok(url)
    }
}

pub(crate) fn resolve_against_origin(raw: &str, location: &Url) -> Result<Url, HydrationError> {
    let origin = location.join("/").map_err(|e| HydrationError::InvalidUrl {
        url: location.to_string(),
        reason: format!("current location has no usable origin: {e}"),
    })?;

    origin.join(raw).map_err(|e| HydrationError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Sets `name` to `value`, keeping the position of the first existing
/// occurrence and dropping any others; appends when absent.
fn set_query_param(url: &mut Url, name: &str, value: &str) {
    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut replaced = false;

    for (key, existing) in url.query_pairs() {
        if key == name {
            if !replaced {
                pairs.push((key.into_owned(), value.to_string()));
                replaced = true;
            }
        } else {
            pairs.push((key.into_owned(), existing.into_owned()));
        }
    }

    if !replaced {
        pairs.push((name.to_string(), value.to_string()));
    }

    url.query_pairs_mut().clear().extend_pairs(pairs);
}

/// Removes every occurrence of `name`; drops the `?` when nothing remains.
fn remove_query_param(url: &mut Url, name: &str) {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != name)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }
}
