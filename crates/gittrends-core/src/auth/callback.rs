use reqwest::Url;

/// `code` and `state` carried by the provider's redirect back to the app.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationCallback {
    pub code: Option<String>,
    pub state: Option<String>,
}

impl AuthorizationCallback {
    /// Read `code` and `state` from the URI's query string. A URI that does
    /// not parse yields a callback with neither.
    pub fn parse(callback_uri: &str) -> Self {
        let Ok(url) = Url::parse(callback_uri) else {
            return Self::default();
        };

        let mut callback = Self::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" if callback.code.is_none() => callback.code = Some(value.into_owned()),
                "state" if callback.state.is_none() => callback.state = Some(value.into_owned()),
                _ => {}
            }
        }
        callback
    }

    /// The authorization code, if present and non-empty.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref().filter(|c| !c.is_empty())
    }
}
