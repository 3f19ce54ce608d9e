//! Authenticated request execution.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{HeaderValue, AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::StatusCode;
use url::Url;

use crate::auth::{Creds, NetrcFinder};
use crate::client::Client;
use crate::endpoint::Access;
use crate::error::{Error, Result};
use crate::http::{sanitize_url, Response};

/// Where a set of credentials came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CredSource {
    Url,
    Netrc,
    Helper,
}

impl Client {
    /// Send `req` through the host's client, authenticating as needed.
    ///
    /// Requests to NTLM endpoints negotiate up front. Otherwise a `401`
    /// either switches the endpoint to NTLM (when the server offers it) or
    /// is retried once with Basic credentials.
    pub async fn execute(&self, mut req: reqwest::Request) -> Result<Response> {
        let url = req.url().clone();
        let method = req.method().clone();
        let http = self.http_client(&url)?;

        if self.endpoints.access_for(&access_key(&url)) == Access::Ntlm {
            return self.ntlm_round_trip(&http, req).await;
        }

        // URL credentials are sent immediately.
        if let Some(creds) = url_credentials(&url) {
            req.headers_mut().insert(AUTHORIZATION, basic_header(&creds)?);
        }

        let retry = req.try_clone();
        let res = http.execute(req).await?;
        if res.status() != StatusCode::UNAUTHORIZED {
            return Ok(Response::new(method, res));
        }

        let Some(mut retry) = retry else {
            tracing::debug!(url = %sanitize_url(&url), "Request body cannot be replayed; returning 401");
            return Ok(Response::new(method, res));
        };

        if offers_ntlm(&res) {
            self.endpoints.set_access(&origin(&url), Access::Ntlm);
            drain(res).await;
            return self.ntlm_round_trip(&http, retry).await;
        }
        drain(res).await;

        let (creds, source) = self.fill_credentials(&url).await?;
        retry.headers_mut().insert(AUTHORIZATION, basic_header(&creds)?);

        let res = http.execute(retry).await?;
        if source == CredSource::Helper {
            let helper = self.credentials.clone();
            let ok = res.status() != StatusCode::UNAUTHORIZED;
            let outcome = tokio::task::spawn_blocking(move || {
                if ok {
                    helper.approve(&creds)
                } else {
                    helper.reject(&creds)
                }
            })
            .await;
            if let Ok(Err(e)) = outcome {
                tracing::debug!(error = %e, "Credential helper feedback failed");
            }
        }
        if res.status() != StatusCode::UNAUTHORIZED {
            self.endpoints.set_access(&origin(&url), Access::Basic);
        }

        Ok(Response::new(method, res))
    }

    /// Userinfo, then netrc, then the credential helper.
    async fn fill_credentials(&self, url: &Url) -> Result<(Creds, CredSource)> {
        if let Some(creds) = url_credentials(url) {
            return Ok((creds, CredSource::Url));
        }

        if let Some(creds) = netrc_credentials(self.netrc.as_ref(), url) {
            tracing::debug!(host = ?url.host_str(), "Using netrc credentials");
            return Ok((creds, CredSource::Netrc));
        }

        let helper = self.credentials.clone();
        let request = Creds::for_url(url);
        let creds = tokio::task::spawn_blocking(move || helper.fill(&request))
            .await
            .map_err(|e| Error::Credentials(format!("credential helper panicked: {}", e)))??;
        Ok((creds, CredSource::Helper))
    }

    /// Negotiate → challenge → authenticate on the host's NTLM session.
    async fn ntlm_round_trip(
        &self,
        http: &reqwest::Client,
        mut req: reqwest::Request,
    ) -> Result<Response> {
        let url = req.url().clone();
        let method = req.method().clone();

        let session = match self.cached_ntlm_session(&url) {
            Some(s) => s,
            None => {
                let (creds, _) = self.fill_credentials(&url).await?;
                self.ntlm_session(&url, &creds)
            }
        };

        let mut negotiate = req
            .try_clone()
            .ok_or_else(|| Error::Ntlm("request body cannot be replayed".to_string()))?;
        negotiate
            .headers_mut()
            .insert(AUTHORIZATION, header_value(session.negotiate_header())?);

        let res = http.execute(negotiate).await?;
        if res.status() != StatusCode::UNAUTHORIZED {
            return Ok(Response::new(method, res));
        }

        let challenge = res
            .headers()
            .get_all(WWW_AUTHENTICATE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("NTLM "))
            .map(str::to_string);
        let Some(challenge) = challenge else {
            return Ok(Response::new(method, res));
        };
        drain(res).await;

        tracing::debug!(host = ?url.host_str(), user = session.username(), "Answering NTLM challenge");
        req.headers_mut()
            .insert(AUTHORIZATION, header_value(session.authenticate_header(&challenge)?)?);

        Ok(Response::new(method, http.execute(req).await?))
    }
}

fn url_credentials(url: &Url) -> Option<Creds> {
    let password = url.password()?;
    if url.username().is_empty() {
        return None;
    }
    Some(Creds::for_url(url).with_user(url.username(), password))
}

fn netrc_credentials(netrc: &dyn NetrcFinder, url: &Url) -> Option<Creds> {
    let machine = netrc.find_machine(url.host_str()?)?;
    if machine.login.is_empty() {
        return None;
    }
    Some(Creds::for_url(url).with_user(&machine.login, &machine.password))
}

fn basic_header(creds: &Creds) -> Result<HeaderValue> {
    let user = creds.username().unwrap_or_default();
    let pass = creds.password().unwrap_or_default();
    let token = STANDARD.encode(format!("{}:{}", user, pass));
    let mut value = header_value(format!("Basic {}", token))?;
    value.set_sensitive(true);
    Ok(value)
}

fn header_value(value: String) -> Result<HeaderValue> {
    HeaderValue::from_str(&value).map_err(|e| Error::Credentials(e.to_string()))
}

fn offers_ntlm(res: &reqwest::Response) -> bool {
    res.headers()
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.trim() == "NTLM" || v.starts_with("NTLM "))
}

/// `scheme://host[:port]` of `url`.
fn origin(url: &Url) -> String {
    url.origin().ascii_serialization()
}

/// `url` without userinfo or fragment, the form access modes are recorded under.
fn access_key(url: &Url) -> String {
    let mut key = url.clone();
    key.set_fragment(None);
    if key.has_authority() {
        // Both only fail for URLs that cannot carry credentials at all.
        let _ = key.set_username("");
        let _ = key.set_password(None);
    }
    key.to_string()
}

/// Read and discard a body so the connection can be reused.
async fn drain(res: reqwest::Response) {
    let _ = res.bytes().await;
}
