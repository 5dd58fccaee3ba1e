use anyhow::Context;
use reqwest::blocking::{Client, RequestBuilder, Response};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Response header that carries the token after a successful login.
const BEARER_HEADER: &str = "bearer";

/// Entry of the cohort definition list.
#[derive(serde::Deserialize, Clone, Debug, PartialEq)]
pub struct CohortSummary {
    pub id: i64,
    pub name: String,
}

/// Full cohort definition. `expression` is itself a JSON document, encoded as a string.
#[derive(serde::Deserialize, Clone, Debug, PartialEq)]
pub struct Cohort {
    pub id: i64,
    pub name: String,
    pub expression: String,
}

/// Blocking client for the OHDSI WebAPI cohort definition endpoints.
pub struct WebApiClient {
    base_url: String,
    client: Client,
    token: Option<String>,
}

impl WebApiClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("cannot create HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            token: None,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Logs in with the given credentials. The returned token is attached to every
    /// following request made by this client.
    pub fn authenticate(
        &mut self,
        login_path: &str,
        username: &str,
        password: &str,
    ) -> anyhow::Result<String> {
        let url = format!("{}{login_path}", self.base_url);
        log::info!("Fetching auth token as {username} from {url}");
        let response = self
            .client
            .post(&url)
            .form(&[("login", username), ("password", password)])
            .send()
            .with_context(|| format!("cannot reach WebAPI login at {url}"))?;
        let response = check_status(response, &url)?;
        let token = response
            .headers()
            .get(BEARER_HEADER)
            .context("WebAPI login response has no `bearer` header")?
            .to_str()
            .context("WebAPI `bearer` header is not valid text")?
            .to_string();
        self.token = Some(token.clone());
        Ok(token)
    }

    pub fn list_cohorts(&self) -> anyhow::Result<Vec<CohortSummary>> {
        let url = self.definitions_url();
        self.get_json(&url)
            .context("cannot fetch cohort definition list")
    }

    pub fn get_cohort(&self, id: i64) -> anyhow::Result<Cohort> {
        let url = format!("{}/{id}", self.definitions_url());
        self.get_json(&url)
            .with_context(|| format!("cannot fetch cohort definition {id}"))
    }

    /// Lists all cohort definitions, then fetches the details of each one in turn.
    pub fn fetch_cohorts(&self) -> anyhow::Result<Vec<Cohort>> {
        let list = self.list_cohorts()?;
        let mut cohorts = Vec::with_capacity(list.len());
        for summary in list {
            log::info!(
                "Fetching details for cohort '{}' ('{}') from {}/{}",
                summary.id,
                summary.name,
                self.definitions_url(),
                summary.id
            );
            cohorts.push(self.get_cohort(summary.id)?);
        }
        Ok(cohorts)
    }

    fn definitions_url(&self) -> String {
        format!("{}/cohortdefinition", self.base_url)
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> anyhow::Result<T> {
        let response = self
            .authorize(self.client.get(url))
            .send()
            .with_context(|| format!("cannot reach {url}"))?;
        let response = check_status(response, url)?;
        response
            .json()
            .with_context(|| format!("unexpected response body from {url}"))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            // WebAPI expects the colon after `Bearer`.
            Some(token) => request.header(reqwest::header::AUTHORIZATION, format!("Bearer: {token}")),
            None => request,
        }
    }
}

fn check_status(response: Response, url: &str) -> anyhow::Result<Response> {
    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("{url} returned HTTP {status}");
    }
    Ok(response)
}
