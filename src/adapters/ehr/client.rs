//! HTTP FHIR client
//!
//! [`HttpFhirService`] reads resources from a FHIR R4 REST endpoint. Batched
//! reads use `_id` searches and follow `next` links; backfill reads add
//! `_lastUpdated` bounds.

use super::traits::FhirService;
use crate::config::EhrConfig;
use crate::domain::{DateRange, EhrError, RelayError, Resource, Result, Tenant};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, RequestBuilder, StatusCode};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Most pages a single search may follow
pub const MAX_SEARCH_PAGES: usize = 1000;

#[derive(Debug, Deserialize)]
struct Bundle {
    #[serde(default)]
    entry: Vec<BundleEntry>,
    #[serde(default)]
    link: Vec<BundleLink>,
}

#[derive(Debug, Deserialize)]
struct BundleEntry {
    resource: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct BundleLink {
    relation: String,
    url: String,
}

/// FHIR REST client for the tenant EHR
pub struct HttpFhirService {
    client: Client,
    config: EhrConfig,
}

impl HttpFhirService {
    /// Create a new client from configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(config: EhrConfig) -> Result<Self> {
        let mut builder = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(30));

        if !config.tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| RelayError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Base URL for a tenant, with any `{tenant}` placeholder filled in
    fn tenant_base_url(&self, tenant: &Tenant) -> String {
        self.config
            .base_url
            .trim_end_matches('/')
            .replace("{tenant}", &tenant.mnemonic)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("Accept", "application/fhir+json");
        match &self.config.auth_token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        self.authorize(request).send().await.map_err(|e| {
            if e.is_timeout() {
                RelayError::Ehr(EhrError::Timeout(e.to_string()))
            } else {
                RelayError::Ehr(EhrError::ConnectionFailed(e.to_string()))
            }
        })
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        let status = status.as_u16();
        if (400..500).contains(&status) {
            Err(RelayError::Ehr(EhrError::ClientError { status, message }))
        } else {
            Err(RelayError::Ehr(EhrError::ServerError { status, message }))
        }
    }

    async fn read_bundle(response: reqwest::Response) -> Result<Bundle> {
        Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| RelayError::Ehr(EhrError::InvalidResponse(e.to_string())))
    }

    /// Runs a search and follows `next` links, returning every entry resource
    ///
    /// A `next` link that revisits a page, or a search longer than
    /// [`MAX_SEARCH_PAGES`], fails with [`EhrError::InvalidResponse`].
    async fn search(&self, url: &str, query: &[(String, String)]) -> Result<Vec<Resource>> {
        let mut resources = Vec::new();
        let first = self.send(self.client.get(url).query(query)).await?;
        let mut visited = HashSet::from([first.url().to_string()]);
        let mut bundle = Self::read_bundle(first).await?;

        loop {
            for entry in bundle.entry.drain(..) {
                if let Some(value) = entry.resource {
                    resources.push(Resource::new(value)?);
                }
            }

            let Some(next) = bundle.link.iter().find(|link| link.relation == "next") else {
                break;
            };
            if !visited.insert(next.url.clone()) {
                return Err(RelayError::Ehr(EhrError::InvalidResponse(format!(
                    "Search page link loops back to {}",
                    next.url
                ))));
            }
            if visited.len() > MAX_SEARCH_PAGES {
                return Err(RelayError::Ehr(EhrError::InvalidResponse(format!(
                    "Search exceeded {MAX_SEARCH_PAGES} pages"
                ))));
            }

            tracing::debug!(url = %next.url, page = visited.len(), "Following search page link");
            let response = self.send(self.client.get(&next.url)).await?;
            bundle = Self::read_bundle(response).await?;
        }

        Ok(resources)
    }

    async fn search_ids(
        &self,
        tenant: &Tenant,
        resource_type: &str,
        ids: &[String],
        date_range: Option<&DateRange>,
    ) -> Result<HashMap<String, Vec<Resource>>> {
        let url = format!("{}/{}", self.tenant_base_url(tenant), resource_type);
        let mut found: HashMap<String, Vec<Resource>> = HashMap::new();

        for chunk in ids.chunks(self.config.max_ids_per_request.max(1)) {
            let mut query = vec![("_id".to_string(), chunk.join(","))];
            if let Some(range) = date_range {
                query.push(("_lastUpdated".to_string(), format!("ge{}", range.start.to_rfc3339())));
                query.push(("_lastUpdated".to_string(), format!("le{}", range.end.to_rfc3339())));
            }

            tracing::debug!(
                tenant = %tenant.mnemonic,
                resource_type = resource_type,
                id_count = chunk.len(),
                "Searching EHR by id"
            );

            for resource in self.search(&url, &query).await? {
                let Some(id) = resource.id().map(|id| tenant.unlocalize(id).to_string()) else {
                    continue;
                };
                if chunk.contains(&id) {
                    found.entry(id).or_default().push(resource);
                }
            }
        }

        Ok(found)
    }
}

#[async_trait]
impl FhirService for HttpFhirService {
    async fn get_by_id(
        &self,
        tenant: &Tenant,
        resource_type: &str,
        id: &str,
    ) -> Result<Option<Resource>> {
        let url = format!(
            "{}/{}/{}",
            self.tenant_base_url(tenant),
            resource_type,
            tenant.unlocalize(id)
        );
        let response = self.send(self.client.get(&url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let value: Value = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| RelayError::Ehr(EhrError::InvalidResponse(e.to_string())))?;
        Resource::new(value).map(Some)
    }

    async fn get_by_ids(
        &self,
        tenant: &Tenant,
        resource_type: &str,
        ids: &[String],
    ) -> Result<HashMap<String, Vec<Resource>>> {
        self.search_ids(tenant, resource_type, ids, None).await
    }

    async fn get_by_ids_in_range(
        &self,
        tenant: &Tenant,
        resource_type: &str,
        ids: &[String],
        date_range: &DateRange,
    ) -> Result<HashMap<String, Vec<Resource>>> {
        self.search_ids(tenant, resource_type, ids, Some(date_range))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;
    use chrono::{TimeZone, Utc};
    use mockito::Matcher;
    use serde_json::json;

    fn config(base_url: String) -> EhrConfig {
        EhrConfig {
            base_url,
            auth_token: Some(secret_string("token-123".to_string())),
            timeout_seconds: 5,
            tls_verify: true,
            max_ids_per_request: 50,
        }
    }

    fn tenant() -> Tenant {
        Tenant::new("tenant", "Test Tenant")
    }

    #[tokio::test]
    async fn test_get_by_ids_groups_bundle_entries() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({
            "resourceType": "Bundle",
            "entry": [
                {"resource": {"resourceType": "Location", "id": "1"}},
                {"resource": {"resourceType": "Location", "id": "2"}},
                {"resource": {"resourceType": "Location", "id": "99"}}
            ]
        });
        let mock = server
            .mock("GET", "/tenant/Location")
            .match_query(Matcher::UrlEncoded("_id".into(), "1,2,3".into()))
            .match_header("authorization", "Bearer token-123")
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let service = HttpFhirService::new(config(format!("{}/{{tenant}}", server.url()))).unwrap();
        let ids = vec!["1".to_string(), "2".to_string(), "3".to_string()];
        let found = service.get_by_ids(&tenant(), "Location", &ids).await.unwrap();

        mock.assert_async().await;
        assert_eq!(found.len(), 2);
        assert_eq!(found["1"][0].id(), Some("1"));
        assert!(!found.contains_key("3"));
        assert!(!found.contains_key("99"));
    }

    #[tokio::test]
    async fn test_get_by_ids_in_range_sends_bounds() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/Observation")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("_id".into(), "7".into()),
                Matcher::UrlEncoded("_lastUpdated".into(), "ge2024-01-01T00:00:00+00:00".into()),
            ]))
            .with_status(200)
            .with_body(json!({"resourceType": "Bundle"}).to_string())
            .create_async()
            .await;

        let service = HttpFhirService::new(config(server.url())).unwrap();
        let range = DateRange::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
        );
        let found = service
            .get_by_ids_in_range(&tenant(), "Observation", &["7".to_string()], &range)
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/Patient/42")
            .with_status(404)
            .create_async()
            .await;

        let service = HttpFhirService::new(config(server.url())).unwrap();
        let found = service
            .get_by_id(&tenant(), "Patient", "tenant-42")
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_self_referencing_next_link_stops() {
        let mut server = mockito::Server::new_async().await;
        let page_url = format!("{}/Location/_page?cursor=abc", server.url());
        let first = server
            .mock("GET", "/Location")
            .match_query(Matcher::UrlEncoded("_id".into(), "1".into()))
            .with_status(200)
            .with_body(
                json!({
                    "resourceType": "Bundle",
                    "entry": [{"resource": {"resourceType": "Location", "id": "1"}}],
                    "link": [{"relation": "next", "url": page_url}]
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;
        let looping = server
            .mock("GET", "/Location/_page")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({
                    "resourceType": "Bundle",
                    "link": [{"relation": "next", "url": page_url}]
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let service = HttpFhirService::new(config(server.url())).unwrap();
        let err = tokio::time::timeout(
            Duration::from_secs(5),
            service.get_by_ids(&tenant(), "Location", &["1".to_string()]),
        )
        .await
        .expect("search kept following the same page")
        .unwrap_err();

        first.assert_async().await;
        looping.assert_async().await;
        assert!(matches!(err, RelayError::Ehr(EhrError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_next_link_followed_across_pages() {
        let mut server = mockito::Server::new_async().await;
        let page_url = format!("{}/Location/_page?cursor=2", server.url());
        let _first = server
            .mock("GET", "/Location")
            .match_query(Matcher::UrlEncoded("_id".into(), "1,2".into()))
            .with_status(200)
            .with_body(
                json!({
                    "resourceType": "Bundle",
                    "entry": [{"resource": {"resourceType": "Location", "id": "1"}}],
                    "link": [{"relation": "self", "url": "ignored"}, {"relation": "next", "url": page_url}]
                })
                .to_string(),
            )
            .create_async()
            .await;
        let _second = server
            .mock("GET", "/Location/_page")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({
                    "resourceType": "Bundle",
                    "entry": [{"resource": {"resourceType": "Location", "id": "2"}}]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let service = HttpFhirService::new(config(server.url())).unwrap();
        let ids = vec!["1".to_string(), "2".to_string()];
        let found = service.get_by_ids(&tenant(), "Location", &ids).await.unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn test_server_error_maps_to_ehr_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/Location")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("unavailable")
            .create_async()
            .await;

        let service = HttpFhirService::new(config(server.url())).unwrap();
        let err = service
            .get_by_ids(&tenant(), "Location", &["1".to_string()])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RelayError::Ehr(EhrError::ServerError { status: 503, .. })
        ));
    }
}
