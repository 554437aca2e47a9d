//! HTTP implementation of [`CloudClient`] for Keystone v3 and Nova v2.1.
//!
//! Authenticates lazily on the first call and caches the token together
//! with the compute and identity endpoints from the service catalog. A
//! `401` drops the cached session and the request is retried once with
//! a fresh token.

use std::sync::Arc;
use std::sync::RwLock as StdRwLock;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, info};

use nova_core::*;

use crate::client::CloudClient;
use crate::error::{ClientError, ClientResult};
use crate::wire;

const USER_AGENT: &str = concat!("nova-exporter/", env!("CARGO_PKG_VERSION"));

/// Which catalog endpoint a request is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Service {
    Compute,
    Identity,
}

/// A token and the endpoints it was issued with.
#[derive(Debug, Clone)]
struct Session {
    token: String,
    compute: String,
    identity: String,
}

/// Talks to a real cloud over HTTP or HTTPS.
pub struct HttpCloudClient {
    http: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    cloud: CloudConfig,
    timeout: Duration,
    session: RwLock<Option<Session>>,
    microversion: StdRwLock<Option<ApiVersion>>,
}

impl HttpCloudClient {
    pub fn new(cloud: CloudConfig) -> ClientResult<Self> {
        let timeout = cloud
            .timeout()
            .map_err(|e| ClientError::Auth(format!("bad timeout: {e}")))?;

        if cloud.token.is_some() {
            if cloud.compute_endpoint.is_none() {
                return Err(ClientError::Auth(
                    "cloud.token requires cloud.compute_endpoint".into(),
                ));
            }
        } else if cloud.auth_url.is_none()
            || cloud.username.is_none()
            || cloud.password.is_none()
            || cloud.project_name.is_none()
        {
            return Err(ClientError::Auth(
                "either cloud.token or auth_url, username, password and project_name are required"
                    .into(),
            ));
        }

        let http = Client::builder(TokioExecutor::new()).build(https_connector()?);
        Ok(Self {
            http,
            cloud,
            timeout,
            session: RwLock::new(None),
            microversion: StdRwLock::new(None),
        })
    }

    fn current_microversion(&self) -> Option<ApiVersion> {
        match self.microversion.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    async fn session(&self) -> ClientResult<Session> {
        if let Some(session) = self.session.read().await.as_ref() {
            return Ok(session.clone());
        }

        let mut slot = self.session.write().await;
        // Another caller may have authenticated while we waited.
        if let Some(session) = slot.as_ref() {
            return Ok(session.clone());
        }
        let session = self.authenticate().await?;
        *slot = Some(session.clone());
        Ok(session)
    }

    async fn invalidate_session(&self) {
        *self.session.write().await = None;
    }

    async fn authenticate(&self) -> ClientResult<Session> {
        if let Some(token) = &self.cloud.token {
            let compute = self.cloud.compute_endpoint.clone().unwrap_or_default();
            let identity = self
                .cloud
                .identity_endpoint
                .clone()
                .or_else(|| self.cloud.auth_url.clone())
                .unwrap_or_default();
            return Ok(Session {
                token: token.clone(),
                compute: compute.trim_end_matches('/').to_string(),
                identity: identity.trim_end_matches('/').to_string(),
            });
        }

        // `new` guarantees these are present.
        let auth_url = self.cloud.auth_url.as_deref().unwrap_or_default();
        let body = wire::AuthRequest::password(
            self.cloud.username.as_deref().unwrap_or_default(),
            self.cloud.password.as_deref().unwrap_or_default(),
            &self.cloud.user_domain_name,
            self.cloud.project_name.as_deref().unwrap_or_default(),
            &self.cloud.project_domain_name,
        );
        let payload = serde_json::to_vec(&body).map_err(|e| ClientError::Auth(e.to_string()))?;
        let url = format!("{}/auth/tokens", identity_v3(auth_url));

        let (status, headers, bytes) = self.send(Method::POST, &url, None, Some(payload), false).await?;
        if !status.is_success() {
            return Err(ClientError::Auth(format!("{url} returned HTTP {}", status.as_u16())));
        }
        let token = headers
            .get("x-subject-token")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ClientError::Auth("response carried no X-Subject-Token".into()))?
            .to_string();
        let response: wire::TokenResponse = decode(&url, &bytes)?;

        let interface = self.cloud.interface.as_str();
        let region = self.cloud.region_name.as_deref();
        let compute = match &self.cloud.compute_endpoint {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => response
                .token
                .endpoint("compute", interface, region)
                .ok_or_else(|| ClientError::EndpointNotFound {
                    service: "compute".into(),
                    interface: interface.into(),
                })?,
        };
        let identity = match &self.cloud.identity_endpoint {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => response
                .token
                .endpoint("identity", interface, region)
                .unwrap_or_else(|| auth_url.trim_end_matches('/').to_string()),
        };

        info!(%compute, %identity, "authenticated against identity service");
        Ok(Session {
            token,
            compute,
            identity,
        })
    }

    /// Send one request, bounded by the configured timeout.
    async fn send(
        &self,
        method: Method,
        url: &str,
        token: Option<&str>,
        body: Option<Vec<u8>>,
        compute: bool,
    ) -> ClientResult<(StatusCode, http::HeaderMap, Bytes)> {
        let uri: http::Uri = url
            .parse()
            .map_err(|_| ClientError::InvalidUrl(url.to_string()))?;

        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("accept", "application/json")
            .header("user-agent", USER_AGENT);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        if let Some(token) = token {
            builder = builder.header("x-auth-token", token);
        }
        if compute {
            if let Some(version) = self.current_microversion() {
                builder = builder
                    .header("x-openstack-nova-api-version", version.to_string())
                    .header("openstack-api-version", format!("compute {version}"));
            }
        }
        let request = builder
            .body(Full::new(Bytes::from(body.unwrap_or_default())))
            .map_err(|_| ClientError::InvalidUrl(url.to_string()))?;

        let transport = |e: &dyn std::fmt::Display| ClientError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };

        let exchange = async {
            let response = self.http.request(request).await.map_err(|e| transport(&e))?;
            let status = response.status();
            let headers = response.headers().clone();
            let bytes = response
                .into_body()
                .collect()
                .await
                .map_err(|e| transport(&e))?
                .to_bytes();
            Ok::<_, ClientError>((status, headers, bytes))
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout {
                url: url.to_string(),
            }),
        }
    }

    /// GET a JSON document from a service, re-authenticating once on 401.
    async fn get_json<T: DeserializeOwned>(&self, service: Service, path: &str) -> ClientResult<T> {
        let mut retried = false;
        loop {
            let session = self.session().await?;
            let url = resolve(&session, service, path);
            debug!(%url, "GET");
            let (status, _, bytes) = self
                .send(
                    Method::GET,
                    &url,
                    Some(&session.token),
                    None,
                    service == Service::Compute,
                )
                .await?;

            if status == StatusCode::UNAUTHORIZED && !retried {
                debug!(%url, "token rejected, re-authenticating");
                self.invalidate_session().await;
                retried = true;
                continue;
            }
            if !status.is_success() {
                return Err(ClientError::Status {
                    url,
                    status: status.as_u16(),
                });
            }
            return decode(&url, &bytes);
        }
    }

    /// GET every page of a listing, following next links.
    async fn get_all<P: wire::Page>(&self, service: Service, path: &str) -> ClientResult<Vec<P::Item>> {
        let mut path = path.to_string();
        let mut items = Vec::new();
        loop {
            let page: P = self.get_json(service, &path).await?;
            let (records, next) = page.into_parts();
            items.extend(records);
            match next {
                // Stop on a page that links to itself.
                Some(next) if next != path => path = next,
                _ => return Ok(items),
            }
        }
    }
}

#[async_trait]
impl CloudClient for HttpCloudClient {
    async fn api_version(&self) -> ClientResult<ApiVersion> {
        let doc: wire::VersionDocument = self.get_json(Service::Compute, "").await?;
        if doc.version.version.is_empty() {
            return Ok(ApiVersion::BASE);
        }
        doc.version.version.parse().map_err(|e: CoreError| ClientError::Decode {
            url: "compute version document".into(),
            message: e.to_string(),
        })
    }

    fn use_microversion(&self, version: ApiVersion) {
        match self.microversion.write() {
            Ok(mut guard) => *guard = Some(version),
            Err(poisoned) => *poisoned.into_inner() = Some(version),
        }
    }

    async fn list_tenants(&self) -> ClientResult<Vec<Tenant>> {
        let projects = self
            .get_all::<wire::ProjectList>(Service::Identity, "/projects")
            .await?;
        Ok(projects.into_iter().map(Into::into).collect())
    }

    async fn list_servers(&self, all_tenants: bool) -> ClientResult<Vec<Server>> {
        let path = if all_tenants {
            "/servers/detail?all_tenants=True"
        } else {
            "/servers/detail"
        };
        let servers = self.get_all::<wire::ServerList>(Service::Compute, path).await?;
        Ok(servers.into_iter().map(Server::from).collect())
    }

    async fn list_flavors(&self) -> ClientResult<Vec<Flavor>> {
        let flavors = self
            .get_all::<wire::FlavorList>(Service::Compute, "/flavors/detail?is_public=None")
            .await?;
        Ok(flavors.into_iter().map(Into::into).collect())
    }

    async fn list_availability_zones(&self) -> ClientResult<Vec<AvailabilityZone>> {
        let list: wire::AvailabilityZoneList =
            self.get_json(Service::Compute, "/os-availability-zone").await?;
        Ok(list.zones.into_iter().map(Into::into).collect())
    }

    async fn list_security_groups(&self) -> ClientResult<Vec<SecurityGroup>> {
        let list: wire::SecurityGroupList = self
            .get_json(Service::Compute, "/os-security-groups?all_tenants=1")
            .await?;
        Ok(list.security_groups.into_iter().map(Into::into).collect())
    }

    async fn list_compute_services(&self) -> ClientResult<Vec<ComputeService>> {
        let list: wire::ServiceList = self.get_json(Service::Compute, "/os-services").await?;
        Ok(list.services.into_iter().map(Into::into).collect())
    }

    async fn list_hypervisors(&self) -> ClientResult<Vec<Hypervisor>> {
        let hypervisors = self
            .get_all::<wire::HypervisorList>(Service::Compute, "/os-hypervisors/detail")
            .await?;
        Ok(hypervisors.into_iter().map(Into::into).collect())
    }

    async fn list_aggregates(&self) -> ClientResult<Vec<Aggregate>> {
        let list: wire::AggregateList = self.get_json(Service::Compute, "/os-aggregates").await?;
        Ok(list.aggregates.into_iter().map(Into::into).collect())
    }

    async fn compute_limits(&self, tenant_id: &str) -> ClientResult<ComputeLimits> {
        let path = format!("/limits?tenant_id={tenant_id}");
        let doc: wire::LimitsDocument = self.get_json(Service::Compute, &path).await?;
        Ok(doc.limits.absolute.into())
    }

    async fn list_server_usage(&self) -> ClientResult<Vec<ServerUsage>> {
        let tenant_usages = self
            .get_all::<wire::TenantUsageList>(Service::Compute, "/os-simple-tenant-usage?detailed=1")
            .await?;
        Ok(tenant_usages
            .into_iter()
            .flat_map(|t| t.server_usages)
            .map(Into::into)
            .collect())
    }
}

/// Connector that speaks TLS for `https://` URLs and plain TCP otherwise.
/// Server certificates are checked against the Mozilla root store.
fn https_connector() -> ClientResult<HttpsConnector<HttpConnector>> {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let tls = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| ClientError::Tls(e.to_string()))?
    .with_root_certificates(roots)
    .with_no_client_auth();

    let mut tcp = HttpConnector::new();
    tcp.enforce_http(false);

    Ok(HttpsConnectorBuilder::new()
        .with_tls_config(tls)
        .https_or_http()
        .enable_http1()
        .wrap_connector(tcp))
}

/// Build the absolute URL for a path on a service. Absolute `path`s
/// (pagination links) are used as-is.
fn resolve(session: &Session, service: Service, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    match service {
        Service::Compute => format!("{}{path}", session.compute),
        Service::Identity => format!("{}{path}", identity_v3(&session.identity)),
    }
}

/// Normalise an identity URL to its `/v3` root.
fn identity_v3(base: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.ends_with("/v3") {
        base.to_string()
    } else {
        format!("{base}/v3")
    }
}

fn decode<T: DeserializeOwned>(url: &str, bytes: &[u8]) -> ClientResult<T> {
    serde_json::from_slice(bytes).map_err(|e| ClientError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}
