//! # AKS Pod Lister
//!
//! Lists every pod in an AKS cluster with its IP.
//!
//! With `AKS_API_SERVER` set, the lister signs in as a Service Principal
//! (`TENANT_ID`, `APP_ID`, `PASSWD`) and presents a bearer token issued for
//! the cluster's AAD server application (`AKS_AAD_SERVER_ID`). Without it,
//! the local kubeconfig or in-cluster service account is used.

use crate::config::{self, ConfigSource};
use crate::credential::{self, AmbientIdentity};
use crate::error::ConfigError;
use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use kube::{Api, Client};
use secrecy::SecretString;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Printed before the pod lines
pub const LISTING_HEADER: &str = "Listing pods with their IPs:";

/// How to reach the cluster
#[derive(Debug, Clone)]
pub enum ClusterAccess {
    /// Service Principal token against an explicit API server
    ServicePrincipal {
        api_server: String,
        aad_server_id: String,
        identity: AmbientIdentity,
    },
    /// Local kubeconfig or in-cluster config
    Kubeconfig,
}

impl ClusterAccess {
    /// # Errors
    /// Returns an error when `AKS_API_SERVER` is set but one of the Service
    /// Principal settings is missing
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self, ConfigError> {
        let Some(api_server) = config::optional(source, "AKS_API_SERVER") else {
            return Ok(Self::Kubeconfig);
        };
        Ok(Self::ServicePrincipal {
            api_server,
            aad_server_id: config::required(source, "AKS_AAD_SERVER_ID")?,
            identity: AmbientIdentity::ServicePrincipal {
                tenant_id: config::required(source, "TENANT_ID")?,
                client_id: config::required(source, "APP_ID")?,
                client_secret: SecretString::from(config::required(source, "PASSWD")?),
            },
        })
    }
}

/// TLS handling for an explicit API server
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    /// PEM bundle to trust instead of the built-in roots
    pub ca_cert: Option<PathBuf>,
    /// Skip server certificate verification
    pub insecure_skip_verify: bool,
}

/// `https://{server}:443` for a bare host name
#[must_use]
pub fn api_server_url(api_server: &str) -> String {
    if api_server.starts_with("https://") {
        api_server.trim_end_matches('/').to_string()
    } else {
        format!("https://{api_server}:443")
    }
}

/// Token scope for an AAD application id or URI
#[must_use]
pub fn aad_scope(aad_server_id: &str) -> String {
    if aad_server_id.ends_with("/.default") {
        aad_server_id.to_string()
    } else {
        format!("{}/.default", aad_server_id.trim_end_matches('/'))
    }
}

/// DER certificates from a PEM bundle; other PEM sections are skipped
///
/// # Errors
/// Returns an error if a certificate block does not decode or the bundle
/// holds no certificate
pub fn pem_certificates(pem: &str) -> Result<Vec<Vec<u8>>> {
    let certificates = rustls_pemfile::certs(&mut pem.as_bytes())
        .map(|cert| cert.map(|der| der.as_ref().to_vec()))
        .collect::<Result<Vec<_>, _>>()
        .context("Invalid certificate in PEM bundle")?;

    anyhow::ensure!(!certificates.is_empty(), "No certificate found in PEM bundle");
    Ok(certificates)
}

fn read_ca_bundle(path: &Path) -> Result<Vec<Vec<u8>>> {
    let pem = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read CA bundle {}", path.display()))?;
    pem_certificates(&pem).with_context(|| format!("Failed to parse CA bundle {}", path.display()))
}

/// Kubernetes client for `access`
///
/// # Errors
/// Returns an error if the token cannot be obtained, the CA bundle cannot be
/// read, or the client cannot be built
pub async fn client(access: &ClusterAccess, tls: &TlsOptions) -> Result<Client> {
    match access {
        ClusterAccess::Kubeconfig => {
            info!("Using local kubeconfig");
            Client::try_default()
                .await
                .context("Failed to create Kubernetes client from kubeconfig")
        }
        ClusterAccess::ServicePrincipal {
            api_server,
            aad_server_id,
            identity,
        } => {
            let url = api_server_url(api_server);
            info!(api_server = %url, identity = identity.kind(), "Connecting to AKS API server");

            let credential = identity.credential()?;
            let token = credential::access_token(credential.as_ref(), &aad_scope(aad_server_id))
                .await
                .context("Failed to get token for the AKS AAD server application")?;

            let mut config = kube::Config::new(
                url.parse()
                    .with_context(|| format!("Invalid API server URL {url}"))?,
            );
            config.auth_info.token = Some(SecretString::from(token));
            if let Some(path) = &tls.ca_cert {
                debug!(path = %path.display(), "Trusting CA bundle");
                config.root_cert = Some(read_ca_bundle(path)?);
            }
            config.accept_invalid_certs = tls.insecure_skip_verify;

            Client::try_from(config).context("Failed to create Kubernetes client")
        }
    }
}

/// `ip\tnamespace\tname`; a pod without an IP yet shows `<none>`
#[must_use]
pub fn pod_line(pod: &Pod) -> String {
    let ip = pod
        .status
        .as_ref()
        .and_then(|status| status.pod_ip.as_deref())
        .unwrap_or("<none>");
    let namespace = pod.metadata.namespace.as_deref().unwrap_or_default();
    let name = pod.metadata.name.as_deref().unwrap_or_default();
    format!("{ip}\t{namespace}\t{name}")
}

/// Print the header and one line per pod across all namespaces
///
/// # Errors
/// Returns an error if the list call or a write fails
pub async fn list_pods<W: Write + Send>(client: Client, out: &mut W) -> Result<usize> {
    writeln!(out, "{LISTING_HEADER}")?;

    let pods: Api<Pod> = Api::all(client);
    let list = pods
        .list(&ListParams::default())
        .await
        .context("Failed to list pods")?;

    for pod in &list.items {
        writeln!(out, "{}", pod_line(pod))?;
    }
    out.flush()?;

    debug!(count = list.items.len(), "Listed pods");
    Ok(list.items.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapSource;
    use k8s_openapi::api::core::v1::PodStatus;
    use kube::api::ObjectMeta;

    #[test]
    fn test_pod_line() {
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some("coredns-6799fbcd5-abcde".to_string()),
                namespace: Some("kube-system".to_string()),
                ..Default::default()
            },
            status: Some(PodStatus {
                pod_ip: Some("10.244.0.12".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(pod_line(&pod), "10.244.0.12\tkube-system\tcoredns-6799fbcd5-abcde");
    }

    #[test]
    fn test_pending_pod_has_no_ip() {
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some("web-0".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(pod_line(&pod), "<none>\tdefault\tweb-0");
    }

    #[test]
    fn test_api_server_url_and_scope() {
        assert_eq!(
            api_server_url("contoso-dns-1a2b3c.hcp.eastus.azmk8s.io"),
            "https://contoso-dns-1a2b3c.hcp.eastus.azmk8s.io:443"
        );
        assert_eq!(api_server_url("https://10.0.0.1:6443/"), "https://10.0.0.1:6443");
        assert_eq!(
            aad_scope("6dae42f8-4368-4678-94ff-3960e28e3630"),
            "6dae42f8-4368-4678-94ff-3960e28e3630/.default"
        );
        assert_eq!(aad_scope("api://aks/.default"), "api://aks/.default");
    }

    #[test]
    fn test_access_without_api_server_uses_kubeconfig() {
        let access = ClusterAccess::from_source(&MapSource::from([("TENANT_ID", "t")])).expect("access");
        assert!(matches!(access, ClusterAccess::Kubeconfig));
    }

    #[test]
    fn test_access_requires_service_principal() {
        let source = MapSource::from([
            ("AKS_API_SERVER", "contoso.hcp.eastus.azmk8s.io"),
            ("AKS_AAD_SERVER_ID", "6dae42f8-4368-4678-94ff-3960e28e3630"),
            ("TENANT_ID", "tenant"),
            ("APP_ID", "app"),
        ]);
        assert_eq!(
            ClusterAccess::from_source(&source).expect_err("PASSWD missing"),
            ConfigError::Missing("PASSWD")
        );

        let access = ClusterAccess::from_source(&source.with("PASSWD", "s3cret")).expect("access");
        match access {
            ClusterAccess::ServicePrincipal { identity, .. } => {
                assert_eq!(identity.kind(), "service-principal");
                assert!(!format!("{identity:?}").contains("s3cret"));
            }
            ClusterAccess::Kubeconfig => panic!("Expected ServicePrincipal access"),
        }
    }

    /// Self-signed P-256 CA, CN=aks-test-ca
    const TEST_CA_PEM: &str = "-----BEGIN CERTIFICATE-----
MIIBgzCCASmgAwIBAgIUZJgxjvOhWjtS+hFba3fvQeeSmVowCgYIKoZIzj0EAwIw
FjEUMBIGA1UEAwwLYWtzLXRlc3QtY2EwIBcNMjYxMDE4MTQxNzIyWhgPMjEyNjA5
MjQxNDE3MjJaMBYxFDASBgNVBAMMC2Frcy10ZXN0LWNhMFkwEwYHKoZIzj0CAQYI
KoZIzj0DAQcDQgAE77FuQhrGmXYbTtSQ9mxGmNiBW47aOxV1BZ9zuEULc1Xgzp9O
obVMyDUEqXA65/0tud/GS1ZYtGjAMksaxRWUdKNTMFEwHQYDVR0OBBYEFG4BOiAT
Ekoc/3/P8hKfyr4gZABTMB8GA1UdIwQYMBaAFG4BOiATEkoc/3/P8hKfyr4gZABT
MA8GA1UdEwEB/wQFMAMBAf8wCgYIKoZIzj0EAwIDSAAwRQIgDAh6ft6jUr/BcZvK
80I0TFXr0vaHwKrGzdxJ5W/wQxoCIQCKncMqP/NP4XuWVlWvPkhNYzeUOnxzhswz
o+uxrfebZg==
-----END CERTIFICATE-----
";

    #[test]
    fn test_pem_certificates() {
        let certificates = pem_certificates(TEST_CA_PEM).expect("pem");
        assert_eq!(certificates.len(), 1);
        // DER SEQUENCE with a two-byte length: 0x0183 + 4 header bytes
        assert_eq!(certificates[0].len(), 391);
        assert_eq!(certificates[0][..4], [0x30, 0x82, 0x01, 0x83]);

        let bundle = format!("# intermediate\n{TEST_CA_PEM}\n# root\n{TEST_CA_PEM}");
        assert_eq!(pem_certificates(&bundle).expect("bundle").len(), 2);
    }

    #[test]
    fn test_pem_without_certificate_is_rejected() {
        let err = pem_certificates("not a certificate").expect_err("no certificate block");
        assert!(err.to_string().contains("No certificate found"));

        pem_certificates("-----BEGIN CERTIFICATE-----\n!!!!\n-----END CERTIFICATE-----\n")
            .expect_err("invalid base64");
    }

    #[test]
    fn test_ca_bundle_is_read_from_file() {
        let path = std::env::temp_dir().join(format!("aks-ca-{}.pem", std::process::id()));
        std::fs::write(&path, TEST_CA_PEM).expect("write bundle");
        let certificates = read_ca_bundle(&path);
        std::fs::remove_file(&path).expect("remove bundle");

        assert_eq!(certificates.expect("bundle").len(), 1);
        read_ca_bundle(Path::new("/nonexistent/ca.pem")).expect_err("missing file");
    }
}
