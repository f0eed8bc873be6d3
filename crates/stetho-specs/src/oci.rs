//! Spec artifact pulls from OCI registries.
//!
//! Speaks enough of the registry v2 protocol to fetch a single spec layer:
//! anonymous bearer-token exchange, manifest fetch, blob download. A
//! missing tag or empty manifest is reported as "no release", which the
//! loader maps to the spec-issue exit path.

use serde::Deserialize;

use crate::error::SpecError;

/// Media type of the spec layer inside a release artifact.
pub const SPEC_LAYER_MEDIA_TYPE: &str = "application/vnd.stetho.spec.v1+yaml";

const MANIFEST_ACCEPT: &str = "application/vnd.oci.image.manifest.v1+json, \
     application/vnd.docker.distribution.manifest.v2+json";

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    layers: Vec<Layer>,
}

#[derive(Debug, Deserialize)]
struct Layer {
    #[serde(rename = "mediaType", default)]
    media_type: String,
    digest: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: String,
    #[serde(default)]
    access_token: String,
}

/// A parsed `oci://host/repository[:tag]` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OciReference {
    pub registry: String,
    pub repository: String,
    pub tag: String,
}

impl OciReference {
    pub fn parse(reference: &str) -> Result<Self, SpecError> {
        let rest = reference
            .strip_prefix("oci://")
            .ok_or_else(|| SpecError::UnknownSource {
                value: reference.to_string(),
            })?;
        let (registry, path) = rest.split_once('/').ok_or_else(|| SpecError::UnknownSource {
            value: reference.to_string(),
        })?;
        if registry.is_empty() || path.is_empty() {
            return Err(SpecError::UnknownSource {
                value: reference.to_string(),
            });
        }
        // The tag separator is a colon after the final path segment; a
        // colon in the registry part is a port.
        let (repository, tag) = match path.rsplit_once(':') {
            Some((repo, tag)) if !tag.contains('/') => (repo.to_string(), tag.to_string()),
            _ => (path.to_string(), "latest".to_string()),
        };
        Ok(Self {
            registry: registry.to_string(),
            repository,
            tag,
        })
    }
}

/// Pull the spec payload of a release artifact.
pub async fn pull(http: &reqwest::Client, reference: &str) -> Result<String, SpecError> {
    let parsed = OciReference::parse(reference)?;
    let manifest_url = format!(
        "https://{}/v2/{}/manifests/{}",
        parsed.registry, parsed.repository, parsed.tag
    );

    let (response, token) = get_with_auth(http, &manifest_url, MANIFEST_ACCEPT, None).await?;
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(SpecError::OciNoRelease {
            reference: reference.to_string(),
        });
    }
    let manifest: Manifest = check(response, reference)
        .await?
        .json()
        .await
        .map_err(|e| SpecError::Oci {
            reference: reference.to_string(),
            reason: e.to_string(),
        })?;

    let layer = manifest
        .layers
        .iter()
        .find(|l| l.media_type == SPEC_LAYER_MEDIA_TYPE)
        .or_else(|| manifest.layers.first())
        .ok_or_else(|| SpecError::OciNoRelease {
            reference: reference.to_string(),
        })?;

    let blob_url = format!(
        "https://{}/v2/{}/blobs/{}",
        parsed.registry, parsed.repository, layer.digest
    );
    let (response, _) = get_with_auth(http, &blob_url, "*/*", token.as_deref()).await?;
    check(response, reference)
        .await?
        .text()
        .await
        .map_err(|e| SpecError::Oci {
            reference: reference.to_string(),
            reason: e.to_string(),
        })
}

/// GET with an anonymous bearer-token retry on 401.
async fn get_with_auth(
    http: &reqwest::Client,
    url: &str,
    accept: &str,
    token: Option<&str>,
) -> Result<(reqwest::Response, Option<String>), SpecError> {
    let mut request = http.get(url).header(reqwest::header::ACCEPT, accept);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    let response = request.send().await.map_err(|e| SpecError::Http {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if response.status() != reqwest::StatusCode::UNAUTHORIZED || token.is_some() {
        return Ok((response, token.map(str::to_string)));
    }

    let challenge = response
        .headers()
        .get(reqwest::header::WWW_AUTHENTICATE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_default();
    let fresh = exchange_token(http, &challenge).await?;
    let response = http
        .get(url)
        .header(reqwest::header::ACCEPT, accept)
        .bearer_auth(&fresh)
        .send()
        .await
        .map_err(|e| SpecError::Http {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
    Ok((response, Some(fresh)))
}

/// Resolve a `Bearer realm=…,service=…,scope=…` challenge anonymously.
async fn exchange_token(http: &reqwest::Client, challenge: &str) -> Result<String, SpecError> {
    let fields: std::collections::HashMap<&str, &str> = challenge
        .trim_start_matches("Bearer ")
        .split(',')
        .filter_map(|part| {
            let (key, value) = part.split_once('=')?;
            Some((key.trim(), value.trim().trim_matches('"')))
        })
        .collect();
    let realm = fields.get("realm").ok_or_else(|| SpecError::Oci {
        reference: String::new(),
        reason: format!("unparseable auth challenge {challenge:?}"),
    })?;

    let mut request = http.get(*realm);
    if let Some(service) = fields.get("service") {
        request = request.query(&[("service", *service)]);
    }
    if let Some(scope) = fields.get("scope") {
        request = request.query(&[("scope", *scope)]);
    }
    let token: TokenResponse = request
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| SpecError::Http {
            url: (*realm).to_string(),
            reason: e.to_string(),
        })?
        .json()
        .await
        .map_err(|e| SpecError::Http {
            url: (*realm).to_string(),
            reason: e.to_string(),
        })?;

    if !token.token.is_empty() {
        Ok(token.token)
    } else {
        Ok(token.access_token)
    }
}

async fn check(
    response: reqwest::Response,
    reference: &str,
) -> Result<reqwest::Response, SpecError> {
    if response.status().is_success() {
        return Ok(response);
    }
    Err(SpecError::Oci {
        reference: reference.to_string(),
        reason: format!("registry returned {}", response.status()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reference_with_tag() {
        let parsed = OciReference::parse("oci://registry.example.com/acme/bundle:1.2.0").unwrap();
        assert_eq!(parsed.registry, "registry.example.com");
        assert_eq!(parsed.repository, "acme/bundle");
        assert_eq!(parsed.tag, "1.2.0");
    }

    #[test]
    fn defaults_tag_to_latest_and_keeps_registry_port() {
        let parsed = OciReference::parse("oci://registry.example.com:5000/acme/bundle").unwrap();
        assert_eq!(parsed.registry, "registry.example.com:5000");
        assert_eq!(parsed.repository, "acme/bundle");
        assert_eq!(parsed.tag, "latest");
    }

    #[test]
    fn rejects_bare_host() {
        assert!(OciReference::parse("oci://registry.example.com").is_err());
        assert!(OciReference::parse("https://not-oci").is_err());
    }
}
