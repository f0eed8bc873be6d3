//! Follow-up URI loading over a real HTTP server.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use stetho_specs::{LoadOptions, SpecLoader, SpecSource};

const EXTRA_SPEC: &str = r"
apiVersion: stetho.dev/v1beta2
kind: SupportBundle
metadata:
  name: extra
spec:
  analyzers:
    - clusterVersion:
        checkName: Extra Check
        outcomes:
          - pass:
              when: '>= 1.20.0'
              message: ok
";

fn primary_spec(uri: &str) -> String {
    format!(
        r"
apiVersion: stetho.dev/v1beta2
kind: SupportBundle
metadata:
  name: primary
spec:
  uri: {uri}
  analyzers:
    - clusterVersion:
        checkName: Primary Check
        outcomes:
          - pass:
              when: '>= 1.20.0'
              message: ok
"
    )
}

#[tokio::test]
async fn uri_referenced_spec_is_fetched_and_merged() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/extra.yaml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(EXTRA_SPEC))
        .expect(1)
        .mount(&server)
        .await;

    let mut loader = SpecLoader::new(LoadOptions::default(), None).unwrap();
    let set = loader
        .load(&[SpecSource::Inline(primary_spec(&format!(
            "{}/extra.yaml",
            server.uri()
        )))])
        .await
        .unwrap();

    assert_eq!(set.support_bundles.len(), 2);
    // The primary's uri was cleared before the merge.
    assert!(set.support_bundles.iter().all(|sb| sb.spec.uri.is_none()));

    let titles: Vec<String> = set
        .all_analyzers()
        .iter()
        .map(stetho_specs::types::AnalyzerSpec::title)
        .collect();
    assert_eq!(
        titles,
        vec!["Primary Check".to_string(), "Extra Check".to_string()]
    );
}

#[tokio::test]
async fn self_referencing_uri_is_fetched_once() {
    let server = MockServer::start().await;
    let url = format!("{}/loop.yaml", server.uri());

    // The downloaded spec points back at itself; the visited set must
    // stop the second fetch.
    Mock::given(method("GET"))
        .and(path("/loop.yaml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(primary_spec(&url)))
        .expect(1)
        .mount(&server)
        .await;

    let mut loader = SpecLoader::new(LoadOptions::default(), None).unwrap();
    let set = loader
        .load(&[SpecSource::Inline(primary_spec(&url))])
        .await
        .unwrap();

    assert_eq!(set.support_bundles.len(), 2);
}

#[tokio::test]
async fn unreachable_uri_is_not_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/extra.yaml"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut loader = SpecLoader::new(LoadOptions::default(), None).unwrap();
    let set = loader
        .load(&[SpecSource::Inline(primary_spec(&format!(
            "{}/extra.yaml",
            server.uri()
        )))])
        .await
        .unwrap();

    assert_eq!(set.support_bundles.len(), 1);
}

#[tokio::test]
async fn no_uri_skips_the_download() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/extra.yaml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(EXTRA_SPEC))
        .expect(0)
        .mount(&server)
        .await;

    let options = LoadOptions {
        no_uri: true,
        ..LoadOptions::default()
    };
    let mut loader = SpecLoader::new(options, None).unwrap();
    let set = loader
        .load(&[SpecSource::Inline(primary_spec(&format!(
            "{}/extra.yaml",
            server.uri()
        )))])
        .await
        .unwrap();

    assert_eq!(set.support_bundles.len(), 1);
    assert!(set.support_bundles[0].spec.uri.is_none());
}
