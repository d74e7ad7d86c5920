//! Full node lifecycle through the `NodeService` trait:
//! register → authenticate → rotate → rotate again with the original token.

use std::sync::Arc;
use std::time::Duration;

use rcgen::{BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair};
use tonic::{Code, Request};

use luminous_core::crypto::CertificateAuthority;
use luminous_core::protocol::{
    AuthenticationRequest, ControlPlaneInfo, NodeBasicInfo, NodeCapabilities, NodeService,
    RegisterNodeRequest, TokenRotationRequest, AUTHORIZATION_HEADER, NODE_ID_HEADER,
};
use luminous_server::grpc::{ControlPlaneService, StreamLimits};
use luminous_server::metrics::{MetricsSink, RecordingMetrics};
use luminous_server::services::{AuthManager, NodeRegistry};

fn authority() -> CertificateAuthority {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, "Scenario CA");
    params.distinguished_name = dn;
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let cert = params.self_signed(&key).unwrap();
    CertificateAuthority::from_pem(&cert.pem(), &key.serialize_pem()).unwrap()
}

fn node_csr(hostname: &str) -> Vec<u8> {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(vec![hostname.to_string()]).unwrap();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, hostname);
    params.distinguished_name = dn;
    params.serialize_request(&key).unwrap().der().to_vec()
}

fn service(revoke_on_rotate: bool) -> ControlPlaneService {
    let auth = Arc::new(AuthManager::new(
        Arc::new(authority()),
        b"scenario-secret",
        Duration::from_secs(3600),
        revoke_on_rotate,
    ));
    let registry = Arc::new(NodeRegistry::new(Duration::from_secs(3600)));
    let metrics: Arc<dyn MetricsSink> = Arc::new(RecordingMetrics::new());

    ControlPlaneService::new(
        auth,
        registry,
        metrics,
        ControlPlaneInfo {
            api_endpoint: "control-plane.test:50051".into(),
            ca_certificate: b"ca".to_vec(),
            ..Default::default()
        },
        StreamLimits {
            queue_capacity: 100,
            send_timeout: Duration::from_secs(5),
        },
    )
}

fn authed<T>(message: T, node_id: &str, token: &str) -> Request<T> {
    let mut request = Request::new(message);
    request
        .metadata_mut()
        .insert(AUTHORIZATION_HEADER, format!("Bearer {token}").parse().unwrap());
    request
        .metadata_mut()
        .insert(NODE_ID_HEADER, node_id.parse().unwrap());
    request
}

struct Enrolled {
    node_id: String,
    token: String,
    session_id: String,
    token_expiry: i64,
}

async fn enroll(service: &ControlPlaneService) -> Enrolled {
    let registered = service
        .register_node(Request::new(RegisterNodeRequest {
            bootstrap_token: "pre-shared".into(),
            csr: node_csr("worker-7.local"),
            basic_info: Some(NodeBasicInfo {
                hostname: "worker-7".into(),
                ..Default::default()
            }),
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(registered.success, "{}", registered.message);
    assert!(!registered.node_id.is_empty());
    assert!(!registered.initial_auth_token.is_empty());
    assert_eq!(
        registered.control_plane_info.unwrap().api_endpoint,
        "control-plane.test:50051"
    );

    let node_id = registered.node_id;
    let token = registered.initial_auth_token;

    let authenticated = service
        .authenticate(authed(
            AuthenticationRequest {
                node_id: node_id.clone(),
                auth_token: token.clone(),
                certificate: registered.signed_certificate,
                basic_info: Some(NodeBasicInfo {
                    hostname: "worker-7".into(),
                    ..Default::default()
                }),
                capabilities: Some(NodeCapabilities {
                    features: vec!["gpu".into()],
                    ..Default::default()
                }),
            },
            &node_id,
            &token,
        ))
        .await
        .unwrap()
        .into_inner();
    assert!(authenticated.success, "{}", authenticated.message);
    assert_eq!(authenticated.message, "Authentication successful");
    assert!(!authenticated.session_id.is_empty());
    assert!(authenticated.initial_config.is_some());

    Enrolled {
        node_id,
        token,
        session_id: authenticated.session_id,
        token_expiry: authenticated.token_expiry,
    }
}

fn rotation(enrolled: &Enrolled, current_token: &str) -> Request<TokenRotationRequest> {
    authed(
        TokenRotationRequest {
            node_id: enrolled.node_id.clone(),
            session_id: enrolled.session_id.clone(),
            current_token: current_token.to_string(),
        },
        &enrolled.node_id,
        current_token,
    )
}

#[tokio::test]
async fn test_register_authenticate_rotate() {
    let service = service(false);
    let enrolled = enroll(&service).await;

    // Expiry has one-second resolution
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let rotated = service
        .rotate_token(rotation(&enrolled, &enrolled.token))
        .await
        .unwrap()
        .into_inner();
    assert_ne!(rotated.new_token, enrolled.token);
    assert!(rotated.expiry > enrolled.token_expiry);

    // Superseded token stays valid until its own expiry
    let again = service
        .rotate_token(rotation(&enrolled, &enrolled.token))
        .await
        .unwrap()
        .into_inner();
    assert_ne!(again.new_token, rotated.new_token);

    // The rotated token works as well
    service
        .rotate_token(rotation(&enrolled, &rotated.new_token))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_rotation_revokes_superseded_token_when_configured() {
    let service = service(true);
    let enrolled = enroll(&service).await;

    let rotated = service
        .rotate_token(rotation(&enrolled, &enrolled.token))
        .await
        .unwrap()
        .into_inner();

    let status = service
        .rotate_token(rotation(&enrolled, &enrolled.token))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unauthenticated);

    service
        .rotate_token(rotation(&enrolled, &rotated.new_token))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_certificate_from_foreign_ca_is_refused() {
    let service = service(false);
    let foreign = service_certificate_from(&authority());

    let registered = service
        .register_node(Request::new(RegisterNodeRequest {
            bootstrap_token: "pre-shared".into(),
            csr: node_csr("worker-8.local"),
            basic_info: None,
        }))
        .await
        .unwrap()
        .into_inner();

    let response = service
        .authenticate(authed(
            AuthenticationRequest {
                node_id: registered.node_id.clone(),
                auth_token: registered.initial_auth_token.clone(),
                certificate: foreign,
                ..Default::default()
            },
            &registered.node_id,
            &registered.initial_auth_token,
        ))
        .await
        .unwrap()
        .into_inner();

    assert!(!response.success);
    assert_eq!(response.message, "Invalid certificate");
    assert!(response.session_id.is_empty());
}

fn service_certificate_from(ca: &CertificateAuthority) -> Vec<u8> {
    ca.sign_request(&node_csr("impostor.local"))
        .unwrap()
        .into_bytes()
}
