//! Helpers shared by the relay's unit tests.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use http::{HeaderMap, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::elliptic_curve::rand_core::OsRng;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;

pub fn b64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Signs VAPID tokens the way a push-sending application server does.
pub struct VapidSigner {
    key: SigningKey,
}

impl VapidSigner {
    pub fn new() -> Self {
        Self {
            key: SigningKey::random(&mut OsRng),
        }
    }

    /// Uncompressed public point, as registered through `/webpushserverkey`.
    pub fn public_key(&self) -> Vec<u8> {
        self.key
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }

    pub fn public_key_base64url(&self) -> String {
        b64url(&self.public_key())
    }

    pub fn public_key_standard_base64(&self) -> String {
        STANDARD.encode(self.public_key())
    }

    pub fn crypto_key_header(&self) -> String {
        format!("p256ecdsa={}", self.public_key_base64url())
    }

    /// Compact ES256 JWS over `claims`.
    pub fn sign(&self, claims: &serde_json::Value) -> String {
        let header = b64url(br#"{"typ":"JWT","alg":"ES256"}"#);
        let payload = b64url(&serde_json::to_vec(claims).unwrap());
        let signing_input = format!("{header}.{payload}");
        let signature: Signature = self.key.sign(signing_input.as_bytes());
        format!("{signing_input}.{}", b64url(&signature.to_bytes()))
    }

    pub fn authorization_header(&self) -> String {
        let token = self.sign(&serde_json::json!({
            "aud": "https://fcm.googleapis.com",
            "exp": unix_now() + 3600,
            "sub": "mailto:push@example.com",
        }));
        format!("WebPush {token}")
    }
}

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// In-process HTTP server standing in for the push service.
pub struct UpstreamStub {
    pub url: url::Url,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl UpstreamStub {
    /// Answers every request with `status` and `response_body`, after `delay`.
    pub async fn start(status: StatusCode, response_body: &'static str, delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to address");
        let port = listener.local_addr().unwrap().port();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let captured = requests.clone();
        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let io = TokioIo::new(stream);
                let captured = captured.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let captured = captured.clone();
                        async move {
                            let (parts, body) = req.into_parts();
                            let body = body.collect().await.unwrap().to_bytes();
                            captured.lock().unwrap().push(CapturedRequest {
                                headers: parts.headers,
                                body,
                            });
                            tokio::time::sleep(delay).await;

                            let response = Response::builder()
                                .status(status)
                                .header("content-type", "application/json")
                                .body(Full::new(Bytes::from_static(response_body.as_bytes())))
                                .unwrap();
                            Ok::<_, Infallible>(response)
                        }
                    });
                    let _ = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                        .serve_connection(io, service)
                        .await;
                });
            }
        });

        Self {
            url: url::Url::parse(&format!("http://127.0.0.1:{port}/fcm/send")).unwrap(),
            requests,
        }
    }

    pub async fn responding(status: StatusCode, response_body: &'static str) -> Self {
        Self::start(status, response_body, Duration::ZERO).await
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// URL of a port with nothing listening on it.
pub async fn closed_port_url() -> url::Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    url::Url::parse(&format!("http://127.0.0.1:{port}/fcm/send")).unwrap()
}
