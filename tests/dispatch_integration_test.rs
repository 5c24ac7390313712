//! End-to-end dispatch against a fake push service.
//!
//! Uses the real reqwest transport and JSON subscription store; the push
//! service is a wiremock server, and received bodies are decrypted the way
//! a browser would.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes128Gcm, Nonce,
};
use clinic_push::notifications::base64url;
use clinic_push::notifications::dispatch::DispatcherOptions;
use clinic_push::notifications::jwt::VapidClaims;
use clinic_push::notifications::provider::{CryptoProvider, EphemeralKeyPair, RustCryptoProvider};
use clinic_push::notifications::store::{FileSubscriptionStore, SubscriptionStore};
use clinic_push::notifications::transport::ReqwestHttpClient;
use clinic_push::{DispatchOutcome, DispatchRequest, Dispatcher, PushSubscription, VapidIdentity, VapidKeys};
use hkdf::Hkdf;
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const AUTH: [u8; 16] = [0x42; 16];

struct Browser {
    keys: EphemeralKeyPair,
}

impl Browser {
    fn new() -> Self {
        Self {
            keys: RustCryptoProvider.generate_key_pair().unwrap(),
        }
    }

    fn subscription(&self, endpoint: String) -> PushSubscription {
        PushSubscription {
            endpoint,
            p256dh: base64url::encode(self.keys.public),
            auth: base64url::encode(AUTH),
        }
    }

    fn decrypt(&self, envelope: &[u8]) -> Vec<u8> {
        let salt = &envelope[..16];
        let as_public = &envelope[21..86];
        let ecdh = RustCryptoProvider.ecdh(&self.keys.secret, as_public).unwrap();

        let mut key_info = b"WebPush: info\0".to_vec();
        key_info.extend_from_slice(&self.keys.public);
        key_info.extend_from_slice(as_public);
        let mut ikm = [0u8; 32];
        Hkdf::<Sha256>::new(Some(&AUTH), &ecdh)
            .expand(&key_info, &mut ikm)
            .unwrap();

        let hk = Hkdf::<Sha256>::new(Some(salt), &ikm);
        let mut cek = [0u8; 16];
        hk.expand(b"Content-Encoding: aes128gcm\0", &mut cek).unwrap();
        let mut nonce = [0u8; 12];
        hk.expand(b"Content-Encoding: nonce\0", &mut nonce).unwrap();

        let mut plaintext = Aes128Gcm::new_from_slice(&cek)
            .unwrap()
            .decrypt(Nonce::from_slice(&nonce), &envelope[86..])
            .unwrap();
        assert_eq!(plaintext.pop(), Some(0x02));
        plaintext
    }
}

fn identity() -> VapidIdentity {
    let keys = VapidKeys::generate(&RustCryptoProvider).unwrap();
    VapidIdentity::new(keys, "mailto:reminders@clinic.example").unwrap()
}

fn dispatcher(store: Arc<FileSubscriptionStore>) -> Dispatcher {
    Dispatcher::new(identity(), Arc::new(ReqwestHttpClient::new().unwrap()), store).with_options(
        DispatcherOptions {
            send_timeout: Duration::from_millis(500),
            ..DispatcherOptions::default()
        },
    )
}

#[tokio::test]
async fn test_no_subscriptions_makes_no_requests() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = Arc::new(FileSubscriptionStore::open(dir.path().join("subs.json")).unwrap());

    let outcome = dispatcher(store)
        .dispatch(&DispatchRequest::new("patient-1", "Reminder", "Tomorrow 10:00"))
        .await
        .unwrap();

    assert_eq!(
        serde_json::to_value(&outcome).unwrap(),
        serde_json::json!({"sent": 0, "removed": 0, "failed": 0, "reason": "no_subscriptions"})
    );
}

#[tokio::test]
async fn test_created_gone_and_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/push/ok"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/push/gone"))
        .respond_with(ResponseTemplate::new(410))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/push/slow"))
        .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_secs(10)))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = Arc::new(FileSubscriptionStore::open(dir.path().join("subs.json")).unwrap());
    let browser = Browser::new();
    for name in ["ok", "gone", "slow"] {
        store
            .upsert("patient-1", browser.subscription(format!("{}/push/{name}", server.uri())))
            .await
            .unwrap();
    }

    let outcome = dispatcher(Arc::clone(&store))
        .dispatch(&DispatchRequest::new("patient-1", "Reminder", "Tomorrow 10:00"))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        DispatchOutcome {
            sent: 1,
            removed: 1,
            failed: 1,
            reason: None
        }
    );

    let remaining: Vec<String> = store
        .list_subscriptions("patient-1")
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.subscription.endpoint)
        .collect();
    assert_eq!(remaining.len(), 2);
    assert!(remaining.iter().all(|e| !e.ends_with("/push/gone")));

    // The deletion was persisted.
    let reopened = FileSubscriptionStore::open(store.path()).unwrap();
    assert_eq!(reopened.list_subscriptions("patient-1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_request_is_decryptable_and_authenticated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/push/abc"))
        .and(header("Content-Type", "application/octet-stream"))
        .and(header("Content-Encoding", "aes128gcm"))
        .and(header("TTL", "86400"))
        .and(header("Urgency", "high"))
        .and(header_regex(
            "Authorization",
            r"^vapid t=[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+, k=[A-Za-z0-9_-]+$",
        ))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = Arc::new(FileSubscriptionStore::open(dir.path().join("subs.json")).unwrap());
    let browser = Browser::new();
    store
        .upsert("patient-1", browser.subscription(format!("{}/push/abc", server.uri())))
        .await
        .unwrap();

    let request = DispatchRequest::new("patient-1", "Reminder", "Dr. Silva at 10:00")
        .with_tag("appointment-7")
        .with_url("/appointments/7");
    let outcome = dispatcher(store).dispatch(&request).await.unwrap();
    assert_eq!(outcome.sent, 1);

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);

    let plaintext = browser.decrypt(&received[0].body);
    let payload: serde_json::Value = serde_json::from_slice(&plaintext).unwrap();
    assert_eq!(
        payload,
        serde_json::json!({
            "title": "Reminder",
            "body": "Dr. Silva at 10:00",
            "tag": "appointment-7",
            "url": "/appointments/7"
        })
    );

    let authorization = received[0]
        .headers
        .get("Authorization")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let token = authorization
        .strip_prefix("vapid t=")
        .unwrap()
        .split(", k=")
        .next()
        .unwrap();
    let claims: VapidClaims =
        serde_json::from_slice(&base64url::decode(token.split('.').nth(1).unwrap()).unwrap()).unwrap();
    assert_eq!(claims.aud, server.uri());
    assert_eq!(claims.sub, "mailto:reminders@clinic.example");
}
