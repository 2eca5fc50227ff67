use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::*;
use crate::secrets::{MemoryStore, StaticBackend};
use crate::testing::{self, BASE_A, BASE_B, DEVICE_ID, FakeArray};

fn manager(array: &Arc<FakeArray>) -> SessionManager {
	manager_with(array, testing::config(), testing::collaborators())
}

fn manager_with(array: &Arc<FakeArray>, config: ClientConfig, collaborators: Collaborators) -> SessionManager {
	SessionManager::new(config, array.clone(), AdmissionGate::new(4), collaborators)
}

#[tokio::test]
async fn login_populates_session() {
	let array = FakeArray::new();
	let manager = manager(&array);
	assert_eq!(manager.state(), SessionState::Unauthenticated);
	assert!(manager.route().is_none());

	manager.login().await.unwrap();

	assert_eq!(manager.state(), SessionState::Active);
	assert_eq!(manager.base_url().as_deref(), Some(BASE_A));
	assert_eq!(manager.device_id().as_deref(), Some(DEVICE_ID));
	assert_eq!(manager.route().unwrap().token, "tok-1");

	let login = &array.requests()[0];
	assert_eq!(login.url, format!("{BASE_A}/xxxxx/sessions"));
	assert_eq!(login.body.as_deref(), Some(&json!({"username": "admin", "password": "hunter2", "scope": "0"})));
	assert!(login.token.is_none());
}

#[tokio::test]
async fn auth_mode_overrides_scope() {
	let array = FakeArray::new();
	let store = Arc::new(MemoryStore::new());
	store.insert_secret(testing::secret_ref(), Secret::new("hunter2", Some("1".into())));
	let manager = manager_with(&array, testing::config(), Collaborators::new(store));

	manager.login().await.unwrap();
	assert_eq!(array.requests()[0].body.as_ref().unwrap()["scope"], "1");
}

#[tokio::test]
async fn login_fails_over_to_next_reachable_url() {
	let array = FakeArray::new();
	array.set_unreachable(BASE_A);
	let manager = manager(&array);

	manager.login().await.unwrap();

	assert_eq!(manager.base_url().as_deref(), Some(BASE_B));
	assert_eq!(manager.state(), SessionState::Active);
	assert_eq!(array.requests().len(), 2);
}

#[tokio::test]
async fn all_urls_unreachable() {
	let array = FakeArray::new();
	array.set_unreachable(BASE_A);
	array.set_unreachable(BASE_B);
	let manager = manager(&array);

	let err = manager.login().await.unwrap_err();
	assert!(matches!(err, Error::AllEndpointsUnreachable { attempted: 2, ref last_error } if last_error.contains("array-b")));
	assert_eq!(manager.state(), SessionState::Unauthenticated);
	assert!(manager.base_url().is_none());
}

#[tokio::test]
async fn rejected_certificates_are_not_reported_as_unreachable() {
	let array = FakeArray::new();
	array.reject_certificates(false);
	let manager = manager(&array);

	let err = manager.login().await.unwrap_err();

	assert!(matches!(err, Error::Certificate(ref message) if message.contains("UnknownIssuer")), "got {err:?}");
	assert_eq!(array.requests().len(), 2);
	assert_eq!(manager.state(), SessionState::Unauthenticated);
}

#[tokio::test]
async fn failover_reuses_one_login_body() {
	let array = FakeArray::new();
	array.set_unreachable(BASE_A);
	let manager = manager(&array);

	manager.login().await.unwrap();

	let sent = array.requests();
	let (first, second) = (sent[0].body.as_ref().unwrap(), sent[1].body.as_ref().unwrap());
	assert!(Arc::ptr_eq(first, second));
}

#[tokio::test]
async fn no_candidates_is_unreachable() {
	let array = FakeArray::new();
	let mut config = testing::config();
	config.base_urls.clear();
	let manager = manager_with(&array, config, testing::collaborators());

	assert!(matches!(manager.login().await, Err(Error::AllEndpointsUnreachable { attempted: 0, .. })));
}

#[tokio::test]
async fn rejected_login_is_not_failed_over() {
	let array = FakeArray::new();
	array.set_login_reply(json!({"error": {"code": codes::AUTH_FAILED, "description": "bad password"}}));
	let manager = manager(&array);

	let err = manager.login().await.unwrap_err();
	match err {
		Error::LoginRejected { url, code, description } => {
			assert_eq!(url, BASE_A);
			assert_eq!(code, codes::AUTH_FAILED);
			assert_eq!(description, "bad password");
		}
		other => panic!("expected LoginRejected, got {other:?}"),
	}
	assert_eq!(array.requests().len(), 1);
	assert_eq!(manager.state(), SessionState::Unauthenticated);
}

#[tokio::test]
async fn login_reply_without_token_is_invalid() {
	let array = FakeArray::new();
	array.set_login_reply(json!({"error": {"code": 0}, "data": {"deviceid": "1", "accountstate": 1}}));

	let err = manager(&array).login().await.unwrap_err();
	assert!(matches!(err, Error::InvalidLoginResponse(LoginResponseError::MissingField("iBaseToken"))));
}

#[tokio::test]
async fn login_reply_without_data_is_invalid() {
	let array = FakeArray::new();
	array.set_login_reply(json!({"error": {"code": 0}}));

	let err = manager(&array).login().await.unwrap_err();
	assert!(matches!(err, Error::InvalidLoginResponse(LoginResponseError::MissingData)));
}

#[tokio::test]
async fn unusable_account_states_are_rejected() {
	for (reply_state, expected) in [(json!(2), Some(2)), (json!(5), Some(5)), (json!(null), None)] {
		let array = FakeArray::new();
		array.set_login_reply(json!({
			"error": {"code": 0},
			"data": {"deviceid": "1", "iBaseToken": "t", "accountstate": reply_state}
		}));
		let manager = manager(&array);

		match manager.login().await {
			Err(Error::AccountStateInvalid { state }) => assert_eq!(state, expected),
			other => panic!("expected AccountStateInvalid, got {other:?}"),
		}
		assert_eq!(manager.state(), SessionState::Unauthenticated);
	}
}

#[tokio::test]
async fn usable_account_states_are_accepted() {
	for state in [1, 3, 4, 6] {
		let array = FakeArray::new();
		array.set_login_reply(json!({
			"error": {"code": 0},
			"data": {"deviceid": "1", "iBaseToken": "t", "accountstate": state, "vstoreName": "tenant"}
		}));
		let manager = manager(&array);

		manager.login().await.unwrap();
		assert_eq!(manager.vstore_name().as_deref(), Some("tenant"));
	}
}

#[tokio::test]
async fn stale_snapshot_skips_relogin() {
	let array = FakeArray::new();
	let manager = manager(&array);
	manager.login().await.unwrap();
	let stale = manager.token_snapshot();

	manager.relogin(&stale).await.unwrap();
	assert_eq!(array.logins(), 2);
	assert_eq!(array.logouts(), 1);

	manager.relogin(&stale).await.unwrap();
	assert_eq!(array.logins(), 2, "snapshot no longer matches, no network work expected");
	assert_eq!(array.logouts(), 1);
	assert_eq!(manager.route().unwrap().token, "tok-2");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_relogins_issue_one_login() {
	let array = FakeArray::with_latency(Duration::from_millis(20));
	let manager = Arc::new(manager(&array));
	manager.login().await.unwrap();
	let stale = manager.token_snapshot();

	let tasks: Vec<_> = (0..16)
		.map(|_| {
			let manager = manager.clone();
			let stale = stale.clone();
			tokio::spawn(async move { manager.relogin(&stale).await })
		})
		.collect();
	for result in futures_util::future::join_all(tasks).await {
		result.unwrap().unwrap();
	}

	assert_eq!(array.logins(), 2);
	assert_eq!(array.logouts(), 1);
	assert_eq!(manager.route().unwrap().token, "tok-2");
	assert_eq!(manager.state(), SessionState::Active);
}

#[tokio::test]
async fn ensure_route_logs_in_lazily() {
	let array = FakeArray::new();
	let manager = manager(&array);

	let route = manager.ensure_route().await.unwrap();
	assert_eq!(route.base_url, BASE_A);
	assert_eq!(array.logins(), 1);

	manager.ensure_route().await.unwrap();
	assert_eq!(array.logins(), 1);
}

#[tokio::test]
async fn logout_is_best_effort() {
	let array = FakeArray::new();
	let manager = manager(&array);
	manager.login().await.unwrap();

	array.set_unreachable(BASE_A);
	manager.logout().await;

	assert_eq!(manager.state(), SessionState::LoggedOut);
	assert!(manager.route().is_none());
	let last = array.requests().pop().unwrap();
	assert_eq!(last.method, Method::DELETE);
	assert_eq!(last.url, format!("{BASE_A}/{DEVICE_ID}/sessions"));
	assert_eq!(last.token.as_deref(), Some("tok-1"));
}

#[tokio::test]
async fn logout_without_session_sends_nothing() {
	let array = FakeArray::new();
	let manager = manager(&array);
	manager.logout().await;
	assert!(array.requests().is_empty());
	assert_eq!(manager.state(), SessionState::LoggedOut);
}

#[tokio::test]
async fn missing_secret_is_refreshed_from_backend_once() {
	let array = FakeArray::new();
	let store = Arc::new(MemoryStore::new());
	let rotated = SecretRef::new("storage", "array-admin-v2");
	store.insert_secret(rotated.clone(), Secret::new("rotated", None));
	let backend = Arc::new(StaticBackend::new(rotated));
	let manager = manager_with(&array, testing::config(), Collaborators::new(store).with_backend(backend));

	manager.login().await.unwrap();
	assert_eq!(array.requests()[0].body.as_ref().unwrap()["password"], "rotated");
}

#[tokio::test]
async fn missing_secret_without_backend_fails() {
	let array = FakeArray::new();
	let manager = manager_with(&array, testing::config(), Collaborators::new(Arc::new(MemoryStore::new())));

	let err = manager.login().await.unwrap_err();
	assert!(matches!(err, Error::SecretNotFound { ref name, .. } if name == "array-admin"));
	assert!(array.requests().is_empty());
}

#[tokio::test]
async fn secret_reference_can_come_from_backend_alone() {
	let array = FakeArray::new();
	let mut config = testing::config();
	config.secret = None;
	let backend = Arc::new(StaticBackend::new(testing::secret_ref()));
	let manager = manager_with(&array, config, Collaborators::new(testing::store()).with_backend(backend));

	manager.login().await.unwrap();
	assert_eq!(manager.state(), SessionState::Active);
}

#[tokio::test]
async fn tls_follows_backend_and_config() {
	let config = testing::config();
	assert_eq!(resolve_tls(&config, &testing::collaborators()).await.unwrap(), TlsSettings::insecure());

	let mut verifying = testing::config();
	verifying.use_certificate = true;
	assert_eq!(resolve_tls(&verifying, &testing::collaborators()).await.unwrap(), TlsSettings::system_roots());

	let store = Arc::new(MemoryStore::new());
	store.insert_certificate(SecretRef::new("storage", "array-ca"), b"PEM".to_vec());
	let backend = Arc::new(StaticBackend::new(testing::secret_ref()).with_certificate(SecretRef::new("storage", "array-ca")));
	let collaborators = testing::collaborators().with_certificates(store).with_backend(backend);
	assert_eq!(resolve_tls(&config, &collaborators).await.unwrap(), TlsSettings::with_ca_pem(b"PEM".to_vec()));

	let mut missing_store = testing::config();
	missing_store.use_certificate = true;
	missing_store.certificate = Some(SecretRef::new("storage", "array-ca"));
	assert!(matches!(resolve_tls(&missing_store, &testing::collaborators()).await, Err(Error::Secret(_))));
}
