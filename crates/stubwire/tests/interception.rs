//! End-to-end interception scenarios driven through the public API.

use serde_json::json;
use std::time::Duration;
use stubwire::{
    EngineError, HttpClient, Interceptor, RequestConfig, ResponseSpec, UrlMatcher,
};

fn setup() -> (HttpClient, Interceptor) {
    stubwire::init_logging();
    let client = HttpClient::new();
    let interceptor = Interceptor::new();
    interceptor.install(&client).unwrap();
    (client, interceptor)
}

#[tokio::test]
async fn test_exact_stub_fulfills_call() {
    let (client, interceptor) = setup();
    interceptor.stub_request(
        "/users/12345",
        ResponseSpec::new(200).json(json!({"id": 12345, "firstName": "Fred"})),
    );

    let call = client.get("/users/12345");
    interceptor.wait_for(None).await;

    let response = call.await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.data["firstName"], "Fred");
    interceptor.uninstall(&client).unwrap();
}

#[tokio::test]
async fn test_unstubbed_call_is_tracked_but_never_settles() {
    let (client, interceptor) = setup();

    let mut call = client.get("/users/12345");
    interceptor.wait_for(Some(Duration::from_millis(100))).await;

    assert_eq!(interceptor.requests().count(), 1);
    assert_eq!(interceptor.requests().most_recent().unwrap().url, "/users/12345");
    assert!(call.try_outcome().is_none());
}

#[tokio::test]
async fn test_pattern_stub_fulfills_call() {
    let (client, interceptor) = setup();
    interceptor.stub_request(
        UrlMatcher::pattern(r"/users/\d+").unwrap(),
        ResponseSpec::new(200).json(json!({"id": 1})),
    );

    let call = client.get("/users/999");
    interceptor.wait_for(None).await;
    assert_eq!(call.await.unwrap().data["id"], 1);
}

#[tokio::test]
async fn test_one_shot_signals_are_method_scoped() {
    let (client, interceptor) = setup();
    let mut put_fired = interceptor.stub_once("PUT", "/users/1", ResponseSpec::new(200));
    let mut get_fired = interceptor.stub_once("GET", "/users/1", ResponseSpec::new(200));
    assert!(put_fired.try_fired().is_none());

    let call = client.put("/users/1", json!({"firstName": "Fred"}));
    assert_eq!(put_fired.try_fired(), Some(Ok(())));
    assert!(get_fired.try_fired().is_none());

    assert!(interceptor.requests().get("PUT", "/users/1").is_some());
    assert!(interceptor.requests().get("GET", "/users/1").is_none());

    interceptor.wait_for(None).await;
    assert_eq!(call.await.unwrap().status, 200);
    assert!(get_fired.try_fired().is_none());
}

#[tokio::test]
async fn test_timeout_stub_rejects_with_aborted_code() {
    let (client, interceptor) = setup();
    interceptor.stub_timeout("/users/1");

    let call = client.request(RequestConfig::get("/users/1").timeout(Duration::from_secs(1)));
    interceptor.wait_for(None).await;

    let err = call.await.unwrap_err();
    assert_eq!(err.code.as_deref(), Some("ECONNABORTED"));
    assert_eq!(err.message, "timeout of 1000ms exceeded");
}

#[tokio::test]
async fn test_uninstall_restores_transport() {
    let (client, interceptor) = setup();
    interceptor.stub_request("/users/1", ResponseSpec::new(200));
    let _pending = client.get("/users/2");
    interceptor.uninstall(&client).unwrap();

    assert_eq!(interceptor.stubs().count(), 0);
    assert_eq!(interceptor.requests().count(), 0);

    let err = client.get("/users/1").await.unwrap_err();
    assert_eq!(err.code.as_deref(), Some("ERR_NETWORK"));
}

#[tokio::test]
async fn test_nested_install_keeps_original_transport() {
    let (client, interceptor) = setup();
    assert!(matches!(
        interceptor.install(&client),
        Err(EngineError::AlreadyInstalled(_))
    ));

    interceptor.uninstall(&client).unwrap();
    assert_eq!(client.adapter().name(), "disconnected");
}

#[tokio::test]
async fn test_base_url_and_params_reach_the_tracked_call() {
    let client = HttpClient::new();
    client.update_defaults(|defaults| {
        defaults.base_url = Some("https://api.example.com".to_string())
    });
    let interceptor = Interceptor::new();

    interceptor
        .with_mock_async(&client, |mock| {
            let client = client.clone();
            async move {
                mock.stub_request(
                    "https://api.example.com/search?q=rust+lang&page=2",
                    ResponseSpec::new(200).json(json!({"hits": 3})),
                );
                let call = client.request(
                    RequestConfig::get("/search")
                        .param("q", "rust lang")
                        .param("page", 2)
                        .auth("janedoe", "s00pers3cret"),
                );

                let request = mock.requests().first().unwrap();
                assert_eq!(
                    request.header("Authorization"),
                    Some("Basic amFuZWRvZTpzMDBwZXJzM2NyZXQ=")
                );

                mock.wait_for(None).await;
                assert_eq!(call.await.unwrap().data["hits"], 3);
            }
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_stub_failure_signal_after_window() {
    let (client, interceptor) = setup();
    let satisfied = interceptor.stub_failure("GET", "/called", ResponseSpec::new(200));
    let missed = interceptor.stub_failure("GET", "/missed", ResponseSpec::new(200));

    let _call = client.get("/called");
    assert_eq!(satisfied.await, Ok(()));
    assert_eq!(missed.await, Err(EngineError::StubNotCalled));
    assert_eq!(interceptor.scheduler().now(), Duration::from_millis(500));
}
