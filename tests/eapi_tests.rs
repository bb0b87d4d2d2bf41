//! eAPI channel tests against a local HTTP server.

use netcommit::connection::{Command, CommandChannel, ConnectionError, EapiChannel, OutputFormat};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{basic_auth, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn channel(server: &MockServer) -> EapiChannel {
    let address = server.address();
    EapiChannel::builder(address.ip().to_string())
        .port(address.port())
        .use_ssl(false)
        .username("admin")
        .password("secret")
        .timeout(5)
        .build()
        .unwrap()
}

async fn last_request_body(server: &MockServer) -> Value {
    let requests = server.received_requests().await.unwrap();
    requests.last().unwrap().body_json().unwrap()
}

#[tokio::test]
async fn test_run_commands_prepends_enable_and_strips_its_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/command-api"))
        .and(basic_auth("admin", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": "1",
            "result": [{}, {"modelName": "vEOS"}, {"hostname": "leaf1"}]
        })))
        .mount(&server)
        .await;

    let channel = channel(&server);
    let outputs = channel
        .run_commands(
            &[Command::from("show version"), Command::from("show hostname")],
            OutputFormat::Json,
        )
        .await
        .unwrap();

    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[0].value()["modelName"], "vEOS");
    assert_eq!(outputs[1].value()["hostname"], "leaf1");

    let body = last_request_body(&server).await;
    assert_eq!(body["jsonrpc"], "2.0");
    assert_eq!(body["method"], "runCmds");
    assert_eq!(body["params"]["version"], 1);
    assert_eq!(body["params"]["format"], "json");
    assert_eq!(
        body["params"]["cmds"],
        json!(["enable", "show version", "show hostname"])
    );
}

#[tokio::test]
async fn test_command_input_and_text_format_on_the_wire() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/command-api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": "1",
            "result": [{"output": ""}, {"output": "Copy completed successfully.\n"}]
        })))
        .mount(&server)
        .await;

    let channel = channel(&server);
    let outputs = channel
        .run_commands(
            &[Command::with_input(
                "copy terminal: flash:candidate.cfg",
                "hostname leaf1\n",
            )],
            OutputFormat::Text,
        )
        .await
        .unwrap();
    assert_eq!(outputs[0].output(), "Copy completed successfully.\n");

    let body = last_request_body(&server).await;
    assert_eq!(body["params"]["format"], "text");
    assert_eq!(
        body["params"]["cmds"][1],
        json!({"cmd": "copy terminal: flash:candidate.cfg", "input": "hostname leaf1\n"})
    );
}

#[tokio::test]
async fn test_rejected_command_reports_index_within_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/command-api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": "1",
            "error": {
                "code": 1002,
                "message": "CLI command 3 of 3 'bogus' failed: invalid command",
                "data": [
                    {},
                    {},
                    {"errors": ["Invalid input (at token 0: 'bogus')"]}
                ]
            }
        })))
        .mount(&server)
        .await;

    let channel = channel(&server);
    let err = channel
        .run_commands(
            &[Command::from("configure session s1"), Command::from("bogus")],
            OutputFormat::Json,
        )
        .await
        .unwrap_err();

    match err {
        ConnectionError::CommandRejected {
            index,
            command,
            message,
        } => {
            assert_eq!(index, 1);
            assert_eq!(command, "bogus");
            assert_eq!(message, "Invalid input (at token 0: 'bogus')");
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unauthorized_is_authentication_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/command-api"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = channel(&server).run_text("show version").await.unwrap_err();
    assert!(matches!(err, ConnectionError::AuthenticationFailed(_)));
    assert!(!err.is_rejection());
}

#[tokio::test]
async fn test_server_error_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/command-api"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let err = channel(&server).run_json("show version").await.unwrap_err();
    match err {
        ConnectionError::InvalidResponse(message) => assert!(message.contains("500")),
        other => panic!("expected invalid response, got {:?}", other),
    }
}

#[tokio::test]
async fn test_result_count_mismatch_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/command-api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": "1",
            "result": [{}]
        })))
        .mount(&server)
        .await;

    let err = channel(&server).run_json("show version").await.unwrap_err();
    assert!(matches!(err, ConnectionError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_unreachable_device_is_connection_failure() {
    let server = MockServer::start().await;
    let channel = channel(&server);
    drop(server);

    let err = channel.run_json("show version").await.unwrap_err();
    assert!(matches!(
        err,
        ConnectionError::ConnectionFailed(_) | ConnectionError::Timeout(_)
    ));
    assert!(!channel.is_alive().await);
}
