//! OBS WebSocket recorder.
//!
//! One socket per process. Requests are sent one at a time under the stream
//! lock and matched to their response by request id; events arriving in
//! between are skipped. Losing the socket drops it, so later commands fail
//! fast with `NotConnected` instead of hanging.

use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use livewatch_core::{ConnError, RecorderControl, RecorderError};
use livewatch_obs_protocol::{
    encode_identify, encode_request, identify_for, parse_server_message, ProtocolError, Request,
    RequestStatus, RequestType, ServerMessage, CLOSE_AUTHENTICATION_FAILED,
};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

type ObsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum ReadError {
    Closed { code: Option<u16>, reason: String },
    Transport(String),
    Protocol(ProtocolError),
}

impl ReadError {
    fn describe(&self) -> String {
        match self {
            ReadError::Closed { code: Some(code), reason } => {
                format!("socket closed ({}): {}", code, reason)
            }
            ReadError::Closed { code: None, .. } => "socket closed".to_string(),
            ReadError::Transport(details) => details.clone(),
            ReadError::Protocol(err) => err.to_string(),
        }
    }
}

pub struct ObsRecorder {
    stream: Mutex<Option<ObsStream>>,
    request_timeout: Duration,
}

impl ObsRecorder {
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            stream: Mutex::new(None),
            request_timeout,
        }
    }

    async fn handshake(
        &self,
        stream: &mut ObsStream,
        credential: Option<&str>,
    ) -> Result<u32, ConnError> {
        let hello = match next_message(stream).await {
            Ok(ServerMessage::Hello(hello)) => hello,
            Ok(other) => {
                return Err(ConnError::Handshake(format!(
                    "expected Hello, got {:?}",
                    other
                )))
            }
            Err(err) => return Err(ConnError::Handshake(err.describe())),
        };
        tracing::debug!(
            obs_websocket_version = ?hello.obs_web_socket_version,
            auth_required = hello.authentication.is_some(),
            "Recorder hello received"
        );

        let identify = identify_for(&hello, credential).map_err(|err| match err {
            ProtocolError::CredentialRequired => ConnError::AuthenticationFailed(err.to_string()),
            other => ConnError::Handshake(other.to_string()),
        })?;
        let frame =
            encode_identify(&identify).map_err(|err| ConnError::Handshake(err.to_string()))?;
        stream
            .send(Message::text(frame))
            .await
            .map_err(|err| ConnError::Handshake(err.to_string()))?;

        match next_message(stream).await {
            Ok(ServerMessage::Identified(identified)) => Ok(identified.negotiated_rpc_version),
            Ok(other) => Err(ConnError::Handshake(format!(
                "expected Identified, got {:?}",
                other
            ))),
            Err(ReadError::Closed {
                code: Some(CLOSE_AUTHENTICATION_FAILED),
                reason,
            }) => Err(ConnError::AuthenticationFailed(reason)),
            Err(err) => Err(ConnError::Handshake(err.describe())),
        }
    }

    async fn request(&self, request_type: RequestType) -> Result<(), RecorderError> {
        let mut guard = self.stream.lock().await;
        let Some(stream) = guard.as_mut() else {
            return Err(RecorderError::NotConnected);
        };

        let request = Request::new(request_type);
        let frame =
            encode_request(&request).map_err(|err| RecorderError::Protocol(err.to_string()))?;

        let exchanged = exchange(stream, frame, &request.request_id);
        let status = match timeout(self.request_timeout, exchanged).await {
            Err(_) => return Err(RecorderError::Timeout),
            Ok(Ok(status)) => status,
            Ok(Err(ReadError::Protocol(err))) => {
                return Err(RecorderError::Protocol(err.to_string()))
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err.describe(), "Recorder connection lost");
                *guard = None;
                return Err(RecorderError::Transport(err.describe()));
            }
        };

        if status.is_success() {
            tracing::debug!(
                request = request_type.as_str(),
                id = %request.request_id,
                "Recorder request succeeded"
            );
            Ok(())
        } else {
            Err(RecorderError::Rejected {
                code: status.code,
                comment: status.comment.unwrap_or_default(),
            })
        }
    }
}

impl Default for ObsRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

impl RecorderControl for ObsRecorder {
    async fn connect(&self, address: &str, credential: Option<&str>) -> Result<(), ConnError> {
        let unreachable = |details: String| ConnError::Unreachable {
            address: address.to_string(),
            details,
        };

        let (mut stream, _) = timeout(self.request_timeout, connect_async(address))
            .await
            .map_err(|_| unreachable("connection timed out".to_string()))?
            .map_err(|err| unreachable(err.to_string()))?;

        let handshake = self.handshake(&mut stream, credential);
        let negotiated = match timeout(self.request_timeout, handshake).await {
            Ok(result) => result?,
            Err(_) => return Err(ConnError::Handshake("handshake timed out".to_string())),
        };

        *self.stream.lock().await = Some(stream);
        tracing::info!(address, rpc_version = negotiated, "Connected to recorder");
        Ok(())
    }

    async fn start_recording(&self) -> Result<(), RecorderError> {
        self.request(RequestType::StartRecord).await
    }

    async fn stop_recording(&self) -> Result<(), RecorderError> {
        self.request(RequestType::StopRecord).await
    }

    async fn disconnect(&self) {
        let Some(mut stream) = self.stream.lock().await.take() else {
            return;
        };
        if let Err(err) = stream.close(None).await {
            tracing::debug!(error = %err, "Recorder socket close failed");
        }
        tracing::info!("Disconnected from recorder");
    }
}

async fn exchange(
    stream: &mut ObsStream,
    frame: String,
    request_id: &str,
) -> Result<RequestStatus, ReadError> {
    stream
        .send(Message::text(frame))
        .await
        .map_err(|err| ReadError::Transport(err.to_string()))?;

    loop {
        match next_message(stream).await? {
            ServerMessage::RequestResponse(response) if response.request_id == request_id => {
                return Ok(response.request_status);
            }
            ServerMessage::RequestResponse(response) => {
                tracing::debug!(id = %response.request_id, "Skipping response to another request");
            }
            ServerMessage::Event(event) => {
                tracing::debug!(event = %event.event_type, "Skipping recorder event");
            }
            other => {
                tracing::debug!(message = ?other, "Skipping unexpected recorder message");
            }
        }
    }
}

async fn next_message(stream: &mut ObsStream) -> Result<ServerMessage, ReadError> {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                return parse_server_message(text.as_str()).map_err(ReadError::Protocol);
            }
            Some(Ok(Message::Close(frame))) => {
                let (code, reason) = frame
                    .map(|frame| (Some(u16::from(frame.code)), frame.reason.to_string()))
                    .unwrap_or((None, String::new()));
                return Err(ReadError::Closed { code, reason });
            }
            Some(Ok(_)) => continue,
            Some(Err(err)) => return Err(ReadError::Transport(err.to_string())),
            None => {
                return Err(ReadError::Closed {
                    code: None,
                    reason: String::new(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;

    #[derive(Clone, Copy)]
    enum Script {
        /// Identify, then answer every request with the given status code.
        Answer { code: u16 },
        /// Demand authentication and close with 4009 on Identify.
        RejectAuth,
        /// Identify, then drop the socket on the first request.
        DropOnRequest,
    }

    async fn fake_obs(script: Script) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = format!("ws://{}", listener.local_addr().unwrap());

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(socket).await.unwrap();

            let mut hello = json!({"obsWebSocketVersion": "5.4.2", "rpcVersion": 1});
            if matches!(script, Script::RejectAuth) {
                hello["authentication"] = json!({"challenge": "c", "salt": "s"});
            }
            ws.send(Message::text(json!({"op": 0, "d": hello}).to_string()))
                .await
                .unwrap();

            let Some(Ok(Message::Text(_identify))) = ws.next().await else {
                return;
            };
            if matches!(script, Script::RejectAuth) {
                let _ = ws
                    .close(Some(CloseFrame {
                        code: CloseCode::from(CLOSE_AUTHENTICATION_FAILED),
                        reason: "Authentication failed.".into(),
                    }))
                    .await;
                return;
            }
            ws.send(Message::text(
                json!({"op": 2, "d": {"negotiatedRpcVersion": 1}}).to_string(),
            ))
            .await
            .unwrap();

            while let Some(Ok(Message::Text(text))) = ws.next().await {
                let Script::Answer { code } = script else {
                    return;
                };
                let request: Value = serde_json::from_str(text.as_str()).unwrap();
                let event = json!({
                    "op": 5,
                    "d": {"eventType": "RecordStateChanged", "eventIntent": 64}
                });
                ws.send(Message::text(event.to_string())).await.unwrap();
                let response = json!({
                    "op": 7,
                    "d": {
                        "requestType": request["d"]["requestType"],
                        "requestId": request["d"]["requestId"],
                        "requestStatus": {
                            "result": code == 100,
                            "code": code,
                            "comment": "scripted"
                        }
                    }
                });
                ws.send(Message::text(response.to_string())).await.unwrap();
            }
        });

        address
    }

    #[tokio::test]
    async fn start_and_stop_round_trip() {
        let address = fake_obs(Script::Answer { code: 100 }).await;
        let recorder = ObsRecorder::default();

        recorder.connect(&address, None).await.expect("connect");
        recorder.start_recording().await.expect("start");
        recorder.stop_recording().await.expect("stop");
        recorder.disconnect().await;

        assert_eq!(
            recorder.start_recording().await,
            Err(RecorderError::NotConnected)
        );
    }

    #[tokio::test]
    async fn rejected_request_reports_status_code() {
        let address = fake_obs(Script::Answer { code: 500 }).await;
        let recorder = ObsRecorder::default();
        recorder.connect(&address, None).await.expect("connect");

        assert_eq!(
            recorder.start_recording().await,
            Err(RecorderError::Rejected {
                code: 500,
                comment: "scripted".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn missing_credential_fails_authentication() {
        let address = fake_obs(Script::RejectAuth).await;
        let recorder = ObsRecorder::default();

        let err = recorder.connect(&address, None).await.unwrap_err();
        assert!(matches!(err, ConnError::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn wrong_credential_is_rejected_by_close_code() {
        let address = fake_obs(Script::RejectAuth).await;
        let recorder = ObsRecorder::default();

        let err = recorder.connect(&address, Some("wrong")).await.unwrap_err();
        assert_eq!(err, ConnError::AuthenticationFailed("Authentication failed.".to_string()));
    }

    #[tokio::test]
    async fn lost_socket_fails_fast_afterwards() {
        let address = fake_obs(Script::DropOnRequest).await;
        let recorder = ObsRecorder::default();
        recorder.connect(&address, None).await.expect("connect");

        assert!(matches!(
            recorder.start_recording().await,
            Err(RecorderError::Transport(_))
        ));
        assert_eq!(
            recorder.stop_recording().await,
            Err(RecorderError::NotConnected)
        );
    }

    #[tokio::test]
    async fn unreachable_address_is_conn_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = format!("ws://{}", listener.local_addr().unwrap());
        drop(listener);

        let err = ObsRecorder::default().connect(&address, None).await.unwrap_err();
        assert_eq!(err.kind(), "conn_unreachable");
    }

    #[tokio::test]
    async fn disconnect_when_not_connected_is_noop() {
        ObsRecorder::default().disconnect().await;
    }
}
