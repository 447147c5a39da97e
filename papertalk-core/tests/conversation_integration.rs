//! End-to-end turn tests against a hand-written HTTP/1.1 server.
//!
//! wiremock always sends a body in one piece, so these tests speak chunked
//! transfer encoding directly over a `TcpListener`. That lets them split
//! multi-byte characters across chunks and drop the connection mid-answer.

use std::time::Duration;

use papertalk_core::{
    ChatError, Conversation, MessageState, PapertalkConfig, QueryMode, Role, FAILURE_NOTICE,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

/// How the fake server ends its response body.
#[derive(Clone, Copy)]
enum Ending {
    Complete,
    DropConnection,
}

/// Serve exactly one request, streaming `chunks` with a short pause between
/// each. Returns the base URL and a receiver for the raw request head.
async fn serve_once(chunks: Vec<Vec<u8>>, ending: Ending) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let head = read_request(&mut socket).await;
        let _ = tx.send(head);

        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\n\
                  content-type: text/event-stream\r\n\
                  transfer-encoding: chunked\r\n\r\n",
            )
            .await
            .unwrap();

        for chunk in chunks {
            let mut frame = format!("{:x}\r\n", chunk.len()).into_bytes();
            frame.extend_from_slice(&chunk);
            frame.extend_from_slice(b"\r\n");
            socket.write_all(&frame).await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        match ending {
            Ending::Complete => {
                socket.write_all(b"0\r\n\r\n").await.unwrap();
                socket.flush().await.unwrap();
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            Ending::DropConnection => {
                let _ = socket.shutdown().await;
            }
        }
    });

    (format!("http://{addr}"), rx)
}

/// Read the request head and its content-length body; return the head.
async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 1024];

    let head_end = loop {
        let n = socket.read(&mut tmp).await.unwrap();
        assert!(n > 0, "client closed before sending a request");
        buf.extend_from_slice(&tmp[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < head_end + content_length {
        let n = socket.read(&mut tmp).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&tmp[..n]);
    }

    head
}

fn conversation_for(base_url: &str) -> Conversation {
    let config = PapertalkConfig::default().with_base_url(base_url);
    Conversation::new(config).expect("Failed to create conversation")
}

#[tokio::test]
async fn test_multibyte_characters_split_across_chunks() {
    let chunks = vec![
        b"caf\xC3".to_vec(),
        b"\xA9 na\xC3".to_vec(),
        b"\xAFve \xF0\x9F".to_vec(),
        b"\xA6\x80".to_vec(),
    ];
    let (base_url, request) = serve_once(chunks, Ending::Complete).await;
    let mut conversation = conversation_for(&base_url);
    conversation.sessions().put("tok-utf8");

    let outcome = conversation.submit("spell it", QueryMode::Document).await.unwrap();

    assert!(outcome.is_complete(), "turn failed: {:?}", outcome.error);
    let message = conversation.log().get(&outcome.message_id).unwrap();
    assert_eq!(message.content, "café naïve 🦀");
    assert!(!message.content.contains('\u{FFFD}'));

    let head = request.await.unwrap().to_ascii_lowercase();
    assert!(head.starts_with("post /api/chat "));
    assert!(head.contains("session-id: tok-utf8"));
}

#[tokio::test]
async fn test_citation_link_split_across_chunks_is_still_found() {
    let chunks = vec![
        b"Read https://arxiv.org/ab".to_vec(),
        b"s/1706.03762v5 first.".to_vec(),
    ];
    let (base_url, request) = serve_once(chunks, Ending::Complete).await;
    let mut conversation = conversation_for(&base_url);

    let outcome = conversation
        .submit("transformer origins", QueryMode::Research)
        .await
        .unwrap();

    assert!(outcome.is_complete(), "turn failed: {:?}", outcome.error);
    let message = conversation.log().get(&outcome.message_id).unwrap();
    let citations = message.citations().expect("citation metadata");
    assert_eq!(citations.len(), 1);
    assert_eq!(citations[0].source_id, "1706.03762");
    assert_eq!(citations[0].source_url, "https://arxiv.org/abs/1706.03762");
    assert_eq!(citations[0].fetch_url, "https://arxiv.org/pdf/1706.03762.pdf");

    let head = request.await.unwrap().to_ascii_lowercase();
    assert!(head.starts_with("post /api/research-chat "));
    assert!(!head.contains("session-id"));
}

#[tokio::test]
async fn test_dropped_connection_replaces_partial_answer() {
    let chunks = vec![b"The answer is defini".to_vec()];
    let (base_url, _request) = serve_once(chunks, Ending::DropConnection).await;
    let mut conversation = conversation_for(&base_url);
    conversation.sessions().put("tok-drop");

    let outcome = conversation.submit("question", QueryMode::Document).await.unwrap();

    assert_eq!(outcome.state, MessageState::Errored);
    assert!(
        matches!(outcome.error, Some(ChatError::TransportInterrupted(_))),
        "expected TransportInterrupted, got {:?}",
        outcome.error
    );

    let messages = conversation.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[1].content, FAILURE_NOTICE);
    assert!(!conversation.is_responding());
    assert!(!conversation.is_in_flight());
    assert!(conversation.session().is_some());
}

#[tokio::test]
async fn test_unreachable_server_errors_the_turn() {
    // Bind then drop to get a port with nothing listening.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut conversation = conversation_for(&format!("http://{addr}"));
    let outcome = conversation.submit("anyone there?", QueryMode::Research).await.unwrap();

    assert_eq!(outcome.state, MessageState::Errored);
    assert!(matches!(outcome.error, Some(ChatError::Http(_))));
    assert_eq!(conversation.messages()[1].content, FAILURE_NOTICE);
}
