//! Network transport: JSON over HTTP for queries and mutations, and a
//! `graphql-transport-ws` WebSocket for the `bookAdded` stream.

use std::time::Duration;

use async_trait::async_trait;
use futures::{Sink, SinkExt, StreamExt};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, warn};

use crate::catalog::Book;
use crate::graphql::ACK_INIT_PARAM;

use super::transport::{
    ADD_BOOK_MUTATION, AddBookData, BOOK_ADDED_SUBSCRIPTION, BOOKS_QUERY, BookAddedData,
    BookStream, BooksData, CatalogTransport, ClientError, FIND_BOOKS_QUERY, GetBooksData, decode,
    join_errors,
};

const SUBSCRIPTION_ID: &str = "book-added";
const ACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Talks to a running server rooted at `base_url` (e.g. `http://localhost:4000`).
#[derive(Debug)]
pub struct HttpTransport {
    http: reqwest::Client,
    endpoint: String,
    ws_endpoint: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base = base_url.trim_end_matches('/');
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            return Err(ClientError::Transport(format!(
                "unsupported server url: {base_url}"
            )));
        };

        Ok(Self {
            http: reqwest::Client::new(),
            endpoint: format!("{base}/graphql"),
            ws_endpoint: format!("{ws_base}/graphql/ws"),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn ws_endpoint(&self) -> &str {
        &self.ws_endpoint
    }

    async fn post<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T, ClientError> {
        let body: Value = self
            .http
            .post(&self.endpoint)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        decode(body)
    }
}

#[async_trait]
impl CatalogTransport for HttpTransport {
    async fn fetch_books(&self) -> Result<Vec<Book>, ClientError> {
        let data: BooksData = self.post(BOOKS_QUERY, json!({})).await?;
        Ok(data.into_books())
    }

    async fn find_books(&self, title: &str) -> Result<Vec<Book>, ClientError> {
        let data: GetBooksData = self
            .post(FIND_BOOKS_QUERY, json!({ "title": title }))
            .await?;
        Ok(data.into_books())
    }

    async fn add_book(&self, book: &Book) -> Result<Book, ClientError> {
        let data: AddBookData = self
            .post(
                ADD_BOOK_MUTATION,
                json!({ "title": book.title, "author": book.author }),
            )
            .await?;
        data.into_book()
    }

    async fn subscribe_book_added(&self) -> Result<BookStream, ClientError> {
        let mut request = self
            .ws_endpoint
            .as_str()
            .into_client_request()
            .map_err(subscription_error)?;
        request.headers_mut().insert(
            SEC_WEBSOCKET_PROTOCOL,
            HeaderValue::from_static("graphql-transport-ws"),
        );

        let (socket, _) = connect_async(request).await.map_err(subscription_error)?;
        let (mut sink, mut source) = socket.split();

        send_frame(
            &mut sink,
            json!({ "type": "connection_init", "payload": { ACK_INIT_PARAM: true } }),
        )
        .await?;
        loop {
            let frame = match source.next().await {
                Some(Ok(Message::Text(text))) => parse_frame(&text)?,
                Some(Ok(Message::Close(_))) | None => {
                    return Err(ClientError::Subscription(
                        "connection closed during handshake".to_string(),
                    ));
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(subscription_error(e)),
            };
            match frame.kind.as_str() {
                "connection_ack" => break,
                "ping" => send_frame(&mut sink, json!({ "type": "pong" })).await?,
                other => {
                    return Err(ClientError::Subscription(format!(
                        "unexpected `{other}` before connection_ack"
                    )));
                }
            }
        }

        send_frame(
            &mut sink,
            json!({
                "id": SUBSCRIPTION_ID,
                "type": "subscribe",
                "payload": { "query": BOOK_ADDED_SUBSCRIPTION },
            }),
        )
        .await?;

        // The server's first `next` is an empty acknowledgement sent after the
        // subscriber is registered; nothing added from here on can be missed.
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::time::timeout(ACK_TIMEOUT, await_ack(&mut sink, &mut source, &tx))
            .await
            .map_err(|_| {
                ClientError::Subscription("subscription was not acknowledged".to_string())
            })??;
        debug!(endpoint = %self.ws_endpoint, "bookAdded subscription active");

        tokio::spawn(drive_subscription(sink, source, tx));
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }
}

#[derive(Debug, Deserialize)]
struct ServerFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: String,
}

fn parse_frame(text: &str) -> Result<ServerFrame, ClientError> {
    serde_json::from_str(text)
        .map_err(|e| ClientError::Subscription(format!("malformed frame: {e}")))
}

fn subscription_error(e: impl std::fmt::Display) -> ClientError {
    ClientError::Subscription(e.to_string())
}

async fn send_frame<S>(sink: &mut S, frame: Value) -> Result<(), ClientError>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    sink.send(Message::text(frame.to_string()))
        .await
        .map_err(subscription_error)
}

/// What one server frame means for the consumer.
#[derive(Debug)]
enum Delivery {
    Book(Book),
    /// `next` without a book: the subscription acknowledgement.
    Ready,
    Nothing,
    Pong,
    Done,
    Failed(ClientError),
}

fn interpret(frame: ServerFrame) -> Delivery {
    match frame.kind.as_str() {
        "next" => {
            let payload = frame.payload.unwrap_or(Value::Null);
            match decode::<BookAddedData>(payload) {
                Ok(BookAddedData { book_added: Some(book) }) => Delivery::Book(book),
                Ok(BookAddedData { book_added: None }) => Delivery::Ready,
                Err(e) => Delivery::Failed(ClientError::Subscription(e.to_string())),
            }
        }
        "error" => {
            let errors: Vec<ErrorMessage> = frame
                .payload
                .and_then(|p| serde_json::from_value(p).ok())
                .unwrap_or_default();
            Delivery::Failed(ClientError::Subscription(join_errors(
                errors.iter().map(|e| e.message.as_str()),
            )))
        }
        "complete" => Delivery::Done,
        "ping" => Delivery::Pong,
        _ => Delivery::Nothing,
    }
}

/// Wait for the acknowledgement `next`. A book arriving first is queued.
async fn await_ack<S, R>(
    sink: &mut S,
    source: &mut R,
    tx: &mpsc::UnboundedSender<Result<Book, ClientError>>,
) -> Result<(), ClientError>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
    R: futures::Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        let frame = match source.next().await {
            Some(Ok(Message::Text(text))) => parse_frame(&text)?,
            Some(Ok(Message::Close(_))) | None => {
                return Err(ClientError::Subscription(
                    "connection closed before the subscription was acknowledged".to_string(),
                ));
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(subscription_error(e)),
        };
        match interpret(frame) {
            Delivery::Ready => return Ok(()),
            Delivery::Book(book) => {
                let _ = tx.send(Ok(book));
            }
            Delivery::Pong => send_frame(sink, json!({ "type": "pong" })).await?,
            Delivery::Nothing => {}
            Delivery::Done => {
                return Err(ClientError::Subscription(
                    "subscription completed before it was acknowledged".to_string(),
                ));
            }
            Delivery::Failed(e) => return Err(e),
        }
    }
}

async fn drive_subscription<S, R>(
    mut sink: S,
    mut source: R,
    tx: mpsc::UnboundedSender<Result<Book, ClientError>>,
) where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
    R: futures::Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        tokio::select! {
            _ = tx.closed() => {
                let _ = send_frame(&mut sink, json!({ "id": SUBSCRIPTION_ID, "type": "complete" })).await;
                let _ = sink.close().await;
                break;
            }
            message = source.next() => {
                let frame = match message {
                    Some(Ok(Message::Text(text))) => match parse_frame(&text) {
                        Ok(frame) => frame,
                        Err(e) => {
                            let _ = tx.send(Err(e));
                            break;
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!(error = %e, "bookAdded subscription transport failed");
                        let _ = tx.send(Err(subscription_error(e)));
                        break;
                    }
                };
                match interpret(frame) {
                    Delivery::Book(book) => {
                        if tx.send(Ok(book)).is_err() {
                            break;
                        }
                    }
                    Delivery::Ready | Delivery::Nothing => {}
                    Delivery::Pong => {
                        if let Err(e) = send_frame(&mut sink, json!({ "type": "pong" })).await {
                            let _ = tx.send(Err(e));
                            break;
                        }
                    }
                    Delivery::Done => break,
                    Delivery::Failed(e) => {
                        let _ = tx.send(Err(e));
                        break;
                    }
                }
            }
        }
    }
    debug!("bookAdded subscription closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_endpoints_from_base_url() {
        let transport = HttpTransport::new("http://localhost:4000/").unwrap();
        assert_eq!(transport.endpoint(), "http://localhost:4000/graphql");
        assert_eq!(transport.ws_endpoint(), "ws://localhost:4000/graphql/ws");

        let secure = HttpTransport::new("https://books.example").unwrap();
        assert_eq!(secure.ws_endpoint(), "wss://books.example/graphql/ws");

        assert_matches!(
            HttpTransport::new("localhost:4000"),
            Err(ClientError::Transport(_))
        );
    }

    #[test]
    fn test_interpret_next_frame() {
        let frame = parse_frame(
            r#"{"id":"book-added","type":"next","payload":{"data":{"bookAdded":{"title":"Dune","author":"Herbert"}}}}"#,
        )
        .unwrap();
        assert_matches!(interpret(frame), Delivery::Book(book) if book == Book::new("Dune", "Herbert"));
    }

    #[test]
    fn test_interpret_acknowledgement() {
        let frame =
            parse_frame(r#"{"id":"book-added","type":"next","payload":{"data":{"bookAdded":null}}}"#)
                .unwrap();
        assert_matches!(interpret(frame), Delivery::Ready);
    }

    #[test]
    fn test_interpret_error_frame() {
        let frame =
            parse_frame(r#"{"id":"book-added","type":"error","payload":[{"message":"boom"}]}"#)
                .unwrap();
        assert_matches!(interpret(frame), Delivery::Failed(ClientError::Subscription(msg)) if msg == "boom");
    }

    #[test]
    fn test_interpret_control_frames() {
        assert_matches!(interpret(parse_frame(r#"{"type":"ping"}"#).unwrap()), Delivery::Pong);
        assert_matches!(
            interpret(parse_frame(r#"{"id":"book-added","type":"complete"}"#).unwrap()),
            Delivery::Done
        );
        assert_matches!(interpret(parse_frame(r#"{"type":"pong"}"#).unwrap()), Delivery::Nothing);
    }
}
