use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use serde_json::Value;

/// One request as the stub saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub url: String,
    pub authorization: Option<String>,
    pub body: String,
}

impl Recorded {
    /// Decoded query pairs of the request url.
    pub fn query(&self) -> Vec<(String, String)> {
        url::Url::parse(&format!("http://stub{}", self.url))
            .map(|url| url.query_pairs().into_owned().collect())
            .unwrap_or_default()
    }

    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PayloadStubConfig {
    pub posts: Vec<Value>,
    pub categories: Vec<Value>,
    /// Post ids whose PATCH is rejected with a Payload error body.
    pub reject_updates: Vec<String>,
    /// Answer every find with this status and a Payload error body.
    pub fail_finds: Option<u16>,
}

pub struct PayloadStub {
    pub base_url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl PayloadStub {
    pub fn spawn(config: PayloadStubConfig) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start payload stub server");
        let base_url = format!("http://{}", server.server_addr());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                let recorded = Recorded {
                    method: request.method().to_string(),
                    url: request.url().to_string(),
                    authorization: request
                        .headers()
                        .iter()
                        .find(|h| h.field.equiv("Authorization"))
                        .map(|h| h.value.to_string()),
                    body,
                };
                seen.lock().expect("lock requests").push(recorded.clone());

                let (status, payload) = respond(&config, &recorded);
                let header = tiny_http::Header::from_bytes(
                    &b"Content-Type"[..],
                    &b"application/json"[..],
                )
                .expect("content-type header");
                let _ = request.respond(
                    tiny_http::Response::from_string(payload.to_string())
                        .with_status_code(status)
                        .with_header(header),
                );
            }
        });

        Self {
            base_url,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().expect("lock requests").clone()
    }
}

fn respond(config: &PayloadStubConfig, req: &Recorded) -> (u16, Value) {
    let path = req.url.split('?').next().unwrap_or_default();
    let error = |message: &str| serde_json::json!({"errors": [{"message": message}]});

    match (req.method.as_str(), path) {
        ("GET", "/api/posts") | ("GET", "/api/categories") => {
            if let Some(status) = config.fail_finds {
                return (status, error("You are not allowed to perform this action."));
            }
            let docs = if path == "/api/posts" {
                &config.posts
            } else {
                &config.categories
            };
            (200, serde_json::json!({"docs": docs, "totalDocs": docs.len()}))
        }
        ("PATCH", _) if path.starts_with("/api/posts/") => {
            let id = &path["/api/posts/".len()..];
            if config.reject_updates.iter().any(|r| r == id) {
                return (400, error("The following field is invalid: categories"));
            }
            (200, serde_json::json!({"doc": {"id": id}, "message": "Updated successfully."}))
        }
        _ => (404, error("Not Found")),
    }
}

impl Drop for PayloadStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
