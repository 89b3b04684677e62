//! Minimal server: one route, console logging.
//!
//! Run with `cargo run --example hello_world`, then:
//!
//! ```text
//! curl -v http://127.0.0.1:8080/
//! ```

use soloserve::{Error, Server};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut server = Server::create(8080);

    server.on_message(|message| println!("{message}"));
    server.on_error(|err| eprintln!("transport: {err}"));
    server.on_request_error(|err| eprintln!("bad request: {err}"));
    server.on_response_error(|err| eprintln!("handler: {err}"));

    server.on_request("GET", "/", |_request, mut response| async move {
        let sent = response.send_text("hello world").await;
        (response, sent.map_err(Error::from))
    });

    server.start().await
}
