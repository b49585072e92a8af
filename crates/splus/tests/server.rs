use splus::config::ServerConfig;
use splus::{Application, Route, Server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

#[tokio::test]
async fn test_server_serves_application_until_shutdown() {
    let app = Application::builder()
        .route(Route::get("/ping", || async { "pong" }))
        .build()
        .expect("valid application");

    let cfg = ServerConfig { port: 0, ..ServerConfig::default() };
    let server = Server::builder().config(cfg).application(app).build().expect("valid server");
    let handle = server.handle();
    let task = tokio::spawn(server.run());

    let address = handle.listening().await.expect("server bound");
    let mut stream = TcpStream::connect(address).await.expect("connect");
    stream
        .write_all(b"GET /ping HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .expect("write request");

    let mut response = String::new();
    stream.read_to_string(&mut response).await.expect("read response");
    assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
    assert!(response.ends_with("pong"), "{response}");

    handle.shutdown();
    task.await.expect("server task").expect("clean shutdown");
}
