//! Local HTTP stand-in for remote providers in unit tests.

use axum::Router;
use tokio::net::TcpListener;

/// Serve `app` on a random local port and return its base URL. The server
/// lives until the test runtime shuts down.
pub(crate) async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
