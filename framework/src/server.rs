use crate::config::ServerConfig;
use crate::error::FrameworkError;
use crate::http::{collect_body, HttpResponse, Request};
use crate::kernel::HttpKernel;
use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;

/// Pause after a failed accept (e.g. out of file descriptors)
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct Server {
    kernel: Arc<HttpKernel>,
    addr: SocketAddr,
    max_body_size: usize,
    tracked: Arc<AtomicUsize>,
}

impl Server {
    pub fn new(kernel: HttpKernel, config: &ServerConfig) -> Result<Self, FrameworkError> {
        Ok(Self {
            kernel: Arc::new(kernel),
            addr: config.addr()?,
            max_body_size: config.max_body_size,
            tracked: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Live count of connection tasks the serve loop still holds
    pub fn connection_count(&self) -> Arc<AtomicUsize> {
        self.tracked.clone()
    }

    /// Serve until Ctrl-C, then let open connections finish
    pub async fn run(self) -> Result<(), FrameworkError> {
        self.run_until(shutdown_signal()).await
    }

    /// Serve until `shutdown` resolves
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<(), FrameworkError> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener, FrameworkError> {
        TcpListener::bind(self.addr)
            .await
            .map_err(|e| FrameworkError::internal(format!("failed to bind {}: {}", self.addr, e)))
    }

    /// Serve connections from an already bound listener
    pub async fn serve(self, listener: TcpListener, shutdown: impl Future<Output = ()>) -> Result<(), FrameworkError> {
        let local = listener.local_addr().unwrap_or(self.addr);
        tracing::info!(addr = %local, "Kit server running on http://{}", local);

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            let (stream, remote) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to accept connection");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {
                    self.tracked.store(connections.len(), Ordering::Relaxed);
                    continue;
                }
                _ = &mut shutdown => break,
            };

            let kernel = self.kernel.clone();
            let limit = self.max_body_size;
            let mut stop = stop_rx.clone();

            connections.spawn(async move {
                let service = service_fn(move |req: hyper::Request<hyper::body::Incoming>| {
                    let kernel = kernel.clone();
                    async move { Ok::<_, Infallible>(handle_request(kernel, req, remote, limit).await) }
                });

                let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
                tokio::pin!(conn);
                let result = tokio::select! {
                    result = conn.as_mut() => result,
                    _ = stop.changed() => {
                        conn.as_mut().graceful_shutdown();
                        conn.await
                    }
                };
                if let Err(err) = result {
                    tracing::debug!(remote = %remote, error = %err, "error serving connection");
                }
            });
            self.tracked.store(connections.len(), Ordering::Relaxed);
        }

        tracing::info!(open = connections.len(), "shutting down, draining connections");
        let _ = stop_tx.send(true);
        while connections.join_next().await.is_some() {}
        self.tracked.store(0, Ordering::Relaxed);
        Ok(())
    }
}

/// Resolves on Ctrl-C
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

async fn handle_request(
    kernel: Arc<HttpKernel>,
    req: hyper::Request<hyper::body::Incoming>,
    remote: SocketAddr,
    limit: usize,
) -> hyper::Response<Full<Bytes>> {
    let (parts, body) = req.into_parts();
    let bytes = match collect_body(body, limit).await {
        Ok(bytes) => bytes,
        Err(e) => return HttpResponse::from(e).into_hyper(),
    };

    let request = Request::new(http::Request::from_parts(parts, bytes)).with_remote_addr(remote);
    kernel.handle(request).await.into_hyper()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::context;
    use crate::http::Response;
    use crate::providers::BaseServiceProvider;
    use crate::routing::Router;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn peer(req: Request) -> Response {
        let addr = req.remote_addr().map(|a| a.ip().to_string()).unwrap_or_default();
        Ok(HttpResponse::text(addr))
    }

    async fn exchange(addr: SocketAddr, raw: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw.as_bytes()).await.unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        String::from_utf8_lossy(&out).into_owned()
    }

    #[tokio::test]
    async fn serves_requests_and_enforces_the_body_limit() {
        let mut ctx = context();
        ctx.register(BaseServiceProvider::new()).unwrap();
        ctx.boot().unwrap();
        let router: Router = Router::new().get("/peer", peer).post("/peer", peer).into();
        let kernel = HttpKernel::new(&ctx, router).unwrap();

        let config = ServerConfig::builder().host("127.0.0.1").port(0).max_body_size(8).build();
        let server = Server::new(kernel, &config).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve(listener, async move {
            let _ = rx.await;
        }));

        let ok = exchange(addr, "GET /peer HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n").await;
        assert!(ok.starts_with("HTTP/1.1 200"), "{}", ok);
        assert!(ok.ends_with("127.0.0.1"));

        let too_big = exchange(
            addr,
            "POST /peer HTTP/1.1\r\nHost: test\r\nConnection: close\r\nContent-Length: 20\r\n\r\n01234567890123456789",
        )
        .await;
        assert!(too_big.starts_with("HTTP/1.1 413"), "{}", too_big);

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn finished_connections_are_released() {
        let mut ctx = context();
        ctx.register(BaseServiceProvider::new()).unwrap();
        ctx.boot().unwrap();
        let router: Router = Router::new().get("/peer", peer).into();
        let kernel = HttpKernel::new(&ctx, router).unwrap();

        let server = Server::new(kernel, &ServerConfig::builder().host("127.0.0.1").port(0).build()).unwrap();
        let tracked = server.connection_count();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve(listener, async move {
            let _ = rx.await;
        }));

        for _ in 0..20 {
            let response = exchange(addr, "GET /peer HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n").await;
            assert!(response.starts_with("HTTP/1.1 200"));
        }
        for _ in 0..100 {
            if tracked.load(Ordering::Relaxed) == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(tracked.load(Ordering::Relaxed), 0);

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
