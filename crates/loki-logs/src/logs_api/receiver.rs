// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP endpoint the Logs API pushes deliveries to.
//!
//! Each POST body is enqueued untouched as one [`RawBatch`]; decoding happens
//! later on the lifecycle loop. The platform only needs a 200 back.

use std::io;
use std::net::SocketAddr;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{http, Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, Instrument, Span};

use crate::http_utils::{log_and_create_http_response, verify_request_content_length, HttpResponse};
use crate::queue::{LogQueue, RawBatch};

/// Largest delivery body accepted; anything bigger gets a 413.
const MAX_REQUEST_CONTENT_LENGTH: usize = 6 * 1024 * 1024;

pub struct LogsReceiver {
    listener: TcpListener,
    queue: LogQueue,
    shutdown: CancellationToken,
    span: Span,
}

impl LogsReceiver {
    /// Binds `0.0.0.0:port`. Port 0 picks a free port.
    pub async fn bind(
        port: u16,
        queue: LogQueue,
        shutdown: CancellationToken,
        span: Span,
    ) -> io::Result<Self> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(&addr).await?;
        Ok(LogsReceiver {
            listener,
            queue,
            shutdown,
            span,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until the shutdown token is cancelled.
    pub async fn serve(self) -> io::Result<()> {
        let span = self.span.clone();
        self.serve_inner().instrument(span).await
    }

    async fn serve_inner(self) -> io::Result<()> {
        let server = hyper::server::conn::http1::Builder::new();
        let mut joinset = tokio::task::JoinSet::new();
        debug!(
            "Logs receiver listening on {}",
            self.listener.local_addr()?
        );

        loop {
            let conn = tokio::select! {
                () = self.shutdown.cancelled() => {
                    debug!("Logs receiver shutting down");
                    joinset.abort_all();
                    return Ok(());
                }
                con_res = self.listener.accept() => match con_res {
                    Err(e)
                        if matches!(
                            e.kind(),
                            io::ErrorKind::ConnectionAborted
                                | io::ErrorKind::ConnectionReset
                                | io::ErrorKind::ConnectionRefused
                        ) =>
                    {
                        continue;
                    }
                    Err(e) => {
                        error!("Logs receiver error: {e}");
                        return Err(e);
                    }
                    Ok((conn, _)) => conn,
                },
                finished = async {
                    match joinset.join_next().await {
                        Some(finished) => finished,
                        None => std::future::pending().await,
                    }
                } => match finished {
                    Err(e) if e.is_panic() => {
                        error!("Connection handler panicked: {:?}", e);
                        continue;
                    },
                    Ok(()) | Err(_) => continue,
                },
            };

            let conn = TokioIo::new(conn);
            let server = server.clone();
            let queue = self.queue.clone();
            let service = service_fn(move |req| handle_delivery(req, queue.clone()));
            joinset.spawn(
                async move {
                    if let Err(e) = server.serve_connection(conn, service).await {
                        error!("Connection error: {e}");
                    }
                }
                .in_current_span(),
            );
        }
    }
}

async fn handle_delivery(req: Request<Incoming>, queue: LogQueue) -> http::Result<HttpResponse> {
    if req.method() != Method::POST {
        return log_and_create_http_response(
            &format!("Unsupported method {} on logs receiver", req.method()),
            StatusCode::METHOD_NOT_ALLOWED,
        );
    }

    let (parts, body) = req.into_parts();
    if let Some(response) = verify_request_content_length(
        &parts.headers,
        MAX_REQUEST_CONTENT_LENGTH,
        "Error receiving logs",
    ) {
        return response;
    }

    let body: Bytes = match Limited::new(body, MAX_REQUEST_CONTENT_LENGTH).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            return log_and_create_http_response(
                &format!("Error reading logs delivery: {e}"),
                StatusCode::BAD_REQUEST,
            );
        }
    };

    if !body.is_empty() {
        debug!("Received logs delivery of {} bytes", body.len());
        queue.enqueue(RawBatch::new(body));
    }

    http::Response::builder()
        .status(StatusCode::OK)
        .body(Full::new(Bytes::new()))
}
