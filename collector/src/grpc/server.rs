//! Tonic server plumbing shared by the OTLP export services.
//!
//! Each OTLP collector service has exactly one unary `Export` method.
//! [`ExportServer`] routes that method to an [`ExportService`] and decodes
//! request bodies with [`OtlpCodec`], which reports malformed protobuf as
//! `InvalidArgument` so that clients do not retry payloads that can never
//! succeed.

use prost::bytes::Buf;
use prost::Message;
use std::convert::Infallible;
use std::marker::PhantomData;
use std::sync::Arc;
use std::task::{Context, Poll};
use tonic::body::Body;
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::codegen::{http, BoxFuture, Service, StdError};
use tonic::server::{Grpc, NamedService, UnaryService};
use tonic::{Code, Request, Response, Status};

/// An OTLP collector service with a single unary `Export` method.
#[tonic::async_trait]
pub trait ExportService: Send + Sync + 'static {
    /// Fully qualified gRPC service name.
    const NAME: &'static str;

    /// Export request message.
    type Request: Message + Default + Send + 'static;

    /// Export response message.
    type Response: Message + Send + 'static;

    /// Handles one decoded export request.
    async fn export(
        &self,
        request: Request<Self::Request>,
    ) -> Result<Response<Self::Response>, Status>;
}

/// Prost codec whose decode failures are `InvalidArgument`.
#[derive(Debug)]
pub struct OtlpCodec<E, D> {
    _pd: PhantomData<(E, D)>,
}

impl<E, D> Default for OtlpCodec<E, D> {
    fn default() -> Self {
        Self { _pd: PhantomData }
    }
}

impl<E, D> Codec for OtlpCodec<E, D>
where
    E: Message + Send + 'static,
    D: Message + Default + Send + 'static,
{
    type Encode = E;
    type Decode = D;
    type Encoder = OtlpEncoder<E>;
    type Decoder = OtlpDecoder<D>;

    fn encoder(&mut self) -> Self::Encoder {
        OtlpEncoder { _pd: PhantomData }
    }

    fn decoder(&mut self) -> Self::Decoder {
        OtlpDecoder { _pd: PhantomData }
    }
}

/// Encoder half of [`OtlpCodec`].
#[derive(Debug)]
pub struct OtlpEncoder<E> {
    _pd: PhantomData<E>,
}

impl<E: Message> Encoder for OtlpEncoder<E> {
    type Item = E;
    type Error = Status;

    fn encode(&mut self, item: E, dst: &mut EncodeBuf<'_>) -> Result<(), Status> {
        item.encode(dst)
            .map_err(|e| Status::internal(format!("failed to encode response: {e}")))
    }
}

/// Decoder half of [`OtlpCodec`].
#[derive(Debug)]
pub struct OtlpDecoder<D> {
    _pd: PhantomData<D>,
}

impl<D: Message + Default> Decoder for OtlpDecoder<D> {
    type Item = D;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<D>, Status> {
        decode_message(src).map(Some)
    }
}

fn decode_message<D: Message + Default>(buf: impl Buf) -> Result<D, Status> {
    D::decode(buf).map_err(|e| Status::invalid_argument(format!("malformed OTLP payload: {e}")))
}

/// Tower service serving one [`ExportService`] over gRPC.
pub struct ExportServer<T> {
    inner: Arc<T>,
    max_decoding_message_size: Option<usize>,
}

impl<T: ExportService> ExportServer<T> {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: T) -> Self {
        Self {
            inner: Arc::new(inner),
            max_decoding_message_size: None,
        }
    }

    /// Limits the decoded size of a request message.
    #[must_use]
    pub fn max_decoding_message_size(mut self, limit: usize) -> Self {
        self.max_decoding_message_size = Some(limit);
        self
    }
}

impl<T> Clone for ExportServer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            max_decoding_message_size: self.max_decoding_message_size,
        }
    }
}

impl<T: ExportService> NamedService for ExportServer<T> {
    const NAME: &'static str = T::NAME;
}

/// Returns true if `path` is `/<service>/Export`.
fn is_export_path(path: &str, service: &str) -> bool {
    path.strip_prefix('/')
        .and_then(|p| p.strip_prefix(service))
        .is_some_and(|method| method == "/Export")
}

fn unimplemented_response() -> http::Response<Body> {
    let mut response = http::Response::new(Body::default());
    let headers = response.headers_mut();
    headers.insert(Status::GRPC_STATUS, (Code::Unimplemented as i32).into());
    headers.insert(
        http::header::CONTENT_TYPE,
        tonic::metadata::GRPC_CONTENT_TYPE,
    );
    response
}

struct ExportMethod<T>(Arc<T>);

impl<T: ExportService> UnaryService<T::Request> for ExportMethod<T> {
    type Response = T::Response;
    type Future = BoxFuture<Response<T::Response>, Status>;

    fn call(&mut self, request: Request<T::Request>) -> Self::Future {
        let inner = Arc::clone(&self.0);
        Box::pin(async move { inner.export(request).await })
    }
}

impl<T, B> Service<http::Request<B>> for ExportServer<T>
where
    T: ExportService,
    B: tonic::codegen::Body + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    type Response = http::Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        if !is_export_path(req.uri().path(), T::NAME) {
            return Box::pin(async { Ok(unimplemented_response()) });
        }

        let method = ExportMethod(Arc::clone(&self.inner));
        let max_decoding_message_size = self.max_decoding_message_size;
        Box::pin(async move {
            let codec = OtlpCodec::<T::Response, T::Request>::default();
            let mut grpc =
                Grpc::new(codec).apply_max_message_size_config(max_decoding_message_size, None);
            Ok(grpc.unary(method, req).await)
        })
    }
}
