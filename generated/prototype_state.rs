#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoRestRequest {
    #[prost(enumeration = "ProtoRestVerb", tag = "1")]
    pub verb: i32,
    #[prost(string, tag = "2")]
    pub path: ::prost::alloc::string::String,
    #[prost(map = "string, string", tag = "3")]
    pub parameters:
        ::std::collections::HashMap<::prost::alloc::string::String, ::prost::alloc::string::String>,
    #[prost(bytes = "vec", tag = "4")]
    pub body: ::prost::alloc::vec::Vec<u8>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoRestResponse {
    #[prost(uint32, tag = "1")]
    pub status_code: u32,
    #[prost(bytes = "vec", tag = "2")]
    pub body: ::prost::alloc::vec::Vec<u8>,
}
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ProtoRestVerb {
    Get = 0,
    Post = 1,
    Delete = 2,
}
#[doc = r" Generated client implementations."]
pub mod grpc_prototype_state_client {
    #![allow(unused_variables, dead_code, missing_docs)]
    use tonic::codegen::*;
    #[doc = " The co-located REST surface of a log host, tunneled over gRPC. A router node forwards a client"]
    #[doc = " request as-is (verb, path, query parameters, JSON body) and receives the HTTP-style status code"]
    #[doc = " and JSON body produced by the log host."]
    pub struct GrpcPrototypeStateClient<T> {
        inner: tonic::client::Grpc<T>,
    }
    impl GrpcPrototypeStateClient<tonic::transport::Channel> {
        #[doc = r" Attempt to create a new client by connecting to a given endpoint."]
        pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
        where
            D: std::convert::TryInto<tonic::transport::Endpoint>,
            D::Error: Into<StdError>,
        {
            let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
            Ok(Self::new(conn))
        }
    }
    impl<T> GrpcPrototypeStateClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::ResponseBody: Body + HttpBody + Send + 'static,
        T::Error: Into<StdError>,
        <T::ResponseBody as HttpBody>::Error: Into<StdError> + Send,
    {
        pub fn new(inner: T) -> Self {
            let inner = tonic::client::Grpc::new(inner);
            Self { inner }
        }
        pub fn with_interceptor(inner: T, interceptor: impl Into<tonic::Interceptor>) -> Self {
            let inner = tonic::client::Grpc::with_interceptor(inner, interceptor);
            Self { inner }
        }
        pub async fn execute(
            &mut self,
            request: impl tonic::IntoRequest<super::ProtoRestRequest>,
        ) -> Result<tonic::Response<super::ProtoRestResponse>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path =
                http::uri::PathAndQuery::from_static("/prototype_state.GrpcPrototypeState/Execute");
            self.inner.unary(request.into_request(), path, codec).await
        }
    }
    impl<T: Clone> Clone for GrpcPrototypeStateClient<T> {
        fn clone(&self) -> Self {
            Self {
                inner: self.inner.clone(),
            }
        }
    }
    impl<T> std::fmt::Debug for GrpcPrototypeStateClient<T> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "GrpcPrototypeStateClient {{ ... }}")
        }
    }
}
#[doc = r" Generated server implementations."]
pub mod grpc_prototype_state_server {
    #![allow(unused_variables, dead_code, missing_docs)]
    use tonic::codegen::*;
    #[doc = "Generated trait containing gRPC methods that should be implemented for use with GrpcPrototypeStateServer."]
    #[async_trait]
    pub trait GrpcPrototypeState: Send + Sync + 'static {
        async fn execute(
            &self,
            request: tonic::Request<super::ProtoRestRequest>,
        ) -> Result<tonic::Response<super::ProtoRestResponse>, tonic::Status>;
    }
    #[doc = " The co-located REST surface of a log host, tunneled over gRPC. A router node forwards a client"]
    #[doc = " request as-is (verb, path, query parameters, JSON body) and receives the HTTP-style status code"]
    #[doc = " and JSON body produced by the log host."]
    #[derive(Debug)]
    pub struct GrpcPrototypeStateServer<T: GrpcPrototypeState> {
        inner: _Inner<T>,
    }
    struct _Inner<T>(Arc<T>, Option<tonic::Interceptor>);
    impl<T: GrpcPrototypeState> GrpcPrototypeStateServer<T> {
        pub fn new(inner: T) -> Self {
            let inner = Arc::new(inner);
            let inner = _Inner(inner, None);
            Self { inner }
        }
        pub fn with_interceptor(inner: T, interceptor: impl Into<tonic::Interceptor>) -> Self {
            let inner = Arc::new(inner);
            let inner = _Inner(inner, Some(interceptor.into()));
            Self { inner }
        }
    }
    impl<T, B> Service<http::Request<B>> for GrpcPrototypeStateServer<T>
    where
        T: GrpcPrototypeState,
        B: HttpBody + Send + Sync + 'static,
        B::Error: Into<StdError> + Send + 'static,
    {
        type Response = http::Response<tonic::body::BoxBody>;
        type Error = Never;
        type Future = BoxFuture<Self::Response, Self::Error>;
        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }
        fn call(&mut self, req: http::Request<B>) -> Self::Future {
            let inner = self.inner.clone();
            match req.uri().path() {
                "/prototype_state.GrpcPrototypeState/Execute" => {
                    #[allow(non_camel_case_types)]
                    struct ExecuteSvc<T: GrpcPrototypeState>(pub Arc<T>);
                    impl<T: GrpcPrototypeState> tonic::server::UnaryService<super::ProtoRestRequest> for ExecuteSvc<T> {
                        type Response = super::ProtoRestResponse;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<super::ProtoRestRequest>,
                        ) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).execute(request).await };
                            Box::pin(fut)
                        }
                    }
                    let inner = self.inner.clone();
                    let fut = async move {
                        let interceptor = inner.1.clone();
                        let inner = inner.0;
                        let method = ExecuteSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = if let Some(interceptor) = interceptor {
                            tonic::server::Grpc::with_interceptor(codec, interceptor)
                        } else {
                            tonic::server::Grpc::new(codec)
                        };
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                _ => Box::pin(async move {
                    Ok(http::Response::builder()
                        .status(200)
                        .header("grpc-status", "12")
                        .header("content-type", "application/grpc")
                        .body(tonic::body::BoxBody::empty())
                        .unwrap())
                }),
            }
        }
    }
    impl<T: GrpcPrototypeState> Clone for GrpcPrototypeStateServer<T> {
        fn clone(&self) -> Self {
            let inner = self.inner.clone();
            Self { inner }
        }
    }
    impl<T: GrpcPrototypeState> Clone for _Inner<T> {
        fn clone(&self) -> Self {
            Self(self.0.clone(), self.1.clone())
        }
    }
    impl<T: std::fmt::Debug> std::fmt::Debug for _Inner<T> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self.0)
        }
    }
    impl<T: GrpcPrototypeState> tonic::transport::NamedService for GrpcPrototypeStateServer<T> {
        const NAME: &'static str = "prototype_state.GrpcPrototypeState";
    }
}
