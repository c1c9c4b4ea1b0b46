//! `opx` is the operation execution orchestrator for generated API SDK
//! clients: it drives serialization, auth-scheme selection, endpoint
//! resolution, signing, transport and deserialization for one typed
//! operation, with a retry loop around the attempt phases and interceptors
//! observing or mutating state at every lifecycle point.
//!
//! The crate owns sequencing and error policy only. Wire encoding, the
//! transport, signing algorithms and retry bookkeeping are collaborators
//! plugged in per operation.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use opx::{
//!     BoxError, Context, Error, Operation, Request, Response, StandardRetryStrategy, Transport,
//!     TransportError,
//! };
//!
//! #[derive(Debug)]
//! struct GetGreeting {
//!     name: String,
//! }
//!
//! #[derive(Debug)]
//! struct Greeting {
//!     message: String,
//! }
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("the service rejected the request")]
//! struct GreetingError;
//!
//! fn serialize_greeting(
//!     input: &GetGreeting,
//!     request: &mut Request,
//!     _context: &mut Context,
//! ) -> Result<(), BoxError> {
//!     request.set_method(http::Method::POST);
//!     request.set_path("/greetings");
//!     request.set_json(&input.name)?;
//!     Ok(())
//! }
//!
//! fn deserialize_greeting(
//!     response: Response,
//!     _context: &mut Context,
//! ) -> Result<Greeting, Error<GreetingError>> {
//!     let message: String = response.json().map_err(Error::deserialization)?;
//!     Ok(Greeting { message })
//! }
//!
//! struct PooledHttpTransport; // wraps your connection pool
//!
//! #[async_trait::async_trait]
//! impl Transport for PooledHttpTransport {
//!     async fn execute(
//!         &self,
//!         request: Request,
//!         _context: &mut Context,
//!     ) -> Result<Response, TransportError> {
//!         unimplemented!("drive the wire protocol here")
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let operation = Operation::<GetGreeting, Greeting, GreetingError>::builder("GetGreeting")
//!         .host("api.example.com")
//!         .serializer(serialize_greeting)
//!         .deserializer(deserialize_greeting)
//!         .transport(Arc::new(PooledHttpTransport))
//!         .retry_strategy(Arc::new(StandardRetryStrategy::standard().max_attempts(3)))
//!         .try_build()?;
//!
//!     let greeting = operation
//!         .execute(GetGreeting { name: "demo".into() })
//!         .await?;
//!     println!("{}", greeting.message);
//!     Ok(())
//! }
//! ```

mod attributes;
mod auth;
mod context;
mod endpoint;
mod error;
mod interceptor;
mod observe;
mod operation;
mod orchestrator;
mod request;
mod response;
mod retry;
mod state;

pub use crate::attributes::{AttributeKey, Attributes};
pub use crate::auth::{
    AnonymousAuthResolver, Identity, NoSigner, ResolveAuthScheme, SelectedAuthScheme, Sign,
};
pub use crate::context::{Context, ContextBuilder, keys};
pub use crate::endpoint::{Endpoint, HostEndpointResolver, ResolveEndpoint, StaticEndpointResolver};
pub use crate::error::{BoxError, Error, ErrorCode, TransportError, TransportErrorKind};
pub use crate::interceptor::{Hook, Interceptor};
pub use crate::observe::{NoopObserver, Observer};
pub use crate::operation::{
    BuildError, DeserializeResponse, Operation, OperationBuilder, SerializeRequest, Transport,
};
pub use crate::request::Request;
pub use crate::response::Response;
pub use crate::retry::{
    ClassifyError, DefaultErrorClassifier, DisabledRetryStrategy, ErrorInfo, RetryBudgetExhausted,
    RetryBudgetPolicy, RetryClass, RetryDirective, RetryStrategy, RetryToken,
    StandardRetryStrategy, TokenScope,
};
pub use crate::state::ExecutionState;

pub type OpxResult<O, E> = std::result::Result<O, Error<E>>;

pub mod prelude {
    pub use crate::{
        AnonymousAuthResolver, AttributeKey, Attributes, BoxError, ClassifyError, Context,
        ContextBuilder, DefaultErrorClassifier, DeserializeResponse, DisabledRetryStrategy,
        Endpoint, Error, ErrorCode, ErrorInfo, ExecutionState, Hook, HostEndpointResolver,
        Identity, Interceptor, NoSigner, NoopObserver, Observer, OpxResult, Operation,
        OperationBuilder, Request, ResolveAuthScheme, ResolveEndpoint, Response, RetryClass,
        RetryDirective, RetryStrategy, RetryToken, SelectedAuthScheme, SerializeRequest, Sign,
        StandardRetryStrategy, StaticEndpointResolver, TokenScope, Transport, TransportError,
        TransportErrorKind,
    };
}
