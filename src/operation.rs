use std::error::Error as StdError;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error as ThisError;

use crate::auth::{AnonymousAuthResolver, ResolveAuthScheme};
use crate::context::Context;
use crate::endpoint::{HostEndpointResolver, ResolveEndpoint};
use crate::error::{BoxError, Error, TransportError};
use crate::interceptor::{Interceptor, Interceptors};
use crate::observe::{NoopObserver, Observer};
use crate::request::Request;
use crate::response::Response;
use crate::retry::{ClassifyError, DefaultErrorClassifier, RetryStrategy, StandardRetryStrategy};

pub trait SerializeRequest<I>: Send + Sync {
    fn serialize(
        &self,
        input: &I,
        request: &mut Request,
        context: &mut Context,
    ) -> Result<(), BoxError>;
}

impl<I, F> SerializeRequest<I> for F
where
    F: Fn(&I, &mut Request, &mut Context) -> Result<(), BoxError> + Send + Sync,
{
    fn serialize(
        &self,
        input: &I,
        request: &mut Request,
        context: &mut Context,
    ) -> Result<(), BoxError> {
        self(input, request, context)
    }
}

pub trait DeserializeResponse<O, E>: Send + Sync
where
    E: StdError + Send + Sync + 'static,
{
    fn deserialize(&self, response: Response, context: &mut Context) -> Result<O, Error<E>>;
}

impl<O, E, F> DeserializeResponse<O, E> for F
where
    E: StdError + Send + Sync + 'static,
    F: Fn(Response, &mut Context) -> Result<O, Error<E>> + Send + Sync,
{
    fn deserialize(&self, response: Response, context: &mut Context) -> Result<O, Error<E>> {
        self(response, context)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(
        &self,
        request: Request,
        context: &mut Context,
    ) -> Result<Response, TransportError>;
}

#[derive(Debug, ThisError)]
pub enum BuildError {
    #[error("operation builder is missing its {field}")]
    MissingField { field: &'static str },
}

pub struct Operation<I, O, E>
where
    E: StdError + Send + Sync + 'static,
{
    pub(crate) operation_name: String,
    pub(crate) host: Option<String>,
    pub(crate) partition: Option<String>,
    pub(crate) serializer: Arc<dyn SerializeRequest<I>>,
    pub(crate) deserializer: Arc<dyn DeserializeResponse<O, E>>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) auth_resolver: Arc<dyn ResolveAuthScheme>,
    pub(crate) endpoint_resolver: Arc<dyn ResolveEndpoint>,
    pub(crate) retry_strategy: Arc<dyn RetryStrategy>,
    pub(crate) classifier: Arc<dyn ClassifyError<E>>,
    pub(crate) interceptors: Interceptors<I, O, E>,
    pub(crate) observer: Arc<dyn Observer>,
}

impl<I, O, E> Clone for Operation<I, O, E>
where
    E: StdError + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            operation_name: self.operation_name.clone(),
            host: self.host.clone(),
            partition: self.partition.clone(),
            serializer: Arc::clone(&self.serializer),
            deserializer: Arc::clone(&self.deserializer),
            transport: Arc::clone(&self.transport),
            auth_resolver: Arc::clone(&self.auth_resolver),
            endpoint_resolver: Arc::clone(&self.endpoint_resolver),
            retry_strategy: Arc::clone(&self.retry_strategy),
            classifier: Arc::clone(&self.classifier),
            interceptors: self.interceptors.clone(),
            observer: Arc::clone(&self.observer),
        }
    }
}

impl<I, O, E> Operation<I, O, E>
where
    E: StdError + Send + Sync + 'static,
{
    pub fn builder(operation_name: impl Into<String>) -> OperationBuilder<I, O, E> {
        OperationBuilder::new(operation_name)
    }

    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }
}

pub struct OperationBuilder<I, O, E>
where
    E: StdError + Send + Sync + 'static,
{
    operation_name: String,
    host: Option<String>,
    partition: Option<String>,
    serializer: Option<Arc<dyn SerializeRequest<I>>>,
    deserializer: Option<Arc<dyn DeserializeResponse<O, E>>>,
    transport: Option<Arc<dyn Transport>>,
    auth_resolver: Arc<dyn ResolveAuthScheme>,
    endpoint_resolver: Arc<dyn ResolveEndpoint>,
    retry_strategy: Arc<dyn RetryStrategy>,
    classifier: Arc<dyn ClassifyError<E>>,
    interceptors: Vec<Arc<dyn Interceptor<I, O, E>>>,
    observer: Arc<dyn Observer>,
}

impl<I, O, E> OperationBuilder<I, O, E>
where
    E: StdError + Send + Sync + 'static,
{
    pub(crate) fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            host: None,
            partition: None,
            serializer: None,
            deserializer: None,
            transport: None,
            auth_resolver: Arc::new(AnonymousAuthResolver),
            endpoint_resolver: Arc::new(HostEndpointResolver),
            retry_strategy: Arc::new(StandardRetryStrategy::standard()),
            classifier: Arc::new(DefaultErrorClassifier),
            interceptors: Vec::new(),
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = Some(partition.into());
        self
    }

    pub fn serializer(mut self, serializer: impl SerializeRequest<I> + 'static) -> Self {
        self.serializer = Some(Arc::new(serializer));
        self
    }

    pub fn deserializer(mut self, deserializer: impl DeserializeResponse<O, E> + 'static) -> Self {
        self.deserializer = Some(Arc::new(deserializer));
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn auth_resolver(mut self, auth_resolver: Arc<dyn ResolveAuthScheme>) -> Self {
        self.auth_resolver = auth_resolver;
        self
    }

    pub fn endpoint_resolver(mut self, endpoint_resolver: Arc<dyn ResolveEndpoint>) -> Self {
        self.endpoint_resolver = endpoint_resolver;
        self
    }

    pub fn retry_strategy(mut self, retry_strategy: Arc<dyn RetryStrategy>) -> Self {
        self.retry_strategy = retry_strategy;
        self
    }

    pub fn classifier(mut self, classifier: Arc<dyn ClassifyError<E>>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn interceptor(mut self, interceptor: impl Interceptor<I, O, E> + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    pub fn try_build(self) -> Result<Operation<I, O, E>, BuildError> {
        let serializer = self
            .serializer
            .ok_or(BuildError::MissingField { field: "serializer" })?;
        let deserializer = self
            .deserializer
            .ok_or(BuildError::MissingField {
                field: "deserializer",
            })?;
        let transport = self
            .transport
            .ok_or(BuildError::MissingField { field: "transport" })?;
        Ok(Operation {
            operation_name: self.operation_name,
            host: self.host,
            partition: self.partition,
            serializer,
            deserializer,
            transport,
            auth_resolver: self.auth_resolver,
            endpoint_resolver: self.endpoint_resolver,
            retry_strategy: self.retry_strategy,
            classifier: self.classifier,
            interceptors: Interceptors::new(self.interceptors),
            observer: self.observer,
        })
    }

    pub fn build(self) -> Operation<I, O, E> {
        self.try_build()
            .unwrap_or_else(|error| panic!("failed to build operation: {error}"))
    }
}
