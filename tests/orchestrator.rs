use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use opx::{
    BoxError, ClassifyError, Context, DefaultErrorClassifier, DisabledRetryStrategy, Error,
    ErrorInfo, ExecutionState, Hook, Interceptor, Observer, Operation, OperationBuilder, Request,
    Response, RetryDirective, RetryStrategy, RetryToken, StandardRetryStrategy, TokenScope,
    Transport, TransportError, TransportErrorKind,
};

#[derive(Clone, Debug)]
struct TestInput {
    foo: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct TestOutput {
    bar: String,
}

#[derive(Debug, thiserror::Error)]
#[error("service returned an error status")]
struct TestOperationError;

type TestState = ExecutionState<TestInput, TestOutput, TestOperationError>;

fn serialize_input(
    input: &TestInput,
    request: &mut Request,
    _context: &mut Context,
) -> Result<(), BoxError> {
    request.set_method(Method::GET);
    request.set_path("/");
    request.set_json(&input.foo)?;
    Ok(())
}

fn failing_serializer(
    _input: &TestInput,
    _request: &mut Request,
    _context: &mut Context,
) -> Result<(), BoxError> {
    Err("serializer exploded".into())
}

fn deserialize_output(
    response: Response,
    _context: &mut Context,
) -> Result<TestOutput, Error<TestOperationError>> {
    if !response.status().is_success() {
        return Err(Error::operation(TestOperationError));
    }
    let bar: String = response.json().map_err(Error::deserialization)?;
    Ok(TestOutput { bar })
}

enum Scripted {
    Respond(StatusCode),
    Fail(TransportErrorKind),
}

/// Transport stub: plays back a script, then echoes the request body with
/// status 200 once the script is exhausted.
struct StubTransport {
    script: Mutex<VecDeque<Scripted>>,
    calls: AtomicUsize,
    captured: Mutex<Vec<Request>>,
}

impl StubTransport {
    fn echo() -> Arc<Self> {
        Self::script(Vec::new())
    }

    fn script(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            captured: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn captured(&self) -> Vec<Request> {
        self.captured.lock().expect("captured lock").clone()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn execute(
        &self,
        request: Request,
        _context: &mut Context,
    ) -> Result<Response, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.captured
            .lock()
            .expect("captured lock")
            .push(request.clone());
        match self.script.lock().expect("script lock").pop_front() {
            Some(Scripted::Respond(status)) => {
                Ok(Response::new(status, HeaderMap::new(), Bytes::new()))
            }
            Some(Scripted::Fail(kind)) => {
                Err(TransportError::new(kind, "scripted transport failure"))
            }
            None => Ok(Response::new(
                StatusCode::OK,
                HeaderMap::new(),
                request.body().clone(),
            )),
        }
    }
}

macro_rules! record_read_hook {
    ($name:ident) => {
        fn $name(&self, _state: &TestState, _context: &mut Context) -> Result<(), BoxError> {
            self.trace
                .lock()
                .expect("trace lock")
                .push(stringify!($name));
            Ok(())
        }
    };
}

macro_rules! record_modify_hook {
    ($name:ident) => {
        fn $name(&self, _state: &mut TestState, _context: &mut Context) -> Result<(), BoxError> {
            self.trace
                .lock()
                .expect("trace lock")
                .push(stringify!($name));
            Ok(())
        }
    };
}

/// Appends every hook it sees to a shared trace, in invocation order.
struct RecordingInterceptor {
    trace: Arc<Mutex<Vec<&'static str>>>,
}

impl Interceptor<TestInput, TestOutput, TestOperationError> for RecordingInterceptor {
    record_read_hook!(read_before_execution);
    record_modify_hook!(modify_before_serialization);
    record_read_hook!(read_before_serialization);
    record_read_hook!(read_after_serialization);
    record_modify_hook!(modify_before_retry_loop);
    record_read_hook!(read_before_attempt);
    record_modify_hook!(modify_before_signing);
    record_read_hook!(read_before_signing);
    record_read_hook!(read_after_signing);
    record_modify_hook!(modify_before_transmit);
    record_read_hook!(read_before_transmit);
    record_read_hook!(read_after_transmit);
    record_modify_hook!(modify_before_deserialization);
    record_read_hook!(read_before_deserialization);
    record_read_hook!(read_after_deserialization);
    record_modify_hook!(modify_before_attempt_completion);
    record_read_hook!(read_after_attempt);
    record_modify_hook!(modify_before_completion);
    record_read_hook!(read_after_execution);
}

struct FailOnReadBeforeSerialization {
    message: &'static str,
}

impl Interceptor<TestInput, TestOutput, TestOperationError> for FailOnReadBeforeSerialization {
    fn read_before_serialization(
        &self,
        _state: &TestState,
        _context: &mut Context,
    ) -> Result<(), BoxError> {
        Err(self.message.into())
    }
}

struct ClearHostBeforeRetryLoop;

impl Interceptor<TestInput, TestOutput, TestOperationError> for ClearHostBeforeRetryLoop {
    fn modify_before_retry_loop(
        &self,
        _state: &mut TestState,
        context: &mut Context,
    ) -> Result<(), BoxError> {
        context.set_host("");
        Ok(())
    }
}

struct InjectTraceHeader;

impl Interceptor<TestInput, TestOutput, TestOperationError> for InjectTraceHeader {
    fn modify_before_transmit(
        &self,
        state: &mut TestState,
        _context: &mut Context,
    ) -> Result<(), BoxError> {
        if let Some(request) = state.request_mut() {
            request.headers_mut().insert(
                HeaderName::from_static("x-trace"),
                HeaderValue::from_static("injected"),
            );
        }
        Ok(())
    }
}

struct FailOnCompletion;

impl Interceptor<TestInput, TestOutput, TestOperationError> for FailOnCompletion {
    fn modify_before_completion(
        &self,
        _state: &mut TestState,
        _context: &mut Context,
    ) -> Result<(), BoxError> {
        Err("completion hook rejected the result".into())
    }
}

#[derive(Default)]
struct RecordingObserver {
    superseded: Mutex<Vec<String>>,
    retries: Mutex<Vec<u32>>,
}

impl Observer for RecordingObserver {
    fn on_interceptor_error(&self, _hook: Hook, _interceptor: &str, error: &BoxError) {
        self.superseded
            .lock()
            .expect("superseded lock")
            .push(error.to_string());
    }

    fn on_retry_scheduled(&self, attempt: u32, _info: &ErrorInfo, _delay: Duration) {
        self.retries.lock().expect("retries lock").push(attempt);
    }
}

struct FailingAcquireStrategy;

impl RetryStrategy for FailingAcquireStrategy {
    fn acquire_initial_token(&self, _scope: &TokenScope) -> Result<RetryToken, BoxError> {
        Err("no retry tokens available".into())
    }

    fn refresh_for_retry(
        &self,
        _token: &mut RetryToken,
        _info: &ErrorInfo,
    ) -> Result<RetryDirective, BoxError> {
        Ok(RetryDirective::GiveUp)
    }

    fn record_success(&self, _token: &mut RetryToken) {}
}

struct FailingRefreshStrategy;

impl RetryStrategy for FailingRefreshStrategy {
    fn acquire_initial_token(&self, scope: &TokenScope) -> Result<RetryToken, BoxError> {
        Ok(RetryToken::new(scope.clone()))
    }

    fn refresh_for_retry(
        &self,
        _token: &mut RetryToken,
        _info: &ErrorInfo,
    ) -> Result<RetryDirective, BoxError> {
        Err("refresh budget gone".into())
    }

    fn record_success(&self, _token: &mut RetryToken) {}
}

struct CountingStrategy {
    inner: StandardRetryStrategy,
    successes: AtomicUsize,
}

impl CountingStrategy {
    fn fast() -> Arc<Self> {
        Arc::new(Self {
            inner: StandardRetryStrategy::standard()
                .max_attempts(3)
                .base_backoff(Duration::from_millis(1))
                .max_backoff(Duration::from_millis(1))
                .jitter_ratio(0.0),
            successes: AtomicUsize::new(0),
        })
    }

    fn successes(&self) -> usize {
        self.successes.load(Ordering::SeqCst)
    }
}

impl RetryStrategy for CountingStrategy {
    fn acquire_initial_token(&self, scope: &TokenScope) -> Result<RetryToken, BoxError> {
        self.inner.acquire_initial_token(scope)
    }

    fn refresh_for_retry(
        &self,
        token: &mut RetryToken,
        info: &ErrorInfo,
    ) -> Result<RetryDirective, BoxError> {
        self.inner.refresh_for_retry(token, info)
    }

    fn record_success(&self, token: &mut RetryToken) {
        self.successes.fetch_add(1, Ordering::SeqCst);
        self.inner.record_success(token);
    }
}

struct CountingClassifier {
    count: AtomicUsize,
}

impl CountingClassifier {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            count: AtomicUsize::new(0),
        })
    }

    fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl ClassifyError<TestOperationError> for CountingClassifier {
    fn classify(
        &self,
        error: &Error<TestOperationError>,
        response: Option<&Response>,
    ) -> ErrorInfo {
        self.count.fetch_add(1, Ordering::SeqCst);
        DefaultErrorClassifier.classify(error, response)
    }
}

const OUTER_PREFIX: [&str; 5] = [
    "read_before_execution",
    "modify_before_serialization",
    "read_before_serialization",
    "read_after_serialization",
    "modify_before_retry_loop",
];

const COMPLETION: [&str; 2] = ["modify_before_completion", "read_after_execution"];

fn full_attempt() -> Vec<&'static str> {
    vec![
        "read_before_attempt",
        "modify_before_signing",
        "read_before_signing",
        "read_after_signing",
        "modify_before_transmit",
        "read_before_transmit",
        "read_after_transmit",
        "modify_before_deserialization",
        "read_before_deserialization",
        "read_after_deserialization",
        "modify_before_attempt_completion",
        "read_after_attempt",
    ]
}

/// The hook block of an attempt that dies at transmission: the post-transmit
/// phases are skipped, the attempt-completion hooks still run.
fn transmit_failed_attempt() -> Vec<&'static str> {
    vec![
        "read_before_attempt",
        "modify_before_signing",
        "read_before_signing",
        "read_after_signing",
        "modify_before_transmit",
        "read_before_transmit",
        "modify_before_attempt_completion",
        "read_after_attempt",
    ]
}

fn expected_trace(segments: &[&[&'static str]]) -> Vec<&'static str> {
    segments
        .iter()
        .flat_map(|segment| segment.iter().copied())
        .collect()
}

fn operation_builder(
    transport: Arc<StubTransport>,
) -> OperationBuilder<TestInput, TestOutput, TestOperationError> {
    Operation::builder("TestOperation")
        .host("api.example.com")
        .serializer(serialize_input)
        .deserializer(deserialize_output)
        .transport(transport)
}

fn input() -> TestInput {
    TestInput {
        foo: "foo".to_owned(),
    }
}

#[tokio::test]
async fn json_scenario_round_trips_without_retries() {
    let transport = StubTransport::echo();
    let trace = Arc::new(Mutex::new(Vec::new()));
    let operation = operation_builder(Arc::clone(&transport))
        .interceptor(RecordingInterceptor {
            trace: Arc::clone(&trace),
        })
        .try_build()
        .expect("operation is fully configured");

    let output = operation.execute(input()).await.expect("echo succeeds");
    assert_eq!(
        output,
        TestOutput {
            bar: "foo".to_owned()
        }
    );
    assert_eq!(transport.calls(), 1);

    let captured = transport.captured();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].method(), &Method::GET);
    assert_eq!(captured[0].path(), "/");
    assert_eq!(captured[0].host(), "api.example.com");
    assert_eq!(captured[0].body().as_ref(), b"\"foo\"");

    let recorded = trace.lock().expect("trace lock").clone();
    assert_eq!(
        recorded,
        expected_trace(&[&OUTER_PREFIX, &full_attempt(), &COMPLETION])
    );
}

#[tokio::test]
async fn rerunning_the_same_input_is_idempotent() {
    let mut outputs = Vec::new();
    let mut traces = Vec::new();
    for _ in 0..2 {
        let transport = StubTransport::echo();
        let trace = Arc::new(Mutex::new(Vec::new()));
        let operation = operation_builder(Arc::clone(&transport))
            .interceptor(RecordingInterceptor {
                trace: Arc::clone(&trace),
            })
            .try_build()
            .expect("operation is fully configured");
        outputs.push(operation.execute(input()).await.expect("echo succeeds"));
        traces.push(trace.lock().expect("trace lock").clone());
    }
    assert_eq!(outputs[0], outputs[1]);
    assert_eq!(outputs[0].bar.as_bytes(), outputs[1].bar.as_bytes());
    assert_eq!(traces[0], traces[1]);
}

#[tokio::test]
async fn failed_token_acquisition_runs_only_the_outer_hooks() {
    let transport = StubTransport::echo();
    let trace = Arc::new(Mutex::new(Vec::new()));
    let operation = operation_builder(Arc::clone(&transport))
        .interceptor(RecordingInterceptor {
            trace: Arc::clone(&trace),
        })
        .retry_strategy(Arc::new(FailingAcquireStrategy))
        .try_build()
        .expect("operation is fully configured");

    let error = operation
        .execute(input())
        .await
        .expect_err("token acquisition fails");
    match error {
        Error::TokenAcquisition { scope, source } => {
            assert_eq!(scope, "api.example.com");
            assert_eq!(source.to_string(), "no retry tokens available");
        }
        other => panic!("unexpected error variant: {other}"),
    }
    assert_eq!(transport.calls(), 0);
    let recorded = trace.lock().expect("trace lock").clone();
    assert_eq!(recorded, expected_trace(&[&OUTER_PREFIX, &COMPLETION]));
}

#[tokio::test]
async fn second_interceptor_error_wins_and_the_first_is_logged_once() {
    let transport = StubTransport::echo();
    let trace = Arc::new(Mutex::new(Vec::new()));
    let observer = Arc::new(RecordingObserver::default());
    let operation = operation_builder(Arc::clone(&transport))
        .interceptor(RecordingInterceptor {
            trace: Arc::clone(&trace),
        })
        .interceptor(FailOnReadBeforeSerialization {
            message: "first interceptor failed",
        })
        .interceptor(FailOnReadBeforeSerialization {
            message: "second interceptor failed",
        })
        .observer(observer.clone())
        .try_build()
        .expect("operation is fully configured");

    let error = operation
        .execute(input())
        .await
        .expect_err("both interceptors fail the hook");
    match error {
        Error::Interceptor { hook, source } => {
            assert_eq!(hook, Hook::ReadBeforeSerialization);
            assert_eq!(source.to_string(), "second interceptor failed");
        }
        other => panic!("unexpected error variant: {other}"),
    }

    let superseded = observer.superseded.lock().expect("superseded lock").clone();
    assert_eq!(superseded, vec!["first interceptor failed".to_owned()]);

    assert_eq!(transport.calls(), 0);
    let recorded = trace.lock().expect("trace lock").clone();
    assert_eq!(
        recorded,
        expected_trace(&[
            &[
                "read_before_execution",
                "modify_before_serialization",
                "read_before_serialization",
            ],
            &COMPLETION,
        ])
    );
}

#[tokio::test]
async fn transient_transport_failure_retries_then_succeeds() {
    let transport = StubTransport::script(vec![Scripted::Fail(TransportErrorKind::Read)]);
    let trace = Arc::new(Mutex::new(Vec::new()));
    let observer = Arc::new(RecordingObserver::default());
    let strategy = CountingStrategy::fast();
    let classifier = CountingClassifier::new();
    let operation = operation_builder(Arc::clone(&transport))
        .interceptor(RecordingInterceptor {
            trace: Arc::clone(&trace),
        })
        .retry_strategy(strategy.clone())
        .classifier(classifier.clone())
        .observer(observer.clone())
        .try_build()
        .expect("operation is fully configured");

    let output = operation
        .execute(input())
        .await
        .expect("second attempt succeeds");
    assert_eq!(
        output,
        TestOutput {
            bar: "foo".to_owned()
        }
    );
    assert_eq!(transport.calls(), 2);
    assert_eq!(classifier.count(), 1);
    assert_eq!(strategy.successes(), 1);
    assert_eq!(*observer.retries.lock().expect("retries lock"), vec![1]);

    let recorded = trace.lock().expect("trace lock").clone();
    assert_eq!(
        recorded,
        expected_trace(&[
            &OUTER_PREFIX,
            &transmit_failed_attempt(),
            &full_attempt(),
            &COMPLETION,
        ])
    );
}

#[tokio::test]
async fn server_error_status_is_classified_retryable_and_retried() {
    let transport = StubTransport::script(vec![Scripted::Respond(
        StatusCode::SERVICE_UNAVAILABLE,
    )]);
    let strategy = CountingStrategy::fast();
    let operation = operation_builder(Arc::clone(&transport))
        .retry_strategy(strategy.clone())
        .try_build()
        .expect("operation is fully configured");

    let output = operation
        .execute(input())
        .await
        .expect("echo succeeds after the 503");
    assert_eq!(output.bar, "foo");
    assert_eq!(transport.calls(), 2);
    assert_eq!(strategy.successes(), 1);
}

#[tokio::test]
async fn clearing_the_host_before_the_retry_loop_aborts_without_attempts() {
    let transport = StubTransport::echo();
    let trace = Arc::new(Mutex::new(Vec::new()));
    let operation = operation_builder(Arc::clone(&transport))
        .interceptor(RecordingInterceptor {
            trace: Arc::clone(&trace),
        })
        .interceptor(ClearHostBeforeRetryLoop)
        .try_build()
        .expect("operation is fully configured");

    let error = operation
        .execute(input())
        .await
        .expect_err("scope derivation fails on an empty host");
    match error {
        Error::InvalidTokenScope { host } => assert_eq!(host.as_deref(), Some("")),
        other => panic!("unexpected error variant: {other}"),
    }
    assert_eq!(transport.calls(), 0);
    let recorded = trace.lock().expect("trace lock").clone();
    assert_eq!(recorded, expected_trace(&[&OUTER_PREFIX, &COMPLETION]));
}

#[tokio::test]
async fn refresh_failure_replaces_the_attempt_error() {
    let transport = StubTransport::script(vec![Scripted::Fail(TransportErrorKind::Read)]);
    let operation = operation_builder(Arc::clone(&transport))
        .retry_strategy(Arc::new(FailingRefreshStrategy))
        .try_build()
        .expect("operation is fully configured");

    let error = operation
        .execute(input())
        .await
        .expect_err("refresh fails after the first attempt");
    match error {
        Error::RetryRefresh { attempts, source } => {
            assert_eq!(attempts, 1);
            assert_eq!(source.to_string(), "refresh budget gone");
        }
        other => panic!("unexpected error variant: {other}"),
    }
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn disabled_strategy_returns_the_last_attempt_error() {
    let transport = StubTransport::script(vec![Scripted::Fail(TransportErrorKind::Connect)]);
    let operation = operation_builder(Arc::clone(&transport))
        .retry_strategy(Arc::new(DisabledRetryStrategy))
        .try_build()
        .expect("operation is fully configured");

    let error = operation
        .execute(input())
        .await
        .expect_err("single attempt fails");
    match error {
        Error::Transport { kind, .. } => assert_eq!(kind, TransportErrorKind::Connect),
        other => panic!("unexpected error variant: {other}"),
    }
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn modify_hooks_can_rewrite_the_outbound_request() {
    let transport = StubTransport::echo();
    let operation = operation_builder(Arc::clone(&transport))
        .interceptor(InjectTraceHeader)
        .try_build()
        .expect("operation is fully configured");

    operation.execute(input()).await.expect("echo succeeds");
    let captured = transport.captured();
    assert_eq!(
        captured[0]
            .headers()
            .get("x-trace")
            .map(|value| value.as_bytes()),
        Some(b"injected".as_slice())
    );
}

#[tokio::test]
async fn serialization_failure_still_runs_the_completion_hooks() {
    let transport = StubTransport::echo();
    let trace = Arc::new(Mutex::new(Vec::new()));
    let operation = Operation::builder("TestOperation")
        .host("api.example.com")
        .serializer(failing_serializer)
        .deserializer(deserialize_output)
        .transport(Arc::clone(&transport) as Arc<dyn Transport>)
        .interceptor(RecordingInterceptor {
            trace: Arc::clone(&trace),
        })
        .try_build()
        .expect("operation is fully configured");

    let error = operation
        .execute(input())
        .await
        .expect_err("serializer fails");
    match error {
        Error::Serialization { source } => {
            assert_eq!(source.to_string(), "serializer exploded");
        }
        other => panic!("unexpected error variant: {other}"),
    }
    assert_eq!(transport.calls(), 0);
    let recorded = trace.lock().expect("trace lock").clone();
    assert_eq!(
        recorded,
        expected_trace(&[
            &[
                "read_before_execution",
                "modify_before_serialization",
                "read_before_serialization",
            ],
            &COMPLETION,
        ])
    );
}

#[tokio::test]
async fn completion_hook_failure_replaces_a_success() {
    let transport = StubTransport::echo();
    let operation = operation_builder(Arc::clone(&transport))
        .interceptor(FailOnCompletion)
        .try_build()
        .expect("operation is fully configured");

    let error = operation
        .execute(input())
        .await
        .expect_err("completion hook rejects the result");
    match error {
        Error::Interceptor { hook, source } => {
            assert_eq!(hook, Hook::ModifyBeforeCompletion);
            assert_eq!(source.to_string(), "completion hook rejected the result");
        }
        other => panic!("unexpected error variant: {other}"),
    }
    // The attempt itself succeeded and was transmitted exactly once.
    assert_eq!(transport.calls(), 1);
}
