use std::error::Error as StdError;

use tokio::time::sleep;
use tracing::{Instrument, debug, info_span, warn};

use crate::context::{Context, keys};
use crate::error::Error;
use crate::operation::Operation;
use crate::request::Request;
use crate::retry::{RetryDirective, RetryToken, TokenScope};
use crate::state::ExecutionState;

impl<I, O, E> Operation<I, O, E>
where
    I: Send + Sync,
    O: Send + Sync,
    E: StdError + Send + Sync + 'static,
{
    pub async fn execute(&self, input: I) -> Result<O, Error<E>> {
        let mut builder = Context::builder(self.operation_name.clone());
        if let Some(host) = &self.host {
            builder = builder.host(host.clone());
        }
        if let Some(partition) = &self.partition {
            builder = builder.partition(partition.clone());
        }
        self.execute_with_context(input, builder.build()).await
    }

    pub async fn execute_with_context(
        &self,
        input: I,
        mut context: Context,
    ) -> Result<O, Error<E>> {
        let span = info_span!("opx.operation", operation = %context.operation_name());
        let mut state = ExecutionState::new(input);

        async {
            if let Err(error) = self.run_pipeline(&mut state, &mut context).await {
                state.fail(error);
            }
            // Completion hooks run exactly once, success or failure, even
            // when the pipeline aborted before its first attempt.
            let observer = self.observer.as_ref();
            if let Err(error) =
                self.interceptors
                    .modify_before_completion(&mut state, &mut context, observer)
            {
                state.fail(error);
            }
            if let Err(error) = self
                .interceptors
                .read_after_execution(&state, &mut context, observer)
            {
                state.fail(error);
            }
        }
        .instrument(span)
        .await;

        match state.take_result() {
            Some(result) => result,
            None => unreachable!("the pipeline always records a result before completion"),
        }
    }

    async fn run_pipeline(
        &self,
        state: &mut ExecutionState<I, O, E>,
        context: &mut Context,
    ) -> Result<(), Error<E>> {
        let observer = self.observer.as_ref();
        self.interceptors
            .read_before_execution(state, context, observer)?;
        self.interceptors
            .modify_before_serialization(state, context, observer)?;
        self.interceptors
            .read_before_serialization(state, context, observer)?;

        debug!("serializing operation input");
        let mut request = Request::new();
        self.serializer
            .serialize(state.input(), &mut request, context)
            .map_err(Error::serialization)?;
        state.set_request(request);

        self.interceptors
            .read_after_serialization(state, context, observer)?;
        self.interceptors
            .modify_before_retry_loop(state, context, observer)?;

        let scope = derive_token_scope(context)?;
        debug!(scope = %scope, "acquiring initial retry token");
        let mut token = self
            .retry_strategy
            .acquire_initial_token(&scope)
            .map_err(|source| Error::TokenAcquisition {
                scope: scope.as_str().to_owned(),
                source,
            })?;

        self.run_attempt_loop(state, context, &mut token).await;
        Ok(())
    }

    async fn run_attempt_loop(
        &self,
        state: &mut ExecutionState<I, O, E>,
        context: &mut Context,
        token: &mut RetryToken,
    ) {
        loop {
            let attempt_span = info_span!("opx.attempt", attempt = state.attempt() + 1);
            self.run_attempt(state, context).instrument(attempt_span).await;

            if matches!(state.result(), Some(Ok(_))) {
                debug!(attempt = state.attempt(), "attempt succeeded");
                self.retry_strategy.record_success(token);
                return;
            }

            let info = {
                let Some(Err(error)) = state.result() else {
                    unreachable!("an attempt always records a result");
                };
                let info = self.classifier.classify(error, state.response());
                debug!(
                    attempt = state.attempt(),
                    class = info.class.as_str(),
                    "classified attempt failure"
                );
                info
            };
            if !info.class.is_retryable() {
                return;
            }

            match self.retry_strategy.refresh_for_retry(token, &info) {
                Ok(RetryDirective::RetryAfter(delay)) => {
                    warn!(
                        attempt = state.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        class = info.class.as_str(),
                        "retrying after retryable attempt failure"
                    );
                    self.observer.on_retry_scheduled(state.attempt(), &info, delay);
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                }
                Ok(RetryDirective::GiveUp) => {
                    debug!(
                        attempt = state.attempt(),
                        "retry strategy declined another attempt"
                    );
                    return;
                }
                Err(source) => {
                    let attempts = state.attempt();
                    state.fail(Error::RetryRefresh { attempts, source });
                    return;
                }
            }
        }
    }

    async fn run_attempt(&self, state: &mut ExecutionState<I, O, E>, context: &mut Context) {
        state.begin_attempt();
        self.observer.on_attempt_started(state.attempt());

        if let Err(error) = self.run_attempt_phases(state, context).await {
            state.fail(error);
        }

        let observer = self.observer.as_ref();
        if let Err(error) =
            self.interceptors
                .modify_before_attempt_completion(state, context, observer)
        {
            state.fail(error);
        }
        if let Err(error) = self
            .interceptors
            .read_after_attempt(state, context, observer)
        {
            state.fail(error);
        }
    }

    async fn run_attempt_phases(
        &self,
        state: &mut ExecutionState<I, O, E>,
        context: &mut Context,
    ) -> Result<(), Error<E>> {
        let observer = self.observer.as_ref();
        self.interceptors
            .read_before_attempt(state, context, observer)?;

        debug!("selecting auth scheme");
        let scheme = self
            .auth_resolver
            .resolve(context)
            .map_err(Error::auth_scheme_resolution)?;
        context.set_selected_auth_scheme(scheme);

        debug!("resolving endpoint");
        let endpoint = self
            .endpoint_resolver
            .resolve(context)
            .map_err(Error::endpoint_resolution)?;
        endpoint.apply_to(state.attempt_request_mut());

        self.interceptors
            .modify_before_signing(state, context, observer)?;
        self.interceptors
            .read_before_signing(state, context, observer)?;

        debug!("signing request");
        let scheme = context
            .selected_auth_scheme()
            .cloned()
            .ok_or(Error::MissingAttribute {
                name: keys::SELECTED_AUTH_SCHEME.name(),
            })?;
        scheme
            .signer()
            .sign(state.attempt_request_mut(), scheme.identity(), context)
            .map_err(Error::signing)?;

        self.interceptors
            .read_after_signing(state, context, observer)?;
        self.interceptors
            .modify_before_transmit(state, context, observer)?;
        self.interceptors
            .read_before_transmit(state, context, observer)?;

        debug!("transmitting request");
        let request = state.attempt_request().clone();
        let response = self.transport.execute(request, context).await?;
        state.set_response(response);

        self.interceptors
            .read_after_transmit(state, context, observer)?;
        self.interceptors
            .modify_before_deserialization(state, context, observer)?;
        self.interceptors
            .read_before_deserialization(state, context, observer)?;

        debug!("deserializing response");
        // The deserializer gets the response by value; the buffered copy
        // stays in the state so attempt completion and failure
        // classification can still read the status and headers.
        let response = match state.response() {
            Some(response) => response.clone(),
            None => unreachable!("transmit stores the response before deserialization"),
        };
        let outcome = self.deserializer.deserialize(response, context);
        state.set_result(outcome);

        self.interceptors
            .read_after_deserialization(state, context, observer)?;
        Ok(())
    }
}

fn derive_token_scope<E>(context: &Context) -> Result<TokenScope, Error<E>>
where
    E: StdError + Send + Sync + 'static,
{
    if let Some(partition) = context.partition() {
        if !partition.is_empty() {
            return Ok(TokenScope::new(partition));
        }
    }
    match context.host() {
        Some(host) if !host.is_empty() => Ok(TokenScope::new(host)),
        host => Err(Error::InvalidTokenScope {
            host: host.map(ToOwned::to_owned),
        }),
    }
}
