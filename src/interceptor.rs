use std::error::Error as StdError;
use std::sync::Arc;

use tracing::warn;

use crate::context::Context;
use crate::error::{BoxError, Error};
use crate::observe::Observer;
use crate::state::ExecutionState;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Hook {
    ReadBeforeExecution,
    ModifyBeforeSerialization,
    ReadBeforeSerialization,
    ReadAfterSerialization,
    ModifyBeforeRetryLoop,
    ReadBeforeAttempt,
    ModifyBeforeSigning,
    ReadBeforeSigning,
    ReadAfterSigning,
    ModifyBeforeTransmit,
    ReadBeforeTransmit,
    ReadAfterTransmit,
    ModifyBeforeDeserialization,
    ReadBeforeDeserialization,
    ReadAfterDeserialization,
    ModifyBeforeAttemptCompletion,
    ReadAfterAttempt,
    ModifyBeforeCompletion,
    ReadAfterExecution,
}

impl Hook {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ReadBeforeExecution => "read_before_execution",
            Self::ModifyBeforeSerialization => "modify_before_serialization",
            Self::ReadBeforeSerialization => "read_before_serialization",
            Self::ReadAfterSerialization => "read_after_serialization",
            Self::ModifyBeforeRetryLoop => "modify_before_retry_loop",
            Self::ReadBeforeAttempt => "read_before_attempt",
            Self::ModifyBeforeSigning => "modify_before_signing",
            Self::ReadBeforeSigning => "read_before_signing",
            Self::ReadAfterSigning => "read_after_signing",
            Self::ModifyBeforeTransmit => "modify_before_transmit",
            Self::ReadBeforeTransmit => "read_before_transmit",
            Self::ReadAfterTransmit => "read_after_transmit",
            Self::ModifyBeforeDeserialization => "modify_before_deserialization",
            Self::ReadBeforeDeserialization => "read_before_deserialization",
            Self::ReadAfterDeserialization => "read_after_deserialization",
            Self::ModifyBeforeAttemptCompletion => "modify_before_attempt_completion",
            Self::ReadAfterAttempt => "read_after_attempt",
            Self::ModifyBeforeCompletion => "modify_before_completion",
            Self::ReadAfterExecution => "read_after_execution",
        }
    }
}

impl std::fmt::Display for Hook {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[allow(unused_variables)]
pub trait Interceptor<I, O, E>: Send + Sync
where
    E: StdError + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn read_before_execution(
        &self,
        state: &ExecutionState<I, O, E>,
        context: &mut Context,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    fn modify_before_serialization(
        &self,
        state: &mut ExecutionState<I, O, E>,
        context: &mut Context,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    fn read_before_serialization(
        &self,
        state: &ExecutionState<I, O, E>,
        context: &mut Context,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    fn read_after_serialization(
        &self,
        state: &ExecutionState<I, O, E>,
        context: &mut Context,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    fn modify_before_retry_loop(
        &self,
        state: &mut ExecutionState<I, O, E>,
        context: &mut Context,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    fn read_before_attempt(
        &self,
        state: &ExecutionState<I, O, E>,
        context: &mut Context,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    fn modify_before_signing(
        &self,
        state: &mut ExecutionState<I, O, E>,
        context: &mut Context,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    fn read_before_signing(
        &self,
        state: &ExecutionState<I, O, E>,
        context: &mut Context,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    fn read_after_signing(
        &self,
        state: &ExecutionState<I, O, E>,
        context: &mut Context,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    fn modify_before_transmit(
        &self,
        state: &mut ExecutionState<I, O, E>,
        context: &mut Context,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    fn read_before_transmit(
        &self,
        state: &ExecutionState<I, O, E>,
        context: &mut Context,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    fn read_after_transmit(
        &self,
        state: &ExecutionState<I, O, E>,
        context: &mut Context,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    fn modify_before_deserialization(
        &self,
        state: &mut ExecutionState<I, O, E>,
        context: &mut Context,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    fn read_before_deserialization(
        &self,
        state: &ExecutionState<I, O, E>,
        context: &mut Context,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    fn read_after_deserialization(
        &self,
        state: &ExecutionState<I, O, E>,
        context: &mut Context,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    fn modify_before_attempt_completion(
        &self,
        state: &mut ExecutionState<I, O, E>,
        context: &mut Context,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    fn read_after_attempt(
        &self,
        state: &ExecutionState<I, O, E>,
        context: &mut Context,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    fn modify_before_completion(
        &self,
        state: &mut ExecutionState<I, O, E>,
        context: &mut Context,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    fn read_after_execution(
        &self,
        state: &ExecutionState<I, O, E>,
        context: &mut Context,
    ) -> Result<(), BoxError> {
        Ok(())
    }
}

fn supersede(
    hook: Hook,
    held: &mut Option<(&'static str, BoxError)>,
    interceptor: &'static str,
    error: BoxError,
    observer: &dyn Observer,
) {
    if let Some((superseded_by, superseded)) = held.replace((interceptor, error)) {
        warn!(
            hook = hook.as_str(),
            interceptor = superseded_by,
            error = %superseded,
            "interceptor error superseded by a later interceptor in the same hook"
        );
        observer.on_interceptor_error(hook, superseded_by, &superseded);
    }
}

fn finish_hook<E>(hook: Hook, held: Option<(&'static str, BoxError)>) -> Result<(), Error<E>>
where
    E: StdError + Send + Sync + 'static,
{
    match held {
        Some((_, source)) => Err(Error::Interceptor { hook, source }),
        None => Ok(()),
    }
}

macro_rules! read_hook {
    ($method:ident, $hook:expr) => {
        pub(crate) fn $method(
            &self,
            state: &ExecutionState<I, O, E>,
            context: &mut Context,
            observer: &dyn Observer,
        ) -> Result<(), Error<E>> {
            let mut held = None;
            for interceptor in &self.list {
                if let Err(error) = interceptor.$method(state, context) {
                    supersede($hook, &mut held, interceptor.name(), error, observer);
                }
            }
            finish_hook($hook, held)
        }
    };
}

macro_rules! modify_hook {
    ($method:ident, $hook:expr) => {
        pub(crate) fn $method(
            &self,
            state: &mut ExecutionState<I, O, E>,
            context: &mut Context,
            observer: &dyn Observer,
        ) -> Result<(), Error<E>> {
            let mut held = None;
            for interceptor in &self.list {
                if let Err(error) = interceptor.$method(state, context) {
                    supersede($hook, &mut held, interceptor.name(), error, observer);
                }
            }
            finish_hook($hook, held)
        }
    };
}

pub(crate) struct Interceptors<I, O, E>
where
    E: StdError + Send + Sync + 'static,
{
    list: Vec<Arc<dyn Interceptor<I, O, E>>>,
}

impl<I, O, E> Clone for Interceptors<I, O, E>
where
    E: StdError + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            list: self.list.clone(),
        }
    }
}

impl<I, O, E> Interceptors<I, O, E>
where
    E: StdError + Send + Sync + 'static,
{
    pub(crate) fn new(list: Vec<Arc<dyn Interceptor<I, O, E>>>) -> Self {
        Self { list }
    }

    read_hook!(read_before_execution, Hook::ReadBeforeExecution);
    modify_hook!(modify_before_serialization, Hook::ModifyBeforeSerialization);
    read_hook!(read_before_serialization, Hook::ReadBeforeSerialization);
    read_hook!(read_after_serialization, Hook::ReadAfterSerialization);
    modify_hook!(modify_before_retry_loop, Hook::ModifyBeforeRetryLoop);
    read_hook!(read_before_attempt, Hook::ReadBeforeAttempt);
    modify_hook!(modify_before_signing, Hook::ModifyBeforeSigning);
    read_hook!(read_before_signing, Hook::ReadBeforeSigning);
    read_hook!(read_after_signing, Hook::ReadAfterSigning);
    modify_hook!(modify_before_transmit, Hook::ModifyBeforeTransmit);
    read_hook!(read_before_transmit, Hook::ReadBeforeTransmit);
    read_hook!(read_after_transmit, Hook::ReadAfterTransmit);
    modify_hook!(
        modify_before_deserialization,
        Hook::ModifyBeforeDeserialization
    );
    read_hook!(read_before_deserialization, Hook::ReadBeforeDeserialization);
    read_hook!(read_after_deserialization, Hook::ReadAfterDeserialization);
    modify_hook!(
        modify_before_attempt_completion,
        Hook::ModifyBeforeAttemptCompletion
    );
    read_hook!(read_after_attempt, Hook::ReadAfterAttempt);
    modify_hook!(modify_before_completion, Hook::ModifyBeforeCompletion);
    read_hook!(read_after_execution, Hook::ReadAfterExecution);
}
