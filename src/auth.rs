use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use crate::context::Context;
use crate::error::BoxError;
use crate::request::Request;

#[derive(Clone)]
pub struct Identity {
    payload: Arc<dyn Any + Send + Sync>,
    expiration: Option<SystemTime>,
}

impl Identity {
    pub fn new<T>(payload: T, expiration: Option<SystemTime>) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self {
            payload: Arc::new(payload),
            expiration,
        }
    }

    pub fn anonymous() -> Self {
        Self::new((), None)
    }

    pub fn payload<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.payload.downcast_ref::<T>()
    }

    pub fn expiration(&self) -> Option<SystemTime> {
        self.expiration
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Payloads are credentials; never print them.
        formatter
            .debug_struct("Identity")
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

pub trait Sign: Send + Sync {
    fn sign(
        &self,
        request: &mut Request,
        identity: &Identity,
        context: &Context,
    ) -> Result<(), BoxError>;
}

#[derive(Debug, Default)]
pub struct NoSigner;

impl Sign for NoSigner {
    fn sign(
        &self,
        _request: &mut Request,
        _identity: &Identity,
        _context: &Context,
    ) -> Result<(), BoxError> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct SelectedAuthScheme {
    scheme_id: &'static str,
    identity: Identity,
    signer: Arc<dyn Sign>,
}

impl SelectedAuthScheme {
    pub fn new(scheme_id: &'static str, identity: Identity, signer: Arc<dyn Sign>) -> Self {
        Self {
            scheme_id,
            identity,
            signer,
        }
    }

    pub fn anonymous() -> Self {
        Self::new("anonymous", Identity::anonymous(), Arc::new(NoSigner))
    }

    pub fn scheme_id(&self) -> &'static str {
        self.scheme_id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn signer(&self) -> &dyn Sign {
        self.signer.as_ref()
    }
}

impl fmt::Debug for SelectedAuthScheme {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SelectedAuthScheme")
            .field("scheme_id", &self.scheme_id)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

pub trait ResolveAuthScheme: Send + Sync {
    fn resolve(&self, context: &Context) -> Result<SelectedAuthScheme, BoxError>;
}

impl<F> ResolveAuthScheme for F
where
    F: Fn(&Context) -> Result<SelectedAuthScheme, BoxError> + Send + Sync,
{
    fn resolve(&self, context: &Context) -> Result<SelectedAuthScheme, BoxError> {
        self(context)
    }
}

#[derive(Debug, Default)]
pub struct AnonymousAuthResolver;

impl ResolveAuthScheme for AnonymousAuthResolver {
    fn resolve(&self, _context: &Context) -> Result<SelectedAuthScheme, BoxError> {
        Ok(SelectedAuthScheme::anonymous())
    }
}
