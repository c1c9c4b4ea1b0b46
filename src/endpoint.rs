use crate::context::Context;
use crate::error::BoxError;
use crate::request::Request;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    scheme: String,
    host: String,
    path_prefix: String,
}

impl Endpoint {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            scheme: "https".to_owned(),
            host: host.into(),
            path_prefix: String::new(),
        }
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn with_path_prefix(mut self, path_prefix: impl Into<String>) -> Self {
        self.path_prefix = path_prefix.into();
        self
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path_prefix(&self) -> &str {
        &self.path_prefix
    }

    pub fn apply_to(&self, request: &mut Request) {
        if !self.host.is_empty() {
            request.set_scheme(self.scheme.clone());
            request.set_host(self.host.clone());
        }
        if !self.path_prefix.is_empty() {
            let joined = join_paths(&self.path_prefix, request.path());
            request.set_path(joined);
        }
    }
}

pub trait ResolveEndpoint: Send + Sync {
    fn resolve(&self, context: &Context) -> Result<Endpoint, BoxError>;
}

impl<F> ResolveEndpoint for F
where
    F: Fn(&Context) -> Result<Endpoint, BoxError> + Send + Sync,
{
    fn resolve(&self, context: &Context) -> Result<Endpoint, BoxError> {
        self(context)
    }
}

#[derive(Debug, Default)]
pub struct HostEndpointResolver;

impl ResolveEndpoint for HostEndpointResolver {
    fn resolve(&self, context: &Context) -> Result<Endpoint, BoxError> {
        match context.host() {
            Some(host) if !host.is_empty() => Ok(Endpoint::new(host)),
            _ => Err("host attribute is not set".into()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct StaticEndpointResolver {
    endpoint: Endpoint,
}

impl StaticEndpointResolver {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }
}

impl ResolveEndpoint for StaticEndpointResolver {
    fn resolve(&self, _context: &Context) -> Result<Endpoint, BoxError> {
        Ok(self.endpoint.clone())
    }
}

fn join_paths(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if path == "/" && !prefix.is_empty() {
        return prefix.to_owned();
    }
    if path.starts_with('/') {
        format!("{prefix}{path}")
    } else {
        format!("{prefix}/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::{Endpoint, HostEndpointResolver, ResolveEndpoint, join_paths};
    use crate::context::Context;
    use crate::request::Request;

    #[test]
    fn join_paths_handles_slashes() {
        assert_eq!(join_paths("/v1/", "/users"), "/v1/users");
        assert_eq!(join_paths("/v1", "users"), "/v1/users");
        assert_eq!(join_paths("/v1", "/"), "/v1");
    }

    #[test]
    fn apply_to_sets_host_and_prefixes_path() {
        let mut request = Request::new();
        request.set_path("/items");
        Endpoint::new("api.example.com")
            .with_path_prefix("/v2")
            .apply_to(&mut request);
        assert_eq!(request.host(), "api.example.com");
        assert_eq!(request.scheme(), "https");
        assert_eq!(request.path(), "/v2/items");
    }

    #[test]
    fn empty_endpoint_host_leaves_the_request_alone() {
        let mut request = Request::new();
        request.set_host("pinned.example.com");
        Endpoint::new("").apply_to(&mut request);
        assert_eq!(request.host(), "pinned.example.com");
    }

    #[test]
    fn host_resolver_requires_the_host_attribute() {
        let context = Context::builder("TestOperation").build();
        let error = HostEndpointResolver
            .resolve(&context)
            .expect_err("missing host must fail resolution");
        assert!(error.to_string().contains("host attribute"));

        let context = Context::builder("TestOperation")
            .host("api.example.com")
            .build();
        let endpoint = HostEndpointResolver
            .resolve(&context)
            .expect("host attribute is set");
        assert_eq!(endpoint.host(), "api.example.com");
    }
}
