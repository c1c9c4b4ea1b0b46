use crate::attributes::{AttributeKey, Attributes};
use crate::auth::SelectedAuthScheme;

pub mod keys {
    use super::{AttributeKey, SelectedAuthScheme};

    pub const PARTITION: AttributeKey<String> = AttributeKey::new("opx.partition");
    pub const HOST: AttributeKey<String> = AttributeKey::new("opx.host");
    pub const SIGNING_NAME: AttributeKey<String> = AttributeKey::new("opx.signing.name");
    pub const SIGNING_REGION: AttributeKey<String> = AttributeKey::new("opx.signing.region");
    pub const SELECTED_AUTH_SCHEME: AttributeKey<SelectedAuthScheme> =
        AttributeKey::new("opx.auth.selected_scheme");
    pub const CHUNKED_STREAM_ELIGIBLE: AttributeKey<bool> =
        AttributeKey::new("opx.body.chunked_stream_eligible");
}

#[derive(Debug)]
pub struct Context {
    operation_name: String,
    attributes: Attributes,
}

impl Context {
    pub fn builder(operation_name: impl Into<String>) -> ContextBuilder {
        ContextBuilder {
            operation_name: operation_name.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    pub fn set<T>(&mut self, key: AttributeKey<T>, value: T) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.attributes.set(key, value)
    }

    pub fn get<T>(&self, key: AttributeKey<T>) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.attributes.get(key)
    }

    pub fn host(&self) -> Option<&str> {
        self.attributes.get(keys::HOST).map(String::as_str)
    }

    pub fn set_host(&mut self, host: impl Into<String>) {
        self.attributes.set(keys::HOST, host.into());
    }

    pub fn partition(&self) -> Option<&str> {
        self.attributes.get(keys::PARTITION).map(String::as_str)
    }

    pub fn set_partition(&mut self, partition: impl Into<String>) {
        self.attributes.set(keys::PARTITION, partition.into());
    }

    pub fn signing_name(&self) -> Option<&str> {
        self.attributes.get(keys::SIGNING_NAME).map(String::as_str)
    }

    pub fn signing_region(&self) -> Option<&str> {
        self.attributes.get(keys::SIGNING_REGION).map(String::as_str)
    }

    pub fn selected_auth_scheme(&self) -> Option<&SelectedAuthScheme> {
        self.attributes.get(keys::SELECTED_AUTH_SCHEME)
    }

    pub fn set_selected_auth_scheme(&mut self, scheme: SelectedAuthScheme) {
        self.attributes.set(keys::SELECTED_AUTH_SCHEME, scheme);
    }
}

pub struct ContextBuilder {
    operation_name: String,
    attributes: Attributes,
}

impl ContextBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.attributes.set(keys::HOST, host.into());
        self
    }

    pub fn partition(mut self, partition: impl Into<String>) -> Self {
        self.attributes.set(keys::PARTITION, partition.into());
        self
    }

    pub fn signing_name(mut self, signing_name: impl Into<String>) -> Self {
        self.attributes.set(keys::SIGNING_NAME, signing_name.into());
        self
    }

    pub fn signing_region(mut self, signing_region: impl Into<String>) -> Self {
        self.attributes.set(keys::SIGNING_REGION, signing_region.into());
        self
    }

    pub fn attribute<T>(mut self, key: AttributeKey<T>, value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        self.attributes.set(key, value);
        self
    }

    pub fn build(self) -> Context {
        Context {
            operation_name: self.operation_name,
            attributes: self.attributes,
        }
    }
}
