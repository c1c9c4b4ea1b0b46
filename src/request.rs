use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderValue};
use http::{HeaderMap, Method, Uri};
use serde::Serialize;

#[derive(Clone, Debug)]
pub struct Request {
    method: Method,
    scheme: String,
    host: String,
    path: String,
    headers: HeaderMap,
    body: Bytes,
}

impl Request {
    pub fn new() -> Self {
        Self {
            method: Method::GET,
            scheme: "https".to_owned(),
            host: String::new(),
            path: "/".to_owned(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn set_scheme(&mut self, scheme: impl Into<String>) {
        self.scheme = scheme.into();
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn set_host(&mut self, host: impl Into<String>) {
        self.host = host.into();
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn set_path(&mut self, path: impl Into<String>) {
        let path = path.into();
        self.path = if path.is_empty() {
            "/".to_owned()
        } else if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    pub fn set_json<T>(&mut self, payload: &T) -> Result<(), serde_json::Error>
    where
        T: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(payload)?;
        self.body = Bytes::from(body);
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(())
    }

    pub fn uri(&self) -> Result<Uri, http::uri::InvalidUri> {
        format!("{}://{}{}", self.scheme, self.host, self.path).parse()
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}
