use std::error::Error as StdError;

use crate::error::Error;
use crate::request::Request;
use crate::response::Response;

pub struct ExecutionState<I, O, E>
where
    E: StdError + Send + Sync + 'static,
{
    input: I,
    request: Option<Request>,
    attempt_request: Option<Request>,
    response: Option<Response>,
    result: Option<Result<O, Error<E>>>,
    attempt: u32,
}

impl<I, O, E> ExecutionState<I, O, E>
where
    E: StdError + Send + Sync + 'static,
{
    pub(crate) fn new(input: I) -> Self {
        Self {
            input,
            request: None,
            attempt_request: None,
            response: None,
            result: None,
            attempt: 0,
        }
    }

    pub fn input(&self) -> &I {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut I {
        &mut self.input
    }

    pub fn request(&self) -> Option<&Request> {
        self.attempt_request.as_ref().or(self.request.as_ref())
    }

    pub fn request_mut(&mut self) -> Option<&mut Request> {
        self.attempt_request.as_mut().or(self.request.as_mut())
    }

    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    pub fn response_mut(&mut self) -> Option<&mut Response> {
        self.response.as_mut()
    }

    pub fn result(&self) -> Option<&Result<O, Error<E>>> {
        self.result.as_ref()
    }

    pub fn set_result(&mut self, result: Result<O, Error<E>>) {
        self.result = Some(result);
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub(crate) fn set_request(&mut self, request: Request) {
        self.request = Some(request);
    }

    pub(crate) fn begin_attempt(&mut self) {
        self.attempt += 1;
        self.attempt_request = self.request.clone();
        self.response = None;
        self.result = None;
    }

    pub(crate) fn attempt_request_mut(&mut self) -> &mut Request {
        match self.attempt_request.as_mut() {
            Some(request) => request,
            None => unreachable!("attempt phases run only after begin_attempt"),
        }
    }

    pub(crate) fn attempt_request(&self) -> &Request {
        match self.attempt_request.as_ref() {
            Some(request) => request,
            None => unreachable!("attempt phases run only after begin_attempt"),
        }
    }

    pub(crate) fn set_response(&mut self, response: Response) {
        self.response = Some(response);
    }

    pub(crate) fn fail(&mut self, error: Error<E>) {
        self.result = Some(Err(error));
    }

    pub(crate) fn take_result(&mut self) -> Option<Result<O, Error<E>>> {
        self.result.take()
    }
}
