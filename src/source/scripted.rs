//! In-memory executor replaying scripted result sets
//!
//! Each query text has a queue of responses. Responses are consumed in
//! order; the last one repeats for every later cycle.

use super::{QueryExecutor, ResultSet};
use crate::error::SourceError;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone)]
enum Response {
    Rows(ResultSet),
    Fail(String),
}

#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    responses: HashMap<String, VecDeque<Response>>,
    executed: Vec<String>,
    connects: usize,
    fail_connect: bool,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a result set for `sql`
    pub fn push(&mut self, sql: &str, result: ResultSet) -> &mut Self {
        self.responses
            .entry(sql.to_string())
            .or_default()
            .push_back(Response::Rows(result));
        self
    }

    /// Queue a failure for `sql`
    pub fn push_error(&mut self, sql: &str, message: &str) -> &mut Self {
        self.responses
            .entry(sql.to_string())
            .or_default()
            .push_back(Response::Fail(message.to_string()));
        self
    }

    pub fn fail_connect(&mut self, fail: bool) {
        self.fail_connect = fail;
    }

    /// Every query run so far, in order
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    pub fn connects(&self) -> usize {
        self.connects
    }

    fn next_response(&mut self, sql: &str) -> Option<Response> {
        let queue = self.responses.get_mut(sql)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl QueryExecutor for ScriptedExecutor {
    async fn connect(&mut self) -> Result<(), SourceError> {
        if self.fail_connect {
            return Err(SourceError::connection("scripted connect failure"));
        }
        self.connects += 1;
        Ok(())
    }

    async fn query(&mut self, sql: &str) -> Result<ResultSet, SourceError> {
        self.executed.push(sql.to_string());
        match self.next_response(sql) {
            Some(Response::Rows(result)) => Ok(result),
            Some(Response::Fail(message)) => Err(SourceError::query(sql, message)),
            None => Err(SourceError::query(sql, "no scripted response")),
        }
    }
}
