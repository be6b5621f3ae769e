//! In-process page source for unit tests

use crate::api::types::{record, Page, QueryParams, CURSOR_PARAM};
use crate::error::{ApiError, CollectError, Result};
use crate::pagination::PageSource;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

enum Step {
    Page(Vec<String>),
    Fail(ApiError),
}

/// Serves scripted pages per endpoint path.
///
/// Page `i` of a path is answered for cursor `c{i}` (no cursor for page 0);
/// every page except the last carries the cursor of its successor.
#[derive(Default)]
pub struct ScriptedSource {
    scripts: HashMap<String, Vec<Step>>,
    requests: Mutex<Vec<(String, QueryParams)>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pages(self, path: &str, pages: &[&[&str]]) -> Self {
        let owned = pages
            .iter()
            .map(|p| p.iter().map(|r| r.to_string()).collect())
            .collect();
        self.owned_pages(path, owned)
    }

    pub fn owned_pages(mut self, path: &str, pages: Vec<Vec<String>>) -> Self {
        let steps = self.scripts.entry(path.to_string()).or_default();
        steps.extend(pages.into_iter().map(Step::Page));
        self
    }

    /// Fail the first request to `path`.
    pub fn fail(self, path: &str, err: ApiError) -> Self {
        self.fail_at(path, 0, err)
    }

    /// Replace page `index` of `path` with a failure.
    pub fn fail_at(mut self, path: &str, index: usize, err: ApiError) -> Self {
        let steps = self.scripts.entry(path.to_string()).or_default();
        while steps.len() <= index {
            steps.push(Step::Page(Vec::new()));
        }
        steps[index] = Step::Fail(err);
        self
    }

    pub fn requests(&self) -> Vec<(String, QueryParams)> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<QueryParams> {
        self.requests()
            .into_iter()
            .filter(|(p, _)| p == path)
            .map(|(_, q)| q)
            .collect()
    }
}

#[async_trait]
impl PageSource for ScriptedSource {
    async fn fetch(&self, endpoint_path: &str, params: &QueryParams) -> Result<Page> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((endpoint_path.to_string(), params.clone()));

        let steps = self
            .scripts
            .get(endpoint_path)
            .ok_or_else(|| ApiError::from_status(404, format!("no script for {}", endpoint_path)))?;

        let index = match params.get(CURSOR_PARAM) {
            None => 0,
            Some(c) => c
                .strip_prefix('c')
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| ApiError::from_status(400, format!("bad cursor {}", c)))?,
        };

        match steps.get(index) {
            Some(Step::Page(raw)) => {
                let records = raw.iter().map(|r| record(r)).collect::<Result<Vec<_>>>()?;
                let next_cursor = (index + 1 < steps.len()).then(|| format!("c{}", index + 1));
                Ok(Page::new(records, next_cursor))
            },
            Some(Step::Fail(e)) => Err(CollectError::Api(e.clone())),
            None => Err(ApiError::from_status(400, format!("cursor past end of {}", endpoint_path)).into()),
        }
    }
}
