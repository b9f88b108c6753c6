use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header};
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::types::{ActivityFetcher, ActivityRecord, FetchError};

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(12);

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

const RECENT_SUBMISSIONS_QUERY: &str = "
query recentSubmissions($username: String!) {
  recentSubmissionList(username: $username, limit: 1) {
    title
    titleSlug
    timestamp
    statusDisplay
    lang
  }
}
";

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<RecentSubmissions>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecentSubmissions {
    recent_submission_list: Option<Vec<ActivityRecord>>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

/// Pulls the most recent submission out of a `recentSubmissionList` response.
pub fn parse_recent_submissions(body: &str) -> Result<Option<ActivityRecord>, FetchError> {
    let response: GraphQlResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Payload(e.to_string()))?;

    match response.data {
        Some(RecentSubmissions {
            recent_submission_list: Some(list),
        }) => Ok(list.into_iter().next()),
        // Unknown users come back as `data: {recentSubmissionList: null}` with an error
        _ if !response.errors.is_empty() => Err(FetchError::Payload(
            response
                .errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; "),
        )),
        _ => Ok(None),
    }
}

pub struct LeetCodeFetcher {
    client: Client,
    endpoint: Url,
    referer: String,
}

impl LeetCodeFetcher {
    pub fn new(base_url: &Url) -> Result<Self, FetchError> {
        Self::with_timeout(base_url, FETCH_TIMEOUT)
    }

    /// Like `new`, but gives up on a request after `timeout` instead of 12 s.
    pub fn with_timeout(base_url: &Url, timeout: Duration) -> Result<Self, FetchError> {
        let endpoint = base_url
            .join("graphql")
            .map_err(|e| FetchError::Payload(format!("bad base url {base_url}: {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(LeetCodeFetcher {
            client,
            endpoint,
            referer: base_url.as_str().to_owned(),
        })
    }
}

#[async_trait]
impl ActivityFetcher for LeetCodeFetcher {
    async fn fetch_latest(
        &self,
        external_name: &str,
    ) -> Result<Option<ActivityRecord>, FetchError> {
        let res = self
            .client
            .post(self.endpoint.clone())
            .header(header::REFERER, &self.referer)
            .json(&json!({
                "query": RECENT_SUBMISSIONS_QUERY,
                "variables": { "username": external_name },
            }))
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(FetchError::Status(res.status()));
        }

        let body = res.text().await?;
        parse_recent_submissions(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_first_submission() {
        let body = r#"{"data":{"recentSubmissionList":[
            {"title":"Two Sum","titleSlug":"two-sum","timestamp":"200","statusDisplay":"Accepted","lang":"python3"},
            {"title":"Older","titleSlug":"older","timestamp":"100","statusDisplay":"Wrong Answer","lang":"rust"}
        ]}}"#;

        let record = parse_recent_submissions(body).unwrap().unwrap();
        assert_eq!(record.slug, "two-sum");
        assert_eq!(record.timestamp, 200);
    }

    #[test]
    fn empty_list_is_no_record() {
        let body = r#"{"data":{"recentSubmissionList":[]}}"#;
        assert_eq!(parse_recent_submissions(body).unwrap(), None);

        let body = r#"{"data":null}"#;
        assert_eq!(parse_recent_submissions(body).unwrap(), None);
    }

    #[test]
    fn graphql_errors_are_reported() {
        let body = r#"{"data":{"recentSubmissionList":null},"errors":[{"message":"That user does not exist."}]}"#;
        let err = parse_recent_submissions(body).unwrap_err();
        assert!(matches!(err, FetchError::Payload(ref m) if m.contains("does not exist")));
    }

    #[test]
    fn garbage_is_a_payload_error() {
        assert!(matches!(
            parse_recent_submissions("<html>rate limited</html>"),
            Err(FetchError::Payload(_))
        ));
    }
}
