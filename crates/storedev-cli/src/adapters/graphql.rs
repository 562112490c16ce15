//! GraphQL over HTTP.
//!
//! [`GraphqlClient`] talks to the partner service. [`execute`] is shared with
//! the admin adapters, which authenticate differently.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{Value, json};
use storedev_core::RemoteError;
use storedev_core::ports::RemoteRequestPort;
use tracing::debug;

const USER_AGENT: &str = concat!("storedev/", env!("CARGO_PKG_VERSION"));

pub fn http_client() -> anyhow::Result<Client> {
    Ok(Client::builder().user_agent(USER_AGENT).build()?)
}

/// Send `query` through `request` and return the `data` object.
pub async fn execute(
    request: RequestBuilder,
    query: &str,
    variables: Value,
) -> Result<Value, RemoteError> {
    let response = request
        .json(&json!({ "query": query, "variables": variables }))
        .send()
        .await
        .map_err(|e| RemoteError::Transport(e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| RemoteError::Transport(e.to_string()))?;
    if !status.is_success() {
        return Err(RemoteError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let mut body: Value =
        serde_json::from_str(&body).map_err(|e| RemoteError::Decode(e.to_string()))?;
    if let Some(errors) = body.get("errors").and_then(Value::as_array) {
        if !errors.is_empty() {
            let messages: Vec<&str> = errors
                .iter()
                .map(|error| error["message"].as_str().unwrap_or("unknown error"))
                .collect();
            return Err(RemoteError::GraphQl(messages.join("; ")));
        }
    }

    match body.get_mut("data").map(Value::take) {
        Some(data) if !data.is_null() => Ok(data),
        _ => Err(RemoteError::Decode("response has no data".to_string())),
    }
}

/// Partner service endpoint, authenticated with a bearer token.
#[derive(Debug, Clone)]
pub struct GraphqlClient {
    client: Client,
    url: String,
}

impl GraphqlClient {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            client: http_client()?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl RemoteRequestPort for GraphqlClient {
    async fn request(&self, query: &str, token: &str, variables: Value) -> Result<Value, RemoteError> {
        debug!(url = %self.url, "Partners request");
        let request = self.client.post(&self.url).bearer_auth(token);
        execute(request, query, variables).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::HeaderMap, http::StatusCode, routing::post};
    use tokio::net::TcpListener;

    async fn serve(status: StatusCode, body: Value) -> String {
        let app = Router::new().route(
            "/graphql",
            post(move |headers: HeaderMap, Json(request): Json<Value>| {
                let mut body = body.clone();
                async move {
                    if body["data"].is_object() {
                        body["data"]["authorization"] =
                            json!(headers["authorization"].to_str().unwrap());
                        body["data"]["variables"] = request["variables"].clone();
                    }
                    (status, Json(body))
                }
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://127.0.0.1:{port}/graphql")
    }

    #[tokio::test]
    async fn returns_data_and_sends_bearer_token() {
        let url = serve(StatusCode::OK, json!({"data": {"app": {"id": "1"}}})).await;
        let client = GraphqlClient::new(url).unwrap();
        let data = client
            .request("query { app { id } }", "tok", json!({"apiKey": "k"}))
            .await
            .unwrap();
        assert_eq!(data["app"]["id"], "1");
        assert_eq!(data["authorization"], "Bearer tok");
        assert_eq!(data["variables"]["apiKey"], "k");
    }

    #[tokio::test]
    async fn graphql_errors_are_reported() {
        let url = serve(
            StatusCode::OK,
            json!({"data": null, "errors": [{"message": "denied"}, {"message": "twice"}]}),
        )
        .await;
        let err = GraphqlClient::new(url)
            .unwrap()
            .request("query { x }", "tok", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(&err, RemoteError::GraphQl(msg) if msg == "denied; twice"), "{err:?}");
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let url = serve(StatusCode::UNAUTHORIZED, json!({})).await;
        let err = GraphqlClient::new(url)
            .unwrap()
            .request("query { x }", "tok", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Status { status: 401, .. }), "{err:?}");
    }
}
