// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! HTTP client tests against a mock API server.

use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use spanscope_client::{
    ClientConfig, PollOptions, SourceError, SpanscopeClient, TimelineLoader, TraceListFilter,
    TraceSource,
};
use spanscope_core::ObservationKind;
use std::sync::Arc;

fn client_for(server: &ServerGuard) -> SpanscopeClient {
    SpanscopeClient::new(ClientConfig::new(server.url())).unwrap()
}

fn observations_body() -> serde_json::Value {
    json!({
        "data": [
            {
                "id": "gen-1",
                "traceId": "trace-1",
                "parentObservationId": "span-1",
                "type": "GENERATION",
                "name": "chat-completion",
                "startTime": "2025-01-01T00:00:01Z",
                "endTime": "2025-01-01T00:00:03Z",
                "model": "gpt-4o"
            },
            {
                "id": "span-1",
                "traceId": "trace-1",
                "type": "SPAN",
                "name": "agent-run",
                "startTime": "2025-01-01T00:00:00Z"
            }
        ],
        "meta": { "page": 1, "limit": 50, "totalItems": 2, "totalPages": 1 }
    })
}

#[tokio::test]
async fn test_get_trace() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/public/traces/trace-1")
        .match_header("accept", "application/json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "id": "trace-1",
                "name": "support-bot",
                "latency": 2.5,
                "tags": ["prod"],
                "scores": [{ "name": "accuracy", "value": 0.9 }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let trace = client_for(&server).get_trace("trace-1").await.unwrap();
    assert_eq!(trace.display_name(), "support-bot");
    assert_eq!(trace.latency_seconds, Some(2.5));
    assert_eq!(trace.tags, vec!["prod".to_string()]);
    assert_eq!(trace.scores[0].name, "accuracy");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_missing_trace_is_not_found() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/public/traces/pending")
        .with_status(404)
        .with_body("trace not found")
        .create_async()
        .await;

    let err = client_for(&server)
        .fetch_trace_detail("pending")
        .await
        .unwrap_err();
    assert!(err.is_transient());
    assert!(matches!(err, SourceError::NotFound(ref path) if path == "/api/public/traces/pending"));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_error_status_maps_to_api_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/public/traces/trace-1")
        .with_status(401)
        .with_body("invalid credentials")
        .create_async()
        .await;

    let err = client_for(&server).get_trace("trace-1").await.unwrap_err();
    assert_eq!(
        err,
        SourceError::Api {
            status: 401,
            message: "invalid credentials".into()
        }
    );
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/public/traces/trace-1")
        .with_status(200)
        .with_body("{not json")
        .create_async()
        .await;

    let err = client_for(&server).get_trace("trace-1").await.unwrap_err();
    assert!(matches!(err, SourceError::Decode(_)));
}

#[tokio::test]
async fn test_list_observations_sends_trace_id_and_project() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/public/observations")
        .match_query(Matcher::UrlEncoded("traceId".into(), "trace-1".into()))
        .match_header("x-project-id", "proj-7")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(observations_body().to_string())
        .create_async()
        .await;

    let client =
        SpanscopeClient::new(ClientConfig::new(server.url()).with_project_id("proj-7")).unwrap();
    let observations = client.list_observations("trace-1").await.unwrap();

    assert_eq!(observations.len(), 2);
    assert_eq!(observations[0].kind, ObservationKind::Generation);
    assert_eq!(observations[0].parent_observation_id.as_deref(), Some("span-1"));
    assert_eq!(observations[0].latency_seconds(), Some(2.0));

    mock.assert_async().await;
}

fn observation_page(ids_and_parents: &[(&str, Option<&str>)], page: u32, total_pages: u32) -> String {
    let data: Vec<serde_json::Value> = ids_and_parents
        .iter()
        .map(|(id, parent)| {
            json!({
                "id": id,
                "traceId": "trace-big",
                "parentObservationId": parent,
                "type": "SPAN"
            })
        })
        .collect();
    json!({
        "data": data,
        "meta": { "page": page, "limit": 100, "totalItems": 3, "totalPages": total_pages }
    })
    .to_string()
}

#[tokio::test]
async fn test_list_observations_walks_all_pages() {
    let mut server = Server::new_async().await;
    let first = server
        .mock("GET", "/api/public/observations")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("traceId".into(), "trace-big".into()),
            Matcher::UrlEncoded("page".into(), "1".into()),
            Matcher::UrlEncoded("limit".into(), "100".into()),
        ]))
        .with_status(200)
        .with_body(observation_page(&[("root", None), ("a", Some("root"))], 1, 2))
        .expect(1)
        .create_async()
        .await;
    let second = server
        .mock("GET", "/api/public/observations")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("traceId".into(), "trace-big".into()),
            Matcher::UrlEncoded("page".into(), "2".into()),
        ]))
        .with_status(200)
        .with_body(observation_page(&[("b", Some("a"))], 2, 2))
        .expect(1)
        .create_async()
        .await;

    let observations = client_for(&server)
        .fetch_observations("trace-big")
        .await
        .unwrap();
    let ids: Vec<&str> = observations.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["root", "a", "b"]);

    // The child from page two hangs under its parent from page one.
    let forest = spanscope_core::build_timeline(&observations);
    assert_eq!(forest.len(), 1);
    assert_eq!(forest[0].children[0].children[0].id(), "b");

    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn test_list_traces_with_filter() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/public/traces")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("name".into(), "support bot".into()),
            Matcher::UrlEncoded("limit".into(), "5".into()),
        ]))
        .with_status(200)
        .with_body(json!({ "data": [{ "id": "trace-1", "name": "support bot" }] }).to_string())
        .create_async()
        .await;

    let filter = TraceListFilter {
        name: Some("support bot".into()),
        limit: Some(5),
        ..Default::default()
    };
    let page = client_for(&server).list_traces(Some(&filter)).await.unwrap();
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].id, "trace-1");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_get_observation_and_health() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/public/observations/ev-1")
        .with_status(200)
        .with_body(json!({ "id": "ev-1", "type": "EVENT", "name": "retrieved" }).to_string())
        .create_async()
        .await;
    server
        .mock("GET", "/api/public/health")
        .with_status(200)
        .with_body(json!({ "status": "OK", "version": "1.4.0" }).to_string())
        .create_async()
        .await;

    let client = client_for(&server);
    let observation = client.get_observation("ev-1").await.unwrap();
    assert_eq!(observation.kind, ObservationKind::Event);

    let health = client.health().await.unwrap();
    assert_eq!(health.status, "OK");
    assert_eq!(health.version.as_deref(), Some("1.4.0"));
}

#[tokio::test]
async fn test_loader_end_to_end() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/public/traces/trace-1")
        .with_status(200)
        .with_body(json!({ "id": "trace-1", "name": "support-bot" }).to_string())
        .create_async()
        .await;
    server
        .mock("GET", "/api/public/observations")
        .match_query(Matcher::UrlEncoded("traceId".into(), "trace-1".into()))
        .with_status(200)
        .with_body(observations_body().to_string())
        .create_async()
        .await;

    let loader = TimelineLoader::new(
        Arc::new(client_for(&server)),
        PollOptions::from_millis(10, 2_000),
    );
    let loaded = loader.load("trace-1").await.unwrap();

    assert_eq!(loaded.detail.display_name(), "support-bot");
    assert_eq!(loaded.forest.len(), 1);
    assert_eq!(loaded.forest[0].id(), "span-1");
    assert_eq!(loaded.forest[0].children[0].id(), "gen-1");
    assert_eq!(loaded.stats().max_depth, 2);
}
