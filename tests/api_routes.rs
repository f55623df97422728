//! REST API integration tests
//!
//! Drives the full router with `tower::ServiceExt::oneshot` against an
//! in-memory corpus; no database or socket involved.

#![cfg(feature = "server")]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use serde_json::Value;
use tower::ServiceExt;

use ecfr_analyzer::api::{create_router, AppState};
use ecfr_analyzer::models::{
    Agency, ContentChunk, Correction, LevelType, NodeType, RegulationNode,
};
use ecfr_analyzer::store::{MemoryStore, Snapshot};

// =========================================================================
// TEST INFRASTRUCTURE
// =========================================================================

const T4: &str = "us/federal/ecfr/title=4";
const C1: &str = "us/federal/ecfr/title=4/chapter=I";
const P21: &str = "us/federal/ecfr/title=4/chapter=I/part=21";
const S1: &str = "us/federal/ecfr/title=4/chapter=I/part=21/section=21.1";
const S2: &str = "us/federal/ecfr/title=4/chapter=I/part=21/section=21.2";
const T5: &str = "us/federal/ecfr/title=5";

fn node(id: &str, parent: Option<&str>, level: &str, number: &str, name: &str) -> RegulationNode {
    RegulationNode {
        id: id.to_string(),
        citation: if level == "section" {
            format!("4 CFR {}", number)
        } else {
            String::new()
        },
        link: String::new(),
        node_type: if level == "section" {
            NodeType::Content
        } else {
            NodeType::Structure
        },
        level_type: LevelType::from(level),
        number: number.to_string(),
        node_name: name.to_string(),
        parent: parent.map(str::to_string),
        depth: id.matches('/').count() as i32 - 3,
        num_corrections: None,
        metadata: None,
    }
}

fn chunk(id: &str, section: &str, n: i32, content: &str) -> ContentChunk {
    ContentChunk {
        id: id.to_string(),
        section_id: section.to_string(),
        content: content.to_string(),
        chunk_number: n,
    }
}

fn correction(id: &str, node_id: &str, agency: &str, date: (i32, u32, u32), days: i64) -> Correction {
    Correction {
        id: id.to_string(),
        node_id: node_id.to_string(),
        agency_id: Some(agency.to_string()),
        title: Some("4".into()),
        error_occurred: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
        error_corrected: None,
        correction_duration: Some(days),
        node_name: None,
        citation: None,
        level_type: None,
        number: None,
        agency_name: None,
    }
}

fn snapshot() -> Snapshot {
    let mut s1 = node(S1, Some(P21), "section", "21.1", "Purpose");
    s1.num_corrections = Some(3);

    let mut leg = Agency::new("leg", "Legislative Branch", None);
    leg.num_children = 1;
    let mut gao = Agency::new("gao", "Government Accountability Office", Some("leg"));
    gao.num_sections = 40;
    gao.num_corrections = 3;
    let mut usda = Agency::new("usda", "Agriculture Department", None);
    usda.num_sections = 900;

    Snapshot {
        nodes: vec![
            node(T4, None, "title", "4", "Accounts"),
            node(T5, None, "title", "5", "Administrative Personnel"),
            node(C1, Some(T4), "chapter", "I", "Government Accountability Office"),
            node(P21, Some(C1), "part", "21", "Bid Protest Regulations"),
            node(S2, Some(P21), "section", "21.2", "Time for filing"),
            s1,
        ],
        chunks: vec![
            chunk("k1", S1, 0, "This part sets forth the bid protest procedures."),
            chunk("k2", S1, 1, "Protests shall be filed with GAO."),
            chunk("k3", S2, 0, "A bid protest must be filed within 10 days."),
        ],
        agencies: vec![leg, gao, usda],
        mappings: vec![("gao".into(), P21.into())],
        corrections: vec![
            correction("x1", S1, "gao", (2024, 1, 10), 12),
            correction("x2", S1, "gao", (2024, 3, 2), 40),
            correction("x3", S2, "usda", (2023, 11, 20), 5),
        ],
    }
}

fn app() -> Router {
    let store = MemoryStore::new(snapshot());
    create_router(AppState::new(Arc::new(store)))
}

async fn get(uri: &str) -> (StatusCode, Value) {
    let response = app()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

// =========================================================================
// HEALTH / TITLES
// =========================================================================

#[tokio::test]
async fn test_health() {
    let (status, body) = get("/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "ecfr-analyzer");
}

#[tokio::test]
async fn test_titles_ordered_by_number() {
    let (status, body) = get("/api/titles").await;
    assert_eq!(status, StatusCode::OK);
    let numbers: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["number"].as_str().unwrap())
        .collect();
    assert_eq!(numbers, vec!["4", "5"]);
}

// =========================================================================
// NAVIGATION
// =========================================================================

#[tokio::test]
async fn test_navigation_roots() {
    let (status, body) = get("/api/navigation").await;
    assert_eq!(status, StatusCode::OK);
    let roots = body.as_array().unwrap();
    assert_eq!(roots.len(), 2);
    assert_eq!(roots[0]["id"], T4);
    assert_eq!(roots[0]["type"], "title");
    assert_eq!(roots[0]["path"], "/browse/title=4");
    assert_eq!(roots[0]["expanded"], false);
    assert!(roots[0]["children"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_navigation_levels_prefetch() {
    let (status, body) = get("/api/navigation?levels=3").await;
    assert_eq!(status, StatusCode::OK);
    let title = &body[0];
    assert_eq!(title["expanded"], true);
    let part = &title["children"][0]["children"][0];
    assert_eq!(part["id"], P21);
    assert_eq!(part["path"], "/browse/title=4/chapter=I/part=21");
    assert!(part["children"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_navigation_children_of_parent() {
    let (status, body) = get(&format!("/api/navigation?parent={}", P21)).await;
    assert_eq!(status, StatusCode::OK);
    let children = body.as_array().unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0]["number"], "21.1");
    assert_eq!(children[1]["number"], "21.2");
    assert_eq!(
        children[0]["path"],
        "/browse/title=4/chapter=I/part=21/section=21.1"
    );
}

#[tokio::test]
async fn test_navigation_unknown_parent() {
    let (status, body) = get("/api/navigation?parent=nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn test_navigation_malformed_levels() {
    let (status, body) = get("/api/navigation?levels=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("levels"));

    let (status, body) = get("/api/navigation?levels=-1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("error").is_some());

    let (status, _) = get("/api/navigation?levels=").await;
    assert_eq!(status, StatusCode::OK);
}

// =========================================================================
// REGULATION
// =========================================================================

#[tokio::test]
async fn test_regulation_by_path() {
    let (status, body) =
        get("/api/regulation?path=%2Fbrowse%2Ftitle%3D4%2Fchapter%3DI%2Fpart%3D21%2Fsection%3D21.1")
            .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["nodeInfo"]["node_name"], "Purpose");
    assert_eq!(body["content"].as_array().unwrap().len(), 2);
    assert_eq!(body["breadcrumbs"].as_array().unwrap().len(), 4);
    assert_eq!(body["breadcrumbs"][0]["label"], "Title 4");
}

#[tokio::test]
async fn test_regulation_child_nodes() {
    let (status, body) = get("/api/regulation?path=title%3D4%2Fchapter%3DI%2Fpart%3D21").await;
    assert_eq!(status, StatusCode::OK);
    let children = body["childNodes"].as_array().unwrap();
    assert_eq!(children.len(), 2);
    assert!(body["content"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_regulation_errors() {
    let (status, body) = get("/api/regulation").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "path is required");

    let (status, _) = get("/api/regulation?path=title%3D4%2Fnonsense").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get("/api/regulation?path=title%3D99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_regulation_corrections_most_recent_first() {
    let (status, body) =
        get("/api/regulation/corrections?path=title%3D4%2Fchapter%3DI%2Fpart%3D21%2Fsection%3D21.1")
            .await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body["corrections"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["x2", "x1"]);
}

// =========================================================================
// SEARCH
// =========================================================================

#[tokio::test]
async fn test_search_requires_query() {
    let (status, body) = get("/api/search").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Search query is required");

    let (status, _) = get("/api/search?q=+++").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search_full_text() {
    let (status, body) = get("/api/search?q=bid+protest").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["query"], "bid protest");
    assert_eq!(body["total"], 2);
    let ids: Vec<&str> = body["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&S1) && ids.contains(&S2));
}

#[tokio::test]
async fn test_search_citation_ranks_exact_first() {
    let (status, body) = get("/api/search?q=21.1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"][0]["id"], S1);
    assert_eq!(body["results"][0]["matchKind"], "exact");
}

#[tokio::test]
async fn test_search_title_scope_and_limit() {
    let (_, body) = get("/api/search?q=bid+protest&title=5").await;
    assert_eq!(body["total"], 0);

    let (_, body) = get("/api/search?q=bid+protest&title=5&title=4&limit=1").await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["truncated"], true);

    let (status, _) = get("/api/search?q=bid&limit=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =========================================================================
// AGENCIES
// =========================================================================

#[tokio::test]
async fn test_agencies_roots_sorted() {
    let (_, body) = get("/api/agencies").await;
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Agriculture Department", "Legislative Branch"]);

    let (_, body) = get("/api/agencies?sortBy=num_children").await;
    assert_eq!(body[0]["id"], "leg");
}

#[tokio::test]
async fn test_agency_detail() {
    let (status, body) = get("/api/agencies/gao").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["agency"]["name"], "Government Accountability Office");
    assert_eq!(body["ancestors"][0]["id"], "leg");
    assert!(body["children"].as_array().unwrap().is_empty());
    assert_eq!(body["references"][0]["id"], format!("gao_{}", P21));
    assert_eq!(body["references"][0]["ordinal"], 0);
}

#[tokio::test]
async fn test_unknown_agency() {
    let (status, body) = get("/api/agencies/nobody").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Agency 'nobody' not found");
}

#[tokio::test]
async fn test_agency_analytics() {
    let (status, body) = get("/api/agencies/analytics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalMetrics"]["totalAgencies"], 3);
    assert_eq!(body["totalMetrics"]["totalSections"], 940);
    assert_eq!(body["topAgenciesBySections"][0]["name"], "Agriculture Department");
}

// =========================================================================
// CORRECTIONS
// =========================================================================

#[tokio::test]
async fn test_corrections_require_dates() {
    let (status, body) = get("/api/corrections?start_date=2024-01-01").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = get("/api/corrections?start_date=2024-01-01&end_date=soon").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_corrections_in_range() {
    let (status, body) = get("/api/corrections?start_date=2023-01-01&end_date=2024-12-31").await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body["corrections"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["x2", "x1", "x3"]);

    let (_, body) =
        get("/api/corrections?start_date=2023-01-01&end_date=2024-12-31&agency=usda").await;
    assert_eq!(body["corrections"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_correction_analytics() {
    let (status, body) = get("/api/corrections/analytics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["correctionsByMonth"]["2024-01"], 1);
    assert_eq!(body["correctionsByMonth"]["2023-11"], 1);
    assert_eq!(body["topNodes"][0]["name"], "Purpose");
    assert_eq!(body["longestCorrections"][0]["duration"], 40);
}
