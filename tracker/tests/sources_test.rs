use std::sync::Arc;

use chrono::{Duration, Utc};
use interfaces::{normalize, SourceKind};
use pretty_assertions::assert_eq;
use serde_json::json;
use tracker::config::{
    AgencyConfig, CommitteesConfig, CongressConfig, FederalRegisterConfig, FeedConfig, OpenFemaConfig, TrackedCommittee,
};
use tracker::sources::{CommitteeFeeds, CommitteeMeetings, CongressBills, CongressClient, FederalRegister, OpenFema, Watchlist};
use tracker::{FetchConfig, Fetcher, SourceFetcher, TrackerError};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn fetcher() -> Arc<Fetcher> {
    let config = FetchConfig {
        min_request_interval_ms: 0,
        ..FetchConfig::default()
    };
    Arc::new(Fetcher::new(config).unwrap())
}

fn congress_client(server: &MockServer) -> CongressClient {
    CongressClient::new(fetcher(), &server.uri(), "test-key")
}

#[tokio::test]
async fn congress_bills_filter_by_title_then_subjects() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bill/119"))
        .and(query_param("api_key", "test-key"))
        .and(query_param("sort", "updateDate desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bills": [
                {"congress": 119, "type": "HR", "number": "100", "title": "Flood Insurance Reform Act",
                 "latestAction": {"actionDate": "2026-03-01", "text": "Introduced in House"}},
                {"congress": 119, "type": "S", "number": "7", "title": "Floodplain Mapping Act"},
                {"congress": 119, "type": "HR", "number": "200", "title": "Aviation Safety Act"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bill/119/hr/100/subjects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "subjects": {
                "policyArea": {"name": "Water Resources Development"},
                "legislativeSubjects": [{"name": "Floods and storm protection"}]
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bill/119/s/7/subjects"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = CongressConfig {
        title_keywords: vec!["flood".to_string()],
        relevant_policy_areas: vec!["Water Resources".to_string()],
        ..CongressConfig::default()
    };
    let source = CongressBills::new(congress_client(&server), config);
    let records = source.fetch(Utc::now() - Duration::days(7)).await.unwrap();

    // Aviation fails the title pass, S.7 is dropped when its subjects lookup fails.
    assert_eq!(records.len(), 1);
    let item = normalize(&records[0], Utc::now()).unwrap();
    assert_eq!(item.item_id, "hr100-119");
    assert_eq!(item.category.as_deref(), Some("Water Resources Development"));
    assert_eq!(item.status.as_deref(), Some("2026-03-01: Introduced in House"));
}

#[tokio::test]
async fn congress_listing_failure_fails_the_source() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bill/119"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let source = CongressBills::new(congress_client(&server), CongressConfig::default());
    let err = source.fetch(Utc::now()).await.unwrap_err();
    assert!(matches!(err, TrackerError::Status { status: 503, .. }));
}

#[tokio::test]
async fn federal_register_skips_failed_agency_and_dedupes() {
    init_tracing();
    let server = MockServer::start().await;

    let doc = json!({
        "document_number": "2026-00123",
        "title": "Floodplain Management Standard",
        "type": "Proposed Rule",
        "html_url": "https://www.federalregister.gov/d/2026-00123",
        "agencies": [{"name": "Federal Emergency Management Agency"}, {"raw_name": "DHS"}],
        "comments_close_on": "2026-04-01"
    });
    Mock::given(method("GET"))
        .and(path("/documents.json"))
        .and(query_param("conditions[agencies][]", "federal-emergency-management-agency"))
        .and(query_param("conditions[type][]", "PRORULE"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": [doc.clone(), doc]})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/documents.json"))
        .and(query_param("conditions[agencies][]", "engineers-corps"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = FederalRegisterConfig {
        api_base: server.uri(),
        agencies: vec![
            AgencyConfig {
                slug: "federal-emergency-management-agency".to_string(),
                name: Some("FEMA".to_string()),
            },
            AgencyConfig {
                slug: "engineers-corps".to_string(),
                name: None,
            },
        ],
        ..FederalRegisterConfig::default()
    };
    let records = FederalRegister::new(fetcher(), config).fetch(Utc::now()).await.unwrap();

    assert_eq!(records.len(), 1);
    let item = normalize(&records[0], Utc::now()).unwrap();
    assert_eq!(item.item_id, "FR-2026-00123");
    assert_eq!(item.source, SourceKind::Regulation);
    assert_eq!(item.category.as_deref(), Some("Federal Emergency Management Agency, DHS"));
    assert_eq!(item.deadline.map(|d| d.to_string()).as_deref(), Some("2026-04-01"));
}

#[tokio::test]
async fn federal_register_fails_when_every_agency_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents.json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = FederalRegisterConfig {
        api_base: server.uri(),
        agencies: vec![AgencyConfig {
            slug: "federal-emergency-management-agency".to_string(),
            name: None,
        }],
        ..FederalRegisterConfig::default()
    };
    let err = FederalRegister::new(fetcher(), config).fetch(Utc::now()).await.unwrap_err();
    assert!(matches!(err, TrackerError::Source { source_kind: SourceKind::Regulation, .. }));
}

#[tokio::test]
async fn openfema_filters_incident_types_and_dedupes() {
    let server = MockServer::start().await;
    let flood = json!({
        "disasterNumber": 4801,
        "state": "TX",
        "designatedArea": "Harris (County)",
        "declarationTitle": "Severe Storms and Flooding",
        "incidentType": "Flood",
        "declarationDate": "2026-03-01T00:00:00.000Z"
    });
    Mock::given(method("GET"))
        .and(path("/DisasterDeclarationsSummaries"))
        .and(query_param("$orderby", "declarationDate desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "DisasterDeclarationsSummaries": [
                flood.clone(),
                flood,
                {"disasterNumber": 4802, "state": "CA", "designatedArea": "Statewide",
                 "declarationTitle": "Wildfires", "incidentType": "Fire",
                 "declarationDate": "2026-03-02T00:00:00.000Z"}
            ]
        })))
        .mount(&server)
        .await;

    let config = OpenFemaConfig {
        api_base: server.uri(),
        ..OpenFemaConfig::default()
    };
    let records = OpenFema::new(fetcher(), config).fetch(Utc::now()).await.unwrap();

    assert_eq!(records.len(), 1);
    let item = normalize(&records[0], Utc::now()).unwrap();
    assert_eq!(item.item_id, "FEMA-4801-TX-Harris (County)");
    assert_eq!(item.status.as_deref(), Some("open"));
}

#[tokio::test]
async fn committee_meetings_keep_tracked_committees_only() {
    init_tracing();
    let server = MockServer::start().await;
    let date = (Utc::now() + Duration::days(2)).format("%Y-%m-%dT14:00:00Z").to_string();

    Mock::given(method("GET"))
        .and(path("/committee-meeting/119/house"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "committeeMeetings": [{"eventId": "115001"}, {"eventId": "115002"}, {"eventId": 115003}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/committee-meeting/119/senate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"committeeMeetings": []})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/committee-meeting/119/house/115001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "committeeMeeting": {
                "eventId": "115001",
                "chamber": "House",
                "congress": 119,
                "title": "Water Resources Development Act of 2026",
                "type": "Hearing",
                "meetingStatus": "Scheduled",
                "date": date,
                "committees": [{"systemCode": "HSPW00", "name": "Transportation and Infrastructure"}]
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/committee-meeting/119/house/115002"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "committeeMeeting": {
                "eventId": "115002",
                "title": "Aviation markup",
                "date": date,
                "committees": [{"systemCode": "hsif00"}]
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/committee-meeting/119/house/115003"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = CommitteesConfig {
        tracked_committees: vec![TrackedCommittee {
            code: "hspw00".to_string(),
            name: "House Transportation and Infrastructure".to_string(),
        }],
        ..CommitteesConfig::default()
    };
    let source = CommitteeMeetings::new(congress_client(&server), 119, config);
    let records = source.fetch(Utc::now()).await.unwrap();

    assert_eq!(records.len(), 1);
    let item = normalize(&records[0], Utc::now()).unwrap();
    assert_eq!(item.item_id, "meeting-115001");
    assert_eq!(item.category.as_deref(), Some("House Transportation and Infrastructure"));
    assert_eq!(
        item.url.as_deref(),
        Some("https://www.congress.gov/event/119th-congress/house-event/115001")
    );
}

#[tokio::test]
async fn committee_feeds_survive_one_broken_feed() {
    let server = MockServer::start().await;
    let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>T&amp;I</title><link>https://example.gov</link><description>news</description>
<item><title>Levee safety hearing</title><link>https://example.gov/1</link><guid>https://example.gov/1</guid></item>
<item><title>Airport funding</title><link>https://example.gov/2</link><guid>https://example.gov/2</guid></item>
</channel></rss>"#;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone.xml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let feeds = vec![
        FeedConfig {
            name: "House T&I".to_string(),
            url: format!("{}/feed.xml", server.uri()),
            keywords: vec!["levee".to_string()],
        },
        FeedConfig {
            name: "Gone".to_string(),
            url: format!("{}/gone.xml", server.uri()),
            keywords: Vec::new(),
        },
    ];
    let records = CommitteeFeeds::new(fetcher(), feeds).fetch(Utc::now()).await.unwrap();

    assert_eq!(records.len(), 1);
    let item = normalize(&records[0], Utc::now()).unwrap();
    assert_eq!(item.item_id, "rss-https://example.gov/1");
    assert_eq!(item.category.as_deref(), Some("House T&I"));
}

#[tokio::test]
async fn watchlist_enriches_bills_and_falls_back_to_yaml() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bill/119/hr/2093"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bill": {
                "congress": 119,
                "type": "HR",
                "number": "2093",
                "title": "Flood Resilience Act",
                "latestAction": {"actionDate": "2026-02-10", "text": "Referred to committee"}
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bill/119/s/1760"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempfile::TempDir::new().unwrap();
    let file = dir.path().join("watchlist.yaml");
    std::fs::write(
        &file,
        r#"
high_priority:
  - bill_id: "119-hr-2093"
    title: "Flood Resilience Act"
    notes: "Support"
funding_appropriations:
  - bill_id: "119-s-1760"
    title: "Energy and Water Appropriations"
regulatory_comments:
  - name: "FFRMS Implementation (HUD)"
    status: "Comments submitted"
    comment_deadline: "2026-04-01"
"#,
    )
    .unwrap();

    let records = Watchlist::new(congress_client(&server), &file).fetch(Utc::now()).await.unwrap();
    let items: Vec<_> = records.iter().map(|r| normalize(r, Utc::now()).unwrap()).collect();

    assert_eq!(items.len(), 3);
    assert_eq!(items[0].item_id, "hr2093-119");
    assert_eq!(items[0].status.as_deref(), Some("2026-02-10: Referred to committee"));
    assert_eq!(items[0].category.as_deref(), Some("High Priority"));
    assert_eq!(items[0].summary.as_deref(), Some("Support"));

    assert_eq!(items[1].item_id, "s1760-119");
    assert_eq!(items[1].title, "Energy and Water Appropriations");
    assert_eq!(items[1].status, None);
    assert_eq!(items[1].category.as_deref(), Some("Funding & Appropriations"));

    assert_eq!(items[2].item_id, "watch-reg-ffrms-implementation-hud");
    assert_eq!(items[2].status.as_deref(), Some("Comments submitted"));
}

#[tokio::test]
async fn bill_search_keeps_requested_congress() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bill"))
        .and(query_param("query", "flood insurance"))
        .and(query_param("limit", "4"))
        .and(query_param("sort", "updateDate desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bills": [
                {"congress": 118, "type": "HR", "number": "5", "title": "Old Flood Insurance Act"},
                {"congress": 119, "type": "HR", "number": "10", "title": "Flood Insurance Reform Act"},
                {"congress": 119, "type": "S", "number": "20", "title": "NFIP Extension Act"},
                {"congress": 119, "type": "S", "number": "21", "title": "Flood Insurance Affordability Act"}
            ]
        })))
        .mount(&server)
        .await;

    let found = congress_client(&server)
        .search_bills("flood insurance", Some(119), 2)
        .await
        .unwrap();

    let titles: Vec<_> = found.iter().map(|b| b["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["Flood Insurance Reform Act", "NFIP Extension Act"]);
}

#[tokio::test]
async fn bill_search_falls_back_to_title_filter_when_unavailable() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bill"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bill/119"))
        .and(query_param("limit", "250"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bills": [
                {"congress": 119, "type": "HR", "number": "1", "title": "Dam Safety Act"},
                {"congress": 119, "type": "HR", "number": "2", "title": "Insurance for Flood Zones Act"},
                {"congress": 119, "type": "HR", "number": "3", "title": "Flood Insurance Reform Act"},
                {"congress": 119, "type": "HR", "number": "4", "title": "Aviation Insurance Act"}
            ]
        })))
        .mount(&server)
        .await;

    let found = congress_client(&server)
        .search_bills("Flood Insurance", Some(119), 10)
        .await
        .unwrap();

    let numbers: Vec<_> = found.iter().map(|b| b["number"].as_str().unwrap()).collect();
    assert_eq!(numbers, vec!["2", "3"]);
}

#[tokio::test]
async fn bill_search_propagates_non_status_errors() {
    let client = CongressClient::new(fetcher(), "http://127.0.0.1:1", "test-key");
    let err = client.search_bills("flood", Some(119), 3).await.unwrap_err();
    assert!(matches!(err, TrackerError::Http(_)));
}
