//! End-to-end tests: gateway operations against a seeded demo database, and
//! the JSON-RPC server driven through in-memory pipes.

use serde_json::{json, Value};
use sqlwarden_db::{AuditQuery, AuditStatus, DbConfig, DemoUsers, WardenDb};
use sqlwarden_guard::{ErrorKind, Operation, Principal, ValidatorConfig};
use sqlwarden_mcp::{
    CandidatePlan, Gateway, GatewayConfig, McpServer, McpServerConfig, PlanAction, PlanIntent,
};
use tempfile::TempDir;

struct Fixture {
    _tmp: TempDir,
    gateway: Gateway,
    admin: Principal,
    user: Principal,
}

async fn fixture() -> Fixture {
    let tmp = TempDir::new().unwrap();
    let db = WardenDb::open(&DbConfig::sqlite(tmp.path().join("gateway.db")))
        .await
        .unwrap();
    let DemoUsers { admin_id, user_id } = db.seed_demo().await.unwrap();

    let gateway = Gateway::new(db, GatewayConfig::default());
    let admin = gateway.resolve_principal(admin_id).await.unwrap();
    let user = gateway.resolve_principal(user_id).await.unwrap();
    Fixture {
        _tmp: tmp,
        gateway,
        admin,
        user,
    }
}

async fn audit_count(gateway: &Gateway, principal: &Principal) -> usize {
    gateway
        .audit_query_history(principal, AuditQuery::default())
        .await
        .unwrap()
        .len()
}

#[tokio::test]
async fn test_resolve_principal_roles() {
    let f = fixture().await;
    assert!(f.admin.is_admin());
    assert!(!f.user.is_admin());

    let err = f.gateway.resolve_principal(9999).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_read_is_projected_and_audited() {
    let f = fixture().await;

    let rows = f
        .gateway
        .run_read_query(&f.user, "SELECT * FROM candidates")
        .await
        .unwrap();
    assert_eq!(rows.len(), 20);
    let keys: Vec<&str> = rows[0].keys().map(|k| k.as_str()).collect();
    assert_eq!(keys, vec!["id", "full_name", "email", "city"]);

    let history = f
        .gateway
        .audit_query_history(&f.user, AuditQuery::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, AuditStatus::Success);
    assert_eq!(history[0].operation, Operation::Read);
    assert_eq!(history[0].table_name, "candidates");
    assert_eq!(history[0].sql_text, "SELECT * FROM candidates");
    assert_eq!(history[0].user_email.as_deref(), Some("user@example.com"));
}

#[tokio::test]
async fn test_limit_is_capped() {
    let f = fixture().await;

    let summary = f
        .gateway
        .validate_query(&f.admin, "SELECT * FROM interviews LIMIT 1000")
        .await
        .unwrap();
    assert_eq!(summary.limit, 200);
    assert_eq!(summary.columns, None);

    let rows = f
        .gateway
        .run_read_query(&f.admin, "SELECT id FROM interviews LIMIT 7")
        .await
        .unwrap();
    assert_eq!(rows.len(), 7);
}

#[tokio::test]
async fn test_offset_forms_cannot_escape_row_cap() {
    let tmp = TempDir::new().unwrap();
    let db = WardenDb::open(&DbConfig::sqlite(tmp.path().join("capped.db")))
        .await
        .unwrap();
    let DemoUsers { admin_id, .. } = db.seed_demo().await.unwrap();
    let config = GatewayConfig {
        validator: ValidatorConfig::new(5),
        ..GatewayConfig::default()
    };
    let gateway = Gateway::new(db, config);
    let admin = gateway.resolve_principal(admin_id).await.unwrap();

    for sql in [
        "SELECT id FROM candidates WHERE id > 0 LIMIT 0, 15",
        "SELECT id FROM candidates WHERE id > 0 LIMIT 15 OFFSET 0",
    ] {
        let err = gateway.run_read_query(&admin, sql).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "sql: {}", sql);
        let err = gateway.check_query(&admin, sql).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "sql: {}", sql);
    }

    let report = gateway
        .check_query(&admin, "SELECT id FROM candidates WHERE id > 0 LIMIT 15")
        .await
        .unwrap();
    assert_eq!(report.final_sql, "SELECT id FROM candidates WHERE id > 0 LIMIT 5");
    let rows = gateway
        .run_read_query(&admin, "SELECT id FROM candidates WHERE id > 0 LIMIT 15")
        .await
        .unwrap();
    assert_eq!(rows.len(), 5);
}

#[tokio::test]
async fn test_aggregate_ignores_column_restriction() {
    let f = fixture().await;

    let rows = f
        .gateway
        .run_read_query(&f.user, "SELECT COUNT(*) AS n FROM candidates")
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["n"], json!(20));
}

#[tokio::test]
async fn test_denials_are_audited_as_failed() {
    let f = fixture().await;

    let err = f
        .gateway
        .run_read_query(&f.user, "SELECT * FROM interviewers")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let err = f
        .gateway
        .run_write_query(&f.user, "DELETE FROM candidates WHERE id = 5")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let err = f
        .gateway
        .run_read_query(&f.user, "DROP TABLE candidates")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let history = f
        .gateway
        .audit_query_history(&f.user, AuditQuery::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 3);
    assert!(history.iter().all(|r| r.status == AuditStatus::Failed));
    // Newest first; rejected statements never resolve a table.
    assert!(history.iter().all(|r| r.table_name == "unknown"));
    assert_eq!(history[1].operation, Operation::Write);
}

#[tokio::test]
async fn test_validation_tools_do_not_audit() {
    let f = fixture().await;

    f.gateway
        .validate_query(&f.user, "SELECT id FROM candidates")
        .await
        .unwrap();
    f.gateway
        .explain_query(&f.user, "SELECT id FROM candidates WHERE id = 1")
        .await
        .unwrap();
    f.gateway
        .dry_run_query(&f.user, "SELECT * FROM candidates")
        .await
        .unwrap();
    f.gateway
        .estimate_query_cost(&f.user, "SELECT * FROM candidates")
        .await
        .unwrap();

    assert_eq!(audit_count(&f.gateway, &f.user).await, 0);
}

#[tokio::test]
async fn test_operation_guards() {
    let f = fixture().await;

    let err = f
        .gateway
        .run_read_query(&f.admin, "DELETE FROM candidates WHERE id = 1")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.message(), "not a read query");

    let err = f
        .gateway
        .run_write_query(&f.admin, "SELECT id FROM candidates")
        .await
        .unwrap_err();
    assert_eq!(err.message(), "not a write query");

    // Neither statement ran.
    let rows = f
        .gateway
        .run_read_query(&f.admin, "SELECT COUNT(*) AS n FROM candidates")
        .await
        .unwrap();
    assert_eq!(rows[0]["n"], json!(20));

    let history = f
        .gateway
        .audit_query_history(&f.admin, AuditQuery::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[1].status, AuditStatus::Failed);
    assert_eq!(history[2].status, AuditStatus::Failed);
}

#[tokio::test]
async fn test_write_paths() {
    let f = fixture().await;

    let report = f
        .gateway
        .run_write_query(&f.admin, "UPDATE candidates SET city = 'Pune' WHERE id <= 4")
        .await
        .unwrap();
    assert_eq!(report.rows_affected, 4);

    let report = f
        .gateway
        .run_write_query(&f.admin, "DELETE FROM candidates WHERE id = 5")
        .await
        .unwrap();
    assert_eq!(report.rows_affected, 1);

    let err = f
        .gateway
        .run_write_query(&f.admin, "UPDATE candidates SET city = 'X'")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = f
        .gateway
        .run_write_query(
            &f.admin,
            "INSERT INTO candidates (full_name, email) VALUES ('Dup', 'candidate1@example.com')",
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let history = f
        .gateway
        .audit_query_history(
            &f.admin,
            AuditQuery {
                table_name: Some("CAND".to_string()),
                ..AuditQuery::default()
            },
        )
        .await
        .unwrap();
    // The rejected UPDATE is recorded against "unknown".
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].status, AuditStatus::Failed);
    assert_eq!(history[2].status, AuditStatus::Success);
}

#[tokio::test]
async fn test_history_is_narrowed_for_users() {
    let f = fixture().await;

    f.gateway
        .run_read_query(&f.admin, "SELECT id FROM interviewers")
        .await
        .unwrap();
    f.gateway
        .run_read_query(&f.user, "SELECT id FROM candidates")
        .await
        .unwrap();

    let mine = f
        .gateway
        .audit_query_history(
            &f.user,
            AuditQuery {
                user_id: Some(f.admin.id),
                ..AuditQuery::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].user_id, f.user.id);

    assert_eq!(audit_count(&f.gateway, &f.admin).await, 2);

    let err = f
        .gateway
        .audit_query_history(
            &f.admin,
            AuditQuery {
                limit: 501,
                ..AuditQuery::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_schema_and_permissions_views() {
    let f = fixture().await;

    let schema = f.gateway.get_schema(&f.user).await.unwrap();
    assert_eq!(schema.len(), 2);
    assert_eq!(
        schema.columns("candidates").unwrap(),
        &["id", "full_name", "email", "city"]
    );
    assert!(!schema.has_table("interviewers"));
    assert!(!schema.has_table("mcp_audit_logs"));

    let schema = f.gateway.get_schema(&f.admin).await.unwrap();
    assert!(schema.has_table("interviewers"));
    assert!(schema.columns("candidates").unwrap().contains(&"phone".to_string()));

    let own = f
        .gateway
        .get_user_permissions(&f.user, Some(f.admin.id))
        .await
        .unwrap();
    assert!(own.iter().all(|p| p.user_id == f.user.id));
    assert_eq!(own.len(), 2);

    let other = f
        .gateway
        .get_user_permissions(&f.admin, Some(f.user.id))
        .await
        .unwrap();
    assert_eq!(other.len(), 2);
}

#[tokio::test]
async fn test_plan_dispatch() {
    let f = fixture().await;

    let chat = CandidatePlan {
        intent: PlanIntent::Chat,
        actions: vec![PlanAction {
            tool: "run_write_query".to_string(),
            sql: Some("DELETE FROM candidates WHERE id = 1".to_string()),
            reason: None,
        }],
    };
    let outcome = f.gateway.execute_plan(&f.admin, &chat).await.unwrap();
    assert!(outcome.text.is_some());
    assert!(outcome.steps.is_empty());
    assert_eq!(audit_count(&f.gateway, &f.admin).await, 0);

    let plan: CandidatePlan = serde_json::from_value(json!({
        "intent": "db",
        "actions": [
            { "tool": "validate_query", "sql": "SELECT id, city FROM candidates" },
            { "tool": "run_read_query", "sql": "SELECT id, city FROM candidates LIMIT 3" }
        ]
    }))
    .unwrap();
    let outcome = f.gateway.execute_plan(&f.user, &plan).await.unwrap();
    assert_eq!(outcome.steps.len(), 2);
    assert_eq!(outcome.steps[0].result["table"], "candidates");
    assert_eq!(outcome.data.unwrap().as_array().unwrap().len(), 3);

    let plan: CandidatePlan = serde_json::from_value(json!({
        "intent": "db",
        "actions": [
            { "tool": "run_read_query", "sql": "SELECT * FROM interviewers" },
            { "tool": "run_read_query", "sql": "SELECT id FROM candidates" }
        ]
    }))
    .unwrap();
    let err = f.gateway.execute_plan(&f.user, &plan).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    // The second action never ran.
    assert_eq!(audit_count(&f.gateway, &f.user).await, 2);

    let plan = CandidatePlan {
        intent: PlanIntent::Db,
        actions: vec![PlanAction {
            tool: "get_schema".to_string(),
            sql: Some("SELECT 1".to_string()),
            reason: None,
        }],
    };
    let err = f.gateway.execute_plan(&f.user, &plan).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let plan = CandidatePlan {
        intent: PlanIntent::Db,
        actions: vec![PlanAction {
            tool: "run_read_query".to_string(),
            sql: None,
            reason: None,
        }],
    };
    assert!(f.gateway.execute_plan(&f.user, &plan).await.is_err());
}

async fn exchange(server: &mut McpServer, requests: &[Value]) -> Vec<Value> {
    let input: String = requests
        .iter()
        .map(|r| format!("{}\n", r))
        .collect::<String>()
        + "not json\n";
    let mut output = Vec::new();
    server.serve(input.as_bytes(), &mut output).await.unwrap();

    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn tool_payload(response: &Value) -> (Value, bool) {
    let result = &response["result"];
    let text = result["content"][0]["text"].as_str().unwrap();
    (
        serde_json::from_str(text).unwrap(),
        result["isError"].as_bool().unwrap_or(false),
    )
}

#[tokio::test]
async fn test_json_rpc_session() {
    let f = fixture().await;
    let mut server = McpServer::new(McpServerConfig::default(), f.gateway.clone(), f.user.clone());

    let responses = exchange(
        &mut server,
        &[
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "test", "version": "0"}
            }}),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
            json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": {
                "name": "run_read_query",
                "arguments": {"sql": "SELECT id, full_name FROM candidates LIMIT 2"}
            }}),
            json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call", "params": {
                "name": "run_read_query",
                "arguments": {"sql": "SELECT * FROM interviewers"}
            }}),
            json!({"jsonrpc": "2.0", "id": 5, "method": "tools/call", "params": {
                "name": "run_read_query",
                "arguments": {}
            }}),
            json!({"jsonrpc": "2.0", "id": 6, "method": "resources/list"}),
            json!({"jsonrpc": "2.0", "id": 7, "method": "ping"}),
        ],
    )
    .await;

    // The notification gets no response; the trailing garbage line does.
    assert_eq!(responses.len(), 8);

    assert_eq!(responses[0]["id"], 1);
    assert_eq!(responses[0]["result"]["serverInfo"]["name"], "sqlwarden");

    let tools = responses[1]["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 9);

    let (rows, is_error) = tool_payload(&responses[2]);
    assert!(!is_error);
    assert_eq!(rows.as_array().unwrap().len(), 2);

    let (body, is_error) = tool_payload(&responses[3]);
    assert!(is_error);
    assert_eq!(body["error"]["kind"], "permission_denied");

    let (body, is_error) = tool_payload(&responses[4]);
    assert!(is_error);
    assert_eq!(body["error"]["kind"], "validation");

    assert_eq!(responses[5]["error"]["code"], -32601);
    assert_eq!(responses[6]["id"], 7);
    assert_eq!(responses[7]["error"]["code"], -32700);
}

#[tokio::test]
async fn test_tools_call_requires_initialize() {
    let f = fixture().await;
    let mut server = McpServer::new(McpServerConfig::default(), f.gateway.clone(), f.user.clone());

    let responses = exchange(
        &mut server,
        &[json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call", "params": {
            "name": "get_schema", "arguments": {}
        }})],
    )
    .await;
    assert_eq!(responses[0]["error"]["code"], -32600);
}

#[tokio::test]
async fn test_oversized_result_is_truncated() {
    let f = fixture().await;
    let config = McpServerConfig {
        max_response_bytes: 64,
        ..McpServerConfig::default()
    };
    let mut server = McpServer::new(config, f.gateway.clone(), f.admin.clone());

    let responses = exchange(
        &mut server,
        &[
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {
                "protocolVersion": "2024-11-05",
                "clientInfo": {"name": "test", "version": "0"}
            }}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call", "params": {
                "name": "run_read_query",
                "arguments": {"sql": "SELECT * FROM candidates"}
            }}),
        ],
    )
    .await;

    let (body, is_error) = tool_payload(&responses[1]);
    assert!(is_error);
    assert_eq!(body["truncated"], true);
    assert_eq!(body["max_bytes"], 64);
    assert!(body["original_bytes"].as_u64().unwrap() > 64);
}
