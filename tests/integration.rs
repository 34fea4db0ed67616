use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::json;

use ticket_desk::api::{ApiConfig, ApiError, HttpTicketApi, TicketApi};
use ticket_desk::bootstrap::LoadState;
use ticket_desk::cli::{self, AssignArgs, RootCommand, TicketArgs};
use ticket_desk::executor::{AssigneeSelection, MutationError, MutationKind};
use ticket_desk::session::Session;
use ticket_desk::settings::Settings;
use ticket_desk::types::{FilterMode, NewTicket, Ticket, TicketId, User, UserId};
use ticket_desk::views::DetailModel;

#[tokio::test]
async fn http_client_reads_and_writes_tickets() -> Result<()> {
    let server = StubTicketServer::start(seed_tickets(), seed_users())?;
    let api = server.client()?;

    let tickets = api.list_tickets().await?;
    assert_eq!(tickets, seed_tickets());
    let users = api.list_users().await?;
    assert_eq!(users[1].name, "Bob");

    let created = api
        .create_ticket(NewTicket {
            description: "Order new chairs".to_string(),
        })
        .await?;
    assert_eq!(created.id, TicketId(3));
    assert_eq!(created.assignee_id, None);
    assert!(!created.completed);

    api.assign(TicketId(2), UserId(1)).await?;
    api.complete(TicketId(1)).await?;
    api.incomplete(TicketId(2)).await?;
    api.unassign(TicketId(1)).await?;

    assert_eq!(
        server.requests(),
        vec![
            "GET /api/tickets",
            "GET /api/users",
            "POST /api/tickets",
            "PUT /api/tickets/2/assign/1",
            "PUT /api/tickets/1/complete",
            "DELETE /api/tickets/2/complete",
            "PUT /api/tickets/1/unassign",
        ]
    );
    assert_eq!(server.last_body().as_deref(), Some(r#"{"description":"Order new chairs"}"#));
    Ok(())
}

#[tokio::test]
async fn http_client_maps_failures() -> Result<()> {
    let server = StubTicketServer::start(seed_tickets(), seed_users())?;
    let api = server.client()?;

    server.respond_with("PUT /api/tickets/1/complete", 503, "");
    let err = api
        .complete(TicketId(1))
        .await
        .expect_err("503 should be an error");
    assert_eq!(err.status_code(), Some(503));

    server.respond_with("GET /api/users", 200, "not json");
    assert!(matches!(api.list_users().await, Err(ApiError::Decode(_))));

    let err = api
        .assign(TicketId(42), UserId(1))
        .await
        .expect_err("unknown ticket should be an error");
    assert_eq!(err.status_code(), Some(404));
    Ok(())
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() -> Result<()> {
    let port = {
        let listener = TcpListener::bind(("127.0.0.1", 0)).context("failed to bind probe port")?;
        listener.local_addr()?.port()
    };
    let api = HttpTicketApi::new(ApiConfig {
        base_url: format!("http://127.0.0.1:{port}"),
        ..ApiConfig::default()
    })?;

    assert!(matches!(
        api.list_tickets().await,
        Err(ApiError::Transport(_))
    ));
    Ok(())
}

#[tokio::test]
async fn session_walkthrough_against_http_server() -> Result<()> {
    let server = StubTicketServer::start(seed_tickets(), seed_users())?;
    let session = Session::from_settings(&server.settings())?;
    session.load().await?;
    assert_eq!(session.store().load_state(), LoadState::Ready);

    let detail = session.detail_view("1");
    assert_eq!(
        detail.select_assignee("2").await,
        Ok(Some(AssigneeSelection::Assign(UserId(2))))
    );
    assert_eq!(
        session.store().ticket(TicketId(1)).and_then(|t| t.assignee_id),
        Some(UserId(2))
    );
    assert_eq!(
        detail.model().ticket().map(|d| d.assignee_name),
        Some("Bob".to_string())
    );

    let incomplete = session.list_view(FilterMode::Incomplete).model();
    let ids: Vec<_> = incomplete.rows.iter().map(|row| row.id).collect();
    assert_eq!(ids, vec![TicketId(1)]);

    assert!(matches!(
        session.detail_view("999").model(),
        DetailModel::NotFound { .. }
    ));
    Ok(())
}

#[tokio::test]
async fn rejected_mutation_leaves_cache_unchanged() -> Result<()> {
    let server = StubTicketServer::start(seed_tickets(), seed_users())?;
    let session = Session::from_settings(&server.settings())?;
    session.load().await?;
    // Ticket 2 starts completed, so a toggle issues DELETE.
    server.respond_with("DELETE /api/tickets/2/complete", 500, "");

    let before = session.store().ticket(TicketId(2));
    let list = session.list_view(FilterMode::All);
    let err = list
        .toggle(TicketId(2))
        .await
        .expect_err("toggle should surface the failure");

    assert!(matches!(
        err,
        MutationError::Remote {
            kind: MutationKind::Incomplete,
            ..
        }
    ));
    assert_eq!(session.store().ticket(TicketId(2)), before);
    assert!(!session.store().status(TicketId(2)).is_busy());
    assert_eq!(server.ticket(TicketId(2)).map(|t| t.completed), Some(true));
    Ok(())
}

#[tokio::test]
async fn concurrent_assigns_on_different_tickets() -> Result<()> {
    let server = StubTicketServer::start(seed_tickets(), seed_users())?;
    let session = Session::from_settings(&server.settings())?;
    session.load().await?;

    let executor = session.executor();
    let (first, second) = tokio::join!(
        executor.assign(TicketId(1), UserId(2)),
        executor.assign(TicketId(2), UserId(1)),
    );
    first?;
    second?;

    let tickets = session.store().tickets();
    assert_eq!(tickets[0].assignee_id, Some(UserId(2)));
    assert_eq!(tickets[1].assignee_id, Some(UserId(1)));
    assert_eq!(server.ticket(TicketId(2)).and_then(|t| t.assignee_id), Some(UserId(1)));
    Ok(())
}

#[tokio::test]
async fn bootstrap_failure_then_reload() -> Result<()> {
    let server = StubTicketServer::start(seed_tickets(), seed_users())?;
    let session = Session::from_settings(&server.settings())?;
    server.respond_with("GET /api/tickets", 500, "");

    assert!(session.load().await.is_err());
    assert_eq!(
        session.store().load_state(),
        LoadState::Failed("Failed to load data".to_string())
    );
    assert!(session.store().tickets().is_empty());

    server.clear_override("GET /api/tickets");
    session.reload().await?;
    assert_eq!(session.store().tickets().len(), 2);
    Ok(())
}

#[tokio::test]
async fn cli_exit_codes() -> Result<()> {
    let server = StubTicketServer::start(seed_tickets(), seed_users())?;
    let settings = server.settings();

    let show = |id: &str| RootCommand::Show(TicketArgs { id: id.to_string() });
    assert_eq!(cli::run(&settings, show("1"), true, false).await, 0);
    assert_eq!(cli::run(&settings, show("999"), true, false).await, 3);

    let assign = RootCommand::Assign(AssignArgs {
        id: "2".to_string(),
        user: "2".to_string(),
    });
    assert_eq!(cli::run(&settings, assign, false, true).await, 0);
    assert_eq!(server.ticket(TicketId(2)).and_then(|t| t.assignee_id), Some(UserId(2)));

    server.respond_with("PUT /api/tickets/1/complete", 500, "");
    let complete = RootCommand::Complete(TicketArgs { id: "1".to_string() });
    assert_eq!(cli::run(&settings, complete, true, false).await, 5);

    server.respond_with("GET /api/users", 500, "");
    assert_eq!(cli::run(&settings, RootCommand::Users, true, false).await, 6);

    let mut bad = settings.clone();
    bad.api_base_url = "ftp://tickets".to_string();
    assert_eq!(cli::run(&bad, RootCommand::Users, true, false).await, 2);
    Ok(())
}

fn seed_tickets() -> Vec<Ticket> {
    vec![
        Ticket {
            id: TicketId(1),
            description: "Install a monitor arm".to_string(),
            assignee_id: Some(UserId(1)),
            completed: false,
        },
        Ticket {
            id: TicketId(2),
            description: "Move desk".to_string(),
            assignee_id: None,
            completed: true,
        },
    ]
}

fn seed_users() -> Vec<User> {
    vec![
        User {
            id: UserId(1),
            name: "Alice".to_string(),
        },
        User {
            id: UserId(2),
            name: "Bob".to_string(),
        },
    ]
}

#[derive(Debug, Default)]
struct StubState {
    tickets: Vec<Ticket>,
    users: Vec<User>,
    overrides: HashMap<String, (u16, String)>,
    requests: Vec<String>,
    bodies: Vec<String>,
}

struct StubTicketServer {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    state: Arc<Mutex<StubState>>,
    port: u16,
}

impl StubTicketServer {
    fn start(tickets: Vec<Ticket>, users: Vec<User>) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .context("failed to bind stub ticket server on random available port")?;
        let port = listener
            .local_addr()
            .context("failed to get stub server port")?
            .port();
        listener
            .set_nonblocking(true)
            .context("failed to make stub ticket server non-blocking")?;

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let state = Arc::new(Mutex::new(StubState {
            tickets,
            users,
            ..StubState::default()
        }));
        let shared = Arc::clone(&state);

        let handle = thread::spawn(move || {
            while !stop_flag.load(Ordering::Relaxed) {
                match listener.accept() {
                    Ok((mut stream, _)) => {
                        let _ = stream.set_nonblocking(false);
                        let _ = stream.set_read_timeout(Some(Duration::from_millis(500)));
                        let (line, body) = read_request(&mut stream);
                        let response = {
                            let mut state = shared
                                .lock()
                                .expect("stub server state lock should not be poisoned");
                            handle_request(&mut state, &line, body)
                        };
                        let _ = stream.write_all(response.as_bytes());
                        let _ = stream.flush();
                    }
                    Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(5));
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Self {
            stop,
            handle: Some(handle),
            state,
            port,
        })
    }

    fn settings(&self) -> Settings {
        Settings {
            api_base_url: format!("http://127.0.0.1:{}", self.port),
            request_timeout_ms: 5_000,
            ..Settings::default()
        }
    }

    fn client(&self) -> Result<HttpTicketApi> {
        Ok(HttpTicketApi::new(ApiConfig::from_settings(&self.settings()))?)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StubState> {
        self.state
            .lock()
            .expect("stub server state lock should not be poisoned")
    }

    fn respond_with(&self, request_line: &str, status: u16, body: &str) {
        self.lock()
            .overrides
            .insert(request_line.to_string(), (status, body.to_string()));
    }

    fn clear_override(&self, request_line: &str) {
        self.lock().overrides.remove(request_line);
    }

    fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    fn last_body(&self) -> Option<String> {
        self.lock().bodies.last().cloned()
    }

    fn ticket(&self, id: TicketId) -> Option<Ticket> {
        self.lock().tickets.iter().find(|t| t.id == id).cloned()
    }
}

impl Drop for StubTicketServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Reads the request line and body of one HTTP/1.1 request.
fn read_request(stream: &mut TcpStream) -> (String, String) {
    let mut raw = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        if let Some(pos) = find_header_end(&raw) {
            break pos;
        }
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return (String::new(), String::new()),
            Ok(read) => raw.extend_from_slice(&chunk[..read]),
        }
    };

    let head = String::from_utf8_lossy(&raw[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let body_start = header_end + 4;
    while raw.len() < body_start + content_length {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(read) => raw.extend_from_slice(&chunk[..read]),
        }
    }

    let line = head.lines().next().unwrap_or_default();
    let request_line = line
        .rsplit_once(' ')
        .map(|(method_and_path, _)| method_and_path)
        .unwrap_or(line)
        .to_string();
    let body_end = raw.len().min(body_start + content_length);
    let body = String::from_utf8_lossy(&raw[body_start.min(body_end)..body_end]).to_string();
    (request_line, body)
}

fn find_header_end(raw: &[u8]) -> Option<usize> {
    raw.windows(4).position(|window| window == b"\r\n\r\n")
}

fn handle_request(state: &mut StubState, request_line: &str, body: String) -> String {
    state.requests.push(request_line.to_string());
    if !body.is_empty() {
        state.bodies.push(body.clone());
    }

    if let Some((status, canned)) = state.overrides.get(request_line) {
        return http_response(*status, canned);
    }

    let Some((method, path)) = request_line.split_once(' ') else {
        return http_response(400, "");
    };
    let segments: Vec<&str> = path
        .trim_start_matches("/api/")
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();

    match (method, segments.as_slice()) {
        ("GET", ["tickets"]) => http_response(200, &json!(state.tickets).to_string()),
        ("GET", ["users"]) => http_response(200, &json!(state.users).to_string()),
        ("POST", ["tickets"]) => {
            let Ok(request) = serde_json::from_str::<NewTicket>(&body) else {
                return http_response(400, "");
            };
            let next_id = state.tickets.iter().map(|t| t.id.0).max().unwrap_or(0) + 1;
            let ticket = Ticket {
                id: TicketId(next_id),
                description: request.description,
                assignee_id: None,
                completed: false,
            };
            state.tickets.push(ticket.clone());
            http_response(200, &json!(ticket).to_string())
        }
        ("PUT", ["tickets", id, "assign", user]) => {
            let user = user.parse().ok().map(UserId);
            update_ticket(state, id, |t| t.assignee_id = user)
        }
        ("PUT", ["tickets", id, "unassign"]) => update_ticket(state, id, |t| t.assignee_id = None),
        ("PUT", ["tickets", id, "complete"]) => update_ticket(state, id, |t| t.completed = true),
        ("DELETE", ["tickets", id, "complete"]) => {
            update_ticket(state, id, |t| t.completed = false)
        }
        _ => http_response(404, ""),
    }
}

fn update_ticket(state: &mut StubState, raw_id: &str, update: impl FnOnce(&mut Ticket)) -> String {
    let Ok(id) = raw_id.parse::<u64>() else {
        return http_response(404, "");
    };
    match state.tickets.iter_mut().find(|t| t.id == TicketId(id)) {
        Some(ticket) => {
            update(ticket);
            http_response(204, "")
        }
        None => http_response(404, ""),
    }
}

fn http_response(status: u16, body: &str) -> String {
    let reason = match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        _ => "Error",
    };
    if status == 204 {
        return format!("HTTP/1.1 204 {reason}\r\nConnection: close\r\n\r\n");
    }
    format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}
