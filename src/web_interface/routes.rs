use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use log::{error, warn};
use warp::{http::StatusCode, reply, reply::Response, Filter, Rejection, Reply};

use super::types::{PlateRequest, ReceiptResponse, SearchQuery, SessionResponse};
use super::ApiError;
use crate::error_handling::types::SessionError;
use crate::session_management::SessionStore;

/// Store handle shared by every request; the lock serializes read-modify-write cycles.
pub type SharedStore = Arc<Mutex<SessionStore>>;

const DASHBOARD_HTML: &str = r#"<!doctype html>
<html><head><meta charset="utf-8"><title>Parkwatch</title></head>
<body>
<h1>Parked vehicles</h1>
<form id="add-form">
  <input id="plate" placeholder="ABC1234" autocomplete="off" required>
  <button type="submit">Register entry</button>
</form>
<p><input id="search" type="search" placeholder="Search plate"></p>
<table><thead><tr><th>Plate</th><th>Date</th><th>Entry</th><th>Stay</th><th>Amount</th><th></th></tr></thead>
<tbody id="rows"></tbody></table>
<script>
const api = '/api/sessions';

async function call(url, options) {
  const res = await fetch(url, options);
  const body = await res.json();
  if (!res.ok) {
    throw new Error(body.message);
  }
  return body;
}

function jsonBody(method, plate) {
  return { method, headers: { 'Content-Type': 'application/json' }, body: JSON.stringify({ plate }) };
}

async function refresh() {
  const q = document.getElementById('search').value;
  const rows = await call(api + '?q=' + encodeURIComponent(q));
  document.getElementById('rows').innerHTML = rows.map(r =>
    `<tr><td>${r.plate}</td><td>${r.entry_date}</td><td>${r.entry_clock}</td>` +
    `<td>${r.duration.hours}h ${r.duration.minutes}m ${r.duration.seconds}s</td>` +
    `<td>${r.amount_label}</td>` +
    `<td><button onclick="editPlate('${r.plate}')">Edit</button> ` +
    `<button onclick="closeSession('${r.plate}')">Exit</button></td></tr>`).join('');
}

async function run(action) {
  try {
    await action();
  } catch (e) {
    alert(e.message);
  }
  await refresh();
}

document.getElementById('add-form').addEventListener('submit', ev => {
  ev.preventDefault();
  const input = document.getElementById('plate');
  run(async () => {
    await call(api, jsonBody('POST', input.value));
    input.value = '';
  });
});

document.getElementById('search').addEventListener('input', refresh);

function editPlate(plate) {
  const next = prompt('New plate for ' + plate, plate);
  if (next === null) {
    return;
  }
  run(() => call(api + '/' + plate, jsonBody('PUT', next)));
}

function closeSession(plate) {
  run(async () => {
    const r = await call(api + '/' + plate + '/receipt');
    const d = r.duration;
    const text = `Plate: ${r.plate}\nStay: ${d.hours}h ${d.minutes}m ${d.seconds}s\nAmount: ${r.amount_label}`;
    if (confirm(text + '\n\nClose this session?')) {
      await call(api + '/' + plate, { method: 'DELETE' });
    }
  });
}

refresh();
setInterval(refresh, 1000);
</script>
</body></html>"#;

/// Every route of the web interface.
pub fn routes(store: SharedStore) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    dashboard_route()
        .or(list_sessions_route(store.clone()))
        .unify()
        .or(open_session_route(store.clone()))
        .unify()
        .or(get_session_route(store.clone()))
        .unify()
        .or(rename_session_route(store.clone()))
        .unify()
        .or(preview_close_route(store.clone()))
        .unify()
        .or(close_session_route(store))
        .unify()
}

fn with_store(store: SharedStore) -> impl Filter<Extract = (SharedStore,), Error = Infallible> + Clone {
    warp::any().map(move || store.clone())
}

/// GET /
pub fn dashboard_route() -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path::end()
        .and(warp::get())
        .map(|| reply::html(DASHBOARD_HTML).into_response())
}

/// GET /api/sessions?q=term
pub fn list_sessions_route(
    store: SharedStore,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("api" / "sessions")
        .and(warp::get())
        .and(warp::query::<SearchQuery>())
        .and(with_store(store))
        .and_then(|query: SearchQuery, store: SharedStore| async move {
            let term = query.q.unwrap_or_default();
            let res = match with_locked(&store, |s| s.live_search_at(&term, Utc::now())) {
                Ok(entries) => {
                    let body: Vec<SessionResponse> = entries.iter().map(SessionResponse::from).collect();
                    reply::with_status(reply::json(&body), StatusCode::OK).into_response()
                }
                Err(res) => res,
            };
            Ok::<_, Infallible>(res)
        })
}

/// POST /api/sessions
pub fn open_session_route(
    store: SharedStore,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("api" / "sessions")
        .and(warp::post())
        .and(warp::body::json::<PlateRequest>())
        .and(with_store(store))
        .and_then(|body: PlateRequest, store: SharedStore| async move {
            let now = Utc::now();
            let res = match with_locked(&store, |s| {
                let session = s.open_session_at(&body.plate, now)?;
                s.live_entry_at(session.plate.as_str(), now)
            }) {
                Ok(entry) => reply::with_status(
                    reply::json(&SessionResponse::from(&entry)),
                    StatusCode::CREATED,
                )
                .into_response(),
                Err(res) => res,
            };
            Ok::<_, Infallible>(res)
        })
}

/// GET /api/sessions/:plate
pub fn get_session_route(
    store: SharedStore,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("api" / "sessions" / String)
        .and(warp::get())
        .and(with_store(store))
        .and_then(|plate: String, store: SharedStore| async move {
            let res = match with_locked(&store, |s| s.live_entry_at(&plate, Utc::now())) {
                Ok(entry) => {
                    reply::with_status(reply::json(&SessionResponse::from(&entry)), StatusCode::OK)
                        .into_response()
                }
                Err(res) => res,
            };
            Ok::<_, Infallible>(res)
        })
}

/// PUT /api/sessions/:plate
pub fn rename_session_route(
    store: SharedStore,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("api" / "sessions" / String)
        .and(warp::put())
        .and(warp::body::json::<PlateRequest>())
        .and(with_store(store))
        .and_then(|plate: String, body: PlateRequest, store: SharedStore| async move {
            let now = Utc::now();
            let res = match with_locked(&store, |s| {
                let session = s.rename_plate(&plate, &body.plate)?;
                s.live_entry_at(session.plate.as_str(), now)
            }) {
                Ok(entry) => {
                    reply::with_status(reply::json(&SessionResponse::from(&entry)), StatusCode::OK)
                        .into_response()
                }
                Err(res) => res,
            };
            Ok::<_, Infallible>(res)
        })
}

/// GET /api/sessions/:plate/receipt
pub fn preview_close_route(
    store: SharedStore,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("api" / "sessions" / String / "receipt")
        .and(warp::get())
        .and(with_store(store))
        .and_then(|plate: String, store: SharedStore| async move {
            let res = match with_locked(&store, |s| s.preview_close(&plate)) {
                Ok(receipt) => reply::with_status(
                    reply::json(&ReceiptResponse::from(&receipt)),
                    StatusCode::OK,
                )
                .into_response(),
                Err(res) => res,
            };
            Ok::<_, Infallible>(res)
        })
}

/// DELETE /api/sessions/:plate
pub fn close_session_route(
    store: SharedStore,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("api" / "sessions" / String)
        .and(warp::delete())
        .and(with_store(store))
        .and_then(|plate: String, store: SharedStore| async move {
            let res = match with_locked(&store, |s| s.close_session(&plate)) {
                Ok(receipt) => reply::with_status(
                    reply::json(&ReceiptResponse::from(&receipt)),
                    StatusCode::OK,
                )
                .into_response(),
                Err(res) => res,
            };
            Ok::<_, Infallible>(res)
        })
}

/// Runs `op` with the store locked, turning failures into error responses.
fn with_locked<T, F>(store: &SharedStore, op: F) -> Result<T, Response>
where
    F: FnOnce(&mut SessionStore) -> Result<T, SessionError>,
{
    let mut guard = store.lock().map_err(|_| {
        error!("Session store lock poisoned");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "Session store unavailable".into())
    })?;
    op(&mut guard).map_err(|e| session_error_response(&e))
}

fn session_error_response(err: &SessionError) -> Response {
    let status = match err {
        SessionError::InvalidPlate(_) => StatusCode::BAD_REQUEST,
        SessionError::DuplicatePlate(_) => StatusCode::CONFLICT,
        SessionError::NotFound(_) => StatusCode::NOT_FOUND,
        SessionError::StorageError(e) => {
            error!("Request failed on storage: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    if status.is_client_error() {
        warn!("Rejected request: {}", err);
    }
    error_response(status, err.to_string())
}

fn error_response(status: StatusCode, message: String) -> Response {
    reply::with_status(reply::json(&ApiError { message }), status).into_response()
}
