use axum::extract::{Path, RawQuery, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value as JsonValue};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// In-process stand-in for the remote catalog service. Keeps books and
/// borrows in memory and logs every request line it serves.
#[derive(Clone, Default)]
pub struct Stub {
    inner: Arc<Mutex<StubInner>>,
}

#[derive(Default)]
struct StubInner {
    books: Vec<JsonValue>,
    borrows: Vec<JsonValue>,
    requests: Vec<String>,
    fail_listings: bool,
    next_id: u64,
}

impl Stub {
    pub fn seed_book(&self, title: &str, author: &str, genre: &str, copies: u64) -> String {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = format!("b{}", inner.next_id);
        inner.books.push(json!({
            "_id": id,
            "title": title,
            "author": author,
            "genre": genre,
            "isbn": "978-0000000000",
            "description": "Seeded onto the test shelf, described at length.",
            "copies": copies,
            "available": copies > 0,
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z",
            "__v": 0
        }));
        id
    }

    pub fn fail_listings(&self, fail: bool) {
        self.inner.lock().unwrap().fail_listings = fail;
    }

    pub fn requests(&self) -> Vec<String> {
        self.inner.lock().unwrap().requests.clone()
    }

    pub fn count(&self, line: &str) -> usize {
        self.requests().iter().filter(|entry| *entry == line).count()
    }

    pub fn count_prefixed(&self, prefix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|entry| entry.starts_with(prefix))
            .count()
    }

    fn log(&self, line: String) {
        self.inner.lock().unwrap().requests.push(line);
    }
}

pub async fn start() -> (Stub, String) {
    let stub = Stub::default();
    let api = Router::new()
        .route("/books", get(list_books).post(create_book))
        .route("/books/genres", get(list_genres))
        .route("/books/authors", get(list_authors))
        .route(
            "/books/:id",
            get(get_book).put(update_book).delete(delete_book),
        )
        .route("/borrow", get(get_borrow_summary).post(borrow_book));
    let app = Router::new()
        .nest("/api", api)
        .route("/covers/good.png", get(cover_image))
        .route("/covers/page.html", get(cover_page))
        .with_state(stub.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("a free port");
    let address = listener.local_addr().expect("a local address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serving the stub");
    });
    (stub, format!("http://{address}"))
}

fn envelope(message: &str, data: JsonValue) -> Json<JsonValue> {
    Json(json!({ "success": true, "message": message, "data": data }))
}

fn failure(status: StatusCode, message: &str) -> (StatusCode, Json<JsonValue>) {
    (status, Json(json!({ "success": false, "message": message })))
}

async fn list_books(State(stub): State<Stub>, RawQuery(query): RawQuery) -> Response {
    let suffix = query
        .as_ref()
        .map(|q| format!("?{q}"))
        .unwrap_or_default();
    stub.log(format!("GET /api/books{suffix}"));
    let inner = stub.inner.lock().unwrap();
    if inner.fail_listings {
        return failure(StatusCode::INTERNAL_SERVER_ERROR, "Catalog offline").into_response();
    }

    let mut filter = None;
    let mut limit = 0usize;
    for pair in query.as_deref().unwrap_or_default().split('&') {
        match pair.split_once('=') {
            Some(("filter", value)) => filter = Some(value.to_owned()),
            Some(("limit", value)) => limit = value.parse().unwrap_or(0),
            _ => {}
        }
    }
    let mut books: Vec<JsonValue> = inner
        .books
        .iter()
        .filter(|book| match &filter {
            Some(genre) => book["genre"].as_str() == Some(genre.as_str()),
            None => true,
        })
        .cloned()
        .collect();
    if limit > 0 {
        books.truncate(limit);
    }
    envelope("Books retrieved successfully", json!(books)).into_response()
}

async fn get_book(State(stub): State<Stub>, Path(id): Path<String>) -> Response {
    stub.log(format!("GET /api/books/{id}"));
    let inner = stub.inner.lock().unwrap();
    match inner
        .books
        .iter()
        .find(|book| book["_id"].as_str() == Some(id.as_str()))
    {
        Some(book) => envelope("Book retrieved successfully", book.clone()).into_response(),
        None => failure(StatusCode::NOT_FOUND, "Book not found").into_response(),
    }
}

async fn create_book(State(stub): State<Stub>, Json(body): Json<JsonValue>) -> Response {
    stub.log("POST /api/books".to_owned());
    let mut inner = stub.inner.lock().unwrap();
    inner.next_id += 1;
    let id = format!("b{}", inner.next_id);
    let mut book = body.as_object().cloned().unwrap_or_default();
    book.insert("_id".to_owned(), json!(id));
    book.insert("createdAt".to_owned(), json!("2024-01-02T00:00:00Z"));
    book.insert("updatedAt".to_owned(), json!("2024-01-02T00:00:00Z"));
    book.insert("__v".to_owned(), json!(0));
    let book = JsonValue::Object(book);
    inner.books.push(book.clone());
    envelope("Book created successfully", book).into_response()
}

async fn update_book(
    State(stub): State<Stub>,
    Path(id): Path<String>,
    Json(body): Json<JsonValue>,
) -> Response {
    stub.log(format!("PUT /api/books/{id}"));
    let mut inner = stub.inner.lock().unwrap();
    let Some(index) = inner
        .books
        .iter()
        .position(|book| book["_id"].as_str() == Some(id.as_str()))
    else {
        return failure(StatusCode::NOT_FOUND, "Book not found").into_response();
    };

    let created_at = inner.books[index]["createdAt"].clone();
    let mut book = body.as_object().cloned().unwrap_or_default();
    book.insert("_id".to_owned(), json!(id));
    book.insert("createdAt".to_owned(), created_at);
    book.insert("updatedAt".to_owned(), json!("2024-01-03T00:00:00Z"));
    book.insert("__v".to_owned(), json!(1));
    let book = JsonValue::Object(book);
    inner.books[index] = book.clone();
    envelope("Book updated successfully", book).into_response()
}

async fn delete_book(State(stub): State<Stub>, Path(id): Path<String>) -> Response {
    stub.log(format!("DELETE /api/books/{id}"));
    let mut inner = stub.inner.lock().unwrap();
    let Some(index) = inner
        .books
        .iter()
        .position(|book| book["_id"].as_str() == Some(id.as_str()))
    else {
        return failure(StatusCode::NOT_FOUND, "Book not found").into_response();
    };
    inner.books.remove(index);
    Json(json!({ "success": true, "message": "Book deleted successfully" })).into_response()
}

async fn list_genres(State(stub): State<Stub>) -> Response {
    stub.log("GET /api/books/genres".to_owned());
    let inner = stub.inner.lock().unwrap();
    let mut genres: Vec<String> = inner
        .books
        .iter()
        .filter_map(|book| book["genre"].as_str().map(str::to_owned))
        .collect();
    genres.sort();
    genres.dedup();
    envelope("Genres retrieved successfully", json!(genres)).into_response()
}

async fn list_authors(State(stub): State<Stub>) -> Response {
    stub.log("GET /api/books/authors".to_owned());
    let inner = stub.inner.lock().unwrap();
    let mut authors: Vec<String> = inner
        .books
        .iter()
        .filter_map(|book| book["author"].as_str().map(str::to_owned))
        .collect();
    authors.sort();
    authors.dedup();
    envelope("Authors retrieved successfully", json!(authors)).into_response()
}

async fn get_borrow_summary(State(stub): State<Stub>) -> Response {
    stub.log("GET /api/borrow".to_owned());
    let inner = stub.inner.lock().unwrap();
    let mut totals: Vec<(String, u64)> = Vec::new();
    for borrow in &inner.borrows {
        let Some(book_id) = borrow["book"].as_str() else {
            continue;
        };
        let quantity = borrow["quantity"].as_u64().unwrap_or(0);
        match totals.iter_mut().find(|(id, _)| id == book_id) {
            Some((_, total)) => *total += quantity,
            None => totals.push((book_id.to_owned(), quantity)),
        }
    }
    let records: Vec<JsonValue> = totals
        .iter()
        .map(|(book_id, total)| {
            let book = inner
                .books
                .iter()
                .find(|book| book["_id"].as_str() == Some(book_id.as_str()));
            json!({
                "book": {
                    "title": book.map(|book| book["title"].clone()).unwrap_or(json!("Unknown")),
                    "isbn": book.map(|book| book["isbn"].clone()).unwrap_or(json!("")),
                },
                "totalQuantity": total
            })
        })
        .collect();
    envelope("Borrow summary retrieved successfully", json!(records)).into_response()
}

async fn borrow_book(State(stub): State<Stub>, Json(body): Json<JsonValue>) -> Response {
    stub.log("POST /api/borrow".to_owned());
    let mut inner = stub.inner.lock().unwrap();
    inner.borrows.push(body.clone());
    envelope("Book borrowed successfully", body).into_response()
}

async fn cover_image() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/png")], vec![0u8; 8])
}

async fn cover_page() -> Html<&'static str> {
    Html("<!doctype html><title>not a cover</title>")
}
