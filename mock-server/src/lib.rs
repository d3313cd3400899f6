//! Local stand-in for the typograf SOAP service.
//!
//! Understands just enough of the `ProcessText` envelope to apply a couple of
//! typographic rules and answer with a SOAP 1.2 response, optionally encoded
//! as windows-1251. Every request body is kept in a `RequestLog`.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1251};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::{net::TcpListener, sync::RwLock};

pub const PROCESS_TEXT_PATH: &str = "/webservices/typograf.asmx";
pub const PROCESS_TEXT_CP1251_PATH: &str = "/webservices/typograf-cp1251.asmx";

/// Raw bodies of every request received, oldest first.
pub type RequestLog = Arc<RwLock<Vec<String>>>;

const SOAP_FAULT: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
<soap:Envelope xmlns:soap=\"http://www.w3.org/2003/05/soap-envelope\"><soap:Body><soap:Fault>\
<soap:Code><soap:Value>soap:Receiver</soap:Value></soap:Code>\
<soap:Reason><soap:Text xml:lang=\"en\">ProcessText request expected</soap:Text></soap:Reason>\
</soap:Fault></soap:Body></soap:Envelope>";

/// Entity flavour requested by the client, by service code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entities {
    Html,
    Xml,
    Plain,
}

impl Entities {
    fn from_code(code: i32) -> Self {
        match code {
            1 | 4 => Entities::Html,
            2 => Entities::Xml,
            _ => Entities::Plain,
        }
    }

    fn render(self, c: char) -> String {
        match (self, c) {
            (Entities::Html, '«') => "&laquo;".to_string(),
            (Entities::Html, '»') => "&raquo;".to_string(),
            (Entities::Html, '—') => "&mdash;".to_string(),
            (Entities::Html, '\u{A0}') => "&nbsp;".to_string(),
            (Entities::Xml, '«' | '»' | '—' | '\u{A0}') => format!("&#{};", c as u32),
            _ => c.to_string(),
        }
    }
}

/// Fields of a `ProcessText` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessTextRequest {
    pub text: String,
    pub entities: Entities,
    pub max_nobr: u32,
    pub use_br: bool,
    pub use_p: bool,
}

impl ProcessTextRequest {
    /// Pull the call fields out of a SOAP envelope. `None` without a `tns:text` element.
    pub fn parse(body: &str) -> Option<Self> {
        static TEXT: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"(?s)<tns:text>(.*?)</tns:text>").unwrap());

        let text = TEXT.captures(body)?.get(1)?.as_str();
        Some(Self {
            text: unescape_xml(text),
            entities: Entities::from_code(field(body, "entityType").unwrap_or(3)),
            max_nobr: field(body, "maxNobr").unwrap_or(0),
            use_br: field(body, "useBr").unwrap_or(false),
            use_p: field(body, "useP").unwrap_or(false),
        })
    }
}

fn field<T: std::str::FromStr>(body: &str, name: &str) -> Option<T> {
    let open = format!("<tns:{name}>");
    let close = format!("</tns:{name}>");
    let start = body.find(&open)? + open.len();
    let end = start + body[start..].find(&close)?;
    body[start..end].trim().parse().ok()
}

/// Apply the service's rules: short words are bound to the next one with a
/// non-breaking space (at most `max_nobr` of them, zero meaning no limit),
/// paired straight quotes become «», a spaced hyphen becomes an em dash,
/// then optional `<br />` and `<p>` markup.
pub fn typeset(request: &ProcessTextRequest) -> String {
    static QUOTES: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([^"]*)""#).unwrap());

    let bound = bind_short_words(&request.text, request.max_nobr);
    let quoted = QUOTES.replace_all(&bound, "«$1»");
    let dashed = quoted.replace(" - ", " — ");

    let mut out: String = dashed.chars().map(|c| request.entities.render(c)).collect();
    if request.use_br {
        out = out.replace('\n', "<br />\n");
    }
    if request.use_p {
        out = format!("<p>{out}</p>");
    }
    out
}

fn bind_short_words(text: &str, max_nobr: u32) -> String {
    let mut out = String::with_capacity(text.len());
    let mut inserted = 0;
    let mut words = text.split(' ').peekable();
    while let Some(word) = words.next() {
        out.push_str(word);
        if words.peek().is_none() {
            break;
        }
        let short = (1..=2).contains(&word.chars().count()) && word.chars().all(char::is_alphabetic);
        if short && (max_nobr == 0 || inserted < max_nobr) {
            out.push('\u{A0}');
            inserted += 1;
        } else {
            out.push(' ');
        }
    }
    out
}

pub fn app() -> Router {
    app_with_log(RequestLog::default())
}

pub fn app_with_log(log: RequestLog) -> Router {
    Router::new()
        .route(PROCESS_TEXT_PATH, post(process_text_utf8))
        .route(PROCESS_TEXT_CP1251_PATH, post(process_text_cp1251))
        .with_state(log)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with_log(listener, RequestLog::default()).await
}

pub async fn run_with_log(listener: TcpListener, log: RequestLog) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_log(log)).await
}

async fn process_text_utf8(State(log): State<RequestLog>, body: String) -> Response {
    respond(log, body, UTF_8).await
}

async fn process_text_cp1251(State(log): State<RequestLog>, body: String) -> Response {
    respond(log, body, WINDOWS_1251).await
}

async fn respond(log: RequestLog, body: String, encoding: &'static Encoding) -> Response {
    let request = ProcessTextRequest::parse(&body);
    log.write().await.push(body);

    let Some(request) = request else {
        tracing::warn!("rejecting request without tns:text");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "application/soap+xml; charset=utf-8")],
            SOAP_FAULT,
        )
            .into_response();
    };

    let charset = encoding.name().to_ascii_lowercase();
    let envelope = format!(
        "<?xml version=\"1.0\" encoding=\"{charset}\"?>\
<soap:Envelope xmlns:soap=\"http://www.w3.org/2003/05/soap-envelope\">\
<soap:Body><ProcessTextResponse xmlns=\"http://typograf.artlebedev.ru/webservices/\">\
<ProcessTextResult>{}</ProcessTextResult>\
</ProcessTextResponse></soap:Body></soap:Envelope>",
        escape_xml(&typeset(&request))
    );
    tracing::debug!(text_len = request.text.len(), %charset, "processed text");

    let (bytes, _, _) = encoding.encode(&envelope);
    (
        [(
            header::CONTENT_TYPE,
            format!("application/soap+xml; charset={charset}"),
        )],
        bytes.into_owned(),
    )
        .into_response()
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
