use http::{HeaderName, Request};
use tower_http::trace::MakeSpan;
use tracing::{Level, Span};

pub const TRACE_ID: &str = "x-trace-id";

/// Request span carrying the trace id and, when configured, the caller.
#[derive(Clone)]
pub struct MakeSpanWithTrace {
    level: Level,
    subject_header: Option<HeaderName>,
}

impl MakeSpanWithTrace {
    pub fn new() -> Self {
        Self {
            level: Level::DEBUG,
            subject_header: None,
        }
    }

    /// Defaults to [`Level::DEBUG`].
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Records the value of `header` as the `subject` field.
    pub fn subject_header(mut self, header: HeaderName) -> Self {
        self.subject_header = Some(header);
        self
    }
}

impl Default for MakeSpanWithTrace {
    fn default() -> Self {
        Self::new()
    }
}

fn header_str<'a, B>(request: &'a Request<B>, name: &HeaderName) -> &'a str {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

impl<B> MakeSpan<B> for MakeSpanWithTrace {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let trace_id = header_str(request, &HeaderName::from_static(TRACE_ID));
        let subject = self
            .subject_header
            .as_ref()
            .map(|v| header_str(request, v))
            .unwrap_or_default();
        // `tracing::span!` needs a constant level.
        macro_rules! make_span {
            ($level:expr) => {
                tracing::span!(
                    $level,
                    "request",
                    trace_id = %trace_id,
                    subject = %subject,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            };
        }

        match self.level {
            Level::ERROR => make_span!(Level::ERROR),
            Level::WARN => make_span!(Level::WARN),
            Level::INFO => make_span!(Level::INFO),
            Level::DEBUG => make_span!(Level::DEBUG),
            Level::TRACE => make_span!(Level::TRACE),
        }
    }
}
