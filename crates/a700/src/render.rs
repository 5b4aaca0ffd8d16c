//! Console output for a running exchange.

use std::io::Write;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use a700_client::{AgentReply, StreamObserver, ToolCall, ToolResult};
use console::{Style, Term};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Prints streamed text and tool activity as it happens, and owns the
/// typing indicator shown while a blocking call runs.
pub struct ConsoleObserver {
    quiet: bool,
    streamed: AtomicBool,
    mid_line: AtomicBool,
    indicator: Mutex<Option<TypingIndicator>>,
}

impl ConsoleObserver {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            streamed: AtomicBool::new(false),
            mid_line: AtomicBool::new(false),
            indicator: Mutex::new(None),
        }
    }

    /// Show the typing indicator until [`stop_indicator`](Self::stop_indicator).
    pub fn start_indicator(&self) {
        if self.quiet {
            return;
        }
        let mut slot = self.indicator.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            *slot = Some(TypingIndicator::start("Thinking"));
        }
    }

    pub async fn stop_indicator(&self) {
        let indicator = self
            .indicator
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(indicator) = indicator {
            indicator.stop().await;
        }
    }

    /// Whether any reply text has already been written to stdout.
    pub fn streamed_text(&self) -> bool {
        self.streamed.load(Ordering::Relaxed)
    }

    fn dim(&self, msg: &str) {
        if self.quiet {
            return;
        }
        if self.mid_line.swap(false, Ordering::Relaxed) {
            println!();
        }
        println!("{}", Style::new().dim().apply_to(msg));
    }
}

impl StreamObserver for ConsoleObserver {
    fn on_connected(&self) {
        tracing::debug!("streaming connection ready");
    }

    fn on_text(&self, chunk: &str) {
        if self.quiet || chunk.is_empty() {
            return;
        }
        print!("{}", chunk);
        let _ = std::io::stdout().flush();
        self.streamed.store(true, Ordering::Relaxed);
        self.mid_line.store(true, Ordering::Relaxed);
    }

    fn on_tool_pending(&self, calls: &[ToolCall]) {
        for call in calls {
            self.dim(&format!("[Running: {}/{}]", call.server, call.tool));
        }
    }

    fn on_tool_result(&self, call: &ToolCall, result: &ToolResult) {
        let status = if result.contains_key("error") {
            "failed"
        } else {
            "done"
        };
        self.dim(&format!("[{}: {}]", call.tool, status));
    }

    fn on_server_tool_complete(&self, _result: &Value) {
        self.dim("[Server tool complete]");
    }

    fn on_notice(&self, notice: &str) {
        if self.quiet {
            return;
        }
        let yellow = Style::new().yellow();
        eprintln!("{} {}", yellow.apply_to("Note:"), notice);
    }

    fn on_fallback(&self) {
        self.start_indicator();
    }
}

/// Print the parts of a reply the observer has not shown yet.
pub fn print_reply(reply: &AgentReply, observer: &ConsoleObserver, quiet: bool) {
    if quiet {
        println!("{}", reply.content);
        return;
    }
    if observer.streamed_text() {
        if observer.mid_line.swap(false, Ordering::Relaxed) {
            println!();
        }
    } else {
        println!("{}", reply.content);
    }

    let dim = Style::new().dim();
    if !reply.citations.is_empty() {
        println!();
        println!("{}", dim.apply_to("Citations:"));
        for (i, citation) in reply.citations.iter().enumerate() {
            println!("  {}", dim.apply_to(format!("[{}] {}", i + 1, citation)));
        }
    }
    tracing::debug!(
        transport = %reply.transport,
        tool_results = reply.tool_results.len(),
        usage = ?reply.usage,
        "reply complete"
    );
}

pub fn print_error(msg: &str) {
    let red = Style::new().red();
    eprintln!("{} {}", red.apply_to("Error:"), msg);
}

// ─────────────────────────────────────────────────────────────────────────────
// Typing indicator
// ─────────────────────────────────────────────────────────────────────────────

/// Animated "thinking..." line on stderr while a blocking call runs.
///
/// The animation stops when the indicator is stopped or dropped.
pub struct TypingIndicator {
    guard: Option<DropGuard>,
    handle: Option<JoinHandle<()>>,
}

impl TypingIndicator {
    /// Start animating, unless stderr is not a terminal.
    pub fn start(label: &str) -> Self {
        let term = Term::stderr();
        if !term.is_term() {
            return Self {
                guard: None,
                handle: None,
            };
        }

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let label = label.to_string();
        let handle = tokio::spawn(async move {
            let dim = Style::new().dim();
            let mut dots = 0;
            loop {
                let _ = term.clear_line();
                let _ = term.write_str(&format!(
                    "{}",
                    dim.apply_to(format!("{}{}", label, ".".repeat(dots)))
                ));
                dots = (dots + 1) % 4;
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = tokio::time::sleep(Duration::from_millis(400)) => {}
                }
            }
            let _ = term.clear_line();
        });

        Self {
            guard: Some(token.drop_guard()),
            handle: Some(handle),
        }
    }

    /// Stop and wait until the line is cleared.
    pub async fn stop(mut self) {
        drop(self.guard.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_indicator_stops_without_terminal() {
        // Spawns only when stderr is a terminal; stop returns either way.
        let indicator = TypingIndicator::start("Thinking");
        indicator.stop().await;
    }

    #[tokio::test]
    async fn test_dropping_guard_cancels() {
        let token = CancellationToken::new();
        let watched = token.clone();
        let indicator = TypingIndicator {
            guard: Some(token.drop_guard()),
            handle: None,
        };
        assert!(!watched.is_cancelled());
        drop(indicator);
        assert!(watched.is_cancelled());
    }

    #[tokio::test]
    async fn test_fallback_starts_indicator() {
        let observer = ConsoleObserver::new(false);
        observer.on_fallback();
        assert!(observer.indicator.lock().unwrap().is_some());

        observer.stop_indicator().await;
        assert!(observer.indicator.lock().unwrap().is_none());

        let quiet = ConsoleObserver::new(true);
        quiet.on_fallback();
        assert!(quiet.indicator.lock().unwrap().is_none());
    }

    #[test]
    fn test_observer_tracks_streamed_text() {
        let observer = ConsoleObserver::new(true);
        observer.on_text("hidden");
        assert!(!observer.streamed_text());

        let observer = ConsoleObserver::new(false);
        observer.on_text("");
        assert!(!observer.streamed_text());
        observer.on_text("hi");
        assert!(observer.streamed_text());
    }
}
