//! Live-reload notification channel.
//!
//! Tasks publish [`ReloadEvent`]s; the dev server forwards them to every
//! connected browser as server-sent events. Publishing never blocks and
//! succeeds when nobody is listening.

use tokio::sync::broadcast;

/// Path of the server-sent events endpoint the injected client subscribes to.
pub const CLIENT_PATH: &str = "/__sitepipe/livereload";

const CHANNEL_CAPACITY: usize = 64;

/// Script injected into served HTML pages.
pub const CLIENT_SCRIPT: &str = r#"<script>
(function () {
  var source = new EventSource("/__sitepipe/livereload");
  source.addEventListener("reload", function () { location.reload(); });
  source.addEventListener("css", function () {
    var links = document.querySelectorAll('link[rel="stylesheet"]');
    var stamp = Date.now();
    for (var i = 0; i < links.length; i++) {
      var href = links[i].getAttribute("href");
      if (!href || /^(https?:)?\/\//.test(href)) continue;
      links[i].setAttribute("href", href.replace(/[?&]__sitepipe=\d+/, "") +
        (href.indexOf("?") < 0 ? "?" : "&") + "__sitepipe=" + stamp);
    }
  });
})();
</script>"#;

/// Something changed that connected browsers should pick up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadEvent {
    /// Reload the whole page
    Full,
    /// Re-fetch stylesheets; paths are relative to the server root
    Css(Vec<String>),
}

impl ReloadEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            ReloadEvent::Full => "reload",
            ReloadEvent::Css(_) => "css",
        }
    }

    /// SSE payload. Never empty: browsers drop events without data.
    pub fn data(&self) -> String {
        match self {
            ReloadEvent::Full => "reload".to_string(),
            ReloadEvent::Css(paths) if paths.is_empty() => "*".to_string(),
            ReloadEvent::Css(paths) => paths.join("\n"),
        }
    }
}

/// Broadcast sender shared by tasks, the watcher and the dev server.
#[derive(Debug, Clone)]
pub struct LiveReload {
    sender: broadcast::Sender<ReloadEvent>,
}

impl LiveReload {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.sender.subscribe()
    }

    /// Publish an event, returning how many subscribers received it.
    pub fn notify(&self, event: ReloadEvent) -> usize {
        tracing::debug!(event = event.name(), "live reload");
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LiveReload {
    fn default() -> Self {
        Self::new()
    }
}

/// Insert the client script before `</body>`, or append it when there is none.
pub fn inject_client(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    match lower.rfind("</body>") {
        Some(index) => {
            let mut out = String::with_capacity(html.len() + CLIENT_SCRIPT.len());
            out.push_str(&html[..index]);
            out.push_str(CLIENT_SCRIPT);
            out.push_str(&html[index..]);
            out
        }
        None => format!("{}{}", html, CLIENT_SCRIPT),
    }
}
