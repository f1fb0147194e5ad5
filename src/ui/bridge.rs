use std::path::PathBuf;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::core::events::{Outcome, TaskEvent};
use crate::core::model::ProgressSnapshot;
use crate::ui::gate::CompletionSignal;
use crate::ui::notify::NotificationSink;
use crate::ui::render::Renderer;

/// Status label shown while progress events arrive, and for the idle frame
/// rendered before the first one.
pub const STATUS_DOWNLOADING: &str = "downloading...";

const NOTIFY_TITLE: &str = "Download Completed";

/// Consumes engine events in arrival order and turns them into terminal
/// output, the completion notification and the gate signal. The bridge
/// task is the only owner of the renderer, so renders never overlap.
pub struct EventBridge {
    renderer: Renderer,
    sink: Box<dyn NotificationSink>,
    signal: CompletionSignal,
    save_path: PathBuf,
    icon: Option<PathBuf>,
    done_label: String,
    fail_label: String,
    last_snapshot: ProgressSnapshot,
    finished: bool,
}

impl EventBridge {
    pub fn new(
        renderer: Renderer,
        sink: Box<dyn NotificationSink>,
        signal: CompletionSignal,
        save_path: PathBuf,
        icon: Option<PathBuf>,
        done_label: &str,
        fail_label: &str,
    ) -> Self {
        Self {
            renderer,
            sink,
            signal,
            save_path,
            icon,
            done_label: done_label.to_string(),
            fail_label: fail_label.to_string(),
            last_snapshot: ProgressSnapshot::idle(),
            finished: false,
        }
    }

    /// Drain the event channel until the producer hangs up.
    pub async fn run(mut self, mut events: mpsc::Receiver<TaskEvent>) {
        while let Some(event) = events.recv().await {
            self.on_event(event);
        }
    }

    pub fn on_event(&mut self, event: TaskEvent) {
        // The engine must not emit anything past the terminal event; if it
        // does anyway, drop it instead of corrupting the final lines.
        if self.finished {
            debug!(?event, "event after terminal, ignored");
            return;
        }

        match event {
            TaskEvent::Progress(snapshot) => {
                self.last_snapshot = snapshot;
                let _ = self.renderer.render(STATUS_DOWNLOADING, &snapshot);
            }
            TaskEvent::Terminal(outcome) => self.on_terminal(outcome),
        }
    }

    fn on_terminal(&mut self, outcome: Outcome) {
        let status = if outcome.is_success() {
            self.done_label.clone()
        } else {
            self.fail_label.clone()
        };
        let _ = self.renderer.render(&status, &self.last_snapshot);

        let closing = match &outcome {
            Outcome::Success => format!("saving path: {}", self.save_path.display()),
            Outcome::Failure(reason) => format!("reason: {reason}"),
        };
        let _ = self.renderer.finish(&closing);

        let body = format!("Your file download is {status}");
        if let Err(e) = self.sink.notify(NOTIFY_TITLE, &body, self.icon.as_deref()) {
            warn!(error = %e, "failed to deliver completion notification");
        }

        self.signal.signal(outcome);
        self.finished = true;
    }
}
