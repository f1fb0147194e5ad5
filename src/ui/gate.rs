use tokio::sync::oneshot;

use crate::core::events::Outcome;

/// One-shot completion pair: the bridge fires the signal exactly once when
/// the terminal event lands, the main flow blocks on the gate.
pub fn completion_gate() -> (CompletionSignal, CompletionGate) {
    let (tx, rx) = oneshot::channel();
    (CompletionSignal { tx: Some(tx) }, CompletionGate { rx })
}

pub struct CompletionSignal {
    tx: Option<oneshot::Sender<Outcome>>,
}

impl CompletionSignal {
    /// Open the gate. Calls after the first are ignored.
    pub fn signal(&mut self, outcome: Outcome) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(outcome);
        }
    }

    pub fn is_signaled(&self) -> bool {
        self.tx.is_none()
    }
}

pub struct CompletionGate {
    rx: oneshot::Receiver<Outcome>,
}

impl CompletionGate {
    /// Block until the signal fires. A dropped signal counts as failure so
    /// a crashed producer cannot hang the process.
    pub async fn wait(self) -> Outcome {
        self.rx
            .await
            .unwrap_or_else(|_| Outcome::Failure("completion signal dropped".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signal_wakes_the_waiter_with_the_outcome() {
        let (mut signal, gate) = completion_gate();
        signal.signal(Outcome::Success);
        assert!(signal.is_signaled());
        assert_eq!(gate.wait().await, Outcome::Success);
    }

    #[tokio::test]
    async fn second_signal_is_ignored() {
        let (mut signal, gate) = completion_gate();
        signal.signal(Outcome::Failure("first".to_string()));
        signal.signal(Outcome::Success);
        assert_eq!(gate.wait().await, Outcome::Failure("first".to_string()));
    }

    #[tokio::test]
    async fn dropped_signal_resolves_to_failure() {
        let (signal, gate) = completion_gate();
        drop(signal);
        assert!(matches!(gate.wait().await, Outcome::Failure(_)));
    }
}
