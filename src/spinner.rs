//! Pending indicator shown while the agent is working on a reply.

use std::io::Write;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Loading dots, one more per frame.
const FRAMES: &[&str] = &["   ", ".  ", ".. ", "..."];

const INTERVAL: Duration = Duration::from_millis(300);

/// Animates `AGENT <dots>` on stderr until stopped.
///
/// Stderr keeps the indicator out of anything piped from stdout.
pub struct Pending {
    handle: JoinHandle<()>,
    stop: watch::Sender<bool>,
}

impl Pending {
    pub fn start(label: &str) -> Self {
        let (stop, mut stopped) = watch::channel(false);
        let label = label.to_string();

        let handle = tokio::spawn(async move {
            for frame in FRAMES.iter().cycle() {
                eprint!("\x1b[2K\r{label} {frame}");
                let _ = std::io::stderr().flush();

                tokio::select! {
                    _ = tokio::time::sleep(INTERVAL) => {}
                    _ = stopped.changed() => break,
                }
            }
            eprint!("\x1b[2K\r");
            let _ = std::io::stderr().flush();
        });

        Self { handle, stop }
    }

    /// Stop animating and clear the line.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_share_a_width() {
        let width = FRAMES[0].len();
        assert!(FRAMES.iter().all(|f| f.len() == width));
    }

    #[tokio::test]
    async fn stops_after_animating() {
        let pending = Pending::start("AGENT");
        tokio::time::sleep(Duration::from_millis(350)).await;
        pending.stop().await;
    }

    #[tokio::test]
    async fn stops_immediately() {
        Pending::start("AGENT").stop().await;
    }
}
