// Streaming Coordinator - Per-connection simulation loop
// Drives one session at a fixed frame rate while control messages keep flowing.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};

use crate::error::{IntegratorError, ProtocolError};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::scenario::GeneratedScenario;
use crate::scenario_pipeline::ScenarioPipeline;
use crate::session::{PlayState, SimulationSession};

pub const MIN_FPS: u32 = 1;
pub const MAX_FPS: u32 = 60;

pub fn clamp_fps(fps: u32) -> u32 {
    fps.clamp(MIN_FPS, MAX_FPS)
}

/// Client-supplied rate, rounded and clamped; non-finite gives the minimum
pub fn requested_fps(fps: f64) -> u32 {
    if !fps.is_finite() {
        return MIN_FPS;
    }
    fps.round().clamp(MIN_FPS as f64, MAX_FPS as f64) as u32
}

fn frame_interval(fps: u32) -> Interval {
    let mut interval = tokio::time::interval(Duration::from_secs_f64(1.0 / clamp_fps(fps) as f64));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

struct PendingStart {
    task: JoinHandle<GeneratedScenario>,
    fps: u32,
}

/// Outcome of handling one event
enum Flow {
    Continue,
    /// The outbound side is gone
    Closed,
}

struct Connection {
    pipeline: Arc<ScenarioPipeline>,
    outbound: mpsc::Sender<ServerMessage>,
    default_fps: u32,
    session: Option<SimulationSession>,
    pending: Option<PendingStart>,
    ticker: Interval,
}

impl Connection {
    async fn send(&self, message: ServerMessage) -> Flow {
        match self.outbound.send(message).await {
            Ok(()) => Flow::Continue,
            Err(_) => Flow::Closed,
        }
    }

    fn is_playing(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.play_state() == PlayState::Playing)
    }

    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.task.abort();
            tracing::debug!("Aborted in-flight scenario generation");
        }
    }

    fn discard_session(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::info!(session = %session.id(), "Session discarded");
        }
    }

    async fn handle_text(&mut self, text: &str) -> Flow {
        match ClientMessage::parse(text) {
            Ok(message) => self.handle_message(message).await,
            Err(e) => {
                tracing::debug!(error = %e, "Rejected client message");
                self.send(ServerMessage::error(e.to_string())).await
            }
        }
    }

    async fn handle_message(&mut self, message: ClientMessage) -> Flow {
        tracing::debug!(?message, "Client message");

        if let ClientMessage::Start { prompt, fps } = message {
            self.cancel_pending();
            self.discard_session();

            let fps = fps.map_or(self.default_fps, requested_fps);
            let pipeline = Arc::clone(&self.pipeline);
            let status = format!("Generating scenario: {}", prompt);
            let task = tokio::spawn(async move { pipeline.generate(&prompt).await });
            self.pending = Some(PendingStart { task, fps });
            return self.send(ServerMessage::status(status)).await;
        }

        if message == ClientMessage::Stop {
            self.cancel_pending();
            self.discard_session();
            return self.send(ServerMessage::status("Simulation stopped")).await;
        }

        let Some(session) = self.session.as_mut() else {
            return self.send(ServerMessage::error(ProtocolError::NoSession.to_string())).await;
        };

        let reply = match message {
            ClientMessage::Pause => {
                session.pause();
                ServerMessage::status("Paused")
            }
            ClientMessage::Resume => {
                session.resume();
                ServerMessage::status("Resumed")
            }
            ClientMessage::Reset => {
                session.reset();
                let frame = session.current_frame();
                if let Flow::Closed = self.send(ServerMessage::status("Simulation reset")).await {
                    return Flow::Closed;
                }
                ServerMessage::frame(frame)
            }
            ClientMessage::SetSpeed { multiplier } => {
                let speed = session.set_speed(multiplier);
                ServerMessage::status(format!("Speed set to {}x", speed))
            }
            ClientMessage::GetElements => ServerMessage::elements(session.orbital_elements()),
            ClientMessage::Start { .. } | ClientMessage::Stop => return Flow::Continue,
        };
        self.send(reply).await
    }

    async fn finish_start(&mut self, result: Result<GeneratedScenario, tokio::task::JoinError>, fps: u32) -> Flow {
        let generated = match result {
            Ok(generated) => generated,
            Err(e) if e.is_cancelled() => return Flow::Continue,
            Err(e) => {
                tracing::error!(error = %e, "Scenario generation task failed");
                return self.send(ServerMessage::error("Scenario generation failed")).await;
            }
        };

        let mut session = SimulationSession::new(generated.scenario);
        session.play();
        tracing::info!(
            session = %session.id(),
            scenario = %session.scenario().name,
            source = generated.source.as_str(),
            fps,
            "Session started"
        );

        let scenario_message = ServerMessage::scenario(&session, generated.source, generated.issues);
        let first_frame = ServerMessage::frame(session.current_frame());
        self.session = Some(session);
        self.ticker = frame_interval(fps);
        // The first tick fires immediately; skip it so frame 0 leads
        self.ticker.reset();

        if let Flow::Closed = self.send(scenario_message).await {
            return Flow::Closed;
        }
        self.send(first_frame).await
    }

    async fn tick(&mut self) -> Flow {
        let Some(mut session) = self.session.take() else {
            return Flow::Continue;
        };

        let joined = tokio::task::spawn_blocking(move || {
            let result = session.advance();
            (session, result)
        })
        .await;

        let (session, result) = match joined {
            Ok(pair) => pair,
            Err(e) => {
                let error = IntegratorError::Task(e.to_string());
                tracing::error!(error = %error, "Integration task lost the session");
                return self.send(ServerMessage::error(format!("Simulation stopped: {}", error))).await;
            }
        };
        self.session = Some(session);

        match result {
            Ok(Some(frame)) => self.send(ServerMessage::frame(frame)).await,
            Ok(None) => Flow::Continue,
            Err(e) => self.send(ServerMessage::error(format!("Simulation stopped: {}", e))).await,
        }
    }
}

async fn join_pending(pending: &mut Option<PendingStart>) -> Option<(Result<GeneratedScenario, tokio::task::JoinError>, u32)> {
    let pending = pending.as_mut()?;
    let result = (&mut pending.task).await;
    Some((result, pending.fps))
}

/// Serve one connection until the inbound channel closes or the outbound side hangs up
pub async fn run_connection(
    pipeline: Arc<ScenarioPipeline>,
    default_fps: u32,
    mut inbound: mpsc::Receiver<String>,
    outbound: mpsc::Sender<ServerMessage>,
) {
    let default_fps = clamp_fps(default_fps);
    let mut connection = Connection {
        pipeline,
        outbound,
        default_fps,
        session: None,
        pending: None,
        ticker: frame_interval(default_fps),
    };

    loop {
        let playing = connection.is_playing();
        let has_pending = connection.pending.is_some();

        let flow = tokio::select! {
            message = inbound.recv() => match message {
                Some(text) => connection.handle_text(&text).await,
                None => break,
            },
            Some((result, fps)) = join_pending(&mut connection.pending), if has_pending => {
                connection.pending = None;
                connection.finish_start(result, fps).await
            }
            _ = connection.ticker.tick(), if playing => connection.tick().await,
        };

        if let Flow::Closed = flow {
            break;
        }
    }

    connection.cancel_pending();
    connection.discard_session();
    tracing::debug!("Connection loop finished");
}
