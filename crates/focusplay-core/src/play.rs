//! Play area: one mounted focus session and its alert prompt.
//!
//! Mounting spawns two independent one-second tick sources on the current
//! tokio runtime, one for the timer and one for the alert countdown. They
//! share nothing but the event channel; an open prompt never pauses the
//! timer and the timer never pauses the prompt.
//!
//! The alert source is re-phased whenever a prompt opens, so a prompt
//! always gets a full second before its first decrement.
//!
//! Unmounting (or dropping the handle) cancels both sources. After
//! `unmount().await` returns no tick can touch the controllers again.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::alert::{AlertPromptController, AlertResponse, AlertSchedule};
use crate::error::Result;
use crate::events::Event;
use crate::timer::{FocusSession, TimerMode, TimerSettings};

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Handle owned by the view that mounted the session.
pub struct PlayArea {
    session: Arc<Mutex<FocusSession>>,
    alerts: Arc<Mutex<AlertPromptController>>,
    task_name: Arc<Mutex<String>>,
    events: mpsc::UnboundedSender<Event>,
    prompt_opened: Arc<Notify>,
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl PlayArea {
    /// Mount a play area and start both tick sources.
    ///
    /// Must be called from within a tokio runtime.
    pub fn mount(
        session: FocusSession,
        alerts: AlertPromptController,
        schedule: AlertSchedule,
        task_name: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Arc::new(Mutex::new(session));
        let alerts = Arc::new(Mutex::new(alerts));
        let task_name = Arc::new(Mutex::new(task_name.into()));
        let prompt_opened = Arc::new(Notify::new());
        let cancel = CancellationToken::new();

        let timer = tokio::spawn(timer_loop(
            Arc::clone(&session),
            Arc::clone(&alerts),
            schedule,
            Arc::clone(&task_name),
            Arc::clone(&prompt_opened),
            tx.clone(),
            cancel.clone(),
        ));
        let alert = tokio::spawn(alert_loop(
            Arc::clone(&alerts),
            Arc::clone(&prompt_opened),
            tx.clone(),
            cancel.clone(),
        ));

        tracing::debug!("play area mounted");
        let area = Self {
            session,
            alerts,
            task_name,
            events: tx,
            prompt_opened,
            cancel,
            handles: vec![timer, alert],
        };
        (area, rx)
    }

    pub fn start(&self) {
        let event = lock(&self.session).start();
        self.emit(event);
    }

    pub fn pause(&self) {
        let event = lock(&self.session).pause();
        self.emit(event);
    }

    pub fn reset(&self) {
        let event = lock(&self.session).reset();
        self.emit(Some(event));
    }

    pub fn set_mode(&self, mode: TimerMode) -> Result<()> {
        let event = lock(&self.session).set_mode(mode)?;
        self.emit(Some(event));
        Ok(())
    }

    /// Apply a fresh configuration snapshot.
    ///
    /// Timer durations take effect from the next mode entry; the default
    /// response applies to the next prompt that times out.
    pub fn reconfigure(
        &self,
        settings: TimerSettings,
        default_response: AlertResponse,
    ) -> Result<()> {
        lock(&self.session).reconfigure(settings)?;
        lock(&self.alerts).set_default_response(default_response);
        Ok(())
    }

    /// Answer the open prompt.
    ///
    /// # Errors
    /// `AlertError::StaleResponse` when no prompt is open.
    pub fn respond(&self, response: AlertResponse) -> Result<()> {
        let event = lock(&self.alerts).respond(response)?;
        self.emit(Some(event));
        Ok(())
    }

    /// Open a prompt right away for the current task.
    pub fn prompt_now(&self) -> Result<()> {
        let name = lock(&self.task_name).clone();
        let event = {
            let mut alerts = lock(&self.alerts);
            let event = alerts.open(name)?;
            self.prompt_opened.notify_one();
            event
        };
        self.emit(Some(event));
        Ok(())
    }

    /// Task name used for the next scheduled prompt.
    pub fn set_task_name(&self, name: impl Into<String>) {
        *lock(&self.task_name) = name.into();
    }

    pub fn snapshot(&self) -> Event {
        let session = lock(&self.session);
        let alerts = lock(&self.alerts);
        Event::StateSnapshot {
            mode: session.mode(),
            duration_secs: session.duration_secs(),
            remaining_secs: session.remaining_secs(),
            is_running: session.is_running(),
            completed_focus_count: session.completed_focus_count(),
            alert_open: alerts.is_open(),
            alert_countdown: alerts.prompt().map(|p| p.countdown),
            at: Utc::now(),
        }
    }

    pub fn is_mounted(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Stop both tick sources and wait for them to finish.
    pub async fn unmount(mut self) {
        self.cancel.cancel();
        for handle in std::mem::take(&mut self.handles) {
            if let Err(err) = handle.await {
                tracing::warn!(%err, "tick source ended abnormally");
            }
        }
        tracing::debug!("play area unmounted");
    }

    fn emit(&self, event: Option<Event>) {
        if let Some(event) = event {
            // A dropped receiver only means nobody is watching.
            let _ = self.events.send(event);
        }
    }
}

impl Drop for PlayArea {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// First tick one period after mount, never bursts to catch up.
fn one_second_ticker() -> Interval {
    let mut ticker = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn timer_loop(
    session: Arc<Mutex<FocusSession>>,
    alerts: Arc<Mutex<AlertPromptController>>,
    mut schedule: AlertSchedule,
    task_name: Arc<Mutex<String>>,
    prompt_opened: Arc<Notify>,
    events: mpsc::UnboundedSender<Event>,
    cancel: CancellationToken,
) {
    let mut ticker = one_second_ticker();
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("timer tick source stopped");
                break;
            }
            _ = ticker.tick() => {
                let (mode, running, event) = {
                    let mut session = lock(&session);
                    let mode = session.mode();
                    let running = session.is_running();
                    (mode, running, session.tick())
                };
                if let Some(event) = event {
                    let _ = events.send(event);
                }

                if schedule.observe(mode, running) {
                    let mut alerts = lock(&alerts);
                    if alerts.is_open() {
                        tracing::debug!("alert due while one is open; skipped");
                        continue;
                    }
                    let name = lock(&task_name).clone();
                    match alerts.open(name) {
                        Ok(event) => {
                            prompt_opened.notify_one();
                            let _ = events.send(event);
                        }
                        Err(err) => tracing::warn!(%err, "scheduled alert not opened"),
                    }
                }
            }
        }
    }
}

async fn alert_loop(
    alerts: Arc<Mutex<AlertPromptController>>,
    prompt_opened: Arc<Notify>,
    events: mpsc::UnboundedSender<Event>,
    cancel: CancellationToken,
) {
    let mut ticker = one_second_ticker();
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("alert tick source stopped");
                break;
            }
            _ = prompt_opened.notified() => {
                // First decrement one full period after the prompt opened.
                ticker.reset();
            }
            _ = ticker.tick() => {
                let event = lock(&alerts).tick();
                if let Some(event) = event {
                    let _ = events.send(event);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::ResponseSource;

    fn mount(settings: TimerSettings, schedule: AlertSchedule) -> (PlayArea, mpsc::UnboundedReceiver<Event>) {
        let session = FocusSession::new(settings).unwrap();
        let alerts = AlertPromptController::new(AlertResponse::Deviated);
        PlayArea::mount(session, alerts, schedule, "Write report")
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Event>) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_only_while_running() {
        let (area, mut rx) = mount(TimerSettings::from_secs(5, 3, 10), AlertSchedule::disabled());

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert!(drain(&mut rx).is_empty());

        area.start();
        tokio::time::sleep(Duration::from_secs(2)).await;
        let events = drain(&mut rx);
        assert!(matches!(events[0], Event::TimerStarted { .. }));
        let ticks = events.iter().filter(|e| matches!(e, Event::TimerTick { .. })).count();
        assert_eq!(ticks, 2);

        area.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn completes_focus_on_schedule() {
        let (area, mut rx) = mount(TimerSettings::from_secs(3, 2, 4), AlertSchedule::disabled());
        area.start();
        tokio::time::sleep(Duration::from_millis(3500)).await;

        let completed = drain(&mut rx).into_iter().find_map(|e| match e {
            Event::ModeCompleted { next_mode, .. } => Some(next_mode),
            _ => None,
        });
        assert_eq!(completed, Some(TimerMode::ShortBreak));
        area.unmount().await;
    }

    fn alert_state(area: &PlayArea) -> (bool, Option<u32>) {
        match area.snapshot() {
            Event::StateSnapshot {
                alert_open,
                alert_countdown,
                ..
            } => (alert_open, alert_countdown),
            other => panic!("Expected StateSnapshot, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_prompt_times_out_with_default() {
        let settings = TimerSettings::from_secs(600, 60, 120);
        let (area, mut rx) = mount(settings, AlertSchedule::every_secs(7));
        area.start();

        // Opens after 7s of focus with the full countdown.
        tokio::time::sleep(Duration::from_millis(7_100)).await;
        assert_eq!(alert_state(&area), (true, Some(30)));

        tokio::time::sleep(Duration::from_millis(29_800)).await;
        assert_eq!(alert_state(&area), (true, Some(1)));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(alert_state(&area), (false, None));

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(e, Event::AlertOpened { .. })));
        let resolved: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                Event::AlertResolved { response, source, .. } => Some((*response, *source)),
                _ => None,
            })
            .collect();
        assert_eq!(resolved, vec![(AlertResponse::Deviated, ResponseSource::Timeout)]);

        // The timer kept running the whole time.
        match area.snapshot() {
            Event::StateSnapshot { is_running, remaining_secs, .. } => {
                assert!(is_running);
                assert_eq!(remaining_secs, 600 - 37);
            }
            other => panic!("Expected StateSnapshot, got {other:?}"),
        }
        area.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn manual_prompt_gets_full_countdown() {
        let (area, mut rx) = mount(TimerSettings::default(), AlertSchedule::disabled());

        tokio::time::sleep(Duration::from_millis(900)).await;
        area.prompt_now().unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(alert_state(&area), (true, Some(30)));

        tokio::time::sleep(Duration::from_millis(29_700)).await;
        assert_eq!(alert_state(&area), (true, Some(1)));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(alert_state(&area), (false, None));
        assert!(drain(&mut rx).iter().any(|e| matches!(
            e,
            Event::AlertResolved { source: ResponseSource::Timeout, .. }
        )));
        area.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn respond_reaches_open_prompt() {
        let (area, mut rx) = mount(TimerSettings::default(), AlertSchedule::disabled());
        area.set_task_name("Refactor parser");
        area.prompt_now().unwrap();
        area.respond(AlertResponse::Focused).unwrap();
        assert!(area.respond(AlertResponse::Focused).is_err());

        let events = drain(&mut rx);
        assert!(matches!(
            &events[0],
            Event::AlertOpened { task_name, .. } if task_name == "Refactor parser"
        ));
        assert!(matches!(
            events[1],
            Event::AlertResolved { source: ResponseSource::User, .. }
        ));
        area.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn reconfigure_changes_next_mode_and_default_response() {
        let (area, mut rx) = mount(TimerSettings::from_secs(2, 3, 10), AlertSchedule::disabled());
        area.reconfigure(TimerSettings::from_secs(2, 7, 10), AlertResponse::Focused)
            .unwrap();
        assert!(area
            .reconfigure(TimerSettings::from_secs(0, 7, 10), AlertResponse::Deviated)
            .is_err());

        area.start();
        area.prompt_now().unwrap();
        tokio::time::sleep(Duration::from_millis(30_500)).await;

        let events = drain(&mut rx);
        let next_duration = events.iter().find_map(|e| match e {
            Event::ModeCompleted { next_duration_secs, .. } => Some(*next_duration_secs),
            _ => None,
        });
        assert_eq!(next_duration, Some(7));
        assert!(events.iter().any(|e| matches!(
            e,
            Event::AlertResolved { response: AlertResponse::Focused, source: ResponseSource::Timeout, .. }
        )));
        area.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_stops_all_ticks() {
        let (area, mut rx) = mount(TimerSettings::from_secs(60, 5, 10), AlertSchedule::disabled());
        area.start();
        area.prompt_now().unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        let session = Arc::clone(&area.session);
        let alerts = Arc::clone(&area.alerts);
        area.unmount().await;
        drain(&mut rx);

        let remaining = lock(&session).remaining_secs();
        let countdown = lock(&alerts).prompt().map(|p| p.countdown);
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(lock(&session).remaining_secs(), remaining);
        assert_eq!(lock(&alerts).prompt().map(|p| p.countdown), countdown);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels_tick_sources() {
        let (area, _rx) = mount(TimerSettings::from_secs(60, 5, 10), AlertSchedule::disabled());
        let token = area.cancel.clone();
        assert!(area.is_mounted());
        drop(area);
        assert!(token.is_cancelled());
    }
}
