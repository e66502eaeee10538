//! The tilt/lift state machine.
//!
//! One `SlattedBlind` per physical device. There is no position feedback:
//! every operation issues fire-and-forget commands, waits the configured
//! travel time, and then commits the position it expects the hardware to
//! have reached. Interruption is cooperative: a long operation re-checks the
//! shared state after its wait and commits only if no other operation
//! superseded it in the meantime. The inner mutex is never held across a
//! timed wait, so re-entrant calls arriving mid-travel are well defined.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tokio::time::{Duration, Instant, sleep};
use tracing::{debug, info, warn};

use crate::position::{
    BLIND_POS_CLOSED, BLIND_POS_OPEN, BLIND_POS_STOPPED, BLIND_POS_TILTED_MAX, lift_percent_for,
    percent_from_steps, steps_from_percent,
};
use crate::variant::{BlindVariant, VariantConfig};

/// Two stop taps within this window arm auto-step mode.
pub const AUTO_STEP_CLICK: Duration = Duration::from_secs(2);
/// Position/tilt requests repeated within this window are treated as
/// physical button bounce and dropped.
pub const COMMAND_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverState {
    Open,
    Opening,
    Closed,
    Closing,
}

/// What the facade reports and the state store persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverSnapshot {
    pub state: CoverState,
    /// Derived lift percentage (0, 1, 50 or 100).
    pub position: u8,
    /// Derived tilt percentage (0..=100, 50 = mid/home).
    pub tilt_position: u8,
}

struct BlindState {
    state: CoverState,
    /// Raw lift bucket: BLIND_POS_CLOSED / _STOPPED / _OPEN.
    lift: u8,
    tilt_step: u16,
    last_command: Instant,
    last_stop: Instant,
    auto_step_armed: bool,
    auto_step_direction: i8,
}

impl BlindState {
    fn in_motion(&self) -> bool {
        matches!(self.state, CoverState::Opening | CoverState::Closing)
    }
}

fn snapshot_of(st: &BlindState, mid_steps: u16) -> CoverSnapshot {
    CoverSnapshot {
        state: st.state,
        position: lift_percent_for(st.lift, st.tilt_step),
        tilt_position: percent_from_steps(st.tilt_step, mid_steps),
    }
}

#[derive(Clone)]
pub struct SlattedBlind {
    device_id: String,
    config: VariantConfig,
    variant: Arc<dyn BlindVariant>,
    inner: Arc<Mutex<BlindState>>,
    changes: watch::Sender<CoverSnapshot>,
}

enum PositionPlan {
    Ignore,
    Close,
    Mid,
    Open,
}

enum TiltPlan {
    Ignore,
    Mid,
    Move { steps: i32, from: u16 },
}

enum StepPlan {
    AutoRun,
    AutoDisarm,
    Single(u16),
    CloseOut,
    Nothing,
}

impl SlattedBlind {
    pub fn new(
        device_id: impl Into<String>,
        config: VariantConfig,
        variant: Arc<dyn BlindVariant>,
    ) -> Self {
        // Absent a snapshot, a lifting blind is assumed raised and a
        // static one down in the window, slats at home.
        let (state, lift) = if config.has_lift {
            (CoverState::Open, BLIND_POS_OPEN)
        } else {
            (CoverState::Closed, BLIND_POS_CLOSED)
        };
        let now = Instant::now();
        let st = BlindState {
            state,
            lift,
            tilt_step: config.mid_steps,
            last_command: now,
            last_stop: now,
            auto_step_armed: false,
            auto_step_direction: 0,
        };
        let (changes, _) = watch::channel(snapshot_of(&st, config.mid_steps));
        Self {
            device_id: device_id.into(),
            config,
            variant,
            inner: Arc::new(Mutex::new(st)),
            changes,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn config(&self) -> &VariantConfig {
        &self.config
    }

    /// Subscribes to state changes; the facade persists off this channel.
    pub fn changes(&self) -> watch::Receiver<CoverSnapshot> {
        self.changes.subscribe()
    }

    pub fn current(&self) -> CoverSnapshot {
        *self.changes.borrow()
    }

    /// Seeds the machine from a recovered snapshot. Only called at attach,
    /// before any command is in flight.
    pub async fn restore(&self, state: CoverState, lift: u8, tilt_step: u16) {
        let mut st = self.inner.lock().await;
        st.state = state;
        st.lift = lift;
        st.tilt_step = tilt_step.min(self.config.max_steps());
        info!(
            device = %self.device_id,
            "Recovered state={:?} lift={} tilt={}", st.state, st.lift, st.tilt_step
        );
        self.publish(&st);
    }

    /// Opens the blind by recalling the mid position. Lift commands would
    /// pull the whole blind out of the window, so "open" means "slats at
    /// the resting angle".
    pub async fn open(&self) {
        info!(device = %self.device_id, "Open requested");
        if self.is_in_motion().await {
            debug!(device = %self.device_id, "Blind is in motion - ignoring request");
            return;
        }
        self.set_mid_position().await;
    }

    /// Fully closes the blind. Always re-drives the close even when the
    /// state already says closed-but-tilted, so the position re-anchors.
    pub async fn close(&self) {
        info!(device = %self.device_id, "Close requested");
        let long = {
            let mut st = self.inner.lock().await;
            if st.in_motion() {
                debug!(device = %self.device_id, "Blind is in motion - ignoring request");
                return;
            }
            let long = st.state == CoverState::Open
                || (st.state == CoverState::Closed && st.lift != BLIND_POS_CLOSED);
            st.state = CoverState::Closing;
            if long {
                // Optimistic interim report while the blind travels.
                st.lift = BLIND_POS_STOPPED;
                st.tilt_step = 0;
                self.publish(&st);
            }
            long
        };

        if let Err(e) = self.variant.close_blind().await {
            warn!(device = %self.device_id, "Close transmission failed: {e}");
        }

        if long {
            debug!(device = %self.device_id, "Waiting close secs {}", self.config.close_secs);
            sleep(self.config.close_duration()).await;
        }

        let mut st = self.inner.lock().await;
        if st.state == CoverState::Closing {
            info!(device = %self.device_id, "Finished closing - marking blind closed");
            st.state = CoverState::Closed;
            st.lift = BLIND_POS_CLOSED;
            st.tilt_step = 0;
            self.publish(&st);
        } else {
            info!(
                device = %self.device_id,
                "Close superseded - leaving state as {:?}", st.state
            );
        }
    }

    /// Stops a moving lift. The resulting height is unknowable beyond
    /// "somewhere in between", so the position becomes the stopped bucket.
    pub async fn stop(&self) {
        info!(device = %self.device_id, "Stop requested");
        if !self.config.has_lift {
            info!(device = %self.device_id, "Blind does not lift - ignoring request");
            return;
        }
        if !self.is_in_motion().await {
            debug!(device = %self.device_id, "Blind is stationary - ignoring request");
            return;
        }

        if let Err(e) = self.variant.stop_blind().await {
            warn!(device = %self.device_id, "Stop transmission failed: {e}");
        }

        let mut st = self.inner.lock().await;
        st.state = CoverState::Open;
        st.lift = BLIND_POS_STOPPED;
        st.tilt_step = 0;
        self.publish(&st);
    }

    /// Moves the lift. Below the mid band this is a close, inside it a mid
    /// recall; only a full 100 actually raises the blind out of the window.
    pub async fn set_position(&self, percent: u8) {
        let percent = percent.min(100);
        info!(device = %self.device_id, "Set position {percent} requested");

        if !self.config.has_lift {
            debug!(device = %self.device_id, "No lift - treating position request as tilt");
            return self.set_tilt_position(percent).await;
        }

        let plan = {
            let mut st = self.inner.lock().await;
            if st.in_motion() {
                debug!(device = %self.device_id, "Blind is in motion - ignoring request");
                PositionPlan::Ignore
            } else if self.should_debounce(&mut st) {
                info!(device = %self.device_id, "Duplicate command - ignoring request");
                PositionPlan::Ignore
            } else if percent < BLIND_POS_STOPPED {
                PositionPlan::Close
            } else if percent <= BLIND_POS_TILTED_MAX {
                PositionPlan::Mid
            } else {
                st.state = CoverState::Opening;
                st.lift = BLIND_POS_STOPPED;
                st.tilt_step = 0;
                self.publish(&st);
                PositionPlan::Open
            }
        };

        match plan {
            PositionPlan::Ignore => {}
            PositionPlan::Close => self.close().await,
            PositionPlan::Mid => self.set_mid_position().await,
            PositionPlan::Open => {
                if let Err(e) = self.variant.open_blind().await {
                    warn!(device = %self.device_id, "Open transmission failed: {e}");
                }
                debug!(device = %self.device_id, "Waiting open secs {}", self.config.open_secs);
                sleep(self.config.open_duration()).await;

                let mut st = self.inner.lock().await;
                if st.state == CoverState::Opening {
                    info!(device = %self.device_id, "Finished opening - marking blind open");
                    st.state = CoverState::Open;
                    st.lift = BLIND_POS_OPEN;
                    st.tilt_step = self.config.max_steps();
                    self.publish(&st);
                } else {
                    info!(
                        device = %self.device_id,
                        "Open superseded - leaving state as {:?}", st.state
                    );
                }
            }
        }
    }

    /// Tilts the slats to a percentage. From a lift-indeterminate state the
    /// only safe anchor is the mid recall.
    pub async fn set_tilt_position(&self, percent: u8) {
        let percent = percent.min(100);
        info!(device = %self.device_id, "Set tilt {percent} requested");
        {
            let mut st = self.inner.lock().await;
            if st.in_motion() {
                debug!(device = %self.device_id, "Blind is in motion - ignoring request");
                return;
            }
            if self.should_debounce(&mut st) {
                info!(device = %self.device_id, "Duplicate command - ignoring request");
                return;
            }
        }

        let target = steps_from_percent(percent, self.config.mid_steps, self.config.max_steps());
        if target == self.config.mid_steps {
            debug!(device = %self.device_id, "Tilt lands on the mid point - recalling mid");
            return self.set_mid_position().await;
        }
        self.tilt_to_target(target).await;
    }

    /// Recalls the mid/home position. From a travelling-capable state this
    /// is a long operation with the same interruption contract as close.
    pub async fn set_mid_position(&self) {
        info!(device = %self.device_id, "Mid position requested");
        let long = {
            let mut st = self.inner.lock().await;
            if st.in_motion() {
                debug!(device = %self.device_id, "Blind is in motion - ignoring request");
                return;
            }
            let long = st.state == CoverState::Open
                || (st.state == CoverState::Closed && st.lift != BLIND_POS_CLOSED);
            if long {
                st.state = CoverState::Closing;
                st.lift = BLIND_POS_STOPPED;
                st.tilt_step = 0;
                self.publish(&st);
            }
            long
        };

        if let Err(e) = self.variant.tilt_to_mid().await {
            warn!(device = %self.device_id, "Mid transmission failed: {e}");
        }

        if long {
            debug!(device = %self.device_id, "Waiting close secs {}", self.config.close_secs);
            sleep(self.config.close_duration()).await;

            let mut st = self.inner.lock().await;
            if st.state == CoverState::Closing {
                info!(device = %self.device_id, "Finished setting mid position");
                st.state = CoverState::Closed;
                st.lift = BLIND_POS_CLOSED;
                st.tilt_step = self.config.mid_steps;
                self.publish(&st);
            } else {
                info!(
                    device = %self.device_id,
                    "Mid superseded - leaving state as {:?}", st.state
                );
            }
        } else {
            let mut st = self.inner.lock().await;
            st.lift = BLIND_POS_CLOSED;
            st.tilt_step = self.config.mid_steps;
            self.publish(&st);
        }
    }

    /// One tilt step towards open, or a repeated run in auto-step mode.
    pub async fn open_tilt(&self) {
        self.tilt_step_command(1).await;
    }

    /// One tilt step towards closed; at the boundary this closes the blind.
    pub async fn close_tilt(&self) {
        self.tilt_step_command(-1).await;
    }

    /// Records the stop tap; two taps within the click window arm
    /// auto-step (hold-to-move) for the next tilt direction command.
    pub async fn stop_tilt(&self) {
        let mut st = self.inner.lock().await;
        let last = st.last_stop;
        let now = Instant::now();
        st.last_stop = now;
        st.auto_step_armed = now.duration_since(last) < AUTO_STEP_CLICK;
        if st.auto_step_armed {
            st.auto_step_direction = 0;
            info!(device = %self.device_id, "Enabled auto advance of tilt");
        } else {
            info!(device = %self.device_id, "Disabled auto advance of tilt");
        }
    }

    async fn tilt_step_command(&self, direction: i8) {
        debug!(device = %self.device_id, "Tilt step requested, direction {direction}");
        let plan = {
            let mut st = self.inner.lock().await;
            if st.auto_step_armed {
                st.auto_step_direction = direction;
                if st.last_stop.elapsed() < AUTO_STEP_CLICK {
                    StepPlan::AutoRun
                } else {
                    StepPlan::AutoDisarm
                }
            } else if direction > 0 {
                if st.tilt_step < self.config.max_steps() {
                    StepPlan::Single(st.tilt_step + 1)
                } else {
                    StepPlan::Nothing
                }
            } else if st.tilt_step > 0 {
                StepPlan::Single(st.tilt_step - 1)
            } else {
                StepPlan::CloseOut
            }
        };

        match plan {
            StepPlan::AutoRun => {
                info!(device = %self.device_id, "Auto stepping tilt, direction {direction}");
                loop {
                    let next = {
                        let st = self.inner.lock().await;
                        if !st.auto_step_armed || st.auto_step_direction != direction {
                            None
                        } else if direction > 0 && st.tilt_step < self.config.max_steps() {
                            Some(st.tilt_step + 1)
                        } else if direction < 0 && st.tilt_step > 0 {
                            Some(st.tilt_step - 1)
                        } else {
                            None
                        }
                    };
                    let Some(next) = next else { break };
                    self.tilt_to_target(next).await;

                    let at_boundary = {
                        let st = self.inner.lock().await;
                        (direction > 0 && st.tilt_step >= self.config.max_steps())
                            || (direction < 0 && st.tilt_step == 0)
                    };
                    if at_boundary {
                        break;
                    }
                    sleep(self.config.step_duration()).await;
                }
                self.inner.lock().await.auto_step_armed = false;
            }
            StepPlan::AutoDisarm => {
                info!(device = %self.device_id, "Auto step window expired - disarming");
                self.inner.lock().await.auto_step_armed = false;
            }
            StepPlan::Single(target) => self.tilt_to_target(target).await,
            StepPlan::CloseOut => {
                debug!(device = %self.device_id, "Tilt already at the closed end - closing");
                self.close().await;
            }
            StepPlan::Nothing => {
                debug!(device = %self.device_id, "Tilt already at the open end");
            }
        }
    }

    /// Drives the slats to a step index. Shared by the public tilt request
    /// and the auto-step loop, so it does not debounce.
    async fn tilt_to_target(&self, target: u16) {
        let plan = {
            let st = self.inner.lock().await;
            if st.in_motion() {
                TiltPlan::Ignore
            } else if st.state == CoverState::Open
                || (st.state == CoverState::Closed && st.lift != BLIND_POS_CLOSED)
            {
                TiltPlan::Mid
            } else {
                let steps = i32::from(target) - i32::from(st.tilt_step);
                if steps == 0 {
                    TiltPlan::Ignore
                } else {
                    TiltPlan::Move {
                        steps,
                        from: st.tilt_step,
                    }
                }
            }
        };

        match plan {
            TiltPlan::Ignore => {
                debug!(device = %self.device_id, "Nothing to tilt");
            }
            TiltPlan::Mid => {
                debug!(
                    device = %self.device_id,
                    "Lift position is indeterminate - recalling mid instead"
                );
                self.set_mid_position().await;
            }
            TiltPlan::Move { mut steps, from } => {
                let mid = i32::from(self.config.mid_steps);
                if self.config.sync_mid_position {
                    let from_i = i32::from(from);
                    let target_i = i32::from(target);
                    if steps < 0 && target_i < mid && from_i > mid {
                        steps += from_i - mid;
                        info!(
                            device = %self.device_id,
                            "Tilt crosses mid from high - syncing; steps remaining={steps}"
                        );
                        self.set_mid_position().await;
                    } else if steps > 0 && target_i > mid && from_i < mid {
                        steps -= mid - from_i;
                        info!(
                            device = %self.device_id,
                            "Tilt crosses mid from low - syncing; steps remaining={steps}"
                        );
                        self.set_mid_position().await;
                    }
                }

                info!(device = %self.device_id, "Tilting target={target} from={from} steps={steps}");
                let applied = match self.variant.tilt_to_step(steps, target).await {
                    Ok(applied) => applied,
                    Err(e) => {
                        // No feedback loop exists; keep the planned position.
                        warn!(device = %self.device_id, "Tilt transmission failed: {e}");
                        target
                    }
                };
                let mut st = self.inner.lock().await;
                st.tilt_step = applied.min(self.config.max_steps());
                self.publish(&st);
            }
        }
    }

    async fn is_in_motion(&self) -> bool {
        self.inner.lock().await.in_motion()
    }

    /// Updates the debounce clock; true when the call is button bounce.
    fn should_debounce(&self, st: &mut BlindState) -> bool {
        let last = st.last_command;
        let now = Instant::now();
        st.last_command = now;
        now.duration_since(last) <= COMMAND_DEBOUNCE
    }

    fn publish(&self, st: &BlindState) {
        self.changes
            .send_replace(snapshot_of(st, self.config.mid_steps));
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use crate::transport::TransportError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum VariantCall {
        Open,
        Close,
        Stop,
        Mid,
        Tilt(i32, u16),
    }

    /// Records every strategy call; optionally fails all transmissions.
    #[derive(Clone, Default)]
    pub struct FakeVariant {
        pub calls: Arc<StdMutex<Vec<VariantCall>>>,
        pub should_fail: Arc<AtomicBool>,
    }

    impl FakeVariant {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing() -> Self {
            Self {
                should_fail: Arc::new(AtomicBool::new(true)),
                ..Default::default()
            }
        }

        pub fn calls(&self) -> Vec<VariantCall> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: VariantCall) -> Result<(), TransportError> {
            self.calls.lock().unwrap().push(call);
            if self.should_fail.load(Ordering::Relaxed) {
                Err(TransportError::Publish("fake failure".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl BlindVariant for FakeVariant {
        async fn tilt_to_step(&self, steps: i32, target: u16) -> Result<u16, TransportError> {
            self.record(VariantCall::Tilt(steps, target))?;
            Ok(target)
        }

        async fn open_blind(&self) -> Result<(), TransportError> {
            self.record(VariantCall::Open)
        }

        async fn close_blind(&self) -> Result<(), TransportError> {
            self.record(VariantCall::Close)
        }

        async fn stop_blind(&self) -> Result<(), TransportError> {
            self.record(VariantCall::Stop)
        }

        async fn tilt_to_mid(&self) -> Result<(), TransportError> {
            self.record(VariantCall::Mid)
        }
    }

    pub fn lifting_config(mid_steps: u16, sync_mid: bool) -> VariantConfig {
        VariantConfig {
            mid_steps,
            has_mid_command: true,
            has_lift: true,
            sync_mid_position: sync_mid,
            open_secs: 1,
            close_secs: 1,
            step_millis: 500,
            signal_repetitions: 1,
            eu_mode: false,
        }
    }

    pub fn static_config(mid_steps: u16) -> VariantConfig {
        VariantConfig {
            has_lift: false,
            ..lifting_config(mid_steps, false)
        }
    }

    /// Builds a blind on a fake variant and steps the virtual clock past
    /// the construction-time debounce window.
    pub async fn new_blind(config: VariantConfig) -> (SlattedBlind, FakeVariant) {
        let fake = FakeVariant::new();
        let blind = SlattedBlind::new("test-blind", config, Arc::new(fake.clone()));
        sleep(Duration::from_secs(1)).await;
        (blind, fake)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FakeVariant, VariantCall, lifting_config, new_blind, static_config};
    use super::*;
    use crate::position::{BLIND_POS_TILTED_MIN, TILT_POS_OPEN};

    #[tokio::test(start_paused = true)]
    async fn test_close_from_open() {
        let (blind, fake) = new_blind(lifting_config(2, false)).await;
        blind.close().await;

        let snap = blind.current();
        assert_eq!(snap.state, CoverState::Closed);
        assert_eq!(snap.position, BLIND_POS_CLOSED);
        assert_eq!(snap.tilt_position, 0);
        assert_eq!(fake.calls(), vec![VariantCall::Close]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_ignored_while_in_motion() {
        let (blind, fake) = new_blind(lifting_config(2, false)).await;

        let mover = blind.clone();
        let task = tokio::spawn(async move { mover.close().await });
        sleep(Duration::from_millis(100)).await;
        assert_eq!(blind.current().state, CoverState::Closing);

        blind.open().await;
        blind.close().await;
        blind.set_position(100).await;
        blind.set_tilt_position(0).await;
        assert_eq!(fake.calls(), vec![VariantCall::Close]);

        task.await.unwrap();
        assert_eq!(blind.current().state, CoverState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_interrupts_close() {
        let (blind, fake) = new_blind(lifting_config(2, false)).await;

        let mover = blind.clone();
        let task = tokio::spawn(async move { mover.close().await });
        sleep(Duration::from_millis(100)).await;

        blind.stop().await;
        task.await.unwrap();

        // The close's post-wait commit must observe the stop and abandon.
        let snap = blind.current();
        assert_eq!(snap.state, CoverState::Open);
        assert_eq!(snap.position, BLIND_POS_STOPPED);
        assert_eq!(fake.calls(), vec![VariantCall::Close, VariantCall::Stop]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_position_below_mid_closes() {
        let (blind, fake) = new_blind(lifting_config(2, false)).await;
        blind.set_position(30).await;

        let snap = blind.current();
        assert_eq!(snap.state, CoverState::Closed);
        assert_eq!(snap.position, BLIND_POS_CLOSED);
        assert_eq!(fake.calls(), vec![VariantCall::Close]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_position_mid_band_recalls_mid() {
        let (blind, fake) = new_blind(lifting_config(2, false)).await;
        blind.set_position(60).await;

        let snap = blind.current();
        assert_eq!(snap.state, CoverState::Closed);
        // Closed with tilted slats reports 1, not 0.
        assert_eq!(snap.position, BLIND_POS_TILTED_MIN);
        assert_eq!(snap.tilt_position, TILT_POS_OPEN);
        assert_eq!(fake.calls(), vec![VariantCall::Mid]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_position_full_open() {
        let (blind, fake) = new_blind(lifting_config(2, false)).await;
        blind.restore(CoverState::Closed, BLIND_POS_CLOSED, 0).await;

        blind.set_position(100).await;

        let snap = blind.current();
        assert_eq!(snap.state, CoverState::Open);
        assert_eq!(snap.position, BLIND_POS_OPEN);
        assert_eq!(snap.tilt_position, 100);
        assert_eq!(fake.calls(), vec![VariantCall::Open]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_recalls_mid() {
        let (blind, fake) = new_blind(lifting_config(2, false)).await;
        blind.open().await;

        let snap = blind.current();
        assert_eq!(snap.state, CoverState::Closed);
        assert_eq!(snap.position, BLIND_POS_TILTED_MIN);
        assert_eq!(snap.tilt_position, TILT_POS_OPEN);
        assert_eq!(fake.calls(), vec![VariantCall::Mid]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_requires_lift() {
        let (blind, fake) = new_blind(static_config(2)).await;
        blind.stop().await;
        assert!(fake.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ignored_when_stationary() {
        let (blind, fake) = new_blind(lifting_config(2, false)).await;
        blind.stop().await;
        assert!(fake.calls().is_empty());
        assert_eq!(blind.current().state, CoverState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tilt_debounce() {
        let (blind, fake) = new_blind(lifting_config(2, false)).await;
        blind.restore(CoverState::Closed, BLIND_POS_CLOSED, 0).await;

        blind.set_tilt_position(25).await;
        // Bounce: arrives with no virtual time elapsed.
        blind.set_tilt_position(75).await;
        assert_eq!(fake.calls(), vec![VariantCall::Tilt(1, 1)]);

        sleep(Duration::from_millis(600)).await;
        blind.set_tilt_position(75).await;
        assert_eq!(
            fake.calls(),
            vec![VariantCall::Tilt(1, 1), VariantCall::Tilt(2, 3)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_tilt_to_mid_percent_recalls_mid() {
        let (blind, fake) = new_blind(lifting_config(2, false)).await;
        blind.restore(CoverState::Closed, BLIND_POS_CLOSED, 0).await;

        blind.set_tilt_position(50).await;

        let snap = blind.current();
        assert_eq!(snap.state, CoverState::Closed);
        assert_eq!(snap.tilt_position, TILT_POS_OPEN);
        assert_eq!(fake.calls(), vec![VariantCall::Mid]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tilt_from_open_recalls_mid() {
        let (blind, fake) = new_blind(lifting_config(2, false)).await;
        // Freshly attached lifting blind is Open: tilt cannot be trusted.
        blind.set_tilt_position(75).await;
        assert_eq!(fake.calls(), vec![VariantCall::Mid]);
        assert_eq!(blind.current().state, CoverState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_mid_crossing_splits_the_move() {
        let (blind, fake) = new_blind(lifting_config(2, true)).await;
        blind.restore(CoverState::Closed, BLIND_POS_CLOSED, 4).await;

        blind.set_tilt_position(0).await;

        // 4 -> 0 crosses the mid point: re-anchor there, then two steps.
        assert_eq!(
            fake.calls(),
            vec![VariantCall::Mid, VariantCall::Tilt(-2, 0)]
        );
        let snap = blind.current();
        assert_eq!(snap.tilt_position, 0);
        assert_eq!(snap.position, BLIND_POS_CLOSED);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_position_without_lift_is_a_tilt() {
        let (blind, fake) = new_blind(static_config(2)).await;
        // Static blinds attach Closed with slats at home (step 2 of 4).
        blind.set_position(100).await;
        assert_eq!(fake.calls(), vec![VariantCall::Tilt(2, 4)]);
        assert_eq!(blind.current().tilt_position, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_step_runs_to_the_boundary() {
        let (blind, fake) = new_blind(lifting_config(2, false)).await;
        blind.restore(CoverState::Closed, BLIND_POS_CLOSED, 0).await;

        blind.stop_tilt().await;
        sleep(Duration::from_millis(500)).await;
        blind.stop_tilt().await;

        blind.open_tilt().await;

        assert_eq!(
            fake.calls(),
            vec![
                VariantCall::Tilt(1, 1),
                VariantCall::Tilt(1, 2),
                VariantCall::Tilt(1, 3),
                VariantCall::Tilt(1, 4),
            ]
        );
        assert_eq!(blind.current().tilt_position, 100);

        // Auto-step disarmed itself; the next tap is a single step.
        blind.close_tilt().await;
        assert_eq!(fake.calls().last(), Some(&VariantCall::Tilt(-1, 3)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_step_disarms_when_the_window_expires() {
        let (blind, fake) = new_blind(lifting_config(2, false)).await;
        blind.restore(CoverState::Closed, BLIND_POS_CLOSED, 0).await;

        blind.stop_tilt().await;
        sleep(Duration::from_millis(500)).await;
        blind.stop_tilt().await;

        // Armed, but the direction tap arrives after the click window.
        sleep(Duration::from_secs(3)).await;
        blind.open_tilt().await;
        assert!(fake.calls().is_empty());

        // Disarmed now: the next tap is a plain single step.
        blind.open_tilt().await;
        assert_eq!(fake.calls(), vec![VariantCall::Tilt(1, 1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_tilt_at_zero_closes_the_blind() {
        let (blind, fake) = new_blind(lifting_config(2, false)).await;
        blind.restore(CoverState::Closed, BLIND_POS_STOPPED, 0).await;

        blind.close_tilt().await;

        assert_eq!(fake.calls(), vec![VariantCall::Close]);
        assert_eq!(blind.current().state, CoverState::Closed);
        assert_eq!(blind.current().position, BLIND_POS_CLOSED);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transmission_failure_still_transitions() {
        let fake = FakeVariant::failing();
        let blind = SlattedBlind::new(
            "test-blind",
            lifting_config(2, false),
            std::sync::Arc::new(fake.clone()),
        );
        sleep(Duration::from_secs(1)).await;

        blind.close().await;

        // No feedback exists to act on the failure: the planned transition
        // still lands.
        assert_eq!(blind.current().state, CoverState::Closed);
        assert_eq!(fake.calls(), vec![VariantCall::Close]);
    }
}
