//! Headset jack classification.
//!
//! A plug edge starts a chain of delayed stages: let the contacts settle, turn
//! on the microphone bias and hook comparator, then judge from the hook
//! comparator whether a microphone is present. A new edge bumps the
//! generation so any stage still scheduled from the previous edge is dropped
//! when it comes due. Reports go out a little after the state settles, and a
//! pressed headset button is polled until it is released.

use heapless::Deque;

use super::defs::*;
use crate::{Duration, Instant};

/// What sits in the jack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Accessory {
  #[default]
  Unplugged,
  /// Headphones without a microphone.
  Headphone,
  /// Headset with a microphone and a hook button.
  Headset,
}

impl Accessory {
  /// Value reported on the headphone switch.
  pub const fn switch_code(self) -> u8 {
    match self {
      Accessory::Unplugged => 0,
      Accessory::Headset => 1,
      Accessory::Headphone => 2,
    }
  }
}

/// Reports for the host's input layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum JackEvent {
  /// New headphone switch state.
  Switch(Accessory),
  /// Headset button, reported as the media play/pause key.
  Key { pressed: bool },
}

/// Delayed stages of the detection chain, plus the two standalone timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Stage {
  PlugSettle,
  BiasEnable,
  MicJudge,
  HookPoll,
  Report,
}

/// Changes to the detection hardware a stage asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Effects {
  pub(crate) mic_bias: Option<bool>,
  pub(crate) hook_detect: Option<bool>,
}

impl Effects {
  const NONE: Self = Self { mic_bias: None, hook_detect: None };
  const ALL_OFF: Self = Self { mic_bias: Some(false), hook_detect: Some(false) };
  const ALL_ON: Self = Self { mic_bias: Some(true), hook_detect: Some(true) };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ChainSlot {
  stage: Stage,
  at: Instant,
  generation: u32,
}

const EVENT_QUEUE: usize = 8;

/// Accessory detection state. Pure bookkeeping; the driver does the register
/// work for each stage.
#[derive(Debug, Clone)]
pub struct AccessoryDetector {
  accessory: Accessory,
  plug_in_progress: bool,
  generation: u32,
  chain: Option<ChainSlot>,
  hook_poll: Option<Instant>,
  report_at: Option<Instant>,
  latched: Accessory,
  latched_button: bool,
  button_down: bool,
  events: Deque<JackEvent, EVENT_QUEUE>,
}

impl AccessoryDetector {
  pub fn new(initial: Accessory) -> Self {
    Self {
      accessory: initial,
      plug_in_progress: false,
      generation: 0,
      chain: None,
      hook_poll: None,
      report_at: None,
      latched: initial,
      latched_button: false,
      button_down: false,
      events: Deque::new(),
    }
  }

  /// Accessory from the comparators alone, used before any chain has run.
  pub fn classify(status: Status) -> Accessory {
    match (status.plug_comp(), status.hook_comp()) {
      (false, _) => Accessory::Unplugged,
      (true, false) => Accessory::Headset,
      (true, true) => Accessory::Headphone,
    }
  }

  pub fn accessory(&self) -> Accessory {
    self.accessory
  }

  pub fn plug_in_progress(&self) -> bool {
    self.plug_in_progress
  }

  pub fn generation(&self) -> u32 {
    self.generation
  }

  pub fn button_down(&self) -> bool {
    self.button_down
  }

  /// Stage the chain slot holds, if any, whether current or stale.
  pub fn pending_stage(&self) -> Option<Stage> {
    self.chain.map(|c| c.stage)
  }

  fn restart(&mut self, at: Instant) {
    self.generation = self.generation.wrapping_add(1);
    self.chain = Some(ChainSlot { stage: Stage::PlugSettle, at, generation: self.generation });
  }

  fn schedule(&mut self, stage: Stage, at: Instant) {
    self.chain = Some(ChainSlot { stage, at, generation: self.generation });
  }

  fn schedule_report(&mut self, at: Instant) {
    if self.report_at.is_none() {
      self.report_at = Some(at);
    }
  }

  fn schedule_hook_poll(&mut self, at: Instant) {
    if self.hook_poll.is_none() {
      self.hook_poll = Some(at);
    }
  }

  fn latch(&mut self, accessory: Accessory, button: bool) {
    self.latched = accessory;
    self.latched_button = button;
  }

  /// Plug or unplug edge: drop whatever is in flight and start over.
  pub fn on_plug_edge(&mut self, now: Instant) {
    self.plug_in_progress = true;
    self.restart(now + Duration::millis(PLUG_SETTLE_MS));
  }

  /// Re-run detection shortly, as after probe or resume.
  pub fn rearm(&mut self, now: Instant) {
    self.restart(now + Duration::millis(REARM_MS));
  }

  /// Hook comparator edge. Only a plugged, settled headset has a button.
  pub fn on_hook(&mut self, status: Status, now: Instant) {
    if self.accessory != Accessory::Headset || !status.plug_comp() || self.plug_in_progress {
      debug!("hook edge ignored");
      return;
    }
    self.latch(Accessory::Headset, true);
    self.schedule_report(now + Duration::millis(REPORT_DELAY_MS));
    self.schedule_hook_poll(now + Duration::millis(HOOK_POLL_MS));
  }

  /// Take the earliest stage whose deadline has passed. Stale chain stages are
  /// discarded on the way.
  pub fn due(&mut self, now: Instant) -> Option<Stage> {
    if let Some(c) = self.chain {
      if c.generation != self.generation {
        trace!("dropping stale {:?}", c.stage);
        self.chain = None;
      }
    }
    let mut best: Option<(Stage, Instant)> = None;
    let candidates = [
      self.chain.map(|c| (c.stage, c.at)),
      self.hook_poll.map(|at| (Stage::HookPoll, at)),
      self.report_at.map(|at| (Stage::Report, at)),
    ];
    for (stage, at) in candidates.into_iter().flatten() {
      if at <= now && best.map_or(true, |(_, b)| at < b) {
        best = Some((stage, at));
      }
    }
    let (stage, _) = best?;
    match stage {
      Stage::HookPoll => self.hook_poll = None,
      Stage::Report => self.report_at = None,
      _ => self.chain = None,
    }
    Some(stage)
  }

  pub fn next_deadline(&self) -> Option<Instant> {
    let chain = self.chain.filter(|c| c.generation == self.generation).map(|c| c.at);
    [chain, self.hook_poll, self.report_at].into_iter().flatten().min()
  }

  /// Work done before the stage samples STATUS.
  pub(crate) fn prepare(&self, stage: Stage) -> Effects {
    match stage {
      Stage::PlugSettle => Effects::ALL_OFF,
      _ => Effects::NONE,
    }
  }

  fn unplugged(&mut self, now: Instant) -> Effects {
    if self.accessory != Accessory::Unplugged {
      info!("jack: {:?} removed", self.accessory);
      self.accessory = Accessory::Unplugged;
      self.latch(Accessory::Unplugged, false);
    } else {
      debug!("jack: unplug with nothing plugged");
    }
    self.plug_in_progress = false;
    self.schedule_report(now + Duration::millis(REPORT_DELAY_MS));
    Effects::ALL_OFF
  }

  /// Run `stage` against a fresh STATUS sample.
  pub(crate) fn advance(&mut self, stage: Stage, status: Status, now: Instant) -> Effects {
    match stage {
      Stage::PlugSettle => {
        if !status.plug_comp() {
          return self.unplugged(now);
        }
        self.schedule(Stage::BiasEnable, now + Duration::millis(BIAS_SETTLE_MS));
        Effects::NONE
      }
      Stage::BiasEnable => {
        if !status.plug_comp() {
          return self.unplugged(now);
        }
        self.schedule(Stage::MicJudge, now + Duration::millis(MIC_JUDGE_MS));
        Effects::ALL_ON
      }
      Stage::MicJudge => {
        if !status.plug_comp() {
          return self.unplugged(now);
        }
        self.plug_in_progress = false;
        self.schedule_report(now + Duration::millis(REPORT_DELAY_MS));
        if status.hook_comp() {
          info!("jack: headphone");
          self.accessory = Accessory::Headphone;
          self.latch(Accessory::Headphone, false);
          Effects::ALL_OFF
        } else {
          info!("jack: headset");
          self.accessory = Accessory::Headset;
          self.latch(Accessory::Headset, false);
          Effects::NONE
        }
      }
      Stage::HookPoll => {
        if self.accessory == Accessory::Headset && status.plug_comp() {
          if status.hook_comp() {
            self.schedule_hook_poll(now + Duration::millis(HOOK_POLL_MS));
          } else {
            self.latch(Accessory::Headset, false);
            self.schedule_report(now + Duration::millis(REPORT_DELAY_MS));
          }
        }
        Effects::NONE
      }
      Stage::Report => {
        let (accessory, button) =
          if status.plug_comp() { (self.latched, self.latched_button) } else { (Accessory::Unplugged, false) };
        if button != self.button_down {
          self.button_down = button;
          self.push(JackEvent::Key { pressed: button });
        }
        if !button {
          self.push(JackEvent::Switch(accessory));
        }
        Effects::NONE
      }
    }
  }

  fn push(&mut self, event: JackEvent) {
    if self.events.is_full() {
      warn!("jack event queue full, dropping oldest");
      self.events.pop_front();
    }
    let _ = self.events.push_back(event);
  }

  pub fn take_event(&mut self) -> Option<JackEvent> {
    self.events.pop_front()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const UNPLUGGED: Status = Status::new();

  fn at(ms: u64) -> Instant {
    Instant::from_ticks(ms)
  }

  fn plugged(hook: bool) -> Status {
    Status::new().with_plug_comp(true).with_hook_comp(hook)
  }

  /// Run every stage due up to `until`, in deadline order, against a fixed
  /// STATUS. Returns the stages that ran.
  fn run(det: &mut AccessoryDetector, status: Status, until: u64) -> std::vec::Vec<Stage> {
    let mut ran = std::vec::Vec::new();
    while let Some(next) = det.next_deadline() {
      if next > at(until) {
        break;
      }
      let stage = det.due(next).unwrap();
      det.advance(stage, status, next);
      ran.push(stage);
    }
    ran
  }

  #[test]
  fn headset_chain() {
    let mut det = AccessoryDetector::new(Accessory::Unplugged);
    det.on_plug_edge(at(0));
    assert!(det.plug_in_progress());
    assert_eq!(det.next_deadline(), Some(at(200)));
    assert_eq!(det.due(at(199)), None);

    let stage = det.due(at(200)).unwrap();
    assert_eq!(det.prepare(stage), Effects::ALL_OFF);
    assert_eq!(det.advance(stage, plugged(false), at(200)), Effects::NONE);
    assert_eq!(det.next_deadline(), Some(at(1200)));

    let stage = det.due(at(1200)).unwrap();
    assert_eq!(det.advance(stage, plugged(false), at(1200)), Effects::ALL_ON);
    let stage = det.due(at(1230)).unwrap();
    assert_eq!(stage, Stage::MicJudge);
    assert_eq!(det.advance(stage, plugged(false), at(1230)), Effects::NONE);
    assert_eq!(det.accessory(), Accessory::Headset);
    assert!(!det.plug_in_progress());

    assert_eq!(run(&mut det, plugged(false), 1280), [Stage::Report]);
    assert_eq!(det.take_event(), Some(JackEvent::Switch(Accessory::Headset)));
    assert_eq!(det.take_event(), None);
  }

  #[test]
  fn headphone_turns_detection_off() {
    let mut det = AccessoryDetector::new(Accessory::Unplugged);
    det.on_plug_edge(at(0));
    run(&mut det, plugged(true), 1200);
    let stage = det.due(at(1230)).unwrap();
    assert_eq!(det.advance(stage, plugged(true), at(1230)), Effects::ALL_OFF);
    assert_eq!(det.accessory(), Accessory::Headphone);
    run(&mut det, plugged(true), 2000);
    assert_eq!(det.take_event(), Some(JackEvent::Switch(Accessory::Headphone)));
    assert_eq!(Accessory::Headphone.switch_code(), 2);
  }

  #[test]
  fn bouncing_plug_runs_only_the_last_chain() {
    let mut det = AccessoryDetector::new(Accessory::Unplugged);
    det.on_plug_edge(at(0));
    det.on_plug_edge(at(50));
    det.on_plug_edge(at(100));
    assert_eq!(det.generation(), 3);

    let ran = run(&mut det, plugged(false), 5000);
    assert_eq!(ran, [Stage::PlugSettle, Stage::BiasEnable, Stage::MicJudge, Stage::Report]);
    assert_eq!(det.take_event(), Some(JackEvent::Switch(Accessory::Headset)));
    assert_eq!(det.take_event(), None);
  }

  #[test]
  fn removal_mid_chain_reports_unplugged() {
    let mut det = AccessoryDetector::new(Accessory::Headset);
    det.on_plug_edge(at(0));
    let stage = det.due(at(200)).unwrap();
    assert_eq!(det.advance(stage, UNPLUGGED, at(200)), Effects::ALL_OFF);
    assert_eq!(det.accessory(), Accessory::Unplugged);
    assert!(!det.plug_in_progress());
    assert_eq!(det.pending_stage(), None);

    run(&mut det, UNPLUGGED, 250);
    assert_eq!(det.take_event(), Some(JackEvent::Switch(Accessory::Unplugged)));
  }

  #[test]
  fn button_press_and_release() {
    let mut det = AccessoryDetector::new(Accessory::Unplugged);
    det.on_plug_edge(at(0));
    run(&mut det, plugged(false), 2000);
    let _ = det.take_event();

    det.on_hook(plugged(true), at(3000));
    // A second edge while the report is pending changes nothing.
    det.on_hook(plugged(true), at(3010));
    assert_eq!(run(&mut det, plugged(true), 3050), [Stage::Report]);
    assert_eq!(det.take_event(), Some(JackEvent::Key { pressed: true }));
    assert_eq!(det.take_event(), None);
    assert!(det.button_down());

    // Still held at the first poll.
    assert_eq!(run(&mut det, plugged(true), 3060), [Stage::HookPoll]);
    assert_eq!(det.next_deadline(), Some(at(3120)));

    assert_eq!(run(&mut det, plugged(false), 3200), [Stage::HookPoll, Stage::Report]);
    assert_eq!(det.take_event(), Some(JackEvent::Key { pressed: false }));
    assert_eq!(det.take_event(), Some(JackEvent::Switch(Accessory::Headset)));
  }

  #[test]
  fn hook_is_ignored_without_a_settled_headset() {
    let mut det = AccessoryDetector::new(Accessory::Headphone);
    det.on_hook(plugged(true), at(0));
    assert_eq!(det.next_deadline(), None);

    let mut det = AccessoryDetector::new(Accessory::Headset);
    det.on_plug_edge(at(0));
    det.on_hook(plugged(true), at(10));
    assert_eq!(det.next_deadline(), Some(at(200)));
  }

  #[test]
  fn classify_from_comparators() {
    assert_eq!(AccessoryDetector::classify(UNPLUGGED), Accessory::Unplugged);
    assert_eq!(AccessoryDetector::classify(plugged(false)), Accessory::Headset);
    assert_eq!(AccessoryDetector::classify(plugged(true)), Accessory::Headphone);
  }
}
