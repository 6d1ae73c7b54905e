//! TWL6040 audio codec: headset accessory detection and output gain ramps.
//!
//! The driver owns no timer. Interrupts and mixer requests schedule work as
//! deadlines; the host calls [`Twl6040::poll`] with the current time, then
//! sleeps until the deadline it returns (or the next interrupt). Accessory
//! changes and headset button presses queue up as [`JackEvent`]s.

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};

use crate::bus::Bus;
use crate::{Error, Instant};

mod config;
mod defs;
mod jack;
mod mixer;
mod ramp;
mod rw;

pub use config::{CodecConfig, PowerUpRamp, RampSteps};
pub use defs::{IntId, Reg, Status};
pub use jack::{Accessory, AccessoryDetector, JackEvent, Stage};
pub use mixer::HeadsetPowerMode;
pub use ramp::{Output, OutputState, Ramp, RampJob};

use defs::*;
use jack::Effects;

/// Driver for the accessory side of one TWL6040.
pub struct Twl6040<I, D> {
  bus: Bus<I, D>,
  config: CodecConfig,
  cache: [u8; CACHE_SIZE],
  jack: AccessoryDetector,
  outputs: [OutputState; 3],
  boost: u8,
  headset_power_mode: HeadsetPowerMode,
}

impl<I, E, D> Twl6040<I, D>
where
  I: I2c<SevenBitAddress, Error = E>,
  D: DelayNs,
{
  /// Take the initial jack state from the comparators, park the hook
  /// detector, unmask the handsfree short-circuit interrupt and arm a first
  /// detection pass.
  pub async fn probe(i2c: I, delay: D, config: CodecConfig, now: Instant) -> Result<Self, Error<E>> {
    let mut dev = Self {
      bus: Bus::new(i2c, delay, I2C_ADDR),
      config,
      cache: reset_values(),
      jack: AccessoryDetector::new(Accessory::Unplugged),
      outputs: [OutputState::new(config.step_delay); 3],
      boost: config.volume_boost,
      headset_power_mode: HeadsetPowerMode::default(),
    };

    let rev = dev.read_reg(Reg::AsicRev).await?;
    let status = dev.status().await?;
    let accessory = AccessoryDetector::classify(status);
    info!("twl6040 rev {}, jack {:?}", rev, accessory);
    dev.jack = AccessoryDetector::new(accessory);

    dev.read_reg(Reg::HookCtl1).await?;
    dev.set_bits(Reg::HookCtl1, HOOK_ENABLE, false).await?;
    dev.read_reg(Reg::IntMask).await?;
    dev.set_bits(Reg::IntMask, HF_SHORT_MASK, false).await?;

    dev.jack.rearm(now);
    Ok(dev)
  }

  pub fn accessory(&self) -> Accessory {
    self.jack.accessory()
  }

  pub fn jack(&self) -> &AccessoryDetector {
    &self.jack
  }

  pub fn output(&self, output: Output) -> &OutputState {
    &self.outputs[output.index()]
  }

  pub fn config(&self) -> &CodecConfig {
    &self.config
  }

  /// Next queued jack report.
  pub fn take_event(&mut self) -> Option<JackEvent> {
    self.jack.take_event()
  }

  /// Earliest pending deadline across the jack chain and every output.
  pub fn next_deadline(&self) -> Option<Instant> {
    let ramps = self.outputs.iter().filter_map(|o| o.job.map(|j| j.next_at));
    ramps.chain(self.jack.next_deadline()).min()
  }

  /// Acknowledge and dispatch a codec interrupt. Bus failures drop the event.
  pub async fn handle_interrupt(&mut self, now: Instant) {
    let Ok(id) = self.read_reg(Reg::IntId).await.map(IntId::from) else {
      warn!("codec interrupt dropped");
      return;
    };
    if id.plug() || id.unplug() {
      self.jack.on_plug_edge(now);
    }
    if id.hook() {
      match self.status().await {
        Ok(status) => self.jack.on_hook(status, now),
        Err(_) => warn!("hook event dropped"),
      }
    }
    if id.handsfree_short() {
      warn!("handsfree short circuit");
    }
  }

  /// Run everything due at `now` and return the next deadline.
  pub async fn poll(&mut self, now: Instant) -> Option<Instant> {
    while let Some(stage) = self.jack.due(now) {
      if self.run_stage(stage, now).await.is_err() {
        warn!("jack {:?} dropped", stage);
      }
    }
    for output in Output::ALL {
      self.service_ramp(output, now).await;
    }
    self.next_deadline()
  }

  async fn run_stage(&mut self, stage: Stage, now: Instant) -> Result<(), Error<E>> {
    self.apply(self.jack.prepare(stage)).await?;
    let status = self.status().await?;
    let effects = self.jack.advance(stage, status, now);
    self.apply(effects).await
  }

  async fn apply(&mut self, effects: Effects) -> Result<(), Error<E>> {
    if let Some(on) = effects.mic_bias {
      self.set_bits(Reg::MicBias, MIC_BIAS_ENABLE, on).await?;
    }
    if let Some(on) = effects.hook_detect {
      self.set_bits(Reg::HookCtl1, HOOK_ENABLE, on).await?;
    }
    Ok(())
  }

  pub async fn suspend(&mut self) -> Result<(), Error<E>> {
    self.set_bits(Reg::HookCtl1, HOOK_ENABLE, false).await
  }

  /// Forget any chain in flight and detect again shortly.
  pub fn resume(&mut self, now: Instant) {
    self.jack.rearm(now);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::*;
  use embassy_futures::block_on;

  type Dev = Twl6040<FakeTwl, FakeDelay>;

  const STATUS: u8 = Reg::Status as u8;
  const INTID: u8 = Reg::IntId as u8;
  const MIC_BIAS: u8 = Reg::MicBias as u8;
  const HOOK: u8 = Reg::HookCtl1 as u8;
  const HS_GAIN: u8 = Reg::HsGain as u8;

  fn at(ms: u64) -> Instant {
    Instant::from_ticks(ms)
  }

  fn probe_with(fake: &FakeTwl, delay: &FakeDelay, config: CodecConfig) -> Dev {
    let dev = block_on(Twl6040::probe(fake.clone(), delay.clone(), config, at(0))).unwrap();
    fake.clear_writes();
    dev
  }

  fn probe(fake: &FakeTwl) -> Dev {
    probe_with(fake, &FakeDelay::new(), CodecConfig::new())
  }

  /// Poll every deadline up to `until`.
  fn run_until(dev: &mut Dev, until: u64) {
    let mut t = at(0);
    while let Some(next) = block_on(dev.poll(t)) {
      if next > at(until) {
        break;
      }
      t = next;
    }
  }

  /// Settle the initial detection pass on an empty jack.
  fn settle(fake: &FakeTwl, dev: &mut Dev) {
    run_until(dev, 100);
    while dev.take_event().is_some() {}
    fake.clear_writes();
  }

  fn plug(fake: &FakeTwl, dev: &mut Dev, status: u8, now: u64) {
    fake.set(STATUS, status);
    fake.set(INTID, 0x02);
    block_on(dev.handle_interrupt(at(now)));
  }

  #[test]
  fn probe_reads_the_jack_and_arms_detection() {
    let fake = FakeTwl::new();
    fake.set(STATUS, 0x02);
    fake.set(HOOK, 0x01);
    let dev = probe(&fake);
    assert_eq!(dev.accessory(), Accessory::Headset);
    assert_eq!(fake.get(HOOK) & 0x01, 0);
    assert_eq!(fake.get(Reg::IntMask as u8), 0x6F);
    assert_eq!(dev.next_deadline(), Some(at(30)));
    assert_eq!(dev.jack().pending_stage(), Some(Stage::PlugSettle));
  }

  #[test]
  fn headset_with_microphone() {
    let fake = FakeTwl::new();
    let mut dev = probe(&fake);
    settle(&fake, &mut dev);

    plug(&fake, &mut dev, 0x02, 1000);
    assert!(dev.jack().plug_in_progress());
    assert_eq!(block_on(dev.poll(at(1200))), Some(at(2200)));
    assert_eq!(block_on(dev.poll(at(2200))), Some(at(2230)));
    assert_eq!(fake.get(MIC_BIAS) & 0x01, 0x01);
    assert_eq!(fake.get(HOOK) & 0x01, 0x01);

    assert_eq!(block_on(dev.poll(at(2230))), Some(at(2280)));
    assert_eq!(dev.accessory(), Accessory::Headset);
    assert_eq!(fake.get(MIC_BIAS) & 0x01, 0x01);

    assert_eq!(block_on(dev.poll(at(2280))), None);
    assert_eq!(dev.take_event(), Some(JackEvent::Switch(Accessory::Headset)));
  }

  #[test]
  fn headphone_without_microphone() {
    let fake = FakeTwl::new();
    let mut dev = probe(&fake);
    settle(&fake, &mut dev);

    plug(&fake, &mut dev, 0x03, 1000);
    for t in [1200, 2200, 2230, 2280] {
      block_on(dev.poll(at(t)));
    }
    assert_eq!(dev.accessory(), Accessory::Headphone);
    assert_eq!(fake.get(MIC_BIAS) & 0x01, 0);
    assert_eq!(fake.get(HOOK) & 0x01, 0);
    // Bias and hook detect went on for the judge and off again after it.
    assert_eq!(fake.writes_to(MIC_BIAS), vec![0x01, 0x00]);
    assert_eq!(dev.take_event(), Some(JackEvent::Switch(Accessory::Headphone)));
  }

  #[test]
  fn headset_button_reports_the_media_key() {
    let fake = FakeTwl::new();
    let mut dev = probe(&fake);
    settle(&fake, &mut dev);
    plug(&fake, &mut dev, 0x02, 1000);
    for t in [1200, 2200, 2230, 2280] {
      block_on(dev.poll(at(t)));
    }
    let _ = dev.take_event();

    fake.set(STATUS, 0x03);
    fake.set(INTID, 0x08);
    block_on(dev.handle_interrupt(at(3000)));
    block_on(dev.poll(at(3050)));
    assert_eq!(dev.take_event(), Some(JackEvent::Key { pressed: true }));

    fake.set(STATUS, 0x02);
    block_on(dev.poll(at(3060)));
    block_on(dev.poll(at(3110)));
    assert_eq!(dev.take_event(), Some(JackEvent::Key { pressed: false }));
    assert_eq!(dev.take_event(), Some(JackEvent::Switch(Accessory::Headset)));
  }

  #[test]
  fn unreadable_interrupt_is_dropped() {
    let fake = FakeTwl::new();
    let mut dev = probe(&fake);
    settle(&fake, &mut dev);
    fake.set(INTID, 0x02);
    fake.fail_next(u32::MAX);
    block_on(dev.handle_interrupt(at(1000)));
    fake.fail_next(0);
    assert_eq!(dev.next_deadline(), None);
    assert!(!dev.jack().plug_in_progress());
  }

  #[test]
  fn headset_ramp_writes_once_per_step() {
    let fake = FakeTwl::new();
    let mut dev = probe(&fake);
    settle(&fake, &mut dev);

    block_on(dev.set_volume(Output::Headset, 10, 10)).unwrap();
    assert!(fake.writes().is_empty());
    dev.power_up(Output::Headset, at(0));
    run_until(&mut dev, 1000);

    assert_eq!(fake.writes_to(HS_GAIN).len(), 10);
    assert_eq!(fake.get(HS_GAIN), 0x55);
    let hs = dev.output(Output::Headset);
    assert!(hs.is_active());
    assert_eq!(hs.ramp(), Ramp::Idle);
    assert_eq!(hs.job(), None);
  }

  #[test]
  fn handsfree_ramp_takes_ceil_steps() {
    let fake = FakeTwl::new();
    let config = CodecConfig::new().with_handsfree_steps(RampSteps::uniform(3));
    let mut dev = probe_with(&fake, &FakeDelay::new(), config);
    settle(&fake, &mut dev);

    block_on(dev.set_volume(Output::Handsfree, 10, 10)).unwrap();
    dev.power_up(Output::Handsfree, at(0));
    run_until(&mut dev, 1000);

    // 3, 6, 9, 10
    assert_eq!(fake.writes_to(Reg::HfLeftGain as u8), vec![0x1A, 0x17, 0x14, 0x13]);
    assert_eq!(fake.writes_to(Reg::HfRightGain as u8).len(), 4);
  }

  #[test]
  fn immediate_power_up_is_one_write() {
    let fake = FakeTwl::new();
    let config = CodecConfig::new().with_power_up(PowerUpRamp::Immediate);
    let mut dev = probe_with(&fake, &FakeDelay::new(), config);
    settle(&fake, &mut dev);

    block_on(dev.set_volume(Output::Earpiece, 9, 0)).unwrap();
    assert_eq!(dev.volume(Output::Earpiece), (9, 9));
    dev.power_up(Output::Earpiece, at(0));
    run_until(&mut dev, 1000);
    assert_eq!(fake.writes_to(Reg::EarCtl as u8).len(), 1);
    assert!(dev.output(Output::Earpiece).is_active());
  }

  #[test]
  fn immediate_power_up_still_ramps_down_in_steps() {
    let fake = FakeTwl::new();
    let config = CodecConfig::new().with_power_up(PowerUpRamp::Immediate);
    let mut dev = probe_with(&fake, &FakeDelay::new(), config);
    settle(&fake, &mut dev);
    block_on(dev.set_volume(Output::Headset, 10, 10)).unwrap();
    dev.power_up(Output::Headset, at(0));
    run_until(&mut dev, 1000);
    assert_eq!(fake.writes_to(HS_GAIN).len(), 1);
    fake.clear_writes();

    block_on(dev.power_down(Output::Headset, at(1000)));
    assert_eq!(fake.writes_to(HS_GAIN).len(), 10);
    assert_eq!(fake.get(HS_GAIN), 0xFF);
    assert!(!dev.output(Output::Headset).is_active());
  }

  #[test]
  fn boost_after_immediate_power_up_uses_configured_steps() {
    let fake = FakeTwl::new();
    let config = CodecConfig::new().with_power_up(PowerUpRamp::Immediate).with_headset_steps(RampSteps::uniform(2));
    let mut dev = probe_with(&fake, &FakeDelay::new(), config);
    settle(&fake, &mut dev);
    block_on(dev.set_volume(Output::Headset, 6, 6)).unwrap();
    dev.power_up(Output::Headset, at(0));
    run_until(&mut dev, 1000);
    fake.clear_writes();

    dev.set_volume_boost(5, at(0));
    let job = dev.output(Output::Headset).job();
    assert_eq!(job, Some(RampJob { next_at: at(1), iteration: 0 }));
    run_until(&mut dev, 1000);
    // 6 -> 8 -> 10 -> 11
    assert_eq!(fake.writes_to(HS_GAIN), vec![0x77, 0x55, 0x44]);
  }

  #[test]
  fn only_one_job_per_output() {
    let fake = FakeTwl::new();
    let mut dev = probe(&fake);
    settle(&fake, &mut dev);
    block_on(dev.set_volume(Output::Headset, 4, 4)).unwrap();

    dev.power_up(Output::Headset, at(0));
    let first = dev.output(Output::Headset).job();
    dev.power_up(Output::Headset, at(0));
    assert_eq!(dev.output(Output::Headset).job(), first);
    dev.set_volume_boost(2, at(0));
    assert_eq!(dev.output(Output::Headset).job(), first);

    // The boost is picked up by the ramp already running.
    run_until(&mut dev, 1000);
    assert_eq!(fake.writes_to(HS_GAIN).len(), 6);
    assert_eq!(fake.get(HS_GAIN), 0x99);
  }

  #[test]
  fn power_down_waits_for_the_ramp() {
    let fake = FakeTwl::new();
    let delay = FakeDelay::new();
    let mut dev = probe_with(&fake, &delay, CodecConfig::new());
    settle(&fake, &mut dev);
    block_on(dev.set_volume(Output::Headset, 10, 10)).unwrap();
    dev.power_up(Output::Headset, at(0));
    run_until(&mut dev, 1000);
    fake.clear_writes();

    let before = delay.elapsed_ms();
    let end = block_on(dev.power_down(Output::Headset, at(1000)));
    let hs = dev.output(Output::Headset);
    assert!(!hs.is_active());
    assert!(hs.is_done());
    assert_eq!(fake.writes_to(HS_GAIN).len(), 10);
    assert_eq!(fake.get(HS_GAIN), 0xFF);
    // 1 ms start, then 5 ms steps, stretched from the eighth on.
    assert_eq!(end, at(1000 + 1 + 8 * 5 + 2 * 7));
    assert_eq!(delay.elapsed_ms() - before, 55);

    // Already off: nothing to do.
    assert_eq!(block_on(dev.power_down(Output::Headset, at(2000))), at(2000));
  }

  #[test]
  fn power_down_gives_up_on_a_dead_bus() {
    let fake = FakeTwl::new();
    let mut dev = probe(&fake);
    settle(&fake, &mut dev);
    block_on(dev.set_volume(Output::Handsfree, 20, 20)).unwrap();
    dev.power_up(Output::Handsfree, at(0));
    run_until(&mut dev, 1000);

    fake.fail_next(u32::MAX);
    let end = block_on(dev.power_down(Output::Handsfree, at(1000)));
    fake.fail_next(0);
    assert!(end <= at(3000));
    let hf = dev.output(Output::Handsfree);
    assert!(!hf.is_active());
    assert_eq!(hf.job(), None);
  }

  #[test]
  fn boost_walks_an_idle_headset() {
    let fake = FakeTwl::new();
    let mut dev = probe(&fake);
    settle(&fake, &mut dev);
    block_on(dev.set_volume(Output::Headset, 10, 10)).unwrap();
    dev.power_up(Output::Headset, at(0));
    run_until(&mut dev, 1000);

    dev.set_volume_boost(3, at(0));
    assert_eq!(dev.output(Output::Headset).ramp(), Ramp::Up);
    run_until(&mut dev, 1000);
    assert_eq!(fake.get(HS_GAIN), 0x22);
    assert!(dev.output(Output::Headset).is_active());

    dev.set_volume_boost(0, at(0));
    assert_eq!(dev.output(Output::Headset).ramp(), Ramp::Down);
    run_until(&mut dev, 1000);
    assert_eq!(fake.get(HS_GAIN), 0x55);
    assert!(dev.output(Output::Headset).is_active());
  }

  #[test]
  fn mixer_writes_through_while_active() {
    let fake = FakeTwl::new();
    let mut dev = probe(&fake);
    settle(&fake, &mut dev);
    block_on(dev.set_volume(Output::Handsfree, 40, 2)).unwrap();
    assert_eq!(dev.volume(Output::Handsfree), (0x1D, 2));
    assert!(fake.writes().is_empty());

    dev.power_up(Output::Handsfree, at(0));
    run_until(&mut dev, 1000);
    fake.clear_writes();
    block_on(dev.set_volume(Output::Handsfree, 5, 5)).unwrap();
    assert_eq!(fake.writes(), vec![(Reg::HfLeftGain as u8, 0x18), (Reg::HfRightGain as u8, 0x18)]);
  }

  #[test]
  fn headset_power_mode_needs_idle_dacs() {
    let fake = FakeTwl::new();
    let mut dev = probe(&fake);
    block_on(dev.set_headset_power_mode(HeadsetPowerMode::LowPower)).unwrap();
    assert_eq!(fake.get(Reg::HsLeftCtl as u8), 0x0A);
    assert_eq!(fake.get(Reg::HsRightCtl as u8), 0x0A);

    fake.set(Reg::HsRightCtl as u8, 0x0B);
    assert_eq!(block_on(dev.set_headset_power_mode(HeadsetPowerMode::HighPerformance)), Err(Error::Busy));
    assert_eq!(dev.headset_power_mode(), HeadsetPowerMode::LowPower);
  }

  #[test]
  fn suspend_parks_hook_detect_and_resume_rearms() {
    let fake = FakeTwl::new();
    let mut dev = probe(&fake);
    settle(&fake, &mut dev);
    plug(&fake, &mut dev, 0x02, 1000);
    for t in [1200, 2200, 2230, 2280] {
      block_on(dev.poll(at(t)));
    }
    assert_eq!(fake.get(HOOK) & 0x01, 0x01);

    block_on(dev.suspend()).unwrap();
    assert_eq!(fake.get(HOOK) & 0x01, 0);
    let generation = dev.jack().generation();
    dev.resume(at(5000));
    assert_eq!(dev.jack().generation(), generation + 1);
    assert_eq!(dev.next_deadline(), Some(at(5030)));
  }
}
